//! Tenant directory types

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TenantKind {
    Hospital,
    Clinic,
    Pharmacy,
    Laboratory,
    Insurer,
}

impl TenantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantKind::Hospital => "hospital",
            TenantKind::Clinic => "clinic",
            TenantKind::Pharmacy => "pharmacy",
            TenantKind::Laboratory => "laboratory",
            TenantKind::Insurer => "insurer",
        }
    }
}

impl std::fmt::Display for TenantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantRecord {
    pub id: String,
    pub name: String,
    pub kind: TenantKind,
}
