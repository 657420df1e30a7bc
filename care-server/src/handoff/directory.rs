//! Tenant directory
//!
//! Registry of tenants and of each patient's preferred pharmacy. The server
//! seeds it from a JSON file:
//!
//! ```json
//! {
//!   "tenants": [
//!     {"id": "h-1", "name": "General Hospital", "kind": "hospital"},
//!     {"id": "ph-1", "name": "Main St Pharmacy", "kind": "pharmacy"}
//!   ],
//!   "preferred_pharmacies": {"patient-7": "ph-1"}
//! }
//! ```

use super::error::{HandoffError, HandoffResult};
use serde::Deserialize;
use shared::tenant::{TenantKind, TenantRecord};
use std::collections::HashMap;
use std::path::Path;

pub trait TenantDirectory: Send + Sync {
    fn get(&self, tenant_id: &str) -> Option<TenantRecord>;

    fn preferred_pharmacy(&self, patient_id: &str) -> Option<String>;

    /// Registered tenant of the expected kind
    fn require(&self, tenant_id: &str, expected: TenantKind) -> HandoffResult<TenantRecord> {
        let tenant = self
            .get(tenant_id)
            .ok_or_else(|| HandoffError::TenantNotFound(tenant_id.to_string()))?;
        if tenant.kind != expected {
            return Err(HandoffError::TenantKindMismatch {
                tenant_id: tenant_id.to_string(),
                expected,
                actual: tenant.kind,
            });
        }
        Ok(tenant)
    }
}

#[derive(Debug, Default, Deserialize)]
struct DirectoryFile {
    #[serde(default)]
    tenants: Vec<TenantRecord>,
    #[serde(default)]
    preferred_pharmacies: HashMap<String, String>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    tenants: HashMap<String, TenantRecord>,
    preferred_pharmacies: HashMap<String, String>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> HandoffResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let file: DirectoryFile = serde_json::from_str(&raw)?;

        let mut directory = Self::new();
        for tenant in file.tenants {
            directory = directory.with_tenant(tenant);
        }
        directory.preferred_pharmacies = file.preferred_pharmacies;

        tracing::info!(
            path = %path.display(),
            tenants = directory.tenants.len(),
            preferred_pharmacies = directory.preferred_pharmacies.len(),
            "Tenant directory loaded"
        );
        Ok(directory)
    }

    pub fn with_tenant(mut self, tenant: TenantRecord) -> Self {
        self.tenants.insert(tenant.id.clone(), tenant);
        self
    }

    pub fn with_preferred_pharmacy(
        mut self,
        patient_id: impl Into<String>,
        pharmacy_id: impl Into<String>,
    ) -> Self {
        self.preferred_pharmacies
            .insert(patient_id.into(), pharmacy_id.into());
        self
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

impl TenantDirectory for InMemoryDirectory {
    fn get(&self, tenant_id: &str) -> Option<TenantRecord> {
        self.tenants.get(tenant_id).cloned()
    }

    fn preferred_pharmacy(&self, patient_id: &str) -> Option<String> {
        self.preferred_pharmacies.get(patient_id).cloned()
    }
}
