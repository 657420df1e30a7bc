use serde::{Deserialize, Serialize};
use shared::{Actor, Role};

/// Request signature a cached value is stored under
///
/// Tenant and role are part of the key: a response redacted for one viewer
/// must never answer another viewer's request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub tenant_id: String,
    pub role: Role,
    pub endpoint: String,
    /// Sorted by name, then value
    pub params: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(actor: &Actor, endpoint: impl Into<String>, mut params: Vec<(String, String)>) -> Self {
        params.sort();
        Self {
            tenant_id: actor.tenant_id.clone(),
            role: actor.role,
            endpoint: endpoint.into(),
            params,
        }
    }
}
