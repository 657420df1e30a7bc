//! Identity extractor
//!
//! Reads the gateway identity headers and rejects requests without them.

use axum::{extract::FromRequestParts, http::request::Parts};
use shared::error::ErrorCode;
use shared::{Actor, AppError, Role};

use crate::core::ServerState;
use crate::security_log;

pub const USER_HEADER: &str = "x-user-id";
pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ROLE_HEADER: &str = "x-user-role";

/// Identity of the caller, resolved from the gateway headers
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl std::ops::Deref for CurrentActor {
    type Target = Actor;

    fn deref(&self) -> &Actor {
        &self.0
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl FromRequestParts<ServerState> for CurrentActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(actor) = parts.extensions.get::<CurrentActor>() {
            return Ok(actor.clone());
        }

        let (Some(user_id), Some(tenant_id), Some(role)) = (
            header(parts, USER_HEADER),
            header(parts, TENANT_HEADER),
            header(parts, ROLE_HEADER),
        ) else {
            security_log!("WARN", "identity_missing", uri = format!("{:?}", parts.uri));
            return Err(AppError::not_authenticated());
        };

        let role: Role = match role.parse() {
            Ok(role) => role,
            Err(e) => {
                security_log!(
                    "WARN",
                    "identity_invalid",
                    error = e.as_str(),
                    uri = format!("{:?}", parts.uri)
                );
                return Err(AppError::with_message(ErrorCode::IdentityInvalid, e));
            }
        };

        let actor = CurrentActor(Actor::new(user_id, tenant_id, role));
        parts.extensions.insert(actor.clone());
        Ok(actor)
    }
}
