//! Caller identity extracted from gateway-provided headers.
//!
//! The core trusts an upstream gateway to authenticate callers and to
//! forward the verified identity in `x-user-id` and `x-user-role`. The
//! extractor rejects requests where either header is missing or
//! malformed; role checks themselves live in the handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

/// The caller's role. Customers reserve seats; organizers settle them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Organizer,
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    /// Fails with 403 unless the caller holds the given role.
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "this operation requires the {role:?} role"
            )))
        }
    }
}

fn header<'p>(parts: &'p Parts, name: &str) -> Result<&'p str, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header(parts, "x-user-id")?
            .parse::<uuid::Uuid>()
            .map(UserId::from_uuid)
            .map_err(|e| ApiError::Unauthorized(format!("invalid x-user-id: {e}")))?;

        let role = match header(parts, "x-user-role")? {
            "customer" => Role::Customer,
            "organizer" => Role::Organizer,
            other => {
                return Err(ApiError::Unauthorized(format!(
                    "unknown x-user-role: {other}"
                )));
            }
        };

        Ok(Principal { user_id, role })
    }
}
