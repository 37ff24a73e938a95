use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::guard::{require_role, Requester, Role};
use crate::auth::token::{token_from_headers, Claims};
use crate::errors::AppError;
use crate::state::AppState;
use crate::users;

/// An authenticated request. Rejects with 401 when the token is missing,
/// invalid, revoked, or belongs to a user that no longer exists.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub requester: Requester,
    pub claims: Claims,
}

impl AuthUser {
    pub fn require(&self, allowed: &[Role]) -> Result<(), AppError> {
        require_role(&self.requester, allowed)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or_else(|| {
            AppError::Unauthorized("Login first to access this resource.".to_string())
        })?;
        let claims = state.tokens.verify(token)?;

        if state.revocations.is_revoked(claims.jti).await? {
            return Err(AppError::Unauthorized(
                "Session has been logged out".to_string(),
            ));
        }

        // The stored role wins over the one baked into the token.
        let user = users::repo::find_by_id(&state.db, claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

        Ok(AuthUser {
            requester: Requester {
                id: user.id,
                role: user.role,
            },
            claims,
        })
    }
}
