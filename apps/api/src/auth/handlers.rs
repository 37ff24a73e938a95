//! Axum route handlers for registration, login and logout.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::extractor::AuthUser;
use crate::auth::guard::Role;
use crate::auth::password::{hash_password, validate_password, verify_password};
use crate::auth::token::{cleared_cookie, session_cookie, TokenService};
use crate::errors::AppError;
use crate::jobs::validation::validate_email;
use crate::models::response::MessageResponse;
use crate::models::user::UserRow;
use crate::state::AppState;
use crate::users::repo::{self, NewUser};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRow>,
}

/// Issues a fresh session token as both a JSON body and an `HttpOnly` cookie.
pub fn token_response(
    tokens: &TokenService,
    user_id: uuid::Uuid,
    role: Role,
    user: Option<UserRow>,
) -> Result<Response, AppError> {
    let issued = tokens.issue(user_id, role)?;
    let cookie = session_cookie(&issued);
    let body = TokenResponse {
        success: true,
        token: issued.token,
        user,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// POST /api/v1/register
pub async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Please enter your name".to_string()));
    }
    let email = req.email.trim().to_lowercase();
    validate_email(&email)?;
    validate_password(&req.password)?;

    let role = req.role.unwrap_or(Role::User);
    if role == Role::Admin {
        return Err(AppError::Validation(
            "Role admin cannot be self-assigned".to_string(),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let user = repo::create(
        &state.db,
        NewUser {
            name,
            email: &email,
            role,
            password_hash: &password_hash,
        },
    )
    .await?;

    info!("Registered user {} as {}", user.id, user.role);
    token_response(&state.tokens, user.id, user.role, Some(user))
}

/// POST /api/v1/login
pub async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let (Some(email), Some(password)) = (
        req.email.filter(|e| !e.trim().is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AppError::Validation(
            "Please enter email & password".to_string(),
        ));
    };

    let invalid = || AppError::Unauthorized("Invalid Email or Password".to_string());

    let credentials = repo::credentials_by_email(&state.db, &email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&password, &credentials.password_hash) {
        return Err(invalid());
    }

    token_response(&state.tokens, credentials.id, credentials.role, None)
}

/// GET /api/v1/logout
pub async fn handle_logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Response, AppError> {
    state
        .revocations
        .revoke(auth.claims.jti, auth.claims.exp)
        .await?;

    Ok((
        [(header::SET_COOKIE, cleared_cookie())],
        Json(MessageResponse::ok("Logged out successfully.")),
    )
        .into_response())
}
