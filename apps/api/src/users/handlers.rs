//! Axum route handlers for the current user's profile and admin user management.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::handlers::token_response;
use crate::auth::password::{hash_password, validate_password, verify_password};
use crate::auth::token::cleared_cookie;
use crate::auth::{AuthUser, Requester, Role};
use crate::errors::AppError;
use crate::jobs;
use crate::jobs::validation::validate_email;
use crate::models::job::{AppliedJob, JobRow, JobSummary};
use crate::models::response::{DataResponse, ListResponse, MessageResponse};
use crate::models::user::{UserRow, USERS};
use crate::query::QueryDescriptor;
use crate::state::AppState;
use crate::users::cleanup::delete_user_data;
use crate::users::repo;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: UserRow,
    pub jobs_published: Vec<JobSummary>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

async fn load_user(state: &AppState, id: Uuid) -> Result<UserRow, AppError> {
    repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User not found {id}")))
}

/// GET /api/v1/me
pub async fn handle_get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<DataResponse<ProfileResponse>>, AppError> {
    let user = load_user(&state, auth.requester.id).await?;
    let jobs_published = jobs::repo::summaries_by(&state.db, user.id).await?;
    Ok(Json(DataResponse::new(ProfileResponse {
        user,
        jobs_published,
    })))
}

/// PUT /api/v1/me/update
pub async fn handle_update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<DataResponse<UserRow>>, AppError> {
    let current = load_user(&state, auth.requester.id).await?;

    let name = match req.name.as_deref().map(str::trim) {
        Some("") => return Err(AppError::Validation("Please enter your name".to_string())),
        Some(name) => name.to_string(),
        None => current.name,
    };
    let email = match req.email {
        Some(email) => {
            let email = email.trim().to_lowercase();
            validate_email(&email)?;
            email
        }
        None => current.email,
    };

    let user = repo::update_profile(&state.db, auth.requester.id, &name, &email)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User not found {}", auth.requester.id)))?;
    Ok(Json(DataResponse::new(user)))
}

/// PUT /api/v1/password/update
pub async fn handle_update_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<Response, AppError> {
    let credentials = repo::credentials_by_id(&state.db, auth.requester.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User not found {}", auth.requester.id)))?;

    if !verify_password(&req.current_password, &credentials.password_hash) {
        return Err(AppError::Unauthorized("Password is incorrect".to_string()));
    }
    validate_password(&req.new_password)?;

    let password_hash = hash_password(&req.new_password)?;
    repo::update_password(&state.db, credentials.id, &password_hash).await?;

    // Old session ends with the old password.
    state
        .revocations
        .revoke(auth.claims.jti, auth.claims.exp)
        .await?;
    token_response(&state.tokens, credentials.id, credentials.role, None)
}

/// DELETE /api/v1/me/delete
pub async fn handle_delete_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Response, AppError> {
    let Requester { id, role } = auth.requester;
    delete_user_data(&state.db, state.storage.clone(), id, role).await?;
    repo::delete(&state.db, id).await?;

    // The account is gone either way; the extractor already rejects tokens
    // of missing users, so a failed revocation only loses an early expiry.
    if let Err(e) = state.revocations.revoke(auth.claims.jti, auth.claims.exp).await {
        warn!("Could not revoke session of deleted user {id}: {e}");
    }

    info!("User {id} deleted their account");
    Ok(account_deleted_response())
}

fn account_deleted_response() -> Response {
    (
        [(header::SET_COOKIE, cleared_cookie())],
        Json(MessageResponse::ok("Your account has been deleted")),
    )
        .into_response()
}

/// GET /api/v1/jobs/applied
pub async fn handle_applied_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ListResponse<AppliedJob>>, AppError> {
    auth.require(&[Role::User])?;
    let jobs = jobs::repo::applied_by(&state.db, auth.requester.id).await?;
    Ok(Json(ListResponse::new(jobs)))
}

/// GET /api/v1/jobs/published
pub async fn handle_published_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ListResponse<JobRow>>, AppError> {
    auth.require(&[Role::Employer, Role::Admin])?;
    let jobs = jobs::repo::published_by(&state.db, auth.requester.id).await?;
    Ok(Json(ListResponse::new(jobs)))
}

/// GET /api/v1/users
///
/// Admin listing with the full filter/sort/projection/pagination syntax.
pub async fn handle_list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<Value>>, AppError> {
    auth.require(&[Role::Admin])?;
    let descriptor = QueryDescriptor::build(&params, state.config.query_limits())?;
    let users = USERS.find::<UserRow>(&state.db, &descriptor).await?;
    Ok(Json(ListResponse::new(users)))
}

/// DELETE /api/v1/users/:id
pub async fn handle_delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    auth.require(&[Role::Admin])?;
    let user = load_user(&state, id).await?;

    delete_user_data(&state.db, state.storage.clone(), user.id, user.role).await?;
    repo::delete(&state.db, user.id).await?;

    info!("Admin {} removed user {}", auth.requester.id, user.id);
    Ok(Json(MessageResponse::ok("User is removed by admin")))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn test_account_deletion_clears_the_session_cookie() {
        let response = account_deleted_response();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap();
        assert!(cookie.starts_with("token=none;"));
    }
}
