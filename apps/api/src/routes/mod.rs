pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};

use crate::auth::handlers as auth;
use crate::jobs::handlers as jobs;
use crate::state::AppState;
use crate::users::handlers as users;

/// Multipart framing allowance on top of the resume size limit.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + UPLOAD_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/register", post(auth::handle_register))
        .route("/api/v1/login", post(auth::handle_login))
        .route("/api/v1/logout", get(auth::handle_logout))
        // Jobs
        .route("/api/v1/jobs", get(jobs::handle_list_jobs))
        .route("/api/v1/jobs/new", post(jobs::handle_create_job))
        .route("/api/v1/jobs/applied", get(users::handle_applied_jobs))
        .route("/api/v1/jobs/published", get(users::handle_published_jobs))
        .route(
            "/api/v1/jobs/:id",
            put(jobs::handle_update_job).delete(jobs::handle_delete_job),
        )
        // `:id` holds the zipcode here; one parameter name per path segment.
        .route("/api/v1/jobs/:id/:distance", get(jobs::handle_jobs_in_radius))
        .route("/api/v1/job/:id/apply", put(jobs::handle_apply))
        .route("/api/v1/job/:id/:slug", get(jobs::handle_get_job))
        .route("/api/v1/stats/:topic", get(jobs::handle_topic_stats))
        // Current user
        .route("/api/v1/me", get(users::handle_get_profile))
        .route("/api/v1/me/update", put(users::handle_update_profile))
        .route("/api/v1/me/delete", delete(users::handle_delete_me))
        .route("/api/v1/password/update", put(users::handle_update_password))
        // Admin
        .route("/api/v1/users", get(users::handle_list_users))
        .route("/api/v1/users/:id", delete(users::handle_delete_user))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
