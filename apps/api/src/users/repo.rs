use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::guard::Role;
use crate::db::is_unique_violation;
use crate::errors::AppError;
use crate::models::user::{UserCredentials, UserRow, USER_COLUMNS};

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub role: Role,
    pub password_hash: &'a str,
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRow>, AppError> {
    Ok(
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn credentials_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserCredentials>, AppError> {
    Ok(sqlx::query_as::<_, UserCredentials>(
        "SELECT id, role, password_hash FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?)
}

pub async fn credentials_by_id(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<UserCredentials>, AppError> {
    Ok(sqlx::query_as::<_, UserCredentials>(
        "SELECT id, role, password_hash FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?)
}

pub async fn create(pool: &PgPool, user: NewUser<'_>) -> Result<UserRow, AppError> {
    sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (id, name, email, role, password_hash) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(user.name)
    .bind(user.email)
    .bind(user.role)
    .bind(user.password_hash)
    .fetch_one(pool)
    .await
    .map_err(map_email_conflict)
}

pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    email: &str,
) -> Result<Option<UserRow>, AppError> {
    sqlx::query_as::<_, UserRow>(&format!(
        "UPDATE users SET name = $2, email = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(email)
    .fetch_optional(pool)
    .await
    .map_err(map_email_conflict)
}

pub async fn update_password(pool: &PgPool, id: Uuid, password_hash: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn map_email_conflict(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("A user with this email already exists".to_string())
    } else {
        AppError::Database(e)
    }
}
