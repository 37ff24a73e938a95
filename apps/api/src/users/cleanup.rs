use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::guard::Role;
use crate::errors::AppError;
use crate::jobs;
use crate::storage::{spawn_cleanup, FileStorage};

/// What a deleted account leaves behind in the jobs tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leftovers {
    /// Published jobs and the resumes submitted to them.
    PublishedJobs,
    /// The user's own applications and uploaded resumes.
    Applications,
}

fn leftovers(role: Role) -> Leftovers {
    match role {
        // Admins may publish jobs too.
        Role::Employer | Role::Admin => Leftovers::PublishedJobs,
        Role::User => Leftovers::Applications,
    }
}

/// Removes the data a user leaves behind before the account row is deleted.
///
/// Resume keys are collected before the row goes, since the schema cascades
/// would otherwise drop them silently. File deletion runs in the background
/// and never fails the request.
pub async fn delete_user_data(
    pool: &PgPool,
    storage: Arc<dyn FileStorage>,
    user_id: Uuid,
    role: Role,
) -> Result<(), AppError> {
    let resumes = match leftovers(role) {
        Leftovers::PublishedJobs => jobs::repo::delete_by_owner(pool, user_id).await?,
        Leftovers::Applications => jobs::repo::remove_applications_by(pool, user_id).await?,
    };

    info!(
        "Cleared data for {role} {user_id}; {} resumes queued for deletion",
        resumes.len()
    );
    spawn_cleanup(storage, resumes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publishing_roles_clear_their_jobs() {
        assert_eq!(leftovers(Role::Employer), Leftovers::PublishedJobs);
        assert_eq!(leftovers(Role::Admin), Leftovers::PublishedJobs);
    }

    #[test]
    fn test_applicants_clear_their_applications() {
        assert_eq!(leftovers(Role::User), Leftovers::Applications);
    }
}
