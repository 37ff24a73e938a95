//! Axum route handlers for the Jobs API.

use std::collections::HashMap;

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::guard::ensure_can_mutate;
use crate::auth::{AuthUser, Role};
use crate::errors::AppError;
use crate::geocoder::GeoLocation;
use crate::jobs::repo;
use crate::jobs::validation::{slugify, JobDraft, JobUpdateRequest, NewJobRequest};
use crate::models::job::{JobRow, TopicStats, JOBS};
use crate::models::response::{DataResponse, ListResponse, MessageResponse};
use crate::query::{to_geo_filter, QueryDescriptor};
use crate::state::AppState;
use crate::storage::resume::{resume_object_name, validate_resume};
use crate::storage::{spawn_cleanup, FileStorage};
use crate::users;

const RESUME_FIELD: &str = "file";
const ALREADY_APPLIED: &str = "You have already applied for this job.";

async fn load_job(state: &AppState, id: Uuid) -> Result<JobRow, AppError> {
    repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))
}

async fn geocode_address(state: &AppState, address: &str) -> Result<GeoLocation, AppError> {
    state
        .geocoder
        .geocode(address)
        .await?
        .ok_or_else(|| AppError::Validation(format!("Address '{address}' could not be located")))
}

/// GET /api/v1/jobs
///
/// Filterable listing, e.g. `?jobType=Permanent&salary[gte]=50000&sort=-salary&page=2`.
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse<Value>>, AppError> {
    let descriptor = QueryDescriptor::build(&params, state.config.query_limits())?;
    let jobs = JOBS.find::<JobRow>(&state.db, &descriptor).await?;
    Ok(Json(ListResponse::new(jobs)))
}

/// GET /api/v1/job/:id/:slug
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path((id, slug)): Path<(Uuid, String)>,
) -> Result<Json<DataResponse<JobRow>>, AppError> {
    let job = repo::find_by_id_and_slug(&state.db, id, &slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;
    Ok(Json(DataResponse::new(job)))
}

/// POST /api/v1/jobs/new
pub async fn handle_create_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<NewJobRequest>,
) -> Result<Json<DataResponse<JobRow>>, AppError> {
    auth.require(&[Role::Employer, Role::Admin])?;

    let draft = JobDraft::from_request(req, Utc::now());
    draft.validate()?;
    let location = geocode_address(&state, &draft.address).await?;

    let job = repo::create(
        &state.db,
        auth.requester.id,
        &draft,
        &slugify(&draft.title),
        &location,
    )
    .await?;

    info!("Job {} created by {}", job.id, auth.requester.id);
    Ok(Json(DataResponse::with_message("Job Created", job)))
}

/// GET /api/v1/jobs/:zipcode/:distance
///
/// Jobs within `distance` miles of the zipcode's coordinates.
pub async fn handle_jobs_in_radius(
    State(state): State<AppState>,
    Path((zipcode, distance)): Path<(String, String)>,
) -> Result<Json<ListResponse<JobRow>>, AppError> {
    let distance = parse_distance(&distance)?;
    let center = state
        .geocoder
        .geocode(&zipcode)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No location found for zipcode {zipcode}")))?;

    let filter = to_geo_filter(center.latitude, center.longitude, distance)?;
    let jobs = repo::within_radius(&state.db, &filter).await?;
    Ok(Json(ListResponse::new(jobs)))
}

fn parse_distance(raw: &str) -> Result<f64, AppError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| AppError::InvalidQuery(format!("distance must be a number of miles, got '{raw}'")))
}

/// PUT /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(update): Json<JobUpdateRequest>,
) -> Result<Json<DataResponse<JobRow>>, AppError> {
    auth.require(&[Role::Employer, Role::Admin])?;
    let job = load_job(&state, id).await?;
    ensure_can_mutate(&auth.requester, &job, "job")?;

    let draft = JobDraft::from_row(&job).apply(update);
    draft.validate()?;

    let location = if draft.address == job.address {
        GeoLocation {
            latitude: job.latitude,
            longitude: job.longitude,
            formatted_address: job.formatted_address.clone(),
            city: job.city.clone(),
            state: job.state.clone(),
            zipcode: job.zipcode.clone(),
            country: job.country.clone(),
        }
    } else {
        geocode_address(&state, &draft.address).await?
    };

    let updated = repo::update(&state.db, id, &draft, &slugify(&draft.title), &location)
        .await?
        .ok_or_else(|| AppError::NotFound("Job not found".to_string()))?;
    Ok(Json(DataResponse::with_message("Job is updated", updated)))
}

/// DELETE /api/v1/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    auth.require(&[Role::Employer, Role::Admin])?;
    let job = load_job(&state, id).await?;
    ensure_can_mutate(&auth.requester, &job, "job")?;

    let resumes = repo::delete(&state.db, id).await?;
    spawn_cleanup(state.storage.clone(), resumes);

    info!("Job {id} deleted by {}", auth.requester.id);
    Ok(Json(MessageResponse::ok("Job deleted successfully")))
}

/// GET /api/v1/stats/:topic
pub async fn handle_topic_stats(
    State(state): State<AppState>,
    Path(topic): Path<String>,
) -> Result<Json<Value>, AppError> {
    let stats: Vec<TopicStats> = repo::topic_stats(&state.db, &topic).await?;
    if stats.is_empty() {
        let body = MessageResponse::failed(format!("No stats found for - {topic}"));
        return Ok(Json(serde_json::to_value(body).map_err(anyhow::Error::from)?));
    }
    Ok(Json(
        serde_json::to_value(DataResponse::new(stats)).map_err(anyhow::Error::from)?,
    ))
}

/// PUT /api/v1/job/:id/apply
///
/// Multipart upload with the resume in the `file` field.
pub async fn handle_apply(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<DataResponse<String>>, AppError> {
    auth.require(&[Role::User])?;
    let job = load_job(&state, id).await?;

    if job.last_date < Utc::now() {
        return Err(AppError::Validation(
            "You can not apply to this job. Date is over.".to_string(),
        ));
    }
    if repo::has_applied(&state.db, job.id, auth.requester.id).await? {
        return Err(AppError::Validation(ALREADY_APPLIED.to_string()));
    }

    let (file_name, bytes) = read_upload(&mut multipart)
        .await?
        .ok_or_else(|| AppError::Validation("Please upload file.".to_string()))?;
    let format = validate_resume(&file_name, bytes.len(), state.config.max_file_size)?;

    let applicant = users::repo::find_by_id(&state.db, auth.requester.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;
    let object_name = resume_object_name(&applicant.name, job.id, applicant.id, format);

    let key = state
        .storage
        .store(bytes, &object_name, format.content_type)
        .await?;

    let recorded = repo::add_application(&state.db, job.id, applicant.id, &key).await;
    settle_upload(state.storage.as_ref(), &key, recorded).await?;

    info!("User {} applied to job {}", applicant.id, job.id);
    Ok(Json(DataResponse::with_message(
        "Applied to Job successfully.",
        key,
    )))
}

/// Removes the stored resume when its application could not be recorded.
///
/// A duplicate application means a concurrent request for the same applicant
/// and job already committed a row pointing at `key`, so the object stays.
async fn settle_upload(
    storage: &dyn FileStorage,
    key: &str,
    recorded: Result<bool, AppError>,
) -> Result<(), AppError> {
    match recorded {
        Ok(true) => Ok(()),
        Ok(false) => Err(AppError::Validation(ALREADY_APPLIED.to_string())),
        Err(e) => {
            if let Err(cleanup) = storage.delete(key).await {
                warn!("Could not remove orphaned resume {key}: {cleanup}");
            }
            Err(e)
        }
    }
}

/// Returns the file name and content of the resume field, if present.
async fn read_upload(multipart: &mut Multipart) -> Result<Option<(String, Bytes)>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        if field.name() != Some(RESUME_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?;
        return Ok(Some((file_name, bytes)));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::MemoryStorage;

    async fn stored(storage: &MemoryStorage, name: &str) -> String {
        storage
            .store(Bytes::from_static(b"%PDF"), name, "application/pdf")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_recorded_application_keeps_its_resume() {
        let storage = MemoryStorage::default();
        let key = stored(&storage, "a.pdf").await;
        settle_upload(&storage, &key, Ok(true)).await.unwrap();
        assert!(storage.objects.lock().unwrap().contains(&key));
    }

    #[tokio::test]
    async fn test_duplicate_application_leaves_the_committed_resume() {
        let storage = MemoryStorage::default();
        let key = stored(&storage, "a.pdf").await;
        match settle_upload(&storage, &key, Ok(false)).await {
            Err(AppError::Validation(msg)) => assert_eq!(msg, ALREADY_APPLIED),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(storage.objects.lock().unwrap().contains(&key));
    }

    #[tokio::test]
    async fn test_failed_insert_removes_the_orphaned_resume() {
        let storage = MemoryStorage::default();
        let key = stored(&storage, "a.pdf").await;
        let failure = Err(AppError::Database(sqlx::Error::PoolTimedOut));
        assert!(matches!(
            settle_upload(&storage, &key, failure).await,
            Err(AppError::Database(_))
        ));
        assert!(!storage.objects.lock().unwrap().contains(&key));
    }

    #[test]
    fn test_parse_distance() {
        assert_eq!(parse_distance("25").unwrap(), 25.0);
        assert_eq!(parse_distance("2.5").unwrap(), 2.5);
        for raw in ["ten", "", "10mi"] {
            assert!(
                matches!(parse_distance(raw), Err(AppError::InvalidQuery(_))),
                "{raw:?} should be rejected"
            );
        }
    }
}
