use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::errors::AppError;
use crate::geocoder::GeoLocation;
use crate::jobs::validation::JobDraft;
use crate::models::job::{AppliedJob, JobRow, JobSummary, TopicStats, JOBS};
use crate::query::SpatialFilter;

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<JobRow>, AppError> {
    Ok(sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

pub async fn find_by_id_and_slug(
    pool: &PgPool,
    id: Uuid,
    slug: &str,
) -> Result<Option<JobRow>, AppError> {
    Ok(
        sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1 AND slug = $2")
            .bind(id)
            .bind(slug)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn create(
    pool: &PgPool,
    owner: Uuid,
    draft: &JobDraft,
    slug: &str,
    location: &GeoLocation,
) -> Result<JobRow, AppError> {
    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO jobs
            (id, title, slug, description, email, address, latitude, longitude,
             formatted_address, city, state, zipcode, country, company, industry,
             job_type, min_education, positions, experience, salary, last_date, user_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&draft.title)
    .bind(slug)
    .bind(&draft.description)
    .bind(&draft.email)
    .bind(&draft.address)
    .bind(location.latitude)
    .bind(location.longitude)
    .bind(&location.formatted_address)
    .bind(&location.city)
    .bind(&location.state)
    .bind(&location.zipcode)
    .bind(&location.country)
    .bind(&draft.company)
    .bind(&draft.industry)
    .bind(&draft.job_type)
    .bind(&draft.min_education)
    .bind(draft.positions)
    .bind(&draft.experience)
    .bind(draft.salary)
    .bind(draft.last_date)
    .bind(owner)
    .fetch_one(pool)
    .await?)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    draft: &JobDraft,
    slug: &str,
    location: &GeoLocation,
) -> Result<Option<JobRow>, AppError> {
    Ok(sqlx::query_as::<_, JobRow>(
        r#"
        UPDATE jobs SET
            title = $2, slug = $3, description = $4, email = $5, address = $6,
            latitude = $7, longitude = $8, formatted_address = $9, city = $10,
            state = $11, zipcode = $12, country = $13, company = $14, industry = $15,
            job_type = $16, min_education = $17, positions = $18, experience = $19,
            salary = $20, last_date = $21
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&draft.title)
    .bind(slug)
    .bind(&draft.description)
    .bind(&draft.email)
    .bind(&draft.address)
    .bind(location.latitude)
    .bind(location.longitude)
    .bind(&location.formatted_address)
    .bind(&location.city)
    .bind(&location.state)
    .bind(&location.zipcode)
    .bind(&location.country)
    .bind(&draft.company)
    .bind(&draft.industry)
    .bind(&draft.job_type)
    .bind(&draft.min_education)
    .bind(draft.positions)
    .bind(&draft.experience)
    .bind(draft.salary)
    .bind(draft.last_date)
    .fetch_optional(pool)
    .await?)
}

/// Deletes a job and returns the resume keys of its applicants.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Vec<String>, AppError> {
    let mut tx = pool.begin().await?;
    let resumes: Vec<String> =
        sqlx::query_scalar("SELECT resume FROM job_applications WHERE job_id = $1")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
    sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(resumes)
}

/// Deletes every job owned by `owner` and returns their applicants' resume keys.
pub async fn delete_by_owner(pool: &PgPool, owner: Uuid) -> Result<Vec<String>, AppError> {
    let mut tx = pool.begin().await?;
    let resumes: Vec<String> = sqlx::query_scalar(
        "SELECT a.resume FROM job_applications a JOIN jobs j ON j.id = a.job_id WHERE j.user_id = $1",
    )
    .bind(owner)
    .fetch_all(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM jobs WHERE user_id = $1")
        .bind(owner)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(resumes)
}

pub async fn within_radius(pool: &PgPool, filter: &SpatialFilter) -> Result<Vec<JobRow>, AppError> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM jobs WHERE ");
    filter.push_predicate(&mut qb, "latitude", "longitude");
    qb.push(" ORDER BY created_at DESC");
    let mut jobs = qb.build_query_as::<JobRow>().fetch_all(pool).await?;
    // Nearest first; the stable sort keeps newest-first among equal distances.
    jobs.sort_by(|a, b| {
        filter
            .angular_distance(a.latitude, a.longitude)
            .total_cmp(&filter.angular_distance(b.latitude, b.longitude))
    });
    Ok(jobs)
}

pub async fn topic_stats(pool: &PgPool, topic: &str) -> Result<Vec<TopicStats>, AppError> {
    let sql = format!(
        r#"
        SELECT upper(experience) AS experience,
               COUNT(*) AS total_jobs,
               AVG(positions)::float8 AS avg_position,
               AVG(salary)::float8 AS avg_salary,
               MIN(salary) AS min_salary,
               MAX(salary) AS max_salary
        FROM jobs
        WHERE {} @@ phraseto_tsquery('english', $1)
        GROUP BY upper(experience)
        ORDER BY experience
        "#,
        JOBS.text_vector_sql()
    );
    Ok(sqlx::query_as::<_, TopicStats>(&sql)
        .bind(topic)
        .fetch_all(pool)
        .await?)
}

pub async fn published_by(pool: &PgPool, owner: Uuid) -> Result<Vec<JobRow>, AppError> {
    Ok(
        sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(owner)
            .fetch_all(pool)
            .await?,
    )
}

pub async fn summaries_by(pool: &PgPool, owner: Uuid) -> Result<Vec<JobSummary>, AppError> {
    Ok(sqlx::query_as::<_, JobSummary>(
        "SELECT id, title, posting_date FROM jobs WHERE user_id = $1 ORDER BY posting_date DESC",
    )
    .bind(owner)
    .fetch_all(pool)
    .await?)
}

pub async fn applied_by(pool: &PgPool, applicant: Uuid) -> Result<Vec<AppliedJob>, AppError> {
    Ok(sqlx::query_as::<_, AppliedJob>(
        r#"
        SELECT j.*, a.resume, a.applied_at
        FROM jobs j
        JOIN job_applications a ON a.job_id = j.id
        WHERE a.user_id = $1
        ORDER BY a.applied_at DESC
        "#,
    )
    .bind(applicant)
    .fetch_all(pool)
    .await?)
}

pub async fn has_applied(pool: &PgPool, job_id: Uuid, applicant: Uuid) -> Result<bool, AppError> {
    Ok(sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM job_applications WHERE job_id = $1 AND user_id = $2)",
    )
    .bind(job_id)
    .bind(applicant)
    .fetch_one(pool)
    .await?)
}

/// Records an application. Returns `false` when the applicant already has
/// one for this job.
pub async fn add_application(
    pool: &PgPool,
    job_id: Uuid,
    applicant: Uuid,
    resume: &str,
) -> Result<bool, AppError> {
    let inserted = sqlx::query(
        "INSERT INTO job_applications (job_id, user_id, resume) VALUES ($1, $2, $3)",
    )
    .bind(job_id)
    .bind(applicant)
    .bind(resume)
    .execute(pool)
    .await;

    match inserted {
        Ok(_) => Ok(true),
        Err(e) if crate::db::is_unique_violation(&e) => Ok(false),
        Err(e) => Err(AppError::Database(e)),
    }
}

/// Withdraws every application by `applicant` and returns the resume keys.
pub async fn remove_applications_by(
    pool: &PgPool,
    applicant: Uuid,
) -> Result<Vec<String>, AppError> {
    Ok(
        sqlx::query_scalar::<_, String>(
            "DELETE FROM job_applications WHERE user_id = $1 RETURNING resume",
        )
            .bind(applicant)
            .fetch_all(pool)
            .await?,
    )
}
