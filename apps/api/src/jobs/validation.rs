//! Input validation for job postings.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::job::{JobRow, EDUCATION_LEVELS, EXPERIENCE_LEVELS, INDUSTRIES, JOB_TYPES};

const MAX_TITLE_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 1000;
const DEFAULT_APPLICATION_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJobRequest {
    pub title: String,
    pub description: String,
    pub email: String,
    pub address: String,
    pub company: String,
    pub industry: String,
    pub job_type: String,
    pub min_education: String,
    #[serde(default = "default_positions")]
    pub positions: i32,
    pub experience: String,
    pub salary: i64,
    pub last_date: Option<DateTime<Utc>>,
}

fn default_positions() -> i32 {
    1
}

/// Partial update; absent fields keep their stored values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub company: Option<String>,
    pub industry: Option<String>,
    pub job_type: Option<String>,
    pub min_education: Option<String>,
    pub positions: Option<i32>,
    pub experience: Option<String>,
    pub salary: Option<i64>,
    pub last_date: Option<DateTime<Utc>>,
}

/// The editable fields of a job, validated as a whole before every write.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDraft {
    pub title: String,
    pub description: String,
    pub email: String,
    pub address: String,
    pub company: String,
    pub industry: String,
    pub job_type: String,
    pub min_education: String,
    pub positions: i32,
    pub experience: String,
    pub salary: i64,
    pub last_date: DateTime<Utc>,
}

impl JobDraft {
    pub fn from_request(req: NewJobRequest, now: DateTime<Utc>) -> Self {
        Self {
            title: req.title.trim().to_string(),
            description: req.description.trim().to_string(),
            email: req.email.trim().to_lowercase(),
            address: req.address.trim().to_string(),
            company: req.company.trim().to_string(),
            industry: req.industry,
            job_type: req.job_type,
            min_education: req.min_education,
            positions: req.positions,
            experience: req.experience,
            salary: req.salary,
            last_date: req
                .last_date
                .unwrap_or(now + Duration::days(DEFAULT_APPLICATION_WINDOW_DAYS)),
        }
    }

    pub fn from_row(job: &JobRow) -> Self {
        Self {
            title: job.title.clone(),
            description: job.description.clone(),
            email: job.email.clone(),
            address: job.address.clone(),
            company: job.company.clone(),
            industry: job.industry.clone(),
            job_type: job.job_type.clone(),
            min_education: job.min_education.clone(),
            positions: job.positions,
            experience: job.experience.clone(),
            salary: job.salary,
            last_date: job.last_date,
        }
    }

    pub fn apply(mut self, update: JobUpdateRequest) -> Self {
        if let Some(v) = update.title {
            self.title = v.trim().to_string();
        }
        if let Some(v) = update.description {
            self.description = v.trim().to_string();
        }
        if let Some(v) = update.email {
            self.email = v.trim().to_lowercase();
        }
        if let Some(v) = update.address {
            self.address = v.trim().to_string();
        }
        if let Some(v) = update.company {
            self.company = v.trim().to_string();
        }
        if let Some(v) = update.industry {
            self.industry = v;
        }
        if let Some(v) = update.job_type {
            self.job_type = v;
        }
        if let Some(v) = update.min_education {
            self.min_education = v;
        }
        if let Some(v) = update.positions {
            self.positions = v;
        }
        if let Some(v) = update.experience {
            self.experience = v;
        }
        if let Some(v) = update.salary {
            self.salary = v;
        }
        if let Some(v) = update.last_date {
            self.last_date = v;
        }
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        require_text("title", &self.title, MAX_TITLE_LEN)?;
        require_text("description", &self.description, MAX_DESCRIPTION_LEN)?;
        require_text("address", &self.address, usize::MAX)?;
        require_text("company", &self.company, usize::MAX)?;
        validate_email(&self.email)?;
        require_one_of("industry", &self.industry, INDUSTRIES)?;
        require_one_of("jobType", &self.job_type, JOB_TYPES)?;
        require_one_of("minEducation", &self.min_education, EDUCATION_LEVELS)?;
        require_one_of("experience", &self.experience, EXPERIENCE_LEVELS)?;

        if self.positions < 1 {
            return Err(AppError::Validation(
                "positions must be at least 1".to_string(),
            ));
        }
        if self.salary < 0 {
            return Err(AppError::Validation(
                "salary cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Slugs that would collide with static routes under `/api/v1/job/:id/`.
const RESERVED_SLUGS: &[&str] = &["apply"];

/// URL slug: lowercase alphanumerics separated by single dashes.
///
/// Reserved or empty slugs get a `job` suffix so every job stays reachable
/// by id and slug.
pub fn slugify(title: &str) -> String {
    let slug = slug_words(title);
    if slug.is_empty() {
        "job".to_string()
    } else if RESERVED_SLUGS.contains(&slug.as_str()) {
        format!("{slug}-job")
    } else {
        slug
    }
}

fn slug_words(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "'{email}' is not a valid email address"
        )))
    }
}

fn require_text(field: &str, value: &str, max_len: usize) -> Result<(), AppError> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    if value.chars().count() > max_len {
        return Err(AppError::Validation(format!(
            "{field} cannot exceed {max_len} characters"
        )));
    }
    Ok(())
}

fn require_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), AppError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{field} must be one of: {}",
            allowed.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> NewJobRequest {
        NewJobRequest {
            title: "  Node Developer ".to_string(),
            description: "Build and run APIs".to_string(),
            email: "HR@Acme.com".to_string(),
            address: "651 Rr 2, Oquawka, IL, 61469".to_string(),
            company: "Acme".to_string(),
            industry: "Information Technology".to_string(),
            job_type: "Permanent".to_string(),
            min_education: "Bachelors".to_string(),
            positions: 2,
            experience: "2 Year - 5 Years".to_string(),
            salary: 65000,
            last_date: None,
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Node Developer"), "node-developer");
        assert_eq!(slugify("  C++ / Rust  Engineer!! "), "c-rust-engineer");
        assert_eq!(slugify("---"), "job");
    }

    #[test]
    fn test_slug_never_collides_with_the_apply_route() {
        assert_eq!(slugify("Apply"), "apply-job");
        assert_eq!(slugify(" APPLY! "), "apply-job");
        assert_eq!(slugify("Apply Now"), "apply-now");
    }

    #[test]
    fn test_draft_normalizes_and_defaults_last_date() {
        let now = Utc::now();
        let draft = JobDraft::from_request(request(), now);
        assert_eq!(draft.title, "Node Developer");
        assert_eq!(draft.email, "hr@acme.com");
        assert_eq!(draft.last_date, now + Duration::days(7));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_enum_values() {
        let mut req = request();
        req.job_type = "Freelance".to_string();
        let draft = JobDraft::from_request(req, Utc::now());
        match draft.validate() {
            Err(AppError::Validation(msg)) => assert!(msg.contains("jobType")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_overlong_title_and_bad_numbers() {
        let mut req = request();
        req.title = "x".repeat(101);
        assert!(JobDraft::from_request(req, Utc::now()).validate().is_err());

        let mut req = request();
        req.positions = 0;
        assert!(JobDraft::from_request(req, Utc::now()).validate().is_err());

        let mut req = request();
        req.salary = -1;
        assert!(JobDraft::from_request(req, Utc::now()).validate().is_err());
    }

    #[test]
    fn test_apply_update_overrides_only_present_fields() {
        let draft = JobDraft::from_request(request(), Utc::now());
        let updated = draft.clone().apply(JobUpdateRequest {
            salary: Some(80000),
            title: Some("Senior Node Developer".to_string()),
            ..Default::default()
        });
        assert_eq!(updated.salary, 80000);
        assert_eq!(updated.title, "Senior Node Developer");
        assert_eq!(updated.company, draft.company);
        assert_eq!(updated.address, draft.address);
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email("a@b.co").is_ok());
        for bad in ["", "ab.co", "a@b", "@b.co", "a@.co", "a b@c.io", "a@b@c.io"] {
            assert!(validate_email(bad).is_err(), "{bad} should be invalid");
        }
    }
}
