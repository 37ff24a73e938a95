use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::guard::Owned;
use crate::query::{Collection, ColumnKind, FieldSpec};

pub const INDUSTRIES: &[&str] = &[
    "Business",
    "Information Technology",
    "Banking",
    "Education/Training",
    "Telecommunication",
    "Others",
];

pub const JOB_TYPES: &[&str] = &["Permanent", "Temporary", "Internship"];

pub const EDUCATION_LEVELS: &[&str] = &["Bachelors", "Masters", "Phd"];

pub const EXPERIENCE_LEVELS: &[&str] = &[
    "No Experience",
    "1 Year - 2 Years",
    "2 Year - 5 Years",
    "5 Years+",
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobRow {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub email: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
    pub company: String,
    pub industry: String,
    pub job_type: String,
    pub min_education: String,
    pub positions: i32,
    pub experience: String,
    pub salary: i64,
    pub posting_date: DateTime<Utc>,
    pub last_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "user")]
    pub user_id: Uuid,
}

impl Owned for JobRow {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

/// Title and posting date of a published job, shown on the owner's profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: Uuid,
    pub title: String,
    pub posting_date: DateTime<Utc>,
}

/// A job together with the requesting applicant's submission.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AppliedJob {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub job: JobRow,
    pub resume: String,
    pub applied_at: DateTime<Utc>,
}

/// Salary/position aggregates for one experience bucket.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TopicStats {
    pub experience: String,
    pub total_jobs: i64,
    pub avg_position: f64,
    pub avg_salary: f64,
    pub min_salary: i64,
    pub max_salary: i64,
}

pub static JOBS: Collection = Collection {
    table: "jobs",
    select: "*",
    fields: &[
        FieldSpec {
            name: "id",
            column: "id",
            kind: ColumnKind::Uuid,
        },
        FieldSpec {
            name: "title",
            column: "title",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "slug",
            column: "slug",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "description",
            column: "description",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "email",
            column: "email",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "address",
            column: "address",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "latitude",
            column: "latitude",
            kind: ColumnKind::Float,
        },
        FieldSpec {
            name: "longitude",
            column: "longitude",
            kind: ColumnKind::Float,
        },
        FieldSpec {
            name: "formattedAddress",
            column: "formatted_address",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "city",
            column: "city",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "state",
            column: "state",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "zipcode",
            column: "zipcode",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "country",
            column: "country",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "company",
            column: "company",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "industry",
            column: "industry",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "jobType",
            column: "job_type",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "minEducation",
            column: "min_education",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "positions",
            column: "positions",
            kind: ColumnKind::Integer,
        },
        FieldSpec {
            name: "experience",
            column: "experience",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "salary",
            column: "salary",
            kind: ColumnKind::Integer,
        },
        FieldSpec {
            name: "postingDate",
            column: "posting_date",
            kind: ColumnKind::Timestamp,
        },
        FieldSpec {
            name: "lastDate",
            column: "last_date",
            kind: ColumnKind::Timestamp,
        },
        FieldSpec {
            name: "createdAt",
            column: "created_at",
            kind: ColumnKind::Timestamp,
        },
        FieldSpec {
            name: "user",
            column: "user_id",
            kind: ColumnKind::Uuid,
        },
    ],
    text_columns: &["title", "description"],
};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::user::USERS;
    use crate::query::{QueryDescriptor, QueryLimits};

    #[test]
    fn test_jobs_text_vector_matches_index_expression() {
        assert_eq!(
            JOBS.text_vector_sql(),
            "to_tsvector('english', title || ' ' || description)"
        );
    }

    #[test]
    fn test_every_collection_supports_default_sort() {
        let d = QueryDescriptor::build(&HashMap::new(), QueryLimits::default()).unwrap();
        assert!(JOBS.select_query(&d).is_ok());
        assert!(USERS.select_query(&d).is_ok());
    }

    #[test]
    fn test_job_filters_resolve_to_columns() {
        let params: HashMap<String, String> = [
            ("jobType", "Permanent"),
            ("salary[gt]", "40000"),
            ("user", "6f1f3a8e-6a53-4b7e-9d0e-6f0f2c7d1a11"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let d = QueryDescriptor::build(&params, QueryLimits::default()).unwrap();
        let qb = JOBS.select_query(&d).unwrap();
        assert!(qb
            .sql()
            .starts_with("SELECT * FROM jobs WHERE job_type = $1 AND salary > $2 AND user_id = $3"));
    }

    #[test]
    fn test_user_role_filter_compares_as_text() {
        let params: HashMap<String, String> =
            [("role".to_string(), "employer".to_string())].into_iter().collect();
        let d = QueryDescriptor::build(&params, QueryLimits::default()).unwrap();
        let qb = USERS.select_query(&d).unwrap();
        assert!(qb
            .sql()
            .starts_with("SELECT id, name, email, role, created_at FROM users WHERE role::text = $1"));
    }

    #[test]
    fn test_job_serializes_owner_as_user() {
        let now = Utc::now();
        let job = JobRow {
            id: Uuid::new_v4(),
            title: "Node Developer".into(),
            slug: "node-developer".into(),
            description: "Build APIs".into(),
            email: "hr@example.com".into(),
            address: "1 Main St".into(),
            latitude: 1.0,
            longitude: 2.0,
            formatted_address: "1 Main St, Boston".into(),
            city: "Boston".into(),
            state: "MA".into(),
            zipcode: "02108".into(),
            country: "US".into(),
            company: "Acme".into(),
            industry: "Business".into(),
            job_type: "Permanent".into(),
            min_education: "Bachelors".into(),
            positions: 2,
            experience: "No Experience".into(),
            salary: 50000,
            posting_date: now,
            last_date: now,
            created_at: now,
            user_id: Uuid::nil(),
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["user"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(value["jobType"], "Permanent");
        assert!(value.get("userId").is_none());
    }
}
