use anyhow::{ensure, Context, Result};

use crate::query::QueryLimits;

const DEFAULT_GEOCODER_URL: &str = "https://www.mapquestapi.com";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub jwt_secret: String,
    pub jwt_expires_hours: i64,
    pub geocoder_api_key: String,
    pub geocoder_url: String,
    /// Upper bound for uploaded resumes, in bytes.
    pub max_file_size: usize,
    pub query_max_limit: u32,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            jwt_secret: require_env("JWT_SECRET")?,
            jwt_expires_hours: parse_env("JWT_EXPIRES_HOURS", 168)?,
            geocoder_api_key: require_env("GEOCODER_API_KEY")?,
            geocoder_url: std::env::var("GEOCODER_URL")
                .unwrap_or_else(|_| DEFAULT_GEOCODER_URL.to_string()),
            max_file_size: parse_env("MAX_FILE_SIZE", 2_000_000)?,
            query_max_limit: parse_env("QUERY_MAX_LIMIT", QueryLimits::default().max_limit)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.query_max_limit >= 1,
            "QUERY_MAX_LIMIT must be at least 1, got {}",
            self.query_max_limit
        );
        ensure!(self.max_file_size >= 1, "MAX_FILE_SIZE must be at least 1 byte");
        Ok(())
    }

    /// Listing limits; the default page size never exceeds the maximum.
    pub fn query_limits(&self) -> QueryLimits {
        let defaults = QueryLimits::default();
        QueryLimits {
            default_limit: defaults.default_limit.min(self.query_max_limit),
            max_limit: self.query_max_limit,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Local-only settings; nothing behind these URLs is expected to answer.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost:1/jobs".to_string(),
            redis_url: "redis://127.0.0.1:1/".to_string(),
            s3_bucket: "resumes".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            aws_access_key_id: "key".to_string(),
            aws_secret_access_key: "secret".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_expires_hours: 1,
            geocoder_api_key: "key".to_string(),
            geocoder_url: "http://localhost:1".to_string(),
            max_file_size: 2_000_000,
            query_max_limit: 100,
            port: 0,
            rust_log: "info".to_string(),
        }
    }
}
