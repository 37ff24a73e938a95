mod auth;
mod config;
mod db;
mod errors;
mod geocoder;
mod jobs;
mod models;
mod query;
mod routes;
mod state;
mod storage;
mod users;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::revocation::RevocationList;
use crate::auth::token::TokenService;
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::geocoder::MapQuestGeocoder;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::S3Storage;

const RESUME_PREFIX: &str = "resumes";

#[tokio::main]
async fn main() -> Result<()> {
    // Fails fast on missing required env vars
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Jobs API v{}", env!("CARGO_PKG_VERSION"));

    // PostgreSQL
    let db = create_pool(&config.database_url).await?;
    run_migrations(&db).await?;

    // Redis (token revocation)
    let redis = redis::Client::open(config.redis_url.clone())?;
    let revocations = RevocationList::new(redis);
    info!("Redis client initialized");

    // S3 / MinIO (resumes)
    let s3 = build_s3_client(&config).await;
    let storage = S3Storage::new(s3, config.s3_bucket.clone(), RESUME_PREFIX);
    info!("S3 storage initialized (bucket: {})", config.s3_bucket);

    let geocoder =
        MapQuestGeocoder::new(config.geocoder_api_key.clone(), config.geocoder_url.clone())?;
    info!("Geocoder initialized ({})", config.geocoder_url);

    let tokens = TokenService::new(&config.jwt_secret, config.jwt_expires_hours);

    let state = AppState {
        db,
        tokens,
        revocations,
        geocoder: Arc::new(geocoder),
        storage: Arc::new(storage),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "jobs-api-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not virtual host.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
