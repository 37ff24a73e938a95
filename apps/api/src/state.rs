use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::revocation::RevocationList;
use crate::auth::token::TokenService;
use crate::config::Config;
use crate::geocoder::Geocoder;
use crate::storage::FileStorage;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub tokens: TokenService,
    pub revocations: RevocationList,
    /// Pluggable geocoding backend. Default: MapQuest.
    pub geocoder: Arc<dyn Geocoder>,
    /// Resume storage. Default: S3 / MinIO.
    pub storage: Arc<dyn FileStorage>,
    pub config: Config,
}
