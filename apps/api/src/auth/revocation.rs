use chrono::Utc;
use redis::Client as RedisClient;
use uuid::Uuid;

use crate::errors::AppError;

/// Redis-backed denylist of logged-out token ids. Entries expire together
/// with the token they revoke.
#[derive(Clone)]
pub struct RevocationList {
    client: RedisClient,
}

impl RevocationList {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    pub async fn revoke(&self, jti: Uuid, expires_at: i64) -> Result<(), AppError> {
        let ttl = expires_at - Utc::now().timestamp();
        if ttl <= 0 {
            return Ok(());
        }

        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)?;
        redis::cmd("SET")
            .arg(revocation_key(jti))
            .arg(1)
            .arg("EX")
            .arg(ttl)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(unavailable)?;
        tracing::debug!("Revoked token {jti} for {ttl}s");
        Ok(())
    }

    pub async fn is_revoked(&self, jti: Uuid) -> Result<bool, AppError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)?;
        redis::cmd("EXISTS")
            .arg(revocation_key(jti))
            .query_async::<_, bool>(&mut conn)
            .await
            .map_err(unavailable)
    }
}

fn revocation_key(jti: Uuid) -> String {
    format!("revoked_token:{jti}")
}

fn unavailable(e: redis::RedisError) -> AppError {
    AppError::UpstreamUnavailable(format!("redis: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revocation_key_is_namespaced() {
        let jti = Uuid::nil();
        assert_eq!(
            revocation_key(jti),
            "revoked_token:00000000-0000-0000-0000-000000000000"
        );
    }

    #[tokio::test]
    async fn test_already_expired_token_needs_no_entry() {
        // No server is contacted for tokens that are already past expiry.
        let client = RedisClient::open("redis://127.0.0.1:1/").unwrap();
        let list = RevocationList::new(client);
        let past = Utc::now().timestamp() - 10;
        assert!(list.revoke(Uuid::new_v4(), past).await.is_ok());
    }
}
