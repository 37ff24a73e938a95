//! File storage for uploaded resumes.

pub mod resume;

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::{info, warn};

use crate::errors::AppError;

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Stores `bytes` under `name` and returns the object key.
    async fn store(&self, bytes: Bytes, name: &str, content_type: &str) -> Result<String, AppError>;

    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct S3Storage {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    pub fn new(client: aws_sdk_s3::Client, bucket: String, prefix: &str) -> Self {
        Self {
            client,
            bucket,
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    fn key_for(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

#[async_trait]
impl FileStorage for S3Storage {
    async fn store(&self, bytes: Bytes, name: &str, content_type: &str) -> Result<String, AppError> {
        let key = self.key_for(name);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload failed: {e}")))?;

        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(key)
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("S3 delete failed: {e}")))?;
        Ok(())
    }
}

/// Deletes every key, logging failures instead of returning them.
pub async fn delete_best_effort(storage: &dyn FileStorage, keys: &[String]) -> usize {
    let mut deleted = 0;
    for key in keys {
        match storage.delete(key).await {
            Ok(()) => deleted += 1,
            Err(e) => warn!("Could not delete stored file {key}: {e}"),
        }
    }
    deleted
}

/// Runs [`delete_best_effort`] in the background so responses never wait on it.
pub fn spawn_cleanup(storage: Arc<dyn FileStorage>, keys: Vec<String>) {
    if keys.is_empty() {
        return;
    }
    tokio::spawn(async move {
        let deleted = delete_best_effort(storage.as_ref(), &keys).await;
        info!("Removed {deleted}/{} stored resumes", keys.len());
    });
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    /// In-memory storage; keys listed in `failing` refuse deletion.
    #[derive(Default)]
    pub struct MemoryStorage {
        pub objects: Mutex<HashSet<String>>,
        pub failing: HashSet<String>,
    }

    #[async_trait]
    impl FileStorage for MemoryStorage {
        async fn store(&self, _bytes: Bytes, name: &str, _content_type: &str) -> Result<String, AppError> {
            let key = format!("resumes/{name}");
            self.objects.lock().unwrap().insert(key.clone());
            Ok(key)
        }

        async fn delete(&self, key: &str) -> Result<(), AppError> {
            if self.failing.contains(key) {
                return Err(AppError::Storage(format!("cannot delete {key}")));
            }
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryStorage;
    use super::*;

    #[tokio::test]
    async fn test_best_effort_delete_continues_past_failures() {
        let storage = MemoryStorage {
            failing: ["resumes/b.pdf".to_string()].into_iter().collect(),
            ..Default::default()
        };
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            storage.store(Bytes::new(), name, "application/pdf").await.unwrap();
        }

        let keys = vec![
            "resumes/a.pdf".to_string(),
            "resumes/b.pdf".to_string(),
            "resumes/c.pdf".to_string(),
        ];
        let deleted = delete_best_effort(&storage, &keys).await;

        assert_eq!(deleted, 2);
        let remaining = storage.objects.lock().unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining.contains("resumes/b.pdf"));
    }
}
