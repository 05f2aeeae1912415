use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::Object;
use aws_sdk_s3::Client as S3Client;
use chrono::DateTime;
use mixa_publish_core::{ObjectStore, PublishError, RemoteObject};
use tracing::{debug, instrument, warn};

/// Maximum retries for transient errors (429 / 5xx).
const MAX_RETRIES: u32 = 5;
/// Base delay for exponential backoff.
const BASE_DELAY_MS: u64 = 200;

/// Object store backed by an S3 bucket.
///
/// Layout:
/// ```text
/// {bucket}/
///   {subdomain}/
///     {relative key}     # one object per published file
/// ```
#[derive(Clone)]
pub struct S3ObjectStore {
    s3_client: S3Client,
    bucket_name: String,
}

impl S3ObjectStore {
    pub fn new(s3_client: S3Client, bucket_name: impl Into<String>) -> Self {
        Self {
            s3_client,
            bucket_name: bucket_name.into(),
        }
    }

    /// Sleep with exponential backoff + jitter.
    async fn backoff_sleep(attempt: u32) {
        let base = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
        let jitter = Duration::from_millis(rand_jitter());
        tokio::time::sleep(base + jitter).await;
    }

    /// Check if an S3 error is retryable (429, 5xx, timeouts and dispatch failures).
    fn is_retryable_s3_error<E>(err: &SdkError<E>) -> bool {
        match err {
            SdkError::ServiceError(e) => is_retryable_status(e.raw().status().as_u16()),
            SdkError::ResponseError(e) => is_retryable_status(e.raw().status().as_u16()),
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => true,
            _ => false,
        }
    }

    /// Run `request` until it succeeds, fails permanently or retries run out.
    async fn with_retry<T, E, F, Fut>(
        op: &str,
        resource: &str,
        mut request: F,
    ) -> Result<T, PublishError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SdkError<E>>>,
        E: std::error::Error + 'static,
    {
        let mut attempt = 0;
        loop {
            match request().await {
                Ok(output) => return Ok(output),
                Err(e) if Self::is_retryable_s3_error(&e) && attempt < MAX_RETRIES => {
                    warn!(attempt, resource, "S3 {} retryable error, retrying", op);
                    Self::backoff_sleep(attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(PublishError::Transport(format!(
                        "S3 {} error for {}: {}",
                        op,
                        resource,
                        DisplayErrorContext(&e)
                    )));
                }
            }
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..=504).contains(&status)
}

/// Simple jitter: random-ish value 0..50ms using timestamp nanos.
fn rand_jitter() -> u64 {
    use std::time::SystemTime;
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % 50)
        .unwrap_or(0)
}

/// Convert a listed S3 object. Entries without a key are dropped.
fn to_remote_object(object: &Object) -> Option<RemoteObject> {
    let key = object.key()?.to_string();
    let size = object.size().unwrap_or(0).max(0) as u64;
    let last_modified = object
        .last_modified()
        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()));
    Some(RemoteObject {
        key,
        size,
        last_modified,
    })
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_objects(&self, prefix: &str) -> Result<Vec<RemoteObject>, PublishError> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .s3_client
                .list_objects_v2()
                .bucket(&self.bucket_name)
                .prefix(prefix);

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output =
                Self::with_retry("list_objects", prefix, || request.clone().send()).await?;

            objects.extend(output.contents().iter().filter_map(to_remote_object));

            if output.is_truncated().unwrap_or(false) {
                continuation_token = output.next_continuation_token().map(str::to_string);
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        debug!("Listed {} objects under {}", objects.len(), prefix);
        Ok(objects)
    }

    #[instrument(skip(self, data), level = "debug", fields(len = data.len()))]
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), PublishError> {
        Self::with_retry("put_object", key, || {
            self.s3_client
                .put_object()
                .bucket(&self.bucket_name)
                .key(key)
                .set_content_type(content_type.map(str::to_string))
                .body(ByteStream::from(data.clone()))
                .send()
        })
        .await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_object(&self, key: &str) -> Result<(), PublishError> {
        Self::with_retry("delete_object", key, || {
            self.s3_client
                .delete_object()
                .bucket(&self.bucket_name)
                .key(key)
                .send()
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::primitives::DateTime as S3DateTime;

    #[test]
    fn test_to_remote_object() {
        let object = Object::builder()
            .key("site1/a.md")
            .size(42)
            .last_modified(S3DateTime::from_secs(1_700_000_000))
            .build();

        let remote = to_remote_object(&object).unwrap();
        assert_eq!(remote.key, "site1/a.md");
        assert_eq!(remote.size, 42);
        assert_eq!(remote.last_modified.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_to_remote_object_without_key() {
        let object = Object::builder().size(1).build();
        assert!(to_remote_object(&object).is_none());
    }

    #[test]
    fn test_to_remote_object_missing_metadata() {
        let object = Object::builder().key("site1/b.md").build();
        let remote = to_remote_object(&object).unwrap();
        assert_eq!(remote.size, 0);
        assert!(remote.last_modified.is_none());
    }

    #[test]
    fn test_retryable_status() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(500));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(403));
        assert!(!is_retryable_status(404));
    }

    #[test]
    fn test_rand_jitter_bounded() {
        assert!(rand_jitter() < 50);
    }
}
