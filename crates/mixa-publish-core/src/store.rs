use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PublishError;
use crate::model::{Credentials, RemoteObject};

/// Remote key-value object store the mirror lives in.
///
/// Implementations handle transport concerns (retries, pagination,
/// multipart atomicity). Every failure is reported as
/// `PublishError::Transport`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short name used in logs.
    fn backend_name(&self) -> &'static str;

    /// List every object whose key starts with `prefix`.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<RemoteObject>, PublishError>;

    /// Create or fully replace the object at `key`.
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), PublishError>;

    /// Remove the object at `key`. Removing a missing key is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), PublishError>;
}

/// Builds an object store from the credentials issued for one pass.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, credentials: &Credentials)
        -> Result<Arc<dyn ObjectStore>, PublishError>;
}
