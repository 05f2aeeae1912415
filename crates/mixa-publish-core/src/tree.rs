use std::path::Path;

use async_trait::async_trait;

use crate::error::PublishError;
use crate::model::LocalFile;

/// Reader for the local document tree.
///
/// Paths passed in and out are relative to the tree root and `/`-separated.
#[async_trait]
pub trait FileTree: Send + Sync {
    /// Directory every relative path is resolved against.
    fn root(&self) -> &Path;

    /// Enumerate every file under the root.
    async fn list_files(&self) -> Result<Vec<LocalFile>, PublishError>;

    /// Read a document as UTF-8 text.
    async fn read_to_string(&self, relative_path: &str) -> Result<String, PublishError>;

    /// Read raw file content for upload.
    async fn read_bytes(&self, relative_path: &str) -> Result<Vec<u8>, PublishError>;

    /// Whether a directory or file exists at `relative_path` (empty means the root).
    async fn exists(&self, relative_path: &str) -> bool;
}
