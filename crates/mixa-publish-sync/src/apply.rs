//! Sync applier: execute a [`SyncPlan`] against an object store.

use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, TryStreamExt};
use mixa_publish_core::{FileTree, ObjectStore, PublishError, SyncPlan};
use tracing::{debug, info};

const DEFAULT_CONCURRENCY: usize = 8;

/// Counts of what an apply actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub uploaded: usize,
    pub deleted: usize,
}

enum Operation<'a> {
    Upload { key: &'a str, source: &'a str },
    Delete { key: &'a str },
}

/// Guess a content type from the file extension.
pub fn content_type_for(relative_path: &str) -> Option<&'static str> {
    let ext = relative_path.rsplit_once('.')?.1.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "md" | "markdown" => "text/markdown; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "yml" | "yaml" => "application/yaml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(content_type)
}

/// Uploads changed files and deletes orphaned objects.
///
/// Uploads replace whole objects. Uploads and deletions act on disjoint key
/// sets and run concurrently; the first failure stops the apply and is
/// returned. Nothing already applied is rolled back.
pub struct SyncApplier {
    concurrency: usize,
}

impl Default for SyncApplier {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncApplier {
    pub fn new() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn apply(
        &self,
        plan: &SyncPlan,
        tree: &dyn FileTree,
        store: &dyn ObjectStore,
    ) -> Result<ApplyReport, PublishError> {
        let mut operations = Vec::with_capacity(plan.diff.uploads.len() + plan.diff.deletions.len());
        for key in &plan.diff.uploads {
            let source = plan.sources.get(key).ok_or_else(|| {
                PublishError::Configuration(format!("No local source planned for {}", key))
            })?;
            operations.push(Operation::Upload {
                key: key.as_str(),
                source: source.as_str(),
            });
        }
        for key in &plan.diff.deletions {
            operations.push(Operation::Delete { key: key.as_str() });
        }

        let uploaded = AtomicUsize::new(0);
        let deleted = AtomicUsize::new(0);

        stream::iter(operations.into_iter().map(Ok::<_, PublishError>))
            .try_for_each_concurrent(self.concurrency, |operation| {
                let uploaded = &uploaded;
                let deleted = &deleted;
                async move {
                    match operation {
                        Operation::Upload { key, source } => {
                            let data = tree.read_bytes(source).await?;
                            let remote_key = plan.remote_key(key);
                            debug!("Uploading {} -> {} ({} bytes)", source, remote_key, data.len());
                            store
                                .put_object(&remote_key, data, content_type_for(source))
                                .await?;
                            uploaded.fetch_add(1, Ordering::Relaxed);
                        }
                        Operation::Delete { key } => {
                            let remote_key = plan.remote_key(key);
                            debug!("Deleting {}", remote_key);
                            store.delete_object(&remote_key).await?;
                            deleted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Ok(())
                }
            })
            .await?;

        let report = ApplyReport {
            uploaded: uploaded.into_inner(),
            deleted: deleted.into_inner(),
        };
        info!(
            uploaded = report.uploaded,
            deleted = report.deleted,
            backend = store.backend_name(),
            "Applied diff to {}",
            plan.destination_prefix
        );
        Ok(report)
    }
}
