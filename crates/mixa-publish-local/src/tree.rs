use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mixa_publish_core::{path, FileTree, LocalFile, PublishError};
use tokio::fs;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

/// Document tree rooted at a directory on the local filesystem.
///
/// Hidden entries (any name starting with `.`) are pruned while walking, so
/// `.obsidian/` and `.git/` are never descended into.
#[derive(Debug, Clone)]
pub struct LocalFileTree {
    root: PathBuf,
}

impl LocalFileTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a `/`-separated relative path under the root.
    ///
    /// Rejects paths that would climb out of the root.
    fn resolve(&self, relative_path: &str) -> Result<PathBuf, PublishError> {
        let relative = Path::new(path::normalize(relative_path));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(PublishError::Io(format!(
                "Path escapes the vault root: {}",
                relative_path
            )));
        }
        Ok(self.root.join(relative))
    }

    fn walk(root: &Path) -> Vec<LocalFile> {
        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with(path::HIDDEN_MARKER)
            });

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            let relative = match entry.path().strip_prefix(root) {
                Ok(r) => r.to_string_lossy().to_string(),
                Err(_) => continue,
            };

            let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
            files.push(LocalFile::new(relative, metadata.len(), to_utc(modified)));
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        files
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

#[async_trait]
impl FileTree for LocalFileTree {
    fn root(&self) -> &Path {
        &self.root
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_files(&self) -> Result<Vec<LocalFile>, PublishError> {
        let root = self.root.clone();
        if !fs::try_exists(&root).await.unwrap_or(false) {
            return Err(PublishError::Io(format!(
                "Vault root does not exist: {}",
                root.display()
            )));
        }

        let files = tokio::task::spawn_blocking(move || Self::walk(&root))
            .await
            .map_err(|e| PublishError::Io(format!("Directory walk aborted: {}", e)))?;

        debug!("Listed {} files under {}", files.len(), self.root.display());
        Ok(files)
    }

    async fn read_to_string(&self, relative_path: &str) -> Result<String, PublishError> {
        let full = self.resolve(relative_path)?;
        fs::read_to_string(&full).await.map_err(|e| {
            PublishError::Io(format!("Failed to read {}: {}", full.display(), e))
        })
    }

    async fn read_bytes(&self, relative_path: &str) -> Result<Vec<u8>, PublishError> {
        let full = self.resolve(relative_path)?;
        fs::read(&full).await.map_err(|e| {
            PublishError::Io(format!("Failed to read {}: {}", full.display(), e))
        })
    }

    async fn exists(&self, relative_path: &str) -> bool {
        match self.resolve(relative_path) {
            Ok(full) => fs::try_exists(&full).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (LocalFileTree, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("blog/sub")).unwrap();
        std::fs::create_dir_all(root.join(".obsidian")).unwrap();
        std::fs::create_dir_all(root.join("Attachments")).unwrap();
        std::fs::write(root.join("blog/a.md"), "# A [[pic]]").unwrap();
        std::fs::write(root.join("blog/sub/b.md"), "# B").unwrap();
        std::fs::write(root.join("blog/.draft.md"), "draft").unwrap();
        std::fs::write(root.join(".obsidian/app.json"), "{}").unwrap();
        std::fs::write(root.join("Attachments/pic.png"), [1u8, 2, 3]).unwrap();
        (LocalFileTree::new(root), temp_dir)
    }

    #[tokio::test]
    async fn test_list_files_skips_hidden_entries() {
        let (tree, _temp) = setup();

        let files = tree.list_files().await.unwrap();
        let paths: Vec<&str> = files.iter().map(LocalFile::path).collect();
        assert_eq!(paths, vec!["Attachments/pic.png", "blog/a.md", "blog/sub/b.md"]);

        let pic = files.iter().find(|f| f.path() == "Attachments/pic.png").unwrap();
        assert_eq!(pic.size, 3);
    }

    #[tokio::test]
    async fn test_list_files_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let tree = LocalFileTree::new(temp_dir.path().join("missing"));
        let err = tree.list_files().await.unwrap_err();
        assert!(matches!(err, PublishError::Io(_)));
    }

    #[tokio::test]
    async fn test_read_and_exists() {
        let (tree, temp) = setup();

        assert_eq!(tree.read_to_string("blog/a.md").await.unwrap(), "# A [[pic]]");
        assert_eq!(tree.read_bytes("Attachments/pic.png").await.unwrap(), vec![1u8, 2, 3]);
        assert!(tree.exists("").await);
        assert!(tree.exists("blog").await);
        assert!(tree.exists("/blog/").await);
        assert!(!tree.exists("nope").await);
        assert_eq!(tree.root(), temp.path());

        let err = tree.read_to_string("blog/missing.md").await.unwrap_err();
        assert!(matches!(err, PublishError::Io(_)));
    }

    #[tokio::test]
    async fn test_paths_outside_root_are_rejected() {
        let (tree, _temp) = setup();
        assert!(!tree.exists("../").await);
        assert!(tree.read_bytes("blog/../../etc/passwd").await.is_err());
    }
}
