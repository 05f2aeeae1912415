//! In-memory collaborators, used by tests and dry experiments.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::PublishError;
use crate::model::{LocalFile, RemoteObject};
use crate::path;
use crate::store::ObjectStore;
use crate::tree::FileTree;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

/// Object store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, StoredObject>,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    failing_keys: Mutex<HashSet<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object with an explicit modification time.
    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>, last_modified: DateTime<Utc>) {
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: None,
                last_modified,
            },
        );
    }

    /// Make every later put or delete of `key` fail with a transport error.
    pub fn fail_on(&self, key: &str) {
        if let Ok(mut keys) = self.failing_keys.lock() {
            keys.insert(key.to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.get(key).map(|o| o.data.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.get(key).and_then(|o| o.content_type.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn check_failure(&self, key: &str) -> Result<(), PublishError> {
        let failing = self
            .failing_keys
            .lock()
            .map(|keys| keys.contains(key))
            .unwrap_or(false);
        if failing {
            return Err(PublishError::Transport(format!(
                "memory store refused {}",
                key
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<RemoteObject>, PublishError> {
        let mut objects: Vec<RemoteObject> = self
            .objects
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| RemoteObject {
                key: e.key().clone(),
                size: e.value().data.len() as u64,
                last_modified: Some(e.value().last_modified),
            })
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), PublishError> {
        self.check_failure(key)?;
        self.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.map(str::to_string),
                last_modified: Utc::now(),
            },
        );
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), PublishError> {
        self.check_failure(key)?;
        self.objects.remove(key);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    data: Vec<u8>,
    modified: DateTime<Utc>,
    readable: bool,
}

/// File tree backed by a concurrent map of relative paths.
///
/// The root is nominal, `/vault` unless set with [`MemoryFileTree::with_root`].
#[derive(Debug)]
pub struct MemoryFileTree {
    root: PathBuf,
    files: DashMap<String, MemoryFile>,
}

impl Default for MemoryFileTree {
    fn default() -> Self {
        Self::with_root("/vault")
    }
}

impl MemoryFileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: DashMap::new(),
        }
    }

    /// Add a file with a fixed modification time in the past.
    pub fn insert(&self, relative_path: &str, data: impl Into<Vec<u8>>) {
        let epoch = DateTime::<Utc>::from_timestamp(1_600_000_000, 0).unwrap_or_default();
        self.insert_at(relative_path, data, epoch);
    }

    pub fn insert_at(&self, relative_path: &str, data: impl Into<Vec<u8>>, modified: DateTime<Utc>) {
        self.files.insert(
            path::normalize(&path::to_slash(relative_path)).to_string(),
            MemoryFile {
                data: data.into(),
                modified,
                readable: true,
            },
        );
    }

    /// Keep the file listed but make every read fail.
    pub fn mark_unreadable(&self, relative_path: &str) {
        if let Some(mut file) = self.files.get_mut(path::normalize(relative_path)) {
            file.readable = false;
        }
    }

    fn read(&self, relative_path: &str) -> Result<Vec<u8>, PublishError> {
        let key = path::normalize(relative_path);
        match self.files.get(key) {
            Some(file) if file.readable => Ok(file.data.clone()),
            Some(_) => Err(PublishError::Io(format!(
                "Permission denied: {}",
                key
            ))),
            None => Err(PublishError::Io(format!("File not found: {}", key))),
        }
    }
}

#[async_trait]
impl FileTree for MemoryFileTree {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn list_files(&self) -> Result<Vec<LocalFile>, PublishError> {
        let mut files: Vec<LocalFile> = self
            .files
            .iter()
            .map(|e| LocalFile::new(e.key().clone(), e.value().data.len() as u64, e.value().modified))
            .collect();
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(files)
    }

    async fn read_to_string(&self, relative_path: &str) -> Result<String, PublishError> {
        let data = self.read(relative_path)?;
        String::from_utf8(data).map_err(|e| {
            PublishError::Io(format!("{} is not valid UTF-8: {}", relative_path, e))
        })
    }

    async fn read_bytes(&self, relative_path: &str) -> Result<Vec<u8>, PublishError> {
        self.read(relative_path)
    }

    async fn exists(&self, relative_path: &str) -> bool {
        let wanted = path::normalize(relative_path);
        if wanted.is_empty() {
            return true;
        }
        self.files
            .iter()
            .any(|e| e.key() == wanted || path::is_in_site(e.key(), wanted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_put_list_delete() {
        let store = MemoryObjectStore::new();
        store
            .put_object("site1/a.md", b"hello".to_vec(), Some("text/markdown"))
            .await
            .unwrap();
        store.insert("site2/b.md", "other", Utc::now());

        let listed = store.list_objects("site1/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "site1/a.md");
        assert_eq!(listed[0].size, 5);
        assert_eq!(store.content_type("site1/a.md").as_deref(), Some("text/markdown"));

        store.delete_object("site1/a.md").await.unwrap();
        assert!(!store.contains("site1/a.md"));
        assert_eq!(store.put_count(), 1);
        assert_eq!(store.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_failure_injection() {
        let store = MemoryObjectStore::new();
        store.fail_on("site1/bad.md");
        let err = store
            .put_object("site1/bad.md", vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Transport(_)));
    }

    #[tokio::test]
    async fn test_memory_tree_exists_and_reads() {
        let tree = MemoryFileTree::new();
        tree.insert("blog/sub/b.md", "# B");
        tree.insert("other/c.md", "C");
        tree.mark_unreadable("other/c.md");

        assert!(tree.exists("").await);
        assert!(tree.exists("blog").await);
        assert!(tree.exists("blog/sub").await);
        assert!(!tree.exists("missing").await);

        assert_eq!(tree.read_to_string("blog/sub/b.md").await.unwrap(), "# B");
        assert!(tree.read_to_string("other/c.md").await.is_err());
        assert_eq!(tree.list_files().await.unwrap().len(), 2);
    }
}
