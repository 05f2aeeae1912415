//! Diff engine: classify desired and observed keys into upload, delete or ignore.

use std::collections::BTreeMap;

use mixa_publish_core::{path, DiffResult, LocalFile, RemoteObject, SyncConfig, SyncPlan};
use tracing::{debug, warn};

use crate::scope::EligibleFileSet;

/// Decides whether a local file differs from the remote object at its key.
pub trait ChangeDetector: Send + Sync {
    fn needs_upload(&self, local: &LocalFile, remote: &RemoteObject) -> bool;
}

/// Upload when sizes differ or the local file is newer than the remote object.
///
/// A remote object without a modification time is always replaced.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeAndModifiedTime;

impl ChangeDetector for SizeAndModifiedTime {
    fn needs_upload(&self, local: &LocalFile, remote: &RemoteObject) -> bool {
        if local.size != remote.size {
            return true;
        }
        match remote.last_modified {
            Some(remote_modified) => {
                local.modified.timestamp_millis() > remote_modified.timestamp_millis()
            }
            None => true,
        }
    }
}

/// Computes a [`SyncPlan`] from the eligible files and the remote listing.
#[derive(Debug, Clone, Default)]
pub struct DiffEngine<D = SizeAndModifiedTime> {
    detector: D,
}

impl DiffEngine<SizeAndModifiedTime> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: ChangeDetector> DiffEngine<D> {
    pub fn with_detector(detector: D) -> Self {
        Self { detector }
    }

    /// Map every eligible file to its key relative to the destination prefix.
    ///
    /// In-scope files are relocated out of the site folder; referenced files
    /// keep their full path. When two files land on the same key the
    /// in-scope one wins.
    pub fn desired_keys<'a>(
        &self,
        eligible: &'a EligibleFileSet,
        site_folder: &str,
    ) -> BTreeMap<String, &'a LocalFile> {
        let mut desired: BTreeMap<String, &LocalFile> = BTreeMap::new();

        for file in &eligible.in_scope {
            let key = path::relocate(file.path(), site_folder);
            if path::is_hidden(key) || key.is_empty() {
                continue;
            }
            desired.insert(key.to_string(), file);
        }

        for file in &eligible.referenced {
            let key = file.path();
            if path::is_hidden(key) || key.is_empty() {
                continue;
            }
            if let Some(existing) = desired.get(key) {
                warn!(
                    key,
                    kept = existing.path(),
                    dropped = file.path(),
                    "Referenced file collides with a site file, keeping the site file"
                );
                continue;
            }
            desired.insert(key.to_string(), file);
        }

        desired
    }

    /// Remote objects under the destination prefix, keyed relative to it.
    ///
    /// Folder markers (keys ending in `/`) are not files and never observed.
    pub fn observed_keys<'a>(
        &self,
        remote: &'a [RemoteObject],
        destination_prefix: &str,
    ) -> BTreeMap<String, &'a RemoteObject> {
        remote
            .iter()
            .filter_map(|object| {
                if object.key.ends_with('/') {
                    debug!("Skipping folder marker {}", object.key);
                    return None;
                }
                let key = path::strip_destination(destination_prefix, &object.key)?;
                if path::is_hidden(key) {
                    return None;
                }
                Some((key.to_string(), object))
            })
            .collect()
    }

    /// Classify every desired and observed key.
    pub fn plan(
        &self,
        config: &SyncConfig,
        eligible: &EligibleFileSet,
        remote: &[RemoteObject],
    ) -> SyncPlan {
        let desired = self.desired_keys(eligible, &config.site_folder);
        let mut observed = self.observed_keys(remote, &config.destination_prefix);

        let mut diff = DiffResult::default();
        let mut sources = BTreeMap::new();

        for (key, local) in desired {
            let unchanged = observed
                .remove(&key)
                .is_some_and(|remote| !self.detector.needs_upload(local, remote));
            if unchanged {
                diff.ignored.insert(key);
            } else {
                sources.insert(key.clone(), local.path().to_string());
                diff.uploads.insert(key);
            }
        }

        // Whatever is left was observed remotely without a local counterpart.
        diff.deletions.extend(observed.into_keys());

        debug!(
            uploads = diff.uploads.len(),
            deletions = diff.deletions.len(),
            ignored = diff.ignored.len(),
            "Computed diff for {}",
            config.destination_prefix
        );

        SyncPlan {
            destination_prefix: config.destination_prefix.clone(),
            diff,
            sources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn local(path: &str, size: u64, modified: i64) -> LocalFile {
        LocalFile::new(path, size, at(modified))
    }

    fn remote(key: &str, size: u64, modified: i64) -> RemoteObject {
        RemoteObject {
            key: key.to_string(),
            size,
            last_modified: Some(at(modified)),
        }
    }

    fn keys(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn assert_partition(plan: &SyncPlan) {
        let d = &plan.diff;
        assert!(d.uploads.is_disjoint(&d.deletions));
        assert!(d.uploads.is_disjoint(&d.ignored));
        assert!(d.deletions.is_disjoint(&d.ignored));
        assert_eq!(
            plan.sources.keys().cloned().collect::<BTreeSet<_>>(),
            d.uploads
        );
    }

    #[test]
    fn test_blog_scenario_content_differs() {
        let config = SyncConfig::new("/vault", "blog", false, "site1");
        let eligible = EligibleFileSet {
            in_scope: vec![local("blog/a.md", 10, 2_000), local("blog/sub/b.md", 5, 2_000)],
            referenced: vec![],
        };
        let listing = vec![remote("site1/a.md", 7, 1_000), remote("site1/old.md", 3, 1_000)];

        let plan = DiffEngine::new().plan(&config, &eligible, &listing);
        assert_eq!(plan.diff.uploads, keys(&["a.md", "sub/b.md"]));
        assert_eq!(plan.diff.deletions, keys(&["old.md"]));
        assert!(plan.diff.ignored.is_empty());
        assert_eq!(plan.sources["sub/b.md"], "blog/sub/b.md");
        assert_eq!(plan.remote_key("sub/b.md"), "site1/sub/b.md");
        assert_partition(&plan);
    }

    #[test]
    fn test_blog_scenario_content_identical() {
        let config = SyncConfig::new("/vault", "blog", false, "site1");
        let eligible = EligibleFileSet {
            in_scope: vec![local("blog/a.md", 10, 1_000), local("blog/sub/b.md", 5, 2_000)],
            referenced: vec![],
        };
        let listing = vec![remote("site1/a.md", 10, 1_500), remote("site1/old.md", 3, 1_000)];

        let plan = DiffEngine::new().plan(&config, &eligible, &listing);
        assert_eq!(plan.diff.uploads, keys(&["sub/b.md"]));
        assert_eq!(plan.diff.deletions, keys(&["old.md"]));
        assert_eq!(plan.diff.ignored, keys(&["a.md"]));
        assert_partition(&plan);
    }

    #[test]
    fn test_empty_site_folder_keeps_relative_paths() {
        let config = SyncConfig::new("/vault", "", false, "site1");
        let eligible = EligibleFileSet {
            in_scope: vec![local("notes/x.md", 1, 1), local("y.png", 1, 1)],
            referenced: vec![],
        };

        let plan = DiffEngine::new().plan(&config, &eligible, &[]);
        assert_eq!(plan.diff.uploads, keys(&["notes/x.md", "y.png"]));
        assert_eq!(plan.sources["notes/x.md"], "notes/x.md");
    }

    #[test]
    fn test_referenced_files_keep_full_path() {
        let config = SyncConfig::new("/vault", "blog", true, "site1");
        let eligible = EligibleFileSet {
            in_scope: vec![local("blog/a.md", 1, 1)],
            referenced: vec![local("Attachments/Images/pic.md", 1, 1)],
        };

        let plan = DiffEngine::new().plan(&config, &eligible, &[]);
        assert_eq!(
            plan.diff.uploads,
            keys(&["Attachments/Images/pic.md", "a.md"])
        );
    }

    #[test]
    fn test_collision_prefers_site_file() {
        let config = SyncConfig::new("/vault", "blog", true, "site1");
        let eligible = EligibleFileSet {
            in_scope: vec![local("blog/img/a.png", 1, 1)],
            referenced: vec![local("img/a.png", 2, 1)],
        };

        let plan = DiffEngine::new().plan(&config, &eligible, &[]);
        assert_eq!(plan.diff.uploads, keys(&["img/a.png"]));
        assert_eq!(plan.sources["img/a.png"], "blog/img/a.png");
    }

    #[test]
    fn test_hidden_keys_excluded_from_both_sides() {
        let config = SyncConfig::new("/vault", "", false, "site1");
        let eligible = EligibleFileSet {
            in_scope: vec![local(".obsidian/config", 1, 1), local("a.md", 1, 1)],
            referenced: vec![],
        };
        let listing = vec![
            remote("site1/.obsidian/workspace.json", 1, 1),
            remote("site1/.well-known/x", 1, 1),
        ];

        let plan = DiffEngine::new().plan(&config, &eligible, &listing);
        assert_eq!(plan.diff.uploads, keys(&["a.md"]));
        assert!(plan.diff.deletions.is_empty());
        assert!(plan.diff.ignored.is_empty());
    }

    #[test]
    fn test_other_prefixes_are_not_observed() {
        let config = SyncConfig::new("/vault", "", false, "site1");
        let listing = vec![remote("site10/a.md", 1, 1), remote("site1/b.md", 1, 1)];

        let plan = DiffEngine::new().plan(&config, &EligibleFileSet::default(), &listing);
        assert_eq!(plan.diff.deletions, keys(&["b.md"]));
    }

    #[test]
    fn test_folder_markers_are_not_observed() {
        let config = SyncConfig::new("/vault", "", false, "site1");
        let eligible = EligibleFileSet {
            in_scope: vec![local("docs/a.md", 1, 1)],
            referenced: vec![],
        };
        let listing = vec![
            remote("site1/docs/", 0, 1),
            remote("site1/empty/", 0, 1),
            remote("site1/docs/a.md", 1, 5),
        ];

        let plan = DiffEngine::new().plan(&config, &eligible, &listing);
        assert!(plan.diff.deletions.is_empty());
        assert!(plan.diff.uploads.is_empty());
        assert_eq!(plan.diff.ignored, keys(&["docs/a.md"]));
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let config = SyncConfig::new("/vault", "blog", false, "site1");
        let eligible = EligibleFileSet {
            in_scope: vec![local("blog/a.md", 10, 1_000), local("blog/b.md", 4, 1_000)],
            referenced: vec![],
        };
        let engine = DiffEngine::new();

        let first = engine.plan(&config, &eligible, &[remote("site1/old.md", 1, 1)]);
        assert!(!first.diff.is_noop());

        // The remote state after applying the first plan.
        let uploaded_at = at(1_000) + Duration::seconds(30);
        let listing: Vec<RemoteObject> = eligible
            .iter()
            .map(|f| RemoteObject {
                key: path::destination_key("site1", path::relocate(f.path(), "blog")),
                size: f.size,
                last_modified: Some(uploaded_at),
            })
            .collect();

        let second = engine.plan(&config, &eligible, &listing);
        assert!(second.diff.uploads.is_empty());
        assert!(second.diff.deletions.is_empty());
        assert_eq!(second.diff.ignored, keys(&["a.md", "b.md"]));
    }

    #[test]
    fn test_missing_remote_timestamp_forces_upload() {
        let file = local("a.md", 3, 1);
        let object = RemoteObject {
            key: "site1/a.md".to_string(),
            size: 3,
            last_modified: None,
        };
        assert!(SizeAndModifiedTime.needs_upload(&file, &object));
    }

    struct NeverChanged;

    impl ChangeDetector for NeverChanged {
        fn needs_upload(&self, _local: &LocalFile, _remote: &RemoteObject) -> bool {
            false
        }
    }

    #[test]
    fn test_custom_detector() {
        let config = SyncConfig::new("/vault", "", false, "site1");
        let eligible = EligibleFileSet {
            in_scope: vec![local("a.md", 100, 9_999)],
            referenced: vec![],
        };
        let plan = DiffEngine::with_detector(NeverChanged).plan(
            &config,
            &eligible,
            &[remote("site1/a.md", 1, 1)],
        );
        assert_eq!(plan.diff.ignored, keys(&["a.md"]));
    }
}
