use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::path;

/// What to publish and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Absolute path of the document root (the vault).
    pub root_path: PathBuf,
    /// Publishable sub-folder, normalized. Empty means the whole root.
    pub site_folder: String,
    /// Also publish out-of-scope files referenced from in-scope documents.
    pub include_external_references: bool,
    /// Remote namespace all keys are placed under.
    pub destination_prefix: String,
}

impl SyncConfig {
    pub fn new(
        root_path: impl Into<PathBuf>,
        site_folder: &str,
        include_external_references: bool,
        destination_prefix: &str,
    ) -> Self {
        Self {
            root_path: root_path.into(),
            site_folder: path::normalize(site_folder).to_string(),
            include_external_references,
            destination_prefix: path::normalize(destination_prefix).to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }
}

/// A file of the local tree, enumerated fresh for every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Path relative to the root, `/`-separated.
    pub relative_path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl LocalFile {
    pub fn new(relative_path: impl Into<String>, size: u64, modified: DateTime<Utc>) -> Self {
        Self {
            relative_path: path::to_slash(&relative_path.into()),
            size,
            modified,
        }
    }

    pub fn path(&self) -> &str {
        path::normalize(&self.relative_path)
    }
}

/// An object observed in the remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Full key, including the destination prefix.
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Classification of every desired and observed key, relative to the destination prefix.
///
/// `uploads`, `deletions` and `ignored` never share a key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub uploads: BTreeSet<String>,
    pub deletions: BTreeSet<String>,
    pub ignored: BTreeSet<String>,
}

impl DiffResult {
    /// True when applying the diff would change nothing remotely.
    pub fn is_noop(&self) -> bool {
        self.uploads.is_empty() && self.deletions.is_empty()
    }

    /// Number of keys across all three sets.
    pub fn len(&self) -> usize {
        self.uploads.len() + self.deletions.len() + self.ignored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A diff plus what the applier needs to execute it.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub destination_prefix: String,
    pub diff: DiffResult,
    /// Relative key -> local relative path, for every key in `diff.uploads`.
    pub sources: BTreeMap<String, String>,
}

impl SyncPlan {
    /// Full remote key for a key of the diff.
    pub fn remote_key(&self, key: &str) -> String {
        path::destination_key(&self.destination_prefix, key)
    }
}

/// Time-limited object-store credentials issued for one pass.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.access_key_id.is_empty() || self.secret_access_key.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Site details resolved from a secret token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfo {
    pub subdomain: String,
    #[serde(default)]
    pub site_url: String,
    #[serde(default)]
    pub site_edit_url: String,
}
