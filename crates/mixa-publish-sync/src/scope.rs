//! Scope resolution: which local files should exist remotely after a pass.

use std::collections::BTreeSet;

use mixa_publish_core::{path, FileTree, LocalFile, SyncConfig};
use tracing::{debug, info};

use crate::scanner::ReferenceScanner;

/// Files eligible for sync, split by how they got in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibleFileSet {
    /// Files inside the site folder (every file when the folder is empty).
    pub in_scope: Vec<LocalFile>,
    /// Out-of-scope files pulled in by a reference.
    pub referenced: Vec<LocalFile>,
}

impl EligibleFileSet {
    pub fn iter(&self) -> impl Iterator<Item = &LocalFile> {
        self.in_scope.iter().chain(self.referenced.iter())
    }

    /// Relative paths of every member.
    pub fn paths(&self) -> BTreeSet<&str> {
        self.iter().map(LocalFile::path).collect()
    }
}

/// Select every out-of-scope file whose path ends with a token, or with the
/// token plus the markdown extension, on whole-segment boundaries.
///
/// A token matching several files selects all of them.
pub fn match_references(out_of_scope: &[LocalFile], tokens: &BTreeSet<String>) -> Vec<LocalFile> {
    out_of_scope
        .iter()
        .filter(|file| {
            tokens.iter().any(|token| {
                path::ends_with_segments(file.path(), token)
                    || path::ends_with_segments(
                        file.path(),
                        &format!("{}{}", token, path::MARKDOWN_EXTENSION),
                    )
            })
        })
        .cloned()
        .collect()
}

/// Resolves the eligible file set of a pass.
pub struct ScopeResolver<'a> {
    tree: &'a dyn FileTree,
    scan_concurrency: Option<usize>,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(tree: &'a dyn FileTree) -> Self {
        Self {
            tree,
            scan_concurrency: None,
        }
    }

    pub fn with_scan_concurrency(mut self, concurrency: usize) -> Self {
        self.scan_concurrency = Some(concurrency);
        self
    }

    /// Partition `files` by the site folder and, when enabled, add referenced files.
    ///
    /// Hidden files never become eligible and are never scanned.
    pub async fn resolve(&self, files: Vec<LocalFile>, config: &SyncConfig) -> EligibleFileSet {
        let (in_scope, out_of_scope): (Vec<LocalFile>, Vec<LocalFile>) = files
            .into_iter()
            .filter(|file| !path::is_hidden(file.path()))
            .partition(|file| path::is_in_site(file.path(), &config.site_folder));

        if !config.include_external_references || out_of_scope.is_empty() {
            debug!(
                "Resolved {} in-scope files, external references not considered",
                in_scope.len()
            );
            return EligibleFileSet {
                in_scope,
                referenced: Vec::new(),
            };
        }

        let mut scanner = ReferenceScanner::new(self.tree);
        if let Some(concurrency) = self.scan_concurrency {
            scanner = scanner.with_concurrency(concurrency);
        }
        let tokens = scanner.scan(&in_scope).await;
        let referenced = match_references(&out_of_scope, &tokens);

        info!(
            in_scope = in_scope.len(),
            references = tokens.len(),
            referenced = referenced.len(),
            "Resolved publish scope"
        );

        EligibleFileSet {
            in_scope,
            referenced,
        }
    }
}
