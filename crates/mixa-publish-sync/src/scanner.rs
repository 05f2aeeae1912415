//! Reference scanner.
//!
//! Finds wiki-style links and embeds (`[[Note]]`, `![[pic.png|300]]`) and
//! markdown links (`[text](path)`, `![alt](pic.png)`) in documents and turns
//! their targets into candidate relative paths.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use futures::stream::{self, StreamExt};
use mixa_publish_core::{path, FileTree, LocalFile, PublishError};
use regex::Regex;
use tracing::{debug, warn};

/// Group 1 captures wiki targets, group 2 markdown link targets.
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!?\[\[([^\[\]]+)\]\]|!?\[[^\[\]]*\]\(([^()]+)\)").unwrap()
});

const DEFAULT_CONCURRENCY: usize = 16;

/// Extract every candidate target from one document.
pub fn extract_references(content: &str) -> BTreeSet<String> {
    LINK_PATTERN
        .captures_iter(content)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .filter_map(|m| clean_target(m.as_str()))
        .collect()
}

/// Strip the `|alias` tail and any leading `./` or `/` segments.
///
/// Anchors (`#heading`) and query suffixes are kept verbatim.
pub fn clean_target(raw: &str) -> Option<String> {
    let target = raw.split('|').next().unwrap_or_default().trim();
    let mut rest = target;
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

/// True for files whose content is scanned for references.
pub fn is_document(relative_path: &str) -> bool {
    relative_path
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(&path::MARKDOWN_EXTENSION[1..]))
}

/// Reads documents through a [`FileTree`] and collects their references.
pub struct ReferenceScanner<'a> {
    tree: &'a dyn FileTree,
    concurrency: usize,
}

impl<'a> ReferenceScanner<'a> {
    pub fn new(tree: &'a dyn FileTree) -> Self {
        Self {
            tree,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Scan every document among `files`.
    ///
    /// A document that cannot be read or decoded contributes nothing; the
    /// failure is logged and the scan goes on.
    pub async fn scan(&self, files: &[LocalFile]) -> BTreeSet<String> {
        let documents: Vec<&str> = files
            .iter()
            .map(LocalFile::path)
            .filter(|p| is_document(p))
            .collect();

        let per_document: Vec<BTreeSet<String>> = stream::iter(documents)
            .map(|relative_path| async move {
                match self.tree.read_to_string(relative_path).await {
                    Ok(content) => extract_references(&content),
                    Err(e) => {
                        let err = PublishError::Scanning(format!("{}: {}", relative_path, e));
                        warn!("{}, skipping its references", err);
                        BTreeSet::new()
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let references: BTreeSet<String> = per_document.into_iter().flatten().collect();
        debug!("Scanned documents, found {} references", references.len());
        references
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixa_publish_core::MemoryFileTree;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case("[[Note]]", &["Note"])]
    #[case("[[Note|Alias Text]]", &["Note"])]
    #[case("![[Images/pic.png]]", &["Images/pic.png"])]
    #[case("![[pic.png|300]]", &["pic.png"])]
    #[case("[text](./docs/page.md)", &["docs/page.md"])]
    #[case("![alt](/Attachments/a.png)", &["Attachments/a.png"])]
    #[case("[a](.//x.md)", &["x.md"])]
    #[case("[[Heading#Section]]", &["Heading#Section"])]
    #[case("plain text [not a link] (nope)", &[])]
    #[case("[[]] [empty]()", &[])]
    fn test_extract_references(#[case] content: &str, #[case] expected: &[&str]) {
        assert_eq!(extract_references(content), set(expected));
    }

    #[test]
    fn test_duplicates_collapse() {
        let content = "[[Note]] and again [[Note|other alias]] and [x](Note)";
        assert_eq!(extract_references(content), set(&["Note"]));
    }

    #[test]
    fn test_mixed_document() {
        let content = "# Title\n\nSee [[Projects/Plan]] and ![[diagram.png]].\n\
                       Also [the guide](guides/intro.md) and ![](img/cover.jpg).";
        assert_eq!(
            extract_references(content),
            set(&["Projects/Plan", "diagram.png", "guides/intro.md", "img/cover.jpg"])
        );
    }

    #[rstest]
    #[case("notes/a.md", true)]
    #[case("notes/A.MD", true)]
    #[case("notes/pic.png", false)]
    #[case("notes/md", false)]
    #[case("notes.md/readme", false)]
    fn test_is_document(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_document(path), expected);
    }

    #[tokio::test]
    async fn test_scan_skips_unreadable_documents() {
        let tree = MemoryFileTree::new();
        tree.insert("blog/a.md", "[[Images/pic]]");
        tree.insert("blog/b.md", "[[Broken]]");
        tree.insert("blog/c.png", "[[NotScanned]]");
        tree.mark_unreadable("blog/b.md");

        let files = tree.list_files().await.unwrap();
        let refs = ReferenceScanner::new(&tree).with_concurrency(2).scan(&files).await;
        assert_eq!(refs, set(&["Images/pic"]));
    }

    #[tokio::test]
    async fn test_scan_skips_invalid_utf8() {
        let tree = MemoryFileTree::new();
        tree.insert("blog/a.md", vec![0xff, 0xfe, 0x00]);
        tree.insert("blog/b.md", "[[Ok]]");

        let files = tree.list_files().await.unwrap();
        let refs = ReferenceScanner::new(&tree).scan(&files).await;
        assert_eq!(refs, set(&["Ok"]));
    }
}
