//! Path rules shared by the scope resolver, the diff engine and the stores.
//!
//! All paths handled here are relative, `/`-separated strings. Local trees
//! convert platform separators before handing paths to the engine.

const SEPARATORS: &[char] = &['/', '\\'];

/// Marker that makes a path segment hidden.
pub const HIDDEN_MARKER: char = '.';

/// Extension tried when a reference omits it.
pub const MARKDOWN_EXTENSION: &str = ".md";

/// Strip every leading and trailing path separator.
pub fn normalize(path: &str) -> &str {
    path.trim_matches(SEPARATORS)
}

/// True if any segment of `path` starts with the hidden marker.
pub fn is_hidden(path: &str) -> bool {
    normalize(path)
        .split('/')
        .any(|segment| segment.starts_with(HIDDEN_MARKER))
}

/// True if `path` lies inside `site_folder`. An empty site folder contains everything.
pub fn is_in_site(path: &str, site_folder: &str) -> bool {
    let site_folder = normalize(site_folder);
    if site_folder.is_empty() {
        return true;
    }
    normalize(path)
        .strip_prefix(site_folder)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Strip the `site_folder/` prefix from `path`; paths outside the folder keep their full form.
pub fn relocate<'a>(path: &'a str, site_folder: &str) -> &'a str {
    let path = normalize(path);
    let site_folder = normalize(site_folder);
    if site_folder.is_empty() {
        return path;
    }
    path.strip_prefix(site_folder)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(path)
}

/// Full remote key for a relocated relative path: `{prefix}/{relative}`.
pub fn destination_key(prefix: &str, relative: &str) -> String {
    let prefix = normalize(prefix);
    let relative = normalize(relative);
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", prefix, relative)
    }
}

/// Listing prefix for a destination namespace, always ending in `/` when non-empty.
pub fn listing_prefix(prefix: &str) -> String {
    let prefix = normalize(prefix);
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{}/", prefix)
    }
}

/// Inverse of [`destination_key`]: the key relative to `prefix`, or `None` if it lies elsewhere.
pub fn strip_destination<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    let prefix = normalize(prefix);
    if prefix.is_empty() {
        return Some(normalize(key));
    }
    key.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(normalize)
        .filter(|rest| !rest.is_empty())
}

/// Whole-segment tail match: `a/b/note.md` ends with `b/note.md` and `note.md`,
/// but not with `ote.md`.
pub fn ends_with_segments(path: &str, suffix: &str) -> bool {
    let path = normalize(path);
    let suffix = normalize(suffix);
    if suffix.is_empty() {
        return false;
    }
    match path.strip_suffix(suffix) {
        Some("") => true,
        Some(head) => head.ends_with('/'),
        None => false,
    }
}

/// Convert platform separators to `/`.
pub fn to_slash(path: &str) -> String {
    path.replace('\\', "/")
}
