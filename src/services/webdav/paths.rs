//! Helpers for base-relative resource paths.
//!
//! A resource path is `/`-delimited with no leading or trailing slash; the
//! empty string denotes the DAV root.

/// Strips surrounding slashes and drops empty segments
pub fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn is_root(path: &str) -> bool {
    path.split('/').all(|segment| segment.is_empty())
}

/// Every prefix of `path`, shortest first.
///
/// `a/b/c` yields `a`, `a/b`, `a/b/c`. The root has no ancestors.
pub fn ancestor_chain(path: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = String::new();

    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !current.is_empty() {
            current.push('/');
        }
        current.push_str(segment);
        chain.push(current.clone());
    }

    chain
}

/// Parent of a normalized path, or `None` when the path sits directly under the root
pub fn parent_directory(path: &str) -> Option<&str> {
    path.rfind('/').map(|idx| &path[..idx])
}

/// Last segment of a path
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
