//! Slash-separated test paths.
//!
//! A path such as `physics/collisions/sphere_vs_box` names the leaf `sphere_vs_box` inside the group
//! `physics/collisions`. The empty string is the root group. Group relations are always computed from paths; no
//! parent or child pointers are stored anywhere.

/// Separator between path segments.
pub const SEPARATOR: char = '/';

/// Normalize a raw path by dropping empty segments (leading, trailing or doubled separators).
///
/// ## Returns
/// - (`Option<String>`): the normalized path, or `None` if no segment remains.
///
/// ## Examples
/// ```rust
/// use framerunner_core::path::normalize;
/// assert_eq!(normalize("/physics//gravity/").as_deref(), Some("physics/gravity"));
/// assert_eq!(normalize("//"), None);
/// ```
pub fn normalize(raw: &str) -> Option<String> {
    let joined = segments(raw).collect::<Vec<_>>().join("/");
    if joined.is_empty() { None } else { Some(joined) }
}

/// Iterate over the non-empty segments of a path.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Number of segments in a path. The root (`""`) has depth 0.
pub fn depth(path: &str) -> usize {
    segments(path).count()
}

/// Last segment of a path (the path itself when it has a single segment).
pub fn leaf_name(path: &str) -> &str {
    path.rsplit_once(SEPARATOR).map_or(path, |(_, leaf)| leaf)
}

/// Path of the enclosing group.
///
/// ## Returns
/// - `None` for the root, `Some("")` for top-level paths, otherwise everything before the last separator.
pub fn parent_path(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rsplit_once(SEPARATOR).map_or("", |(parent, _)| parent))
}

/// Whether `path` lies strictly below `ancestor`.
///
/// Every non-empty path descends from the root. Matching is segment-aware, so `ab` does not descend from `a`.
pub fn is_descendant_of(path: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return !path.is_empty();
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(SEPARATOR)
}

/// Whether `path` is exactly one level below `parent`.
pub fn is_direct_child_of(path: &str, parent: &str) -> bool {
    parent_path(path) == Some(parent)
}

/// Every proper prefix of a path, root first.
///
/// For a leaf path these are exactly the groups the leaf lives under.
///
/// ## Examples
/// ```rust
/// use framerunner_core::path::prefixes;
/// assert_eq!(prefixes("a/b/c"), vec!["", "a", "a/b"]);
/// assert_eq!(prefixes("a"), vec![""]);
/// ```
pub fn prefixes(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }
    let mut out = vec![""];
    for (idx, ch) in path.char_indices() {
        if ch == SEPARATOR {
            out.push(&path[..idx]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_empty_segments() {
        assert_eq!(normalize("a/b").as_deref(), Some("a/b"));
        assert_eq!(normalize("/a///b/").as_deref(), Some("a/b"));
        assert_eq!(normalize(""), None);
    }

    #[test]
    fn test_depth() {
        assert_eq!(depth(""), 0);
        assert_eq!(depth("a"), 1);
        assert_eq!(depth("a/b/c"), 3);
    }

    #[test]
    fn test_leaf_and_parent() {
        assert_eq!(leaf_name("a/b/c"), "c");
        assert_eq!(leaf_name("c"), "c");
        assert_eq!(parent_path("a/b/c"), Some("a/b"));
        assert_eq!(parent_path("c"), Some(""));
        assert_eq!(parent_path(""), None);
    }

    #[test]
    fn test_descendant_is_segment_aware() {
        assert!(is_descendant_of("a/b", "a"));
        assert!(is_descendant_of("a/b/c", "a"));
        assert!(!is_descendant_of("ab", "a"));
        assert!(!is_descendant_of("a", "a"));
        assert!(is_descendant_of("a", ""));
        assert!(!is_descendant_of("", ""));
    }

    #[test]
    fn test_direct_child() {
        assert!(is_direct_child_of("a/b", "a"));
        assert!(!is_direct_child_of("a/b/c", "a"));
        assert!(is_direct_child_of("a", ""));
        assert!(!is_direct_child_of("", ""));
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(prefixes("x/y"), vec!["", "x"]);
        assert!(prefixes("").is_empty());
    }
}
