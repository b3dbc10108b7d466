use std::fmt;

use serde::{Serialize, Serializer};

/// Canonical folder location. Root is the empty segment list; absent,
/// empty, and "/" inputs all parse to it, so code past this boundary never
/// re-derives root-equivalence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FolderPath {
    segments: Vec<String>,
}

impl FolderPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Total over any input: splits on `/` and discards empty segments, so
    /// leading, trailing, and doubled slashes are tolerated. Segment text is
    /// kept byte-for-byte; nothing is trimmed.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::root();
        };
        let segments = raw
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| segment.to_string())
            .collect();
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn join(&self, name: &str) -> FolderPath {
        let mut segments = self.segments.clone();
        segments.extend(
            name.split('/')
                .filter(|segment| !segment.is_empty())
                .map(|segment| segment.to_string()),
        );
        Self { segments }
    }

    pub fn parent(&self) -> Option<FolderPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Path formed by the first `len` segments; breadcrumb segment *i*
    /// navigates to `prefix(i + 1)`.
    pub fn prefix(&self, len: usize) -> FolderPath {
        let end = len.min(self.segments.len());
        Self {
            segments: self.segments[..end].to_vec(),
        }
    }

    /// Strictly below `ancestor`: deeper, and sharing its full segment
    /// prefix. A path never descends from itself.
    pub fn descends_from(&self, ancestor: &FolderPath) -> bool {
        self.segments.len() > ancestor.segments.len()
            && self.segments[..ancestor.segments.len()] == ancestor.segments[..]
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl Serialize for FolderPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::FolderPath;

    #[test]
    fn root_synonyms_parse_identically() {
        let from_none = FolderPath::parse(None);
        let from_empty = FolderPath::parse(Some(""));
        let from_slash = FolderPath::parse(Some("/"));
        assert!(from_none.is_root());
        assert_eq!(from_none, from_empty);
        assert_eq!(from_none, from_slash);
    }

    #[test]
    fn tolerates_messy_separators() {
        let path = FolderPath::parse(Some("/Projects//2024/"));
        assert_eq!(path.segments(), ["Projects", "2024"]);
        assert_eq!(path, FolderPath::parse(Some("Projects/2024")));
    }

    #[test]
    fn segments_are_not_trimmed() {
        let path = FolderPath::parse(Some("/ spaced /tab\t"));
        assert_eq!(path.segments(), [" spaced ", "tab\t"]);
    }

    #[test]
    fn display_round_trips_canonical_form() {
        assert_eq!(FolderPath::root().to_string(), "/");
        let path = FolderPath::parse(Some("Projects/2024"));
        assert_eq!(path.to_string(), "/Projects/2024");
        assert_eq!(FolderPath::parse(Some(&path.to_string())), path);
    }

    #[test]
    fn parent_and_prefix_walk_toward_root() {
        let path = FolderPath::parse(Some("/a/b/c"));
        assert_eq!(path.parent(), Some(FolderPath::parse(Some("/a/b"))));
        assert_eq!(path.prefix(1), FolderPath::parse(Some("/a")));
        assert_eq!(path.prefix(0), FolderPath::root());
        assert_eq!(path.prefix(9), path);
        assert_eq!(FolderPath::root().parent(), None);
    }

    #[test]
    fn join_appends_and_filters_empty_segments() {
        let base = FolderPath::parse(Some("/Projects"));
        assert_eq!(base.join("2024"), FolderPath::parse(Some("/Projects/2024")));
        assert_eq!(base.join(""), base);
        assert_eq!(base.join("a/b"), FolderPath::parse(Some("/Projects/a/b")));
    }

    #[test]
    fn descends_from_is_strict() {
        let root = FolderPath::root();
        let projects = FolderPath::parse(Some("/Projects"));
        let nested = FolderPath::parse(Some("/Projects/2024"));
        assert!(projects.descends_from(&root));
        assert!(nested.descends_from(&projects));
        assert!(nested.descends_from(&root));
        assert!(!projects.descends_from(&projects));
        assert!(!projects.descends_from(&nested));
        assert!(!root.descends_from(&root));
    }
}
