use crate::hierarchy::FolderPath;

/// Caller-held navigation state for the breadcrumb browser. Navigation is
/// unconditional: the target does not need to exist in the note collection,
/// an unknown path just lists nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigationState {
    current: FolderPath,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Crumb {
    pub label: String,
    pub target: FolderPath,
}

impl NavigationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &FolderPath {
        &self.current
    }

    pub fn navigate_to(&mut self, path: FolderPath) {
        self.current = path;
    }

    pub fn jump_to_root(&mut self) {
        self.current = FolderPath::root();
    }

    pub fn ascend(&mut self) -> bool {
        match self.current.parent() {
            Some(parent) => {
                self.current = parent;
                true
            }
            None => false,
        }
    }

    /// One crumb per path segment; crumb *i* targets the path formed by the
    /// first *i+1* segments. The root itself is not part of the trail.
    pub fn trail(&self) -> Vec<Crumb> {
        self.current
            .segments()
            .iter()
            .enumerate()
            .map(|(idx, segment)| Crumb {
                label: segment.clone(),
                target: self.current.prefix(idx + 1),
            })
            .collect()
    }

    pub fn jump(&mut self, segment_index: usize) -> bool {
        if segment_index >= self.current.depth() {
            return false;
        }
        self.current = self.current.prefix(segment_index + 1);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_root_and_navigates_unconditionally() {
        let mut nav = NavigationState::new();
        assert!(nav.current().is_root());

        nav.navigate_to(FolderPath::parse(Some("/Ghost/Town")));
        assert_eq!(nav.current().to_string(), "/Ghost/Town");
    }

    #[test]
    fn ascend_stops_at_root() {
        let mut nav = NavigationState::new();
        nav.navigate_to(FolderPath::parse(Some("/a/b")));
        assert!(nav.ascend());
        assert_eq!(nav.current().to_string(), "/a");
        assert!(nav.ascend());
        assert!(nav.current().is_root());
        assert!(!nav.ascend());
        assert!(nav.current().is_root());
    }

    #[test]
    fn trail_targets_are_prefix_paths() {
        let mut nav = NavigationState::new();
        nav.navigate_to(FolderPath::parse(Some("/Projects/2024/Q1")));
        let trail = nav.trail();
        assert_eq!(trail.len(), 3);
        assert_eq!(trail[0].label, "Projects");
        assert_eq!(trail[0].target, FolderPath::parse(Some("/Projects")));
        assert_eq!(trail[1].target, FolderPath::parse(Some("/Projects/2024")));
        assert_eq!(trail[2].target, FolderPath::parse(Some("/Projects/2024/Q1")));
    }

    #[test]
    fn jump_selects_trail_segment() {
        let mut nav = NavigationState::new();
        nav.navigate_to(FolderPath::parse(Some("/Projects/2024/Q1")));
        assert!(nav.jump(1));
        assert_eq!(nav.current().to_string(), "/Projects/2024");
        assert!(!nav.jump(5));
        assert_eq!(nav.current().to_string(), "/Projects/2024");
    }

    #[test]
    fn trail_is_empty_at_root() {
        let nav = NavigationState::new();
        assert!(nav.trail().is_empty());
    }
}
