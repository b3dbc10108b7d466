use indexmap::IndexSet;
use serde::Serialize;

use crate::storage::NoteRecord;

mod path;

pub use path::FolderPath;

/// Display name of the implicit top-level folder.
pub const ROOT_NAME: &str = "Notes";

/// One folder level, rebuilt from scratch on every build; nodes carry no
/// identity across rebuilds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderNode {
    pub name: String,
    pub path: FolderPath,
    pub children: Vec<FolderNode>,
    pub notes: Vec<NoteRecord>,
}

impl FolderNode {
    fn new(name: impl Into<String>, path: FolderPath) -> Self {
        Self {
            name: name.into(),
            path,
            children: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
            + self
                .children
                .iter()
                .map(FolderNode::note_count)
                .sum::<usize>()
    }
}

/// Builds the full folder tree implied by the notes' paths. Children are
/// matched by name within one parent and appended in discovery order, so
/// two notes sharing a path land in the same node and same-named folders at
/// different depths stay distinct.
pub fn build_folder_tree(notes: &[NoteRecord]) -> FolderNode {
    let mut root = FolderNode::new(ROOT_NAME, FolderPath::root());
    for note in notes {
        let mut node = &mut root;
        for segment in note.folder.segments() {
            let slot = match node
                .children
                .iter()
                .position(|child| child.name == *segment)
            {
                Some(idx) => idx,
                None => {
                    let path = node.path.join(segment);
                    node.children.push(FolderNode::new(segment.clone(), path));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[slot];
        }
        node.notes.push(note.clone());
    }
    root
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderEntry {
    pub name: String,
    pub path: FolderPath,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderListing {
    pub path: FolderPath,
    pub folders: Vec<FolderEntry>,
    pub notes: Vec<NoteRecord>,
}

impl FolderListing {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.notes.is_empty()
    }
}

/// One-level breadcrumb view: immediate child folders (deduplicated, first
/// appearance first) and the notes placed exactly at `current` - descendants
/// excluded. Unknown paths are valid and simply yield an empty listing.
pub fn list_at_path(notes: &[NoteRecord], current: &FolderPath) -> FolderListing {
    let mut names: IndexSet<&str> = IndexSet::new();
    let mut at_level = Vec::new();
    for note in notes {
        if note.folder == *current {
            at_level.push(note.clone());
        } else if note.folder.descends_from(current) {
            if let Some(segment) = note.folder.segments().get(current.depth()) {
                names.insert(segment.as_str());
            }
        }
    }
    let folders = names
        .into_iter()
        .map(|name| FolderEntry {
            name: name.to_string(),
            path: current.join(name),
        })
        .collect();
    FolderListing {
        path: current.clone(),
        folders,
        notes: at_level,
    }
}

/// Case-insensitive title substring filter. Feeding the result back into
/// `build_folder_tree` drops folders whose subtree has no match, since
/// folders only exist through the notes that mention them.
pub fn filter_by_title(notes: &[NoteRecord], needle: &str) -> Vec<NoteRecord> {
    let needle = needle.to_lowercase();
    if needle.is_empty() {
        return notes.to_vec();
    }
    notes
        .iter()
        .filter(|note| note.title.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, folder: Option<&str>) -> NoteRecord {
        NoteRecord {
            id: id.to_string(),
            profile_id: "p1".to_string(),
            title: format!("Note {id}"),
            content: String::new(),
            folder: FolderPath::parse(folder),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn titled(id: &str, title: &str, folder: Option<&str>) -> NoteRecord {
        NoteRecord {
            title: title.to_string(),
            ..note(id, folder)
        }
    }

    fn collect_ids(node: &FolderNode, out: &mut Vec<String>) {
        out.extend(node.notes.iter().map(|n| n.id.clone()));
        for child in &node.children {
            collect_ids(child, out);
        }
    }

    #[test]
    fn scenario_tree_places_each_note_at_its_level() {
        let notes = vec![
            note("1", Some("/Projects/2024")),
            note("2", Some("/Projects")),
            note("3", None),
        ];
        let root = build_folder_tree(&notes);

        assert_eq!(root.name, ROOT_NAME);
        assert!(root.path.is_root());
        assert_eq!(root.notes.len(), 1);
        assert_eq!(root.notes[0].id, "3");
        assert_eq!(root.children.len(), 1);

        let projects = &root.children[0];
        assert_eq!(projects.name, "Projects");
        assert_eq!(projects.path, FolderPath::parse(Some("/Projects")));
        assert_eq!(projects.notes.len(), 1);
        assert_eq!(projects.notes[0].id, "2");
        assert_eq!(projects.children.len(), 1);

        let year = &projects.children[0];
        assert_eq!(year.name, "2024");
        assert_eq!(year.path, FolderPath::parse(Some("/Projects/2024")));
        assert_eq!(year.notes.len(), 1);
        assert_eq!(year.notes[0].id, "1");
        assert!(year.children.is_empty());
    }

    #[test]
    fn every_note_lands_in_exactly_one_node() {
        let notes = vec![
            note("a", None),
            note("b", Some("")),
            note("c", Some("/")),
            note("d", Some("/X")),
            note("e", Some("/X")),
            note("f", Some("X/Y//Z/")),
            note("g", Some("Deep/Very/Deep/Path")),
        ];
        let root = build_folder_tree(&notes);

        let mut ids = Vec::new();
        collect_ids(&root, &mut ids);
        ids.sort();
        assert_eq!(ids, ["a", "b", "c", "d", "e", "f", "g"]);
        assert_eq!(root.note_count(), notes.len());
    }

    #[test]
    fn root_synonyms_all_classify_as_root() {
        let notes = vec![note("null", None), note("empty", Some("")), note("slash", Some("/"))];

        let root = build_folder_tree(&notes);
        assert!(root.children.is_empty());
        assert_eq!(root.notes.len(), 3);

        let listing = list_at_path(&notes, &FolderPath::root());
        assert!(listing.folders.is_empty());
        assert_eq!(listing.notes.len(), 3);
    }

    #[test]
    fn same_folder_path_resolves_to_same_node() {
        let notes = vec![
            note("1", Some("/Projects/2024")),
            note("2", Some("Projects/2024/")),
        ];
        let root = build_folder_tree(&notes);
        assert_eq!(root.children.len(), 1);
        let year = &root.children[0].children[0];
        assert_eq!(year.notes.len(), 2);
    }

    #[test]
    fn same_named_folders_at_different_depths_stay_distinct() {
        let notes = vec![note("1", Some("/Archive")), note("2", Some("/Projects/Archive"))];
        let root = build_folder_tree(&notes);

        let top = root
            .children
            .iter()
            .find(|child| child.name == "Archive")
            .expect("top-level Archive");
        let nested = root
            .children
            .iter()
            .find(|child| child.name == "Projects")
            .expect("Projects")
            .children
            .first()
            .expect("nested Archive");
        assert_eq!(top.path, FolderPath::parse(Some("/Archive")));
        assert_eq!(nested.path, FolderPath::parse(Some("/Projects/Archive")));
        assert_eq!(top.notes.len(), 1);
        assert_eq!(nested.notes.len(), 1);
    }

    #[test]
    fn children_keep_discovery_order() {
        let notes = vec![
            note("1", Some("/Zeta")),
            note("2", Some("/Alpha")),
            note("3", Some("/Mu")),
            note("4", Some("/Alpha/Inner")),
        ];
        let root = build_folder_tree(&notes);
        let names: Vec<_> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Zeta", "Alpha", "Mu"]);
    }

    #[test]
    fn rebuilding_yields_structurally_equal_trees() {
        let notes = vec![
            note("1", Some("/Projects/2024")),
            note("2", Some("/Projects")),
            note("3", None),
            note("4", Some("/Reading/Queue")),
        ];
        assert_eq!(build_folder_tree(&notes), build_folder_tree(&notes));
    }

    #[test]
    fn listing_returns_immediate_children_and_exact_notes() {
        let notes = vec![
            note("1", Some("/Projects/2024")),
            note("2", Some("/Projects")),
            note("3", None),
        ];
        let listing = list_at_path(&notes, &FolderPath::parse(Some("/Projects")));

        assert_eq!(listing.folders.len(), 1);
        assert_eq!(listing.folders[0].name, "2024");
        assert_eq!(
            listing.folders[0].path,
            FolderPath::parse(Some("/Projects/2024"))
        );
        assert_eq!(listing.notes.len(), 1);
        assert_eq!(listing.notes[0].id, "2");
    }

    #[test]
    fn listing_deduplicates_child_folders_in_first_appearance_order() {
        let notes = vec![
            note("1", Some("/Work/Reports")),
            note("2", Some("/Personal")),
            note("3", Some("/Work/Drafts")),
            note("4", Some("/Work")),
        ];
        let listing = list_at_path(&notes, &FolderPath::root());
        let names: Vec<_> = listing.folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Work", "Personal"]);
        assert_eq!(listing.notes.len(), 0);
    }

    #[test]
    fn listing_excludes_descendants_from_notes() {
        let notes = vec![
            note("1", Some("/Projects")),
            note("2", Some("/Projects/2024")),
            note("3", Some("/Projects/2024/Q1")),
        ];
        let listing = list_at_path(&notes, &FolderPath::parse(Some("/Projects")));
        let ids: Vec<_> = listing.notes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["1"]);
        let names: Vec<_> = listing.folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["2024"]);
    }

    #[test]
    fn listing_every_note_path_equals_requested_path() {
        let notes = vec![
            note("1", Some("/Projects")),
            note("2", Some("Projects")),
            note("3", Some("/Projects/")),
            note("4", Some("/Other")),
        ];
        let current = FolderPath::parse(Some("/Projects"));
        let listing = list_at_path(&notes, &current);
        assert_eq!(listing.notes.len(), 3);
        for entry in &listing.notes {
            assert_eq!(entry.folder, current);
        }
    }

    #[test]
    fn navigating_to_unknown_path_yields_empty_listing() {
        let notes = vec![note("1", Some("/Projects"))];
        let listing = list_at_path(&notes, &FolderPath::parse(Some("/Nowhere/At/All")));
        assert!(listing.is_empty());
    }

    #[test]
    fn filter_by_title_is_case_insensitive_substring() {
        let notes = vec![
            titled("1", "Roadmap Draft", Some("/Projects")),
            titled("2", "Meeting minutes", Some("/Projects")),
            titled("3", "roadMAP review", None),
        ];
        let filtered = filter_by_title(&notes, "roadmap");
        let ids: Vec<_> = filtered.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);

        assert_eq!(filter_by_title(&notes, "").len(), 3);
    }

    #[test]
    fn filtered_tree_drops_folders_without_matches() {
        let notes = vec![
            titled("1", "Roadmap", Some("/Projects")),
            titled("2", "Groceries", Some("/Household")),
        ];
        let tree = build_folder_tree(&filter_by_title(&notes, "roadmap"));
        let names: Vec<_> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Projects"]);
    }
}
