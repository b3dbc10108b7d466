use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::Result;
use time::OffsetDateTime;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::{AppConfig, SortOrder};
use crate::hierarchy::{self, FolderNode, FolderPath};
use crate::nav::NavigationState;
use crate::storage::{NoteRecord, StorageHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Browse,
    Tree,
}

/// One visible line in the left pane. Browse mode emits folders then notes
/// at depth 0; tree mode emits the flattened folder tree with indentation.
#[derive(Debug, Clone)]
pub enum Row {
    Folder {
        name: String,
        path: FolderPath,
        depth: usize,
        collapsed: bool,
        note_count: usize,
    },
    Note {
        note: NoteRecord,
        depth: usize,
    },
}

impl Row {
    pub fn note(&self) -> Option<&NoteRecord> {
        match self {
            Row::Note { note, .. } => Some(note),
            Row::Folder { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewNoteOverlay {
    pub title: String,
    pub folder: FolderPath,
}

#[derive(Debug, Clone)]
pub struct RenameNoteOverlay {
    pub note_id: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct DeleteNoteOverlay {
    pub note_id: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub enum OverlayState {
    NewNote(NewNoteOverlay),
    RenameNote(RenameNoteOverlay),
    DeleteNote(DeleteNoteOverlay),
}

#[derive(Debug, Clone, Default)]
pub struct FilterState {
    pub active: bool,
    pub query: String,
}

#[derive(Debug)]
struct Notice {
    text: String,
    expires_at: Instant,
}

/// Plain-text content editor over one note. Cursor movement is grapheme
/// aware; the dirty flag survives a failed save.
#[derive(Debug, Clone)]
pub struct EditorState {
    note_id: String,
    pub title: String,
    pub buffer: String,
    pub cursor: usize,
    pub dirty: bool,
    pub discard_armed: bool,
    preferred_column: Option<usize>,
}

impl EditorState {
    pub fn new(note: &NoteRecord) -> Self {
        let buffer = note.content.clone();
        let cursor = buffer.len();
        Self {
            note_id: note.id.clone(),
            title: note.title.clone(),
            buffer,
            cursor,
            dirty: false,
            discard_armed: false,
            preferred_column: None,
        }
    }

    pub fn note_id(&self) -> &str {
        &self.note_id
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
        self.discard_armed = false;
    }

    pub fn insert_char(&mut self, ch: char) {
        let mut scratch = [0u8; 4];
        let encoded = ch.encode_utf8(&mut scratch);
        self.buffer.insert_str(self.cursor, encoded);
        self.cursor += encoded.len();
        self.after_edit();
    }

    pub fn insert_newline(&mut self) {
        self.buffer.insert(self.cursor, '\n');
        self.cursor += 1;
        self.preferred_column = Some(0);
        self.dirty = true;
        self.discard_armed = false;
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(&self.buffer, self.cursor);
        self.buffer.drain(prev..self.cursor);
        self.cursor = prev;
        self.after_edit();
        true
    }

    pub fn delete(&mut self) -> bool {
        let next = next_grapheme_boundary(&self.buffer, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.buffer.drain(self.cursor..next);
        self.after_edit();
        true
    }

    pub fn move_left(&mut self) {
        self.cursor = prev_grapheme_boundary(&self.buffer, self.cursor);
        self.preferred_column = None;
    }

    pub fn move_right(&mut self) {
        self.cursor = next_grapheme_boundary(&self.buffer, self.cursor);
        self.preferred_column = None;
    }

    pub fn move_home(&mut self) {
        self.cursor = line_start(&self.buffer, self.cursor);
        self.preferred_column = Some(0);
    }

    pub fn move_end(&mut self) {
        self.cursor = line_end(&self.buffer, self.cursor);
        self.preferred_column = None;
    }

    pub fn move_up(&mut self) {
        let start = line_start(&self.buffer, self.cursor);
        let column = self
            .preferred_column
            .unwrap_or_else(|| column_at(&self.buffer, start, self.cursor));
        if start == 0 {
            self.cursor = 0;
            self.preferred_column = Some(column);
            return;
        }
        let prev_start = line_start(&self.buffer, start - 1);
        self.cursor = position_for_column(&self.buffer, prev_start, column);
        self.preferred_column = Some(column);
    }

    pub fn move_down(&mut self) {
        let start = line_start(&self.buffer, self.cursor);
        let column = self
            .preferred_column
            .unwrap_or_else(|| column_at(&self.buffer, start, self.cursor));
        let end = line_end(&self.buffer, self.cursor);
        if end == self.buffer.len() {
            self.cursor = self.buffer.len();
            self.preferred_column = Some(column);
            return;
        }
        self.cursor = position_for_column(&self.buffer, end + 1, column);
        self.preferred_column = Some(column);
    }

    fn after_edit(&mut self) {
        self.dirty = true;
        self.discard_armed = false;
        self.preferred_column = None;
    }
}

#[derive(Debug)]
pub struct AppState {
    pub profile_id: String,
    pub mode: ViewMode,
    pub selected: usize,
    pub records: Vec<NoteRecord>,
    pub nav: NavigationState,
    pub collapsed: HashSet<FolderPath>,
    pub filter: FilterState,
    pub rows: Vec<Row>,
    pub overlay: Option<OverlayState>,
    pub editor: Option<EditorState>,
    pub sort: SortOrder,
    pub confirm_delete: bool,
    pub preview_lines: u16,
    notice: Option<Notice>,
    notice_ttl: Duration,
}

impl AppState {
    pub fn load(storage: &StorageHandle, profile_id: &str, config: &AppConfig) -> Result<Self> {
        let records = storage.list_notes(profile_id, config.sort)?;
        Ok(Self::new(profile_id, records, config))
    }

    pub fn new(profile_id: &str, records: Vec<NoteRecord>, config: &AppConfig) -> Self {
        let mut state = Self {
            profile_id: profile_id.to_string(),
            mode: ViewMode::Browse,
            selected: 0,
            records,
            nav: NavigationState::new(),
            collapsed: HashSet::new(),
            filter: FilterState::default(),
            rows: Vec::new(),
            overlay: None,
            editor: None,
            sort: config.sort,
            confirm_delete: config.ui.confirm_delete,
            preview_lines: config.preview_lines,
            notice: None,
            notice_ttl: config.notices.ttl_ms,
        };
        state.rebuild_rows();
        state
    }

    pub fn refresh(&mut self, storage: &StorageHandle) -> Result<()> {
        self.records = storage.list_notes(&self.profile_id, self.sort)?;
        self.rebuild_rows();
        Ok(())
    }

    /// Rebuilt from scratch after every collection, navigation, filter, or
    /// collapse change.
    pub fn rebuild_rows(&mut self) {
        self.rows = match self.mode {
            ViewMode::Browse => browse_rows(&self.records, self.nav.current()),
            ViewMode::Tree => {
                let visible = hierarchy::filter_by_title(&self.records, &self.filter.query);
                let tree = hierarchy::build_folder_tree(&visible);
                let mut rows = Vec::new();
                flatten_node(&tree, 0, &self.collapsed, &mut rows);
                rows
            }
        };
        self.normalize_selection();
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn selected_row(&self) -> Option<&Row> {
        self.rows.get(self.selected)
    }

    pub fn selected_note(&self) -> Option<&NoteRecord> {
        self.selected_row().and_then(Row::note)
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.rows.is_empty() {
            return;
        }
        let last = (self.rows.len() - 1) as isize;
        let next = (self.selected as isize + delta).clamp(0, last);
        self.selected = next as usize;
    }

    pub fn select_note_by_id(&mut self, note_id: &str) {
        if let Some(idx) = self
            .rows
            .iter()
            .position(|row| row.note().is_some_and(|note| note.id == note_id))
        {
            self.selected = idx;
        } else {
            self.normalize_selection();
        }
    }

    pub fn navigate_to(&mut self, path: FolderPath) {
        self.nav.navigate_to(path);
        self.selected = 0;
        self.rebuild_rows();
    }

    pub fn ascend(&mut self) -> bool {
        if self.nav.ascend() {
            self.selected = 0;
            self.rebuild_rows();
            true
        } else {
            false
        }
    }

    pub fn jump_to_root(&mut self) {
        self.nav.jump_to_root();
        self.selected = 0;
        self.rebuild_rows();
    }

    pub fn jump_to_crumb(&mut self, segment_index: usize) -> bool {
        if self.nav.jump(segment_index) {
            self.selected = 0;
            self.rebuild_rows();
            true
        } else {
            false
        }
    }

    pub fn toggle_mode(&mut self) -> ViewMode {
        self.mode = match self.mode {
            ViewMode::Browse => ViewMode::Tree,
            ViewMode::Tree => ViewMode::Browse,
        };
        self.selected = 0;
        self.rebuild_rows();
        self.mode
    }

    pub fn toggle_collapsed(&mut self, path: &FolderPath) {
        if !self.collapsed.remove(path) {
            self.collapsed.insert(path.clone());
        }
        self.rebuild_rows();
    }

    // Local reconciliation after storage calls: create prepends, update maps
    // in place, delete filters. A failed call leaves the collection alone.
    pub fn note_created(&mut self, record: NoteRecord) {
        let id = record.id.clone();
        self.records.insert(0, record);
        self.rebuild_rows();
        self.select_note_by_id(&id);
    }

    pub fn note_updated(&mut self, note_id: &str, title: &str, content: &str) {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if let Some(record) = self.records.iter_mut().find(|r| r.id == note_id) {
            record.title = title.to_string();
            record.content = content.to_string();
            record.updated_at = now;
        }
        self.rebuild_rows();
        self.select_note_by_id(note_id);
    }

    pub fn note_deleted(&mut self, note_id: &str) {
        self.records.retain(|record| record.id != note_id);
        self.rebuild_rows();
    }

    pub fn is_editing(&self) -> bool {
        self.editor.is_some()
    }

    pub fn editor(&self) -> Option<&EditorState> {
        self.editor.as_ref()
    }

    pub fn editor_mut(&mut self) -> Option<&mut EditorState> {
        self.editor.as_mut()
    }

    pub fn open_editor(&mut self, note: &NoteRecord) {
        self.editor = Some(EditorState::new(note));
    }

    pub fn close_editor(&mut self) {
        self.editor = None;
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    pub fn open_new_note(&mut self) {
        self.overlay = Some(OverlayState::NewNote(NewNoteOverlay {
            title: String::new(),
            folder: self.nav.current().clone(),
        }));
    }

    pub fn open_rename_note(&mut self) {
        if let Some(note) = self.selected_note() {
            self.overlay = Some(OverlayState::RenameNote(RenameNoteOverlay {
                note_id: note.id.clone(),
                title: note.title.clone(),
            }));
        }
    }

    pub fn open_delete_note(&mut self) {
        if let Some(note) = self.selected_note() {
            self.overlay = Some(OverlayState::DeleteNote(DeleteNoteOverlay {
                note_id: note.id.clone(),
                title: note.title.clone(),
            }));
        }
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    pub fn overlay_input_mut(&mut self) -> Option<&mut String> {
        match self.overlay.as_mut() {
            Some(OverlayState::NewNote(draft)) => Some(&mut draft.title),
            Some(OverlayState::RenameNote(draft)) => Some(&mut draft.title),
            _ => None,
        }
    }

    pub fn start_filter(&mut self) {
        self.filter.active = true;
    }

    pub fn finish_filter(&mut self) {
        self.filter.active = false;
    }

    pub fn cancel_filter(&mut self) {
        self.filter.active = false;
        self.filter.query.clear();
        self.rebuild_rows();
    }

    pub fn push_filter_char(&mut self, ch: char) {
        self.filter.query.push(ch);
        self.rebuild_rows();
    }

    pub fn pop_filter_char(&mut self) {
        if self.filter.query.pop().is_some() {
            self.rebuild_rows();
        }
    }

    pub fn notify<S: Into<String>>(&mut self, text: S) {
        self.notice = Some(Notice {
            text: text.into(),
            expires_at: Instant::now() + self.notice_ttl,
        });
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|notice| notice.text.as_str())
    }

    pub fn expire_notice(&mut self) {
        if self
            .notice
            .as_ref()
            .is_some_and(|notice| Instant::now() >= notice.expires_at)
        {
            self.notice = None;
        }
    }

    fn normalize_selection(&mut self) {
        if self.rows.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.rows.len() {
            self.selected = self.rows.len() - 1;
        }
    }
}

fn browse_rows(records: &[NoteRecord], current: &FolderPath) -> Vec<Row> {
    let listing = hierarchy::list_at_path(records, current);
    let mut rows = Vec::with_capacity(listing.folders.len() + listing.notes.len());
    for entry in listing.folders {
        let note_count = records
            .iter()
            .filter(|record| record.folder == entry.path || record.folder.descends_from(&entry.path))
            .count();
        rows.push(Row::Folder {
            name: entry.name,
            path: entry.path,
            depth: 0,
            collapsed: false,
            note_count,
        });
    }
    for note in listing.notes {
        rows.push(Row::Note { note, depth: 0 });
    }
    rows
}

fn flatten_node(node: &FolderNode, depth: usize, collapsed: &HashSet<FolderPath>, out: &mut Vec<Row>) {
    for child in &node.children {
        let is_collapsed = collapsed.contains(&child.path);
        out.push(Row::Folder {
            name: child.name.clone(),
            path: child.path.clone(),
            depth,
            collapsed: is_collapsed,
            note_count: child.note_count(),
        });
        if !is_collapsed {
            flatten_node(child, depth + 1, collapsed, out);
        }
    }
    for note in &node.notes {
        out.push(Row::Note {
            note: note.clone(),
            depth,
        });
    }
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    let mut last = 0;
    for (idx, _) in text[..cursor].grapheme_indices(true) {
        last = idx;
    }
    last
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    match text[cursor..].graphemes(true).next() {
        Some(grapheme) => cursor + grapheme.len(),
        None => text.len(),
    }
}

fn line_start(text: &str, cursor: usize) -> usize {
    text[..cursor].rfind('\n').map(|idx| idx + 1).unwrap_or(0)
}

fn line_end(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .find('\n')
        .map(|idx| cursor + idx)
        .unwrap_or(text.len())
}

fn column_at(text: &str, line_start: usize, cursor: usize) -> usize {
    text[line_start..cursor].graphemes(true).count()
}

fn position_for_column(text: &str, line_start: usize, column: usize) -> usize {
    let line_end = line_end(text, line_start);
    let mut position = line_start;
    for (count, grapheme) in text[line_start..line_end].graphemes(true).enumerate() {
        if count >= column {
            return position;
        }
        position += grapheme.len();
    }
    position
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::hierarchy::FolderPath;

    fn note(id: &str, title: &str, folder: Option<&str>) -> NoteRecord {
        NoteRecord {
            id: id.to_string(),
            profile_id: "p1".to_string(),
            title: title.to_string(),
            content: String::new(),
            folder: FolderPath::parse(folder),
            created_at: 0,
            updated_at: 0,
        }
    }

    fn state_with(records: Vec<NoteRecord>) -> AppState {
        AppState::new("p1", records, &AppConfig::default())
    }

    fn row_labels(state: &AppState) -> Vec<String> {
        state
            .rows
            .iter()
            .map(|row| match row {
                Row::Folder { name, .. } => format!("{name}/"),
                Row::Note { note, .. } => note.title.clone(),
            })
            .collect()
    }

    #[test]
    fn browse_rows_list_folders_before_notes() {
        let state = state_with(vec![
            note("1", "Quarterly plan", Some("/Projects/2024")),
            note("2", "Project index", Some("/Projects")),
            note("3", "Scratch", None),
        ]);
        assert_eq!(row_labels(&state), ["Projects/", "Scratch"]);
    }

    #[test]
    fn navigation_descends_and_ascends() {
        let mut state = state_with(vec![
            note("1", "Quarterly plan", Some("/Projects/2024")),
            note("2", "Project index", Some("/Projects")),
        ]);
        state.navigate_to(FolderPath::parse(Some("/Projects")));
        assert_eq!(row_labels(&state), ["2024/", "Project index"]);

        assert!(state.ascend());
        assert_eq!(row_labels(&state), ["Projects/"]);
        assert!(!state.ascend());
    }

    #[test]
    fn navigating_to_unknown_folder_shows_empty_rows() {
        let mut state = state_with(vec![note("1", "One", Some("/Projects"))]);
        state.navigate_to(FolderPath::parse(Some("/Nowhere")));
        assert!(state.is_empty());
    }

    #[test]
    fn folder_rows_count_descendant_notes() {
        let state = state_with(vec![
            note("1", "A", Some("/Projects")),
            note("2", "B", Some("/Projects/2024")),
            note("3", "C", Some("/Projects/2024/Q1")),
        ]);
        match &state.rows[0] {
            Row::Folder { note_count, .. } => assert_eq!(*note_count, 3),
            other => panic!("expected folder row, got {other:?}"),
        }
    }

    #[test]
    fn tree_mode_flattens_with_depth() {
        let mut state = state_with(vec![
            note("1", "Quarterly plan", Some("/Projects/2024")),
            note("2", "Project index", Some("/Projects")),
            note("3", "Scratch", None),
        ]);
        state.toggle_mode();
        assert_eq!(
            row_labels(&state),
            ["Projects/", "2024/", "Quarterly plan", "Project index", "Scratch"]
        );
        let depths: Vec<_> = state
            .rows
            .iter()
            .map(|row| match row {
                Row::Folder { depth, .. } | Row::Note { depth, .. } => *depth,
            })
            .collect();
        assert_eq!(depths, [0, 1, 2, 1, 0]);
    }

    #[test]
    fn collapsing_a_folder_hides_its_subtree() {
        let mut state = state_with(vec![
            note("1", "Quarterly plan", Some("/Projects/2024")),
            note("2", "Project index", Some("/Projects")),
            note("3", "Scratch", None),
        ]);
        state.toggle_mode();
        state.toggle_collapsed(&FolderPath::parse(Some("/Projects")));
        assert_eq!(row_labels(&state), ["Projects/", "Scratch"]);

        state.toggle_collapsed(&FolderPath::parse(Some("/Projects")));
        assert_eq!(state.rows.len(), 5);
    }

    #[test]
    fn title_filter_drops_folders_without_matches() {
        let mut state = state_with(vec![
            note("1", "Roadmap", Some("/Projects")),
            note("2", "Groceries", Some("/Household")),
        ]);
        state.toggle_mode();
        state.start_filter();
        for ch in "road".chars() {
            state.push_filter_char(ch);
        }
        assert_eq!(row_labels(&state), ["Projects/", "Roadmap"]);

        state.cancel_filter();
        assert_eq!(state.rows.len(), 4);
    }

    #[test]
    fn note_created_prepends_and_selects() {
        let mut state = state_with(vec![note("1", "Existing", None)]);
        state.note_created(note("2", "Fresh", None));
        assert_eq!(state.records[0].id, "2");
        assert_eq!(state.selected_note().map(|n| n.id.as_str()), Some("2"));
    }

    #[test]
    fn note_updated_maps_in_place() {
        let mut state = state_with(vec![note("1", "Draft", None)]);
        state.note_updated("1", "Final", "done");
        assert_eq!(state.records.len(), 1);
        assert_eq!(state.records[0].title, "Final");
        assert_eq!(state.records[0].content, "done");
        assert!(state.records[0].updated_at > 0);
    }

    #[test]
    fn note_deleted_filters_the_collection() {
        let mut state = state_with(vec![note("1", "Keep", None), note("2", "Drop", None)]);
        state.note_deleted("2");
        assert_eq!(state.records.len(), 1);
        assert_eq!(row_labels(&state), ["Keep"]);
    }

    #[test]
    fn editor_tracks_dirty_and_discard_arming() {
        let record = note("1", "Title", None);
        let mut editor = EditorState::new(&record);
        assert!(!editor.is_dirty());
        editor.insert_char('x');
        assert!(editor.is_dirty());
        editor.discard_armed = true;
        editor.insert_char('y');
        assert!(!editor.discard_armed, "editing disarms a pending discard");
        editor.mark_clean();
        assert!(!editor.is_dirty());
    }

    #[test]
    fn editor_cursor_moves_by_grapheme() {
        let mut record = note("1", "Title", None);
        record.content = "héllo".to_string();
        let mut editor = EditorState::new(&record);
        assert_eq!(editor.cursor(), editor.buffer().len());
        editor.move_left();
        editor.move_left();
        editor.move_left();
        editor.move_left();
        assert_eq!(&editor.buffer()[editor.cursor()..editor.cursor() + 2], "é");
        assert!(editor.backspace());
        assert_eq!(editor.buffer(), "éllo");
    }

    #[test]
    fn editor_vertical_movement_keeps_column() {
        let mut record = note("1", "Title", None);
        record.content = "alpha\nlong second line\nxy".to_string();
        let mut editor = EditorState::new(&record);
        editor.move_up();
        editor.move_home();
        editor.move_right();
        editor.move_right();
        editor.move_down();
        assert_eq!(editor.cursor(), "alpha\nlong second line\nxy".len());
    }
}
