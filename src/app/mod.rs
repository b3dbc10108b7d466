use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;

use crate::config::AppConfig;
use crate::storage::{ProfileRecord, StorageHandle};
use crate::ui;

mod actions;
pub mod state;

use actions::ActionDispatcher;
pub use state::{AppState, EditorState, OverlayState, Row, ViewMode};

enum Action {
    Quit,
    SelectNext,
    SelectPrevious,
    Activate,
    Ascend,
    JumpRoot,
    JumpCrumb(usize),
    NewNote,
    RenameNote,
    DeleteNote,
    ToggleTree,
    ToggleCollapse,
    StartFilter,
    Refresh,
}

pub struct App {
    pub config: Arc<AppConfig>,
    pub storage: StorageHandle,
    profile: ProfileRecord,
    state: AppState,
    list_state: ListState,
    should_quit: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, storage: StorageHandle, profile: ProfileRecord) -> Result<Self> {
        let state = AppState::load(&storage, &profile.id, &config)
            .context("loading notes for initial state")?;
        let mut list_state = ListState::default();
        if !state.is_empty() {
            list_state.select(Some(state.selected));
        }
        Ok(Self {
            config,
            storage,
            profile,
            state,
            list_state,
            should_quit: false,
            tick_rate: Duration::from_millis(250),
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        restore_terminal(&mut terminal)?;
        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            terminal
                .draw(|frame| {
                    if self.state.is_empty() {
                        self.list_state.select(None);
                    } else {
                        self.list_state.select(Some(self.state.selected));
                    }
                    ui::draw_app(frame, &self.state, &mut self.list_state);
                })
                .context("rendering frame")?;

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or(Duration::ZERO);

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => {
                        // next draw adapts to the new size
                    }
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.state.expire_notice();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.handle_overlay_key(key) {
            return;
        }

        if self.state.is_editing() && self.handle_editor_key(key) {
            return;
        }

        if self.state.filter.active {
            match key.code {
                KeyCode::Esc => {
                    self.state.cancel_filter();
                    return;
                }
                KeyCode::Enter => {
                    self.state.finish_filter();
                    return;
                }
                KeyCode::Backspace => {
                    self.state.pop_filter_char();
                    return;
                }
                KeyCode::Char(ch) if plain(key) => {
                    self.state.push_filter_char(ch);
                    return;
                }
                _ => {}
            }
        }

        let action = match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('j') | KeyCode::Down => Some(Action::SelectNext),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::SelectPrevious),
            KeyCode::Enter => Some(Action::Activate),
            KeyCode::Backspace => Some(Action::Ascend),
            KeyCode::Char('g') if plain(key) => Some(Action::JumpRoot),
            KeyCode::Char(ch @ '1'..='9') if plain(key) => {
                Some(Action::JumpCrumb(ch as usize - '1' as usize))
            }
            KeyCode::Char('a') if plain(key) => Some(Action::NewNote),
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Refresh)
            }
            KeyCode::Char('r') if plain(key) => Some(Action::RenameNote),
            KeyCode::Char('d') if plain(key) => Some(Action::DeleteNote),
            KeyCode::Char('t') if plain(key) => Some(Action::ToggleTree),
            KeyCode::Char(' ') if plain(key) => Some(Action::ToggleCollapse),
            KeyCode::Char('/') if plain(key) => Some(Action::StartFilter),
            _ => None,
        };

        if let Some(action) = action {
            self.handle_action(action);
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => {
                if self.state.is_editing() && !self.try_close_editor() {
                    return;
                }
                self.should_quit = true;
            }
            Action::SelectNext => self.state.move_selection(1),
            Action::SelectPrevious => self.state.move_selection(-1),
            Action::Activate => self.handle_activate(),
            Action::Ascend => {
                if !self.state.ascend() {
                    self.state.notify("Already at the root folder");
                }
            }
            Action::JumpRoot => self.state.jump_to_root(),
            Action::JumpCrumb(index) => {
                if !self.state.jump_to_crumb(index) {
                    self.state.notify("No such breadcrumb segment");
                }
            }
            Action::NewNote => {
                if self.state.overlay().is_none() {
                    self.state.open_new_note();
                    self.state.notify("New note: type a title, Enter to create");
                }
            }
            Action::RenameNote => {
                if self.state.overlay().is_some() {
                    return;
                }
                if self.state.selected_note().is_none() {
                    self.state.notify("No note selected");
                    return;
                }
                self.state.open_rename_note();
                self.state.notify("Rename: edit the title, Enter to save");
            }
            Action::DeleteNote => self.handle_delete_note(),
            Action::ToggleTree => {
                let mode = self.state.toggle_mode();
                let message = match mode {
                    ViewMode::Tree => "Tree view: Space collapse, / filter, t back",
                    ViewMode::Browse => "Browse view",
                };
                self.state.notify(message);
            }
            Action::ToggleCollapse => {
                if self.state.mode != ViewMode::Tree {
                    return;
                }
                if let Some(Row::Folder { path, .. }) = self.state.selected_row() {
                    let path = path.clone();
                    self.state.toggle_collapsed(&path);
                }
            }
            Action::StartFilter => {
                if self.state.mode == ViewMode::Tree {
                    self.state.start_filter();
                } else {
                    self.state.notify("Filter is available in the tree view (t)");
                }
            }
            Action::Refresh => match self.state.refresh(&self.storage) {
                Ok(()) => self.state.notify("Reloaded from storage"),
                Err(err) => {
                    tracing::error!(?err, "failed to reload notes");
                    self.state.notify(format!("Reload failed: {err}"));
                }
            },
        }
    }

    fn handle_activate(&mut self) {
        let Some(row) = self.state.selected_row().cloned() else {
            return;
        };
        match row {
            Row::Folder { path, .. } => match self.state.mode {
                ViewMode::Browse => self.state.navigate_to(path),
                ViewMode::Tree => self.state.toggle_collapsed(&path),
            },
            Row::Note { note, .. } => {
                self.state.open_editor(&note);
                self.state
                    .notify("Editing: Ctrl-s save, Esc exit (twice to discard)");
            }
        }
    }

    fn handle_delete_note(&mut self) {
        if self.state.overlay().is_some() {
            return;
        }
        let Some(note) = self.state.selected_note() else {
            self.state.notify("No note selected");
            return;
        };
        if self.state.confirm_delete {
            self.state.open_delete_note();
            self.state.notify("Delete permanently? Enter confirm, Esc cancel");
        } else {
            let note_id = note.id.clone();
            self.delete_note(&note_id);
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> bool {
        match self.state.overlay() {
            Some(OverlayState::NewNote(_)) | Some(OverlayState::RenameNote(_)) => {
                let renaming = matches!(self.state.overlay(), Some(OverlayState::RenameNote(_)));
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state
                            .notify(if renaming { "Rename canceled" } else { "Canceled" });
                    }
                    KeyCode::Enter => {
                        if renaming {
                            self.submit_rename_note();
                        } else {
                            self.submit_new_note();
                        }
                    }
                    KeyCode::Backspace => {
                        if let Some(input) = self.state.overlay_input_mut() {
                            input.pop();
                        }
                    }
                    KeyCode::Char(ch) if plain(key) => {
                        if let Some(input) = self.state.overlay_input_mut() {
                            if input.len() < 120 {
                                input.push(ch);
                            }
                        }
                    }
                    _ => {}
                }
                true
            }
            Some(OverlayState::DeleteNote(_)) => {
                match key.code {
                    KeyCode::Esc => {
                        self.state.close_overlay();
                        self.state.notify("Delete canceled");
                    }
                    KeyCode::Enter => {
                        let note_id = match self.state.overlay() {
                            Some(OverlayState::DeleteNote(draft)) => draft.note_id.clone(),
                            _ => return true,
                        };
                        self.state.close_overlay();
                        self.delete_note(&note_id);
                    }
                    _ => {}
                }
                true
            }
            None => false,
        }
    }

    fn submit_new_note(&mut self) {
        let Some(OverlayState::NewNote(draft)) = self.state.overlay() else {
            return;
        };
        let title = draft.title.trim().to_string();
        let folder = draft.folder.clone();
        if title.is_empty() {
            self.state.notify("Title cannot be empty");
            return;
        }
        let dispatcher = ActionDispatcher::new(&self.storage, &self.profile.id);
        match dispatcher.create_note(&title, &folder) {
            Ok(record) => {
                self.state.close_overlay();
                let location = record.folder.to_string();
                self.state.note_created(record);
                self.state.notify(format!("Created note in {location}"));
            }
            Err(err) => {
                tracing::error!(?err, "failed to create note");
                self.state.notify(format!("Create failed: {err}"));
            }
        }
    }

    fn submit_rename_note(&mut self) {
        let Some(OverlayState::RenameNote(draft)) = self.state.overlay() else {
            return;
        };
        let note_id = draft.note_id.clone();
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            self.state.notify("Title cannot be empty");
            return;
        }
        let dispatcher = ActionDispatcher::new(&self.storage, &self.profile.id);
        match dispatcher.rename_note(&note_id, &title) {
            Ok(()) => {
                let content = self
                    .state
                    .records
                    .iter()
                    .find(|record| record.id == note_id)
                    .map(|record| record.content.clone())
                    .unwrap_or_default();
                self.state.close_overlay();
                self.state.note_updated(&note_id, &title, &content);
                self.state.notify("Note renamed");
            }
            Err(err) => {
                tracing::error!(?err, note_id, "failed to rename note");
                self.state.notify(format!("Rename failed: {err}"));
            }
        }
    }

    fn delete_note(&mut self, note_id: &str) {
        let dispatcher = ActionDispatcher::new(&self.storage, &self.profile.id);
        match dispatcher.delete_note(note_id) {
            Ok(()) => {
                self.state.note_deleted(note_id);
                self.state.notify("Note deleted");
            }
            Err(err) => {
                tracing::error!(?err, note_id, "failed to delete note");
                self.state.notify(format!("Delete failed: {err}"));
            }
        }
    }

    fn handle_editor_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if let KeyCode::Char('s') = key.code {
                self.save_editor();
                return true;
            }
        }

        match key.code {
            KeyCode::Esc => {
                if self.try_close_editor() {
                    self.state.notify("Closed editor");
                }
                true
            }
            KeyCode::Enter => {
                if let Some(editor) = self.state.editor_mut() {
                    editor.insert_newline();
                }
                true
            }
            KeyCode::Backspace => {
                if let Some(editor) = self.state.editor_mut() {
                    editor.backspace();
                }
                true
            }
            KeyCode::Delete => {
                if let Some(editor) = self.state.editor_mut() {
                    editor.delete();
                }
                true
            }
            KeyCode::Tab => {
                if let Some(editor) = self.state.editor_mut() {
                    editor.insert_char('\t');
                }
                true
            }
            KeyCode::Char(ch) if plain(key) => {
                if let Some(editor) = self.state.editor_mut() {
                    editor.insert_char(ch);
                }
                true
            }
            KeyCode::Left => {
                if let Some(editor) = self.state.editor_mut() {
                    editor.move_left();
                }
                true
            }
            KeyCode::Right => {
                if let Some(editor) = self.state.editor_mut() {
                    editor.move_right();
                }
                true
            }
            KeyCode::Up => {
                if let Some(editor) = self.state.editor_mut() {
                    editor.move_up();
                }
                true
            }
            KeyCode::Down => {
                if let Some(editor) = self.state.editor_mut() {
                    editor.move_down();
                }
                true
            }
            KeyCode::Home => {
                if let Some(editor) = self.state.editor_mut() {
                    editor.move_home();
                }
                true
            }
            KeyCode::End => {
                if let Some(editor) = self.state.editor_mut() {
                    editor.move_end();
                }
                true
            }
            _ => false,
        }
    }

    fn save_editor(&mut self) {
        let Some(editor) = self.state.editor() else {
            return;
        };
        if !editor.is_dirty() {
            self.state.notify("No changes to save");
            return;
        }
        let note_id = editor.note_id().to_string();
        let title = editor.title.clone();
        let content = editor.buffer().to_string();
        let dispatcher = ActionDispatcher::new(&self.storage, &self.profile.id);
        match dispatcher.save_content(&note_id, &title, &content) {
            Ok(()) => {
                if let Some(editor) = self.state.editor_mut() {
                    editor.mark_clean();
                }
                self.state.note_updated(&note_id, &title, &content);
                self.state.notify("Changes saved");
            }
            Err(err) => {
                // dirty flag stays set; the buffer is the user's only copy
                tracing::error!(?err, note_id, "failed to save note content");
                self.state.notify(format!("Save failed: {err}"));
            }
        }
    }

    /// Esc on a dirty editor arms a discard; the second Esc closes without
    /// saving. Returns true if the editor was closed.
    fn try_close_editor(&mut self) -> bool {
        let Some(editor) = self.state.editor_mut() else {
            return true;
        };
        if editor.is_dirty() && !editor.discard_armed {
            editor.discard_armed = true;
            self.state
                .notify("Unsaved changes: Esc again to discard, Ctrl-s to save");
            return false;
        }
        self.state.close_editor();
        true
    }
}

fn plain(key: KeyEvent) -> bool {
    !key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER)
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("restoring screen state")?;
    Ok(())
}
