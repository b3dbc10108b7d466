use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::config::DbConfig;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::{ConfigPaths, SortOrder, StorageOptions};
use crate::hierarchy::FolderPath;

mod schema;

/// Domain failures surfaced to the user; transport and setup errors stay in
/// the anyhow chain around them.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("note {id} not found")]
    NoteNotFound { id: String },
    #[error("note title cannot be empty")]
    EmptyTitle,
    #[error("profile name cannot be empty")]
    EmptyProfileName,
    #[error("profile '{name}' already exists")]
    DuplicateProfile { name: String },
    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileRecord {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteRecord {
    pub id: String,
    pub profile_id: String,
    pub title: String,
    pub content: String,
    #[serde(rename = "folder_path")]
    pub folder: FolderPath,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

const NOTE_COLUMNS: &str = "id, profile_id, title, content, folder_path, created_at, updated_at";

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn ensure_profile(&self, name: &str) -> Result<ProfileRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyProfileName.into());
        }
        self.with_connection(|conn| {
            if let Some(existing) = profile_by_name(conn, name)? {
                return Ok(existing);
            }
            let record = ProfileRecord {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                created_at: OffsetDateTime::now_utc().unix_timestamp(),
            };
            conn.execute(
                "INSERT INTO profiles (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![record.id, record.name, record.created_at],
            )
            .context("inserting profile")?;
            seed_initial_notes(conn, &record.id)?;
            Ok(record)
        })
    }

    pub fn create_profile(&self, name: &str) -> Result<ProfileRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyProfileName.into());
        }
        self.with_connection(|conn| {
            if profile_by_name(conn, name)?.is_some() {
                return Err(StoreError::DuplicateProfile {
                    name: name.to_string(),
                }
                .into());
            }
            let record = ProfileRecord {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                created_at: OffsetDateTime::now_utc().unix_timestamp(),
            };
            conn.execute(
                "INSERT INTO profiles (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![record.id, record.name, record.created_at],
            )
            .context("inserting profile")?;
            Ok(record)
        })
    }

    pub fn fetch_profile(&self, name: &str) -> Result<ProfileRecord> {
        let name = name.trim();
        self.with_connection(|conn| {
            profile_by_name(conn, name)?.ok_or_else(|| {
                StoreError::ProfileNotFound {
                    name: name.to_string(),
                }
                .into()
            })
        })
    }

    pub fn list_profiles(&self) -> Result<Vec<ProfileRecord>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, created_at FROM profiles ORDER BY name COLLATE NOCASE",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(ProfileRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
                .context("fetching profiles")
        })
    }

    pub fn create_note(
        &self,
        profile_id: &str,
        title: &str,
        folder: &FolderPath,
    ) -> Result<NoteRecord> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(StoreError::EmptyTitle.into());
        }
        self.with_connection(|conn| {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            let record = NoteRecord {
                id: Uuid::new_v4().to_string(),
                profile_id: profile_id.to_string(),
                title: trimmed.to_string(),
                content: String::new(),
                folder: folder.clone(),
                created_at: now,
                updated_at: now,
            };
            conn.execute(
                "INSERT INTO notes (id, profile_id, title, content, folder_path, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    record.id,
                    record.profile_id,
                    record.title,
                    record.content,
                    folder_column(folder),
                    now
                ],
            )
            .context("inserting note")?;
            Ok(record)
        })
    }

    pub fn list_notes(&self, profile_id: &str, sort: SortOrder) -> Result<Vec<NoteRecord>> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {NOTE_COLUMNS} FROM notes WHERE profile_id = ?1 ORDER BY {}",
                sort.sql_order_by()
            );
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map([profile_id], note_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
    }

    pub fn fetch_note(&self, profile_id: &str, note_id: &str) -> Result<Option<NoteRecord>> {
        self.with_connection(|conn| {
            let sql =
                format!("SELECT {NOTE_COLUMNS} FROM notes WHERE profile_id = ?1 AND id = ?2");
            let mut stmt = conn.prepare(&sql)?;
            let result = stmt
                .query_row(params![profile_id, note_id], note_from_row)
                .optional()?;
            Ok(result)
        })
    }

    pub fn update_note(
        &self,
        profile_id: &str,
        note_id: &str,
        title: &str,
        content: &str,
    ) -> Result<()> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(StoreError::EmptyTitle.into());
        }
        self.with_connection(|conn| {
            let updated = conn
                .execute(
                    "UPDATE notes SET title = ?1, content = ?2
                     WHERE profile_id = ?3 AND id = ?4",
                    params![trimmed, content, profile_id, note_id],
                )
                .context("updating note")?;
            if updated == 0 {
                return Err(StoreError::NoteNotFound {
                    id: note_id.to_string(),
                }
                .into());
            }
            Ok(())
        })
    }

    pub fn delete_note(&self, profile_id: &str, note_id: &str) -> Result<()> {
        self.with_connection(|conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM notes WHERE profile_id = ?1 AND id = ?2",
                    params![profile_id, note_id],
                )
                .context("deleting note")?;
            if deleted == 0 {
                return Err(StoreError::NoteNotFound {
                    id: note_id.to_string(),
                }
                .into());
            }
            Ok(())
        })
    }
}

fn profile_by_name(conn: &Connection, name: &str) -> Result<Option<ProfileRecord>> {
    let record = conn
        .query_row(
            "SELECT id, name, created_at FROM profiles WHERE name = ?1",
            params![name],
            |row| {
                Ok(ProfileRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

fn note_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NoteRecord> {
    let folder: Option<String> = row.get(4)?;
    Ok(NoteRecord {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        folder: FolderPath::parse(folder.as_deref()),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

// Root is stored as NULL so the synonym forms never reach the database.
fn folder_column(folder: &FolderPath) -> Option<String> {
    if folder.is_root() {
        None
    } else {
        Some(folder.to_string())
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = &paths.database_path;
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)
        .context("enabling foreign keys")?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}

fn seed_initial_notes(conn: &Connection, profile_id: &str) -> Result<()> {
    tracing::info!(profile_id, "seeding first-run notes");
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let notes: [(&str, Option<&str>, &str); 3] = [
        (
            "Welcome to Grove",
            None,
            "Notes live in virtual folders named by slash paths.\n\
             This one sits at the root. Press `t` for the tree view, `a` to add a note here.\n",
        ),
        (
            "Folder paths",
            Some("/Guides"),
            "A note's folder is just a path string like /Projects/2024.\n\
             Folders appear the moment a note mentions them and vanish with their last note.\n",
        ),
        (
            "Capture inbox",
            Some("/Inbox"),
            "Drop quick thoughts in /Inbox and file them later by editing the note.\n",
        ),
    ];

    for (title, folder, content) in notes {
        conn.execute(
            "INSERT INTO notes (id, profile_id, title, content, folder_path, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                Uuid::new_v4().to_string(),
                profile_id,
                title,
                content,
                folder,
                now
            ],
        )
        .context("inserting seed note")?;
    }

    Ok(())
}
