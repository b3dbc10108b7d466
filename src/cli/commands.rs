use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::app::App;
use crate::config::{AppConfig, SortOrder};
use crate::hierarchy::{
    build_folder_tree, filter_by_title, list_at_path, FolderListing, FolderNode, FolderPath,
};
use crate::storage::{NoteRecord, StorageHandle};

#[derive(Args, Debug, Clone)]
pub struct NewArgs {
    /// Title for the note (prompted if omitted)
    #[arg()]
    pub title: Option<String>,
    /// Folder path for the note, e.g. /Projects/2024 (root if omitted)
    #[arg(long)]
    pub folder: Option<String>,
    /// Provide the note content inline, or `-` to read stdin. If omitted,
    /// piped stdin is used when present.
    #[arg(long)]
    pub content: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LsArgs {
    /// Folder path to list (root if omitted)
    #[arg()]
    pub path: Option<String>,
    /// Print the listing as JSON
    #[arg(long)]
    pub json: bool,
    /// Note ordering (updated-desc, updated-asc, created-desc, title-asc)
    #[arg(long)]
    pub sort: Option<SortOrder>,
}

#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    /// Only include notes whose title contains this text
    #[arg(long)]
    pub filter: Option<String>,
    /// Print the tree as JSON
    #[arg(long)]
    pub json: bool,
    /// Note ordering within each folder
    #[arg(long)]
    pub sort: Option<SortOrder>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    /// Note identifier
    pub id: String,
    /// New title (unchanged if omitted)
    #[arg(long)]
    pub title: Option<String>,
    /// New content (unchanged if omitted), or `-` to read stdin
    #[arg(long)]
    pub content: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RmArgs {
    /// Note identifier
    pub id: String,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProfileCommand {
    /// Create a new profile
    Create(ProfileCreateArgs),
    /// List all profiles
    List,
}

#[derive(Args, Debug, Clone)]
pub struct ProfileCreateArgs {
    /// Profile name
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommand,
}

pub fn run_tui(app: &mut App) -> Result<()> {
    app.run()
}

pub fn new_note(
    _config: Arc<AppConfig>,
    storage: StorageHandle,
    profile_id: &str,
    args: NewArgs,
) -> Result<()> {
    let mut title = match args.title {
        Some(t) => t,
        None => prompt("Title")?,
    };
    title = title.trim().to_owned();
    if title.is_empty() {
        bail!("note title cannot be empty");
    }
    let folder = FolderPath::parse(args.folder.as_deref());
    let content = match args.content {
        Some(content) if content == "-" => {
            read_stdin()?.context("`--content -` requires piped stdin")?
        }
        Some(content) => content,
        None => read_stdin()?.unwrap_or_default(),
    };

    let note = create_note(&storage, profile_id, &title, &folder, &content)
        .context("creating note")?;
    println!("Created note {} in {}", note.id, note.folder);
    Ok(())
}

fn create_note(
    storage: &StorageHandle,
    profile_id: &str,
    title: &str,
    folder: &FolderPath,
    content: &str,
) -> Result<NoteRecord> {
    let mut note = storage.create_note(profile_id, title, folder)?;
    if !content.is_empty() {
        storage.update_note(profile_id, &note.id, title, content)?;
        note.content = content.to_owned();
    }
    Ok(note)
}

pub fn list_folder(
    config: Arc<AppConfig>,
    storage: StorageHandle,
    profile_id: &str,
    args: LsArgs,
) -> Result<()> {
    let sort = args.sort.unwrap_or(config.sort);
    let records = storage.list_notes(profile_id, sort)?;
    let path = FolderPath::parse(args.path.as_deref());
    let listing = list_at_path(&records, &path);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        print!("{}", format_listing(&listing));
    }
    Ok(())
}

fn format_listing(listing: &FolderListing) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "{}", listing.path);
    if listing.is_empty() {
        let _ = writeln!(&mut out, "(empty)");
        return out;
    }
    for folder in &listing.folders {
        let _ = writeln!(&mut out, "  {}/", folder.name);
    }
    for note in &listing.notes {
        let _ = writeln!(
            &mut out,
            "  {}  {}  {}",
            note.id,
            note.title,
            format_timestamp(note.updated_at)
        );
    }
    out
}

pub fn print_tree(
    config: Arc<AppConfig>,
    storage: StorageHandle,
    profile_id: &str,
    args: TreeArgs,
) -> Result<()> {
    let sort = args.sort.unwrap_or(config.sort);
    let mut records = storage.list_notes(profile_id, sort)?;
    if let Some(needle) = &args.filter {
        records = filter_by_title(&records, needle);
    }
    let tree = build_folder_tree(&records);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print!("{}", render_tree(&tree));
    }
    Ok(())
}

fn render_tree(root: &FolderNode) -> String {
    let mut out = String::new();
    let _ = writeln!(&mut out, "{} /", root.name);
    render_subtree(root, "", &mut out);
    out
}

fn render_subtree(node: &FolderNode, prefix: &str, out: &mut String) {
    let total = node.children.len() + node.notes.len();
    let mut index = 0;
    for child in &node.children {
        index += 1;
        let last = index == total;
        let connector = if last { "└── " } else { "├── " };
        let _ = writeln!(out, "{prefix}{connector}{}/", child.name);
        let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
        render_subtree(child, &child_prefix, out);
    }
    for note in &node.notes {
        index += 1;
        let connector = if index == total { "└── " } else { "├── " };
        let _ = writeln!(out, "{prefix}{connector}{}", note.title);
    }
}

pub fn edit_note(storage: StorageHandle, profile_id: &str, args: EditArgs) -> Result<()> {
    if args.title.is_none() && args.content.is_none() {
        bail!("nothing to change; pass --title and/or --content");
    }
    let note = storage
        .fetch_note(profile_id, &args.id)?
        .with_context(|| format!("note {} not found", args.id))?;

    let content = match args.content {
        Some(content) if content == "-" => {
            Some(read_stdin()?.context("`--content -` requires piped stdin")?)
        }
        other => other,
    };
    let title = args.title.as_deref().unwrap_or(&note.title);
    let content = content.as_deref().unwrap_or(&note.content);
    storage
        .update_note(profile_id, &args.id, title, content)
        .with_context(|| format!("updating note {}", args.id))?;
    println!("Updated note {}", args.id);
    Ok(())
}

pub fn remove_note(
    config: Arc<AppConfig>,
    storage: StorageHandle,
    profile_id: &str,
    args: RmArgs,
) -> Result<()> {
    let note = storage
        .fetch_note(profile_id, &args.id)?
        .with_context(|| format!("note {} not found", args.id))?;

    if !args.yes && config.ui.confirm_delete {
        let answer = prompt(&format!("Permanently delete '{}'? [y/N]", note.title))?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }

    storage
        .delete_note(profile_id, &args.id)
        .with_context(|| format!("deleting note {}", args.id))?;
    println!("Deleted note {} ({})", args.id, note.title);
    Ok(())
}

pub fn handle_profile_command(storage: StorageHandle, args: ProfileArgs) -> Result<()> {
    match args.command {
        ProfileCommand::Create(create) => {
            let profile = storage
                .create_profile(&create.name)
                .with_context(|| format!("creating profile '{}'", create.name))?;
            println!("Created profile '{}' ({})", profile.name, profile.id);
            Ok(())
        }
        ProfileCommand::List => {
            let profiles = storage.list_profiles()?;
            if profiles.is_empty() {
                println!("(no profiles)");
                return Ok(());
            }
            for profile in profiles {
                println!(
                    "{}  {}  created {}",
                    profile.id,
                    profile.name,
                    format_timestamp(profile.created_at)
                );
            }
            Ok(())
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

fn format_timestamp(epoch: i64) -> String {
    OffsetDateTime::from_unix_timestamp(epoch)
        .map(|dt| dt.format(&Rfc3339).unwrap_or_else(|_| epoch.to_string()))
        .unwrap_or_else(|_| epoch.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigPaths, StorageOptions};
    use crate::storage;
    use tempfile::TempDir;

    type TestResult<T = ()> = Result<T>;

    fn setup_storage() -> TestResult<(TempDir, StorageHandle, String)> {
        let temp = TempDir::new().context("creating temp dir")?;
        let root = temp.path();
        let paths = ConfigPaths {
            config_dir: root.join("config"),
            config_file: root.join("config/config.toml"),
            data_dir: root.join("data"),
            database_path: root.join("data/grove.db"),
        };
        std::fs::create_dir_all(&paths.config_dir)?;
        std::fs::create_dir_all(&paths.data_dir)?;
        let mut storage_opts = StorageOptions::default();
        storage_opts.database_path = paths.database_path.clone();

        let handle = storage::init(&paths, &storage_opts)?;
        let profile = handle.create_profile("cli-tests")?;
        Ok((temp, handle, profile.id))
    }

    fn seed(storage: &StorageHandle, profile_id: &str, title: &str, folder: Option<&str>) {
        storage
            .create_note(profile_id, title, &FolderPath::parse(folder))
            .expect("seed note");
    }

    #[test]
    fn create_note_stores_folder_and_content() -> TestResult {
        let (_temp, storage, profile_id) = setup_storage()?;
        let note = create_note(
            &storage,
            &profile_id,
            "Quarterly plan",
            &FolderPath::parse(Some("/Projects/2024")),
            "kickoff in March",
        )?;

        let fetched = storage
            .fetch_note(&profile_id, &note.id)?
            .expect("note persisted");
        assert_eq!(fetched.title, "Quarterly plan");
        assert_eq!(fetched.content, "kickoff in March");
        assert_eq!(fetched.folder, FolderPath::parse(Some("/Projects/2024")));
        Ok(())
    }

    #[test]
    fn listing_prints_child_folders_then_notes() -> TestResult {
        let (_temp, storage, profile_id) = setup_storage()?;
        seed(&storage, &profile_id, "Quarterly plan", Some("/Projects/2024"));
        seed(&storage, &profile_id, "Project index", Some("/Projects"));
        seed(&storage, &profile_id, "Scratch", None);

        let records = storage.list_notes(&profile_id, SortOrder::TitleAsc)?;
        let listing = list_at_path(&records, &FolderPath::parse(Some("/Projects")));
        let output = format_listing(&listing);

        assert!(output.starts_with("/Projects\n"));
        assert!(output.contains("  2024/\n"));
        assert!(output.contains("Project index"));
        assert!(!output.contains("Scratch"));
        assert!(!output.contains("Quarterly plan"));
        Ok(())
    }

    #[test]
    fn listing_marks_unknown_folder_as_empty() -> TestResult {
        let (_temp, storage, profile_id) = setup_storage()?;
        seed(&storage, &profile_id, "Scratch", None);

        let records = storage.list_notes(&profile_id, SortOrder::TitleAsc)?;
        let listing = list_at_path(&records, &FolderPath::parse(Some("/Nowhere")));
        assert_eq!(format_listing(&listing), "/Nowhere\n(empty)\n");
        Ok(())
    }

    #[test]
    fn tree_rendering_uses_connectors_and_folder_suffix() -> TestResult {
        let (_temp, storage, profile_id) = setup_storage()?;
        seed(&storage, &profile_id, "Quarterly plan", Some("/Projects/2024"));
        seed(&storage, &profile_id, "Project index", Some("/Projects"));
        seed(&storage, &profile_id, "Scratch", None);

        let records = storage.list_notes(&profile_id, SortOrder::TitleAsc)?;
        let tree = build_folder_tree(&records);
        insta::assert_snapshot!(render_tree(&tree), @r###"
        Notes /
        ├── Projects/
        │   ├── 2024/
        │   │   └── Quarterly plan
        │   └── Project index
        └── Scratch
        "###);
        Ok(())
    }

    #[test]
    fn tree_json_includes_paths_and_note_titles() -> TestResult {
        let (_temp, storage, profile_id) = setup_storage()?;
        seed(&storage, &profile_id, "Quarterly plan", Some("/Projects/2024"));

        let records = storage.list_notes(&profile_id, SortOrder::TitleAsc)?;
        let tree = build_folder_tree(&records);
        let json = serde_json::to_string_pretty(&tree)?;
        assert!(json.contains("\"name\": \"Projects\""));
        assert!(json.contains("\"path\": \"/Projects/2024\""));
        assert!(json.contains("\"title\": \"Quarterly plan\""));
        Ok(())
    }

    #[test]
    fn edit_note_keeps_omitted_fields() -> TestResult {
        let (_temp, storage, profile_id) = setup_storage()?;
        let note = create_note(
            &storage,
            &profile_id,
            "Original",
            &FolderPath::root(),
            "body",
        )?;

        edit_note(
            storage.clone(),
            &profile_id,
            EditArgs {
                id: note.id.clone(),
                title: Some("Renamed".into()),
                content: None,
            },
        )?;

        let fetched = storage.fetch_note(&profile_id, &note.id)?.expect("note");
        assert_eq!(fetched.title, "Renamed");
        assert_eq!(fetched.content, "body");
        Ok(())
    }

    #[test]
    fn remove_note_with_yes_skips_prompt() -> TestResult {
        let (_temp, storage, profile_id) = setup_storage()?;
        let note = create_note(&storage, &profile_id, "Doomed", &FolderPath::root(), "")?;

        let config = Arc::new(AppConfig::default());
        remove_note(
            config,
            storage.clone(),
            &profile_id,
            RmArgs {
                id: note.id.clone(),
                yes: true,
            },
        )?;

        assert!(storage.fetch_note(&profile_id, &note.id)?.is_none());
        Ok(())
    }

    #[test]
    fn profile_create_then_list_round_trips() -> TestResult {
        let (_temp, storage, _profile_id) = setup_storage()?;
        handle_profile_command(
            storage.clone(),
            ProfileArgs {
                command: ProfileCommand::Create(ProfileCreateArgs {
                    name: "second".into(),
                }),
            },
        )?;

        let names: Vec<_> = storage
            .list_profiles()?
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert!(names.contains(&"cli-tests".to_string()));
        assert!(names.contains(&"second".to_string()));
        Ok(())
    }
}
