pub mod app;
pub mod cli;
pub mod config;
pub mod hierarchy;
pub mod highlight;
pub mod nav;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use hierarchy::{build_folder_tree, list_at_path, FolderNode, FolderPath};
