use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::media::id::validate_prefix;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_STORE_PATH: &str = "tube.db";
const DEFAULT_UPLOAD_PATH: &str = "uploads";

/// Prefix the upload directory is registered under.
pub const UPLOAD_PREFIX: &str = "uploads";

/// One `[[library]]` entry: a media root and the id prefix for its videos.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LibraryPath {
    pub path: PathBuf,
    #[serde(default)]
    pub prefix: String,
}

#[derive(Deserialize, Default, Debug)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub store_path: Option<PathBuf>,
    pub upload_path: Option<PathBuf>,
}

#[derive(Deserialize, Default, Debug)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub library: Vec<LibraryPath>,
}

#[derive(Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub store_path: PathBuf,
    pub upload_path: PathBuf,
    /// File roots first, then CLI roots.
    pub library: Vec<LibraryPath>,
}

impl Config {
    pub fn resolve(file: Option<FileConfig>, args: &crate::cli::Args) -> Self {
        let file = file.unwrap_or_default();
        let mut library = file.library;
        library.extend(args.roots.iter().cloned());
        Config {
            host: args
                .host
                .clone()
                .or(file.server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: args.port.or(file.server.port).unwrap_or(DEFAULT_PORT),
            store_path: args
                .store
                .clone()
                .or(file.server.store_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
            upload_path: file
                .server
                .upload_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_PATH)),
            library,
        }
    }
}

/// Parse a CLI root: `PREFIX=PATH`, or a bare `PATH` with an empty prefix.
/// A left-hand side that is not a valid prefix means the `=` belongs to the path.
pub fn parse_root_arg(raw: &str) -> Result<LibraryPath, String> {
    if raw.is_empty() {
        return Err("root path must not be empty".to_string());
    }
    if let Some((prefix, path)) = raw.split_once('=') {
        if !path.is_empty() && validate_prefix(prefix).is_ok() {
            return Ok(LibraryPath {
                path: PathBuf::from(path),
                prefix: prefix.to_string(),
            });
        }
    }
    Ok(LibraryPath {
        path: PathBuf::from(raw),
        prefix: String::new(),
    })
}

pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_owned());
    }
    let cwd_config = PathBuf::from("tube.toml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let xdg_config = config_dir.join("tube").join("config.toml");
        if xdg_config.exists() {
            return Some(xdg_config);
        }
    }
    None
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: FileConfig = toml::from_str(&content)?;
    Ok(config)
}
