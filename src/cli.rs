use clap::Parser;
use std::path::PathBuf;

use crate::config::{parse_root_arg, LibraryPath};

#[derive(Parser, Debug)]
#[command(
    name = "tube",
    about = "Self-hosted video library: `tube clips=/path/to/videos` and it works",
    long_about = None,
    version,
)]
pub struct Args {
    /// Media roots to index and watch, as PATH or PREFIX=PATH (added after config file roots)
    #[arg(value_name = "ROOT", value_parser = parse_root_arg)]
    pub roots: Vec<LibraryPath>,

    /// Address to bind [default: 0.0.0.0]
    #[arg(long)]
    pub host: Option<String>,

    /// HTTP port to listen on [default: 8000]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// View count database directory [default: tube.db]
    #[arg(short, long, value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Path to TOML config file (overrides default search: ./tube.toml, ~/.config/tube/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}
