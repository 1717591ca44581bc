use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DB_PATH_ENV: &str = "SEEVAR_DB_PATH";
pub const LOG_ENV: &str = "SEEVAR_LOG";

const DATA_DIR: &str = "seevar";
const DB_FILE: &str = "seevar.sqlite";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_filter: String,
}

impl AppConfig {
    /// Reads `.env.local` and `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");

        let db_path = env_non_empty(DB_PATH_ENV)
            .map(PathBuf::from)
            .or_else(default_db_path)
            .context("unable to resolve sqlite path")?;
        let log_filter =
            env_non_empty(LOG_ENV).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            db_path,
            log_filter,
        })
    }

    pub fn with_db_override(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.db_path = path;
        }
        self
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn default_db_path() -> Option<PathBuf> {
    data_dir_from(
        env::var("XDG_DATA_HOME").ok().as_deref(),
        env::var("HOME").ok().as_deref(),
    )
    .map(|dir| dir.join(DB_FILE))
}

fn data_dir_from(xdg_data_home: Option<&str>, home: Option<&str>) -> Option<PathBuf> {
    if let Some(base) = xdg_data_home
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(DATA_DIR));
    }
    let home = home?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(DATA_DIR),
    )
}

const DB_FLAG: &str = "--db";

/// Command-line arguments with the `--db` override split from the command and its operand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub db_path: Option<PathBuf>,
    pub positional: Vec<String>,
}

impl CliArgs {
    /// Accepts `--db <path>` and `--db=<path>` anywhere on the line. A blank value is
    /// ignored and the last non-blank one wins.
    pub fn parse<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut out = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let value = if arg == DB_FLAG {
                args.next()
            } else if let Some(value) = arg.strip_prefix("--db=") {
                Some(value.to_string())
            } else {
                out.positional.push(arg);
                continue;
            };
            if let Some(path) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                out.db_path = Some(PathBuf::from(path));
            }
        }
        out
    }
}
