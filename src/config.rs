//! config.rs
//!
//! Runtime settings, resolved in this order (first hit wins):
//! - command line flag
//! - `ES_*` environment variable
//! - cluster file `$HOME/.elasticsearch-cli/<cluster>.json`
//! - built-in default

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_HOST: &str = "http://localhost";
const DEFAULT_PORT: u16 = 9200;
const DEFAULT_POLL_INTERVAL_SECS: i64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const CONFIG_DIR: &str = ".elasticsearch-cli";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// REPL console for Elasticsearch. Without a METHOD it starts interactive mode.
#[derive(Debug, Default, Parser)]
#[command(name = "elasticsearch-cli", version)]
pub struct Cli {
    /// Config name, read from $HOME/.elasticsearch-cli/<cluster>.json
    #[arg(long, env = "ES_CLUSTER", default_value = "default")]
    pub cluster: String,

    /// Elasticsearch URL [default: http://localhost]
    #[arg(long, env = "ES_HOST")]
    pub host: Option<String>,

    /// Elasticsearch port [default: 9200]
    #[arg(long, env = "ES_PORT")]
    pub port: Option<u16>,

    /// Username for basic auth
    #[arg(short, long, env = "ES_USER")]
    pub user: Option<String>,

    /// Password for basic auth
    #[arg(short, long, env = "ES_PASS", hide_env_values = true)]
    pub pass: Option<String>,

    /// Print request and response details
    #[arg(short, long, env = "ES_VERBOSE")]
    pub verbose: bool,

    /// Seconds between index discovery polls in interactive mode [default: 10]
    #[arg(long, env = "ES_POLL_INTERVAL", allow_negative_numbers = true)]
    pub poll_interval: Option<i64>,

    /// HTTP client timeout in seconds [default: 10]
    #[arg(short, long, env = "ES_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Extra request header, repeatable
    #[arg(short = 'H', long = "header", value_name = "KEY=VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// METHOD [PATH [BODY]]
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

/// Contents of a cluster config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub verbose: Option<bool>,
    pub poll_interval: Option<i64>,
    pub timeout: Option<u64>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl FileConfig {
    /// A missing file is not an error.
    pub fn load(path: &Path) -> Result<Option<Self>, SettingsError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| SettingsError::Json {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub verbose: bool,
    pub poll_interval: i64,
    pub timeout: u64,
    pub headers: BTreeMap<String, String>,
    pub args: Vec<String>,
}

impl Settings {
    /// Reads the cluster file (if any) and merges it under the CLI values.
    pub fn load(cli: Cli) -> Result<(Self, Option<PathBuf>), SettingsError> {
        let path = cluster_file(&cli.cluster);
        let file = match &path {
            Some(p) => FileConfig::load(p)?,
            None => None,
        };
        let used = file.as_ref().and(path);
        Ok((Self::resolve(cli, file.unwrap_or_default()), used))
    }

    pub fn resolve(cli: Cli, file: FileConfig) -> Self {
        let mut headers = file.headers;
        headers.extend(cli.headers);

        Self {
            host: cli.host.or(file.host).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file.port).unwrap_or(DEFAULT_PORT),
            user: cli.user.or(file.user).unwrap_or_default(),
            pass: cli.pass.or(file.pass).unwrap_or_default(),
            verbose: cli.verbose || file.verbose.unwrap_or(false),
            poll_interval: cli
                .poll_interval
                .or(file.poll_interval)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            timeout: cli.timeout.or(file.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS),
            headers,
            args: cli.args,
        }
    }
}

fn cluster_file(cluster: &str) -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(format!("{cluster}.json")))
}
