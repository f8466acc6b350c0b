//! Optional config file loading. Search order: ./ffarchive.toml, then
//! $XDG_CONFIG_HOME/ffarchive/config.toml (or ~/.config/ffarchive/config.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Library root holding site directories, assets and statistics. Relative to CWD.
    pub library_dir: Option<PathBuf>,
    /// Catalog JSON file. Default: catalog.json inside the library.
    pub catalog_file: Option<PathBuf>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Delay in seconds between requests.
    pub request_delay_secs: Option<u64>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Number of HTTP attempts for transient failures (default 5).
    pub retry_count: Option<u32>,
    /// Delay in seconds before each retry (e.g. [1, 2, 4, 8]). Length should be retry_count - 1.
    pub retry_backoff_secs: Option<Vec<u64>>,
}

/// Search order: (1) ./ffarchive.toml, (2) $XDG_CONFIG_HOME/ffarchive/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("ffarchive.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("ffarchive").join("config.toml"));
    }
    load_first(&paths)
}

fn load_first(paths: &[PathBuf]) -> Result<Option<Config>, String> {
    for path in paths {
        if path.exists() {
            return load_from(path).map(Some);
        }
    }
    Ok(None)
}

fn load_from(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    let config: Config =
        toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
    tracing::debug!(path = %path.display(), "config loaded");
    Ok(config)
}
