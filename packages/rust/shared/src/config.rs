//! Application configuration for vinaya-notes.
//!
//! User config lives at `~/.vinaya-notes/vinaya-notes.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, VinayaError};
use crate::types::MergePolicy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "vinaya-notes.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".vinaya-notes";

// ---------------------------------------------------------------------------
// Config structs (matching vinaya-notes.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the notes come from.
    #[serde(default)]
    pub source: SourceConfig,

    /// HTTP behaviour.
    #[serde(default)]
    pub fetch: FetchSettings,

    /// Output locations.
    #[serde(default)]
    pub output: OutputConfig,

    /// Glossary extraction.
    #[serde(default)]
    pub glossary: GlossaryConfig,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the content API.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Publication edition to fetch notes for.
    #[serde(default = "default_edition")]
    pub edition: String,

    /// Author of the notes.
    #[serde(default = "default_author")]
    pub author: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            edition: default_edition(),
            author: default_author(),
        }
    }
}

fn default_api_base() -> String {
    "https://suttacentral.net/api".into()
}
fn default_edition() -> String {
    "pli-tv-vi-en-brahmali_scpub8-ed1-web_2022-02-10".into()
}
fn default_author() -> String {
    "brahmali".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Extra attempts after the first for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between retries; doubles per attempt.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Maximum concurrent page requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// On-disk response cache directory.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff() -> u64 {
    500
}
fn default_concurrency() -> u32 {
    4
}
fn default_timeout() -> u64 {
    30
}
fn default_cache_dir() -> String {
    ".cache".into()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the Markdown files.
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Where `glossary.json` is written (independent of `dir`).
    #[serde(default = "default_glossary_path")]
    pub glossary_path: String,

    /// Scid map location: a local path or an http(s) URL.
    #[serde(default = "default_scidmap")]
    pub scidmap: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            glossary_path: default_glossary_path(),
            scidmap: default_scidmap(),
        }
    }
}

fn default_output_dir() -> String {
    "Ajahn Brahmali".into()
}
fn default_glossary_path() -> String {
    "glossary.json".into()
}
fn default_scidmap() -> String {
    "scidmap.json".into()
}

/// `[glossary]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlossaryConfig {
    /// How repeated definitions are merged.
    #[serde(default)]
    pub merge_policy: MergePolicy,

    /// Canonical term → alternate word forms used in the notes.
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
}

// ---------------------------------------------------------------------------
// Fetch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetch configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Base URL of the content API.
    pub api_base: String,
    /// Extra attempts after the first for transient failures.
    pub max_retries: u32,
    /// Base backoff between retries.
    pub retry_backoff: Duration,
    /// Maximum concurrent page requests.
    pub concurrency: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Response cache directory; `None` disables caching.
    pub cache_dir: Option<PathBuf>,
    /// Skip cache reads (responses are still written).
    pub refresh: bool,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        let cache_dir = if config.fetch.cache_dir.is_empty() {
            None
        } else {
            Some(PathBuf::from(&config.fetch.cache_dir))
        };
        Self {
            api_base: config.source.api_base.clone(),
            max_retries: config.fetch.max_retries,
            retry_backoff: Duration::from_millis(config.fetch.retry_backoff_ms),
            concurrency: config.fetch.concurrency.max(1),
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            cache_dir,
            refresh: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.vinaya-notes/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| VinayaError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.vinaya-notes/vinaya-notes.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| VinayaError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        VinayaError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| VinayaError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| VinayaError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| VinayaError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configurations that cannot produce a run.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    Url::parse(&config.source.api_base).map_err(|e| {
        VinayaError::config(format!("invalid api_base '{}': {e}", config.source.api_base))
    })?;
    if config.source.edition.trim().is_empty() {
        return Err(VinayaError::config("source.edition must not be empty"));
    }
    if config.output.dir.trim().is_empty() {
        return Err(VinayaError::config("output.dir must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("api_base"));
        assert!(toml_str.contains("first-wins"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.fetch.max_retries, 3);
        assert_eq!(parsed.output.glossary_path, "glossary.json");
        assert_eq!(parsed.source.author, "brahmali");
    }

    #[test]
    fn config_with_aliases() {
        let toml_str = r#"
[glossary]
merge_policy = "longest"

[glossary.aliases]
"dūs" = ["dūsent", "dūsess"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.glossary.merge_policy, MergePolicy::Longest);
        assert_eq!(config.glossary.aliases["dūs"].len(), 2);
        // Untouched sections fall back to defaults
        assert_eq!(config.output.dir, "Ajahn Brahmali");
    }

    #[test]
    fn fetch_config_from_app_config() {
        let mut app = AppConfig::default();
        app.fetch.concurrency = 0;
        let fetch = FetchConfig::from(&app);
        assert_eq!(fetch.max_retries, 3);
        assert_eq!(fetch.retry_backoff, Duration::from_millis(500));
        assert_eq!(fetch.concurrency, 1);
        assert_eq!(fetch.cache_dir, Some(PathBuf::from(".cache")));

        app.fetch.cache_dir = String::new();
        assert!(FetchConfig::from(&app).cache_dir.is_none());
    }

    #[test]
    fn invalid_api_base_rejected() {
        let mut config = AppConfig::default();
        config.source.api_base = "not a url".into();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("invalid api_base"));
    }

    #[test]
    fn load_config_from_file() {
        let dir = std::env::temp_dir().join(format!("vn-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("vinaya-notes.toml");
        std::fs::write(&path, "[output]\ndir = \"out\"\n").unwrap();

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.output.dir, "out");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
