//! Application configuration for Scribe.
//!
//! User config lives at `~/.scribe/scribe.toml`.
//! CLI flags override config file values, which override defaults.
//! The file names the environment variables holding provider keys; the keys
//! themselves are read once at startup by [`RuntimeConfig::resolve`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ScribeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "scribe.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".scribe";

// ---------------------------------------------------------------------------
// Config structs (matching scribe.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Language-model provider settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Web-search provider settings.
    #[serde(default)]
    pub search: SearchConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. Empty means any origin.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    5000
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    /// Provider base URL.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on generated tokens per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Maximum tool-call round trips in the research stage.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// Per-call timeout in seconds. Unset means the HTTP client default (none).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_llm_key_env(),
            base_url: default_llm_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_tool_rounds: default_max_tool_rounds(),
            timeout_secs: None,
        }
    }
}

fn default_llm_key_env() -> String {
    "COHERE_API_KEY".into()
}
fn default_llm_base_url() -> String {
    "https://api.cohere.com".into()
}
fn default_model() -> String {
    "command-r".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_max_tool_rounds() -> u32 {
    5
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Offer the web-search tool to the research stage.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Name of the env var holding the API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Provider base URL.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Number of results requested per query.
    #[serde(default = "default_n_results")]
    pub n_results: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: default_search_key_env(),
            base_url: default_search_base_url(),
            n_results: default_n_results(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_search_key_env() -> String {
    "SERPER_API_KEY".into()
}
fn default_search_base_url() -> String {
    "https://google.serper.dev".into()
}
fn default_n_results() -> u32 {
    5
}

// ---------------------------------------------------------------------------
// Runtime config (resolved once at startup, injected everywhere)
// ---------------------------------------------------------------------------

/// Resolved language-model settings, including the API key.
#[derive(Clone)]
pub struct LlmSettings {
    pub api_key: String,
    pub base_url: Url,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_tool_rounds: u32,
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Resolved web-search settings, including the API key.
#[derive(Clone)]
pub struct SearchSettings {
    pub api_key: String,
    pub base_url: Url,
    pub n_results: u32,
}

impl std::fmt::Debug for SearchSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchSettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("n_results", &self.n_results)
            .finish()
    }
}

/// Everything the pipeline needs, with credentials already acquired.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub llm: LlmSettings,
    /// `None` when search is disabled or no key is available.
    pub search: Option<SearchSettings>,
}

impl RuntimeConfig {
    /// Resolve against the process environment.
    pub fn resolve(config: &AppConfig) -> Result<Self> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve using `lookup` to read credential variables.
    ///
    /// A missing LLM key is an error. A missing search key disables the
    /// search tool.
    pub fn resolve_with(
        config: &AppConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let llm_key_env = &config.llm.api_key_env;
        let api_key = lookup(llm_key_env)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                ScribeError::config(format!(
                    "LLM API key not found. Set the {llm_key_env} environment variable."
                ))
            })?;

        let llm = LlmSettings {
            api_key,
            base_url: parse_base_url("llm.base_url", &config.llm.base_url)?,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            max_tool_rounds: config.llm.max_tool_rounds,
            timeout: config.llm.timeout_secs.map(Duration::from_secs),
        };

        let search = if !config.search.enabled {
            tracing::info!("web search disabled by config");
            None
        } else {
            match lookup(&config.search.api_key_env).filter(|v| !v.is_empty()) {
                Some(api_key) => Some(SearchSettings {
                    api_key,
                    base_url: parse_base_url("search.base_url", &config.search.base_url)?,
                    n_results: config.search.n_results,
                }),
                None => {
                    tracing::warn!(
                        env = %config.search.api_key_env,
                        "search API key not set, research stage will run without web search"
                    );
                    None
                }
            }
        };

        Ok(Self { llm, search })
    }
}

/// Parse a provider base URL, normalizing to a trailing slash so endpoint
/// paths can be joined onto it.
fn parse_base_url(field: &str, raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)
        .map_err(|e| ScribeError::config(format!("invalid {field} '{raw}': {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.scribe/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| ScribeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.scribe/scribe.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| ScribeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ScribeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ScribeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ScribeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ScribeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
