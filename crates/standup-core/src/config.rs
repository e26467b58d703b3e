// Configuration loading and parsing (standup.toml, credentials.toml).

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

const CONFIG_FILE: &str = "standup.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to install default config at {path}: {source}")]
    InstallError {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: Provider,
    pub openai: OpenAiConfig,
    pub ollama: OllamaConfig,
    pub store: StoreConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// standup.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire standup.toml file.
#[derive(Debug, Clone, Deserialize)]
struct StandupFile {
    server: ServerConfig,
    pipeline: PipelineSection,
    openai: OpenAiConfig,
    ollama: OllamaConfig,
    #[serde(default)]
    store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct PipelineSection {
    provider: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

/// Which backend drives transcription, diarization, and classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Hosted Whisper + GPT.
    OpenAi,
    /// Local Ollama model, with keyword fallback.
    Ollama,
    /// Canned transcription and keyword classification; no network.
    Mock,
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            "mock" => Ok(Provider::Mock),
            other => Err(format!(
                "unknown provider `{other}` (expected openai, ollama, or mock)"
            )),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
            Provider::Mock => "mock",
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub chat_model: String,
    pub transcription_model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_seed_demo_data")]
    pub seed_demo_data: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            seed_demo_data: default_seed_demo_data(),
        }
    }
}

fn default_seed_demo_data() -> bool {
    true
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub openai_api_key: Option<String>,
}

impl CredentialsConfig {
    /// The OpenAI key, if one is set and non-blank.
    pub fn openai_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

/// Values taken from the process environment that win over the files.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub openai_api_key: Option<String>,
    pub provider: Option<String>,
}

impl EnvOverrides {
    /// Read `OPENAI_API_KEY` and `STANDUP_PROVIDER`.
    pub fn from_env() -> Self {
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            provider: std::env::var("STANDUP_PROVIDER").ok(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/standup.toml` and
/// (optionally) `config/credentials.toml`, relative to `base_dir`, applying
/// `overrides` on top.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path, overrides: &EnvOverrides) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- standup.toml (required) ---
    let standup_path = config_dir.join(CONFIG_FILE);
    let standup_text = read_file(&standup_path)?;
    let file: StandupFile =
        toml::from_str(&standup_text).map_err(|e| ConfigError::ParseError {
            path: standup_path.clone(),
            source: e,
        })?;

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let mut credentials: CredentialsConfig = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    if let Some(key) = overrides.openai_api_key.as_ref().filter(|k| !k.trim().is_empty()) {
        credentials.openai_api_key = Some(key.clone());
    }

    let provider_name = overrides
        .provider
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(file.pipeline.provider.as_str());
    let provider = provider_name
        .parse::<Provider>()
        .map_err(|message| ConfigError::ValidationError {
            field: "pipeline.provider".into(),
            message,
        })?;

    let config = Config {
        server: file.server,
        provider,
        openai: file.openai,
        ollama: file.ollama,
        store: file.store,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy `defaults/standup.toml` into `config/` when the project has no
/// `config/standup.toml` yet. Returns the path written, if any.
///
/// Credentials are never installed; `defaults/` only ships an `.example`.
pub fn install_default_config(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(CONFIG_FILE);
    let source = base_dir.join("defaults").join(CONFIG_FILE);
    if target.exists() || !source.exists() {
        return Ok(None);
    }

    let install_error = |path: &Path| {
        let path = path.to_path_buf();
        move |err: std::io::Error| ConfigError::InstallError { path, source: err }
    };
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(install_error(dir))?;
    }
    std::fs::copy(&source, &target).map_err(install_error(&target))?;

    info!("installed default config at {}", target.display());
    Ok(Some(target))
}

/// Convenience wrapper: loads config relative to the current working directory
/// with environment overrides, installing the default config first if needed.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    install_default_config(&cwd)?;
    load_config_from(&cwd, &EnvOverrides::from_env())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn validation(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.host.trim().is_empty() {
        return Err(validation("server.host", "must not be empty"));
    }
    if config.server.max_upload_bytes == 0 {
        return Err(validation("server.max_upload_bytes", "must be greater than 0"));
    }

    let urls = [
        ("openai.base_url", &config.openai.base_url),
        ("ollama.base_url", &config.ollama.base_url),
    ];
    for (field, url) in urls {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(validation(
                field,
                format!("must start with http:// or https://, got `{url}`"),
            ));
        }
    }

    let models = [
        ("openai.chat_model", &config.openai.chat_model),
        ("openai.transcription_model", &config.openai.transcription_model),
        ("ollama.model", &config.ollama.model),
    ];
    for (field, model) in models {
        if model.trim().is_empty() {
            return Err(validation(field, "must not be empty"));
        }
    }

    let temperatures = [
        ("openai.temperature", config.openai.temperature),
        ("ollama.temperature", config.ollama.temperature),
    ];
    for (field, t) in temperatures {
        if !(0.0..=2.0).contains(&t) {
            return Err(validation(
                field,
                format!("must be between 0.0 and 2.0 inclusive, got {t}"),
            ));
        }
    }

    if config.ollama.timeout_secs == 0 {
        return Err(validation("ollama.timeout_secs", "must be greater than 0"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
