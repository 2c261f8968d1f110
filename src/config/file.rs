//! TOML configuration file loading
//!
//! Supports `~/.config/lexchat/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    /// Cloud account configuration
    #[serde(default)]
    pub aws: AwsFileConfig,

    /// Bot addressing
    #[serde(default)]
    pub bot: BotFileConfig,

    /// Voice output configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Endpoint overrides (local stacks, proxies)
    #[serde(default)]
    pub endpoints: EndpointsFileConfig,

    /// Local storage configuration
    #[serde(default)]
    pub storage: StorageFileConfig,
}

/// Region and identity pool
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AwsFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Identity pool allowing guest access (e.g. "us-east-1:xxxx-...")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_pool_id: Option<String>,
}

/// Conversational bot configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct BotFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,

    /// Published alias of the bot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_alias_id: Option<String>,

    /// Locale of the alias (e.g. "es_419")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale_id: Option<String>,
}

/// Voice output configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct VoiceFileConfig {
    /// Speak replies aloud
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Synthesis voice (e.g. "Mia")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

/// Endpoint overrides
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EndpointsFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cognito: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lex: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub polly: Option<String>,
}

/// Local storage configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StorageFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match load_config_from(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ConfigFile::default()
        }
    }
}

/// Parse a config file at an explicit path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Write a config file, creating parent directories
///
/// # Errors
///
/// Returns error if serialization or the write fails
pub fn write_config(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml = toml::to_string_pretty(config)
        .map_err(|e| crate::Error::Config(format!("cannot serialize config: {e}")))?;
    std::fs::write(path, toml)?;

    Ok(())
}

/// Return the config file path: `~/.config/lexchat/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("lexchat").join("config.toml"))
}
