//! Configuration management for lexchat
//!
//! Precedence: environment > TOML file > defaults. Command-line flags are
//! applied on top by the binary.

pub mod file;

use std::path::PathBuf;

use crate::{Error, Result};

pub use file::ConfigFile;

/// Default cloud region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default bot locale (Latin American Spanish)
pub const DEFAULT_LOCALE_ID: &str = "es_419";

/// Default synthesis voice (es-MX)
pub const DEFAULT_VOICE_ID: &str = "Mia";

/// lexchat configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Region and identity pool
    pub aws: AwsConfig,

    /// Bot addressing
    pub bot: BotConfig,

    /// Voice output
    pub voice: VoiceConfig,

    /// Service endpoints
    pub endpoints: Endpoints,

    /// Path to data directory (session database)
    pub data_dir: PathBuf,
}

/// Region and identity pool
#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub identity_pool_id: String,
}

/// Conversational bot addressing
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_id: String,
    pub bot_alias_id: String,
    pub locale_id: String,
}

/// Voice output configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Synthesize and play replies
    pub enabled: bool,

    /// Synthesis voice identity
    pub voice_id: String,
}

/// Base URLs of the remote services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub cognito: String,
    pub lex: String,
    pub polly: String,
}

impl Endpoints {
    /// Public endpoints for a region
    #[must_use]
    pub fn for_region(region: &str) -> Self {
        Self {
            cognito: format!("https://cognito-identity.{region}.amazonaws.com"),
            lex: format!("https://runtime-v2-lex.{region}.amazonaws.com"),
            polly: format!("https://polly.{region}.amazonaws.com"),
        }
    }
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if a required setting is missing
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a required setting is missing or an endpoint is not a URL
    pub fn from_sources<F>(fc: ConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = resolve_data_dir(fc.storage.data_dir.clone(), &env);

        let region = env("LEXCHAT_REGION")
            .or(fc.aws.region)
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let aws = AwsConfig {
            identity_pool_id: required(
                env("LEXCHAT_IDENTITY_POOL_ID").or(fc.aws.identity_pool_id),
                "identity pool id (LEXCHAT_IDENTITY_POOL_ID or [aws] identity_pool_id)",
            )?,
            region,
        };

        let bot = BotConfig {
            bot_id: required(
                env("LEXCHAT_BOT_ID").or(fc.bot.bot_id),
                "bot id (LEXCHAT_BOT_ID or [bot] bot_id)",
            )?,
            bot_alias_id: required(
                env("LEXCHAT_BOT_ALIAS_ID").or(fc.bot.bot_alias_id),
                "bot alias id (LEXCHAT_BOT_ALIAS_ID or [bot] bot_alias_id)",
            )?,
            locale_id: env("LEXCHAT_LOCALE_ID")
                .or(fc.bot.locale_id)
                .unwrap_or_else(|| DEFAULT_LOCALE_ID.to_string()),
        };

        let voice = VoiceConfig {
            enabled: env("LEXCHAT_VOICE_ENABLED")
                .map(|v| flag(&v, "LEXCHAT_VOICE_ENABLED"))
                .transpose()?
                .or(fc.voice.enabled)
                .unwrap_or(true),
            voice_id: env("LEXCHAT_VOICE_ID")
                .or(fc.voice.voice_id)
                .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string()),
        };

        let defaults = Endpoints::for_region(&aws.region);
        let endpoints = Endpoints {
            cognito: endpoint(
                env("LEXCHAT_COGNITO_ENDPOINT").or(fc.endpoints.cognito),
                defaults.cognito,
            )?,
            lex: endpoint(env("LEXCHAT_LEX_ENDPOINT").or(fc.endpoints.lex), defaults.lex)?,
            polly: endpoint(
                env("LEXCHAT_POLLY_ENDPOINT").or(fc.endpoints.polly),
                defaults.polly,
            )?,
        };

        Ok(Self {
            aws,
            bot,
            voice,
            endpoints,
            data_dir,
        })
    }

    /// Path of the session database
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("lexchat.db")
    }
}

/// Data directory without requiring the remote-service settings
#[must_use]
pub fn data_dir() -> PathBuf {
    let fc = file::load_config_file();
    resolve_data_dir(fc.storage.data_dir, &|key: &str| std::env::var(key).ok())
}

/// Resolve the data directory (`~/.local/share/lexchat` on Linux)
fn resolve_data_dir<F>(from_file: Option<String>, env: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    env("LEXCHAT_DATA_DIR").or(from_file).map_or_else(
        || {
            directories::ProjectDirs::from("dev", "omni", "lexchat")
                .map_or_else(|| PathBuf::from(".lexchat"), |d| d.data_dir().to_path_buf())
        },
        PathBuf::from,
    )
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("missing {what}")))
}

/// Parse an on/off setting, accepting the same spellings as `--mute`
fn flag(value: &str, name: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Ok(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Ok(false),
        _ => Err(Error::Config(format!("{name} must be a boolean, got {value:?}"))),
    }
}

fn endpoint(value: Option<String>, default: String) -> Result<String> {
    let Some(value) = value else {
        return Ok(default);
    };

    let parsed = url::Url::parse(&value)
        .map_err(|e| Error::Config(format!("invalid endpoint {value}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Config(format!("unsupported endpoint scheme: {value}")));
    }

    Ok(value.trim_end_matches('/').to_string())
}
