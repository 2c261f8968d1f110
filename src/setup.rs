//! Interactive first-run setup wizard (`lexchat setup`)

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};

use crate::config::file::{
    self, AwsFileConfig, BotFileConfig, ConfigFile, VoiceFileConfig,
};
use crate::config::{DEFAULT_LOCALE_ID, DEFAULT_REGION, DEFAULT_VOICE_ID};

/// Regions offered by the wizard; any other can be typed in
const REGIONS: &[&str] = &[
    "us-east-1",
    "us-west-2",
    "eu-west-1",
    "eu-central-1",
    "ap-southeast-2",
    "ap-northeast-1",
];

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or config cannot be written
pub fn run_setup() -> anyhow::Result<()> {
    println!("lexchat setup\n");

    // Load existing config if present
    let existing = file::load_config_file();
    let config_path =
        file::config_file_path().unwrap_or_else(|| PathBuf::from("~/.config/lexchat/config.toml"));

    if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
    }

    // 1. Region
    let current_region = existing
        .aws
        .region
        .clone()
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    let mut region_labels: Vec<&str> = REGIONS.to_vec();
    region_labels.push("(other)");

    let default_region = region_labels
        .iter()
        .position(|&r| r == current_region)
        .unwrap_or(region_labels.len() - 1);

    let region_idx = Select::new()
        .with_prompt("Select a region")
        .items(&region_labels)
        .default(default_region)
        .interact()?;
    let region = if region_idx == region_labels.len() - 1 {
        Input::new()
            .with_prompt("Region")
            .default(current_region)
            .interact_text()?
    } else {
        region_labels[region_idx].to_string()
    };

    // 2. Identity pool
    let identity_pool_id = prompt_required(
        "Identity pool id (guest access enabled)",
        existing.aws.identity_pool_id.as_deref(),
    )?;

    // 3. Bot addressing
    let bot_id = prompt_required("Bot id", existing.bot.bot_id.as_deref())?;
    let bot_alias_id = prompt_required("Bot alias id", existing.bot.bot_alias_id.as_deref())?;
    let locale_id: String = Input::new()
        .with_prompt("Bot locale")
        .default(
            existing
                .bot
                .locale_id
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCALE_ID.to_string()),
        )
        .interact_text()?;

    // 4. Voice
    let enable_voice = Confirm::new()
        .with_prompt("Speak replies aloud?")
        .default(existing.voice.enabled.unwrap_or(true))
        .interact()?;

    let voice = if enable_voice {
        let voice_id: String = Input::new()
            .with_prompt("Voice")
            .default(
                existing
                    .voice
                    .voice_id
                    .clone()
                    .unwrap_or_else(|| DEFAULT_VOICE_ID.to_string()),
            )
            .interact_text()?;
        VoiceFileConfig {
            enabled: Some(true),
            voice_id: Some(voice_id),
        }
    } else {
        VoiceFileConfig {
            enabled: Some(false),
            voice_id: existing.voice.voice_id,
        }
    };

    // 5. Build and write config, keeping overrides the wizard doesn't ask about
    let config_file = ConfigFile {
        aws: AwsFileConfig {
            region: Some(region),
            identity_pool_id: Some(identity_pool_id),
        },
        bot: BotFileConfig {
            bot_id: Some(bot_id),
            bot_alias_id: Some(bot_alias_id),
            locale_id: Some(locale_id),
        },
        voice,
        endpoints: existing.endpoints,
        storage: existing.storage,
    };

    file::write_config(&config_path, &config_file)?;
    println!("\nConfig written to {}", config_path.display());
    println!("\nSetup complete! Run `lexchat` to start chatting.");

    Ok(())
}

/// Ask for a value that cannot be blank, offering the current one as default
fn prompt_required(prompt: &str, current: Option<&str>) -> anyhow::Result<String> {
    let mut input = Input::<String>::new().with_prompt(prompt).validate_with(
        |value: &String| -> Result<(), &'static str> {
            if value.trim().is_empty() {
                Err("a value is required")
            } else {
                Ok(())
            }
        },
    );

    if let Some(current) = current.filter(|c| !c.trim().is_empty()) {
        input = input.default(current.to_string());
    }

    Ok(input.interact_text()?.trim().to_string())
}
