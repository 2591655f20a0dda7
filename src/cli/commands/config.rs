//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, StorageBackend};
use crate::error::{ReadThroughError, ReadThroughResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    manager: &ConfigManager,
) -> ReadThroughResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            let mut updated = config.clone();
            set_value(&mut updated, &key, &value)?;
            manager.save(&updated).await?;
            ui::step_ok(&UiContext::detect(), &format!("Set {} = {}", key, value));
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> ReadThroughResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> ReadThroughResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn(
            &ctx,
            &format!(
                "Config already exists at {} (use --force to overwrite)",
                path.display()
            ),
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok(
        &ctx,
        &format!("Configuration initialized at {}", path.display()),
    );

    Ok(())
}

/// Apply a dot-separated key to the configuration
fn set_value(config: &mut Config, key: &str, value: &str) -> ReadThroughResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "log_format"] => config.general.log_format = parse_log_format(value)?,

        ["cache", "version"] => config.cache.version = parse_number(value)?,
        ["cache", "precache"] => config.cache.precache = value.to_string(),
        ["cache", "manifest"] => config.cache.manifest = parse_list(value),
        ["cache", "fill_on_miss"] => config.cache.fill_on_miss = parse_bool(value)?,
        ["cache", "registry", logical] if !logical.is_empty() => {
            if value.is_empty() {
                config.cache.registry.remove(*logical);
            } else {
                config
                    .cache
                    .registry
                    .insert((*logical).to_string(), value.to_string());
            }
        }

        ["network", "origin"] => {
            config.network.origin = (!value.is_empty()).then(|| value.to_string())
        }
        ["network", "timeout_secs"] => config.network.timeout_secs = parse_number(value)?,
        ["network", "user_agent"] => config.network.user_agent = value.to_string(),

        ["storage", "backend"] => config.storage.backend = parse_backend(value)?,
        ["storage", "dir"] => {
            config.storage.dir = (!value.is_empty()).then(|| PathBuf::from(value))
        }

        _ => {
            return Err(ReadThroughError::User(format!(
                "Unknown config key: {}. Valid keys: {}",
                key,
                VALID_KEYS.join(", ")
            )))
        }
    }

    Ok(())
}

const VALID_KEYS: &[&str] = &[
    "general.log_format",
    "cache.version",
    "cache.precache",
    "cache.manifest",
    "cache.fill_on_miss",
    "cache.registry.<logical>",
    "network.origin",
    "network.timeout_secs",
    "network.user_agent",
    "storage.backend",
    "storage.dir",
];

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: &str) -> ReadThroughResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ReadThroughError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> ReadThroughResult<T> {
    value
        .parse()
        .map_err(|_| ReadThroughError::User(format!("Invalid number: {}", value)))
}

fn parse_log_format(value: &str) -> ReadThroughResult<String> {
    match value {
        "text" | "json" => Ok(value.to_string()),
        _ => Err(ReadThroughError::User(format!(
            "Invalid log format: {}. Use text or json",
            value
        ))),
    }
}

fn parse_backend(value: &str) -> ReadThroughResult<StorageBackend> {
    match value {
        "disk" => Ok(StorageBackend::Disk),
        "memory" => Ok(StorageBackend::Memory),
        _ => Err(ReadThroughError::User(format!(
            "Invalid storage backend: {}. Use disk or memory",
            value
        ))),
    }
}
