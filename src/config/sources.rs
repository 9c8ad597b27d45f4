use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "GRABBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/grabbox.toml";
const ENV_PREFIX: &str = "GRABBOX";
const ENV_SEPARATOR: &str = "__";
const BINARY_ENV_VAR: &str = "YTDLP_BIN";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_with_env(config_path)
}

/// Same as [`load`] with an explicit file path
pub fn load_with_env(config_path: PathBuf) -> Result<Config, ConfigError> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let mut config = load_from_sources(config_path)?;
    apply_binary_override(&mut config, env::var(BINARY_ENV_VAR).ok());
    Ok(config)
}

/// `YTDLP_BIN` wins over the file and `GRABBOX__ENGINE__BINARY`
fn apply_binary_override(config: &mut Config, value: Option<String>) {
    if let Some(binary) = value.filter(|value| !value.trim().is_empty()) {
        config.engine.binary = PathBuf::from(binary);
    }
}

/// Load configuration from a specific path and the process environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // GRABBOX__SERVER__BIND_ADDR -> server.bind_addr
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
