use super::models::{Config, ConfigOrigin};
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "GHRELAY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/ghrelay.toml";
const ENV_PREFIX: &str = "GHRELAY";
const ENV_SEPARATOR: &str = "__";
const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load() -> Result<Config, ConfigError> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);

    Ok(config)
}

/// Secrets never live in TOML files, only in the environment
fn load_secrets(config: &mut Config) {
    config.github.token = env::var(TOKEN_ENV_VAR)
        .ok()
        .filter(|token| !token.is_empty());
}

/// Load configuration from a specific path plus environment overrides
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    // Logging is not initialised yet; the caller reports `origin` later
    let origin = if config_path.exists() {
        builder = builder.add_source(File::from(config_path.clone()).required(false));
        ConfigOrigin::File(config_path)
    } else {
        ConfigOrigin::Missing(config_path)
    };

    // GHRELAY__SERVER__BIND_ADDR -> server.bind_addr
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let mut config: Config = builder.build()?.try_deserialize()?;
    config.origin = origin;
    Ok(config)
}
