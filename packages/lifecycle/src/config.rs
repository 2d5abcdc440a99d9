//! Loading and validating [`SearchConfig`].
//!
//! Sources, in order: a TOML file (or the embedded default), environment
//! overrides, then validation. The result is fixed for one activation.

use std::path::Path;

use buffer_search_models::config::SearchConfig;

/// Overrides `query.endpoint`.
pub const ENDPOINT_ENV: &str = "BUFFER_SEARCH_ENDPOINT";
/// Overrides `layer.id`.
pub const LAYER_ENV: &str = "BUFFER_SEARCH_LAYER";

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML or has wrongly typed values.
    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    /// The config parsed but a value is unusable.
    #[error("Invalid config: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

/// Parses a TOML document. Missing keys take their defaults.
///
/// # Errors
///
/// Returns [`ConfigError::Toml`] if `text` is not valid TOML for a
/// [`SearchConfig`].
pub fn parse_config(text: &str) -> Result<SearchConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// The configuration embedded in the binary.
///
/// # Errors
///
/// Returns [`ConfigError::Toml`] if the embedded file is malformed.
pub fn default_config() -> Result<SearchConfig, ConfigError> {
    parse_config(DEFAULT_CONFIG)
}

/// Loads `path` (or the embedded default), applies environment overrides
/// and validates the result.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read or parsed, or the
/// result fails [`validate`].
pub fn load_config(path: Option<&Path>) -> Result<SearchConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            log::debug!("Loading config from {}", path.display());
            parse_config(&std::fs::read_to_string(path)?)?
        }
        None => default_config()?,
    };
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Applies `BUFFER_SEARCH_*` overrides looked up through `lookup`.
/// Empty values are ignored.
pub fn apply_overrides(config: &mut SearchConfig, lookup: impl Fn(&str) -> Option<String>) {
    let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(endpoint) = lookup(ENDPOINT_ENV) {
        log::debug!("{ENDPOINT_ENV} overrides query endpoint");
        config.query.endpoint = endpoint;
    }
    if let Some(layer) = lookup(LAYER_ENV) {
        log::debug!("{LAYER_ENV} overrides layer id");
        config.layer.id = layer;
    }
}

/// Checks that `config` can drive a search.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] naming the first offending value.
pub fn validate(config: &SearchConfig) -> Result<(), ConfigError> {
    let invalid = |message: String| Err(ConfigError::Invalid { message });

    if config.layer.id.trim().is_empty() {
        return invalid("layer.id must not be empty".to_string());
    }
    if config.layer.geometry_field.trim().is_empty() {
        return invalid("layer.geometry_field must not be empty".to_string());
    }
    let distance = config.buffer.distance;
    if !distance.is_finite() || distance <= 0.0 {
        return invalid(format!(
            "buffer.distance must be a positive number, got {distance}"
        ));
    }
    if config.map_crs.kind().is_none() {
        return invalid(format!("map_crs '{}' is not supported", config.map_crs));
    }
    if config.layer.crs.kind().is_none() {
        return invalid(format!("layer.crs '{}' is not supported", config.layer.crs));
    }
    if config.query.timeout_secs == 0 {
        return invalid("query.timeout_secs must be at least 1".to_string());
    }
    Ok(())
}
