#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use crate::error::{ForgeError, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_PATH: &str = ".forge/config.toml";
pub const DEFAULT_CACHE_PATH: &str = ".forge/cache/execution.db";
pub const CACHE_PATH_ENV: &str = "FORGE_CACHE_PATH";

/// Limits applied while turning a goal into an artifact graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryLimits {
    pub max_artifacts: usize,
    pub max_depth: usize,
    pub max_retries: u32,
    pub max_discovery_rounds: u32,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        Self {
            max_artifacts: 50,
            max_depth: 10,
            max_retries: 3,
            max_discovery_rounds: 5,
        }
    }
}

/// Gating knobs for wave-by-wave cascade execution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeSettings {
    pub confidence_threshold: f64,
    pub max_consecutive_low_confidence: u32,
    pub max_cascade_depth: usize,
    pub max_cascade_size: usize,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            max_consecutive_low_confidence: 2,
            max_cascade_depth: 5,
            max_cascade_size: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForgeConfig {
    pub cache_path: PathBuf,
    pub discovery: DiscoveryLimits,
    pub cascade: CascadeSettings,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            discovery: DiscoveryLimits::default(),
            cascade: CascadeSettings::default(),
        }
    }
}

/// Loads configuration from `path` (or `.forge/config.toml`), falling back to
/// defaults when the file does not exist. `.env` files are honoured before
/// `${VAR}` expansion runs.
///
/// # Errors
///
/// Returns `ForgeError::ConfigError` if the file cannot be read or a numeric
/// value does not parse.
pub async fn load_config(path: Option<PathBuf>) -> Result<ForgeConfig> {
    dotenv::dotenv().ok();

    let config_path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let parsed = if config_path.exists() {
        let content = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(|e| ForgeError::ConfigError(format!("Failed to read config: {e}")))?;
        parse_config_content(&content)?
    } else {
        ForgeConfig::default()
    };

    Ok(apply_env_overrides(parsed))
}

/// Parses the line-oriented `key = value` format.
///
/// # Errors
///
/// Returns `ForgeError::ConfigError` when a numeric key carries a value that
/// does not parse.
pub fn parse_config_content(content: &str) -> Result<ForgeConfig> {
    let mut config = ForgeConfig::default();

    for line in content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('['))
    {
        if let Some(value) = parse_key_value(line, "cache_path") {
            config.cache_path = PathBuf::from(expand_env_vars(value));
        }
        if let Some(value) = parse_key_value(line, "max_artifacts") {
            config.discovery.max_artifacts = parse_number("max_artifacts", value)?;
        }
        if let Some(value) = parse_key_value(line, "max_depth") {
            config.discovery.max_depth = parse_number("max_depth", value)?;
        }
        if let Some(value) = parse_key_value(line, "max_retries") {
            config.discovery.max_retries = parse_number("max_retries", value)?;
        }
        if let Some(value) = parse_key_value(line, "max_discovery_rounds") {
            config.discovery.max_discovery_rounds = parse_number("max_discovery_rounds", value)?;
        }
        if let Some(value) = parse_key_value(line, "confidence_threshold") {
            let threshold: f64 = parse_number("confidence_threshold", value)?;
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ForgeError::ConfigError(format!(
                    "confidence_threshold must be within [0, 1], got {threshold}"
                )));
            }
            config.cascade.confidence_threshold = threshold;
        }
        if let Some(value) = parse_key_value(line, "max_consecutive_low_confidence") {
            config.cascade.max_consecutive_low_confidence =
                parse_number("max_consecutive_low_confidence", value)?;
        }
        if let Some(value) = parse_key_value(line, "max_cascade_depth") {
            config.cascade.max_cascade_depth = parse_number("max_cascade_depth", value)?;
        }
        if let Some(value) = parse_key_value(line, "max_cascade_size") {
            config.cascade.max_cascade_size = parse_number("max_cascade_size", value)?;
        }
    }

    Ok(config)
}

fn apply_env_overrides(config: ForgeConfig) -> ForgeConfig {
    match non_empty_env_var(CACHE_PATH_ENV) {
        Some(path) => ForgeConfig {
            cache_path: PathBuf::from(path),
            ..config
        },
        None => config,
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    expand_env_vars(value)
        .parse::<T>()
        .map_err(|_| ForgeError::ConfigError(format!("Invalid value for {key}: {value}")))
}

fn expand_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_part = &result[start + 2..start + end];
            let (var_name, default) = var_part.split_once(":-").unwrap_or((var_part, ""));
            let value = std::env::var(var_name).unwrap_or_else(|_| default.to_string());
            result.replace_range(start..=(start + end), &value);
        } else {
            break;
        }
    }
    result
}

#[must_use]
pub fn parse_key_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.split_once('=')
        .and_then(|(lhs, rhs)| (lhs.trim() == key).then_some(rhs.trim().trim_matches('"')))
}

fn non_empty_env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Resolves the cache database location relative to a project root.
#[must_use]
pub fn resolve_cache_path(project_root: &Path, config: &ForgeConfig) -> PathBuf {
    if config.cache_path.is_absolute() {
        config.cache_path.clone()
    } else {
        project_root.join(&config.cache_path)
    }
}
