mod types;

pub use types::*;

use anyhow::{Context, Result};
use metaforge_common::MediaSource;
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./metaforge.toml",
        "~/.config/metaforge/config.toml",
        "/etc/metaforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.aggregator.worker_pool_size == 0 {
        anyhow::bail!("Aggregator worker_pool_size must be at least 1");
    }
    if config.aggregator.task_timeout_secs == 0 {
        anyhow::bail!("Aggregator task_timeout_secs cannot be 0");
    }

    let threshold = config.scraper.score_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        anyhow::bail!("Scraper score_threshold must be within 0..=1, got {}", threshold);
    }

    if config.tmdb.enabled
        && config
            .tmdb
            .api_key
            .as_deref()
            .map_or(true, |k| k.trim().is_empty())
    {
        anyhow::bail!("TMDB is enabled but has no API key");
    }

    for addon in config.addons.iter().filter(|a| a.enabled) {
        if addon.search_url.trim().is_empty() || addon.details_url.trim().is_empty() {
            anyhow::bail!("Addon '{}' is enabled but has no search or details URL", addon.name);
        }
        if !addon.details_url.contains("{id}") {
            anyhow::bail!("Addon '{}' details_url must contain {{id}}", addon.name);
        }
    }

    for source in &config.media_sources {
        if source.name.trim().is_empty() {
            anyhow::bail!("Media source entries need a name");
        }
        if let Some(pattern) = &source.pattern {
            regex::Regex::new(pattern).with_context(|| {
                format!("Media source '{}' has an invalid pattern", source.name)
            })?;
        }
    }

    if !config.imdb.enabled && !config.tmdb.enabled && !config.addons.iter().any(|a| a.enabled) {
        tracing::warn!("No metadata provider is enabled");
    }

    Ok(())
}

/// Declare the configured media sources in the process-wide registry.
pub fn register_media_sources(config: &Config) -> Result<Vec<MediaSource>> {
    config
        .media_sources
        .iter()
        .map(|source| {
            MediaSource::declare(
                &source.name,
                source.title.as_deref().unwrap_or(&source.name),
                source.pattern.as_deref(),
            )
            .with_context(|| format!("Failed to declare media source '{}'", source.name))
        })
        .collect()
}
