use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use metaforge_common::MediaType;

use crate::metadata::aggregator::AggregatorOptions;
use crate::metadata::merge::MergePolicy;
use crate::metadata::parsers::RequestContext;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperOptions,

    #[serde(default)]
    pub aggregator: AggregatorConfig,

    #[serde(default)]
    pub imdb: ImdbConfig,

    #[serde(default)]
    pub tmdb: TmdbConfig,

    #[serde(default)]
    pub addons: Vec<AddonConfig>,

    #[serde(default)]
    pub media_sources: Vec<MediaSourceConfig>,
}

// ---------------------------------------------------------------------------
// Scraper options
// ---------------------------------------------------------------------------

/// Per-request scraping behaviour.
///
/// Keys are accepted in snake_case or in the camelCase form used by older
/// settings files (`useSecondaryForMovies`, ...).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScraperOptions {
    /// Put the secondary (REST) source ahead of the primary one when merging
    /// movie metadata.
    #[serde(default, alias = "useSecondaryForMovies")]
    pub use_secondary_for_movies: bool,

    /// Fetch the secondary source for its collection name.
    #[serde(default, alias = "scrapeCollectionInfo")]
    pub scrape_collection_info: bool,

    /// Drop TV series, episodes, shorts and video games from search results.
    #[serde(default = "default_true", alias = "filterUnwantedCategories")]
    pub filter_unwanted_categories: bool,

    /// Prefer the release date of the configured country.
    #[serde(default = "default_true", alias = "localReleaseDate")]
    pub local_release_date: bool,

    #[serde(default = "default_max_keyword_count", alias = "maxKeywordCount")]
    pub max_keyword_count: usize,

    /// ISO-639-1 language code.
    #[serde(default = "default_language")]
    pub language: String,

    /// ISO-3166-1 alpha-2 country code.
    #[serde(default = "default_country")]
    pub country: String,

    /// Minimum match score for automatic candidate selection.
    #[serde(default = "default_score_threshold", alias = "scoreThreshold")]
    pub score_threshold: f64,
}

fn default_true() -> bool {
    true
}
fn default_max_keyword_count() -> usize {
    5
}
fn default_language() -> String {
    "en".to_string()
}
fn default_country() -> String {
    "US".to_string()
}
fn default_score_threshold() -> f64 {
    0.75
}

impl Default for ScraperOptions {
    fn default() -> Self {
        Self {
            use_secondary_for_movies: false,
            scrape_collection_info: false,
            filter_unwanted_categories: default_true(),
            local_release_date: default_true(),
            max_keyword_count: default_max_keyword_count(),
            language: default_language(),
            country: default_country(),
            score_threshold: default_score_threshold(),
        }
    }
}

impl ScraperOptions {
    /// Build options from a string-keyed map. Missing keys keep their
    /// defaults; unknown keys are ignored with a warning.
    pub fn from_map(map: &HashMap<String, String>) -> anyhow::Result<Self> {
        fn flag(key: &str, value: &str) -> anyhow::Result<bool> {
            match value.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(true),
                "false" | "no" | "0" | "off" => Ok(false),
                other => anyhow::bail!("Option '{}' expects a boolean, got '{}'", key, other),
            }
        }

        let mut options = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "useSecondaryForMovies" | "use_secondary_for_movies" => {
                    options.use_secondary_for_movies = flag(key, value)?
                }
                "scrapeCollectionInfo" | "scrape_collection_info" => {
                    options.scrape_collection_info = flag(key, value)?
                }
                "filterUnwantedCategories" | "filter_unwanted_categories" => {
                    options.filter_unwanted_categories = flag(key, value)?
                }
                "localReleaseDate" | "local_release_date" => {
                    options.local_release_date = flag(key, value)?
                }
                "maxKeywordCount" | "max_keyword_count" => {
                    options.max_keyword_count = value.trim().parse().map_err(|e| {
                        anyhow::anyhow!("Option '{}' expects a number: {}", key, e)
                    })?
                }
                "scoreThreshold" | "score_threshold" => {
                    options.score_threshold = value.trim().parse().map_err(|e| {
                        anyhow::anyhow!("Option '{}' expects a number: {}", key, e)
                    })?
                }
                "language" => options.language = value.trim().to_string(),
                "country" => options.country = value.trim().to_string(),
                _ => tracing::warn!(key = %key, "Ignoring unknown scraper option"),
            }
        }
        Ok(options)
    }

    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy {
            local_release_date: self.local_release_date,
            max_keyword_count: self.max_keyword_count,
            ..Default::default()
        }
    }

    /// Parser context for one request. Request-level locale overrides the
    /// configured one when present.
    pub fn request_context(
        &self,
        media_type: MediaType,
        language: Option<&str>,
        country: Option<&str>,
        imdb_id: Option<String>,
    ) -> RequestContext {
        RequestContext {
            media_type,
            language: language.unwrap_or(&self.language).to_string(),
            country: country.unwrap_or(&self.country).to_string(),
            imdb_id,
            max_keyword_count: self.max_keyword_count,
            filter_unwanted_categories: self.filter_unwanted_categories,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregatorConfig {
    /// Concurrent source tasks across all requests.
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,

    /// Upper bound for one whole resolution (none by default)
    #[serde(default)]
    pub request_deadline_secs: Option<u64>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Per-host request rate
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_worker_pool_size() -> usize {
    4
}
fn default_task_timeout() -> u64 {
    20
}
fn default_max_retries() -> u32 {
    1
}
fn default_retry_backoff() -> u64 {
    500
}
fn default_requests_per_second() -> u32 {
    5
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            task_timeout_secs: default_task_timeout(),
            request_deadline_secs: None,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

impl AggregatorConfig {
    pub fn options(&self) -> AggregatorOptions {
        AggregatorOptions {
            worker_pool_size: self.worker_pool_size,
            task_timeout: Duration::from_secs(self.task_timeout_secs),
            request_deadline: self.request_deadline_secs.map(Duration::from_secs),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImdbConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Site used for search and plot pages. May be a localized mirror.
    #[serde(default = "default_imdb_site")]
    pub site: String,

    /// Site serving the canonical reference and release pages.
    #[serde(default = "default_imdb_site")]
    pub reference_site: String,
}

fn default_imdb_site() -> String {
    "https://www.imdb.com".to_string()
}

impl Default for ImdbConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            site: default_imdb_site(),
            reference_site: default_imdb_site(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_tmdb_url")]
    pub base_url: String,
}

fn default_tmdb_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            base_url: default_tmdb_url(),
        }
    }
}

/// An XML addon scraper.
///
/// `search_url` may contain `{title}` and `{year}`, `details_url` must
/// contain `{id}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddonConfig {
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub search_url: String,

    pub details_url: String,
}

/// A media source declared in addition to the built-in ones.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaSourceConfig {
    pub name: String,

    #[serde(default)]
    pub title: Option<String>,

    /// Regex matched at token boundaries of release names
    #[serde(default)]
    pub pattern: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.imdb.enabled);
        assert!(!config.tmdb.enabled);
        assert_eq!(config.aggregator.worker_pool_size, 4);
        assert!(config.scraper.filter_unwanted_categories);
        assert!(config.scraper.local_release_date);
        assert!(!config.scraper.use_secondary_for_movies);
        assert_eq!(config.scraper.max_keyword_count, 5);
    }

    #[test]
    fn test_scraper_camel_case_aliases() {
        let toml_str = r#"
            useSecondaryForMovies = true
            maxKeywordCount = 12
            country = "DE"
        "#;
        let options: ScraperOptions = toml::from_str(toml_str).unwrap();
        assert!(options.use_secondary_for_movies);
        assert_eq!(options.max_keyword_count, 12);
        assert_eq!(options.country, "DE");
        assert!(options.filter_unwanted_categories);
    }

    #[test]
    fn test_scraper_options_from_map() {
        let map: HashMap<String, String> = [
            ("scrapeCollectionInfo", "true"),
            ("localReleaseDate", "false"),
            ("maxKeywordCount", "3"),
            ("somethingElse", "x"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let options = ScraperOptions::from_map(&map).unwrap();
        assert!(options.scrape_collection_info);
        assert!(!options.local_release_date);
        assert_eq!(options.max_keyword_count, 3);
        assert_eq!(options.merge_policy().max_keyword_count, 3);
    }

    #[test]
    fn test_scraper_options_from_map_rejects_bad_values() {
        let map: HashMap<String, String> =
            [("maxKeywordCount".to_string(), "many".to_string())].into();
        assert!(ScraperOptions::from_map(&map).is_err());

        let map: HashMap<String, String> =
            [("localReleaseDate".to_string(), "maybe".to_string())].into();
        assert!(ScraperOptions::from_map(&map).is_err());
    }

    #[test]
    fn test_request_context_overrides_locale() {
        let options = ScraperOptions::default();
        let ctx = options.request_context(MediaType::Movie, Some("de"), None, None);
        assert_eq!(ctx.language, "de");
        assert_eq!(ctx.country, "US");
    }

    #[test]
    fn test_aggregator_options() {
        let config: AggregatorConfig = toml::from_str("request_deadline_secs = 45").unwrap();
        let options = config.options();
        assert_eq!(options.request_deadline, Some(Duration::from_secs(45)));
        assert_eq!(options.task_timeout, Duration::from_secs(20));
    }
}
