//! TMDB (The Movie Database) metadata provider.
//!
//! Queries the TMDB v3 REST API. Details are requested with the credits,
//! release dates (or content ratings), keywords and external ids appended so
//! one call yields a complete partial.
//!
//! Besides resolving on its own, the provider contributes an auxiliary task
//! to reference-site plans when a secondary source is wanted.

use std::sync::Arc;

use async_trait::async_trait;
use metaforge_common::{MediaType, Result, ScrapeError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::urlencoded;
use crate::config::{ScraperOptions, TmdbConfig};
use crate::metadata::aggregator::{ResolutionPlan, SourceTask};
use crate::metadata::fetcher::{DocumentFetcher, DocumentKind, FetchSpec};
use crate::metadata::model::SearchCandidate;
use crate::metadata::parsers::rest::{self, RestParser};
use crate::metadata::provider::{Capability, MetadataProvider, ResolveRequest, SearchQuery};

pub const PROVIDER_ID: &str = "tmdb";
pub const DETAILS_SOURCE: &str = "tmdb:details";

const MOVIE_APPEND: &str = "credits,release_dates,keywords,external_ids";
const TV_APPEND: &str = "credits,content_ratings,keywords,external_ids";

const CAPABILITIES: &[Capability] = &[
    Capability::MovieSearch,
    Capability::MovieMetadata,
    Capability::TvShowSearch,
    Capability::TvShowMetadata,
    Capability::Enrichment,
];

/// TMDB metadata provider.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use metaforge::config::TmdbConfig;
/// use metaforge::metadata::fetcher::HttpFetcher;
/// use metaforge::metadata::providers::TmdbProvider;
///
/// let fetcher = Arc::new(HttpFetcher::new(4).unwrap());
/// let provider = TmdbProvider::new(fetcher, &TmdbConfig::default());
/// ```
pub struct TmdbProvider {
    fetcher: Arc<dyn DocumentFetcher>,
    enabled: bool,
    api_key: String,
    base_url: String,
}

impl TmdbProvider {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, config: &TmdbConfig) -> Self {
        Self {
            fetcher,
            enabled: config.enabled,
            api_key: config.api_key.clone().unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build a full API URL with the API key and language query parameters.
    fn url(&self, path: &str, language: &str, extra_params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}{path}?api_key={}&language={}",
            self.base_url,
            urlencoded(&self.api_key),
            urlencoded(language)
        );
        for (key, value) in extra_params {
            url.push('&');
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoded(value));
        }
        url
    }

    fn path_for(media_type: MediaType) -> Result<&'static str> {
        match media_type {
            MediaType::Movie => Ok("movie"),
            MediaType::TvShow => Ok("tv"),
            MediaType::TvEpisode => Err(ScrapeError::unsupported(format!(
                "{media_type} metadata from {PROVIDER_ID}"
            ))),
        }
    }

    /// Details task for `request`, mandatory or auxiliary.
    ///
    /// Movies can be addressed by IMDb id when no TMDB id is known; TV shows
    /// need the TMDB id.
    fn details_task(
        &self,
        request: &ResolveRequest,
        options: &ScraperOptions,
        mandatory: bool,
    ) -> Result<SourceTask> {
        let path = Self::path_for(request.media_type)?;
        let id = request
            .id(PROVIDER_ID)
            .or_else(|| {
                (request.media_type == MediaType::Movie)
                    .then(|| request.imdb_id())
                    .flatten()
            })
            .ok_or_else(|| ScrapeError::missing_id(PROVIDER_ID, PROVIDER_ID))?;

        let ctx = self.context(request, options);
        let append = if path == "movie" { MOVIE_APPEND } else { TV_APPEND };
        let url = self.url(
            &format!("/{path}/{}", urlencoded(&id)),
            &tmdb_language(&ctx.language, &ctx.country),
            &[("append_to_response", append)],
        );
        let fetch = FetchSpec::new(url, DocumentKind::Json).with_locale(&ctx.language, &ctx.country);

        let parser = Arc::new(RestParser);
        Ok(if mandatory {
            SourceTask::mandatory(DETAILS_SOURCE, parser, fetch)
        } else {
            SourceTask::auxiliary(DETAILS_SOURCE, parser, fetch)
        })
    }

    fn context(
        &self,
        request: &ResolveRequest,
        options: &ScraperOptions,
    ) -> crate::metadata::parsers::RequestContext {
        options.request_context(
            request.media_type,
            request.language.as_deref(),
            request.country.as_deref(),
            request.imdb_id(),
        )
    }
}

/// TMDB language tags look like `en-US`.
fn tmdb_language(language: &str, country: &str) -> String {
    if country.is_empty() {
        language.to_string()
    } else {
        format!("{}-{}", language, country.to_ascii_uppercase())
    }
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    fn name(&self) -> &str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> &[Capability] {
        CAPABILITIES
    }

    fn is_available(&self) -> bool {
        self.enabled && !self.api_key.is_empty()
    }

    async fn search(
        &self,
        query: &SearchQuery,
        options: &ScraperOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchCandidate>> {
        let path = Self::path_for(query.media_type)?;
        let ctx = options.request_context(query.media_type, query.language.as_deref(), None, None);

        let mut params = vec![("query", query.title.trim())];
        let year_str = query.year.map(|y| y.to_string());
        if let Some(ref y) = year_str {
            let key = if path == "movie" { "year" } else { "first_air_date_year" };
            params.push((key, y.as_str()));
        }

        let url = self.url(
            &format!("/search/{path}"),
            &tmdb_language(&ctx.language, &ctx.country),
            &params,
        );
        debug!(url = %url, "TMDB search");

        let spec = FetchSpec::new(url, DocumentKind::Json).with_locale(&ctx.language, &ctx.country);
        let document = self.fetcher.fetch(&spec, cancel).await?;
        rest::parse_search(&document, PROVIDER_ID, query.media_type, &query.title)
    }

    fn plan(&self, request: &ResolveRequest, options: &ScraperOptions) -> Result<ResolutionPlan> {
        let task = self.details_task(request, options, true)?;
        Ok(ResolutionPlan::new(self.context(request, options), options.merge_policy()).task(task))
    }

    fn auxiliary_task(
        &self,
        request: &ResolveRequest,
        options: &ScraperOptions,
    ) -> Option<SourceTask> {
        self.details_task(request, options, false).ok()
    }
}
