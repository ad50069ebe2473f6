//! Trait definition and request types for metadata providers.
//!
//! A provider knows how to search one remote service and how to turn a
//! resolve request into a [`ResolutionPlan`]. It does not execute the plan;
//! the [`Aggregator`](super::aggregator::Aggregator) does.

use async_trait::async_trait;
use metaforge_common::{MediaType, Result};
use tokio_util::sync::CancellationToken;

use super::aggregator::{ResolutionPlan, SourceTask};
use super::model::{is_valid_imdb_id, ExternalId, ProviderIds, SearchCandidate};
use crate::config::ScraperOptions;

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// What a provider can be asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    MovieSearch,
    MovieMetadata,
    TvShowSearch,
    TvShowMetadata,
    /// Can contribute an auxiliary task to another provider's plan.
    Enrichment,
}

impl Capability {
    pub fn search_for(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Movie => Self::MovieSearch,
            MediaType::TvShow | MediaType::TvEpisode => Self::TvShowSearch,
        }
    }

    pub fn metadata_for(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Movie => Self::MovieMetadata,
            MediaType::TvShow | MediaType::TvEpisode => Self::TvShowMetadata,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A free-text search.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub title: String,
    pub year: Option<u16>,
    pub media_type: MediaType,
    /// Overrides the configured language.
    pub language: Option<String>,
}

impl SearchQuery {
    pub fn movie(title: impl Into<String>, year: Option<u16>) -> Self {
        Self {
            title: title.into(),
            year,
            media_type: MediaType::Movie,
            language: None,
        }
    }
}

/// A request for full metadata about one known item.
#[derive(Debug, Clone, Default)]
pub struct ResolveRequest {
    pub media_type: MediaType,
    /// Known external ids, keyed by provider name.
    pub ids: ProviderIds,
    pub title: Option<String>,
    pub year: Option<u16>,
    /// Details URL when a search result carried one.
    pub url: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
}

impl ResolveRequest {
    pub fn new(media_type: MediaType) -> Self {
        Self {
            media_type,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, provider: impl Into<String>, id: impl Into<ExternalId>) -> Self {
        self.ids.insert(provider.into(), id.into());
        self
    }

    /// A request for the item a search candidate points at.
    pub fn from_candidate(candidate: &SearchCandidate, media_type: MediaType) -> Self {
        let mut request = Self::new(media_type)
            .with_id(candidate.provider_id.clone(), candidate.external_id.clone());
        if let Some(imdb_id) = &candidate.imdb_id {
            request.ids.insert("imdb".to_string(), imdb_id.clone().into());
        }
        request.title = Some(candidate.title.clone());
        request.year = candidate.year;
        request.url = candidate.url.clone();
        request
    }

    pub fn id(&self, provider: &str) -> Option<String> {
        self.ids.get(provider).map(ToString::to_string)
    }

    pub fn imdb_id(&self) -> Option<String> {
        self.id("imdb").filter(|id| is_valid_imdb_id(id))
    }
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// A metadata source family (reference site, REST API, XML addon).
///
/// Providers are shared behind an `Arc` and must be cheap to call
/// concurrently.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Short, lowercase identifier (e.g. `"imdb"`). Also the key of this
    /// provider's ids in [`ProviderIds`].
    fn name(&self) -> &str;

    fn capabilities(&self) -> &[Capability];

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// `true` when the provider is configured well enough to be used.
    fn is_available(&self) -> bool;

    /// Search by title. An empty result is not an error.
    async fn search(
        &self,
        query: &SearchQuery,
        options: &ScraperOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchCandidate>>;

    /// Plan a resolution with this provider as the mandatory source.
    ///
    /// Fails with `MissingIdentifier` or `UnsupportedRequest` before any
    /// network activity when the request cannot be served.
    fn plan(&self, request: &ResolveRequest, options: &ScraperOptions) -> Result<ResolutionPlan>;

    /// A task contributing to another provider's plan, if this provider can
    /// serve `request` as a secondary source.
    fn auxiliary_task(
        &self,
        _request: &ResolveRequest,
        _options: &ScraperOptions,
    ) -> Option<SourceTask> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_candidate() {
        let candidate = SearchCandidate {
            provider_id: "tmdb".into(),
            external_id: "27205".into(),
            title: "Inception".into(),
            year: Some(2010),
            url: None,
            imdb_id: Some("tt1375666".into()),
            match_score: 1.0,
        };
        let request = ResolveRequest::from_candidate(&candidate, MediaType::Movie);
        assert_eq!(request.id("tmdb").as_deref(), Some("27205"));
        assert_eq!(request.imdb_id().as_deref(), Some("tt1375666"));
        assert_eq!(request.year, Some(2010));
    }

    #[test]
    fn test_invalid_imdb_id_is_ignored() {
        let request = ResolveRequest::new(MediaType::Movie).with_id("imdb", "1375666");
        assert!(request.imdb_id().is_none());
        assert_eq!(request.id("imdb").as_deref(), Some("1375666"));
    }

    #[test]
    fn test_capability_for_media_type() {
        assert_eq!(Capability::search_for(MediaType::TvShow), Capability::TvShowSearch);
        assert_eq!(Capability::metadata_for(MediaType::Movie), Capability::MovieMetadata);
    }
}
