//! Provider registry for managing multiple [`MetadataProvider`] implementations.
//!
//! The [`ProviderRegistry`] is the injected directory of capability-tagged
//! providers. Searches fan out to every available provider that can search
//! the requested media type; results are deduplicated and ranked.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use metaforge_common::error::SourceFailure;
use metaforge_common::{Result, ScrapeError};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::model::SearchCandidate;
use super::provider::{Capability, MetadataProvider, SearchQuery};
use super::scoring;
use crate::config::ScraperOptions;

/// A registry that manages multiple [`MetadataProvider`] implementations.
///
/// Providers are stored in registration order. The first available provider
/// with a capability is the *primary* provider for it.
///
/// # Examples
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use metaforge::metadata::registry::ProviderRegistry;
///
/// let mut registry = ProviderRegistry::new();
/// registry.register(Arc::new(my_provider));
///
/// let results = registry.search(&SearchQuery::movie("Inception", Some(2010)), &options, &cancel).await?;
/// ```
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn MetadataProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no providers.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Register a new metadata provider.
    pub fn register(&mut self, provider: Arc<dyn MetadataProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// All providers that are currently available.
    pub fn available(&self) -> Vec<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .cloned()
            .collect()
    }

    /// Available providers supporting `capability`, in registration order.
    pub fn with_capability(&self, capability: Capability) -> Vec<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.is_available() && p.supports(capability))
            .cloned()
            .collect()
    }

    /// The first available provider supporting `capability`.
    pub fn primary_for(&self, capability: Capability) -> Option<Arc<dyn MetadataProvider>> {
        self.providers
            .iter()
            .find(|p| p.is_available() && p.supports(capability))
            .cloned()
    }

    /// Look up a provider by its [`MetadataProvider::name`].
    ///
    /// Returns `None` if no provider with the given name has been registered.
    pub fn get(&self, name: &str) -> Option<Arc<dyn MetadataProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    /// Search every capable provider concurrently.
    ///
    /// A failing provider is logged and skipped as long as another one
    /// answers. If every capable provider fails, the failures are returned
    /// instead of an empty list: a lone failure as is, several as
    /// [`ScrapeError::Aggregate`] led by the first registered provider.
    /// When several providers return the same title (case-insensitive) and
    /// year, only the best-scored entry is kept. The result is ranked
    /// best-first.
    pub async fn search(
        &self,
        query: &SearchQuery,
        options: &ScraperOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchCandidate>> {
        let providers = self.with_capability(Capability::search_for(query.media_type));
        if providers.is_empty() {
            return Ok(Vec::new());
        }

        let searches = providers
            .iter()
            .map(|provider| provider.search(query, options, cancel));
        let outcomes = join_all(searches).await;

        let mut all_results: Vec<SearchCandidate> = Vec::new();
        let mut answered = 0usize;
        let mut failures: Vec<SourceFailure> = Vec::new();
        for (provider, outcome) in providers.iter().zip(outcomes) {
            match outcome {
                Ok(results) => {
                    answered += 1;
                    all_results.extend(results);
                }
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Search failed");
                    failures.push(SourceFailure {
                        source_id: format!("{}:search", provider.name()),
                        error: e,
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        if answered == 0 && !failures.is_empty() {
            let mut failures = failures.into_iter();
            let first = failures.next().map(Box::new);
            let rest: Vec<SourceFailure> = failures.collect();
            return Err(match first {
                Some(first) if rest.is_empty() => first.error,
                Some(first) => ScrapeError::Aggregate {
                    mandatory: first,
                    auxiliary: rest,
                },
                None => ScrapeError::Cancelled,
            });
        }

        let mut seen = HashMap::<(String, Option<u16>), usize>::new();
        let mut deduped: Vec<SearchCandidate> = Vec::new();
        for result in all_results {
            let key = (result.title.to_lowercase(), result.year);
            if let Some(&idx) = seen.get(&key) {
                if scoring::compare(&result, &deduped[idx], query.year).is_lt() {
                    deduped[idx] = result;
                }
            } else {
                seen.insert(key, deduped.len());
                deduped.push(result);
            }
        }

        scoring::rank(&mut deduped, query.year);
        Ok(deduped)
    }
}
