//! The resolution engine: search, pick, plan, aggregate.
//!
//! The engine owns the provider registry and the aggregator. A resolve
//! request is planned by the primary provider for its media type; when the
//! scraper options ask for a secondary source, the first other provider with
//! the `Enrichment` capability adds an auxiliary task to that plan.

use std::sync::Arc;

use metaforge_common::{Result, ScrapeError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::aggregator::{Aggregator, ResolutionPlan};
use super::fetcher::{DocumentFetcher, HttpFetcher};
use super::model::{MetadataRecord, SearchCandidate};
use super::provider::{Capability, MetadataProvider, ResolveRequest, SearchQuery};
use super::providers::{ImdbProvider, KodiAddonProvider, TmdbProvider};
use super::registry::ProviderRegistry;
use crate::config::{Config, ScraperOptions};

pub struct Engine {
    registry: ProviderRegistry,
    aggregator: Aggregator,
    options: ScraperOptions,
}

impl Engine {
    pub fn new(registry: ProviderRegistry, aggregator: Aggregator, options: ScraperOptions) -> Self {
        Self {
            registry,
            aggregator,
            options,
        }
    }

    /// Build an engine from configuration with an HTTP fetcher.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let fetcher: Arc<dyn DocumentFetcher> =
            Arc::new(HttpFetcher::new(config.aggregator.requests_per_second)?);
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Build an engine from configuration around an existing fetcher.
    pub fn with_fetcher(config: &Config, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(ImdbProvider::new(fetcher.clone(), &config.imdb)));
        registry.register(Arc::new(TmdbProvider::new(fetcher.clone(), &config.tmdb)));
        for addon in &config.addons {
            registry.register(Arc::new(KodiAddonProvider::new(fetcher.clone(), addon)));
        }
        debug!(
            providers = registry.len(),
            available = registry.available().len(),
            "Provider registry ready"
        );

        let aggregator = Aggregator::new(fetcher, config.aggregator.options());
        Self::new(registry, aggregator, config.scraper.clone())
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn options(&self) -> &ScraperOptions {
        &self.options
    }

    /// Ranked candidates from every capable provider.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchCandidate>> {
        self.search_with(query, &CancellationToken::new()).await
    }

    pub async fn search_with(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchCandidate>> {
        if query.title.trim().is_empty() {
            return Err(ScrapeError::unsupported("search without a title"));
        }
        let results = self.registry.search(query, &self.options, cancel).await?;
        info!(query = %query.title, results = results.len(), "Search finished");
        Ok(results)
    }

    /// Full metadata for a known item.
    pub async fn resolve(&self, request: &ResolveRequest) -> Result<MetadataRecord> {
        self.resolve_with(request, &CancellationToken::new()).await
    }

    pub async fn resolve_with(
        &self,
        request: &ResolveRequest,
        cancel: &CancellationToken,
    ) -> Result<MetadataRecord> {
        let plan = self.plan(request)?;
        debug!(?plan, "Resolution plan");
        self.aggregator.resolve(plan, cancel).await
    }

    /// Search, then resolve the best candidate if it scores at least
    /// `score_threshold`.
    pub async fn search_and_resolve(&self, query: &SearchQuery) -> Result<MetadataRecord> {
        let candidates = self.search(query).await?;
        let best = candidates
            .into_iter()
            .next()
            .filter(|c| c.match_score >= self.options.score_threshold)
            .ok_or_else(|| ScrapeError::missing_id("confident match", "search"))?;
        info!(
            title = %best.title,
            provider = %best.provider_id,
            score = best.match_score,
            "Selected candidate"
        );
        self.resolve(&ResolveRequest::from_candidate(&best, query.media_type))
            .await
    }

    /// The capable provider whose id the request carries, else the first
    /// capable one (which then reports what id it is missing).
    fn primary_for(&self, request: &ResolveRequest) -> Result<Arc<dyn MetadataProvider>> {
        let capable = self
            .registry
            .with_capability(Capability::metadata_for(request.media_type));
        if capable.is_empty() {
            return Err(ScrapeError::unsupported(format!(
                "no provider serves {} metadata",
                request.media_type
            )));
        }
        capable
            .iter()
            .find(|p| request.ids.contains_key(p.name()))
            .or_else(|| capable.first())
            .cloned()
            .ok_or_else(|| ScrapeError::missing_id("external", "engine"))
    }

    /// Plan `request` on its primary provider, adding a secondary source when
    /// the options ask for one.
    pub fn plan(&self, request: &ResolveRequest) -> Result<ResolutionPlan> {
        let primary = self.primary_for(request)?;
        let mut plan = primary.plan(request, &self.options)?;

        let wants_secondary =
            self.options.use_secondary_for_movies || self.options.scrape_collection_info;
        if !wants_secondary {
            return Ok(plan);
        }

        let secondary = self
            .registry
            .with_capability(Capability::Enrichment)
            .into_iter()
            .filter(|p| p.name() != primary.name())
            .find_map(|p| p.auxiliary_task(request, &self.options));
        let Some(task) = secondary else {
            debug!("No secondary source can serve this request");
            return Ok(plan);
        };

        let mut precedence = if plan.precedence.is_empty() {
            plan.tasks.iter().map(|t| t.source_id.clone()).collect()
        } else {
            std::mem::take(&mut plan.precedence)
        };
        if self.options.use_secondary_for_movies
            && request.media_type == metaforge_common::MediaType::Movie
        {
            precedence.insert(0, task.source_id.clone());
        } else {
            precedence.push(task.source_id.clone());
        }
        for (_, follow_up) in &plan.follow_ups {
            if !precedence.contains(&follow_up.source_id) {
                precedence.push(follow_up.source_id.clone());
            }
        }
        plan.precedence = precedence;
        Ok(plan.task(task))
    }
}
