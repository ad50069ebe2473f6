//! XML addon-scraper provider.
//!
//! Each configured addon exposes a search URL template (`{title}`, `{year}`)
//! and a details URL template (`{id}`). Both answer in the addon XML dialect
//! handled by [`crate::metadata::parsers::addon`].

use std::sync::Arc;

use async_trait::async_trait;
use metaforge_common::{MediaType, Result, ScrapeError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::urlencoded;
use crate::config::{AddonConfig, ScraperOptions};
use crate::metadata::aggregator::{ResolutionPlan, SourceTask};
use crate::metadata::fetcher::{DocumentFetcher, DocumentKind, FetchSpec};
use crate::metadata::model::SearchCandidate;
use crate::metadata::parsers::addon::split_title_year;
use crate::metadata::parsers::{AddonDetailsParser, AddonSearchParser};
use crate::metadata::provider::{Capability, MetadataProvider, ResolveRequest, SearchQuery};

const CAPABILITIES: &[Capability] = &[Capability::MovieSearch, Capability::MovieMetadata];

pub struct KodiAddonProvider {
    fetcher: Arc<dyn DocumentFetcher>,
    name: String,
    enabled: bool,
    search_url: String,
    details_url: String,
}

impl KodiAddonProvider {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, config: &AddonConfig) -> Self {
        Self {
            fetcher,
            name: config.name.clone(),
            enabled: config.enabled,
            search_url: config.search_url.clone(),
            details_url: config.details_url.clone(),
        }
    }

    fn details_source(&self) -> String {
        format!("{}:details", self.name)
    }
}

#[async_trait]
impl MetadataProvider for KodiAddonProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> &[Capability] {
        CAPABILITIES
    }

    fn is_available(&self) -> bool {
        self.enabled
    }

    async fn search(
        &self,
        query: &SearchQuery,
        options: &ScraperOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchCandidate>> {
        if query.media_type != MediaType::Movie {
            return Err(ScrapeError::unsupported(format!(
                "{} search on {}",
                query.media_type, self.name
            )));
        }

        let (title, parsed_year) = match query.year {
            Some(year) => (query.title.trim().to_string(), Some(year)),
            None => split_title_year(&query.title),
        };
        let year = parsed_year.map(|y| y.to_string()).unwrap_or_default();
        let url = self
            .search_url
            .replace("{title}", &urlencoded(&title))
            .replace("{year}", &year);
        debug!(addon = %self.name, url = %url, "Addon search");

        let ctx = options.request_context(query.media_type, query.language.as_deref(), None, None);
        let spec = FetchSpec::new(url, DocumentKind::Xml).with_locale(&ctx.language, &ctx.country);
        let document = self.fetcher.fetch(&spec, cancel).await?;
        AddonSearchParser::new(&self.name).parse(&document, &title)
    }

    fn plan(&self, request: &ResolveRequest, options: &ScraperOptions) -> Result<ResolutionPlan> {
        if request.media_type != MediaType::Movie {
            return Err(ScrapeError::unsupported(format!(
                "{} metadata from {}",
                request.media_type, self.name
            )));
        }
        let id = request
            .id(&self.name)
            .ok_or_else(|| ScrapeError::missing_id(&self.name, &self.name))?;

        let ctx = options.request_context(
            request.media_type,
            request.language.as_deref(),
            request.country.as_deref(),
            request.imdb_id(),
        );
        let url = self.details_url.replace("{id}", &urlencoded(&id));
        let fetch = FetchSpec::new(url, DocumentKind::Xml).with_locale(&ctx.language, &ctx.country);
        let parser = AddonDetailsParser::new(&self.name, Some(id), request.url.clone());

        Ok(ResolutionPlan::new(ctx, options.merge_policy()).task(SourceTask::mandatory(
            self.details_source(),
            Arc::new(parser),
            fetch,
        )))
    }
}
