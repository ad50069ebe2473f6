//! Reference-site provider.
//!
//! A resolution needs an IMDb title id and fans out to three HTML pages:
//!
//! - `{reference_site}/title/{id}/reference` (mandatory)
//! - `{site}/title/{id}/plotsummary`
//! - `{reference_site}/title/{id}/releaseinfo`
//!
//! When `site` is a localized mirror the plot page also contributes the
//! localized title, so it ranks ahead of the reference page when merging.
//! The release listing runs alongside the other pages when the local
//! release date is wanted, otherwise only as a follow-up when nothing else
//! produced a date.

use std::sync::Arc;

use async_trait::async_trait;
use metaforge_common::{MediaType, Result, ScrapeError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::urlencoded;
use crate::config::{ImdbConfig, ScraperOptions};
use crate::metadata::aggregator::{FollowUpCondition, ResolutionPlan, SourceTask};
use crate::metadata::fetcher::{DocumentFetcher, DocumentKind, FetchSpec};
use crate::metadata::model::SearchCandidate;
use crate::metadata::parsers::{PlotParser, ReferenceParser, ReferenceSearchParser, ReleaseInfoParser};
use crate::metadata::provider::{Capability, MetadataProvider, ResolveRequest, SearchQuery};

pub const PROVIDER_ID: &str = "imdb";
pub const REFERENCE_SOURCE: &str = "imdb:reference";
pub const PLOT_SOURCE: &str = "imdb:plot";
pub const RELEASE_INFO_SOURCE: &str = "imdb:releaseinfo";

const CAPABILITIES: &[Capability] = &[Capability::MovieSearch, Capability::MovieMetadata];

pub struct ImdbProvider {
    fetcher: Arc<dyn DocumentFetcher>,
    enabled: bool,
    site: String,
    reference_site: String,
}

impl ImdbProvider {
    pub fn new(fetcher: Arc<dyn DocumentFetcher>, config: &ImdbConfig) -> Self {
        Self {
            fetcher,
            enabled: config.enabled,
            site: config.site.trim_end_matches('/').to_string(),
            reference_site: config.reference_site.trim_end_matches('/').to_string(),
        }
    }

    fn localized(&self) -> bool {
        self.site != self.reference_site
    }

    fn page(&self, site: &str, imdb_id: &str, page: &str) -> String {
        format!("{site}/title/{imdb_id}/{page}")
    }
}

#[async_trait]
impl MetadataProvider for ImdbProvider {
    fn name(&self) -> &str {
        PROVIDER_ID
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
                "{} search on {PROVIDER_ID}",
                query.media_type
            )));
        }

        let url = format!("{}/find?q={}&s=tt", self.site, urlencoded(query.title.trim()));
        debug!(url = %url, "IMDb search");

        let ctx = options.request_context(query.media_type, query.language.as_deref(), None, None);
        let spec = FetchSpec::new(url, DocumentKind::Html).with_locale(&ctx.language, &ctx.country);
        let document = self.fetcher.fetch(&spec, cancel).await?;

        ReferenceSearchParser::new(PROVIDER_ID, &self.site).parse(&document, &query.title, &ctx)
    }

    fn plan(&self, request: &ResolveRequest, options: &ScraperOptions) -> Result<ResolutionPlan> {
        if request.media_type != MediaType::Movie {
            return Err(ScrapeError::unsupported(format!(
                "{} metadata from {PROVIDER_ID}",
                request.media_type
            )));
        }
        let imdb_id = request
            .imdb_id()
            .ok_or_else(|| ScrapeError::missing_id("imdb", PROVIDER_ID))?;

        let ctx = options.request_context(
            request.media_type,
            request.language.as_deref(),
            request.country.as_deref(),
            Some(imdb_id.clone()),
        );
        let fetch = |url: String| {
            FetchSpec::new(url, DocumentKind::Html).with_locale(&ctx.language, &ctx.country)
        };

        let reference = SourceTask::mandatory(
            REFERENCE_SOURCE,
            Arc::new(ReferenceParser),
            fetch(self.page(&self.reference_site, &imdb_id, "reference")),
        );
        let plot = SourceTask::auxiliary(
            PLOT_SOURCE,
            Arc::new(PlotParser::new(self.localized())),
            fetch(self.page(&self.site, &imdb_id, "plotsummary")),
        );
        let release_info = SourceTask::auxiliary(
            RELEASE_INFO_SOURCE,
            Arc::new(ReleaseInfoParser),
            fetch(self.page(&self.reference_site, &imdb_id, "releaseinfo")),
        );

        let mut plan = ResolutionPlan::new(ctx.clone(), options.merge_policy())
            .task(reference)
            .task(plot);
        plan = if options.local_release_date {
            plan.task(release_info)
        } else {
            plan.follow_up(FollowUpCondition::MissingReleaseDate, release_info)
        };
        plan.precedence = vec![
            PLOT_SOURCE.to_string(),
            REFERENCE_SOURCE.to_string(),
            RELEASE_INFO_SOURCE.to_string(),
        ];
        Ok(plan)
    }
}
