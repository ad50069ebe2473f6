//! Parser for HTML title search results (`/find?q=...&s=tt`).
//!
//! Each `tr.findResult` row links a title (`/title/tt.../`) followed by its
//! year and, for non-movie entries, a category such as `(TV Series)`.

use metaforge_common::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::debug;

use super::{clean_text, imdb_id_in, selector, RequestContext};
use crate::metadata::fetcher::Document;
use crate::metadata::model::SearchCandidate;
use crate::metadata::scoring;

const SOURCE: &str = "imdb:search";

static UNWANTED_SEARCH_RESULTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\((TV Series|TV Episode|Short|Video Game)\)").expect("valid category regex")
});

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d{4})\)").expect("valid year regex"));

/// Search-result parser for the reference site.
#[derive(Debug, Clone)]
pub struct ReferenceSearchParser {
    provider_id: String,
    base_url: String,
}

impl ReferenceSearchParser {
    pub fn new(provider_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Extract scored candidates for `query`. An empty listing is not an error.
    pub fn parse(
        &self,
        document: &Document,
        query: &str,
        ctx: &RequestContext,
    ) -> Result<Vec<SearchCandidate>> {
        let html = Html::parse_document(document.as_html(SOURCE)?);
        let row_sel = selector(SOURCE, "tr.findResult td.result_text")?;
        let link_sel = selector(SOURCE, r#"a[href^="/title/"]"#)?;

        let mut candidates = Vec::new();
        for row in html.select(&row_sel) {
            let Some(link) = row.select(&link_sel).next() else {
                continue;
            };
            let text = clean_text(row);
            if ctx.filter_unwanted_categories && UNWANTED_SEARCH_RESULTS.is_match(&text) {
                debug!(result = %text, "Skipping unwanted search result");
                continue;
            }
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Some(imdb_id) = imdb_id_in(href) else {
                continue;
            };

            let title = clean_text(link);
            let year = YEAR
                .captures(&text)
                .and_then(|c| c[1].parse::<u16>().ok());
            candidates.push(SearchCandidate {
                provider_id: self.provider_id.clone(),
                external_id: imdb_id.clone(),
                match_score: scoring::similarity(query, &title),
                title,
                year,
                url: Some(format!("{}/title/{imdb_id}/", self.base_url)),
                imdb_id: Some(imdb_id),
            });
        }

        debug!(query, results = candidates.len(), "Parsed search results");
        Ok(candidates)
    }
}
