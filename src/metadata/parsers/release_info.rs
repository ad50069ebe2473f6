//! Parser for the HTML release listing (`/title/<id>/releaseinfo`).
//!
//! Rows of `#release_dates` link their country through
//! `/calendar/?region=XX`. The first row for the requested country wins;
//! otherwise the first listed date is used.

use metaforge_common::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::debug;

use super::{clean_text, lenient_date, parse_date, selector, RequestContext, SourceParser};
use crate::metadata::fetcher::Document;
use crate::metadata::model::PartialMetadata;

const SOURCE: &str = "imdb:releaseinfo";

static REGION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/calendar/\?region=(.{2})").expect("valid region regex"));

#[derive(Debug, Default, Clone, Copy)]
pub struct ReleaseInfoParser;

impl SourceParser for ReleaseInfoParser {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn parse(&self, document: &Document, ctx: &RequestContext) -> Result<PartialMetadata> {
        let html = Html::parse_document(document.as_html(SOURCE)?);
        let mut partial = PartialMetadata::new(SOURCE, ctx.media_type);

        let table_sel = selector(SOURCE, "#release_dates")?;
        let row_sel = selector(SOURCE, "tr")?;
        let anchor_sel = selector(SOURCE, r#"a[href^="/calendar/"]"#)?;
        let date_sel = selector(SOURCE, ".release_date")?;

        let Some(table) = html.select(&table_sel).next() else {
            debug!("No release date table on page");
            return Ok(partial);
        };

        let local = table.select(&row_sel).find_map(|row| {
            let href = row.select(&anchor_sel).next()?.value().attr("href")?;
            let region = REGION.captures(href)?;
            if !region[1].eq_ignore_ascii_case(&ctx.country) {
                return None;
            }
            row.select(&date_sel)
                .next()
                .and_then(|cell| parse_date(&clean_text(cell)))
        });

        match local {
            Some(date) => {
                partial.record.release_date = Some(date);
                partial.release_date_is_local = true;
            }
            None => {
                if let Some(cell) = table.select(&date_sel).next() {
                    let raw = clean_text(cell);
                    partial.record.release_date = lenient_date(&mut partial, "release_date", &raw);
                }
            }
        }

        Ok(partial)
    }
}
