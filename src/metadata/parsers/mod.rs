//! Source parsers: one implementation per page or response shape.
//!
//! Every parser turns one fetched [`Document`] into a [`PartialMetadata`].
//! Field-level problems (a runtime that is not a number, a date in an
//! unknown format) are recorded in [`PartialMetadata::field_errors`] and do not
//! abort the rest of the extraction. Only a document whose overall shape is
//! wrong fails with [`ScrapeError::Parse`](metaforge_common::ScrapeError).
//!
//! # Module layout
//!
//! - [`reference`] -- the main HTML reference page.
//! - [`plot`] -- the HTML plot summary page.
//! - [`release_info`] -- the HTML release-date listing.
//! - [`search`] -- HTML search result listings.
//! - [`addon`] -- addon-scraper XML (details and search results).
//! - [`rest`] -- REST JSON responses.

pub mod addon;
pub mod plot;
pub mod reference;
pub mod release_info;
pub mod rest;
pub mod search;

use std::str::FromStr;

use chrono::NaiveDate;
use metaforge_common::{MediaType, Result, ScrapeError};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

use super::fetcher::Document;
use super::model::PartialMetadata;

pub use addon::{AddonDetailsParser, AddonSearchParser};
pub use plot::PlotParser;
pub use reference::ReferenceParser;
pub use release_info::ReleaseInfoParser;
pub use rest::RestParser;
pub use search::ReferenceSearchParser;

/// Per-request inputs every parser may consult.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub media_type: MediaType,
    /// ISO-639-1 language code.
    pub language: String,
    /// ISO-3166-1 alpha-2 country code used for release dates and
    /// certifications.
    pub country: String,
    pub imdb_id: Option<String>,
    pub max_keyword_count: usize,
    pub filter_unwanted_categories: bool,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            media_type: MediaType::Movie,
            language: "en".to_string(),
            country: "US".to_string(),
            imdb_id: None,
            max_keyword_count: 5,
            filter_unwanted_categories: true,
        }
    }
}

/// Extracts a partial record from one document.
pub trait SourceParser: Send + Sync {
    /// Short identifier used in logs and diagnostics (e.g. `"imdb:reference"`).
    fn name(&self) -> &'static str;

    fn parse(&self, document: &Document, ctx: &RequestContext) -> Result<PartialMetadata>;
}

// ---------------------------------------------------------------------------
// Lenient field parsing
// ---------------------------------------------------------------------------

static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("valid number regex"));

/// First number in `raw` (`"148 min"` -> 148, `"8.8/10"` -> 8.8).
///
/// Records a field error and returns `None` when there is no number or it
/// does not fit `T`.
pub(crate) fn lenient_number<T>(
    partial: &mut PartialMetadata,
    field: &'static str,
    raw: &str,
) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(m) = FIRST_NUMBER.find(raw) else {
        partial.field_error(field, raw, "no number found");
        return None;
    };
    match m.as_str().replace(',', ".").parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            partial.field_error(field, raw, e.to_string());
            None
        }
    }
}

/// Vote counts such as `"1,234,567 votes"`.
pub(crate) fn parse_votes(raw: &str) -> Option<u32> {
    let digits: String = raw
        .split_whitespace()
        .next()?
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %B %Y", "%d %b %Y", "%B %d, %Y", "%b %d, %Y"];

static PARENTHESIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)").expect("valid parenthesis regex"));

/// Parse release dates like `2010-07-16`, `16 July 2010 (USA)` or
/// `July 16, 2010`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = PARENTHESIZED.replace_all(raw, " ");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&cleaned, fmt).ok())
}

/// Date field with error recording.
pub(crate) fn lenient_date(
    partial: &mut PartialMetadata,
    field: &'static str,
    raw: &str,
) -> Option<NaiveDate> {
    let date = parse_date(raw);
    if date.is_none() {
        partial.field_error(field, raw, "unrecognized date format");
    }
    date
}

/// Four-digit year from a date string like `"2023-04-15"`.
pub(crate) fn parse_year(date: Option<&str>) -> Option<u16> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse::<u16>().ok())
}

// ---------------------------------------------------------------------------
// HTML helpers
// ---------------------------------------------------------------------------

pub(crate) fn selector(source_id: &str, css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ScrapeError::parse(source_id, format!("bad selector {css:?}: {e}")))
}

/// Whitespace-normalized text of the first match, if not blank.
pub(crate) fn select_first_text(root: ElementRef<'_>, sel: &Selector) -> Option<String> {
    root.select(sel).next().map(clean_text).filter(|s| !s.is_empty())
}

/// Whitespace-normalized text of an element.
pub(crate) fn clean_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text directly inside an element, ignoring its child elements.
pub(crate) fn own_text(element: ElementRef<'_>) -> String {
    let parts: Vec<String> = element
        .children()
        .filter_map(|node| node.value().as_text().map(|t| t.to_string()))
        .collect();
    normalize_whitespace(&parts.join(" "))
}

pub(crate) fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

static IMDB_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(tt\d+)").expect("valid imdb regex"));

/// IMDb title id contained in a URL or path (`/title/tt1375666/` -> `tt1375666`).
pub fn imdb_id_in(text: &str) -> Option<String> {
    IMDB_ID.captures(text).map(|c| c[1].to_string())
}
