//! Parsers for addon-scraper XML.
//!
//! Details documents look like:
//!
//! ```xml
//! <details>
//!   <title>Inception</title>
//!   <year>2010</year>
//!   <details><plot>Scraped by a nested function</plot></details>
//!   <fanart url="https://img.example/"><thumb>bg1.jpg</thumb></fanart>
//!   <thumb>https://img.example/poster.jpg</thumb>
//!   <actor><name>Leonardo DiCaprio</name><role>Cobb</role></actor>
//!   <director>Christopher Nolan</director>
//!   <credits>Christopher Nolan</credits>
//!   <genre>Action</genre>
//! </details>
//! ```
//!
//! A value nested in a scraper-function `<details>` element beats the same
//! tag at the top level. Search documents list `<entity>` elements with
//! `title`, `year`, `url` and `id`.

use metaforge_common::{ArtworkType, CastType, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use super::{imdb_id_in, lenient_number, RequestContext, SourceParser};
use crate::metadata::fetcher::Document;
use crate::metadata::model::{
    is_valid_imdb_id, non_blank, Artwork, CastMember, PartialMetadata, SearchCandidate,
};
use crate::metadata::scoring;
use crate::metadata::xml::XmlElement;

const DETAILS_SOURCE: &str = "addon:details";
const SEARCH_SOURCE: &str = "addon:search";

static RESULT_URL_IMDB_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(tt[0-9]+)/").expect("valid imdb url regex"));

static TITLE_WITH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)\s+\(?([0-9]{4})\)?$").expect("valid title/year regex")
});

/// Split `"Title 2010"` or `"Title (2010)"` into title and year.
pub fn split_title_year(query: &str) -> (String, Option<u16>) {
    let query = query.trim();
    match TITLE_WITH_YEAR.captures(query) {
        Some(c) if !c[1].trim().is_empty() => (c[1].trim().to_string(), c[2].parse().ok()),
        _ => (query.to_string(), None),
    }
}

// ---------------------------------------------------------------------------
// Details
// ---------------------------------------------------------------------------

/// Parser for one addon details document.
#[derive(Debug, Clone, Default)]
pub struct AddonDetailsParser {
    provider_id: String,
    external_id: Option<String>,
    result_url: Option<String>,
}

impl AddonDetailsParser {
    pub fn new(
        provider_id: impl Into<String>,
        external_id: Option<String>,
        result_url: Option<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            external_id,
            result_url,
        }
    }

    /// First non-blank value from a nested `<details>`, else from the base.
    fn value(root: &XmlElement, tag: &str) -> Option<String> {
        root.descendants("details")
            .into_iter()
            .filter_map(|sub| sub.value_of(tag).and_then(non_blank))
            .next()
            .or_else(|| root.value_of(tag).and_then(non_blank))
    }
}

impl SourceParser for AddonDetailsParser {
    fn name(&self) -> &'static str {
        DETAILS_SOURCE
    }

    fn parse(&self, document: &Document, ctx: &RequestContext) -> Result<PartialMetadata> {
        let root = document.as_xml(DETAILS_SOURCE)?;
        trace!(provider = %self.provider_id, elements = root.children.len(), "Addon details document");

        let mut partial = PartialMetadata::new(DETAILS_SOURCE, ctx.media_type);

        partial.record.title = Self::value(root, "title");
        partial.record.original_title = Self::value(root, "originaltitle");
        partial.record.plot = Self::value(root, "plot");
        partial.record.tagline = Self::value(root, "tagline");
        partial.record.collection_name = Self::value(root, "set");
        if let Some(year) = Self::value(root, "year") {
            partial.record.year = lenient_number(&mut partial, "year", &year);
        }
        if let Some(runtime) = Self::value(root, "runtime") {
            partial.record.runtime_minutes = lenient_number(&mut partial, "runtime", &runtime);
        }

        for fanart in root.descendants("fanart") {
            let base = fanart.attr("url").unwrap_or_default().trim();
            let thumbs = fanart.descendants("thumb");
            if thumbs.is_empty() {
                if !base.is_empty() {
                    partial.record.artwork.push(Artwork {
                        kind: ArtworkType::Background,
                        url: base.to_string(),
                    });
                }
                continue;
            }
            for thumb in thumbs {
                partial.record.artwork.push(Artwork {
                    kind: ArtworkType::Background,
                    url: format!("{base}{}", thumb.text_content().trim()),
                });
            }
        }

        for (parent, thumb) in root.descendants_with_parent("thumb") {
            if parent.name != "details" {
                continue;
            }
            if let Some(url) = non_blank(thumb.text_content()) {
                partial.record.artwork.push(Artwork {
                    kind: ArtworkType::Poster,
                    url,
                });
            }
        }

        for actor in root.descendants("actor") {
            let Some(name) = actor.value_of("name").and_then(non_blank) else {
                continue;
            };
            let mut member = CastMember::new(name, CastType::Actor);
            if let Some(role) = actor.value_of("role") {
                member = member.with_role(role);
            }
            partial.record.cast.push(member);
        }
        for (tag, department, role) in [
            ("director", CastType::Director, "Director"),
            ("credits", CastType::Writer, "Writer"),
        ] {
            for el in root.descendants(tag) {
                if let Some(name) = non_blank(el.text_content()) {
                    partial
                        .record
                        .cast
                        .push(CastMember::new(name, department).with_role(role));
                }
            }
        }

        partial.record.genres.extend(
            root.descendants("genre")
                .into_iter()
                .filter_map(|g| non_blank(g.text_content())),
        );

        if let Some(id) = &self.external_id {
            partial.record.set_id(self.provider_id.clone(), id.clone());
        }
        let imdb_id = ctx
            .imdb_id
            .clone()
            .filter(|id| is_valid_imdb_id(id))
            .or_else(|| {
                self.result_url
                    .as_deref()
                    .and_then(|url| RESULT_URL_IMDB_ID.captures(url))
                    .map(|c| c[1].to_string())
            });
        if let Some(imdb_id) = imdb_id {
            partial.record.set_id("imdb", imdb_id);
        }

        debug!(
            provider = %self.provider_id,
            title = ?partial.record.title,
            "Parsed addon details"
        );
        Ok(partial)
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Parser for addon search results.
#[derive(Debug, Clone)]
pub struct AddonSearchParser {
    provider_id: String,
}

impl AddonSearchParser {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
        }
    }

    pub fn parse(&self, document: &Document, query: &str) -> Result<Vec<SearchCandidate>> {
        let root = document.as_xml(SEARCH_SOURCE)?;
        let mut entities = root.descendants("entity");
        if root.name == "entity" {
            entities.insert(0, root);
        }

        let mut candidates = Vec::new();
        for entity in entities {
            let Some(title) = entity.value_of("title").and_then(non_blank) else {
                debug!(provider = %self.provider_id, "Skipping search entity without a title");
                continue;
            };
            let year = entity
                .value_of("year")
                .and_then(|y| y.trim().parse::<u16>().ok());
            let url = entity.value_of("url").and_then(non_blank);
            let id = entity.value_of("id").and_then(non_blank).unwrap_or_default();
            let imdb_id = match &url {
                Some(u) if u.contains("imdb") => {
                    Some(id.clone()).filter(|i| is_valid_imdb_id(i)).or_else(|| imdb_id_in(u))
                }
                _ => None,
            };

            candidates.push(SearchCandidate {
                provider_id: self.provider_id.clone(),
                external_id: id,
                match_score: scoring::similarity(query, &title),
                title,
                year,
                url,
                imdb_id,
            });
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::fetcher::{decode_document, DocumentKind};

    const DETAILS: &str = r#"<details>
  <title>Inception</title>
  <originaltitle></originaltitle>
  <year>2010</year>
  <runtime>n/a</runtime>
  <set>Nolan Box</set>
  <details><title>Inception (Extended)</title><plot>Dreams within dreams.</plot></details>
  <fanart url="https://img.example/"><thumb>bg1.jpg</thumb><thumb>bg2.jpg</thumb></fanart>
  <fanart url="https://img.example/single.jpg"/>
  <thumb>https://img.example/poster.jpg</thumb>
  <actor><name>Leonardo DiCaprio</name><role>Cobb</role></actor>
  <actor><name>Elliot Page</name></actor>
  <director>Christopher Nolan</director>
  <credits>Christopher Nolan</credits>
  <genre>Action</genre>
  <genre>Science Fiction</genre>
</details>"#;

    fn parse_details(parser: AddonDetailsParser) -> PartialMetadata {
        let doc = decode_document("test", DocumentKind::Xml, DETAILS.as_bytes()).unwrap();
        parser.parse(&doc, &RequestContext::default()).unwrap()
    }

    #[test]
    fn nested_details_beat_base() {
        let partial = parse_details(AddonDetailsParser::default());
        let record = &partial.record;
        assert_eq!(record.title.as_deref(), Some("Inception (Extended)"));
        assert_eq!(record.plot.as_deref(), Some("Dreams within dreams."));
        assert_eq!(record.original_title, None);
        assert_eq!(record.year, Some(2010));
        assert_eq!(record.collection_name.as_deref(), Some("Nolan Box"));
    }

    #[test]
    fn bad_runtime_is_recorded() {
        let partial = parse_details(AddonDetailsParser::default());
        assert!(partial.record.runtime_minutes.is_none());
        assert_eq!(partial.field_errors.len(), 1);
        assert_eq!(partial.field_errors[0].raw, "n/a");
    }

    #[test]
    fn artwork_and_people() {
        let partial = parse_details(AddonDetailsParser::default());
        let record = &partial.record;
        let urls: Vec<(&str, ArtworkType)> = record
            .artwork
            .iter()
            .map(|a| (a.url.as_str(), a.kind))
            .collect();
        assert_eq!(
            urls,
            vec![
                ("https://img.example/bg1.jpg", ArtworkType::Background),
                ("https://img.example/bg2.jpg", ArtworkType::Background),
                ("https://img.example/single.jpg", ArtworkType::Background),
                ("https://img.example/poster.jpg", ArtworkType::Poster),
            ]
        );
        assert_eq!(record.cast.len(), 4);
        assert_eq!(record.cast[0].role.as_deref(), Some("Cobb"));
        assert!(record.cast[1].role.is_none());
        assert_eq!(record.cast[2].department, CastType::Director);
        assert_eq!(record.cast[3].department, CastType::Writer);
        assert_eq!(record.genres, vec!["Action", "Science Fiction"]);
    }

    #[test]
    fn ids_from_result_url() {
        let parser = AddonDetailsParser::new(
            "metadata.example",
            Some("27205".into()),
            Some("https://www.imdb.com/title/tt1375666/".into()),
        );
        let partial = parse_details(parser);
        assert_eq!(partial.record.id("metadata.example").as_deref(), Some("27205"));
        assert_eq!(partial.record.imdb_id().as_deref(), Some("tt1375666"));
    }

    #[test]
    fn search_entities() {
        let xml = r#"<results>
  <entity><title>Inception</title><year>2010</year>
    <url>https://www.imdb.com/title/tt1375666/</url><id>tt1375666</id></entity>
  <entity><title>Inception: Jump Right Into the Action</title><year>2010</year>
    <url>https://api.example.org/movie/613092</url><id>613092</id></entity>
  <entity><year>1999</year></entity>
</results>"#;
        let doc = decode_document("test", DocumentKind::Xml, xml.as_bytes()).unwrap();
        let results = AddonSearchParser::new("metadata.example")
            .parse(&doc, "Inception")
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].imdb_id.as_deref(), Some("tt1375666"));
        assert_eq!(results[1].imdb_id, None);
        assert_eq!(results[1].external_id, "613092");
        assert!(results[0].match_score > results[1].match_score);
    }

    #[test]
    fn test_split_title_year() {
        assert_eq!(split_title_year("Inception 2010"), ("Inception".into(), Some(2010)));
        assert_eq!(split_title_year("Inception (2010)"), ("Inception".into(), Some(2010)));
        assert_eq!(split_title_year("2012"), ("2012".into(), None));
        assert_eq!(split_title_year("Blade Runner 2049"), ("Blade Runner".into(), Some(2049)));
    }
}
