//! Parser for the HTML title reference page (`/title/<id>/reference`).
//!
//! The page layout this parser reads:
//!
//! ```html
//! <link rel="canonical" href="https://www.imdb.com/title/tt1375666/reference">
//! <div id="tn15title"><h1>Inception <span>(<a href="/year/2010/">2010</a>)
//!   <span class="title-extra">Inception <i>(original title)</i></span></span></h1></div>
//! <img id="primary-poster" src="https://.../poster.jpg">
//! <div class="starbar-meta"><b>8.8/10</b> <a href="ratings">2,345,678 votes</a></div>
//! <div class="info"><h5>Genre:</h5><div class="info-content">
//!   <a href="/genre/Action">Action</a> | <a href="/genre/Sci-Fi">Sci-Fi</a></div></div>
//! <table class="cast"><tr><td class="nm"><a href="/name/nm0000138/">Leonardo DiCaprio</a></td>
//!   <td class="char">Cobb</td></tr></table>
//! ```
//!
//! Info blocks are keyed by their `h5` label (`Tagline:`, `Genre:`,
//! `Runtime:`, `Certification:`, `Release Date:`, `Plot Keywords:`,
//! `Director:`, `Writers:`, `Producers:`).

use metaforge_common::{ArtworkType, CastType, Result, ScrapeError};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{
    clean_text, imdb_id_in, lenient_date, lenient_number, own_text, parse_votes,
    select_first_text, selector, RequestContext, SourceParser,
};
use crate::metadata::fetcher::Document;
use crate::metadata::model::{non_blank, Artwork, CastMember, PartialMetadata, Rating};

const SOURCE: &str = "imdb:reference";

/// Reference-page parser. Stateless.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceParser;

struct Selectors {
    heading: Selector,
    year: Selector,
    original_title: Selector,
    canonical: Selector,
    poster: Selector,
    rating: Selector,
    votes: Selector,
    info: Selector,
    label: Selector,
    content: Selector,
    link: Selector,
    person: Selector,
    cast_row: Selector,
    cast_name: Selector,
    cast_role: Selector,
}

impl Selectors {
    fn new() -> Result<Self> {
        Ok(Self {
            heading: selector(SOURCE, "#tn15title h1")?,
            year: selector(SOURCE, "#tn15title h1 > span > a")?,
            original_title: selector(SOURCE, "#tn15title .title-extra")?,
            canonical: selector(SOURCE, r#"link[rel="canonical"]"#)?,
            poster: selector(SOURCE, "#primary-poster, a[name=\"poster\"] img")?,
            rating: selector(SOURCE, ".starbar-meta b")?,
            votes: selector(SOURCE, ".starbar-meta a")?,
            info: selector(SOURCE, "div.info")?,
            label: selector(SOURCE, "h5")?,
            content: selector(SOURCE, ".info-content")?,
            link: selector(SOURCE, "a")?,
            person: selector(SOURCE, r#"a[href^="/name/"]"#)?,
            cast_row: selector(SOURCE, "table.cast tr")?,
            cast_name: selector(SOURCE, r#"td.nm a[href^="/name/"]"#)?,
            cast_role: selector(SOURCE, "td.char")?,
        })
    }
}

impl SourceParser for ReferenceParser {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn parse(&self, document: &Document, ctx: &RequestContext) -> Result<PartialMetadata> {
        let html = Html::parse_document(document.as_html(SOURCE)?);
        let sel = Selectors::new()?;
        let root = html.root_element();

        let heading = root
            .select(&sel.heading)
            .next()
            .ok_or_else(|| ScrapeError::parse(SOURCE, "no title heading found"))?;

        let mut partial = PartialMetadata::new(SOURCE, ctx.media_type);
        partial.record.title = non_blank(own_text(heading));

        if let Some(year) = root.select(&sel.year).next().map(clean_text) {
            partial.record.year = lenient_number(&mut partial, "year", &year);
        }

        if let Some(extra) = root.select(&sel.original_title).next() {
            partial.record.original_title = non_blank(own_text(extra));
        }

        if let Some(poster) = root
            .select(&sel.poster)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(non_blank)
        {
            partial.record.artwork.push(Artwork {
                kind: ArtworkType::Poster,
                url: poster,
            });
        }

        parse_rating(root, &sel, &mut partial);

        for info in root.select(&sel.info) {
            let Some(label) = select_first_text(info, &sel.label) else {
                continue;
            };
            let Some(content) = info.select(&sel.content).next() else {
                continue;
            };
            parse_info_block(&label, content, &sel, ctx, &mut partial);
        }

        for row in root.select(&sel.cast_row) {
            let Some(link) = row.select(&sel.cast_name).next() else {
                continue;
            };
            let mut member = person(link, CastType::Actor);
            if let Some(role) = select_first_text(row, &sel.cast_role) {
                member = member.with_role(role);
            }
            partial.record.cast.push(member);
        }

        let imdb_id = root
            .select(&sel.canonical)
            .next()
            .and_then(|link| link.value().attr("href"))
            .and_then(imdb_id_in)
            .or_else(|| ctx.imdb_id.clone());
        if let Some(id) = imdb_id {
            partial.record.set_id("imdb", id);
        }

        debug!(
            title = ?partial.record.title,
            cast = partial.record.cast.len(),
            field_errors = partial.field_errors.len(),
            "Parsed reference page"
        );
        Ok(partial)
    }
}

fn parse_rating(root: ElementRef<'_>, sel: &Selectors, partial: &mut PartialMetadata) {
    let Some(raw) = select_first_text(root, &sel.rating) else {
        return;
    };
    let Some(value) = lenient_number::<f32>(partial, "rating", &raw) else {
        return;
    };
    let votes = select_first_text(root, &sel.votes)
        .and_then(|v| parse_votes(&v))
        .unwrap_or(0);
    partial.record.ratings.insert(
        "imdb".to_string(),
        Rating {
            value,
            votes,
            max_value: 10.0,
        },
    );
}

fn parse_info_block(
    label: &str,
    content: ElementRef<'_>,
    sel: &Selectors,
    ctx: &RequestContext,
    partial: &mut PartialMetadata,
) {
    let label = label.trim_end_matches(':').trim().to_ascii_lowercase();
    let links = || {
        content
            .select(&sel.link)
            .map(clean_text)
            .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("see more"))
    };

    match label.as_str() {
        "tagline" | "taglines" => {
            partial.record.tagline = non_blank(own_text(content));
        }
        "genre" | "genres" => partial.record.genres.extend(links()),
        "runtime" => {
            let raw = clean_text(content);
            partial.record.runtime_minutes = lenient_number(partial, "runtime", &raw);
        }
        "certification" => partial.record.certifications.extend(links()),
        "release date" => {
            let raw = clean_text(content);
            partial.record.release_date = lenient_date(partial, "release_date", &raw);
        }
        "plot keywords" | "keywords" => {
            let keywords: Vec<String> = links().take(ctx.max_keyword_count).collect();
            partial.record.keywords.extend(keywords);
        }
        "director" | "directors" => add_people(content, sel, CastType::Director, partial),
        "writer" | "writers" => add_people(content, sel, CastType::Writer, partial),
        "producer" | "producers" => add_people(content, sel, CastType::Producer, partial),
        _ => {}
    }
}

fn add_people(
    content: ElementRef<'_>,
    sel: &Selectors,
    department: CastType,
    partial: &mut PartialMetadata,
) {
    for link in content.select(&sel.person) {
        partial.record.cast.push(person(link, department));
    }
}

fn person(link: ElementRef<'_>, department: CastType) -> CastMember {
    let mut member = CastMember::new(clean_text(link), department);
    match department {
        CastType::Director => member.role = Some("Director".to_string()),
        CastType::Writer => member.role = Some("Writer".to_string()),
        CastType::Producer => member.role = Some("Producer".to_string()),
        _ => {}
    }
    if let Some(id) = link
        .value()
        .attr("href")
        .and_then(|href| href.split('/').find(|part| part.starts_with("nm")))
    {
        member.ids.insert("imdb".to_string(), id.into());
    }
    member
}
