//! Parser for TMDB-style REST JSON.
//!
//! Details are expected with `append_to_response=credits,release_dates,
//! keywords,external_ids` (movies) or `credits,content_ratings,keywords,
//! external_ids` (TV shows). Missing appended blocks simply contribute
//! nothing.

use chrono::Datelike;
use metaforge_common::{ArtworkType, CastType, MediaType, Result, ScrapeError};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{lenient_date, lenient_number, parse_year, RequestContext, SourceParser};
use crate::metadata::fetcher::Document;
use crate::metadata::model::{
    is_valid_imdb_id, non_blank, Artwork, CastMember, PartialMetadata, Rating, SearchCandidate,
};
use crate::metadata::scoring;

const SOURCE: &str = "tmdb:details";
const SEARCH_SOURCE: &str = "tmdb:search";

pub const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";
const TMDB_SITE: &str = "https://www.themoviedb.org";

// ---------------------------------------------------------------------------
// Response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Details {
    id: u64,
    title: Option<String>,
    name: Option<String>,
    original_title: Option<String>,
    original_name: Option<String>,
    tagline: Option<String>,
    overview: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    /// Kept raw: some responses carry strings or nulls here.
    runtime: Option<Value>,
    #[serde(default)]
    episode_run_time: Vec<u32>,
    vote_average: Option<f32>,
    vote_count: Option<u32>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    imdb_id: Option<String>,
    belongs_to_collection: Option<Collection>,
    #[serde(default)]
    genres: Vec<Named>,
    credits: Option<Credits>,
    release_dates: Option<CountryList<CountryReleases>>,
    content_ratings: Option<CountryList<ContentRating>>,
    keywords: Option<Keywords>,
    external_ids: Option<ExternalIds>,
}

#[derive(Debug, Deserialize)]
struct Collection {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<CastCredit>,
    #[serde(default)]
    crew: Vec<CrewCredit>,
}

#[derive(Debug, Deserialize)]
struct CastCredit {
    id: Option<u64>,
    name: String,
    character: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrewCredit {
    id: Option<u64>,
    name: String,
    job: Option<String>,
    department: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountryList<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct CountryReleases {
    iso_3166_1: String,
    #[serde(default)]
    release_dates: Vec<ReleaseDate>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDate {
    #[serde(default)]
    certification: String,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentRating {
    iso_3166_1: String,
    #[serde(default)]
    rating: String,
}

/// Movies list keywords under `keywords`, TV shows under `results`.
#[derive(Debug, Deserialize)]
struct Keywords {
    #[serde(default, alias = "results")]
    keywords: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    imdb_id: Option<String>,
}

fn image_url(path: Option<&str>) -> Option<String> {
    path.filter(|p| !p.is_empty())
        .map(|p| format!("{TMDB_IMAGE_BASE}{p}"))
}

/// Runtime in minutes from a JSON number or numeric string. Anything else
/// is recorded as a field error.
fn runtime_minutes(partial: &mut PartialMetadata, raw: Option<&Value>) -> Option<u32> {
    match raw? {
        Value::Null => None,
        Value::Number(n) => match n.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(minutes) => Some(minutes),
            None => {
                partial.field_error("runtime", &n.to_string(), "not a whole number of minutes");
                None
            }
        },
        Value::String(text) => lenient_number(partial, "runtime", text),
        other => {
            partial.field_error("runtime", &other.to_string(), "unexpected JSON type");
            None
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(source_id: &str, value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|e| ScrapeError::parse(source_id, e.to_string()))
}

// ---------------------------------------------------------------------------
// Details
// ---------------------------------------------------------------------------

/// Details parser for one movie or TV show response.
#[derive(Debug, Default, Clone, Copy)]
pub struct RestParser;

impl SourceParser for RestParser {
    fn name(&self) -> &'static str {
        SOURCE
    }

    fn parse(&self, document: &Document, ctx: &RequestContext) -> Result<PartialMetadata> {
        let details: Details = decode(SOURCE, document.as_json(SOURCE)?)?;
        let mut partial = PartialMetadata::new(SOURCE, ctx.media_type);
        let runtime = runtime_minutes(&mut partial, details.runtime.as_ref());

        let record = &mut partial.record;
        record.title = details.title.or(details.name).and_then(non_blank);
        record.original_title = details
            .original_title
            .or(details.original_name)
            .and_then(non_blank);
        record.tagline = details.tagline.and_then(non_blank);
        record.plot = details.overview.and_then(non_blank);
        record.runtime_minutes = runtime
            .filter(|r| *r > 0)
            .or_else(|| details.episode_run_time.first().copied());
        record.collection_name = details
            .belongs_to_collection
            .and_then(|c| c.name)
            .and_then(non_blank);
        record.genres = details.genres.into_iter().map(|g| g.name).collect();

        if let (Some(value), Some(votes)) = (details.vote_average, details.vote_count) {
            if votes > 0 {
                record.ratings.insert(
                    "tmdb".to_string(),
                    Rating {
                        value,
                        votes,
                        max_value: 10.0,
                    },
                );
            }
        }

        if let Some(url) = image_url(details.poster_path.as_deref()) {
            record.artwork.push(Artwork {
                kind: ArtworkType::Poster,
                url,
            });
        }
        if let Some(url) = image_url(details.backdrop_path.as_deref()) {
            record.artwork.push(Artwork {
                kind: ArtworkType::Background,
                url,
            });
        }

        if let Some(credits) = details.credits {
            for c in credits.cast {
                let mut member = CastMember::new(c.name, CastType::Actor);
                if let Some(character) = c.character {
                    member = member.with_role(character);
                }
                if let Some(id) = c.id {
                    member.ids.insert("tmdb".to_string(), id.into());
                }
                record.cast.push(member);
            }
            for c in credits.crew {
                let department = CastType::from_department(c.department.as_deref().unwrap_or(""));
                let mut member = CastMember::new(c.name, department);
                if let Some(job) = c.job {
                    member = member.with_role(job);
                }
                if let Some(id) = c.id {
                    member.ids.insert("tmdb".to_string(), id.into());
                }
                record.cast.push(member);
            }
        }

        if let Some(keywords) = details.keywords {
            record.keywords = keywords
                .keywords
                .into_iter()
                .map(|k| k.name)
                .take(ctx.max_keyword_count)
                .collect();
        }

        record.set_id("tmdb", details.id);
        let imdb_id = details
            .imdb_id
            .or(details.external_ids.and_then(|e| e.imdb_id))
            .filter(|id| is_valid_imdb_id(id));
        if let Some(imdb_id) = imdb_id {
            record.set_id("imdb", imdb_id);
        }

        // Certification and local release date for the requested country.
        let mut local_date = None;
        if let Some(list) = details.release_dates {
            if let Some(country) = list
                .results
                .into_iter()
                .find(|r| r.iso_3166_1.eq_ignore_ascii_case(&ctx.country))
            {
                for release in &country.release_dates {
                    if !release.certification.trim().is_empty() {
                        record.certifications.insert(format!(
                            "{}:{}",
                            country.iso_3166_1,
                            release.certification.trim()
                        ));
                    }
                }
                local_date = country
                    .release_dates
                    .iter()
                    .filter_map(|r| r.release_date.as_deref())
                    .find_map(|d| super::parse_date(d.get(..10).unwrap_or(d)));
            }
        }
        if let Some(list) = details.content_ratings {
            for rating in list.results {
                if rating.iso_3166_1.eq_ignore_ascii_case(&ctx.country)
                    && !rating.rating.trim().is_empty()
                {
                    record
                        .certifications
                        .insert(format!("{}:{}", rating.iso_3166_1, rating.rating.trim()));
                }
            }
        }

        let raw_date = details.release_date.or(details.first_air_date);
        match local_date {
            Some(date) => {
                partial.record.release_date = Some(date);
                partial.release_date_is_local = true;
            }
            None => {
                if let Some(raw) = raw_date.as_deref().filter(|d| !d.is_empty()) {
                    partial.record.release_date = lenient_date(&mut partial, "release_date", raw);
                }
            }
        }
        partial.record.year = partial
            .record
            .release_date
            .and_then(|d| u16::try_from(d.year()).ok())
            .or_else(|| parse_year(raw_date.as_deref()));

        debug!(
            tmdb_id = details.id,
            title = ?partial.record.title,
            "Parsed REST details"
        );
        Ok(partial)
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Turn a `/search/movie` or `/search/tv` response into scored candidates.
pub fn parse_search(
    document: &Document,
    provider_id: &str,
    media_type: MediaType,
    query: &str,
) -> Result<Vec<SearchCandidate>> {
    let response: SearchResponse = decode(SEARCH_SOURCE, document.as_json(SEARCH_SOURCE)?)?;
    let path = match media_type {
        MediaType::Movie => "movie",
        MediaType::TvShow | MediaType::TvEpisode => "tv",
    };

    let candidates = response
        .results
        .into_iter()
        .filter_map(|r| {
            let title = r.title.or(r.name).and_then(non_blank)?;
            let year = parse_year(r.release_date.as_deref().or(r.first_air_date.as_deref()));
            Some(SearchCandidate {
                provider_id: provider_id.to_string(),
                external_id: r.id.to_string(),
                match_score: scoring::similarity(query, &title),
                title,
                year,
                url: Some(format!("{TMDB_SITE}/{path}/{}", r.id)),
                imdb_id: None,
            })
        })
        .collect();
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use serde_json::json;

    fn inception() -> Value {
        json!({
            "id": 27205,
            "title": "Inception",
            "original_title": "Inception",
            "tagline": "Your mind is the scene of the crime.",
            "overview": "Cobb, a skilled thief...",
            "release_date": "2010-07-15",
            "runtime": 148,
            "vote_average": 8.4,
            "vote_count": 35000,
            "poster_path": "/poster.jpg",
            "backdrop_path": null,
            "imdb_id": "tt1375666",
            "belongs_to_collection": null,
            "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}],
            "credits": {
                "cast": [{"id": 6193, "name": "Leonardo DiCaprio", "character": "Dom Cobb"}],
                "crew": [
                    {"id": 525, "name": "Christopher Nolan", "job": "Director", "department": "Directing"},
                    {"id": 1, "name": "Someone", "job": "Gaffer", "department": "Lighting"}
                ]
            },
            "release_dates": {"results": [
                {"iso_3166_1": "DE", "release_dates": [
                    {"certification": "12", "release_date": "2010-07-29T00:00:00.000Z", "type": 3}
                ]},
                {"iso_3166_1": "US", "release_dates": [
                    {"certification": "PG-13", "release_date": "2010-07-16T00:00:00.000Z", "type": 3}
                ]}
            ]},
            "keywords": {"keywords": [
                {"name": "dream"}, {"name": "heist"}, {"name": "subconscious"}
            ]}
        })
    }

    fn parse(value: Value, ctx: &RequestContext) -> PartialMetadata {
        RestParser.parse(&Document::Json(value), ctx).unwrap()
    }

    #[test]
    fn movie_details() {
        let ctx = RequestContext {
            max_keyword_count: 2,
            ..Default::default()
        };
        let partial = parse(inception(), &ctx);
        let record = &partial.record;
        assert_eq!(record.title.as_deref(), Some("Inception"));
        assert_eq!(record.runtime_minutes, Some(148));
        assert_eq!(record.year, Some(2010));
        assert_eq!(record.release_date, NaiveDate::from_ymd_opt(2010, 7, 16));
        assert!(partial.release_date_is_local);
        assert!(record.certifications.contains("US:PG-13"));
        assert_eq!(record.certifications.len(), 1);
        assert_eq!(record.keywords, vec!["dream", "heist"]);
        assert_eq!(record.id("tmdb").as_deref(), Some("27205"));
        assert_eq!(record.imdb_id().as_deref(), Some("tt1375666"));
        assert_eq!(record.ratings["tmdb"].votes, 35000);
        assert_eq!(record.artwork.len(), 1);
        assert_eq!(record.artwork[0].url, format!("{TMDB_IMAGE_BASE}/poster.jpg"));
    }

    #[test]
    fn crew_outside_known_departments_is_other() {
        let partial = parse(inception(), &RequestContext::default());
        let cast = &partial.record.cast;
        assert_eq!(cast.len(), 3);
        assert_eq!(cast[0].role.as_deref(), Some("Dom Cobb"));
        assert_eq!(cast[1].department, CastType::Director);
        assert_eq!(cast[2].department, CastType::Other);
        assert_eq!(cast[2].role.as_deref(), Some("Gaffer"));
    }

    #[test]
    fn malformed_runtime_is_recorded_not_fatal() {
        let mut value = inception();
        value["runtime"] = json!("unknown");
        let partial = parse(value, &RequestContext::default());
        assert!(partial.record.runtime_minutes.is_none());
        assert!(partial.field_errors.iter().any(|e| e.field == "runtime"));
        assert_eq!(partial.record.title.as_deref(), Some("Inception"));

        let mut value = inception();
        value["runtime"] = json!("148 min");
        assert_eq!(parse(value, &RequestContext::default()).record.runtime_minutes, Some(148));

        let mut value = inception();
        value["runtime"] = json!(-5);
        let partial = parse(value, &RequestContext::default());
        assert!(partial.record.runtime_minutes.is_none());
        assert!(partial.field_errors.iter().any(|e| e.field == "runtime"));
    }

    #[test]
    fn falls_back_to_top_level_release_date() {
        let ctx = RequestContext {
            country: "FR".into(),
            ..Default::default()
        };
        let partial = parse(inception(), &ctx);
        assert_eq!(partial.record.release_date, NaiveDate::from_ymd_opt(2010, 7, 15));
        assert!(!partial.release_date_is_local);
        assert!(partial.record.certifications.is_empty());
    }

    #[test]
    fn tv_show_fields() {
        let value = json!({
            "id": 1399,
            "name": "Game of Thrones",
            "original_name": "Game of Thrones",
            "first_air_date": "2011-04-17",
            "episode_run_time": [60],
            "external_ids": {"imdb_id": "tt0944947"},
            "content_ratings": {"results": [{"iso_3166_1": "US", "rating": "TV-MA"}]},
            "keywords": {"results": [{"name": "dragon"}]}
        });
        let ctx = RequestContext {
            media_type: MediaType::TvShow,
            ..Default::default()
        };
        let partial = parse(value, &ctx);
        let record = &partial.record;
        assert_eq!(record.title.as_deref(), Some("Game of Thrones"));
        assert_eq!(record.runtime_minutes, Some(60));
        assert_eq!(record.year, Some(2011));
        assert_eq!(record.imdb_id().as_deref(), Some("tt0944947"));
        assert!(record.certifications.contains("US:TV-MA"));
        assert_eq!(record.keywords, vec!["dragon"]);
    }

    #[test]
    fn country_lists_without_results_are_empty() {
        let mut value = inception();
        value["release_dates"] = json!({});
        value["content_ratings"] = json!({});
        let partial = parse(value, &RequestContext::default());
        assert_eq!(partial.record.title.as_deref(), Some("Inception"));
        assert_eq!(partial.record.release_date, NaiveDate::from_ymd_opt(2010, 7, 15));
        assert!(partial.record.certifications.is_empty());
    }

    #[test]
    fn wrong_shape_is_a_parse_error() {
        let err = RestParser
            .parse(&Document::Json(json!("not an object")), &RequestContext::default())
            .unwrap_err();
        assert_matches!(err, ScrapeError::Parse { .. });
    }

    #[test]
    fn search_results() {
        let value = json!({"results": [
            {"id": 27205, "title": "Inception", "release_date": "2010-07-15"},
            {"id": 64956, "title": "Inception: The Cobol Job", "release_date": ""},
            {"id": 1, "title": ""}
        ]});
        let results =
            parse_search(&Document::Json(value), "tmdb", MediaType::Movie, "Inception").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].year, Some(2010));
        assert_eq!(results[1].year, None);
        assert_eq!(
            results[0].url.as_deref(),
            Some("https://www.themoviedb.org/movie/27205")
        );
        assert!(results[0].match_score > results[1].match_score);
    }
}
