//! Combine per-source partials into one record.
//!
//! Partials are visited in precedence order: sources named in the
//! precedence list first (in list order), every other source afterwards in
//! arrival order. A scalar is taken from the first partial where it is
//! present and non-blank. Collections are concatenated in visit order
//! without deduplication unless the policy asks for it, ids are unioned
//! with the later source winning a key collision. Keywords are the one
//! collection always deduplicated, since they are capped.
//!
//! The one exception is the release date: with
//! [`MergePolicy::local_release_date`] on, a later partial whose date is
//! flagged as local replaces an earlier non-local one.

use tracing::debug;

use super::model::{is_blank, MetadataRecord, PartialMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergePolicy {
    pub local_release_date: bool,
    pub max_keyword_count: usize,
    /// Drop case-insensitive duplicate genres, keeping the first spelling.
    pub dedup_genres: bool,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            local_release_date: true,
            max_keyword_count: 5,
            dedup_genres: false,
        }
    }
}

/// Order partials by precedence. Ties keep arrival order.
fn ordered<'a>(partials: &'a [PartialMetadata], precedence: &[String]) -> Vec<&'a PartialMetadata> {
    let rank = |p: &PartialMetadata| {
        precedence
            .iter()
            .position(|s| *s == p.source)
            .unwrap_or(precedence.len())
    };
    let mut out: Vec<&PartialMetadata> = partials.iter().collect();
    out.sort_by_key(|p| rank(*p));
    out
}

fn fill(target: &mut Option<String>, value: &Option<String>) {
    if is_blank(target) && !is_blank(value) {
        *target = value.as_ref().map(|s| s.trim().to_string());
    }
}

fn fill_copy<T: Copy>(target: &mut Option<T>, value: Option<T>) {
    if target.is_none() {
        *target = value;
    }
}

pub fn merge(
    partials: &[PartialMetadata],
    precedence: &[String],
    policy: &MergePolicy,
) -> MetadataRecord {
    let mut merged = MetadataRecord::default();
    let mut date_is_local = false;

    for (i, partial) in ordered(partials, precedence).into_iter().enumerate() {
        let record = &partial.record;
        if i == 0 {
            merged.media_type = record.media_type;
        }

        fill(&mut merged.title, &record.title);
        fill(&mut merged.original_title, &record.original_title);
        fill(&mut merged.tagline, &record.tagline);
        fill(&mut merged.plot, &record.plot);
        fill(&mut merged.collection_name, &record.collection_name);
        fill_copy(&mut merged.year, record.year);
        fill_copy(&mut merged.runtime_minutes, record.runtime_minutes);

        match (merged.release_date, record.release_date) {
            (None, Some(date)) => {
                merged.release_date = Some(date);
                date_is_local = partial.release_date_is_local;
            }
            (Some(_), Some(date))
                if policy.local_release_date && partial.release_date_is_local && !date_is_local =>
            {
                debug!(source = %partial.source, %date, "Using local release date");
                merged.release_date = Some(date);
                date_is_local = true;
            }
            _ => {}
        }

        merged
            .certifications
            .extend(record.certifications.iter().cloned());
        for (source, rating) in &record.ratings {
            merged.ratings.entry(source.clone()).or_insert(*rating);
        }
        for (provider, id) in &record.ids {
            merged.ids.insert(provider.clone(), id.clone());
        }

        merged.genres.extend(record.genres.iter().cloned());
        merged.cast.extend(record.cast.iter().cloned());
        merged.artwork.extend(record.artwork.iter().cloned());
        merged.keywords.extend(record.keywords.iter().cloned());
    }

    if policy.dedup_genres {
        dedup_in_order(&mut merged.genres);
    }
    dedup_in_order(&mut merged.keywords);
    merged.keywords.truncate(policy.max_keyword_count);

    if is_blank(&merged.original_title) {
        merged.original_title = merged.title.clone();
    }
    if merged.year.is_none() {
        merged.year = merged
            .release_date
            .and_then(|d| u16::try_from(chrono::Datelike::year(&d)).ok());
    }
    merged
}

/// Remove case-insensitive duplicates, keeping first-seen order.
fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.to_lowercase()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::model::{Artwork, Rating};
    use chrono::NaiveDate;
    use metaforge_common::{ArtworkType, MediaType};

    fn partial(source: &str) -> PartialMetadata {
        PartialMetadata::new(source, MediaType::Movie)
    }

    fn precedence(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn higher_precedence_scalar_wins() {
        let mut a = partial("imdb:reference");
        a.record.title = Some("Inception".into());
        a.record.runtime_minutes = Some(148);
        let mut b = partial("tmdb:details");
        b.record.title = Some("Inception (TMDB)".into());
        b.record.runtime_minutes = Some(150);
        b.record.tagline = Some("Your mind is the scene of the crime.".into());

        let merged = merge(
            &[b, a],
            &precedence(&["imdb:reference", "tmdb:details"]),
            &MergePolicy::default(),
        );
        assert_eq!(merged.title.as_deref(), Some("Inception"));
        assert_eq!(merged.runtime_minutes, Some(148));
        assert_eq!(
            merged.tagline.as_deref(),
            Some("Your mind is the scene of the crime.")
        );
    }

    #[test]
    fn blank_value_falls_through() {
        let mut a = partial("a");
        a.record.plot = Some("   ".into());
        let mut b = partial("b");
        b.record.plot = Some("A thief...".into());
        let merged = merge(&[a, b], &precedence(&["a", "b"]), &MergePolicy::default());
        assert_eq!(merged.plot.as_deref(), Some("A thief..."));
    }

    #[test]
    fn ids_union_last_wins() {
        let mut a = partial("a");
        a.record.set_id("imdb", "tt1375666");
        a.record.set_id("tmdb", 1_i64);
        let mut b = partial("b");
        b.record.set_id("tmdb", 27205_i64);
        let merged = merge(&[a, b], &precedence(&["a", "b"]), &MergePolicy::default());
        assert_eq!(merged.id("imdb").as_deref(), Some("tt1375666"));
        assert_eq!(merged.id("tmdb").as_deref(), Some("27205"));
    }

    #[test]
    fn unlisted_sources_come_after_listed_ones() {
        let mut x = partial("extra");
        x.record.title = Some("Extra".into());
        x.record.genres = vec!["Drama".into()];
        let mut a = partial("a");
        a.record.title = Some("Listed".into());
        a.record.genres = vec!["Action".into(), "drama".into()];
        let merged = merge(&[x, a], &precedence(&["a"]), &MergePolicy::default());
        assert_eq!(merged.title.as_deref(), Some("Listed"));
        assert_eq!(merged.genres, vec!["Action", "drama", "Drama"]);
    }

    #[test]
    fn genres_are_concatenated_as_is() {
        let mut a = partial("a");
        a.record.genres = vec!["Drama".into()];
        let mut b = partial("b");
        b.record.genres = vec!["drama".into(), "Drama".into()];
        let order = precedence(&["a", "b"]);

        let merged = merge(&[a.clone(), b.clone()], &order, &MergePolicy::default());
        assert_eq!(merged.genres, vec!["Drama", "drama", "Drama"]);

        let policy = MergePolicy {
            dedup_genres: true,
            ..Default::default()
        };
        let merged = merge(&[a, b], &order, &policy);
        assert_eq!(merged.genres, vec!["Drama"]);
    }

    #[test]
    fn local_release_date_overrides() {
        let mut a = partial("reference");
        a.record.release_date = NaiveDate::from_ymd_opt(2010, 7, 8);
        let mut b = partial("releaseinfo");
        b.record.release_date = NaiveDate::from_ymd_opt(2010, 7, 29);
        b.release_date_is_local = true;
        let order = precedence(&["reference", "releaseinfo"]);

        let merged = merge(&[a.clone(), b.clone()], &order, &MergePolicy::default());
        assert_eq!(merged.release_date, NaiveDate::from_ymd_opt(2010, 7, 29));
        assert_eq!(merged.year, Some(2010));

        let policy = MergePolicy {
            local_release_date: false,
            ..Default::default()
        };
        let merged = merge(&[a, b], &order, &policy);
        assert_eq!(merged.release_date, NaiveDate::from_ymd_opt(2010, 7, 8));
    }

    #[test]
    fn collections_and_ratings() {
        let mut a = partial("a");
        a.record.artwork.push(Artwork {
            kind: ArtworkType::Poster,
            url: "a.jpg".into(),
        });
        a.record.ratings.insert(
            "imdb".into(),
            Rating {
                value: 8.8,
                votes: 100,
                max_value: 10.0,
            },
        );
        a.record.keywords = vec!["dream".into(), "heist".into()];
        let mut b = partial("b");
        b.record.artwork.push(Artwork {
            kind: ArtworkType::Background,
            url: "b.jpg".into(),
        });
        b.record.ratings.insert(
            "imdb".into(),
            Rating {
                value: 1.0,
                votes: 1,
                max_value: 10.0,
            },
        );
        b.record.keywords = vec!["subconscious".into(), "Dream".into()];
        b.record.certifications.insert("US:PG-13".into());

        let policy = MergePolicy {
            max_keyword_count: 2,
            ..Default::default()
        };
        let merged = merge(&[a, b], &precedence(&["a", "b"]), &policy);
        assert_eq!(merged.artwork.len(), 2);
        assert_eq!(merged.artwork[0].url, "a.jpg");
        assert_eq!(merged.ratings["imdb"].votes, 100);
        assert_eq!(merged.keywords, vec!["dream", "heist"]);
        assert!(merged.certifications.contains("US:PG-13"));
    }

    #[test]
    fn blank_original_title_defaults_to_title() {
        let mut a = partial("a");
        a.record.title = Some("Inception".into());
        a.record.original_title = Some("".into());
        let merged = merge(&[a], &[], &MergePolicy::default());
        assert_eq!(merged.original_title.as_deref(), Some("Inception"));
    }

    #[test]
    fn empty_input_is_empty_record() {
        let merged = merge(&[], &[], &MergePolicy::default());
        assert_eq!(merged, MetadataRecord::default());
    }
}
