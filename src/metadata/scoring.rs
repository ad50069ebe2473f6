//! Candidate scoring and ranking.
//!
//! Titles are compared after case folding, folding of common Latin accents
//! and collapsing punctuation to single spaces, so `"Amélie"` matches
//! `"amelie"` and `"Mission: Impossible"` matches `"Mission Impossible"`.

use std::cmp::Ordering;

use metaforge_common::text::fold_accent;

use super::model::SearchCandidate;

/// Lowercase, accent-fold, and reduce every run of non-alphanumerics to a
/// single space.
pub fn normalize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_space = false;
    for c in title.chars().flat_map(char::to_lowercase).map(fold_accent) {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

/// Similarity of two titles in `[0, 1]`; 1.0 for equal normalized titles.
pub fn similarity(query: &str, title: &str) -> f64 {
    let a = normalize_title(query);
    let b = normalize_title(title);
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

fn year_distance(candidate: &SearchCandidate, year: Option<u16>) -> u16 {
    match (candidate.year, year) {
        (Some(a), Some(b)) => a.abs_diff(b),
        (None, Some(_)) => u16::MAX,
        _ => 0,
    }
}

/// Total order used for ranking: score descending, then closer year, then
/// shorter title, then provider id and external id.
pub fn compare(a: &SearchCandidate, b: &SearchCandidate, year: Option<u16>) -> Ordering {
    b.match_score
        .total_cmp(&a.match_score)
        .then_with(|| year_distance(a, year).cmp(&year_distance(b, year)))
        .then_with(|| a.title.chars().count().cmp(&b.title.chars().count()))
        .then_with(|| a.provider_id.cmp(&b.provider_id))
        .then_with(|| a.external_id.cmp(&b.external_id))
}

/// Sort candidates best-first.
pub fn rank(candidates: &mut [SearchCandidate], year: Option<u16>) {
    candidates.sort_by(|a, b| compare(a, b, year));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(provider: &str, id: &str, title: &str, year: Option<u16>) -> SearchCandidate {
        SearchCandidate {
            provider_id: provider.into(),
            external_id: id.into(),
            title: title.into(),
            year,
            url: None,
            imdb_id: None,
            match_score: similarity("Inception", title),
        }
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Mission: Impossible -- Fallout! "), "mission impossible fallout");
        assert_eq!(normalize_title("Amélie"), "amelie");
        assert_eq!(normalize_title("WALL·E"), "wall e");
    }

    #[test]
    fn test_similarity_bounds() {
        assert!((similarity("Inception", "inception") - 1.0).abs() < f64::EPSILON);
        assert!((similarity("Amelie", "Amélie") - 1.0).abs() < f64::EPSILON);
        let partial = similarity("Inception", "Inception: The Cobol Job");
        assert!(partial > 0.0 && partial < 1.0);
        assert_eq!(similarity("", ""), 0.0);
    }

    #[test]
    fn test_rank_by_score() {
        let mut list = vec![
            candidate("imdb", "tt2", "Inception: The Cobol Job", Some(2010)),
            candidate("imdb", "tt1", "Inception", Some(2010)),
        ];
        rank(&mut list, None);
        assert_eq!(list[0].external_id, "tt1");
    }

    #[test]
    fn test_ties_break_on_year_then_ids() {
        let mut list = vec![
            candidate("tmdb", "3", "Inception", None),
            candidate("tmdb", "2", "Inception", Some(2014)),
            candidate("imdb", "1", "Inception", Some(2010)),
            candidate("imdb", "0", "Inception", Some(2010)),
        ];
        rank(&mut list, Some(2010));
        let ids: Vec<&str> = list.iter().map(|c| c.external_id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1", "2", "3"]);
    }

    #[test]
    fn test_rank_is_stable_across_input_order() {
        let a = candidate("imdb", "tt1", "Inception", Some(2010));
        let b = candidate("tmdb", "27205", "Inception", Some(2010));
        let mut forward = vec![a.clone(), b.clone()];
        let mut backward = vec![b, a];
        rank(&mut forward, Some(2010));
        rank(&mut backward, Some(2010));
        assert_eq!(forward, backward);
    }
}
