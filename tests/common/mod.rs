//! Shared test harness for integration tests.
//!
//! Provides [`Fixtures`], a wiremock server that answers like the reference
//! site and the TMDB API for a single movie (Inception, `tt1375666` /
//! `27205`), plus a [`Config`] pointing every provider at it.

#![allow(dead_code)]

use std::time::Duration;

use metaforge::config::{Config, ImdbConfig, TmdbConfig};
use metaforge::metadata::Engine;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const IMDB_ID: &str = "tt1375666";
pub const TMDB_ID: u64 = 27205;

pub const REFERENCE_PAGE: &str = r#"<html><head>
<link rel="canonical" href="https://www.imdb.com/title/tt1375666/reference">
</head><body>
<div id="tn15title"><h1>Inception <span>(<a href="/year/2010/">2010</a>)</span></h1></div>
<img id="primary-poster" src="https://img.example/inception.jpg">
<div class="starbar-meta"><b>8.8/10</b> <a href="ratings">2,345,678 votes</a></div>
<div class="info"><h5>Director:</h5><div class="info-content">
  <a href="/name/nm0634240/">Christopher Nolan</a></div></div>
<div class="info"><h5>Release Date:</h5><div class="info-content">16 July 2010 (USA)</div></div>
<div class="info"><h5>Genre:</h5><div class="info-content">
  <a href="/genre/Action">Action</a> | <a href="/genre/Sci-Fi">Sci-Fi</a></div></div>
<div class="info"><h5>Tagline:</h5><div class="info-content">Your mind is the scene of the crime</div></div>
<div class="info"><h5>Certification:</h5><div class="info-content">
  <a href="/search?certificates=US:PG-13">USA:PG-13</a></div></div>
<table class="cast">
<tr><td class="nm"><a href="/name/nm0000138/">Leonardo DiCaprio</a></td><td class="char">Cobb</td></tr>
</table>
</body></html>"#;

pub const PLOT_PAGE: &str = r#"<html><body>
<div id="tn15title"><h1><span class="main">Inception</span></h1></div>
<p class="plotSummary">A thief who steals corporate secrets through dream-sharing technology.</p>
</body></html>"#;

pub const RELEASE_INFO_PAGE: &str = r#"<html><body><table id="release_dates">
<tr><td><a href="/calendar/?region=JP">Japan</a></td><td class="release_date">8 July 2010</td></tr>
<tr><td><a href="/calendar/?region=us">USA</a></td><td class="release_date">16 July 2010</td></tr>
<tr><td><a href="/calendar/?region=de">Germany</a></td><td class="release_date">29 July 2010</td></tr>
</table></body></html>"#;

pub const FIND_PAGE: &str = r#"<html><body><table class="findList">
<tr class="findResult"><td class="result_text"><a href="/title/tt1375666/?ref_=fn_tt_1">Inception</a> (2010)</td></tr>
<tr class="findResult"><td class="result_text"><a href="/title/tt5295894/">Inception</a> (2014) (Short)</td></tr>
</table></body></html>"#;

pub fn tmdb_details() -> serde_json::Value {
    json!({
        "id": 27205,
        "title": "Inception",
        "original_title": "Inception",
        "overview": "Cobb, a skilled thief, steals secrets from deep within the subconscious.",
        "tagline": "Your mind is the scene of the crime.",
        "release_date": "2010-07-15",
        "runtime": 148,
        "vote_average": 8.4,
        "vote_count": 35000,
        "poster_path": "/poster.jpg",
        "backdrop_path": "/backdrop.jpg",
        "imdb_id": "tt1375666",
        "belongs_to_collection": null,
        "genres": [{"name": "Action"}, {"name": "Science Fiction"}],
        "credits": {
            "cast": [{"id": 6193, "name": "Leonardo DiCaprio", "character": "Dom Cobb"}],
            "crew": [{"id": 525, "name": "Christopher Nolan", "job": "Director", "department": "Directing"}]
        },
        "release_dates": {"results": [
            {"iso_3166_1": "US", "release_dates": [{"certification": "PG-13", "release_date": "2010-07-16T00:00:00.000Z"}]}
        ]},
        "keywords": {"keywords": [{"name": "dream"}, {"name": "heist"}]}
    })
}

pub fn tmdb_search() -> serde_json::Value {
    json!({
        "results": [
            {"id": 27205, "title": "Inception", "release_date": "2010-07-15"},
            {"id": 64956, "title": "Inception: The Cobol Job", "release_date": "2010-12-07"}
        ]
    })
}

/// Wiremock server standing in for every remote source.
pub struct Fixtures {
    pub server: MockServer,
}

impl Fixtures {
    /// Server with all pages answering immediately.
    pub async fn start() -> Self {
        let fixtures = Self::bare().await;
        fixtures.mount_reference(ResponseTemplate::new(200).set_body_string(REFERENCE_PAGE)).await;
        fixtures.mount_plot(ResponseTemplate::new(200).set_body_string(PLOT_PAGE)).await;
        fixtures.mount_release_info(ResponseTemplate::new(200).set_body_string(RELEASE_INFO_PAGE)).await;
        fixtures.mount_find().await;
        fixtures.mount_tmdb().await;
        fixtures
    }

    /// Server with nothing mounted; unmatched requests answer 404.
    pub async fn bare() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub async fn mount_reference(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/title/{IMDB_ID}/reference")))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_plot(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/title/{IMDB_ID}/plotsummary")))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_release_info(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(format!("/title/{IMDB_ID}/releaseinfo")))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_find(&self) {
        Mock::given(method("GET"))
            .and(path("/find"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FIND_PAGE))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_tmdb(&self) {
        Mock::given(method("GET"))
            .and(path(format!("/3/movie/{IMDB_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(tmdb_details()))
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/3/movie/{TMDB_ID}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(tmdb_details()))
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/3/search/movie"))
            .and(query_param("api_key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tmdb_search()))
            .mount(&self.server)
            .await;
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Config with IMDb and TMDB both pointed at the fixture server.
    pub fn config(&self) -> Config {
        let mut config = Config {
            imdb: ImdbConfig {
                enabled: true,
                site: self.uri(),
                reference_site: self.uri(),
            },
            tmdb: TmdbConfig {
                enabled: true,
                api_key: Some("test-key".to_string()),
                base_url: format!("{}/3", self.uri()),
            },
            ..Default::default()
        };
        config.aggregator.task_timeout_secs = 5;
        config.aggregator.requests_per_second = 100;
        config.aggregator.retry_backoff_ms = 10;
        config
    }

    pub fn engine(&self, config: &Config) -> Engine {
        Engine::from_config(config).expect("engine from fixture config")
    }
}

/// Response that arrives long after any test timeout.
pub fn stalled(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .set_delay(Duration::from_secs(30))
}
