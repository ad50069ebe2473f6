//! Core type definitions for requests, credits and artwork.
//!
//! All enums are serialized in lowercase.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of media a request is about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// A feature film.
    #[default]
    Movie,
    /// A TV series as a whole.
    TvShow,
    /// A single episode of a series.
    TvEpisode,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::TvShow => write!(f, "tvshow"),
            Self::TvEpisode => write!(f, "tvepisode"),
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "movie" => Ok(Self::Movie),
            "tvshow" | "tv" | "series" => Ok(Self::TvShow),
            "tvepisode" | "episode" => Ok(Self::TvEpisode),
            _ => Err(format!("Invalid media type: {}", s)),
        }
    }
}

/// Role category of a credited person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CastType {
    Actor,
    Director,
    Writer,
    Producer,
    Other,
}

impl CastType {
    /// Map a crew department label (as used by REST APIs) to a cast type.
    ///
    /// Unknown departments (camera, sound, art, costume, ...) map to `Other`.
    pub fn from_department(department: &str) -> Self {
        match department.to_ascii_lowercase().as_str() {
            "acting" | "actors" | "cast" => Self::Actor,
            "directing" | "director" | "directors" => Self::Director,
            "writing" | "writer" | "writers" => Self::Writer,
            "production" | "producer" | "producers" => Self::Producer,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for CastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actor => write!(f, "actor"),
            Self::Director => write!(f, "director"),
            Self::Writer => write!(f, "writer"),
            Self::Producer => write!(f, "producer"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Kind of artwork reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtworkType {
    /// Poster / cover image.
    Poster,
    /// Background / fanart image.
    Background,
    /// Banner image.
    Banner,
    /// Logo image.
    Logo,
    /// Still thumbnail.
    Thumb,
}

impl fmt::Display for ArtworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Poster => write!(f, "poster"),
            Self::Background => write!(f, "background"),
            Self::Banner => write!(f, "banner"),
            Self::Logo => write!(f, "logo"),
            Self::Thumb => write!(f, "thumb"),
        }
    }
}
