//! The unified metadata model shared by parsers, the merge step and callers.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use metaforge_common::{ArtworkType, CastType, MediaType};
use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// An opaque external identifier. Some services use numeric ids, others
/// strings such as `tt1375666`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExternalId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ExternalId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ExternalId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for ExternalId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<u64> for ExternalId {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or_else(|_| Self::Text(n.to_string()), Self::Number)
    }
}

/// Provider name (e.g. `"imdb"`, `"tmdb"`) to external id.
pub type ProviderIds = BTreeMap<String, ExternalId>;

/// Check whether a string looks like an IMDb title id (`tt` followed by digits).
pub fn is_valid_imdb_id(id: &str) -> bool {
    id.len() > 2 && id.starts_with("tt") && id[2..].bytes().all(|b| b.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Record parts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    /// Character name for actors, job description for crew.
    pub role: Option<String>,
    pub department: CastType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ids: ProviderIds,
}

impl CastMember {
    pub fn new(name: impl Into<String>, department: CastType) -> Self {
        Self {
            name: name.into(),
            role: None,
            department,
            ids: ProviderIds::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        let role = role.into();
        if !role.trim().is_empty() {
            self.role = Some(role.trim().to_string());
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub value: f32,
    pub votes: u32,
    pub max_value: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artwork {
    pub kind: ArtworkType,
    pub url: String,
}

// ---------------------------------------------------------------------------
// MetadataRecord
// ---------------------------------------------------------------------------

/// A movie or TV show record, either one source's contribution or the merged
/// result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub media_type: MediaType,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub tagline: Option<String>,
    pub plot: Option<String>,
    pub year: Option<u16>,
    pub release_date: Option<NaiveDate>,
    pub runtime_minutes: Option<u32>,
    pub collection_name: Option<String>,
    pub certifications: BTreeSet<String>,
    pub genres: Vec<String>,
    pub cast: Vec<CastMember>,
    pub ratings: BTreeMap<String, Rating>,
    pub artwork: Vec<Artwork>,
    pub keywords: Vec<String>,
    pub ids: ProviderIds,
}

impl MetadataRecord {
    pub fn new(media_type: MediaType) -> Self {
        Self {
            media_type,
            ..Default::default()
        }
    }

    pub fn set_id(&mut self, provider: impl Into<String>, id: impl Into<ExternalId>) {
        self.ids.insert(provider.into(), id.into());
    }

    pub fn id(&self, provider: &str) -> Option<String> {
        self.ids.get(provider).map(ToString::to_string)
    }

    pub fn imdb_id(&self) -> Option<String> {
        self.id("imdb").filter(|id| is_valid_imdb_id(id))
    }

    pub fn cast_of(&self, department: CastType) -> impl Iterator<Item = &CastMember> {
        self.cast.iter().filter(move |c| c.department == department)
    }
}

/// Trimmed, non-blank text or `None`.
pub fn non_blank(s: impl AsRef<str>) -> Option<String> {
    let s = s.as_ref().trim();
    (!s.is_empty()).then(|| s.to_string())
}

pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// PartialMetadata
// ---------------------------------------------------------------------------

/// A field whose raw value could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub raw: String,
    pub reason: String,
}

/// The fields one source contributed, before merging.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PartialMetadata {
    pub source: String,
    pub record: MetadataRecord,
    /// The release date is the one for the requested country.
    pub release_date_is_local: bool,
    pub field_errors: Vec<FieldError>,
}

impl PartialMetadata {
    pub fn new(source: impl Into<String>, media_type: MediaType) -> Self {
        Self {
            source: source.into(),
            record: MetadataRecord::new(media_type),
            ..Default::default()
        }
    }

    /// Record a field-level failure. The field stays unset.
    pub fn field_error(&mut self, field: &'static str, raw: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(source = %self.source, field, raw, reason = %reason, "Field could not be parsed");
        self.field_errors.push(FieldError {
            field,
            raw: raw.to_string(),
            reason,
        });
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// One search hit from one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    /// Provider that produced the hit (e.g. `"imdb"`).
    pub provider_id: String,
    /// The provider's id for the hit.
    pub external_id: String,
    pub title: String,
    pub year: Option<u16>,
    pub url: Option<String>,
    /// IMDb id when the hit carries one.
    pub imdb_id: Option<String>,
    /// Similarity to the query, 0.0 - 1.0.
    pub match_score: f64,
}
