//! Metadata resolution: fetch documents from several sources, parse each
//! into a partial record and merge them under a precedence policy.
//!
//! # Module layout
//!
//! - [`model`] -- The unified record, partials and search candidates.
//! - [`fetcher`] -- One network retrieval per call.
//! - [`xml`] -- Small owned XML tree used by the addon parsers.
//! - [`parsers`] -- One parser per page or response shape.
//! - [`aggregator`] -- Concurrent fan-out and fan-in of source tasks.
//! - [`merge`] -- Precedence-ordered combination of partials.
//! - [`scoring`] -- Candidate similarity and ranking.
//! - [`provider`] -- Trait definition and request types.
//! - [`providers`] -- Concrete providers (IMDb, TMDB, XML addons).
//! - [`registry`] -- Provider registry for multi-source lookups.
//! - [`engine`] -- The façade tying it all together.

pub mod aggregator;
pub mod engine;
pub mod fetcher;
pub mod merge;
pub mod model;
pub mod parsers;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod scoring;
pub mod xml;

pub use aggregator::{Aggregator, AggregatorOptions, ResolutionPlan, SourceTask, TaskRole};
pub use engine::Engine;
pub use model::{MetadataRecord, PartialMetadata, SearchCandidate};
pub use provider::{Capability, MetadataProvider, ResolveRequest, SearchQuery};
pub use registry::ProviderRegistry;
