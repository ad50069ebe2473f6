//! Metaforge-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across metaforge:
//!
//! - **Core Types**: Enums for media types, cast roles and artwork kinds
//! - **Error Handling**: The scrape error taxonomy and result alias
//! - **Dynamic Enumerations**: An open-ended, process-wide value registry
//! - **Classification**: Boundary-anchored pattern matching of free text
//! - **Media Sources**: The BLURAY/DVD/WEBRIP/... registry built on the above
//!
//! # Examples
//!
//! ```
//! use metaforge_common::media_source::{self, MediaSource};
//!
//! assert_eq!(media_source::classify("Movie.2010.1080p.BluRay.x264"), MediaSource::bluray());
//! assert_eq!(media_source::classify("Movie.2010.strm"), MediaSource::stream());
//! ```

pub mod classifier;
pub mod dyna_enum;
pub mod error;
pub mod media_source;
pub mod paths;
pub mod text;
pub mod types;

pub use dyna_enum::{DynaEnum, DynaEnumEvent, DynaEnumValue, ListenerId, ValueOrigin};
pub use error::{Result, ScrapeError};
pub use media_source::MediaSource;
pub use types::*;
