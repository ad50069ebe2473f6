//! Metaforge - concurrent multi-source movie and TV metadata resolution
//!
//! This library crate exposes the engine, providers and configuration so the
//! binary and the integration tests share one code path.

pub mod config;
pub mod metadata;
