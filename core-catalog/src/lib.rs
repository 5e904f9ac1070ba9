//! # Catalog Module
//!
//! Searches the remote song API and accumulates a deduplicated, paged list of
//! playable tracks.
//!
//! ## Overview
//!
//! This module provides:
//! - Lenient wire types for the search API (`types`)
//! - The [`Track`] model with entity decoding and stream selection
//! - [`SearchApi`] and its HTTP implementation [`SaavnClient`]
//! - [`CatalogLoader`], which owns the list, the paging cursor and the
//!   one-load-at-a-time rule

pub mod client;
pub mod error;
pub mod loader;
pub mod models;
pub mod types;

pub use client::{SaavnClient, SearchApi, SearchPage};
pub use error::{CatalogError, Result};
pub use loader::{CatalogLoader, LoadCursor, LoadOutcome};
pub use models::{decode_entities, StreamUrl, Track};
