//! # Core Runtime Module
//!
//! Foundational infrastructure shared by the catalog, playback and service
//! crates:
//! - Logging and tracing setup ([`logging`])
//! - Configuration builder with validation ([`config`])
//! - Typed event bus for UI notifications ([`events`])

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
