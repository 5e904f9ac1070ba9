//! # Host Bridge Traits
//!
//! Capabilities the core needs from its host, expressed as traits.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - async HTTP used by the catalog search client
//! - [`AudioElement`](audio::AudioElement) - the single audio primitive the
//!   playback controller drives
//! - [`SettingsStore`](storage::SettingsStore) - key-value preferences (the theme flag)
//! - [`LoggerSink`](log::LoggerSink) - forwards structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Provides |
//! |----------|---------------------|----------|
//! | Desktop  | `bridge-desktop`    | `HttpClient`, `SettingsStore` |
//! | Web      | host application    | all four |
//!
//! `AudioElement` is always supplied by the host application, since only the
//! host knows how audio reaches the speakers.
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with an actionable message, and use
//! [`BridgeError::Network`] for transport failures so callers can classify them.
//!
//! ## Thread Safety
//!
//! Native implementations must be `Send + Sync`. On `wasm32` the bounds are
//! relaxed through [`platform::PlatformSendSync`].

pub mod audio;
pub mod error;
pub mod http;
pub mod log;
pub mod platform;
pub mod storage;

pub use error::BridgeError;

pub use audio::{AudioEffect, AudioElement, AudioEvent, LoFiParams};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use storage::SettingsStore;
