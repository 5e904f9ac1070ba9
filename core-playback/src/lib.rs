//! # Playback Module
//!
//! Queue management and transport control on top of the host audio element.
//!
//! ## Overview
//!
//! This module handles:
//! - The play queue in natural and shuffled order ([`PlayQueue`])
//! - Selection, play/pause, next/previous, repeat-one and seek
//!   ([`PlaybackController`])
//! - The lo-fi effect toggle and proxied downloads
//! - Render snapshots with `m:ss` time formatting ([`PlaybackState`])

pub mod controller;
pub mod error;
pub mod queue;
pub mod state;

pub use controller::{Direction, DownloadRequest, PlayOutcome, PlaybackController, SeekTarget};
pub use error::{PlaybackError, Result};
pub use queue::PlayQueue;
pub use state::{format_time, PlaybackState, PlaybackStatus};
