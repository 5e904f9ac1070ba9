//! # Playback Error Types
//!
//! Errors raised by the queue controller. Failures of the audio element itself
//! arrive as [`PlaybackError::Bridge`].

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Queue Errors
    // ========================================================================
    /// Index outside `0..len`.
    #[error("Invalid queue index {index} (queue has {len} tracks)")]
    InvalidIndex { index: usize, len: usize },

    /// The queue is empty.
    #[error("No tracks in queue")]
    NoTracks,

    /// The operation needs a selected track.
    #[error("No track selected")]
    NoTrackSelected,

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// Seeking before the source reported its duration.
    #[error("Duration unknown; wait for metadata before seeking")]
    DurationUnknown,

    /// Playback operation failed.
    #[error("Playback operation failed: {0}")]
    PlaybackFailed(String),

    #[error("Audio effects are disabled")]
    EffectsDisabled,

    #[error("Downloads are disabled")]
    DownloadsDisabled,

    // ========================================================================
    // Platform Errors
    // ========================================================================
    /// The host audio element rejected an operation.
    #[error("Audio element error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::PlaybackFailed(_) => true,
            PlaybackError::Bridge(error) => {
                matches!(error, BridgeError::Network(_) | BridgeError::Audio(_))
            }
            _ => false,
        }
    }

    /// Message suitable for a toast in the host UI.
    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::InvalidIndex { .. } => "That track is no longer in the list".to_string(),
            PlaybackError::NoTracks => "No songs loaded".to_string(),
            PlaybackError::NoTrackSelected => "No song selected".to_string(),
            PlaybackError::DurationUnknown => "Track is still loading".to_string(),
            PlaybackError::EffectsDisabled => "Lo-fi mode is not available".to_string(),
            PlaybackError::DownloadsDisabled => "Downloads are not available".to_string(),
            PlaybackError::PlaybackFailed(_) | PlaybackError::Bridge(_) => {
                "Playback failed".to_string()
            }
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
