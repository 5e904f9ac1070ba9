//! Playback state snapshot for rendering

use core_catalog::Track;
use serde::Serialize;
use std::time::Duration;

/// Transport status.
///
/// `Empty` until a list is handed over, `Idle` while tracks exist but none is
/// selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PlaybackStatus {
    #[default]
    Empty,
    Idle,
    Loading,
    Playing,
    Paused,
}

impl PlaybackStatus {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackStatus::Playing)
    }
}

/// Everything a mini-player needs to draw itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    /// Position of the selected track in the current play order.
    pub current_index: Option<usize>,
    pub track: Option<Track>,
    pub queue_len: usize,
    pub elapsed: Duration,
    /// Known once the source reported its metadata.
    pub duration: Option<Duration>,
    pub shuffle: bool,
    pub repeat_one: bool,
    pub lofi: bool,
}

impl PlaybackState {
    /// Elapsed share of the track in `[0, 1]`; 0 while the duration is unknown.
    pub fn progress(&self) -> f64 {
        match self.duration {
            Some(total) if !total.is_zero() => {
                (self.elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    pub fn elapsed_text(&self) -> String {
        format_time(self.elapsed)
    }

    pub fn duration_text(&self) -> String {
        self.duration.map(format_time).unwrap_or_else(|| format_time(Duration::ZERO))
    }
}

/// `m:ss`, minutes unpadded and uncapped.
pub fn format_time(time: Duration) -> String {
    let secs = time.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
