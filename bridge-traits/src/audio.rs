//! Audio element bridge.
//!
//! The core drives a single host-owned audio primitive: one source at a time,
//! play/pause/seek, and an optional effect chain. Hosts forward the
//! primitive's native notifications as [`AudioEvent`]s; the core never polls.

use crate::{error::Result, platform::PlatformSendSync};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Notifications raised by the host audio primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// Playback position advanced.
    TimeUpdate { position: Duration },
    /// Source metadata is available, including its total duration.
    MetadataLoaded { duration: Duration },
    /// The source played to its natural end.
    Ended,
    /// The host failed to load or decode the source.
    Error { message: String },
}

/// Parameters of the lo-fi effect chain.
///
/// The chain slows playback, attenuates the dry signal and mixes in a
/// synthetic reverb whose impulse is white noise shaped by
/// `(1 - t / len) ^ decay_exponent`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoFiParams {
    pub playback_rate: f32,
    pub dry_gain: f32,
    pub reverb_seconds: f32,
    pub decay_exponent: f32,
}

impl Default for LoFiParams {
    fn default() -> Self {
        Self {
            playback_rate: 0.85,
            dry_gain: 0.6,
            reverb_seconds: 1.0,
            decay_exponent: 2.0,
        }
    }
}

impl LoFiParams {
    /// Number of impulse samples for one channel at `sample_rate`.
    pub fn impulse_len(&self, sample_rate: u32) -> usize {
        (sample_rate as f32 * self.reverb_seconds).max(0.0) as usize
    }

    /// Deterministic amplitude envelope of the reverb impulse.
    pub fn decay_envelope(&self, sample_rate: u32) -> Vec<f32> {
        let len = self.impulse_len(sample_rate);
        (0..len)
            .map(|i| (1.0 - i as f32 / len as f32).powf(self.decay_exponent))
            .collect()
    }

    /// One channel of the reverb impulse: uniform noise in `[-1, 1)` scaled by
    /// [`LoFiParams::decay_envelope`].
    pub fn impulse_response<R: Rng + ?Sized>(&self, sample_rate: u32, rng: &mut R) -> Vec<f32> {
        self.decay_envelope(sample_rate)
            .into_iter()
            .map(|gain| rng.gen_range(-1.0f32..1.0) * gain)
            .collect()
    }
}

/// Effect chain applied to the audio element.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum AudioEffect {
    /// Plain output at normal rate and unity gain.
    #[default]
    None,
    LoFi(LoFiParams),
}

impl AudioEffect {
    pub fn playback_rate(&self) -> f32 {
        match self {
            AudioEffect::None => 1.0,
            AudioEffect::LoFi(params) => params.playback_rate,
        }
    }

    pub fn is_lofi(&self) -> bool {
        matches!(self, AudioEffect::LoFi(_))
    }
}

/// Host audio primitive.
///
/// `play` resolves once the host has actually started output (or failed to);
/// everything else is expected to take effect immediately.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait AudioElement: PlatformSendSync {
    /// Stop whatever is loaded and point the element at a new stream URL.
    async fn load(&self, url: &str) -> Result<()>;

    /// Start or resume output.
    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Replace the effect chain. Takes effect on the current source and
    /// persists across [`AudioElement::load`].
    async fn set_effect(&self, effect: AudioEffect) -> Result<()>;

    fn current_time(&self) -> Duration;

    /// Total duration of the loaded source, once metadata has arrived.
    fn duration(&self) -> Option<Duration>;
}
