//! # Playback Queue Controller
//!
//! Owns the play queue, the selection pointer and the transport flags, and
//! drives the host [`AudioElement`].
//!
//! ## State machine
//!
//! ```text
//! Empty ──set_queue──> Idle ──select──> Loading ──confirmed──> Playing <──> Paused
//!                                          │                      │
//!                                          └──failed──> Paused    └─ended─> Loading (next)
//! ```
//!
//! ## Concurrency
//!
//! State sits behind a `parking_lot::Mutex` that is never held across an
//! await. Every `select_and_play` takes a new generation number. Calls that
//! change what the element plays run under an async transport lock, and a
//! selection re-checks its generation after each element call, stopping
//! before the next one once a later selection (or pause) has taken over.
//! Element notifications are applied only once the selected source has
//! loaded.
//!
//! Errors are reported twice: returned to the caller and emitted as
//! [`PlaybackEvent::Error`] so toast-only hosts can ignore return values.

use bridge_traits::audio::{AudioEffect, AudioElement, AudioEvent, LoFiParams};
use core_catalog::Track;
use core_runtime::config::{CoreConfig, FeatureFlags, StreamQuality, DEFAULT_DOWNLOAD_PROXY};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as TransportLock;
use tracing::{debug, info, instrument, warn};

use crate::error::{PlaybackError, Result};
use crate::queue::PlayQueue;
use crate::state::{PlaybackState, PlaybackStatus};

/// Step direction through the play order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Seek destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// Share of the total duration, clamped to `[0, 1]`.
    Fraction(f64),
    /// Absolute position, clamped to the duration.
    Position(Duration),
}

/// How a play request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    Playing,
    /// A later request took over before this one resolved.
    Superseded,
    /// The audio element refused; the track stays selected and paused.
    Failed(String),
}

/// A download handed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest {
    pub track_id: String,
    /// Proxy URL wrapping the stream URL.
    pub url: String,
    pub file_name: String,
}

#[derive(Default)]
struct ControllerState {
    queue: PlayQueue,
    current: Option<usize>,
    track: Option<Track>,
    status: PlaybackStatus,
    repeat_one: bool,
    lofi: bool,
    elapsed: Duration,
    duration: Option<Duration>,
    generation: u64,
    /// Generation whose source finished loading into the element.
    loaded_generation: u64,
}

impl ControllerState {
    fn snapshot(&self) -> PlaybackState {
        PlaybackState {
            status: self.status,
            current_index: self.current,
            track: self.track.clone(),
            queue_len: self.queue.len(),
            elapsed: self.elapsed,
            duration: self.duration,
            shuffle: self.queue.is_shuffled(),
            repeat_one: self.repeat_one,
            lofi: self.lofi,
        }
    }

    fn track_id(&self) -> Option<String> {
        self.track.as_ref().map(|t| t.id.clone())
    }

    /// Whether element notifications describe the selected track.
    fn source_is_current(&self) -> bool {
        self.track.is_some() && self.loaded_generation == self.generation
    }

    fn settle_idle_status(&mut self) {
        if matches!(self.status, PlaybackStatus::Empty | PlaybackStatus::Idle) {
            self.status = if self.queue.is_empty() {
                PlaybackStatus::Empty
            } else {
                PlaybackStatus::Idle
            };
        }
    }
}

pub struct PlaybackController {
    audio: Arc<dyn AudioElement>,
    event_bus: EventBus,
    stream_quality: StreamQuality,
    download_proxy: String,
    features: FeatureFlags,
    lofi_params: LoFiParams,
    state: Mutex<ControllerState>,
    transport: TransportLock<()>,
}

impl PlaybackController {
    pub fn new(audio: Arc<dyn AudioElement>, event_bus: EventBus) -> Self {
        Self {
            audio,
            event_bus,
            stream_quality: StreamQuality::default(),
            download_proxy: DEFAULT_DOWNLOAD_PROXY.to_string(),
            features: FeatureFlags::default(),
            lofi_params: LoFiParams::default(),
            state: Mutex::new(ControllerState::default()),
            transport: TransportLock::new(()),
        }
    }

    pub fn from_config(config: &CoreConfig, audio: Arc<dyn AudioElement>, event_bus: EventBus) -> Self {
        Self::new(audio, event_bus)
            .with_stream_quality(config.stream_quality)
            .with_download_proxy(config.download_proxy_url.clone())
            .with_features(config.features)
    }

    pub fn with_stream_quality(mut self, quality: StreamQuality) -> Self {
        self.stream_quality = quality;
        self
    }

    pub fn with_download_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.download_proxy = proxy.into();
        self
    }

    pub fn with_features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    pub fn with_lofi_params(mut self, params: LoFiParams) -> Self {
        self.lofi_params = params;
        self
    }

    // ------------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------------

    /// Replace the queue. A track that is playing keeps playing and is
    /// relocated by id; it loses its index if the new list lacks it.
    pub fn set_queue(&self, tracks: Vec<Track>) {
        let (length, current_index) = {
            let mut state = self.state.lock();
            let playing = state.track_id();
            let current = state
                .queue
                .replace(tracks, playing.as_deref(), &mut rand::thread_rng());
            state.current = current;
            state.settle_idle_status();
            (state.queue.len(), current)
        };
        debug!(length, ?current_index, "Queue replaced");
        self.emit(PlaybackEvent::QueueChanged {
            length,
            current_index,
        });
    }

    /// Append tracks to the end of the queue (and of the shuffled order).
    pub fn append_to_queue(&self, tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }
        let (length, current_index) = {
            let mut state = self.state.lock();
            state.queue.append(tracks);
            state.settle_idle_status();
            (state.queue.len(), state.current)
        };
        self.emit(PlaybackEvent::QueueChanged {
            length,
            current_index,
        });
    }

    /// Tracks in play order.
    pub fn queue(&self) -> Vec<Track> {
        self.state.lock().queue.iter().cloned().collect()
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    /// Load and start the track at `index` in play order.
    ///
    /// Audio failures do not surface as `Err`: the track stays selected, the
    /// controller moves to `Paused` and the outcome is
    /// [`PlayOutcome::Failed`].
    #[instrument(skip(self))]
    pub async fn select_and_play(&self, index: usize) -> Result<PlayOutcome> {
        let selected = {
            let mut state = self.state.lock();
            let len = state.queue.len();
            match state.queue.get(index).cloned() {
                Some(track) => {
                    state.generation += 1;
                    state.current = Some(index);
                    state.track = Some(track.clone());
                    state.status = PlaybackStatus::Loading;
                    state.elapsed = Duration::ZERO;
                    state.duration = None;
                    Ok((state.generation, track))
                }
                None => Err(PlaybackError::InvalidIndex { index, len }),
            }
        };
        let (generation, track) = selected.map_err(|error| self.fail(None, error))?;

        self.emit(PlaybackEvent::Loading {
            track_id: track.id.clone(),
            index,
        });

        let result = match track.stream_url(self.stream_quality) {
            Some(url) => self.start_source(generation, url).await,
            None => Err(PlaybackError::PlaybackFailed(format!(
                "track {} has no stream",
                track.id
            ))),
        };

        {
            let mut state = self.state.lock();
            if state.generation != generation {
                debug!(track_id = %track.id, "Discarding superseded play result");
                return Ok(PlayOutcome::Superseded);
            }
            state.status = if matches!(result, Ok(true)) {
                PlaybackStatus::Playing
            } else {
                PlaybackStatus::Paused
            };
        }

        match result {
            Ok(_) => {
                info!(track_id = %track.id, title = %track.name, "Playback started");
                self.emit(PlaybackEvent::Started {
                    track_id: track.id.clone(),
                    title: track.name.clone(),
                    artist: track.primary_artists.clone(),
                });
                Ok(PlayOutcome::Playing)
            }
            Err(error) => {
                warn!(track_id = %track.id, %error, "Playback failed");
                self.emit(PlaybackEvent::Error {
                    track_id: Some(track.id.clone()),
                    message: format!("Unable to play {}", track.name),
                    recoverable: error.is_transient(),
                });
                Ok(PlayOutcome::Failed(error.to_string()))
            }
        }
    }

    /// Start the first track when nothing is selected, otherwise flip
    /// between playing and paused. Returns the resulting status.
    pub async fn toggle_play_pause(&self) -> Result<PlaybackStatus> {
        let (status, selected, empty) = {
            let state = self.state.lock();
            (state.status, state.track.is_some(), state.queue.is_empty())
        };

        if !selected {
            if empty {
                return Err(self.fail(None, PlaybackError::NoTracks));
            }
            self.select_and_play(0).await?;
        } else if matches!(status, PlaybackStatus::Playing | PlaybackStatus::Loading) {
            self.pause().await?;
        } else {
            self.resume().await?;
        }

        Ok(self.status())
    }

    /// Pause output. Cancels a selection that is still loading; the element
    /// is paused once that selection has stopped driving it.
    pub async fn pause(&self) -> Result<()> {
        let track_id = {
            let mut state = self.state.lock();
            if state.status == PlaybackStatus::Loading {
                state.generation += 1;
                state.status = PlaybackStatus::Paused;
            }
            state.track_id()
        };
        let track_id = track_id.ok_or_else(|| self.fail(None, PlaybackError::NoTrackSelected))?;

        {
            let _transport = self.transport.lock().await;
            self.audio
                .pause()
                .await
                .map_err(|e| self.fail(Some(track_id.clone()), e.into()))?;
        }

        let position = {
            let mut state = self.state.lock();
            state.status = PlaybackStatus::Paused;
            state.elapsed
        };
        self.emit(PlaybackEvent::Paused {
            track_id,
            position_ms: position.as_millis() as u64,
        });
        Ok(())
    }

    /// Resume the selected track. A selection whose load was cancelled by
    /// [`pause`](Self::pause) is loaded again.
    pub async fn resume(&self) -> Result<()> {
        let (track_id, reload) = {
            let state = self.state.lock();
            let cancelled = state.status == PlaybackStatus::Paused
                && state.loaded_generation != state.generation;
            (state.track_id(), state.current.filter(|_| cancelled))
        };
        let track_id = track_id.ok_or_else(|| self.fail(None, PlaybackError::NoTrackSelected))?;

        if let Some(index) = reload {
            debug!(track_id = %track_id, index, "Reloading cancelled selection");
            return self.select_and_play(index).await.map(|_| ());
        }

        let played = {
            let _transport = self.transport.lock().await;
            self.audio.play().await
        };
        if let Err(error) = played {
            self.state.lock().status = PlaybackStatus::Paused;
            return Err(self.fail(Some(track_id), error.into()));
        }

        let position = {
            let mut state = self.state.lock();
            state.status = PlaybackStatus::Playing;
            state.elapsed
        };
        self.emit(PlaybackEvent::Resumed {
            track_id,
            position_ms: position.as_millis() as u64,
        });
        Ok(())
    }

    /// Step through the play order, wrapping at both ends.
    ///
    /// With nothing selected `Next` starts at the first track and `Previous`
    /// at the last.
    pub async fn advance(&self, direction: Direction) -> Result<PlayOutcome> {
        let target = {
            let state = self.state.lock();
            let len = state.queue.len();
            if len == 0 {
                None
            } else {
                Some(match (state.current, direction) {
                    (Some(current), Direction::Next) => (current + 1) % len,
                    (Some(current), Direction::Previous) => (current + len - 1) % len,
                    (None, Direction::Next) => 0,
                    (None, Direction::Previous) => len - 1,
                })
            }
        };

        match target {
            Some(index) => self.select_and_play(index).await,
            None => Err(self.fail(None, PlaybackError::NoTracks)),
        }
    }

    /// Handle the natural end of the current source.
    pub async fn on_track_ended(&self) -> Result<PlayOutcome> {
        let (track_id, repeat_one) = {
            let state = self.state.lock();
            (state.track_id(), state.repeat_one)
        };
        let track_id = track_id.ok_or_else(|| self.fail(None, PlaybackError::NoTrackSelected))?;

        self.emit(PlaybackEvent::Completed {
            track_id: track_id.clone(),
        });

        if !repeat_one {
            return self.advance(Direction::Next).await;
        }

        let restarted = {
            let _transport = self.transport.lock().await;
            match self.audio.seek(Duration::ZERO).await {
                Ok(()) => self.audio.play().await,
                Err(error) => Err(error),
            }
        };

        match restarted {
            Ok(()) => {
                {
                    let mut state = self.state.lock();
                    state.elapsed = Duration::ZERO;
                    state.status = PlaybackStatus::Playing;
                }
                debug!(track_id = %track_id, "Repeating track");
                self.emit(PlaybackEvent::PositionChanged {
                    track_id,
                    position_ms: 0,
                    duration_ms: self.duration_ms(),
                });
                Ok(PlayOutcome::Playing)
            }
            Err(error) => {
                self.state.lock().status = PlaybackStatus::Paused;
                let error = self.fail(Some(track_id), error.into());
                Ok(PlayOutcome::Failed(error.to_string()))
            }
        }
    }

    /// Seek within the current track.
    ///
    /// Requires the duration reported by the source; before that the call
    /// fails with [`PlaybackError::DurationUnknown`] and nothing changes.
    pub async fn seek(&self, target: SeekTarget) -> Result<Duration> {
        let (track_id, duration) = {
            let state = self.state.lock();
            (state.track_id(), state.duration)
        };
        let track_id = track_id.ok_or_else(|| self.fail(None, PlaybackError::NoTrackSelected))?;
        let duration =
            duration.ok_or_else(|| self.fail(Some(track_id.clone()), PlaybackError::DurationUnknown))?;

        let position = match target {
            SeekTarget::Fraction(fraction) if fraction.is_finite() => {
                duration.mul_f64(fraction.clamp(0.0, 1.0))
            }
            SeekTarget::Fraction(_) => Duration::ZERO,
            SeekTarget::Position(position) => position.min(duration),
        };

        self.audio
            .seek(position)
            .await
            .map_err(|e| self.fail(Some(track_id.clone()), e.into()))?;

        self.state.lock().elapsed = position;
        self.emit(PlaybackEvent::PositionChanged {
            track_id,
            position_ms: position.as_millis() as u64,
            duration_ms: duration.as_millis() as u64,
        });
        Ok(position)
    }

    /// Feed a notification from the host audio element.
    ///
    /// Notifications are dropped while nothing is selected or while the
    /// selected source has not finished loading, since they then describe a
    /// source that is being replaced.
    pub async fn handle_audio_event(&self, event: AudioEvent) -> Result<()> {
        match event {
            AudioEvent::TimeUpdate { position } => {
                let track_id = {
                    let mut state = self.state.lock();
                    if state.source_is_current() {
                        state.elapsed = position;
                        state.track_id()
                    } else {
                        None
                    }
                };
                if let Some(track_id) = track_id {
                    self.emit(PlaybackEvent::PositionChanged {
                        track_id,
                        position_ms: position.as_millis() as u64,
                        duration_ms: self.duration_ms(),
                    });
                }
                Ok(())
            }
            AudioEvent::MetadataLoaded { duration } => {
                let (track_id, elapsed) = {
                    let mut state = self.state.lock();
                    if state.source_is_current() {
                        state.duration = Some(duration);
                        (state.track_id(), state.elapsed)
                    } else {
                        (None, state.elapsed)
                    }
                };
                if let Some(track_id) = track_id {
                    self.emit(PlaybackEvent::PositionChanged {
                        track_id,
                        position_ms: elapsed.as_millis() as u64,
                        duration_ms: duration.as_millis() as u64,
                    });
                }
                Ok(())
            }
            AudioEvent::Ended => {
                if !self.state.lock().source_is_current() {
                    debug!("Ignoring end of a replaced source");
                    return Ok(());
                }
                self.on_track_ended().await.map(|_| ())
            }
            AudioEvent::Error { message } => {
                let track_id = {
                    let mut state = self.state.lock();
                    if !state.source_is_current() {
                        debug!(%message, "Ignoring error from a replaced source");
                        return Ok(());
                    }
                    state.status = PlaybackStatus::Paused;
                    state.track_id()
                };
                self.fail(track_id, PlaybackError::PlaybackFailed(message));
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------------

    /// Switch between natural and shuffled order without touching playback.
    pub fn set_shuffle(&self, enabled: bool) {
        let changed = {
            let mut state = self.state.lock();
            if state.queue.is_shuffled() == enabled {
                None
            } else {
                let current = state.current;
                let relocated = if enabled {
                    state.queue.shuffle(current, &mut rand::thread_rng())
                } else {
                    state.queue.unshuffle(current)
                };
                state.current = relocated;
                Some((state.queue.len(), relocated))
            }
        };

        if let Some((length, current_index)) = changed {
            info!(enabled, ?current_index, "Shuffle changed");
            self.emit(PlaybackEvent::ShuffleChanged { enabled });
            self.emit(PlaybackEvent::QueueChanged {
                length,
                current_index,
            });
        }
    }

    pub fn toggle_shuffle(&self) -> bool {
        let enabled = !self.state.lock().queue.is_shuffled();
        self.set_shuffle(enabled);
        enabled
    }

    pub fn set_repeat_one(&self, enabled: bool) {
        let changed = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.repeat_one, enabled) != enabled
        };
        if changed {
            self.emit(PlaybackEvent::RepeatChanged { enabled });
        }
    }

    pub fn toggle_repeat(&self) -> bool {
        let enabled = !self.state.lock().repeat_one;
        self.set_repeat_one(enabled);
        enabled
    }

    /// Apply or remove the lo-fi effect chain. The flag outlives track
    /// changes.
    pub async fn set_lofi(&self, enabled: bool) -> Result<()> {
        if enabled && !self.features.enable_lofi {
            return Err(self.fail(None, PlaybackError::EffectsDisabled));
        }
        if self.state.lock().lofi == enabled {
            return Ok(());
        }

        let effect = if enabled {
            AudioEffect::LoFi(self.lofi_params)
        } else {
            AudioEffect::None
        };
        self.audio
            .set_effect(effect)
            .await
            .map_err(|e| self.fail(None, e.into()))?;

        self.state.lock().lofi = enabled;
        info!(enabled, rate = effect.playback_rate(), "Lo-fi mode changed");
        self.emit(PlaybackEvent::LoFiChanged { enabled });
        Ok(())
    }

    pub async fn toggle_lofi(&self) -> Result<bool> {
        let enabled = !self.state.lock().lofi;
        self.set_lofi(enabled).await?;
        Ok(enabled)
    }

    // ------------------------------------------------------------------------
    // Download
    // ------------------------------------------------------------------------

    /// Build the proxied download for the selected track.
    pub fn download_current(&self) -> Result<DownloadRequest> {
        if !self.features.enable_downloads {
            return Err(self.fail(None, PlaybackError::DownloadsDisabled));
        }

        let track = self
            .state
            .lock()
            .track
            .clone()
            .ok_or_else(|| self.fail(None, PlaybackError::NoTrackSelected))?;

        let stream = track.stream_url(self.stream_quality).ok_or_else(|| {
            self.fail(
                Some(track.id.clone()),
                PlaybackError::PlaybackFailed(format!("track {} has no stream", track.id)),
            )
        })?;

        let separator = if self.download_proxy.contains('?') { '&' } else { '?' };
        let request = DownloadRequest {
            track_id: track.id.clone(),
            url: format!(
                "{}{}url={}",
                self.download_proxy,
                separator,
                urlencoding::encode(stream)
            ),
            file_name: track.download_file_name(),
        };

        info!(track_id = %request.track_id, file_name = %request.file_name, "Download requested");
        self.emit(PlaybackEvent::DownloadRequested {
            track_id: request.track_id.clone(),
            url: request.url.clone(),
            file_name: request.file_name.clone(),
        });
        Ok(request)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn snapshot(&self) -> PlaybackState {
        self.state.lock().snapshot()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.state.lock().status
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.lock().current
    }

    /// Pause, load and start `url` for selection `generation`.
    ///
    /// Returns `false` without touching the element further as soon as the
    /// selection has been superseded.
    async fn start_source(&self, generation: u64, url: &str) -> Result<bool> {
        let _transport = self.transport.lock().await;
        if !self.is_current(generation) {
            return Ok(false);
        }
        self.audio.pause().await?;
        if !self.is_current(generation) {
            return Ok(false);
        }
        self.audio.load(url).await?;
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return Ok(false);
            }
            state.loaded_generation = generation;
        }
        self.audio.play().await?;
        Ok(true)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    fn duration_ms(&self) -> u64 {
        self.state
            .lock()
            .duration
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Log and emit `error`, then hand it back for returning.
    fn fail(&self, track_id: Option<String>, error: PlaybackError) -> PlaybackError {
        warn!(?track_id, %error, "Playback operation failed");
        self.emit(PlaybackEvent::Error {
            track_id,
            message: error.user_message(),
            recoverable: error.is_transient(),
        });
        error
    }

    fn emit(&self, event: PlaybackEvent) {
        self.event_bus.emit(CoreEvent::Playback(event)).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::BridgeError;
    use core_catalog::StreamUrl;
    use std::collections::{HashMap, HashSet};
    use tokio::sync::Notify;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Load(String),
        Play,
        Pause,
        Seek(Duration),
        Effect(AudioEffect),
    }

    #[derive(Default)]
    struct FakeAudio {
        calls: Mutex<Vec<Call>>,
        failing_urls: Mutex<HashSet<String>>,
        gates: Mutex<HashMap<String, Arc<Notify>>>,
        loaded: Mutex<Option<String>>,
    }

    impl FakeAudio {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        fn fail_on(&self, url: &str) {
            self.failing_urls.lock().insert(url.to_string());
        }

        fn loaded(&self) -> Option<String> {
            self.loaded.lock().clone()
        }

        /// Holds the next `load(url)` until the returned gate is notified.
        fn gate(&self, url: &str) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.gates.lock().insert(url.to_string(), gate.clone());
            gate
        }
    }

    #[async_trait]
    impl AudioElement for FakeAudio {
        async fn load(&self, url: &str) -> bridge_traits::error::Result<()> {
            self.calls.lock().push(Call::Load(url.to_string()));
            let gate = self.gates.lock().remove(url);
            if let Some(gate) = gate {
                gate.notified().await;
            }
            *self.loaded.lock() = Some(url.to_string());
            Ok(())
        }

        async fn play(&self) -> bridge_traits::error::Result<()> {
            self.calls.lock().push(Call::Play);
            let loaded = self.loaded.lock().clone();
            match loaded {
                Some(url) if self.failing_urls.lock().contains(&url) => {
                    Err(BridgeError::Audio(format!("cannot decode {}", url)))
                }
                _ => Ok(()),
            }
        }

        async fn pause(&self) -> bridge_traits::error::Result<()> {
            self.calls.lock().push(Call::Pause);
            Ok(())
        }

        async fn seek(&self, position: Duration) -> bridge_traits::error::Result<()> {
            self.calls.lock().push(Call::Seek(position));
            Ok(())
        }

        async fn set_effect(&self, effect: AudioEffect) -> bridge_traits::error::Result<()> {
            self.calls.lock().push(Call::Effect(effect));
            Ok(())
        }

        fn current_time(&self) -> Duration {
            Duration::ZERO
        }

        fn duration(&self) -> Option<Duration> {
            None
        }
    }

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Song {}", id.to_uppercase()),
            primary_artists: "Singer".to_string(),
            album: None,
            artwork_url: None,
            streams: vec![
                StreamUrl {
                    quality: Some("96kbps".to_string()),
                    url: format!("https://cdn.test/{}_96.mp4", id),
                },
                StreamUrl {
                    quality: Some("320kbps".to_string()),
                    url: format!("https://cdn.test/{}_320.mp4", id),
                },
            ],
            duration_secs: Some(200),
        }
    }

    fn url(id: &str) -> String {
        format!("https://cdn.test/{}_320.mp4", id)
    }

    fn controller(ids: &[&str]) -> (Arc<PlaybackController>, Arc<FakeAudio>, EventBus) {
        let audio = Arc::new(FakeAudio::default());
        let bus = EventBus::new(64);
        let controller = PlaybackController::new(audio.clone(), bus.clone());
        controller.set_queue(ids.iter().map(|id| track(id)).collect());
        (Arc::new(controller), audio, bus)
    }

    fn playback_events(receiver: &mut core_runtime::events::Receiver<CoreEvent>) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            if let CoreEvent::Playback(event) = event {
                events.push(event);
            }
        }
        events
    }

    #[tokio::test]
    async fn test_select_and_play_loads_highest_stream() {
        let (controller, audio, bus) = controller(&["a", "b"]);
        let mut events = bus.subscribe();

        let outcome = controller.select_and_play(1).await.unwrap();
        assert_eq!(outcome, PlayOutcome::Playing);
        assert_eq!(controller.status(), PlaybackStatus::Playing);
        assert_eq!(audio.calls(), [Call::Pause, Call::Load(url("b")), Call::Play]);

        let events = playback_events(&mut events);
        assert!(matches!(&events[0], PlaybackEvent::Loading { index: 1, .. }));
        assert!(matches!(&events[1], PlaybackEvent::Started { title, .. } if title == "Song B"));
    }

    #[tokio::test]
    async fn test_select_out_of_range() {
        let (controller, _audio, _bus) = controller(&["a"]);
        let err = controller.select_and_play(3).await.unwrap_err();
        assert!(matches!(err, PlaybackError::InvalidIndex { index: 3, len: 1 }));
        assert_eq!(controller.status(), PlaybackStatus::Idle);
    }

    #[tokio::test]
    async fn test_failed_play_leaves_track_paused() {
        let (controller, audio, bus) = controller(&["a", "b"]);
        audio.fail_on(&url("a"));
        let mut events = bus.subscribe();

        let outcome = controller.select_and_play(0).await.unwrap();
        assert!(matches!(outcome, PlayOutcome::Failed(_)));

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.status, PlaybackStatus::Paused);
        assert_eq!(snapshot.current_index, Some(0));
        assert_eq!(snapshot.track.unwrap().id, "a");

        let events = playback_events(&mut events);
        assert!(matches!(
            events.last(),
            Some(PlaybackEvent::Error { track_id: Some(id), recoverable: true, .. }) if id == "a"
        ));
    }

    #[tokio::test]
    async fn test_toggle_from_idle_plays_then_pauses() {
        let (controller, _audio, _bus) = controller(&["a", "b"]);
        assert_eq!(controller.status(), PlaybackStatus::Idle);

        assert_eq!(controller.toggle_play_pause().await.unwrap(), PlaybackStatus::Playing);
        assert_eq!(controller.current_index(), Some(0));
        assert_eq!(controller.toggle_play_pause().await.unwrap(), PlaybackStatus::Paused);
        assert_eq!(controller.toggle_play_pause().await.unwrap(), PlaybackStatus::Playing);
    }

    #[tokio::test]
    async fn test_toggle_on_empty_queue() {
        let (controller, _audio, _bus) = controller(&[]);
        assert_eq!(controller.status(), PlaybackStatus::Empty);
        assert!(matches!(
            controller.toggle_play_pause().await,
            Err(PlaybackError::NoTracks)
        ));
        assert!(matches!(
            controller.advance(Direction::Next).await,
            Err(PlaybackError::NoTracks)
        ));
    }

    #[tokio::test]
    async fn test_advance_wraps_both_ways() {
        let (controller, _audio, _bus) = controller(&["a", "b", "c"]);
        controller.select_and_play(0).await.unwrap();

        for _ in 0..3 {
            controller.advance(Direction::Next).await.unwrap();
        }
        assert_eq!(controller.current_index(), Some(0));

        controller.advance(Direction::Previous).await.unwrap();
        assert_eq!(controller.current_index(), Some(2));
    }

    #[tokio::test]
    async fn test_track_end_advances_or_repeats() {
        let (controller, audio, _bus) = controller(&["a", "b", "c"]);
        controller.select_and_play(0).await.unwrap();

        controller.handle_audio_event(AudioEvent::Ended).await.unwrap();
        assert_eq!(controller.current_index(), Some(1));
        assert_eq!(controller.status(), PlaybackStatus::Playing);

        assert!(controller.toggle_repeat());
        controller.handle_audio_event(AudioEvent::Ended).await.unwrap();
        assert_eq!(controller.current_index(), Some(1));
        assert_eq!(
            audio.calls()[audio.calls().len() - 2..],
            [Call::Seek(Duration::ZERO), Call::Play]
        );
    }

    async fn wait_for_call(audio: &FakeAudio, call: Call) {
        while !audio.calls().contains(&call) {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_stale_play_result_is_discarded() {
        let (controller, audio, _bus) = controller(&["a", "b"]);
        let gate = audio.gate(&url("a"));

        let slow = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.select_and_play(0).await })
        };
        wait_for_call(&audio, Call::Load(url("a"))).await;

        let fast = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.select_and_play(1).await })
        };
        while controller.snapshot().track.map(|t| t.id) != Some("b".to_string()) {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        assert_eq!(slow.await.unwrap().unwrap(), PlayOutcome::Superseded);
        assert_eq!(fast.await.unwrap().unwrap(), PlayOutcome::Playing);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.current_index, Some(1));
        assert_eq!(snapshot.track.unwrap().id, "b");
        assert_eq!(snapshot.status, PlaybackStatus::Playing);

        assert_eq!(audio.loaded(), Some(url("b")));
        assert_eq!(
            audio.calls(),
            [
                Call::Pause,
                Call::Load(url("a")),
                Call::Pause,
                Call::Load(url("b")),
                Call::Play,
            ]
        );
    }

    #[tokio::test]
    async fn test_pause_while_loading_keeps_element_paused() {
        let (controller, audio, _bus) = controller(&["a", "b"]);
        let gate = audio.gate(&url("a"));

        let loading = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.select_and_play(0).await })
        };
        wait_for_call(&audio, Call::Load(url("a"))).await;

        let pausing = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.pause().await })
        };
        while controller.status() != PlaybackStatus::Paused {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        assert_eq!(loading.await.unwrap().unwrap(), PlayOutcome::Superseded);
        pausing.await.unwrap().unwrap();

        assert_eq!(controller.status(), PlaybackStatus::Paused);
        assert_eq!(controller.snapshot().track.unwrap().id, "a");
        assert_eq!(audio.calls(), [Call::Pause, Call::Load(url("a")), Call::Pause]);

        controller.resume().await.unwrap();
        assert_eq!(controller.status(), PlaybackStatus::Playing);
        assert_eq!(audio.loaded(), Some(url("a")));
        assert_eq!(
            audio.calls()[3..],
            [Call::Pause, Call::Load(url("a")), Call::Play]
        );
    }

    #[tokio::test]
    async fn test_audio_events_without_selection_are_ignored() {
        let (controller, _audio, bus) = controller(&["a"]);
        let mut events = bus.subscribe();

        controller
            .handle_audio_event(AudioEvent::MetadataLoaded {
                duration: Duration::from_secs(200),
            })
            .await
            .unwrap();
        controller
            .handle_audio_event(AudioEvent::TimeUpdate {
                position: Duration::from_secs(12),
            })
            .await
            .unwrap();
        controller.handle_audio_event(AudioEvent::Ended).await.unwrap();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.duration, None);
        assert_eq!(snapshot.elapsed, Duration::ZERO);
        assert_eq!(snapshot.status, PlaybackStatus::Idle);
        assert!(playback_events(&mut events).is_empty());
    }

    #[tokio::test]
    async fn test_audio_events_from_replaced_source_are_ignored() {
        let (controller, audio, _bus) = controller(&["a", "b"]);
        controller.select_and_play(0).await.unwrap();
        let gate = audio.gate(&url("b"));

        let switching = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.select_and_play(1).await })
        };
        wait_for_call(&audio, Call::Load(url("b"))).await;

        controller
            .handle_audio_event(AudioEvent::TimeUpdate {
                position: Duration::from_secs(42),
            })
            .await
            .unwrap();
        controller
            .handle_audio_event(AudioEvent::MetadataLoaded {
                duration: Duration::from_secs(180),
            })
            .await
            .unwrap();
        controller.handle_audio_event(AudioEvent::Ended).await.unwrap();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.status, PlaybackStatus::Loading);
        assert_eq!(snapshot.current_index, Some(1));
        assert_eq!(snapshot.elapsed, Duration::ZERO);
        assert_eq!(snapshot.duration, None);

        gate.notify_one();
        assert_eq!(switching.await.unwrap().unwrap(), PlayOutcome::Playing);

        controller
            .handle_audio_event(AudioEvent::MetadataLoaded {
                duration: Duration::from_secs(240),
            })
            .await
            .unwrap();
        assert_eq!(controller.snapshot().duration, Some(Duration::from_secs(240)));
    }

    #[tokio::test]
    async fn test_seek_requires_duration() {
        let (controller, audio, bus) = controller(&["a"]);
        controller.select_and_play(0).await.unwrap();
        let mut events = bus.subscribe();

        let err = controller.seek(SeekTarget::Fraction(0.5)).await.unwrap_err();
        assert!(matches!(err, PlaybackError::DurationUnknown));
        assert_eq!(controller.snapshot().elapsed, Duration::ZERO);
        assert!(!audio.calls().iter().any(|c| matches!(c, Call::Seek(_))));
        assert!(matches!(
            playback_events(&mut events).last(),
            Some(PlaybackEvent::Error { .. })
        ));

        controller
            .handle_audio_event(AudioEvent::MetadataLoaded {
                duration: Duration::from_secs(200),
            })
            .await
            .unwrap();

        let pos = controller.seek(SeekTarget::Fraction(0.25)).await.unwrap();
        assert_eq!(pos, Duration::from_secs(50));
        let pos = controller
            .seek(SeekTarget::Position(Duration::from_secs(900)))
            .await
            .unwrap();
        assert_eq!(pos, Duration::from_secs(200));
        let pos = controller.seek(SeekTarget::Fraction(-3.0)).await.unwrap();
        assert_eq!(pos, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_time_updates_feed_snapshot() {
        let (controller, _audio, _bus) = controller(&["a"]);
        controller.select_and_play(0).await.unwrap();
        controller
            .handle_audio_event(AudioEvent::MetadataLoaded {
                duration: Duration::from_secs(200),
            })
            .await
            .unwrap();
        controller
            .handle_audio_event(AudioEvent::TimeUpdate {
                position: Duration::from_secs(65),
            })
            .await
            .unwrap();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.elapsed_text(), "1:05");
        assert_eq!(snapshot.duration_text(), "3:20");
        assert_eq!(snapshot.progress(), 0.325);
    }

    #[tokio::test]
    async fn test_shuffle_keeps_playing_track_first() {
        let (controller, audio, _bus) = controller(&["a", "b", "c", "d", "e"]);
        controller.select_and_play(2).await.unwrap();
        let calls_before = audio.calls().len();

        controller.set_shuffle(true);
        assert_eq!(controller.current_index(), Some(0));
        assert_eq!(controller.queue()[0].id, "c");
        assert_eq!(controller.status(), PlaybackStatus::Playing);

        controller.set_shuffle(false);
        assert_eq!(controller.current_index(), Some(2));
        let ids: Vec<String> = controller.queue().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, ["a", "b", "c", "d", "e"]);
        assert_eq!(audio.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_shuffle_off_loses_selection_when_track_left_queue() {
        let (controller, _audio, _bus) = controller(&["a", "b", "c"]);
        controller.select_and_play(1).await.unwrap();
        controller.set_shuffle(true);

        controller.set_queue(vec![track("x"), track("y")]);
        assert_eq!(controller.current_index(), None);

        controller.set_shuffle(false);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.current_index, None);
        assert_eq!(snapshot.track.unwrap().id, "b");
        assert_eq!(snapshot.status, PlaybackStatus::Playing);
    }

    #[tokio::test]
    async fn test_set_queue_relocates_playing_track() {
        let (controller, _audio, _bus) = controller(&["a", "b"]);
        controller.select_and_play(1).await.unwrap();

        controller.set_queue(vec![track("z"), track("y"), track("b")]);
        assert_eq!(controller.current_index(), Some(2));

        controller.append_to_queue(vec![track("q")]);
        assert_eq!(controller.snapshot().queue_len, 4);
        assert_eq!(controller.current_index(), Some(2));
    }

    #[tokio::test]
    async fn test_lofi_toggle_applies_effect() {
        let (controller, audio, bus) = controller(&["a", "b"]);
        let mut events = bus.subscribe();

        assert!(controller.toggle_lofi().await.unwrap());
        assert!(matches!(
            audio.calls().last(),
            Some(Call::Effect(AudioEffect::LoFi(params))) if params.playback_rate == 0.85
        ));

        controller.select_and_play(0).await.unwrap();
        controller.advance(Direction::Next).await.unwrap();
        assert!(controller.snapshot().lofi);

        assert!(!controller.toggle_lofi().await.unwrap());
        assert_eq!(audio.calls().last(), Some(&Call::Effect(AudioEffect::None)));

        let toggles: Vec<bool> = playback_events(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                PlaybackEvent::LoFiChanged { enabled } => Some(enabled),
                _ => None,
            })
            .collect();
        assert_eq!(toggles, [true, false]);
    }

    #[tokio::test]
    async fn test_lofi_respects_feature_flag() {
        let audio = Arc::new(FakeAudio::default());
        let controller = PlaybackController::new(audio.clone(), EventBus::new(8)).with_features(
            FeatureFlags {
                enable_lofi: false,
                enable_downloads: true,
            },
        );

        assert!(matches!(
            controller.set_lofi(true).await,
            Err(PlaybackError::EffectsDisabled)
        ));
        assert!(audio.calls().is_empty());
    }

    #[tokio::test]
    async fn test_download_current() {
        let (controller, _audio, bus) = controller(&["a"]);
        assert!(matches!(
            controller.download_current(),
            Err(PlaybackError::NoTrackSelected)
        ));

        controller.select_and_play(0).await.unwrap();
        let mut events = bus.subscribe();
        let request = controller.download_current().unwrap();

        assert_eq!(
            request.url,
            "https://downforce.rf.gd/?url=https%3A%2F%2Fcdn.test%2Fa_320.mp4"
        );
        assert_eq!(request.file_name, "Song A - Singer.mp3");
        assert!(matches!(
            playback_events(&mut events).last(),
            Some(PlaybackEvent::DownloadRequested { .. })
        ));
    }

    #[tokio::test]
    async fn test_stream_quality_preference() {
        let audio = Arc::new(FakeAudio::default());
        let controller = PlaybackController::new(audio.clone(), EventBus::new(8))
            .with_stream_quality(StreamQuality::Kbps(96));
        controller.set_queue(vec![track("a")]);

        controller.select_and_play(0).await.unwrap();
        assert!(audio
            .calls()
            .contains(&Call::Load("https://cdn.test/a_96.mp4".to_string())));
    }

    #[tokio::test]
    async fn test_audio_error_event_pauses() {
        let (controller, _audio, _bus) = controller(&["a"]);
        controller.select_and_play(0).await.unwrap();

        controller
            .handle_audio_event(AudioEvent::Error {
                message: "network stalled".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(controller.status(), PlaybackStatus::Paused);
    }
}
