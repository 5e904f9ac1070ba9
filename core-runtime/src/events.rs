//! # Event Bus System
//!
//! Typed state-change notifications for the host UI, carried over
//! `tokio::sync::broadcast`.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   emit   ┌───────────┐  subscribe  ┌──────────────┐
//! │ CatalogLoader  ├─────────>│           ├────────────>│ UI renderer  │
//! └────────────────┘          │ EventBus  │             └──────────────┘
//! ┌────────────────┐   emit   │ (broadcast│  subscribe  ┌──────────────┐
//! │ PlaybackCtrl   ├─────────>│  channel) ├────────────>│ Toast layer  │
//! └────────────────┘          └───────────┘             └──────────────┘
//! ```
//!
//! Every event can render itself as a short user-facing notification via
//! [`CoreEvent::notification`]; hosts that show toasts only need that.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CatalogEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Catalog(CatalogEvent::SearchStarted {
//!     query: "Hindi".to_string(),
//! }))
//! .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Search started");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal; position updates are the usual culprit.
//! - **`RecvError::Closed`**: every sender is gone. Treat as shutdown.
//!
//! `emit` fails only when nobody is subscribed; emitters ignore that.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Search and paging
    Catalog(CatalogEvent),
    /// Queue and transport
    Playback(PlaybackEvent),
    /// Persisted preferences
    Settings(SettingsEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Catalog(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Settings(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Catalog(CatalogEvent::SearchFailed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Catalog(CatalogEvent::NoResults { .. }) => EventSeverity::Warning,
            CoreEvent::Catalog(CatalogEvent::Exhausted { .. }) => EventSeverity::Warning,
            CoreEvent::Catalog(CatalogEvent::PageLoaded { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::ShuffleChanged { .. })
            | CoreEvent::Playback(PlaybackEvent::RepeatChanged { .. })
            | CoreEvent::Playback(PlaybackEvent::LoFiChanged { .. })
            | CoreEvent::Playback(PlaybackEvent::DownloadRequested { .. }) => EventSeverity::Info,
            CoreEvent::Settings(_) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Short toast text for the host UI, if the event warrants one.
    ///
    /// Position ticks and other high-frequency events return `None`.
    pub fn notification(&self) -> Option<String> {
        match self {
            CoreEvent::Catalog(e) => e.notification(),
            CoreEvent::Playback(e) => e.notification(),
            CoreEvent::Settings(_) => None,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

fn toggled(label: &str, enabled: bool) -> String {
    format!("{} {}", label, if enabled { "enabled" } else { "disabled" })
}

// ============================================================================
// Catalog Events
// ============================================================================

/// Events raised while searching and paging through the song catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CatalogEvent {
    /// A fresh search was issued.
    SearchStarted { query: String },
    /// A page was fetched and merged into the list.
    PageLoaded {
        query: String,
        /// 1-based page number that produced the tracks.
        page: u32,
        /// Tracks newly appended by this load.
        added: usize,
        /// Accumulated list length after the merge.
        total: usize,
        /// Whether `load_more` may still produce results.
        has_more: bool,
    },
    /// A fresh search matched nothing playable.
    NoResults { query: String },
    /// Paging ran dry; no further pages will be requested.
    Exhausted { query: String, total: usize },
    /// The search API could not be reached or returned garbage.
    SearchFailed {
        query: String,
        message: String,
        /// Whether re-issuing the same request may succeed.
        recoverable: bool,
    },
}

impl CatalogEvent {
    fn description(&self) -> &str {
        match self {
            CatalogEvent::SearchStarted { .. } => "Search started",
            CatalogEvent::PageLoaded { .. } => "Search results loaded",
            CatalogEvent::NoResults { .. } => "Search returned no results",
            CatalogEvent::Exhausted { .. } => "No more results",
            CatalogEvent::SearchFailed { .. } => "Search failed",
        }
    }

    fn notification(&self) -> Option<String> {
        match self {
            CatalogEvent::SearchStarted { .. } => Some("Loading songs...".to_string()),
            CatalogEvent::PageLoaded { added, .. } => Some(format!("Loaded {} songs", added)),
            CatalogEvent::NoResults { .. } => Some("No songs found".to_string()),
            CatalogEvent::Exhausted { .. } => Some("No more songs to load".to_string()),
            CatalogEvent::SearchFailed { .. } => Some("Failed to load songs".to_string()),
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to the queue and audio transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A track was selected and its source is loading.
    Loading { track_id: String, index: usize },
    /// The audio element confirmed playback.
    Started {
        track_id: String,
        title: String,
        artist: String,
    },
    Paused { track_id: String, position_ms: u64 },
    Resumed { track_id: String, position_ms: u64 },
    /// Track finished playing naturally.
    Completed { track_id: String },
    /// Playback position changed (seek or natural progression).
    PositionChanged {
        track_id: String,
        position_ms: u64,
        /// Zero until metadata has arrived.
        duration_ms: u64,
    },
    /// The queue contents or order changed.
    QueueChanged {
        length: usize,
        current_index: Option<usize>,
    },
    ShuffleChanged { enabled: bool },
    RepeatChanged { enabled: bool },
    LoFiChanged { enabled: bool },
    /// A download of the selected track was handed to the host.
    DownloadRequested {
        track_id: String,
        url: String,
        file_name: String,
    },
    /// Playback error occurred.
    Error {
        track_id: Option<String>,
        message: String,
        /// Whether playback can be retried.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Loading { .. } => "Loading track",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::QueueChanged { .. } => "Queue changed",
            PlaybackEvent::ShuffleChanged { .. } => "Shuffle toggled",
            PlaybackEvent::RepeatChanged { .. } => "Repeat toggled",
            PlaybackEvent::LoFiChanged { .. } => "Lo-fi mode toggled",
            PlaybackEvent::DownloadRequested { .. } => "Download requested",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }

    fn notification(&self) -> Option<String> {
        match self {
            PlaybackEvent::Started { title, .. } => Some(format!("Now playing: {}", title)),
            PlaybackEvent::ShuffleChanged { enabled } => Some(toggled("Shuffle", *enabled)),
            PlaybackEvent::RepeatChanged { enabled } => Some(toggled("Repeat", *enabled)),
            PlaybackEvent::LoFiChanged { enabled } => Some(toggled("Lo-fi mode", *enabled)),
            PlaybackEvent::DownloadRequested { .. } => Some("Download started".to_string()),
            PlaybackEvent::Error { message, .. } => Some(message.clone()),
            _ => None,
        }
    }
}

// ============================================================================
// Settings Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SettingsEvent {
    ThemeChanged { dark_mode: bool },
}

impl SettingsEvent {
    fn description(&self) -> &str {
        match self {
            SettingsEvent::ThemeChanged { .. } => "Theme changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Clone it freely: every clone publishes into the same channel. Each
/// [`EventBus::subscribe`] call creates an independent receiver that sees
/// events emitted after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// A subscriber that falls behind by more than `capacity` events receives
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(100);
/// let playback_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Playback(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders are dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. `None` when nothing matching is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
