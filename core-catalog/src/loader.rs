//! Paged catalog loader
//!
//! Owns the accumulated track list for the active query and the cursor used
//! to page through it. Tracks are deduplicated by id across pages and keep
//! first-seen order.
//!
//! At most one load runs at a time; a second `search` or `load_more` issued
//! while one is in flight fails with [`CatalogError::LoadInProgress`]. State is
//! committed only after the remote call succeeded, so a failed request leaves
//! the previous list untouched.

use core_runtime::events::{CatalogEvent, CoreEvent, EventBus};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::client::{SearchApi, SearchPage};
use crate::error::{CatalogError, Result};
use crate::models::Track;

/// Paging position for the active query.
#[derive(Debug, Clone, Default)]
pub struct LoadCursor {
    /// Last page fetched (0 before the first fetch).
    pub page: u32,
    seen: HashSet<String>,
    pub has_more: bool,
}

impl LoadCursor {
    /// Keep only tracks whose id has not been seen, recording them as seen.
    ///
    /// Also drops repeats within `incoming` itself.
    pub fn merge(&mut self, incoming: Vec<Track>) -> Vec<Track> {
        incoming
            .into_iter()
            .filter(|track| self.seen.insert(track.id.clone()))
            .collect()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

/// Result of a successful `search` or `load_more`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Tracks newly appended to the list by this load, in order.
    pub tracks: Vec<Track>,
    /// Last page fetched.
    pub page: u32,
    /// List length after the merge.
    pub total: usize,
    pub has_more: bool,
}

impl LoadOutcome {
    pub fn added(&self) -> usize {
        self.tracks.len()
    }
}

#[derive(Default)]
struct CatalogState {
    query: Option<String>,
    tracks: Vec<Track>,
    cursor: LoadCursor,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CatalogError::LoadInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CatalogLoader {
    api: Arc<dyn SearchApi>,
    event_bus: EventBus,
    page_size: u32,
    default_query: String,
    in_flight: AtomicBool,
    state: Mutex<CatalogState>,
}

impl CatalogLoader {
    pub fn new(
        api: Arc<dyn SearchApi>,
        event_bus: EventBus,
        page_size: u32,
        default_query: impl Into<String>,
    ) -> Self {
        Self {
            api,
            event_bus,
            page_size: page_size.max(1),
            default_query: default_query.into(),
            in_flight: AtomicBool::new(false),
            state: Mutex::new(CatalogState::default()),
        }
    }

    /// Start a fresh query from page 1.
    ///
    /// A blank query falls back to the configured default. The previous list
    /// is replaced only once page 1 has been fetched.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<LoadOutcome> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        let query = match query.trim() {
            "" => self.default_query.clone(),
            trimmed => trimmed.to_string(),
        };
        self.emit(CatalogEvent::SearchStarted {
            query: query.clone(),
        });

        let page = match self.api.search_songs(&query, 1, self.page_size).await {
            Ok(page) => page,
            Err(error) => return Err(self.report_failure(&query, error)),
        };

        let mut cursor = LoadCursor {
            page: 1,
            ..LoadCursor::default()
        };
        let raw_count = page.raw_count;
        let tracks = cursor.merge(page.tracks);
        cursor.has_more = !tracks.is_empty() && self.is_full_page(raw_count);

        let outcome = LoadOutcome {
            tracks: tracks.clone(),
            page: 1,
            total: tracks.len(),
            has_more: cursor.has_more,
        };

        {
            let mut state = self.state.lock();
            state.query = Some(query.clone());
            state.tracks = tracks;
            state.cursor = cursor;
        }

        if outcome.tracks.is_empty() {
            info!(query = %query, "Search returned no playable tracks");
            self.emit(CatalogEvent::NoResults { query });
        } else {
            info!(
                query = %query,
                total = outcome.total,
                has_more = outcome.has_more,
                "Search loaded"
            );
            self.emit(CatalogEvent::PageLoaded {
                query,
                page: 1,
                added: outcome.added(),
                total: outcome.total,
                has_more: outcome.has_more,
            });
        }

        Ok(outcome)
    }

    /// Fetch the next page of the active query and append its new tracks.
    ///
    /// When a page contains only tracks already in the list the following
    /// page is tried once before paging is declared exhausted.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::NoActiveQuery`] before the first search
    /// - [`CatalogError::NoMorePages`] once paging is exhausted
    /// - [`CatalogError::LoadInProgress`] while another load runs
    #[instrument(skip(self))]
    pub async fn load_more(&self) -> Result<LoadOutcome> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        let (query, mut cursor) = {
            let state = self.state.lock();
            let query = state.query.clone().ok_or(CatalogError::NoActiveQuery)?;
            if !state.cursor.has_more {
                return Err(CatalogError::NoMorePages);
            }
            (query, state.cursor.clone())
        };

        let mut page = self.fetch(&query, cursor.page + 1).await?;
        cursor.page = page.page;

        let added = if page.tracks.is_empty() {
            Vec::new()
        } else {
            let tracks = std::mem::take(&mut page.tracks);
            let added = cursor.merge(tracks);
            if added.is_empty() {
                debug!(page = page.page, "Page held only known tracks, trying the next one");
                page = self.fetch(&query, cursor.page + 1).await?;
                cursor.page = page.page;
                cursor.merge(std::mem::take(&mut page.tracks))
            } else {
                added
            }
        };

        cursor.has_more = !added.is_empty() && self.is_full_page(page.raw_count);

        let (total, has_more) = {
            let mut state = self.state.lock();
            state.tracks.extend(added.iter().cloned());
            state.cursor = cursor;
            (state.tracks.len(), state.cursor.has_more)
        };

        if added.is_empty() {
            info!(query = %query, total, "Catalog exhausted");
            self.emit(CatalogEvent::Exhausted {
                query: query.clone(),
                total,
            });
        } else {
            info!(query = %query, added = added.len(), total, has_more, "Loaded more tracks");
            self.emit(CatalogEvent::PageLoaded {
                query: query.clone(),
                page: page.page,
                added: added.len(),
                total,
                has_more,
            });
        }

        Ok(LoadOutcome {
            tracks: added,
            page: page.page,
            total,
            has_more,
        })
    }

    /// Snapshot of the accumulated list.
    pub fn tracks(&self) -> Vec<Track> {
        self.state.lock().tracks.clone()
    }

    pub fn track(&self, index: usize) -> Option<Track> {
        self.state.lock().tracks.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().cursor.has_more
    }

    /// The effective query of the last successful search.
    pub fn query(&self) -> Option<String> {
        self.state.lock().query.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    async fn fetch(&self, query: &str, page: u32) -> Result<SearchPage> {
        self.api
            .search_songs(query, page, self.page_size)
            .await
            .map_err(|error| self.report_failure(query, error))
    }

    fn is_full_page(&self, raw_count: usize) -> bool {
        raw_count >= self.page_size as usize
    }

    fn report_failure(&self, query: &str, error: CatalogError) -> CatalogError {
        warn!(query = %query, %error, "Catalog load failed");
        self.emit(CatalogEvent::SearchFailed {
            query: query.to_string(),
            message: error.to_string(),
            recoverable: error.is_transient(),
        });
        error
    }

    fn emit(&self, event: CatalogEvent) {
        self.event_bus.emit(CoreEvent::Catalog(event)).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StreamUrl;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            name: format!("Song {}", id),
            primary_artists: "Artist".to_string(),
            album: None,
            artwork_url: None,
            streams: vec![StreamUrl {
                quality: Some("320kbps".to_string()),
                url: format!("https://s/{}.mp4", id),
            }],
            duration_secs: Some(180),
        }
    }

    fn page(number: u32, ids: &[String]) -> SearchPage {
        SearchPage {
            page: number,
            raw_count: ids.len(),
            tracks: ids.iter().map(|id| track(id)).collect(),
            rejected: 0,
        }
    }

    fn ids(prefix: &str, count: usize) -> Vec<String> {
        (0..count).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[derive(Default)]
    struct ScriptedApi {
        responses: Mutex<VecDeque<Result<SearchPage>>>,
        calls: Mutex<Vec<(String, u32, u32)>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedApi {
        fn new(responses: Vec<Result<SearchPage>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(String, u32, u32)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl SearchApi for ScriptedApi {
        async fn search_songs(&self, query: &str, page: u32, limit: u32) -> Result<SearchPage> {
            self.calls.lock().push((query.to_string(), page, limit));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let next = self.responses.lock().pop_front();
            match next {
                Some(Ok(mut scripted)) => {
                    scripted.page = page;
                    Ok(scripted)
                }
                Some(Err(error)) => Err(error),
                None => Ok(SearchPage {
                    page,
                    raw_count: 0,
                    tracks: Vec::new(),
                    rejected: 0,
                }),
            }
        }
    }

    fn loader(api: Arc<ScriptedApi>, page_size: u32) -> (CatalogLoader, EventBus) {
        let bus = EventBus::new(64);
        (CatalogLoader::new(api, bus.clone(), page_size, "Hindi"), bus)
    }

    fn drain(receiver: &mut core_runtime::events::Receiver<CoreEvent>) -> Vec<CatalogEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            if let CoreEvent::Catalog(event) = event {
                events.push(event);
            }
        }
        events
    }

    #[tokio::test]
    async fn test_repeated_pages_exhaust_catalog() {
        let first = ids("h", 40);
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(page(1, &first)),
            Ok(page(2, &first)),
            Ok(page(3, &first)),
        ]));
        let (loader, bus) = loader(api.clone(), 40);
        let mut events = bus.subscribe();

        let outcome = loader.search("Hindi").await.unwrap();
        assert_eq!(outcome.total, 40);
        assert!(outcome.has_more);

        let more = loader.load_more().await.unwrap();
        assert_eq!(more.added(), 0);
        assert_eq!(more.total, 40);
        assert!(!more.has_more);
        assert_eq!(loader.len(), 40);
        assert!(!loader.has_more());

        let pages: Vec<u32> = api.calls().iter().map(|(_, page, _)| *page).collect();
        assert_eq!(pages, vec![1, 2, 3]);

        let events = drain(&mut events);
        assert!(matches!(
            events.last(),
            Some(CatalogEvent::Exhausted { total: 40, .. })
        ));

        assert_eq!(loader.load_more().await, Err(CatalogError::NoMorePages));
        assert_eq!(api.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_overlapping_pages_keep_first_seen_order() {
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(page(1, &["a".into(), "b".into(), "c".into()])),
            Ok(page(2, &["c".into(), "d".into(), "a".into()])),
        ]));
        let (loader, _bus) = loader(api, 3);

        loader.search("mix").await.unwrap();
        let more = loader.load_more().await.unwrap();

        assert_eq!(more.tracks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), ["d"]);
        let order: Vec<String> = loader.tracks().into_iter().map(|t| t.id).collect();
        assert_eq!(order, ["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_duplicate_page_retries_once_then_appends() {
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(page(1, &["a".into(), "b".into()])),
            Ok(page(2, &["a".into(), "b".into()])),
            Ok(page(3, &["c".into(), "d".into()])),
        ]));
        let (loader, _bus) = loader(api.clone(), 2);

        loader.search("q").await.unwrap();
        let more = loader.load_more().await.unwrap();

        assert_eq!(more.page, 3);
        assert_eq!(more.added(), 2);
        assert!(more.has_more);
        assert_eq!(loader.len(), 4);
    }

    #[tokio::test]
    async fn test_short_page_ends_paging() {
        let api = Arc::new(ScriptedApi::new(vec![Ok(page(1, &ids("s", 7)))]));
        let (loader, _bus) = loader(api, 40);

        let outcome = loader.search("rare").await.unwrap();
        assert_eq!(outcome.total, 7);
        assert!(!outcome.has_more);
        assert_eq!(loader.load_more().await, Err(CatalogError::NoMorePages));
    }

    #[tokio::test]
    async fn test_empty_page_clears_has_more() {
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(page(1, &ids("a", 2))),
            Ok(page(2, &[])),
        ]));
        let (loader, bus) = loader(api.clone(), 2);
        let mut events = bus.subscribe();

        loader.search("q").await.unwrap();
        let more = loader.load_more().await.unwrap();
        assert_eq!(more.added(), 0);
        assert!(!loader.has_more());
        assert_eq!(api.calls().len(), 2);
        assert!(matches!(
            drain(&mut events).last(),
            Some(CatalogEvent::Exhausted { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_search_keeps_previous_list() {
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(page(1, &ids("a", 3))),
            Err(CatalogError::Network("timeout".to_string())),
        ]));
        let (loader, bus) = loader(api, 40);

        loader.search("first").await.unwrap();
        let mut events = bus.subscribe();

        let err = loader.search("second").await.unwrap_err();
        assert!(err.is_network_error());
        assert_eq!(loader.len(), 3);
        assert_eq!(loader.query().as_deref(), Some("first"));
        assert!(!loader.is_loading());

        let events = drain(&mut events);
        assert!(matches!(
            events.last(),
            Some(CatalogEvent::SearchFailed { recoverable: true, .. })
        ));
    }

    #[tokio::test]
    async fn test_fresh_search_without_results() {
        let api = Arc::new(ScriptedApi::new(vec![
            Ok(page(1, &ids("a", 3))),
            Ok(SearchPage {
                page: 1,
                raw_count: 2,
                tracks: Vec::new(),
                rejected: 2,
            }),
        ]));
        let (loader, bus) = loader(api, 40);

        loader.search("first").await.unwrap();
        let mut events = bus.subscribe();

        let outcome = loader.search("nothing").await.unwrap();
        assert_eq!(outcome.total, 0);
        assert!(loader.is_empty());
        assert!(!loader.has_more());
        assert!(matches!(
            drain(&mut events).last(),
            Some(CatalogEvent::NoResults { .. })
        ));
    }

    #[tokio::test]
    async fn test_blank_query_uses_default() {
        let api = Arc::new(ScriptedApi::new(vec![Ok(page(1, &ids("a", 1)))]));
        let (loader, _bus) = loader(api.clone(), 40);

        loader.search("   ").await.unwrap();
        assert_eq!(api.calls()[0], ("Hindi".to_string(), 1, 40));
        assert_eq!(loader.query().as_deref(), Some("Hindi"));
    }

    #[tokio::test]
    async fn test_load_more_requires_query() {
        let api = Arc::new(ScriptedApi::new(Vec::new()));
        let (loader, _bus) = loader(api, 40);
        assert_eq!(loader.load_more().await, Err(CatalogError::NoActiveQuery));
    }

    #[tokio::test]
    async fn test_concurrent_load_is_rejected() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(ScriptedApi {
            responses: Mutex::new(vec![Ok(page(1, &ids("a", 2)))].into()),
            gate: Some(gate.clone()),
            ..ScriptedApi::default()
        });
        let (loader, _bus) = loader(api, 40);
        let loader = Arc::new(loader);

        let background = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.search("slow").await })
        };
        while !loader.is_loading() {
            tokio::task::yield_now().await;
        }

        assert_eq!(loader.search("fast").await, Err(CatalogError::LoadInProgress));
        assert_eq!(loader.load_more().await, Err(CatalogError::LoadInProgress));

        gate.notify_one();
        let outcome = background.await.unwrap().unwrap();
        assert_eq!(outcome.total, 2);
        assert!(!loader.is_loading());
    }
}
