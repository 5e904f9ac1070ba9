//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host-provided bridges (HTTP client, settings store,
//! audio element) into the catalog loader, the playback controller and the
//! theme preference, and keeps the controller's queue in step with the
//! loaded list. Desktop apps typically enable the `desktop-shims` feature so
//! [`CoreConfig`] falls back to the `bridge-desktop` implementations.

pub mod error;
pub mod theme;

pub use error::{CoreError, Result};
pub use theme::{ThemePreference, DARK_MODE_KEY};

use std::sync::Arc;

use bridge_traits::audio::AudioElement;
use core_catalog::{CatalogLoader, LoadOutcome, SaavnClient, SearchApi};
use core_playback::PlaybackController;
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventStream};
use tracing::info;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    event_bus: EventBus,
    catalog: Arc<CatalogLoader>,
    playback: Arc<PlaybackController>,
    theme: ThemePreference,
}

impl CoreService {
    /// Build the service against the configured search API.
    pub fn new(config: CoreConfig, audio: Arc<dyn AudioElement>) -> Result<Self> {
        let api = Arc::new(SaavnClient::from_config(&config));
        Self::with_search_api(config, audio, api)
    }

    /// Build the service with a custom search backend.
    pub fn with_search_api(
        config: CoreConfig,
        audio: Arc<dyn AudioElement>,
        api: Arc<dyn SearchApi>,
    ) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let catalog = Arc::new(CatalogLoader::new(
            api,
            event_bus.clone(),
            config.page_size,
            config.default_query.clone(),
        ));
        let playback = Arc::new(PlaybackController::from_config(
            &config,
            audio,
            event_bus.clone(),
        ));
        let theme = ThemePreference::new(config.settings_store.clone(), event_bus.clone());

        info!(
            endpoint = %config.search_endpoint(),
            page_size = config.page_size,
            "Core service initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            event_bus,
            catalog,
            playback,
            theme,
        })
    }

    /// Run a fresh search and make its results the playback queue.
    pub async fn search(&self, query: &str) -> Result<LoadOutcome> {
        let outcome = self.catalog.search(query).await?;
        self.playback.set_queue(self.catalog.tracks());
        Ok(outcome)
    }

    /// Load the next page and append its new tracks to the queue.
    pub async fn load_more(&self) -> Result<LoadOutcome> {
        let outcome = self.catalog.load_more().await?;
        self.playback.append_to_queue(outcome.tracks.clone());
        Ok(outcome)
    }

    /// Receive every event emitted after this call.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn catalog(&self) -> Arc<CatalogLoader> {
        Arc::clone(&self.catalog)
    }

    pub fn playback(&self) -> Arc<PlaybackController> {
        Arc::clone(&self.playback)
    }

    pub fn theme(&self) -> &ThemePreference {
        &self.theme
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Uses the default configuration: reqwest for HTTP and a SQLite settings
/// file under the user config directory.
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(audio: Arc<dyn AudioElement>) -> Result<CoreService> {
    let config = CoreConfig::builder().build()?;
    CoreService::new(config, audio)
}
