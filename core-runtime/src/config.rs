//! # Core Configuration Module
//!
//! Builder-based configuration for the music core.
//!
//! ## Overview
//!
//! [`CoreConfig`] holds the search API settings, playback preferences and the
//! bridge implementations the core needs. The builder validates everything up
//! front so that a misconfigured core fails at startup, not on the first
//! search.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - search API requests (desktop default: reqwest)
//! - `SettingsStore` - the persisted theme flag (desktop default: SQLite)
//!
//! With the `desktop-shims` feature both are created automatically when not
//! injected. Without it, a missing bridge is a [`Error::CapabilityMissing`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, StreamQuality};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://saavn.example.app")
//!     .page_size(40)
//!     .default_query("Hindi")
//!     .stream_quality(StreamQuality::Kbps(160))
//!     .http_client(Arc::new(MyHttpClient))
//!     .settings_store(Arc::new(MySettingsStore))
//!     .enable_lofi(true)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{HttpClient, SettingsStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Public song search API.
pub const DEFAULT_API_BASE_URL: &str = "https://jiosaavn-api-privatecvc2.vercel.app";

/// Results requested per page. A shorter page marks the end of the results.
pub const DEFAULT_PAGE_SIZE: u32 = 40;

/// Largest page the search API accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query used when the user submits an empty search.
pub const DEFAULT_QUERY: &str = "Hindi";

/// Download proxy that sets `Content-Disposition` on the stream URL.
pub const DEFAULT_DOWNLOAD_PROXY: &str = "https://downforce.rf.gd/";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Which of a track's stream URLs to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StreamQuality {
    /// The last (highest bitrate) entry the API returns.
    #[default]
    Highest,
    /// A specific bitrate label, e.g. `Kbps(160)` matches `"160kbps"`.
    /// Falls back to the highest entry when the label is absent.
    Kbps(u32),
}

/// Core configuration.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL of the song search API, without trailing slash
    pub api_base_url: String,

    /// Results per search page (`limit` parameter)
    pub page_size: u32,

    /// Query used for empty searches and the initial load
    pub default_query: String,

    pub stream_quality: StreamQuality,

    /// Proxy URL the download action wraps stream URLs in
    pub download_proxy_url: String,

    /// Timeout applied to each search request
    pub request_timeout: Duration,

    /// Event bus capacity per subscriber
    pub event_buffer_size: usize,

    pub http_client: Arc<dyn HttpClient>,

    pub settings_store: Arc<dyn SettingsStore>,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url)
            .field("page_size", &self.page_size)
            .field("default_query", &self.default_query)
            .field("stream_quality", &self.stream_quality)
            .field("download_proxy_url", &self.download_proxy_url)
            .field("request_timeout", &self.request_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &"HttpClient { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Allow the lo-fi effect chain on the audio element
    pub enable_lofi: bool,

    /// Allow building download requests for the selected track
    pub enable_downloads: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_lofi: true,
            enable_downloads: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// `<base>/search/songs`
    pub fn search_endpoint(&self) -> String {
        format!("{}/search/songs", self.api_base_url.trim_end_matches('/'))
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The API base URL is an absolute http(s) URL
    /// - Page size is within `1..=100`
    /// - The default query is not blank
    /// - A bitrate preference is non-zero
    /// - The download proxy is set when downloads are enabled
    /// - The event buffer can hold at least one event
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.api_base_url) {
            return Err(Error::Config(format!(
                "API base URL must start with http:// or https://, got '{}'",
                self.api_base_url
            )));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.default_query.trim().is_empty() {
            return Err(Error::Config("Default query cannot be empty".to_string()));
        }

        if self.stream_quality == StreamQuality::Kbps(0) {
            return Err(Error::Config(
                "Stream bitrate preference must be greater than 0 kbps".to_string(),
            ));
        }

        if self.features.enable_downloads && !is_http_url(&self.download_proxy_url) {
            return Err(Error::Config(
                "Downloads enabled but the download proxy is not an http(s) URL. \
                 Set .download_proxy_url() or disable downloads."
                    .to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty())
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for catalog search. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Web: inject a fetch-based client."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required for the theme preference. \
                 Desktop: enable the 'desktop-shims' feature to use the default SqliteSettingsStore. \
                 Web: inject a localStorage-based settings store."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::with_timeout(timeout));
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let path = path
        .or_else(SqliteSettingsStore::default_path)
        .ok_or_else(|| {
            Error::Config(
                "No settings path given and the platform has no config directory. \
                 Use .settings_path() to set one."
                    .to_string(),
            )
        })?;

    let init_store = |path: PathBuf| -> Result<SqliteSettingsStore> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create Tokio runtime for default settings store: {}",
                    e
                ))
            })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // block_on panics inside a runtime, so hop to a plain thread there.
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(path)?,
    };

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Every setting has a default; only the bridges may be required, and only
/// when `desktop-shims` is disabled.
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    page_size: Option<u32>,
    default_query: Option<String>,
    stream_quality: StreamQuality,
    download_proxy_url: Option<String>,
    request_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    settings_path: Option<PathBuf>,
    features: Option<FeatureFlags>,
}

impl CoreConfigBuilder {
    /// Sets the search API base URL.
    ///
    /// Default: [`DEFAULT_API_BASE_URL`]
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .api_base_url("https://saavn.example.app");
    /// ```
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the number of results requested per page.
    ///
    /// Default: 40. Must be within `1..=100`.
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Sets the query used when the user searches for nothing.
    ///
    /// Default: `"Hindi"`
    pub fn default_query(mut self, query: impl Into<String>) -> Self {
        self.default_query = Some(query.into());
        self
    }

    /// Sets which stream bitrate to play.
    ///
    /// Default: [`StreamQuality::Highest`]
    pub fn stream_quality(mut self, quality: StreamQuality) -> Self {
        self.stream_quality = quality;
        self
    }

    /// Sets the proxy URL wrapped around stream URLs for downloads.
    pub fn download_proxy_url(mut self, url: impl Into<String>) -> Self {
        self.download_proxy_url = Some(url.into());
        self
    }

    /// Sets the per-request timeout for search calls.
    ///
    /// Default: 15 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the event bus capacity.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) is used when the
    /// `desktop-shims` feature is enabled.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use core_runtime::config::CoreConfig;
    /// use std::sync::Arc;
    /// # use bridge_traits::HttpClient;
    /// # struct MyHttpClient;
    /// # #[async_trait::async_trait]
    /// # impl HttpClient for MyHttpClient {
    /// #     async fn execute(&self, request: bridge_traits::HttpRequest) -> Result<bridge_traits::HttpResponse, bridge_traits::BridgeError> { unimplemented!() }
    /// # }
    ///
    /// let builder = CoreConfig::builder()
    ///     .http_client(Arc::new(MyHttpClient));
    /// ```
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the settings store implementation.
    ///
    /// If not provided, a SQLite store is opened at [`settings_path`] (or the
    /// platform config directory) when `desktop-shims` is enabled.
    ///
    /// [`settings_path`]: CoreConfigBuilder::settings_path
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets where the default desktop settings store lives.
    ///
    /// Ignored when a settings store is injected.
    pub fn settings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Enables or disables the lo-fi effect toggle.
    ///
    /// Default: true
    pub fn enable_lofi(mut self, enabled: bool) -> Self {
        self.features.get_or_insert_with(FeatureFlags::default).enable_lofi = enabled;
        self
    }

    /// Enables or disables the download action.
    ///
    /// Default: true
    pub fn enable_downloads(mut self, enabled: bool) -> Self {
        self.features
            .get_or_insert_with(FeatureFlags::default)
            .enable_downloads = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = Some(features);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] if a bridge is missing and no desktop
    ///   default is available
    /// - [`Error::Config`] if any value fails [`CoreConfig::validate`]
    pub fn build(self) -> Result<CoreConfig> {
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let mut config = CoreConfig {
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            default_query: self
                .default_query
                .unwrap_or_else(|| DEFAULT_QUERY.to_string()),
            stream_quality: self.stream_quality,
            download_proxy_url: self
                .download_proxy_url
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_PROXY.to_string()),
            request_timeout,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            http_client: match self.http_client {
                Some(client) => client,
                None => provide_default_http_client(request_timeout)?,
            },
            settings_store: match self.settings_store {
                Some(store) => store,
                None => provide_default_settings_store(self.settings_path)?,
            },
            features: self.features.unwrap_or_default(),
        };
        config.default_query = config.default_query.trim().to_string();

        config.validate()?;

        Ok(config)
    }
}
