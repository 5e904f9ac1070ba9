//! Nexus Music core.
//!
//! Re-exports the workspace crates so host applications can depend on a
//! single crate: search and paging ([`catalog`]), queue and transport
//! ([`playback`]), configuration, events and logging ([`runtime`]), the host
//! bridge traits ([`bridge`]) and the [`CoreService`] façade that ties them
//! together.

pub use bridge_traits as bridge;
pub use core_catalog as catalog;
pub use core_playback as playback;
pub use core_runtime as runtime;

pub use core_runtime::config::{CoreConfig, CoreConfigBuilder};
pub use core_runtime::events::{CoreEvent, EventBus, EventStream};
pub use core_runtime::logging::{init_logging, LoggingConfig};
pub use core_service::{CoreError, CoreService, Result, ThemePreference};

#[cfg(feature = "desktop-shims")]
pub use core_service::bootstrap_desktop;
