//! Dark-mode preference persisted in the host settings store.

use bridge_traits::storage::SettingsStore;
use core_runtime::events::{CoreEvent, EventBus, SettingsEvent};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::Result;

/// Settings key holding the dark-mode flag.
pub const DARK_MODE_KEY: &str = "darkMode";

#[derive(Clone)]
pub struct ThemePreference {
    store: Arc<dyn SettingsStore>,
    event_bus: EventBus,
}

impl ThemePreference {
    pub fn new(store: Arc<dyn SettingsStore>, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    /// Stored flag; `false` when it was never set.
    pub async fn is_dark_mode(&self) -> Result<bool> {
        Ok(self.store.get_bool(DARK_MODE_KEY).await?.unwrap_or(false))
    }

    #[instrument(skip(self))]
    pub async fn set_dark_mode(&self, enabled: bool) -> Result<()> {
        let previous = self.is_dark_mode().await?;
        self.store.set_bool(DARK_MODE_KEY, enabled).await?;

        if previous != enabled {
            debug!(enabled, "Theme changed");
            self.event_bus
                .emit(CoreEvent::Settings(SettingsEvent::ThemeChanged {
                    dark_mode: enabled,
                }))
                .ok();
        }
        Ok(())
    }

    /// Flip the flag and return the new value.
    pub async fn toggle(&self) -> Result<bool> {
        let enabled = !self.is_dark_mode().await?;
        self.set_dark_mode(enabled).await?;
        Ok(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use mockall::mock;

    mock! {
        Settings {}

        #[async_trait]
        impl SettingsStore for Settings {
            async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()>;
            async fn get_string(&self, key: &str) -> BridgeResult<Option<String>>;
            async fn set_bool(&self, key: &str, value: bool) -> BridgeResult<()>;
            async fn get_bool(&self, key: &str) -> BridgeResult<Option<bool>>;
            async fn delete(&self, key: &str) -> BridgeResult<()>;
            async fn list_keys(&self) -> BridgeResult<Vec<String>>;
            async fn clear_all(&self) -> BridgeResult<()>;
        }
    }

    #[tokio::test]
    async fn test_absent_flag_is_light_mode() {
        let mut store = MockSettings::new();
        store
            .expect_get_bool()
            .withf(|key| key == DARK_MODE_KEY)
            .returning(|_| Ok(None));

        let theme = ThemePreference::new(Arc::new(store), EventBus::new(4));
        assert!(!theme.is_dark_mode().await.unwrap());
    }

    #[tokio::test]
    async fn test_toggle_writes_and_emits() {
        let mut store = MockSettings::new();
        store.expect_get_bool().returning(|_| Ok(Some(false)));
        store
            .expect_set_bool()
            .withf(|key, value| key == DARK_MODE_KEY && *value)
            .times(1)
            .returning(|_, _| Ok(()));

        let bus = EventBus::new(4);
        let mut events = bus.subscribe();
        let theme = ThemePreference::new(Arc::new(store), bus);

        assert!(theme.toggle().await.unwrap());
        assert_eq!(
            events.try_recv().unwrap(),
            CoreEvent::Settings(SettingsEvent::ThemeChanged { dark_mode: true })
        );
    }

    #[tokio::test]
    async fn test_store_failure_surfaces() {
        let mut store = MockSettings::new();
        store
            .expect_get_bool()
            .returning(|_| Err(BridgeError::DatabaseError("locked".to_string())));

        let theme = ThemePreference::new(Arc::new(store), EventBus::new(4));
        let err = theme.set_dark_mode(true).await.unwrap_err();
        assert_eq!(err.user_message(), "Could not save your preference");
    }
}
