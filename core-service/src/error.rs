use bridge_traits::BridgeError;
use core_catalog::CatalogError;
use core_playback::PlaybackError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Settings error: {0}")]
    Settings(#[from] BridgeError),
}

impl CoreError {
    /// Short text for a toast in the host UI.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Catalog(CatalogError::LoadInProgress) => "Already loading songs".to_string(),
            CoreError::Catalog(CatalogError::NoMorePages) => "No more songs to load".to_string(),
            CoreError::Catalog(_) => "Failed to load songs".to_string(),
            CoreError::Playback(error) => error.user_message(),
            CoreError::Settings(_) => "Could not save your preference".to_string(),
            CoreError::InitializationFailed(_) | CoreError::Config(_) => {
                "The player could not start".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
