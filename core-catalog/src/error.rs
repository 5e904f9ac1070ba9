//! Error types for catalog search and paging

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The search API could not be reached or answered with a non-2xx status
    #[error("Network error: {0}")]
    Network(String),

    /// The response body did not have the expected shape
    #[error("Unexpected response shape: {0}")]
    Schema(String),

    /// A result entry cannot be played (no stream URL, missing id)
    #[error("Track {id} rejected: {reason}")]
    InvalidTrack { id: String, reason: String },

    #[error("A catalog load is already in progress")]
    LoadInProgress,

    #[error("No more pages for the current query")]
    NoMorePages,

    #[error("No search has been issued yet")]
    NoActiveQuery,
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, CatalogError::Network(_) | CatalogError::LoadInProgress)
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, CatalogError::Network(_))
    }
}

impl From<bridge_traits::BridgeError> for CatalogError {
    fn from(error: bridge_traits::BridgeError) -> Self {
        CatalogError::Network(error.to_string())
    }
}
