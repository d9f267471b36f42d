//! Error types for glint.

use thiserror::Error;

use crate::scene::NodeId;

/// The main error type for glint core operations.
#[derive(Error, Debug)]
pub enum GlintError {
    /// A scene node with the given id does not exist.
    #[error("scene node {0:?} not found")]
    NodeNotFound(NodeId),

    /// No pick entry is registered under the given id.
    #[error("pick id {0:#08x} is not registered")]
    PickIdNotRegistered(u32),

    /// The pick id cannot be represented as a packed 24-bit color.
    #[error("pick id {0:#x} is outside 1..=0xFFFFFF")]
    InvalidPickId(u32),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for glint core operations.
pub type Result<T> = std::result::Result<T, GlintError>;
