//! Error types for chunk comparison and synchronization.

use crate::types::{ActionKind, Side};
use thiserror::Error;

/// A page violated the ordering or typing rules for keys.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The key field holds a value that cannot be ordered.
    #[error("Bad {side} key type, \"{repr}\" should be number, string or date and is \"{kind}\"")]
    BadKeyType {
        side: Side,
        repr: String,
        kind: String,
    },

    /// Two adjacent keys on the same side have different kinds.
    #[error("Bad {side} key type, \"{prev}\" ({prev_kind}) should be same type as \"{next}\" ({next_kind})")]
    KindMismatch {
        side: Side,
        prev: String,
        prev_kind: String,
        next: String,
        next_kind: String,
    },

    /// The source and destination pages are keyed by different kinds.
    #[error("Source keys are {source_kind} but destination keys are {dest_kind}")]
    SideKindMismatch {
        source_kind: String,
        dest_kind: String,
    },

    /// Two adjacent keys are in descending order.
    #[error("Bad {side} sort, \"{next}\" should be greater than \"{prev}\"")]
    BadSort {
        side: Side,
        prev: String,
        next: String,
    },

    /// A record has no usable value at the key path.
    #[error("Missing {side} key '{path}' on item index {position}")]
    MissingKey {
        side: Side,
        path: String,
        position: usize,
    },
}

/// Errors that abort a comparison or a synchronization run.
///
/// None of these are retried internally.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Duplicate adjacent keys on a side the duplicate policy does not permit.
    #[error("Duplicate {side} key \"{key}\"")]
    DuplicateKey { side: Side, key: String },

    /// A page read failed.
    #[error("Failed to read page {page} from {side} feed: {source}")]
    Read {
        side: Side,
        page: usize,
        #[source]
        source: anyhow::Error,
    },

    /// An action sink reported an error.
    #[error("{action} callback failed: {source}")]
    Callback {
        action: ActionKind,
        #[source]
        source: anyhow::Error,
    },

    /// A group sink reported an error.
    #[error("group callback failed for key \"{key}\": {source}")]
    GroupCallback {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Invalid configuration, such as an empty key path.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether this error came from key validation (sorting, typing, duplicates).
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::DuplicateKey { .. })
    }
}

/// Result type alias for sync-core operations.
pub type Result<T> = std::result::Result<T, SyncError>;
