//! Error types shared across the POS core.

use thiserror::Error;

/// Result alias used by every operation in the crate.
pub type PosResult<T> = Result<T, PosError>;

/// Errors surfaced by POS operations.
///
/// Deleting an absent menu item and settling or cancelling an absent order
/// name are NOT errors: the UI re-renders after every write and a double
/// click may race the refresh, so those paths succeed as no-ops instead.
#[derive(Debug, Error)]
pub enum PosError {
    /// Input rejected before any write happened.
    #[error("{0}")]
    Validation(String),

    /// A required row is missing (adding a line item from an unknown menu id).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The underlying SQLite store failed. Multi-row writes roll back whole.
    #[error("{context}: {source}")]
    Storage {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// Filesystem failure while setting up the data or log directory.
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The connection mutex was poisoned by a panicking thread.
    #[error("database lock poisoned")]
    Poisoned,
}

impl PosError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn storage(context: &'static str, source: rusqlite::Error) -> Self {
        Self::Storage { context, source }
    }

    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
