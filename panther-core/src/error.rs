//! Error handling in [`panther-core`][crate].
use thiserror::Error;

/// Possible errors when working with the storage abstraction.
///
/// Only [`StoreError::NotFound`] and [`StoreError::AlreadyExists`] are expected
/// application outcomes; everything else is classified internal by
/// [`StoreError::is_internal`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record exists at the requested key.
    #[error("resource not found")]
    NotFound,

    /// A create was attempted against a key that already holds a value.
    #[error("resource already exists")]
    AlreadyExists,

    /// An update lost the compare-and-swap race; the caller should treat this
    /// as a transient fault, not retry in-process, and wait for the next event.
    #[error("concurrent conflicting update occurred")]
    Conflict,

    /// A watch was requested with an option the target kind cannot satisfy,
    /// e.g. [`WatchOnName`](crate::store::WatchOption::OnName) without a name.
    #[error("invalid watch request: {0}")]
    InvalidWatch(String),

    /// Failure serializing or deserializing a stored value.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Any other backend failure: connectivity, transport, configuration.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl StoreError {
    /// True for everything other than the two expected-outcome sentinels.
    ///
    /// Decides whether a caller should proceed gracefully (an expected
    /// outcome) or log loudly and let the current unit of work fail (internal).
    pub fn is_internal(&self) -> bool {
        !matches!(self, StoreError::NotFound | StoreError::AlreadyExists)
    }

    /// True iff this is [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    /// True iff this is [`StoreError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict)
    }
}
