//! The catalogue's exhaustive error taxonomy (spec.md §7).
//!
//! Every service and storage operation returns `Result<_, CatalogError>`.
//! Storage-layer errors (Diesel, pool) are translated into one of these
//! variants at the `catalogd-storage` boundary (see
//! `catalogd_storage::postgres::translate_diesel_error`) so no
//! dialect-specific error type leaks past it.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    /// A selector resolved to nothing (spec.md §7 "MissingItem").
    #[error("missing item: {0}")]
    MissingItem(String),

    /// Identity or preallocation collision (spec.md §7 "DuplicateItem").
    #[error("duplicate item: {0}")]
    DuplicateItem(String),

    /// Type at rest disagrees with the type requested (spec.md §7
    /// "WrongItemType").
    #[error("wrong item type: expected {expected}, found {found} for {item}")]
    WrongItemType { item: String, expected: String, found: String },

    /// Lost the race for the next version/tag number (spec.md §7
    /// "VersionConflict").
    #[error("version conflict: {0}")]
    VersionConflict(String),

    /// Malformed request (spec.md §7 "InputValidation").
    #[error("invalid input: {0}")]
    InputValidation(String),

    /// The external validator rejected a version increment (spec.md §7
    /// "VersionValidation").
    #[error("version validation failed: {0}")]
    VersionValidation(String),

    /// Deadlock or serialisation failure; retried internally up to the
    /// configured cap before being surfaced (spec.md §7
    /// "TransientStorage").
    #[error("transient storage error after retrying: {0}")]
    TransientStorage(String),

    /// Any other storage fault (spec.md §7 "PermanentStorage").
    #[error("storage error: {0}")]
    PermanentStorage(String),

    /// The request's deadline expired before completion (spec.md §7
    /// "DeadlineExceeded").
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// An invariant was violated inside the service; surfaced opaquely
    /// (spec.md §7 "Internal").
    #[error("internal error")]
    Internal(String),

    /// Malformed or corrupted stored data, e.g. numeric coercion across
    /// attribute types (spec.md §4.1, C1 type codec).
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

impl CatalogError {
    /// The taxonomy code name used in the wire error shape (spec.md §6
    /// "Error wire shape": "Errors carry a code from the taxonomy").
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::MissingItem(_) => "MISSING_ITEM",
            CatalogError::DuplicateItem(_) => "DUPLICATE_ITEM",
            CatalogError::WrongItemType { .. } => "WRONG_ITEM_TYPE",
            CatalogError::VersionConflict(_) => "VERSION_CONFLICT",
            CatalogError::InputValidation(_) => "INPUT_VALIDATION",
            CatalogError::VersionValidation(_) => "VERSION_VALIDATION",
            CatalogError::TransientStorage(_) => "TRANSIENT_STORAGE",
            CatalogError::PermanentStorage(_) => "PERMANENT_STORAGE",
            CatalogError::DeadlineExceeded => "DEADLINE_EXCEEDED",
            CatalogError::Internal(_) => "INTERNAL",
            CatalogError::DataCorruption(_) => "DATA_CORRUPTION",
        }
    }

    /// Whether the DAL should retry this error internally rather than
    /// surface it immediately (spec.md §7 "Retry?" column).
    pub fn is_retryable(&self) -> bool {
        matches!(self, CatalogError::TransientStorage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_storage_is_retryable() {
        assert!(CatalogError::TransientStorage("deadlock".into()).is_retryable());
        assert!(!CatalogError::PermanentStorage("disk full".into()).is_retryable());
        assert!(!CatalogError::MissingItem("x".into()).is_retryable());
    }

    #[test]
    fn codes_match_taxonomy_names() {
        assert_eq!(CatalogError::DeadlineExceeded.code(), "DEADLINE_EXCEEDED");
        assert_eq!(CatalogError::VersionConflict("v".into()).code(), "VERSION_CONFLICT");
    }
}
