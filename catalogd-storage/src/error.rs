//! Translates Diesel/pool errors into the catalogue's error taxonomy
//! (spec.md §7 "Propagation policy": "DAL adapters translate engine-specific
//! codes into the taxonomy").
//!
//! Grounded on the teacher's `PostgresError` newtype and
//! `storage_error_from_diesel` classifier in
//! `tycho-storage/src/postgres/mod.rs`, generalized from the teacher's
//! three-way split (`DuplicateEntry`/`NotFound`/`Unexpected`) to the full
//! taxonomy, and extended to recognise serialisation failures as retryable.

use catalogd_core::CatalogError;

/// Newtype so `From<diesel::result::Error>` can be implemented locally
/// without orphan-rule conflicts, mirroring the teacher's `PostgresError`.
pub struct PostgresError(pub CatalogError);

impl From<PostgresError> for CatalogError {
    fn from(value: PostgresError) -> Self {
        value.0
    }
}

impl From<CatalogError> for PostgresError {
    fn from(value: CatalogError) -> Self {
        PostgresError(value)
    }
}

impl From<diesel::result::Error> for PostgresError {
    fn from(value: diesel::result::Error) -> Self {
        PostgresError(translate_diesel_error(value, "", ""))
    }
}

/// Classifies a Diesel error into the taxonomy. `entity`/`id` are used to
/// build a readable message; pass `""` when not applicable.
pub fn translate_diesel_error(err: diesel::result::Error, entity: &str, id: &str) -> CatalogError {
    use diesel::result::{DatabaseErrorKind, Error};

    match err {
        Error::DatabaseError(DatabaseErrorKind::UniqueViolation, details) => {
            CatalogError::DuplicateItem(format!(
                "{entity} {id}: {}",
                details.message()
            ))
        }
        Error::DatabaseError(DatabaseErrorKind::SerializationFailure, details) => {
            CatalogError::TransientStorage(details.message().to_string())
        }
        Error::DatabaseError(DatabaseErrorKind::ReadOnlyTransaction, details) => {
            CatalogError::TransientStorage(details.message().to_string())
        }
        Error::NotFound => CatalogError::MissingItem(format!("{entity} {id}")),
        Error::DatabaseError(_, details) => {
            CatalogError::PermanentStorage(details.message().to_string())
        }
        other => CatalogError::PermanentStorage(other.to_string()),
    }
}

/// Diesel's driver reports deadlocks/serialisation failures through
/// `DatabaseErrorKind`, but connection-pool exhaustion and timeouts surface
/// through `deadpool`'s own error type; both map to the same
/// retry-or-surface decision the DAL makes (spec.md §4.3 "Failure
/// semantics").
pub fn translate_pool_error<E: std::fmt::Display>(
    err: diesel_async::pooled_connection::deadpool::PoolError<E>,
) -> CatalogError {
    use diesel_async::pooled_connection::deadpool::PoolError;
    match err {
        PoolError::Timeout(_) => CatalogError::DeadlineExceeded,
        other => CatalogError::TransientStorage(other.to_string()),
    }
}
