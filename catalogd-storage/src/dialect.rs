//! Dialect adapter seam (spec.md §4.3 "Dialect adapter": "storage-engine
//! specifics live behind a narrow adapter trait; only one implementation
//! ships, but the DAL itself never assumes Postgres directly").
//!
//! Grounded on the teacher's `StorageGateway` trait in
//! `tycho-storage/src/postgres/mod.rs`, which already separates the
//! connection-pool/transaction plumbing from the SQL the gateway issues;
//! this narrows that seam to exactly the handful of operations that differ
//! across engines (placeholder style is fixed by using `diesel::sql_query`
//! uniformly, so what's left is upsert/locking idiom and time-source).

use async_trait::async_trait;
use catalogd_core::CatalogError;
use diesel_async::AsyncPgConnection;

/// Operations whose SQL varies by storage engine. Only [`PostgresAdapter`]
/// is implemented; the trait exists so a second engine can be added without
/// touching `gateway.rs`'s control flow.
#[async_trait]
pub trait DialectAdapter: Send + Sync {
    /// Returns the engine's current transaction timestamp, used to stamp
    /// `object_timestamp`/`tag_timestamp` server-side so clock skew between
    /// application nodes can never violate I6 (timestamp monotonicity).
    async fn now(&self, conn: &mut AsyncPgConnection) -> Result<chrono::NaiveDateTime, CatalogError>;

    /// Acquires an advisory lock scoped to `key` for the duration of the
    /// current transaction, used by `gateway::preallocate_object_ids` to
    /// serialise preallocation against concurrent `saveNewObjects` calls for
    /// the same tenant without taking a table-level lock.
    async fn advisory_lock(&self, conn: &mut AsyncPgConnection, key: i64) -> Result<(), CatalogError>;
}

pub struct PostgresAdapter;

#[async_trait]
impl DialectAdapter for PostgresAdapter {
    async fn now(&self, conn: &mut AsyncPgConnection) -> Result<chrono::NaiveDateTime, CatalogError> {
        use diesel::sql_types::Timestamp;
        use diesel_async::RunQueryDsl;

        #[derive(diesel::QueryableByName)]
        struct Now {
            #[diesel(sql_type = Timestamp)]
            now: chrono::NaiveDateTime,
        }

        let row: Now = diesel::sql_query("SELECT (NOW() AT TIME ZONE 'UTC') AS now")
            .get_result(conn)
            .await
            .map_err(|e| crate::error::translate_diesel_error(e, "", ""))?;
        Ok(row.now)
    }

    async fn advisory_lock(&self, conn: &mut AsyncPgConnection, key: i64) -> Result<(), CatalogError> {
        use diesel_async::RunQueryDsl;

        diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
            .bind::<diesel::sql_types::BigInt, _>(key)
            .execute(conn)
            .await
            .map_err(|e| crate::error::translate_diesel_error(e, "", ""))?;
        Ok(())
    }
}
