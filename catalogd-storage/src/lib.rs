//! Postgres-backed relational DAL for the metadata catalogue (spec.md §4.2,
//! C2/C3/C7). `catalogd-service` is the only intended caller; everything
//! here speaks in surrogate keys and `catalogd_core` domain types, never in
//! wire types.

pub mod dialect;
pub mod error;
pub mod gateway;
pub mod keymap;
pub mod orm;
pub mod retry;
pub mod schema;
pub mod search;
pub mod versioning;

pub use gateway::{
    NewObjectRequest, NewObjectResult, NewTagRequest, NewVersionRequest, PostgresGateway,
    PreallocatedObjectRequest,
};

const MIGRATIONS: diesel_migrations::EmbeddedMigrations = diesel_migrations::embed_migrations!("migrations");

/// Runs all pending migrations against `database_url`. Called once at
/// startup by `catalogd-service`'s `main`, mirroring the teacher's
/// `run_migrations` in `tycho-storage/src/postgres/mod.rs`.
pub fn run_migrations(database_url: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use diesel::Connection;
    use diesel_migrations::MigrationHarness;

    let mut conn = diesel::pg::PgConnection::establish(database_url)?;
    conn.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;
