//! Latest-marker maintenance (invariant I5: "for every object, `latest_version`
//! points at the highest `object_version`; for every version, `latest_tag`
//! points at the highest `tag_version`").
//!
//! Grounded on the teacher's optimistic-concurrency pattern in
//! `tycho-storage/src/postgres/versioning.rs` (conditional `UPDATE ... WHERE`
//! clause, zero rows affected means a concurrent writer won the race),
//! generalized from the teacher's single `valid_to` column to the two
//! independent markers this catalogue keeps.

use catalogd_core::CatalogError;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::{
    error::translate_diesel_error,
    schema::{latest_tag, latest_version},
};

/// Inserts the `latest_version` row for a brand-new object. Must run in the
/// same transaction as the object's first `object_definition` insert;
/// relies on the `object_pk` primary key to reject a concurrent duplicate
/// insert (I1: object identity is unique).
pub async fn init_latest_version(
    conn: &mut AsyncPgConnection,
    object_pk: i64,
    version_pk: i64,
) -> Result<(), CatalogError> {
    diesel::insert_into(latest_version::table)
        .values((
            latest_version::object_pk.eq(object_pk),
            latest_version::version_pk.eq(version_pk),
        ))
        .execute(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "latest_version", &object_pk.to_string()))?;
    Ok(())
}

/// Advances `latest_version` to `new_version_pk`, but only if the object's
/// current marker still points at `expected_prior_version_pk` — the
/// compare-and-swap that turns a lost race into a [`CatalogError::VersionConflict`]
/// instead of silently clobbering a concurrently-inserted version (I5, I6).
pub async fn advance_latest_version(
    conn: &mut AsyncPgConnection,
    object_pk: i64,
    expected_prior_version_pk: i64,
    new_version_pk: i64,
) -> Result<(), CatalogError> {
    let rows = diesel::update(
        latest_version::table
            .filter(latest_version::object_pk.eq(object_pk))
            .filter(latest_version::version_pk.eq(expected_prior_version_pk)),
    )
    .set(latest_version::version_pk.eq(new_version_pk))
    .execute(conn)
    .await
    .map_err(|e| translate_diesel_error(e, "latest_version", &object_pk.to_string()))?;

    if rows == 0 {
        return Err(CatalogError::VersionConflict(format!(
            "object {object_pk}: expected latest version_pk {expected_prior_version_pk}, lost race to a concurrent writer"
        )));
    }
    Ok(())
}

/// Inserts the `latest_tag` row for a version's first tag. Must run in the
/// same transaction as the tag's insert.
pub async fn init_latest_tag(
    conn: &mut AsyncPgConnection,
    version_pk: i64,
    tag_pk: i64,
) -> Result<(), CatalogError> {
    diesel::insert_into(latest_tag::table)
        .values((
            latest_tag::version_pk.eq(version_pk),
            latest_tag::tag_pk.eq(tag_pk),
        ))
        .execute(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "latest_tag", &version_pk.to_string()))?;
    Ok(())
}

/// Same compare-and-swap as [`advance_latest_version`], for the per-version
/// tag marker.
pub async fn advance_latest_tag(
    conn: &mut AsyncPgConnection,
    version_pk: i64,
    expected_prior_tag_pk: i64,
    new_tag_pk: i64,
) -> Result<(), CatalogError> {
    let rows = diesel::update(
        latest_tag::table
            .filter(latest_tag::version_pk.eq(version_pk))
            .filter(latest_tag::tag_pk.eq(expected_prior_tag_pk)),
    )
    .set(latest_tag::tag_pk.eq(new_tag_pk))
    .execute(conn)
    .await
    .map_err(|e| translate_diesel_error(e, "latest_tag", &version_pk.to_string()))?;

    if rows == 0 {
        return Err(CatalogError::VersionConflict(format!(
            "version {version_pk}: expected latest tag_pk {expected_prior_tag_pk}, lost race to a concurrent writer"
        )));
    }
    Ok(())
}
