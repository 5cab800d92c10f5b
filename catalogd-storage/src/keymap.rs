//! C2 key mapper: resolves a batch of `(type, uuid, [version], [tag_version])`
//! requests to surrogate keys in one round trip, using the transaction-scoped
//! `key_mapping` scratch table (spec.md §4.2).
//!
//! Grounded on the teacher's `ids_by_hash` batch-lookup pattern in
//! `tycho-storage/src/postgres/orm.rs` (load the natural keys, bulk-fetch,
//! zip back into caller order), generalised from a flat `IN (...)` fetch to
//! a staged scratch-table join because the lookup here spans three
//! dependent tables (`object` → `object_definition` → `tag`) and must
//! preserve positional ordering across a miss.

use catalogd_core::{model::ObjectType, CatalogError};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::{
    error::translate_diesel_error,
    orm::{NewKeyMappingRow, ObjectTypeDb},
    schema::key_mapping,
};

/// A single key-lookup request. `version`/`tag_version` of `None` mean
/// "resolve the object/tag identity only" (used by callers that only need
/// `object_pk`, e.g. `saveNewVersions`).
#[derive(Debug, Clone)]
pub struct KeyRequest {
    pub object_type: ObjectType,
    pub object_id: Uuid,
    pub version: Option<i64>,
    pub tag_version: Option<i64>,
}

/// Resolution outcome for one request, preserving the request's ordinal
/// position (invariant: output is the same length as input, in the same
/// order, per spec.md §4.2 "Batch semantics").
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    pub object_pk: i64,
    pub object_type: ObjectType,
    pub version_pk: Option<i64>,
    pub tag_pk: Option<i64>,
}

/// Bulk-resolves `requests` against `tenant_pk`, returning one [`ResolvedKey`]
/// per request in the same order, or the first [`CatalogError::MissingItem`]
/// / [`CatalogError::WrongItemType`] encountered.
///
/// Must run inside the caller's transaction: the scratch rows are written,
/// joined against, and left for the transaction to discard (no explicit
/// cleanup — `key_mapping` has no foreign keys and a fresh `txn_token` is
/// used per call, so concurrent callers never collide).
pub async fn resolve_keys(
    conn: &mut AsyncPgConnection,
    tenant_pk: i64,
    requests: &[KeyRequest],
) -> Result<Vec<ResolvedKey>, CatalogError> {
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    let txn_token = Uuid::new_v4();
    let scratch_rows: Vec<NewKeyMappingRow> = requests
        .iter()
        .enumerate()
        .map(|(ordinal, req)| {
            let (hi, lo) = catalogd_types::uuid_codec::to_hi_lo(req.object_id);
            NewKeyMappingRow {
                txn_token,
                ordinal: ordinal as i32,
                req_object_type: ObjectTypeDb::from(req.object_type),
                req_id_hi: hi,
                req_id_lo: lo,
                req_object_version: req.version,
                req_tag_version: req.tag_version,
            }
        })
        .collect();

    diesel::insert_into(key_mapping::table)
        .values(&scratch_rows)
        .execute(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "key_mapping", &txn_token.to_string()))?;

    // Stage 1: resolve object identity + declared type, scoped to the
    // tenant so cross-tenant collisions on (type, uuid) can never resolve.
    diesel::sql_query(
        "UPDATE key_mapping km
         SET resolved_object_pk = o.object_pk, resolved_object_type = o.object_type
         FROM object o
         WHERE km.txn_token = $1
           AND o.tenant_pk = $2
           AND o.object_id_hi = km.req_id_hi
           AND o.object_id_lo = km.req_id_lo",
    )
    .bind::<diesel::sql_types::Uuid, _>(txn_token)
    .bind::<diesel::sql_types::BigInt, _>(tenant_pk)
    .execute(conn)
    .await
    .map_err(|e| translate_diesel_error(e, "object", ""))?;

    // Stage 2: resolve the requested version (explicit or latest).
    diesel::sql_query(
        "UPDATE key_mapping km
         SET resolved_version_pk = d.version_pk
         FROM object_definition d
         WHERE km.txn_token = $1
           AND km.req_object_version IS NOT NULL
           AND d.object_pk = km.resolved_object_pk
           AND d.object_version = km.req_object_version",
    )
    .bind::<diesel::sql_types::Uuid, _>(txn_token)
    .execute(conn)
    .await
    .map_err(|e| translate_diesel_error(e, "object_definition", ""))?;

    diesel::sql_query(
        "UPDATE key_mapping km
         SET resolved_version_pk = lv.version_pk
         FROM latest_version lv
         WHERE km.txn_token = $1
           AND km.req_object_version IS NULL
           AND lv.object_pk = km.resolved_object_pk",
    )
    .bind::<diesel::sql_types::Uuid, _>(txn_token)
    .execute(conn)
    .await
    .map_err(|e| translate_diesel_error(e, "latest_version", ""))?;

    // Stage 3: resolve the requested tag (explicit or latest), only for
    // requests that asked for one.
    diesel::sql_query(
        "UPDATE key_mapping km
         SET resolved_tag_pk = t.tag_pk
         FROM tag t
         WHERE km.txn_token = $1
           AND km.req_tag_version IS NOT NULL
           AND t.version_pk = km.resolved_version_pk
           AND t.tag_version = km.req_tag_version",
    )
    .bind::<diesel::sql_types::Uuid, _>(txn_token)
    .execute(conn)
    .await
    .map_err(|e| translate_diesel_error(e, "tag", ""))?;

    diesel::sql_query(
        "UPDATE key_mapping km
         SET resolved_tag_pk = lt.tag_pk
         FROM latest_tag lt
         WHERE km.txn_token = $1
           AND km.req_tag_version IS NULL
           AND lt.version_pk = km.resolved_version_pk",
    )
    .bind::<diesel::sql_types::Uuid, _>(txn_token)
    .execute(conn)
    .await
    .map_err(|e| translate_diesel_error(e, "latest_tag", ""))?;

    let rows: Vec<crate::orm::ResolvedKeyRow> = diesel::sql_query(
        "SELECT ordinal, resolved_object_pk, resolved_version_pk, resolved_tag_pk, resolved_object_type
         FROM key_mapping
         WHERE txn_token = $1
         ORDER BY ordinal ASC",
    )
    .bind::<diesel::sql_types::Uuid, _>(txn_token)
    .load(conn)
    .await
    .map_err(|e| translate_diesel_error(e, "key_mapping", ""))?;

    let mut out = Vec::with_capacity(requests.len());
    for (req, row) in requests.iter().zip(rows.into_iter()) {
        let object_pk = row.resolved_object_pk.ok_or_else(|| {
            CatalogError::MissingItem(format!(
                "{} {}",
                req.object_type, req.object_id
            ))
        })?;
        let actual_type: ObjectType = row
            .resolved_object_type
            .expect("resolved_object_type set whenever resolved_object_pk is")
            .into();
        if actual_type != req.object_type {
            return Err(CatalogError::WrongItemType {
                item: req.object_id.to_string(),
                expected: req.object_type.to_string(),
                found: actual_type.to_string(),
            });
        }
        if req.version.is_some() && row.resolved_version_pk.is_none() {
            return Err(CatalogError::MissingItem(format!(
                "{} {} version {}",
                req.object_type,
                req.object_id,
                req.version.unwrap()
            )));
        }
        if req.tag_version.is_some() && row.resolved_tag_pk.is_none() {
            return Err(CatalogError::MissingItem(format!(
                "{} {} tag {}",
                req.object_type,
                req.object_id,
                req.tag_version.unwrap()
            )));
        }
        out.push(ResolvedKey {
            object_pk,
            object_type: actual_type,
            version_pk: row.resolved_version_pk,
            tag_pk: row.resolved_tag_pk,
        });
    }

    Ok(out)
}
