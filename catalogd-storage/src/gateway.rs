//! The relational DAL (spec.md §4.2, C3): every write is all-or-nothing in
//! one transaction, every concurrency tie-break goes through a unique
//! constraint or a compare-and-swap marker update, and every transient
//! fault is retried internally before being surfaced.
//!
//! Grounded on the teacher's `PostgresGateway` in
//! `tycho-storage/src/postgres/mod.rs` (pool handle + `transaction(...)`
//! closure wrapping a unit of work, `StorageError` translation at the
//! boundary), generalized from the teacher's single append-only ledger to
//! the catalogue's three-tier object/version/tag write path.

use std::sync::Arc;

use catalogd_core::{
    model::{ObjectDefinition, ObjectType, Tag, TagAttributes, TagHeader},
    search::SearchParameters,
    selector::{TagSelector, VersionSpec},
    CatalogError,
};
use catalogd_types::{codec::AttrValue, uuid_codec};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager},
    scoped_futures::ScopedFutureExt,
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use uuid::Uuid;

use crate::{
    dialect::{DialectAdapter, PostgresAdapter},
    error::translate_diesel_error,
    keymap::{resolve_keys, KeyRequest},
    orm::{
        NewObject, NewObjectDefinitionRow, NewTagAttrRow, NewTagRow, Object, ObjectTypeDb,
        ObjectDefinitionRow, TagAttrRow, TagRow,
    },
    retry::with_retry,
    schema::{object, object_definition, tag},
    search as search_mod, versioning,
};

/// One freshly-assigned object awaiting its `latest_version`/`latest_tag`
/// markers, returned to the write service so it can build the `TagHeader`
/// it hands back to the caller.
#[derive(Debug, Clone)]
pub struct NewObjectResult {
    pub object_id: Uuid,
    pub object_type: ObjectType,
    pub object_version: i64,
    pub object_timestamp: DateTime<FixedOffset>,
    pub tag_version: i64,
    pub tag_timestamp: DateTime<FixedOffset>,
}

/// A single object-definition payload to be saved as a brand-new object
/// (spec.md §4.5, `saveNewObjects`).
pub struct NewObjectRequest {
    pub object_id: Uuid,
    pub definition: ObjectDefinition,
    pub attrs: TagAttributes,
}

/// A new version of an existing object (spec.md §4.5, `saveNewVersions`).
pub struct NewVersionRequest {
    pub object_id: Uuid,
    pub object_type: ObjectType,
    pub definition: ObjectDefinition,
    pub attrs: TagAttributes,
}

/// A new tag on an existing object version (spec.md §4.5, `saveNewTags`).
pub struct NewTagRequest {
    pub object_id: Uuid,
    pub object_type: ObjectType,
    /// `None` means "the current latest version".
    pub object_version: Option<i64>,
    pub attrs: TagAttributes,
}

/// A single preallocated-id claim (spec.md §4.5, `savePreallocatedObjects`).
pub struct PreallocatedObjectRequest {
    pub object_id: Uuid,
    pub definition: ObjectDefinition,
    pub attrs: TagAttributes,
}

pub struct PostgresGateway {
    pool: Pool<AsyncPgConnection>,
    dialect: Arc<dyn DialectAdapter>,
}

impl PostgresGateway {
    pub fn new(database_url: &str, max_pool_size: usize) -> Result<Self, CatalogError> {
        let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(config)
            .max_size(max_pool_size)
            .build()
            .map_err(|e| CatalogError::Internal(format!("failed to build connection pool: {e}")))?;
        Ok(Self { pool, dialect: Arc::new(PostgresAdapter) })
    }

    async fn conn(&self) -> Result<diesel_async::pooled_connection::deadpool::Object<AsyncPgConnection>, CatalogError> {
        self.pool.get().await.map_err(crate::error::translate_pool_error)
    }

    /// Resolves a tenant code to its surrogate key, used once per incoming
    /// request by the gRPC layer before dispatching to the rest of the
    /// gateway (every other method here takes `tenant_pk`, never the code).
    pub async fn tenant_pk(&self, tenant_code: &str) -> Result<i64, CatalogError> {
        let mut conn = self.conn().await?;
        crate::orm::Tenant::by_code(tenant_code, &mut conn)
            .await
            .map_err(|e| translate_diesel_error(e, "tenant", tenant_code))
            .map(|t| t.tenant_pk)
    }

    /// Saves a batch of brand-new objects in one transaction. All-or-nothing:
    /// any failure rolls back every object in the batch (spec.md §4.2
    /// "Batch atomicity").
    pub async fn save_new_objects(
        &self,
        tenant_pk: i64,
        requests: Vec<NewObjectRequest>,
    ) -> Result<Vec<NewObjectResult>, CatalogError> {
        with_retry(|| async {
            let mut conn = self.conn().await?;
            let dialect = self.dialect.clone();
            conn.transaction(|conn| {
                let requests = &requests;
                let dialect = dialect.clone();
                async move {
                    let mut out = Vec::with_capacity(requests.len());
                    for req in requests {
                        out.push(
                            save_one_new_object(conn, dialect.as_ref(), tenant_pk, req).await?,
                        );
                    }
                    Ok(out)
                }
                .scope_boxed()
            })
            .await
        })
        .await
    }

    /// Saves a batch of new versions of existing objects, in one transaction
    /// (spec.md §4.5 `saveNewVersions`). Version numbers are assigned
    /// server-side as `max(object_version) + 1`, made safe under concurrency
    /// by the compare-and-swap in `versioning::advance_latest_version` (I2,
    /// I5).
    pub async fn save_new_versions(
        &self,
        tenant_pk: i64,
        requests: Vec<NewVersionRequest>,
    ) -> Result<Vec<NewObjectResult>, CatalogError> {
        with_retry(|| async {
            let mut conn = self.conn().await?;
            let dialect = self.dialect.clone();
            conn.transaction(|conn| {
                let requests = &requests;
                let dialect = dialect.clone();
                async move {
                    let mut out = Vec::with_capacity(requests.len());
                    for req in requests {
                        out.push(
                            save_one_new_version(conn, dialect.as_ref(), tenant_pk, req).await?,
                        );
                    }
                    Ok(out)
                }
                .scope_boxed()
            })
            .await
        })
        .await
    }

    /// Saves a batch of new tags on existing object versions, in one
    /// transaction (spec.md §4.5 `saveNewTags`).
    pub async fn save_new_tags(
        &self,
        tenant_pk: i64,
        requests: Vec<NewTagRequest>,
    ) -> Result<Vec<NewObjectResult>, CatalogError> {
        with_retry(|| async {
            let mut conn = self.conn().await?;
            let dialect = self.dialect.clone();
            conn.transaction(|conn| {
                let requests = &requests;
                let dialect = dialect.clone();
                async move {
                    let mut out = Vec::with_capacity(requests.len());
                    for req in requests {
                        out.push(save_one_new_tag(conn, dialect.as_ref(), tenant_pk, req).await?);
                    }
                    Ok(out)
                }
                .scope_boxed()
            })
            .await
        })
        .await
    }

    /// Reserves `count` fresh object identities of `object_type` without a
    /// definition yet (spec.md §4.5 `preallocateObjectIds`). The returned
    /// ids have an `object` row but no `latest_version`/`latest_tag` marker
    /// until `save_preallocated_objects` claims them.
    pub async fn preallocate_object_ids(
        &self,
        tenant_pk: i64,
        object_type: ObjectType,
        count: usize,
    ) -> Result<Vec<Uuid>, CatalogError> {
        with_retry(|| async {
            let mut conn = self.conn().await?;
            conn.transaction(|conn| {
                async move {
                    let mut ids = Vec::with_capacity(count);
                    for _ in 0..count {
                        let id = Uuid::new_v4();
                        let (hi, lo) = uuid_codec::to_hi_lo(id);
                        diesel::insert_into(object::table)
                            .values(NewObject {
                                tenant_pk,
                                object_type: ObjectTypeDb::from(object_type),
                                object_id_hi: hi,
                                object_id_lo: lo,
                            })
                            .execute(conn)
                            .await
                            .map_err(|e| translate_diesel_error(e, "object", &id.to_string()))?;
                        ids.push(id);
                    }
                    Ok(ids)
                }
                .scope_boxed()
            })
            .await
        })
        .await
    }

    /// Claims a batch of previously preallocated ids with their first
    /// definition (spec.md §4.5 `savePreallocatedObjects`). Rejects an id
    /// that already has a version with [`CatalogError::DuplicateItem`] (I1).
    pub async fn save_preallocated_objects(
        &self,
        tenant_pk: i64,
        requests: Vec<PreallocatedObjectRequest>,
    ) -> Result<Vec<NewObjectResult>, CatalogError> {
        with_retry(|| async {
            let mut conn = self.conn().await?;
            let dialect = self.dialect.clone();
            conn.transaction(|conn| {
                let requests = &requests;
                let dialect = dialect.clone();
                async move {
                    let mut out = Vec::with_capacity(requests.len());
                    for req in requests {
                        out.push(
                            save_one_preallocated_object(conn, dialect.as_ref(), tenant_pk, req)
                                .await?,
                        );
                    }
                    Ok(out)
                }
                .scope_boxed()
            })
            .await
        })
        .await
    }

    /// Resolves and loads a batch of tags (spec.md §4.6, C6). Positionally
    /// aligned with `selectors`; a miss on any one fails the whole call.
    pub async fn load_tags(&self, tenant_pk: i64, selectors: &[TagSelector]) -> Result<Vec<Tag>, CatalogError> {
        let mut conn = self.conn().await?;
        let mut out = Vec::with_capacity(selectors.len());
        for sel in selectors {
            out.push(load_one_tag(&mut conn, tenant_pk, sel).await?);
        }
        Ok(out)
    }

    /// Runs a search (spec.md §4.7, C7) and hydrates each matching tag's
    /// attributes.
    pub async fn search(&self, tenant_pk: i64, params: &SearchParameters) -> Result<Vec<Tag>, CatalogError> {
        let mut conn = self.conn().await?;
        let rows = search_mod::search(&mut conn, tenant_pk, params).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let attr_rows = TagAttrRow::by_tag(row.tag_pk, &mut conn)
                .await
                .map_err(|e| translate_diesel_error(e, "tag_attr", &row.tag_pk.to_string()))?;
            out.push(Tag {
                header: TagHeader {
                    object_type: row.object_type.into(),
                    object_id: uuid_codec::from_hi_lo(row.object_id_hi, row.object_id_lo),
                    object_version: row.object_version,
                    object_timestamp: to_fixed_offset(row.object_timestamp, row.object_timestamp_offset_seconds),
                    tag_version: row.tag_version,
                    tag_timestamp: to_fixed_offset(row.tag_timestamp, row.tag_timestamp_offset_seconds),
                },
                definition: ObjectDefinition { object_type: row.object_type.into(), payload: Vec::new() },
                attrs: rows_to_attrs(attr_rows),
            });
        }
        Ok(out)
    }
}

async fn save_one_new_object(
    conn: &mut AsyncPgConnection,
    dialect: &dyn DialectAdapter,
    tenant_pk: i64,
    req: &NewObjectRequest,
) -> Result<NewObjectResult, CatalogError> {
    let (hi, lo) = uuid_codec::to_hi_lo(req.object_id);
    diesel::insert_into(object::table)
        .values(NewObject {
            tenant_pk,
            object_type: ObjectTypeDb::from(req.definition.object_type),
            object_id_hi: hi,
            object_id_lo: lo,
        })
        .execute(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "object", &req.object_id.to_string()))?;

    let object_pk: i64 = object::table
        .filter(object::tenant_pk.eq(tenant_pk))
        .filter(object::object_id_hi.eq(hi))
        .filter(object::object_id_lo.eq(lo))
        .select(object::object_pk)
        .first(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "object", &req.object_id.to_string()))?;

    let now = dialect.now(conn).await?;
    insert_first_version_and_tag(conn, object_pk, req.definition.object_type, &req.definition.payload, &req.attrs, now, req.object_id)
        .await
}

async fn save_one_preallocated_object(
    conn: &mut AsyncPgConnection,
    dialect: &dyn DialectAdapter,
    tenant_pk: i64,
    req: &PreallocatedObjectRequest,
) -> Result<NewObjectResult, CatalogError> {
    let resolved = resolve_keys(
        conn,
        tenant_pk,
        &[KeyRequest {
            object_type: req.definition.object_type,
            object_id: req.object_id,
            version: None,
            tag_version: None,
        }],
    )
    .await;

    // A preallocated object has no version yet, so the "latest version"
    // lookup in `resolve_keys` is expected to come back empty; any other
    // outcome (found, or identity itself missing/wrong type) is an error.
    let object_pk = match resolved {
        Err(CatalogError::MissingItem(_)) => {
            return Err(CatalogError::MissingItem(format!(
                "no preallocated id {}",
                req.object_id
            )))
        }
        Err(other) => return Err(other),
        Ok(keys) if keys[0].version_pk.is_some() => {
            return Err(CatalogError::DuplicateItem(format!(
                "{} already has a saved version",
                req.object_id
            )))
        }
        Ok(keys) => keys[0].object_pk,
    };

    let now = dialect.now(conn).await?;
    insert_first_version_and_tag(
        conn,
        object_pk,
        req.definition.object_type,
        &req.definition.payload,
        &req.attrs,
        now,
        req.object_id,
    )
    .await
}

async fn insert_first_version_and_tag(
    conn: &mut AsyncPgConnection,
    object_pk: i64,
    object_type: ObjectType,
    payload: &[u8],
    attrs: &TagAttributes,
    now: NaiveDateTime,
    object_id: Uuid,
) -> Result<NewObjectResult, CatalogError> {
    diesel::insert_into(object_definition::table)
        .values(NewObjectDefinitionRow {
            object_pk,
            object_version: 1,
            object_timestamp: now,
            object_timestamp_offset_seconds: 0,
            payload: payload.to_vec(),
        })
        .execute(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "object_definition", &object_id.to_string()))?;

    let version_pk: i64 = object_definition::table
        .filter(object_definition::object_pk.eq(object_pk))
        .filter(object_definition::object_version.eq(1))
        .select(object_definition::version_pk)
        .first(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "object_definition", &object_id.to_string()))?;

    versioning::init_latest_version(conn, object_pk, version_pk).await?;

    let tag_pk = insert_tag(conn, version_pk, attrs, now).await?;
    versioning::init_latest_tag(conn, version_pk, tag_pk).await?;

    Ok(NewObjectResult {
        object_id,
        object_type,
        object_version: 1,
        object_timestamp: to_fixed_offset(now, 0),
        tag_version: 1,
        tag_timestamp: to_fixed_offset(now, 0),
    })
}

async fn save_one_new_version(
    conn: &mut AsyncPgConnection,
    dialect: &dyn DialectAdapter,
    tenant_pk: i64,
    req: &NewVersionRequest,
) -> Result<NewObjectResult, CatalogError> {
    let resolved = resolve_keys(
        conn,
        tenant_pk,
        &[KeyRequest {
            object_type: req.object_type,
            object_id: req.object_id,
            version: None,
            tag_version: None,
        }],
    )
    .await?;
    let prior = &resolved[0];
    let prior_version_pk = prior
        .version_pk
        .ok_or_else(|| CatalogError::MissingItem(format!("{} has no versions yet", req.object_id)))?;

    let prior_version_num = ObjectDefinitionRow::max_version(prior.object_pk, conn)
        .await
        .map_err(|e| translate_diesel_error(e, "object_definition", &req.object_id.to_string()))?
        .unwrap_or(0);

    let new_version_num = prior_version_num + 1;
    let now = dialect.now(conn).await?;

    diesel::insert_into(object_definition::table)
        .values(NewObjectDefinitionRow {
            object_pk: prior.object_pk,
            object_version: new_version_num,
            object_timestamp: now,
            object_timestamp_offset_seconds: 0,
            payload: req.definition.payload.clone(),
        })
        .execute(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "object_definition", &req.object_id.to_string()))?;

    let version_pk: i64 = object_definition::table
        .filter(object_definition::object_pk.eq(prior.object_pk))
        .filter(object_definition::object_version.eq(new_version_num))
        .select(object_definition::version_pk)
        .first(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "object_definition", &req.object_id.to_string()))?;

    versioning::advance_latest_version(conn, prior.object_pk, prior_version_pk, version_pk).await?;

    let tag_pk = insert_tag(conn, version_pk, &req.attrs, now).await?;
    versioning::init_latest_tag(conn, version_pk, tag_pk).await?;

    Ok(NewObjectResult {
        object_id: req.object_id,
        object_type: req.object_type,
        object_version: new_version_num,
        object_timestamp: to_fixed_offset(now, 0),
        tag_version: 1,
        tag_timestamp: to_fixed_offset(now, 0),
    })
}

async fn save_one_new_tag(
    conn: &mut AsyncPgConnection,
    dialect: &dyn DialectAdapter,
    tenant_pk: i64,
    req: &NewTagRequest,
) -> Result<NewObjectResult, CatalogError> {
    let resolved = resolve_keys(
        conn,
        tenant_pk,
        &[KeyRequest {
            object_type: req.object_type,
            object_id: req.object_id,
            version: req.object_version,
            tag_version: None,
        }],
    )
    .await?;
    let resolved = &resolved[0];
    let version_pk = resolved
        .version_pk
        .ok_or_else(|| CatalogError::MissingItem(format!("{} has no matching version", req.object_id)))?;
    let prior_tag_pk = resolved
        .tag_pk
        .ok_or_else(|| CatalogError::MissingItem(format!("{} version has no tags yet", req.object_id)))?;

    let prior_tag_version = TagRow::max_tag_version(version_pk, conn)
        .await
        .map_err(|e| translate_diesel_error(e, "tag", &req.object_id.to_string()))?
        .unwrap_or(0);
    let new_tag_version = prior_tag_version + 1;

    let now = dialect.now(conn).await?;
    diesel::insert_into(tag::table)
        .values(NewTagRow {
            version_pk,
            tag_version: new_tag_version,
            tag_timestamp: now,
            tag_timestamp_offset_seconds: 0,
        })
        .execute(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "tag", &req.object_id.to_string()))?;

    let tag_pk: i64 = tag::table
        .filter(tag::version_pk.eq(version_pk))
        .filter(tag::tag_version.eq(new_tag_version))
        .select(tag::tag_pk)
        .first(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "tag", &req.object_id.to_string()))?;

    insert_tag_attrs(conn, tag_pk, tenant_pk, &req.attrs).await?;
    versioning::advance_latest_tag(conn, version_pk, prior_tag_pk, tag_pk).await?;

    let object_version: i64 = object_definition::table
        .filter(object_definition::version_pk.eq(version_pk))
        .select(object_definition::object_version)
        .first(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "object_definition", &req.object_id.to_string()))?;

    Ok(NewObjectResult {
        object_id: req.object_id,
        object_type: req.object_type,
        object_version,
        object_timestamp: to_fixed_offset(now, 0),
        tag_version: new_tag_version,
        tag_timestamp: to_fixed_offset(now, 0),
    })
}

async fn insert_tag(
    conn: &mut AsyncPgConnection,
    version_pk: i64,
    attrs: &TagAttributes,
    now: NaiveDateTime,
) -> Result<i64, CatalogError> {
    diesel::insert_into(tag::table)
        .values(NewTagRow {
            version_pk,
            tag_version: 1,
            tag_timestamp: now,
            tag_timestamp_offset_seconds: 0,
        })
        .execute(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "tag", &version_pk.to_string()))?;

    let tag_pk: i64 = tag::table
        .filter(tag::version_pk.eq(version_pk))
        .filter(tag::tag_version.eq(1))
        .select(tag::tag_pk)
        .first(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "tag", &version_pk.to_string()))?;

    let tenant_pk = object::table
        .inner_join(object_definition::table.on(object_definition::object_pk.eq(object::object_pk)))
        .filter(object_definition::version_pk.eq(version_pk))
        .select(object::tenant_pk)
        .first(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "object", &version_pk.to_string()))?;

    insert_tag_attrs(conn, tag_pk, tenant_pk, attrs).await?;
    Ok(tag_pk)
}

async fn insert_tag_attrs(
    conn: &mut AsyncPgConnection,
    tag_pk: i64,
    tenant_pk: i64,
    attrs: &TagAttributes,
) -> Result<(), CatalogError> {
    let mut rows = Vec::new();
    for (name, value) in attrs {
        let attr_type = crate::orm::AttrTypeDb::from(
            value
                .type_name()
                .parse::<catalogd_core::search::AttrType>()
                .map_err(|_| CatalogError::DataCorruption(format!("unrecognised attribute type for {name}")))?,
        );
        match value {
            AttrValue::Scalar(v) => rows.push(scalar_row(tag_pk, tenant_pk, name, attr_type, None, v)),
            AttrValue::Array(items) => {
                for (i, v) in items.iter().enumerate() {
                    rows.push(scalar_row(tag_pk, tenant_pk, name, attr_type, Some(i as i32), v));
                }
            }
        }
    }
    if rows.is_empty() {
        return Ok(());
    }
    diesel::insert_into(crate::schema::tag_attr::table)
        .values(&rows)
        .execute(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "tag_attr", &tag_pk.to_string()))?;
    Ok(())
}

fn scalar_row(
    tag_pk: i64,
    tenant_pk: i64,
    name: &str,
    attr_type: crate::orm::AttrTypeDb,
    attr_index: Option<i32>,
    value: &catalogd_types::codec::PrimitiveValue,
) -> NewTagAttrRow {
    use catalogd_types::codec::PrimitiveValue;
    let mut row = NewTagAttrRow {
        tag_pk,
        tenant_pk,
        attr_name: name.to_string(),
        attr_index,
        attr_type,
        v_bool: None,
        v_int: None,
        v_float: None,
        v_decimal: None,
        v_str: None,
        v_date: None,
        v_datetime: None,
        v_datetime_offset_seconds: None,
    };
    match value {
        PrimitiveValue::Bool(b) => row.v_bool = Some(*b),
        PrimitiveValue::Int(i) => row.v_int = Some(*i),
        PrimitiveValue::Float(f) => row.v_float = Some(*f),
        PrimitiveValue::Decimal(d) => row.v_decimal = Some(d.clone()),
        PrimitiveValue::Str(s) => row.v_str = Some(s.clone()),
        PrimitiveValue::Date(d) => row.v_date = Some(*d),
        PrimitiveValue::DateTime(dt) => {
            row.v_datetime = Some(dt.naive_utc());
            row.v_datetime_offset_seconds = Some(dt.offset().local_minus_utc());
        }
    }
    row
}

fn rows_to_attrs(rows: Vec<TagAttrRow>) -> TagAttributes {
    use catalogd_types::codec::PrimitiveValue;
    use itertools::Itertools;

    let mut out = TagAttributes::new();
    for (name, group) in &rows.into_iter().group_by(|r| r.attr_name.clone()) {
        let mut group: Vec<TagAttrRow> = group.collect();
        group.sort_by_key(|r| r.attr_index.unwrap_or(0));
        let values: Vec<PrimitiveValue> = group.iter().map(row_to_primitive).collect();
        if group.len() == 1 && group[0].attr_index.is_none() {
            out.insert(name, AttrValue::Scalar(values.into_iter().next().unwrap()));
        } else {
            out.insert(name, AttrValue::Array(values));
        }
    }
    out
}

fn row_to_primitive(row: &TagAttrRow) -> catalogd_types::codec::PrimitiveValue {
    use catalogd_types::codec::PrimitiveValue;
    use catalogd_core::search::AttrType;

    match row.attr_type.into() {
        AttrType::Boolean => PrimitiveValue::Bool(row.v_bool.expect("BOOLEAN row carries v_bool")),
        AttrType::Integer => PrimitiveValue::Int(row.v_int.expect("INTEGER row carries v_int")),
        AttrType::Float => PrimitiveValue::Float(row.v_float.expect("FLOAT row carries v_float")),
        AttrType::Decimal => PrimitiveValue::Decimal(row.v_decimal.clone().expect("DECIMAL row carries v_decimal")),
        AttrType::String => PrimitiveValue::Str(row.v_str.clone().expect("STRING row carries v_str")),
        AttrType::Date => PrimitiveValue::Date(row.v_date.expect("DATE row carries v_date")),
        AttrType::Datetime => PrimitiveValue::DateTime(to_fixed_offset(
            row.v_datetime.expect("DATETIME row carries v_datetime"),
            row.v_datetime_offset_seconds.expect("DATETIME row carries v_datetime_offset_seconds"),
        )),
    }
}

async fn load_one_tag(
    conn: &mut AsyncPgConnection,
    tenant_pk: i64,
    sel: &TagSelector,
) -> Result<Tag, CatalogError> {
    let object_pk = crate::orm::Object::by_external_id(tenant_pk, sel.object_id, conn)
        .await
        .map_err(|e| translate_diesel_error(e, "object", &sel.object_id.to_string()))?
        .ok_or_else(|| CatalogError::MissingItem(sel.object_id.to_string()))?;

    if object_pk.object_type != ObjectTypeDb::from(sel.object_type) {
        return Err(CatalogError::WrongItemType {
            item: sel.object_id.to_string(),
            expected: sel.object_type.to_string(),
            found: catalogd_core::ObjectType::from(object_pk.object_type).to_string(),
        });
    }

    let version_row = resolve_version_spec(conn, object_pk.object_pk, &sel.version).await?;
    let tag_row = resolve_tag_spec(conn, version_row.version_pk, &sel.tag_version).await?;
    let attrs = TagAttrRow::by_tag(tag_row.tag_pk, conn)
        .await
        .map_err(|e| translate_diesel_error(e, "tag_attr", &tag_row.tag_pk.to_string()))?;

    Ok(Tag {
        header: TagHeader {
            object_type: sel.object_type,
            object_id: sel.object_id,
            object_version: version_row.object_version,
            object_timestamp: to_fixed_offset(version_row.object_timestamp, version_row.object_timestamp_offset_seconds),
            tag_version: tag_row.tag_version,
            tag_timestamp: to_fixed_offset(tag_row.tag_timestamp, tag_row.tag_timestamp_offset_seconds),
        },
        definition: ObjectDefinition { object_type: sel.object_type, payload: version_row.payload },
        attrs: rows_to_attrs(attrs),
    })
}

async fn resolve_version_spec(
    conn: &mut AsyncPgConnection,
    object_pk: i64,
    spec: &VersionSpec,
) -> Result<ObjectDefinitionRow, CatalogError> {
    let query = object_definition::table.filter(object_definition::object_pk.eq(object_pk));
    match spec {
        VersionSpec::Explicit(v) => query
            .filter(object_definition::object_version.eq(v))
            .select(ObjectDefinitionRow::as_select())
            .first(conn)
            .await
            .optional()
            .map_err(|e| translate_diesel_error(e, "object_definition", &object_pk.to_string()))?
            .ok_or_else(|| CatalogError::MissingItem(format!("object {object_pk} version {v}"))),
        VersionSpec::Latest => query
            .order(object_definition::object_version.desc())
            .select(ObjectDefinitionRow::as_select())
            .first(conn)
            .await
            .optional()
            .map_err(|e| translate_diesel_error(e, "object_definition", &object_pk.to_string()))?
            .ok_or_else(|| CatalogError::MissingItem(format!("object {object_pk} has no versions"))),
        VersionSpec::AsOf(ts) => query
            .filter(object_definition::object_timestamp.le(ts.naive_utc()))
            .order(object_definition::object_version.desc())
            .select(ObjectDefinitionRow::as_select())
            .first(conn)
            .await
            .optional()
            .map_err(|e| translate_diesel_error(e, "object_definition", &object_pk.to_string()))?
            .ok_or_else(|| CatalogError::MissingItem(format!("object {object_pk} has no version as of {ts}"))),
    }
}

async fn resolve_tag_spec(
    conn: &mut AsyncPgConnection,
    version_pk: i64,
    spec: &VersionSpec,
) -> Result<TagRow, CatalogError> {
    let query = tag::table.filter(tag::version_pk.eq(version_pk));
    match spec {
        VersionSpec::Explicit(v) => query
            .filter(tag::tag_version.eq(v))
            .select(TagRow::as_select())
            .first(conn)
            .await
            .optional()
            .map_err(|e| translate_diesel_error(e, "tag", &version_pk.to_string()))?
            .ok_or_else(|| CatalogError::MissingItem(format!("version {version_pk} tag {v}"))),
        VersionSpec::Latest => query
            .order(tag::tag_version.desc())
            .select(TagRow::as_select())
            .first(conn)
            .await
            .optional()
            .map_err(|e| translate_diesel_error(e, "tag", &version_pk.to_string()))?
            .ok_or_else(|| CatalogError::MissingItem(format!("version {version_pk} has no tags"))),
        VersionSpec::AsOf(ts) => query
            .filter(tag::tag_timestamp.le(ts.naive_utc()))
            .order(tag::tag_version.desc())
            .select(TagRow::as_select())
            .first(conn)
            .await
            .optional()
            .map_err(|e| translate_diesel_error(e, "tag", &version_pk.to_string()))?
            .ok_or_else(|| CatalogError::MissingItem(format!("version {version_pk} has no tag as of {ts}"))),
    }
}

fn to_fixed_offset(ts: NaiveDateTime, offset_seconds: i32) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(offset_seconds).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    DateTime::<Utc>::from_naive_utc_and_offset(ts, Utc)
        .with_timezone(&offset)
}

// Controlled-attribute injection lives in the write service (C5), not here:
// the DAL stores whatever attribute map it's given and never special-cases
// `trac_`-prefixed names.
