//! Queryable/insertable row types and their inherent lookup methods,
//! directly modeled on `tycho-storage/src/postgres/orm.rs`'s
//! `Block`/`Transaction`/`ProtocolSystem` structs and their
//! `by_hash`/`by_number`/`ids_by_hash` methods.

use std::collections::HashMap;

use catalogd_core::{model::ObjectType as CoreObjectType, search::AttrType as CoreAttrType};
use chrono::NaiveDateTime;
use diesel::{prelude::*, sql_types::BigInt};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use diesel_derive_enum::DbEnum;
use uuid::Uuid;

use crate::schema::{key_mapping, latest_tag, latest_version, object, object_definition, tag, tag_attr, tenant};

#[derive(Debug, DbEnum, Clone, Copy, PartialEq, Eq)]
#[ExistingTypePath = "crate::schema::sql_types::ObjectTypeSql"]
pub enum ObjectTypeDb {
    Data,
    Model,
    Flow,
    Job,
    File,
    Schema,
    Storage,
    Custom,
    Result,
}

impl From<CoreObjectType> for ObjectTypeDb {
    fn from(value: CoreObjectType) -> Self {
        match value {
            CoreObjectType::Data => ObjectTypeDb::Data,
            CoreObjectType::Model => ObjectTypeDb::Model,
            CoreObjectType::Flow => ObjectTypeDb::Flow,
            CoreObjectType::Job => ObjectTypeDb::Job,
            CoreObjectType::File => ObjectTypeDb::File,
            CoreObjectType::Schema => ObjectTypeDb::Schema,
            CoreObjectType::Storage => ObjectTypeDb::Storage,
            CoreObjectType::Custom => ObjectTypeDb::Custom,
            CoreObjectType::Result => ObjectTypeDb::Result,
        }
    }
}

impl From<ObjectTypeDb> for CoreObjectType {
    fn from(value: ObjectTypeDb) -> Self {
        match value {
            ObjectTypeDb::Data => CoreObjectType::Data,
            ObjectTypeDb::Model => CoreObjectType::Model,
            ObjectTypeDb::Flow => CoreObjectType::Flow,
            ObjectTypeDb::Job => CoreObjectType::Job,
            ObjectTypeDb::File => CoreObjectType::File,
            ObjectTypeDb::Schema => CoreObjectType::Schema,
            ObjectTypeDb::Storage => CoreObjectType::Storage,
            ObjectTypeDb::Custom => CoreObjectType::Custom,
            ObjectTypeDb::Result => CoreObjectType::Result,
        }
    }
}

#[derive(Debug, DbEnum, Clone, Copy, PartialEq, Eq)]
#[ExistingTypePath = "crate::schema::sql_types::AttrTypeSql"]
pub enum AttrTypeDb {
    Boolean,
    Integer,
    Float,
    Decimal,
    String,
    Date,
    Datetime,
}

impl From<CoreAttrType> for AttrTypeDb {
    fn from(value: CoreAttrType) -> Self {
        match value {
            CoreAttrType::Boolean => AttrTypeDb::Boolean,
            CoreAttrType::Integer => AttrTypeDb::Integer,
            CoreAttrType::Float => AttrTypeDb::Float,
            CoreAttrType::Decimal => AttrTypeDb::Decimal,
            CoreAttrType::String => AttrTypeDb::String,
            CoreAttrType::Date => AttrTypeDb::Date,
            CoreAttrType::Datetime => AttrTypeDb::Datetime,
        }
    }
}

impl From<AttrTypeDb> for CoreAttrType {
    fn from(value: AttrTypeDb) -> Self {
        match value {
            AttrTypeDb::Boolean => CoreAttrType::Boolean,
            AttrTypeDb::Integer => CoreAttrType::Integer,
            AttrTypeDb::Float => CoreAttrType::Float,
            AttrTypeDb::Decimal => CoreAttrType::Decimal,
            AttrTypeDb::String => CoreAttrType::String,
            AttrTypeDb::Date => CoreAttrType::Date,
            AttrTypeDb::Datetime => CoreAttrType::Datetime,
        }
    }
}

#[derive(Identifiable, Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = tenant)]
#[diesel(primary_key(tenant_pk))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Tenant {
    pub tenant_pk: i64,
    pub tenant_code: String,
    pub inserted_ts: NaiveDateTime,
}

impl Tenant {
    pub async fn by_code(code: &str, conn: &mut AsyncPgConnection) -> QueryResult<Tenant> {
        tenant::table
            .filter(tenant::tenant_code.eq(code))
            .select(Tenant::as_select())
            .first(conn)
            .await
    }
}

#[derive(Identifiable, Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = object)]
#[diesel(primary_key(object_pk))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Object {
    pub object_pk: i64,
    pub tenant_pk: i64,
    pub object_type: ObjectTypeDb,
    pub object_id_hi: i64,
    pub object_id_lo: i64,
    pub inserted_ts: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = object)]
pub struct NewObject {
    pub tenant_pk: i64,
    pub object_type: ObjectTypeDb,
    pub object_id_hi: i64,
    pub object_id_lo: i64,
}

impl Object {
    pub async fn by_external_id(
        tenant_pk: i64,
        id: Uuid,
        conn: &mut AsyncPgConnection,
    ) -> QueryResult<Option<Object>> {
        let (hi, lo) = catalogd_types::uuid_codec::to_hi_lo(id);
        object::table
            .filter(object::tenant_pk.eq(tenant_pk))
            .filter(object::object_id_hi.eq(hi))
            .filter(object::object_id_lo.eq(lo))
            .select(Object::as_select())
            .first(conn)
            .await
            .optional()
    }
}

#[derive(Identifiable, Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = object_definition)]
#[diesel(primary_key(version_pk))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ObjectDefinitionRow {
    pub version_pk: i64,
    pub object_pk: i64,
    pub object_version: i64,
    pub object_timestamp: NaiveDateTime,
    pub object_timestamp_offset_seconds: i32,
    pub payload: Vec<u8>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = object_definition)]
pub struct NewObjectDefinitionRow {
    pub object_pk: i64,
    pub object_version: i64,
    pub object_timestamp: NaiveDateTime,
    pub object_timestamp_offset_seconds: i32,
    pub payload: Vec<u8>,
}

impl ObjectDefinitionRow {
    pub async fn by_object_and_version(
        object_pk: i64,
        version: i64,
        conn: &mut AsyncPgConnection,
    ) -> QueryResult<Option<ObjectDefinitionRow>> {
        object_definition::table
            .filter(object_definition::object_pk.eq(object_pk))
            .filter(object_definition::object_version.eq(version))
            .select(ObjectDefinitionRow::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn max_version(
        object_pk: i64,
        conn: &mut AsyncPgConnection,
    ) -> QueryResult<Option<i64>> {
        object_definition::table
            .filter(object_definition::object_pk.eq(object_pk))
            .select(diesel::dsl::max(object_definition::object_version))
            .first(conn)
            .await
    }
}

#[derive(Identifiable, Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = tag)]
#[diesel(primary_key(tag_pk))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TagRow {
    pub tag_pk: i64,
    pub version_pk: i64,
    pub tag_version: i64,
    pub tag_timestamp: NaiveDateTime,
    pub tag_timestamp_offset_seconds: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = tag)]
pub struct NewTagRow {
    pub version_pk: i64,
    pub tag_version: i64,
    pub tag_timestamp: NaiveDateTime,
    pub tag_timestamp_offset_seconds: i32,
}

impl TagRow {
    pub async fn max_tag_version(
        version_pk: i64,
        conn: &mut AsyncPgConnection,
    ) -> QueryResult<Option<i64>> {
        tag::table
            .filter(tag::version_pk.eq(version_pk))
            .select(diesel::dsl::max(tag::tag_version))
            .first(conn)
            .await
    }
}

#[derive(Identifiable, Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = tag_attr)]
#[diesel(primary_key(tag_attr_pk))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TagAttrRow {
    pub tag_attr_pk: i64,
    pub tag_pk: i64,
    pub tenant_pk: i64,
    pub attr_name: String,
    pub attr_index: Option<i32>,
    pub attr_type: AttrTypeDb,
    pub v_bool: Option<bool>,
    pub v_int: Option<i64>,
    pub v_float: Option<f64>,
    pub v_decimal: Option<String>,
    pub v_str: Option<String>,
    pub v_date: Option<chrono::NaiveDate>,
    pub v_datetime: Option<NaiveDateTime>,
    pub v_datetime_offset_seconds: Option<i32>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = tag_attr)]
pub struct NewTagAttrRow {
    pub tag_pk: i64,
    pub tenant_pk: i64,
    pub attr_name: String,
    pub attr_index: Option<i32>,
    pub attr_type: AttrTypeDb,
    pub v_bool: Option<bool>,
    pub v_int: Option<i64>,
    pub v_float: Option<f64>,
    pub v_decimal: Option<String>,
    pub v_str: Option<String>,
    pub v_date: Option<chrono::NaiveDate>,
    pub v_datetime: Option<NaiveDateTime>,
    pub v_datetime_offset_seconds: Option<i32>,
}

impl TagAttrRow {
    pub async fn by_tag(
        tag_pk: i64,
        conn: &mut AsyncPgConnection,
    ) -> QueryResult<Vec<TagAttrRow>> {
        tag_attr::table
            .filter(tag_attr::tag_pk.eq(tag_pk))
            .order(tag_attr::attr_name.asc().then_order_by(tag_attr::attr_index.asc()))
            .select(TagAttrRow::as_select())
            .load(conn)
            .await
    }
}

#[derive(Identifiable, Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = latest_version)]
#[diesel(primary_key(object_pk))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LatestVersion {
    pub object_pk: i64,
    pub version_pk: i64,
}

#[derive(Identifiable, Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = latest_tag)]
#[diesel(primary_key(version_pk))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LatestTag {
    pub version_pk: i64,
    pub tag_pk: i64,
}

/// One row of the transaction-scoped key-resolution scratch table
/// (spec.md §4.2, C2). Populated by `keymap::KeyMapper`, read back ordered
/// by `ordinal`.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = key_mapping)]
pub struct NewKeyMappingRow {
    pub txn_token: Uuid,
    pub ordinal: i32,
    pub req_object_type: ObjectTypeDb,
    pub req_id_hi: i64,
    pub req_id_lo: i64,
    pub req_object_version: Option<i64>,
    pub req_tag_version: Option<i64>,
}

#[derive(QueryableByName, Debug, Clone)]
pub struct ResolvedKeyRow {
    #[diesel(sql_type = diesel::sql_types::Integer)]
    pub ordinal: i32,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::BigInt>)]
    pub resolved_object_pk: Option<i64>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::BigInt>)]
    pub resolved_version_pk: Option<i64>,
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::BigInt>)]
    pub resolved_tag_pk: Option<i64>,
    #[diesel(sql_type = diesel::sql_types::Nullable<crate::schema::sql_types::ObjectTypeSql>)]
    pub resolved_object_type: Option<ObjectTypeDb>,
}

/// Bulk-resolves external ids to surrogate object keys in one round trip,
/// generalizing `orm::Transaction::ids_by_hash`'s "load the natural keys,
/// join, collect into a map" pattern from a single `IN (...)` list to a
/// `HashMap` keyed by the UUID itself (small batches; the scratch-table
/// path in `keymap` is used for the general, ordinal-preserving case).
pub async fn object_pks_by_external_ids(
    tenant_pk: i64,
    ids: &[Uuid],
    conn: &mut AsyncPgConnection,
) -> QueryResult<HashMap<Uuid, i64>> {
    let (his, los): (Vec<i64>, Vec<i64>) = ids
        .iter()
        .map(|id| catalogd_types::uuid_codec::to_hi_lo(*id))
        .unzip();

    let rows: Vec<(i64, i64, i64)> = object::table
        .filter(object::tenant_pk.eq(tenant_pk))
        .filter(object::object_id_hi.eq_any(&his))
        .filter(object::object_id_lo.eq_any(&los))
        .select((object::object_pk, object::object_id_hi, object::object_id_lo))
        .load(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(pk, hi, lo)| (catalogd_types::uuid_codec::from_hi_lo(hi, lo), pk))
        .collect())
}

#[allow(dead_code)]
const _TYPE_HINT: Option<BigInt> = None;
