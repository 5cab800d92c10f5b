//! Hand-authored Diesel schema mirroring what `diesel print-schema` would
//! emit from `migrations/2024-01-01-000000_init/up.sql`. Kept in sync with
//! the migration by hand since the toolchain isn't run as part of this
//! project's build.

pub mod sql_types {
    #[derive(diesel::sql_types::SqlType)]
    #[diesel(postgres_type(name = "object_type"))]
    pub struct ObjectTypeSql;

    #[derive(diesel::sql_types::SqlType)]
    #[diesel(postgres_type(name = "attr_type"))]
    pub struct AttrTypeSql;
}

diesel::table! {
    tenant (tenant_pk) {
        tenant_pk -> BigInt,
        tenant_code -> Varchar,
        inserted_ts -> Timestamp,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use super::sql_types::ObjectTypeSql;

    object (object_pk) {
        object_pk -> BigInt,
        tenant_pk -> BigInt,
        object_type -> ObjectTypeSql,
        object_id_hi -> BigInt,
        object_id_lo -> BigInt,
        inserted_ts -> Timestamp,
    }
}

diesel::table! {
    object_definition (version_pk) {
        version_pk -> BigInt,
        object_pk -> BigInt,
        object_version -> BigInt,
        object_timestamp -> Timestamp,
        object_timestamp_offset_seconds -> Integer,
        payload -> Binary,
    }
}

diesel::table! {
    tag (tag_pk) {
        tag_pk -> BigInt,
        version_pk -> BigInt,
        tag_version -> BigInt,
        tag_timestamp -> Timestamp,
        tag_timestamp_offset_seconds -> Integer,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use super::sql_types::AttrTypeSql;

    tag_attr (tag_attr_pk) {
        tag_attr_pk -> BigInt,
        tag_pk -> BigInt,
        tenant_pk -> BigInt,
        attr_name -> Varchar,
        attr_index -> Nullable<Integer>,
        attr_type -> AttrTypeSql,
        v_bool -> Nullable<Bool>,
        v_int -> Nullable<BigInt>,
        v_float -> Nullable<Double>,
        v_decimal -> Nullable<Varchar>,
        v_str -> Nullable<Text>,
        v_date -> Nullable<Date>,
        v_datetime -> Nullable<Timestamp>,
        v_datetime_offset_seconds -> Nullable<Integer>,
    }
}

diesel::table! {
    latest_version (object_pk) {
        object_pk -> BigInt,
        version_pk -> BigInt,
    }
}

diesel::table! {
    latest_tag (version_pk) {
        version_pk -> BigInt,
        tag_pk -> BigInt,
    }
}

diesel::table! {
    use diesel::sql_types::*;
    use super::sql_types::ObjectTypeSql;

    key_mapping (txn_token, ordinal) {
        txn_token -> Uuid,
        ordinal -> Integer,
        req_object_type -> ObjectTypeSql,
        req_id_hi -> BigInt,
        req_id_lo -> BigInt,
        req_object_version -> Nullable<BigInt>,
        req_tag_version -> Nullable<BigInt>,
        resolved_object_pk -> Nullable<BigInt>,
        resolved_version_pk -> Nullable<BigInt>,
        resolved_tag_pk -> Nullable<BigInt>,
        resolved_object_type -> Nullable<ObjectTypeSql>,
    }
}

diesel::joinable!(object -> tenant (tenant_pk));
diesel::joinable!(object_definition -> object (object_pk));
diesel::joinable!(tag -> object_definition (version_pk));
diesel::joinable!(tag_attr -> tag (tag_pk));
diesel::joinable!(latest_version -> object (object_pk));
diesel::joinable!(latest_tag -> object_definition (version_pk));

diesel::allow_tables_to_appear_in_same_query!(
    tenant,
    object,
    object_definition,
    tag,
    tag_attr,
    latest_version,
    latest_tag,
    key_mapping,
);
