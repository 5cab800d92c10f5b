//! Object identity, versions, and tags (spec.md §3).

use std::collections::HashMap;

use catalogd_types::codec::AttrValue;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// The catalogue's object kinds (spec.md §3 "Object"). Reordering would
/// break the wire enum in `catalogd-types`'s `proto/metadata.proto`, so the
/// two are kept in lock-step by hand (see `catalogd_types::pb::ObjectType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ObjectType {
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

impl From<ObjectType> for catalogd_types::pb::ObjectType {
    fn from(value: ObjectType) -> Self {
        match value {
            ObjectType::Data => catalogd_types::pb::ObjectType::Data,
            ObjectType::Model => catalogd_types::pb::ObjectType::Model,
            ObjectType::Flow => catalogd_types::pb::ObjectType::Flow,
            ObjectType::Job => catalogd_types::pb::ObjectType::Job,
            ObjectType::File => catalogd_types::pb::ObjectType::File,
            ObjectType::Schema => catalogd_types::pb::ObjectType::Schema,
            ObjectType::Storage => catalogd_types::pb::ObjectType::Storage,
            ObjectType::Custom => catalogd_types::pb::ObjectType::Custom,
            ObjectType::Result => catalogd_types::pb::ObjectType::Result,
        }
    }
}

impl TryFrom<catalogd_types::pb::ObjectType> for ObjectType {
    type Error = crate::error::CatalogError;

    fn try_from(value: catalogd_types::pb::ObjectType) -> Result<Self, Self::Error> {
        match value {
            catalogd_types::pb::ObjectType::Data => Ok(ObjectType::Data),
            catalogd_types::pb::ObjectType::Model => Ok(ObjectType::Model),
            catalogd_types::pb::ObjectType::Flow => Ok(ObjectType::Flow),
            catalogd_types::pb::ObjectType::Job => Ok(ObjectType::Job),
            catalogd_types::pb::ObjectType::File => Ok(ObjectType::File),
            catalogd_types::pb::ObjectType::Schema => Ok(ObjectType::Schema),
            catalogd_types::pb::ObjectType::Storage => Ok(ObjectType::Storage),
            catalogd_types::pb::ObjectType::Custom => Ok(ObjectType::Custom),
            catalogd_types::pb::ObjectType::Result => Ok(ObjectType::Result),
            catalogd_types::pb::ObjectType::Unspecified => Err(
                crate::error::CatalogError::InputValidation("object_type is required".into()),
            ),
        }
    }
}

/// The identifying coordinate of a saved tag (spec.md §3 "Tag", §6
/// `TagHeader`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagHeader {
    pub object_type: ObjectType,
    pub object_id: Uuid,
    pub object_version: i64,
    pub object_timestamp: DateTime<FixedOffset>,
    pub tag_version: i64,
    pub tag_timestamp: DateTime<FixedOffset>,
}

/// A tag's attribute map (spec.md §3 "TagAttribute").
pub type TagAttributes = HashMap<String, AttrValue>;

/// Reserved prefix for attributes the write service manages; user tag
/// updates may never target these (spec.md §4.4 "Controlled attributes").
pub const CONTROLLED_ATTR_PREFIX: &str = "trac_";

pub fn is_controlled_attr(name: &str) -> bool {
    name.starts_with(CONTROLLED_ATTR_PREFIX)
}

/// The opaque, type-tagged definition body (spec.md §3 "ObjectDefinition").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDefinition {
    pub object_type: ObjectType,
    pub payload: Vec<u8>,
}

/// A fully materialised tag: header, definition, and attributes (spec.md
/// §6 `Tag`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub header: TagHeader,
    pub definition: ObjectDefinition,
    pub attrs: TagAttributes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_type_display_matches_wire_names() {
        assert_eq!(ObjectType::Data.to_string(), "DATA");
        assert_eq!(ObjectType::Storage.to_string(), "STORAGE");
    }

    #[test]
    fn object_type_round_trips_through_pb() {
        for ty in [
            ObjectType::Data,
            ObjectType::Model,
            ObjectType::Flow,
            ObjectType::Job,
            ObjectType::File,
            ObjectType::Schema,
            ObjectType::Storage,
            ObjectType::Custom,
            ObjectType::Result,
        ] {
            let pb: catalogd_types::pb::ObjectType = ty.into();
            assert_eq!(ObjectType::try_from(pb).unwrap(), ty);
        }
    }

    #[test]
    fn controlled_attr_prefix_is_recognised() {
        assert!(is_controlled_attr("trac_create_time"));
        assert!(!is_controlled_attr("dataset_key"));
    }
}
