//! Selectors resolve to a concrete `(object_version, tag_version)`
//! coordinate (spec.md §4.6). Both the version and the tag_version axes
//! independently accept an explicit number, `LATEST`, or `as_of(timestamp)`
//! — the cartesian product spec.md §4.6 describes.
//!
//! Per the Open Question resolution in DESIGN.md, `as_of` is supported on
//! read-side selectors as well as in search (spec.md §9 lists this as an
//! open question; spec.md §4.6 itself already documents `as_of` for both
//! selector axes, which we take as the authoritative reading).

use catalogd_types::codec::CodecError;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ObjectType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VersionSpec {
    Explicit(i64),
    Latest,
    AsOf(DateTime<FixedOffset>),
}

impl VersionSpec {
    pub fn from_wire(spec: catalogd_types::pb::VersionSpec) -> Result<Self, CodecError> {
        use catalogd_types::pb::version_spec::Spec;
        match spec.spec {
            Some(Spec::Explicit(n)) => Ok(VersionSpec::Explicit(n)),
            Some(Spec::Latest(_)) => Ok(VersionSpec::Latest),
            Some(Spec::AsOf(s)) => Ok(VersionSpec::AsOf(catalogd_types::codec::timestamp_from_wire(&s)?)),
            None => Ok(VersionSpec::Latest),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSelector {
    pub object_type: ObjectType,
    pub object_id: Uuid,
    pub version: VersionSpec,
    pub tag_version: VersionSpec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_wire_spec_defaults_to_latest() {
        let spec = catalogd_types::pb::VersionSpec { spec: None };
        assert_eq!(VersionSpec::from_wire(spec).unwrap(), VersionSpec::Latest);
    }

    #[test]
    fn explicit_wire_spec_round_trips() {
        let spec = catalogd_types::pb::VersionSpec {
            spec: Some(catalogd_types::pb::version_spec::Spec::Explicit(3)),
        };
        assert_eq!(VersionSpec::from_wire(spec).unwrap(), VersionSpec::Explicit(3));
    }
}
