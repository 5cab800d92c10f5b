//! Tag update operations consumed by the tag-update applier (spec.md §4.4,
//! C4).

use catalogd_types::codec::AttrValue;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TagUpdateOp {
    CreateOrReplaceAttr,
    CreateOrAppendAttr,
    CreateAttr,
    ReplaceAttr,
    AppendAttr,
    DeleteAttr,
    ClearAllAttr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagUpdate {
    pub op: TagUpdateOp,
    /// Unused by `ClearAllAttr`.
    pub attr_name: String,
    /// Unused by `DeleteAttr` and `ClearAllAttr`.
    pub value: Option<AttrValue>,
}
