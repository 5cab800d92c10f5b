//! C4 tag-update applier: `(Tag, [TagUpdate]) -> Tag | InvalidUpdate`
//! (spec.md §4.4). Pure — no I/O, no clock, easy to test exhaustively.
//!
//! Written in the teacher's plain-`match`, early-return style; no teacher
//! analogue exists for this operation (domain-specific), so it is grounded
//! on spec.md §4.4's operation table directly rather than on a particular
//! teacher file.

use catalogd_core::{
    model::is_controlled_attr,
    tag_update::{TagUpdate, TagUpdateOp},
    CatalogError, Tag,
};
use catalogd_types::codec::AttrValue;

/// Applies `updates` to `tag` in order, returning the new attribute map.
/// Does not touch `tag.header`/`tag.definition` — the caller (the write
/// service) is responsible for stamping the new `tag_version`/
/// `tag_timestamp` once the attributes are final.
///
/// Rejects any update that targets a `trac_`-prefixed controlled attribute
/// (spec.md §4.4 "Controlled attributes are exempt from user updates"), and
/// `CLEAR_ALL_ATTR` never removes controlled attributes even though it
/// targets no specific name (see DESIGN.md Open Question #2).
pub fn apply_tag_updates(mut tag: Tag, updates: &[TagUpdate]) -> Result<Tag, CatalogError> {
    for update in updates {
        if !matches!(update.op, TagUpdateOp::ClearAllAttr) && is_controlled_attr(&update.attr_name) {
            return Err(CatalogError::InputValidation(format!(
                "{} is a controlled attribute and cannot be updated directly",
                update.attr_name
            )));
        }

        match update.op {
            TagUpdateOp::CreateOrReplaceAttr => {
                let value = require_value(update)?;
                tag.attrs.insert(update.attr_name.clone(), value);
            }
            TagUpdateOp::CreateAttr => {
                if tag.attrs.contains_key(&update.attr_name) {
                    return Err(CatalogError::InputValidation(format!(
                        "attribute {} already exists",
                        update.attr_name
                    )));
                }
                tag.attrs.insert(update.attr_name.clone(), require_value(update)?);
            }
            TagUpdateOp::ReplaceAttr => {
                let existing = tag.attrs.get(&update.attr_name).ok_or_else(|| {
                    CatalogError::InputValidation(format!("attribute {} does not exist", update.attr_name))
                })?;
                let value = require_value(update)?;
                if existing.type_name() != value.type_name() {
                    return Err(CatalogError::InputValidation(format!(
                        "cannot replace {} attribute {} with a {} value",
                        existing.type_name(),
                        update.attr_name,
                        value.type_name()
                    )));
                }
                tag.attrs.insert(update.attr_name.clone(), value);
            }
            TagUpdateOp::CreateOrAppendAttr => {
                let value = require_value(update)?;
                append_or_create(&mut tag, &update.attr_name, value)?;
            }
            TagUpdateOp::AppendAttr => {
                if !tag.attrs.contains_key(&update.attr_name) {
                    return Err(CatalogError::InputValidation(format!(
                        "attribute {} does not exist",
                        update.attr_name
                    )));
                }
                append_or_create(&mut tag, &update.attr_name, require_value(update)?)?;
            }
            TagUpdateOp::DeleteAttr => {
                if tag.attrs.remove(&update.attr_name).is_none() {
                    return Err(CatalogError::InputValidation(format!(
                        "attribute {} does not exist",
                        update.attr_name
                    )));
                }
            }
            TagUpdateOp::ClearAllAttr => {
                tag.attrs.retain(|name, _| is_controlled_attr(name));
            }
        }
    }
    Ok(tag)
}

fn require_value(update: &TagUpdate) -> Result<AttrValue, CatalogError> {
    update.value.clone().ok_or_else(|| {
        CatalogError::InputValidation(format!("{} requires a value", update.attr_name))
    })
}

/// Appends `value` to the existing attribute, coercing a bare scalar into a
/// one-element array on first append; creates the attribute if absent.
/// Appending values of a different primitive type than the existing
/// attribute is rejected (spec.md §4.1 "arrays of a single element type").
fn append_or_create(tag: &mut Tag, name: &str, value: AttrValue) -> Result<(), CatalogError> {
    let existing = tag.attrs.remove(name);
    let merged = match existing {
        None => match value {
            AttrValue::Scalar(v) => AttrValue::Array(vec![v]),
            AttrValue::Array(items) => AttrValue::Array(items),
        },
        Some(AttrValue::Scalar(prev)) => {
            let mut items = vec![prev];
            extend_with(&mut items, value)?;
            AttrValue::Array(items)
        }
        Some(AttrValue::Array(mut items)) => {
            extend_with(&mut items, value)?;
            AttrValue::Array(items)
        }
    };
    tag.attrs.insert(name.to_string(), merged);
    Ok(())
}

fn extend_with(
    items: &mut Vec<catalogd_types::codec::PrimitiveValue>,
    value: AttrValue,
) -> Result<(), CatalogError> {
    let new_items = match value {
        AttrValue::Scalar(v) => vec![v],
        AttrValue::Array(items) => items,
    };
    if let (Some(existing_type), Some(new_type)) = (
        items.first().map(|v| v.type_name()),
        new_items.first().map(|v| v.type_name()),
    ) {
        if existing_type != new_type {
            return Err(CatalogError::InputValidation(format!(
                "cannot append a {new_type} value to an array of {existing_type}"
            )));
        }
    }
    items.extend(new_items);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogd_core::model::{ObjectDefinition, TagHeader};
    use catalogd_core::ObjectType;
    use catalogd_types::codec::PrimitiveValue;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn empty_tag() -> Tag {
        Tag {
            header: TagHeader {
                object_type: ObjectType::Data,
                object_id: Uuid::new_v4(),
                object_version: 1,
                object_timestamp: DateTime::<Utc>::from_timestamp(0, 0).unwrap().into(),
                tag_version: 1,
                tag_timestamp: DateTime::<Utc>::from_timestamp(0, 0).unwrap().into(),
            },
            definition: ObjectDefinition { object_type: ObjectType::Data, payload: vec![] },
            attrs: HashMap::new(),
        }
    }

    fn update(op: TagUpdateOp, name: &str, value: Option<AttrValue>) -> TagUpdate {
        TagUpdate { op, attr_name: name.to_string(), value }
    }

    #[test]
    fn create_or_replace_always_succeeds() {
        let tag = empty_tag();
        let tag = apply_tag_updates(
            tag,
            &[update(
                TagUpdateOp::CreateOrReplaceAttr,
                "region",
                Some(AttrValue::Scalar(PrimitiveValue::Str("eu".into()))),
            )],
        )
        .unwrap();
        assert_eq!(tag.attrs.get("region"), Some(&AttrValue::Scalar(PrimitiveValue::Str("eu".into()))));
    }

    #[test]
    fn create_attr_rejects_existing() {
        let mut tag = empty_tag();
        tag.attrs.insert("region".into(), AttrValue::Scalar(PrimitiveValue::Str("eu".into())));
        let result = apply_tag_updates(
            tag,
            &[update(TagUpdateOp::CreateAttr, "region", Some(AttrValue::Scalar(PrimitiveValue::Str("us".into()))))],
        );
        assert!(result.is_err());
    }

    #[test]
    fn replace_attr_rejects_type_change() {
        let mut tag = empty_tag();
        tag.attrs.insert("region".into(), AttrValue::Scalar(PrimitiveValue::Str("eu".into())));
        let result = apply_tag_updates(
            tag,
            &[update(TagUpdateOp::ReplaceAttr, "region", Some(AttrValue::Scalar(PrimitiveValue::Int(1))))],
        );
        assert!(result.is_err());
    }

    #[test]
    fn replace_attr_rejects_missing() {
        let tag = empty_tag();
        let result = apply_tag_updates(
            tag,
            &[update(TagUpdateOp::ReplaceAttr, "region", Some(AttrValue::Scalar(PrimitiveValue::Str("us".into()))))],
        );
        assert!(result.is_err());
    }

    #[test]
    fn append_converts_scalar_into_array() {
        let mut tag = empty_tag();
        tag.attrs.insert("tags".into(), AttrValue::Scalar(PrimitiveValue::Str("a".into())));
        let tag = apply_tag_updates(
            tag,
            &[update(TagUpdateOp::AppendAttr, "tags", Some(AttrValue::Scalar(PrimitiveValue::Str("b".into()))))],
        )
        .unwrap();
        assert_eq!(
            tag.attrs.get("tags"),
            Some(&AttrValue::Array(vec![PrimitiveValue::Str("a".into()), PrimitiveValue::Str("b".into())]))
        );
    }

    #[test]
    fn append_rejects_type_mismatch() {
        let mut tag = empty_tag();
        tag.attrs.insert("tags".into(), AttrValue::Scalar(PrimitiveValue::Str("a".into())));
        let result = apply_tag_updates(
            tag,
            &[update(TagUpdateOp::AppendAttr, "tags", Some(AttrValue::Scalar(PrimitiveValue::Int(1))))],
        );
        assert!(result.is_err());
    }

    #[test]
    fn delete_attr_rejects_missing() {
        let tag = empty_tag();
        let result = apply_tag_updates(tag, &[update(TagUpdateOp::DeleteAttr, "region", None)]);
        assert!(result.is_err());
    }

    #[test]
    fn clear_all_attr_keeps_controlled_attrs() {
        let mut tag = empty_tag();
        tag.attrs.insert("region".into(), AttrValue::Scalar(PrimitiveValue::Str("eu".into())));
        tag.attrs.insert(
            "trac_create_time".into(),
            AttrValue::Scalar(PrimitiveValue::Str("2024-01-01T00:00:00Z".into())),
        );
        let tag = apply_tag_updates(tag, &[update(TagUpdateOp::ClearAllAttr, "", None)]).unwrap();
        assert!(!tag.attrs.contains_key("region"));
        assert!(tag.attrs.contains_key("trac_create_time"));
    }

    #[test]
    fn direct_update_of_controlled_attr_is_rejected() {
        let tag = empty_tag();
        let result = apply_tag_updates(
            tag,
            &[update(
                TagUpdateOp::CreateOrReplaceAttr,
                "trac_create_time",
                Some(AttrValue::Scalar(PrimitiveValue::Str("x".into()))),
            )],
        );
        assert!(result.is_err());
    }
}
