//! Wire ⇄ domain conversions for the gRPC surface. Kept separate from
//! `grpc.rs` so the RPC handlers read as request validation + service call
//! + response assembly, without the message-shape plumbing in between.
//!
//! Grounded on `catalogd_types::codec`'s existing scalar/attr-value
//! conversions, extended here to the request/response message types that
//! wrap them.

use catalogd_core::{
    model::{is_controlled_attr, ObjectDefinition, Tag, TagAttributes, TagHeader},
    search::{AttrType, Expression, LogicalKind, Op, SearchParameters, Term},
    selector::{TagSelector, VersionSpec},
    tag_update::{TagUpdate, TagUpdateOp},
    CatalogError, ObjectType,
};
use catalogd_types::{
    codec::{attr_value_from_pb, attr_value_to_pb, timestamp_from_wire, timestamp_to_wire},
    pb,
};
use uuid::Uuid;

pub fn parse_object_id(s: &str) -> Result<Uuid, CatalogError> {
    Uuid::parse_str(s).map_err(|e| CatalogError::InputValidation(format!("malformed object_id {s}: {e}")))
}

pub fn object_type_from_pb(v: i32) -> Result<ObjectType, CatalogError> {
    let wire = pb::ObjectType::try_from(v)
        .map_err(|_| CatalogError::InputValidation(format!("unrecognised object_type {v}")))?;
    ObjectType::try_from(wire)
}

pub fn object_definition_from_pb(def: pb::ObjectDefinition) -> Result<ObjectDefinition, CatalogError> {
    Ok(ObjectDefinition { object_type: object_type_from_pb(def.object_type)?, payload: def.payload })
}

pub fn object_definition_to_pb(def: &ObjectDefinition) -> pb::ObjectDefinition {
    pb::ObjectDefinition { object_type: pb::ObjectType::from(def.object_type).into(), payload: def.payload.clone() }
}

pub fn tag_header_to_pb(h: &TagHeader) -> pb::TagHeader {
    pb::TagHeader {
        object_type: pb::ObjectType::from(h.object_type).into(),
        object_id: h.object_id.to_string(),
        object_version: h.object_version,
        object_timestamp: timestamp_to_wire(h.object_timestamp),
        tag_version: h.tag_version,
        tag_timestamp: timestamp_to_wire(h.tag_timestamp),
    }
}

pub fn tag_to_pb(tag: &Tag) -> pb::Tag {
    pb::Tag {
        header: Some(tag_header_to_pb(&tag.header)),
        definition: Some(object_definition_to_pb(&tag.definition)),
        attrs: tag
            .attrs
            .iter()
            .map(|(name, value)| (name.clone(), attr_value_to_pb(value)))
            .collect(),
    }
}

pub fn version_spec_from_pb(spec: Option<pb::VersionSpec>) -> Result<VersionSpec, CatalogError> {
    VersionSpec::from_wire(spec.unwrap_or(pb::VersionSpec { spec: None }))
        .map_err(|e| CatalogError::InputValidation(e.to_string()))
}

pub fn tag_selector_from_pb(sel: pb::TagSelector) -> Result<TagSelector, CatalogError> {
    Ok(TagSelector {
        object_type: object_type_from_pb(sel.object_type)?,
        object_id: parse_object_id(&sel.object_id)?,
        version: version_spec_from_pb(sel.version)?,
        tag_version: version_spec_from_pb(sel.tag_version)?,
    })
}

pub fn attr_type_from_pb(v: i32) -> Result<AttrType, CatalogError> {
    match pb::AttrType::try_from(v).map_err(|_| CatalogError::InputValidation(format!("unrecognised attr_type {v}")))? {
        pb::AttrType::Unspecified => Err(CatalogError::InputValidation("attr_type is required".into())),
        pb::AttrType::Boolean => Ok(AttrType::Boolean),
        pb::AttrType::Integer => Ok(AttrType::Integer),
        pb::AttrType::Float => Ok(AttrType::Float),
        pb::AttrType::Decimal => Ok(AttrType::Decimal),
        pb::AttrType::String => Ok(AttrType::String),
        pb::AttrType::Date => Ok(AttrType::Date),
        pb::AttrType::Datetime => Ok(AttrType::Datetime),
    }
}

pub fn op_from_pb(v: i32) -> Result<Op, CatalogError> {
    match pb::Op::try_from(v).map_err(|_| CatalogError::InputValidation(format!("unrecognised op {v}")))? {
        pb::Op::Unspecified => Err(CatalogError::InputValidation("op is required".into())),
        pb::Op::Eq => Ok(Op::Eq),
        pb::Op::Ne => Ok(Op::Ne),
        pb::Op::Lt => Ok(Op::Lt),
        pb::Op::Le => Ok(Op::Le),
        pb::Op::Gt => Ok(Op::Gt),
        pb::Op::Ge => Ok(Op::Ge),
        pb::Op::In => Ok(Op::In),
        pb::Op::Exists => Ok(Op::Exists),
    }
}

pub fn term_from_pb(term: pb::Term) -> Result<Term, CatalogError> {
    Ok(Term {
        attr_name: term.attr_name,
        attr_type: attr_type_from_pb(term.attr_type)?,
        op: op_from_pb(term.op)?,
        value: term.value.map(attr_value_from_pb).transpose().map_err(|e| CatalogError::InputValidation(e.to_string()))?,
    })
}

pub fn expression_from_pb(expr: pb::Expression) -> Result<Expression, CatalogError> {
    match expr.expr.ok_or_else(|| CatalogError::InputValidation("expression requires term or logical".into()))? {
        pb::expression::Expr::Term(term) => Ok(Expression::Term(term_from_pb(term)?)),
        pb::expression::Expr::Logical(logical) => {
            let kind = match pb::logical::Kind::try_from(logical.kind) {
                Ok(pb::logical::Kind::And) => LogicalKind::And,
                Ok(pb::logical::Kind::Or) => LogicalKind::Or,
                Ok(pb::logical::Kind::Not) => LogicalKind::Not,
                _ => return Err(CatalogError::InputValidation("unrecognised logical kind".into())),
            };
            let children = logical
                .children
                .into_iter()
                .map(expression_from_pb)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expression::Logical(kind, children))
        }
    }
}

pub fn search_params_from_pb(p: pb::SearchParameters) -> Result<SearchParameters, CatalogError> {
    Ok(SearchParameters {
        object_type: object_type_from_pb(p.object_type)?,
        expression: p.expression.map(expression_from_pb).transpose()?,
        as_of: p
            .as_of
            .map(|s| timestamp_from_wire(&s))
            .transpose()
            .map_err(|e| CatalogError::InputValidation(e.to_string()))?,
        prior_versions: p.prior_versions,
        prior_tags: p.prior_tags,
    })
}

pub fn tag_update_op_from_pb(v: i32) -> Result<TagUpdateOp, CatalogError> {
    match pb::TagUpdateOp::try_from(v).map_err(|_| CatalogError::InputValidation(format!("unrecognised tag update op {v}")))? {
        pb::TagUpdateOp::Unspecified => Err(CatalogError::InputValidation("tag update op is required".into())),
        pb::TagUpdateOp::CreateOrReplaceAttr => Ok(TagUpdateOp::CreateOrReplaceAttr),
        pb::TagUpdateOp::CreateOrAppendAttr => Ok(TagUpdateOp::CreateOrAppendAttr),
        pb::TagUpdateOp::CreateAttr => Ok(TagUpdateOp::CreateAttr),
        pb::TagUpdateOp::ReplaceAttr => Ok(TagUpdateOp::ReplaceAttr),
        pb::TagUpdateOp::AppendAttr => Ok(TagUpdateOp::AppendAttr),
        pb::TagUpdateOp::DeleteAttr => Ok(TagUpdateOp::DeleteAttr),
        pb::TagUpdateOp::ClearAllAttr => Ok(TagUpdateOp::ClearAllAttr),
    }
}

pub fn tag_update_from_pb(u: pb::TagUpdate) -> Result<TagUpdate, CatalogError> {
    let op = tag_update_op_from_pb(u.op)?;
    if !matches!(op, TagUpdateOp::ClearAllAttr) && is_controlled_attr(&u.attr_name) {
        return Err(CatalogError::InputValidation(format!(
            "{} is a controlled attribute and cannot be updated directly",
            u.attr_name
        )));
    }
    Ok(TagUpdate {
        op,
        attr_name: u.attr_name,
        value: u.value.map(attr_value_from_pb).transpose().map_err(|e| CatalogError::InputValidation(e.to_string()))?,
    })
}

/// Injects the new attributes a `MetadataWriteRequest`'s `tag_updates`
/// describe onto a blank [`TagAttributes`] map, used when building a
/// brand-new object/tag from request fields rather than applying updates
/// to an existing one.
pub fn attrs_from_create_updates(updates: Vec<pb::TagUpdate>) -> Result<TagAttributes, CatalogError> {
    let mut attrs = TagAttributes::new();
    for u in updates {
        let update = tag_update_from_pb(u)?;
        let value = update
            .value
            .ok_or_else(|| CatalogError::InputValidation(format!("{} requires a value", update.attr_name)))?;
        attrs.insert(update.attr_name, value);
    }
    Ok(attrs)
}

pub fn error_to_status(err: CatalogError) -> tonic::Status {
    use tonic::Code;
    let code = match &err {
        CatalogError::MissingItem(_) => Code::NotFound,
        CatalogError::DuplicateItem(_) => Code::AlreadyExists,
        CatalogError::WrongItemType { .. } => Code::InvalidArgument,
        CatalogError::VersionConflict(_) => Code::Aborted,
        CatalogError::InputValidation(_) => Code::InvalidArgument,
        CatalogError::VersionValidation(_) => Code::FailedPrecondition,
        CatalogError::TransientStorage(_) => Code::Unavailable,
        CatalogError::PermanentStorage(_) => Code::Internal,
        CatalogError::DeadlineExceeded => Code::DeadlineExceeded,
        CatalogError::Internal(_) => Code::Internal,
        CatalogError::DataCorruption(_) => Code::DataLoss,
    };
    let mut status = tonic::Status::new(code, err.to_string());
    status.metadata_mut().insert("x-catalogd-error-code", err.code().parse().unwrap());
    status
}
