//! C7 search engine: translates a boolean [`Expression`] tree into a single
//! parameterised query against the EAV `tag_attr` table (spec.md §4.7).
//!
//! Grounded on the teacher's dynamic-filter pattern in
//! `tycho-indexer/src/services/...` (boxed `BoxableExpression` predicates
//! assembled from a caller-supplied filter struct) and diesel's own
//! documented approach to runtime-built `WHERE` clauses: every comparison
//! is expressed through the typed query DSL (`.eq()`, `.lt()`, `.eq_any()`,
//! ...), so no attribute name or value is ever written into the SQL text
//! itself — only column identifiers chosen at compile time and bind
//! parameters chosen at run time (spec.md §4.7 "must never string-build
//! values into SQL").

use catalogd_core::{
    model::ObjectType,
    search::{AttrType, Expression, LogicalKind, Op, SearchParameters, Term},
};
use catalogd_types::{codec::PrimitiveValue, uuid_codec};
use chrono::{NaiveDateTime, Timelike};
use diesel::{
    dsl::{exists, not, sql},
    pg::Pg,
    prelude::*,
    sql_types::Bool,
    BoxableExpression,
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::{
    error::translate_diesel_error,
    orm::ObjectTypeDb,
    schema::{latest_tag, latest_version, object, object_definition, tag, tag_attr},
};

type BoxedTagPredicate = Box<dyn BoxableExpression<tag::table, Pg, SqlType = Bool>>;
type BoxedAttrPredicate = Box<dyn BoxableExpression<tag_attr::table, Pg, SqlType = Bool>>;

/// One row of a search result: enough to build a `TagHeader` without a
/// second round trip (the gateway still fetches attributes separately via
/// `orm::TagAttrRow::by_tag`, since most search callers only need headers).
#[derive(Queryable, Debug, Clone)]
pub struct SearchRow {
    pub object_pk: i64,
    pub object_type: ObjectTypeDb,
    pub object_id_hi: i64,
    pub object_id_lo: i64,
    pub version_pk: i64,
    pub object_version: i64,
    pub object_timestamp: NaiveDateTime,
    pub object_timestamp_offset_seconds: i32,
    pub tag_pk: i64,
    pub tag_version: i64,
    pub tag_timestamp: NaiveDateTime,
    pub tag_timestamp_offset_seconds: i32,
}

/// Runs `params` against `tenant_pk`, returning matching rows ordered by
/// `object_timestamp` descending, then `object_id` ascending (spec.md §4.7
/// "Result ordering").
pub async fn search(
    conn: &mut AsyncPgConnection,
    tenant_pk: i64,
    params: &SearchParameters,
) -> Result<Vec<SearchRow>, catalogd_core::CatalogError> {
    let as_of = params.as_of.map(|ts| ts.naive_utc());

    let mut query = tag::table
        .inner_join(object_definition::table.on(tag::version_pk.eq(object_definition::version_pk)))
        .inner_join(object::table.on(object_definition::object_pk.eq(object::object_pk)))
        .filter(object::tenant_pk.eq(tenant_pk))
        .filter(object::object_type.eq(ObjectTypeDb::from(params.object_type)))
        .select((
            object::object_pk,
            object::object_type,
            object::object_id_hi,
            object::object_id_lo,
            object_definition::version_pk,
            object_definition::object_version,
            object_definition::object_timestamp,
            object_definition::object_timestamp_offset_seconds,
            tag::tag_pk,
            tag::tag_version,
            tag::tag_timestamp,
            tag::tag_timestamp_offset_seconds,
        ))
        .order((
            object_definition::object_timestamp.desc(),
            object::object_id_hi.asc(),
            object::object_id_lo.asc(),
        ))
        .into_boxed();

    if let Some(ts) = as_of {
        query = query.filter(object_definition::object_timestamp.le(ts));
        query = query.filter(tag::tag_timestamp.le(ts));
    }

    if !params.prior_versions {
        // Only the version current as of the query's reference time: the
        // unconditional `latest_version` marker when there is no `as_of`,
        // or the highest version whose timestamp doesn't exceed it.
        query = match as_of {
            None => query.filter(exists(
                latest_version::table
                    .filter(latest_version::object_pk.eq(object::object_pk))
                    .filter(latest_version::version_pk.eq(object_definition::version_pk)),
            )),
            Some(ts) => query.filter(
                object_definition::object_version.eq_any(
                    object_definition::table
                        .filter(object_definition::object_pk.eq(object::object_pk))
                        .filter(object_definition::object_timestamp.le(ts))
                        .select(diesel::dsl::max(object_definition::object_version))
                        .single_value(),
                ),
            ),
        };
    }

    if !params.prior_tags {
        query = match as_of {
            None => query.filter(exists(
                latest_tag::table
                    .filter(latest_tag::version_pk.eq(tag::version_pk))
                    .filter(latest_tag::tag_pk.eq(tag::tag_pk)),
            )),
            Some(ts) => query.filter(
                tag::tag_version.eq_any(
                    tag::table
                        .filter(tag::version_pk.eq(object_definition::version_pk))
                        .filter(tag::tag_timestamp.le(ts))
                        .select(diesel::dsl::max(tag::tag_version))
                        .single_value(),
                ),
            ),
        };
    }

    if let Some(expr) = &params.expression {
        query = query.filter(build_predicate(expr));
    }

    query
        .load(conn)
        .await
        .map_err(|e| translate_diesel_error(e, "search", ""))
}

fn build_predicate(expr: &Expression) -> BoxedTagPredicate {
    match expr {
        Expression::Term(term) => term_exists(term),
        Expression::Logical(LogicalKind::And, children) => children
            .iter()
            .map(build_predicate)
            .reduce(|a, b| Box::new(a.and(b)))
            .expect("validated: AND has at least one child"),
        Expression::Logical(LogicalKind::Or, children) => children
            .iter()
            .map(build_predicate)
            .reduce(|a, b| Box::new(a.or(b)))
            .expect("validated: OR has at least one child"),
        Expression::Logical(LogicalKind::Not, children) => {
            Box::new(not(build_predicate(&children[0])))
        }
    }
}

/// A term becomes a correlated `EXISTS` against `tag_attr`, scoped to the
/// current row's `tag_pk` — one subquery per term, however deep the
/// surrounding logical tree.
///
/// `NE` is handled separately from every other op: spec.md §4.7 defines it
/// as "Missing attribute ⇒ NE true" and "Type mismatch ⇒ NE true", i.e. the
/// plain logical negation of EQ, not an inner `<>` comparison (which would
/// get both of those cases backwards, and would also go true on a
/// multi-valued attribute as soon as any one element differs rather than
/// only when none match).
fn term_exists(term: &Term) -> BoxedTagPredicate {
    if term.op == Op::Ne {
        let sub = tag_attr::table
            .filter(tag_attr::tag_pk.eq(tag::tag_pk))
            .filter(tag_attr::attr_name.eq(term.attr_name.clone()))
            .filter(scalar_cmp(term, Cmp::Eq));
        return Box::new(not(exists(sub)));
    }

    let sub = tag_attr::table
        .filter(tag_attr::tag_pk.eq(tag::tag_pk))
        .filter(tag_attr::attr_name.eq(term.attr_name.clone()))
        .filter(value_predicate(term));
    Box::new(exists(sub))
}

fn value_predicate(term: &Term) -> BoxedAttrPredicate {
    match term.op {
        Op::Exists => Box::new(sql::<Bool>("TRUE")),
        Op::Eq => scalar_cmp(term, Cmp::Eq),
        // NE never reaches here; see `term_exists`.
        Op::Ne => unreachable!("NE is handled directly in term_exists"),
        Op::Lt => single_valued_only(scalar_cmp(term, Cmp::Lt)),
        Op::Le => single_valued_only(scalar_cmp(term, Cmp::Le)),
        Op::Gt => single_valued_only(scalar_cmp(term, Cmp::Gt)),
        Op::Ge => single_valued_only(scalar_cmp(term, Cmp::Ge)),
        Op::In => array_cmp(term),
    }
}

/// Ordered comparisons are "Never true on multi-valued attributes" (spec.md
/// §4.7): a multi-valued attribute stores one `tag_attr` row per element,
/// each with `attr_index` set, so gating on `attr_index IS NULL` restricts
/// the match to the single-valued row and never to one element of an array.
fn single_valued_only(cmp: BoxedAttrPredicate) -> BoxedAttrPredicate {
    Box::new(tag_attr::attr_index.is_null().and(cmp))
}

enum Cmp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

fn scalar_cmp(term: &Term, cmp: Cmp) -> BoxedAttrPredicate {
    let value = term
        .value
        .as_ref()
        .and_then(|v| match v {
            catalogd_types::codec::AttrValue::Scalar(p) => Some(p.clone()),
            catalogd_types::codec::AttrValue::Array(_) => None,
        })
        .expect("validated: comparison operators carry a scalar value");

    macro_rules! cmp_col {
        ($col:expr, $val:expr) => {
            match cmp {
                Cmp::Eq => Box::new($col.eq($val)) as BoxedAttrPredicate,
                Cmp::Lt => Box::new($col.lt($val)) as BoxedAttrPredicate,
                Cmp::Le => Box::new($col.le($val)) as BoxedAttrPredicate,
                Cmp::Gt => Box::new($col.gt($val)) as BoxedAttrPredicate,
                Cmp::Ge => Box::new($col.ge($val)) as BoxedAttrPredicate,
            }
        };
    }

    match value {
        PrimitiveValue::Bool(b) => cmp_col!(tag_attr::v_bool, b),
        PrimitiveValue::Int(i) => cmp_col!(tag_attr::v_int, i),
        PrimitiveValue::Float(f) => cmp_col!(tag_attr::v_float, f),
        PrimitiveValue::Decimal(d) => cmp_col!(tag_attr::v_decimal, d),
        PrimitiveValue::Str(s) => cmp_col!(tag_attr::v_str, s),
        PrimitiveValue::Date(d) => cmp_col!(tag_attr::v_date, d),
        PrimitiveValue::DateTime(dt) => {
            let naive = dt.naive_utc().with_nanosecond(dt.timestamp_subsec_micros() * 1_000).unwrap();
            cmp_col!(tag_attr::v_datetime, naive)
        }
    }
}

fn array_cmp(term: &Term) -> BoxedAttrPredicate {
    let items = match term.value.as_ref() {
        Some(catalogd_types::codec::AttrValue::Array(items)) => items.clone(),
        _ => unreachable!("validated: IN carries an array value"),
    };

    match term.attr_type {
        AttrType::Integer => {
            let vals: Vec<i64> = items
                .into_iter()
                .map(|v| match v {
                    PrimitiveValue::Int(i) => i,
                    _ => unreachable!("validated: array is homogeneously typed"),
                })
                .collect();
            Box::new(tag_attr::v_int.eq_any(vals))
        }
        AttrType::Float => {
            let vals: Vec<f64> = items
                .into_iter()
                .map(|v| match v {
                    PrimitiveValue::Float(f) => f,
                    _ => unreachable!("validated: array is homogeneously typed"),
                })
                .collect();
            Box::new(tag_attr::v_float.eq_any(vals))
        }
        AttrType::Decimal => {
            let vals: Vec<String> = items
                .into_iter()
                .map(|v| match v {
                    PrimitiveValue::Decimal(d) => d,
                    _ => unreachable!("validated: array is homogeneously typed"),
                })
                .collect();
            Box::new(tag_attr::v_decimal.eq_any(vals))
        }
        AttrType::String => {
            let vals: Vec<String> = items
                .into_iter()
                .map(|v| match v {
                    PrimitiveValue::Str(s) => s,
                    _ => unreachable!("validated: array is homogeneously typed"),
                })
                .collect();
            Box::new(tag_attr::v_str.eq_any(vals))
        }
        AttrType::Date => {
            let vals: Vec<chrono::NaiveDate> = items
                .into_iter()
                .map(|v| match v {
                    PrimitiveValue::Date(d) => d,
                    _ => unreachable!("validated: array is homogeneously typed"),
                })
                .collect();
            Box::new(tag_attr::v_date.eq_any(vals))
        }
        AttrType::Datetime => {
            let vals: Vec<NaiveDateTime> = items
                .into_iter()
                .map(|v| match v {
                    PrimitiveValue::DateTime(dt) => dt.naive_utc(),
                    _ => unreachable!("validated: array is homogeneously typed"),
                })
                .collect();
            Box::new(tag_attr::v_datetime.eq_any(vals))
        }
        AttrType::Boolean => unreachable!("validated: IN is forbidden on BOOLEAN"),
    }
}

// `uuid_codec` is used by the gateway when turning a `SearchRow` back into a
// `Uuid`; re-exported here so callers don't need a second import path.
pub use uuid_codec::from_hi_lo as object_id_from_row;
