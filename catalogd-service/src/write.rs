//! C5 write service: builds new tags, injects controlled attributes, and
//! delegates storage to the gateway. One call per RPC; batch variants share
//! a single gateway transaction (spec.md §4.5).
//!
//! Grounded on the `services`-layer coordinator pattern implied by the
//! teacher's `ServicesBuilder` (a struct holding a gateway handle, exposing
//! one method per operation, with request-scoped caller identity threaded
//! through as a plain argument rather than thread-local/global state).

use std::sync::Arc;

use catalogd_core::{
    model::{ObjectDefinition, TagAttributes},
    selector::VersionSpec,
    CatalogError, ObjectType, Tag, TagHeader, TagSelector,
};
use catalogd_types::codec::{AttrValue, PrimitiveValue};
use catalogd_storage::{
    NewObjectRequest, NewTagRequest, NewVersionRequest, PostgresGateway, PreallocatedObjectRequest,
};
use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

use crate::apply::apply_tag_updates;

/// Identity of the caller making a write, supplied by the gRPC layer from
/// request metadata. Used to stamp `trac_create_user_id`/`trac_update_user_id`
/// (spec.md §4.4 "Controlled attributes").
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: String,
    pub user_name: String,
}

/// Validates that a proposed new version is acceptable before it's written
/// (spec.md §4.5 "version-increment validated via an external validator").
/// The default implementation accepts everything; callers that need schema
/// compatibility checks, required-field enforcement, etc. supply their own.
#[async_trait::async_trait]
pub trait VersionValidator: Send + Sync {
    async fn validate(&self, prior: &ObjectDefinition, next: &ObjectDefinition) -> Result<(), CatalogError>;
}

pub struct NoopVersionValidator;

#[async_trait::async_trait]
impl VersionValidator for NoopVersionValidator {
    async fn validate(&self, _prior: &ObjectDefinition, _next: &ObjectDefinition) -> Result<(), CatalogError> {
        Ok(())
    }
}

pub struct WriteService {
    gateway: Arc<PostgresGateway>,
    validator: Arc<dyn VersionValidator>,
}

impl WriteService {
    pub fn new(gateway: Arc<PostgresGateway>, validator: Arc<dyn VersionValidator>) -> Self {
        Self { gateway, validator }
    }

    /// Resolves a tenant code to its surrogate key, used by the gRPC layer
    /// once per incoming request.
    pub async fn tenant_pk(&self, tenant_code: &str) -> Result<i64, CatalogError> {
        self.gateway.tenant_pk(tenant_code).await
    }

    /// Creates one or more brand-new objects (spec.md §4.5
    /// `createObject`/`createObjectBatch`).
    pub async fn create_objects(
        &self,
        tenant_pk: i64,
        ctx: &RequestContext,
        items: Vec<(ObjectDefinition, TagAttributes)>,
    ) -> Result<Vec<TagHeader>, CatalogError> {
        let object_id_order: Vec<Uuid> = items.iter().map(|_| Uuid::new_v4()).collect();
        let requests = items
            .into_iter()
            .zip(object_id_order.iter())
            .map(|((definition, attrs), &object_id)| {
                let attrs = with_create_and_update_controls(attrs, ctx);
                NewObjectRequest { object_id, definition, attrs }
            })
            .collect();

        let results = self.gateway.save_new_objects(tenant_pk, requests).await?;
        metrics::counter!("catalogd_objects_created_total").increment(results.len() as u64);
        Ok(results.into_iter().map(result_to_header).collect())
    }

    /// Creates a new version of each existing object (spec.md §4.5
    /// `updateObject`/`updateObjectBatch`). Runs each candidate through the
    /// version validator before writing.
    pub async fn update_objects(
        &self,
        tenant_pk: i64,
        ctx: &RequestContext,
        items: Vec<(Uuid, ObjectType, ObjectDefinition, TagAttributes)>,
    ) -> Result<Vec<TagHeader>, CatalogError> {
        let mut prior_defs = Vec::with_capacity(items.len());
        for (object_id, object_type, _, _) in &items {
            let selector = TagSelector {
                object_type: *object_type,
                object_id: *object_id,
                version: VersionSpec::Latest,
                tag_version: VersionSpec::Latest,
            };
            let prior = self.gateway.load_tags(tenant_pk, &[selector]).await?;
            prior_defs.push(prior.into_iter().next().expect("load_tags returns one row per selector").definition);
        }

        let mut requests = Vec::with_capacity(items.len());
        for ((object_id, object_type, definition, attrs), prior) in items.into_iter().zip(prior_defs.iter()) {
            self.validator.validate(prior, &definition).await?;
            let attrs = with_update_controls(attrs, ctx);
            requests.push(NewVersionRequest { object_id, object_type, definition, attrs });
        }

        let results = self.gateway.save_new_versions(tenant_pk, requests).await?;
        metrics::counter!("catalogd_versions_created_total").increment(results.len() as u64);
        Ok(results.into_iter().map(result_to_header).collect())
    }

    /// Applies tag updates to the latest (or a given) version of each object
    /// (spec.md §4.5 `updateTag`/`updateTagBatch`, C4+C5 composed).
    pub async fn update_tags(
        &self,
        tenant_pk: i64,
        ctx: &RequestContext,
        items: Vec<(Uuid, ObjectType, Option<i64>, Vec<catalogd_core::tag_update::TagUpdate>)>,
    ) -> Result<Vec<TagHeader>, CatalogError> {
        let mut requests = Vec::with_capacity(items.len());
        for (object_id, object_type, object_version, updates) in items {
            let selector = TagSelector {
                object_type,
                object_id,
                version: object_version.map(VersionSpec::Explicit).unwrap_or(VersionSpec::Latest),
                tag_version: VersionSpec::Latest,
            };
            let current = self
                .gateway
                .load_tags(tenant_pk, &[selector])
                .await?
                .into_iter()
                .next()
                .expect("load_tags returns one row per selector");

            let updated = apply_tag_updates(current, &updates)?;
            let attrs = with_update_controls(updated.attrs, ctx);
            requests.push(NewTagRequest { object_id, object_type, object_version, attrs });
        }

        let results = self.gateway.save_new_tags(tenant_pk, requests).await?;
        metrics::counter!("catalogd_tags_created_total").increment(results.len() as u64);
        Ok(results.into_iter().map(result_to_header).collect())
    }

    /// Reserves `count` fresh identities (spec.md §4.5 `preallocateId`).
    pub async fn preallocate_ids(
        &self,
        tenant_pk: i64,
        object_type: ObjectType,
        count: usize,
    ) -> Result<Vec<Uuid>, CatalogError> {
        self.gateway.preallocate_object_ids(tenant_pk, object_type, count).await
    }

    /// Claims preallocated ids with their first definition (spec.md §4.5
    /// `createPreallocatedObject`).
    pub async fn create_preallocated_objects(
        &self,
        tenant_pk: i64,
        ctx: &RequestContext,
        items: Vec<(Uuid, ObjectDefinition, TagAttributes)>,
    ) -> Result<Vec<TagHeader>, CatalogError> {
        let requests = items
            .into_iter()
            .map(|(object_id, definition, attrs)| PreallocatedObjectRequest {
                object_id,
                definition,
                attrs: with_create_and_update_controls(attrs, ctx),
            })
            .collect();

        let results = self.gateway.save_preallocated_objects(tenant_pk, requests).await?;
        Ok(results.into_iter().map(result_to_header).collect())
    }
}

/// Stamps both the `trac_create_*` and `trac_update_*` controlled attrs on a
/// brand-new object: a create is also a write, and spec.md §4.5 requires the
/// update-control attrs to be present "on every write," create included. Both
/// triples share one timestamp so `trac_create_time == trac_update_time` on
/// the object's first version.
fn with_create_and_update_controls(attrs: TagAttributes, ctx: &RequestContext) -> TagAttributes {
    let now = now_wire();
    let mut attrs = attrs;
    attrs.insert("trac_create_time".into(), AttrValue::Scalar(PrimitiveValue::DateTime(now)));
    attrs.insert("trac_create_user_id".into(), AttrValue::Scalar(PrimitiveValue::Str(ctx.user_id.clone())));
    attrs.insert("trac_create_user_name".into(), AttrValue::Scalar(PrimitiveValue::Str(ctx.user_name.clone())));
    attrs.insert("trac_update_time".into(), AttrValue::Scalar(PrimitiveValue::DateTime(now)));
    attrs.insert("trac_update_user_id".into(), AttrValue::Scalar(PrimitiveValue::Str(ctx.user_id.clone())));
    attrs.insert("trac_update_user_name".into(), AttrValue::Scalar(PrimitiveValue::Str(ctx.user_name.clone())));
    attrs
}

fn with_update_controls(mut attrs: TagAttributes, ctx: &RequestContext) -> TagAttributes {
    let now = now_wire();
    attrs.insert("trac_update_time".into(), AttrValue::Scalar(PrimitiveValue::DateTime(now)));
    attrs.insert("trac_update_user_id".into(), AttrValue::Scalar(PrimitiveValue::Str(ctx.user_id.clone())));
    attrs.insert("trac_update_user_name".into(), AttrValue::Scalar(PrimitiveValue::Str(ctx.user_name.clone())));
    attrs
}

fn now_wire() -> DateTime<FixedOffset> {
    Utc::now().into()
}

fn result_to_header(result: catalogd_storage::NewObjectResult) -> TagHeader {
    TagHeader {
        object_type: result.object_type,
        object_id: result.object_id,
        object_version: result.object_version,
        object_timestamp: result.object_timestamp,
        tag_version: result.tag_version,
        tag_timestamp: result.tag_timestamp,
    }
}
