//! `MetadataService` gRPC surface: validates/translates wire messages,
//! dispatches to `read`/`write`, and translates `CatalogError` back into a
//! `tonic::Status` (spec.md §6 "Error wire shape").
//!
//! Grounded on SPEC_FULL.md §6's wire-transport decision: the teacher
//! already depends on `tonic`/`prost` (for its own streaming RPC surface),
//! generalized here to a request/response metadata service.

use std::sync::Arc;

use catalogd_core::{model::TagAttributes, CatalogError};
use catalogd_types::pb::{
    self,
    metadata_service_server::{MetadataService as MetadataServiceTrait, MetadataServiceServer},
};
use tonic::{Request, Response, Status};

use crate::{
    read::ReadService,
    wire::{self, error_to_status},
    write::{RequestContext, WriteService},
};

pub struct MetadataServiceImpl {
    read: Arc<ReadService>,
    write: Arc<WriteService>,
}

impl MetadataServiceImpl {
    pub fn new(read: Arc<ReadService>, write: Arc<WriteService>) -> Self {
        Self { read, write }
    }

    pub fn into_server(self) -> MetadataServiceServer<Self> {
        MetadataServiceServer::new(self)
    }
}

/// Extracts the caller identity injected by an upstream auth layer. No
/// authentication happens in this crate (out of scope, spec.md §1
/// Non-goals); a request arriving without these headers is treated as
/// anonymous, which callers can reject at the edge if that's unacceptable
/// for their deployment.
fn request_context<T>(req: &Request<T>) -> RequestContext {
    let meta = req.metadata();
    let get = |key: &str| meta.get(key).and_then(|v| v.to_str().ok()).unwrap_or("anonymous").to_string();
    RequestContext { user_id: get("x-catalogd-user-id"), user_name: get("x-catalogd-user-name") }
}

fn bad_request(msg: impl Into<String>) -> Status {
    error_to_status(CatalogError::InputValidation(msg.into()))
}

#[tonic::async_trait]
impl MetadataServiceTrait for MetadataServiceImpl {
    async fn read_object(&self, request: Request<pb::TagSelectorRequest>) -> Result<Response<pb::Tag>, Status> {
        let req = request.into_inner();
        let tenant_pk = self.read_tenant_pk(&req.tenant).await?;
        let selector = req.selector.ok_or_else(|| bad_request("selector is required"))?;
        let selector = wire::tag_selector_from_pb(selector).map_err(error_to_status)?;
        let tags = self.read.read_batch(tenant_pk, &[selector]).await.map_err(error_to_status)?;
        Ok(Response::new(wire::tag_to_pb(&tags[0])))
    }

    async fn read_batch(&self, request: Request<pb::TagSelectorBatchRequest>) -> Result<Response<pb::TagBatch>, Status> {
        let req = request.into_inner();
        let tenant_pk = self.read_tenant_pk(&req.tenant).await?;
        let selectors = req
            .selectors
            .into_iter()
            .map(wire::tag_selector_from_pb)
            .collect::<Result<Vec<_>, _>>()
            .map_err(error_to_status)?;
        let tags = self.read.read_batch(tenant_pk, &selectors).await.map_err(error_to_status)?;
        Ok(Response::new(pb::TagBatch { tags: tags.iter().map(wire::tag_to_pb).collect() }))
    }

    async fn search(&self, request: Request<pb::SearchRequest>) -> Result<Response<pb::SearchResponse>, Status> {
        let req = request.into_inner();
        let tenant_pk = self.read_tenant_pk(&req.tenant).await?;
        let params = req.params.ok_or_else(|| bad_request("params is required"))?;
        let params = wire::search_params_from_pb(params).map_err(error_to_status)?;
        let tags = self.read.search(tenant_pk, &params).await.map_err(error_to_status)?;
        Ok(Response::new(pb::SearchResponse { tags: tags.iter().map(wire::tag_to_pb).collect() }))
    }

    async fn create_object(&self, request: Request<pb::MetadataWriteRequest>) -> Result<Response<pb::TagHeader>, Status> {
        let ctx = request_context(&request);
        let req = request.into_inner();
        let tenant_pk = self.write_tenant_pk(&req.tenant).await?;
        let definition = req.definition.ok_or_else(|| bad_request("definition is required"))?;
        let definition = wire::object_definition_from_pb(definition).map_err(error_to_status)?;
        let attrs = wire::attrs_from_create_updates(req.tag_updates).map_err(error_to_status)?;

        let headers = self
            .write
            .create_objects(tenant_pk, &ctx, vec![(definition, attrs)])
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(wire::tag_header_to_pb(&headers[0])))
    }

    async fn update_object(&self, request: Request<pb::MetadataWriteRequest>) -> Result<Response<pb::TagHeader>, Status> {
        let ctx = request_context(&request);
        let req = request.into_inner();
        let tenant_pk = self.write_tenant_pk(&req.tenant).await?;
        let object_id = wire::parse_object_id(
            &req.object_id.ok_or_else(|| bad_request("object_id is required for UpdateObject"))?,
        )
        .map_err(error_to_status)?;
        let object_type = wire::object_type_from_pb(req.object_type).map_err(error_to_status)?;
        let definition = req.definition.ok_or_else(|| bad_request("definition is required"))?;
        let definition = wire::object_definition_from_pb(definition).map_err(error_to_status)?;
        let attrs = wire::attrs_from_create_updates(req.tag_updates).map_err(error_to_status)?;

        let headers = self
            .write
            .update_objects(tenant_pk, &ctx, vec![(object_id, object_type, definition, attrs)])
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(wire::tag_header_to_pb(&headers[0])))
    }

    async fn update_tag(&self, request: Request<pb::MetadataWriteRequest>) -> Result<Response<pb::TagHeader>, Status> {
        let ctx = request_context(&request);
        let req = request.into_inner();
        let tenant_pk = self.write_tenant_pk(&req.tenant).await?;
        let object_id = wire::parse_object_id(
            &req.object_id.ok_or_else(|| bad_request("object_id is required for UpdateTag"))?,
        )
        .map_err(error_to_status)?;
        let object_type = wire::object_type_from_pb(req.object_type).map_err(error_to_status)?;
        let updates = req
            .tag_updates
            .into_iter()
            .map(wire::tag_update_from_pb)
            .collect::<Result<Vec<_>, _>>()
            .map_err(error_to_status)?;

        let headers = self
            .write
            .update_tags(tenant_pk, &ctx, vec![(object_id, object_type, req.prior_version, updates)])
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(wire::tag_header_to_pb(&headers[0])))
    }

    async fn preallocate_id(&self, request: Request<pb::PreallocateRequest>) -> Result<Response<pb::PreallocatedHeader>, Status> {
        let req = request.into_inner();
        let tenant_pk = self.write_tenant_pk(&req.tenant).await?;
        let object_type = wire::object_type_from_pb(req.object_type).map_err(error_to_status)?;
        let ids = self.write.preallocate_ids(tenant_pk, object_type, 1).await.map_err(error_to_status)?;
        Ok(Response::new(pb::PreallocatedHeader {
            object_type: req.object_type,
            object_id: ids[0].to_string(),
        }))
    }

    async fn create_preallocated_object(
        &self,
        request: Request<pb::CreatePreallocatedObjectRequest>,
    ) -> Result<Response<pb::TagHeader>, Status> {
        let ctx = request_context(&request);
        let req = request.into_inner();
        let tenant_pk = self.write_tenant_pk(&req.tenant).await?;
        let object_id = wire::parse_object_id(&req.object_id).map_err(error_to_status)?;
        let definition = req.definition.ok_or_else(|| bad_request("definition is required"))?;
        let definition = wire::object_definition_from_pb(definition).map_err(error_to_status)?;
        let attrs = wire::attrs_from_create_updates(req.tag_updates).map_err(error_to_status)?;

        let headers = self
            .write
            .create_preallocated_objects(tenant_pk, &ctx, vec![(object_id, definition, attrs)])
            .await
            .map_err(error_to_status)?;
        Ok(Response::new(wire::tag_header_to_pb(&headers[0])))
    }

    async fn create_object_batch(&self, request: Request<pb::WriteBatchRequest>) -> Result<Response<pb::TagHeaderBatch>, Status> {
        let ctx = request_context(&request);
        let req = request.into_inner();
        let tenant_pk = self.write_tenant_pk(&req.tenant).await?;
        let mut items = Vec::with_capacity(req.items.len());
        for item in req.items {
            let definition = item.definition.ok_or_else(|| bad_request("definition is required"))?;
            let definition = wire::object_definition_from_pb(definition).map_err(error_to_status)?;
            let attrs = wire::attrs_from_create_updates(item.tag_updates).map_err(error_to_status)?;
            items.push((definition, attrs));
        }
        let headers = self.write.create_objects(tenant_pk, &ctx, items).await.map_err(error_to_status)?;
        Ok(Response::new(pb::TagHeaderBatch { headers: headers.iter().map(wire::tag_header_to_pb).collect() }))
    }

    async fn update_object_batch(&self, request: Request<pb::WriteBatchRequest>) -> Result<Response<pb::TagHeaderBatch>, Status> {
        let ctx = request_context(&request);
        let req = request.into_inner();
        let tenant_pk = self.write_tenant_pk(&req.tenant).await?;
        let mut items = Vec::with_capacity(req.items.len());
        for item in req.items {
            let object_id = wire::parse_object_id(
                &item.object_id.ok_or_else(|| bad_request("object_id is required for UpdateObjectBatch"))?,
            )
            .map_err(error_to_status)?;
            let object_type = wire::object_type_from_pb(item.object_type).map_err(error_to_status)?;
            let definition = item.definition.ok_or_else(|| bad_request("definition is required"))?;
            let definition = wire::object_definition_from_pb(definition).map_err(error_to_status)?;
            let attrs: TagAttributes = wire::attrs_from_create_updates(item.tag_updates).map_err(error_to_status)?;
            items.push((object_id, object_type, definition, attrs));
        }
        let headers = self.write.update_objects(tenant_pk, &ctx, items).await.map_err(error_to_status)?;
        Ok(Response::new(pb::TagHeaderBatch { headers: headers.iter().map(wire::tag_header_to_pb).collect() }))
    }

    async fn update_tag_batch(&self, request: Request<pb::WriteBatchRequest>) -> Result<Response<pb::TagHeaderBatch>, Status> {
        let ctx = request_context(&request);
        let req = request.into_inner();
        let tenant_pk = self.write_tenant_pk(&req.tenant).await?;
        let mut items = Vec::with_capacity(req.items.len());
        for item in req.items {
            let object_id = wire::parse_object_id(
                &item.object_id.ok_or_else(|| bad_request("object_id is required for UpdateTagBatch"))?,
            )
            .map_err(error_to_status)?;
            let object_type = wire::object_type_from_pb(item.object_type).map_err(error_to_status)?;
            let updates = item
                .tag_updates
                .into_iter()
                .map(wire::tag_update_from_pb)
                .collect::<Result<Vec<_>, _>>()
                .map_err(error_to_status)?;
            items.push((object_id, object_type, item.prior_version, updates));
        }
        let headers = self.write.update_tags(tenant_pk, &ctx, items).await.map_err(error_to_status)?;
        Ok(Response::new(pb::TagHeaderBatch { headers: headers.iter().map(wire::tag_header_to_pb).collect() }))
    }
}

impl MetadataServiceImpl {
    async fn read_tenant_pk(&self, tenant_code: &str) -> Result<i64, Status> {
        self.read.tenant_pk(tenant_code).await.map_err(error_to_status)
    }

    async fn write_tenant_pk(&self, tenant_code: &str) -> Result<i64, Status> {
        self.write.tenant_pk(tenant_code).await.map_err(error_to_status)
    }
}
