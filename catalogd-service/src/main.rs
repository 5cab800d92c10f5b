//! Binary entry point: load config, init telemetry, run migrations, build
//! the gateway, and serve the `MetadataService` gRPC surface.
//!
//! Grounded on the shape implied by `tycho-indexer`'s `[[bin]]` target and
//! `services::ServicesBuilder::run` pattern (build a gateway + pool, hand it
//! to a service builder, serve until the process is asked to stop) —
//! generalized here from actix-web to tonic, since the whole surface is
//! request/response RPC rather than a websocket feed.

mod apply;
mod config;
mod grpc;
mod read;
mod telemetry;
mod wire;
mod write;

use std::sync::Arc;

use tracing::info;

use crate::{
    config::Config,
    grpc::MetadataServiceImpl,
    read::ReadService,
    write::{NoopVersionValidator, WriteService},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    telemetry::init_tracing(&config.log_filter);
    telemetry::init_metrics(&config.metrics_address)?;

    info!("running pending migrations");
    catalogd_storage::run_migrations(&config.database_url)?;

    let gateway = Arc::new(
        catalogd_storage::PostgresGateway::new(&config.database_url, config.max_pool_size)
            .map_err(|e| anyhow::anyhow!(e))?,
    );
    let read = Arc::new(ReadService::new(gateway.clone()));
    let write = Arc::new(WriteService::new(gateway, Arc::new(NoopVersionValidator)));

    let service = MetadataServiceImpl::new(read, write);
    let addr = config.bind_address.parse()?;

    info!(%addr, "starting catalogd gRPC server");
    tonic::transport::Server::builder()
        .add_service(service.into_server())
        .serve(addr)
        .await?;

    Ok(())
}
