use axum_helpers::server::{ShutdownCoordinator, create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_inventory::{InventoryService, PgInventoryRepository};
use eyre::WrapErr;
use migration::Migrator;
use rpc::inventory::v1::product_service_server::ProductServiceServer;
use std::net::SocketAddr;
use std::time::Duration;
use tonic::transport::Server;
use tracing::info;

mod api;
mod config;
mod grpc;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;
    database::postgres::run_migrations::<Migrator>(&db, config.app.name)
        .await
        .wrap_err("Failed to run migrations")?;

    let service = InventoryService::with_monitor_config(
        PgInventoryRepository::new(db.clone()),
        config.monitor.clone(),
    );

    let (coordinator, _) = ShutdownCoordinator::new();

    let grpc_addr: SocketAddr = config
        .server
        .grpc_address()
        .parse()
        .wrap_err_with(|| format!("Invalid gRPC address: {}", config.server.grpc_address()))?;
    let grpc_server = {
        let coordinator = coordinator.clone();
        let product_service = ProductServiceServer::new(grpc::ProductGrpc::new(service.clone()))
            .accept_compressed(tonic::codec::CompressionEncoding::Zstd)
            .send_compressed(tonic::codec::CompressionEncoding::Zstd);
        info!("gRPC ProductService listening on {}", grpc_addr);
        tokio::spawn(async move {
            let signal = {
                let coordinator = coordinator.clone();
                async move { coordinator.notified().await }
            };
            if let Err(e) = Server::builder()
                .add_service(product_service)
                .serve_with_shutdown(grpc_addr, signal)
                .await
            {
                tracing::error!("gRPC server error: {}", e);
                // Take HTTP down with it
                coordinator.shutdown();
            }
        })
    };

    let state = AppState {
        config,
        db: db.clone(),
    };

    let router =
        axum_helpers::create_router::<openapi::ApiDoc>(domain_inventory::handlers::router(service))
            .await?;

    let app = router
        .merge(health_router(state.config.app))
        .merge(api::ready_router(state.clone()));

    info!("Starting inventory API (30s shutdown timeout)");

    create_production_app(
        app,
        &state.config.server,
        coordinator,
        Duration::from_secs(30),
        async move {
            if let Err(e) = grpc_server.await {
                tracing::error!("gRPC task failed: {}", e);
            }
            info!("Shutting down: closing database connections");
            match db.close().await {
                Ok(_) => info!("PostgreSQL connection closed successfully"),
                Err(e) => tracing::error!("Error closing PostgreSQL: {}", e),
            }
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Inventory API shutdown complete");
    Ok(())
}
