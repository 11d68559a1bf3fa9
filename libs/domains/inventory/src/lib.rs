//! Inventory Domain
//!
//! Branch stock reconciliation, product catalog with price history, and a
//! polling low-stock monitor streamed to clients as server-sent events.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints + SSE alert feed
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐     ┌─────────────┐
//! │   Service   │────►│   Monitor   │  ← one polling task per subscriber
//! └──────┬──────┘     └──────┬──────┘
//!        │                   │
//! ┌──────▼───────────────────▼──────┐
//! │           Repository            │  ← trait + in-memory / Postgres
//! └──────┬──────────────────────────┘
//!        │
//! ┌──────▼──────┐
//! │   Entity    │  ← SeaORM models: branch, product, price, stock
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_inventory::{
//!     handlers,
//!     repository::InMemoryInventoryRepository,
//!     service::InventoryService,
//! };
//!
//! let repository = InMemoryInventoryRepository::new();
//! let service = InventoryService::new(repository);
//!
//! let router = handlers::router(service);
//! ```

pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod monitor;
pub mod postgres;
pub mod repository;
pub mod service;

pub use error::{InventoryError, InventoryResult};
pub use models::{
    Branch, BranchInfo, BranchStock, LowStockRow, NewPrice, NewProduct, PricePoint, Product,
    ProductUpdate, ProductWithPrices, StockBatch, StockDelta, StockDetail, StockLine,
};
pub use monitor::{LowStockMonitor, MonitorConfig, MonitorEvent, MonitorSubscription};
pub use postgres::PgInventoryRepository;
pub use repository::{InMemoryInventoryRepository, InventoryRepository};
pub use service::InventoryService;
