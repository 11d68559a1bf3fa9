use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderName, StatusCode, header},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{delete, get, post, put},
};
use axum_helpers::{
    AppError, IdPath, JsonBody,
    errors::responses::{
        BadRequestPathResponse, BadRequestValidationResponse, ConflictResponse,
        InternalServerErrorResponse, NotFoundResponse,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::warn;
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::error::{InventoryError, InventoryResult};
use crate::models::{
    Branch, BranchInfo, CreateProductInput, NewProduct, PricePoint, ProductUpdate,
    ProductWithPrices, StockBatch, StockDetail, StockItemInput, StockLine, StockQuantity,
    UpdateProductInput,
};
use crate::repository::InventoryRepository;
use crate::service::InventoryService;

const BRANCHES_TAG: &str = "Branches";
const PRODUCTS_TAG: &str = "Products";

/// OpenAPI documentation for the inventory API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_branches,
        add_stock,
        branch_stock,
        stock_alerts,
        create_product,
        update_product,
        delete_product,
        list_products,
        get_product,
    ),
    components(
        schemas(
            Branch,
            BranchInfo,
            StockLine,
            StockDetail,
            StockQuantity,
            StockItemInput,
            ProductWithPrices,
            PricePoint,
            CreateProductInput,
            UpdateProductInput,
            StockUpdatedResponse,
            BranchStockResponse,
            ProductResponse,
            MessageResponse,
        ),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            BadRequestPathResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = BRANCHES_TAG, description = "Branch stock and low-stock alerts"),
        (name = PRODUCTS_TAG, description = "Product catalog and price history")
    )
)]
pub struct ApiDoc;

#[derive(Debug, Serialize, ToSchema)]
pub struct StockUpdatedResponse {
    pub message: String,
    pub stock: Vec<StockLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BranchStockResponse {
    pub message: String,
    pub sucursal: BranchInfo,
    pub stock: Vec<StockDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub message: String,
    #[serde(rename = "producto")]
    pub product: ProductWithPrices,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AlertQuery {
    /// Alert when quantity is strictly below this value
    pub umbral: Option<i32>,
}

/// Create the inventory router with all HTTP endpoints
pub fn router<R: InventoryRepository + 'static>(service: InventoryService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/branches/all", get(list_branches))
        .route("/branches/{id}/stock/add", post(add_stock))
        .route("/branches/{id}/stock/all", get(branch_stock))
        .route("/branches/stock-alerts", get(stock_alerts))
        .route("/products/add", post(create_product))
        .route("/products/update/{code}", put(update_product))
        .route("/products/delete/{code}", delete(delete_product))
        .route("/products/all", get(list_products))
        .route("/products/product/{code}", get(get_product))
        .with_state(shared_service)
}

/// List all branches
#[utoipa::path(
    get,
    path = "/branches/all",
    tag = BRANCHES_TAG,
    responses(
        (status = 200, description = "Branches ordered by id", body = Vec<Branch>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_branches<R: InventoryRepository + 'static>(
    State(service): State<Arc<InventoryService<R>>>,
) -> InventoryResult<Json<Vec<Branch>>> {
    Ok(Json(service.list_branches().await?))
}

/// Add stock to a branch
///
/// Quantities are increments. The whole batch is applied or none of it.
#[utoipa::path(
    post,
    path = "/branches/{id}/stock/add",
    tag = BRANCHES_TAG,
    params(("id" = i32, Path, description = "Branch ID")),
    request_body = Vec<StockItemInput>,
    responses(
        (status = 200, description = "Stock updated", body = StockUpdatedResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn add_stock<R: InventoryRepository + 'static>(
    State(service): State<Arc<InventoryService<R>>>,
    IdPath(branch_id): IdPath,
    JsonBody(body): JsonBody<Value>,
) -> InventoryResult<Json<StockUpdatedResponse>> {
    let Value::Array(raw_items) = body else {
        return Err(InventoryError::Validation(
            "Se debe enviar una lista de productos".to_string(),
        ));
    };

    let items = raw_items
        .into_iter()
        .map(serde_json::from_value::<StockItemInput>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| InventoryError::Validation(format!("Formato de producto inválido: {e}")))?;

    let batch = StockBatch::try_from(items)?;
    let stock = service.apply_stock_batch(branch_id, batch).await?;

    Ok(Json(StockUpdatedResponse {
        message: "Stock actualizado correctamente".to_string(),
        stock,
    }))
}

/// Stock of a branch with full price histories
#[utoipa::path(
    get,
    path = "/branches/{id}/stock/all",
    tag = BRANCHES_TAG,
    params(("id" = i32, Path, description = "Branch ID")),
    responses(
        (status = 200, description = "Branch stock", body = BranchStockResponse),
        (status = 400, response = BadRequestPathResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn branch_stock<R: InventoryRepository + 'static>(
    State(service): State<Arc<InventoryService<R>>>,
    IdPath(branch_id): IdPath,
) -> InventoryResult<Json<BranchStockResponse>> {
    let stock = service.branch_stock_detailed(branch_id).await?;

    let message = if stock.items.is_empty() {
        "No hay stock registrado en esta sucursal"
    } else {
        "Stock obtenido exitosamente"
    };

    Ok(Json(BranchStockResponse {
        message: message.to_string(),
        sucursal: stock.branch.into(),
        stock: stock.items,
    }))
}

/// Low-stock alert feed (server-sent events)
///
/// Emits `connected` once, then every interval a `scan_summary`, one
/// `low_stock_alert` per row (or `no_low_stock`) and a `heartbeat`.
#[utoipa::path(
    get,
    path = "/branches/stock-alerts",
    tag = BRANCHES_TAG,
    params(AlertQuery),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream", body = String),
        (status = 400, response = BadRequestValidationResponse)
    )
)]
async fn stock_alerts<R: InventoryRepository + 'static>(
    State(service): State<Arc<InventoryService<R>>>,
    query: Result<Query<AlertQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query.map_err(|_| {
        AppError::BadRequest("El parámetro umbral debe ser un número entero".to_string())
    })?;

    let mut subscription = service.subscribe_low_stock(query.umbral);

    let stream = async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            match Event::default().json_data(&event) {
                Ok(sse) => yield Ok::<_, Infallible>(sse),
                Err(e) => warn!(kind = event.kind(), error = %e, "Failed to encode monitor event"),
            }
        }
    };

    let headers = [
        (header::CACHE_CONTROL, "no-cache"),
        (HeaderName::from_static("x-accel-buffering"), "no"),
        (header::CONNECTION, "keep-alive"),
    ];

    Ok((headers, Sse::new(stream).keep_alive(KeepAlive::default())))
}

/// Create a product with its initial price history
#[utoipa::path(
    post,
    path = "/products/add",
    tag = PRODUCTS_TAG,
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_product<R: InventoryRepository + 'static>(
    State(service): State<Arc<InventoryService<R>>>,
    JsonBody(input): JsonBody<CreateProductInput>,
) -> InventoryResult<impl IntoResponse> {
    let product = service.create_product(NewProduct::try_from(input)?).await?;

    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            message: "Producto añadido exitosamente".to_string(),
            product,
        }),
    ))
}

/// Update product fields and append prices
#[utoipa::path(
    put,
    path = "/products/update/{code}",
    tag = PRODUCTS_TAG,
    params(("code" = String, Path, description = "Product code")),
    request_body = UpdateProductInput,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_product<R: InventoryRepository + 'static>(
    State(service): State<Arc<InventoryService<R>>>,
    Path(code): Path<String>,
    JsonBody(input): JsonBody<UpdateProductInput>,
) -> InventoryResult<Json<ProductResponse>> {
    let product = service
        .update_product(&code, ProductUpdate::try_from(input)?)
        .await?;

    Ok(Json(ProductResponse {
        message: "Producto actualizado exitosamente".to_string(),
        product,
    }))
}

/// Delete a product with its prices and stock
#[utoipa::path(
    delete,
    path = "/products/delete/{code}",
    tag = PRODUCTS_TAG,
    params(("code" = String, Path, description = "Product code")),
    responses(
        (status = 200, description = "Product deleted", body = MessageResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_product<R: InventoryRepository + 'static>(
    State(service): State<Arc<InventoryService<R>>>,
    Path(code): Path<String>,
) -> InventoryResult<Json<MessageResponse>> {
    service.delete_product(&code).await?;

    Ok(Json(MessageResponse {
        message: "Producto eliminado exitosamente".to_string(),
    }))
}

/// List all products with price histories
#[utoipa::path(
    get,
    path = "/products/all",
    tag = PRODUCTS_TAG,
    responses(
        (status = 200, description = "Products ordered by code", body = Vec<ProductWithPrices>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_products<R: InventoryRepository + 'static>(
    State(service): State<Arc<InventoryService<R>>>,
) -> InventoryResult<Json<Vec<ProductWithPrices>>> {
    Ok(Json(service.list_products().await?))
}

/// Get one product by code
#[utoipa::path(
    get,
    path = "/products/product/{code}",
    tag = PRODUCTS_TAG,
    params(("code" = String, Path, description = "Product code")),
    responses(
        (status = 200, description = "Product found", body = ProductWithPrices),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_product<R: InventoryRepository + 'static>(
    State(service): State<Arc<InventoryService<R>>>,
    Path(code): Path<String>,
) -> InventoryResult<Json<ProductWithPrices>> {
    Ok(Json(service.get_product(&code).await?))
}
