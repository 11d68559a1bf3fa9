//! gRPC front-end for catalog writes.
//!
//! `AddProduct` goes through the same path as `POST /products/add`, with an
//! empty price history. Every failure comes back in-band as
//! `success = false`; storage details stay in the logs.

use domain_inventory::models::CreateProductInput;
use domain_inventory::{InventoryError, InventoryRepository, InventoryService, NewProduct};
use rpc::inventory::v1::{
    AddProductRequest, AddProductResponse, product_service_server::ProductService,
};
use tonic::{Request, Response, Status};
use tracing::{info, warn};

pub struct ProductGrpc<R: InventoryRepository + 'static> {
    service: InventoryService<R>,
}

impl<R: InventoryRepository + 'static> ProductGrpc<R> {
    pub fn new(service: InventoryService<R>) -> Self {
        Self { service }
    }

    async fn add(&self, req: AddProductRequest) -> Result<i32, InventoryError> {
        let input = CreateProductInput {
            product_code: Some(req.product_code),
            brand: Some(req.brand),
            code: Some(req.code),
            name: Some(req.name),
            prices: Some(vec![]),
        };
        let product = self
            .service
            .create_product(NewProduct::try_from(input)?)
            .await?;
        Ok(product.id)
    }
}

#[tonic::async_trait]
impl<R: InventoryRepository + 'static> ProductService for ProductGrpc<R> {
    async fn add_product(
        &self,
        request: Request<AddProductRequest>,
    ) -> Result<Response<AddProductResponse>, Status> {
        let req = request.into_inner();
        let product_code = req.product_code.clone();

        match self.add(req).await {
            Ok(id) => {
                info!(%product_code, id, "Product added over gRPC");
                Ok(Response::new(AddProductResponse {
                    success: true,
                    message: format!("Producto creado exitosamente con ID: {id}"),
                }))
            }
            Err(InventoryError::Storage(e)) => {
                tracing::error!(%product_code, error = %e, "gRPC AddProduct storage failure");
                Ok(Response::new(AddProductResponse {
                    success: false,
                    message: "Error al crear el producto".to_string(),
                }))
            }
            Err(e) => {
                warn!(%product_code, error = %e, "gRPC AddProduct rejected");
                Ok(Response::new(AddProductResponse {
                    success: false,
                    message: e.to_string(),
                }))
            }
        }
    }
}
