use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use sea_orm::DbErr;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Sucursal {0} no encontrada")]
    BranchNotFound(i32),

    #[error("Producto {0} no encontrado")]
    ProductNotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Faltan campos requeridos: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Datos inválidos: {0}")]
    InvalidInput(#[from] ValidationErrors),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type InventoryResult<T> = Result<T, InventoryError>;

impl From<DbErr> for InventoryError {
    fn from(err: DbErr) -> Self {
        InventoryError::Storage(err.to_string())
    }
}

impl InventoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            InventoryError::BranchNotFound(_) | InventoryError::ProductNotFound(_)
        )
    }
}

/// Convert InventoryError to AppError for standardized error responses
impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::BranchNotFound(_) | InventoryError::ProductNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            InventoryError::Validation(msg) => AppError::BadRequest(msg),
            InventoryError::MissingFields(fields) => AppError::MissingFields(fields),
            InventoryError::InvalidInput(errors) => AppError::ValidationError(errors),
            InventoryError::Conflict(msg) => AppError::Conflict(msg),
            // Storage details stay in the logs
            InventoryError::Storage(msg) => {
                tracing::error!(error = %msg, "Inventory storage failure");
                AppError::InternalServerError("Error interno en el servidor".to_string())
            }
        }
    }
}

impl IntoResponse for InventoryError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn not_found_variants_map_to_404() {
        let response = InventoryError::BranchNotFound(7).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = InventoryError::ProductNotFound("P-1".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_maps_to_400_and_conflict_to_409() {
        let response = InventoryError::Validation("Cantidad inválida".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = InventoryError::MissingFields(vec!["Marca"]).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = InventoryError::Conflict("dup".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn storage_errors_hide_details() {
        let err: InventoryError = DbErr::Custom("connection reset".into()).into();
        assert!(matches!(err, InventoryError::Storage(_)));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn missing_fields_are_listed_in_message() {
        let err = InventoryError::MissingFields(vec!["Marca", "Nombre"]);
        assert_eq!(err.to_string(), "Faltan campos requeridos: Marca, Nombre");
    }
}
