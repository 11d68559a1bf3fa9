//! JSON extractor with structured rejections.

use crate::errors::AppError;
use axum::{
    extract::{FromRequest, Json, Request},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;

/// Like [`axum::Json`], but every rejection (missing content type, syntax
/// error, wrong shape) becomes a 400 with the standard error body.
///
/// Field-level rules stay with the domain: deserialize into an input type
/// with optional fields and convert it with `TryFrom`.
///
/// ```ignore
/// async fn add_stock(JsonBody(items): JsonBody<Vec<StockItemInput>>) -> impl IntoResponse {
///     let batch = StockBatch::try_from(items)?;
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::from(e).into_response())?;

        Ok(JsonBody(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
        routing::post,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new().route(
            "/echo",
            post(|JsonBody(values): JsonBody<Vec<i32>>| async move { values.len().to_string() }),
        )
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::post("/echo")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_accepts_matching_body() {
        let response = app().oneshot(post_json("[1,2,3]")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wrong_shape_is_structured_400() {
        let response = app().oneshot(post_json(r#"{"a":1}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "VALIDATION_ERROR");
        assert!(body["details"]["reason"].is_string());
    }

    #[tokio::test]
    async fn test_syntax_error_is_400() {
        let response = app().oneshot(post_json("[1,")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
