use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(schemas(axum_helpers::ErrorResponse)),
    info(
        title = "Inventory API",
        version = "0.1.0",
        description = "Per-branch stock, low-stock alerts and the product catalog"
    )
)]
struct RootDoc;

/// Root document with the inventory routes merged in at `/`.
pub struct ApiDoc;

impl OpenApi for ApiDoc {
    fn openapi() -> utoipa::openapi::OpenApi {
        let mut doc = RootDoc::openapi();
        doc.merge(domain_inventory::handlers::ApiDoc::openapi());
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_paths_are_documented_at_root() {
        let doc = ApiDoc::openapi();

        assert_eq!(doc.info.title, "Inventory API");
        assert!(doc.paths.paths.contains_key("/branches/all"));
        assert!(doc.paths.paths.contains_key("/products/add"));
    }
}
