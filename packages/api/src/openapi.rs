use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockpace API",
        version = "1.0.0",
        description = "Per-tenant e-commerce sales-velocity reporting.\n\n\
            Select a tenant database with `db_name`, bound the item set by \
            days since launch, and receive per-product velocity metrics as \
            a nested document or a flat CSV export."
    ),
    paths(
        crate::routes::health::health,
        crate::routes::products::products,
        crate::routes::products::export_products,
    ),
    components(schemas(crate::routes::health::HealthResponse)),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "products", description = "Sales-velocity reports per tenant database")
    )
)]
pub struct ApiDoc;
