use axum::{Router, response::Redirect, routing::get};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, decompression::RequestDecompressionLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error;
mod openapi;
mod routes;
pub mod state;

pub use axum;
pub use sea_orm;

use state::AppState;

pub fn construct_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/docs") }))
        .nest("/health", routes::health::routes())
        .nest("/products", routes::products::routes())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(
            ServiceBuilder::new()
                .layer(RequestDecompressionLayer::new())
                .layer(CompressionLayer::new()),
        )
}
