use axum::{
    Json, Router,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use stockpace::facts::LaunchWindow;
use stockpace::metrics::ReportRow;
use stockpace::{
    Granularity, ProductReport, aggregate, export_filename, flat_rows, load_facts, nested_report,
    write_csv,
};
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products))
        .route("/export", get(export_products))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProductsQuery {
    /// Tenant database to report on
    pub db_name: String,
    /// Min days since launch (inclusive)
    pub launch_start_days: i64,
    /// Max days since launch (inclusive)
    pub launch_end_days: i64,
    /// Report granularity: `group` (default) or `item`
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub granularity: Granularity,
}

impl ProductsQuery {
    fn window(&self) -> LaunchWindow {
        LaunchWindow {
            start_days: self.launch_start_days,
            end_days: self.launch_end_days,
        }
    }
}

/// Resolve the tenant schema, load facts over a dedicated connection and
/// aggregate. The connection is released before any error surfaces.
async fn compute_rows(
    state: &AppState,
    query: &ProductsQuery,
    today: NaiveDate,
) -> Result<Vec<ReportRow>, ApiError> {
    let schema = state.schemas.resolve(&query.db_name)?;
    let db = state.connect(&query.db_name).await?;
    let facts = load_facts(&db, &query.db_name, schema, query.window(), today).await;
    let _ = db.close().await;
    let facts = facts?;
    Ok(aggregate(&facts, today, query.granularity))
}

#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    params(ProductsQuery),
    responses(
        (status = 200, description = "Nested sales-velocity report for the tenant database"),
        (status = 404, description = "Unknown tenant database"),
        (status = 502, description = "Tenant data store unreachable or failing")
    )
)]
#[tracing::instrument(name = "GET /products", skip(state))]
pub async fn products(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Result<Json<ProductReport>, ApiError> {
    let today = Utc::now().date_naive();
    let rows = compute_rows(&state, &query, today).await?;
    Ok(Json(nested_report(
        &query.db_name,
        query.window(),
        today,
        rows,
    )))
}

#[utoipa::path(
    get,
    path = "/products/export",
    tag = "products",
    params(ProductsQuery),
    responses(
        (status = 200, description = "Flat CSV export, one row per size variant"),
        (status = 404, description = "Unknown tenant database"),
        (status = 502, description = "Tenant data store unreachable or failing")
    )
)]
#[tracing::instrument(name = "GET /products/export", skip(state))]
pub async fn export_products(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Result<Response, ApiError> {
    let today = Utc::now().date_naive();
    let rows = compute_rows(&state, &query, today).await?;
    let body = write_csv(&flat_rows(&rows))?;
    let filename = export_filename(today);

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "text/csv; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}
