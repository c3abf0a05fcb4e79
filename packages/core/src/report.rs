//! Report shaping.
//!
//! Reshapes aggregated rows into the two delivery formats: the nested
//! document returned as JSON, and the flat one-row-per-variant table used
//! for CSV export. No aggregation logic lives here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::facts::LaunchWindow;
use crate::metrics::{ReportRow, VariantDetail};

pub const REPORT_STATUS_SUCCESS: &str = "Success";

/// Size coverage of one product group: `size` is the
/// `"{in_stock}/{total}"` ratio over the variant rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeSummary {
    pub size: String,
    pub sizewise: Vec<VariantDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductEntry {
    pub item_name: String,
    pub item_type: Option<String>,
    pub product_type: Option<String>,
    pub day_since_launch: Option<i64>,
    pub current_stock: i64,
    pub sale_price: Option<f64>,
    pub total_quantity_sold: i64,
    pub total_views: i64,
    pub total_atc: i64,
    pub total_stock_percentage_sold: f64,
    pub projected_days_to_sell_out: f64,
    pub per_day_qty_average: f64,
    pub size_summary: SizeSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductReport {
    pub status: String,
    pub database: String,
    pub launch_start_days: i64,
    pub launch_end_days: i64,
    pub today: NaiveDate,
    pub products: Vec<ProductEntry>,
}

/// One CSV line: group-level fields repeated for every size variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRow {
    pub item_id: i64,
    pub item_name: String,
    pub item_type: Option<String>,
    pub product_type: Option<String>,
    pub day_since_launch: Option<i64>,
    pub current_stock: i64,
    pub sale_price: Option<f64>,
    pub total_quantity_sold: i64,
    pub total_views: i64,
    pub total_atc: i64,
    pub total_stock_percentage_sold: f64,
    pub projected_days_to_sell_out: f64,
    pub per_day_qty_average: f64,
    pub size_summary: String,
    pub size: Option<String>,
    pub variant_stock: Option<i64>,
    pub variant_quantity_sold: Option<i64>,
    pub average_days_between_sales: Option<f64>,
    pub days_since_last_sold: Option<i64>,
}

fn coverage(row: &ReportRow) -> String {
    format!("{}/{}", row.variants_in_stock, row.total_variants)
}

/// Assemble the nested report document.
pub fn nested_report(
    database: &str,
    window: LaunchWindow,
    today: NaiveDate,
    rows: Vec<ReportRow>,
) -> ProductReport {
    let products = rows
        .into_iter()
        .map(|row| {
            let size = coverage(&row);
            ProductEntry {
                item_name: row.item_name,
                item_type: row.item_type,
                product_type: row.product_type,
                day_since_launch: row.day_since_launch,
                current_stock: row.current_stock,
                sale_price: row.sale_price,
                total_quantity_sold: row.total_quantity_sold,
                total_views: row.total_views,
                total_atc: row.total_atc,
                total_stock_percentage_sold: row.total_stock_percentage_sold,
                projected_days_to_sell_out: row.projected_days_to_sell_out,
                per_day_qty_average: row.per_day_qty_average,
                size_summary: SizeSummary {
                    size,
                    sizewise: row.sizewise,
                },
            }
        })
        .collect();

    ProductReport {
        status: REPORT_STATUS_SUCCESS.to_string(),
        database: database.to_string(),
        launch_start_days: window.start_days,
        launch_end_days: window.end_days,
        today,
        products,
    }
}

/// Flatten aggregated rows into one line per size variant. A group without
/// variant rows still emits a single line with empty variant columns.
pub fn flat_rows(rows: &[ReportRow]) -> Vec<FlatRow> {
    let mut flat = Vec::with_capacity(rows.len());
    for row in rows {
        let size_summary = coverage(row);
        let base = FlatRow {
            item_id: row.item_id,
            item_name: row.item_name.clone(),
            item_type: row.item_type.clone(),
            product_type: row.product_type.clone(),
            day_since_launch: row.day_since_launch,
            current_stock: row.current_stock,
            sale_price: row.sale_price,
            total_quantity_sold: row.total_quantity_sold,
            total_views: row.total_views,
            total_atc: row.total_atc,
            total_stock_percentage_sold: row.total_stock_percentage_sold,
            projected_days_to_sell_out: row.projected_days_to_sell_out,
            per_day_qty_average: row.per_day_qty_average,
            size_summary,
            size: None,
            variant_stock: None,
            variant_quantity_sold: None,
            average_days_between_sales: None,
            days_since_last_sold: None,
        };
        if row.sizewise.is_empty() {
            flat.push(base);
            continue;
        }
        for variant in &row.sizewise {
            flat.push(FlatRow {
                size: variant.size.clone(),
                variant_stock: Some(variant.current_stock),
                variant_quantity_sold: Some(variant.total_quantity_sold),
                average_days_between_sales: variant.average_days_between_sales,
                days_since_last_sold: variant.days_since_last_sold,
                ..base.clone()
            });
        }
    }
    flat
}

/// Serialize flat rows as CSV with a single header line.
pub fn write_csv(rows: &[FlatRow]) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ReportError::computation(format!("csv serialization: {e}")))?;
    }
    writer
        .into_inner()
        .map_err(|e| ReportError::computation(format!("csv flush: {e}")))
}

/// Download filename for a CSV export produced on `today`.
pub fn export_filename(today: NaiveDate) -> String {
    format!("products_{}.csv", today.format("%Y-%m-%d"))
}
