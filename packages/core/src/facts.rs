//! Fact loading.
//!
//! One report request issues a fixed sequence of read-only queries against
//! the tenant database and returns plain in-memory tables. Queries are built
//! from the resolved [`TenantSchema`] because column names vary per tenant;
//! all numeric columns are cast in SQL so the driver hands back uniform
//! types regardless of how a tenant declared them (DECIMAL vs FLOAT stock
//! prices, INT vs BIGINT ids).

use std::collections::HashMap;

use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};

use crate::error::ReportError;
use crate::schema::TenantSchema;

/// Inclusive bounds on days-since-launch. An inverted window (`start > end`)
/// is a valid query that matches nothing.
#[derive(Debug, Clone, Copy)]
pub struct LaunchWindow {
    pub start_days: i64,
    pub end_days: i64,
}

/// One stocked item variant inside the launch window.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub item_id: i64,
    pub item_name: String,
    pub item_type: Option<String>,
    pub product_group: Option<String>,
    pub launch_date: Option<NaiveDate>,
    pub current_stock: i64,
    pub sale_price: Option<f64>,
    pub size: Option<String>,
}

/// Per-variant sales detail: one row per loaded item variant.
#[derive(Debug, Clone)]
pub struct SizeRow {
    pub item_id: i64,
    pub size: Option<String>,
    pub current_stock: i64,
    pub total_quantity_sold: i64,
    /// Mean gap between consecutive distinct sale dates. Undefined with
    /// fewer than two distinct dates.
    pub average_days_between_sales: Option<f64>,
    /// Days since the most recent sale. `None` means never sold, which is
    /// distinct from "sold today" (`Some(0)`).
    pub days_since_last_sold: Option<i64>,
}

/// The raw tables a report computation runs on.
#[derive(Debug, Default)]
pub struct FactTables {
    pub items: Vec<ItemRecord>,
    pub qty_sold_by_item: HashMap<i64, i64>,
    pub views_atc_by_group: HashMap<(String, Option<String>), (i64, i64)>,
    pub size_rows_by_item: HashMap<i64, Vec<SizeRow>>,
}

fn items_sql(schema: &TenantSchema) -> String {
    let item = &schema.item;
    let size_expr = if item.has_size {
        format!("i.`{}`", item.size)
    } else {
        "NULL".to_string()
    };
    format!(
        "SELECT CAST(i.`{id}` AS SIGNED) AS item_id, \
         i.`{name}` AS item_name, \
         i.`{item_type}` AS item_type, \
         i.`{group}` AS product_group, \
         i.`{launch}` AS launch_date, \
         CAST(IFNULL(i.`{stock}`, 0) AS SIGNED) AS current_stock, \
         CAST(i.`{price}` AS DOUBLE) AS sale_price, \
         {size_expr} AS size \
         FROM `{table}` i \
         WHERE DATEDIFF(CURRENT_DATE, i.`{launch}`) BETWEEN ? AND ?",
        id = item.id,
        name = item.name,
        item_type = item.item_type,
        group = item.grouping.native(),
        launch = item.launch_date,
        stock = item.stock,
        price = item.price,
        table = item.table,
    )
}

fn qty_sold_sql(schema: &TenantSchema) -> String {
    let sale = &schema.sale;
    format!(
        "SELECT CAST(s.`{item_id}` AS SIGNED) AS item_id, \
         CAST(IFNULL(SUM(s.`{quantity}`), 0) AS SIGNED) AS total_quantity_sold \
         FROM `{table}` s \
         WHERE s.`{item_id}` IS NOT NULL \
         GROUP BY s.`{item_id}`",
        item_id = sale.item_id,
        quantity = sale.quantity,
        table = sale.table,
    )
}

fn views_atc_sql(schema: &TenantSchema) -> String {
    let item = &schema.item;
    let view = &schema.view;
    format!(
        "SELECT i.`{name}` AS item_name, \
         i.`{group}` AS product_group, \
         CAST(IFNULL(SUM(v.`{viewed}`), 0) AS SIGNED) AS total_views, \
         CAST(IFNULL(SUM(v.`{atc}`), 0) AS SIGNED) AS total_atc \
         FROM `{view_table}` v \
         JOIN `{item_table}` i ON i.`{item_id}` = v.`{view_item_id}` \
         GROUP BY i.`{name}`, i.`{group}`",
        name = item.name,
        group = item.grouping.native(),
        viewed = view.viewed,
        atc = view.added_to_cart,
        view_table = view.table,
        item_table = item.table,
        item_id = item.id,
        view_item_id = view.item_id,
    )
}

fn sale_dates_sql(schema: &TenantSchema) -> String {
    let sale = &schema.sale;
    format!(
        "SELECT CAST(s.`{item_id}` AS SIGNED) AS item_id, s.`{date}` AS sale_date \
         FROM `{table}` s \
         WHERE s.`{item_id}` IS NOT NULL AND s.`{date}` IS NOT NULL \
         ORDER BY s.`{item_id}`, s.`{date}`",
        item_id = sale.item_id,
        date = sale.date,
        table = sale.table,
    )
}

/// Gap statistics over an ascending list of sale dates: mean days between
/// consecutive distinct dates, and days since the most recent one.
fn sale_gap_stats(dates: &[NaiveDate], today: NaiveDate) -> (Option<f64>, Option<i64>) {
    let last = match dates.last() {
        Some(last) => *last,
        None => return (None, None),
    };
    let days_since_last = (today - last).num_days();

    let mut distinct: Vec<NaiveDate> = dates.to_vec();
    distinct.dedup();
    let average = if distinct.len() < 2 {
        None
    } else {
        let total: i64 = distinct
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_days())
            .sum();
        Some(total as f64 / (distinct.len() - 1) as f64)
    };

    (average, Some(days_since_last))
}

/// Load the four fact tables for one report request.
///
/// The connection is dedicated to this request; the caller releases it once
/// the computation is done. Any data-access error aborts the whole load.
pub async fn load_facts(
    db: &DatabaseConnection,
    tenant: &str,
    schema: &TenantSchema,
    window: LaunchWindow,
    today: NaiveDate,
) -> Result<FactTables, ReportError> {
    let wrap = |source: sea_orm::DbErr| ReportError::data_source(tenant, source);

    let item_rows = db
        .query_all(Statement::from_sql_and_values(
            DbBackend::MySql,
            items_sql(schema),
            [window.start_days.into(), window.end_days.into()],
        ))
        .await
        .map_err(wrap)?;

    let mut items = Vec::with_capacity(item_rows.len());
    for row in item_rows {
        items.push(ItemRecord {
            item_id: row.try_get::<i64>("", "item_id").map_err(wrap)?,
            item_name: row
                .try_get::<Option<String>>("", "item_name")
                .map_err(wrap)?
                .unwrap_or_default(),
            item_type: row.try_get("", "item_type").map_err(wrap)?,
            product_group: row.try_get("", "product_group").map_err(wrap)?,
            launch_date: row.try_get("", "launch_date").map_err(wrap)?,
            current_stock: row.try_get::<i64>("", "current_stock").map_err(wrap)?,
            sale_price: row.try_get("", "sale_price").map_err(wrap)?,
            size: row.try_get("", "size").map_err(wrap)?,
        });
    }

    let qty_rows = db
        .query_all(Statement::from_string(
            DbBackend::MySql,
            qty_sold_sql(schema),
        ))
        .await
        .map_err(wrap)?;

    let mut qty_sold_by_item = HashMap::with_capacity(qty_rows.len());
    for row in qty_rows {
        let item_id = row.try_get::<i64>("", "item_id").map_err(wrap)?;
        let qty = row
            .try_get::<i64>("", "total_quantity_sold")
            .map_err(wrap)?;
        qty_sold_by_item.insert(item_id, qty);
    }

    let view_rows = db
        .query_all(Statement::from_string(
            DbBackend::MySql,
            views_atc_sql(schema),
        ))
        .await
        .map_err(wrap)?;

    let mut views_atc_by_group = HashMap::with_capacity(view_rows.len());
    for row in view_rows {
        let name = row
            .try_get::<Option<String>>("", "item_name")
            .map_err(wrap)?
            .unwrap_or_default();
        let group = row
            .try_get::<Option<String>>("", "product_group")
            .map_err(wrap)?;
        let views = row.try_get::<i64>("", "total_views").map_err(wrap)?;
        let atc = row.try_get::<i64>("", "total_atc").map_err(wrap)?;
        views_atc_by_group.insert((name, group), (views, atc));
    }

    let date_rows = db
        .query_all(Statement::from_string(
            DbBackend::MySql,
            sale_dates_sql(schema),
        ))
        .await
        .map_err(wrap)?;

    let mut sale_dates_by_item: HashMap<i64, Vec<NaiveDate>> = HashMap::new();
    for row in date_rows {
        let item_id = row.try_get::<i64>("", "item_id").map_err(wrap)?;
        let date = row.try_get::<NaiveDate>("", "sale_date").map_err(wrap)?;
        sale_dates_by_item.entry(item_id).or_default().push(date);
    }

    let mut size_rows_by_item: HashMap<i64, Vec<SizeRow>> = HashMap::with_capacity(items.len());
    for item in &items {
        let dates = sale_dates_by_item
            .get(&item.item_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let (average_days_between_sales, days_since_last_sold) = sale_gap_stats(dates, today);
        size_rows_by_item
            .entry(item.item_id)
            .or_default()
            .push(SizeRow {
                item_id: item.item_id,
                size: item.size.clone(),
                current_stock: item.current_stock,
                total_quantity_sold: qty_sold_by_item.get(&item.item_id).copied().unwrap_or(0),
                average_days_between_sales,
                days_since_last_sold,
            });
    }

    tracing::debug!(
        tenant,
        items = items.len(),
        sold_groups = qty_sold_by_item.len(),
        view_groups = views_atc_by_group.len(),
        "loaded fact tables"
    );

    Ok(FactTables {
        items,
        qty_sold_by_item,
        views_atc_by_group,
        size_rows_by_item,
    })
}
