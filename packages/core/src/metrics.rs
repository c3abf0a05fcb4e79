//! Metric aggregation.
//!
//! Pure computation over the loaded fact tables: grouping, rollups and the
//! time-normalized velocity metrics. `today` is injected so the whole
//! pipeline is deterministic under test. Rounding is half-up to two
//! decimals, and every division by zero yields 0 instead of an error.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::facts::{FactTables, ItemRecord, SizeRow};

/// Report granularity. `Group` (the canonical contract) emits one row per
/// `(item_name, product_group)`; `Item` emits one row per item variant,
/// ordered by item name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Group,
    Item,
}

/// Per-variant entry of the size-wise breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantDetail {
    pub size: Option<String>,
    pub current_stock: i64,
    pub total_quantity_sold: i64,
    pub average_days_between_sales: Option<f64>,
    pub days_since_last_sold: Option<i64>,
}

/// One aggregated report row (a product group, or a single variant in
/// item granularity).
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
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
    pub per_day_qty_average: f64,
    pub projected_days_to_sell_out: f64,
    pub days_active: Option<i64>,
    pub last_sale_days_ago: Option<i64>,
    pub variants_in_stock: usize,
    pub total_variants: usize,
    pub sizewise: Vec<VariantDetail>,
}

/// Round half-up to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Most frequent price among the variants, ties broken by the first
/// encountered value. Backed by an ordered frequency scan so tie-breaking
/// stays deterministic.
fn price_mode(prices: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for price in prices {
        match counts.iter_mut().find(|(value, _)| *value == price) {
            Some((_, count)) => *count += 1,
            None => counts.push((price, 1)),
        }
    }
    let mut best: Option<(f64, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

struct GroupKey {
    item_name: String,
    product_group: Option<String>,
    variant: Option<i64>,
}

/// Aggregate the fact tables into report rows.
///
/// Groups are emitted in the order first encountered while scanning the
/// item list; item granularity re-orders by item name afterwards.
pub fn aggregate(facts: &FactTables, today: NaiveDate, granularity: Granularity) -> Vec<ReportRow> {
    let mut order: Vec<GroupKey> = Vec::new();
    let mut members: HashMap<(String, Option<String>, Option<i64>), Vec<&ItemRecord>> =
        HashMap::new();

    for item in &facts.items {
        let variant = match granularity {
            Granularity::Group => None,
            Granularity::Item => Some(item.item_id),
        };
        let key = (item.item_name.clone(), item.product_group.clone(), variant);
        let slot = members.entry(key).or_default();
        if slot.is_empty() {
            order.push(GroupKey {
                item_name: item.item_name.clone(),
                product_group: item.product_group.clone(),
                variant,
            });
        }
        slot.push(item);
    }

    let mut rows: Vec<ReportRow> = order
        .iter()
        .map(|key| {
            let variants = &members[&(
                key.item_name.clone(),
                key.product_group.clone(),
                key.variant,
            )];
            build_row(key, variants, facts, today)
        })
        .collect();

    if granularity == Granularity::Item {
        rows.sort_by(|a, b| a.item_name.cmp(&b.item_name));
    }

    rows
}

fn build_row(
    key: &GroupKey,
    variants: &[&ItemRecord],
    facts: &FactTables,
    today: NaiveDate,
) -> ReportRow {
    let item_id = variants.iter().map(|v| v.item_id).min().unwrap_or_default();
    let item_type = variants.iter().find_map(|v| v.item_type.clone());

    let current_stock: i64 = variants.iter().map(|v| v.current_stock).sum();
    let sale_price = price_mode(variants.iter().filter_map(|v| v.sale_price));

    let total_quantity_sold: i64 = variants
        .iter()
        .map(|v| facts.qty_sold_by_item.get(&v.item_id).copied().unwrap_or(0))
        .sum();

    let (total_views, total_atc) = facts
        .views_atc_by_group
        .get(&(key.item_name.clone(), key.product_group.clone()))
        .copied()
        .unwrap_or((0, 0));

    let sizewise: Vec<VariantDetail> = variants
        .iter()
        .flat_map(|v| {
            facts
                .size_rows_by_item
                .get(&v.item_id)
                .map(Vec::as_slice)
                .unwrap_or_default()
        })
        .map(|row: &SizeRow| VariantDetail {
            size: row.size.clone(),
            current_stock: row.current_stock,
            total_quantity_sold: row.total_quantity_sold,
            average_days_between_sales: row.average_days_between_sales.map(round2),
            days_since_last_sold: row.days_since_last_sold,
        })
        .collect();

    let total_variants = sizewise.len();
    let variants_in_stock = sizewise.iter().filter(|v| v.current_stock > 0).count();

    let launch_date = variants.iter().filter_map(|v| v.launch_date).min();
    let day_since_launch = launch_date.map(|launch| (today - launch).num_days());

    let last_sale_days_ago = sizewise
        .iter()
        .filter_map(|v| v.days_since_last_sold)
        .min();

    // A fully sold-out group stopped being sellable at its last sale; an
    // active or never-sold group has been sellable since launch.
    let days_active = match (current_stock, last_sale_days_ago, launch_date) {
        (0, Some(ago), Some(launch)) => {
            let last_sale_date = today - Duration::days(ago);
            Some((last_sale_date - launch).num_days())
        }
        _ => day_since_launch,
    };

    let sold_denominator = total_quantity_sold + current_stock;
    let total_stock_percentage_sold = if sold_denominator == 0 {
        0.0
    } else {
        round2(100.0 * total_quantity_sold as f64 / sold_denominator as f64)
    };

    let per_day_qty_average = match days_active {
        Some(days) if days != 0 => round2(total_quantity_sold as f64 / days as f64),
        _ => 0.0,
    };

    let projected_days_to_sell_out = if per_day_qty_average == 0.0 {
        0.0
    } else {
        round2(current_stock as f64 / per_day_qty_average)
    };

    ReportRow {
        item_id,
        item_name: key.item_name.clone(),
        item_type,
        product_type: key.product_group.clone(),
        day_since_launch,
        current_stock,
        sale_price,
        total_quantity_sold,
        total_views,
        total_atc,
        total_stock_percentage_sold,
        per_day_qty_average,
        projected_days_to_sell_out,
        days_active,
        last_sale_days_ago,
        variants_in_stock,
        total_variants,
        sizewise,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{ItemRecord, SizeRow};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item(
        item_id: i64,
        name: &str,
        group: &str,
        launch: NaiveDate,
        stock: i64,
        price: f64,
        size: &str,
    ) -> ItemRecord {
        ItemRecord {
            item_id,
            item_name: name.to_string(),
            item_type: Some("Apparel".to_string()),
            product_group: Some(group.to_string()),
            launch_date: Some(launch),
            current_stock: stock,
            sale_price: Some(price),
            size: Some(size.to_string()),
        }
    }

    fn size_row(
        item_id: i64,
        size: &str,
        stock: i64,
        sold: i64,
        avg_gap: Option<f64>,
        last_sold: Option<i64>,
    ) -> SizeRow {
        SizeRow {
            item_id,
            size: Some(size.to_string()),
            current_stock: stock,
            total_quantity_sold: sold,
            average_days_between_sales: avg_gap,
            days_since_last_sold: last_sold,
        }
    }

    /// "Dress A": launched 30 days ago, fully out of stock, size S sold 5
    /// (last 10 days ago) and size M sold 3 (last 20 days ago).
    fn dress_a_facts(today: NaiveDate) -> FactTables {
        let launch = today - Duration::days(30);
        let mut facts = FactTables {
            items: vec![
                item(1, "Dress A", "Dresses", launch, 0, 49.0, "S"),
                item(2, "Dress A", "Dresses", launch, 0, 49.0, "M"),
            ],
            ..Default::default()
        };
        facts.qty_sold_by_item.insert(1, 5);
        facts.qty_sold_by_item.insert(2, 3);
        facts
            .size_rows_by_item
            .insert(1, vec![size_row(1, "S", 0, 5, Some(4.0), Some(10))]);
        facts
            .size_rows_by_item
            .insert(2, vec![size_row(2, "M", 0, 3, Some(5.0), Some(20))]);
        facts
            .views_atc_by_group
            .insert(("Dress A".to_string(), Some("Dresses".to_string())), (120, 14));
        facts
    }

    #[test]
    fn test_dress_a_scenario() {
        let today = date(2025, 6, 30);
        let rows = aggregate(&dress_a_facts(today), today, Granularity::Group);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.item_id, 1);
        assert_eq!(row.current_stock, 0);
        assert_eq!(row.total_quantity_sold, 8);
        assert_eq!(row.last_sale_days_ago, Some(10));
        assert_eq!(row.days_active, Some(20));
        assert_eq!(row.per_day_qty_average, 0.4);
        assert_eq!(row.projected_days_to_sell_out, 0.0);
        assert_eq!(row.total_stock_percentage_sold, 100.0);
        assert_eq!(row.total_views, 120);
        assert_eq!(row.total_atc, 14);
        assert_eq!(row.variants_in_stock, 0);
        assert_eq!(row.total_variants, 2);
    }

    /// "Top B": launched 10 days ago, 50 in stock, never sold.
    #[test]
    fn test_top_b_scenario() {
        let today = date(2025, 6, 30);
        let launch = today - Duration::days(10);
        let mut facts = FactTables {
            items: vec![item(7, "Top B", "Tops", launch, 50, 19.0, "S")],
            ..Default::default()
        };
        facts
            .size_rows_by_item
            .insert(7, vec![size_row(7, "S", 50, 0, None, None)]);

        let rows = aggregate(&facts, today, Granularity::Group);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.total_quantity_sold, 0);
        assert_eq!(row.total_stock_percentage_sold, 0.0);
        assert_eq!(row.per_day_qty_average, 0.0);
        assert_eq!(row.projected_days_to_sell_out, 0.0);
        assert_eq!(row.days_active, Some(10));
        assert_eq!(row.last_sale_days_ago, None);
    }

    #[test]
    fn test_days_active_equals_launch_age_while_stock_remains() {
        let today = date(2025, 6, 30);
        let launch = today - Duration::days(25);
        let mut facts = FactTables {
            items: vec![item(3, "Skirt C", "Skirts", launch, 4, 29.0, "L")],
            ..Default::default()
        };
        facts.qty_sold_by_item.insert(3, 6);
        facts
            .size_rows_by_item
            .insert(3, vec![size_row(3, "L", 4, 6, Some(3.0), Some(2))]);

        let rows = aggregate(&facts, today, Granularity::Group);
        let row = &rows[0];
        assert_eq!(row.days_active, Some(25));
        assert_eq!(row.per_day_qty_average, round2(6.0 / 25.0));
        assert!(row.projected_days_to_sell_out > 0.0);
    }

    #[test]
    fn test_percentage_sold_within_bounds() {
        let today = date(2025, 6, 30);
        let launch = today - Duration::days(40);
        for (stock, sold) in [(0i64, 0i64), (10, 0), (0, 10), (7, 3), (1, 999)] {
            let mut facts = FactTables {
                items: vec![item(1, "X", "G", launch, stock, 10.0, "S")],
                ..Default::default()
            };
            facts.qty_sold_by_item.insert(1, sold);
            facts.size_rows_by_item.insert(
                1,
                vec![size_row(1, "S", stock, sold, None, (sold > 0).then_some(1))],
            );
            let rows = aggregate(&facts, today, Granularity::Group);
            let pct = rows[0].total_stock_percentage_sold;
            assert!((0.0..=100.0).contains(&pct), "pct {pct} out of bounds");
            if stock == 0 && sold == 0 {
                assert_eq!(pct, 0.0);
            }
        }
    }

    #[test]
    fn test_price_mode_prefers_most_frequent() {
        assert_eq!(price_mode([10.0, 20.0, 20.0, 30.0]), Some(20.0));
    }

    #[test]
    fn test_price_mode_tie_breaks_on_first_encountered() {
        assert_eq!(price_mode([30.0, 10.0, 10.0, 30.0]), Some(30.0));
        assert_eq!(price_mode([10.0, 30.0, 30.0, 10.0]), Some(10.0));
    }

    #[test]
    fn test_price_mode_empty() {
        assert_eq!(price_mode(Vec::<f64>::new()), None);
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(1.0 / 3.0), 0.33);
        assert_eq!(round2(2.0 / 3.0), 0.67);
        assert_eq!(round2(8.0 / 20.0), 0.4);
    }

    #[test]
    fn test_groups_emitted_in_first_encounter_order() {
        let today = date(2025, 6, 30);
        let launch = today - Duration::days(5);
        let facts = FactTables {
            items: vec![
                item(5, "Zeta", "G", launch, 1, 10.0, "S"),
                item(6, "Alpha", "G", launch, 1, 10.0, "S"),
                item(8, "Zeta", "G", launch, 1, 10.0, "M"),
            ],
            ..Default::default()
        };
        let rows = aggregate(&facts, today, Granularity::Group);
        let names: Vec<&str> = rows.iter().map(|r| r.item_name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha"]);
        assert_eq!(rows[0].item_id, 5);
    }

    #[test]
    fn test_item_granularity_orders_by_name() {
        let today = date(2025, 6, 30);
        let launch = today - Duration::days(5);
        let facts = FactTables {
            items: vec![
                item(5, "Zeta", "G", launch, 1, 10.0, "S"),
                item(6, "Alpha", "G", launch, 1, 10.0, "S"),
                item(8, "Zeta", "G", launch, 1, 10.0, "M"),
            ],
            ..Default::default()
        };
        let rows = aggregate(&facts, today, Granularity::Item);
        let ids: Vec<i64> = rows.iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![6, 5, 8]);
    }

    #[test]
    fn test_engagement_defaults_to_zero() {
        let today = date(2025, 6, 30);
        let launch = today - Duration::days(5);
        let facts = FactTables {
            items: vec![item(1, "Quiet", "G", launch, 1, 10.0, "S")],
            ..Default::default()
        };
        let rows = aggregate(&facts, today, Granularity::Group);
        assert_eq!(rows[0].total_views, 0);
        assert_eq!(rows[0].total_atc, 0);
    }

    #[test]
    fn test_missing_launch_date_yields_zero_rates() {
        let today = date(2025, 6, 30);
        let mut facts = FactTables {
            items: vec![ItemRecord {
                item_id: 9,
                item_name: "NoLaunch".to_string(),
                item_type: None,
                product_group: Some("G".to_string()),
                launch_date: None,
                current_stock: 3,
                sale_price: None,
                size: None,
            }],
            ..Default::default()
        };
        facts.qty_sold_by_item.insert(9, 2);
        let rows = aggregate(&facts, today, Granularity::Group);
        let row = &rows[0];
        assert_eq!(row.day_since_launch, None);
        assert_eq!(row.days_active, None);
        assert_eq!(row.per_day_qty_average, 0.0);
        assert_eq!(row.projected_days_to_sell_out, 0.0);
    }
}
