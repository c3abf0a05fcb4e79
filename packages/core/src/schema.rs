//! Per-tenant schema resolution.
//!
//! Tenant databases share the same logical model (items, sales, view/ATC
//! buckets) but differ in which optional columns exist. Instead of checking
//! for columns at every access site, each tenant registers a fixed
//! [`TenantSchema`] up front: the native column names plus capability flags.
//! Resolution happens once per request; everything downstream works against
//! the canonical shape.

use serde::{Deserialize, Serialize};

use crate::error::ReportError;

/// Which column carries the product-group value for a tenant. Exactly one of
/// the two exists per tenant schema; `Category` wins when both would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingColumn {
    Category,
    ProductType,
}

impl GroupingColumn {
    pub fn native(&self) -> &'static str {
        match self {
            Self::Category => "Category",
            Self::ProductType => "Product_Type",
        }
    }

    fn select(has_category: bool, has_product_type: bool) -> Self {
        if has_category {
            Self::Category
        } else {
            debug_assert!(has_product_type);
            Self::ProductType
        }
    }
}

/// Native column names for the `items` table of one tenant.
#[derive(Debug, Clone)]
pub struct ItemShape {
    pub table: &'static str,
    pub id: &'static str,
    pub name: &'static str,
    pub item_type: &'static str,
    pub stock: &'static str,
    pub price: &'static str,
    pub launch_date: &'static str,
    pub size: &'static str,
    pub grouping: GroupingColumn,
    pub has_size: bool,
}

/// Native column names for the `sale` fact table.
#[derive(Debug, Clone)]
pub struct SaleShape {
    pub table: &'static str,
    pub item_id: &'static str,
    pub date: &'static str,
    pub quantity: &'static str,
}

/// Native column names for the view/add-to-cart bucket table.
#[derive(Debug, Clone)]
pub struct ViewShape {
    pub table: &'static str,
    pub item_id: &'static str,
    pub viewed: &'static str,
    pub added_to_cart: &'static str,
}

#[derive(Debug, Clone)]
pub struct TenantSchema {
    pub item: ItemShape,
    pub sale: SaleShape,
    pub view: ViewShape,
}

impl TenantSchema {
    fn with_capabilities(has_category: bool, has_product_type: bool, has_size: bool) -> Self {
        Self {
            item: ItemShape {
                table: "items",
                id: "Item_Id",
                name: "Item_Name",
                item_type: "Item_Type",
                stock: "Current_Stock",
                price: "Sale_Price",
                launch_date: "__Launch_Date",
                size: "Size",
                grouping: GroupingColumn::select(has_category, has_product_type),
                has_size,
            },
            sale: SaleShape {
                table: "sale",
                item_id: "Item_Id",
                date: "Date",
                quantity: "Quantity",
            },
            view: ViewShape {
                table: "viewsatc",
                item_id: "Item_Id",
                viewed: "Items_Viewed",
                added_to_cart: "Items_Addedtocart",
            },
        }
    }
}

/// Registry of known tenants. Lookup is the only operation; registration is
/// static at construction time.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    tenants: Vec<(&'static str, TenantSchema)>,
}

impl SchemaRegistry {
    /// Registry of the production tenant databases.
    pub fn with_known_tenants() -> Self {
        Self {
            tenants: vec![
                ("zing", TenantSchema::with_capabilities(true, false, true)),
                (
                    "prathiksham",
                    TenantSchema::with_capabilities(true, false, true),
                ),
                (
                    "beelittle",
                    TenantSchema::with_capabilities(false, true, true),
                ),
                (
                    "adoreaboo",
                    TenantSchema::with_capabilities(true, false, false),
                ),
            ],
        }
    }

    pub fn resolve(&self, tenant: &str) -> Result<&TenantSchema, ReportError> {
        self.tenants
            .iter()
            .find(|(name, _)| *name == tenant)
            .map(|(_, schema)| schema)
            .ok_or_else(|| ReportError::unknown_tenant(tenant))
    }

    pub fn tenant_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tenants.iter().map(|(name, _)| *name)
    }
}
