pub mod error;
pub mod facts;
pub mod metrics;
pub mod report;
pub mod schema;

pub use error::ReportError;
pub use facts::{FactTables, LaunchWindow, load_facts};
pub use metrics::{Granularity, ReportRow, aggregate};
pub use report::{ProductReport, export_filename, flat_rows, nested_report, write_csv};
pub use schema::{SchemaRegistry, TenantSchema};

pub use sea_orm;
