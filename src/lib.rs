//! # product_dashboard
//!
//! `product_dashboard` loads a product catalogue CSV into a columnar, immutable
//! table and ranks product categories by a handful of descriptive metrics. It
//! supports:
//!
//! - Memory-mapped CSV loading with parallel, newline-aligned chunk parsing
//! - Cleaning: rows missing any required field are dropped and counted
//! - A derived `volume_cm3 = length * height * width` column
//! - Category selection ("select all" or an explicit list)
//! - Ranked aggregation: count or mean per category, descending, top N
//! - An LRU query cache so re-rendering the same selection is cheap
//! - Text, table and JSON renderers for the three dashboard charts
//!
//! # Required columns
//!
//! `product_category_name_english`, `product_length_cm`, `product_height_cm`,
//! `product_width_cm`, `product_photos_qty`. Other columns are ignored.
//!
//! # Example
//!
//! ```no_run
//! use product_dashboard::dashboard::{Dashboard, DashboardConfig, DataSession};
//! use product_dashboard::dashboard::render::{DEFAULT_BAR_WIDTH, render_text};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = DataSession::new(DashboardConfig::default());
//!     let mut dashboard = Dashboard::open(&session)?;
//!
//!     // All categories
//!     println!("{}", render_text(&dashboard.frame(), DEFAULT_BAR_WIDTH));
//!
//!     // Narrow down; only the aggregation step reruns
//!     let frame = dashboard.set_categories(vec!["toys".into(), "books".into()]);
//!     println!("{}", render_text(&frame, DEFAULT_BAR_WIDTH));
//!
//!     Ok(())
//! }
//! ```

pub mod dashboard;
pub mod product;

pub use dashboard::{Dashboard, DashboardConfig, DashboardFrame, DataSession};
pub use product::{AggregateResult, DashboardError, Metric, NumericField};
pub use product::{product_table::ProductTable, selection::CategorySelection};
