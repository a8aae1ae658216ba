use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use serde::Serialize;
use thiserror::Error;

pub mod column;
pub mod product_table;
pub mod query_builder;
pub mod selection;

pub const CATEGORY_COLUMN: &str = "product_category_name_english";
pub const LENGTH_COLUMN: &str = "product_length_cm";
pub const HEIGHT_COLUMN: &str = "product_height_cm";
pub const WIDTH_COLUMN: &str = "product_width_cm";
pub const PHOTOS_COLUMN: &str = "product_photos_qty";

/// Columns every source file must carry, in the order they are reported when missing
pub const REQUIRED_COLUMNS: [&str; 5] = [
    CATEGORY_COLUMN,
    LENGTH_COLUMN,
    HEIGHT_COLUMN,
    WIDTH_COLUMN,
    PHOTOS_COLUMN,
];

/// Number of bars a ranked chart shows unless configured otherwise
pub const DEFAULT_TOP_N: usize = 10;

/// Error type used across the crate
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Data source not found: {}", path.display())]
    DataSourceNotFound { path: PathBuf },

    #[error("Schema mismatch, missing required column(s): {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of loading a source file.
///
/// Rows that are dropped never fail the load; they are counted here so the
/// caller can decide whether to surface them.
#[derive(Debug, Clone, Default)]
pub struct ParseSummary {
    /// Data rows seen, excluding the header and blank lines
    pub rows_processed: usize,
    /// Rows kept in the table
    pub rows_retained: usize,
    /// Rows dropped because a required field was empty or NaN
    pub rows_dropped_null: usize,
    /// Rows dropped because a field could not be parsed or the row was ragged
    pub errors: Vec<ParseError>,
}

impl ParseSummary {
    pub fn rows_dropped(&self) -> usize {
        self.rows_processed - self.rows_retained
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// 1-based line number in the source file
    pub line: usize,
    pub column: String,
    pub value: String,
    pub error: Option<String>,
}

/// Numeric columns of a product table that can be averaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    LengthCm,
    HeightCm,
    WidthCm,
    PhotosQty,
    /// Derived: length * height * width
    VolumeCm3,
}

impl NumericField {
    pub fn column_name(self) -> &'static str {
        match self {
            NumericField::LengthCm => LENGTH_COLUMN,
            NumericField::HeightCm => HEIGHT_COLUMN,
            NumericField::WidthCm => WIDTH_COLUMN,
            NumericField::PhotosQty => PHOTOS_COLUMN,
            NumericField::VolumeCm3 => "volume_cm3",
        }
    }
}

/// Per-category metric computed by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Number of products in the category
    Count,
    /// Arithmetic mean of a numeric field over the category
    Mean(NumericField),
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Count => write!(f, "count"),
            Metric::Mean(field) => write!(f, "mean({})", field.column_name()),
        }
    }
}

/// A single metric value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregateValue {
    Int(i64),
    Float(f64),
}

impl AggregateValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            AggregateValue::Int(v) => *v as f64,
            AggregateValue::Float(v) => *v,
        }
    }
}

impl fmt::Display for AggregateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateValue::Int(v) => write!(f, "{v}"),
            AggregateValue::Float(v) => write!(f, "{v:.2}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateEntry {
    pub category: String,
    pub value: AggregateValue,
}

/// Ranked per-category result: sorted by value descending, then category ascending
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub metric: Metric,
    pub entries: Vec<AggregateEntry>,
}

impl AggregateResult {
    pub fn empty(metric: Metric) -> Self {
        Self {
            metric,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest value, i.e. the first entry's
    pub fn max_value(&self) -> Option<f64> {
        self.entries.first().map(|e| e.value.as_f64())
    }

    pub fn pairs(&self) -> Vec<(&str, f64)> {
        self.entries
            .iter()
            .map(|e| (e.category.as_str(), e.value.as_f64()))
            .collect()
    }
}

/// Cached query outputs
#[derive(Debug, Clone)]
pub enum OperationResult {
    Filter(Rc<Vec<usize>>),
    Ranked(AggregateResult),
}
