use std::cell::OnceCell;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::rc::Rc;

use serde::Serialize;

use crate::product::product_table::ProductTable;
use crate::product::query_builder::QueryCache;
use crate::product::selection::CategorySelection;
use crate::product::{
    AggregateResult, DEFAULT_TOP_N, DashboardError, Metric, NumericField, ParseSummary,
};

pub mod render;

/// Default source location, relative to the working directory
pub const DEFAULT_DATA_PATH: &str = "dashboard/product_final.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    /// Bars per chart
    pub top_n: usize,
    /// Initial state of the "select all categories" toggle
    pub select_all: bool,
    pub cache_capacity: NonZeroUsize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            top_n: DEFAULT_TOP_N,
            select_all: true,
            cache_capacity: NonZeroUsize::new(128).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

/// Owns the loaded product table for the lifetime of a session.
///
/// The table is read from disk on first access and handed out as a shared,
/// immutable `Rc` afterwards. Only [`DataSession::clear_cache`] forces a reload.
#[derive(Debug)]
pub struct DataSession {
    config: DashboardConfig,
    table: OnceCell<(Rc<ProductTable>, ParseSummary)>,
}

impl DataSession {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            table: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.table.get().is_some()
    }

    pub fn table(&self) -> Result<Rc<ProductTable>, DashboardError> {
        self.load().map(|(table, _)| Rc::clone(table))
    }

    /// Summary of the load that produced the cached table
    pub fn summary(&self) -> Result<&ParseSummary, DashboardError> {
        self.load().map(|(_, summary)| summary)
    }

    fn load(&self) -> Result<&(Rc<ProductTable>, ParseSummary), DashboardError> {
        if let Some(loaded) = self.table.get() {
            return Ok(loaded);
        }
        let (table, summary) = ProductTable::load_csv(&self.config.data_path)?;
        Ok(self.table.get_or_init(|| (Rc::new(table), summary)))
    }

    /// Drop the cached table; the next access reads the file again
    pub fn clear_cache(&mut self) {
        if self.table.take().is_some() {
            log::info!("cleared cached table for {}", self.config.data_path.display());
        }
    }
}

/// One chart region of the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPanel {
    pub title: String,
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub result: AggregateResult,
}

/// Everything rendered for one selection state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardFrame {
    pub select_all: bool,
    pub selection: CategorySelection,
    pub panels: Vec<ChartPanel>,
}

impl DashboardFrame {
    pub fn panel(&self, metric: Metric) -> Option<&ChartPanel> {
        self.panels.iter().find(|p| p.result.metric == metric)
    }
}

/// Chart definitions in tab order: (metric, title stem, x-axis label)
pub const CHARTS: [(Metric, &str, &str); 3] = [
    (Metric::Count, "by product count", "Product count"),
    (
        Metric::Mean(NumericField::PhotosQty),
        "by average photo count",
        "Average photo count",
    ),
    (
        Metric::Mean(NumericField::VolumeCm3),
        "by average volume",
        "Average volume (cm³)",
    ),
];

const CATEGORY_AXIS_LABEL: &str = "Product category";

/// Selection state plus event handlers.
///
/// Each handler updates the selection and returns a freshly computed frame;
/// the table is never reloaded by a selection change.
#[derive(Debug)]
pub struct Dashboard {
    table: Rc<ProductTable>,
    cache: Rc<QueryCache>,
    top_n: usize,
    select_all: bool,
    chosen: Vec<String>,
}

impl Dashboard {
    pub fn new(table: Rc<ProductTable>, config: &DashboardConfig) -> Self {
        Self {
            table,
            cache: Rc::new(QueryCache::with_capacity(config.cache_capacity)),
            top_n: config.top_n,
            select_all: config.select_all,
            chosen: Vec::new(),
        }
    }

    /// Load through `session` and build a dashboard over the cached table
    pub fn open(session: &DataSession) -> Result<Self, DashboardError> {
        Ok(Self::new(session.table()?, session.config()))
    }

    pub fn table(&self) -> &Rc<ProductTable> {
        &self.table
    }

    /// Options for the category picker, ascending
    pub fn all_categories(&self) -> &[String] {
        self.table.distinct_categories()
    }

    pub fn select_all(&self) -> bool {
        self.select_all
    }

    pub fn selection(&self) -> CategorySelection {
        CategorySelection::resolve(&self.table, self.select_all, &self.chosen)
    }

    pub fn set_select_all(&mut self, select_all: bool) -> DashboardFrame {
        log::debug!("select all categories: {select_all}");
        self.select_all = select_all;
        if !select_all {
            self.chosen.clear();
        }
        self.frame()
    }

    /// Replace the explicit selection; this turns "select all" off
    pub fn set_categories(&mut self, categories: Vec<String>) -> DashboardFrame {
        log::debug!("selected {} categories", categories.len());
        self.select_all = false;
        self.chosen = categories;
        self.frame()
    }

    /// Add or remove one category from the current selection
    pub fn toggle_category(&mut self, category: &str) -> DashboardFrame {
        if self.select_all {
            self.chosen = self.table.distinct_categories().to_vec();
            self.select_all = false;
        }
        match self.chosen.iter().position(|c| c == category) {
            Some(idx) => {
                self.chosen.remove(idx);
            }
            None => self.chosen.push(category.to_string()),
        }
        log::debug!("toggled '{category}', {} selected", self.chosen.len());
        self.frame()
    }

    /// Swap in a reloaded table; cached query results are discarded
    pub fn replace_table(&mut self, table: Rc<ProductTable>) -> DashboardFrame {
        self.table = table;
        self.cache.clear();
        self.frame()
    }

    /// Recompute all three charts for the current selection
    pub fn frame(&self) -> DashboardFrame {
        let selection = self.selection();
        let panels = CHARTS
            .iter()
            .map(|&(metric, title, x_label)| ChartPanel {
                title: format!("Top {} categories {}", self.top_n, title),
                x_label,
                y_label: CATEGORY_AXIS_LABEL,
                result: self
                    .table
                    .query_with_cache(&self.cache)
                    .select(&selection)
                    .metric(metric)
                    .limit(self.top_n)
                    .execute(),
            })
            .collect();

        DashboardFrame {
            select_all: self.select_all,
            selection,
            panels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::AggregateValue;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CSV: &str = "product_category_name_english,product_length_cm,product_height_cm,product_width_cm,product_photos_qty\n\
                       toys,10,5,2,3\ntoys,8,4,2,5\nbooks,20,1,15,1\n";

    fn session_for(csv: &str) -> (NamedTempFile, DataSession) {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "{}", csv).unwrap();
        let config = DashboardConfig {
            data_path: tmp.path().to_path_buf(),
            ..DashboardConfig::default()
        };
        (tmp, DataSession::new(config))
    }

    #[test]
    fn test_session_loads_once() {
        let (_tmp, session) = session_for(CSV);
        assert!(!session.is_loaded());
        let a = session.table().unwrap();
        let b = session.table().unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(session.summary().unwrap().rows_retained, 3);
    }

    #[test]
    fn test_clear_cache_reloads() {
        let (_tmp, mut session) = session_for(CSV);
        let a = session.table().unwrap();
        session.clear_cache();
        assert!(!session.is_loaded());
        let b = session.table().unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_session_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let session = DataSession::new(DashboardConfig {
            data_path: dir.path().join("missing.csv"),
            ..DashboardConfig::default()
        });
        assert!(matches!(
            Dashboard::open(&session),
            Err(DashboardError::DataSourceNotFound { .. })
        ));
        assert!(!session.is_loaded());
    }

    #[test]
    fn test_frame_has_three_panels_in_order() {
        let (_tmp, session) = session_for(CSV);
        let dashboard = Dashboard::open(&session).unwrap();
        let frame = dashboard.frame();

        assert!(frame.select_all);
        assert_eq!(frame.selection.categories(), &["books", "toys"]);
        let metrics: Vec<Metric> = frame.panels.iter().map(|p| p.result.metric).collect();
        assert_eq!(metrics, CHARTS.iter().map(|c| c.0).collect::<Vec<_>>());
        assert_eq!(frame.panels[0].title, "Top 10 categories by product count");
        assert_eq!(frame.panels[2].x_label, "Average volume (cm³)");

        let volume = frame.panel(Metric::Mean(NumericField::VolumeCm3)).unwrap();
        assert_eq!(volume.result.entries[0].category, "books");
        assert_eq!(volume.result.entries[1].value, AggregateValue::Float(82.0));
    }

    #[test]
    fn test_selection_events() {
        let (_tmp, session) = session_for(CSV);
        let mut dashboard = Dashboard::open(&session).unwrap();

        let frame = dashboard.set_select_all(false);
        assert!(frame.selection.is_empty());
        assert!(frame.panels.iter().all(|p| p.result.is_empty()));

        let frame = dashboard.set_categories(vec!["books".into()]);
        assert_eq!(frame.panels[0].result.len(), 1);

        let frame = dashboard.toggle_category("toys");
        assert_eq!(frame.selection.categories(), &["books", "toys"]);
        let frame = dashboard.toggle_category("books");
        assert_eq!(frame.selection.categories(), &["toys"]);

        let frame = dashboard.set_select_all(true);
        assert_eq!(frame.panels[0].result.len(), 2);
    }

    #[test]
    fn test_toggle_from_select_all_removes_one() {
        let (_tmp, session) = session_for(CSV);
        let mut dashboard = Dashboard::open(&session).unwrap();
        let frame = dashboard.toggle_category("toys");
        assert!(!frame.select_all);
        assert_eq!(frame.selection.categories(), &["books"]);
    }

    #[test]
    fn test_top_n_from_config() {
        let (tmp, _) = session_for(CSV);
        let config = DashboardConfig {
            data_path: tmp.path().to_path_buf(),
            top_n: 1,
            ..DashboardConfig::default()
        };
        let dashboard = Dashboard::open(&DataSession::new(config)).unwrap();
        let frame = dashboard.frame();
        assert!(frame.panels.iter().all(|p| p.result.len() == 1));
        assert_eq!(frame.panels[1].title, "Top 1 categories by average photo count");
    }
}
