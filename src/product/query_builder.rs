use lru::LruCache;

use crate::product::product_table::ProductTable;
use crate::product::selection::CategorySelection;
use crate::product::{
    AggregateEntry, AggregateResult, AggregateValue, DEFAULT_TOP_N, Metric, OperationResult,
};
use std::cell::{Cell, RefCell};
use std::num::NonZeroUsize;
use std::rc::Rc;

const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(128) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

#[derive(Debug, Hash, Eq, PartialEq, Clone)]
pub enum QueryKey {
    /// `None` means no category filter
    Filter { categories: Option<Vec<String>> },
    Ranked {
        categories: Option<Vec<String>>,
        metric: Metric,
        limit: usize,
    },
}

/// LRU memo of filter row sets and ranked results for one table.
///
/// Keys do not identify the table, so a cache must be cleared whenever the
/// table it was filled from is replaced.
#[derive(Debug)]
pub struct QueryCache {
    cache: RefCell<LruCache<QueryKey, OperationResult>>,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            cache: RefCell::new(LruCache::new(capacity)),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<OperationResult> {
        let found = self.cache.borrow_mut().get(key).cloned();
        match found {
            Some(_) => self.hits.set(self.hits.get() + 1),
            None => self.misses.set(self.misses.get() + 1),
        }
        found
    }

    pub fn put(&self, key: QueryKey, value: OperationResult) {
        self.cache.borrow_mut().put(key, value);
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits.get(), self.misses.get())
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a ranked per-category aggregation:
/// filter by selection, group by category, reduce, sort descending, take top N.
///
/// # Example
/// ```no_run
/// # use std::rc::Rc;
/// # use product_dashboard::product::{Metric, NumericField, product_table::ProductTable};
/// # use product_dashboard::product::selection::CategorySelection;
/// # let table = Rc::new(ProductTable::empty());
/// let selection = CategorySelection::all(&table);
/// let top = table
///     .query()
///     .select(&selection)
///     .metric(Metric::Mean(NumericField::VolumeCm3))
///     .limit(10)
///     .execute();
/// ```
#[derive(Debug, Clone)]
pub struct RankedQuery {
    table: Rc<ProductTable>,
    cache: Option<Rc<QueryCache>>,
    selection: Option<CategorySelection>,
    metric: Metric,
    limit: usize,
}

impl RankedQuery {
    pub fn new(table: Rc<ProductTable>, cache: Option<Rc<QueryCache>>) -> Self {
        Self {
            table,
            cache,
            selection: None,
            metric: Metric::Count,
            limit: DEFAULT_TOP_N,
        }
    }

    /// Restrict to rows whose category is in `selection`
    pub fn select(mut self, selection: &CategorySelection) -> Self {
        self.selection = Some(selection.clone());
        self
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Maximum number of entries returned
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = n;
        self
    }

    /// Disable caching
    pub fn no_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn execute(self) -> AggregateResult {
        let categories = self.selection.as_ref().map(|s| s.canonical_key());

        let Some(cache) = &self.cache else {
            return self.compute();
        };

        let key = QueryKey::Ranked {
            categories,
            metric: self.metric,
            limit: self.limit,
        };
        if let Some(OperationResult::Ranked(result)) = cache.get(&key) {
            log::debug!("cache hit for {} top {}", self.metric, self.limit);
            return result;
        }

        log::debug!("cache miss for {} top {}", self.metric, self.limit);
        let result = self.compute();
        cache.put(key, OperationResult::Ranked(result.clone()));
        result
    }

    fn compute(&self) -> AggregateResult {
        if self.limit == 0 {
            return AggregateResult::empty(self.metric);
        }
        let rows = self.apply_filter();
        let grouped = self.table.group_by(&rows, self.metric);
        rank(grouped, self.metric, self.limit)
    }

    /// Row indices passing the selection filter
    fn apply_filter(&self) -> Rc<Vec<usize>> {
        let filter = |table: &ProductTable| match &self.selection {
            Some(selection) => table.filter_categories(selection),
            None => (0..table.row_count()).collect(),
        };

        match &self.cache {
            Some(lru) => {
                let key = QueryKey::Filter {
                    categories: self.selection.as_ref().map(|s| s.canonical_key()),
                };
                if let Some(OperationResult::Filter(rows)) = lru.get(&key) {
                    rows
                } else {
                    let rows = Rc::new(filter(&self.table));
                    lru.put(key, OperationResult::Filter(Rc::clone(&rows)));
                    rows
                }
            }
            None => Rc::new(filter(&self.table)),
        }
    }
}

/// Sort grouped values descending, breaking ties by category name ascending,
/// and keep the first `limit`.
pub fn rank(grouped: Vec<(&str, AggregateValue)>, metric: Metric, limit: usize) -> AggregateResult {
    let mut entries: Vec<AggregateEntry> = grouped
        .into_iter()
        .map(|(category, value)| AggregateEntry {
            category: category.to_string(),
            value,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.value
            .as_f64()
            .total_cmp(&a.value.as_f64())
            .then_with(|| a.category.cmp(&b.category))
    });
    entries.truncate(limit);

    AggregateResult { metric, entries }
}

impl ProductTable {
    pub fn query(self: &Rc<Self>) -> RankedQuery {
        RankedQuery::new(self.clone(), None)
    }

    pub fn query_with_cache(self: &Rc<Self>, cache: &Rc<QueryCache>) -> RankedQuery {
        RankedQuery::new(self.clone(), Some(cache.clone()))
    }
}
