use std::collections::HashSet;

use serde::Serialize;

use crate::product::product_table::ProductTable;

/// Categories included in every chart.
///
/// With "select all" this is the table's full distinct category list in
/// ascending order; otherwise it is the user's explicit list as given. An empty
/// selection is valid and filters out every row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CategorySelection {
    categories: Vec<String>,
}

impl CategorySelection {
    pub fn resolve(table: &ProductTable, select_all: bool, chosen: &[String]) -> Self {
        if select_all {
            Self::all(table)
        } else {
            Self::explicit(chosen.to_vec())
        }
    }

    pub fn all(table: &ProductTable) -> Self {
        Self {
            categories: table.distinct_categories().to_vec(),
        }
    }

    pub fn explicit(categories: Vec<String>) -> Self {
        Self { categories }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }

    pub fn as_set(&self) -> HashSet<&str> {
        self.categories.iter().map(String::as_str).collect()
    }

    /// Order-insensitive identity, used as a cache key
    pub fn canonical_key(&self) -> Vec<String> {
        let mut key = self.categories.clone();
        key.sort_unstable();
        key.dedup();
        key
    }
}
