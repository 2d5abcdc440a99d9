//! Ephemeral table state: paging and sorting.
//!
//! None of this is feature data. Visible rows are always derived from a
//! [`RenderModel`](crate::RenderModel) and never stored.

use std::cmp::Ordering;

use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use crate::ResultRow;

/// Rows per page when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Sort direction for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    const fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// The active sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    /// Flattened property key.
    pub column: String,
    /// Direction.
    pub direction: SortDirection,
}

/// Paging and sort position of the result table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    page: usize,
    page_size: usize,
    sort: Option<SortSpec>,
}

impl Default for TableView {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl TableView {
    /// A view on the first page, unsorted. A zero page size is treated
    /// as one.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 0,
            page_size: page_size.max(1),
            sort: None,
        }
    }

    /// Zero-based page index.
    #[must_use]
    pub const fn page(&self) -> usize {
        self.page
    }

    /// Rows per page.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// The active sort, if any.
    #[must_use]
    pub const fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    /// Number of pages needed for `total` rows. Always at least one.
    #[must_use]
    pub const fn page_count(&self, total: usize) -> usize {
        if total == 0 {
            1
        } else {
            total.div_ceil(self.page_size)
        }
    }

    /// Moves to `page`, clamped to the last page for `total` rows.
    pub fn set_page(&mut self, page: usize, total: usize) {
        self.page = page.min(self.page_count(total) - 1);
    }

    /// Sorts by `column`. Sorting by the active column again flips the
    /// direction. Returns to the first page.
    pub fn sort_by(&mut self, column: &str) {
        let direction = match &self.sort {
            Some(sort) if sort.column == column => sort.direction.reversed(),
            _ => SortDirection::Ascending,
        };
        self.sort = Some(SortSpec {
            column: column.to_string(),
            direction,
        });
        self.page = 0;
    }

    /// Removes any sort.
    pub fn clear_sort(&mut self) {
        self.sort = None;
    }

    /// Returns to the first page, keeping the sort. Called when a new
    /// result set arrives.
    pub const fn reset_page(&mut self) {
        self.page = 0;
    }

    /// The rows shown on the current page, in display order.
    #[must_use]
    pub fn visible_rows<'a>(&self, rows: &'a [ResultRow]) -> Vec<&'a ResultRow> {
        let mut ordered: Vec<&ResultRow> = rows.iter().collect();
        if let Some(sort) = &self.sort {
            ordered.sort_by(|a, b| {
                let ordering = compare_cells(a.cell(&sort.column), b.cell(&sort.column));
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
        ordered
            .into_iter()
            .skip(self.page * self.page_size)
            .take(self.page_size)
            .collect()
    }
}

/// Numbers compare numerically, everything else as text.
fn compare_cells(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row(index: usize, rank: &str) -> ResultRow {
        ResultRow {
            index,
            display_id: (index + 1).to_string(),
            coordinates: String::new(),
            cells: BTreeMap::from([("rank".to_string(), rank.to_string())]),
        }
    }

    fn ids(rows: &[&ResultRow]) -> Vec<usize> {
        rows.iter().map(|r| r.index).collect()
    }

    #[test]
    fn pages_are_clamped() {
        let rows: Vec<_> = (0..23).map(|i| row(i, "0")).collect();
        let mut view = TableView::default();
        assert_eq!(view.page_count(rows.len()), 3);

        view.set_page(2, rows.len());
        assert_eq!(view.visible_rows(&rows).len(), 3);

        view.set_page(9, rows.len());
        assert_eq!(view.page(), 2);
        assert_eq!(view.page_count(0), 1);
    }

    #[test]
    fn numeric_columns_sort_numerically_and_toggle() {
        let rows = vec![row(0, "10"), row(1, "9"), row(2, "100")];
        let mut view = TableView::new(10);

        view.sort_by("rank");
        assert_eq!(ids(&view.visible_rows(&rows)), [1, 0, 2]);

        view.sort_by("rank");
        assert_eq!(view.sort().map(|s| s.direction), Some(SortDirection::Descending));
        assert_eq!(ids(&view.visible_rows(&rows)), [2, 0, 1]);

        view.clear_sort();
        assert_eq!(ids(&view.visible_rows(&rows)), [0, 1, 2]);
    }

    #[test]
    fn sorting_returns_to_first_page() {
        let rows: Vec<_> = (0..15).map(|i| row(i, "1")).collect();
        let mut view = TableView::new(5);
        view.set_page(2, rows.len());
        view.sort_by("rank");
        assert_eq!(view.page(), 0);
    }
}
