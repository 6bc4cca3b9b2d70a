use crate::models::{ActivityEntry, BookSummary, CatalogStats, LendingSnapshot, Traversal};

/// A list with a clamped cursor, shared by every scrollable screen.
pub(crate) struct Selection<T> {
    pub(crate) items: Vec<T>,
    pub(crate) selected: usize,
}

impl<T> Selection<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Self { items, selected: 0 }
    }

    pub(crate) fn current(&self) -> Option<&T> {
        self.items.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        if self.items.is_empty() {
            return;
        }
        let last = self.items.len() as isize - 1;
        let new = (self.selected as isize + offset).clamp(0, last);
        self.selected = new as usize;
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.items.len().saturating_sub(1);
    }

    /// Swap in fresh items, keeping the cursor where it was when possible.
    pub(crate) fn replace(&mut self, items: Vec<T>) {
        self.items = items;
        self.ensure_in_bounds();
    }

    /// Move the cursor to the first item matching `pred`.
    pub(crate) fn focus_where(&mut self, pred: impl Fn(&T) -> bool) -> bool {
        match self.items.iter().position(pred) {
            Some(idx) => {
                self.selected = idx;
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    fn ensure_in_bounds(&mut self) {
        if self.items.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.items.len() {
            self.selected = self.items.len() - 1;
        }
    }
}

/// Search hits or recommendations, with a heading describing the query.
pub(crate) struct ResultsScreen {
    pub(crate) heading: String,
    pub(crate) results: Selection<BookSummary>,
}

impl ResultsScreen {
    pub(crate) fn new(heading: impl Into<String>, results: Vec<BookSummary>) -> Self {
        Self {
            heading: heading.into(),
            results: Selection::new(results),
        }
    }
}

pub(crate) struct LendingScreen {
    pub(crate) items: Selection<LendingSnapshot>,
}

/// Tree traversal listing plus structure counters.
pub(crate) struct StructureScreen {
    pub(crate) order: Traversal,
    pub(crate) entries: Vec<BookSummary>,
    pub(crate) stats: CatalogStats,
    pub(crate) scroll: u16,
}

pub(crate) struct ActivityScreen {
    pub(crate) entries: Vec<ActivityEntry>,
    pub(crate) scroll: u16,
}

/// Scroll helper for paragraph-based screens.
pub(crate) fn scroll_by(scroll: u16, offset: i32, total_lines: usize) -> u16 {
    let max = total_lines.saturating_sub(1).min(u16::MAX as usize) as i32;
    (scroll as i32 + offset).clamp(0, max) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_clamps_at_both_ends() {
        let mut list = Selection::new(vec!["a", "b", "c"]);
        list.move_selection(-3);
        assert_eq!(list.current(), Some(&"a"));
        list.move_selection(10);
        assert_eq!(list.current(), Some(&"c"));

        list.replace(vec!["x"]);
        assert_eq!(list.selected, 0);
        list.replace(Vec::new());
        assert!(list.current().is_none());
        list.move_selection(1);
        assert_eq!(list.selected, 0);
    }

    #[test]
    fn focus_where_finds_the_item() {
        let mut list = Selection::new(vec![1, 2, 3]);
        assert!(list.focus_where(|n| *n == 3));
        assert_eq!(list.selected, 2);
        assert!(!list.focus_where(|n| *n == 9));
        assert_eq!(list.selected, 2);
    }

    #[test]
    fn scroll_stays_within_content() {
        assert_eq!(scroll_by(0, -5, 10), 0);
        assert_eq!(scroll_by(3, 20, 10), 9);
        assert_eq!(scroll_by(0, 1, 0), 0);
    }
}
