use rayon::prelude::*;
use tracing::trace;

use crate::dataset::Dataset;

/// Result of a cross-cell search, plus a movable cursor over the hits.
///
/// Matches are `(row, column)` coordinates into the Dataset the search
/// ran against. They are meaningless against any other Dataset; callers
/// must re-run `search` whenever the Dataset is replaced.
#[derive(Debug, Default, Clone)]
pub struct SearchState {
    pub query: String,
    pub matches: Vec<(usize, usize)>,
    pub cursor: Option<usize>,
}

impl SearchState {
    pub fn current(&self) -> Option<(usize, usize)> {
        self.cursor.map(|c| self.matches[c])
    }

    /// Advance the cursor circularly. No-op without matches.
    pub fn next(&mut self) {
        self.step(1);
    }

    /// Move the cursor back circularly. No-op without matches.
    pub fn previous(&mut self) {
        self.step(-1);
    }

    fn step(&mut self, delta: i64) {
        let total = self.matches.len();
        if let Some(cursor) = self.cursor {
            let next = (cursor as i64 + delta).rem_euclid(total as i64) as usize;
            self.cursor = Some(next);
        }
    }
}

/// Scan every cell of `dataset` for `query` as a case-insensitive
/// substring. An empty query clears the search rather than reporting
/// zero results. Matches come back in row-major, then column-major
/// order, so the Nth hit is stable for a fixed Dataset and query.
pub fn search(dataset: &Dataset, query: &str) -> SearchState {
    if query.is_empty() {
        return SearchState::default();
    }

    let needle = query.to_lowercase();
    let mut matches: Vec<(usize, usize)> = dataset
        .rows()
        .par_iter()
        .enumerate()
        .flat_map_iter(|(ridx, row)| {
            let needle = &needle;
            row.iter().enumerate().filter_map(move |(cidx, cell)| {
                cell.to_lowercase().contains(needle).then_some((ridx, cidx))
            })
        })
        .collect();
    // The rayon fan out is per row; sorting restores strict row-major,
    // column-major order.
    matches.sort_unstable();

    trace!("Search for {:?} found {} matches", query, matches.len());
    SearchState {
        query: query.to_string(),
        cursor: if matches.is_empty() { None } else { Some(0) },
        matches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn ann_bo() -> Dataset {
        Dataset::load(
            strings(&["Name", "Age"]),
            vec![strings(&["Ann", "30"]), strings(&["Bo", "25"])],
        )
        .unwrap()
    }

    #[test]
    fn case_insensitive_match() {
        let state = search(&ann_bo(), "an");
        assert_eq!(state.matches, vec![(0, 0)]);
        assert_eq!(state.cursor, Some(0));
    }

    #[test]
    fn empty_query_clears() {
        let state = search(&ann_bo(), "");
        assert!(state.matches.is_empty());
        assert_eq!(state.cursor, None);
    }

    #[test]
    fn no_matches_is_not_an_error() {
        let state = search(&ann_bo(), "zebra");
        assert!(state.matches.is_empty());
        assert_eq!(state.cursor, None);
    }

    #[test]
    fn matches_in_row_major_order() {
        let ds = Dataset::load(
            strings(&["a", "b"]),
            vec![strings(&["xx", "x"]), strings(&["", "x"])],
        )
        .unwrap();
        let state = search(&ds, "x");
        assert_eq!(state.matches, vec![(0, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn cursor_wraps_both_directions() {
        let ds = Dataset::load(
            strings(&["a", "b"]),
            vec![strings(&["x", "x"]), strings(&["x", ""])],
        )
        .unwrap();
        let mut state = search(&ds, "x");
        assert_eq!(state.cursor, Some(0));
        state.previous();
        assert_eq!(state.cursor, Some(2));
        state.next();
        assert_eq!(state.cursor, Some(0));
    }

    #[test]
    fn next_then_previous_returns_to_origin() {
        let ds = Dataset::load(
            strings(&["a"]),
            vec![strings(&["x"]), strings(&["x"]), strings(&["x"])],
        )
        .unwrap();
        let mut state = search(&ds, "x");
        state.next();
        let origin = state.cursor;
        state.next();
        state.previous();
        assert_eq!(state.cursor, origin);
        state.previous();
        state.next();
        assert_eq!(state.cursor, origin);
    }

    #[test]
    fn navigation_is_noop_without_matches() {
        let mut state = search(&ann_bo(), "zebra");
        state.next();
        assert_eq!(state.cursor, None);
        state.previous();
        assert_eq!(state.cursor, None);
        assert!(state.matches.is_empty());
    }
}
