use tracing::debug;

use crate::domain::RVError;

/// The canonical in-memory table for the currently loaded file.
///
/// Immutable after construction; a header reassignment produces a new
/// Dataset and the caller replaces its reference wholesale.
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// The two header rows a reassignment would swap, shown to the user
/// before `apply` is invoked.
pub struct HeaderPreview {
    pub old_header: Vec<String>,
    pub new_header: Vec<String>,
}

impl Dataset {
    /// Build a Dataset from raw decoder output.
    ///
    /// The column count is the length of the longest row, header included.
    /// Shorter rows are right-padded with empty cells; nothing is ever
    /// truncated. A source with no header and no data rows is rejected.
    pub fn load(header_row: Vec<String>, data_rows: Vec<Vec<String>>) -> Result<Self, RVError> {
        let width = data_rows
            .iter()
            .map(|r| r.len())
            .max()
            .unwrap_or(0)
            .max(header_row.len());
        if width == 0 {
            return Err(RVError::EmptySource);
        }

        let mut headers = header_row;
        pad_row(&mut headers, width);
        let mut rows = data_rows;
        for row in rows.iter_mut() {
            pad_row(row, width);
        }

        debug!("Loaded dataset with {} rows, {} columns", rows.len(), width);
        Ok(Dataset { headers, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> Result<&[String], RVError> {
        self.rows
            .get(idx)
            .map(|r| r.as_slice())
            .ok_or(RVError::IndexOutOfRange)
    }

    pub fn cell_at(&self, row: usize, col: usize) -> Result<&str, RVError> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
            .ok_or(RVError::IndexOutOfRange)
    }

    /// Show what a header reassignment at `pivot` would do, without
    /// touching the Dataset.
    pub fn preview(&self, pivot: usize) -> Result<HeaderPreview, RVError> {
        self.check_pivot(pivot)?;
        Ok(HeaderPreview {
            old_header: self.headers.clone(),
            new_header: self.rows[pivot].clone(),
        })
    }

    /// Promote the row at `pivot` to be the header and return the new
    /// Dataset. The old header becomes the first data row, rows before
    /// the pivot follow it, rows after the pivot keep their relative
    /// order. The original Dataset is left untouched; the caller is
    /// responsible for clamping its current record index into range.
    pub fn apply(&self, pivot: usize) -> Result<Dataset, RVError> {
        self.check_pivot(pivot)?;
        let new_header = self.rows[pivot].clone();
        let mut new_rows = Vec::with_capacity(self.rows.len());
        new_rows.push(self.headers.clone());
        new_rows.extend_from_slice(&self.rows[..pivot]);
        new_rows.extend_from_slice(&self.rows[pivot + 1..]);
        // Re-running load keeps the padding invariant if the column
        // count changed.
        Dataset::load(new_header, new_rows)
    }

    fn check_pivot(&self, pivot: usize) -> Result<(), RVError> {
        // With a single data row a reassignment would leave zero rows.
        if self.rows.len() <= 1 {
            return Err(RVError::SingleRowGuard);
        }
        if pivot >= self.rows.len() {
            return Err(RVError::IndexOutOfRange);
        }
        Ok(())
    }
}

fn pad_row(row: &mut Vec<String>, width: usize) {
    while row.len() < width {
        row.push(String::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn load_basic() {
        let ds = ann_bo();
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.column_count(), 2);
        assert_eq!(ds.cell_at(1, 0).unwrap(), "Bo");
    }

    #[test]
    fn load_pads_short_rows() {
        let ds = Dataset::load(strings(&["A", "B", "C"]), vec![strings(&["X"])]).unwrap();
        assert_eq!(ds.row(0).unwrap(), &strings(&["X", "", ""])[..]);
    }

    #[test]
    fn load_grows_columns_for_long_rows() {
        let ds = Dataset::load(
            strings(&["A", "B"]),
            vec![strings(&["1", "2", "3", "4"]), strings(&["5"])],
        )
        .unwrap();
        assert_eq!(ds.column_count(), 4);
        assert_eq!(ds.headers(), &strings(&["A", "B", "", ""])[..]);
        for i in 0..ds.row_count() {
            assert_eq!(ds.row(i).unwrap().len(), ds.column_count());
        }
    }

    #[test]
    fn load_rejects_empty_source() {
        assert!(matches!(
            Dataset::load(Vec::new(), Vec::new()),
            Err(RVError::EmptySource)
        ));
    }

    #[test]
    fn load_accepts_header_only_file() {
        let ds = Dataset::load(strings(&["A", "B"]), Vec::new()).unwrap();
        assert_eq!(ds.row_count(), 0);
        assert_eq!(ds.column_count(), 2);
    }

    #[test]
    fn cell_at_out_of_bounds() {
        let ds = ann_bo();
        assert!(matches!(ds.cell_at(2, 0), Err(RVError::IndexOutOfRange)));
        assert!(matches!(ds.cell_at(0, 2), Err(RVError::IndexOutOfRange)));
    }

    #[test]
    fn preview_reports_both_headers() {
        let ds = Dataset::load(
            strings(&["A", "B"]),
            vec![
                strings(&["r0", "r0"]),
                strings(&["H1", "H2"]),
                strings(&["r2", "r2"]),
            ],
        )
        .unwrap();
        let preview = ds.preview(1).unwrap();
        assert_eq!(preview.new_header, strings(&["H1", "H2"]));
        assert_eq!(preview.old_header, strings(&["A", "B"]));
        // Pure preview, nothing moved.
        assert_eq!(ds.cell_at(1, 0).unwrap(), "H1");
    }

    #[test]
    fn apply_reorders_rows_around_pivot() {
        let ds = Dataset::load(
            strings(&["A", "B"]),
            vec![
                strings(&["r0", "x"]),
                strings(&["H1", "H2"]),
                strings(&["r2", "y"]),
            ],
        )
        .unwrap();
        let new = ds.apply(1).unwrap();
        assert_eq!(new.headers(), &strings(&["H1", "H2"])[..]);
        assert_eq!(new.row_count(), 3);
        // Old header first, then rows before the pivot, then rows after.
        assert_eq!(new.row(0).unwrap(), &strings(&["A", "B"])[..]);
        assert_eq!(new.row(1).unwrap(), &strings(&["r0", "x"])[..]);
        assert_eq!(new.row(2).unwrap(), &strings(&["r2", "y"])[..]);
        // The original is untouched.
        assert_eq!(ds.headers(), &strings(&["A", "B"])[..]);
        assert_eq!(ds.row_count(), 3);
    }

    #[test]
    fn apply_keeps_padding_invariant() {
        let ds = Dataset::load(
            strings(&["A", "B", "C"]),
            vec![strings(&["short"]), strings(&["1", "2", "3"])],
        )
        .unwrap();
        let new = ds.apply(0).unwrap();
        assert_eq!(new.column_count(), 3);
        for i in 0..new.row_count() {
            assert_eq!(new.row(i).unwrap().len(), 3);
        }
    }

    #[test]
    fn single_row_guard() {
        let ds = Dataset::load(strings(&["A"]), vec![strings(&["only"])]).unwrap();
        assert!(matches!(ds.preview(0), Err(RVError::SingleRowGuard)));
        assert!(matches!(ds.apply(0), Err(RVError::SingleRowGuard)));
        assert_eq!(ds.row_count(), 1);
    }

    #[test]
    fn pivot_out_of_range() {
        let ds = ann_bo();
        assert!(matches!(ds.preview(2), Err(RVError::IndexOutOfRange)));
        assert!(matches!(ds.apply(7), Err(RVError::IndexOutOfRange)));
    }
}
