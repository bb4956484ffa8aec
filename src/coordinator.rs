use tracing::trace;

pub const ZOOM_MIN: f64 = 0.4;
pub const ZOOM_MAX: f64 = 3.0;
pub const ZOOM_STEP: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Record,
    Table,
}

/// Cursor and offset state of one view panel. The table view uses all
/// four fields; the record view scrolls its field list with the row
/// pair only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollAnchor {
    pub cursor_row: usize,
    pub cursor_column: usize,
    pub offset_row: usize,
    pub offset_column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewPosition {
    pub current_index: Option<usize>,
    pub zoom_factor: f64,
    pub scroll: ScrollAnchor,
}

impl Default for ViewPosition {
    fn default() -> Self {
        ViewPosition {
            current_index: None,
            zoom_factor: 1.0,
            scroll: ScrollAnchor::default(),
        }
    }
}

/// Keeps both view modes pointed at one logical current record.
///
/// The two ViewPositions always carry the same `current_index`; only
/// zoom and scroll diverge per mode and survive mode switches.
pub struct Coordinator {
    pub mode: Mode,
    pub record: ViewPosition,
    pub table: ViewPosition,
    row_count: usize,
}

impl Coordinator {
    pub fn new() -> Self {
        Coordinator {
            mode: Mode::Record,
            record: ViewPosition::default(),
            table: ViewPosition::default(),
            row_count: 0,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn current_index(&self) -> Option<usize> {
        self.active().current_index
    }

    pub fn active(&self) -> &ViewPosition {
        match self.mode {
            Mode::Record => &self.record,
            Mode::Table => &self.table,
        }
    }

    pub fn active_mut(&mut self) -> &mut ViewPosition {
        match self.mode {
            Mode::Record => &mut self.record,
            Mode::Table => &mut self.table,
        }
    }

    /// Fresh per-mode state for a newly loaded dataset.
    pub fn reset_for_load(&mut self, row_count: usize) {
        self.row_count = row_count;
        self.record = ViewPosition::default();
        self.table = ViewPosition::default();
        let index = if row_count > 0 { Some(0) } else { None };
        self.set_index(index);
    }

    /// Carry the current index from the mode being left into the mode
    /// being entered. Zoom and scroll of the entered mode are restored
    /// as they were, never reset.
    pub fn switch_mode(&mut self, to: Mode) {
        if self.mode == to {
            return;
        }
        let index = self.active().current_index;
        self.mode = to;
        self.active_mut().current_index = index;
        trace!("Switched to {:?} at record {:?}", to, index);
    }

    pub fn toggle_mode(&mut self) {
        let to = match self.mode {
            Mode::Record => Mode::Table,
            Mode::Table => Mode::Record,
        };
        self.switch_mode(to);
    }

    /// Move the current record by `delta`, clamped to the dataset
    /// bounds. Only meaningful in record mode.
    pub fn navigate(&mut self, delta: i64) {
        if self.mode != Mode::Record || self.row_count == 0 {
            return;
        }
        let Some(current) = self.record.current_index else {
            return;
        };
        let target = (current as i64 + delta).clamp(0, self.row_count as i64 - 1) as usize;
        self.set_index(Some(target));
    }

    /// A table row was activated; make it the current record and enter
    /// record mode.
    pub fn select_from_table(&mut self, row_index: usize) {
        if self.row_count == 0 {
            return;
        }
        self.set_index(Some(row_index.min(self.row_count - 1)));
        self.mode = Mode::Record;
    }

    /// Step the zoom factor of one mode only, clamped to
    /// [ZOOM_MIN, ZOOM_MAX]. The other mode's zoom is never touched.
    pub fn adjust_zoom(&mut self, mode: Mode, delta_steps: i64) {
        let view = match mode {
            Mode::Record => &mut self.record,
            Mode::Table => &mut self.table,
        };
        view.zoom_factor =
            (view.zoom_factor + ZOOM_STEP * delta_steps as f64).clamp(ZOOM_MIN, ZOOM_MAX);
        trace!("Zoom for {:?} now {:.2}", mode, view.zoom_factor);
    }

    /// After a dataset replacement (header reassignment) the current
    /// index is clamped into the new range instead of being reset.
    pub fn clamp_after_replace(&mut self, new_row_count: usize) {
        self.row_count = new_row_count;
        let index = if new_row_count == 0 {
            None
        } else {
            Some(
                self.current_index()
                    .unwrap_or(0)
                    .min(new_row_count - 1),
            )
        };
        self.set_index(index);
    }

    fn set_index(&mut self, index: Option<usize>) {
        self.record.current_index = index;
        self.table.current_index = index;
    }
}
