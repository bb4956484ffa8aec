use std::cmp::Ordering;
use std::path::PathBuf;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace};

use crate::coordinator::{Coordinator, Mode};
use crate::dataset::Dataset;
use crate::domain::{HELP_TEXT, Message, RVConfig, RVError};
use crate::inputter::{InputResult, Inputter};
use crate::loader::{self, FileInfo};
use crate::search::{self, SearchState};
use crate::ui::{CMDLINE_HEIGHT, COLUMN_WIDTH_MARGIN, SCROLLBAR_WIDTH, TABLE_HEADER_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    Empty,
    Ready,
    Quitting,
}

enum Popup {
    None,
    Help,
    ConfirmHeader { pivot: usize, message: String },
}

#[derive(Clone)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

/// Snapshot of everything the renderer needs for one frame.
pub struct UIData {
    pub name: String,
    pub mode: Mode,
    pub table: Vec<ColumnView>,
    pub nrows: usize,
    pub ncols: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub offset_row: usize,
    pub highlights: Vec<(usize, usize)>,
    pub current_match: Option<(usize, usize)>,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub cmdinput: InputResult,
    pub active_cmdinput: bool,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            mode: Mode::Record,
            table: Vec::new(),
            nrows: 0,
            ncols: 0,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            offset_row: 0,
            highlights: Vec::new(),
            current_match: None,
            show_popup: false,
            popup_message: String::new(),
            layout: UILayout::default(),
            cmdinput: InputResult::default(),
            active_cmdinput: false,
            status_message: String::new(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
    pub statusline_width: usize,
    pub statusline_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(SCROLLBAR_WIDTH),
            table_height: ui_height.saturating_sub(CMDLINE_HEIGHT + TABLE_HEADER_HEIGHT),
            statusline_width: ui_width,
            statusline_height: CMDLINE_HEIGHT,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: RVConfig,
    file_info: Option<FileInfo>,
    pub status: Status,
    dataset: Option<Dataset>,
    // Widest cell per column, header included, computed once per load.
    col_widths: Vec<usize>,
    coordinator: Coordinator,
    search: SearchState,
    // Display-only row order of the table view. The Dataset itself is
    // never reordered.
    sort: Vec<usize>,
    visible_columns: Vec<usize>,
    popup: Popup,
    uilayout: UILayout,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    active_input: bool,
    last_input: InputResult,
    status_message: String,
}

impl Model {
    pub fn init(config: &RVConfig, ui_width: usize, ui_height: usize) -> Self {
        let mut model = Self {
            config: config.clone(),
            file_info: None,
            status: Status::Empty,
            dataset: None,
            col_widths: Vec::new(),
            coordinator: Coordinator::new(),
            search: SearchState::default(),
            sort: Vec::new(),
            visible_columns: Vec::new(),
            popup: Popup::None,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            clipboard: Clipboard::new()
                .map_err(|e| trace!("Clipboard unavailable: {:?}", e))
                .ok(),
            input: Inputter::default(),
            active_input: false,
            last_input: InputResult::default(),
            status_message: "No file loaded".to_string(),
        };
        model.rebuild();
        model
    }

    /// Load a new dataset, replacing the current one wholesale. On any
    /// failure the previously loaded state is left untouched.
    pub fn load_data_file(&mut self, path: PathBuf) -> Result<(), RVError> {
        let file_info = loader::get_file_info(path)?;
        let (header, rows) = loader::read_rows(&file_info)?;
        let dataset = Dataset::load(header, rows)?;
        info!(
            "Loaded {:?}: {} rows, {} columns",
            file_info.path,
            dataset.row_count(),
            dataset.column_count()
        );

        self.file_info = Some(file_info);
        self.col_widths = column_widths(&dataset);
        self.sort = (0..dataset.row_count()).collect();
        self.coordinator.reset_for_load(dataset.row_count());
        self.search = SearchState::default();
        self.input.clear();
        self.last_input = InputResult::default();
        self.active_input = false;
        self.popup = Popup::None;
        self.status = Status::Ready;
        self.set_status_message(format!("Loaded {} records", dataset.row_count()));
        self.dataset = Some(dataset);
        self.rebuild();
        Ok(())
    }

    /// A failed load is surfaced on the status line; whatever dataset
    /// existed before stays in place.
    pub fn set_load_error(&mut self, err: &RVError) {
        error!("Loading failed: {:?}", err);
        self.set_status_message(format!("Failed to load file: {:?}", err));
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_input
    }

    pub fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    pub fn update(&mut self, message: Message) -> Result<(), RVError> {
        trace!("Update: mode {:?}, message {:?}", self.coordinator.mode, message);

        if !matches!(self.popup, Popup::None) {
            match message {
                Message::Quit => self.quit(),
                Message::Enter => self.confirm_popup(),
                Message::Exit => self.dismiss_popup(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            }
            return Ok(());
        }

        if self.active_input {
            if let Message::RawKey(key) = message {
                self.raw_input(key);
            }
            return Ok(());
        }

        match self.coordinator.mode {
            Mode::Table => match message {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_table_selection_up(1),
                Message::MoveDown => self.move_table_selection_down(1),
                Message::MoveLeft => self.move_table_selection_left(),
                Message::MoveRight => self.move_table_selection_right(),
                Message::MovePageUp => {
                    self.move_table_selection_up(self.uilayout.table_height.max(1))
                }
                Message::MovePageDown => {
                    self.move_table_selection_down(self.uilayout.table_height.max(1))
                }
                Message::MoveBeginning => self.move_table_selection_beginning(),
                Message::MoveEnd => self.move_table_selection_end(),
                Message::Enter => self.open_selected_record(),
                Message::ToggleMode => self.toggle_mode(),
                Message::Search => self.enter_search_input(),
                Message::SearchNext => self.search_step(1),
                Message::SearchPrev => self.search_step(-1),
                Message::ZoomIn => self.adjust_zoom(1),
                Message::ZoomOut => self.adjust_zoom(-1),
                Message::SortAscending => self.sort_current_column(true),
                Message::SortDescending => self.sort_current_column(false),
                Message::CopyCell => self.copy_table_cell(),
                Message::CopyRow => self.copy_table_row(),
                Message::Help => self.show_help(),
                Message::Exit => self.clear_search(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
            Mode::Record => match message {
                Message::Quit => self.quit(),
                Message::MoveLeft => self.navigate(-1),
                Message::MoveRight => self.navigate(1),
                Message::MoveUp => self.move_record_selection_up(1),
                Message::MoveDown => self.move_record_selection_down(1),
                Message::MovePageUp => self.move_record_selection_up(10),
                Message::MovePageDown => self.move_record_selection_down(10),
                Message::MoveBeginning => {
                    self.navigate(-(self.coordinator.row_count() as i64))
                }
                Message::MoveEnd => self.navigate(self.coordinator.row_count() as i64),
                Message::ToggleMode | Message::Exit => self.toggle_mode(),
                Message::ReassignHeader => self.reassign_header(),
                Message::ZoomIn => self.adjust_zoom(1),
                Message::ZoomOut => self.adjust_zoom(-1),
                Message::CopyCell => self.copy_record_cell(),
                Message::CopyRow => self.copy_record_row(),
                Message::Help => self.show_help(),
                Message::Resize(width, height) => self.ui_resize(width, height),
                _ => (),
            },
        }
        Ok(())
    }

    // -------------------- control handling ---------------------- //

    fn navigate(&mut self, delta: i64) {
        self.coordinator.navigate(delta);
        self.update_record_data();
    }

    fn toggle_mode(&mut self) {
        self.coordinator.toggle_mode();
        self.rebuild();
    }

    fn open_selected_record(&mut self) {
        if self.coordinator.row_count() == 0 {
            return;
        }
        let anchor = self.coordinator.table.scroll;
        let display_idx = (anchor.offset_row + anchor.cursor_row).min(self.sort.len() - 1);
        let data_idx = self.sort[display_idx];
        self.coordinator.select_from_table(data_idx);
        self.update_record_data();
    }

    fn adjust_zoom(&mut self, steps: i64) {
        let mode = self.coordinator.mode;
        self.coordinator.adjust_zoom(mode, steps);
        let zoom = self.coordinator.active().zoom_factor;
        self.set_status_message(format!("Zoom: {:.0}%", zoom * 100.0));
        self.rebuild();
    }

    fn show_help(&mut self) {
        self.popup = Popup::Help;
        self.rebuild();
    }

    fn confirm_popup(&mut self) {
        match std::mem::replace(&mut self.popup, Popup::None) {
            Popup::ConfirmHeader { pivot, .. } => self.apply_header(pivot),
            _ => self.rebuild(),
        }
    }

    fn dismiss_popup(&mut self) {
        self.popup = Popup::None;
        self.rebuild();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.rebuild();
    }

    // -------------------- search ---------------------- //

    fn enter_search_input(&mut self) {
        if self.dataset.is_none() {
            return;
        }
        self.active_input = true;
        self.input.clear();
        self.last_input = self.input.get();
        self.rebuild();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.finished {
            self.active_input = false;
            if !self.last_input.canceled {
                let query = self.last_input.input.clone();
                self.run_search(&query);
            }
        }
        self.rebuild();
    }

    fn run_search(&mut self, query: &str) {
        let Some(dataset) = &self.dataset else {
            return;
        };
        self.search = search::search(dataset, query);
        if query.is_empty() {
            self.set_status_message("Search cleared");
        } else if self.search.matches.is_empty() {
            self.set_status_message("Found no matches!");
        } else {
            self.set_status_message(format!("Found {} results", self.search.matches.len()));
            if let Some((row, column)) = self.search.current() {
                self.select_match_cell(row, column);
            }
        }
        self.update_table_data();
    }

    fn search_step(&mut self, step: i64) {
        if self.search.matches.is_empty() {
            return;
        }
        if step >= 0 {
            self.search.next();
        } else {
            self.search.previous();
        }
        if let Some((row, column)) = self.search.current() {
            let position = self.search.cursor.unwrap_or(0);
            self.set_status_message(format!(
                "Search result {}/{}",
                position + 1,
                self.search.matches.len()
            ));
            self.select_match_cell(row, column);
        }
    }

    fn clear_search(&mut self) {
        if self.search.query.is_empty() {
            return;
        }
        self.search = SearchState::default();
        self.set_status_message("Search cleared");
        self.update_table_data();
    }

    /// Scroll the table so a match given in dataset coordinates is
    /// visible and selected.
    fn select_match_cell(&mut self, data_row: usize, column: usize) {
        let display_row = self
            .sort
            .iter()
            .position(|&r| r == data_row)
            .unwrap_or(0);
        self.select_cell(display_row, column);
    }

    fn select_cell(&mut self, row: usize, column: usize) {
        trace!("Select cell {}:{}", row, column);
        let height = self.uilayout.table_height.max(1);
        let anchor = &mut self.coordinator.table.scroll;

        // If the column is already visible only move the cursor,
        // otherwise shift the view.
        if let Some(pos) = self.visible_columns.iter().position(|&c| c == column) {
            anchor.cursor_column = pos;
        } else {
            anchor.offset_column = column;
            anchor.cursor_column = 0;
        }

        if row >= anchor.offset_row && row < anchor.offset_row + height {
            anchor.cursor_row = row - anchor.offset_row;
        } else {
            anchor.cursor_row = 0;
            anchor.offset_row = row;
        }

        self.update_table_data();
    }

    // -------------------- header reassignment ---------------------- //

    fn reassign_header(&mut self) {
        let Some(dataset) = &self.dataset else {
            return;
        };
        let Some(pivot) = self.coordinator.current_index() else {
            return;
        };
        if dataset.row_count() <= 1 {
            self.set_status_message("Cannot change header when only one data row exists");
            return;
        }
        match dataset.preview(pivot) {
            Ok(preview) => {
                let message = format!(
                    "Promote record {} to header row?\n\n\
                     Current header:\n  {}\n\n\
                     New header:\n  {}\n\n\
                     The current header becomes the first data row;\n\
                     all other rows keep their relative order.\n\n\
                     [Enter] apply    [Esc] cancel",
                    pivot + 1,
                    preview.old_header.join(", "),
                    preview.new_header.join(", "),
                );
                self.popup = Popup::ConfirmHeader { pivot, message };
                self.rebuild();
            }
            Err(e) => {
                // Coordinator bug; recover by clamping the index.
                error!("Header preview failed: {:?}", e);
                self.coordinator.clamp_after_replace(dataset.row_count());
                self.rebuild();
            }
        }
    }

    fn apply_header(&mut self, pivot: usize) {
        let Some(dataset) = self.dataset.take() else {
            return;
        };
        match dataset.apply(pivot) {
            Ok(new_dataset) => {
                debug!(
                    "Header reassigned at pivot {}, now {} rows",
                    pivot,
                    new_dataset.row_count()
                );
                self.col_widths = column_widths(&new_dataset);
                self.sort = (0..new_dataset.row_count()).collect();
                self.coordinator.clamp_after_replace(new_dataset.row_count());
                // Match coordinates of the old dataset are meaningless
                // against the new one; re-run the active query.
                let query = self.search.query.clone();
                self.search = search::search(&new_dataset, &query);
                self.dataset = Some(new_dataset);
                self.set_status_message("Header row updated");
            }
            Err(e) => {
                error!("Header reassignment failed: {:?}", e);
                self.set_status_message(format!("Header change failed: {:?}", e));
                self.dataset = Some(dataset);
            }
        }
        self.rebuild();
    }

    // -------------------- sort (display only) ---------------------- //

    fn sort_current_column(&mut self, ascending: bool) {
        let Some(dataset) = &self.dataset else {
            return;
        };
        if dataset.row_count() == 0 {
            return;
        }
        let anchor = self.coordinator.table.scroll;
        let column = self
            .visible_columns
            .get(anchor.cursor_column)
            .copied()
            .unwrap_or(anchor.offset_column);
        let rows = dataset.rows();

        let mut projection: Vec<usize> = (0..dataset.row_count()).collect();
        projection.sort_by(|&a, &b| {
            let ord = compare_cells(&rows[a][column], &rows[b][column]);
            if ascending { ord } else { ord.reverse() }
        });

        let message = format!(
            "Sorted by \"{}\" ({})",
            dataset.headers()[column],
            if ascending { "ascending" } else { "descending" }
        );
        self.sort = projection;
        self.set_status_message(message);
        self.update_table_data();
    }

    // -------------------- clipboard ---------------------- //

    fn copy_table_cell(&mut self) {
        let Some(dataset) = &self.dataset else {
            return;
        };
        if dataset.row_count() == 0 {
            return;
        }
        let anchor = self.coordinator.table.scroll;
        let row = self.sort[(anchor.offset_row + anchor.cursor_row).min(self.sort.len() - 1)];
        let column = self
            .visible_columns
            .get(anchor.cursor_column)
            .copied()
            .unwrap_or(0);
        let cell = dataset.rows()[row][column].clone();
        self.copy_to_clipboard(cell);
    }

    fn copy_table_row(&mut self) {
        let Some(dataset) = &self.dataset else {
            return;
        };
        if dataset.row_count() == 0 {
            return;
        }
        let anchor = self.coordinator.table.scroll;
        let row = self.sort[(anchor.offset_row + anchor.cursor_row).min(self.sort.len() - 1)];
        let content = dataset.rows()[row]
            .iter()
            .map(wrap_cell_content)
            .collect::<Vec<String>>()
            .join(",");
        self.copy_to_clipboard(content);
    }

    fn copy_record_cell(&mut self) {
        let Some(dataset) = &self.dataset else {
            return;
        };
        let Some(record_idx) = self.coordinator.record.current_index else {
            return;
        };
        let anchor = self.coordinator.record.scroll;
        let field = (anchor.offset_row + anchor.cursor_row).min(dataset.column_count() - 1);
        let cell = dataset.rows()[record_idx][field].clone();
        self.copy_to_clipboard(cell);
    }

    fn copy_record_row(&mut self) {
        let Some(dataset) = &self.dataset else {
            return;
        };
        let Some(record_idx) = self.coordinator.record.current_index else {
            return;
        };
        let content = dataset.rows()[record_idx]
            .iter()
            .map(wrap_cell_content)
            .collect::<Vec<String>>()
            .join(",");
        self.copy_to_clipboard(content);
    }

    fn copy_to_clipboard(&mut self, text: String) {
        let result = match self.clipboard.as_mut() {
            Some(clipboard) => clipboard.set_text(text).map_err(|e| format!("{e:?}")),
            None => Err("clipboard unavailable".to_string()),
        };
        match result {
            Ok(_) => {
                trace!("Copied cell content to clipboard.");
                self.set_status_message("Copied to clipboard");
            }
            Err(e) => {
                trace!("Error copying to clipboard: {}", e);
                self.set_status_message("Clipboard error");
            }
        }
    }

    // -------------------- table selection movement ---------------------- //

    fn move_table_selection_beginning(&mut self) {
        let anchor = &mut self.coordinator.table.scroll;
        anchor.cursor_row = 0;
        anchor.offset_row = 0;
        self.update_table_data();
    }

    fn move_table_selection_end(&mut self) {
        let nrows = self.coordinator.row_count();
        if nrows == 0 {
            return;
        }
        let height = self.uilayout.table_height.max(1);
        let anchor = &mut self.coordinator.table.scroll;
        if nrows < height {
            anchor.offset_row = 0;
            anchor.cursor_row = nrows - 1;
        } else {
            anchor.offset_row = nrows - height;
            anchor.cursor_row = height - 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_up(&mut self, size: usize) {
        let anchor = &mut self.coordinator.table.scroll;
        if anchor.cursor_row > 0 {
            anchor.cursor_row = anchor.cursor_row.saturating_sub(size);
        } else {
            anchor.offset_row = anchor.offset_row.saturating_sub(size);
        }
        self.update_table_data();
    }

    fn move_table_selection_down(&mut self, size: usize) {
        let nrows = self.coordinator.row_count();
        if nrows == 0 {
            return;
        }
        let height = self.uilayout.table_height.max(1);
        let anchor = &mut self.coordinator.table.scroll;
        if anchor.cursor_row + anchor.offset_row < nrows - 1 {
            if anchor.cursor_row < height - 1 {
                anchor.cursor_row = (anchor.cursor_row + size)
                    .min(height - 1)
                    .min(nrows - 1 - anchor.offset_row);
            } else {
                anchor.offset_row = (anchor.offset_row + size).min(nrows - 1);
                anchor.cursor_row = (height - 1).min(nrows - anchor.offset_row - 1);
            }
            self.update_table_data();
        }
    }

    fn move_table_selection_left(&mut self) {
        let anchor = &mut self.coordinator.table.scroll;
        if anchor.cursor_column > 0 {
            anchor.cursor_column -= 1;
        } else if anchor.offset_column > 0 {
            anchor.offset_column -= 1;
        }
        self.update_table_data();
    }

    fn move_table_selection_right(&mut self) {
        let Some(dataset) = &self.dataset else {
            return;
        };
        let ncols = dataset.column_count();
        let anchor = &mut self.coordinator.table.scroll;
        let abs_column = self
            .visible_columns
            .get(anchor.cursor_column)
            .copied()
            .unwrap_or(anchor.offset_column);
        if abs_column < ncols - 1 {
            if anchor.cursor_column < self.visible_columns.len().saturating_sub(1) {
                anchor.cursor_column += 1;
            } else {
                anchor.offset_column += 1;
            }
            self.update_table_data();
        }
    }

    // -------------------- record field movement ---------------------- //

    fn move_record_selection_up(&mut self, size: usize) {
        let anchor = &mut self.coordinator.record.scroll;
        if anchor.cursor_row > 0 {
            anchor.cursor_row = anchor.cursor_row.saturating_sub(size);
        } else {
            anchor.offset_row = anchor.offset_row.saturating_sub(size);
        }
        self.update_record_data();
    }

    fn move_record_selection_down(&mut self, size: usize) {
        let Some(dataset) = &self.dataset else {
            return;
        };
        let nfields = dataset.column_count();
        let height = self.uilayout.table_height.max(1);
        let anchor = &mut self.coordinator.record.scroll;
        if anchor.cursor_row + anchor.offset_row < nfields.saturating_sub(1) {
            if anchor.cursor_row < height - 1 {
                anchor.cursor_row = (anchor.cursor_row + size)
                    .min(height - 1)
                    .min(nfields - 1 - anchor.offset_row);
            } else {
                anchor.offset_row = (anchor.offset_row + size).min(nfields - 1);
                anchor.cursor_row = (height - 1).min(nfields - anchor.offset_row - 1);
            }
            self.update_record_data();
        }
    }

    // -------------------- uidata building ---------------------- //

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
    }

    fn rebuild(&mut self) {
        match self.coordinator.mode {
            Mode::Table => self.update_table_data(),
            Mode::Record => self.update_record_data(),
        }
    }

    fn popup_state(&self) -> (bool, String) {
        match &self.popup {
            Popup::None => (false, String::new()),
            Popup::Help => (true, HELP_TEXT.to_string()),
            Popup::ConfirmHeader { message, .. } => (true, message.clone()),
        }
    }

    fn display_name(&self) -> String {
        self.file_info
            .as_ref()
            .and_then(|f| f.path.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string()
    }

    fn effective_max_width(&self, zoom: f64) -> usize {
        ((self.config.max_column_width as f64 * zoom) as usize).max(4)
    }

    fn update_table_data(&mut self) {
        let name = self.display_name();
        let (show_popup, popup_message) = self.popup_state();
        let Some(dataset) = &self.dataset else {
            self.uidata = UIData::empty();
            self.uidata.name = name;
            self.uidata.mode = self.coordinator.mode;
            self.uidata.layout = self.uilayout.clone();
            self.uidata.status_message = self.status_message.clone();
            self.uidata.show_popup = show_popup;
            self.uidata.popup_message = popup_message;
            return;
        };

        let nrows = dataset.row_count();
        let ncols = dataset.column_count();
        let height = self.uilayout.table_height.max(1);
        let max_width = self.effective_max_width(self.coordinator.table.zoom_factor);

        let anchor = &mut self.coordinator.table.scroll;
        if nrows == 0 {
            anchor.cursor_row = 0;
            anchor.offset_row = 0;
        } else {
            anchor.offset_row = anchor.offset_row.min(nrows - 1);
            anchor.cursor_row = anchor
                .cursor_row
                .min(nrows - 1 - anchor.offset_row)
                .min(height - 1);
        }
        anchor.offset_column = anchor.offset_column.min(ncols - 1);

        let rbegin = anchor.offset_row;
        let rend = (rbegin + height).min(nrows);

        // Columns that fit the table width, starting at the offset. The
        // first one is always shown even if it does not fit.
        let mut visible = Vec::new();
        let mut used_width = 0;
        for cidx in anchor.offset_column..ncols {
            let width = (self.col_widths[cidx] + COLUMN_WIDTH_MARGIN).min(max_width);
            if visible.is_empty() || used_width + width + 1 <= self.uilayout.table_width {
                visible.push(cidx);
                used_width += width + 1;
            } else {
                break;
            }
        }
        anchor.cursor_column = anchor.cursor_column.min(visible.len() - 1);
        let anchor = *anchor;

        let mut table = Vec::with_capacity(visible.len());
        for &cidx in &visible {
            let width = (self.col_widths[cidx] + COLUMN_WIDTH_MARGIN).min(max_width);
            let data = self.sort[rbegin..rend]
                .iter()
                .map(|&ridx| dataset.rows()[ridx][cidx].clone())
                .collect();
            table.push(ColumnView {
                name: get_visible_name(dataset.headers()[cidx].clone(), width),
                width,
                data,
            });
        }

        // Window-relative match coordinates for highlighting.
        let mut highlights = Vec::new();
        let mut current_match = None;
        if !self.search.matches.is_empty() {
            let current = self.search.current();
            for (wrow, &ridx) in self.sort[rbegin..rend].iter().enumerate() {
                for (wcol, &cidx) in visible.iter().enumerate() {
                    if self.search.matches.binary_search(&(ridx, cidx)).is_ok() {
                        if current == Some((ridx, cidx)) {
                            current_match = Some((wrow, wcol));
                        } else {
                            highlights.push((wrow, wcol));
                        }
                    }
                }
            }
        }

        self.uidata = UIData {
            name,
            mode: Mode::Table,
            table,
            nrows,
            ncols,
            selected_row: anchor.cursor_row,
            selected_column: anchor.cursor_column,
            abs_selected_row: rbegin + anchor.cursor_row,
            offset_row: rbegin,
            highlights,
            current_match,
            show_popup,
            popup_message,
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            active_cmdinput: self.active_input,
            status_message: self.status_message.clone(),
        };
        self.visible_columns = visible;
    }

    fn update_record_data(&mut self) {
        let name = self.display_name();
        let (show_popup, popup_message) = self.popup_state();
        let (Some(dataset), Some(record_idx)) =
            (&self.dataset, self.coordinator.record.current_index)
        else {
            self.uidata = UIData::empty();
            self.uidata.name = name;
            self.uidata.mode = Mode::Record;
            self.uidata.layout = self.uilayout.clone();
            self.uidata.status_message = self.status_message.clone();
            self.uidata.show_popup = show_popup;
            self.uidata.popup_message = popup_message;
            return;
        };

        let nfields = dataset.column_count();
        let height = self.uilayout.table_height.max(1);
        let max_width = self.effective_max_width(self.coordinator.record.zoom_factor);

        let anchor = &mut self.coordinator.record.scroll;
        anchor.offset_row = anchor.offset_row.min(nfields - 1);
        anchor.cursor_row = anchor
            .cursor_row
            .min(nfields - 1 - anchor.offset_row)
            .min(height - 1);
        let rbegin = anchor.offset_row;
        let rend = (rbegin + height).min(nfields);
        let anchor = *anchor;

        let names: Vec<String> = dataset.headers()[rbegin..rend]
            .iter()
            .map(|h| h.chars().take(max_width).collect())
            .collect();
        let header_width = names.iter().map(|h| h.len()).max().unwrap_or(0);
        let values: Vec<String> = dataset.rows()[record_idx][rbegin..rend].to_vec();
        let value_width = self
            .uilayout
            .table_width
            .saturating_sub(header_width + COLUMN_WIDTH_MARGIN)
            .max(4);

        self.uidata = UIData {
            name: format!("R[{}]", name),
            mode: Mode::Record,
            table: vec![
                ColumnView {
                    name: "Field".to_string(),
                    width: header_width,
                    data: names,
                },
                ColumnView {
                    name: "Value".to_string(),
                    width: value_width,
                    data: values,
                },
            ],
            nrows: dataset.row_count(),
            ncols: nfields,
            selected_row: anchor.cursor_row,
            selected_column: 1,
            abs_selected_row: record_idx,
            offset_row: rbegin,
            highlights: Vec::new(),
            current_match: None,
            show_popup,
            popup_message,
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            active_cmdinput: self.active_input,
            status_message: self.status_message.clone(),
        };
    }
}

fn column_widths(dataset: &Dataset) -> Vec<usize> {
    (0..dataset.column_count())
        .map(|cidx| {
            dataset
                .rows()
                .iter()
                .map(|row| row[cidx].len())
                .max()
                .unwrap_or(0)
                .max(dataset.headers()[cidx].len())
        })
        .collect()
}

fn get_visible_name(name: String, width: usize) -> String {
    if width < 3 {
        return "".to_string();
    }
    if name.len() > width {
        let mut reduced: String = name.chars().take(width.saturating_sub(3)).collect();
        reduced.push_str("...");
        return reduced;
    }
    name
}

fn compare_cells(a: &str, b: &str) -> Ordering {
    // Numeric cells order numerically and before non-numeric ones;
    // everything else falls back to string order.
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn wrap_cell_content(cell: &String) -> String {
    let needs_escaping = cell.chars().any(|c| c == '"');
    let needs_wrapping = cell.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(cell);

    if needs_escaping {
        out = out.replace("\"", "\"\"");
    }
    if needs_wrapping {
        out = format!("\"{out}\"");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyCode;

    fn loaded_model() -> Model {
        let mut model = Model::init(&RVConfig::default(), 80, 24);
        model
            .load_data_file(PathBuf::from("tests/fixtures/people.csv"))
            .unwrap();
        model
    }

    fn type_query(model: &mut Model, query: &str) {
        model.update(Message::Search).unwrap();
        for c in query.chars() {
            model
                .update(Message::RawKey(KeyEvent::from(KeyCode::Char(c))))
                .unwrap();
        }
        model
            .update(Message::RawKey(KeyEvent::from(KeyCode::Enter)))
            .unwrap();
    }

    #[test]
    fn failed_load_keeps_previous_dataset() {
        let mut model = loaded_model();
        let err = model
            .load_data_file(PathBuf::from("/no/such/file.csv"))
            .unwrap_err();
        model.set_load_error(&err);
        assert_eq!(model.status, Status::Ready);
        assert_eq!(model.dataset.as_ref().unwrap().row_count(), 3);
        assert!(model.uidata.status_message.contains("Failed to load"));
    }

    #[test]
    fn reassign_header_via_popup_reruns_search() {
        let mut model = loaded_model();
        model.update(Message::ToggleMode).unwrap();
        type_query(&mut model, "bo");
        let before = model.search.matches.clone();
        assert_eq!(before, vec![(1, 0)]);

        model.update(Message::ToggleMode).unwrap();
        model.update(Message::MoveRight).unwrap();
        model.update(Message::ReassignHeader).unwrap();
        assert!(matches!(model.popup, Popup::ConfirmHeader { pivot: 1, .. }));
        model.update(Message::Enter).unwrap();

        let dataset = model.dataset.as_ref().unwrap();
        assert_eq!(dataset.headers()[0], "Bo");
        // Old header first, then the row that preceded the pivot.
        assert_eq!(dataset.rows()[0][0], "Name");
        assert_eq!(dataset.rows()[1][0], "Ann");
        // Search was re-run against the new dataset: "bo" now only
        // matches the header-derived coordinates, not the old ones.
        assert_eq!(model.search.query, "bo");
        assert!(model.search.matches.iter().all(|&(r, _)| r < dataset.row_count()));
        assert_ne!(model.search.matches, before);
    }

    #[test]
    fn reassign_popup_can_be_canceled() {
        let mut model = loaded_model();
        model.update(Message::ReassignHeader).unwrap();
        model.update(Message::Exit).unwrap();
        assert!(matches!(model.popup, Popup::None));
        assert_eq!(model.dataset.as_ref().unwrap().headers()[0], "Name");
    }

    #[test]
    fn sort_is_a_display_projection_only() {
        let mut model = loaded_model();
        model.update(Message::ToggleMode).unwrap();
        model.update(Message::SortDescending).unwrap();

        // Canonical row order is untouched.
        let dataset = model.dataset.as_ref().unwrap();
        assert_eq!(dataset.rows()[0][0], "Ann");
        assert_eq!(dataset.rows()[2][0], "Cy");
        // The displayed first column is in descending order.
        assert_eq!(model.uidata.table[0].data, vec!["Cy", "Bo", "Ann"]);
    }

    #[test]
    fn table_enter_maps_through_sort_projection() {
        let mut model = loaded_model();
        model.update(Message::ToggleMode).unwrap();
        model.update(Message::SortDescending).unwrap();
        model.update(Message::Enter).unwrap();

        // First displayed row is "Cy", dataset index 2.
        assert_eq!(model.coordinator.mode, Mode::Record);
        assert_eq!(model.coordinator.current_index(), Some(2));
        assert_eq!(model.uidata.table[1].data[0], "Cy");
    }

    #[test]
    fn zoom_only_touches_active_mode() {
        let mut model = loaded_model();
        model.update(Message::ToggleMode).unwrap();
        model.update(Message::ZoomIn).unwrap();
        assert!((model.coordinator.table.zoom_factor - 1.15).abs() < 1e-9);
        assert_eq!(model.coordinator.record.zoom_factor, 1.0);
    }

    #[test]
    fn record_scroll_survives_mode_switches() {
        let mut model = loaded_model();
        model.update(Message::MoveDown).unwrap();
        let scroll = model.coordinator.record.scroll;
        model.update(Message::ToggleMode).unwrap();
        model.update(Message::ToggleMode).unwrap();
        assert_eq!(model.coordinator.record.scroll, scroll);
        assert_eq!(model.coordinator.mode, Mode::Record);
    }

    #[test]
    fn navigation_clamps_at_dataset_edges() {
        let mut model = loaded_model();
        model.update(Message::MoveLeft).unwrap();
        assert_eq!(model.coordinator.current_index(), Some(0));
        model.update(Message::MoveEnd).unwrap();
        assert_eq!(model.coordinator.current_index(), Some(2));
        model.update(Message::MoveRight).unwrap();
        assert_eq!(model.coordinator.current_index(), Some(2));
    }
}
