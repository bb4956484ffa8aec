use std::io::Error;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum RVError {
    IoError(Error),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    LoadingFailed(String),
    // Decoder failures (malformed CSV/XLSX) collapsed into one variant
    // with a human readable cause.
    SourceDecode(String),
    // A source with no header and no data rows.
    EmptySource,
    // Contract violations. The UI prevents these by construction; if one
    // surfaces anyway the model recovers by clamping.
    IndexOutOfRange,
    SingleRowGuard,
}

impl From<Error> for RVError {
    fn from(err: Error) -> Self {
        RVError::IoError(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Quit,
    Enter,
    Exit,
    ToggleMode,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    Search,
    SearchNext,
    SearchPrev,
    ZoomIn,
    ZoomOut,
    SortAscending,
    SortDescending,
    ReassignHeader,
    CopyCell,
    CopyRow,
    Help,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

#[derive(Debug, Clone, Setters)]
pub struct RVConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
}

impl Default for RVConfig {
    fn default() -> Self {
        RVConfig {
            event_poll_time: 100,
            max_column_width: 40,
        }
    }
}

pub const HELP_TEXT: &str = "\
rv - key bindings

General
  q, Ctrl+q      quit
  ?              this help
  Tab, Ctrl+t    toggle record/table view
  + / -          zoom in / out
  y / Y          copy cell / copy row

Table view
  arrow keys     move selection
  PgUp / PgDn    move one page
  Home / End     first / last row
  Enter          open selected row in record view
  /              search all cells
  n / N          next / previous match
  s / S          sort by column, ascending / descending

Record view
  Left / Right   previous / next record
  Up / Down      move through fields
  h              promote this record to header row
  Esc            back to table view

Press Enter or Esc to close this popup.";
