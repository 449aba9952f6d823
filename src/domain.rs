use std::io::Error;

use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::source::SourceError;

pub const PAGE_SIZE: usize = 500;
// Row counts in a polars slice are u32.
pub const MAX_PAGE_SIZE: usize = u32::MAX as usize;
pub const EXPORT_FILE_NAME: &str = "AllCustomerData.csv";
pub const EXPORT_MIME_TYPE: &str = "text/plain";

pub const HELP_TEXT: &str = "\
 Navigation
   j / ↓        next row
   k / ↑        previous row
   h / ←        previous column
   l / →        next column
   n / PgDn     next page
   p / PgUp     previous page

 Sorting and filtering
   s            sort selected column ascending
   S            sort selected column descending
   f            enter stage filter (empty = All)
   F            cycle stage filter
   P            set page size

 Actions
   e            export all customers to AllCustomerData.csv
   r            refresh page (and count, if it failed)
   c            copy cell
   C            copy row
   ?            help
   Esc / Enter  close popup
   q            quit
";

#[derive(Debug, Error)]
pub enum CTVError {
    #[error("io error: {0}")]
    IoError(#[from] Error),
    #[error("polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("backend error: {0}")]
    SourceError(#[from] SourceError),
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("unknown file type")]
    UnknownFileType,
    #[error("missing column \"{0}\"")]
    MissingColumn(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    Filter,
    PageSize,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::Filter => "Filter stage: ",
            CMDMode::PageSize => "Page size: ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MoveBeginning,
    MoveEnd,
    NextPage,
    PreviousPage,
    SortAscending,
    SortDescending,
    Filter,
    CycleFilter,
    PageSize,
    Export,
    Refresh,
    CopyCell,
    CopyRow,
    Help,
    Enter,
    Exit,
    RawKey(KeyEvent),
}
