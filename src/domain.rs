use std::io::Error;

use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::backend::ImportOutcome;
use crate::record::Record;

pub const HELP_TEXT: &str = "
rdesk keys

  Navigation
    j / Down        next row
    k / Up          previous row
    h / Left        previous column
    l / Right       next column
    n / PageDown    next page
    p / PageUp      previous page
    g / G           first / last page

  Table
    s               sort by selected column (again to flip direction)
    /               search all fields
    c               clear search
    e               cycle entries per page (5, 10, 15)
    d               delete selected record
    y               copy selected record to clipboard
    r               reload records

  Files
    i               bulk import a spreadsheet
    x               export the records to a workbook

  General
    ?               this help
    L               logout
    Esc             close popup / cancel input
    q               quit
";

/// Fields the backend adds that never show up as columns.
pub const EXCLUDED_FIELDS: [&str; 2] = ["timestamp", "created_at"];

/// Entries per page the dashboard offers.
pub const PAGE_SIZES: [usize; 3] = [5, 10, 15];

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("io error: {0}")]
    IoError(#[from] Error),
    #[error("csv error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("invalid json: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    ConfigError(#[from] serde_yaml::Error),
    #[error("spreadsheet error: {0}")]
    SpreadsheetError(#[from] calamine::Error),
    #[error("export failed: {0}")]
    ExportError(#[from] rust_xlsxwriter::XlsxError),
    #[error("server answered {status}: {message}")]
    Http { status: u16, message: String },
    #[error("loading failed: {0}")]
    LoadingFailed(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("unknown file type")]
    UnknownFileType,
    #[error("workbook has no worksheet")]
    NoWorksheet,
    #[error("not logged in")]
    NotAuthenticated,
    #[error("invalid input: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Search,
    ImportPath,
    ExportPath,
    LoginEmail,
    LoginPassword,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::Search => "/",
            CMDMode::ImportPath => "import: ",
            CMDMode::ExportPath => "export: ",
            CMDMode::LoginEmail => "email: ",
            CMDMode::LoginPassword => "password: ",
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, CMDMode::LoginPassword)
    }
}

#[derive(Debug)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    Sort,
    Search,
    ClearSearch,
    CyclePageSize,
    Delete,
    Confirm,
    CopyRow,
    Refresh,
    Import,
    Export,
    Logout,
    Help,
    Enter,
    Exit,
    RawKey(KeyEvent),
    Fetched {
        generation: u64,
        result: Result<Vec<Record>, DeskError>,
    },
    Deleted {
        id: i64,
        result: Result<(), DeskError>,
    },
    Imported(Result<ImportOutcome, DeskError>),
}
