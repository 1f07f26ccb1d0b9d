use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

use crate::pagination::PageSize;

pub const HELP_TEXT: &str = "\
 Navigation
   <Up/Down/Left/Right>, <hjkl>   Move the selected cell
   <n>, <PageDown>                Next page
   <p>, <PageUp>                  Previous page
   <s>                            Cycle rows per page (10/20/30/40/50)

 Editing
   <Enter>, <Space>   Edit the selected cell, toggle booleans
   <Enter>            Commit the edit
   <Esc>              Cancel the edit
   <a>                Add a new row
   <d>, <Delete>      Delete the selected row

 Other
   <c> / <C>   Copy cell / row to the clipboard
   <o>         Open another file
   <?>         Show this help
   <Esc>       Close popup
   <q>         Quit
";

#[derive(Debug)]
pub enum TabError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    InvalidNumber(String),
    UnsupportedPageSize(usize),
    NotEditable(String),
}

impl fmt::Display for TabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabError::IoError(e) => write!(f, "I/O error: {e}"),
            TabError::PolarsError(e) => write!(f, "Data error: {e}"),
            TabError::LoadingFailed(reason) => write!(f, "Loading failed: {reason}"),
            TabError::FileNotFound => write!(f, "File not found"),
            TabError::PermissionDenied => write!(f, "Permission denied"),
            TabError::UnknownFileType => write!(f, "Unknown file type"),
            TabError::InvalidNumber(input) => write!(f, "\"{input}\" is not a number"),
            TabError::UnsupportedPageSize(size) => write!(f, "Unsupported page size {size}"),
            TabError::NotEditable(column) => write!(f, "Column \"{column}\" is toggled, not edited"),
        }
    }
}

impl From<Error> for TabError {
    fn from(err: Error) -> Self {
        TabError::IoError(err)
    }
}

impl From<PolarsError> for TabError {
    fn from(err: PolarsError) -> Self {
        TabError::PolarsError(err)
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct TabConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    pub page_size: PageSize,
    pub sequential_ids: bool,
    #[setters(strip_option)]
    pub output: Option<PathBuf>,
}

impl Default for TabConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 30,
            page_size: PageSize::default(),
            sequential_ids: false,
            output: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CmdMode {
    OpenFile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PreviousPage,
    CyclePageSize,
    Activate,
    AddRow,
    DeleteRow,
    CopyCell,
    CopyRow,
    Open,
    Help,
    Exit,
    FocusLost,
    RawKey(KeyEvent),
}
