use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::cell_edit::{Activation, CellEditController, Commit};
use crate::domain::{CmdMode, HELP_TEXT, Message, TabConfig, TabError};
use crate::ids::{IdGenerator, SequentialIds, UuidIds};
use crate::inputter::{InputResult, Inputter};
use crate::loader::{self, Dataset};
use crate::notifier::SnapshotSink;
use crate::pagination::{PageInfo, PaginationController};
use crate::schema::{Value, ValueType};
use crate::table::TableModel;

const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq)]
pub enum Status {
    EMPTY,
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    EDITING,
    CMDINPUT,
    POPUP,
}

/// Everything the UI needs to draw one frame.
#[derive(Debug, Clone, Default)]
pub struct UIData {
    pub name: String,
    pub headers: Vec<String>,
    pub column_types: Vec<ValueType>,
    pub rows: Vec<Vec<String>>, // Rendered cells of the current page
    pub selected_row: usize,
    pub selected_column: usize,
    pub editing: Option<InputResult>,
    pub page_index: usize,
    pub page_count: usize,
    pub can_go_previous: bool,
    pub can_go_next: bool,
    pub page_size: usize,
    pub nrows: usize,
    pub modified: bool,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: Option<InputResult>,
    pub cmd_mode: Option<CmdMode>,
    pub status_message: String,
}

pub struct Model {
    config: TabConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    name: String,
    table: TableModel,
    changes: SnapshotSink,
    pagination: PaginationController,
    curser_row: usize, // Relative to the current page
    curser_column: usize,
    editor: Option<CellEditController>,
    input: Inputter,
    last_input: InputResult,
    cmd_mode: Option<CmdMode>,
    clipboard: Option<Clipboard>,
    export_failed: bool,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &TabConfig) -> Self {
        let ids: Box<dyn IdGenerator> = if config.sequential_ids {
            Box::new(SequentialIds::default())
        } else {
            Box::new(UuidIds)
        };
        let changes = SnapshotSink::new();
        let table = TableModel::new(ids).with_notifier(Box::new(changes.clone()));
        Self {
            config: config.clone(),
            status: Status::EMPTY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            name: String::new(),
            table,
            changes,
            pagination: PaginationController::new(config.page_size),
            curser_row: 0,
            curser_column: 0,
            editor: None,
            input: Inputter::default(),
            last_input: InputResult::default(),
            cmd_mode: None,
            clipboard: None,
            export_failed: false,
            status_message: "Started tabedit!".to_string(),
            last_status_message_update: Instant::now(),
        }
    }

    /// Loads a file and replaces the current table. On failure the current table stays as it is.
    pub fn load_data_file(&mut self, path: &Path) -> Result<(), TabError> {
        let dataset = loader::load_dataset(path)?;
        self.apply_dataset(dataset);
        Ok(())
    }

    pub fn apply_dataset(&mut self, dataset: Dataset) {
        let nrows = dataset.records.len();
        self.table.load(dataset.columns, dataset.records);
        self.changes.reset();
        self.name = dataset.filename;
        self.pagination.reset();
        self.curser_row = 0;
        self.curser_column = 0;
        self.editor = None;
        self.modus = Modus::TABLE;
        self.export_failed = false;
        self.status = Status::READY;
        self.set_status_message(format!("Loaded {} with {nrows} rows", self.name));
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
        trace!("Status: {}", self.status_message);
    }

    pub fn raw_keyevents(&self) -> bool {
        matches!(self.modus, Modus::EDITING | Modus::CMDINPUT)
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TabError> {
        let Some(msg) = message else {
            return Ok(());
        };
        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit()?,
                Message::MoveUp => self.move_up(),
                Message::MoveDown => self.move_down(),
                Message::MoveLeft => self.curser_column = self.curser_column.saturating_sub(1),
                Message::MoveRight => self.move_right(),
                Message::NextPage => {
                    self.pagination.next_page(self.table.row_count());
                    self.clamp_curser();
                }
                Message::PreviousPage => {
                    self.pagination.previous_page();
                    self.clamp_curser();
                }
                Message::CyclePageSize => self.cycle_page_size(),
                Message::Activate => self.activate(),
                Message::AddRow => self.add_row(),
                Message::DeleteRow => self.delete_row(),
                Message::CopyCell => self.copy_cell(),
                Message::CopyRow => self.copy_row(),
                Message::Open => self.enter_cmd_mode(CmdMode::OpenFile),
                Message::Help => self.show_help(),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit()?,
                Message::Exit | Message::Help => self.exit_popup(),
                _ => (),
            },
            Modus::EDITING => match msg {
                Message::RawKey(key) => self.edit_input(key),
                Message::FocusLost => self.focus_lost(),
                _ => (),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = msg {
                    self.cmd_input(key)
                }
            }
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn current_page(&self) -> PageInfo {
        self.pagination.page(self.table.row_count())
    }

    /// Row id and column name under the curser, if the page has a row there.
    fn selected_cell(&self) -> Option<(String, String)> {
        let page = self.current_page();
        let ridx = page.range.start + self.curser_row;
        if !page.range.contains(&ridx) {
            return None;
        }
        let row = &self.table.rows()[ridx];
        let column = self.table.schema().get(self.curser_column)?;
        Some((row.id().to_string(), column.name.clone()))
    }

    fn clamp_curser(&mut self) {
        let page_len = self.current_page().range.len();
        self.curser_row = std::cmp::min(self.curser_row, page_len.saturating_sub(1));
        self.curser_column = std::cmp::min(
            self.curser_column,
            self.table.schema().len().saturating_sub(1),
        );
    }

    fn move_up(&mut self) {
        if self.curser_row > 0 {
            self.curser_row -= 1;
        } else if self.pagination.previous_page() {
            // Continue on the last row of the previous page
            self.curser_row = self.current_page().range.len().saturating_sub(1);
        }
    }

    fn move_down(&mut self) {
        if self.curser_row + 1 < self.current_page().range.len() {
            self.curser_row += 1;
        } else if self.pagination.next_page(self.table.row_count()) {
            self.curser_row = 0;
        }
    }

    fn move_right(&mut self) {
        if self.curser_column + 1 < self.table.schema().len() {
            self.curser_column += 1;
        }
    }

    fn cycle_page_size(&mut self) {
        let size = self.pagination.cycle_page_size();
        self.clamp_curser();
        self.set_status_message(format!("{} rows per page", size.rows()));
    }

    fn activate(&mut self) {
        let Some((row_id, column)) = self.selected_cell() else {
            return;
        };
        let Some(mut editor) = CellEditController::for_cell(&self.table, &row_id, &column) else {
            return;
        };
        match editor.activate(&mut self.table) {
            Ok(Activation::Toggled(value)) => {
                self.set_status_message(format!("Set {column} to {value}"));
            }
            Ok(Activation::Editing) => {
                trace!("Editing {row_id}:{column}");
                self.input.set(editor.buffer().unwrap_or_default());
                self.last_input = self.input.get();
                self.editor = Some(editor);
                self.previous_modus = self.modus;
                self.modus = Modus::EDITING;
            }
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    fn leave_edit(&mut self) {
        self.editor = None;
        self.input.clear();
        self.modus = Modus::TABLE;
        self.previous_modus = Modus::EDITING;
    }

    fn edit_input(&mut self, key: KeyEvent) {
        let Some(mut editor) = self.editor.take() else {
            self.leave_edit();
            return;
        };
        self.last_input = self.input.read(key);

        if self.last_input.canceled {
            editor.cancel();
            self.leave_edit();
            self.set_status_message("Edit canceled");
            return;
        }

        editor.update_buffer(self.last_input.input.clone());
        if !self.last_input.finished {
            self.editor = Some(editor);
            return;
        }
        self.commit_edit(editor);
    }

    /// Leaving the terminal commits the open edit, same as Enter.
    fn focus_lost(&mut self) {
        if let Some(editor) = self.editor.take() {
            trace!("Focus lost, committing {}", editor.column());
            self.commit_edit(editor);
        }
    }

    fn commit_edit(&mut self, mut editor: CellEditController) {
        match editor.commit(&mut self.table) {
            Ok(Commit::Applied(value)) => {
                self.leave_edit();
                self.set_status_message(format!(
                    "Set {} to {}",
                    editor.column(),
                    display_value(&value)
                ));
            }
            Ok(Commit::Unchanged) => self.leave_edit(),
            Err(e) => {
                // Stay in edit mode so the input can be corrected
                debug!("Commit rejected: {e}");
                self.input.resume();
                self.editor = Some(editor);
                self.set_status_message(e.to_string());
            }
        }
    }

    fn add_row(&mut self) {
        let id = self.table.add_row();
        let count = self.table.row_count();
        self.pagination.last_page(count);
        self.curser_row = self.current_page().range.len().saturating_sub(1);
        self.set_status_message(format!("Added row {id}"));
    }

    fn delete_row(&mut self) {
        let Some((row_id, _)) = self.selected_cell() else {
            return;
        };
        if self.table.delete_row(&row_id).is_applied() {
            self.pagination.clamp(self.table.row_count());
            self.clamp_curser();
            self.set_status_message(format!("Deleted row {row_id}"));
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn exit_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
    }

    fn enter_cmd_mode(&mut self, mode: CmdMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.input.clear();
        self.last_input = self.input.get();
    }

    fn cmd_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if !self.last_input.finished {
            return;
        }

        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        let cmd_mode = self.cmd_mode.take();
        if self.last_input.canceled {
            return;
        }

        let cmd_input = self.last_input.input.trim().to_string();
        match cmd_mode {
            Some(CmdMode::OpenFile) => self.open_file(&cmd_input),
            None => info!("Cmd mode is none!"),
        }
    }

    fn open_file(&mut self, input: &str) {
        if input.is_empty() {
            self.set_status_message("Please select a file to load");
            return;
        }
        let path = match shellexpand::full(input) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                self.set_status_message(format!("Failed to load file: {e}"));
                return;
            }
        };
        if let Err(e) = self.load_data_file(&path) {
            error!("Loading {path:?} failed: {e:?}");
            self.set_status_message(format!("Failed to load file: {e}"));
        }
    }

    fn copy_cell(&mut self) {
        let Some((row_id, column)) = self.selected_cell() else {
            return;
        };
        let cell = self
            .table
            .value(&row_id, &column)
            .map(display_value)
            .unwrap_or_default();
        trace!("Cell content: {}", cell);
        self.copy_to_clipboard(cell);
    }

    fn copy_row(&mut self) {
        let Some((row_id, _)) = self.selected_cell() else {
            return;
        };
        let Some(row) = self.table.row(&row_id) else {
            return;
        };
        let row_content = row
            .values()
            .iter()
            .map(|v| wrap_cell_content(&display_value(v)))
            .collect::<Vec<String>>()
            .join(",");
        self.copy_to_clipboard(row_content);
    }

    fn copy_to_clipboard(&mut self, content: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    warn!("Clipboard unavailable: {:?}", e);
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => self.set_status_message("Copied to clipboard"),
                Err(e) => trace!("Error copying to clipboard: {:?}", e),
            }
        }
    }

    /// Quits, writing the table to the configured output first.
    ///
    /// A failed export keeps the app open once, a second quit leaves without saving.
    pub fn quit(&mut self) -> Result<(), TabError> {
        if let Some(output) = self.config.output.clone()
            && !self.export_failed
            && self.status != Status::EMPTY
        {
            let snapshot = self
                .changes
                .latest()
                .unwrap_or_else(|| self.table.snapshot());
            if let Err(e) = loader::export_csv(&snapshot, &output) {
                error!("Export to {output:?} failed: {e:?}");
                self.export_failed = true;
                self.set_status_message(format!("Export failed: {e}. Press q again to quit."));
                return Ok(());
            }
        }
        self.status = Status::QUITTING;
        Ok(())
    }

    pub fn get_uidata(&self) -> UIData {
        let page = self.current_page();
        let schema = self.table.schema();
        let max_width = self.config.max_column_width;

        let rows = self.table.rows()[page.range.clone()]
            .iter()
            .map(|row| {
                row.values()
                    .iter()
                    .zip(schema.columns())
                    .map(|(value, column)| render_cell(value, column.value_type, max_width))
                    .collect()
            })
            .collect();

        let editing = match self.modus {
            Modus::EDITING => Some(self.last_input.clone()),
            _ => None,
        };
        let cmdinput = match self.modus {
            Modus::CMDINPUT => Some(self.last_input.clone()),
            _ => None,
        };

        let status_message = if self.last_status_message_update.elapsed() < STATUS_MESSAGE_TIMEOUT {
            self.status_message.clone()
        } else {
            String::new()
        };

        UIData {
            name: self.name.clone(),
            headers: schema.columns().iter().map(|c| c.header()).collect(),
            column_types: schema.columns().iter().map(|c| c.value_type).collect(),
            rows,
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            editing,
            page_index: page.page_index,
            page_count: page.page_count,
            can_go_previous: page.can_go_previous,
            can_go_next: page.can_go_next,
            page_size: self.pagination.page_size().rows(),
            nrows: self.table.row_count(),
            modified: self.changes.changes() > 0,
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            cmdinput,
            cmd_mode: self.cmd_mode,
            status_message,
        }
    }
}

fn display_value(value: &Value) -> String {
    value.to_string()
}

fn render_cell(value: &Value, value_type: ValueType, max_width: usize) -> String {
    let text = match (value, value_type) {
        (Value::Boolean(true), _) => "[x]".to_string(),
        (Value::Boolean(false), _) | (Value::Null, ValueType::Boolean) => "[ ]".to_string(),
        (v, _) => v.to_string().replace("\r\n", " ↵ ").replace('\n', " ↵ "),
    };
    if text.chars().count() > max_width {
        let mut reduced: String = text.chars().take(max_width.saturating_sub(3)).collect();
        reduced.push_str("...");
        reduced
    } else {
        text
    }
}

fn wrap_cell_content(c: &str) -> String {
    let needs_escaping = c.contains('"');
    let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
    let mut out = String::from(c);

    if needs_escaping {
        out = out.replace('"', "\"\"");
    }
    if needs_wrapping || needs_escaping {
        out = format!("\"{out}\"");
    }
    out
}
