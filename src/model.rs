use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::time::Instant;
use tracing::{debug, error, info, trace};

use crate::backend::ImportOutcome;
use crate::config::{DeskConfig, expand_path};
use crate::domain::{CMDMode, DeskError, HELP_TEXT, Message};
use crate::export;
use crate::import::ImportMapping;
use crate::inputter::{InputResult, Inputter};
use crate::record::{Record, Value};
use crate::session::Session;
use crate::tasks::Worker;
use crate::ui::COLUMN_WIDTH_MARGIN;
use crate::view::{ColumnSource, PageSize, RecordTable};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    PROCESSING,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    LOGIN,
    TABLE,
    POPUP,
    CONFIRM,
    CMDINPUT,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
}

/// Everything the ui needs for one frame.
pub struct UIData {
    pub name: String,
    pub columns: Vec<ColumnView>,
    pub rows: Vec<Vec<String>>,
    pub serial_start: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_matches: usize,
    pub page_size: usize,
    pub search_term: String,
    pub loading: bool,
    pub show_login: bool,
    pub login_email: String,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_status_message_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            columns: Vec::new(),
            rows: Vec::new(),
            serial_start: 1,
            selected_row: 0,
            selected_column: 0,
            current_page: 1,
            total_pages: 0,
            total_matches: 0,
            page_size: 0,
            search_term: String::new(),
            loading: false,
            show_login: false,
            login_email: String::new(),
            show_popup: false,
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
        }
    }
}

pub struct Model {
    config: DeskConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    session: Session,
    table: RecordTable,
    worker: Worker,
    curser_row: usize,
    curser_column: usize,
    pending_delete: Option<i64>,
    login_email: String,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    search_before: String,
    last_input: InputResult,
    active_cmdinput: bool,
    popup_message: String,
    status_message: String,
    last_status_message_update: Instant,
    uidata: UIData,
}

impl Model {
    pub fn init(config: &DeskConfig, session: Session, worker: Worker) -> Result<Self, DeskError> {
        let clipboard = match Clipboard::new() {
            Ok(clipboard) => Some(clipboard),
            Err(e) => {
                debug!("Clipboard not available: {e:?}");
                None
            }
        };
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            session,
            table: Self::new_table(config)?,
            worker,
            curser_row: 0,
            curser_column: 0,
            pending_delete: None,
            login_email: String::new(),
            clipboard,
            input: Inputter::default(),
            cmd_mode: None,
            search_before: String::new(),
            last_input: InputResult::default(),
            active_cmdinput: false,
            popup_message: String::new(),
            status_message: "Started rdesk!".to_string(),
            last_status_message_update: Instant::now(),
            uidata: UIData::empty(),
        };
        if model.session.is_authenticated() {
            model.refresh();
        } else {
            model.show_login();
        }
        model.update_uidata();
        Ok(model)
    }

    fn new_table(config: &DeskConfig) -> Result<RecordTable, DeskError> {
        let mut table = RecordTable::new(config.kind, ColumnSource::Declared);
        table.set_page_size(PageSize::new(config.page_size)?);
        Ok(table)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn table(&self) -> &RecordTable {
        &self.table
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn is_confirming(&self) -> bool {
        self.modus == Modus::CONFIRM
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), DeskError> {
        if let Some(msg) = message {
            match msg {
                Message::Fetched { generation, result } => self.fetched(generation, result),
                Message::Deleted { id, result } => self.deleted(id, result),
                Message::Imported(result) => self.imported(result),
                msg => self.handle(msg)?,
            }
        }
        self.update_uidata();
        Ok(())
    }

    fn handle(&mut self, msg: Message) -> Result<(), DeskError> {
        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveDown => self.move_selection_down(),
                Message::MoveUp => self.move_selection_up(),
                Message::MoveLeft => self.curser_column = self.curser_column.saturating_sub(1),
                Message::MoveRight => self.move_selection_right(),
                Message::NextPage => self.change_page(|t| t.next_page()),
                Message::PrevPage => self.change_page(|t| t.prev_page()),
                Message::FirstPage => self.change_page(|t| t.goto_page(1)),
                Message::LastPage => self.change_page(|t| t.last_page()),
                Message::Sort => self.sort_current_column(),
                Message::Search => self.enter_cmd_mode(CMDMode::Search),
                Message::ClearSearch => self.search(""),
                Message::CyclePageSize => self.cycle_page_size(),
                Message::Delete => self.ask_delete(),
                Message::CopyRow => self.copy_row(),
                Message::Refresh => self.refresh(),
                Message::Import => self.enter_cmd_mode(CMDMode::ImportPath),
                Message::Export => self.enter_cmd_mode(CMDMode::ExportPath),
                Message::Logout => self.logout()?,
                Message::Help => self.show_help(),
                Message::Exit => {
                    if !self.table.state().search_term().is_empty() {
                        self.search("");
                    }
                }
                _ => (),
            },
            Modus::CONFIRM => match msg {
                Message::Quit => self.quit(),
                Message::Confirm | Message::Enter => self.confirm_delete(),
                Message::Exit => self.cancel_delete(),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Enter | Message::Help => self.exit_popup(),
                _ => (),
            },
            Modus::LOGIN | Modus::CMDINPUT => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)?
                }
            }
        }
        Ok(())
    }

    // -------------------- Backend results ---------------------- //

    fn fetched(&mut self, generation: u64, result: Result<Vec<Record>, DeskError>) {
        match result {
            Ok(records) => {
                let count = records.len();
                if self.table.replace(generation, records) {
                    self.set_status_message(format!("Loaded {count} records"));
                }
            }
            Err(e) => {
                error!("Fetching records failed: {e}");
                self.table.fetch_failed(generation);
                self.set_status_message(format!("Loading failed: {e}"));
            }
        }
        self.clamp_selection();
    }

    fn deleted(&mut self, id: i64, result: Result<(), DeskError>) {
        match result {
            Ok(()) => {
                self.table.remove(id);
                self.set_status_message(format!("Deleted record {id}"));
            }
            Err(e) => {
                error!("Deleting record {id} failed: {e}");
                self.set_status_message(format!("Delete failed! {e}"));
            }
        }
        self.clamp_selection();
    }

    fn imported(&mut self, result: Result<ImportOutcome, DeskError>) {
        if self.status == Status::PROCESSING {
            self.status = Status::READY;
        }
        match result {
            Ok(outcome) if outcome.accepted() => {
                self.set_status_message(format!(
                    "Upload successful: {}",
                    outcome.message().unwrap_or("records saved")
                ));
                self.refresh();
            }
            Ok(outcome) => {
                let message = outcome
                    .message()
                    .unwrap_or("not confirmed by the server")
                    .to_string();
                error!("Bulk import rejected: {message}");
                self.set_status_message(format!("Upload failed! {message}"));
            }
            Err(e) => {
                error!("Bulk import failed: {e}");
                self.set_status_message(format!("Upload failed! {e}"));
            }
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn refresh(&mut self) {
        let generation = self.table.begin_fetch();
        self.worker.fetch(self.table.kind(), generation);
        self.set_status_message("Loading ...");
    }

    fn show_login(&mut self) {
        self.modus = Modus::LOGIN;
        self.login_email.clear();
        self.enter_cmd_mode(CMDMode::LoginEmail);
    }

    fn logout(&mut self) -> Result<(), DeskError> {
        self.session.logout()?;
        self.table.clear();
        self.curser_row = 0;
        self.curser_column = 0;
        self.show_login();
        self.set_status_message("Logged out");
        Ok(())
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup_message = HELP_TEXT.to_string();
    }

    fn exit_popup(&mut self) {
        trace!("Close popup ...");
        self.modus = self.previous_modus;
        self.previous_modus = Modus::POPUP;
        self.popup_message.clear();
    }

    fn raw_input(&mut self, key: KeyEvent) -> Result<(), DeskError> {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input()?;
            } else if self.cmd_mode == Some(CMDMode::Search) {
                // Live filter while typing
                self.table.search(&self.last_input.input);
                self.curser_row = 0;
            }
        }
        Ok(())
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        if self.modus != Modus::LOGIN {
            self.previous_modus = self.modus;
            self.modus = Modus::CMDINPUT;
        }
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.input.clear();
        if mode == CMDMode::Search {
            self.search_before = self.table.state().search_term().to_string();
            self.input.set(&self.search_before);
        }
        self.last_input = self.input.get();
    }

    fn handle_cmd_input(&mut self) -> Result<(), DeskError> {
        let input = self.last_input.clone();
        let mode = self.cmd_mode.take();
        self.active_cmdinput = false;
        if self.modus == Modus::CMDINPUT {
            self.modus = self.previous_modus;
            self.previous_modus = Modus::CMDINPUT;
        }

        match mode {
            Some(CMDMode::LoginEmail) => {
                if input.canceled {
                    self.quit();
                } else {
                    self.login_email = input.input.trim().to_string();
                    self.enter_cmd_mode(CMDMode::LoginPassword);
                }
            }
            Some(CMDMode::LoginPassword) => {
                if input.canceled {
                    self.show_login();
                } else if self.session.login(&self.login_email, &input.input)? {
                    self.modus = Modus::TABLE;
                    self.refresh();
                } else {
                    self.show_login();
                    self.set_status_message("Please enter valid credentials");
                }
            }
            Some(CMDMode::Search) => {
                if input.canceled {
                    let previous = std::mem::take(&mut self.search_before);
                    self.search(&previous);
                } else {
                    self.search(&input.input);
                }
            }
            Some(CMDMode::ImportPath) => {
                if !input.canceled && !input.input.trim().is_empty() {
                    self.start_import(input.input.trim());
                }
            }
            Some(CMDMode::ExportPath) => {
                if !input.canceled && !input.input.trim().is_empty() {
                    self.export(input.input.trim());
                }
            }
            None => info!("Cmd mode is none!"),
        }
        Ok(())
    }

    fn search(&mut self, term: &str) {
        trace!("Starting search for {} ...", term);
        let start_time = Instant::now();
        self.table.search(term);
        self.curser_row = 0;
        let matches = self.table.view().total_matches;
        trace!(
            "Search found {} matching records in {}ms",
            matches,
            start_time.elapsed().as_millis()
        );
        if term.is_empty() {
            self.set_status_message(format!("Showing all {matches} records"));
        } else if matches == 0 {
            self.set_status_message("Found no matches!");
        } else {
            self.set_status_message(format!("Found {matches} results"));
        }
    }

    fn sort_current_column(&mut self) {
        let columns = self.table.columns();
        if let Some(field) = columns.get(self.curser_column) {
            self.table.sort_by(field);
            let sort = self.table.state().sort();
            let message = format!("Sorted by {} {}", sort.field, sort.direction.arrow());
            self.set_status_message(message);
        }
    }

    fn cycle_page_size(&mut self) {
        self.table.cycle_page_size();
        self.curser_row = 0;
        let size = self.table.state().page_size().get();
        self.set_status_message(format!("Showing {size} entries per page"));
    }

    fn change_page(&mut self, f: impl FnOnce(&mut RecordTable)) {
        let before = self.table.state().current_page();
        f(&mut self.table);
        if self.table.state().current_page() != before {
            self.curser_row = 0;
        }
    }

    fn start_import(&mut self, path: &str) {
        match expand_path(path) {
            Ok(path) => {
                info!("Importing {}", path.display());
                self.status = Status::PROCESSING;
                self.worker
                    .import(path, ImportMapping::for_kind(self.table.kind()), Vec::new());
                self.set_status_message("Uploading ...");
            }
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    fn export(&mut self, path: &str) {
        let result = expand_path(path).and_then(|path| {
            export::export_workbook(
                self.table.records(),
                &self.table.columns(),
                &path,
                &self.config.backend.base_url,
            )
        });
        match result {
            Ok(summary) => self.set_status_message(format!(
                "Exported {} records ({} valid map links)",
                summary.total, summary.valid
            )),
            Err(e) => {
                error!("Export failed: {e}");
                self.set_status_message(format!("Export failed! {e}"));
            }
        }
    }

    fn selected_id(&self) -> Option<i64> {
        self.table
            .view()
            .rows
            .get(self.curser_row)
            .and_then(|r| r.id())
    }

    fn ask_delete(&mut self) {
        match self.selected_id() {
            Some(id) => {
                self.pending_delete = Some(id);
                self.previous_modus = self.modus;
                self.modus = Modus::CONFIRM;
                self.popup_message = format!("Delete record {id}?\n\n(y)es / (n)o");
            }
            None => self.set_status_message("Nothing selected"),
        }
    }

    fn confirm_delete(&mut self) {
        self.modus = Modus::TABLE;
        self.popup_message.clear();
        if let Some(id) = self.pending_delete.take() {
            self.worker.delete(self.table.kind(), id);
            self.set_status_message(format!("Deleting record {id} ..."));
        }
    }

    fn cancel_delete(&mut self) {
        self.modus = Modus::TABLE;
        self.popup_message.clear();
        self.pending_delete = None;
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

    fn copy_row(&mut self) {
        let view = self.table.view();
        let Some(record) = view.rows.get(self.curser_row) else {
            return;
        };
        let row_content = self
            .table
            .columns()
            .iter()
            .map(|c| Self::wrap_cell_content(&record.get(c).map(Value::as_text).unwrap_or_default()))
            .collect::<Vec<String>>()
            .join(",");

        let message = match self.clipboard.as_mut() {
            Some(clipboard) => match clipboard.set_text(row_content) {
                Ok(_) => "Copied record to clipboard.".to_string(),
                Err(e) => format!("Error copying to clipboard: {e:?}"),
            },
            None => "No clipboard available".to_string(),
        };
        trace!("{message}");
        self.set_status_message(message);
    }

    fn move_selection_down(&mut self) {
        let view = self.table.view();
        if self.curser_row + 1 < view.rows.len() {
            self.curser_row += 1;
        } else if view.current_page < view.total_pages {
            self.table.next_page();
            self.curser_row = 0;
        }
    }

    fn move_selection_up(&mut self) {
        if self.curser_row > 0 {
            self.curser_row -= 1;
        } else if self.table.state().current_page() > 1 {
            self.table.prev_page();
            self.curser_row = self.table.state().page_size().get() - 1;
        }
    }

    fn move_selection_right(&mut self) {
        let columns = self.table.columns().len();
        if self.curser_column + 1 < columns {
            self.curser_column += 1;
        }
    }

    fn clamp_selection(&mut self) {
        let rows = self.table.view().rows.len();
        self.curser_row = std::cmp::min(self.curser_row, rows.saturating_sub(1));
        let columns = self.table.columns().len();
        self.curser_column = std::cmp::min(self.curser_column, columns.saturating_sub(1));
    }

    fn cell_text(value: Option<&Value>) -> String {
        value
            .map(|v| v.as_text().replace("\r\n", " ↵ ").replace('\n', " ↵ "))
            .unwrap_or_default()
    }

    fn update_uidata(&mut self) {
        let columns = self.table.columns();
        let view = self.table.view();
        let state = self.table.state();
        let sort = state.sort();

        let rows: Vec<Vec<String>> = view
            .rows
            .iter()
            .map(|r| columns.iter().map(|c| Self::cell_text(r.get(c))).collect())
            .collect();

        let column_views = columns
            .iter()
            .enumerate()
            .map(|(cidx, name)| {
                let mut header = name.replace('_', " ").to_uppercase();
                if *name == sort.field {
                    header.push(' ');
                    header.push_str(sort.direction.arrow());
                }
                let max_width = rows
                    .iter()
                    .map(|r| r[cidx].chars().count())
                    .max()
                    .unwrap_or(0);
                let width = std::cmp::max(header.chars().count(), max_width) + COLUMN_WIDTH_MARGIN;
                ColumnView {
                    name: header,
                    width: std::cmp::min(width, self.config.max_column_width),
                }
            })
            .collect();

        let page_size = state.page_size().get();
        self.uidata = UIData {
            name: self.table.kind().title().to_string(),
            columns: column_views,
            rows,
            serial_start: (view.current_page - 1) * page_size + 1,
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            current_page: view.current_page,
            total_pages: view.total_pages,
            total_matches: view.total_matches,
            page_size,
            search_term: state.search_term().to_string(),
            loading: self.table.is_loading(),
            show_login: self.modus == Modus::LOGIN,
            login_email: self.login_email.clone(),
            show_popup: matches!(self.modus, Modus::POPUP | Modus::CONFIRM),
            popup_message: self.popup_message.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ratatui::crossterm::event::{KeyCode, KeyModifiers};

    use super::*;
    use crate::backend::{Backend, BulkUpload};
    use crate::record::RecordKind;
    use crate::tasks;

    struct Offline;

    impl Backend for Offline {
        fn fetch(&self, _kind: RecordKind) -> Result<Vec<Record>, DeskError> {
            Err(DeskError::LoadingFailed("offline".into()))
        }
        fn delete(&self, _kind: RecordKind, _id: i64) -> Result<(), DeskError> {
            Err(DeskError::LoadingFailed("offline".into()))
        }
        fn create(&self, _kind: RecordKind, _record: &Record) -> Result<(), DeskError> {
            Ok(())
        }
        fn bulk_import(&self, _upload: &BulkUpload) -> Result<ImportOutcome, DeskError> {
            Ok(ImportOutcome::default())
        }
    }

    fn model(authenticated: bool) -> (Model, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session");
        if authenticated {
            std::fs::write(&path, "true").unwrap();
        }
        let config = DeskConfig::defaults().unwrap().with_session_file(path.clone());
        let session = Session::load(path).unwrap();
        let (worker, _rx) = tasks::channel(Arc::new(Offline));
        (Model::init(&config, session, worker).unwrap(), dir)
    }

    fn retailers(n: i64) -> Vec<Record> {
        (1..=n)
            .map(|i| {
                Record::new()
                    .with("id", i)
                    .with("shop_name", format!("Shop {i}").as_str())
                    .with("created_at", "2024-01-01")
            })
            .collect()
    }

    fn type_line(model: &mut Model, text: &str) {
        for c in text.chars() {
            let key = KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE);
            model.update(Some(Message::RawKey(key))).unwrap();
        }
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        model.update(Some(Message::RawKey(enter))).unwrap();
    }

    #[test]
    fn login_gate_opens_the_table() {
        let (mut model, _dir) = model(false);
        assert!(model.get_uidata().show_login);
        assert!(model.raw_keyevents());

        type_line(&mut model, "me@example.com");
        assert_eq!(model.get_uidata().cmd_mode, Some(CMDMode::LoginPassword));
        type_line(&mut model, "secret");

        assert!(!model.get_uidata().show_login);
        assert!(model.table().is_loading());
    }

    #[test]
    fn fetched_records_fill_the_first_page() {
        let (mut model, _dir) = model(true);
        let generation = model.table().generation();
        model
            .update(Some(Message::Fetched {
                generation,
                result: Ok(retailers(7)),
            }))
            .unwrap();

        let ui = model.get_uidata();
        assert_eq!(ui.rows.len(), 5);
        assert_eq!(ui.total_pages, 2);
        assert!(!ui.loading);
        assert_eq!(ui.columns[0].name, "ID ▲");
        assert!(model.table().records()[0].get("created_at").is_none());

        model.update(Some(Message::NextPage)).unwrap();
        assert_eq!(model.get_uidata().rows.len(), 2);
        assert_eq!(model.get_uidata().serial_start, 6);
    }

    #[test]
    fn failed_fetch_keeps_records_and_clears_loading() {
        let (mut model, _dir) = model(true);
        let generation = model.table().generation();
        model
            .update(Some(Message::Fetched {
                generation,
                result: Ok(retailers(3)),
            }))
            .unwrap();
        model.update(Some(Message::Refresh)).unwrap();
        let generation = model.table().generation();
        model
            .update(Some(Message::Fetched {
                generation,
                result: Err(DeskError::LoadingFailed("down".into())),
            }))
            .unwrap();
        assert_eq!(model.table().records().len(), 3);
        assert!(!model.get_uidata().loading);
        assert!(model.get_uidata().status_message.starts_with("Loading failed"));
    }

    #[test]
    fn delete_needs_confirmation_and_failure_keeps_rows() {
        let (mut model, _dir) = model(true);
        let generation = model.table().generation();
        model
            .update(Some(Message::Fetched {
                generation,
                result: Ok(retailers(3)),
            }))
            .unwrap();

        model.update(Some(Message::Delete)).unwrap();
        assert!(model.is_confirming());
        model.update(Some(Message::Exit)).unwrap();
        assert!(!model.is_confirming());

        model
            .update(Some(Message::Deleted {
                id: 1,
                result: Err(DeskError::Http {
                    status: 500,
                    message: "boom".into(),
                }),
            }))
            .unwrap();
        assert_eq!(model.table().records().len(), 3);

        model
            .update(Some(Message::Deleted { id: 1, result: Ok(()) }))
            .unwrap();
        assert_eq!(model.table().records().len(), 2);
    }

    fn press(model: &mut Model, code: KeyCode) {
        let key = KeyEvent::new(code, KeyModifiers::NONE);
        model.update(Some(Message::RawKey(key))).unwrap();
    }

    fn loaded(records: Vec<Record>) -> (Model, tempfile::TempDir) {
        let (mut model, dir) = model(true);
        let generation = model.table().generation();
        model
            .update(Some(Message::Fetched {
                generation,
                result: Ok(records),
            }))
            .unwrap();
        (model, dir)
    }

    #[test]
    fn search_filters_while_typing_and_escape_restores() {
        let (mut model, _dir) = loaded(retailers(12));
        model.update(Some(Message::Search)).unwrap();
        press(&mut model, KeyCode::Char('1'));
        // Shop 1, Shop 10, Shop 11, Shop 12
        assert_eq!(model.get_uidata().total_matches, 4);
        press(&mut model, KeyCode::Char('1'));
        assert_eq!(model.get_uidata().total_matches, 1);

        press(&mut model, KeyCode::Esc);
        assert!(!model.raw_keyevents());
        assert_eq!(model.get_uidata().search_term, "");
        assert_eq!(model.get_uidata().total_matches, 12);
    }

    #[test]
    fn fetch_started_before_logout_stays_stale() {
        let (mut model, _dir) = model(true);
        let before_logout = model.table().generation();
        model.update(Some(Message::Logout)).unwrap();
        assert!(model.get_uidata().show_login);

        type_line(&mut model, "me@example.com");
        type_line(&mut model, "secret");
        assert!(model.table().generation() > before_logout);

        model
            .update(Some(Message::Fetched {
                generation: before_logout,
                result: Ok(retailers(3)),
            }))
            .unwrap();
        assert!(model.table().records().is_empty());
        assert!(model.get_uidata().loading);
    }

    #[test]
    fn rejected_upload_is_reported_as_failure() {
        let (mut model, _dir) = model(true);
        let generation = model.table().generation();
        let outcome = ImportOutcome {
            success: Some(false),
            msg: None,
            message: Some("rows rejected".to_string()),
        };
        model.update(Some(Message::Imported(Ok(outcome)))).unwrap();
        assert_eq!(model.get_uidata().status_message, "Upload failed! rows rejected");
        // No refresh after a rejected batch
        assert_eq!(model.table().generation(), generation);
    }

    #[test]
    fn cell_content_is_quoted_for_csv() {
        assert_eq!(Model::wrap_cell_content("plain"), "plain");
        assert_eq!(Model::wrap_cell_content("a, b"), "\"a, b\"");
        assert_eq!(Model::wrap_cell_content("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
