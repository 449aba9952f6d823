use std::sync::Arc;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, trace};

use crate::config::CTVConfig;
use crate::domain::{CMDMode, CTVError, HELP_TEXT, MAX_PAGE_SIZE, Message};
use crate::exporter::{self, ExportOutcome, ExportSink};
use crate::fetcher::{DataFetcher, FetchEvent, FetchKind, FetchOutcome};
use crate::inputter::{InputResult, Inputter};
use crate::record::{Record, SortDirection, SortField, StageFilter};
use crate::source::CustomerSource;
use crate::state::{Action, Transition, ViewState, reduce};
use crate::ui::{COLUMN_WIDTH_MARGIN, MAX_COLUMN_WIDTH};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

/// Everything the UI needs to render a frame.
pub struct UIData {
    pub name: String,
    pub columns: Vec<ColumnView>,
    pub nrows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub filter: StageFilter,
    pub page_number: usize,
    pub total_pages: usize,
    pub total_count: Option<usize>,
    pub previous_disabled: bool,
    pub next_disabled: bool,
    pub loading: bool,
    pub show_popup: bool,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub error_message: Option<String>,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            columns: Vec::new(),
            nrows: 0,
            selected_row: 0,
            selected_column: 0,
            filter: StageFilter::All,
            page_number: 1,
            total_pages: 0,
            total_count: None,
            previous_disabled: true,
            next_disabled: true,
            loading: false,
            show_popup: false,
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            error_message: None,
        }
    }
}

pub struct Model {
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    view: ViewState,
    rows: Vec<Record>,
    fetcher: DataFetcher,
    events: UnboundedReceiver<FetchEvent>,
    sink: Arc<dyn ExportSink>,
    exporting: bool,
    curser_row: usize,
    curser_column: usize,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    last_error: Option<String>,
    columns_dirty: bool,
    uidata: UIData,
}

impl Model {
    pub fn init(
        config: &CTVConfig,
        source: Arc<dyn CustomerSource>,
        sink: Arc<dyn ExportSink>,
        runtime: Handle,
    ) -> Result<Self, CTVError> {
        config.validate()?;
        let (fetcher, events) = DataFetcher::new(source, runtime);
        let mut model = Self {
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            view: ViewState::new(config.page_size),
            rows: Vec::new(),
            fetcher,
            events,
            sink,
            exporting: false,
            curser_row: 0,
            curser_column: 0,
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: String::new(),
            last_error: None,
            columns_dirty: true,
            uidata: UIData::empty(),
        };
        model.set_status_message("Loading ...");
        Ok(model)
    }

    /// Fire the count and the first page request together.
    pub fn start(&mut self) {
        self.fetcher.fetch_total_count();
        self.fetch_page();
        self.update_uidata();
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    /// Apply every fetch result that arrived since the last call.
    pub fn drain_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            self.handle_fetch_event(event);
            handled += 1;
        }
        handled
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), CTVError> {
        let Some(msg) = message else {
            return Ok(());
        };
        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_selection_up(),
                Message::MoveDown => self.move_selection_down(),
                Message::MoveLeft => self.move_selection_left(),
                Message::MoveRight => self.move_selection_right(),
                Message::MoveBeginning => self.curser_row = 0,
                Message::MoveEnd => self.curser_row = self.rows.len().saturating_sub(1),
                Message::NextPage => self.apply(Action::NextPage),
                Message::PreviousPage => self.apply(Action::PreviousPage),
                Message::SortAscending => self.sort_current_column(SortDirection::Asc),
                Message::SortDescending => self.sort_current_column(SortDirection::Desc),
                Message::Filter => self.enter_cmd_mode(CMDMode::Filter),
                Message::CycleFilter => self.apply(Action::SetFilter(self.view.filter().next())),
                Message::PageSize => self.enter_cmd_mode(CMDMode::PageSize),
                Message::Export => self.export(),
                Message::Refresh => self.refresh(),
                Message::CopyCell => self.copy_cell(),
                Message::CopyRow => self.copy_row(),
                Message::Help => self.show_help(),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Enter | Message::Exit | Message::Help => self.exit(),
                _ => (),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)
                }
            }
        }
        self.update_uidata();
        Ok(())
    }

    // -------------------- Fetch handling functions ---------------------- //

    fn apply(&mut self, action: Action) {
        let Transition { state, refetch } = reduce(&self.view, action);
        if state.sort_field() != self.view.sort_field()
            || state.sort_direction() != self.view.sort_direction()
        {
            self.columns_dirty = true;
        }
        self.view = state;
        if refetch {
            self.fetch_page();
        }
        self.update_uidata();
    }

    fn fetch_page(&mut self) {
        self.fetcher.fetch_page(self.view.page_request());
    }

    fn handle_fetch_event(&mut self, event: FetchEvent) {
        match self.fetcher.resolve(event) {
            FetchOutcome::Rows(rows) => {
                debug!("Received {} rows for page {}", rows.len(), self.view.page_number());
                self.rows = rows;
                self.columns_dirty = true;
                self.curser_row = 0;
                self.last_error = None;
                self.set_status_message(format!(
                    "Page {} of {}",
                    self.view.page_number(),
                    self.view.total_pages()
                ));
            }
            FetchOutcome::Count(count) => {
                info!("Backend holds {count} customer records");
                self.apply(Action::TotalCountLoaded(count));
            }
            FetchOutcome::Superseded(id) => trace!("Ignored superseded response {id:?}"),
            FetchOutcome::Failed(FetchKind::Page, e) => {
                error!("Error fetching paginated, sorted, and filtered customer data: {e}");
                self.set_error(format!("Loading page failed: {e} (r to retry)"));
            }
            FetchOutcome::Failed(FetchKind::Count, e) => {
                error!("Error fetching total customer count: {e}");
                self.set_error(format!("Counting customers failed: {e} (r to retry)"));
            }
            FetchOutcome::Exported(outcome) => {
                self.exporting = false;
                match outcome {
                    ExportOutcome::Downloaded { path, records } => self.set_status_message(
                        format!("Exported {records} customers to {}", path.display()),
                    ),
                    ExportOutcome::Empty => self.set_error("No data found for download."),
                    ExportOutcome::Failed(e) => self.set_error(format!("Export failed: {e}")),
                }
            }
        }
        self.update_uidata();
    }

    fn refresh(&mut self) {
        if self.view.total_count().is_none() {
            self.fetcher.fetch_total_count();
        }
        self.fetch_page();
        self.set_status_message("Refreshing ...");
    }

    fn export(&mut self) {
        if self.exporting {
            self.set_status_message("Export is already running ...");
            return;
        }
        self.exporting = true;
        self.fetcher.export_all(self.sink.clone());
        self.set_status_message("Exporting all customers ...");
    }

    fn sort_current_column(&mut self, direction: SortDirection) {
        if let Some(field) = SortField::from_index(self.curser_column) {
            self.apply(Action::SetSort(field, direction));
        }
    }

    // -------------------- Control handling functions ---------------------- //

    fn exit(&mut self) {
        if self.modus == Modus::POPUP {
            trace!("Close popup ...");
            self.modus = self.previous_modus;
            self.previous_modus = Modus::POPUP;
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.input.clear();
        match mode {
            CMDMode::Filter => self.input.set(self.view.filter().value()),
            CMDMode::PageSize => self.input.set(&self.view.page_size().to_string()),
        }
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
        }
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {:?}", self.last_input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        let mode = self.cmd_mode.take();
        if self.last_input.canceled {
            return;
        }

        let cmd_input = self.last_input.input.clone();
        match mode {
            Some(CMDMode::Filter) => match StageFilter::parse(&cmd_input) {
                Some(filter) => self.apply(Action::SetFilter(filter)),
                None => self.set_error(format!("Unknown stage filter \"{cmd_input}\"")),
            },
            Some(CMDMode::PageSize) => match cmd_input.trim().parse::<usize>() {
                Ok(size) if (1..=MAX_PAGE_SIZE).contains(&size) => {
                    self.apply(Action::SetPageSize(size))
                }
                _ => self.set_error(format!("Invalid page size \"{cmd_input}\"")),
            },
            None => info!("Cmd mode is none!"),
        }
    }

    fn move_selection_up(&mut self) {
        self.curser_row = self.curser_row.saturating_sub(1);
    }

    fn move_selection_down(&mut self) {
        if self.curser_row + 1 < self.rows.len() {
            self.curser_row += 1;
        }
    }

    fn move_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
    }

    fn move_selection_right(&mut self) {
        if self.curser_column + 1 < SortField::ALL.len() {
            self.curser_column += 1;
        }
    }

    pub fn selected_cell(&self) -> Option<String> {
        let record = self.rows.get(self.curser_row)?;
        let field = SortField::from_index(self.curser_column)?;
        Some(record.value(field).to_string())
    }

    pub fn selected_line(&self) -> Option<String> {
        let record = self.rows.get(self.curser_row)?;
        Some(exporter::encode_line(record.values()))
    }

    fn copy_cell(&mut self) {
        if let Some(cell) = self.selected_cell() {
            self.copy_to_clipboard(cell);
        }
    }

    fn copy_row(&mut self) {
        if let Some(line) = self.selected_line() {
            self.copy_to_clipboard(line);
        }
    }

    fn copy_to_clipboard(&mut self, content: String) {
        trace!("Copy content: {}", content);
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    error!("Clipboard unavailable: {e:?}");
                    self.set_error("Clipboard unavailable");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => self.set_status_message("Copied to clipboard."),
                Err(e) => {
                    error!("Error copying to clipboard: {e:?}");
                    self.set_error("Copying to clipboard failed");
                }
            }
        }
    }

    // -------------------- UI data ---------------------- //

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.update_uidata();
    }

    fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.update_uidata();
    }

    fn display_value(value: &str) -> String {
        value.replace("\r\n", " ↵ ").replace('\n', " ↵ ")
    }

    fn build_columns(&self) -> Vec<ColumnView> {
        SortField::ALL
            .iter()
            .map(|field| {
                let name = if *field == self.view.sort_field() {
                    format!("{} {}", field.label(), self.view.sort_direction().arrow())
                } else {
                    field.label().to_string()
                };
                let data: Vec<String> = self
                    .rows
                    .iter()
                    .map(|r| Model::display_value(r.value(*field)))
                    .collect();
                let max_width = data
                    .iter()
                    .map(|s| s.chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0);
                ColumnView {
                    name,
                    width: std::cmp::min(max_width + COLUMN_WIDTH_MARGIN, MAX_COLUMN_WIDTH),
                    data,
                }
            })
            .collect()
    }

    // Columns are only rebuilt after new rows or a new sort order.
    fn update_uidata(&mut self) {
        let columns = if self.columns_dirty {
            self.columns_dirty = false;
            self.build_columns()
        } else {
            std::mem::take(&mut self.uidata.columns)
        };
        self.uidata = UIData {
            name: self.fetcher.source_name().to_string(),
            columns,
            nrows: self.rows.len(),
            selected_row: self.curser_row,
            selected_column: self.curser_column,
            filter: self.view.filter(),
            page_number: self.view.page_number(),
            total_pages: self.view.total_pages(),
            total_count: self.view.total_count(),
            previous_disabled: self.view.is_previous_disabled(),
            next_disabled: self.view.is_next_disabled(),
            loading: self.fetcher.is_loading() || self.exporting,
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            error_message: self.last_error.clone(),
        }
    }

    #[cfg(test)]
    async fn settle(&mut self) {
        let event = self.events.recv().await.unwrap();
        self.handle_fetch_event(event);
    }
}
