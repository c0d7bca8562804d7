// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use jobtrack_app::{
    ApiError, ApiErrorKind, AppCommand, AppMode, AppState, ApplicationField, ApplicationId,
    ColorOverrides, CommitOutcome, CommitRequest, CommitStart, DataSource, DateRange,
    EditCellKey, EditForm, EditTransition, FieldKind, FilterTarget, Filters, FormAction,
    FormSubmission, HistoryFetch, HistoryState, HistoryViewer, JobApplication, NewApplication,
    SortDirection, SortKey, StatusHistoryEntry, TableEngine, format_timestamp, resolve_color,
    status_options,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::{Date, OffsetDateTime};
use tracing::{info, warn};

const EDIT_CURSOR: &str = "▏";
const FILTER_MARK_ACTIVE: &str = "▼";
const STATUS_CLEAR_DELAY: Duration = Duration::from_secs(4);
const SAVE_IN_PROGRESS: &str = "save in progress -- wait for it to finish";

/// Rows handed to the table plus where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedApplications {
    pub applications: Vec<JobApplication>,
    pub source: DataSource,
}

/// Backend seam for the event loop. The `spawn_*` methods report back on
/// `tx`; the defaults run inline so in-memory runtimes stay synchronous.
pub trait AppRuntime {
    fn load_applications(&mut self) -> Result<LoadedApplications>;
    fn status_colors(&mut self) -> ColorOverrides;
    /// `index` is the record's position in the full, unfiltered collection.
    fn update_application(
        &mut self,
        record: &JobApplication,
        index: usize,
    ) -> Result<(), ApiError>;
    fn create_application(&mut self, input: &NewApplication) -> Result<JobApplication, ApiError>;
    fn delete_application(&mut self, id: ApplicationId) -> Result<(), ApiError>;
    fn fetch_status_history(
        &mut self,
        id: ApplicationId,
    ) -> Result<Vec<StatusHistoryEntry>, ApiError>;
    fn clear_cache(&mut self) -> Result<usize>;

    fn spawn_load(&mut self, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self
            .load_applications()
            .map_err(|error| format!("{error:#}"));
        let colors = self.status_colors();
        tx.send(InternalEvent::ApplicationsLoaded { result, colors })
            .map_err(|_| anyhow!("load event channel closed"))?;
        Ok(())
    }

    /// Persist a cell commit.
    fn spawn_update(&mut self, request: CommitRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self.update_application(&request.record, request.index);
        tx.send(InternalEvent::CommitFinished { request, result })
            .map_err(|_| anyhow!("commit event channel closed"))?;
        Ok(())
    }

    fn spawn_form_save(
        &mut self,
        submission: FormSubmission,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let result = match &submission {
            FormSubmission::Create(input) => self.create_application(input),
            FormSubmission::Update { record, index } => self
                .update_application(record, *index)
                .map(|()| record.clone()),
        };
        tx.send(InternalEvent::FormSaved { submission, result })
            .map_err(|_| anyhow!("form event channel closed"))?;
        Ok(())
    }

    fn spawn_delete(&mut self, id: ApplicationId, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self.delete_application(id);
        tx.send(InternalEvent::DeleteFinished { id, result })
            .map_err(|_| anyhow!("delete event channel closed"))?;
        Ok(())
    }

    fn spawn_history_fetch(&mut self, fetch: HistoryFetch, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self.fetch_status_history(fetch.application_id);
        tx.send(InternalEvent::HistoryLoaded {
            request_id: fetch.request_id,
            result,
        })
        .map_err(|_| anyhow!("history event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    ApplicationsLoaded {
        result: Result<LoadedApplications, String>,
        colors: ColorOverrides,
    },
    FormSaved {
        submission: FormSubmission,
        result: Result<JobApplication, ApiError>,
    },
    DeleteFinished {
        id: ApplicationId,
        result: Result<(), ApiError>,
    },
    CommitFinished {
        request: CommitRequest,
        result: Result<(), ApiError>,
    },
    HistoryLoaded {
        request_id: u64,
        result: Result<Vec<StatusHistoryEntry>, ApiError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableCommand {
    MoveRow(isize),
    MoveColumn(isize),
    JumpFirstRow,
    JumpLastRow,
    CycleSort,
    ClearSort,
    FilterByCell,
    CycleDateRange,
    ClearFilters,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TableStatus {
    SortUnavailable(&'static str),
    Sorted(SortKey),
    SortCleared,
    FilterUnavailable(&'static str),
    Filtered(FilterTarget),
    DateRange(DateRange),
    FiltersCleared,
    NoRows,
}

impl TableStatus {
    fn message(self) -> String {
        match self {
            Self::SortUnavailable(column) => format!("sort unavailable for {column}"),
            Self::Sorted(key) => format!(
                "sort {} {}",
                key.field.label(),
                match key.direction {
                    SortDirection::Asc => "asc",
                    SortDirection::Desc => "desc",
                }
            ),
            Self::SortCleared => "sort cleared (newest first)".to_owned(),
            Self::FilterUnavailable(column) => format!("no filter for {column}"),
            Self::Filtered(FilterTarget::Status(status)) if status.is_empty() => {
                "filter status: (none)".to_owned()
            }
            Self::Filtered(FilterTarget::Status(status)) => format!("filter status: {status}"),
            Self::Filtered(FilterTarget::Company(company)) => format!("filter company: {company}"),
            Self::Filtered(FilterTarget::RecentDate) => {
                format!("filter applied: {}", DateRange::Week.label())
            }
            Self::DateRange(range) => format!("date range: {}", range.label()),
            Self::FiltersCleared => "filters cleared".to_owned(),
            Self::NoRows => "no rows".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ViewData {
    today: Date,
    table: TableEngine,
    colors: ColorOverrides,
    selected_row: usize,
    selected_col: usize,
    status_picker: usize,
    form: Option<EditForm>,
    history: HistoryViewer,
    help_visible: bool,
    loading: bool,
    status_token: u64,
}

impl ViewData {
    fn new(today: Date) -> Self {
        Self {
            today,
            table: TableEngine::default(),
            colors: ColorOverrides::new(),
            selected_row: 0,
            selected_col: 0,
            status_picker: 0,
            form: None,
            history: HistoryViewer::default(),
            help_visible: false,
            loading: false,
            status_token: 0,
        }
    }

    fn visible_rows(&self) -> Vec<usize> {
        self.table.visible_rows(self.today)
    }

    fn selected_field(&self) -> ApplicationField {
        let last = ApplicationField::ALL.len() - 1;
        ApplicationField::ALL[self.selected_col.min(last)]
    }

    fn selected_record(&self) -> Option<&JobApplication> {
        let rows = self.visible_rows();
        rows.get(self.selected_row)
            .and_then(|index| self.table.records().get(*index))
    }

    fn selected_key(&self) -> Option<EditCellKey> {
        self.selected_record()
            .map(|record| EditCellKey::new(record.id, self.selected_field()))
    }

    fn clamp_cursor(&mut self) {
        let len = self.visible_rows().len();
        self.selected_row = self.selected_row.min(len.saturating_sub(1));
    }
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(OffsetDateTime::now_utc().date());
    let (internal_tx, internal_rx) = mpsc::channel();

    reload_applications(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)) {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error).context("poll event");
                break;
            }
        };
        if has_event {
            let event = match event::read() {
                Ok(event) => event,
                Err(error) => {
                    result = Err(error).context("read event");
                    break;
                }
            };
            match event {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::ApplicationsLoaded { result, colors } => {
                handle_load_finished(state, view_data, tx, result, colors);
            }
            InternalEvent::FormSaved { submission, result } => {
                handle_form_saved(state, view_data, tx, submission, result);
            }
            InternalEvent::DeleteFinished { id, result } => {
                handle_delete_finished(state, view_data, tx, id, result);
            }
            InternalEvent::CommitFinished { request, result } => {
                handle_commit_finished(state, view_data, tx, request, result);
            }
            InternalEvent::HistoryLoaded { request_id, result } => {
                view_data.history.finish(request_id, result);
            }
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_DELAY);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn reload_applications<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if view_data.loading {
        emit_status(state, view_data, internal_tx, "reload in progress");
        return;
    }
    view_data.loading = true;
    emit_status(state, view_data, internal_tx, "loading applications...");
    if let Err(error) = runtime.spawn_load(internal_tx.clone()) {
        let colors = view_data.colors.clone();
        handle_load_finished(
            state,
            view_data,
            internal_tx,
            Err(format!("{error:#}")),
            colors,
        );
    }
}

fn handle_load_finished(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    result: Result<LoadedApplications, String>,
    colors: ColorOverrides,
) {
    view_data.loading = false;
    view_data.colors = colors;
    match result {
        Ok(loaded) => {
            info!(
                count = loaded.applications.len(),
                source = ?loaded.source,
                "applications loaded"
            );
            view_data.table.replace_records(loaded.applications);
            view_data.clamp_cursor();
            state.dispatch(AppCommand::SetSource(loaded.source));
            view_data.status_token = view_data.status_token.saturating_add(1);
            schedule_status_clear(internal_tx, view_data.status_token);
        }
        Err(error) => {
            warn!(%error, "load failed");
            emit_status(state, view_data, internal_tx, format!("load failed: {error}"));
        }
    }
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    match state.mode {
        AppMode::Nav => return handle_nav_key(state, runtime, view_data, internal_tx, key),
        AppMode::Search => handle_search_key(state, view_data, key),
        AppMode::EditCell => handle_edit_key(state, runtime, view_data, internal_tx, key),
        AppMode::Form => handle_form_key(state, runtime, view_data, internal_tx, key),
        AppMode::History => handle_history_key(state, runtime, view_data, internal_tx, key),
    }
    false
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if let Some(command) = table_command_for_key(key) {
        if let Some(status) = apply_table_command(view_data, command) {
            emit_status(state, view_data, internal_tx, status.message());
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Enter | KeyCode::Char('e') => begin_cell_edit(state, view_data, internal_tx),
        KeyCode::Char('/') => {
            state.dispatch(AppCommand::StartSearch);
        }
        KeyCode::Char('a') => {
            if view_data.table.is_saving() {
                emit_status(state, view_data, internal_tx, SAVE_IN_PROGRESS);
                return false;
            }
            view_data.form = Some(EditForm::create(view_data.today));
            state.dispatch(AppCommand::OpenForm);
        }
        KeyCode::Char('o') => open_edit_form(state, view_data, internal_tx),
        KeyCode::Char('H') => open_history(state, runtime, view_data, internal_tx),
        KeyCode::Char('r') => reload_applications(state, runtime, view_data, internal_tx),
        KeyCode::Char('X') => match runtime.clear_cache() {
            Ok(removed) => emit_status(
                state,
                view_data,
                internal_tx,
                format!("cache cleared ({removed} snapshots)"),
            ),
            Err(error) => emit_status(
                state,
                view_data,
                internal_tx,
                format!("clear cache failed: {error:#}"),
            ),
        },
        _ => {}
    }
    false
}

fn table_command_for_key(key: KeyEvent) -> Option<TableCommand> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return None;
    }
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => Some(TableCommand::MoveRow(1)),
        KeyCode::Char('k') | KeyCode::Up => Some(TableCommand::MoveRow(-1)),
        KeyCode::Char('h') | KeyCode::Left => Some(TableCommand::MoveColumn(-1)),
        KeyCode::Char('l') | KeyCode::Right => Some(TableCommand::MoveColumn(1)),
        KeyCode::Char('g') | KeyCode::Home => Some(TableCommand::JumpFirstRow),
        KeyCode::Char('G') | KeyCode::End => Some(TableCommand::JumpLastRow),
        KeyCode::Char('s') => Some(TableCommand::CycleSort),
        KeyCode::Char('S') => Some(TableCommand::ClearSort),
        KeyCode::Char('f') => Some(TableCommand::FilterByCell),
        KeyCode::Char('t') => Some(TableCommand::CycleDateRange),
        KeyCode::Char('c') => Some(TableCommand::ClearFilters),
        _ => None,
    }
}

fn apply_table_command(view_data: &mut ViewData, command: TableCommand) -> Option<TableStatus> {
    match command {
        TableCommand::MoveRow(delta) => {
            let len = view_data.visible_rows().len();
            view_data.selected_row = shift_index(view_data.selected_row, delta, len);
            None
        }
        TableCommand::MoveColumn(delta) => {
            view_data.selected_col =
                shift_index(view_data.selected_col, delta, ApplicationField::ALL.len());
            None
        }
        TableCommand::JumpFirstRow => {
            view_data.selected_row = 0;
            None
        }
        TableCommand::JumpLastRow => {
            view_data.selected_row = view_data.visible_rows().len().saturating_sub(1);
            None
        }
        TableCommand::CycleSort => {
            let field = view_data.selected_field();
            let Some(sort_field) = field.sort_field() else {
                return Some(TableStatus::SortUnavailable(field.label()));
            };
            view_data.table.toggle_sort(sort_field);
            if view_data.table.sort_state().is_default() {
                Some(TableStatus::SortCleared)
            } else {
                Some(TableStatus::Sorted(view_data.table.sort()))
            }
        }
        TableCommand::ClearSort => {
            view_data.table.reset_sort();
            Some(TableStatus::SortCleared)
        }
        TableCommand::FilterByCell => {
            let Some(key) = view_data.selected_key() else {
                return Some(TableStatus::NoRows);
            };
            match view_data.table.click_cell(key) {
                Some(target) => {
                    view_data.selected_row = 0;
                    Some(TableStatus::Filtered(target))
                }
                None => Some(TableStatus::FilterUnavailable(key.field.label())),
            }
        }
        TableCommand::CycleDateRange => {
            let next = view_data.table.filters().date_range.next();
            view_data.table.set_date_range(next);
            view_data.clamp_cursor();
            Some(TableStatus::DateRange(next))
        }
        TableCommand::ClearFilters => {
            view_data.table.clear_filters();
            view_data.clamp_cursor();
            Some(TableStatus::FiltersCleared)
        }
    }
}

fn shift_index(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let max = (len - 1) as isize;
    (current as isize + delta).clamp(0, max) as usize
}

fn handle_search_key(state: &mut AppState, view_data: &mut ViewData, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            view_data.table.set_search(String::new());
            view_data.clamp_cursor();
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Enter => {
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Backspace => {
            let mut search = view_data.table.filters().search.clone();
            search.pop();
            view_data.table.set_search(search);
            view_data.selected_row = 0;
        }
        KeyCode::Char(value) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let mut search = view_data.table.filters().search.clone();
            search.push(value);
            view_data.table.set_search(search);
            view_data.selected_row = 0;
        }
        _ => {}
    }
}

fn begin_cell_edit(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(key) = view_data.selected_key() else {
        emit_status(state, view_data, internal_tx, "no application selected");
        return;
    };
    match view_data.table.activate(key) {
        EditTransition::Opened { .. } | EditTransition::AlreadyOpen(_) => {
            if key.field.kind() == FieldKind::Status {
                let current = view_data
                    .table
                    .editing()
                    .map(|edit| edit.buffer.clone())
                    .unwrap_or_default();
                view_data.status_picker = status_options()
                    .iter()
                    .position(|option| option.value.eq_ignore_ascii_case(current.trim()))
                    .unwrap_or(0);
            }
            state.dispatch(AppCommand::BeginCellEdit);
        }
        EditTransition::UnknownRecord(id) => {
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("application {id} no longer exists -- press r to reload"),
            );
        }
    }
}

fn handle_edit_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(edit) = view_data.table.editing() else {
        state.dispatch(AppCommand::ExitToNav);
        return;
    };

    if edit.key.field.kind() == FieldKind::Status {
        let options = status_options();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                view_data.status_picker = shift_index(view_data.status_picker, 1, options.len());
            }
            KeyCode::Char('k') | KeyCode::Up => {
                view_data.status_picker = shift_index(view_data.status_picker, -1, options.len());
            }
            KeyCode::Enter => {
                let value = options
                    .get(view_data.status_picker)
                    .map(|option| option.value.clone())
                    .unwrap_or_default();
                let start = view_data.table.select_status(&value);
                handle_commit_start(state, runtime, view_data, internal_tx, start);
            }
            KeyCode::Esc => cancel_cell_edit(state, view_data),
            KeyCode::Tab => blur_cell_edit(state, view_data, internal_tx, 1),
            KeyCode::BackTab => blur_cell_edit(state, view_data, internal_tx, -1),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => cancel_cell_edit(state, view_data),
        KeyCode::Enter => {
            let start = view_data.table.begin_commit();
            handle_commit_start(state, runtime, view_data, internal_tx, start);
        }
        KeyCode::Backspace => view_data.table.pop_char(),
        KeyCode::Tab => blur_cell_edit(state, view_data, internal_tx, 1),
        KeyCode::BackTab => blur_cell_edit(state, view_data, internal_tx, -1),
        KeyCode::Up | KeyCode::Down => {
            let delta = if key.code == KeyCode::Up { -1 } else { 1 };
            blur_cell_edit(state, view_data, internal_tx, 0);
            apply_table_command(view_data, TableCommand::MoveRow(delta));
        }
        KeyCode::Char(value) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.table.push_char(value);
        }
        _ => {}
    }
}

fn cancel_cell_edit(state: &mut AppState, view_data: &mut ViewData) {
    view_data.table.cancel();
    state.dispatch(AppCommand::ExitToNav);
}

fn blur_cell_edit(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    column_delta: isize,
) {
    let discarded = view_data.table.blur();
    state.dispatch(AppCommand::ExitToNav);
    if column_delta != 0 {
        apply_table_command(view_data, TableCommand::MoveColumn(column_delta));
    }
    if let Some(key) = discarded {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("{} edit discarded", key.field.label()),
        );
    }
}

fn handle_commit_start<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    start: CommitStart,
) {
    match start {
        CommitStart::NoActiveEdit => {
            state.dispatch(AppCommand::ExitToNav);
        }
        CommitStart::Busy => emit_status(state, view_data, internal_tx, SAVE_IN_PROGRESS),
        CommitStart::Unchanged(_) => {
            state.dispatch(AppCommand::ExitToNav);
            emit_status(state, view_data, internal_tx, "no changes");
        }
        CommitStart::Rejected { error, .. } => {
            emit_status(state, view_data, internal_tx, error.to_string());
        }
        CommitStart::Started(request) => {
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("saving {}...", request.key.field.label()),
            );
            if let Err(error) = runtime.spawn_update(request.clone(), internal_tx.clone()) {
                handle_commit_finished(
                    state,
                    view_data,
                    internal_tx,
                    request,
                    Err(ApiError::Unknown(format!("{error:#}"))),
                );
            }
        }
    }
}

fn handle_commit_finished(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    request: CommitRequest,
    result: Result<(), ApiError>,
) {
    let mut failure_message = None;
    let outcome = view_data.table.finish_commit(request, result, |failure| {
        failure_message = Some(format!(
            "save failed for {}: {}",
            failure.key.field.label(),
            failure.error
        ));
    });
    match outcome {
        CommitOutcome::Committed(key) => {
            if state.mode == AppMode::EditCell && view_data.table.editing().is_none() {
                state.dispatch(AppCommand::ExitToNav);
            }
            view_data.clamp_cursor();
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("saved {}", key.field.label()),
            );
        }
        CommitOutcome::Failed(_) => {
            if let Some(message) = failure_message {
                emit_status(state, view_data, internal_tx, message);
            }
        }
    }
}

fn open_edit_form(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    // A draft taken now would miss the pending write.
    if view_data.table.is_saving() {
        emit_status(state, view_data, internal_tx, SAVE_IN_PROGRESS);
        return;
    }
    let Some(record) = view_data.selected_record().cloned() else {
        emit_status(state, view_data, internal_tx, "no application selected");
        return;
    };
    let Some(index) = view_data.table.position_of(record.id) else {
        return;
    };
    view_data.form = Some(EditForm::edit(&record, index));
    state.dispatch(AppCommand::OpenForm);
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FormKey {
    Handled,
    Submit,
    Delete,
    Close,
    Status(&'static str),
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(form) = view_data.form.as_mut() else {
        state.dispatch(AppCommand::ExitToNav);
        return;
    };
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    let on_status = form.focus == ApplicationField::Status;

    let outcome = match key.code {
        KeyCode::Esc => {
            if form.cancel_delete() {
                FormKey::Status("delete canceled")
            } else {
                FormKey::Close
            }
        }
        KeyCode::Tab | KeyCode::Down => {
            form.focus_next();
            FormKey::Handled
        }
        KeyCode::BackTab | KeyCode::Up => {
            form.focus_prev();
            FormKey::Handled
        }
        KeyCode::Left if on_status => {
            form.cycle_status(-1);
            FormKey::Handled
        }
        KeyCode::Right if on_status => {
            form.cycle_status(1);
            FormKey::Handled
        }
        KeyCode::Char('s') if control => FormKey::Submit,
        KeyCode::Char('d') if control => FormKey::Delete,
        KeyCode::Char('j') if control => {
            form.push_char('\n');
            FormKey::Handled
        }
        KeyCode::Enter => FormKey::Submit,
        KeyCode::Backspace => {
            form.pop_char();
            FormKey::Handled
        }
        KeyCode::Char(value) if !control => {
            form.push_char(value);
            FormKey::Handled
        }
        _ => FormKey::Handled,
    };

    match outcome {
        FormKey::Handled => {}
        FormKey::Submit => submit_form(state, runtime, view_data, internal_tx),
        FormKey::Delete => delete_from_form(state, runtime, view_data, internal_tx),
        FormKey::Close => close_form(state, view_data),
        FormKey::Status(message) => emit_status(state, view_data, internal_tx, message),
    }
}

fn close_form(state: &mut AppState, view_data: &mut ViewData) {
    view_data.form = None;
    state.dispatch(AppCommand::ExitToNav);
}

fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = &view_data.form else {
        return;
    };
    let submission = match form.submit() {
        Ok(FormAction::Submit(submission)) => submission,
        Ok(_) => return,
        Err(error) => {
            emit_status(state, view_data, internal_tx, format!("{error:#}"));
            return;
        }
    };
    if !view_data.table.try_begin_save() {
        emit_status(state, view_data, internal_tx, SAVE_IN_PROGRESS);
        return;
    }

    emit_status(state, view_data, internal_tx, "saving application...");
    if let Err(error) = runtime.spawn_form_save(submission.clone(), internal_tx.clone()) {
        handle_form_saved(
            state,
            view_data,
            internal_tx,
            submission,
            Err(ApiError::Unknown(format!("{error:#}"))),
        );
    }
}

fn handle_form_saved(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    submission: FormSubmission,
    result: Result<JobApplication, ApiError>,
) {
    view_data.table.end_save();
    match result {
        Ok(saved) => {
            let message = match submission {
                FormSubmission::Create(_) => {
                    format!("added {} ({})", saved.company_name, saved.job_title)
                }
                FormSubmission::Update { .. } => format!("saved {}", saved.company_name),
            };
            view_data.table.upsert(saved);
            if view_data.form.is_some() {
                close_form(state, view_data);
            }
            view_data.clamp_cursor();
            emit_status(state, view_data, internal_tx, message);
        }
        Err(error) => {
            warn!(%error, "form submission failed");
            emit_status(state, view_data, internal_tx, form_failure_message("save", &error));
        }
    }
}

fn form_failure_message(action: &str, error: &ApiError) -> String {
    match error.kind() {
        ApiErrorKind::Validation => format!("{error} -- fix the form and retry"),
        _ => format!("{action} failed: {error}"),
    }
}

fn delete_from_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.form.as_mut() else {
        return;
    };
    match form.request_delete() {
        Err(error) => emit_status(state, view_data, internal_tx, format!("{error:#}")),
        Ok(None) => emit_status(
            state,
            view_data,
            internal_tx,
            "press ctrl+d again to delete, esc to keep",
        ),
        Ok(Some(FormAction::Delete { id, .. })) => {
            if !view_data.table.try_begin_save() {
                emit_status(state, view_data, internal_tx, SAVE_IN_PROGRESS);
                return;
            }
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("deleting application {id}..."),
            );
            if let Err(error) = runtime.spawn_delete(id, internal_tx.clone()) {
                handle_delete_finished(
                    state,
                    view_data,
                    internal_tx,
                    id,
                    Err(ApiError::Unknown(format!("{error:#}"))),
                );
            }
        }
        Ok(Some(_)) => {}
    }
}

fn handle_delete_finished(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    id: ApplicationId,
    result: Result<(), ApiError>,
) {
    view_data.table.end_save();
    match result {
        Ok(()) => {
            view_data.table.remove(id);
            if view_data.form.is_some() {
                close_form(state, view_data);
            }
            view_data.clamp_cursor();
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("deleted application {id}"),
            );
        }
        Err(error) => {
            warn!(%error, %id, "delete failed");
            emit_status(state, view_data, internal_tx, form_failure_message("delete", &error));
        }
    }
}

fn open_history<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let id = view_data.selected_record().map(|record| record.id);
    state.dispatch(AppCommand::OpenHistory);
    if let Some(fetch) = view_data.history.open(id) {
        spawn_history_fetch(runtime, view_data, internal_tx, fetch);
    }
}

fn spawn_history_fetch<R: AppRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    fetch: HistoryFetch,
) {
    if let Err(error) = runtime.spawn_history_fetch(fetch, internal_tx.clone()) {
        view_data
            .history
            .finish(fetch.request_id, Err(ApiError::Unknown(format!("{error:#}"))));
    }
}

fn handle_history_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('H') => {
            view_data.history.close();
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Char('r') => {
            if let Some(fetch) = view_data.history.retry() {
                spawn_history_fetch(runtime, view_data, internal_tx, fetch);
            }
        }
        _ => {}
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(render_header_text(state, view_data))
        .block(Block::default().title("jobtrack").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    render_table(frame, layout[1], view_data);

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if state.mode == AppMode::EditCell
        && let Some(edit) = view_data.table.editing()
        && edit.key.field.kind() == FieldKind::Status
    {
        let area = centered_rect(30, 60, frame.area());
        frame.render_widget(Clear, area);
        let picker = Paragraph::new(render_status_picker_text(view_data))
            .block(Block::default().title("status").borders(Borders::ALL));
        frame.render_widget(picker, area);
    }

    if let Some(form) = &view_data.form {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let body = Paragraph::new(render_form_text(form)).block(
            Block::default()
                .title(form.title())
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(body, area);
    }

    if view_data.history.is_open() {
        let area = centered_rect(75, 65, frame.area());
        frame.render_widget(Clear, area);
        let title = history_title(view_data);
        let body = Paragraph::new(render_history_text(view_data.history.state()))
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(body, area);
    }

    if view_data.help_visible {
        let area = centered_rect(80, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_header_text(state: &AppState, view_data: &ViewData) -> String {
    let now = OffsetDateTime::now_utc();
    let shown = view_data.visible_rows().len();
    let total = view_data.table.records().len();
    let source = if view_data.loading {
        "loading...".to_owned()
    } else {
        state.source.label(now)
    };
    let mut text = format!(
        "{source} | showing {shown} of {total} | {}",
        filter_summary(view_data.table.filters())
    );
    if state.mode == AppMode::Search || !view_data.table.filters().search.is_empty() {
        text.push_str(&format!(" | search: {}", view_data.table.filters().search));
        if state.mode == AppMode::Search {
            text.push_str(EDIT_CURSOR);
        }
    }
    text.push('\n');
    text.push_str(&status_summary(&view_data.table));
    text
}

/// One "Status N" entry per status in the collection.
fn status_summary(table: &TableEngine) -> String {
    let counts = table.status_counts();
    if counts.is_empty() {
        return "no applications".to_owned();
    }
    counts
        .iter()
        .map(|entry| {
            let label = if entry.status.is_empty() {
                "none"
            } else {
                entry.status.as_str()
            };
            format!("{label} {}", entry.count)
        })
        .collect::<Vec<_>>()
        .join(" · ")
}

fn filter_summary(filters: &Filters) -> String {
    if filters.is_empty() {
        return "no filters".to_owned();
    }
    let mut parts = Vec::new();
    if let Some(status) = &filters.status {
        parts.push(format!("status={status}"));
    }
    if let Some(company) = &filters.company {
        parts.push(format!("company={company}"));
    }
    if filters.date_range != DateRange::All {
        parts.push(filters.date_range.label().to_owned());
    }
    if !filters.search.trim().is_empty() {
        parts.push(format!("\"{}\"", filters.search.trim()));
    }
    format!("{FILTER_MARK_ACTIVE} {}", parts.join(", "))
}

fn render_table(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let widths = ApplicationField::ALL
        .iter()
        .map(|field| match field {
            ApplicationField::Status | ApplicationField::AppliedDate => Constraint::Length(14),
            ApplicationField::Notes | ApplicationField::JobUrl => Constraint::Min(12),
            _ => Constraint::Min(10),
        })
        .collect::<Vec<_>>();

    let header_cells = ApplicationField::ALL.iter().map(|field| {
        Cell::from(header_label_for_column(view_data, *field)).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells);

    let visible = view_data.visible_rows();
    let rows = visible.iter().enumerate().filter_map(|(row_index, index)| {
        let record = view_data.table.records().get(*index)?;
        let selected_row = row_index == view_data.selected_row;
        let cells = ApplicationField::ALL
            .iter()
            .enumerate()
            .map(|(column_index, field)| {
                let key = EditCellKey::new(record.id, *field);
                let mut style = Style::default();
                if *field == ApplicationField::Status
                    && let Some(color) =
                        parse_hex_color(resolve_color(&record.status, &view_data.colors))
                {
                    style = style.fg(color);
                }
                if selected_row {
                    style = style.bg(Color::DarkGray);
                }
                if selected_row && column_index == view_data.selected_col {
                    style = Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD);
                }
                if view_data.table.is_editing(key) {
                    style = Style::default()
                        .fg(Color::Black)
                        .bg(Color::Yellow)
                        .add_modifier(Modifier::BOLD);
                }
                Cell::from(cell_text(view_data, record, *field)).style(style)
            })
            .collect::<Vec<_>>();
        Some(Row::new(cells))
    });

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(view_data))
                .borders(Borders::ALL),
        );
    let mut table_state = TableState::default().with_selected(Some(view_data.selected_row));
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn table_title(view_data: &ViewData) -> String {
    let filters = view_data.table.filters();
    let mut title = "applications".to_owned();
    if !filters.is_empty() {
        title.push_str(&format!(" {FILTER_MARK_ACTIVE}{}", filters.active_count()));
    }
    if view_data.table.is_saving() {
        title.push_str(" (saving)");
    }
    title
}

fn header_label_for_column(view_data: &ViewData, field: ApplicationField) -> String {
    let mut label = field.label().to_owned();
    let filters = view_data.table.filters();
    let filtered = match field {
        ApplicationField::Status => filters.status.is_some(),
        ApplicationField::Company => filters.company.is_some(),
        ApplicationField::AppliedDate => filters.date_range != DateRange::All,
        _ => false,
    };
    if filtered {
        label.push(' ');
        label.push_str(FILTER_MARK_ACTIVE);
    }

    let sort = view_data.table.sort();
    if field.sort_field() == Some(sort.field) {
        label.push_str(match sort.direction {
            SortDirection::Asc => " ↑",
            SortDirection::Desc => " ↓",
        });
    }
    label
}

fn cell_text(view_data: &ViewData, record: &JobApplication, field: ApplicationField) -> String {
    if let Some(edit) = view_data.table.editing()
        && edit.key == EditCellKey::new(record.id, field)
    {
        if field.kind() == FieldKind::Status {
            return format!("{} …", edit.buffer);
        }
        return format!("{}{EDIT_CURSOR}", edit.buffer.replace('\n', " "));
    }
    field.display_value(record)
}

fn render_status_picker_text(view_data: &ViewData) -> String {
    status_options()
        .iter()
        .enumerate()
        .map(|(index, option)| {
            let marker = if index == view_data.status_picker {
                ">"
            } else {
                " "
            };
            format!("{marker} {}", option.label)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_form_text(form: &EditForm) -> String {
    let mut lines = ApplicationField::ALL
        .iter()
        .map(|field| {
            let marker = if *field == form.focus { ">" } else { " " };
            let required = if field.is_required() { "*" } else { " " };
            let mut value = form.draft.field(*field).to_owned();
            if *field == ApplicationField::Status {
                value = if value.is_empty() {
                    "(none) ←/→".to_owned()
                } else {
                    format!("{value} ←/→")
                };
            } else if *field == form.focus {
                value.push_str(EDIT_CURSOR);
            }
            let value = value.replace('\n', "\n      ");
            format!("{marker} {required}{:<10} {value}", field.label())
        })
        .collect::<Vec<_>>();

    lines.push(String::new());
    if form.is_delete_armed() {
        lines.push("press ctrl+d again to delete this application, esc to keep".to_owned());
    } else if form.draft.can_submit() {
        lines.push("enter/ctrl+s save | tab next | esc close".to_owned());
    } else {
        lines.push("company and title are required | tab next | esc close".to_owned());
    }
    lines.join("\n")
}

fn history_title(view_data: &ViewData) -> String {
    let Some(id) = view_data.history.target() else {
        return "status history".to_owned();
    };
    match view_data.table.record(id) {
        Some(record) => format!(
            "status history: {} / {}",
            record.company_name, record.job_title
        ),
        None => format!("status history #{id}"),
    }
}

fn render_history_text(state: &HistoryState) -> String {
    match state {
        HistoryState::Idle => String::new(),
        HistoryState::Loading => "loading status history...".to_owned(),
        HistoryState::Error(message) => format!("{message}\n\nr retry | esc close"),
        HistoryState::Loaded(entries) if entries.is_empty() => {
            "no status changes recorded\n\nesc close".to_owned()
        }
        HistoryState::Loaded(entries) => {
            let mut lines = Vec::with_capacity(entries.len() * 2 + 2);
            for entry in entries {
                let from = entry.from_status.as_deref().unwrap_or("(new)");
                let mut line = format!(
                    "{}  {from} -> {}",
                    format_timestamp(entry.changed_at),
                    entry.to_status
                );
                if let Some(by) = &entry.changed_by {
                    line.push_str(&format!("  by {by}"));
                }
                lines.push(line);
                if let Some(notes) = &entry.notes {
                    lines.push(format!("    {notes}"));
                }
            }
            lines.push(String::new());
            lines.push("esc close".to_owned());
            lines.join("\n")
        }
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ? help\n\
nav: j/k/h/l g/G move | enter/e edit cell | s sort column | S reset sort\n\
nav: f filter by cell | t date range | c clear filters | / search\n\
nav: a add | o open form | H status history | r reload | X clear cache | q quit\n\
edit: type | backspace | enter save | esc cancel | tab leave cell\n\
status edit: j/k choose | enter save | esc cancel\n\
form: tab/shift+tab field | ←/→ status | ctrl+j newline in notes | enter or ctrl+s save | ctrl+d delete | esc close\n\
history: r retry | esc close"
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if view_data.help_visible {
        return String::new();
    }

    let hints = match state.mode {
        AppMode::Nav => "j/k/h/l | enter edit | s/S sort | f/t/c filter | / search | a/o form | H history | ? help",
        AppMode::Search => "type to search | enter keep | esc clear",
        AppMode::EditCell => "enter save | esc cancel | tab leave",
        AppMode::Form => "tab field | enter save | ctrl+d delete | esc close",
        AppMode::History => "r retry | esc close",
    };
    let mode = state.mode.label();
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {hints}"),
        None => format!("{mode} | {hints}"),
    }
}

/// `#RRGGBB` or `#RGB` to a terminal color.
fn parse_hex_color(value: &str) -> Option<Color> {
    let hex = value.strip_prefix('#')?;
    let expanded = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => hex.to_owned(),
        _ => return None,
    };
    let channel = |start: usize| u8::from_str_radix(&expanded[start..start + 2], 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InternalEvent, LoadedApplications, TableCommand, TableStatus, ViewData,
        apply_table_command, handle_key_event, header_label_for_column, parse_hex_color,
        reload_applications, render_form_text, render_header_text, render_history_text,
        status_text, table_command_for_key,
    };
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use jobtrack_app::{
        ApiError, AppMode, AppState, ApplicationField, ApplicationId, ColorOverrides,
        CommitRequest, DataSource, FormSubmission, HistoryState, JobApplication, NewApplication,
        StatusHistoryEntry, TableEngine,
    };
    use jobtrack_testkit::{JobFaker, fixture_now, sample_applications};
    use ratatui::style::Color;
    use std::collections::VecDeque;
    use std::sync::mpsc;

    #[derive(Debug, Default)]
    struct TestRuntime {
        rows: Vec<JobApplication>,
        load_error: Option<String>,
        updated: Vec<JobApplication>,
        updated_indices: Vec<usize>,
        update_errors: VecDeque<ApiError>,
        deferred_updates: Option<Vec<CommitRequest>>,
        deferred_forms: Option<Vec<FormSubmission>>,
        created: Vec<NewApplication>,
        deleted: Vec<ApplicationId>,
        history_errors: VecDeque<ApiError>,
        history_calls: usize,
        cache_clears: usize,
    }

    impl TestRuntime {
        fn with_rows() -> Self {
            Self {
                rows: sample_applications(),
                ..Self::default()
            }
        }

        fn deferring() -> Self {
            Self {
                deferred_updates: Some(Vec::new()),
                ..Self::with_rows()
            }
        }
    }

    impl AppRuntime for TestRuntime {
        fn load_applications(&mut self) -> anyhow::Result<LoadedApplications> {
            if let Some(error) = &self.load_error {
                anyhow::bail!("{error}");
            }
            Ok(LoadedApplications {
                applications: self.rows.clone(),
                source: DataSource::Live,
            })
        }

        fn status_colors(&mut self) -> ColorOverrides {
            let mut colors = ColorOverrides::new();
            colors.insert("Applied", "#112233");
            colors
        }

        fn update_application(
            &mut self,
            record: &JobApplication,
            index: usize,
        ) -> Result<(), ApiError> {
            if let Some(error) = self.update_errors.pop_front() {
                return Err(error);
            }
            self.updated.push(record.clone());
            self.updated_indices.push(index);
            Ok(())
        }

        fn create_application(
            &mut self,
            input: &NewApplication,
        ) -> Result<JobApplication, ApiError> {
            self.created.push(input.clone());
            let id = ApplicationId::new(100 + self.created.len() as i64);
            Ok(input.clone().into_application(id))
        }

        fn delete_application(&mut self, id: ApplicationId) -> Result<(), ApiError> {
            self.deleted.push(id);
            Ok(())
        }

        fn fetch_status_history(
            &mut self,
            id: ApplicationId,
        ) -> Result<Vec<StatusHistoryEntry>, ApiError> {
            self.history_calls += 1;
            if let Some(error) = self.history_errors.pop_front() {
                return Err(error);
            }
            let record = self
                .rows
                .iter()
                .find(|record| record.id == id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("application {id}")))?;
            Ok(JobFaker::new(5).history_for(&record))
        }

        fn clear_cache(&mut self) -> anyhow::Result<usize> {
            self.cache_clears += 1;
            Ok(1)
        }

        fn spawn_update(
            &mut self,
            request: CommitRequest,
            tx: mpsc::Sender<InternalEvent>,
        ) -> anyhow::Result<()> {
            if let Some(pending) = &mut self.deferred_updates {
                pending.push(request);
                return Ok(());
            }
            let result = self.update_application(&request.record, request.index);
            tx.send(InternalEvent::CommitFinished { request, result })
                .map_err(|_| anyhow::anyhow!("commit event channel closed"))?;
            Ok(())
        }

        fn spawn_form_save(
            &mut self,
            submission: FormSubmission,
            tx: mpsc::Sender<InternalEvent>,
        ) -> anyhow::Result<()> {
            if let Some(pending) = &mut self.deferred_forms {
                pending.push(submission);
                return Ok(());
            }
            let result = match &submission {
                FormSubmission::Create(input) => self.create_application(input),
                FormSubmission::Update { record, index } => self
                    .update_application(record, *index)
                    .map(|()| record.clone()),
            };
            tx.send(InternalEvent::FormSaved { submission, result })
                .map_err(|_| anyhow::anyhow!("form event channel closed"))?;
            Ok(())
        }
    }

    fn view_data_for_test() -> ViewData {
        let mut view_data = ViewData::new(fixture_now().date());
        view_data.table = TableEngine::new(sample_applications());
        view_data
    }

    fn internal_tx() -> mpsc::Sender<InternalEvent> {
        let (tx, _rx) = mpsc::channel();
        tx
    }

    fn internal_channel() -> (mpsc::Sender<InternalEvent>, mpsc::Receiver<InternalEvent>) {
        mpsc::channel()
    }

    fn pump_internal(
        state: &mut AppState,
        view_data: &mut ViewData,
        tx: &mpsc::Sender<InternalEvent>,
        rx: &mpsc::Receiver<InternalEvent>,
    ) {
        super::process_internal_events(state, view_data, tx, rx);
    }

    fn run_key_script(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        tx: &mpsc::Sender<InternalEvent>,
        rx: &mpsc::Receiver<InternalEvent>,
        keys: &[KeyEvent],
    ) {
        for key in keys {
            let _ = handle_key_event(state, runtime, view_data, tx, *key);
            pump_internal(state, view_data, tx, rx);
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(value: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(value), KeyModifiers::CONTROL)
    }

    fn typed(text: &str) -> Vec<KeyEvent> {
        text.chars().map(|c| key(KeyCode::Char(c))).collect()
    }

    fn record_by_company<'a>(view_data: &'a ViewData, company: &str) -> &'a JobApplication {
        view_data
            .table
            .records()
            .iter()
            .find(|record| record.company_name == company)
            .expect("company row present")
    }

    #[test]
    fn quit_keys_exit() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = view_data_for_test();
        let tx = internal_tx();

        assert!(handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            ctrl('q')
        ));
        assert!(handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            key(KeyCode::Char('q'))
        ));

        state.mode = AppMode::Search;
        assert!(!handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            key(KeyCode::Char('q'))
        ));
    }

    #[test]
    fn reload_sets_source_and_colors() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = ViewData::new(fixture_now().date());
        let (tx, rx) = internal_channel();

        reload_applications(&mut state, &mut runtime, &mut view_data, &tx);
        assert!(view_data.loading);
        pump_internal(&mut state, &mut view_data, &tx, &rx);
        assert!(!view_data.loading);
        assert_eq!(view_data.table.records().len(), 3);
        assert_eq!(state.source, DataSource::Live);
        assert_eq!(view_data.colors.get("applied"), Some("#112233"));

        runtime.load_error = Some("server unreachable".to_owned());
        reload_applications(&mut state, &mut runtime, &mut view_data, &tx);
        pump_internal(&mut state, &mut view_data, &tx, &rx);
        assert_eq!(view_data.table.records().len(), 3);
        assert!(
            state
                .status_line
                .as_deref()
                .is_some_and(|status| status.contains("load failed"))
        );
    }

    #[test]
    fn text_cell_edit_commits_through_runtime() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        // Row 0 is the newest application (Acme); column 0 is company.
        let mut keys = vec![key(KeyCode::Enter)];
        keys.extend(typed(" Corp"));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert_eq!(state.mode, AppMode::EditCell);
        assert_eq!(
            view_data.table.editing().map(|edit| edit.buffer.as_str()),
            Some("Acme Corp")
        );

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Enter)],
        );
        assert_eq!(state.mode, AppMode::Nav);
        assert!(view_data.table.editing().is_none());
        assert!(!view_data.table.is_saving());
        assert_eq!(runtime.updated.len(), 1);
        assert_eq!(runtime.updated[0].company_name, "Acme Corp");
        assert_eq!(runtime.updated_indices, vec![0]);
        assert_eq!(record_by_company(&view_data, "Acme Corp").id, ApplicationId::new(1));
        assert_eq!(state.status_line.as_deref(), Some("saved company"));
    }

    #[test]
    fn failed_commit_keeps_cell_open_and_reports() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        runtime
            .update_errors
            .push_back(ApiError::Unknown("boom".to_owned()));
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        let mut keys = vec![key(KeyCode::Enter)];
        keys.extend(typed("!"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert_eq!(state.mode, AppMode::EditCell);
        assert!(!view_data.table.is_saving());
        let edit = view_data.table.editing().expect("cell stays open");
        assert_eq!(edit.buffer, "Acme!");
        assert!(edit.error.is_some());
        assert_eq!(record_by_company(&view_data, "Acme").company_name, "Acme");
        assert!(
            state
                .status_line
                .as_deref()
                .is_some_and(|status| status.starts_with("save failed for company"))
        );

        // Retry succeeds.
        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Enter)],
        );
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(runtime.updated.len(), 1);
    }

    #[test]
    fn second_commit_while_saving_is_dropped() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::deferring();
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        let mut keys = vec![key(KeyCode::Enter)];
        keys.extend(typed("!"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert!(view_data.table.is_saving());

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Enter)],
        );
        assert_eq!(
            state.status_line.as_deref(),
            Some("save in progress -- wait for it to finish")
        );
        let pending = runtime.deferred_updates.take().expect("deferred queue");
        assert_eq!(pending.len(), 1);

        let request = pending.into_iter().next().expect("one request");
        tx.send(InternalEvent::CommitFinished {
            request,
            result: Ok(()),
        })
        .expect("channel open");
        pump_internal(&mut state, &mut view_data, &tx, &rx);
        assert!(!view_data.table.is_saving());
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(record_by_company(&view_data, "Acme!").id, ApplicationId::new(1));
    }

    #[test]
    fn escape_cancels_and_tab_discards_edit() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        let mut keys = vec![key(KeyCode::Enter)];
        keys.extend(typed("xyz"));
        keys.push(key(KeyCode::Esc));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert_eq!(state.mode, AppMode::Nav);
        assert!(view_data.table.editing().is_none());

        let mut keys = vec![key(KeyCode::Enter)];
        keys.extend(typed("xyz"));
        keys.push(key(KeyCode::Tab));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert_eq!(state.mode, AppMode::Nav);
        assert!(view_data.table.editing().is_none());
        assert_eq!(view_data.selected_col, 1);
        assert!(runtime.updated.is_empty());
        assert_eq!(record_by_company(&view_data, "Acme").id, ApplicationId::new(1));
    }

    #[test]
    fn unchanged_commit_skips_runtime() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Enter), key(KeyCode::Enter)],
        );
        assert_eq!(state.mode, AppMode::Nav);
        assert!(runtime.updated.is_empty());
        assert_eq!(state.status_line.as_deref(), Some("no changes"));
    }

    #[test]
    fn invalid_date_is_rejected_without_saving() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = view_data_for_test();
        view_data.selected_col = 3;
        let (tx, rx) = internal_channel();

        let mut keys = vec![key(KeyCode::Enter)];
        keys.extend(std::iter::repeat_n(key(KeyCode::Backspace), 10));
        keys.extend(typed("soon"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);

        assert_eq!(state.mode, AppMode::EditCell);
        assert!(runtime.updated.is_empty());
        assert!(!view_data.table.is_saving());
        assert!(view_data.table.editing().and_then(|edit| edit.error.clone()).is_some());
    }

    #[test]
    fn status_picker_commits_selection() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = view_data_for_test();
        view_data.selected_col = 2;
        let (tx, rx) = internal_channel();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Enter)],
        );
        // "(clear)" sits at 0, so Applied is 1.
        assert_eq!(view_data.status_picker, 1);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('j')), key(KeyCode::Enter)],
        );
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(runtime.updated.len(), 1);
        assert_eq!(runtime.updated[0].status, jobtrack_app::JOB_STATUSES[1].name);
    }

    #[test]
    fn filter_by_cell_and_clear() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        // Move to Globex (row 1), status column.
        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[
                key(KeyCode::Char('j')),
                key(KeyCode::Char('l')),
                key(KeyCode::Char('l')),
                key(KeyCode::Char('f')),
            ],
        );
        assert_eq!(view_data.visible_rows().len(), 1);
        assert_eq!(view_data.selected_row, 0);
        assert_eq!(
            view_data.table.filters().status.as_deref(),
            Some("interview")
        );
        assert_eq!(state.status_line.as_deref(), Some("filter status: Interview"));
        assert!(header_label_for_column(&view_data, ApplicationField::Status).contains('▼'));

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('c'))],
        );
        assert_eq!(view_data.visible_rows().len(), 3);
        assert!(view_data.table.filters().is_empty());
    }

    #[test]
    fn non_filterable_column_reports_status() {
        let mut view_data = view_data_for_test();
        view_data.selected_col = 1;
        let status = apply_table_command(&mut view_data, TableCommand::FilterByCell);
        assert_eq!(status, Some(TableStatus::FilterUnavailable("position")));
        assert!(view_data.table.filters().is_empty());
    }

    #[test]
    fn sort_cycles_on_header_column() {
        let mut view_data = view_data_for_test();
        assert!(header_label_for_column(&view_data, ApplicationField::AppliedDate).ends_with(" ↓"));

        let first = apply_table_command(&mut view_data, TableCommand::CycleSort);
        assert!(matches!(first, Some(TableStatus::Sorted(_))));
        assert!(header_label_for_column(&view_data, ApplicationField::Company).ends_with(" ↑"));
        assert!(!header_label_for_column(&view_data, ApplicationField::AppliedDate).contains('↓'));

        apply_table_command(&mut view_data, TableCommand::CycleSort);
        assert!(header_label_for_column(&view_data, ApplicationField::Company).ends_with(" ↓"));

        let third = apply_table_command(&mut view_data, TableCommand::CycleSort);
        assert_eq!(third, Some(TableStatus::SortCleared));
        assert!(view_data.table.sort_state().is_default());

        view_data.selected_col = 4;
        assert_eq!(
            apply_table_command(&mut view_data, TableCommand::CycleSort),
            Some(TableStatus::SortUnavailable("location"))
        );
    }

    #[test]
    fn search_mode_filters_rows() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        let mut keys = vec![key(KeyCode::Char('/'))];
        keys.extend(typed("glob"));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert_eq!(state.mode, AppMode::Search);
        assert_eq!(view_data.visible_rows().len(), 1);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Enter)],
        );
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(view_data.table.filters().search, "glob");

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('/')), key(KeyCode::Esc)],
        );
        assert!(view_data.table.filters().search.is_empty());
        assert_eq!(view_data.visible_rows().len(), 3);
    }

    #[test]
    fn create_form_adds_row() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        let mut keys = vec![key(KeyCode::Char('a'))];
        keys.extend(typed("Hooli"));
        keys.push(key(KeyCode::Tab));
        keys.extend(typed("SRE"));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert_eq!(state.mode, AppMode::Form);
        let form = view_data.form.as_ref().expect("form open");
        assert!(render_form_text(form).contains("> *position"));

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[ctrl('s')],
        );
        assert_eq!(state.mode, AppMode::Nav);
        assert!(view_data.form.is_none());
        assert_eq!(runtime.created.len(), 1);
        assert_eq!(runtime.created[0].status, "Applied");
        assert_eq!(view_data.table.records().len(), 4);
        assert_eq!(record_by_company(&view_data, "Hooli").job_title, "SRE");
    }

    #[test]
    fn invalid_form_stays_open() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('a')), key(KeyCode::Enter)],
        );
        assert_eq!(state.mode, AppMode::Form);
        assert!(runtime.created.is_empty());
        assert!(state.status_line.is_some());
    }

    #[test]
    fn edit_form_updates_and_deletes_with_confirmation() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        // Open the form for Acme and change its status with the arrow keys.
        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[
                key(KeyCode::Char('o')),
                key(KeyCode::Tab),
                key(KeyCode::Tab),
                key(KeyCode::Right),
                key(KeyCode::Enter),
            ],
        );
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(runtime.updated.len(), 1);
        assert_eq!(runtime.updated[0].status, jobtrack_app::JOB_STATUSES[1].name);

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('o')), ctrl('d')],
        );
        assert!(view_data.form.as_ref().is_some_and(|form| form.is_delete_armed()));
        assert!(runtime.deleted.is_empty());

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Esc)],
        );
        assert_eq!(state.mode, AppMode::Form);
        assert_eq!(state.status_line.as_deref(), Some("delete canceled"));

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[ctrl('d'), ctrl('d')],
        );
        assert_eq!(runtime.deleted, vec![ApplicationId::new(1)]);
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(view_data.table.records().len(), 2);
    }

    #[test]
    fn history_loads_newest_first_and_retries_after_error() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        runtime
            .history_errors
            .push_back(ApiError::Network {
                url: "http://localhost:5000".to_owned(),
                detail: "connection refused".to_owned(),
            });
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('H'))],
        );
        assert_eq!(state.mode, AppMode::History);
        assert!(matches!(view_data.history.state(), HistoryState::Error(_)));
        assert!(render_history_text(view_data.history.state()).contains("r retry"));

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('r'))],
        );
        assert_eq!(runtime.history_calls, 2);
        let HistoryState::Loaded(entries) = view_data.history.state() else {
            panic!("history should be loaded");
        };
        assert!(!entries.is_empty());
        assert!(
            entries
                .windows(2)
                .all(|pair| pair[0].changed_at >= pair[1].changed_at)
        );

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Esc)],
        );
        assert_eq!(state.mode, AppMode::Nav);
        assert!(!view_data.history.is_open());
    }

    #[test]
    fn history_without_rows_shows_error() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::default();
        let mut view_data = ViewData::new(fixture_now().date());
        let (tx, rx) = internal_channel();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('H'))],
        );
        assert_eq!(runtime.history_calls, 0);
        assert!(matches!(view_data.history.state(), HistoryState::Error(_)));
    }

    #[test]
    fn reload_while_loading_is_refused() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = ViewData::new(fixture_now().date());
        let (tx, rx) = internal_channel();

        reload_applications(&mut state, &mut runtime, &mut view_data, &tx);
        reload_applications(&mut state, &mut runtime, &mut view_data, &tx);
        assert_eq!(state.status_line.as_deref(), Some("reload in progress"));
        assert!(render_header_text(&state, &view_data).starts_with("loading..."));

        pump_internal(&mut state, &mut view_data, &tx, &rx);
        assert!(!view_data.loading);
        assert_eq!(view_data.table.records().len(), 3);
    }

    #[test]
    fn form_waits_for_in_flight_cell_commit() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::deferring();
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        // Commit "Acme!" and leave it in flight.
        let mut keys = vec![key(KeyCode::Enter)];
        keys.extend(typed("!"));
        keys.push(key(KeyCode::Enter));
        keys.push(key(KeyCode::Esc));
        keys.push(key(KeyCode::Char('o')));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert!(view_data.table.is_saving());
        assert!(view_data.form.is_none());
        assert_eq!(
            state.status_line.as_deref(),
            Some("save in progress -- wait for it to finish")
        );

        let pending = runtime.deferred_updates.take().expect("deferred queue");
        assert_eq!(pending.len(), 1);
        let request = pending.into_iter().next().expect("one request");
        tx.send(InternalEvent::CommitFinished {
            request,
            result: Ok(()),
        })
        .expect("channel open");
        pump_internal(&mut state, &mut view_data, &tx, &rx);
        assert!(!view_data.table.is_saving());

        // The form now starts from the committed company name.
        let mut keys = vec![key(KeyCode::Char('o')), key(KeyCode::BackTab)];
        keys.extend(typed("call back"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(runtime.updated.len(), 1);
        assert_eq!(runtime.updated[0].company_name, "Acme!");
        assert_eq!(runtime.updated[0].notes.as_deref(), Some("call back"));
        let acme = record_by_company(&view_data, "Acme!");
        assert_eq!(acme.notes.as_deref(), Some("call back"));
    }

    #[test]
    fn form_save_in_flight_blocks_second_submit() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime {
            deferred_forms: Some(Vec::new()),
            ..TestRuntime::with_rows()
        };
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        let mut keys = vec![key(KeyCode::Char('o')), key(KeyCode::BackTab)];
        keys.extend(typed("call back"));
        keys.push(key(KeyCode::Enter));
        run_key_script(&mut state, &mut runtime, &mut view_data, &tx, &rx, &keys);
        assert_eq!(state.mode, AppMode::Form);
        assert!(view_data.table.is_saving());
        assert_eq!(state.status_line.as_deref(), Some("saving application..."));

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Enter)],
        );
        assert_eq!(
            state.status_line.as_deref(),
            Some("save in progress -- wait for it to finish")
        );

        let pending = runtime.deferred_forms.take().expect("deferred forms");
        assert_eq!(pending.len(), 1);
        let submission = pending.into_iter().next().expect("one submission");
        let FormSubmission::Update { record, index } = &submission else {
            panic!("expected an update, got {submission:?}");
        };
        assert_eq!(*index, 0);
        let saved = record.clone();
        tx.send(InternalEvent::FormSaved {
            submission,
            result: Ok(saved),
        })
        .expect("channel open");
        pump_internal(&mut state, &mut view_data, &tx, &rx);
        assert!(!view_data.table.is_saving());
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(state.status_line.as_deref(), Some("saved Acme"));
        assert_eq!(
            record_by_company(&view_data, "Acme").notes.as_deref(),
            Some("call back")
        );
    }

    #[test]
    fn rejected_form_save_keeps_form_open() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        runtime
            .update_errors
            .push_back(ApiError::Validation("job_url is invalid".to_owned()));
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        run_key_script(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &rx,
            &[key(KeyCode::Char('o')), key(KeyCode::Enter)],
        );
        assert_eq!(state.mode, AppMode::Form);
        assert!(view_data.form.is_some());
        assert!(!view_data.table.is_saving());
        assert!(
            state
                .status_line
                .as_deref()
                .is_some_and(|status| status.ends_with("-- fix the form and retry"))
        );
    }

    #[test]
    fn header_shows_status_counts() {
        let state = AppState::default();
        let mut view_data = view_data_for_test();

        let header = render_header_text(&state, &view_data);
        let summary = header.lines().nth(1).expect("counts line");
        assert_eq!(summary, "Applied 1 · Interview 1 · OA 1");

        view_data.table = TableEngine::new(Vec::new());
        let header = render_header_text(&state, &view_data);
        assert_eq!(header.lines().nth(1), Some("no applications"));
    }

    #[test]
    fn stale_clear_status_is_ignored() {
        let mut state = AppState::default();
        let mut view_data = view_data_for_test();
        let (tx, rx) = internal_channel();

        state.status_line = Some("saved".to_owned());
        view_data.status_token = 2;
        tx.send(InternalEvent::ClearStatus { token: 1 })
            .expect("channel open");
        pump_internal(&mut state, &mut view_data, &tx, &rx);
        assert_eq!(state.status_line.as_deref(), Some("saved"));

        tx.send(InternalEvent::ClearStatus { token: 2 })
            .expect("channel open");
        pump_internal(&mut state, &mut view_data, &tx, &rx);
        assert!(state.status_line.is_none());
    }

    #[test]
    fn clear_cache_key_reports_count() {
        let mut state = AppState::default();
        let mut runtime = TestRuntime::with_rows();
        let mut view_data = view_data_for_test();
        let tx = internal_tx();

        handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            key(KeyCode::Char('X')),
        );
        assert_eq!(runtime.cache_clears, 1);
        assert_eq!(state.status_line.as_deref(), Some("cache cleared (1 snapshots)"));
    }

    #[test]
    fn table_keys_map_to_commands() {
        assert_eq!(
            table_command_for_key(key(KeyCode::Char('j'))),
            Some(TableCommand::MoveRow(1))
        );
        assert_eq!(
            table_command_for_key(KeyEvent::new(KeyCode::Char('G'), KeyModifiers::SHIFT)),
            Some(TableCommand::JumpLastRow)
        );
        assert_eq!(table_command_for_key(ctrl('s')), None);
    }

    #[test]
    fn status_text_shows_mode_and_hints() {
        let mut state = AppState::default();
        let mut view_data = view_data_for_test();

        let status = status_text(&state, &view_data);
        assert!(status.starts_with("NAV |"));
        assert!(status.contains("H history"));

        state.mode = AppMode::EditCell;
        state.status_line = Some("saving company...".to_owned());
        assert_eq!(
            status_text(&state, &view_data),
            "EDIT | saving company... | enter save | esc cancel | tab leave"
        );

        view_data.help_visible = true;
        assert!(status_text(&state, &view_data).is_empty());
    }

    #[test]
    fn hex_colors_parse() {
        assert_eq!(parse_hex_color("#3B82F6"), Some(Color::Rgb(0x3B, 0x82, 0xF6)));
        assert_eq!(parse_hex_color("#fff"), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(parse_hex_color("3B82F6"), None);
        assert_eq!(parse_hex_color("#12345G"), None);
    }
}
