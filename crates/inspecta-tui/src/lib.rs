// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod inspection;
mod schedule;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use inspecta_api::is_unauthorized;
use inspecta_app::{
    AppCommand, AppEvent, AppMode, AppState, Appointment, AppointmentId, AppointmentStatus,
    FormFieldKind, FormKind, FormPayload, InspectionId, LoginFormInput, OnacFormGateway,
    RescheduleInput, Role, ScheduleMonth, ScheduleQuery, Session, SessionUser, TabKind, Task,
    TaskId, TaskStatus, UserAccount, UserId, ViewMode, iso_date,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::{Date, OffsetDateTime};

use crate::inspection::InspectionUi;
use crate::schedule::ScheduleUi;

const STATUS_TTL: Duration = Duration::from_secs(4);
const SESSION_EXPIRY_DELAY: Duration = Duration::from_millis(1500);
const POLL_INTERVAL: Duration = Duration::from_millis(120);

/// Everything the front end needs from the outside world. The CLI backs it
/// with the REST client; tests back it with fixtures.
pub trait AppRuntime: OnacFormGateway {
    fn restore_session(&mut self) -> Result<Option<Session>>;
    fn login(&mut self, input: &LoginFormInput) -> Result<Session>;
    fn logout(&mut self) -> Result<()>;
    /// Drops the stored session after the backend rejected its token.
    fn expire_session(&mut self) -> Result<()>;
    fn load_appointments(&mut self) -> Result<Vec<Appointment>>;
    fn update_appointment_status(
        &mut self,
        appointment: &AppointmentId,
        status: AppointmentStatus,
    ) -> Result<()>;
    fn reschedule_appointment(&mut self, input: &RescheduleInput) -> Result<()>;
    fn submit_form(&mut self, payload: &FormPayload) -> Result<()>;
    fn load_schedule(&mut self, query: &ScheduleQuery) -> Result<ScheduleMonth>;
    fn load_users(&mut self, role: Option<Role>) -> Result<Vec<UserAccount>>;
    fn load_tasks(&mut self) -> Result<Vec<Task>>;
    fn update_task_status(&mut self, task: &TaskId, status: TaskStatus) -> Result<()>;
    fn set_user_active(&mut self, user: &UserId, active: bool) -> Result<()>;

    fn today(&self) -> Date {
        OffsetDateTime::now_local()
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
            .date()
    }

    fn now_millis(&self) -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }
}

/// Timer results posted back to the event loop. Each carries the token it
/// was scheduled with so superseded timers are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    DismissFormMessage { token: u64 },
    InspectionCompleted { inspection: InspectionId },
    SessionExpired { token: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LoginField {
    #[default]
    Username,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct LoginUiState {
    input: LoginFormInput,
    field: LoginField,
}

impl LoginUiState {
    fn active_mut(&mut self) -> &mut String {
        match self.field {
            LoginField::Username => &mut self.input.username,
            LoginField::Password => &mut self.input.password,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormUiState {
    kind: FormKind,
    field_index: usize,
    payload: FormPayload,
    editing: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct ListCursors {
    appointments: usize,
    tasks: usize,
    users: usize,
}

#[derive(Debug)]
struct ViewData {
    default_view: ViewMode,
    login: LoginUiState,
    user: Option<SessionUser>,
    appointments: Vec<Appointment>,
    tasks: Vec<Task>,
    users: Vec<UserAccount>,
    inspectors: Vec<UserAccount>,
    agents: Vec<UserAccount>,
    cursors: ListCursors,
    form: Option<FormUiState>,
    schedule: Option<ScheduleUi>,
    inspection: Option<InspectionUi>,
    help_visible: bool,
    status_token: u64,
    expiry_token: u64,
    expiring: bool,
}

impl ViewData {
    fn new(default_view: ViewMode) -> Self {
        Self {
            default_view,
            login: LoginUiState::default(),
            user: None,
            appointments: Vec::new(),
            tasks: Vec::new(),
            users: Vec::new(),
            inspectors: Vec::new(),
            agents: Vec::new(),
            cursors: ListCursors::default(),
            form: None,
            schedule: None,
            inspection: None,
            help_visible: false,
            status_token: 0,
            expiry_token: 0,
            expiring: false,
        }
    }

    /// Forgets everything tied to the signed-in user. Tokens survive so
    /// timers scheduled before the reset cannot match new ones.
    fn reset(&mut self) {
        let (status_token, expiry_token) = (self.status_token, self.expiry_token);
        *self = Self::new(self.default_view);
        self.status_token = status_token;
        self.expiry_token = expiry_token;
    }
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    default_view: ViewMode,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(default_view);
    let (internal_tx, internal_rx) = mpsc::channel();

    restore_session(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        match next_key() {
            Ok(Some(key)) => {
                if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                    break;
                }
            }
            Ok(None) => {}
            Err(error) => {
                result = Err(error);
                break;
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn next_key() -> Result<Option<KeyEvent>> {
    if !event::poll(POLL_INTERVAL).context("poll event")? {
        return Ok(None);
    }
    match event::read().context("read event")? {
        Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
        _ => Ok(None),
    }
}

fn restore_session<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match runtime.restore_session() {
        Ok(Some(session)) => sign_in(state, runtime, view_data, internal_tx, session),
        Ok(None) => {}
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), "stored session unreadable");
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("stored session unreadable: {error:#} -- sign in again"),
            );
        }
    }
}

fn sign_in<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    session: Session,
) {
    let role = session.role();
    tracing::info!(user = %session.user.username, role = role.as_str(), "session started");
    view_data.user = Some(session.user);
    view_data.login = LoginUiState::default();
    dispatch_and_refresh(state, runtime, view_data, AppCommand::SignedIn(role), internal_tx);
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
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
            InternalEvent::DismissFormMessage { token } => {
                if let Some(ui) = view_data.inspection.as_mut() {
                    ui.wizard.dismiss_message(token);
                }
            }
            InternalEvent::InspectionCompleted { inspection } => {
                inspection::finish(state, runtime, view_data, tx, &inspection);
            }
            InternalEvent::SessionExpired { token }
                if view_data.expiring && token == view_data.expiry_token =>
            {
                finish_session_expiry(state, runtime, view_data, tx);
            }
            InternalEvent::SessionExpired { .. } => {}
        }
    }
}

fn schedule_event(internal_tx: &Sender<InternalEvent>, delay: Duration, event: InternalEvent) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        let _ = sender.send(event);
    });
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    schedule_event(internal_tx, STATUS_TTL, InternalEvent::ClearStatus { token });
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

/// Surfaces a failed action. A rejected token starts the sign-out countdown
/// instead of showing the error.
fn report_error(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    action: &str,
    error: &anyhow::Error,
) {
    if is_unauthorized(error) {
        begin_session_expiry(state, view_data, internal_tx);
        return;
    }
    tracing::warn!(action, error = %format!("{error:#}"), "action failed");
    emit_status(
        state,
        view_data,
        internal_tx,
        format!("{action} failed: {error:#}"),
    );
}

fn begin_session_expiry(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if view_data.expiring {
        return;
    }
    tracing::warn!("backend rejected the session token");
    view_data.expiring = true;
    view_data.expiry_token = view_data.expiry_token.saturating_add(1);
    emit_status(
        state,
        view_data,
        internal_tx,
        "session expired -- returning to sign in",
    );
    schedule_event(
        internal_tx,
        SESSION_EXPIRY_DELAY,
        InternalEvent::SessionExpired {
            token: view_data.expiry_token,
        },
    );
}

fn finish_session_expiry<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if let Err(error) = runtime.expire_session() {
        tracing::warn!(error = %format!("{error:#}"), "could not erase the expired session");
    }
    view_data.reset();
    dispatch_with_status(state, view_data, internal_tx, AppCommand::SessionExpired);
}

fn logout<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if let Err(error) = runtime.logout() {
        tracing::warn!(error = %format!("{error:#}"), "backend sign-out failed, local session cleared anyway");
    }
    tracing::info!("session ended");
    view_data.reset();
    dispatch_with_status(state, view_data, internal_tx, AppCommand::SignedOut);
}

/// Dispatches and arms the clear timer for any status the command set.
fn dispatch_with_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) -> Vec<AppEvent> {
    let events = state.dispatch(command);
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
    events
}

fn dispatch_and_refresh<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    command: AppCommand,
    internal_tx: &Sender<InternalEvent>,
) {
    let events = dispatch_with_status(state, view_data, internal_tx, command);
    if should_refresh_view(&events)
        && let Err(error) = refresh_view_data(state, runtime, view_data)
    {
        report_error(state, view_data, internal_tx, "load", &error);
    }
}

fn should_refresh_view(events: &[AppEvent]) -> bool {
    events
        .iter()
        .any(|event| matches!(event, AppEvent::TabChanged(_)))
}

fn refresh_view_data<R: AppRuntime>(
    state: &AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<()> {
    if state.role.is_none() {
        return Ok(());
    }
    match state.active_tab {
        TabKind::Appointments => {
            view_data.appointments = runtime.load_appointments()?;
            view_data.cursors.appointments =
                clamp_cursor(view_data.cursors.appointments, view_data.appointments.len());
        }
        TabKind::Schedule => schedule::refresh(state, runtime, view_data)?,
        TabKind::Tasks => {
            view_data.tasks = runtime.load_tasks()?;
            view_data.cursors.tasks = clamp_cursor(view_data.cursors.tasks, view_data.tasks.len());
        }
        TabKind::Users => {
            view_data.users = runtime.load_users(None)?;
            view_data.cursors.users = clamp_cursor(view_data.cursors.users, view_data.users.len());
        }
    }
    Ok(())
}

fn reload_after<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: String,
) {
    match refresh_view_data(state, runtime, view_data) {
        Ok(()) => emit_status(state, view_data, internal_tx, message),
        Err(error) => report_error(state, view_data, internal_tx, "reload", &error),
    }
}

fn clamp_cursor(cursor: usize, len: usize) -> usize {
    cursor.min(len.saturating_sub(1))
}

fn step_cursor(cursor: &mut usize, len: usize, delta: isize) {
    if len == 0 {
        *cursor = 0;
        return;
    }
    *cursor = cursor.saturating_add_signed(delta).min(len - 1);
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

    if view_data.expiring {
        return false;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    match state.mode {
        AppMode::Login => handle_login_key(state, runtime, view_data, internal_tx, key),
        AppMode::Form(_) => handle_form_key(state, runtime, view_data, internal_tx, key),
        AppMode::Inspection => inspection::handle_key(state, runtime, view_data, internal_tx, key),
        AppMode::Nav => handle_nav_key(state, runtime, view_data, internal_tx, key),
    }
    false
}

fn handle_login_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let login = &mut view_data.login;
    match (key.code, key.modifiers) {
        (KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down, _) => {
            login.field = match login.field {
                LoginField::Username => LoginField::Password,
                LoginField::Password => LoginField::Username,
            };
        }
        (KeyCode::Backspace, _) => {
            login.active_mut().pop();
        }
        (KeyCode::Esc, _) => {
            *login = LoginUiState::default();
        }
        (KeyCode::Enter, _) if login.field == LoginField::Username => {
            login.field = LoginField::Password;
        }
        (KeyCode::Enter, _) => submit_login(state, runtime, view_data, internal_tx),
        (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
            login.active_mut().push(ch);
        }
        _ => {}
    }
}

fn submit_login<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let input = view_data.login.input.clone();
    if let Err(error) = input.validate() {
        emit_status(state, view_data, internal_tx, error.to_string());
        return;
    }
    match runtime.login(&input) {
        Ok(session) => sign_in(state, runtime, view_data, internal_tx, session),
        Err(error) => {
            view_data.login.input.password.clear();
            report_error(state, view_data, internal_tx, "sign in", &error);
        }
    }
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match (key.code, key.modifiers) {
        (KeyCode::Char('?'), _) => {
            view_data.help_visible = true;
            return;
        }
        (KeyCode::Tab, _) | (KeyCode::Char('f'), KeyModifiers::NONE) => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::NextTab, internal_tx);
            return;
        }
        (KeyCode::BackTab, _) | (KeyCode::Char('b'), KeyModifiers::NONE) => {
            dispatch_and_refresh(state, runtime, view_data, AppCommand::PrevTab, internal_tx);
            return;
        }
        (KeyCode::Char('r'), KeyModifiers::NONE) => {
            reload_after(state, runtime, view_data, internal_tx, "reloaded".to_owned());
            return;
        }
        (KeyCode::Char('l'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            logout(state, runtime, view_data, internal_tx);
            return;
        }
        _ => {}
    }

    match state.active_tab {
        TabKind::Appointments => {
            handle_appointments_key(state, runtime, view_data, internal_tx, key);
        }
        TabKind::Schedule => schedule::handle_key(state, runtime, view_data, internal_tx, key),
        TabKind::Tasks => handle_tasks_key(state, runtime, view_data, internal_tx, key),
        TabKind::Users => handle_users_key(state, runtime, view_data, internal_tx, key),
    }
}

fn is_staff(state: &AppState) -> bool {
    state.role.is_some_and(Role::is_staff)
}

fn require_staff(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    action: &str,
) -> bool {
    if is_staff(state) {
        return true;
    }
    emit_status(
        state,
        view_data,
        internal_tx,
        format!("{action} is for call-center and admin accounts"),
    );
    false
}

fn selected_appointment(view_data: &ViewData) -> Option<&Appointment> {
    view_data.appointments.get(view_data.cursors.appointments)
}

fn handle_appointments_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let len = view_data.appointments.len();
    match (key.code, key.modifiers) {
        (KeyCode::Char('j') | KeyCode::Down, _) => {
            step_cursor(&mut view_data.cursors.appointments, len, 1);
        }
        (KeyCode::Char('k') | KeyCode::Up, _) => {
            step_cursor(&mut view_data.cursors.appointments, len, -1);
        }
        (KeyCode::Enter, _) => inspection::start(state, runtime, view_data, internal_tx),
        (KeyCode::Char('c'), KeyModifiers::NONE) => set_appointment_status(
            state,
            runtime,
            view_data,
            internal_tx,
            AppointmentStatus::Confirmed,
        ),
        (KeyCode::Char('x'), KeyModifiers::NONE) => set_appointment_status(
            state,
            runtime,
            view_data,
            internal_tx,
            AppointmentStatus::Cancelled,
        ),
        (KeyCode::Char('n'), KeyModifiers::NONE) => set_appointment_status(
            state,
            runtime,
            view_data,
            internal_tx,
            AppointmentStatus::NeedsReschedule,
        ),
        (KeyCode::Char('s'), KeyModifiers::NONE) => {
            schedule::begin_reschedule(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('a'), KeyModifiers::NONE) => {
            if require_staff(state, view_data, internal_tx, "creating appointments") {
                open_form(
                    state,
                    runtime,
                    view_data,
                    internal_tx,
                    FormPayload::blank_for(FormKind::Appointment),
                );
            }
        }
        _ => {}
    }
}

fn set_appointment_status<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    status: AppointmentStatus,
) {
    if !require_staff(state, view_data, internal_tx, "changing appointment status") {
        return;
    }
    let Some(appointment) = selected_appointment(view_data) else {
        emit_status(state, view_data, internal_tx, "no appointment selected");
        return;
    };
    if appointment.status == status {
        let message = format!("appointment is already {}", status.label());
        emit_status(state, view_data, internal_tx, message);
        return;
    }
    let id = appointment.id.clone();
    tracing::info!(appointment = %id, status = status.as_str(), "changing appointment status");
    match runtime.update_appointment_status(&id, status) {
        Ok(()) => reload_after(
            state,
            runtime,
            view_data,
            internal_tx,
            format!("appointment marked {}", status.label()),
        ),
        Err(error) => report_error(state, view_data, internal_tx, "status change", &error),
    }
}

fn handle_tasks_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let len = view_data.tasks.len();
    match (key.code, key.modifiers) {
        (KeyCode::Char('j') | KeyCode::Down, _) => {
            step_cursor(&mut view_data.cursors.tasks, len, 1);
        }
        (KeyCode::Char('k') | KeyCode::Up, _) => {
            step_cursor(&mut view_data.cursors.tasks, len, -1);
        }
        (KeyCode::Char(' '), _) => {
            let Some(task) = view_data.tasks.get(view_data.cursors.tasks) else {
                emit_status(state, view_data, internal_tx, "no task selected");
                return;
            };
            let (id, next) = (task.id.clone(), task.status.next_manual());
            match runtime.update_task_status(&id, next) {
                Ok(()) => reload_after(
                    state,
                    runtime,
                    view_data,
                    internal_tx,
                    format!("task marked {}", next.label()),
                ),
                Err(error) => report_error(state, view_data, internal_tx, "task update", &error),
            }
        }
        (KeyCode::Char('a'), KeyModifiers::NONE) => open_form(
            state,
            runtime,
            view_data,
            internal_tx,
            FormPayload::blank_for(FormKind::Task),
        ),
        _ => {}
    }
}

fn handle_users_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let len = view_data.users.len();
    match (key.code, key.modifiers) {
        (KeyCode::Char('j') | KeyCode::Down, _) => {
            step_cursor(&mut view_data.cursors.users, len, 1);
        }
        (KeyCode::Char('k') | KeyCode::Up, _) => {
            step_cursor(&mut view_data.cursors.users, len, -1);
        }
        (KeyCode::Char(' '), _) => {
            let Some(user) = view_data.users.get(view_data.cursors.users) else {
                emit_status(state, view_data, internal_tx, "no user selected");
                return;
            };
            if view_data
                .user
                .as_ref()
                .is_some_and(|current| current.id == user.id)
            {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    "you cannot deactivate your own account",
                );
                return;
            }
            let (id, active) = (user.id.clone(), !user.is_active);
            let name = user.display_name();
            match runtime.set_user_active(&id, active) {
                Ok(()) => {
                    let verb = if active { "activated" } else { "deactivated" };
                    reload_after(
                        state,
                        runtime,
                        view_data,
                        internal_tx,
                        format!("{name} {verb}"),
                    );
                }
                Err(error) => report_error(state, view_data, internal_tx, "user update", &error),
            }
        }
        (KeyCode::Char('a'), KeyModifiers::NONE) => open_form(
            state,
            runtime,
            view_data,
            internal_tx,
            FormPayload::blank_for(FormKind::User),
        ),
        _ => {}
    }
}

fn people_role(kind: FormKind) -> Option<Role> {
    match kind {
        FormKind::Appointment => Some(Role::Inspector),
        FormKind::Task => Some(Role::CallCenter),
        FormKind::User => None,
    }
}

fn people_for(view_data: &ViewData, kind: FormKind) -> &[UserAccount] {
    match kind {
        FormKind::Appointment => &view_data.inspectors,
        FormKind::Task => &view_data.agents,
        FormKind::User => &[],
    }
}

fn open_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    payload: FormPayload,
) {
    let kind = payload.kind();
    if let Some(role) = people_role(kind) {
        match runtime.load_users(Some(role)) {
            Ok(people) => {
                let people: Vec<UserAccount> =
                    people.into_iter().filter(|person| person.is_active).collect();
                match kind {
                    FormKind::Appointment => view_data.inspectors = people,
                    _ => view_data.agents = people,
                }
            }
            Err(error) => {
                report_error(state, view_data, internal_tx, "load people", &error);
                if view_data.expiring {
                    return;
                }
            }
        }
    }
    if state.dispatch(AppCommand::OpenForm(kind)).is_empty() {
        return;
    }
    view_data.form = Some(FormUiState {
        kind,
        field_index: 0,
        payload,
        editing: None,
    });
    emit_status(
        state,
        view_data,
        internal_tx,
        format_form_field_status(kind, 0),
    );
}

fn format_form_field_status(kind: FormKind, index: usize) -> String {
    let fields = FormPayload::fields(kind);
    match fields.get(index) {
        Some(field) => format!(
            "{} form field {}/{}: {}",
            kind.label(),
            index + 1,
            fields.len(),
            field.label
        ),
        None => format!("{} form", kind.label()),
    }
}

fn form_field_display(form: &FormUiState, index: usize, people: &[UserAccount]) -> String {
    let Some(field) = FormPayload::fields(form.kind).get(index) else {
        return String::new();
    };
    let raw = form.payload.field_text(index);
    match field.kind {
        FormFieldKind::Person if raw.is_empty() => "unassigned".to_owned(),
        FormFieldKind::Person => people
            .iter()
            .find(|person| person.id.as_str() == raw)
            .map_or(raw, UserAccount::display_name),
        _ => raw,
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(form) = view_data.form.as_mut() else {
        dispatch_with_status(state, view_data, internal_tx, AppCommand::ExitToNav);
        return;
    };

    if form.editing.is_some() {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => form.editing = None,
            (KeyCode::Enter, _) => {
                let text = form.editing.take().unwrap_or_default();
                let status = match form.payload.set_field_text(form.field_index, &text) {
                    Ok(()) => format_form_field_status(form.kind, form.field_index),
                    Err(error) => format!("form invalid: {error}"),
                };
                emit_status(state, view_data, internal_tx, status);
            }
            (KeyCode::Backspace, _) => {
                if let Some(buffer) = form.editing.as_mut() {
                    buffer.pop();
                }
            }
            (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(buffer) = form.editing.as_mut() {
                    buffer.push(ch);
                }
            }
            _ => {}
        }
        return;
    }

    let kind = form.kind;
    let field_count = FormPayload::fields(kind).len();
    let field_kind = FormPayload::fields(kind)
        .get(form.field_index)
        .map(|field| field.kind);
    let people: &[UserAccount] = match kind {
        FormKind::Appointment => &view_data.inspectors,
        FormKind::Task => &view_data.agents,
        FormKind::User => &[],
    };
    let status = match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            view_data.form = None;
            dispatch_with_status(state, view_data, internal_tx, AppCommand::ExitToNav);
            emit_status(state, view_data, internal_tx, "form canceled");
            return;
        }
        (KeyCode::Char('s'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            submit_form(state, runtime, view_data, internal_tx);
            return;
        }
        (KeyCode::Tab | KeyCode::Down, _) => {
            form.field_index = (form.field_index + 1) % field_count.max(1);
            format_form_field_status(kind, form.field_index)
        }
        (KeyCode::BackTab | KeyCode::Up, _) => {
            form.field_index = (form.field_index + field_count.max(1) - 1) % field_count.max(1);
            format_form_field_status(kind, form.field_index)
        }
        (KeyCode::Enter, _)
            if matches!(
                field_kind,
                Some(FormFieldKind::Text | FormFieldKind::Date | FormFieldKind::Time)
            ) =>
        {
            form.editing = Some(form.payload.field_text(form.field_index));
            return;
        }
        (KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Right, _) => {
            cycle_form_field(form, people, 1)
        }
        (KeyCode::Left, _) => cycle_form_field(form, people, -1),
        _ => return,
    };
    emit_status(state, view_data, internal_tx, status);
}

fn cycle_form_field(form: &mut FormUiState, people: &[UserAccount], delta: isize) -> String {
    let index = form.field_index;
    match form.payload.cycle_field(index, delta, people) {
        Ok(()) => {
            let label = FormPayload::fields(form.kind)
                .get(index)
                .map_or("field", |field| field.label);
            format!("{label}: {}", form_field_display(form, index, people))
        }
        Err(error) => error.to_string(),
    }
}

fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(payload) = view_data.form.as_ref().map(|form| form.payload.clone()) else {
        return;
    };
    if let Err(error) = payload.validate() {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("form invalid: {error}"),
        );
        return;
    }
    match runtime.submit_form(&payload) {
        Ok(()) => {
            tracing::info!(kind = payload.kind().label(), "form saved");
            view_data.form = None;
            dispatch_with_status(state, view_data, internal_tx, AppCommand::ExitToNav);
            reload_after(
                state,
                runtime,
                view_data,
                internal_tx,
                format!("{} saved", payload.kind().label()),
            );
        }
        Err(error) => report_error(state, view_data, internal_tx, "save", &error),
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    if state.mode == AppMode::Login {
        render_login(frame, state, view_data);
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let tabs = state.tabs();
    let selected = tabs
        .iter()
        .position(|tab| *tab == state.active_tab)
        .unwrap_or(0);
    let titles = tabs
        .iter()
        .map(|tab| tab.label().to_owned())
        .collect::<Vec<String>>();
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .title(header_title(view_data))
                .borders(Borders::ALL),
        )
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    if state.mode == AppMode::Inspection {
        inspection::render(frame, layout[1], view_data);
    } else {
        match state.active_tab {
            TabKind::Appointments => render_appointments(frame, layout[1], state, view_data),
            TabKind::Schedule => schedule::render(frame, layout[1], view_data),
            TabKind::Tasks => render_tasks(frame, layout[1], view_data),
            TabKind::Users => render_users(frame, layout[1], view_data),
        }
    }

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if let Some(form) = &view_data.form {
        let area = centered_rect(64, 70, frame.area());
        frame.render_widget(Clear, area);
        let overlay = Paragraph::new(render_form_text(form, people_for(view_data, form.kind)))
            .block(
                Block::default()
                    .title(format!("new {}", form.kind.label()))
                    .borders(Borders::ALL),
            );
        frame.render_widget(overlay, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 80, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn header_title(view_data: &ViewData) -> String {
    match &view_data.user {
        Some(user) => format!("inspecta | {} ({})", user.display_name(), user.role.label()),
        None => "inspecta".to_owned(),
    }
}

fn render_login(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let area = centered_rect(50, 40, frame.area());
    frame.render_widget(Clear, area);
    let login = Paragraph::new(login_text(state, view_data))
        .block(Block::default().title("inspecta sign in").borders(Borders::ALL));
    frame.render_widget(login, area);
}

fn login_text(state: &AppState, view_data: &ViewData) -> String {
    let login = &view_data.login;
    let marker = |field: LoginField| if login.field == field { ">" } else { " " };
    let masked = "*".repeat(login.input.password.chars().count());
    let mut lines = vec![
        format!("{} username: {}", marker(LoginField::Username), login.input.username),
        format!("{} password: {masked}", marker(LoginField::Password)),
        String::new(),
        "tab switch field | enter sign in | ctrl+q quit".to_owned(),
    ];
    if let Some(status) = &state.status_line {
        lines.push(String::new());
        lines.push(status.clone());
    }
    lines.join("\n")
}

fn date_text(date: Option<Date>) -> String {
    date.map_or_else(|| "-".to_owned(), iso_date::format)
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() { "-" } else { value }
}

/// Colour used for an appointment status wherever one is drawn.
fn status_color(status: AppointmentStatus) -> Color {
    match status {
        AppointmentStatus::Pending => Color::Yellow,
        AppointmentStatus::Confirmed => Color::Blue,
        AppointmentStatus::InProgress => Color::Cyan,
        AppointmentStatus::Completed => Color::Green,
        AppointmentStatus::Cancelled => Color::Red,
        AppointmentStatus::Rescheduled => Color::Magenta,
        AppointmentStatus::NeedsReschedule => Color::LightRed,
    }
}

fn render_list(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    title: String,
    header: &[&'static str],
    rows: Vec<Row<'static>>,
    widths: Vec<Constraint>,
) {
    let header = Row::new(header.iter().map(|label| Cell::from(*label)))
        .style(Style::default().add_modifier(Modifier::BOLD));
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(table, area);
}

fn cursor_style(selected: bool) -> Style {
    if selected {
        Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

fn appointment_cells(appointment: &Appointment) -> Vec<String> {
    vec![
        date_text(appointment.scheduled_date),
        or_dash(&appointment.scheduled_time).to_owned(),
        appointment.client_name.clone(),
        appointment.address.clone(),
        or_dash(&appointment.inspector_name).to_owned(),
        appointment.status.label().to_owned(),
        appointment
            .punctuality_status
            .map_or("-", |punctuality| punctuality.label())
            .to_owned(),
    ]
}

fn render_appointments(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let title = match state.role {
        Some(Role::Inspector) => format!("my appointments ({})", view_data.appointments.len()),
        _ => format!("appointments ({})", view_data.appointments.len()),
    };
    if view_data.appointments.is_empty() {
        let empty = Paragraph::new("no appointments -- press r to reload")
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(empty, area);
        return;
    }
    let rows = view_data
        .appointments
        .iter()
        .enumerate()
        .map(|(index, appointment)| {
            let selected = index == view_data.cursors.appointments;
            let cells = appointment_cells(appointment)
                .into_iter()
                .enumerate()
                .map(|(column, text)| {
                    let cell = Cell::from(text);
                    if column == 5 {
                        cell.style(Style::default().fg(status_color(appointment.status)))
                    } else {
                        cell
                    }
                })
                .collect::<Vec<_>>();
            Row::new(cells).style(cursor_style(selected))
        })
        .collect();
    render_list(
        frame,
        area,
        title,
        &["date", "time", "client", "address", "inspector", "status", "punctuality"],
        rows,
        vec![
            Constraint::Length(10),
            Constraint::Length(5),
            Constraint::Percentage(20),
            Constraint::Percentage(25),
            Constraint::Percentage(15),
            Constraint::Length(16),
            Constraint::Length(11),
        ],
    );
}

fn task_cells(task: &Task) -> Vec<String> {
    vec![
        task.client_name.clone(),
        or_dash(&task.client_phone).to_owned(),
        or_dash(&task.task_type).to_owned(),
        task.status.label().to_owned(),
        task.priority.label().to_owned(),
        task.call_attempts.to_string(),
        date_text(task.next_inspection_due),
        or_dash(&task.assigned_to_name).to_owned(),
    ]
}

fn render_tasks(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let title = format!("tasks ({})", view_data.tasks.len());
    if view_data.tasks.is_empty() {
        let empty = Paragraph::new("no tasks -- press a to create one")
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(empty, area);
        return;
    }
    let rows = view_data
        .tasks
        .iter()
        .enumerate()
        .map(|(index, task)| {
            Row::new(task_cells(task)).style(cursor_style(index == view_data.cursors.tasks))
        })
        .collect();
    render_list(
        frame,
        area,
        title,
        &["client", "phone", "type", "status", "priority", "calls", "next due", "assignee"],
        rows,
        vec![
            Constraint::Percentage(20),
            Constraint::Length(12),
            Constraint::Percentage(15),
            Constraint::Length(22),
            Constraint::Length(8),
            Constraint::Length(5),
            Constraint::Length(10),
            Constraint::Percentage(15),
        ],
    );
}

fn render_users(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let title = format!("users ({})", view_data.users.len());
    let rows = view_data
        .users
        .iter()
        .enumerate()
        .map(|(index, user)| {
            let active = if user.is_active { "yes" } else { "no" };
            let style = if user.is_active {
                cursor_style(index == view_data.cursors.users)
            } else {
                cursor_style(index == view_data.cursors.users).fg(Color::Gray)
            };
            Row::new(vec![
                user.username.clone(),
                user.display_name(),
                user.email.clone(),
                user.role.label().to_owned(),
                active.to_owned(),
            ])
            .style(style)
        })
        .collect();
    render_list(
        frame,
        area,
        title,
        &["username", "name", "email", "role", "active"],
        rows,
        vec![
            Constraint::Percentage(15),
            Constraint::Percentage(25),
            Constraint::Percentage(30),
            Constraint::Length(18),
            Constraint::Length(6),
        ],
    );
}

fn render_form_text(form: &FormUiState, people: &[UserAccount]) -> String {
    let mut lines = Vec::new();
    for (index, field) in FormPayload::fields(form.kind).iter().enumerate() {
        let marker = if index == form.field_index { ">" } else { " " };
        let value = match (&form.editing, index == form.field_index) {
            (Some(buffer), true) => format!("{buffer}_"),
            _ => form_field_display(form, index, people),
        };
        lines.push(format!("{marker} {:<18} {value}", field.label));
    }
    lines.push(String::new());
    lines.push("enter edit/cycle | tab next | ctrl+s save | esc cancel".to_owned());
    lines.join("\n")
}

fn help_overlay_text() -> &'static str {
    "global\n\
     \x20 ctrl+q        quit\n\
     \x20 ctrl+l        sign out\n\
     \x20 f / b         next / previous tab\n\
     \x20 r             reload the current tab\n\
     \x20 ?             toggle this help\n\
     \n\
     appointments\n\
     \x20 j / k         move\n\
     \x20 enter         start the inspection (inspectors)\n\
     \x20 c / x / n     confirm / cancel / needs reschedule\n\
     \x20 s             reschedule on the calendar\n\
     \x20 a             new appointment\n\
     \n\
     schedule\n\
     \x20 m / w / d     month / week / day view\n\
     \x20 h / l         previous / next period\n\
     \x20 H / L         previous / next month\n\
     \x20 t             today\n\
     \x20 arrows        move the day and hour cursor\n\
     \x20 enter         pick the day or hour\n\
     \x20 [ / ]         previous / next inspector\n\
     \x20 space         confirm the reschedule\n\
     \x20 a             new appointment at the picked slot\n\
     \n\
     inspection\n\
     \x20 enter         edit or toggle the field\n\
     \x20 a / x         add / delete a room or appliance\n\
     \x20 pgdn / pgup   save and continue / go back\n\
     \x20 ctrl+s        complete the inspection\n\
     \x20 esc           leave the form\n\
     \n\
     tasks and users\n\
     \x20 space         cycle task status / toggle user active\n\
     \x20 a             new task / user"
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let mode = match state.mode {
        AppMode::Login => "LOGIN",
        AppMode::Nav => "NAV",
        AppMode::Form(_) => "FORM",
        AppMode::Inspection => "INSPECT",
    };
    let hints = key_hints(state, view_data);
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {hints}"),
        None => format!("{mode} | {hints}"),
    }
}

fn key_hints(state: &AppState, view_data: &ViewData) -> String {
    match state.mode {
        AppMode::Login => "tab field | enter sign in | ctrl+q quit".to_owned(),
        AppMode::Form(_) => {
            if view_data
                .form
                .as_ref()
                .is_some_and(|form| form.editing.is_some())
            {
                "type | enter keep | esc discard".to_owned()
            } else {
                "tab field | enter edit | space cycle | ctrl+s save | esc cancel".to_owned()
            }
        }
        AppMode::Inspection => inspection::key_hints(view_data),
        AppMode::Nav => match state.active_tab {
            TabKind::Appointments if is_staff(state) => {
                "j/k move | c confirm | x cancel | n needs reschedule | s reschedule | a new | ? help"
                    .to_owned()
            }
            TabKind::Appointments => "j/k move | enter inspect | f/b tab | r reload | ? help".to_owned(),
            TabKind::Schedule => schedule::key_hints(view_data),
            TabKind::Tasks => "j/k move | space status | a new | f/b tab | ? help".to_owned(),
            TabKind::Users => "j/k move | space activate | a new | f/b tab | ? help".to_owned(),
        },
    }
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
