// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{
    AppRuntime, InternalEvent, ViewData, dispatch_and_refresh, dispatch_with_status, emit_status,
    is_staff, open_form, reload_after, report_error, require_staff, selected_appointment,
    status_color,
};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};
use inspecta_api::is_unauthorized;
use inspecta_app::{
    AppCommand, AppState, Appointment, CalendarCommand, CalendarDay, CalendarEvent, DAY_HOURS,
    FormKind, FormPayload, LoadStatus, RescheduleInput, Role, ScheduleQuery, ScheduleTarget,
    ScheduleView, TabKind, UserAccount, ViewMode, WEEK_HOURS, iso_date,
};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use std::ops::RangeInclusive;
use std::sync::mpsc::Sender;
use time::Date;

const WEEKDAY_HEADERS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScheduleUi {
    pub(crate) view: ScheduleView,
    /// Hour row under the cursor in week and day views.
    pub(crate) hour: u8,
    /// Appointment being moved, when the calendar was opened to reschedule.
    pub(crate) reschedule: Option<Appointment>,
    pub(crate) picked: Option<(Date, Option<String>)>,
}

impl ScheduleUi {
    fn new(view: ScheduleView) -> Self {
        let hour = *hours_for(view.view_mode()).start();
        Self {
            view,
            hour,
            reschedule: None,
            picked: None,
        }
    }

    /// Index of the day the keyboard cursor sits on.
    fn focused(&self) -> usize {
        let view = &self.view;
        match view.view_mode() {
            ViewMode::Day => view.day_index(),
            ViewMode::Week => view
                .selected()
                .filter(|index| view.week_range().contains(index))
                .unwrap_or_else(|| view.week_start()),
            ViewMode::Month => view.selected().unwrap_or_else(|| view.day_index()),
        }
    }
}

fn hours_for(mode: ViewMode) -> RangeInclusive<u8> {
    match mode {
        ViewMode::Day => DAY_HOURS,
        ViewMode::Month | ViewMode::Week => WEEK_HOURS,
    }
}

fn clamp_hour(mode: ViewMode, hour: u8) -> u8 {
    let hours = hours_for(mode);
    hour.clamp(*hours.start(), *hours.end())
}

pub(crate) fn refresh<R: AppRuntime>(
    state: &AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
) -> Result<()> {
    let staff = is_staff(state);
    if staff {
        view_data.inspectors = runtime
            .load_users(Some(Role::Inspector))?
            .into_iter()
            .filter(|inspector| inspector.is_active)
            .collect();
    }
    if view_data.schedule.is_none() {
        let target = if staff {
            match view_data.inspectors.first() {
                Some(first) => ScheduleTarget::Inspector(first.id.clone()),
                None => return Ok(()),
            }
        } else {
            ScheduleTarget::Own
        };
        let view = ScheduleView::new(target, runtime.today(), view_data.default_view);
        view_data.schedule = Some(ScheduleUi::new(view));
    }
    match view_data.schedule.as_mut() {
        Some(ui) => reload(runtime, ui),
        None => Ok(()),
    }
}

fn reload<R: AppRuntime>(runtime: &mut R, ui: &mut ScheduleUi) -> Result<()> {
    let query = ui.view.begin_load();
    fetch(runtime, ui, query)
}

/// Runs one month fetch. Only a rejected session propagates; every other
/// failure is recorded on the view and rendered in place of the days.
fn fetch<R: AppRuntime>(runtime: &mut R, ui: &mut ScheduleUi, query: ScheduleQuery) -> Result<()> {
    let result = match runtime.load_schedule(&query) {
        Ok(month) => Ok(month),
        Err(error) if is_unauthorized(&error) => return Err(error),
        Err(error) => {
            tracing::warn!(?query, error = %format!("{error:#}"), "schedule load failed");
            Err(format!("{error:#}"))
        }
    };
    ui.view.finish_load(&query, result);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScheduleAction {
    Calendar(CalendarCommand),
    Pick(CalendarCommand),
    Hour(i8),
    CycleInspector(isize),
    ConfirmReschedule,
    NewAppointment,
    CancelReschedule,
}

fn action_for_key(ui: &ScheduleUi, key: KeyEvent, today: Date) -> Option<ScheduleAction> {
    use CalendarCommand as Cmd;
    use ScheduleAction::{Calendar, Hour, Pick};

    let mode = ui.view.view_mode();
    let focused = ui.focused();
    let action = match (key.code, mode) {
        (KeyCode::Char('m'), _) => Calendar(Cmd::SetViewMode(ViewMode::Month)),
        (KeyCode::Char('w'), _) => Calendar(Cmd::SetViewMode(ViewMode::Week)),
        (KeyCode::Char('d'), _) => Calendar(Cmd::SetViewMode(ViewMode::Day)),
        (KeyCode::Char('h'), _) => Calendar(Cmd::Prev),
        (KeyCode::Char('l'), _) => Calendar(Cmd::Next),
        (KeyCode::Char('H'), _) => Calendar(Cmd::PrevMonth),
        (KeyCode::Char('L'), _) => Calendar(Cmd::NextMonth),
        (KeyCode::Char('t'), _) => Calendar(Cmd::Today { today }),
        (KeyCode::Left, ViewMode::Day) => Calendar(Cmd::PrevDay),
        (KeyCode::Right, ViewMode::Day) => Calendar(Cmd::NextDay),
        (KeyCode::Left, _) => Calendar(Cmd::ClickDay(focused.checked_sub(1)?)),
        (KeyCode::Right, _) => Calendar(Cmd::ClickDay(focused + 1)),
        (KeyCode::Up | KeyCode::Char('k'), ViewMode::Month) => {
            Calendar(Cmd::ClickDay(focused.checked_sub(7)?))
        }
        (KeyCode::Down | KeyCode::Char('j'), ViewMode::Month) => {
            Calendar(Cmd::ClickDay(focused + 7))
        }
        (KeyCode::Up | KeyCode::Char('k'), _) => Hour(-1),
        (KeyCode::Down | KeyCode::Char('j'), _) => Hour(1),
        (KeyCode::Enter, ViewMode::Month) => Pick(Cmd::ClickDay(focused)),
        (KeyCode::Enter, _) => Pick(Cmd::ClickHour {
            day: focused,
            hour: ui.hour,
        }),
        (KeyCode::Char('['), _) => ScheduleAction::CycleInspector(-1),
        (KeyCode::Char(']'), _) => ScheduleAction::CycleInspector(1),
        (KeyCode::Char(' '), _) if ui.reschedule.is_some() => ScheduleAction::ConfirmReschedule,
        (KeyCode::Char('a'), _) => ScheduleAction::NewAppointment,
        (KeyCode::Esc, _) if ui.reschedule.is_some() => ScheduleAction::CancelReschedule,
        _ => return None,
    };
    Some(action)
}

pub(crate) fn handle_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let today = runtime.today();
    let Some(action) = view_data
        .schedule
        .as_ref()
        .and_then(|ui| action_for_key(ui, key, today))
    else {
        return;
    };

    match action {
        ScheduleAction::Calendar(command) => {
            run_command(state, runtime, view_data, internal_tx, command, false);
        }
        ScheduleAction::Pick(command) => {
            run_command(state, runtime, view_data, internal_tx, command, true);
        }
        ScheduleAction::Hour(delta) => {
            if let Some(ui) = view_data.schedule.as_mut() {
                let mode = ui.view.view_mode();
                ui.hour = clamp_hour(mode, ui.hour.saturating_add_signed(delta));
            }
        }
        ScheduleAction::CycleInspector(delta) => {
            cycle_inspector(state, runtime, view_data, internal_tx, delta);
        }
        ScheduleAction::ConfirmReschedule => {
            confirm_reschedule(state, runtime, view_data, internal_tx);
        }
        ScheduleAction::NewAppointment => new_appointment(state, runtime, view_data, internal_tx),
        ScheduleAction::CancelReschedule => {
            if let Some(ui) = view_data.schedule.as_mut() {
                ui.reschedule = None;
                ui.picked = None;
            }
            emit_status(state, view_data, internal_tx, "reschedule canceled");
        }
    }
}

fn run_command<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: CalendarCommand,
    pick: bool,
) {
    let Some(ui) = view_data.schedule.as_mut() else {
        return;
    };
    let events = ui.view.dispatch(command);
    match run_calendar(runtime, ui, events, pick) {
        Ok(Some(message)) => emit_status(state, view_data, internal_tx, message),
        Ok(None) => {}
        Err(error) => report_error(state, view_data, internal_tx, "schedule load", &error),
    }
}

/// Performs the effects a calendar command asked for and returns a status
/// line worth showing, if any.
fn run_calendar<R: AppRuntime>(
    runtime: &mut R,
    ui: &mut ScheduleUi,
    events: Vec<CalendarEvent>,
    pick: bool,
) -> Result<Option<String>> {
    let mut message = None;
    let mut picked = false;
    for event in events {
        match event {
            CalendarEvent::ReloadRequested(query) => fetch(runtime, ui, query)?,
            CalendarEvent::DateSelected { date, time } if pick => {
                message = Some(format!("picked {}", slot_text(date, time.as_deref())));
                ui.picked = Some((date, time));
                picked = true;
            }
            CalendarEvent::DateSelected { .. } => {}
            CalendarEvent::ViewModeChanged(mode) => {
                ui.hour = clamp_hour(mode, ui.hour);
                message = Some(format!("{} view", mode.label()));
            }
        }
    }
    if pick && !picked {
        message = Some("that slot cannot be picked -- choose a free hour from today on".to_owned());
    }
    Ok(message)
}

fn slot_text(date: Date, time: Option<&str>) -> String {
    match time {
        Some(time) => format!("{} {time}", iso_date::format(date)),
        None => iso_date::format(date),
    }
}

fn cycle_inspector<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    delta: isize,
) {
    if !require_staff(state, view_data, internal_tx, "switching inspectors") {
        return;
    }
    let Some(ui) = view_data.schedule.as_mut() else {
        return;
    };
    if view_data.inspectors.is_empty() {
        emit_status(state, view_data, internal_tx, "no active inspectors to switch to");
        return;
    }
    let current = match ui.view.target() {
        ScheduleTarget::Inspector(id) => view_data
            .inspectors
            .iter()
            .position(|inspector| inspector.id == *id),
        ScheduleTarget::Own => None,
    };
    let len = view_data.inspectors.len() as isize;
    let next = current.map_or(0, |index| (index as isize + delta).rem_euclid(len) as usize);
    let inspector = &view_data.inspectors[next];
    let name = inspector.display_name();
    let events = ui
        .view
        .dispatch(CalendarCommand::SetTarget(ScheduleTarget::Inspector(
            inspector.id.clone(),
        )));
    ui.picked = None;
    match run_calendar(runtime, ui, events, false) {
        Ok(_) => emit_status(state, view_data, internal_tx, format!("showing {name}")),
        Err(error) => report_error(state, view_data, internal_tx, "schedule load", &error),
    }
}

/// Opens the calendar on the selected appointment's inspector and date so a
/// new slot can be picked.
pub(crate) fn begin_reschedule<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if !require_staff(state, view_data, internal_tx, "rescheduling") {
        return;
    }
    let Some(appointment) = selected_appointment(view_data).cloned() else {
        emit_status(state, view_data, internal_tx, "no appointment selected");
        return;
    };
    if appointment.status.is_closed() {
        let message = format!(
            "appointment is {} -- only open appointments can be rescheduled",
            appointment.status.label()
        );
        emit_status(state, view_data, internal_tx, message);
        return;
    }
    let target = match &appointment.inspector {
        Some(id) => ScheduleTarget::Inspector(id.clone()),
        None => match runtime.load_users(Some(Role::Inspector)) {
            Ok(inspectors) => match inspectors.into_iter().find(|inspector| inspector.is_active) {
                Some(first) => ScheduleTarget::Inspector(first.id),
                None => {
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        "no active inspectors -- create an inspector account first",
                    );
                    return;
                }
            },
            Err(error) => {
                report_error(state, view_data, internal_tx, "load inspectors", &error);
                return;
            }
        },
    };

    let mut view = ScheduleView::new(target, runtime.today(), view_data.default_view);
    if let Some(date) = appointment.scheduled_date {
        view = view.with_initial(date, Some(appointment.scheduled_time.clone()));
    }
    let mut ui = ScheduleUi::new(view);
    if let Some(hour) = clock_hour(&appointment.scheduled_time) {
        ui.hour = clamp_hour(ui.view.view_mode(), hour);
    }
    let client = appointment.client_name.clone();
    tracing::info!(appointment = %appointment.id, "rescheduling from the calendar");
    ui.reschedule = Some(appointment);
    view_data.schedule = Some(ui);

    dispatch_and_refresh(
        state,
        runtime,
        view_data,
        AppCommand::SelectTab(TabKind::Schedule),
        internal_tx,
    );
    if !view_data.expiring {
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("rescheduling {client} -- enter picks a slot, space confirms, esc cancels"),
        );
    }
}

fn clock_hour(time: &str) -> Option<u8> {
    time.split_once(':')?.0.trim().parse().ok()
}

fn confirm_reschedule<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some((appointment, picked, target)) = view_data.schedule.as_ref().and_then(|ui| {
        Some((
            ui.reschedule.clone()?,
            ui.picked.clone(),
            ui.view.target().clone(),
        ))
    }) else {
        return;
    };
    let Some((date, time)) = picked else {
        emit_status(
            state,
            view_data,
            internal_tx,
            "pick a day or hour first -- press enter on the calendar",
        );
        return;
    };
    let inspector = match target {
        ScheduleTarget::Inspector(id) => Some(id),
        ScheduleTarget::Own => appointment.inspector.clone(),
    };
    let input = RescheduleInput {
        appointment_id: appointment.id.clone(),
        scheduled_date: date,
        scheduled_time: time.unwrap_or_else(|| appointment.scheduled_time.clone()),
        inspector,
    };
    if let Err(error) = input.validate() {
        emit_status(state, view_data, internal_tx, error.to_string());
        return;
    }

    tracing::info!(
        appointment = %input.appointment_id,
        date = %iso_date::format(date),
        time = %input.scheduled_time,
        "rescheduling appointment"
    );
    match runtime.reschedule_appointment(&input) {
        Ok(()) => {
            view_data.schedule = None;
            dispatch_with_status(
                state,
                view_data,
                internal_tx,
                AppCommand::SelectTab(TabKind::Appointments),
            );
            let message = format!(
                "{} moved to {}",
                appointment.client_name,
                slot_text(date, Some(&input.scheduled_time))
            );
            reload_after(state, runtime, view_data, internal_tx, message);
        }
        Err(error) => report_error(state, view_data, internal_tx, "reschedule", &error),
    }
}

fn new_appointment<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if !require_staff(state, view_data, internal_tx, "creating appointments") {
        return;
    }
    let Some(ui) = view_data.schedule.as_ref() else {
        return;
    };
    let mut payload = FormPayload::blank_for(FormKind::Appointment);
    if let FormPayload::Appointment(input) = &mut payload {
        if let ScheduleTarget::Inspector(id) = ui.view.target() {
            input.inspector = Some(id.clone());
        }
        match &ui.picked {
            Some((date, time)) => {
                input.scheduled_date = Some(*date);
                input.scheduled_time = time.clone().unwrap_or_default();
            }
            None => input.scheduled_date = ui.view.selected_day().map(|day| day.date),
        }
    }
    open_form(state, runtime, view_data, internal_tx, payload);
}

pub(crate) fn key_hints(view_data: &ViewData) -> String {
    match view_data.schedule.as_ref() {
        Some(ui) if ui.reschedule.is_some() => {
            "enter pick | space confirm | esc cancel | h/l move | [ ] inspector | m/w/d view"
        }
        Some(_) => "m/w/d view | h/l prev/next | H/L month | t today | enter pick | a new | ? help",
        None => "f/b tab | r reload | ? help",
    }
    .to_owned()
}

fn target_name(ui: &ScheduleUi, inspectors: &[UserAccount]) -> String {
    match ui.view.target() {
        ScheduleTarget::Own => "my schedule".to_owned(),
        ScheduleTarget::Inspector(id) => inspectors
            .iter()
            .find(|inspector| inspector.id == *id)
            .map_or_else(|| format!("inspector {id}"), UserAccount::display_name),
    }
}

fn header_text(ui: &ScheduleUi) -> String {
    let view = &ui.view;
    let loading = match view.status() {
        LoadStatus::Loading => " | loading",
        LoadStatus::Idle | LoadStatus::Loaded | LoadStatus::Failed(_) => "",
    };
    let stats = view.stats();
    let mut second = format!(
        "total {} | pending {} | completed {} | free {}",
        stats.total, stats.pending, stats.completed, stats.available_slots
    );
    if let Some(appointment) = &ui.reschedule {
        second.push_str(&format!(" | moving {}", appointment.client_name));
        if let Some(date) = appointment.scheduled_date {
            let was = slot_text(date, Some(&appointment.scheduled_time));
            second.push_str(&format!(" from {was}"));
        }
    }
    if let Some((date, time)) = &ui.picked {
        second.push_str(&format!(" | picked {}", slot_text(*date, time.as_deref())));
    }
    format!(
        "{} | {} view{loading}\n{second}",
        view.nav_title(),
        view.view_mode().label()
    )
}

fn day_cell_text(day: &CalendarDay) -> String {
    match day.appointments_count {
        0 => format!("{:>2}", day.day),
        count if day.is_busy => format!("{:>2} !{count}", day.day),
        count => format!("{:>2} +{count}", day.day),
    }
}

fn hour_cell_text(day: &CalendarDay, hour: u8) -> String {
    match day.slot_at(hour) {
        Some(slot) => slot.client_name.clone(),
        None if day.is_past => String::new(),
        None => "free".to_owned(),
    }
}

fn day_style(ui: &ScheduleUi, index: usize, day: &CalendarDay) -> Style {
    let mut style = Style::default();
    if day.is_past {
        style = style.fg(Color::DarkGray);
    } else if day.is_busy {
        style = style.fg(Color::Red);
    }
    if day.is_today {
        style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
    }
    if ui.view.initial_date() == Some(day.date) {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if index == ui.focused() {
        style = style.add_modifier(Modifier::REVERSED);
    }
    style
}

fn slot_style(ui: &ScheduleUi, index: usize, day: &CalendarDay, hour: u8) -> Style {
    let mut style = match day.slot_at(hour) {
        Some(slot) => Style::default().fg(status_color(slot.status)),
        None if day.is_past => Style::default().fg(Color::DarkGray),
        None => Style::default().fg(Color::Gray),
    };
    if ui.view.is_initial_slot(day, hour) {
        style = style.bg(Color::Magenta);
    }
    let picked = ui.picked.as_ref().is_some_and(|(date, time)| {
        *date == day.date && time.as_deref() == Some(format!("{hour:02}:00").as_str())
    });
    if picked {
        style = style.bg(Color::Green);
    }
    if index == ui.focused() && hour == ui.hour {
        style = style.add_modifier(Modifier::REVERSED);
    }
    style
}

pub(crate) fn render(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let Some(ui) = view_data.schedule.as_ref() else {
        let empty = Paragraph::new("no active inspectors -- create an inspector account to see a schedule")
            .block(Block::default().borders(Borders::ALL).title("schedule"));
        frame.render_widget(empty, area);
        return;
    };

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(1)])
        .split(area);
    let header = Paragraph::new(header_text(ui)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(target_name(ui, &view_data.inspectors)),
    );
    frame.render_widget(header, layout[0]);

    if let LoadStatus::Failed(message) = ui.view.status() {
        let failed = Paragraph::new(format!(
            "could not load the schedule: {message}\nchange the month or inspector, or press r to retry"
        ))
        .style(Style::default().fg(Color::Red))
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(failed, layout[1]);
        return;
    }

    match ui.view.view_mode() {
        ViewMode::Day => render_day(frame, layout[1], ui),
        mode => {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Min(40), Constraint::Length(38)])
                .split(layout[1]);
            if mode == ViewMode::Month {
                render_month(frame, columns[0], ui);
            } else {
                render_week(frame, columns[0], ui);
            }
            let sidebar = Paragraph::new(day_detail_text(ui))
                .block(Block::default().borders(Borders::ALL).title("day"));
            frame.render_widget(sidebar, columns[1]);
        }
    }
}

fn render_month(frame: &mut ratatui::Frame<'_>, area: Rect, ui: &ScheduleUi) {
    let days = ui.view.days();
    let grid = ui.view.month_grid();
    let rows = grid
        .chunks(7)
        .map(|week| {
            Row::new(week.iter().map(|cell| match cell.and_then(|index| days.get(index).map(|day| (index, day))) {
                Some((index, day)) => Cell::from(day_cell_text(day)).style(day_style(ui, index, day)),
                None => Cell::from(""),
            }))
        })
        .collect::<Vec<_>>();
    let header = Row::new(WEEKDAY_HEADERS.iter().map(|label| Cell::from(*label)))
        .style(Style::default().add_modifier(Modifier::BOLD));
    let table = Table::new(rows, [Constraint::Length(7); 7])
        .header(header)
        .column_spacing(1)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn render_week(frame: &mut ratatui::Frame<'_>, area: Rect, ui: &ScheduleUi) {
    let range = ui.view.week_range();
    let week = ui.view.week_days();
    let mut header = vec![Cell::from("hour")];
    header.extend(week.iter().enumerate().map(|(offset, day)| {
        Cell::from(format!("{} {}", short_weekday(day.date), day.day))
            .style(day_style(ui, range.start + offset, day))
    }));
    let rows = WEEK_HOURS
        .map(|hour| {
            let mut cells = vec![Cell::from(format!("{hour:02}:00"))];
            cells.extend(week.iter().enumerate().map(|(offset, day)| {
                Cell::from(hour_cell_text(day, hour))
                    .style(slot_style(ui, range.start + offset, day, hour))
            }));
            Row::new(cells)
        })
        .collect::<Vec<_>>();
    let mut widths = vec![Constraint::Length(5)];
    widths.extend(std::iter::repeat_n(Constraint::Min(8), week.len()));
    let table = Table::new(rows, widths)
        .header(Row::new(header).style(Style::default().add_modifier(Modifier::BOLD)))
        .column_spacing(1)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn render_day(frame: &mut ratatui::Frame<'_>, area: Rect, ui: &ScheduleUi) {
    let index = ui.view.day_index();
    let Some(day) = ui.view.day_cursor() else {
        let empty = Paragraph::new("no days loaded").block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    };
    let rows = DAY_HOURS
        .map(|hour| {
            let (address, status) = day
                .slot_at(hour)
                .map(|slot| (slot.address.clone(), slot.status_label().to_owned()))
                .unwrap_or_default();
            Row::new(vec![
                Cell::from(format!("{hour:02}:00")),
                Cell::from(hour_cell_text(day, hour)),
                Cell::from(address),
                Cell::from(status),
            ])
            .style(slot_style(ui, index, day, hour))
        })
        .collect::<Vec<_>>();
    let header = Row::new(["hour", "client", "address", "status"].map(Cell::from))
        .style(Style::default().add_modifier(Modifier::BOLD));
    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Percentage(30),
            Constraint::Percentage(40),
            Constraint::Length(18),
        ],
    )
    .header(header)
    .column_spacing(1)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(iso_date::format(day.date)),
    );
    frame.render_widget(table, area);
}

fn short_weekday(date: Date) -> &'static str {
    WEEKDAY_HEADERS[usize::from(date.weekday().number_days_from_sunday())]
}

fn day_detail_text(ui: &ScheduleUi) -> String {
    let Some(day) = ui.view.selected_day() else {
        return "no day selected".to_owned();
    };
    let mut flags = Vec::new();
    if day.is_today {
        flags.push("today");
    }
    if day.is_past {
        flags.push("past");
    }
    if day.is_busy {
        flags.push("busy");
    }
    let mut lines = vec![format!("{} {}", day.date.weekday(), iso_date::format(day.date))];
    if !flags.is_empty() {
        lines.push(flags.join(", "));
    }
    lines.push(format!("{} appointments", day.appointments_count));
    for slot in &day.appointments {
        lines.push(String::new());
        lines.push(format!("{} {} ({})", slot.time, slot.client_name, slot.status_label()));
        lines.push(format!("  {}", slot.address));
    }
    lines.join("\n")
}
