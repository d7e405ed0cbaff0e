// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{
    AppRuntime, InternalEvent, ViewData, begin_session_expiry, dispatch_with_status, emit_status,
    reload_after, report_error, schedule_event, selected_appointment, step_cursor,
};
use anyhow::{Result, anyhow, bail};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use inspecta_api::is_unauthorized;
use inspecta_app::{
    AppCommand, AppState, AppointmentId, AppointmentStatus, COMPLETION_DELAY, Catalog,
    CatalogItem, ChecklistCategory, DefectKind, Dimension, FieldKind, FieldSpec, InspectionForm,
    InspectionId, MESSAGE_TTL, MessageKind, OnacWizard, Role, STEP_COUNT, STEP_FIELDS,
    STEP_TITLES, WizardPhase,
};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Gauge, Paragraph, Row as TableRow, Table};
use std::sync::mpsc::Sender;

const ROOMS_STEP: u8 = 4;
const APPLIANCES_STEP: u8 = 5;
const CHECKLIST_STEP: u8 = 7;
const DEFECTS_STEP: u8 = 8;

#[derive(Debug, Clone)]
pub(crate) struct InspectionUi {
    pub(crate) wizard: OnacWizard,
    /// Appointment patched to completed once the wizard finishes.
    pub(crate) appointment: AppointmentId,
    pub(crate) field: usize,
    pub(crate) edit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VentSide {
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Trans,
    Dism,
    Long,
}

/// One editable line of the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Row {
    Field(&'static FieldSpec),
    RoomType(i64),
    RoomMeasure(i64, Dimension),
    RoomVolume(i64),
    RoomPower(i64),
    RoomVent(i64, VentSide),
    RoomComplies(i64),
    ApplianceName(i64),
    ApplianceType(i64),
    ApplianceRoom(i64),
    AppliancePower(i64),
    ApplianceCoupling(i64),
    ApplianceVentilation(i64),
    ApplianceMaterial(i64),
    ApplianceDimension(i64, Axis),
    Checklist(&'static str, &'static CatalogItem),
    Defect(DefectKind, &'static CatalogItem),
}

impl Row {
    fn room(self) -> Option<i64> {
        match self {
            Self::RoomType(id)
            | Self::RoomMeasure(id, _)
            | Self::RoomVolume(id)
            | Self::RoomPower(id)
            | Self::RoomVent(id, _)
            | Self::RoomComplies(id) => Some(id),
            _ => None,
        }
    }

    fn appliance(self) -> Option<i64> {
        match self {
            Self::ApplianceName(id)
            | Self::ApplianceType(id)
            | Self::ApplianceRoom(id)
            | Self::AppliancePower(id)
            | Self::ApplianceCoupling(id)
            | Self::ApplianceVentilation(id)
            | Self::ApplianceMaterial(id)
            | Self::ApplianceDimension(id, _) => Some(id),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Field(spec) => spec.label,
            Self::RoomType(_) => "Type",
            Self::RoomMeasure(_, Dimension::Length) => "Length (m)",
            Self::RoomMeasure(_, Dimension::Width) => "Width (m)",
            Self::RoomMeasure(_, Dimension::Height) => "Height (m)",
            Self::RoomVolume(_) => "Volume (m3)",
            Self::RoomPower(_) => "Total power (BTU)",
            Self::RoomVent(_, VentSide::Upper) => "Upper ventilation (m2)",
            Self::RoomVent(_, VentSide::Lower) => "Lower ventilation (m2)",
            Self::RoomComplies(_) => "Complies with standard",
            Self::ApplianceName(_) => "Name",
            Self::ApplianceType(_) => "Type",
            Self::ApplianceRoom(_) => "Room",
            Self::AppliancePower(_) => "Power (BTU)",
            Self::ApplianceCoupling(_) => "Normalized coupling",
            Self::ApplianceVentilation(_) => "Ventilation",
            Self::ApplianceMaterial(_) => "Pipe material",
            Self::ApplianceDimension(_, Axis::Trans) => "Transverse (m)",
            Self::ApplianceDimension(_, Axis::Dism) => "Reduction (m)",
            Self::ApplianceDimension(_, Axis::Long) => "Longitudinal (m)",
            Self::Checklist(_, item) | Self::Defect(_, item) => item.label,
        }
    }

    fn group(self, form: &InspectionForm) -> String {
        if let Some(id) = self.room() {
            let index = form.rooms_data.iter().position(|room| room.id == id);
            return index.map_or_else(String::new, |index| format!("room {}", index + 1));
        }
        if let Some(id) = self.appliance() {
            let index = form
                .appliances_data
                .iter()
                .position(|appliance| appliance.id == id);
            return index.map_or_else(String::new, |index| format!("appliance {}", index + 1));
        }
        match self {
            Self::Checklist(category, item) => format!("{category} {}", item.code),
            Self::Defect(kind, item) => format!("{} {}", kind.label(), item.code),
            _ => String::new(),
        }
    }

    fn value(self, form: &InspectionForm) -> String {
        let yes_no = |flag: bool| (if flag { "yes" } else { "no" }).to_owned();
        let room = |id: i64| form.rooms_data.iter().find(|room| room.id == id);
        let appliance = |id: i64| {
            form.appliances_data
                .iter()
                .find(|appliance| appliance.id == id)
        };
        match self {
            Self::Field(spec) => match spec.kind {
                FieldKind::Flag => form.flag(spec.key).map(yes_no).unwrap_or_default(),
                FieldKind::Choice => form.choice(spec.key).unwrap_or_default().to_owned(),
                FieldKind::Signature => match form.signature(spec.key) {
                    Some(Some(signer)) => format!("signed by {signer}"),
                    _ => "unsigned".to_owned(),
                },
                FieldKind::Text | FieldKind::LongText | FieldKind::Date | FieldKind::Time => {
                    form.text(spec.key).unwrap_or_default().to_owned()
                }
            },
            Self::RoomType(id) => room(id).map(|room| room.kind.label().to_owned()).unwrap_or_default(),
            Self::RoomMeasure(id, dimension) => room(id)
                .map(|room| room.measurement(dimension).to_owned())
                .unwrap_or_default(),
            Self::RoomVolume(id) => room(id).map(|room| room.volume.clone()).unwrap_or_default(),
            Self::RoomPower(id) => room(id)
                .map(|room| room.total_power.clone())
                .unwrap_or_default(),
            Self::RoomVent(id, VentSide::Upper) => room(id)
                .map(|room| room.upper_ventilation_area.clone())
                .unwrap_or_default(),
            Self::RoomVent(id, VentSide::Lower) => room(id)
                .map(|room| room.lower_ventilation_area.clone())
                .unwrap_or_default(),
            Self::RoomComplies(id) => room(id)
                .map(|room| yes_no(room.complies_standard))
                .unwrap_or_default(),
            Self::ApplianceName(id) => appliance(id)
                .map(|appliance| appliance.name.clone())
                .unwrap_or_default(),
            Self::ApplianceType(id) => appliance(id)
                .map(|appliance| appliance.kind.label().to_owned())
                .unwrap_or_default(),
            Self::ApplianceRoom(id) => appliance(id)
                .map(|appliance| form.room_label(appliance.room_id))
                .unwrap_or_default(),
            Self::AppliancePower(id) => appliance(id)
                .map(|appliance| appliance.power_btu.clone())
                .unwrap_or_default(),
            Self::ApplianceCoupling(id) => appliance(id)
                .map(|appliance| yes_no(appliance.normalized_coupling))
                .unwrap_or_default(),
            Self::ApplianceVentilation(id) => appliance(id)
                .map(|appliance| appliance.ventilation_type.label().to_owned())
                .unwrap_or_default(),
            Self::ApplianceMaterial(id) => appliance(id)
                .map(|appliance| appliance.material.label().to_owned())
                .unwrap_or_default(),
            Self::ApplianceDimension(id, axis) => appliance(id)
                .map(|appliance| {
                    let dimensions = &appliance.dimensions;
                    match axis {
                        Axis::Trans => dimensions.trans.clone(),
                        Axis::Dism => dimensions.dism.clone(),
                        Axis::Long => dimensions.long.clone(),
                    }
                })
                .unwrap_or_default(),
            Self::Checklist(_, item) => check_box(form.is_checked(item.code)),
            Self::Defect(kind, item) => {
                check_box(form.defects(kind).iter().any(|code| code == item.code))
            }
        }
    }

    /// Current text for rows edited through the input buffer.
    fn editable_text(self, form: &InspectionForm) -> Option<String> {
        match self {
            Self::Field(spec) => match spec.kind {
                FieldKind::Text | FieldKind::LongText | FieldKind::Date | FieldKind::Time => {
                    form.text(spec.key).map(str::to_owned)
                }
                FieldKind::Signature => form
                    .signature(spec.key)
                    .map(|signer| signer.clone().unwrap_or_default()),
                FieldKind::Flag | FieldKind::Choice => None,
            },
            Self::RoomMeasure(..)
            | Self::RoomPower(_)
            | Self::RoomVent(..)
            | Self::ApplianceName(_)
            | Self::AppliancePower(_)
            | Self::ApplianceDimension(..) => Some(self.value(form)),
            _ => None,
        }
    }
}

fn check_box(checked: bool) -> String {
    let mark = if checked { "[x]" } else { "[ ]" };
    mark.to_owned()
}

fn room_rows(id: i64) -> [Row; 9] {
    [
        Row::RoomType(id),
        Row::RoomMeasure(id, Dimension::Length),
        Row::RoomMeasure(id, Dimension::Width),
        Row::RoomMeasure(id, Dimension::Height),
        Row::RoomVolume(id),
        Row::RoomPower(id),
        Row::RoomVent(id, VentSide::Upper),
        Row::RoomVent(id, VentSide::Lower),
        Row::RoomComplies(id),
    ]
}

fn appliance_rows(id: i64) -> [Row; 10] {
    [
        Row::ApplianceName(id),
        Row::ApplianceType(id),
        Row::ApplianceRoom(id),
        Row::AppliancePower(id),
        Row::ApplianceCoupling(id),
        Row::ApplianceVentilation(id),
        Row::ApplianceMaterial(id),
        Row::ApplianceDimension(id, Axis::Trans),
        Row::ApplianceDimension(id, Axis::Dism),
        Row::ApplianceDimension(id, Axis::Long),
    ]
}

fn field_rows(step: u8) -> Vec<Row> {
    let fields: &'static [FieldSpec] = match step
        .checked_sub(1)
        .and_then(|index| STEP_FIELDS.get(usize::from(index)))
    {
        Some(fields) => *fields,
        None => &[],
    };
    fields.iter().map(Row::Field).collect()
}

fn rows(wizard: &OnacWizard) -> Vec<Row> {
    let form = wizard.form();
    let catalog = wizard.catalog();
    match wizard.step() {
        ROOMS_STEP => form
            .rooms_data
            .iter()
            .flat_map(|room| room_rows(room.id))
            .collect(),
        APPLIANCES_STEP => form
            .appliances_data
            .iter()
            .flat_map(|appliance| appliance_rows(appliance.id))
            .collect(),
        CHECKLIST_STEP => {
            let checklist: &'static [ChecklistCategory] = catalog.checklist;
            checklist
                .iter()
                .flat_map(|category| {
                    category
                        .items
                        .iter()
                        .map(move |item| Row::Checklist(category.name, item))
                })
                .collect()
        }
        DEFECTS_STEP => [DefectKind::Critical, DefectKind::NonCritical]
            .into_iter()
            .flat_map(|kind| catalog.defects(kind).iter().map(move |item| Row::Defect(kind, item)))
            .chain(field_rows(DEFECTS_STEP))
            .collect(),
        step => field_rows(step),
    }
}

fn current_row(ui: &InspectionUi) -> Option<Row> {
    rows(&ui.wizard).get(ui.field).copied()
}

fn describe(form: &InspectionForm, row: Row) -> String {
    let group = row.group(form);
    let label = row.label().trim_end_matches(" *").to_lowercase();
    if group.is_empty() {
        format!("{label}: {}", row.value(form))
    } else {
        format!("{group} {label}: {}", row.value(form))
    }
}

fn apply_text(form: &mut InspectionForm, row: Row, value: &str) -> Result<()> {
    let value = value.trim();
    let missing_room = |id: i64| anyhow!("room {id} not found -- reload the form and retry");
    let missing_appliance =
        |id: i64| anyhow!("appliance {id} not found -- reload the form and retry");
    match row {
        Row::Field(spec) if spec.kind == FieldKind::Signature => {
            if value.is_empty() {
                form.clear_signature(spec.key)
            } else {
                form.sign(spec.key, value)
            }
        }
        Row::Field(spec) => form.set_text(spec.key, value),
        Row::RoomMeasure(id, dimension) => form.set_room_measurement(id, dimension, value),
        Row::RoomPower(id) => {
            form.room_mut(id).ok_or_else(|| missing_room(id))?.total_power = value.to_owned();
            Ok(())
        }
        Row::RoomVent(id, side) => {
            let room = form.room_mut(id).ok_or_else(|| missing_room(id))?;
            match side {
                VentSide::Upper => room.upper_ventilation_area = value.to_owned(),
                VentSide::Lower => room.lower_ventilation_area = value.to_owned(),
            }
            Ok(())
        }
        Row::ApplianceName(id) => {
            form.appliance_mut(id)
                .ok_or_else(|| missing_appliance(id))?
                .name = value.to_owned();
            Ok(())
        }
        Row::AppliancePower(id) => {
            form.appliance_mut(id)
                .ok_or_else(|| missing_appliance(id))?
                .power_btu = value.to_owned();
            Ok(())
        }
        Row::ApplianceDimension(id, axis) => {
            let dimensions = &mut form
                .appliance_mut(id)
                .ok_or_else(|| missing_appliance(id))?
                .dimensions;
            match axis {
                Axis::Trans => dimensions.trans = value.to_owned(),
                Axis::Dism => dimensions.dism = value.to_owned(),
                Axis::Long => dimensions.long = value.to_owned(),
            }
            Ok(())
        }
        _ => bail!("{} is not typed in", row.label()),
    }
}

/// Toggles flags and steps choices. Text rows refuse and point at enter.
fn adjust(form: &mut InspectionForm, catalog: &Catalog, row: Row, delta: isize) -> Result<()> {
    let missing_room = |id: i64| anyhow!("room {id} not found -- reload the form and retry");
    let missing_appliance =
        |id: i64| anyhow!("appliance {id} not found -- reload the form and retry");
    match row {
        Row::Field(spec) => match spec.kind {
            FieldKind::Flag => form.toggle_flag(spec.key).map(|_| ()),
            FieldKind::Choice => form.cycle_choice(spec.key, delta),
            _ => bail!("press enter to type {}", row.label().to_lowercase()),
        },
        Row::RoomType(id) => {
            let room = form.room_mut(id).ok_or_else(|| missing_room(id))?;
            room.kind = room.kind.cycle(delta);
            Ok(())
        }
        Row::RoomComplies(id) => {
            let room = form.room_mut(id).ok_or_else(|| missing_room(id))?;
            room.complies_standard = !room.complies_standard;
            Ok(())
        }
        Row::RoomVolume(_) => bail!("volume is computed from length, width and height"),
        Row::ApplianceType(id) => {
            let appliance = form.appliance_mut(id).ok_or_else(|| missing_appliance(id))?;
            appliance.kind = appliance.kind.cycle(delta);
            Ok(())
        }
        Row::ApplianceRoom(id) => form.cycle_appliance_room(id).map(|_| ()),
        Row::ApplianceCoupling(id) => {
            let appliance = form.appliance_mut(id).ok_or_else(|| missing_appliance(id))?;
            appliance.normalized_coupling = !appliance.normalized_coupling;
            Ok(())
        }
        Row::ApplianceVentilation(id) => {
            let appliance = form.appliance_mut(id).ok_or_else(|| missing_appliance(id))?;
            appliance.ventilation_type = appliance.ventilation_type.cycle(delta);
            Ok(())
        }
        Row::ApplianceMaterial(id) => {
            let appliance = form.appliance_mut(id).ok_or_else(|| missing_appliance(id))?;
            appliance.material = appliance.material.cycle(delta);
            Ok(())
        }
        Row::Checklist(_, item) => form.toggle_checklist(catalog, item.code).map(|_| ()),
        Row::Defect(kind, item) => form.toggle_defect(catalog, kind, item.code).map(|_| ()),
        Row::RoomMeasure(..)
        | Row::RoomPower(_)
        | Row::RoomVent(..)
        | Row::ApplianceName(_)
        | Row::AppliancePower(_)
        | Row::ApplianceDimension(..) => {
            bail!("press enter to type {}", row.label().to_lowercase())
        }
    }
}

/// What a local edit wants shown once the form borrow is released.
enum Feedback {
    Status(String),
    Message(u64),
}

fn show_error(ui: &mut InspectionUi, error: &anyhow::Error) -> Feedback {
    Feedback::Message(ui.wizard.show_message(format!("{error:#}"), MessageKind::Error))
}

fn apply_feedback(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    feedback: Option<Feedback>,
) {
    match feedback {
        Some(Feedback::Status(message)) => emit_status(state, view_data, internal_tx, message),
        Some(Feedback::Message(token)) => schedule_dismiss(internal_tx, token),
        None => {}
    }
}

fn schedule_dismiss(internal_tx: &Sender<InternalEvent>, token: u64) {
    schedule_event(
        internal_tx,
        MESSAGE_TTL,
        InternalEvent::DismissFormMessage { token },
    );
}

/// Opens the ONAC form for the selected appointment.
pub(crate) fn start<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if !matches!(state.role, Some(Role::Inspector | Role::Admin)) {
        emit_status(
            state,
            view_data,
            internal_tx,
            "inspections are filled in from inspector accounts",
        );
        return;
    }
    let Some(appointment) = selected_appointment(view_data).cloned() else {
        emit_status(state, view_data, internal_tx, "no appointment selected");
        return;
    };
    let Some(inspection) = appointment.inspection.clone() else {
        emit_status(
            state,
            view_data,
            internal_tx,
            "appointment has no inspection yet -- ask the call center to create one",
        );
        return;
    };
    if !appointment.can_start_inspection() {
        let message = format!(
            "appointment is {} -- inspections run on pending, confirmed or in-progress appointments",
            appointment.status.label()
        );
        emit_status(state, view_data, internal_tx, message);
        return;
    }

    let mut wizard = OnacWizard::new(inspection, Catalog::onac_v1());
    if let Err(error) = wizard.load(runtime) {
        report_error(state, view_data, internal_tx, "load inspection form", &error);
        return;
    }
    let token = wizard.message().map(|message| message.token);
    let step = wizard.step();
    view_data.inspection = Some(InspectionUi {
        wizard,
        appointment: appointment.id.clone(),
        field: 0,
        edit: None,
    });
    dispatch_with_status(state, view_data, internal_tx, AppCommand::OpenInspection);
    if let Some(token) = token {
        schedule_dismiss(internal_tx, token);
    }
    let status = format!(
        "inspection for {} at step {step}/{STEP_COUNT}",
        appointment.client_name
    );
    emit_status(state, view_data, internal_tx, status);
}

pub(crate) fn handle_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some((phase, editing)) = view_data
        .inspection
        .as_ref()
        .map(|ui| (ui.wizard.phase(), ui.edit.is_some()))
    else {
        return;
    };
    if phase == WizardPhase::Completed {
        return;
    }
    if editing {
        let feedback = view_data
            .inspection
            .as_mut()
            .and_then(|ui| handle_edit_key(ui, key));
        apply_feedback(state, view_data, internal_tx, feedback);
        return;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::PageDown => save_and_next(state, runtime, view_data, internal_tx),
        KeyCode::Char('n') if ctrl => save_and_next(state, runtime, view_data, internal_tx),
        KeyCode::PageUp => go_back(state, view_data, internal_tx),
        KeyCode::Char('p') if ctrl => go_back(state, view_data, internal_tx),
        KeyCode::Char('s') if ctrl => complete(state, runtime, view_data, internal_tx),
        KeyCode::Esc => leave(state, view_data, internal_tx),
        _ => {
            let now_millis = runtime.now_millis();
            let feedback = view_data
                .inspection
                .as_mut()
                .and_then(|ui| handle_row_key(ui, key, now_millis));
            apply_feedback(state, view_data, internal_tx, feedback);
        }
    }
}

fn handle_edit_key(ui: &mut InspectionUi, key: KeyEvent) -> Option<Feedback> {
    match key.code {
        KeyCode::Esc => {
            ui.edit = None;
            None
        }
        KeyCode::Enter => commit_edit(ui),
        KeyCode::Backspace => {
            if let Some(buffer) = ui.edit.as_mut() {
                buffer.pop();
            }
            None
        }
        KeyCode::Char(ch) => {
            if let Some(buffer) = ui.edit.as_mut() {
                buffer.push(ch);
            }
            None
        }
        _ => None,
    }
}

/// Stores the buffer into the row. A refused value keeps the buffer open so
/// it can be corrected.
fn commit_edit(ui: &mut InspectionUi) -> Option<Feedback> {
    let row = current_row(ui)?;
    let buffer = ui.edit.clone()?;
    match apply_text(ui.wizard.form_mut(), row, &buffer) {
        Ok(()) => {
            ui.edit = None;
            Some(Feedback::Status(describe(ui.wizard.form(), row)))
        }
        Err(error) => Some(show_error(ui, &error)),
    }
}

fn handle_row_key(ui: &mut InspectionUi, key: KeyEvent, now_millis: i64) -> Option<Feedback> {
    match key.code {
        KeyCode::Down | KeyCode::Char('j') => {
            let len = rows(&ui.wizard).len();
            step_cursor(&mut ui.field, len, 1);
            None
        }
        KeyCode::Up | KeyCode::Char('k') => {
            let len = rows(&ui.wizard).len();
            step_cursor(&mut ui.field, len, -1);
            None
        }
        KeyCode::Enter => {
            let row = current_row(ui)?;
            match row.editable_text(ui.wizard.form()) {
                Some(text) => {
                    ui.edit = Some(text);
                    None
                }
                None => adjust_row(ui, row, 1),
            }
        }
        KeyCode::Char(' ') | KeyCode::Right => adjust_row(ui, current_row(ui)?, 1),
        KeyCode::Left => adjust_row(ui, current_row(ui)?, -1),
        KeyCode::Char('a') => Some(add_entry(ui, now_millis)),
        KeyCode::Char('x') => remove_entry(ui),
        _ => None,
    }
}

fn adjust_row(ui: &mut InspectionUi, row: Row, delta: isize) -> Option<Feedback> {
    let catalog = *ui.wizard.catalog();
    match adjust(ui.wizard.form_mut(), &catalog, row, delta) {
        Ok(()) => Some(Feedback::Status(describe(ui.wizard.form(), row))),
        Err(error) => Some(show_error(ui, &error)),
    }
}

fn add_entry(ui: &mut InspectionUi, now_millis: i64) -> Feedback {
    let step = ui.wizard.step();
    let form = ui.wizard.form_mut();
    let (id, noun) = match step {
        ROOMS_STEP => (form.add_room(now_millis), "room"),
        APPLIANCES_STEP => (form.add_appliance(now_millis), "appliance"),
        _ => {
            return Feedback::Status(format!(
                "rooms and appliances are added on steps {ROOMS_STEP} and {APPLIANCES_STEP}"
            ));
        }
    };
    let rows = rows(&ui.wizard);
    if let Some(index) = rows
        .iter()
        .position(|row| row.room().or(row.appliance()) == Some(id))
    {
        ui.field = index;
    }
    let count = match step {
        ROOMS_STEP => ui.wizard.form().rooms_data.len(),
        _ => ui.wizard.form().appliances_data.len(),
    };
    Feedback::Status(format!("{noun} {count} added"))
}

fn remove_entry(ui: &mut InspectionUi) -> Option<Feedback> {
    let row = current_row(ui)?;
    let form = ui.wizard.form_mut();
    let message = if let Some(id) = row.room() {
        form.remove_room(id);
        "room removed; appliances in it now have no room".to_owned()
    } else if let Some(id) = row.appliance() {
        form.remove_appliance(id);
        "appliance removed".to_owned()
    } else {
        match row {
            Row::Field(spec) if spec.kind == FieldKind::Signature => {
                if let Err(error) = form.clear_signature(spec.key) {
                    return Some(show_error(ui, &error));
                }
                format!("{} cleared", spec.label.to_lowercase())
            }
            _ => return Some(Feedback::Status("nothing to remove here".to_owned())),
        }
    };
    let len = rows(&ui.wizard).len();
    ui.field = ui.field.min(len.saturating_sub(1));
    Some(Feedback::Status(message))
}

fn save_and_next<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(ui) = view_data.inspection.as_mut() else {
        return;
    };
    let saved = ui.wizard.next(runtime);
    let token = ui.wizard.message().map(|message| message.token);
    match saved {
        Ok(true) => ui.field = 0,
        Ok(false) => {}
        Err(error) if is_unauthorized(&error) => {
            begin_session_expiry(state, view_data, internal_tx);
            return;
        }
        Err(error) => {
            tracing::warn!(error = %format!("{error:#}"), "inspection step save failed");
        }
    }
    if let Some(token) = token {
        schedule_dismiss(internal_tx, token);
    }
}

fn go_back(state: &mut AppState, view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    let Some(ui) = view_data.inspection.as_mut() else {
        return;
    };
    if ui.wizard.previous() {
        ui.field = 0;
        ui.edit = None;
    } else {
        emit_status(state, view_data, internal_tx, "already on the first step");
    }
}

/// Validates and persists the final step. Control returns to the lists
/// after a short pause so the success message can be read.
fn complete<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(ui) = view_data.inspection.as_mut() else {
        return;
    };
    let before = ui.wizard.message().map(|message| message.token);
    let completed = ui.wizard.complete(runtime);
    match completed {
        Ok(()) => {
            let inspection = ui.wizard.inspection_id().clone();
            schedule_event(
                internal_tx,
                COMPLETION_DELAY,
                InternalEvent::InspectionCompleted { inspection },
            );
        }
        Err(error) if is_unauthorized(&error) => {
            begin_session_expiry(state, view_data, internal_tx);
            return;
        }
        Err(error) => {
            if ui.wizard.message().map(|message| message.token) == before {
                ui.wizard
                    .show_message(format!("{error:#}"), MessageKind::Error);
            }
        }
    }
    if let Some(token) = ui.wizard.message().map(|message| message.token) {
        schedule_dismiss(internal_tx, token);
    }
}

fn leave(state: &mut AppState, view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    view_data.inspection = None;
    dispatch_with_status(state, view_data, internal_tx, AppCommand::ExitToNav);
    emit_status(
        state,
        view_data,
        internal_tx,
        "inspection closed -- saved steps are kept",
    );
}

/// Runs when the completion delay elapses. Timers for another inspection
/// or a wizard that never completed are ignored.
pub(crate) fn finish<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    inspection: &InspectionId,
) {
    let ready = view_data.inspection.as_ref().is_some_and(|ui| {
        ui.wizard.inspection_id() == inspection && ui.wizard.phase() == WizardPhase::Completed
    });
    if !ready {
        return;
    }
    let Some(ui) = view_data.inspection.take() else {
        return;
    };
    dispatch_with_status(state, view_data, internal_tx, AppCommand::ExitToNav);
    match runtime.update_appointment_status(&ui.appointment, AppointmentStatus::Completed) {
        Ok(()) => reload_after(
            state,
            runtime,
            view_data,
            internal_tx,
            "inspection completed".to_owned(),
        ),
        Err(error) => report_error(
            state,
            view_data,
            internal_tx,
            "mark appointment completed",
            &error,
        ),
    }
}

pub(crate) fn key_hints(view_data: &ViewData) -> String {
    match view_data.inspection.as_ref() {
        Some(ui) if ui.edit.is_some() => "enter store | esc discard".to_owned(),
        Some(ui) if ui.wizard.phase() == WizardPhase::Completed => "completing...".to_owned(),
        Some(ui) => {
            let mut hints = "j/k move | enter edit | space toggle".to_owned();
            if matches!(ui.wizard.step(), ROOMS_STEP | APPLIANCES_STEP) {
                hints.push_str(" | a add | x remove");
            }
            hints.push_str(" | pgdn save+next | pgup back");
            if ui.wizard.is_last_step() {
                hints.push_str(" | ctrl+s complete");
            }
            hints.push_str(" | esc leave");
            hints
        }
        None => String::new(),
    }
}

fn empty_step_text(step: u8) -> &'static str {
    match step {
        ROOMS_STEP => "no rooms yet -- press a to add one",
        APPLIANCES_STEP => "no appliances yet -- press a to add one",
        _ => "nothing to fill in on this step",
    }
}

pub(crate) fn render(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let Some(ui) = view_data.inspection.as_ref() else {
        return;
    };
    let wizard = &ui.wizard;
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);

    let step = wizard.step();
    let title = STEP_TITLES
        .get(usize::from(step.saturating_sub(1)))
        .copied()
        .unwrap_or_default();
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("inspection {} | step {step}/{STEP_COUNT}: {title}", wizard.inspection_id())),
        )
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(u16::try_from(wizard.progress_percent()).unwrap_or(100));
    frame.render_widget(gauge, layout[0]);

    let rows = rows(wizard);
    let form = wizard.form();
    if rows.is_empty() {
        let empty = Paragraph::new(empty_step_text(step)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, layout[1]);
    } else {
        let visible = usize::from(layout[1].height.saturating_sub(2)).max(1);
        let offset = ui.field.saturating_sub(visible - 1);
        let table_rows = rows
            .iter()
            .enumerate()
            .skip(offset)
            .take(visible)
            .map(|(index, row)| {
                let value = match (&ui.edit, index == ui.field) {
                    (Some(buffer), true) => format!("{buffer}_"),
                    _ => row.value(form),
                };
                let style = if index == ui.field {
                    Style::default().add_modifier(Modifier::REVERSED)
                } else {
                    Style::default()
                };
                TableRow::new(vec![
                    Cell::from(row.group(form)),
                    Cell::from(row.label()),
                    Cell::from(value),
                ])
                .style(style)
            })
            .collect::<Vec<_>>();
        let table = Table::new(
            table_rows,
            [
                Constraint::Length(24),
                Constraint::Percentage(40),
                Constraint::Min(10),
            ],
        )
        .column_spacing(1)
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(table, layout[1]);
    }

    let (text, style) = match wizard.message() {
        Some(message) => {
            let color = match message.kind {
                MessageKind::Success => Color::Green,
                MessageKind::Error => Color::Red,
            };
            (message.text.clone(), Style::default().fg(color))
        }
        None => match wizard.phase() {
            WizardPhase::Loading => ("loading the saved form...".to_owned(), Style::default()),
            WizardPhase::LoadFailed => (
                "form did not load; close and reopen it".to_owned(),
                Style::default().fg(Color::Red),
            ),
            WizardPhase::Editing | WizardPhase::Completed => {
                (format!("{}% complete", wizard.progress_percent()), Style::default())
            }
        },
    };
    let message = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(message, layout[2]);
}

#[cfg(test)]
mod tests {
    use super::finish;
    use crate::handle_key_event;
    use crate::test_support::{TestRuntime, ctrl, internal_tx, key, signed_in};
    use crossterm::event::KeyCode;
    use inspecta_app::{
        AppMode, AppState, AppointmentId, AppointmentStatus, InspectionId, MessageKind, Role,
        WizardPhase,
    };
    use inspecta_testkit::{FakeGateway, appointment, onac_snapshot};
    use serde_json::json;

    fn open(step: u8, role: Role) -> (TestRuntime, AppState, crate::ViewData) {
        let mut runtime = TestRuntime {
            gateway: FakeGateway::with_snapshot(onac_snapshot(step)),
            appointments: vec![appointment(
                "a-1",
                AppointmentStatus::Confirmed,
                Some("insp-100"),
            )],
            ..TestRuntime::default()
        };
        let (mut state, mut view_data) = signed_in(&mut runtime, role);
        let tx = internal_tx();
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, key(KeyCode::Enter));
        (runtime, state, view_data)
    }

    fn press(
        runtime: &mut TestRuntime,
        state: &mut AppState,
        view_data: &mut crate::ViewData,
        codes: &[KeyCode],
    ) {
        let tx = internal_tx();
        for code in codes {
            handle_key_event(state, runtime, view_data, &tx, key(*code));
        }
    }

    fn type_text(
        runtime: &mut TestRuntime,
        state: &mut AppState,
        view_data: &mut crate::ViewData,
        text: &str,
    ) {
        let codes: Vec<KeyCode> = text.chars().map(KeyCode::Char).collect();
        press(runtime, state, view_data, &codes);
    }

    #[test]
    fn inspector_resumes_at_the_saved_step() {
        let (_runtime, state, view_data) = open(3, Role::Inspector);

        assert_eq!(state.mode, AppMode::Inspection);
        let ui = view_data.inspection.as_ref().expect("wizard open");
        assert_eq!(ui.wizard.step(), 3);
        assert_eq!(ui.wizard.form().account_number, "12345678");
        assert_eq!(ui.appointment, AppointmentId::new("a-1"));
    }

    #[test]
    fn call_center_cannot_open_inspections() {
        let (runtime, state, view_data) = open(1, Role::CallCenter);

        assert_eq!(state.mode, AppMode::Nav);
        assert!(view_data.inspection.is_none());
        assert!(runtime.gateway.patches.is_empty());
    }

    #[test]
    fn failed_form_load_keeps_the_wizard_closed() {
        let mut runtime = TestRuntime {
            gateway: FakeGateway::with_snapshot(onac_snapshot(6)),
            appointments: vec![appointment(
                "a-1",
                AppointmentStatus::Confirmed,
                Some("insp-100"),
            )],
            ..TestRuntime::default()
        };
        let (mut state, mut view_data) = signed_in(&mut runtime, Role::Inspector);
        runtime.gateway.fail_next("connection reset");
        press(&mut runtime, &mut state, &mut view_data, &[KeyCode::Enter]);

        assert_eq!(state.mode, AppMode::Nav);
        assert!(view_data.inspection.is_none());
        assert!(runtime.gateway.patches.is_empty());
        assert!(
            state
                .status_line
                .as_deref()
                .is_some_and(|status| status.contains("connection reset"))
        );
    }

    #[test]
    fn appointments_without_inspection_are_refused() {
        let mut runtime = TestRuntime {
            appointments: vec![appointment("a-1", AppointmentStatus::Pending, None)],
            ..TestRuntime::default()
        };
        let (mut state, mut view_data) = signed_in(&mut runtime, Role::Inspector);
        press(&mut runtime, &mut state, &mut view_data, &[KeyCode::Enter]);

        assert_eq!(state.mode, AppMode::Nav);
        assert!(
            state
                .status_line
                .as_deref()
                .is_some_and(|status| status.starts_with("appointment has no inspection"))
        );
    }

    #[test]
    fn typed_field_is_saved_with_its_step() {
        let (mut runtime, mut state, mut view_data) = open(1, Role::Inspector);

        press(&mut runtime, &mut state, &mut view_data, &[KeyCode::Enter]);
        type_text(&mut runtime, &mut state, &mut view_data, "55501234");
        press(
            &mut runtime,
            &mut state,
            &mut view_data,
            &[KeyCode::Enter, KeyCode::PageDown],
        );

        let ui = view_data.inspection.as_ref().expect("wizard open");
        assert_eq!(ui.wizard.step(), 2);
        assert_eq!(ui.wizard.form().account_number, "55501234");
        let patch = runtime.gateway.patches.last().expect("step saved");
        assert_eq!(patch["account_number"], json!("55501234"));
        assert_eq!(patch["current_step"], json!(1));
    }

    #[test]
    fn failed_save_keeps_the_step_and_shows_the_error() {
        let (mut runtime, mut state, mut view_data) = open(2, Role::Inspector);
        runtime.gateway.fail_next("backend unavailable");

        press(&mut runtime, &mut state, &mut view_data, &[KeyCode::PageDown]);

        let ui = view_data.inspection.as_ref().expect("wizard open");
        assert_eq!(ui.wizard.step(), 2);
        let message = ui.wizard.message().expect("error shown");
        assert_eq!(message.kind, MessageKind::Error);
        assert!(message.text.contains("backend unavailable"));
    }

    #[test]
    fn bad_date_keeps_the_field_open() {
        let (mut runtime, mut state, mut view_data) = open(1, Role::Inspector);

        // Third row is the last revision date.
        press(
            &mut runtime,
            &mut state,
            &mut view_data,
            &[KeyCode::Char('j'), KeyCode::Char('j'), KeyCode::Enter],
        );
        type_text(&mut runtime, &mut state, &mut view_data, "soon");
        press(&mut runtime, &mut state, &mut view_data, &[KeyCode::Enter]);

        let ui = view_data.inspection.as_ref().expect("wizard open");
        assert_eq!(ui.edit.as_deref(), Some("soon"));
        assert!(
            ui.wizard
                .message()
                .is_some_and(|message| message.text.contains("must be a date"))
        );
        assert_eq!(ui.wizard.form().last_revision_date, "");
    }

    #[test]
    fn new_room_computes_its_volume() {
        let (mut runtime, mut state, mut view_data) = open(4, Role::Inspector);

        press(&mut runtime, &mut state, &mut view_data, &[KeyCode::Char('a')]);
        for value in ["4", "3", "2.75"] {
            press(
                &mut runtime,
                &mut state,
                &mut view_data,
                &[KeyCode::Char('j'), KeyCode::Enter],
            );
            type_text(&mut runtime, &mut state, &mut view_data, value);
            press(&mut runtime, &mut state, &mut view_data, &[KeyCode::Enter]);
        }

        let form = view_data.inspection.as_ref().expect("wizard open").wizard.form();
        assert_eq!(form.rooms_data.len(), 1);
        assert_eq!(form.rooms_data[0].id, runtime.now_millis);
        assert_eq!(form.rooms_data[0].volume, "33.00");
    }

    #[test]
    fn removing_a_room_clears_appliance_references() {
        let (mut runtime, mut state, mut view_data) = open(6, Role::Inspector);
        // Back to rooms; the first row belongs to the only room.
        press(
            &mut runtime,
            &mut state,
            &mut view_data,
            &[KeyCode::PageUp, KeyCode::PageUp, KeyCode::Char('x')],
        );

        let form = view_data.inspection.as_ref().expect("wizard open").wizard.form();
        assert!(form.rooms_data.is_empty());
        assert_eq!(form.appliances_data[0].room_id, None);
    }

    #[test]
    fn checklist_toggle_twice_leaves_nothing_behind() {
        let (mut runtime, mut state, mut view_data) = open(7, Role::Inspector);

        press(&mut runtime, &mut state, &mut view_data, &[KeyCode::Char(' ')]);
        assert!(
            view_data
                .inspection
                .as_ref()
                .is_some_and(|ui| ui.wizard.form().is_checked("270"))
        );
        press(&mut runtime, &mut state, &mut view_data, &[KeyCode::Char(' ')]);

        let form = view_data.inspection.as_ref().expect("wizard open").wizard.form();
        assert!(form.checklist_items.is_empty());
    }

    #[test]
    fn completion_needs_a_result() {
        let (mut runtime, mut state, mut view_data) = open(9, Role::Inspector);
        let tx = internal_tx();
        let patches = runtime.gateway.patches.len();

        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, ctrl('s'));

        let ui = view_data.inspection.as_ref().expect("wizard open");
        assert_eq!(ui.wizard.phase(), WizardPhase::Editing);
        assert!(
            ui.wizard
                .message()
                .is_some_and(|message| message.text.starts_with("inspection result is required"))
        );
        assert_eq!(runtime.gateway.patches.len(), patches);
    }

    #[test]
    fn completion_marks_the_appointment_after_the_delay() {
        let (mut runtime, mut state, mut view_data) = open(9, Role::Inspector);
        let tx = internal_tx();

        // First row of the last step is "no defects".
        press(&mut runtime, &mut state, &mut view_data, &[KeyCode::Char(' ')]);
        handle_key_event(&mut state, &mut runtime, &mut view_data, &tx, ctrl('s'));

        let patch = runtime.gateway.patches.last().expect("completion saved");
        assert_eq!(patch["status"], json!("COMPLETED"));
        assert_eq!(patch["form_completed_percentage"], json!(100));
        assert_eq!(
            view_data.inspection.as_ref().map(|ui| ui.wizard.phase()),
            Some(WizardPhase::Completed)
        );

        finish(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &InspectionId::new("other"),
        );
        assert_eq!(state.mode, AppMode::Inspection);

        finish(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            &InspectionId::new("insp-100"),
        );
        assert_eq!(state.mode, AppMode::Nav);
        assert!(view_data.inspection.is_none());
        assert_eq!(
            runtime.status_updates,
            vec![(AppointmentId::new("a-1"), AppointmentStatus::Completed)]
        );
        assert_eq!(view_data.appointments[0].status, AppointmentStatus::Completed);
        assert_eq!(state.status_line.as_deref(), Some("inspection completed"));
    }

    #[test]
    fn expired_session_while_loading_starts_the_sign_out() {
        let mut runtime = TestRuntime {
            appointments: vec![appointment(
                "a-1",
                AppointmentStatus::InProgress,
                Some("insp-100"),
            )],
            ..TestRuntime::default()
        };
        let (mut state, mut view_data) = signed_in(&mut runtime, Role::Inspector);
        runtime.unauthorized = true;

        press(&mut runtime, &mut state, &mut view_data, &[KeyCode::Enter]);

        assert!(view_data.expiring);
        assert!(view_data.inspection.is_none());
        assert_eq!(state.mode, AppMode::Nav);
    }

    #[test]
    fn escape_leaves_the_wizard() {
        let (mut runtime, mut state, mut view_data) = open(2, Role::Admin);
        assert_eq!(state.mode, AppMode::Inspection);

        press(&mut runtime, &mut state, &mut view_data, &[KeyCode::Esc]);

        assert_eq!(state.mode, AppMode::Nav);
        assert!(view_data.inspection.is_none());
    }
}
