// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::Serialize;
use time::Date;

use crate::model::iso_date;
use crate::{AppointmentId, FormKind, Role, TaskPriority, UserAccount, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginFormInput {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentFormInput {
    pub client_name: String,
    pub client_phone: String,
    pub client_email: String,
    pub client_dni: String,
    pub address: String,
    pub inspector: Option<UserId>,
    #[serde(with = "iso_date::option")]
    pub scheduled_date: Option<Date>,
    pub scheduled_time: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFormInput {
    pub client_name: String,
    pub client_phone: String,
    pub client_email: String,
    pub client_address: String,
    pub assigned_to: Option<UserId>,
    pub priority: TaskPriority,
    pub task_type: String,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_appointment: Option<AppointmentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFormInput {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: Role,
}

/// New slot for an existing appointment, usually picked on the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RescheduleInput {
    #[serde(skip)]
    pub appointment_id: AppointmentId,
    #[serde(with = "iso_date")]
    pub scheduled_date: Date,
    pub scheduled_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspector: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPayload {
    Appointment(AppointmentFormInput),
    Task(TaskFormInput),
    User(UserFormInput),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFieldKind {
    Text,
    Date,
    Time,
    Person,
    Priority,
    Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormFieldSpec {
    pub label: &'static str,
    pub kind: FormFieldKind,
}

const fn spec(label: &'static str, kind: FormFieldKind) -> FormFieldSpec {
    FormFieldSpec { label, kind }
}

const APPOINTMENT_FIELDS: &[FormFieldSpec] = &[
    spec("client name", FormFieldKind::Text),
    spec("client phone", FormFieldKind::Text),
    spec("client email", FormFieldKind::Text),
    spec("client id number", FormFieldKind::Text),
    spec("address", FormFieldKind::Text),
    spec("inspector", FormFieldKind::Person),
    spec("date", FormFieldKind::Date),
    spec("time", FormFieldKind::Time),
    spec("notes", FormFieldKind::Text),
];

const TASK_FIELDS: &[FormFieldSpec] = &[
    spec("client name", FormFieldKind::Text),
    spec("client phone", FormFieldKind::Text),
    spec("client email", FormFieldKind::Text),
    spec("client address", FormFieldKind::Text),
    spec("assignee", FormFieldKind::Person),
    spec("priority", FormFieldKind::Priority),
    spec("task type", FormFieldKind::Text),
    spec("notes", FormFieldKind::Text),
];

const USER_FIELDS: &[FormFieldSpec] = &[
    spec("username", FormFieldKind::Text),
    spec("email", FormFieldKind::Text),
    spec("first name", FormFieldKind::Text),
    spec("last name", FormFieldKind::Text),
    spec("phone", FormFieldKind::Text),
    spec("role", FormFieldKind::Role),
];

/// Roles an administrator can create accounts for, in cycling order.
pub const CREATABLE_ROLES: [Role; 4] = [
    Role::Inspector,
    Role::CallCenter,
    Role::CallCenterAdmin,
    Role::Admin,
];

impl FormPayload {
    pub fn kind(&self) -> FormKind {
        match self {
            Self::Appointment(_) => FormKind::Appointment,
            Self::Task(_) => FormKind::Task,
            Self::User(_) => FormKind::User,
        }
    }

    pub fn blank_for(kind: FormKind) -> Self {
        match kind {
            FormKind::Appointment => Self::Appointment(AppointmentFormInput {
                client_name: String::new(),
                client_phone: String::new(),
                client_email: String::new(),
                client_dni: String::new(),
                address: String::new(),
                inspector: None,
                scheduled_date: None,
                scheduled_time: String::new(),
                notes: String::new(),
            }),
            FormKind::Task => Self::Task(TaskFormInput {
                client_name: String::new(),
                client_phone: String::new(),
                client_email: String::new(),
                client_address: String::new(),
                assigned_to: None,
                priority: TaskPriority::Medium,
                task_type: String::new(),
                notes: String::new(),
                source_appointment: None,
            }),
            FormKind::User => Self::User(UserFormInput {
                username: String::new(),
                email: String::new(),
                first_name: String::new(),
                last_name: String::new(),
                phone: String::new(),
                role: Role::Inspector,
            }),
        }
    }

    pub fn fields(kind: FormKind) -> &'static [FormFieldSpec] {
        match kind {
            FormKind::Appointment => APPOINTMENT_FIELDS,
            FormKind::Task => TASK_FIELDS,
            FormKind::User => USER_FIELDS,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Appointment(appointment) => appointment.validate(),
            Self::Task(task) => task.validate(),
            Self::User(user) => user.validate(),
        }
    }

    /// Raw editable text of a field; person fields yield the user id.
    pub fn field_text(&self, index: usize) -> String {
        let date_text = |date: &Option<Date>| date.map(iso_date::format).unwrap_or_default();
        let person_text = |id: &Option<UserId>| {
            id.as_ref()
                .map(|id| id.as_str().to_owned())
                .unwrap_or_default()
        };
        match (self, index) {
            (Self::Appointment(input), 0) => input.client_name.clone(),
            (Self::Appointment(input), 1) => input.client_phone.clone(),
            (Self::Appointment(input), 2) => input.client_email.clone(),
            (Self::Appointment(input), 3) => input.client_dni.clone(),
            (Self::Appointment(input), 4) => input.address.clone(),
            (Self::Appointment(input), 5) => person_text(&input.inspector),
            (Self::Appointment(input), 6) => date_text(&input.scheduled_date),
            (Self::Appointment(input), 7) => input.scheduled_time.clone(),
            (Self::Appointment(input), 8) => input.notes.clone(),
            (Self::Task(input), 0) => input.client_name.clone(),
            (Self::Task(input), 1) => input.client_phone.clone(),
            (Self::Task(input), 2) => input.client_email.clone(),
            (Self::Task(input), 3) => input.client_address.clone(),
            (Self::Task(input), 4) => person_text(&input.assigned_to),
            (Self::Task(input), 5) => input.priority.label().to_owned(),
            (Self::Task(input), 6) => input.task_type.clone(),
            (Self::Task(input), 7) => input.notes.clone(),
            (Self::User(input), 0) => input.username.clone(),
            (Self::User(input), 1) => input.email.clone(),
            (Self::User(input), 2) => input.first_name.clone(),
            (Self::User(input), 3) => input.last_name.clone(),
            (Self::User(input), 4) => input.phone.clone(),
            (Self::User(input), 5) => input.role.label().to_owned(),
            _ => String::new(),
        }
    }

    pub fn set_field_text(&mut self, index: usize, raw: &str) -> Result<()> {
        let value = raw.trim().to_owned();
        let kind = self.kind();
        let Some(field) = Self::fields(kind).get(index) else {
            bail!("{} form has no field {}", kind.label(), index + 1);
        };
        match field.kind {
            FormFieldKind::Person | FormFieldKind::Priority | FormFieldKind::Role => {
                bail!("{} is picked from a list -- press space to cycle", field.label);
            }
            FormFieldKind::Date if !value.is_empty() && iso_date::parse(&value).is_none() => {
                bail!("{} must be a date like 2025-03-15 -- fix the date and retry", field.label);
            }
            FormFieldKind::Time if !value.is_empty() && !is_clock_time(&value) => {
                bail!("{} must be a time like 09:00 -- fix the time and retry", field.label);
            }
            _ => {}
        }
        match (self, index) {
            (Self::Appointment(input), 0) => input.client_name = value,
            (Self::Appointment(input), 1) => input.client_phone = value,
            (Self::Appointment(input), 2) => input.client_email = value,
            (Self::Appointment(input), 3) => input.client_dni = value,
            (Self::Appointment(input), 4) => input.address = value,
            (Self::Appointment(input), 6) => input.scheduled_date = iso_date::parse(&value),
            (Self::Appointment(input), 7) => input.scheduled_time = value,
            (Self::Appointment(input), 8) => input.notes = value,
            (Self::Task(input), 0) => input.client_name = value,
            (Self::Task(input), 1) => input.client_phone = value,
            (Self::Task(input), 2) => input.client_email = value,
            (Self::Task(input), 3) => input.client_address = value,
            (Self::Task(input), 6) => input.task_type = value,
            (Self::Task(input), 7) => input.notes = value,
            (Self::User(input), 0) => input.username = value,
            (Self::User(input), 1) => input.email = value,
            (Self::User(input), 2) => input.first_name = value,
            (Self::User(input), 3) => input.last_name = value,
            (Self::User(input), 4) => input.phone = value,
            _ => bail!("form field mismatch -- reopen the form"),
        }
        Ok(())
    }

    /// Steps a list-backed field. Person fields walk `people` in order and
    /// wrap through "unassigned".
    pub fn cycle_field(&mut self, index: usize, delta: isize, people: &[UserAccount]) -> Result<()> {
        match (self, index) {
            (Self::Appointment(input), 5) => input.inspector = cycle_person(&input.inspector, delta, people),
            (Self::Task(input), 4) => input.assigned_to = cycle_person(&input.assigned_to, delta, people),
            (Self::Task(input), 5) => input.priority = input.priority.cycle(delta),
            (Self::User(input), 5) => {
                let current = CREATABLE_ROLES
                    .iter()
                    .position(|role| *role == input.role)
                    .unwrap_or(0) as isize;
                let next = (current + delta).rem_euclid(CREATABLE_ROLES.len() as isize) as usize;
                input.role = CREATABLE_ROLES[next];
            }
            _ => bail!("field {} has no choices", index + 1),
        }
        Ok(())
    }
}

fn cycle_person(current: &Option<UserId>, delta: isize, people: &[UserAccount]) -> Option<UserId> {
    if people.is_empty() {
        return None;
    }
    // Slot 0 is "unassigned"; slots 1..=len are people.
    let slots = people.len() as isize + 1;
    let position = current
        .as_ref()
        .and_then(|id| people.iter().position(|person| person.id == *id))
        .map_or(0, |index| index as isize + 1);
    let next = (position + delta).rem_euclid(slots);
    if next == 0 {
        None
    } else {
        Some(people[next as usize - 1].id.clone())
    }
}

/// `HH:MM` on a 24-hour clock; trailing seconds are tolerated.
pub fn is_clock_time(value: &str) -> bool {
    let Some((hour, rest)) = value.split_once(':') else {
        return false;
    };
    let hour_ok = hour.len() <= 2 && hour.parse::<u8>().is_ok_and(|hour| hour < 24);
    let minute_ok = rest
        .get(..2)
        .and_then(|minute| minute.parse::<u8>().ok())
        .is_some_and(|minute| minute < 60);
    hour_ok && minute_ok
}

impl LoginFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            bail!("username is required -- enter your username and retry");
        }
        if self.password.is_empty() {
            bail!("password is required -- enter your password and retry");
        }
        Ok(())
    }
}

impl AppointmentFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            bail!("client name is required -- enter a name and retry");
        }
        if self.client_phone.trim().is_empty() {
            bail!("client phone is required -- enter a phone number and retry");
        }
        if self.address.trim().is_empty() {
            bail!("appointment address is required -- enter an address and retry");
        }
        if self.inspector.is_none() {
            bail!("inspector is required -- choose an inspector and retry");
        }
        if self.scheduled_date.is_none() {
            bail!("appointment date is required -- pick a date and retry");
        }
        if !is_clock_time(&self.scheduled_time) {
            bail!("appointment time must look like 09:00 -- fix the time and retry");
        }
        Ok(())
    }
}

impl TaskFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            bail!("task client name is required -- enter a name and retry");
        }
        if self.assigned_to.is_none() {
            bail!("task assignee is required -- choose a call-center agent and retry");
        }
        Ok(())
    }
}

impl UserFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            bail!("username is required -- enter a username and retry");
        }
        if !self.email.contains('@') {
            bail!("user email is invalid -- enter an address like name@example.com and retry");
        }
        Ok(())
    }
}

impl RescheduleInput {
    pub fn validate(&self) -> Result<()> {
        if !is_clock_time(&self.scheduled_time) {
            bail!("reschedule time is required -- pick an hour on the calendar and retry");
        }
        Ok(())
    }
}
