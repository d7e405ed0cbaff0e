// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AppRuntime, InternalEvent, ViewData, sign_in};
use anyhow::{Result, anyhow};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use inspecta_api::ApiError;
use inspecta_app::{
    AppState, Appointment, AppointmentId, AppointmentStatus, FormPayload, InspectionId,
    LoginFormInput, OnacFormGateway, RescheduleInput, Role, ScheduleMonth, ScheduleQuery,
    Session, Task, TaskId, TaskPriority, TaskStatus, UserAccount, UserId, ViewMode,
};
use inspecta_testkit::{
    FakeGateway, empty_month, march_2025_schedule, march_2025_today, session_user,
};
use serde_json::{Map, Value};
use std::sync::mpsc;
use time::{Date, Month};

pub(crate) struct TestRuntime {
    pub(crate) role: Role,
    pub(crate) session: Option<Session>,
    pub(crate) login_attempts: usize,
    pub(crate) logged_out: bool,
    pub(crate) unauthorized: bool,
    pub(crate) appointments: Vec<Appointment>,
    pub(crate) tasks: Vec<Task>,
    pub(crate) users: Vec<UserAccount>,
    pub(crate) inspectors: Vec<UserAccount>,
    pub(crate) agents: Vec<UserAccount>,
    pub(crate) schedule_queries: Vec<ScheduleQuery>,
    pub(crate) schedule_error: Option<String>,
    pub(crate) status_updates: Vec<(AppointmentId, AppointmentStatus)>,
    pub(crate) task_updates: Vec<(TaskId, TaskStatus)>,
    pub(crate) user_updates: Vec<(UserId, bool)>,
    pub(crate) reschedules: Vec<RescheduleInput>,
    pub(crate) submitted: Vec<FormPayload>,
    pub(crate) gateway: FakeGateway,
    pub(crate) today: Date,
    pub(crate) now_millis: i64,
}

impl Default for TestRuntime {
    fn default() -> Self {
        Self {
            role: Role::CallCenter,
            session: None,
            login_attempts: 0,
            logged_out: false,
            unauthorized: false,
            appointments: Vec::new(),
            tasks: Vec::new(),
            users: Vec::new(),
            inspectors: Vec::new(),
            agents: Vec::new(),
            schedule_queries: Vec::new(),
            schedule_error: None,
            status_updates: Vec::new(),
            task_updates: Vec::new(),
            user_updates: Vec::new(),
            reschedules: Vec::new(),
            submitted: Vec::new(),
            gateway: FakeGateway::default(),
            today: march_2025_today(),
            now_millis: 1_741_600_000_000,
        }
    }
}

impl TestRuntime {
    pub(crate) fn sample_task(id: &str, status: TaskStatus) -> Task {
        Task {
            id: TaskId::new(id),
            client_name: "Ana Ruiz".to_owned(),
            client_phone: "3001234567".to_owned(),
            client_email: String::new(),
            client_address: "Carrera 5 #10-20".to_owned(),
            task_type: "follow-up call".to_owned(),
            status,
            priority: TaskPriority::High,
            notes: String::new(),
            call_attempts: 2,
            last_inspection_date: None,
            next_inspection_due: Date::from_calendar_date(2025, Month::April, 1).ok(),
            assigned_to: None,
            assigned_to_name: String::new(),
        }
    }

    fn session(&self) -> Session {
        Session {
            token: "tok-123".to_owned(),
            user: session_user(self.role),
        }
    }

    fn guard(&self) -> Result<()> {
        if self.unauthorized {
            return Err(anyhow::Error::new(ApiError::Unauthorized));
        }
        Ok(())
    }
}

impl OnacFormGateway for TestRuntime {
    fn fetch_onac_form(&mut self, inspection_id: &InspectionId) -> Result<Map<String, Value>> {
        self.guard()?;
        self.gateway.fetch_onac_form(inspection_id)
    }

    fn patch_onac_form(
        &mut self,
        inspection_id: &InspectionId,
        payload: &Map<String, Value>,
    ) -> Result<()> {
        self.guard()?;
        self.gateway.patch_onac_form(inspection_id, payload)
    }
}

impl AppRuntime for TestRuntime {
    fn restore_session(&mut self) -> Result<Option<Session>> {
        Ok(self.session.clone())
    }

    fn login(&mut self, input: &LoginFormInput) -> Result<Session> {
        self.login_attempts += 1;
        if input.password != "secret" {
            return Err(anyhow::Error::new(ApiError::Rejected {
                status: 401,
                message: "invalid username or password".to_owned(),
            }));
        }
        let session = self.session();
        self.session = Some(session.clone());
        Ok(session)
    }

    fn logout(&mut self) -> Result<()> {
        self.logged_out = true;
        self.session = None;
        Ok(())
    }

    fn expire_session(&mut self) -> Result<()> {
        self.session = None;
        Ok(())
    }

    fn load_appointments(&mut self) -> Result<Vec<Appointment>> {
        self.guard()?;
        Ok(self.appointments.clone())
    }

    fn update_appointment_status(
        &mut self,
        appointment: &AppointmentId,
        status: AppointmentStatus,
    ) -> Result<()> {
        self.guard()?;
        self.status_updates.push((appointment.clone(), status));
        for row in &mut self.appointments {
            if row.id == *appointment {
                row.status = status;
            }
        }
        Ok(())
    }

    fn reschedule_appointment(&mut self, input: &RescheduleInput) -> Result<()> {
        self.guard()?;
        self.reschedules.push(input.clone());
        for row in &mut self.appointments {
            if row.id == input.appointment_id {
                row.scheduled_date = Some(input.scheduled_date);
                row.scheduled_time = input.scheduled_time.clone();
                row.status = AppointmentStatus::Rescheduled;
            }
        }
        Ok(())
    }

    fn submit_form(&mut self, payload: &FormPayload) -> Result<()> {
        self.guard()?;
        self.submitted.push(payload.clone());
        Ok(())
    }

    fn load_schedule(&mut self, query: &ScheduleQuery) -> Result<ScheduleMonth> {
        self.guard()?;
        self.schedule_queries.push(query.clone());
        if let Some(message) = &self.schedule_error {
            return Err(anyhow!(message.clone()));
        }
        if query.year == 2025 && query.month == Month::March {
            return Ok(march_2025_schedule());
        }
        Ok(empty_month(query.year, query.month, Some(self.today)))
    }

    fn load_users(&mut self, role: Option<Role>) -> Result<Vec<UserAccount>> {
        self.guard()?;
        Ok(match role {
            Some(Role::Inspector) => self.inspectors.clone(),
            Some(Role::CallCenter) => self.agents.clone(),
            Some(role) => self
                .users
                .iter()
                .filter(|user| user.role == role)
                .cloned()
                .collect(),
            None => self.users.clone(),
        })
    }

    fn load_tasks(&mut self) -> Result<Vec<Task>> {
        self.guard()?;
        Ok(self.tasks.clone())
    }

    fn update_task_status(&mut self, task: &TaskId, status: TaskStatus) -> Result<()> {
        self.guard()?;
        self.task_updates.push((task.clone(), status));
        for row in &mut self.tasks {
            if row.id == *task {
                row.status = status;
            }
        }
        Ok(())
    }

    fn set_user_active(&mut self, user: &UserId, active: bool) -> Result<()> {
        self.guard()?;
        self.user_updates.push((user.clone(), active));
        for row in &mut self.users {
            if row.id == *user {
                row.is_active = active;
            }
        }
        Ok(())
    }

    fn today(&self) -> Date {
        self.today
    }

    fn now_millis(&self) -> i64 {
        self.now_millis
    }
}

pub(crate) fn internal_tx() -> mpsc::Sender<InternalEvent> {
    let (tx, _rx) = mpsc::channel();
    tx
}

pub(crate) fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

pub(crate) fn ctrl(ch: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
}

pub(crate) fn shift(ch: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(ch), KeyModifiers::SHIFT)
}

/// A session for `role` already past the login screen.
pub(crate) fn signed_in(runtime: &mut TestRuntime, role: Role) -> (AppState, ViewData) {
    runtime.role = role;
    let session = runtime.session();
    runtime.session = Some(session.clone());
    let mut state = AppState::default();
    let mut view_data = ViewData::new(ViewMode::Month);
    sign_in(&mut state, runtime, &mut view_data, &internal_tx(), session);
    (state, view_data)
}
