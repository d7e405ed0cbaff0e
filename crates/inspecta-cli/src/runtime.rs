// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use inspecta_api::Client;
use inspecta_app::{
    Appointment, AppointmentId, AppointmentStatus, FormPayload, InspectionId, LoginFormInput,
    OnacFormGateway, RescheduleInput, Role, ScheduleMonth, ScheduleQuery, Session,
    SessionContext, SessionStore, Task, TaskId, TaskStatus, UserAccount, UserId,
};
use serde_json::{Map, Value};

/// Backs the terminal UI with the REST client. The session context is the
/// only source of the bearer token.
pub struct ApiRuntime<S: SessionStore> {
    client: Client,
    session: SessionContext<S>,
}

impl<S: SessionStore> ApiRuntime<S> {
    pub fn new(mut client: Client, session: SessionContext<S>) -> Self {
        client.set_bearer(session.token().map(str::to_owned));
        Self { client, session }
    }

    fn forget_session(&mut self) -> Result<()> {
        self.client.set_bearer(None);
        self.session.clear()
    }
}

impl<S: SessionStore> OnacFormGateway for ApiRuntime<S> {
    fn fetch_onac_form(&mut self, inspection_id: &InspectionId) -> Result<Map<String, Value>> {
        self.client.onac_form(inspection_id)
    }

    fn patch_onac_form(
        &mut self,
        inspection_id: &InspectionId,
        payload: &Map<String, Value>,
    ) -> Result<()> {
        self.client.save_onac_form(inspection_id, payload)
    }
}

impl<S: SessionStore> inspecta_tui::AppRuntime for ApiRuntime<S> {
    fn restore_session(&mut self) -> Result<Option<Session>> {
        let session = self.session.get().cloned();
        self.client
            .set_bearer(session.as_ref().map(|session| session.token.clone()));
        Ok(session)
    }

    fn login(&mut self, input: &LoginFormInput) -> Result<Session> {
        let session = self.client.login(input)?;
        self.session.set(session.clone())?;
        self.client.set_bearer(Some(session.token.clone()));
        Ok(session)
    }

    fn logout(&mut self) -> Result<()> {
        if self.client.has_bearer()
            && let Err(error) = self.client.logout()
        {
            tracing::warn!(error = %format!("{error:#}"), "backend sign out failed; clearing local session anyway");
        }
        self.forget_session()
    }

    fn expire_session(&mut self) -> Result<()> {
        tracing::info!("session expired; clearing stored token");
        self.forget_session()
    }

    fn load_appointments(&mut self) -> Result<Vec<Appointment>> {
        self.client.list_appointments()
    }

    fn update_appointment_status(
        &mut self,
        appointment: &AppointmentId,
        status: AppointmentStatus,
    ) -> Result<()> {
        self.client.update_appointment_status(appointment, status)
    }

    fn reschedule_appointment(&mut self, input: &RescheduleInput) -> Result<()> {
        input.validate()?;
        self.client.reschedule_appointment(input)
    }

    fn submit_form(&mut self, payload: &FormPayload) -> Result<()> {
        payload.validate()?;

        match payload {
            FormPayload::Appointment(input) => self.client.create_appointment(input),
            FormPayload::Task(input) => self.client.create_task(input),
            FormPayload::User(input) => self.client.create_user(input),
        }
    }

    fn load_schedule(&mut self, query: &ScheduleQuery) -> Result<ScheduleMonth> {
        self.client.inspector_schedule(query)
    }

    fn load_users(&mut self, role: Option<Role>) -> Result<Vec<UserAccount>> {
        self.client.list_users(role)
    }

    fn load_tasks(&mut self) -> Result<Vec<Task>> {
        self.client.list_tasks()
    }

    fn update_task_status(&mut self, task: &TaskId, status: TaskStatus) -> Result<()> {
        self.client.update_task_status(task, status)
    }

    fn set_user_active(&mut self, user: &UserId, active: bool) -> Result<()> {
        self.client.set_user_active(user, active)
    }
}
