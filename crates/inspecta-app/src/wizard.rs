// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::Duration;

use anyhow::{Result, bail};
use serde_json::{Map, Value};

use crate::catalog::Catalog;
use crate::ids::InspectionId;
use crate::onac::{InspectionForm, STEP_COUNT, percentage_for_step};

/// Transient form messages disappear after this long.
pub const MESSAGE_TTL: Duration = Duration::from_secs(4);
/// Delay between a successful completion and handing control back.
pub const COMPLETION_DELAY: Duration = Duration::from_millis(1500);

pub const COMPLETED_STATUS: &str = "COMPLETED";

/// Where partial saves of the inspection form land.
pub trait OnacFormGateway {
    fn fetch_onac_form(&mut self, inspection_id: &InspectionId) -> Result<Map<String, Value>>;
    fn patch_onac_form(
        &mut self,
        inspection_id: &InspectionId,
        payload: &Map<String, Value>,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormMessage {
    pub text: String,
    pub kind: MessageKind,
    pub token: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardPhase {
    Loading,
    Editing,
    /// The saved snapshot never arrived; nothing may be written back.
    LoadFailed,
    Completed,
}

#[derive(Debug, Clone)]
pub struct OnacWizard {
    inspection_id: InspectionId,
    catalog: Catalog,
    form: InspectionForm,
    step: u8,
    phase: WizardPhase,
    message: Option<FormMessage>,
    next_token: u64,
}

impl OnacWizard {
    pub fn new(inspection_id: InspectionId, catalog: Catalog) -> Self {
        Self {
            inspection_id,
            catalog,
            form: InspectionForm::default(),
            step: 1,
            phase: WizardPhase::Loading,
            message: None,
            next_token: 0,
        }
    }

    pub fn inspection_id(&self) -> &InspectionId {
        &self.inspection_id
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn form(&self) -> &InspectionForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut InspectionForm {
        &mut self.form
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn phase(&self) -> WizardPhase {
        self.phase
    }

    pub fn message(&self) -> Option<&FormMessage> {
        self.message.as_ref()
    }

    pub fn is_last_step(&self) -> bool {
        self.step == STEP_COUNT
    }

    pub fn progress_percent(&self) -> u32 {
        percentage_for_step(self.step)
    }

    /// Clears the message only when it is still the one `token` refers to.
    pub fn dismiss_message(&mut self, token: u64) -> bool {
        if self.message.as_ref().is_some_and(|message| message.token == token) {
            self.message = None;
            return true;
        }
        false
    }

    pub fn show_message(&mut self, text: impl Into<String>, kind: MessageKind) -> u64 {
        self.next_token += 1;
        self.message = Some(FormMessage {
            text: text.into(),
            kind,
            token: self.next_token,
        });
        self.next_token
    }

    /// Fetches the saved snapshot and resumes at its step. On failure the
    /// wizard refuses to save so blank defaults never overwrite saved
    /// progress.
    pub fn load<G: OnacFormGateway + ?Sized>(&mut self, gateway: &mut G) -> Result<()> {
        self.phase = WizardPhase::Loading;
        let fetched = gateway
            .fetch_onac_form(&self.inspection_id)
            .and_then(|snapshot| InspectionForm::from_snapshot(&snapshot));
        match fetched {
            Ok(form) => {
                self.phase = WizardPhase::Editing;
                self.step = form.current_step;
                self.form = form;
                tracing::info!(inspection = %self.inspection_id, step = self.step, "inspection form loaded");
                Ok(())
            }
            Err(error) => {
                self.phase = WizardPhase::LoadFailed;
                tracing::warn!(inspection = %self.inspection_id, error = %format!("{error:#}"), "inspection form load failed");
                self.show_message(
                    format!("could not load the inspection form: {error:#}"),
                    MessageKind::Error,
                );
                Err(error)
            }
        }
    }

    /// Persists the current step and advances on success. The step never
    /// moves past the last one; saving there just persists.
    pub fn next<G: OnacFormGateway + ?Sized>(&mut self, gateway: &mut G) -> Result<bool> {
        self.ensure_editing()?;
        let payload = self.progress_payload()?;
        if let Err(error) = self.persist(gateway, &payload) {
            self.show_message(
                format!("could not save progress: {error:#}"),
                MessageKind::Error,
            );
            return Err(error);
        }
        self.show_message("progress saved", MessageKind::Success);
        let advanced = self.step < STEP_COUNT;
        if advanced {
            self.step += 1;
            self.form.current_step = self.step;
        }
        Ok(advanced)
    }

    pub fn previous(&mut self) -> bool {
        if self.step <= 1 {
            return false;
        }
        self.step -= 1;
        self.form.current_step = self.step;
        true
    }

    /// Validates, then persists the final step with the completed status.
    pub fn complete<G: OnacFormGateway + ?Sized>(&mut self, gateway: &mut G) -> Result<()> {
        self.ensure_editing()?;
        if !self.is_last_step() {
            bail!("finish step {STEP_COUNT} before completing the inspection");
        }
        if let Err(error) = self.form.validate_for_completion() {
            self.show_message(error.to_string(), MessageKind::Error);
            return Err(error);
        }
        let mut payload = self.progress_payload()?;
        payload.insert("form_completed_percentage".to_owned(), Value::from(100));
        payload.insert("status".to_owned(), Value::from(COMPLETED_STATUS));
        if let Err(error) = self.persist(gateway, &payload) {
            self.show_message(
                format!("could not complete the inspection: {error:#}"),
                MessageKind::Error,
            );
            return Err(error);
        }
        self.form.form_completed_percentage = 100;
        self.phase = WizardPhase::Completed;
        self.show_message("inspection completed successfully", MessageKind::Success);
        tracing::info!(inspection = %self.inspection_id, "inspection completed");
        Ok(())
    }

    fn ensure_editing(&self) -> Result<()> {
        match self.phase {
            WizardPhase::Editing => Ok(()),
            WizardPhase::Loading => bail!("inspection form is still loading -- wait and retry"),
            WizardPhase::LoadFailed => {
                bail!("inspection form did not load -- close it and reload the form before saving")
            }
            WizardPhase::Completed => bail!("inspection is already completed"),
        }
    }

    fn progress_payload(&self) -> Result<Map<String, Value>> {
        let mut payload = self.form.step_payload(self.step)?;
        payload.insert("current_step".to_owned(), Value::from(self.step));
        payload.insert(
            "form_completed_percentage".to_owned(),
            Value::from(percentage_for_step(self.step)),
        );
        Ok(payload)
    }

    fn persist<G: OnacFormGateway + ?Sized>(
        &self,
        gateway: &mut G,
        payload: &Map<String, Value>,
    ) -> Result<()> {
        tracing::debug!(inspection = %self.inspection_id, step = self.step, keys = payload.len(), "saving inspection step");
        gateway.patch_onac_form(&self.inspection_id, payload)
    }
}
