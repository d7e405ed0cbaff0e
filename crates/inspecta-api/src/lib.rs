// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod error;

pub use error::{ApiError, is_unauthorized, server_message};

use anyhow::{Context, Result, bail};
use inspecta_app::{
    Appointment, AppointmentFormInput, AppointmentId, AppointmentStatus, InspectionId,
    LoginFormInput, OnacFormGateway, RescheduleInput, Role, ScheduleMonth, ScheduleQuery,
    ScheduleTarget, Session, SessionUser, Task, TaskFormInput, TaskId, TaskStatus, UserAccount,
    UserFormInput, UserId, wire,
};
use reqwest::Method;
use reqwest::blocking::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::time::Duration;
use url::Url;

/// Keys list endpoints wrap their array in, in lookup order.
const LIST_KEYS: [&str; 7] = [
    "appointments",
    "tasks",
    "users",
    "inspectors",
    "call_centers",
    "results",
    "data",
];

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
    bearer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default, deserialize_with = "wire::text")]
    token: String,
    user: SessionUser,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("api.base_url must not be empty");
        }
        Url::parse(&base_url).with_context(|| {
            format!(
                "api.base_url {base_url:?} is not a URL -- use something like http://localhost:8000/api"
            )
        })?;

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
            bearer: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Token sent as `Authorization: Bearer` on every later call.
    pub fn set_bearer(&mut self, token: Option<String>) {
        self.bearer = token.filter(|token| !token.trim().is_empty());
    }

    pub fn has_bearer(&self) -> bool {
        self.bearer.is_some()
    }

    pub fn login(&self, input: &LoginFormInput) -> Result<Session> {
        input.validate()?;
        let body = json!({ "username": input.username.trim(), "password": input.password });
        let value = self
            .request(Method::POST, self.endpoint("auth/login/")?, Some(&body), false)
            .map_err(|error| match error {
                ApiError::Unauthorized => ApiError::Rejected {
                    status: 401,
                    message: "invalid username or password".to_owned(),
                },
                other => other,
            })
            .context("sign in")?;

        let parsed: LoginResponse = decode("login response", value)?;
        if parsed.token.is_empty() {
            bail!("login response carried no token -- check the backend auth configuration");
        }
        tracing::info!(user = %parsed.user.username, role = parsed.user.role.as_str(), "signed in");
        Ok(Session {
            token: parsed.token,
            user: parsed.user,
        })
    }

    /// Tells the backend the token is done. Callers clear local state
    /// whether or not this succeeds.
    pub fn logout(&self) -> Result<()> {
        self.request(Method::POST, self.endpoint("auth/logout/")?, Some(&json!({})), true)
            .context("sign out")?;
        Ok(())
    }

    pub fn inspector_schedule(&self, query: &ScheduleQuery) -> Result<ScheduleMonth> {
        let path = match &query.target {
            ScheduleTarget::Own => "appointments/inspector-schedule/".to_owned(),
            ScheduleTarget::Inspector(id) => format!("appointments/inspector-schedule/{id}/"),
        };
        let mut url = self.endpoint(&path)?;
        url.query_pairs_mut()
            .append_pair("month", &u8::from(query.month).to_string())
            .append_pair("year", &query.year.to_string());

        let value = self
            .request::<Value>(Method::GET, url, None, true)
            .with_context(|| format!("load schedule for {} {}", query.month, query.year))?;
        decode("schedule", unwrap_data(value))
    }

    pub fn onac_form(&self, inspection_id: &InspectionId) -> Result<Map<String, Value>> {
        let url = self.onac_url(inspection_id)?;
        let value = self
            .request::<Value>(Method::GET, url, None, true)
            .with_context(|| format!("load inspection form {inspection_id}"))?;
        match unwrap_data(value) {
            Value::Object(snapshot) => Ok(snapshot),
            other => Err(ApiError::Decode {
                what: "inspection form",
                detail: format!("expected an object, got {}", kind_of(&other)),
            }
            .into()),
        }
    }

    pub fn save_onac_form(
        &self,
        inspection_id: &InspectionId,
        payload: &Map<String, Value>,
    ) -> Result<()> {
        let url = self.onac_url(inspection_id)?;
        self.request(Method::PATCH, url, Some(payload), true)
            .with_context(|| format!("save inspection form {inspection_id}"))?;
        Ok(())
    }

    pub fn list_appointments(&self) -> Result<Vec<Appointment>> {
        self.list("appointments/", "appointments")
    }

    pub fn create_appointment(&self, input: &AppointmentFormInput) -> Result<()> {
        input.validate()?;
        self.request(Method::POST, self.endpoint("appointments/")?, Some(input), true)
            .context("create appointment")?;
        Ok(())
    }

    pub fn update_appointment_status(
        &self,
        id: &AppointmentId,
        status: AppointmentStatus,
    ) -> Result<()> {
        let url = self.endpoint(&format!("appointments/{id}/"))?;
        self.request(Method::PATCH, url, Some(&json!({ "status": status })), true)
            .with_context(|| format!("mark appointment {id} {}", status.label()))?;
        Ok(())
    }

    pub fn reschedule_appointment(&self, input: &RescheduleInput) -> Result<()> {
        input.validate()?;
        let url = self.endpoint(&format!("appointments/{}/", input.appointment_id))?;
        self.request(Method::PATCH, url, Some(input), true)
            .with_context(|| format!("reschedule appointment {}", input.appointment_id))?;
        Ok(())
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        self.list("appointments/tasks/", "tasks")
    }

    pub fn create_task(&self, input: &TaskFormInput) -> Result<()> {
        input.validate()?;
        self.request(Method::POST, self.endpoint("appointments/tasks/")?, Some(input), true)
            .context("create task")?;
        Ok(())
    }

    pub fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<()> {
        let url = self.endpoint(&format!("appointments/tasks/{id}/"))?;
        self.request(Method::PATCH, url, Some(&json!({ "status": status })), true)
            .with_context(|| format!("update task {id}"))?;
        Ok(())
    }

    pub fn list_users(&self, role: Option<Role>) -> Result<Vec<UserAccount>> {
        let mut url = self.endpoint("auth/admin/users/")?;
        if let Some(role) = role {
            url.query_pairs_mut().append_pair("role", role.as_str());
        }
        let value = self
            .request::<Value>(Method::GET, url, None, true)
            .context("load users")?;
        decode_list("users", value)
    }

    pub fn create_user(&self, input: &UserFormInput) -> Result<()> {
        input.validate()?;
        self.request(Method::POST, self.endpoint("auth/admin/users/")?, Some(input), true)
            .with_context(|| format!("create user {}", input.username.trim()))?;
        Ok(())
    }

    pub fn set_user_active(&self, id: &UserId, active: bool) -> Result<()> {
        let url = self.endpoint(&format!("auth/admin/users/{id}/"))?;
        self.request(Method::PATCH, url, Some(&json!({ "is_active": active })), true)
            .with_context(|| {
                let verb = if active { "activate" } else { "deactivate" };
                format!("{verb} user {id}")
            })?;
        Ok(())
    }

    fn list<T: DeserializeOwned>(&self, path: &str, what: &'static str) -> Result<Vec<T>> {
        let value = self
            .request::<Value>(Method::GET, self.endpoint(path)?, None, true)
            .with_context(|| format!("load {what}"))?;
        decode_list(what, value)
    }

    fn onac_url(&self, inspection_id: &InspectionId) -> Result<Url> {
        self.endpoint(&format!("inspections/inspections/{inspection_id}/onac_form/"))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&raw).with_context(|| format!("build request URL {raw:?}"))
    }

    fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        authorized: bool,
    ) -> std::result::Result<Value, ApiError> {
        tracing::debug!(%method, path = url.path(), "api request");
        let mut builder = self.http.request(method.clone(), url.clone());
        if authorized && let Some(token) = &self.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().map_err(|error| {
            tracing::warn!(%method, path = url.path(), %error, "api unreachable");
            connection_error(&self.base_url, error)
        })?;

        let status = response.status();
        let text = response.text().unwrap_or_default();
        if !status.is_success() {
            tracing::warn!(%method, path = url.path(), status = status.as_u16(), "api rejected request");
            return Err(ApiError::from_status(status, &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_str(&text).map_err(|error| ApiError::Decode {
            what: "response body",
            detail: error.to_string(),
        })?;
        if value.get("success").and_then(Value::as_bool) == Some(false) {
            let message = error::message_from_value(&value)
                .unwrap_or_else(|| "the backend gave no reason".to_owned());
            return Err(ApiError::Unsuccessful(message));
        }
        Ok(value)
    }
}

impl OnacFormGateway for Client {
    fn fetch_onac_form(&mut self, inspection_id: &InspectionId) -> Result<Map<String, Value>> {
        self.onac_form(inspection_id)
    }

    fn patch_onac_form(
        &mut self,
        inspection_id: &InspectionId,
        payload: &Map<String, Value>,
    ) -> Result<()> {
        self.save_onac_form(inspection_id, payload)
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> ApiError {
    ApiError::Transport {
        base_url: base_url.to_owned(),
        source: error,
    }
}

/// Strips the `{success, data}` envelope when present.
fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut object) if object.contains_key("success") && object.contains_key("data") => {
            object.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Finds the array in either a bare list or one of the wrapping objects the
/// backend uses, looking one level into `data`.
fn extract_list(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut object) => {
            for key in LIST_KEYS {
                match object.remove(key) {
                    Some(Value::Array(items)) => return Some(items),
                    Some(nested @ Value::Object(_)) => {
                        if let Some(items) = extract_list(nested) {
                            return Some(items);
                        }
                    }
                    _ => {}
                }
            }
            None
        }
        _ => None,
    }
}

fn decode_list<T: DeserializeOwned>(what: &'static str, value: Value) -> Result<Vec<T>> {
    let Some(items) = extract_list(value) else {
        return Err(ApiError::Decode {
            what,
            detail: "no list found in response".to_owned(),
        }
        .into());
    };
    let decoded = wire::list(Value::Array(items)).map_err(|error| ApiError::Decode {
        what,
        detail: error.to_string(),
    })?;
    Ok(decoded)
}

fn decode<T: DeserializeOwned>(what: &'static str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|error| {
        anyhow::Error::new(ApiError::Decode {
            what,
            detail: error.to_string(),
        })
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::{Client, extract_list, unwrap_data};
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn new_rejects_empty_and_relative_urls() {
        assert!(Client::new("  ", Duration::from_secs(1)).is_err());
        let error = Client::new("localhost/api", Duration::from_secs(1))
            .expect_err("relative url should fail");
        assert!(error.to_string().contains("http://localhost:8000/api"));
    }

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let client =
            Client::new("http://localhost:8000/api/", Duration::from_secs(1)).expect("client");
        let url = client.endpoint("/appointments/").expect("url");
        assert_eq!(url.as_str(), "http://localhost:8000/api/appointments/");
    }

    #[test]
    fn blank_bearer_is_ignored() {
        let mut client =
            Client::new("http://localhost:8000/api", Duration::from_secs(1)).expect("client");
        client.set_bearer(Some(" ".to_owned()));
        assert!(!client.has_bearer());
        client.set_bearer(Some("abc".to_owned()));
        assert!(client.has_bearer());
    }

    #[test]
    fn list_envelopes() {
        assert_eq!(extract_list(json!([1, 2])), Some(vec![json!(1), json!(2)]));
        assert_eq!(extract_list(json!({"tasks": [1]})), Some(vec![json!(1)]));
        assert_eq!(
            extract_list(json!({"success": true, "data": {"inspectors": [3]}})),
            Some(vec![json!(3)])
        );
        assert_eq!(extract_list(json!({"count": 0})), None);
        assert_eq!(extract_list(json!("text")), None);
    }

    #[test]
    fn data_envelope_is_unwrapped_only_with_success() {
        assert_eq!(
            unwrap_data(json!({"success": true, "data": {"a": 1}})),
            json!({"a": 1})
        );
        assert_eq!(unwrap_data(json!({"data": 1})), json!({"data": 1}));
    }
}
