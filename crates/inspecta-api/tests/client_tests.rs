// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use inspecta_api::{ApiError, Client, is_unauthorized};
use inspecta_app::{
    AppointmentStatus, Catalog, InspectionId, LoginFormInput, OnacWizard, Role, ScheduleQuery,
    ScheduleTarget, TaskId, TaskStatus, UserId,
};
use inspecta_testkit::{march_2025_schedule, onac_snapshot, schedule_json};
use serde_json::{Value, json};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use time::Month;
use tiny_http::{Header, Method, Request, Response, Server};

/// What the mock saw for one request.
#[derive(Debug)]
struct Seen {
    method: Method,
    url: String,
    bearer: Option<String>,
    body: String,
}

fn json_response(status: u16, body: &Value) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        )
}

fn observe(request: &mut Request) -> Seen {
    let mut body = String::new();
    request
        .as_reader()
        .read_to_string(&mut body)
        .expect("request body should read");
    let bearer = request
        .headers()
        .iter()
        .find(|header| header.field.equiv("Authorization"))
        .map(|header| header.value.as_str().to_owned());
    Seen {
        method: request.method().clone(),
        url: request.url().to_owned(),
        bearer,
        body,
    }
}

/// Serves one canned reply per entry and hands back what each request
/// looked like.
fn serve(replies: Vec<(u16, Value)>) -> Result<(String, JoinHandle<Vec<Seen>>)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}/api", server.server_addr());
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in replies {
            let mut request = server.recv().expect("request expected");
            seen.push(observe(&mut request));
            request
                .respond(json_response(status, &body))
                .expect("response should succeed");
        }
        seen
    });
    Ok((addr, handle))
}

fn client(addr: &str) -> Result<Client> {
    let mut client = Client::new(addr, Duration::from_secs(2))?;
    client.set_bearer(Some("tok-123".to_owned()));
    Ok(client)
}

#[test]
fn unreachable_backend_names_the_config_key() {
    let client =
        Client::new("http://127.0.0.1:1/api", Duration::from_millis(50)).expect("client");
    let error = client
        .list_appointments()
        .expect_err("unreachable backend should fail");
    let message = format!("{error:#}");
    assert!(message.contains("base_url"), "{message}");
    assert!(matches!(
        error.downcast_ref::<ApiError>(),
        Some(ApiError::Transport { .. })
    ));
}

#[test]
fn login_posts_credentials_without_bearer() -> Result<()> {
    let (addr, handle) = serve(vec![(
        200,
        json!({
            "success": true,
            "token": "jwt-abc",
            "user": {"id": 7, "username": "ana", "email": "ana@example.com", "role": "call_center"}
        }),
    )])?;

    let client = client(&addr)?;
    let session = client.login(&LoginFormInput {
        username: " ana ".to_owned(),
        password: "secret".to_owned(),
    })?;
    assert_eq!(session.token, "jwt-abc");
    assert_eq!(session.role(), Role::CallCenter);
    assert_eq!(session.user.id, UserId::new("7"));

    let seen = handle.join().expect("server thread should join");
    assert_eq!(seen[0].method, Method::Post);
    assert_eq!(seen[0].url, "/api/auth/login/");
    assert_eq!(seen[0].bearer, None);
    let body: Value = serde_json::from_str(&seen[0].body)?;
    assert_eq!(body, json!({"username": "ana", "password": "secret"}));
    Ok(())
}

#[test]
fn login_failure_surfaces_server_reason() -> Result<()> {
    let (addr, handle) = serve(vec![(
        400,
        json!({"success": false, "error": "Credenciales inválidas"}),
    )])?;

    let error = client(&addr)?
        .login(&LoginFormInput {
            username: "ana".to_owned(),
            password: "wrong".to_owned(),
        })
        .expect_err("bad credentials should fail");
    assert!(format!("{error:#}").contains("Credenciales inválidas"));
    assert!(!is_unauthorized(&error));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn schedule_query_targets_inspector_and_month() -> Result<()> {
    let schedule = march_2025_schedule();
    let (addr, handle) = serve(vec![
        (200, schedule_json(&schedule)),
        (200, json!({"success": true, "data": schedule_json(&schedule)})),
    ])?;

    let client = client(&addr)?;
    let loaded = client.inspector_schedule(&ScheduleQuery {
        target: ScheduleTarget::Inspector(UserId::new("insp-9")),
        month: Month::March,
        year: 2025,
    })?;
    assert_eq!(loaded, schedule);

    let own = client.inspector_schedule(&ScheduleQuery {
        target: ScheduleTarget::Own,
        month: Month::March,
        year: 2025,
    })?;
    assert_eq!(own.calendar.len(), 31);

    let seen = handle.join().expect("server thread should join");
    assert_eq!(
        seen[0].url,
        "/api/appointments/inspector-schedule/insp-9/?month=3&year=2025"
    );
    assert_eq!(seen[0].bearer.as_deref(), Some("Bearer tok-123"));
    assert_eq!(
        seen[1].url,
        "/api/appointments/inspector-schedule/?month=3&year=2025"
    );
    Ok(())
}

#[test]
fn unauthorized_is_classified() -> Result<()> {
    let (addr, handle) = serve(vec![(401, json!({"detail": "Token expired"}))])?;

    let error = client(&addr)?
        .list_tasks()
        .expect_err("expired token should fail");
    assert!(is_unauthorized(&error));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn lists_accept_wrapped_arrays_and_skip_malformed_rows() -> Result<()> {
    let (addr, handle) = serve(vec![
        (
            200,
            json!({"appointments": [
                {"id": "a-1", "client_name": "Ana", "status": "CONFIRMED", "inspection": "i-1"},
                {"client_name": "no id"},
            ]}),
        ),
        (
            200,
            json!({"success": true, "inspectors": [
                {"id": "u-1", "username": "insp1", "role": "INSPECTOR"}
            ]}),
        ),
    ])?;

    let client = client(&addr)?;
    let appointments = client.list_appointments()?;
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].status, AppointmentStatus::Confirmed);
    assert!(appointments[0].can_start_inspection());

    let inspectors = client.list_users(Some(Role::Inspector))?;
    assert_eq!(inspectors.len(), 1);
    assert!(inspectors[0].is_active);

    let seen = handle.join().expect("server thread should join");
    assert_eq!(seen[1].url, "/api/auth/admin/users/?role=INSPECTOR");
    Ok(())
}

#[test]
fn status_patches_send_only_the_status() -> Result<()> {
    let (addr, handle) = serve(vec![
        (200, json!({"id": "a-1", "status": "CANCELLED"})),
        (200, json!({"id": "t-1"})),
        (200, json!({"success": true, "user": {}})),
    ])?;

    let client = client(&addr)?;
    client.update_appointment_status(&"a-1".into(), AppointmentStatus::Cancelled)?;
    client.update_task_status(&TaskId::new("t-1"), TaskStatus::InProgress)?;
    client.set_user_active(&UserId::new("u-4"), false)?;

    let seen = handle.join().expect("server thread should join");
    assert_eq!(seen[0].method, Method::Patch);
    assert_eq!(seen[0].url, "/api/appointments/a-1/");
    assert_eq!(
        serde_json::from_str::<Value>(&seen[0].body)?,
        json!({"status": "CANCELLED"})
    );
    assert_eq!(seen[1].url, "/api/appointments/tasks/t-1/");
    assert_eq!(
        serde_json::from_str::<Value>(&seen[1].body)?,
        json!({"status": "IN_PROGRESS"})
    );
    assert_eq!(seen[2].url, "/api/auth/admin/users/u-4/");
    assert_eq!(
        serde_json::from_str::<Value>(&seen[2].body)?,
        json!({"is_active": false})
    );
    Ok(())
}

#[test]
fn unsuccessful_envelope_is_an_error() -> Result<()> {
    let (addr, handle) = serve(vec![(
        200,
        json!({"success": false, "message": "inspection is locked"}),
    )])?;

    let error = client(&addr)?
        .onac_form(&InspectionId::new("insp-100"))
        .expect_err("success false should fail");
    assert!(matches!(
        error.downcast_ref::<ApiError>(),
        Some(ApiError::Unsuccessful(message)) if message == "inspection is locked"
    ));

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn wizard_resumes_and_saves_through_the_client() -> Result<()> {
    let (addr, handle) = serve(vec![
        (200, json!({"success": true, "data": Value::Object(onac_snapshot(3))})),
        (200, json!({"success": true, "data": {}})),
    ])?;

    let mut client = client(&addr)?;
    let mut wizard = OnacWizard::new(InspectionId::new("insp-100"), Catalog::onac_v1());
    wizard.load(&mut client)?;
    assert_eq!(wizard.step(), 3);
    assert_eq!(wizard.form().account_number, "12345678");

    assert!(wizard.next(&mut client)?);
    assert_eq!(wizard.step(), 4);

    let seen = handle.join().expect("server thread should join");
    assert_eq!(seen[0].url, "/api/inspections/inspections/insp-100/onac_form/");
    assert_eq!(seen[1].method, Method::Patch);
    let payload: Value = serde_json::from_str(&seen[1].body)?;
    assert_eq!(payload["current_step"], json!(3));
    assert!(payload.get("service_start_date").is_some());
    assert!(payload.get("pressure_type").is_none());
    assert!(payload.get("account_number").is_none());
    Ok(())
}

#[test]
fn rejected_save_keeps_the_wizard_on_its_step() -> Result<()> {
    let (addr, handle) = serve(vec![
        (200, json!({"success": true, "data": Value::Object(onac_snapshot(2))})),
        (400, json!({"error": {"message": "meter number is invalid"}})),
    ])?;

    let mut client = client(&addr)?;
    let mut wizard = OnacWizard::new(InspectionId::new("insp-100"), Catalog::onac_v1());
    wizard.load(&mut client)?;
    let error = wizard
        .next(&mut client)
        .expect_err("rejected save should fail");
    assert!(format!("{error:#}").contains("meter number is invalid"));
    assert_eq!(wizard.step(), 2);
    let message = wizard.message().expect("error message shown");
    assert!(message.text.contains("meter number is invalid"));

    handle.join().expect("server thread should join");
    Ok(())
}
