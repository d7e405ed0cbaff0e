// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::VecDeque;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use inspecta_app::{
    Appointment, AppointmentId, AppointmentSlot, AppointmentStatus, CalendarDay, InspectionId,
    OnacFormGateway, Role, ScheduleMonth, ScheduleStats, SessionUser, SlotId, UserAccount,
    UserId, WEEK_HOURS,
};
use serde_json::{Map, Value, json};
use time::{Date, Month};

const FIRST_NAMES: [&str; 14] = [
    "Ana", "Luis", "Camila", "Andres", "Valentina", "Jorge", "Daniela", "Carlos", "Mariana",
    "Felipe", "Laura", "Santiago", "Paula", "Diego",
];
const LAST_NAMES: [&str; 14] = [
    "Ruiz", "Mora", "Gomez", "Herrera", "Castro", "Lopez", "Vargas", "Rojas", "Pineda",
    "Salazar", "Ortiz", "Mejia", "Arango", "Suarez",
];
const STREETS: [&str; 6] = ["Calle", "Carrera", "Diagonal", "Transversal", "Avenida", "Circular"];
const SLOT_STATUSES: [AppointmentStatus; 4] = [
    AppointmentStatus::Pending,
    AppointmentStatus::Confirmed,
    AppointmentStatus::InProgress,
    AppointmentStatus::Completed,
];

/// Slots per day at which a day reports itself as busy.
pub const BUSY_THRESHOLD: usize = 8;

struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Generates plausible inspector schedules with a fixed seed.
pub struct ScheduleFaker {
    rng: DeterministicRng,
    next_slot: u64,
}

impl ScheduleFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            next_slot: 1,
        }
    }

    pub fn client_name(&mut self) -> String {
        let first = FIRST_NAMES[self.rng.int_n(FIRST_NAMES.len())];
        let last = LAST_NAMES[self.rng.int_n(LAST_NAMES.len())];
        format!("{first} {last}")
    }

    pub fn address(&mut self) -> String {
        let street = STREETS[self.rng.int_n(STREETS.len())];
        format!(
            "{street} {} #{}-{}",
            1 + self.rng.int_n(80),
            1 + self.rng.int_n(60),
            10 + self.rng.int_n(89)
        )
    }

    pub fn slot(&mut self, hour: u8) -> AppointmentSlot {
        let id = self.next_slot;
        self.next_slot += 1;
        let status = SLOT_STATUSES[self.rng.int_n(SLOT_STATUSES.len())];
        AppointmentSlot {
            id: SlotId::new(id.to_string()),
            time: format!("{hour:02}:00"),
            client_name: self.client_name(),
            address: self.address(),
            status,
            status_display: String::new(),
        }
    }

    /// One month of days; `today` decides the past/today flags.
    pub fn month(&mut self, year: i32, month: Month, today: Option<Date>) -> ScheduleMonth {
        let mut calendar = Vec::new();
        let mut stats = ScheduleStats::default();
        let hours: Vec<u8> = WEEK_HOURS.collect();
        let Ok(mut date) = Date::from_calendar_date(year, month, 1) else {
            return ScheduleMonth::default();
        };
        while date.month() == month {
            let count = self.rng.int_n(4);
            let mut taken: Vec<u8> = Vec::new();
            while taken.len() < count {
                let hour = hours[self.rng.int_n(hours.len())];
                if !taken.contains(&hour) {
                    taken.push(hour);
                }
            }
            taken.sort_unstable();
            let appointments: Vec<AppointmentSlot> =
                taken.into_iter().map(|hour| self.slot(hour)).collect();
            stats.total += appointments.len() as u32;
            stats.pending += appointments
                .iter()
                .filter(|slot| slot.status == AppointmentStatus::Pending)
                .count() as u32;
            stats.completed += appointments
                .iter()
                .filter(|slot| slot.status == AppointmentStatus::Completed)
                .count() as u32;
            calendar.push(day(date, today, appointments));
            match date.next_day() {
                Some(next) => date = next,
                None => break,
            }
        }
        stats.available_slots = (calendar.len() * hours.len()) as u32 - stats.total;
        ScheduleMonth { calendar, stats }
    }
}

/// A bare calendar day with flags derived from `today`.
pub fn day(date: Date, today: Option<Date>, appointments: Vec<AppointmentSlot>) -> CalendarDay {
    CalendarDay {
        date,
        day: date.day(),
        is_today: today == Some(date),
        is_past: today.is_some_and(|today| date < today),
        is_busy: appointments.len() >= BUSY_THRESHOLD,
        appointments_count: appointments.len() as u32,
        appointments,
    }
}

pub fn empty_month(year: i32, month: Month, today: Option<Date>) -> ScheduleMonth {
    let mut calendar = Vec::new();
    let Ok(mut date) = Date::from_calendar_date(year, month, 1) else {
        return ScheduleMonth::default();
    };
    while date.month() == month {
        calendar.push(day(date, today, Vec::new()));
        match date.next_day() {
            Some(next) => date = next,
            None => break,
        }
    }
    ScheduleMonth {
        calendar,
        stats: ScheduleStats::default(),
    }
}

/// March 2025 seen on the 10th, with one confirmed 10:00 visit on the 15th.
pub fn march_2025_schedule() -> ScheduleMonth {
    let today = march_2025_today();
    let mut month = empty_month(2025, Month::March, Some(today));
    if let Some(day) = month.calendar.get_mut(14) {
        day.appointments.push(AppointmentSlot {
            id: SlotId::new("501"),
            time: "10:00".to_owned(),
            client_name: "Ana Ruiz".to_owned(),
            address: "Carrera 5 #10-20".to_owned(),
            status: AppointmentStatus::Confirmed,
            status_display: "Confirmada".to_owned(),
        });
        day.appointments_count = 1;
    }
    month.stats = ScheduleStats {
        total: 1,
        pending: 0,
        completed: 0,
        available_slots: 31 * 12 - 1,
    };
    month
}

pub fn march_2025_today() -> Date {
    Date::from_calendar_date(2025, Month::March, 10).unwrap_or(Date::MIN)
}

/// The schedule month encoded the way the backend sends it.
pub fn schedule_json(month: &ScheduleMonth) -> Value {
    let calendar: Vec<Value> = month
        .calendar
        .iter()
        .map(|day| {
            json!({
                "date": day.date.to_string(),
                "day": day.day,
                "is_today": day.is_today,
                "is_past": day.is_past,
                "is_busy": day.is_busy,
                "appointments_count": day.appointments_count,
                "appointments": day.appointments.iter().map(|slot| json!({
                    "id": slot.id.as_str(),
                    "time": slot.time,
                    "client_name": slot.client_name,
                    "address": slot.address,
                    "status": slot.status.as_str(),
                    "status_display": slot.status_display,
                })).collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({
        "calendar": calendar,
        "stats": {
            "total": month.stats.total,
            "pending": month.stats.pending,
            "completed": month.stats.completed,
            "available_slots": month.stats.available_slots,
        }
    })
}

/// A server snapshot of a form saved through `step`.
pub fn onac_snapshot(step: u8) -> Map<String, Value> {
    let mut snapshot = Map::new();
    snapshot.insert("id".to_owned(), json!("insp-100"));
    snapshot.insert("current_step".to_owned(), json!(step));
    snapshot.insert(
        "form_completed_percentage".to_owned(),
        json!(inspecta_app::percentage_for_step(step)),
    );
    if step > 1 {
        snapshot.insert("account_number".to_owned(), json!("12345678"));
        snapshot.insert("meter_number".to_owned(), json!("MED-987654"));
        snapshot.insert("last_revision_date".to_owned(), json!("2020-03-01"));
        snapshot.insert("expiration_date".to_owned(), Value::Null);
    }
    if step > 2 {
        snapshot.insert("inspection_start_time".to_owned(), json!("08:30"));
        snapshot.insert("pressure_type".to_owned(), json!("BAJA"));
    }
    if step > 4 {
        snapshot.insert(
            "rooms_data".to_owned(),
            json!([{
                "id": 1_741_600_000_000_i64,
                "type": "COCINA",
                "measurements": {"length": "4", "width": "3", "height": "2.75"},
                "volume": "33.00",
                "total_power": "24000",
                "complies_standard": true,
                "upper_ventilation_area": "0.015",
                "lower_ventilation_area": "0.015",
                "sketch": null
            }]),
        );
    }
    if step > 5 {
        snapshot.insert(
            "appliances_data".to_owned(),
            json!([{
                "id": 1_741_600_000_500_i64,
                "room_id": 1_741_600_000_000_i64,
                "name": "Estufa 4 puestos",
                "type": "COCINA",
                "power_btu": "24000",
                "normalized_coupling": true,
                "ventilation_type": "NATURAL",
                "dimensions": {"trans": "", "dism": "", "long": "1.5"},
                "material": "CIR"
            }]),
        );
    }
    if step > 7 {
        snapshot.insert("checklist_items".to_owned(), json!({"270": true, "271": true}));
    }
    snapshot
}

pub fn session_user(role: Role) -> SessionUser {
    SessionUser {
        id: UserId::new("u-7"),
        username: format!("{}1", role.as_str().to_ascii_lowercase()),
        email: "staff@example.com".to_owned(),
        role,
        first_name: "Luis".to_owned(),
        last_name: "Mora".to_owned(),
    }
}

pub fn inspector_account(id: &str, first_name: &str) -> UserAccount {
    UserAccount {
        id: UserId::new(id),
        username: format!("insp{id}"),
        email: format!("insp{id}@example.com"),
        role: Role::Inspector,
        first_name: first_name.to_owned(),
        last_name: "Inspector".to_owned(),
        is_active: true,
    }
}

pub fn appointment(id: &str, status: AppointmentStatus, inspection: Option<&str>) -> Appointment {
    Appointment {
        id: AppointmentId::new(id),
        client_name: "Ana Ruiz".to_owned(),
        client_phone: "3001234567".to_owned(),
        client_email: String::new(),
        address: "Carrera 5 #10-20".to_owned(),
        scheduled_date: Date::from_calendar_date(2025, Month::March, 15).ok(),
        scheduled_time: "10:00".to_owned(),
        status,
        status_display: String::new(),
        inspector: Some(UserId::new("u-7")),
        inspector_name: "Luis Mora".to_owned(),
        inspection: inspection.map(InspectionId::new),
        punctuality_status: None,
        notes: String::new(),
    }
}

/// In-memory form store with scripted failures.
#[derive(Default)]
pub struct FakeGateway {
    pub snapshot: Map<String, Value>,
    pub patches: Vec<Map<String, Value>>,
    failures: VecDeque<String>,
}

impl FakeGateway {
    pub fn with_snapshot(snapshot: Map<String, Value>) -> Self {
        Self {
            snapshot,
            ..Self::default()
        }
    }

    /// The next gateway call fails with `message`.
    pub fn fail_next(&mut self, message: impl Into<String>) {
        self.failures.push_back(message.into());
    }

    fn scripted_failure(&mut self) -> Result<()> {
        match self.failures.pop_front() {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }
}

impl OnacFormGateway for FakeGateway {
    fn fetch_onac_form(&mut self, _inspection_id: &InspectionId) -> Result<Map<String, Value>> {
        self.scripted_failure()?;
        Ok(self.snapshot.clone())
    }

    fn patch_onac_form(
        &mut self,
        _inspection_id: &InspectionId,
        payload: &Map<String, Value>,
    ) -> Result<()> {
        self.scripted_failure()?;
        for (key, value) in payload {
            self.snapshot.insert(key.clone(), value.clone());
        }
        self.patches.push(payload.clone());
        Ok(())
    }
}

pub fn temp_session_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("session.json");
    Ok((dir, path))
}
