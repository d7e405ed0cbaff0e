// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::Date;

use crate::ids::*;
use crate::wire;

crate::wire_enum! {
    AppointmentStatus, fallback = Pending, {
        Pending => "PENDING", "pending",
        Confirmed => "CONFIRMED", "confirmed",
        InProgress => "IN_PROGRESS", "in progress",
        Completed => "COMPLETED", "completed",
        Cancelled => "CANCELLED", "cancelled",
        Rescheduled => "RESCHEDULED", "rescheduled",
        NeedsReschedule => "NEEDS_RESCHEDULE", "needs reschedule",
    }
}

impl AppointmentStatus {
    /// An inspector may open the inspection form for these.
    pub const fn is_workable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed | Self::InProgress)
    }

    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

crate::wire_enum! {
    TaskStatus, fallback = Pending, {
        Pending => "PENDING", "pending",
        InProgress => "IN_PROGRESS", "in progress",
        Completed => "COMPLETED", "completed",
        Cancelled => "CANCELLED", "cancelled",
        AppointmentScheduled => "APPOINTMENT_SCHEDULED", "appointment scheduled",
    }
}

impl TaskStatus {
    /// Statuses an agent may set by hand, in cycling order.
    pub const MANUAL: &'static [Self] = &[
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn next_manual(self) -> Self {
        let index = Self::MANUAL
            .iter()
            .position(|status| *status == self)
            .map_or(0, |index| (index + 1) % Self::MANUAL.len());
        Self::MANUAL[index]
    }
}

crate::wire_enum! {
    TaskPriority, fallback = Medium, {
        Low => "LOW", "low",
        Medium => "MEDIUM", "medium",
        High => "HIGH", "high",
        Urgent => "URGENT", "urgent",
    }
}

crate::wire_enum! {
    PunctualityStatus, fallback = Unknown, {
        Early => "EARLY", "early",
        OnTime => "ON_TIME", "on time",
        Late => "LATE", "late",
        Unknown => "UNKNOWN", "-",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    CallCenterAdmin,
    CallCenter,
    Inspector,
    User,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::CallCenterAdmin => "CC_ADMIN",
            Self::CallCenter => "CALL_CENTER",
            Self::Inspector => "INSPECTOR",
            Self::User => "USER",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "administrator",
            Self::CallCenterAdmin => "call-center admin",
            Self::CallCenter => "call-center agent",
            Self::Inspector => "inspector",
            Self::User => "user",
        }
    }

    /// Maps the spellings the backend and older accounts use onto one role.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ADMIN" | "ADMINISTRADOR" | "ADMINISTRATOR" => Self::Admin,
            "CC_ADMIN" | "CALL_CENTER_ADMIN" | "CALLCENTER_ADMIN" => Self::CallCenterAdmin,
            "CALL_CENTER" | "CALLCENTER" | "CALL CENTER" | "TELEOPERADOR" | "OPERADOR" => {
                Self::CallCenter
            }
            "INSPECTOR" | "INSP" => Self::Inspector,
            _ => Self::User,
        }
    }

    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Admin | Self::CallCenterAdmin | Self::CallCenter)
    }
}

impl Serialize for Role {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        wire::text(deserializer).map(|raw| Self::normalize(&raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabKind {
    Appointments,
    Schedule,
    Tasks,
    Users,
}

impl TabKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Appointments => "appointments",
            Self::Schedule => "schedule",
            Self::Tasks => "tasks",
            Self::Users => "users",
        }
    }

    pub const fn for_role(role: Role) -> &'static [Self] {
        match role {
            Role::Admin => &[Self::Appointments, Self::Schedule, Self::Tasks, Self::Users],
            Role::CallCenterAdmin | Role::CallCenter => {
                &[Self::Appointments, Self::Schedule, Self::Tasks]
            }
            Role::Inspector => &[Self::Appointments, Self::Schedule],
            Role::User => &[Self::Appointments],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    Appointment,
    Task,
    User,
}

impl FormKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Appointment => "appointment",
            Self::Task => "task",
            Self::User => "user",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppMode {
    Login,
    Nav,
    Form(FormKind),
    Inspection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewMode {
    Month,
    Week,
    Day,
}

impl ViewMode {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "month" => Some(Self::Month),
            "week" => Some(Self::Week),
            "day" => Some(Self::Day),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentSlot {
    pub id: SlotId,
    #[serde(default, deserialize_with = "wire::text")]
    pub time: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub client_name: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub address: String,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default, deserialize_with = "wire::text")]
    pub status_display: String,
}

impl AppointmentSlot {
    /// Slots are bucketed by the clock hour their `time` starts with.
    pub fn occupies_hour(&self, hour: u8) -> bool {
        self.time.starts_with(&format!("{hour:02}"))
    }

    pub fn status_label(&self) -> &str {
        if self.status_display.is_empty() {
            self.status.label()
        } else {
            &self.status_display
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(default)]
    pub day: u8,
    #[serde(default, deserialize_with = "wire::flag")]
    pub is_today: bool,
    #[serde(default, deserialize_with = "wire::flag")]
    pub is_past: bool,
    #[serde(default, deserialize_with = "wire::flag")]
    pub is_busy: bool,
    #[serde(default, deserialize_with = "wire::count")]
    pub appointments_count: u32,
    #[serde(default)]
    pub appointments: Vec<AppointmentSlot>,
}

impl CalendarDay {
    pub fn slot_at(&self, hour: u8) -> Option<&AppointmentSlot> {
        self.appointments.iter().find(|slot| slot.occupies_hour(hour))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScheduleStats {
    #[serde(default, deserialize_with = "wire::count")]
    pub total: u32,
    #[serde(default, deserialize_with = "wire::count")]
    pub pending: u32,
    #[serde(default, deserialize_with = "wire::count")]
    pub completed: u32,
    #[serde(default, deserialize_with = "wire::count")]
    pub available_slots: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScheduleMonth {
    #[serde(default)]
    pub calendar: Vec<CalendarDay>,
    #[serde(default)]
    pub stats: ScheduleStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default, deserialize_with = "wire::text")]
    pub username: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub email: String,
    pub role: Role,
    #[serde(default, deserialize_with = "wire::text")]
    pub first_name: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub last_name: String,
}

impl SessionUser {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_owned()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    #[serde(default, deserialize_with = "wire::text")]
    pub client_name: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub client_phone: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub client_email: String,
    #[serde(default, deserialize_with = "wire::text", alias = "client_address")]
    pub address: String,
    #[serde(default, with = "iso_date::option")]
    pub scheduled_date: Option<Date>,
    #[serde(default, deserialize_with = "wire::text")]
    pub scheduled_time: String,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default, deserialize_with = "wire::text")]
    pub status_display: String,
    #[serde(default)]
    pub inspector: Option<UserId>,
    #[serde(default, deserialize_with = "wire::text")]
    pub inspector_name: String,
    #[serde(default)]
    pub inspection: Option<InspectionId>,
    #[serde(default)]
    pub punctuality_status: Option<PunctualityStatus>,
    #[serde(default, deserialize_with = "wire::text")]
    pub notes: String,
}

impl Appointment {
    /// Inspectors can open the form once the backend has attached an
    /// inspection record.
    pub fn can_start_inspection(&self) -> bool {
        self.status.is_workable() && self.inspection.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default, deserialize_with = "wire::text")]
    pub client_name: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub client_phone: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub client_email: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub client_address: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub task_type: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default, deserialize_with = "wire::text")]
    pub notes: String,
    #[serde(default, deserialize_with = "wire::count")]
    pub call_attempts: u32,
    #[serde(default, with = "iso_date::option")]
    pub last_inspection_date: Option<Date>,
    #[serde(default, with = "iso_date::option")]
    pub next_inspection_due: Option<Date>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
    #[serde(default, deserialize_with = "wire::text")]
    pub assigned_to_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    #[serde(default, deserialize_with = "wire::text")]
    pub username: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub email: String,
    pub role: Role,
    #[serde(default, deserialize_with = "wire::text")]
    pub first_name: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub last_name: String,
    #[serde(default = "default_active", deserialize_with = "wire::flag")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl UserAccount {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_owned()
        }
    }
}

pub mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;
    use time::macros::format_description;

    const FORMAT: &[time::format_description::BorrowedFormatItem<'static>] =
        format_description!("[year]-[month]-[day]");

    pub fn parse(raw: &str) -> Option<Date> {
        // Datetimes are accepted; only the calendar date is kept.
        let head = raw.trim().get(..10)?;
        Date::parse(head, FORMAT).ok()
    }

    pub fn format(date: Date) -> String {
        date.format(FORMAT).unwrap_or_else(|_| date.to_string())
    }

    pub fn serialize<S>(date: &Date, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(*date))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Date, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date {raw:?}")))
    }

    pub mod option {
        use serde::{Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S>(date: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match date {
                Some(date) => serializer.serialize_str(&super::format(*date)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = crate::wire::text(deserializer)?;
            Ok(super::parse(&raw))
        }
    }
}
