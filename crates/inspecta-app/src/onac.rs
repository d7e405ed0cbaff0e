// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! ONAC inspection form aggregate: nine sections, rooms and appliances, and
//! the derived fields kept consistent on every edit.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::{Catalog, DefectKind};
use crate::forms::is_clock_time;
use crate::model::iso_date;
use crate::wire;

pub const STEP_COUNT: u8 = 9;

pub const STEP_TITLES: [&str; STEP_COUNT as usize] = [
    "Facility identification",
    "Inspecting body",
    "Inspection type",
    "Rooms",
    "Appliances",
    "Building and leak test",
    "Inspection checklist",
    "Defects and equipment",
    "Result and signatures",
];

/// Keys persisted by each step, in step order.
pub const STEP_KEYS: [&[&str]; STEP_COUNT as usize] = [
    &[
        "account_number",
        "meter_number",
        "last_revision_date",
        "expiration_date",
    ],
    &[
        "inspection_org_name",
        "inspection_org_nit",
        "inspection_org_address",
        "inspection_org_email",
        "inspection_start_time",
        "inspection_end_time",
        "pressure_type",
    ],
    &[
        "service_start_date",
        "inspection_type_periodic",
        "inspection_type_modification",
        "inspection_type_user_request",
        "inspection_type_follow_up",
        "user_request_date",
    ],
    &["rooms_data"],
    &["appliances_data"],
    &[
        "has_internal_void",
        "has_property_certificate",
        "property_aspect",
        "leak_test_method",
        "leak_test_pressure",
        "leak_test_meter",
        "leak_test_appliances",
    ],
    &["checklist_items"],
    &[
        "critical_defects",
        "non_critical_defects",
        "co_detector_serial",
        "co_detector_brand",
        "co_detector_model",
        "manometer_serial",
        "manometer_brand",
        "manometer_model",
        "has_calibration_pattern",
        "calibration_serial",
        "seal_number",
    ],
    &[
        "has_no_defects",
        "has_non_critical_defect",
        "has_critical_defect",
        "installation_continues_service",
        "meter_reading",
        "supply_situation",
        "inspector_affirms_safe",
        "client_signature",
        "inspector_signature",
        "client_phone",
        "client_email_form",
        "inspector_name",
        "inspector_competence_id",
        "inspector_specialty",
        "observations",
    ],
];

pub const DEFAULT_ORG_NAME: &str = "RUIS - Redes Urbanas Inspecciones S.A.S.";
pub const DEFAULT_ORG_NIT: &str = "901 563 111-9";

crate::wire_enum! {
    PressureType, fallback = Low, {
        Low => "BAJA", "low",
        Medium => "MEDIA", "medium",
        High => "ALTA", "high",
    }
}

crate::wire_enum! {
    LeakTestMethod, fallback = Unset, {
        Unset => "", "not selected",
        Detector => "DETECTOR", "electronic detector",
        Foam => "ESPUMA", "foam / soapy water",
    }
}

crate::wire_enum! {
    RoomKind, fallback = Kitchen, {
        Kitchen => "COCINA", "kitchen",
        HeaterRoom => "CALENTADOR", "heater room",
        LivingRoom => "SALA", "living room",
        Bedroom => "HABITACION", "bedroom",
        Other => "OTRO", "other",
    }
}

crate::wire_enum! {
    ApplianceKind, fallback = Stove, {
        Stove => "COCINA", "stove",
        WaterHeater => "CALENTADOR", "water heater",
        Oven => "HORNO", "oven",
        Dryer => "SECADORA", "dryer",
        Other => "OTRO", "other",
    }
}

crate::wire_enum! {
    VentilationType, fallback = Natural, {
        Natural => "NATURAL", "natural",
        Forced => "FORZADA", "forced",
        NoVentilation => "NINGUNA", "none",
    }
}

crate::wire_enum! {
    PipeMaterial, fallback = RigidCopper, {
        FlexibleCopper => "CF", "CF flexible copper",
        RigidCopper => "CIR", "CIR rigid copper",
        CorrugatedSteel => "CSST", "CSST corrugated steel",
        Polyethylene => "PE", "PE polyethylene",
        Other => "OTRO", "other",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    NoDefects,
    NonCriticalDefect,
    CriticalDefect,
}

impl ResultKind {
    pub const ALL: [Self; 3] = [Self::NoDefects, Self::NonCriticalDefect, Self::CriticalDefect];

    pub const fn field(self) -> &'static str {
        match self {
            Self::NoDefects => "has_no_defects",
            Self::NonCriticalDefect => "has_non_critical_defect",
            Self::CriticalDefect => "has_critical_defect",
        }
    }

    pub fn from_field(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.field() == key)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Measurements {
    #[serde(deserialize_with = "wire::text")]
    pub length: String,
    #[serde(deserialize_with = "wire::text")]
    pub width: String,
    #[serde(deserialize_with = "wire::text")]
    pub height: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Length,
    Width,
    Height,
}

/// `length * width * height` with two decimals, or `"0.00"` while any
/// measurement is blank or not a number.
pub fn room_volume(measurements: &Measurements) -> String {
    let parse = |raw: &str| raw.trim().parse::<f64>().ok();
    let product = parse(&measurements.length)
        .zip(parse(&measurements.width))
        .zip(parse(&measurements.height))
        .map(|((length, width), height)| length * width * height)
        .filter(|volume| volume.is_finite());
    format!("{:.2}", product.unwrap_or(0.0))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    #[serde(deserialize_with = "wire::integer")]
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: RoomKind,
    #[serde(default)]
    pub measurements: Measurements,
    #[serde(default = "zero_volume", deserialize_with = "wire::text")]
    pub volume: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub total_power: String,
    #[serde(default, deserialize_with = "wire::flag")]
    pub complies_standard: bool,
    #[serde(default, deserialize_with = "wire::text")]
    pub upper_ventilation_area: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub lower_ventilation_area: String,
    #[serde(default, deserialize_with = "wire::opt_text")]
    pub sketch: Option<String>,
}

fn zero_volume() -> String {
    "0.00".to_owned()
}

impl Room {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            kind: RoomKind::Kitchen,
            measurements: Measurements::default(),
            volume: zero_volume(),
            total_power: String::new(),
            complies_standard: false,
            upper_ventilation_area: String::new(),
            lower_ventilation_area: String::new(),
            sketch: None,
        }
    }

    pub fn measurement(&self, dimension: Dimension) -> &str {
        match dimension {
            Dimension::Length => &self.measurements.length,
            Dimension::Width => &self.measurements.width,
            Dimension::Height => &self.measurements.height,
        }
    }

    pub fn set_measurement(&mut self, dimension: Dimension, value: &str) {
        let slot = match dimension {
            Dimension::Length => &mut self.measurements.length,
            Dimension::Width => &mut self.measurements.width,
            Dimension::Height => &mut self.measurements.height,
        };
        *slot = value.to_owned();
        self.volume = room_volume(&self.measurements);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplianceDimensions {
    #[serde(deserialize_with = "wire::text")]
    pub trans: String,
    #[serde(deserialize_with = "wire::text")]
    pub dism: String,
    #[serde(deserialize_with = "wire::text")]
    pub long: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appliance {
    #[serde(deserialize_with = "wire::integer")]
    pub id: i64,
    #[serde(default, deserialize_with = "wire::opt_integer")]
    pub room_id: Option<i64>,
    #[serde(default, deserialize_with = "wire::text")]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ApplianceKind,
    #[serde(default, deserialize_with = "wire::text")]
    pub power_btu: String,
    #[serde(default, deserialize_with = "wire::flag")]
    pub normalized_coupling: bool,
    #[serde(default)]
    pub ventilation_type: VentilationType,
    #[serde(default)]
    pub dimensions: ApplianceDimensions,
    #[serde(default)]
    pub material: PipeMaterial,
}

impl Appliance {
    pub fn new(id: i64, room_id: Option<i64>) -> Self {
        Self {
            id,
            room_id,
            name: String::new(),
            kind: ApplianceKind::Stove,
            power_btu: String::new(),
            normalized_coupling: false,
            ventilation_type: VentilationType::Natural,
            dimensions: ApplianceDimensions::default(),
            material: PipeMaterial::RigidCopper,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionForm {
    #[serde(deserialize_with = "wire::text")]
    pub account_number: String,
    #[serde(deserialize_with = "wire::text")]
    pub meter_number: String,
    #[serde(deserialize_with = "wire::text")]
    pub last_revision_date: String,
    #[serde(deserialize_with = "wire::text")]
    pub expiration_date: String,

    #[serde(deserialize_with = "wire::text")]
    pub inspection_org_name: String,
    #[serde(deserialize_with = "wire::text")]
    pub inspection_org_nit: String,
    #[serde(deserialize_with = "wire::text")]
    pub inspection_org_address: String,
    #[serde(deserialize_with = "wire::text")]
    pub inspection_org_email: String,
    #[serde(deserialize_with = "wire::text")]
    pub inspection_start_time: String,
    #[serde(deserialize_with = "wire::text")]
    pub inspection_end_time: String,
    pub pressure_type: PressureType,

    #[serde(deserialize_with = "wire::text")]
    pub service_start_date: String,
    #[serde(deserialize_with = "wire::flag")]
    pub inspection_type_periodic: bool,
    #[serde(deserialize_with = "wire::flag")]
    pub inspection_type_modification: bool,
    #[serde(deserialize_with = "wire::flag")]
    pub inspection_type_user_request: bool,
    #[serde(deserialize_with = "wire::flag")]
    pub inspection_type_follow_up: bool,
    #[serde(deserialize_with = "wire::text")]
    pub user_request_date: String,

    #[serde(deserialize_with = "wire::list")]
    pub rooms_data: Vec<Room>,
    #[serde(deserialize_with = "wire::list")]
    pub appliances_data: Vec<Appliance>,

    #[serde(deserialize_with = "wire::flag")]
    pub has_internal_void: bool,
    #[serde(deserialize_with = "wire::flag")]
    pub has_property_certificate: bool,
    #[serde(deserialize_with = "wire::text")]
    pub property_aspect: String,
    pub leak_test_method: LeakTestMethod,
    #[serde(deserialize_with = "wire::text")]
    pub leak_test_pressure: String,
    #[serde(deserialize_with = "wire::flag")]
    pub leak_test_meter: bool,
    #[serde(deserialize_with = "wire::flag")]
    pub leak_test_appliances: bool,

    #[serde(deserialize_with = "wire::checklist")]
    pub checklist_items: BTreeMap<String, bool>,

    #[serde(deserialize_with = "wire::codes")]
    pub critical_defects: Vec<String>,
    #[serde(deserialize_with = "wire::codes")]
    pub non_critical_defects: Vec<String>,
    #[serde(deserialize_with = "wire::text")]
    pub co_detector_serial: String,
    #[serde(deserialize_with = "wire::text")]
    pub co_detector_brand: String,
    #[serde(deserialize_with = "wire::text")]
    pub co_detector_model: String,
    #[serde(deserialize_with = "wire::text")]
    pub manometer_serial: String,
    #[serde(deserialize_with = "wire::text")]
    pub manometer_brand: String,
    #[serde(deserialize_with = "wire::text")]
    pub manometer_model: String,
    #[serde(deserialize_with = "wire::flag")]
    pub has_calibration_pattern: bool,
    #[serde(deserialize_with = "wire::text")]
    pub calibration_serial: String,
    #[serde(deserialize_with = "wire::text")]
    pub seal_number: String,

    #[serde(deserialize_with = "wire::flag")]
    pub has_no_defects: bool,
    #[serde(deserialize_with = "wire::flag")]
    pub has_non_critical_defect: bool,
    #[serde(deserialize_with = "wire::flag")]
    pub has_critical_defect: bool,
    #[serde(deserialize_with = "wire::flag")]
    pub installation_continues_service: bool,
    #[serde(deserialize_with = "wire::text")]
    pub meter_reading: String,
    #[serde(deserialize_with = "wire::text")]
    pub supply_situation: String,
    #[serde(deserialize_with = "wire::flag")]
    pub inspector_affirms_safe: bool,
    #[serde(deserialize_with = "wire::opt_text")]
    pub client_signature: Option<String>,
    #[serde(deserialize_with = "wire::opt_text")]
    pub inspector_signature: Option<String>,
    #[serde(deserialize_with = "wire::text")]
    pub client_phone: String,
    #[serde(deserialize_with = "wire::text")]
    pub client_email_form: String,
    #[serde(deserialize_with = "wire::text")]
    pub inspector_name: String,
    #[serde(deserialize_with = "wire::text")]
    pub inspector_competence_id: String,
    #[serde(deserialize_with = "wire::text")]
    pub inspector_specialty: String,
    #[serde(deserialize_with = "wire::text")]
    pub observations: String,

    #[serde(deserialize_with = "wire::count")]
    pub form_completed_percentage: u32,
    #[serde(deserialize_with = "step_number")]
    pub current_step: u8,
}

fn step_number<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = wire::count(deserializer)?;
    Ok(u8::try_from(raw)
        .ok()
        .filter(|step| (1..=STEP_COUNT).contains(step))
        .unwrap_or(1))
}

impl Default for InspectionForm {
    fn default() -> Self {
        Self {
            account_number: String::new(),
            meter_number: String::new(),
            last_revision_date: String::new(),
            expiration_date: String::new(),
            inspection_org_name: DEFAULT_ORG_NAME.to_owned(),
            inspection_org_nit: DEFAULT_ORG_NIT.to_owned(),
            inspection_org_address: String::new(),
            inspection_org_email: String::new(),
            inspection_start_time: String::new(),
            inspection_end_time: String::new(),
            pressure_type: PressureType::Low,
            service_start_date: String::new(),
            inspection_type_periodic: false,
            inspection_type_modification: false,
            inspection_type_user_request: false,
            inspection_type_follow_up: false,
            user_request_date: String::new(),
            rooms_data: Vec::new(),
            appliances_data: Vec::new(),
            has_internal_void: false,
            has_property_certificate: false,
            property_aspect: String::new(),
            leak_test_method: LeakTestMethod::Unset,
            leak_test_pressure: String::new(),
            leak_test_meter: false,
            leak_test_appliances: false,
            checklist_items: BTreeMap::new(),
            critical_defects: Vec::new(),
            non_critical_defects: Vec::new(),
            co_detector_serial: String::new(),
            co_detector_brand: String::new(),
            co_detector_model: String::new(),
            manometer_serial: String::new(),
            manometer_brand: String::new(),
            manometer_model: String::new(),
            has_calibration_pattern: false,
            calibration_serial: String::new(),
            seal_number: String::new(),
            has_no_defects: false,
            has_non_critical_defect: false,
            has_critical_defect: false,
            installation_continues_service: true,
            meter_reading: String::new(),
            supply_situation: String::new(),
            inspector_affirms_safe: true,
            client_signature: None,
            inspector_signature: None,
            client_phone: String::new(),
            client_email_form: String::new(),
            inspector_name: String::new(),
            inspector_competence_id: String::new(),
            inspector_specialty: String::new(),
            observations: String::new(),
            form_completed_percentage: 0,
            current_step: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    LongText,
    Date,
    Time,
    Flag,
    Choice,
    Signature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn field(key: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { key, label, kind }
}

/// Scalar fields edited directly per step. Rooms, appliances, the checklist
/// and defect lists have their own editors.
pub const STEP_FIELDS: [&[FieldSpec]; STEP_COUNT as usize] = [
    &[
        field("account_number", "Account number *", FieldKind::Text),
        field("meter_number", "Meter number *", FieldKind::Text),
        field("last_revision_date", "Last revision date", FieldKind::Date),
        field("expiration_date", "Expiration date", FieldKind::Date),
    ],
    &[
        field("inspection_org_name", "Company name", FieldKind::Text),
        field("inspection_org_nit", "NIT", FieldKind::Text),
        field("inspection_org_address", "Address", FieldKind::Text),
        field("inspection_org_email", "Email", FieldKind::Text),
        field("inspection_start_time", "Start time *", FieldKind::Time),
        field("inspection_end_time", "End time *", FieldKind::Time),
        field("pressure_type", "Pressure type *", FieldKind::Choice),
    ],
    &[
        field("service_start_date", "Service start date", FieldKind::Date),
        field("inspection_type_periodic", "Periodic", FieldKind::Flag),
        field("inspection_type_modification", "Modification", FieldKind::Flag),
        field("inspection_type_user_request", "User request", FieldKind::Flag),
        field("inspection_type_follow_up", "Follow-up", FieldKind::Flag),
        field("user_request_date", "User request date", FieldKind::Date),
    ],
    &[],
    &[],
    &[
        field("has_internal_void", "Internal void", FieldKind::Flag),
        field("has_property_certificate", "Property certificate", FieldKind::Flag),
        field("property_aspect", "Property condition", FieldKind::LongText),
        field("leak_test_method", "Test method *", FieldKind::Choice),
        field("leak_test_pressure", "Test pressure (mbar) *", FieldKind::Text),
        field("leak_test_meter", "Meter tested", FieldKind::Flag),
        field("leak_test_appliances", "Appliances tested", FieldKind::Flag),
    ],
    &[],
    &[
        field("co_detector_serial", "CO detector serial", FieldKind::Text),
        field("co_detector_brand", "CO detector brand", FieldKind::Text),
        field("co_detector_model", "CO detector model", FieldKind::Text),
        field("manometer_serial", "Manometer serial", FieldKind::Text),
        field("manometer_brand", "Manometer brand", FieldKind::Text),
        field("manometer_model", "Manometer model", FieldKind::Text),
        field("has_calibration_pattern", "Calibration pattern", FieldKind::Flag),
        field("calibration_serial", "Calibration serial", FieldKind::Text),
        field("seal_number", "Seal number", FieldKind::Text),
    ],
    &[
        field("has_no_defects", "No defects", FieldKind::Flag),
        field("has_non_critical_defect", "Non-critical defect", FieldKind::Flag),
        field("has_critical_defect", "Critical defect", FieldKind::Flag),
        field(
            "installation_continues_service",
            "Installation continues in service",
            FieldKind::Flag,
        ),
        field("meter_reading", "Meter reading", FieldKind::Text),
        field("supply_situation", "Supply situation", FieldKind::Text),
        field("inspector_affirms_safe", "Inspector affirms safe", FieldKind::Flag),
        field("client_signature", "Client signature", FieldKind::Signature),
        field("inspector_signature", "Inspector signature", FieldKind::Signature),
        field("client_phone", "Client phone", FieldKind::Text),
        field("client_email_form", "Client email", FieldKind::Text),
        field("inspector_name", "Inspector name", FieldKind::Text),
        field("inspector_competence_id", "Competence id", FieldKind::Text),
        field("inspector_specialty", "Specialty", FieldKind::Text),
        field("observations", "Observations", FieldKind::LongText),
    ],
];

macro_rules! keyed_fields {
    (text: [$($text:ident),+ $(,)?], flag: [$($flag:ident),+ $(,)?] $(,)?) => {
        impl InspectionForm {
            pub fn text(&self, key: &str) -> Option<&str> {
                match key {
                    $(stringify!($text) => Some(self.$text.as_str()),)+
                    _ => None,
                }
            }

            fn text_mut(&mut self, key: &str) -> Option<&mut String> {
                match key {
                    $(stringify!($text) => Some(&mut self.$text),)+
                    _ => None,
                }
            }

            pub fn flag(&self, key: &str) -> Option<bool> {
                match key {
                    $(stringify!($flag) => Some(self.$flag),)+
                    _ => None,
                }
            }

            fn flag_mut(&mut self, key: &str) -> Option<&mut bool> {
                match key {
                    $(stringify!($flag) => Some(&mut self.$flag),)+
                    _ => None,
                }
            }
        }
    };
}

keyed_fields! {
    text: [
        account_number, meter_number, last_revision_date, expiration_date,
        inspection_org_name, inspection_org_nit, inspection_org_address,
        inspection_org_email, inspection_start_time, inspection_end_time,
        service_start_date, user_request_date, property_aspect, leak_test_pressure,
        co_detector_serial, co_detector_brand, co_detector_model, manometer_serial,
        manometer_brand, manometer_model, calibration_serial, seal_number,
        meter_reading, supply_situation, client_phone, client_email_form,
        inspector_name, inspector_competence_id, inspector_specialty, observations,
    ],
    flag: [
        inspection_type_periodic, inspection_type_modification,
        inspection_type_user_request, inspection_type_follow_up, has_internal_void,
        has_property_certificate, leak_test_meter, leak_test_appliances,
        has_calibration_pattern, has_no_defects, has_non_critical_defect,
        has_critical_defect, installation_continues_service, inspector_affirms_safe,
    ],
}

pub fn percentage_for_step(step: u8) -> u32 {
    let step = step.clamp(1, STEP_COUNT);
    (f64::from(step) / f64::from(STEP_COUNT) * 100.0).round() as u32
}

impl InspectionForm {
    /// Shallow-merges a server snapshot over the defaults. Unknown keys and
    /// nulls are ignored; dangling appliance room references are dropped.
    pub fn from_snapshot(snapshot: &Map<String, Value>) -> Result<Self> {
        let Value::Object(mut merged) = serde_json::to_value(Self::default())
            .context("encode default inspection form")?
        else {
            bail!("default inspection form did not encode as an object");
        };
        for (key, value) in snapshot {
            if value.is_null() || !merged.contains_key(key) {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
        let mut form: Self = serde_json::from_value(Value::Object(merged))
            .context("decode inspection form snapshot")?;
        let dropped = form.normalize_room_refs();
        if dropped > 0 {
            tracing::warn!(dropped, "cleared appliance references to missing rooms");
        }
        Ok(form)
    }

    pub fn to_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self).context("encode inspection form")? {
            Value::Object(map) => Ok(map),
            _ => bail!("inspection form did not encode as an object"),
        }
    }

    /// Exactly the keys owned by `step`.
    pub fn step_payload(&self, step: u8) -> Result<Map<String, Value>> {
        let Some(keys) = step
            .checked_sub(1)
            .and_then(|index| STEP_KEYS.get(usize::from(index)))
        else {
            bail!("step {step} is out of range -- steps run from 1 to {STEP_COUNT}");
        };
        let mut all = self.to_map()?;
        Ok(keys
            .iter()
            .filter_map(|key| all.remove(*key).map(|value| ((*key).to_owned(), value)))
            .collect())
    }

    pub fn set_text(&mut self, key: &str, value: &str) -> Result<()> {
        let spec = field_spec(key);
        let value = value.trim_end_matches(['\r', '\n']);
        match spec.map(|spec| spec.kind) {
            Some(FieldKind::Date) if !value.trim().is_empty() => {
                if iso_date::parse(value).is_none() {
                    bail!("{} must be a date like 2025-03-15 -- fix the date and retry", label_of(key));
                }
            }
            Some(FieldKind::Time) if !value.trim().is_empty() => {
                if !is_clock_time(value.trim()) {
                    bail!("{} must be a time like 08:30 -- fix the time and retry", label_of(key));
                }
            }
            _ => {}
        }
        let Some(slot) = self.text_mut(key) else {
            bail!("{key} is not a text field");
        };
        *slot = value.trim().to_owned();
        Ok(())
    }

    /// Sets a boolean field. Result flags behave as a radio group.
    pub fn set_flag(&mut self, key: &str, value: bool) -> Result<()> {
        if let (Some(kind), true) = (ResultKind::from_field(key), value) {
            self.select_result(kind);
            return Ok(());
        }
        let Some(slot) = self.flag_mut(key) else {
            bail!("{key} is not a yes/no field");
        };
        *slot = value;
        Ok(())
    }

    pub fn toggle_flag(&mut self, key: &str) -> Result<bool> {
        let Some(current) = self.flag(key) else {
            bail!("{key} is not a yes/no field");
        };
        self.set_flag(key, !current)?;
        Ok(!current)
    }

    pub fn choice(&self, key: &str) -> Option<&'static str> {
        match key {
            "pressure_type" => Some(self.pressure_type.label()),
            "leak_test_method" => Some(self.leak_test_method.label()),
            _ => None,
        }
    }

    pub fn cycle_choice(&mut self, key: &str, delta: isize) -> Result<()> {
        match key {
            "pressure_type" => self.pressure_type = self.pressure_type.cycle(delta),
            "leak_test_method" => self.leak_test_method = self.leak_test_method.cycle(delta),
            _ => bail!("{key} is not a choice field"),
        }
        Ok(())
    }

    pub fn signature(&self, key: &str) -> Option<&Option<String>> {
        match key {
            "client_signature" => Some(&self.client_signature),
            "inspector_signature" => Some(&self.inspector_signature),
            _ => None,
        }
    }

    /// Records a typed signature. Terminals cannot draw, so the signer's
    /// name stands in for the image the web client captures.
    pub fn sign(&mut self, key: &str, signer: &str) -> Result<()> {
        let signer = signer.trim();
        if signer.is_empty() {
            bail!("{} needs a name -- type the signer's name and retry", label_of(key));
        }
        match key {
            "client_signature" => self.client_signature = Some(signer.to_owned()),
            "inspector_signature" => self.inspector_signature = Some(signer.to_owned()),
            _ => bail!("{key} is not a signature field"),
        }
        Ok(())
    }

    pub fn clear_signature(&mut self, key: &str) -> Result<()> {
        match key {
            "client_signature" => self.client_signature = None,
            "inspector_signature" => self.inspector_signature = None,
            _ => bail!("{key} is not a signature field"),
        }
        Ok(())
    }

    pub fn select_result(&mut self, kind: ResultKind) {
        self.has_no_defects = kind == ResultKind::NoDefects;
        self.has_non_critical_defect = kind == ResultKind::NonCriticalDefect;
        self.has_critical_defect = kind == ResultKind::CriticalDefect;
    }

    pub fn result(&self) -> Option<ResultKind> {
        match (
            self.has_no_defects,
            self.has_non_critical_defect,
            self.has_critical_defect,
        ) {
            (true, false, false) => Some(ResultKind::NoDefects),
            (false, true, false) => Some(ResultKind::NonCriticalDefect),
            (false, false, true) => Some(ResultKind::CriticalDefect),
            _ => None,
        }
    }

    pub fn is_checked(&self, code: &str) -> bool {
        self.checklist_items.get(code).copied().unwrap_or(false)
    }

    /// Flips a checklist item. Unchecking removes the entry, so toggling twice
    /// leaves the map as it was.
    pub fn toggle_checklist(&mut self, catalog: &Catalog, code: &str) -> Result<bool> {
        if !catalog.has_checklist_item(code) {
            bail!("checklist item {code} is not in catalog {}", catalog.version);
        }
        if self.is_checked(code) {
            self.checklist_items.remove(code);
            Ok(false)
        } else {
            self.checklist_items.insert(code.to_owned(), true);
            Ok(true)
        }
    }

    pub fn defects(&self, kind: DefectKind) -> &[String] {
        match kind {
            DefectKind::Critical => &self.critical_defects,
            DefectKind::NonCritical => &self.non_critical_defects,
        }
    }

    pub fn toggle_defect(&mut self, catalog: &Catalog, kind: DefectKind, code: &str) -> Result<bool> {
        if !catalog.has_defect(kind, code) {
            bail!("{} code {code} is not in catalog {}", kind.label(), catalog.version);
        }
        let list = match kind {
            DefectKind::Critical => &mut self.critical_defects,
            DefectKind::NonCritical => &mut self.non_critical_defects,
        };
        if let Some(index) = list.iter().position(|existing| existing == code) {
            list.remove(index);
            Ok(false)
        } else {
            list.push(code.to_owned());
            Ok(true)
        }
    }

    /// Adds a room with a millisecond id, bumped past existing ids so two
    /// rooms added within the same millisecond stay distinct.
    pub fn add_room(&mut self, now_millis: i64) -> i64 {
        let id = self.next_entry_id(now_millis);
        self.rooms_data.push(Room::new(id));
        id
    }

    pub fn room_mut(&mut self, id: i64) -> Option<&mut Room> {
        self.rooms_data.iter_mut().find(|room| room.id == id)
    }

    pub fn set_room_measurement(&mut self, id: i64, dimension: Dimension, value: &str) -> Result<()> {
        let Some(room) = self.room_mut(id) else {
            bail!("room {id} not found -- reload the form and retry");
        };
        room.set_measurement(dimension, value.trim());
        Ok(())
    }

    /// Removes a room and clears every appliance reference to it.
    pub fn remove_room(&mut self, id: i64) -> bool {
        let before = self.rooms_data.len();
        self.rooms_data.retain(|room| room.id != id);
        if self.rooms_data.len() == before {
            return false;
        }
        for appliance in &mut self.appliances_data {
            if appliance.room_id == Some(id) {
                appliance.room_id = None;
            }
        }
        true
    }

    /// New appliances start in the first room, if any.
    pub fn add_appliance(&mut self, now_millis: i64) -> i64 {
        let id = self.next_entry_id(now_millis);
        let room_id = self.rooms_data.first().map(|room| room.id);
        self.appliances_data.push(Appliance::new(id, room_id));
        id
    }

    pub fn appliance_mut(&mut self, id: i64) -> Option<&mut Appliance> {
        self.appliances_data.iter_mut().find(|appliance| appliance.id == id)
    }

    pub fn remove_appliance(&mut self, id: i64) -> bool {
        let before = self.appliances_data.len();
        self.appliances_data.retain(|appliance| appliance.id != id);
        self.appliances_data.len() != before
    }

    /// Moves an appliance to the next room in list order, wrapping through
    /// "no room".
    pub fn cycle_appliance_room(&mut self, id: i64) -> Result<Option<i64>> {
        let room_ids: Vec<i64> = self.rooms_data.iter().map(|room| room.id).collect();
        let Some(appliance) = self.appliance_mut(id) else {
            bail!("appliance {id} not found -- reload the form and retry");
        };
        let next = match appliance
            .room_id
            .and_then(|current| room_ids.iter().position(|room| *room == current))
        {
            None => room_ids.first().copied(),
            Some(index) => room_ids.get(index + 1).copied(),
        };
        appliance.room_id = next;
        Ok(next)
    }

    pub fn room_label(&self, id: Option<i64>) -> String {
        id.and_then(|id| {
            self.rooms_data
                .iter()
                .position(|room| room.id == id)
                .map(|index| format!("room {} ({})", index + 1, self.rooms_data[index].kind.label()))
        })
        .unwrap_or_else(|| "no room".to_owned())
    }

    pub fn dangling_room_refs(&self) -> Vec<i64> {
        self.appliances_data
            .iter()
            .filter(|appliance| {
                appliance
                    .room_id
                    .is_some_and(|room| !self.rooms_data.iter().any(|candidate| candidate.id == room))
            })
            .map(|appliance| appliance.id)
            .collect()
    }

    /// Drops appliance references to rooms that no longer exist and returns
    /// how many were cleared.
    pub fn normalize_room_refs(&mut self) -> usize {
        let dangling = self.dangling_room_refs();
        for appliance in &mut self.appliances_data {
            if dangling.contains(&appliance.id) {
                appliance.room_id = None;
            }
        }
        dangling.len()
    }

    pub fn validate_for_completion(&self) -> Result<()> {
        if self.result().is_none() {
            bail!(
                "inspection result is required -- choose exactly one of no defects, non-critical or critical and retry"
            );
        }
        if let Some(appliance) = self.dangling_room_refs().first() {
            bail!("appliance {appliance} points at a deleted room -- pick a room and retry");
        }
        Ok(())
    }

    fn next_entry_id(&self, now_millis: i64) -> i64 {
        let highest = self
            .rooms_data
            .iter()
            .map(|room| room.id)
            .chain(self.appliances_data.iter().map(|appliance| appliance.id))
            .max();
        match highest {
            Some(highest) if highest >= now_millis => highest + 1,
            _ => now_millis,
        }
    }
}

pub fn field_spec(key: &str) -> Option<&'static FieldSpec> {
    STEP_FIELDS
        .iter()
        .flat_map(|fields| fields.iter())
        .find(|spec| spec.key == key)
}

fn label_of(key: &str) -> String {
    field_spec(key)
        .map(|spec| spec.label.trim_end_matches(" *").to_lowercase())
        .unwrap_or_else(|| key.replace('_', " "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn volume_uses_two_decimals() {
        let mut room = Room::new(1);
        room.set_measurement(Dimension::Length, "2");
        assert_eq!(room.volume, "0.00");
        room.set_measurement(Dimension::Width, "3");
        room.set_measurement(Dimension::Height, "2.5");
        assert_eq!(room.volume, "15.00");
        room.set_measurement(Dimension::Height, "abc");
        assert_eq!(room.volume, "0.00");
    }

    #[test]
    fn new_room_volume_from_measurements() {
        let mut form = InspectionForm::default();
        let id = form.add_room(1_700_000_000_000);
        form.set_room_measurement(id, Dimension::Length, "4").expect("length");
        form.set_room_measurement(id, Dimension::Width, "3").expect("width");
        form.set_room_measurement(id, Dimension::Height, "2.75").expect("height");
        assert_eq!(form.rooms_data[0].volume, "33.00");
    }

    #[test]
    fn snapshot_merges_over_defaults() {
        let form = InspectionForm::from_snapshot(&snapshot(json!({
            "account_number": "12345678",
            "inspection_org_name": null,
            "current_step": 4,
            "status": "IN_PROGRESS",
            "checklist_items": {"270": true},
            "critical_defects": [270, "271"]
        })))
        .expect("merge snapshot");
        assert_eq!(form.account_number, "12345678");
        assert_eq!(form.inspection_org_name, DEFAULT_ORG_NAME);
        assert_eq!(form.inspection_org_nit, DEFAULT_ORG_NIT);
        assert!(form.installation_continues_service);
        assert!(form.inspector_affirms_safe);
        assert_eq!(form.current_step, 4);
        assert!(form.is_checked("270"));
        assert_eq!(form.critical_defects, vec!["270", "271"]);
    }

    #[test]
    fn out_of_range_step_resumes_at_one() {
        let form = InspectionForm::from_snapshot(&snapshot(json!({"current_step": 12})))
            .expect("merge snapshot");
        assert_eq!(form.current_step, 1);
        let form = InspectionForm::from_snapshot(&snapshot(json!({"current_step": 0})))
            .expect("merge snapshot");
        assert_eq!(form.current_step, 1);
    }

    #[test]
    fn step_payload_has_exactly_the_step_keys() {
        let form = InspectionForm::default();
        for step in 1..=STEP_COUNT {
            let payload = form.step_payload(step).expect("step payload");
            let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
            let mut expected = STEP_KEYS[usize::from(step - 1)].to_vec();
            expected.sort_unstable();
            let mut actual = keys.clone();
            actual.sort_unstable();
            assert_eq!(actual, expected, "step {step}");
        }
        assert!(form.step_payload(0).is_err());
        assert!(form.step_payload(10).is_err());
    }

    #[test]
    fn percentage_rounds_step_fraction() {
        assert_eq!(percentage_for_step(1), 11);
        assert_eq!(percentage_for_step(5), 56);
        assert_eq!(percentage_for_step(9), 100);
    }

    #[test]
    fn double_checklist_toggle_is_identity() {
        let catalog = Catalog::onac_v1();
        let mut form = InspectionForm::default();
        form.checklist_items.insert("281".to_owned(), true);
        let before = form.clone();
        assert!(form.toggle_checklist(&catalog, "290").expect("toggle on"));
        assert!(!form.toggle_checklist(&catalog, "290").expect("toggle off"));
        assert_eq!(form, before);
        assert!(form.toggle_checklist(&catalog, "999").is_err());
    }

    #[test]
    fn defect_toggles_stay_in_their_list() {
        let catalog = Catalog::onac_v1();
        let mut form = InspectionForm::default();
        form.toggle_defect(&catalog, DefectKind::Critical, "275")
            .expect("critical toggle");
        assert!(
            form.toggle_defect(&catalog, DefectKind::NonCritical, "275")
                .is_err()
        );
        assert_eq!(form.defects(DefectKind::Critical), ["275".to_owned()]);
        assert!(form.defects(DefectKind::NonCritical).is_empty());
    }

    #[test]
    fn result_selection_is_exclusive() {
        let mut form = InspectionForm::default();
        form.set_flag("has_critical_defect", true).expect("select critical");
        form.set_flag("has_no_defects", true).expect("select none");
        assert_eq!(form.result(), Some(ResultKind::NoDefects));
        assert!(!form.has_critical_defect);
        form.set_flag("has_no_defects", false).expect("clear");
        assert_eq!(form.result(), None);
        assert!(form.validate_for_completion().is_err());
    }

    #[test]
    fn removing_room_clears_appliance_refs() {
        let mut form = InspectionForm::default();
        let kitchen = form.add_room(100);
        let other = form.add_room(100);
        assert_eq!(other, 101);
        let stove = form.add_appliance(100);
        assert_eq!(form.appliances_data[0].room_id, Some(kitchen));
        assert_eq!(form.cycle_appliance_room(stove).expect("cycle"), Some(other));

        assert!(form.remove_room(other));
        assert_eq!(form.appliances_data[0].room_id, None);
        assert!(form.dangling_room_refs().is_empty());
    }

    #[test]
    fn dangling_refs_are_dropped_on_load() {
        let form = InspectionForm::from_snapshot(&snapshot(json!({
            "rooms_data": [{"id": 1, "type": "SALA", "measurements": {"length": 2, "width": 2, "height": 2}, "volume": "8.00"}],
            "appliances_data": [
                {"id": 2, "room_id": 1, "name": "Estufa", "type": "COCINA"},
                {"id": 3, "room_id": 99, "name": "Calentador", "type": "CALENTADOR"}
            ]
        })))
        .expect("merge snapshot");
        assert_eq!(form.rooms_data[0].kind, RoomKind::LivingRoom);
        assert_eq!(form.rooms_data[0].measurements.length, "2");
        assert_eq!(form.appliances_data[0].room_id, Some(1));
        assert_eq!(form.appliances_data[1].room_id, None);
        assert_eq!(form.appliances_data[1].material, PipeMaterial::RigidCopper);
    }

    #[test]
    fn date_and_time_fields_are_checked() {
        let mut form = InspectionForm::default();
        form.set_text("last_revision_date", "2024-11-02").expect("date");
        let error = form
            .set_text("expiration_date", "next year")
            .expect_err("bad date")
            .to_string();
        assert!(error.contains("expiration date"), "{error}");
        form.set_text("inspection_start_time", "08:30").expect("time");
        assert!(form.set_text("inspection_end_time", "25:00").is_err());
        form.set_text("inspection_end_time", "").expect("blank time");
        assert!(form.set_text("rooms_data", "x").is_err());
    }

    #[test]
    fn typed_signatures() {
        let mut form = InspectionForm::default();
        assert!(form.sign("client_signature", "  ").is_err());
        form.sign("client_signature", " Ana Ruiz ").expect("sign");
        assert_eq!(form.signature("client_signature"), Some(&Some("Ana Ruiz".to_owned())));
        form.clear_signature("client_signature").expect("clear");
        assert_eq!(form.signature("client_signature"), Some(&None));
        assert!(form.sign("observations", "x").is_err());
    }
}
