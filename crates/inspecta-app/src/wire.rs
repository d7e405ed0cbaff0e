// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Tolerant decoding helpers for backend payloads.
//!
//! The backend serializes decimals as strings, dates as `null` when unset and
//! occasionally numbers where the form sends text. Every helper here maps those
//! shapes onto the client's field types instead of failing the whole payload.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Declares a closed wire enum with its backend code, a display label, and a
/// fallback variant used for unknown codes.
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, fallback = $fallback:ident, {
            $($variant:ident => $wire:literal, $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }

            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                let upper = value.trim().to_ascii_uppercase();
                match upper.as_str() {
                    $($wire => Some(Self::$variant),)+
                    _ => None,
                }
            }

            pub fn cycle(self, delta: isize) -> Self {
                let all = Self::ALL;
                let current = all.iter().position(|value| *value == self).unwrap_or(0) as isize;
                let next = (current + delta).rem_euclid(all.len() as isize) as usize;
                all[next]
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$fallback
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = $crate::wire::text(deserializer)?;
                Ok(Self::parse(&raw).unwrap_or(Self::$fallback))
            }
        }
    };
}

pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_text(Value::deserialize(deserializer)?))
}

pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        other => Some(value_to_text(other)),
    })
}

pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_flag(&Value::deserialize(deserializer)?))
}

pub fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_u64()
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(0),
        Value::String(raw) => raw.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// Item-code lists: numbers become strings, duplicates are dropped keeping the
/// first occurrence.
pub fn codes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let code = value_to_text(item);
        if !code.is_empty() && !out.contains(&code) {
            out.push(code);
        }
    }
    Ok(out)
}

pub fn checklist<'de, D>(deserializer: D) -> Result<std::collections::BTreeMap<String, bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(entries) = Value::deserialize(deserializer)? else {
        return Ok(Default::default());
    };
    Ok(entries
        .into_iter()
        .map(|(code, value)| (code, value_to_flag(&value)))
        .collect())
}

/// Client-generated numeric ids; numeric strings are accepted too.
pub fn integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_integer(&Value::deserialize(deserializer)?).unwrap_or(0))
}

pub fn opt_integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_integer(&Value::deserialize(deserializer)?))
}

/// Arrays of records; entries that fail to decode are skipped with a warning.
pub fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                tracing::warn!(%error, "skipping malformed list entry");
                None
            }
        })
        .collect())
}

fn value_to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value as i64)),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(raw) => raw,
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    }
}

fn value_to_flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|value| value != 0.0),
        Value::String(raw) => matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "on" | "yes"
        ),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "super::text")]
        pressure: String,
        #[serde(default, deserialize_with = "super::flag")]
        meter: bool,
        #[serde(default, deserialize_with = "super::codes")]
        defects: Vec<String>,
        #[serde(default, deserialize_with = "super::count")]
        total: u32,
    }

    #[test]
    fn lenient_fields_accept_backend_shapes() {
        let probe: Probe = serde_json::from_str(
            r#"{"pressure": 150.5, "meter": "true", "defects": [270, "271", "270"], "total": "7"}"#,
        )
        .expect("decode probe");
        assert_eq!(probe.pressure, "150.5");
        assert!(probe.meter);
        assert_eq!(probe.defects, vec!["270".to_owned(), "271".to_owned()]);
        assert_eq!(probe.total, 7);
    }

    #[test]
    fn nulls_decode_to_empty_values() {
        let probe: Probe = serde_json::from_str(
            r#"{"pressure": null, "meter": null, "defects": null, "total": null}"#,
        )
        .expect("decode probe");
        assert!(probe.pressure.is_empty());
        assert!(!probe.meter);
        assert!(probe.defects.is_empty());
        assert_eq!(probe.total, 0);
    }
}
