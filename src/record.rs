use std::borrow::Cow;
use std::fmt;

use clap::ValueEnum;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};

/// A single scalar cell of a record.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// String form used for searching and rendering. Null renders empty.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Bool(b) => Cow::Owned(b.to_string()),
            Value::Int(i) => Cow::Owned(i.to_string()),
            Value::Float(f) => Cow::Owned(f.to_string()),
            Value::Text(s) => Cow::Borrowed(s.as_str()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Integral floats collapse to `Int` so spreadsheet numbers like
    /// mobile numbers keep their digits.
    pub fn from_number(n: f64) -> Self {
        if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
            Value::Int(n as i64)
        } else {
            Value::Float(n)
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            // Nested values are not expected, keep their JSON text
            other => Value::Text(other.to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// Flat record with fields in the order the backend sent them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value.into());
        self
    }

    pub fn set(&mut self, field: &str, value: Value) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, v)) => *v = value,
            None => self.fields.push((field.to_string(), value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v)
    }

    /// Stable identity assigned by the backend.
    pub fn id(&self) -> Option<i64> {
        self.get("id").and_then(Value::as_i64)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Drops the given fields, used to strip backend bookkeeping columns.
    pub fn without(mut self, excluded: &[&str]) -> Self {
        self.fields.retain(|(name, _)| !excluded.contains(&name.as_str()));
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map: Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(name, v)| (name.clone(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(Record {
            fields: map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
        })
    }
}

impl Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Retailer,
    Distributor,
}

const RETAILER_FIELDS: [&str; 11] = [
    "id",
    "distributor_name",
    "location",
    "salesman_name",
    "shop_name",
    "shop_address",
    "contact_person",
    "contact_mobile",
    "shop_age",
    "shop_photo",
    "google_map_link",
];

const DISTRIBUTOR_FIELDS: [&str; 6] = [
    "id",
    "distributor_name",
    "mobile",
    "address",
    "target_area",
    "pincode",
];

impl RecordKind {
    /// Declared display columns, in order.
    pub fn schema(&self) -> &'static [&'static str] {
        match self {
            RecordKind::Retailer => &RETAILER_FIELDS,
            RecordKind::Distributor => &DISTRIBUTOR_FIELDS,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RecordKind::Retailer => "Retailers",
            RecordKind::Distributor => "Distributors",
        }
    }
}
