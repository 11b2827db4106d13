//! Typed property declarations over the string attribute map.
//!
//! Stored values stay strings; a [`Properties`] schema converts on read and write. Date-times
//! are stored as RFC 3339 in UTC. Attributes without a declaration remain reachable through
//! [`Entity::get`]/[`Entity::set`].

use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::{entity::Entity, errors::KvGraphError};

#[derive(Clone)]
pub enum PropertyKind {
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
    /// Stored as given, transformed by the function when read.
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl fmt::Debug for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKind::String => f.write_str("String"),
            PropertyKind::Integer => f.write_str("Integer"),
            PropertyKind::Float => f.write_str("Float"),
            PropertyKind::Boolean => f.write_str("Boolean"),
            PropertyKind::DateTime => f.write_str("DateTime"),
            PropertyKind::Custom(_) => f.write_str("Custom"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
}

impl PropertyValue {
    fn encode(&self) -> String {
        match self {
            PropertyValue::String(value) => value.clone(),
            PropertyValue::Integer(value) => value.to_string(),
            PropertyValue::Float(value) => value.to_string(),
            PropertyValue::Boolean(value) => value.to_string(),
            PropertyValue::DateTime(value) => value.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            PropertyValue::String(value) => Value::String(value.clone()),
            PropertyValue::Integer(value) => Value::from(*value),
            PropertyValue::Float(value) => Value::from(*value),
            PropertyValue::Boolean(value) => Value::Bool(*value),
            PropertyValue::DateTime(_) => Value::String(self.encode()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(value) => Some(*value),
            PropertyValue::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            PropertyValue::DateTime(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        PropertyValue::DateTime(value)
    }
}

/// A model's declared properties.
#[derive(Clone, Debug, Default)]
pub struct Properties {
    kinds: BTreeMap<String, PropertyKind>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.kinds.insert(name.into(), kind);
        self
    }

    pub fn custom<F>(self, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.property(name, PropertyKind::Custom(Arc::new(transform)))
    }

    pub fn kind(&self, name: &str) -> Option<&PropertyKind> {
        self.kinds.get(name)
    }

    /// Typed value of `name`, `None` when the attribute is absent.
    pub fn read(&self, entity: &Entity, name: &str) -> Result<Option<PropertyValue>, KvGraphError> {
        let Some(raw) = entity.get(name) else {
            return Ok(None);
        };
        let kind = self.declared(name)?;
        decode(name, kind, raw).map(Some)
    }

    /// The stored string form of `name`, without conversion.
    pub fn read_raw<'e>(&self, entity: &'e Entity, name: &str) -> Option<&'e str> {
        entity.get(name)
    }

    pub fn write(
        &self,
        entity: &mut Entity,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), KvGraphError> {
        let value = value.into();
        let kind = self.declared(name)?;
        let compatible = matches!(
            (kind, &value),
            (PropertyKind::String | PropertyKind::Custom(_), PropertyValue::String(_))
                | (PropertyKind::Integer, PropertyValue::Integer(_))
                | (PropertyKind::Float, PropertyValue::Float(_) | PropertyValue::Integer(_))
                | (PropertyKind::Boolean, PropertyValue::Boolean(_))
                | (PropertyKind::DateTime, PropertyValue::DateTime(_))
        );
        if !compatible {
            return Err(KvGraphError::invalid_input(format!(
                "{name} is declared {kind:?}, got {value:?}"
            )));
        }
        entity.set(name, value.encode());
        Ok(())
    }

    /// Entity JSON with declared properties converted; declared but absent ones are `null`.
    pub fn to_json(&self, entity: &Entity) -> Result<Value, KvGraphError> {
        let mut json = entity.to_json();
        if let Value::Object(map) = &mut json {
            for name in self.kinds.keys() {
                let value = match self.read(entity, name)? {
                    Some(value) => value.to_json(),
                    None => Value::Null,
                };
                map.insert(name.clone(), value);
            }
        }
        Ok(json)
    }

    fn declared(&self, name: &str) -> Result<&PropertyKind, KvGraphError> {
        self.kinds
            .get(name)
            .ok_or_else(|| KvGraphError::invalid_input(format!("{name} is not a declared property")))
    }
}

fn decode(name: &str, kind: &PropertyKind, raw: &str) -> Result<PropertyValue, KvGraphError> {
    let invalid = |expected: &str| {
        KvGraphError::invalid_input(format!("{name}: {raw:?} is not a valid {expected}"))
    };
    let value = match kind {
        PropertyKind::String => PropertyValue::String(raw.to_string()),
        PropertyKind::Integer => {
            PropertyValue::Integer(raw.trim().parse().map_err(|_| invalid("integer"))?)
        }
        PropertyKind::Float => PropertyValue::Float(raw.trim().parse().map_err(|_| invalid("float"))?),
        PropertyKind::Boolean => match raw.trim() {
            "true" | "1" => PropertyValue::Boolean(true),
            "false" | "0" | "" => PropertyValue::Boolean(false),
            _ => return Err(invalid("boolean")),
        },
        PropertyKind::DateTime => PropertyValue::DateTime(
            DateTime::parse_from_rfc3339(raw.trim())
                .map_err(|_| invalid("date-time"))?
                .with_timezone(&Utc),
        ),
        PropertyKind::Custom(transform) => PropertyValue::String(transform(raw)),
    };
    Ok(value)
}
