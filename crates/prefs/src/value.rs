//! Persisted Values
//!
//! The set of value types a store can hold.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use droidkit_core::error::{DroidKitError, Result};

/// A single persisted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    TextSet(BTreeSet<String>),
}

impl PrefValue {
    /// Parse command-line input: bool, then integer, then float, otherwise text
    pub fn parse_loose(input: &str) -> Self {
        match input {
            "true" => return PrefValue::Bool(true),
            "false" => return PrefValue::Bool(false),
            _ => {}
        }
        if let Ok(i) = input.parse::<i64>() {
            return PrefValue::Int(i);
        }
        if let Ok(f) = input.parse::<f64>() {
            if f.is_finite() {
                return PrefValue::Float(f);
            }
        }
        PrefValue::Text(input.to_string())
    }

    /// Reject values the file formats cannot read back
    pub fn validate(&self) -> Result<()> {
        match self {
            PrefValue::Float(f) if !f.is_finite() => Err(DroidKitError::InvalidValue(format!(
                "float must be finite, got {}",
                f
            ))),
            _ => Ok(()),
        }
    }

    /// Name of the value's type
    pub fn type_name(&self) -> &'static str {
        match self {
            PrefValue::Bool(_) => "bool",
            PrefValue::Int(_) => "int",
            PrefValue::Float(_) => "float",
            PrefValue::Text(_) => "text",
            PrefValue::TextSet(_) => "text-set",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrefValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PrefValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PrefValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PrefValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            PrefValue::TextSet(set) => Some(set),
            _ => None,
        }
    }
}

impl fmt::Display for PrefValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefValue::Bool(b) => write!(f, "{}", b),
            PrefValue::Int(i) => write!(f, "{}", i),
            PrefValue::Float(x) => write!(f, "{}", x),
            PrefValue::Text(s) => write!(f, "{}", s),
            PrefValue::TextSet(set) => {
                let items: Vec<&str> = set.iter().map(String::as_str).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl From<bool> for PrefValue {
    fn from(value: bool) -> Self {
        PrefValue::Bool(value)
    }
}

impl From<i64> for PrefValue {
    fn from(value: i64) -> Self {
        PrefValue::Int(value)
    }
}

impl From<i32> for PrefValue {
    fn from(value: i32) -> Self {
        PrefValue::Int(value.into())
    }
}

impl From<f64> for PrefValue {
    fn from(value: f64) -> Self {
        PrefValue::Float(value)
    }
}

impl From<&str> for PrefValue {
    fn from(value: &str) -> Self {
        PrefValue::Text(value.to_string())
    }
}

impl From<String> for PrefValue {
    fn from(value: String) -> Self {
        PrefValue::Text(value)
    }
}

impl From<BTreeSet<String>> for PrefValue {
    fn from(value: BTreeSet<String>) -> Self {
        PrefValue::TextSet(value)
    }
}
