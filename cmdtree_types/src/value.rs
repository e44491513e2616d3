//! Argument values exchanged between parsers, mappers, and executors.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parsed (or mapped) argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArgValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl ArgValue {
    /// The kind tag for this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            ArgValue::Int(_) => ValueKind::Int,
            ArgValue::Float(_) => ValueKind::Float,
            ArgValue::Str(_) => ValueKind::Str,
            ArgValue::Bool(_) => ValueKind::Bool,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ArgValue::Float(v) => Some(*v),
            ArgValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Int(v) => write!(f, "{}", v),
            ArgValue::Float(v) => write!(f, "{}", v),
            ArgValue::Str(s) => write!(f, "{}", s),
            ArgValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Kind tag for [`ArgValue`], used when matching mapped values against a
/// parameter's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Int,
    Float,
    Str,
    Bool,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
            ValueKind::Bool => "bool",
        };
        f.write_str(name)
    }
}

/// Failure while parsing a raw input token into an [`ArgValue`].
///
/// Raised by the dispatcher before any executor runs; the message is
/// user-facing.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct ArgParseError {
    pub message: String,
}

impl ArgParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
