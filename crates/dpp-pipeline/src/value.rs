//! The scalar currency flowing through the pipeline, and named parameters
//! built from it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Value kind, used to validate parameters and endpoints without
/// inspecting the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// `bool`.
    Bool,
    /// `f64`.
    Double,
    /// `u32`.
    Unsigned,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Double => "double",
            ValueKind::Unsigned => "unsigned",
        };
        f.write_str(name)
    }
}

/// A tagged scalar. Every pipeline slot holds exactly one of these.
///
/// Reading a slot as the wrong variant is a programming error in this
/// crate's own code (filters only ever read endpoints the resolver
/// wired to a compatible producer); this module still returns a
/// `ConfigError` rather than panicking, since a hostile or buggy
/// declarative spec can route a slot to the wrong kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// Double-precision float value.
    Double(f64),
    /// Unsigned 32-bit integer value.
    Unsigned(u32),
}

impl Value {
    /// The kind tag of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Double(_) => ValueKind::Double,
            Value::Unsigned(_) => ValueKind::Unsigned,
        }
    }

    /// Read this value as `bool`, or error if it is a different kind.
    pub fn as_bool(&self) -> Result<bool, ConfigError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(ConfigError::ValueKindMismatch {
                expected: ValueKind::Bool,
                actual: other.kind(),
            }),
        }
    }

    /// Read this value as `f64`, or error if it is a different kind.
    pub fn as_double(&self) -> Result<f64, ConfigError> {
        match self {
            Value::Double(d) => Ok(*d),
            other => Err(ConfigError::ValueKindMismatch {
                expected: ValueKind::Double,
                actual: other.kind(),
            }),
        }
    }

    /// Read this value as `u32`, or error if it is a different kind.
    pub fn as_unsigned(&self) -> Result<u32, ConfigError> {
        match self {
            Value::Unsigned(u) => Ok(*u),
            other => Err(ConfigError::ValueKindMismatch {
                expected: ValueKind::Unsigned,
                actual: other.kind(),
            }),
        }
    }

    /// The zero value for a kind, used to initialize fresh slots.
    pub fn zeroed(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Double => Value::Double(0.0),
            ValueKind::Unsigned => Value::Unsigned(0),
        }
    }
}

/// A named, typed value used to declare a filter's parameter surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name, unique within its filter.
    pub name: String,
    /// Expected value kind.
    pub kind: ValueKind,
}

/// A named value bound to a [`ParameterSpec`] at instantiation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Bound value.
    pub value: Value,
}

/// Linear lookup by name with kind verification, as specified in §4.7.
pub fn lookup<'a>(
    params: &'a [Parameter],
    name: &str,
    kind: ValueKind,
) -> Result<&'a Value, ConfigError> {
    let param = params
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| ConfigError::MissingParameter {
            name: name.to_string(),
        })?;
    if param.value.kind() != kind {
        return Err(ConfigError::ParameterKindMismatch {
            name: name.to_string(),
            expected: kind,
            actual: param.value.kind(),
        });
    }
    Ok(&param.value)
}
