//! Schema validation of extracted records
//!
//! `validate` is a pure function over a raw record and an ordered list of
//! required fields: no side effects, no logging (the caller logs the
//! outcome), which keeps it independently testable. Lenient coercions live
//! in the separate `normalize` pass that runs before validation, so validate
//! itself stays strict.

use crate::config::SchemaConfig;
use crate::extract::RawRecord;
use serde_json::Value;
use std::fmt;

/// Coarse field type constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    List,
    Any,
}

impl FieldKind {
    /// Parses the config-file spelling; unknown kinds were already rejected
    /// by config validation, so this defaults defensively to Any
    fn from_config(kind: &str) -> Self {
        match kind {
            "text" => Self::Text,
            "number" => Self::Number,
            "list" => Self::List,
            _ => Self::Any,
        }
    }

    /// Coarse type check; emptiness is checked separately
    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_string(),
            Self::Number => value.is_number(),
            Self::List => value.is_array(),
            Self::Any => true,
        }
    }
}

/// A required field with its constraint
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Builds the ordered field list from configuration
    pub fn from_schema(schema: &SchemaConfig) -> Vec<Self> {
        schema
            .fields
            .iter()
            .map(|f| Self::new(&f.name, FieldKind::from_config(&f.kind)))
            .collect()
    }
}

/// A specific, named reason a record fails schema checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    Missing { field: String },
    Empty { field: String },
    TypeMismatch { field: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { field } => write!(f, "missing field {}", field),
            Self::Empty { field } => write!(f, "empty field {}", field),
            Self::TypeMismatch { field } => write!(f, "type mismatch on field {}", field),
        }
    }
}

/// Validation status of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    Valid,
    Invalid,
    /// Validation itself could not run (reserved for upstream stage errors)
    Error,
}

/// Outcome of validating one record
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub status: ValidationStatus,
    pub violations: Vec<Violation>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.status == ValidationStatus::Valid
    }

    /// Violations rendered for log context
    pub fn describe(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Validates a record against the required fields, in field order
///
/// Per field: absent key yields `missing field X`; present but null, empty
/// string or empty list yields `empty field X`; present but of the wrong
/// coarse type yields `type mismatch on field X`. Status is Valid iff the
/// violation list is empty.
pub fn validate(record: &RawRecord, fields: &[FieldSpec]) -> ValidationOutcome {
    let mut violations = Vec::new();

    for spec in fields {
        let Some(value) = record.get(&spec.name) else {
            violations.push(Violation::Missing {
                field: spec.name.clone(),
            });
            continue;
        };

        if is_empty(value) {
            violations.push(Violation::Empty {
                field: spec.name.clone(),
            });
            continue;
        }

        if !spec.kind.matches(value) {
            violations.push(Violation::TypeMismatch {
                field: spec.name.clone(),
            });
        }
    }

    let status = if violations.is_empty() {
        ValidationStatus::Valid
    } else {
        ValidationStatus::Invalid
    };

    ValidationOutcome { status, violations }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Lenient coercions applied before strict validation
///
/// Models routinely return a scalar where a list is expected, or a number
/// spelled inside a string ("5*", "от 250 000 руб"). Wrapping and digit
/// extraction here salvages those records; anything still wrong after the
/// pass fails validation honestly.
pub fn normalize(record: &mut RawRecord, fields: &[FieldSpec]) {
    for spec in fields {
        let Some(value) = record.get(&spec.name) else {
            continue;
        };

        match spec.kind {
            FieldKind::List => {
                if !value.is_array() && !value.is_null() {
                    let wrapped = Value::Array(vec![value.clone()]);
                    record.insert(spec.name.clone(), wrapped);
                }
            }
            FieldKind::Number => {
                if let Value::String(s) = value {
                    if let Some(parsed) = extract_number(s) {
                        record.insert(spec.name.clone(), parsed);
                    }
                }
            }
            FieldKind::Text | FieldKind::Any => {}
        }
    }
}

/// Pulls a number out of a string, digits-only fallback included
fn extract_number(s: &str) -> Option<Value> {
    let trimmed = s.trim();

    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Value::from(int));
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        return serde_json::Number::from_f64(float).map(Value::Number);
    }

    // "5*" or "Скидки до 35%" style: keep just the digits
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok().map(Value::from)
}
