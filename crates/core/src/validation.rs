//! Composable field-level validation over command parameter objects.
//!
//! Parameters travel as [`serde_json::Value`] objects. Each primitive checks
//! one dotted field path; a [`Validator`] bundles primitives and reports
//! every failing field in one pass, so callers can assemble a single
//! actionable message instead of fixing errors one at a time.
//!
//! Apart from [`required`], primitives pass when the field is absent; presence
//! is [`required`]'s job, composed alongside the shape checks.

use core::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{EngineError, ErrorSeverity};

/// One failed check: the dotted path and its message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every failing field from one validation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    /// Returns true when no check failed.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts the report into a result, for `?`-style constructors.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ValidationError {
                errors: self.errors,
            })
        }
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Construction-time parameter rejection, carrying the complete error set.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("parameter validation failed: {}", join_errors(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl EngineError for ValidationError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        "VALIDATION_FAILED"
    }
}

/// A single field check: dotted path, failure message, predicate.
///
/// The predicate receives `None` when the path does not resolve, letting the
/// same shape express presence checks and value checks.
pub struct FieldRule {
    field: String,
    message: String,
    check: Box<dyn Fn(Option<&JsonValue>) -> bool + Send + Sync>,
}

impl FieldRule {
    /// Creates a rule from raw parts. The supplied primitives cover the
    /// common cases; reach for this (or [`custom`]) for anything else.
    pub fn new<F>(field: impl Into<String>, message: impl Into<String>, check: F) -> Self
    where
        F: Fn(Option<&JsonValue>) -> bool + Send + Sync + 'static,
    {
        Self {
            field: field.into(),
            message: message.into(),
            check: Box::new(check),
        }
    }

    /// The dotted path this rule inspects.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The message reported when the check fails.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Replaces the default message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Runs the predicate against a resolved value.
    pub fn check(&self, value: Option<&JsonValue>) -> bool {
        (self.check)(value)
    }
}

impl fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRule")
            .field("field", &self.field)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Primitives
// ============================================================================

/// The field must be present and non-null.
pub fn required(field: impl Into<String>) -> FieldRule {
    let field = field.into();
    let message = format!("{field} is required");
    FieldRule::new(field, message, |value| {
        matches!(value, Some(v) if !v.is_null())
    })
}

/// String length within `min..=max` characters.
pub fn string_length(field: impl Into<String>, min: usize, max: usize) -> FieldRule {
    let field = field.into();
    let message = format!("{field} must be a string of {min} to {max} characters");
    FieldRule::new(field, message, move |value| match value {
        None => true,
        Some(v) => v
            .as_str()
            .is_some_and(|s| (min..=max).contains(&s.chars().count())),
    })
}

/// String matching the given regular expression.
pub fn pattern(field: impl Into<String>, regex: Regex) -> FieldRule {
    let field = field.into();
    let message = format!("{field} has an invalid format");
    FieldRule::new(field, message, move |value| match value {
        None => true,
        Some(v) => v.as_str().is_some_and(|s| regex.is_match(s)),
    })
}

/// Membership in a closed set of allowed values.
pub fn one_of(field: impl Into<String>, allowed: impl IntoIterator<Item = JsonValue>) -> FieldRule {
    let field = field.into();
    let allowed: Vec<JsonValue> = allowed.into_iter().collect();
    let message = format!(
        "{field} must be one of: {}",
        allowed
            .iter()
            .map(JsonValue::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    FieldRule::new(field, message, move |value| match value {
        None => true,
        Some(v) => allowed.contains(v),
    })
}

/// Integer greater than or equal to zero.
pub fn non_negative_integer(field: impl Into<String>) -> FieldRule {
    let field = field.into();
    let message = format!("{field} must be a non-negative integer");
    FieldRule::new(field, message, |value| match value {
        None => true,
        Some(v) => v.as_u64().is_some(),
    })
}

/// Integer strictly greater than zero.
pub fn positive_integer(field: impl Into<String>) -> FieldRule {
    let field = field.into();
    let message = format!("{field} must be a positive integer");
    FieldRule::new(field, message, |value| match value {
        None => true,
        Some(v) => v.as_u64().is_some_and(|n| n > 0),
    })
}

/// Arbitrary predicate over the resolved value.
pub fn custom<F>(field: impl Into<String>, message: impl Into<String>, predicate: F) -> FieldRule
where
    F: Fn(Option<&JsonValue>) -> bool + Send + Sync + 'static,
{
    FieldRule::new(field, message, predicate)
}

// ============================================================================
// Traversal and aggregation
// ============================================================================

/// Resolves a dotted path against a parameter object.
///
/// Path segments index into objects by key and into arrays by decimal index
/// (`waypoints.0.x`). Returns `None` as soon as a segment fails to resolve.
pub fn resolve_path<'a>(object: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(object, |current, segment| {
        match current {
            JsonValue::Object(map) => map.get(segment),
            JsonValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    })
}

/// Runs every rule against the object, collecting all failures.
///
/// Deliberately does not short-circuit: callers need the complete error set
/// to produce one actionable message.
pub fn validate_object(object: &JsonValue, rules: &[FieldRule]) -> ValidationReport {
    let errors = rules
        .iter()
        .filter(|rule| !rule.check(resolve_path(object, rule.field())))
        .map(|rule| FieldError {
            field: rule.field().to_owned(),
            message: rule.message().to_owned(),
        })
        .collect();
    ValidationReport { errors }
}

/// A parameter-shape validator: a rule list plus the validate entry point.
///
/// Domain modules compose primitives into one validator per command type and
/// reuse the traversal and aggregation here instead of re-implementing it.
#[derive(Debug, Default)]
pub struct Validator {
    rules: Vec<FieldRule>,
}

impl Validator {
    /// Bundles a list of field rules.
    pub fn new(rules: Vec<FieldRule>) -> Self {
        Self { rules }
    }

    /// The bundled rules.
    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Validates a parameter object, reporting every failing field.
    pub fn validate(&self, params: &JsonValue) -> ValidationReport {
        validate_object(params, &self.rules)
    }

    /// Validates and converts failures into a [`ValidationError`].
    pub fn ensure_valid(&self, params: &JsonValue) -> Result<(), ValidationError> {
        self.validate(params).into_result()
    }
}
