//! Struct validation.
//!
//! Rules are declared on struct fields with the [`validator`] derive (`#[validate(...)]`), and
//! the rule vocabulary belongs to that crate. This module runs the rules through a
//! [`ValidationEngine`] and flattens every failure into a [`ValidationReport`].
//!
//! The engine is constructed once and shared explicitly: build a [`StructValidator`] during
//! bootstrap and hand clones of it to whatever needs validation. [`StructValidator::shared`]
//! returns the process-wide instance, initialized on first use behind a one-time guard.
//!
//! ```ignore
//! use docrepo::validation::{StructValidator, Validate};
//!
//! #[derive(Validate)]
//! struct SignUp {
//!     #[validate(required)]
//!     name: Option<String>,
//!     #[validate(email)]
//!     email: String,
//! }
//!
//! let validator = StructValidator::shared();
//! validator.validate(&payload)?;
//! ```

use std::{
    collections::BTreeMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use once_cell::sync::Lazy;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::error::DocumentStoreError;

pub use validator::Validate;

static SHARED_ENGINE: Lazy<Arc<ValidationEngine>> = Lazy::new(|| {
    debug!("constructing shared validation engine");
    Arc::new(ValidationEngine::new())
});

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldViolation {
    /// Dotted path to the field; list elements appear as `items[2]`.
    pub field: String,
    /// The rule that failed, e.g. `required`, `length`, `email`.
    pub code: String,
    /// The custom message declared on the rule, if any.
    pub message: Option<String>,
    /// Rule parameters reported by the engine (bounds, the rejected value).
    pub params: BTreeMap<String, Value>,
}

/// Every rule violation found in one validation pass, ordered by field path then rule.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct ValidationReport {
    violations: Vec<FieldViolation>,
}

impl ValidationReport {
    fn from_errors(errors: &ValidationErrors) -> Self {
        let mut violations = Vec::new();
        collect_violations(errors, "", &mut violations);
        violations.sort_by(|a, b| a.field.cmp(&b.field).then_with(|| a.code.cmp(&b.code)));

        Self { violations }
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.violations
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns `true` if any violation was reported for `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// Returns the violations reported for `field`.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldViolation> + 'a {
        self.violations.iter().filter(move |v| v.field == field)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.violations.len())?;

        for (i, violation) in self.violations.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            match &violation.message {
                Some(message) => write!(f, "{sep}{} ({})", violation.field, message)?,
                None => write!(f, "{sep}{} failed '{}'", violation.field, violation.code)?,
            }
        }

        Ok(())
    }
}

impl From<ValidationReport> for DocumentStoreError {
    fn from(report: ValidationReport) -> Self {
        DocumentStoreError::InvalidDocument(report.to_string())
    }
}

fn collect_violations(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldViolation>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };

        match kind {
            ValidationErrorsKind::Field(failures) => {
                out.extend(failures.iter().map(|failure| FieldViolation {
                    field: path.clone(),
                    code: failure.code.to_string(),
                    message: failure.message.as_ref().map(|m| m.to_string()),
                    params: failure
                        .params
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.clone()))
                        .collect(),
                }));
            }
            ValidationErrorsKind::Struct(inner) => collect_violations(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_violations(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

/// Runs declared field rules and reports their failures.
#[derive(Debug, Default)]
pub struct ValidationEngine {
    validations: AtomicU64,
}

impl ValidationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `value` against its declared rules.
    pub fn check<T>(&self, value: &T) -> Result<(), ValidationReport>
    where
        T: Validate + ?Sized,
    {
        self.validations.fetch_add(1, Ordering::Relaxed);

        value
            .validate()
            .map_err(|errors| ValidationReport::from_errors(&errors))
    }

    /// Number of values this engine has validated.
    pub fn validations_run(&self) -> u64 {
        self.validations.load(Ordering::Relaxed)
    }
}

/// A cheap, cloneable handle to a validation engine.
#[derive(Debug, Clone)]
pub struct StructValidator {
    engine: Arc<ValidationEngine>,
}

impl StructValidator {
    /// A validator with its own engine, for callers that inject one explicitly.
    pub fn new() -> Self {
        Self::with_engine(Arc::new(ValidationEngine::new()))
    }

    pub fn with_engine(engine: Arc<ValidationEngine>) -> Self {
        Self { engine }
    }

    /// The process-wide validator. Every call returns a handle to the same engine.
    pub fn shared() -> Self {
        Self::with_engine(Arc::clone(&SHARED_ENGINE))
    }

    pub fn engine(&self) -> &Arc<ValidationEngine> {
        &self.engine
    }

    /// Returns `Ok(())` when every rule passes, or a report of every failed field/rule pair.
    pub fn validate<T>(&self, value: &T) -> Result<(), ValidationReport>
    where
        T: Validate + ?Sized,
    {
        self.engine.check(value)
    }
}

impl Default for StructValidator {
    fn default() -> Self {
        Self::shared()
    }
}

/// Validates `value` with the process-wide validator.
pub fn validate_struct<T>(value: &T) -> Result<(), ValidationReport>
where
    T: Validate + ?Sized,
{
    StructValidator::shared().validate(value)
}
