// 📐 Shape Layer - Request payload validation
// Required fields are checked before any storage interaction.

use crate::money;
use rust_decimal::Decimal;

// ============================================================================
// VALIDATION RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub context: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.context, self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// One human-readable line for a batch of validation errors.
///
/// Missing fields are folded into a single "must contain" sentence, the
/// rest are listed after it.
pub fn summarize(errors: &[ValidationError]) -> String {
    let missing: Vec<String> = errors
        .iter()
        .filter(|e| e.message == MISSING)
        .map(|e| format!("'{}'", e.field))
        .collect();

    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("request must contain {}", join_fields(&missing)));
    }
    parts.extend(
        errors
            .iter()
            .filter(|e| e.message != MISSING)
            .map(|e| format!("'{}' {}", e.field, e.message)),
    );

    parts.join("; ")
}

fn join_fields(fields: &[String]) -> String {
    match fields {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

const MISSING: &str = "is required";

// ============================================================================
// REQUIREMENTS
// ============================================================================

/// Collects validation errors for one payload
pub struct Requirements {
    context: &'static str,
    errors: Vec<ValidationError>,
}

impl Requirements {
    pub fn new(context: &'static str) -> Self {
        Requirements {
            context,
            errors: Vec::new(),
        }
    }

    /// Field must be present
    pub fn present<T>(&mut self, field: &str, value: &Option<T>) -> &mut Self {
        if value.is_none() {
            self.push(field, MISSING.to_string());
        }
        self
    }

    /// Field must be present and representable as a stored amount
    pub fn amount(&mut self, field: &str, value: &Option<Decimal>) -> &mut Self {
        if value.is_none() {
            self.push(field, MISSING.to_string());
        }
        self.optional_amount(field, value)
    }

    /// Amount check for fields that may be omitted
    pub fn optional_amount(&mut self, field: &str, value: &Option<Decimal>) -> &mut Self {
        if let Some(amount) = value {
            if let Err(e) = money::to_cents(*amount) {
                self.push(field, format!("is invalid: {}", e));
            }
        }
        self
    }

    pub fn finish(&mut self) -> ValidationResult {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn push(&mut self, field: &str, message: String) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message,
            context: self.context.to_string(),
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_all_present_passes() {
        let login = Some("anna".to_string());
        let balance = Some(Decimal::from_str("10.50").unwrap());

        let result = Requirements::new("Client")
            .present("login", &login)
            .amount("balance", &balance)
            .finish();

        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_fields_are_reported_together() {
        let none: Option<String> = None;
        let errors = Requirements::new("Client")
            .present("login", &none)
            .present("password", &Some("x".to_string()))
            .present("phoneNumber", &none)
            .amount("balance", &None)
            .finish()
            .unwrap_err();

        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].context, "Client");
        assert_eq!(
            summarize(&errors),
            "request must contain 'login', 'phoneNumber' and 'balance'"
        );
    }

    #[test]
    fn test_fractional_cents_rejected() {
        let price = Some(Decimal::from_str("99.999").unwrap());
        let errors = Requirements::new("House")
            .amount("pricePerDay", &price)
            .finish()
            .unwrap_err();

        assert_eq!(errors.len(), 1);
        assert!(summarize(&errors).starts_with("'pricePerDay' is invalid"));
    }

    #[test]
    fn test_optional_amount_may_be_absent() {
        let result = Requirements::new("Client")
            .optional_amount("balance", &None)
            .finish();

        assert!(result.is_ok());
    }
}
