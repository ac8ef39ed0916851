// storefront/src/models/billing.rs
use crate::errors::{AppError, Result as AppResult};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BillingData {
  #[validate(length(min = 1, message = "Name is required"))]
  pub name: String,
  #[validate(email(message = "A valid email address is required"))]
  pub email: String,
  #[serde(alias = "phoneNumber")]
  #[validate(length(min = 1, message = "Phone number is required"))]
  pub phone_number: String,
}

impl BillingData {
  /// Trims every field, then validates. Returns the cleaned copy.
  pub fn validated(&self) -> AppResult<BillingData> {
    let cleaned = BillingData {
      name: self.name.trim().to_string(),
      email: self.email.trim().to_string(),
      phone_number: self.phone_number.trim().to_string(),
    };
    cleaned.validate().map_err(validation_error)?;
    Ok(cleaned)
  }
}

fn validation_error(errors: ValidationErrors) -> AppError {
  let mut messages: Vec<String> = errors
    .field_errors()
    .into_iter()
    .flat_map(|(field, errs)| {
      errs.iter().map(move |e| match &e.message {
        Some(msg) => msg.to_string(),
        None => format!("{} is invalid", field),
      })
    })
    .collect();
  messages.sort();
  AppError::Validation(messages.join("; "))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn trims_before_validating() {
    let billing = BillingData {
      name: "  Mona  ".into(),
      email: " mona@example.com ".into(),
      phone_number: " +201000000000".into(),
    };
    let cleaned = billing.validated().unwrap();
    assert_eq!(cleaned.name, "Mona");
    assert_eq!(cleaned.email, "mona@example.com");
  }

  #[test]
  fn blank_fields_are_rejected() {
    let billing = BillingData {
      name: "   ".into(),
      email: "no-at-sign".into(),
      phone_number: "".into(),
    };
    match billing.validated() {
      Err(AppError::Validation(msg)) => {
        assert!(msg.contains("Name is required"));
        assert!(msg.contains("valid email"));
        assert!(msg.contains("Phone number is required"));
      }
      other => panic!("expected validation error, got {:?}", other),
    }
  }
}
