// storefront/src/models/payment.rs

//! Gateway-facing value types.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl TryFrom<String> for CurrencyCode {
  type Error = String;

  fn try_from(raw: String) -> Result<Self, Self::Error> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
      Ok(CurrencyCode(code))
    } else {
      Err(format!("'{}' is not a three-letter currency code", raw))
    }
  }
}

impl FromStr for CurrencyCode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    CurrencyCode::try_from(s.to_string())
  }
}

impl From<CurrencyCode> for String {
  fn from(code: CurrencyCode) -> Self {
    code.0
  }
}

impl Default for CurrencyCode {
  fn default() -> Self {
    CurrencyCode("EGP".to_string())
  }
}

impl fmt::Display for CurrencyCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Gateway payment method name, e.g. `card`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaymentMethod(String);

impl TryFrom<String> for PaymentMethod {
  type Error = String;

  fn try_from(raw: String) -> Result<Self, Self::Error> {
    let method = raw.trim().to_ascii_lowercase();
    if method.is_empty() {
      return Err("Payment method must not be empty".to_string());
    }
    Ok(PaymentMethod(method))
  }
}

impl From<PaymentMethod> for String {
  fn from(method: PaymentMethod) -> Self {
    method.0
  }
}

impl Default for PaymentMethod {
  fn default() -> Self {
    PaymentMethod("card".to_string())
  }
}

impl fmt::Display for PaymentMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  #[default]
  En,
  Ar,
}

/// Gateway transaction identifier; the gateway sends it as a number, redirects carry it as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
  pub fn parse(raw: impl AsRef<str>) -> Option<Self> {
    let trimmed = raw.as_ref().trim();
    (!trimmed.is_empty()).then(|| TransactionId(trimmed.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for TransactionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl<'de> Deserialize<'de> for TransactionId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = super::flexible_string::deserialize(deserializer)?;
    TransactionId::parse(raw).ok_or_else(|| serde::de::Error::custom("transaction id must not be empty"))
  }
}

/// `PENDING -> SUCCESSFUL | FAILED`. Any status the gateway reports that is
/// neither pending nor successful is treated as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
  Pending,
  Successful,
  Failed,
}

impl TransactionStatus {
  pub fn parse(raw: &str) -> Self {
    match raw.trim().to_ascii_uppercase().as_str() {
      "SUCCESSFUL" => TransactionStatus::Successful,
      "PENDING" => TransactionStatus::Pending,
      _ => TransactionStatus::Failed,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      TransactionStatus::Pending => "PENDING",
      TransactionStatus::Successful => "SUCCESSFUL",
      TransactionStatus::Failed => "FAILED",
    }
  }

  pub fn is_terminal(self) -> bool {
    !matches!(self, TransactionStatus::Pending)
  }
}

impl<'de> Deserialize<'de> for TransactionStatus {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(TransactionStatus::parse(&raw))
  }
}

impl fmt::Display for TransactionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A gateway transaction as reported at creation. Owned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
  pub transaction_id: TransactionId,
  pub transaction_uuid: String,
  pub status: TransactionStatus,
  pub iframe_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
  pub field_label: String,
  pub field_value: String,
}

/// The fixed set of custom fields attached to a payment. The gateway echoes
/// them back in its callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentMetadata {
  pub cart_items_count: usize,
  pub order_timestamp: i64,
  pub buyer_email: Option<String>,
  pub buyer_name: Option<String>,
  pub payment_method: Option<String>,
}

impl PaymentMetadata {
  pub const CART_ITEMS_COUNT: &'static str = "cart_items_count";
  pub const ORDER_TIMESTAMP: &'static str = "order_timestamp";
  pub const BUYER_EMAIL: &'static str = "buyer_email";
  pub const BUYER_NAME: &'static str = "buyer_name";
  pub const PAYMENT_METHOD: &'static str = "payment_method";

  pub fn custom_fields(&self) -> Vec<CustomField> {
    let mut fields = vec![
      CustomField {
        field_label: Self::CART_ITEMS_COUNT.to_string(),
        field_value: self.cart_items_count.to_string(),
      },
      CustomField {
        field_label: Self::ORDER_TIMESTAMP.to_string(),
        field_value: self.order_timestamp.to_string(),
      },
    ];
    let optional = [
      (Self::BUYER_EMAIL, &self.buyer_email),
      (Self::BUYER_NAME, &self.buyer_name),
      (Self::PAYMENT_METHOD, &self.payment_method),
    ];
    for (label, value) in optional {
      if let Some(value) = value {
        fields.push(CustomField {
          field_label: label.to_string(),
          field_value: value.clone(),
        });
      }
    }
    fields
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn currency_codes_are_normalised() {
    assert_eq!("egp".parse::<CurrencyCode>().unwrap().as_str(), "EGP");
    assert!("EG".parse::<CurrencyCode>().is_err());
    assert!("E1P".parse::<CurrencyCode>().is_err());
  }

  #[test]
  fn unknown_statuses_are_failures() {
    assert_eq!(TransactionStatus::parse("successful"), TransactionStatus::Successful);
    assert_eq!(TransactionStatus::parse("PENDING"), TransactionStatus::Pending);
    assert_eq!(TransactionStatus::parse("DECLINED"), TransactionStatus::Failed);
  }

  #[test]
  fn transaction_ids_accept_numbers() {
    let id: TransactionId = serde_json::from_str("123456").unwrap();
    assert_eq!(id.as_str(), "123456");
    assert!(serde_json::from_str::<TransactionId>(r#""  ""#).is_err());
  }

  #[test]
  fn custom_fields_use_label_value_pairs() {
    let meta = PaymentMetadata {
      cart_items_count: 3,
      order_timestamp: 1_700_000_000_000,
      buyer_email: None,
      buyer_name: None,
      payment_method: Some("wallet".to_string()),
    };
    let json = serde_json::to_value(meta.custom_fields()).unwrap();
    assert_eq!(
      json,
      serde_json::json!([
        {"field_label": "cart_items_count", "field_value": "3"},
        {"field_label": "order_timestamp", "field_value": "1700000000000"},
        {"field_label": "payment_method", "field_value": "wallet"}
      ])
    );
  }
}
