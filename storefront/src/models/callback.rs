// storefront/src/models/callback.rs

//! Terminal transaction state as reported back by the gateway, either in the
//! server-to-server webhook body or in the buyer's redirect query string.

use crate::errors::{AppError, Result as AppResult};
use crate::models::money::{major_units, minor_units};
use crate::models::payment::PaymentMetadata;
use crate::models::{Money, TransactionId, TransactionStatus};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentNotification {
  pub transaction_id: TransactionId,
  pub status: TransactionStatus,
  pub merchant_id: Option<String>,
  pub member_id: Option<String>,
  pub payment_id: Option<String>,
  /// Decimal major units as reported by the gateway.
  pub total_amount: Option<Money>,
  /// Same total in minor units. Authoritative when both are present.
  pub total_amount_piasters: Option<Money>,
  pub buyer_email: Option<String>,
  pub buyer_name: Option<String>,
  pub payment_method: Option<String>,
  pub transaction_uuid: Option<String>,
  pub cart_items_count: Option<u32>,
}

/// Only the identity fields are strict. Everything else is read leniently so a
/// malformed informational field never drops a genuine outcome.
#[derive(Deserialize)]
struct WebhookBody {
  #[serde(default, deserialize_with = "super::flexible_string::option::deserialize")]
  transaction_id: Option<String>,
  #[serde(default)]
  transaction_status: Option<JsonValue>,
  #[serde(default)]
  merchant_id: Option<JsonValue>,
  #[serde(default)]
  member_id: Option<JsonValue>,
  #[serde(default)]
  payment_id: Option<JsonValue>,
  #[serde(default)]
  transaction_uuid: Option<JsonValue>,
  #[serde(default)]
  total_amount: Option<JsonValue>,
  #[serde(default)]
  total_amount_piasters: Option<JsonValue>,
  #[serde(flatten)]
  extra: HashMap<String, JsonValue>,
}

impl PaymentNotification {
  pub fn from_webhook_body(body: &[u8]) -> AppResult<Self> {
    let wire: WebhookBody = serde_json::from_slice(body)
      .map_err(|e| AppError::InvalidCallback(format!("Callback body could not be parsed: {}", e)))?;

    let transaction_id = wire
      .transaction_id
      .as_deref()
      .and_then(TransactionId::parse)
      .ok_or_else(|| AppError::InvalidCallback("transaction_id is missing".to_string()))?;
    let status = wire
      .transaction_status
      .as_ref()
      .and_then(JsonValue::as_str)
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(TransactionStatus::parse)
      .ok_or_else(|| AppError::InvalidCallback("transaction_status is missing".to_string()))?;

    Ok(Self {
      transaction_id,
      status,
      merchant_id: wire.merchant_id.as_ref().and_then(scalar_to_string),
      member_id: wire.member_id.as_ref().and_then(scalar_to_string),
      payment_id: wire.payment_id.as_ref().and_then(scalar_to_string),
      transaction_uuid: wire.transaction_uuid.as_ref().and_then(scalar_to_string),
      total_amount: lenient_amount("total_amount", wire.total_amount, major_units::option::deserialize),
      total_amount_piasters: lenient_amount(
        "total_amount_piasters",
        wire.total_amount_piasters,
        minor_units::option::deserialize,
      ),
      buyer_email: custom_field(&wire.extra, PaymentMetadata::BUYER_EMAIL),
      buyer_name: custom_field(&wire.extra, PaymentMetadata::BUYER_NAME),
      payment_method: custom_field(&wire.extra, PaymentMetadata::PAYMENT_METHOD),
      cart_items_count: custom_field(&wire.extra, PaymentMetadata::CART_ITEMS_COUNT).and_then(|v| v.parse().ok()),
    })
  }

  /// The buyer lands here after paying, so an absent status is read as success.
  /// The reconciler still prefers any status the webhook already recorded.
  pub fn from_redirect_query(query: &HashMap<String, String>) -> AppResult<Self> {
    let transaction_id = query
      .get("transaction_id")
      .and_then(TransactionId::parse)
      .ok_or_else(|| AppError::InvalidCallback("transaction_id is missing".to_string()))?;
    let status = query
      .get("transaction_status")
      .map(|s| s.trim())
      .filter(|s| !s.is_empty())
      .map_or(TransactionStatus::Successful, TransactionStatus::parse);

    Ok(Self {
      transaction_id,
      status,
      merchant_id: None,
      member_id: non_empty(query.get("member_id").cloned()),
      payment_id: None,
      total_amount: None,
      total_amount_piasters: None,
      buyer_email: None,
      buyer_name: None,
      payment_method: None,
      transaction_uuid: None,
      cart_items_count: None,
    })
  }

  pub fn authoritative_total(&self) -> Option<Money> {
    self.total_amount_piasters.or(self.total_amount)
  }

  /// `(major, minor)` when both totals are present and disagree.
  pub fn amount_mismatch(&self) -> Option<(Money, Money)> {
    match (self.total_amount, self.total_amount_piasters) {
      (Some(major), Some(minor)) if major != minor => Some((major, minor)),
      _ => None,
    }
  }
}

fn lenient_amount(
  field: &str,
  value: Option<JsonValue>,
  convert: fn(JsonValue) -> Result<Option<Money>, serde_json::Error>,
) -> Option<Money> {
  let value = value?;
  match convert(value) {
    Ok(amount) => amount,
    Err(e) => {
      warn!(field, error = %e, "Ignoring unreadable amount in callback.");
      None
    }
  }
}

fn non_empty(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn scalar_to_string(value: &JsonValue) -> Option<String> {
  match value {
    JsonValue::String(s) => non_empty(Some(s.clone())),
    JsonValue::Number(n) => Some(n.to_string()),
    JsonValue::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

// Custom fields come back either flattened onto the body or as the
// `[{field_label, field_value}]` list they were sent as.
fn custom_field(extra: &HashMap<String, JsonValue>, label: &str) -> Option<String> {
  if let Some(value) = extra.get(label).and_then(scalar_to_string) {
    return Some(value);
  }
  extra
    .get("custom_fields")
    .and_then(JsonValue::as_array)?
    .iter()
    .find(|f| f.get("field_label").and_then(JsonValue::as_str) == Some(label))
    .and_then(|f| f.get("field_value"))
    .and_then(scalar_to_string)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn body(value: JsonValue) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
  }

  #[test]
  fn parses_a_full_webhook() {
    let raw = body(json!({
      "member_id": null,
      "payment_id": "pay_1",
      "merchant_id": "community-1",
      "total_amount": 210.0,
      "transaction_id": 987,
      "transaction_status": "SUCCESSFUL",
      "total_amount_piasters": 21000,
      "custom_fields": [
        {"field_label": "cart_items_count", "field_value": "3"},
        {"field_label": "buyer_email", "field_value": "buyer@example.com"}
      ]
    }));
    let n = PaymentNotification::from_webhook_body(&raw).unwrap();
    assert_eq!(n.transaction_id.as_str(), "987");
    assert_eq!(n.status, TransactionStatus::Successful);
    assert_eq!(n.member_id, None);
    assert_eq!(n.cart_items_count, Some(3));
    assert_eq!(n.buyer_email.as_deref(), Some("buyer@example.com"));
    assert_eq!(n.amount_mismatch(), None);
    assert_eq!(n.authoritative_total(), Some(Money::from_minor(21_000)));
  }

  #[test]
  fn flattened_custom_fields_are_read() {
    let raw = body(json!({
      "transaction_id": "t-1",
      "transaction_status": "FAILED",
      "cart_items_count": 2
    }));
    let n = PaymentNotification::from_webhook_body(&raw).unwrap();
    assert_eq!(n.status, TransactionStatus::Failed);
    assert_eq!(n.cart_items_count, Some(2));
  }

  #[test]
  fn missing_identity_is_rejected() {
    let no_id = body(json!({"transaction_status": "SUCCESSFUL"}));
    let no_status = body(json!({"transaction_id": "t-1", "transaction_status": ""}));
    assert!(matches!(
      PaymentNotification::from_webhook_body(&no_id),
      Err(AppError::InvalidCallback(_))
    ));
    assert!(matches!(
      PaymentNotification::from_webhook_body(&no_status),
      Err(AppError::InvalidCallback(_))
    ));
    assert!(matches!(
      PaymentNotification::from_webhook_body(b"{not json"),
      Err(AppError::InvalidCallback(_))
    ));
  }

  #[test]
  fn mismatched_totals_are_reported() {
    let raw = body(json!({
      "transaction_id": "t-2",
      "transaction_status": "SUCCESSFUL",
      "total_amount": 210,
      "total_amount_piasters": 210
    }));
    let n = PaymentNotification::from_webhook_body(&raw).unwrap();
    assert_eq!(
      n.amount_mismatch(),
      Some((Money::from_minor(21_000), Money::from_minor(210)))
    );
    assert_eq!(n.authoritative_total(), Some(Money::from_minor(210)));
  }

  #[test]
  fn unreadable_informational_fields_do_not_reject_the_callback() {
    let raw = body(json!({
      "transaction_id": 4242,
      "transaction_status": "SUCCESSFUL",
      "merchant_id": "community-1",
      "member_id": {"nested": true},
      "total_amount": "",
      "total_amount_piasters": "lots",
      "transaction_uuid": "3c1e1f0a",
      "custom_fields": [
        {"field_label": "buyer_name", "field_value": "Mona Adel"},
        {"field_label": "payment_method", "field_value": "card"}
      ]
    }));
    let n = PaymentNotification::from_webhook_body(&raw).unwrap();
    assert_eq!(n.transaction_id.as_str(), "4242");
    assert_eq!(n.status, TransactionStatus::Successful);
    assert_eq!(n.merchant_id.as_deref(), Some("community-1"));
    assert_eq!(n.member_id, None);
    assert_eq!(n.authoritative_total(), None);
    assert_eq!(n.transaction_uuid.as_deref(), Some("3c1e1f0a"));
    assert_eq!(n.buyer_name.as_deref(), Some("Mona Adel"));
    assert_eq!(n.payment_method.as_deref(), Some("card"));
  }

  #[test]
  fn redirect_defaults_to_success() {
    let mut query = HashMap::new();
    query.insert("transaction_id".to_string(), "55".to_string());
    query.insert("member_id".to_string(), "m-9".to_string());
    let n = PaymentNotification::from_redirect_query(&query).unwrap();
    assert_eq!(n.status, TransactionStatus::Successful);
    assert_eq!(n.member_id.as_deref(), Some("m-9"));

    query.remove("transaction_id");
    assert!(PaymentNotification::from_redirect_query(&query).is_err());
  }
}
