// storefront/src/services/xpay.rs

//! XPay HTTP client. The only code that talks to the payment gateway.
//!
//! Every response is wrapped in `{"status": {"code", "message", "errors"}, "data": {...}}`.
//! Amounts travel as decimal major units.

use crate::models::money::major_units;
use crate::models::{BillingData, CurrencyCode, CustomField, Language, Money, PaymentMethod, Transaction, TransactionId, TransactionStatus};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

const API_KEY_HEADER: &str = "x-api-key";
const PREPARE_AMOUNT_PATH: &str = "payments/prepare-amount/";
const CREATE_PAYMENT_PATH: &str = "payments/pay/variable-amount/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XPayEnvironment {
  Staging,
  Production,
}

impl XPayEnvironment {
  pub fn base_url(self) -> &'static str {
    match self {
      XPayEnvironment::Staging => "https://staging.xpay.app/api/v1",
      XPayEnvironment::Production => "https://community.xpay.app/api/v1",
    }
  }
}

impl FromStr for XPayEnvironment {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "staging" => Ok(XPayEnvironment::Staging),
      "production" | "prod" => Ok(XPayEnvironment::Production),
      other => Err(format!("Unknown XPAY_ENVIRONMENT '{}', expected staging or production", other)),
    }
  }
}

#[derive(Clone)]
pub struct GatewayConfig {
  pub api_key: String,
  pub community_id: String,
  pub variable_amount_id: u64,
  pub base_url: String,
  pub timeout: Duration,
}

impl fmt::Debug for GatewayConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("GatewayConfig")
      .field("api_key", &"[REDACTED]")
      .field("community_id", &self.community_id)
      .field("variable_amount_id", &self.variable_amount_id)
      .field("base_url", &self.base_url)
      .field("timeout", &self.timeout)
      .finish()
  }
}

#[derive(Debug, Error)]
pub enum GatewayError {
  #[error("gateway responded with HTTP {status}: {body}")]
  Status { status: u16, body: String },

  #[error("gateway response (HTTP {status}) could not be read: {reason}")]
  Decode { status: u16, reason: String },

  #[error("gateway rejected the request ({code}): {message}")]
  Rejected {
    code: i64,
    message: String,
    errors: Vec<String>,
  },

  #[error("gateway request failed: {0}")]
  Transport(#[from] reqwest::Error),
}

// --- Wire payloads ---

#[derive(Debug, Clone, Serialize)]
pub struct PrepareAmountRequest {
  #[serde(with = "major_units")]
  pub amount: Money,
  pub currency: CurrencyCode,
  pub selected_payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrepareAmountData {
  #[serde(with = "major_units")]
  pub total_amount: Money,
  #[serde(default)]
  pub total_amount_currency: Option<CurrencyCode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePaymentRequest {
  pub billing_data: BillingData,
  #[serde(with = "major_units")]
  pub amount: Money,
  #[serde(with = "major_units")]
  pub original_amount: Money,
  pub currency: CurrencyCode,
  pub language: Language,
  pub pay_using: PaymentMethod,
  pub custom_fields: Vec<CustomField>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentData {
  pub iframe_url: String,
  pub transaction_id: TransactionId,
  #[serde(default)]
  pub transaction_status: Option<String>,
  #[serde(default)]
  pub transaction_uuid: String,
}

impl From<CreatePaymentData> for Transaction {
  fn from(data: CreatePaymentData) -> Self {
    Transaction {
      transaction_id: data.transaction_id,
      transaction_uuid: data.transaction_uuid,
      status: data
        .transaction_status
        .as_deref()
        .map_or(TransactionStatus::Pending, TransactionStatus::parse),
      iframe_url: data.iframe_url,
    }
  }
}

/// Adds the account identifiers every request carries.
#[derive(Serialize)]
struct Authored<'a, T: Serialize> {
  #[serde(flatten)]
  request: &'a T,
  community_id: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  variable_amount_id: Option<u64>,
}

#[derive(Deserialize)]
struct Envelope<T> {
  status: EnvelopeStatus,
  #[serde(default = "Option::default")]
  data: Option<T>,
}

#[derive(Deserialize)]
struct EnvelopeStatus {
  code: i64,
  #[serde(default)]
  message: String,
  #[serde(default)]
  errors: Vec<JsonValue>,
}

pub struct XPayClient {
  http: reqwest::Client,
  config: GatewayConfig,
}

impl XPayClient {
  pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
    let http = reqwest::Client::builder().timeout(config.timeout).build()?;
    Ok(Self { http, config })
  }

  pub fn community_id(&self) -> &str {
    &self.config.community_id
  }

  #[instrument(name = "xpay::prepare_amount", skip(self, request), fields(amount = %request.amount, currency = %request.currency))]
  pub async fn prepare_amount(&self, request: &PrepareAmountRequest) -> Result<PrepareAmountData, GatewayError> {
    let body = Authored {
      request,
      community_id: &self.config.community_id,
      variable_amount_id: None,
    };
    self.post(PREPARE_AMOUNT_PATH, &body).await
  }

  #[instrument(name = "xpay::create_payment", skip(self, request), fields(amount = %request.amount, currency = %request.currency))]
  pub async fn create_payment(&self, request: &CreatePaymentRequest) -> Result<Transaction, GatewayError> {
    let body = Authored {
      request,
      community_id: &self.config.community_id,
      variable_amount_id: Some(self.config.variable_amount_id),
    };
    let data: CreatePaymentData = self.post(CREATE_PAYMENT_PATH, &body).await?;
    Ok(data.into())
  }

  async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, GatewayError> {
    let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
    let response = self
      .http
      .post(&url)
      .header(API_KEY_HEADER, &self.config.api_key)
      .json(body)
      .send()
      .await?;

    let status = response.status();
    let text = self.scrub(&response.text().await?);
    info!(%status, %path, "Gateway responded.");

    if !status.is_success() {
      warn!(%status, body = %text, "Gateway returned a non-success status.");
      return Err(GatewayError::Status {
        status: status.as_u16(),
        body: text,
      });
    }

    let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| GatewayError::Decode {
      status: status.as_u16(),
      reason: format!("{}: {}", e, text),
    })?;
    if !(200..300).contains(&envelope.status.code) {
      let errors = envelope
        .status
        .errors
        .iter()
        .map(|e| match e {
          JsonValue::String(s) => s.clone(),
          other => other.to_string(),
        })
        .collect::<Vec<_>>();
      warn!(code = envelope.status.code, message = %envelope.status.message, ?errors, "Gateway rejected the request.");
      return Err(GatewayError::Rejected {
        code: envelope.status.code,
        message: envelope.status.message,
        errors,
      });
    }
    debug!(code = envelope.status.code, "Gateway envelope accepted.");
    envelope.data.ok_or_else(|| GatewayError::Decode {
      status: status.as_u16(),
      reason: "response carried no data".to_string(),
    })
  }

  fn scrub(&self, text: &str) -> String {
    if self.config.api_key.is_empty() {
      text.to_string()
    } else {
      text.replace(&self.config.api_key, "[REDACTED]")
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::PaymentMetadata;
  use serde_json::json;

  #[test]
  fn create_payment_body_carries_major_units_and_account_ids() {
    let request = CreatePaymentRequest {
      billing_data: BillingData {
        name: "Mona".into(),
        email: "mona@example.com".into(),
        phone_number: "+201000000000".into(),
      },
      amount: Money::from_minor(21_000),
      original_amount: Money::from_minor(20_000),
      currency: CurrencyCode::default(),
      language: Language::En,
      pay_using: PaymentMethod::default(),
      custom_fields: PaymentMetadata {
        cart_items_count: 1,
        order_timestamp: 1,
        buyer_email: None,
        buyer_name: None,
        payment_method: None,
      }
      .custom_fields(),
    };
    let body = serde_json::to_value(Authored {
      request: &request,
      community_id: "c-1",
      variable_amount_id: Some(77),
    })
    .unwrap();
    assert_eq!(body["amount"], json!(210.0));
    assert_eq!(body["original_amount"], json!(200.0));
    assert_eq!(body["community_id"], json!("c-1"));
    assert_eq!(body["variable_amount_id"], json!(77));
    assert_eq!(body["pay_using"], json!("card"));
    assert_eq!(body["language"], json!("en"));
    assert_eq!(body["billing_data"]["phone_number"], json!("+201000000000"));
  }

  #[test]
  fn prepare_body_omits_variable_amount_id() {
    let request = PrepareAmountRequest {
      amount: Money::from_minor(20_000),
      currency: CurrencyCode::default(),
      selected_payment_method: PaymentMethod::default(),
    };
    let body = serde_json::to_value(Authored {
      request: &request,
      community_id: "c-1",
      variable_amount_id: None,
    })
    .unwrap();
    assert!(body.get("variable_amount_id").is_none());
    assert_eq!(body["selected_payment_method"], json!("card"));
  }

  #[test]
  fn debug_never_shows_the_key() {
    let config = GatewayConfig {
      api_key: "xpay_secret_key".into(),
      community_id: "c".into(),
      variable_amount_id: 1,
      base_url: XPayEnvironment::Staging.base_url().into(),
      timeout: Duration::from_secs(1),
    };
    assert!(!format!("{:?}", config).contains("xpay_secret_key"));
  }
}
