// storefront/src/services/notifier.rs

//! Payment confirmation e-mails. Delivery is best-effort: failures are
//! reported to the caller, who logs them and moves on.

use crate::models::{CurrencyCode, Money, TransactionId};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

pub const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
  pub transaction_id: TransactionId,
  pub amount: Option<Money>,
  pub currency: CurrencyCode,
  pub buyer_email: Option<String>,
  pub buyer_name: Option<String>,
  pub payment_method: Option<String>,
  pub transaction_uuid: Option<String>,
  pub member_id: Option<String>,
  pub cart_items_count: Option<u32>,
}

impl PaymentReceipt {
  fn amount_display(&self) -> String {
    match self.amount {
      Some(amount) => format!("{} {}", amount, self.currency),
      None => "an unreported amount".to_string(),
    }
  }
}

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("e-mail request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("e-mail provider responded with HTTP {status}: {body}")]
  Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
  async fn payment_succeeded(&self, receipt: &PaymentReceipt) -> Result<(), NotifyError>;
}

/// Logs instead of sending. Used when no e-mail provider is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
  async fn payment_succeeded(&self, receipt: &PaymentReceipt) -> Result<(), NotifyError> {
    info!(
      transaction_id = %receipt.transaction_id,
      amount = %receipt.amount_display(),
      buyer_notified = receipt.buyer_email.is_some(),
      "Payment succeeded (no e-mail provider configured)."
    );
    Ok(())
  }
}

#[derive(Serialize)]
struct Email<'a> {
  from: &'a str,
  to: Vec<&'a str>,
  subject: String,
  html: String,
}

pub struct ResendNotifier {
  http: reqwest::Client,
  api_key: String,
  sender: String,
  admin_email: Option<String>,
  endpoint: String,
}

impl ResendNotifier {
  pub fn new(api_key: String, sender: String, admin_email: Option<String>) -> Self {
    Self {
      http: reqwest::Client::new(),
      api_key,
      sender,
      admin_email,
      endpoint: RESEND_ENDPOINT.to_string(),
    }
  }

  pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = endpoint.into();
    self
  }

  async fn send(&self, email: &Email<'_>) -> Result<(), NotifyError> {
    let response = self
      .http
      .post(&self.endpoint)
      .bearer_auth(&self.api_key)
      .json(email)
      .send()
      .await?;
    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(NotifyError::Rejected {
        status: status.as_u16(),
        body,
      });
    }
    Ok(())
  }

  fn buyer_email<'a>(&'a self, to: &'a str, receipt: &PaymentReceipt) -> Email<'a> {
    Email {
      from: &self.sender,
      to: vec![to],
      subject: format!("Payment Confirmation - Order #{}", receipt.transaction_id),
      html: format!(
        "<h1>Payment Confirmed!</h1>\
         <p>Dear {},</p>\
         <p>Your payment has been successfully processed.</p>\
         <p><strong>Transaction ID:</strong> {}</p>\
         <p><strong>Amount:</strong> {}</p>\
         <p><strong>Payment Method:</strong> {}</p>\
         <p>Thank you for your purchase! We'll process your order shortly.</p>",
        escape(receipt.buyer_name.as_deref().unwrap_or("customer")),
        escape(receipt.transaction_id.as_str()),
        escape(&receipt.amount_display()),
        escape(receipt.payment_method.as_deref().unwrap_or("unknown")),
      ),
    }
  }

  fn admin_email<'a>(&'a self, to: &'a str, receipt: &PaymentReceipt) -> Email<'a> {
    Email {
      from: &self.sender,
      to: vec![to],
      subject: format!("New Payment Received - {}", receipt.amount_display()),
      html: format!(
        "<h1>New Payment Received</h1>\
         <p><strong>Transaction ID:</strong> {}</p>\
         <p><strong>Transaction UUID:</strong> {}</p>\
         <p><strong>Amount:</strong> {}</p>\
         <p><strong>Payment Method:</strong> {}</p>\
         <p><strong>Customer:</strong> {}</p>\
         <p><strong>Customer Email:</strong> {}</p>\
         <p><strong>Member ID:</strong> {}</p>\
         <p><strong>Cart lines:</strong> {}</p>",
        escape(receipt.transaction_id.as_str()),
        escape(receipt.transaction_uuid.as_deref().unwrap_or("unknown")),
        escape(&receipt.amount_display()),
        escape(receipt.payment_method.as_deref().unwrap_or("unknown")),
        escape(receipt.buyer_name.as_deref().unwrap_or("unknown")),
        escape(receipt.buyer_email.as_deref().unwrap_or("unknown")),
        escape(receipt.member_id.as_deref().unwrap_or("guest")),
        receipt.cart_items_count.map_or_else(|| "unknown".to_string(), |n| n.to_string()),
      ),
    }
  }
}

#[async_trait]
impl Notifier for ResendNotifier {
  #[instrument(name = "notifier::payment_succeeded", skip_all, fields(transaction_id = %receipt.transaction_id))]
  async fn payment_succeeded(&self, receipt: &PaymentReceipt) -> Result<(), NotifyError> {
    let mut first_error = None;

    if let Some(to) = receipt.buyer_email.as_deref() {
      match self.send(&self.buyer_email(to, receipt)).await {
        Ok(()) => info!("Buyer confirmation e-mail sent."),
        Err(e) => {
          warn!(error = %e, "Buyer confirmation e-mail failed.");
          first_error.get_or_insert(e);
        }
      }
    }
    if let Some(to) = self.admin_email.as_deref() {
      match self.send(&self.admin_email(to, receipt)).await {
        Ok(()) => info!("Admin payment notification sent."),
        Err(e) => {
          warn!(error = %e, "Admin payment notification failed.");
          first_error.get_or_insert(e);
        }
      }
    }

    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }
}

fn escape(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for c in raw.chars() {
    match c {
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '&' => out.push_str("&amp;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      c => out.push(c),
    }
  }
  out
}
