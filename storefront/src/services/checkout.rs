// storefront/src/services/checkout.rs

//! Amount preparation and payment initiation against the gateway.

use crate::errors::{AppError, Result as AppResult};
use crate::models::money::major_units;
use crate::models::{BillingData, CurrencyCode, Language, Money, PaymentMetadata, PaymentMethod, Transaction};
use crate::services::xpay::{CreatePaymentRequest, GatewayError, PrepareAmountRequest, XPayClient};
use serde::Serialize;
use tracing::{info, instrument};

/// Final payable total quoted by the gateway, fees included. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedAmount {
  #[serde(with = "major_units")]
  pub original_amount: Money,
  #[serde(with = "major_units")]
  pub total_amount: Money,
  pub currency: CurrencyCode,
}

#[instrument(skip(gateway), fields(amount = %amount, currency = %currency))]
pub async fn prepare_amount(
  gateway: &XPayClient,
  amount: Money,
  currency: &CurrencyCode,
  payment_method: &PaymentMethod,
) -> AppResult<PreparedAmount> {
  if !amount.is_positive() {
    return Err(AppError::InvalidCart("Invalid cart total".to_string()));
  }
  let data = gateway
    .prepare_amount(&PrepareAmountRequest {
      amount,
      currency: currency.clone(),
      selected_payment_method: payment_method.clone(),
    })
    .await?;

  if !data.total_amount.is_positive() {
    return Err(
      GatewayError::Decode {
        status: 200,
        reason: format!("non-positive total_amount {}", data.total_amount),
      }
      .into(),
    );
  }
  let prepared = PreparedAmount {
    original_amount: amount,
    total_amount: data.total_amount,
    currency: data.total_amount_currency.unwrap_or_else(|| currency.clone()),
  };
  info!(total = %prepared.total_amount, "Gateway prepared amount.");
  Ok(prepared)
}

/// Creates the gateway transaction. No local state changes here.
#[instrument(skip(gateway, billing, metadata), fields(total = %prepared.total_amount))]
pub async fn create_payment(
  gateway: &XPayClient,
  billing: &BillingData,
  prepared: &PreparedAmount,
  payment_method: &PaymentMethod,
  language: Language,
  metadata: &PaymentMetadata,
) -> AppResult<Transaction> {
  if !prepared.total_amount.is_positive() {
    return Err(AppError::InvalidCart("Invalid payment total".to_string()));
  }
  let transaction = gateway
    .create_payment(&CreatePaymentRequest {
      billing_data: billing.clone(),
      amount: prepared.total_amount,
      original_amount: prepared.original_amount,
      currency: prepared.currency.clone(),
      language,
      pay_using: payment_method.clone(),
      custom_fields: metadata.custom_fields(),
    })
    .await?;
  info!(transaction_id = %transaction.transaction_id, status = %transaction.status, "Gateway transaction created.");
  Ok(transaction)
}
