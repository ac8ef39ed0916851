// storefront/src/web/handlers/checkout_handlers.rs

use actix_web::http::header::LOCATION;
use actix_web::{web, HttpResponse};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{info, instrument, warn};
use url::{form_urlencoded, Url};

use crate::errors::{AppError, Result as AppResult};
use crate::models::{BillingData, CurrencyCode, Language, PaymentMethod, TransactionStatus};
use crate::pipelines::checkout_pipeline::{run_payment, run_prepare, CheckoutQuote, PaymentStarted};
use crate::pipelines::contexts::{CallbackSource, CheckoutCtxData, ReconcileCtxData};
use crate::pipelines::reconcile_pipeline::reconcile;
use crate::state::AppState;
use crate::web::extractors::CartSession;

#[derive(Deserialize, Debug, Default)]
pub struct PreparePayload {
  #[serde(default)]
  pub currency: Option<CurrencyCode>,
  #[serde(default, rename = "paymentMethod", alias = "payment_method")]
  pub payment_method: Option<PaymentMethod>,
}

#[derive(Deserialize, Debug, Default)]
pub struct PayPayload {
  #[serde(default, rename = "billingData", alias = "billing_data")]
  pub billing_data: Option<BillingData>,
  #[serde(default)]
  pub currency: Option<CurrencyCode>,
  #[serde(default, rename = "paymentMethod", alias = "payment_method")]
  pub payment_method: Option<PaymentMethod>,
  #[serde(default)]
  pub language: Option<Language>,
}

/// Checkout bodies are optional; an empty body means "all defaults".
fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> AppResult<T> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(T::default());
  }
  serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))
}

#[instrument(name = "handler::checkout_prepare", skip_all)]
pub async fn prepare_handler(
  app_state: web::Data<AppState>,
  session: CartSession,
  body: web::Bytes,
) -> AppResult<HttpResponse> {
  let payload: PreparePayload = optional_json(&body)?;
  let ctx = CheckoutCtxData::new(
    app_state.get_ref().clone(),
    session.store(),
    payload.currency.unwrap_or_else(|| app_state.config.default_currency.clone()),
    payload.payment_method.unwrap_or_default(),
    Language::default(),
    None,
  );

  let CheckoutQuote { prepared, cart_lines } = run_prepare(&app_state, ctx).await?;
  info!(total = %prepared.total_amount, "Checkout amount prepared.");
  session.respond(HttpResponse::Ok().json(json!({
    "original_amount": prepared.original_amount.to_major(),
    "total_amount": prepared.total_amount.to_major(),
    "currency": prepared.currency,
    "cart_items": cart_lines,
  })))
}

#[instrument(name = "handler::checkout_pay", skip_all)]
pub async fn pay_handler(
  app_state: web::Data<AppState>,
  session: CartSession,
  body: web::Bytes,
) -> AppResult<HttpResponse> {
  let payload: PayPayload = optional_json(&body)?;
  let ctx = CheckoutCtxData::new(
    app_state.get_ref().clone(),
    session.store(),
    payload.currency.unwrap_or_else(|| app_state.config.default_currency.clone()),
    payload.payment_method.unwrap_or_default(),
    payload.language.unwrap_or_default(),
    payload.billing_data,
  );

  let PaymentStarted { transaction, prepared } = run_payment(&app_state, ctx).await?;
  info!(transaction_id = %transaction.transaction_id, "Buyer handed off to the gateway.");
  session.respond(HttpResponse::Ok().json(json!({
    "iframe_url": transaction.iframe_url,
    "transaction_id": transaction.transaction_id,
    "transaction_uuid": transaction.transaction_uuid,
    "transaction_status": transaction.status,
    "amounts": {
      "original": prepared.original_amount.to_major(),
      "total": prepared.total_amount.to_major(),
      "currency": prepared.currency,
    },
  })))
}

fn redirect_target(base: &str, path: &str, params: &[(&str, &str)]) -> String {
  match Url::parse(base).and_then(|b| b.join(path)) {
    Ok(mut url) => {
      if !params.is_empty() {
        let mut query = url.query_pairs_mut();
        for (k, v) in params {
          query.append_pair(k, v);
        }
      }
      url.to_string()
    }
    Err(e) => {
      warn!(error = %e, %base, "APP_BASE_URL is not a valid URL; redirecting relatively.");
      let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().copied())
        .finish();
      if query.is_empty() {
        path.to_string()
      } else {
        format!("{}?{}", path, query)
      }
    }
  }
}

/// Buyer returns here from the gateway. Always answers with a 303.
#[instrument(name = "handler::checkout_success", skip_all)]
pub async fn success_redirect_handler(
  app_state: web::Data<AppState>,
  session: CartSession,
  query: web::Query<HashMap<String, String>>,
) -> AppResult<HttpResponse> {
  let base = app_state.config.app_base_url.as_str();
  let ctx = ReconcileCtxData::new(
    app_state.get_ref().clone(),
    CallbackSource::Redirect {
      query: query.into_inner(),
    },
    Some(session.store()),
  );

  let location = match reconcile(&app_state, ctx).await {
    Ok(outcome) => match outcome.status {
      TransactionStatus::Successful => {
        let mut params = vec![("transaction_id", outcome.transaction_id.as_str())];
        if let Some(member_id) = outcome.member_id.as_deref() {
          params.push(("member_id", member_id));
        }
        redirect_target(base, "/checkout/success", &params)
      }
      TransactionStatus::Failed => redirect_target(base, "/cart", &[("error", "payment_failed")]),
      TransactionStatus::Pending => redirect_target(base, "/cart", &[("error", "payment_pending")]),
    },
    Err(AppError::InvalidCallback(reason)) => {
      warn!(%reason, "Success redirect without a usable transaction.");
      redirect_target(base, "/cart", &[("error", "missing_transaction")])
    }
    Err(e) => {
      warn!(error = %e, "Success redirect could not be reconciled.");
      redirect_target(base, "/cart", &[("error", "payment_processing")])
    }
  };

  session.respond(HttpResponse::SeeOther().insert_header((LOCATION, location)).finish())
}
