// storefront/src/web/handlers/callback_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use crate::errors::AppError;
use crate::pipelines::contexts::{CallbackSource, ReconcileCtxData};
use crate::pipelines::reconcile_pipeline::reconcile;
use crate::state::AppState;

/// Gateway webhook. Always answers 200 so the gateway does not retry;
/// the outcome is only visible in the logs.
#[instrument(name = "handler::xpay_callback", skip_all, fields(bytes = body.len()))]
pub async fn xpay_callback_handler(app_state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
  // Webhook deliveries carry no visitor cookie, so there is no cart to touch here.
  let ctx = ReconcileCtxData::new(
    app_state.get_ref().clone(),
    CallbackSource::Webhook { body: body.to_vec() },
    None,
  );

  let status = match reconcile(&app_state, ctx).await {
    Ok(outcome) => {
      info!(
        transaction_id = %outcome.transaction_id,
        status = %outcome.status,
        notified = outcome.notified,
        "XPay callback reconciled."
      );
      "received"
    }
    Err(e @ (AppError::Unauthorized(_) | AppError::InvalidCallback(_))) => {
      warn!(error = %e, "XPay callback rejected.");
      "rejected"
    }
    Err(e) => {
      error!(error = %e, "XPay callback processing failed.");
      "failed"
    }
  };
  HttpResponse::Ok().json(json!({ "status": status }))
}
