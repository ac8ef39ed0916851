// storefront/src/pipelines/reconcile_pipeline.rs

//! Applies a gateway-reported transaction outcome to local state.
//!
//! Webhooks are authenticated by merchant id and are the source of truth for
//! status; only they write ledger entries. Redirects carry the buyer's cart
//! cookie, so they are where the cart actually gets cleared, and only a cart
//! bound to the reported transaction at pay time is cleared.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{PaymentNotification, TransactionStatus};
use crate::pipelines::common_steps::{missing, run_registered, skip_when};
use crate::pipelines::contexts::{CallbackSource, ReconcileCtxData, ReconcileOutcome};
use crate::services::cart_service;
use crate::services::notifier::PaymentReceipt;
use crate::state::AppState;
use stepflow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{info, instrument, warn};

pub fn build_reconcile_pipeline() -> Pipeline<ReconcileCtxData, AppError> {
  let mut p = Pipeline::<ReconcileCtxData, AppError>::new(&[
    ("parse_notification", false, None),
    (
      "verify_merchant",
      false,
      skip_when(|d: &ReconcileCtxData| !d.source.is_webhook()),
    ),
    ("resolve_transaction_status", false, None),
    (
      "clear_cart_on_success",
      false,
      skip_when(|d: &ReconcileCtxData| d.cart.is_none()),
    ),
    (
      "notify_payment_parties",
      true,
      skip_when(|d: &ReconcileCtxData| !d.source.is_webhook()),
    ),
  ]);

  p.on_root("parse_notification", |ctx_data: ContextData<ReconcileCtxData>| {
    Box::pin(async move {
      let source = ctx_data.with(|d| d.source.clone());
      let notification = match &source {
        CallbackSource::Webhook { body } => PaymentNotification::from_webhook_body(body)?,
        CallbackSource::Redirect { query } => PaymentNotification::from_redirect_query(query)?,
      };
      info!(
        source = source.label(),
        transaction_id = %notification.transaction_id,
        reported_status = %notification.status,
        "Reconcile Pipeline: Notification parsed."
      );
      ctx_data.update(|d| d.notification = Some(notification));
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("verify_merchant", |ctx_data: ContextData<ReconcileCtxData>| {
    Box::pin(async move {
      let (merchant_id, expected) = ctx_data.with(|d| {
        (
          d.notification.as_ref().and_then(|n| n.merchant_id.clone()),
          d.app_state.config.xpay_community_id.clone(),
        )
      });
      if merchant_id.as_deref() != Some(expected.as_str()) {
        warn!(merchant_id = ?merchant_id, "Reconcile Pipeline: Merchant id does not match this community.");
        return Err(AppError::Unauthorized("Merchant id mismatch".to_string()));
      }
      Ok(PipelineControl::Continue)
    })
  });

  p.on_root("resolve_transaction_status", |ctx_data: ContextData<ReconcileCtxData>| {
    Box::pin(async move {
      let (notification, is_webhook, ledger) =
        ctx_data.with(|d| (d.notification.clone(), d.source.is_webhook(), d.app_state.ledger.clone()));
      let notification = notification.ok_or_else(|| missing("notification"))?;
      let id = &notification.transaction_id;

      if let Some((major, minor)) = notification.amount_mismatch() {
        warn!(
          transaction_id = %id,
          total_amount = %major,
          total_amount_piasters = %minor,
          "Reconcile Pipeline: Reported totals disagree; using the minor-unit value."
        );
      }

      let status = if is_webhook {
        ledger.record_status(id, notification.status).await?.status
      } else {
        // Redirect query strings are buyer-controlled; prefer what the webhook recorded.
        match ledger.get(id).await? {
          Some(entry) if entry.status.is_terminal() => entry.status,
          _ => notification.status,
        }
      };
      ctx_data.update(|d| d.status = Some(status));

      if status != TransactionStatus::Successful {
        info!(transaction_id = %id, %status, "Reconcile Pipeline: Not successful; cart left untouched.");
        return Ok(PipelineControl::Stop);
      }
      info!(transaction_id = %id, "Reconcile Pipeline: Payment successful.");
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("clear_cart_on_success", |ctx_data: ContextData<ReconcileCtxData>| {
    Box::pin(async move {
      let (id, store, ledger) = ctx_data.with(|d| {
        (
          d.notification.as_ref().map(|n| n.transaction_id.clone()),
          d.cart.clone(),
          d.app_state.ledger.clone(),
        )
      });
      let id = id.ok_or_else(|| missing("notification"))?;
      let store = store.ok_or_else(|| missing("cart store"))?;

      if !cart_service::clear_paid_cart(store.as_ref(), &id)? {
        info!(transaction_id = %id, "Reconcile Pipeline: Cart is not bound to this transaction; left untouched.");
        return Ok(PipelineControl::Continue);
      }
      ctx_data.update(|d| d.cart_cleared = true);
      // The cart binding already guarantees a single clear; the flag is bookkeeping.
      match ledger.mark_cart_cleared(&id).await {
        Ok(recorded) => info!(transaction_id = %id, recorded, "Reconcile Pipeline: Cart cleared."),
        Err(e) => warn!(transaction_id = %id, error = %e, "Reconcile Pipeline: Cart cleared; ledger flag not recorded."),
      }
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p.on_root("notify_payment_parties", |ctx_data: ContextData<ReconcileCtxData>| {
    Box::pin(async move {
      let (notification, ledger, notifier, currency) = ctx_data.with(|d| {
        (
          d.notification.clone(),
          d.app_state.ledger.clone(),
          d.app_state.notifier.clone(),
          d.app_state.config.default_currency.clone(),
        )
      });
      let notification = notification.ok_or_else(|| missing("notification"))?;
      let id = notification.transaction_id.clone();

      if !ledger.mark_notified(&id).await? {
        info!(transaction_id = %id, "Reconcile Pipeline: Notifications already sent.");
        return Ok(PipelineControl::Continue);
      }
      let receipt = PaymentReceipt {
        transaction_id: id.clone(),
        amount: notification.authoritative_total(),
        currency,
        buyer_email: notification.buyer_email.clone(),
        buyer_name: notification.buyer_name.clone(),
        payment_method: notification.payment_method.clone(),
        transaction_uuid: notification.transaction_uuid.clone(),
        member_id: notification.member_id.clone(),
        cart_items_count: notification.cart_items_count,
      };
      // Best-effort: a failed e-mail never fails the reconciliation.
      if let Err(e) = notifier.payment_succeeded(&receipt).await {
        warn!(transaction_id = %id, error = %e, "Reconcile Pipeline: Notification delivery failed.");
      }
      ctx_data.update(|d| d.notified = true);
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p
}

pub fn register_reconcile_pipeline(registry: &Registry<AppError>) {
  registry.register_pipeline(build_reconcile_pipeline());
  info!("Reconcile pipeline registered.");
}

#[instrument(name = "pipeline::reconcile", skip_all, fields(source = ctx.source.label()))]
pub async fn reconcile(app_state: &AppState, ctx: ReconcileCtxData) -> AppResult<ReconcileOutcome> {
  let ctx = ContextData::new(ctx);
  // Stop is the normal path for failed and pending payments.
  run_registered(app_state, &ctx).await?;
  let guard = ctx.read();
  let notification = guard.notification.as_ref().ok_or_else(|| missing("notification"))?;
  Ok(ReconcileOutcome {
    transaction_id: notification.transaction_id.clone(),
    member_id: notification.member_id.clone(),
    status: guard.status.unwrap_or(notification.status),
    cart_cleared: guard.cart_cleared,
    notified: guard.notified,
  })
}
