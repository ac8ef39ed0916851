// storefront/src/pipelines/checkout_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::{PaymentMetadata, Transaction};
use crate::pipelines::common_steps::{missing, require_completed, run_registered, skip_when};
use crate::pipelines::contexts::CheckoutCtxData;
use crate::services::cart_service;
use crate::services::cart_store::now_ms;
use crate::services::checkout::{self, PreparedAmount};
use crate::services::pricing;
use crate::state::AppState;
use stepflow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{info, instrument, warn};

pub fn build_checkout_pipeline() -> Pipeline<CheckoutCtxData, AppError> {
  let mut p = Pipeline::<CheckoutCtxData, AppError>::new(&[
    (
      "validate_billing_data",
      false,
      skip_when(|d: &CheckoutCtxData| d.billing.is_none()),
    ),
    ("load_cart", false, None),
    ("price_cart_from_catalog", false, None),
    ("prepare_amount_with_gateway", false, None),
    (
      "create_gateway_payment",
      false,
      skip_when(|d: &CheckoutCtxData| d.billing.is_none()),
    ),
    (
      "bind_cart_to_transaction",
      false,
      skip_when(|d: &CheckoutCtxData| d.transaction.is_none()),
    ),
  ]);

  // Step 1: Billing data is trimmed and validated before anything leaves the process.
  p.on_root("validate_billing_data", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let billing = ctx_data.with(|d| d.billing.clone()).ok_or_else(|| missing("billing data"))?;
      let cleaned = billing.validated()?;
      ctx_data.update(|d| d.billing = Some(cleaned));
      info!("Checkout Pipeline: Billing data validated.");
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 2: Snapshot the cart. It is only read here, never written.
  p.on_root("load_cart", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let store = ctx_data.with(|d| d.store.clone());
      let cart = store.read();
      if cart.is_empty() {
        warn!("Checkout Pipeline: Cart is empty.");
        return Err(AppError::InvalidCart("Cart is empty".to_string()));
      }
      info!(lines = cart.line_count(), units = cart.item_count(), "Checkout Pipeline: Cart loaded.");
      ctx_data.update(|d| d.cart = Some(cart));
      Ok(PipelineControl::Continue)
    })
  });

  // Step 3: Price with catalog prices fetched now.
  p.on_root("price_cart_from_catalog", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (cart, catalog) = ctx_data.with(|d| (d.cart.clone(), d.app_state.catalog.clone()));
      let cart = cart.ok_or_else(|| missing("cart"))?;
      let priced = pricing::price_cart(&cart, catalog.as_ref()).await?;
      info!(total = %priced.total, "Checkout Pipeline: Cart priced.");
      ctx_data.update(|d| d.priced = Some(priced));
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 4: Ask the gateway for the payable total, fees included.
  p.on_root("prepare_amount_with_gateway", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (total, currency, method, gateway) = ctx_data.with(|d| {
        (
          d.priced.as_ref().map(|p| p.total),
          d.currency.clone(),
          d.payment_method.clone(),
          d.app_state.gateway.clone(),
        )
      });
      let total = total.ok_or_else(|| missing("priced cart"))?;
      let prepared = checkout::prepare_amount(&gateway, total, &currency, &method).await?;
      ctx_data.update(|d| d.prepared = Some(prepared));
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 5: Create the transaction the buyer will be sent to.
  p.on_root("create_gateway_payment", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (billing, prepared, method, language, lines, gateway) = ctx_data.with(|d| {
        (
          d.billing.clone(),
          d.prepared.clone(),
          d.payment_method.clone(),
          d.language,
          d.cart.as_ref().map_or(0, |c| c.line_count()),
          d.app_state.gateway.clone(),
        )
      });
      let billing = billing.ok_or_else(|| missing("billing data"))?;
      let prepared = prepared.ok_or_else(|| missing("prepared amount"))?;
      let metadata = PaymentMetadata {
        cart_items_count: lines,
        order_timestamp: now_ms(),
        buyer_email: Some(billing.email.clone()),
        buyer_name: Some(billing.name.clone()),
        payment_method: Some(method.to_string()),
      };
      let transaction = checkout::create_payment(&gateway, &billing, &prepared, &method, language, &metadata).await?;
      ctx_data.update(|d| d.transaction = Some(transaction));
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Step 6: Tie the cart to the new transaction so only its success can clear it.
  p.on_root("bind_cart_to_transaction", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (store, transaction_id) =
        ctx_data.with(|d| (d.store.clone(), d.transaction.as_ref().map(|t| t.transaction_id.clone())));
      let transaction_id = transaction_id.ok_or_else(|| missing("transaction"))?;
      cart_service::bind_pending_transaction(store.as_ref(), &transaction_id)?;
      info!(transaction_id = %transaction_id, "Checkout Pipeline: Cart bound to transaction.");
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p
}

pub fn register_checkout_pipeline(registry: &Registry<AppError>) {
  registry.register_pipeline(build_checkout_pipeline());
  info!("Checkout pipeline registered.");
}

#[derive(Debug, Clone)]
pub struct CheckoutQuote {
  pub prepared: PreparedAmount,
  pub cart_lines: usize,
}

#[derive(Debug, Clone)]
pub struct PaymentStarted {
  pub transaction: Transaction,
  pub prepared: PreparedAmount,
}

/// Quote-only run: prices the cart and prepares the amount.
#[instrument(name = "pipeline::checkout_prepare", skip_all)]
pub async fn run_prepare(app_state: &AppState, mut ctx: CheckoutCtxData) -> AppResult<CheckoutQuote> {
  ctx.billing = None;
  let ctx = ContextData::new(ctx);
  require_completed(run_registered(app_state, &ctx).await?, "checkout")?;
  let guard = ctx.read();
  Ok(CheckoutQuote {
    prepared: guard.prepared.clone().ok_or_else(|| missing("prepared amount"))?,
    cart_lines: guard.cart.as_ref().map_or(0, |c| c.line_count()),
  })
}

#[instrument(name = "pipeline::checkout_pay", skip_all)]
pub async fn run_payment(app_state: &AppState, ctx: CheckoutCtxData) -> AppResult<PaymentStarted> {
  if ctx.billing.is_none() {
    return Err(AppError::Validation("Missing required billing information".to_string()));
  }
  let ctx = ContextData::new(ctx);
  require_completed(run_registered(app_state, &ctx).await?, "checkout")?;
  let guard = ctx.read();
  Ok(PaymentStarted {
    transaction: guard.transaction.clone().ok_or_else(|| missing("transaction"))?,
    prepared: guard.prepared.clone().ok_or_else(|| missing("prepared amount"))?,
  })
}
