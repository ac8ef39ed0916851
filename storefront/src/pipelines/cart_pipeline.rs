// storefront/src/pipelines/cart_pipeline.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::Cart;
use crate::pipelines::common_steps::{missing, require_completed, run_registered, skip_when};
use crate::pipelines::contexts::{CartCommand, CartCtxData};
use crate::services::cart_service;
use crate::state::AppState;
use stepflow::{ContextData, Pipeline, PipelineControl, Registry};
use tracing::{info, instrument, warn};

pub const REVALIDATE_STEP: &str = "revalidate_cart_views";

pub fn build_cart_pipeline() -> Pipeline<CartCtxData, AppError> {
  let mut p = Pipeline::<CartCtxData, AppError>::new(&[
    ("validate_cart_command", false, None),
    ("apply_cart_command", false, None),
    (
      REVALIDATE_STEP,
      true,
      skip_when(|d: &CartCtxData| d.revalidate_path.is_none()),
    ),
  ]);

  p.on_root("validate_cart_command", |ctx_data: ContextData<CartCtxData>| {
    Box::pin(async move {
      let (command, path) = ctx_data.with(|d| (d.command.clone(), d.revalidate_path.clone()));
      if let CartCommand::Add { qty, .. } = command {
        if qty < 1 {
          warn!(qty, "Cart Pipeline: Rejecting add with non-positive quantity.");
          return Err(AppError::Validation("Quantity must be at least 1".to_string()));
        }
      }
      if let Some(path) = path {
        if !path.starts_with('/') {
          return Err(AppError::Validation("revalidatePath must be an absolute path".to_string()));
        }
        // Echoed back in a response header.
        if !path.bytes().all(|b| b.is_ascii_graphic()) {
          return Err(AppError::Validation(
            "revalidatePath must contain only visible ASCII characters".to_string(),
          ));
        }
      }
      Ok(PipelineControl::Continue)
    })
  });

  p.on_root("apply_cart_command", |ctx_data: ContextData<CartCtxData>| {
    Box::pin(async move {
      let (command, store, catalog) = ctx_data.with(|d| (d.command.clone(), d.store.clone(), d.app_state.catalog.clone()));
      let cart = match &command {
        CartCommand::Add { product_id, qty } => {
          cart_service::add_to_cart(store.as_ref(), catalog.as_ref(), product_id, *qty).await?
        }
        CartCommand::SetQuantity { product_id, qty } => cart_service::set_quantity(store.as_ref(), product_id, *qty)?,
        CartCommand::Remove { product_id } => cart_service::remove_from_cart(store.as_ref(), product_id)?,
        CartCommand::Clear => cart_service::clear_cart(store.as_ref())?,
      };
      info!(
        command = command.name(),
        lines = cart.line_count(),
        "Cart Pipeline: Command applied."
      );
      ctx_data.update(|d| d.cart = Some(cart));
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  // Cached pages are owned by the front end; record the path so the response can name it.
  p.on_root(REVALIDATE_STEP, |ctx_data: ContextData<CartCtxData>| {
    Box::pin(async move {
      ctx_data.update(|d| d.revalidated = d.revalidate_path.clone());
      Ok::<_, AppError>(PipelineControl::Continue)
    })
  });

  p
}

pub fn register_cart_pipeline(registry: &Registry<AppError>) {
  registry.register_pipeline(build_cart_pipeline());
  info!("Cart pipeline registered.");
}

/// Outcome of a cart command: the stored cart and the path to revalidate, if any.
#[derive(Debug, Clone)]
pub struct CartCommandResult {
  pub cart: Cart,
  pub revalidated: Option<String>,
}

#[instrument(name = "pipeline::cart", skip_all, fields(command = ctx.command.name()))]
pub async fn run_cart_command(app_state: &AppState, ctx: CartCtxData) -> AppResult<CartCommandResult> {
  let ctx = ContextData::new(ctx);
  let result = run_registered(app_state, &ctx).await?;
  require_completed(result, "cart")?;
  let guard = ctx.read();
  Ok(CartCommandResult {
    cart: guard.cart.clone().ok_or_else(|| missing("cart"))?,
    revalidated: guard.revalidated.clone(),
  })
}
