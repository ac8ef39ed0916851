// storefront/src/services/cart_service.rs

//! Cart mutators. Nothing else writes cart contents.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Cart, ProductId, TransactionId};
use crate::services::cart_store::CartStore;
use crate::services::catalog::Catalog;
use serde::Serialize;
use tracing::{info, instrument};

#[instrument(skip(store, catalog), fields(product_id = %product_id))]
pub async fn add_to_cart(
  store: &dyn CartStore,
  catalog: &dyn Catalog,
  product_id: &ProductId,
  qty: i64,
) -> AppResult<Cart> {
  if qty < 1 {
    return Err(AppError::Validation("Quantity must be at least 1".to_string()));
  }
  if !catalog.product_exists(product_id).await? {
    return Err(AppError::NotFound(format!("Product {} not found", product_id)));
  }
  let mut cart = store.read();
  let now = cart.upsert(product_id, qty);
  info!(qty = now, "Added to cart.");
  store.write(cart)
}

/// Negative quantities clamp to zero, which removes the line.
#[instrument(skip(store), fields(product_id = %product_id))]
pub fn set_quantity(store: &dyn CartStore, product_id: &ProductId, qty: i64) -> AppResult<Cart> {
  let mut cart = store.read();
  cart.set_quantity(product_id, qty);
  store.write(cart)
}

#[instrument(skip(store), fields(product_id = %product_id))]
pub fn remove_from_cart(store: &dyn CartStore, product_id: &ProductId) -> AppResult<Cart> {
  let mut cart = store.read();
  cart.remove(product_id);
  store.write(cart)
}

#[instrument(skip(store))]
pub fn clear_cart(store: &dyn CartStore) -> AppResult<Cart> {
  let mut cart = store.read();
  cart.clear();
  store.write(cart)
}

/// Remembers the payment just started from this cart. Items are left as they are.
#[instrument(skip(store), fields(transaction_id = %transaction_id))]
pub fn bind_pending_transaction(store: &dyn CartStore, transaction_id: &TransactionId) -> AppResult<Cart> {
  let mut cart = store.read();
  cart.bind_transaction(transaction_id.clone());
  store.write(cart)
}

/// Clears the cart only when it started `transaction_id`. A cart that was
/// never bound, or has since been cleared or re-bound, is left alone.
#[instrument(skip(store), fields(transaction_id = %transaction_id))]
pub fn clear_paid_cart(store: &dyn CartStore, transaction_id: &TransactionId) -> AppResult<bool> {
  let cleared = store.clear_for_transaction(transaction_id)?;
  if cleared {
    info!("Paid cart cleared.");
  }
  Ok(cleared)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartCount {
  pub count: u64,
  #[serde(rename = "updatedAt")]
  pub updated_at: i64,
}

/// Total units in the cart, for header badges.
pub fn cart_count(store: &dyn CartStore) -> CartCount {
  let cart = store.read();
  CartCount {
    count: cart.item_count(),
    updated_at: cart.updated_at(),
  }
}
