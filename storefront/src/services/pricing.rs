// storefront/src/services/pricing.rs
use crate::errors::{AppError, Result as AppResult};
use crate::models::{Cart, Money, ProductId};
use crate::services::catalog::Catalog;
use serde::Serialize;
use std::collections::HashMap;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedLine {
  pub id: ProductId,
  pub qty: u32,
  #[serde(with = "crate::models::money::major_units")]
  pub unit_price: Money,
  #[serde(with = "crate::models::money::major_units")]
  pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedCart {
  pub lines: Vec<PricedLine>,
  pub total: Money,
}

impl PricedCart {
  pub fn line_count(&self) -> usize {
    self.lines.len()
  }
}

/// Prices every line with catalog prices fetched now. Any line that cannot be
/// priced makes the whole cart invalid.
#[instrument(skip_all, fields(lines = cart.line_count()))]
pub async fn price_cart(cart: &Cart, catalog: &dyn Catalog) -> AppResult<PricedCart> {
  if cart.is_empty() {
    return Err(AppError::InvalidCart("Cart is empty".to_string()));
  }
  let products: HashMap<ProductId, Option<Money>> = catalog
    .products(&cart.product_ids())
    .await?
    .into_iter()
    .map(|p| (p.id, p.price))
    .collect();

  let mut total = Money::ZERO;
  let mut lines = Vec::with_capacity(cart.line_count());
  for item in cart.items() {
    let unit_price = match products.get(&item.id) {
      Some(Some(price)) => *price,
      Some(None) => return Err(AppError::InvalidCart(format!("Product {} has no price", item.id))),
      None => return Err(AppError::InvalidCart(format!("Product {} is no longer available", item.id))),
    };
    let line_total = unit_price
      .checked_mul(item.qty)
      .ok_or_else(|| AppError::InvalidCart("Cart total is too large".to_string()))?;
    total = total
      .checked_add(line_total)
      .ok_or_else(|| AppError::InvalidCart("Cart total is too large".to_string()))?;
    lines.push(PricedLine {
      id: item.id.clone(),
      qty: item.qty,
      unit_price,
      line_total,
    });
  }

  if !total.is_positive() {
    return Err(AppError::InvalidCart("Invalid cart total".to_string()));
  }
  Ok(PricedCart { lines, total })
}
