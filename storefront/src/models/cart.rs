// storefront/src/models/cart.rs

//! The visitor's cart and its persisted JSON form.
//!
//! Persisted shape: `{"items":[{"id":"p1","qty":2}],"updatedAt":1718000000000}`,
//! plus `"pendingTransaction":"4242"` once the visitor has started a payment.
//! A `Cart` value always holds unique ids with positive quantities; every
//! mutation goes through methods that keep it that way.

use super::payment::TransactionId;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
  pub fn parse(raw: impl AsRef<str>) -> Result<Self, String> {
    let trimmed = raw.as_ref().trim();
    if trimmed.is_empty() {
      return Err("Product id must not be empty".to_string());
    }
    Ok(ProductId(trimmed.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ProductId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl<'de> Deserialize<'de> for ProductId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = super::flexible_string::deserialize(deserializer)?;
    ProductId::parse(raw).map_err(serde::de::Error::custom)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
  pub id: ProductId,
  pub qty: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cart {
  items: Vec<CartItem>,
  #[serde(rename = "updatedAt")]
  updated_at: i64,
  /// Gateway transaction started from this cart. Only a success for this id
  /// may clear it.
  #[serde(rename = "pendingTransaction", skip_serializing_if = "Option::is_none")]
  pending_transaction: Option<TransactionId>,
}

impl Cart {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn items(&self) -> &[CartItem] {
    &self.items
  }

  /// Epoch milliseconds of the last persisted write.
  pub fn updated_at(&self) -> i64 {
    self.updated_at
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn line_count(&self) -> usize {
    self.items.len()
  }

  /// Total units across all lines.
  pub fn item_count(&self) -> u64 {
    self.items.iter().map(|i| u64::from(i.qty)).sum()
  }

  pub fn quantity_of(&self, id: &ProductId) -> u32 {
    self.items.iter().find(|i| &i.id == id).map_or(0, |i| i.qty)
  }

  pub fn product_ids(&self) -> Vec<ProductId> {
    self.items.iter().map(|i| i.id.clone()).collect()
  }

  /// Adds `delta` (which may be negative) to the line for `id`, clamping at zero.
  /// A line that reaches zero is removed. Returns the new quantity.
  pub fn upsert(&mut self, id: &ProductId, delta: i64) -> u32 {
    let current = i64::from(self.quantity_of(id));
    let target = current.saturating_add(delta);
    self.set_quantity(id, target)
  }

  /// Sets an absolute quantity, clamped to `0..=u32::MAX`. Zero removes the line.
  pub fn set_quantity(&mut self, id: &ProductId, qty: i64) -> u32 {
    let qty = qty.clamp(0, i64::from(u32::MAX)) as u32;
    match self.items.iter().position(|i| &i.id == id) {
      Some(idx) if qty == 0 => {
        self.items.remove(idx);
      }
      Some(idx) => self.items[idx].qty = qty,
      None if qty > 0 => self.items.push(CartItem { id: id.clone(), qty }),
      None => {}
    }
    qty
  }

  pub fn remove(&mut self, id: &ProductId) -> bool {
    let before = self.items.len();
    self.items.retain(|i| &i.id != id);
    self.items.len() != before
  }

  /// Empties the cart and drops any transaction binding.
  pub fn clear(&mut self) {
    self.items.clear();
    self.pending_transaction = None;
  }

  pub fn pending_transaction(&self) -> Option<&TransactionId> {
    self.pending_transaction.as_ref()
  }

  /// Remembers the payment started from this cart. A later payment replaces it.
  pub fn bind_transaction(&mut self, transaction_id: TransactionId) {
    self.pending_transaction = Some(transaction_id);
  }

  pub fn is_bound_to(&self, transaction_id: &TransactionId) -> bool {
    self.pending_transaction.as_ref() == Some(transaction_id)
  }

  /// Stamps the write time. The stamp never moves backwards, even if the
  /// clock does, so each persisted write strictly advances `updatedAt`.
  pub fn stamped(mut self, now_ms: i64) -> Self {
    self.updated_at = now_ms.max(self.updated_at.saturating_add(1));
    self
  }

  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string(self)
  }

  /// Reads a persisted cart. Never fails: missing or malformed data yields an
  /// empty cart, bad lines are dropped and duplicate ids are merged.
  pub fn decode(raw: Option<&str>) -> Cart {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
      return Cart::empty();
    };
    let stored: StoredCart = match serde_json::from_str(raw) {
      Ok(stored) => stored,
      Err(e) => {
        warn!(error = %e, "Stored cart is malformed, starting from an empty cart.");
        return Cart::empty();
      }
    };

    let mut cart = Cart {
      items: Vec::with_capacity(stored.items.len()),
      updated_at: stored.updated_at.unwrap_or(0),
      pending_transaction: stored.pending_transaction.as_ref().and_then(stored_transaction_id),
    };
    for value in stored.items {
      match serde_json::from_value::<StoredItem>(value) {
        Ok(item) if item.qty > 0 => {
          cart.upsert(&item.id, item.qty);
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Dropping unreadable cart line."),
      }
    }
    cart
  }
}

#[derive(Deserialize)]
struct StoredCart {
  items: Vec<serde_json::Value>,
  #[serde(rename = "updatedAt", default)]
  updated_at: Option<i64>,
  #[serde(rename = "pendingTransaction", default)]
  pending_transaction: Option<serde_json::Value>,
}

fn stored_transaction_id(value: &serde_json::Value) -> Option<TransactionId> {
  match value {
    serde_json::Value::String(s) => TransactionId::parse(s),
    serde_json::Value::Number(n) => TransactionId::parse(n.to_string()),
    _ => None,
  }
}

#[derive(Deserialize)]
struct StoredItem {
  id: ProductId,
  qty: i64,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pid(s: &str) -> ProductId {
    ProductId::parse(s).unwrap()
  }

  #[test]
  fn upsert_clamps_and_prunes() {
    let mut cart = Cart::empty();
    assert_eq!(cart.upsert(&pid("p1"), 2), 2);
    assert_eq!(cart.upsert(&pid("p1"), -5), 0);
    assert!(cart.is_empty());
    assert_eq!(cart.upsert(&pid("p2"), -1), 0);
    assert!(cart.is_empty());
  }

  #[test]
  fn decode_merges_duplicates_and_drops_bad_lines() {
    let raw = r#"{"items":[{"id":"a","qty":1},{"id":"a","qty":2},{"id":"b","qty":0},{"id":"","qty":4},{"qty":1}],"updatedAt":5}"#;
    let cart = Cart::decode(Some(raw));
    assert_eq!(cart.items(), &[CartItem { id: pid("a"), qty: 3 }]);
    assert_eq!(cart.updated_at(), 5);
  }

  #[test]
  fn decode_treats_garbage_as_empty() {
    assert!(Cart::decode(Some("not json")).is_empty());
    assert!(Cart::decode(Some(r#"{"items":"nope"}"#)).is_empty());
    assert!(Cart::decode(None).is_empty());
  }

  #[test]
  fn decode_accepts_numeric_ids() {
    let cart = Cart::decode(Some(r#"{"items":[{"id":42,"qty":1}],"updatedAt":1}"#));
    assert_eq!(cart.quantity_of(&pid("42")), 1);
  }

  #[test]
  fn transaction_binding_survives_the_cookie_and_clear_drops_it() {
    let mut cart = Cart::empty();
    cart.upsert(&pid("p1"), 1);
    cart.bind_transaction(TransactionId::parse("4242").unwrap());
    let json = cart.to_json().unwrap();
    assert!(json.contains(r#""pendingTransaction":"4242""#));

    let mut back = Cart::decode(Some(&json));
    assert!(back.is_bound_to(&TransactionId::parse("4242").unwrap()));
    back.clear();
    assert_eq!(back.pending_transaction(), None);
    assert!(!back.to_json().unwrap().contains("pendingTransaction"));

    let odd = Cart::decode(Some(r#"{"items":[{"id":"p1","qty":1}],"pendingTransaction":{"x":1}}"#));
    assert_eq!(odd.quantity_of(&pid("p1")), 1);
    assert_eq!(odd.pending_transaction(), None);
    let numeric = Cart::decode(Some(r#"{"items":[],"pendingTransaction":77}"#));
    assert!(numeric.is_bound_to(&TransactionId::parse("77").unwrap()));
  }

  #[test]
  fn stamp_always_advances() {
    let cart = Cart::empty().stamped(1_000);
    assert_eq!(cart.updated_at(), 1_000);
    let again = cart.stamped(900);
    assert_eq!(again.updated_at(), 1_001);
  }
}
