// storefront/src/services/cart_store.rs

//! Where a visitor's cart lives between requests.
//!
//! Production keeps it in a signed `cart` cookie. Each request gets its own
//! store; writes are buffered and flushed onto the response by the web layer.

use crate::errors::{AppError, Result as AppResult};
use crate::models::{Cart, ProductId, TransactionId};
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, CookieJar, Key, SameSite};
use actix_web::{HttpRequest, HttpResponse};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const CART_COOKIE: &str = "cart";
const MAX_AGE_DAYS: i64 = 30;

pub trait CartStore: Send + Sync {
  /// Current cart; empty when nothing usable is stored.
  fn read(&self) -> Cart;

  /// Persists `cart`, stamping `updatedAt`. Returns what was stored.
  fn write(&self, cart: Cart) -> AppResult<Cart>;

  /// Empties the cart if it is bound to `transaction_id`, as one step.
  /// `true` when this call emptied it.
  fn clear_for_transaction(&self, transaction_id: &TransactionId) -> AppResult<bool>;
}

pub fn now_ms() -> i64 {
  chrono::Utc::now().timestamp_millis()
}

fn encode(cart: Cart) -> AppResult<(Cart, String)> {
  let stamped = cart.stamped(now_ms());
  let json = stamped
    .to_json()
    .map_err(|e| AppError::Internal(format!("Failed to encode cart: {}", e)))?;
  Ok((stamped, json))
}

// --- Signed cookie ---

struct CookieState {
  raw: Option<String>,
  outgoing: Option<Cookie<'static>>,
}

pub struct CookieCartStore {
  key: Key,
  secure: bool,
  state: Mutex<CookieState>,
}

impl CookieCartStore {
  pub fn from_request(req: &HttpRequest, key: &Key, secure: bool) -> Self {
    let raw = req.cookie(CART_COOKIE).and_then(|cookie| {
      let mut jar = CookieJar::new();
      jar.add_original(cookie);
      let verified = jar.signed(key).get(CART_COOKIE);
      if verified.is_none() {
        warn!("Cart cookie failed signature verification, ignoring it.");
      }
      verified.map(|c| c.value().to_string())
    });
    Self {
      key: key.clone(),
      secure,
      state: Mutex::new(CookieState { raw, outgoing: None }),
    }
  }

  /// The signed cookie produced by the last write in this request, if any.
  pub fn outgoing_cookie(&self) -> Option<Cookie<'static>> {
    self.state.lock().outgoing.clone()
  }

  fn stage(&self, state: &mut CookieState, cart: Cart) -> AppResult<Cart> {
    let (stamped, json) = encode(cart)?;
    let mut cookie = Cookie::build(CART_COOKIE, json.clone())
      .path("/")
      .http_only(true)
      .same_site(SameSite::Lax)
      .max_age(CookieDuration::days(MAX_AGE_DAYS))
      .finish();
    cookie.set_secure(self.secure);

    let mut jar = CookieJar::new();
    jar.signed_mut(&self.key).add(cookie);
    let signed = jar
      .get(CART_COOKIE)
      .cloned()
      .ok_or_else(|| AppError::Internal("Signed cart cookie missing from jar".to_string()))?;

    state.raw = Some(json);
    state.outgoing = Some(signed);
    debug!(lines = stamped.line_count(), updated_at = stamped.updated_at(), "Cart cookie staged.");
    Ok(stamped)
  }

  pub fn apply_to(&self, response: &mut HttpResponse) -> AppResult<()> {
    if let Some(cookie) = self.outgoing_cookie() {
      response
        .add_cookie(&cookie)
        .map_err(|e| AppError::Internal(format!("Failed to set cart cookie: {}", e)))?;
    }
    Ok(())
  }
}

impl CartStore for CookieCartStore {
  fn read(&self) -> Cart {
    let state = self.state.lock();
    Cart::decode(state.raw.as_deref())
  }

  fn write(&self, cart: Cart) -> AppResult<Cart> {
    let mut state = self.state.lock();
    self.stage(&mut state, cart)
  }

  fn clear_for_transaction(&self, transaction_id: &TransactionId) -> AppResult<bool> {
    let mut state = self.state.lock();
    let mut cart = Cart::decode(state.raw.as_deref());
    if !cart.is_bound_to(transaction_id) {
      return Ok(false);
    }
    cart.clear();
    self.stage(&mut state, cart)?;
    Ok(true)
  }
}

// --- In-memory ---

/// Holds the same JSON a cookie would, so tests exercise the same decoding.
#[derive(Default)]
pub struct MemoryCartStore {
  raw: Mutex<Option<String>>,
}

impl MemoryCartStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_raw(raw: impl Into<String>) -> Self {
    Self {
      raw: Mutex::new(Some(raw.into())),
    }
  }

  pub fn raw(&self) -> Option<String> {
    self.raw.lock().clone()
  }
}

impl CartStore for MemoryCartStore {
  fn read(&self) -> Cart {
    Cart::decode(self.raw.lock().as_deref())
  }

  fn write(&self, cart: Cart) -> AppResult<Cart> {
    let (stamped, json) = encode(cart)?;
    *self.raw.lock() = Some(json);
    Ok(stamped)
  }

  fn clear_for_transaction(&self, transaction_id: &TransactionId) -> AppResult<bool> {
    let mut raw = self.raw.lock();
    let mut cart = Cart::decode(raw.as_deref());
    if !cart.is_bound_to(transaction_id) {
      return Ok(false);
    }
    cart.clear();
    let (_, json) = encode(cart)?;
    *raw = Some(json);
    Ok(true)
  }
}

// --- Development seeding ---

/// Puts one unit of a fixed product into any empty cart it reads.
/// Enabled by `ENABLE_TEST_CART` for checkout testing.
pub struct TestSeedCartStore {
  inner: Arc<dyn CartStore>,
  product_id: ProductId,
}

impl TestSeedCartStore {
  pub fn new(inner: Arc<dyn CartStore>, product_id: ProductId) -> Self {
    Self { inner, product_id }
  }
}

impl CartStore for TestSeedCartStore {
  fn read(&self) -> Cart {
    let cart = self.inner.read();
    if !cart.is_empty() {
      return cart;
    }
    let mut seeded = cart.clone();
    seeded.upsert(&self.product_id, 1);
    match self.inner.write(seeded) {
      Ok(stored) => {
        info!(product_id = %self.product_id, "Seeded empty cart with test product.");
        stored
      }
      Err(e) => {
        warn!(error = %e, "Failed to seed test cart.");
        cart
      }
    }
  }

  fn write(&self, cart: Cart) -> AppResult<Cart> {
    self.inner.write(cart)
  }

  fn clear_for_transaction(&self, transaction_id: &TransactionId) -> AppResult<bool> {
    self.inner.clear_for_transaction(transaction_id)
  }
}
