// storefront/src/web/extractors.rs

use crate::errors::{AppError, Result as AppResult};
use crate::models::ProductId;
use crate::services::cart_store::{CartStore, CookieCartStore, TestSeedCartStore};
use crate::state::AppState;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use futures_util::future::{ready, Ready};
use std::sync::Arc;
use tracing::warn;

/// The visitor's cart for the current request, backed by the signed cookie.
/// Handlers must pass their response through [`CartSession::respond`] so
/// writes reach the browser.
pub struct CartSession {
  cookie: Arc<CookieCartStore>,
  store: Arc<dyn CartStore>,
}

impl CartSession {
  pub fn store(&self) -> Arc<dyn CartStore> {
    self.store.clone()
  }

  pub fn respond(&self, mut response: HttpResponse) -> AppResult<HttpResponse> {
    self.cookie.apply_to(&mut response)?;
    Ok(response)
  }
}

impl FromRequest for CartSession {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let Some(state) = req.app_data::<web::Data<AppState>>() else {
      warn!("CartSession extractor: AppState is not registered.");
      return ready(Err(AppError::Internal("Application state unavailable".to_string())));
    };
    let config = &state.config;
    let cookie = Arc::new(CookieCartStore::from_request(req, &state.cookie_key, config.cookie_secure));

    let store: Arc<dyn CartStore> = if config.enable_test_cart {
      match ProductId::parse(&config.test_cart_product_id) {
        Ok(product_id) => Arc::new(TestSeedCartStore::new(cookie.clone(), product_id)),
        Err(e) => {
          warn!(error = %e, "TEST_CART_PRODUCT_ID is unusable; test seeding disabled.");
          cookie.clone()
        }
      }
    } else {
      cookie.clone()
    };

    ready(Ok(CartSession { cookie, store }))
  }
}
