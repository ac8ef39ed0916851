// storefront/src/pipelines/contexts.rs

//! Data carried through each pipeline. Handlers receive these wrapped in
//! `stepflow::ContextData`.

use crate::models::{
  BillingData, Cart, CurrencyCode, Language, PaymentMethod, PaymentNotification, ProductId, Transaction,
  TransactionId, TransactionStatus,
};
use crate::services::cart_store::CartStore;
use crate::services::checkout::PreparedAmount;
use crate::services::pricing::PricedCart;
use crate::state::AppState;
use std::collections::HashMap;
use std::sync::Arc;

// --- Cart ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartCommand {
  Add { product_id: ProductId, qty: i64 },
  SetQuantity { product_id: ProductId, qty: i64 },
  Remove { product_id: ProductId },
  Clear,
}

impl CartCommand {
  pub fn name(&self) -> &'static str {
    match self {
      CartCommand::Add { .. } => "add",
      CartCommand::SetQuantity { .. } => "set_quantity",
      CartCommand::Remove { .. } => "remove",
      CartCommand::Clear => "clear",
    }
  }
}

pub struct CartCtxData {
  pub app_state: AppState,
  pub store: Arc<dyn CartStore>,
  pub command: CartCommand,
  /// Page whose cached view should be refreshed after the change.
  pub revalidate_path: Option<String>,
  pub cart: Option<Cart>,
  pub revalidated: Option<String>,
}

impl CartCtxData {
  pub fn new(app_state: AppState, store: Arc<dyn CartStore>, command: CartCommand, revalidate_path: Option<String>) -> Self {
    Self {
      app_state,
      store,
      command,
      revalidate_path,
      cart: None,
      revalidated: None,
    }
  }
}

// --- Checkout ---

pub struct CheckoutCtxData {
  pub app_state: AppState,
  pub store: Arc<dyn CartStore>,
  pub currency: CurrencyCode,
  pub payment_method: PaymentMethod,
  pub language: Language,
  /// `None` runs the quote-only flow: price and prepare, no transaction.
  pub billing: Option<BillingData>,

  pub cart: Option<Cart>,
  pub priced: Option<PricedCart>,
  pub prepared: Option<PreparedAmount>,
  pub transaction: Option<Transaction>,
}

impl CheckoutCtxData {
  pub fn new(
    app_state: AppState,
    store: Arc<dyn CartStore>,
    currency: CurrencyCode,
    payment_method: PaymentMethod,
    language: Language,
    billing: Option<BillingData>,
  ) -> Self {
    Self {
      app_state,
      store,
      currency,
      payment_method,
      language,
      billing,
      cart: None,
      priced: None,
      prepared: None,
      transaction: None,
    }
  }
}

// --- Reconciliation ---

#[derive(Debug, Clone)]
pub enum CallbackSource {
  /// Server-to-server notification. Carries no visitor cookie.
  Webhook { body: Vec<u8> },
  /// The buyer's browser returning from the gateway.
  Redirect { query: HashMap<String, String> },
}

impl CallbackSource {
  pub fn is_webhook(&self) -> bool {
    matches!(self, CallbackSource::Webhook { .. })
  }

  pub fn label(&self) -> &'static str {
    match self {
      CallbackSource::Webhook { .. } => "webhook",
      CallbackSource::Redirect { .. } => "redirect",
    }
  }
}

pub struct ReconcileCtxData {
  pub app_state: AppState,
  pub source: CallbackSource,
  /// The visitor's cart, when the delivery carries one.
  pub cart: Option<Arc<dyn CartStore>>,

  pub notification: Option<PaymentNotification>,
  pub status: Option<TransactionStatus>,
  pub cart_cleared: bool,
  pub notified: bool,
}

impl ReconcileCtxData {
  pub fn new(app_state: AppState, source: CallbackSource, cart: Option<Arc<dyn CartStore>>) -> Self {
    Self {
      app_state,
      source,
      cart,
      notification: None,
      status: None,
      cart_cleared: false,
      notified: false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
  pub transaction_id: TransactionId,
  pub member_id: Option<String>,
  pub status: TransactionStatus,
  /// This delivery cleared the cart.
  pub cart_cleared: bool,
  /// This delivery sent the notifications.
  pub notified: bool,
}
