// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use storefront::config::AppConfig;
use storefront::models::{BillingData, Cart, Money, ProductId, TransactionId};
use storefront::services::cart_store::{CartStore, MemoryCartStore};
use storefront::services::catalog::{Catalog, MemoryCatalog};
use storefront::services::ledger::MemoryLedger;
use storefront::services::notifier::{Notifier, NotifyError, PaymentReceipt};
use storefront::services::xpay::XPayClient;
use storefront::state::AppState;
use tracing::Level;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "xpay-test-key-5f1c";
pub const COMMUNITY_ID: &str = "community-7";
pub const VARIABLE_AMOUNT_ID: u64 = 42;
pub const APP_BASE_URL: &str = "https://shop.example";
pub const PREPARE_PATH: &str = "/payments/prepare-amount/";
pub const PAY_PATH: &str = "/payments/pay/variable-amount/";

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub fn pid(raw: &str) -> ProductId {
  ProductId::parse(raw).unwrap()
}

pub fn egp(major: i64) -> Money {
  Money::from_minor(major * 100)
}

/// Records every receipt instead of sending e-mail.
#[derive(Default)]
pub struct RecordingNotifier {
  pub receipts: Mutex<Vec<PaymentReceipt>>,
}

impl RecordingNotifier {
  pub fn count(&self) -> usize {
    self.receipts.lock().len()
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn payment_succeeded(&self, receipt: &PaymentReceipt) -> Result<(), NotifyError> {
    self.receipts.lock().push(receipt.clone());
    Ok(())
  }
}

pub fn test_config(gateway_uri: &str) -> AppConfig {
  AppConfig {
    app_base_url: APP_BASE_URL.to_string(),
    xpay_api_key: API_KEY.to_string(),
    xpay_community_id: COMMUNITY_ID.to_string(),
    xpay_variable_amount_id: VARIABLE_AMOUNT_ID,
    xpay_base_url: Some(gateway_uri.to_string()),
    xpay_timeout: Duration::from_secs(5),
    cookie_secret: Some("k".repeat(64)),
    ..AppConfig::default()
  }
}

pub struct TestApp {
  pub state: AppState,
  pub gateway: MockServer,
  pub notifier: Arc<RecordingNotifier>,
}

pub async fn test_app(catalog: MemoryCatalog) -> TestApp {
  test_app_with(catalog, |_| {}).await
}

pub async fn test_app_with(catalog: MemoryCatalog, tweak: impl FnOnce(&mut AppConfig)) -> TestApp {
  setup_tracing();
  let gateway = MockServer::start().await;
  let mut config = test_config(&gateway.uri());
  tweak(&mut config);
  let notifier = Arc::new(RecordingNotifier::default());
  let catalog: Arc<dyn Catalog> = Arc::new(catalog);
  let client = XPayClient::new(config.gateway_config()).unwrap();
  let state = AppState::new(config, catalog, client, Arc::new(MemoryLedger::new()), notifier.clone());
  TestApp {
    state,
    gateway,
    notifier,
  }
}

pub fn default_catalog() -> MemoryCatalog {
  MemoryCatalog::new()
    .with_product("p1", Some(egp(100)))
    .with_product("p2", Some(egp(35)))
    .with_product("p3", Some(egp(12)))
}

pub fn store_with(lines: &[(&str, i64)]) -> Arc<MemoryCartStore> {
  let store = Arc::new(MemoryCartStore::new());
  let mut cart = Cart::empty();
  for (id, qty) in lines {
    cart.upsert(&pid(id), *qty);
  }
  store.write(cart).unwrap();
  store
}

/// A cart the buyer has already started paying for with `transaction_id`.
pub fn paid_store(lines: &[(&str, i64)], transaction_id: u64) -> Arc<MemoryCartStore> {
  let store = store_with(lines);
  let mut cart = store.read();
  cart.bind_transaction(TransactionId::parse(transaction_id.to_string()).unwrap());
  store.write(cart).unwrap();
  store
}

pub fn billing() -> BillingData {
  BillingData {
    name: "Mona Adel".to_string(),
    email: "mona@example.com".to_string(),
    phone_number: "+201001234567".to_string(),
  }
}

pub fn envelope(data: Value) -> Value {
  json!({
    "status": { "code": 200, "message": "success", "errors": [] },
    "data": data,
  })
}

pub async fn mount_prepare(server: &MockServer, total_amount: f64) {
  Mock::given(method("POST"))
    .and(path(PREPARE_PATH))
    .and(header("x-api-key", API_KEY))
    .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
      "total_amount": total_amount,
      "total_amount_currency": "EGP",
    }))))
    .mount(server)
    .await;
}

pub async fn mount_pay(server: &MockServer, transaction_id: u64) {
  Mock::given(method("POST"))
    .and(path(PAY_PATH))
    .and(header("x-api-key", API_KEY))
    .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
      "iframe_url": format!("https://pay.example/iframe/{}", transaction_id),
      "transaction_id": transaction_id,
      "transaction_status": "PENDING",
      "transaction_uuid": "3c1e1f0a-6d7e-4b8b-9d3f-0b0d2f6c9a11",
    }))))
    .mount(server)
    .await;
}

/// JSON bodies the gateway received on `request_path`, in order.
pub async fn received_bodies(server: &MockServer, request_path: &str) -> Vec<Value> {
  server
    .received_requests()
    .await
    .unwrap_or_default()
    .into_iter()
    .filter(|r| r.url.path() == request_path)
    .map(|r| r.body_json::<Value>().unwrap())
    .collect()
}

pub fn webhook_body(transaction_id: u64, status: &str, merchant_id: &str) -> Vec<u8> {
  json!({
    "transaction_id": transaction_id,
    "transaction_status": status,
    "merchant_id": merchant_id,
    "member_id": "m-19",
    "total_amount": 210.0,
    "total_amount_piasters": 21000,
    "custom_fields": [
      { "field_label": "cart_items_count", "field_value": "3" },
      { "field_label": "buyer_email", "field_value": "mona@example.com" },
    ],
  })
  .to_string()
  .into_bytes()
}
