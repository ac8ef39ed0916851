// tests/notifier_tests.rs
mod common;

use common::*;
use serde_json::{json, Value};
use storefront::models::{CurrencyCode, Money, TransactionId};
use storefront::services::notifier::{Notifier, NotifyError, PaymentReceipt, ResendNotifier};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn receipt(buyer_email: Option<&str>) -> PaymentReceipt {
  PaymentReceipt {
    transaction_id: TransactionId::parse("31337").unwrap(),
    amount: Some(Money::from_minor(21_000)),
    currency: CurrencyCode::default(),
    buyer_email: buyer_email.map(str::to_string),
    buyer_name: Some("Mona Adel".to_string()),
    payment_method: Some("card".to_string()),
    transaction_uuid: Some("3c1e1f0a-6d7e-4b8b-9d3f-0b0d2f6c9a11".to_string()),
    member_id: Some("m-19".to_string()),
    cart_items_count: Some(3),
  }
}

fn resend(server: &MockServer, admin: Option<&str>) -> ResendNotifier {
  ResendNotifier::new(
    "re_test_key".to_string(),
    "Shop <orders@shop.example>".to_string(),
    admin.map(str::to_string),
  )
  .with_endpoint(format!("{}/emails", server.uri()))
}

#[actix_rt::test]
async fn buyer_and_admin_are_both_mailed() {
  setup_tracing();
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/emails"))
    .and(header("authorization", "Bearer re_test_key"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "em_1" })))
    .expect(2)
    .mount(&server)
    .await;

  let notifier = resend(&server, Some("admin@shop.example"));
  notifier.payment_succeeded(&receipt(Some("mona@example.com"))).await.unwrap();

  let sent: Vec<Value> = server
    .received_requests()
    .await
    .unwrap()
    .iter()
    .map(|r| r.body_json().unwrap())
    .collect();
  assert_eq!(sent[0]["to"], json!(["mona@example.com"]));
  assert!(sent[0]["subject"].as_str().unwrap().contains("31337"));
  let buyer_html = sent[0]["html"].as_str().unwrap();
  assert!(buyer_html.contains("210.00 EGP"));
  assert!(buyer_html.contains("Dear Mona Adel"));
  assert_eq!(sent[1]["to"], json!(["admin@shop.example"]));
  let admin_html = sent[1]["html"].as_str().unwrap();
  assert!(admin_html.contains("m-19"));
  assert!(admin_html.contains("3c1e1f0a-6d7e-4b8b-9d3f-0b0d2f6c9a11"));
  assert!(admin_html.contains("card"));
}

#[actix_rt::test]
async fn unknown_buyers_only_reach_the_admin() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .respond_with(ResponseTemplate::new(200))
    .expect(1)
    .mount(&server)
    .await;

  let notifier = resend(&server, Some("admin@shop.example"));
  notifier.payment_succeeded(&receipt(None)).await.unwrap();
}

#[actix_rt::test]
async fn provider_rejections_are_reported_after_trying_everyone() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .respond_with(ResponseTemplate::new(422).set_body_string("invalid from address"))
    .expect(2)
    .mount(&server)
    .await;

  let notifier = resend(&server, Some("admin@shop.example"));
  let err = notifier
    .payment_succeeded(&receipt(Some("mona@example.com")))
    .await
    .unwrap_err();
  match err {
    NotifyError::Rejected { status, body } => {
      assert_eq!(status, 422);
      assert_eq!(body, "invalid from address");
    }
    other => panic!("expected a rejection, got {:?}", other),
  }
}
