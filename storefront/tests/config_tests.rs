// tests/config_tests.rs
use serial_test::serial;
use std::env;
use std::time::Duration;
use storefront::config::AppConfig;
use storefront::errors::AppError;
use storefront::services::xpay::XPayEnvironment;

const VARS: &[&str] = &[
  "SERVER_HOST",
  "SERVER_PORT",
  "APP_BASE_URL",
  "CMS_URL",
  "NEXT_PUBLIC_CMS_URL",
  "XPAY_API_KEY",
  "XPAY_COMMUNITY_ID",
  "XPAY_VARIABLE_AMOUNT_ID",
  "XPAY_ENVIRONMENT",
  "XPAY_BASE_URL",
  "XPAY_TIMEOUT_SECS",
  "CATALOG_TIMEOUT_SECS",
  "CART_COOKIE_SECRET",
  "CART_COOKIE_SECURE",
  "ENABLE_TEST_CART",
  "TEST_CART_PRODUCT_ID",
  "DATABASE_URL",
  "RESEND_API_KEY",
  "DEFAULT_CURRENCY",
];

fn reset_env(pairs: &[(&str, &str)]) {
  for var in VARS {
    env::remove_var(var);
  }
  for (k, v) in pairs {
    env::set_var(k, v);
  }
}

fn required() -> Vec<(&'static str, &'static str)> {
  vec![
    ("NEXT_PUBLIC_CMS_URL", "https://cms.shop.example/"),
    ("XPAY_API_KEY", "key-1"),
    ("XPAY_COMMUNITY_ID", "community-7"),
    ("XPAY_VARIABLE_AMOUNT_ID", "42"),
  ]
}

#[test]
#[serial]
fn loads_required_values_and_defaults() {
  reset_env(&required());

  let config = AppConfig::from_env().unwrap();
  assert_eq!(config.cms_url, "https://cms.shop.example/");
  assert_eq!(config.xpay_variable_amount_id, 42);
  assert_eq!(config.xpay_environment, XPayEnvironment::Staging);
  assert_eq!(config.xpay_timeout, Duration::from_secs(20));
  assert_eq!(config.catalog_timeout, Duration::from_secs(8));
  assert_eq!(config.app_base_url, "http://127.0.0.1:8080");
  assert_eq!(config.default_currency.as_str(), "EGP");
  assert!(!config.enable_test_cart);
  assert!(config.database_url.is_none());
}

#[test]
#[serial]
fn optional_values_override_defaults() {
  let mut pairs = required();
  pairs.extend([
    ("APP_BASE_URL", "https://shop.example/"),
    ("XPAY_ENVIRONMENT", "production"),
    ("XPAY_TIMEOUT_SECS", "5"),
    ("ENABLE_TEST_CART", "true"),
    ("DEFAULT_CURRENCY", "usd"),
  ]);
  reset_env(&pairs);

  let config = AppConfig::from_env().unwrap();
  assert_eq!(config.app_base_url, "https://shop.example");
  assert_eq!(config.xpay_environment, XPayEnvironment::Production);
  assert_eq!(config.gateway_config().base_url, "https://community.xpay.app/api/v1");
  assert_eq!(config.xpay_timeout, Duration::from_secs(5));
  assert!(config.enable_test_cart);
  assert_eq!(config.default_currency.as_str(), "USD");
}

#[test]
#[serial]
fn missing_or_malformed_values_are_config_errors() {
  reset_env(&required()[1..]);
  assert!(matches!(AppConfig::from_env(), Err(AppError::Config(_))));

  let mut pairs = required();
  pairs.push(("XPAY_VARIABLE_AMOUNT_ID", "forty-two"));
  reset_env(&pairs);
  assert!(matches!(AppConfig::from_env(), Err(AppError::Config(_))));

  let mut pairs = required();
  pairs.push(("CART_COOKIE_SECURE", "sometimes"));
  reset_env(&pairs);
  assert!(matches!(AppConfig::from_env(), Err(AppError::Config(_))));
}
