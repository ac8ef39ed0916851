// storefront/src/config.rs

use crate::errors::{AppError, Result};
use crate::models::CurrencyCode;
use crate::services::xpay::{GatewayConfig, XPayEnvironment};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::time::Duration;

#[derive(Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  /// Public origin used to build buyer-facing redirect targets.
  pub app_base_url: String,

  pub cms_url: String,
  pub catalog_timeout: Duration,

  pub xpay_api_key: String,
  pub xpay_community_id: String,
  pub xpay_variable_amount_id: u64,
  pub xpay_environment: XPayEnvironment,
  pub xpay_base_url: Option<String>,
  pub xpay_timeout: Duration,

  pub cookie_secret: Option<String>,
  pub cookie_secure: bool,
  pub enable_test_cart: bool,
  pub test_cart_product_id: String,

  pub database_url: Option<String>,

  pub resend_api_key: Option<String>,
  pub notification_sender: String,
  pub admin_email: Option<String>,

  pub default_currency: CurrencyCode,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 8080,
      app_base_url: "http://127.0.0.1:8080".to_string(),
      cms_url: "http://127.0.0.1:3001".to_string(),
      catalog_timeout: Duration::from_secs(8),
      xpay_api_key: String::new(),
      xpay_community_id: String::new(),
      xpay_variable_amount_id: 0,
      xpay_environment: XPayEnvironment::Staging,
      xpay_base_url: None,
      xpay_timeout: Duration::from_secs(20),
      cookie_secret: None,
      cookie_secure: false,
      enable_test_cart: false,
      test_cart_product_id: "test-product-1".to_string(),
      database_url: None,
      resend_api_key: None,
      notification_sender: "Storefront <orders@example.com>".to_string(),
      admin_email: None,
      default_currency: CurrencyCode::default(),
    }
  }
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };
    let optional = |var_name: &str| get_env(var_name).ok().filter(|v| !v.trim().is_empty());
    let flag = |var_name: &str, default: bool| -> Result<bool> {
      match optional(var_name) {
        Some(raw) => raw
          .trim()
          .parse::<bool>()
          .map_err(|e| AppError::Config(format!("Invalid {} value: {}", var_name, e))),
        None => Ok(default),
      }
    };
    let seconds = |var_name: &str, default: u64| -> Result<Duration> {
      match optional(var_name) {
        Some(raw) => raw
          .trim()
          .parse::<u64>()
          .map(Duration::from_secs)
          .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e))),
        None => Ok(Duration::from_secs(default)),
      }
    };

    let defaults = Self::default();

    let server_host = optional("SERVER_HOST").unwrap_or(defaults.server_host);
    let server_port = optional("SERVER_PORT")
      .map(|p| p.parse::<u16>())
      .transpose()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?
      .unwrap_or(defaults.server_port);
    let app_base_url = optional("APP_BASE_URL")
      .unwrap_or_else(|| format!("http://{}:{}", server_host, server_port))
      .trim_end_matches('/')
      .to_string();

    let cms_url = optional("CMS_URL")
      .or_else(|| optional("NEXT_PUBLIC_CMS_URL"))
      .ok_or_else(|| AppError::Config("Missing environment variable 'CMS_URL'".to_string()))?;

    let xpay_api_key = get_env("XPAY_API_KEY")?;
    let xpay_community_id = get_env("XPAY_COMMUNITY_ID")?;
    let xpay_variable_amount_id = get_env("XPAY_VARIABLE_AMOUNT_ID")?
      .trim()
      .parse::<u64>()
      .map_err(|e| AppError::Config(format!("Invalid XPAY_VARIABLE_AMOUNT_ID: {}", e)))?;
    let xpay_environment = optional("XPAY_ENVIRONMENT")
      .map(|v| v.parse::<XPayEnvironment>())
      .transpose()
      .map_err(AppError::Config)?
      .unwrap_or(defaults.xpay_environment);

    let default_currency = optional("DEFAULT_CURRENCY")
      .map(|v| v.parse::<CurrencyCode>())
      .transpose()
      .map_err(|e| AppError::Config(format!("Invalid DEFAULT_CURRENCY: {}", e)))?
      .unwrap_or_default();

    let config = Self {
      server_host,
      server_port,
      app_base_url,
      cms_url,
      catalog_timeout: seconds("CATALOG_TIMEOUT_SECS", 8)?,
      xpay_api_key,
      xpay_community_id,
      xpay_variable_amount_id,
      xpay_environment,
      xpay_base_url: optional("XPAY_BASE_URL"),
      xpay_timeout: seconds("XPAY_TIMEOUT_SECS", 20)?,
      cookie_secret: optional("CART_COOKIE_SECRET"),
      cookie_secure: flag("CART_COOKIE_SECURE", false)?,
      enable_test_cart: flag("ENABLE_TEST_CART", false)?,
      test_cart_product_id: optional("TEST_CART_PRODUCT_ID").unwrap_or(defaults.test_cart_product_id),
      database_url: optional("DATABASE_URL"),
      resend_api_key: optional("RESEND_API_KEY"),
      notification_sender: optional("NOTIFICATION_SENDER").unwrap_or(defaults.notification_sender),
      admin_email: optional("ADMIN_EMAIL"),
      default_currency,
    };

    tracing::info!(config = ?config, "Application configuration loaded successfully.");
    Ok(config)
  }

  pub fn gateway_config(&self) -> GatewayConfig {
    GatewayConfig {
      api_key: self.xpay_api_key.clone(),
      community_id: self.xpay_community_id.clone(),
      variable_amount_id: self.xpay_variable_amount_id,
      base_url: self
        .xpay_base_url
        .clone()
        .unwrap_or_else(|| self.xpay_environment.base_url().to_string()),
      timeout: self.xpay_timeout,
    }
  }
}

fn redacted(value: &Option<String>) -> &'static str {
  if value.is_some() {
    "[REDACTED]"
  } else {
    "<unset>"
  }
}

impl fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AppConfig")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("app_base_url", &self.app_base_url)
      .field("cms_url", &self.cms_url)
      .field("catalog_timeout", &self.catalog_timeout)
      .field("xpay_api_key", &"[REDACTED]")
      .field("xpay_community_id", &self.xpay_community_id)
      .field("xpay_variable_amount_id", &self.xpay_variable_amount_id)
      .field("xpay_environment", &self.xpay_environment)
      .field("xpay_base_url", &self.xpay_base_url)
      .field("xpay_timeout", &self.xpay_timeout)
      .field("cookie_secret", &redacted(&self.cookie_secret))
      .field("cookie_secure", &self.cookie_secure)
      .field("enable_test_cart", &self.enable_test_cart)
      .field("test_cart_product_id", &self.test_cart_product_id)
      .field("database_url", &redacted(&self.database_url))
      .field("resend_api_key", &redacted(&self.resend_api_key))
      .field("notification_sender", &self.notification_sender)
      .field("admin_email", &self.admin_email)
      .field("default_currency", &self.default_currency)
      .finish()
  }
}
