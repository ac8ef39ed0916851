// storefront/src/state.rs
use crate::config::AppConfig;
use crate::errors::{AppError, Result as AppResult};
use crate::pipelines;
use crate::services::catalog::{Catalog, CmsCatalog};
use crate::services::ledger::{MemoryLedger, PgLedger, TransactionLedger};
use crate::services::notifier::{LogNotifier, Notifier, ResendNotifier};
use crate::services::xpay::XPayClient;
use actix_web::cookie::Key;
use std::sync::Arc;
use stepflow::Registry;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
  pub registry: Arc<Registry<AppError>>,
  pub config: Arc<AppConfig>,
  pub catalog: Arc<dyn Catalog>,
  pub gateway: Arc<XPayClient>,
  pub ledger: Arc<dyn TransactionLedger>,
  pub notifier: Arc<dyn Notifier>,
  pub cookie_key: Key,
}

impl AppState {
  /// Assembles state from already-built collaborators and registers every pipeline.
  pub fn new(
    config: AppConfig,
    catalog: Arc<dyn Catalog>,
    gateway: XPayClient,
    ledger: Arc<dyn TransactionLedger>,
    notifier: Arc<dyn Notifier>,
  ) -> Self {
    let cookie_key = cookie_key(config.cookie_secret.as_deref());
    let registry = Arc::new(Registry::<AppError>::new());
    pipelines::register_all_pipelines(&registry);
    Self {
      registry,
      config: Arc::new(config),
      catalog,
      gateway: Arc::new(gateway),
      ledger,
      notifier,
      cookie_key,
    }
  }

  pub async fn from_config(config: AppConfig) -> AppResult<Self> {
    let catalog: Arc<dyn Catalog> = Arc::new(CmsCatalog::new(&config.cms_url, config.catalog_timeout)?);
    let gateway = XPayClient::new(config.gateway_config())?;

    let ledger: Arc<dyn TransactionLedger> = match config.database_url.as_deref() {
      Some(url) => Arc::new(PgLedger::connect(url).await?),
      None => {
        warn!("DATABASE_URL not set; transaction ledger is in-memory and resets on restart.");
        Arc::new(MemoryLedger::new())
      }
    };

    let notifier: Arc<dyn Notifier> = match config.resend_api_key.clone() {
      Some(key) => Arc::new(ResendNotifier::new(
        key,
        config.notification_sender.clone(),
        config.admin_email.clone(),
      )),
      None => {
        info!("RESEND_API_KEY not set; payment notifications are logged only.");
        Arc::new(LogNotifier)
      }
    };

    Ok(Self::new(config, catalog, gateway, ledger, notifier))
  }
}

fn cookie_key(secret: Option<&str>) -> Key {
  match secret.map(|s| Key::try_from(s.as_bytes())) {
    Some(Ok(key)) => key,
    Some(Err(e)) => {
      warn!(error = %e, "CART_COOKIE_SECRET is unusable (needs at least 64 bytes); using a per-process key.");
      Key::generate()
    }
    None => {
      warn!("CART_COOKIE_SECRET not set; carts will not survive a restart.");
      Key::generate()
    }
  }
}
