// storefront/src/pipelines/mod.rs

//! Defines and registers all pipelines used by the storefront.

use crate::errors::AppError;
use stepflow::Registry;

pub mod common_steps;
pub mod contexts;

pub mod cart_pipeline;
pub mod checkout_pipeline;
pub mod reconcile_pipeline;

/// Registers every pipeline. Called once while building `AppState`.
pub fn register_all_pipelines(registry: &Registry<AppError>) {
  tracing::info!("Registering pipelines...");

  cart_pipeline::register_cart_pipeline(registry);
  checkout_pipeline::register_checkout_pipeline(registry);
  reconcile_pipeline::register_reconcile_pipeline(registry);

  tracing::info!("All storefront pipelines registered.");
}
