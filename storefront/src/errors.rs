// storefront/src/errors.rs

use crate::services::catalog::CatalogError;
use crate::services::xpay::GatewayError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use stepflow::FlowError;
use thiserror::Error;

const PAYMENT_FAILED: &str = "Payment failed, please try again.";

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Invalid Cart: {0}")]
  InvalidCart(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Payment Gateway Error: {0}")]
  Gateway(#[from] GatewayError),

  #[error("Catalog Error: {0}")]
  Catalog(#[from] CatalogError),

  #[error("Unauthorized: {0}")]
  Unauthorized(String),

  #[error("Invalid Callback: {0}")]
  InvalidCallback(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<AppError>() {
      Ok(app_err) => app_err,
      Err(err) => match err.downcast::<FlowError>() {
        Ok(source) => AppError::Workflow { source },
        Err(err) => AppError::Internal(format!("{:#}", err)),
      },
    }
  }
}

impl AppError {
  /// Pipeline handlers return `AppError` directly, so an engine `HandlerError`
  /// may be wrapping one of ours. Peel it back out.
  pub fn flatten(self) -> Self {
    match self {
      AppError::Workflow {
        source: FlowError::HandlerError { source },
      } => AppError::from(source),
      other => other,
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::Validation(_) | AppError::InvalidCart(_) | AppError::InvalidCallback(_) => StatusCode::BAD_REQUEST,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      AppError::Gateway(_) | AppError::Catalog(_) => StatusCode::BAD_GATEWAY,
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::warn!(application_error = %self, "Responding with error");
    }
    let body = match self {
      AppError::Validation(m) | AppError::InvalidCart(m) | AppError::NotFound(m) => json!({"error": m}),
      AppError::Gateway(_) => json!({"error": PAYMENT_FAILED}),
      AppError::Catalog(_) => json!({"error": "Product catalog is unavailable, please try again."}),
      AppError::Unauthorized(_) => json!({"error": "Unauthorized"}),
      AppError::InvalidCallback(_) => json!({"error": "Invalid callback data"}),
      AppError::Config(_) | AppError::Sqlx(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        json!({"error": "An internal error occurred"})
      }
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
