// storefront/src/web/routes.rs

use actix_web::{error::JsonPayloadError, web, HttpRequest, HttpResponse};

use crate::errors::AppError;
use crate::web::handlers::{callback_handlers, cart_handlers, checkout_handlers};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
  AppError::Validation(format!("Invalid request body: {}", err)).into()
}

/// Mounts every storefront route under `/api`. Called from `main.rs` and
/// from the integration tests.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler));
  cfg.service(
    web::scope("/api")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/cart")
          .route("", web::get().to(cart_handlers::get_cart_handler))
          .route("", web::delete().to(cart_handlers::clear_cart_handler))
          .route("/count", web::get().to(cart_handlers::cart_count_handler))
          .route("/items", web::post().to(cart_handlers::add_item_handler))
          .route(
            "/items/{product_id}",
            web::put().to(cart_handlers::set_quantity_handler),
          )
          .route(
            "/items/{product_id}",
            web::delete().to(cart_handlers::remove_item_handler),
          ),
      )
      .service(
        web::scope("/checkout")
          .route("/prepare", web::post().to(checkout_handlers::prepare_handler))
          .route("/pay", web::post().to(checkout_handlers::pay_handler))
          .route(
            "/success",
            web::get().to(checkout_handlers::success_redirect_handler),
          ),
      )
      .route(
        "/xpay/callback",
        web::post().to(callback_handlers::xpay_callback_handler),
      ),
  );
}
