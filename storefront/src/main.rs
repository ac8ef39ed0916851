// storefront/src/main.rs

use storefront::config::AppConfig;
use storefront::state::AppState;
use storefront::web::configure_app_routes;

use actix_web::{web as actix_data, App, HttpServer};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  // LOG_FORMAT=json switches to machine-readable output.
  let json_logs = std::env::var("LOG_FORMAT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false);
  let builder = tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_span_events(FmtSpan::CLOSE);
  if json_logs {
    builder.json().init();
  } else {
    builder.init();
  }

  tracing::info!("Starting storefront server...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => cfg,
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()));
    }
  };

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);

  let app_state = match AppState::from_config(app_config).await {
    Ok(state) => state,
    Err(e) => {
      tracing::error!(error = %e, "Failed to build application state.");
      return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }
  };

  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await
}
