// storefront/src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::errors::{AppError, Result as AppResult};
use crate::models::ProductId;
use crate::pipelines::cart_pipeline::{run_cart_command, CartCommandResult};
use crate::pipelines::contexts::{CartCommand, CartCtxData};
use crate::services::cart_service;
use crate::state::AppState;
use crate::web::extractors::CartSession;

pub const REVALIDATE_HEADER: &str = "X-Cart-Revalidate";

#[derive(Deserialize, Debug)]
pub struct AddItemPayload {
  #[serde(rename = "productId", alias = "product_id")]
  pub product_id: ProductId,
  #[serde(default)]
  pub qty: Option<i64>,
  #[serde(default, rename = "revalidatePath")]
  pub revalidate_path: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct SetQuantityPayload {
  pub qty: i64,
  #[serde(default, rename = "revalidatePath")]
  pub revalidate_path: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RevalidateQuery {
  #[serde(default, rename = "revalidatePath")]
  pub revalidate_path: Option<String>,
}

fn path_product_id(raw: &str) -> AppResult<ProductId> {
  ProductId::parse(raw).map_err(AppError::Validation)
}

async fn apply(
  app_state: &AppState,
  session: &CartSession,
  command: CartCommand,
  revalidate_path: Option<String>,
) -> AppResult<HttpResponse> {
  let ctx = CartCtxData::new(app_state.clone(), session.store(), command, revalidate_path);
  let CartCommandResult { cart, revalidated } = run_cart_command(app_state, ctx).await?;

  let mut response = HttpResponse::Ok();
  if let Some(path) = revalidated {
    response.insert_header((REVALIDATE_HEADER, path));
  }
  session.respond(response.json(cart))
}

#[instrument(name = "handler::get_cart", skip_all)]
pub async fn get_cart_handler(session: CartSession) -> AppResult<HttpResponse> {
  let cart = session.store().read();
  session.respond(HttpResponse::Ok().json(cart))
}

#[instrument(name = "handler::cart_count", skip_all)]
pub async fn cart_count_handler(session: CartSession) -> AppResult<HttpResponse> {
  let count = cart_service::cart_count(session.store().as_ref());
  session.respond(HttpResponse::Ok().json(count))
}

#[instrument(
    name = "handler::add_to_cart",
    skip(app_state, session, payload),
    fields(product_id = %payload.product_id, qty = ?payload.qty)
)]
pub async fn add_item_handler(
  app_state: web::Data<AppState>,
  session: CartSession,
  payload: web::Json<AddItemPayload>,
) -> AppResult<HttpResponse> {
  let AddItemPayload {
    product_id,
    qty,
    revalidate_path,
  } = payload.into_inner();
  info!("Add to cart request received.");
  let command = CartCommand::Add {
    product_id,
    qty: qty.unwrap_or(1),
  };
  apply(&app_state, &session, command, revalidate_path).await
}

#[instrument(name = "handler::set_quantity", skip_all, fields(product_id = %product_id))]
pub async fn set_quantity_handler(
  app_state: web::Data<AppState>,
  session: CartSession,
  product_id: web::Path<String>,
  payload: web::Json<SetQuantityPayload>,
) -> AppResult<HttpResponse> {
  let product_id = path_product_id(&product_id)?;
  let SetQuantityPayload { qty, revalidate_path } = payload.into_inner();
  apply(&app_state, &session, CartCommand::SetQuantity { product_id, qty }, revalidate_path).await
}

#[instrument(name = "handler::remove_from_cart", skip_all, fields(product_id = %product_id))]
pub async fn remove_item_handler(
  app_state: web::Data<AppState>,
  session: CartSession,
  product_id: web::Path<String>,
  query: web::Query<RevalidateQuery>,
) -> AppResult<HttpResponse> {
  let product_id = path_product_id(&product_id)?;
  apply(
    &app_state,
    &session,
    CartCommand::Remove { product_id },
    query.into_inner().revalidate_path,
  )
  .await
}

#[instrument(name = "handler::clear_cart", skip_all)]
pub async fn clear_cart_handler(
  app_state: web::Data<AppState>,
  session: CartSession,
  query: web::Query<RevalidateQuery>,
) -> AppResult<HttpResponse> {
  apply(&app_state, &session, CartCommand::Clear, query.into_inner().revalidate_path).await
}
