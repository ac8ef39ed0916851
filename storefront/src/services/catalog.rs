// storefront/src/services/catalog.rs

//! Read-only product lookups against the headless CMS.

use crate::models::money::major_units;
use crate::models::{Money, ProductId};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("catalog request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("catalog responded with HTTP {0}")]
  Status(u16),

  #[error("catalog response could not be decoded: {0}")]
  Decode(String),

  #[error("invalid catalog base URL: {0}")]
  BadBaseUrl(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
  pub id: ProductId,
  /// Unit price. Products without one cannot be checked out.
  #[serde(default, with = "major_units::option")]
  pub price: Option<Money>,
  #[serde(default)]
  pub title: Option<String>,
}

#[async_trait]
pub trait Catalog: Send + Sync {
  async fn product_exists(&self, id: &ProductId) -> Result<bool, CatalogError>;

  /// Products for the given ids. Ids the catalog does not know are simply absent.
  async fn products(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, CatalogError>;
}

#[derive(Deserialize)]
struct ProductPage {
  #[serde(default)]
  docs: Vec<CatalogProduct>,
}

pub struct CmsCatalog {
  http: reqwest::Client,
  base: Url,
  timeout: Duration,
}

impl CmsCatalog {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CatalogError> {
    let base = Url::parse(base_url).map_err(|e| CatalogError::BadBaseUrl(format!("{}: {}", base_url, e)))?;
    if base.cannot_be_a_base() {
      return Err(CatalogError::BadBaseUrl(base_url.to_string()));
    }
    let http = reqwest::Client::builder().build()?;
    Ok(Self { http, base, timeout })
  }

  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  /// One attempt under the deadline; a timeout or connect failure gets exactly
  /// one more attempt without it.
  async fn get(&self, url: Url) -> Result<reqwest::Response, CatalogError> {
    let first = self
      .http
      .get(url.clone())
      .header(ACCEPT, "application/json")
      .timeout(self.timeout)
      .send()
      .await;
    match first {
      Err(e) if e.is_timeout() || e.is_connect() => {
        warn!(error = %e, url = %url, "Catalog request failed, retrying once.");
        Ok(self.http.get(url).header(ACCEPT, "application/json").send().await?)
      }
      other => Ok(other?),
    }
  }
}

#[async_trait]
impl Catalog for CmsCatalog {
  #[instrument(name = "catalog::product_exists", skip(self), fields(product_id = %id))]
  async fn product_exists(&self, id: &ProductId) -> Result<bool, CatalogError> {
    let response = self.get(self.endpoint(&["api", "products", id.as_str()])).await?;
    match response.status() {
      s if s.is_success() => Ok(true),
      StatusCode::NOT_FOUND => Ok(false),
      s => Err(CatalogError::Status(s.as_u16())),
    }
  }

  #[instrument(name = "catalog::products", skip(self, ids), fields(count = ids.len()))]
  async fn products(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, CatalogError> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let mut url = self.endpoint(&["api", "products"]);
    {
      let mut query = url.query_pairs_mut();
      for id in ids {
        query.append_pair("where[id][in]", id.as_str());
      }
      query.append_pair("depth", "0");
      query.append_pair("limit", &ids.len().to_string());
    }

    let response = self.get(url).await?;
    let status = response.status();
    if !status.is_success() {
      return Err(CatalogError::Status(status.as_u16()));
    }
    let page: ProductPage = response
      .json()
      .await
      .map_err(|e| CatalogError::Decode(e.to_string()))?;
    debug!(found = page.docs.len(), "Catalog products loaded.");
    Ok(page.docs)
  }
}

/// Fixed in-process catalog.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
  products: HashMap<ProductId, CatalogProduct>,
}

impl MemoryCatalog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_product(mut self, id: &str, price: Option<Money>) -> Self {
    if let Ok(id) = ProductId::parse(id) {
      self.products.insert(
        id.clone(),
        CatalogProduct {
          id,
          price,
          title: None,
        },
      );
    }
    self
  }
}

#[async_trait]
impl Catalog for MemoryCatalog {
  async fn product_exists(&self, id: &ProductId) -> Result<bool, CatalogError> {
    Ok(self.products.contains_key(id))
  }

  async fn products(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, CatalogError> {
    Ok(ids.iter().filter_map(|id| self.products.get(id).cloned()).collect())
  }
}
