// storefront/src/models/mod.rs

pub mod billing;
pub mod callback;
pub mod cart;
pub mod money;
pub mod payment;

pub use billing::BillingData;
pub use callback::PaymentNotification;
pub use cart::{Cart, CartItem, ProductId};
pub use money::Money;
pub use payment::{
  CurrencyCode, CustomField, Language, PaymentMetadata, PaymentMethod, Transaction, TransactionId, TransactionStatus,
};

/// Identifiers that upstream systems send either as JSON numbers or strings.
pub(crate) mod flexible_string {
  use serde::{Deserialize, Deserializer};

  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
  }

  impl Raw {
    fn into_string(self) -> String {
      match self {
        Raw::Int(n) => n.to_string(),
        Raw::Uint(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
        Raw::Text(s) => s,
      }
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Raw::deserialize(deserializer).map(Raw::into_string)
  }

  pub mod option {
    use super::Raw;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
      Ok(Option::<Raw>::deserialize(deserializer)?.map(Raw::into_string))
    }
  }
}
