// storefront/src/models/money.rs

//! Integer minor-unit amounts.
//!
//! Every supported currency has two decimal places, so one major unit is 100
//! minor units (1 EGP = 100 piasters). `Money` deliberately has no serde
//! impls of its own: each wire field must pick [`major_units`] or
//! [`minor_units`] explicitly, and those modules are the only place the two
//! scales meet.

use std::fmt;

const MINOR_PER_MAJOR: i64 = 100;
// Beyond this an f64 can no longer represent every minor unit exactly.
const MAX_SAFE_MINOR: f64 = 9_000_000_000_000_000.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
  pub const ZERO: Money = Money(0);

  pub const fn from_minor(minor: i64) -> Self {
    Money(minor)
  }

  pub const fn minor(self) -> i64 {
    self.0
  }

  /// Converts a decimal major-unit amount, rounding half away from zero to the nearest minor unit.
  pub fn from_major(major: f64) -> Option<Self> {
    let scaled = (major * MINOR_PER_MAJOR as f64).round();
    if !scaled.is_finite() || scaled.abs() > MAX_SAFE_MINOR {
      return None;
    }
    Some(Money(scaled as i64))
  }

  pub fn to_major(self) -> f64 {
    self.0 as f64 / MINOR_PER_MAJOR as f64
  }

  pub fn is_positive(self) -> bool {
    self.0 > 0
  }

  pub fn checked_add(self, other: Money) -> Option<Money> {
    self.0.checked_add(other.0).map(Money)
  }

  pub fn checked_mul(self, qty: u32) -> Option<Money> {
    self.0.checked_mul(i64::from(qty)).map(Money)
  }
}

impl fmt::Display for Money {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sign = if self.0 < 0 { "-" } else { "" };
    let abs = self.0.unsigned_abs();
    let per = MINOR_PER_MAJOR as u64;
    write!(f, "{}{}.{:02}", sign, abs / per, abs % per)
  }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum NumberOrText {
  Number(f64),
  Text(String),
}

impl NumberOrText {
  fn into_f64(self) -> Result<f64, String> {
    match self {
      NumberOrText::Number(n) => Ok(n),
      NumberOrText::Text(s) => s.trim().parse::<f64>().map_err(|_| format!("'{}' is not a number", s)),
    }
  }
}

/// Decimal major units on the wire (`210.5` means 210.50 EGP). Accepts numeric strings on input.
pub mod major_units {
  use super::{Money, NumberOrText};
  use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(amount: &Money, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(amount.to_major())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
    let raw = NumberOrText::deserialize(deserializer)?.into_f64().map_err(D::Error::custom)?;
    Money::from_major(raw).ok_or_else(|| D::Error::custom("amount out of range"))
  }

  pub mod option {
    use super::super::{Money, NumberOrText};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Option<Money>, serializer: S) -> Result<S::Ok, S::Error> {
      match amount {
        Some(m) => serializer.serialize_some(&m.to_major()),
        None => serializer.serialize_none(),
      }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Money>, D::Error> {
      match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => {
          let major = raw.into_f64().map_err(D::Error::custom)?;
          Money::from_major(major)
            .map(Some)
            .ok_or_else(|| D::Error::custom("amount out of range"))
        }
      }
    }
  }
}

/// Integer minor units on the wire (`21000` means 210.00 EGP).
pub mod minor_units {
  pub mod option {
    use super::super::{Money, NumberOrText};
    use serde::{de::Error as _, Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Money>, D::Error> {
      match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => {
          let minor = raw.into_f64().map_err(D::Error::custom)?;
          if minor.fract() != 0.0 || !minor.is_finite() {
            return Err(D::Error::custom("minor-unit amount must be an integer"));
          }
          Ok(Some(Money::from_minor(minor as i64)))
        }
      }
    }
  }
}
