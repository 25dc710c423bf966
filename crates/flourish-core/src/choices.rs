//! Coded answers shared across forms.
//!
//! Every choice enum serialises to a plain string code. [`to_code`] and
//! [`from_code`] expose that code for storage columns and comparisons.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Error, Result};

/// The string code a choice value serialises to.
pub fn to_code<T: Serialize>(value: &T) -> Result<String> {
  match serde_json::to_value(value)? {
    serde_json::Value::String(code) => Ok(code),
    other => Err(Error::NotAChoice(other.to_string())),
  }
}

/// Parse a choice value back from its string code.
pub fn from_code<T: DeserializeOwned>(code: &str) -> Result<T> {
  Ok(serde_json::from_value(serde_json::Value::String(code.to_owned()))?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YesNo {
  Yes,
  No,
}

impl YesNo {
  /// Must match the serde representation above.
  pub fn code(self) -> &'static str {
    match self {
      Self::Yes => "Yes",
      Self::No => "No",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
  #[serde(rename = "M")]
  Male,
  #[serde(rename = "F")]
  Female,
}

/// The kind of document backing an `identity` number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityType {
  CountryId,
  BirthCertificate,
  Passport,
  Other,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn yes_no_code_matches_serde() {
    for v in [YesNo::Yes, YesNo::No] {
      assert_eq!(to_code(&v).unwrap(), v.code());
    }
  }

  #[test]
  fn gender_roundtrips_through_code() {
    assert_eq!(to_code(&Gender::Male).unwrap(), "M");
    assert_eq!(from_code::<Gender>("F").unwrap(), Gender::Female);
  }

  #[test]
  fn unknown_code_is_an_error() {
    assert!(from_code::<IdentityType>("driving_licence").is_err());
  }
}
