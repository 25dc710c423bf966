//! Field-attached validation errors, as shown next to form inputs.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;

pub const REQUIRED: &str = "This field is required.";
pub const NOT_REQUIRED: &str = "This field is not required.";

/// Messages keyed by the field they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
  fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
  pub fn new() -> Self { Self::default() }

  pub fn add(&mut self, field: &str, message: impl Into<String>) {
    self
      .fields
      .entry(field.to_owned())
      .or_default()
      .push(message.into());
  }

  pub fn is_empty(&self) -> bool { self.fields.is_empty() }

  /// Messages for `field`; empty if it has none.
  pub fn get(&self, field: &str) -> &[String] {
    self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn fields(&self) -> impl Iterator<Item = &str> {
    self.fields.keys().map(String::as_str)
  }

  pub fn merge(&mut self, other: ValidationErrors) {
    for (field, messages) in other.fields {
      self.fields.entry(field).or_default().extend(messages);
    }
  }

  /// `Ok(())` when no errors were collected.
  pub fn into_result(self) -> Result<(), Self> {
    if self.is_empty() { Ok(()) } else { Err(self) }
  }

  /// `field` must be answered when `condition` holds and left blank when it
  /// does not.
  pub fn required_if<T>(&mut self, condition: bool, field: &str, value: &Option<T>) {
    match (condition, value.is_some()) {
      (true, false) => self.add(field, REQUIRED),
      (false, true) => self.add(field, NOT_REQUIRED),
      _ => {}
    }
  }

  /// `field` must be answered when `condition` holds; otherwise it is free.
  pub fn required_when<T>(&mut self, condition: bool, field: &str, value: &Option<T>) {
    if condition && value.is_none() {
      self.add(field, REQUIRED);
    }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (field, messages) in &self.fields {
      for message in messages {
        if !first {
          f.write_str("; ")?;
        }
        write!(f, "{field}: {message}")?;
        first = false;
      }
    }
    Ok(())
  }
}

impl std::error::Error for ValidationErrors {}
