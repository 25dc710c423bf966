//! Field-level change detection between two versions of a form.
//!
//! A record type lists its comparable fields explicitly through
//! [`TrackedFields`], each tagged with how it is normalised before comparison.
//! Fields that are not listed (audit stamps, visit linkage, the "changed"
//! flag itself) are never compared.

use std::collections::BTreeMap;

use chrono::NaiveDate;

/// A comparable field value, tagged with its normalisation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
  /// Free text; surrounding whitespace is ignored and empty means absent.
  Text(Option<String>),
  Date(Option<NaiveDate>),
  Int(Option<i64>),
  /// A coded answer, compared by its code.
  Choice(Option<&'static str>),
  /// A multi-valued field, compared as a set of identifiers.
  Set(Vec<String>),
}

/// The normalised form two values are compared in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
  Absent,
  Scalar(String),
  /// Sorted and de-duplicated.
  Set(Vec<String>),
}

impl FieldValue {
  pub fn normalize(&self) -> Normalized {
    match self {
      Self::Text(v) => v
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or(Normalized::Absent, |s| Normalized::Scalar(s.to_owned())),
      Self::Date(v) => scalar(v.map(|d| d.to_string())),
      Self::Int(v) => scalar(v.map(|i| i.to_string())),
      Self::Choice(v) => scalar(v.map(str::to_owned)),
      Self::Set(ids) => {
        let mut ids: Vec<String> = ids
          .iter()
          .map(|s| s.trim().to_owned())
          .filter(|s| !s.is_empty())
          .collect();
        ids.sort();
        ids.dedup();
        Normalized::Set(ids)
      }
    }
  }

  /// Build a [`FieldValue::Set`] from any displayable identifiers.
  pub fn set<I, T>(ids: I) -> Self
  where
    I: IntoIterator<Item = T>,
    T: ToString,
  {
    Self::Set(ids.into_iter().map(|id| id.to_string()).collect())
  }
}

fn scalar(v: Option<String>) -> Normalized {
  v.map_or(Normalized::Absent, Normalized::Scalar)
}

/// Implemented by form payloads that take part in change detection.
pub trait TrackedFields {
  /// Every comparable field, by name.
  fn tracked_fields(&self) -> Vec<(&'static str, FieldValue)>;
}

/// Field name → normalised value.
pub type Snapshot = BTreeMap<&'static str, Normalized>;

pub fn snapshot<T: TrackedFields + ?Sized>(record: &T) -> Snapshot {
  record
    .tracked_fields()
    .into_iter()
    .map(|(name, value)| (name, value.normalize()))
    .collect()
}

/// Names of the fields whose normalised values differ, in name order.
pub fn changed_fields<T: TrackedFields + ?Sized>(
  previous: &T,
  current: &T,
) -> Vec<&'static str> {
  let before = snapshot(previous);
  let after = snapshot(current);
  before
    .keys()
    .chain(after.keys())
    .copied()
    .collect::<std::collections::BTreeSet<_>>()
    .into_iter()
    .filter(|name| before.get(name) != after.get(name))
    .collect()
}

pub fn has_changed<T: TrackedFields + ?Sized>(previous: &T, current: &T) -> bool {
  snapshot(previous) != snapshot(current)
}
