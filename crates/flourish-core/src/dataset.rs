//! Maternal and child dataset rows imported from earlier BHP studies.
//!
//! These rows are inputs to cohort assignment only. They are never edited
//! after ingestion.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The prior study the mother was enrolled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
  #[serde(rename = "Tshilo Dikotla")]
  TshiloDikotla,
  Mpepu,
  Tshipidi,
  Mashi,
  #[serde(rename = "Mma Bana")]
  MmaBana,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HivStatus {
  #[serde(rename = "HIV-infected")]
  Infected,
  #[serde(rename = "HIV-uninfected")]
  Uninfected,
  Unknown,
}

/// In-utero HIV exposure of the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exposure {
  #[serde(alias = "exposed")]
  Exposed,
  #[serde(alias = "unexposed")]
  Unexposed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaternalDataset {
  pub study_maternal_identifier: String,
  /// Links the dataset row to the caregiver's screening and consent.
  pub screening_identifier:      String,
  pub protocol:                  Protocol,
  /// Delivery date of the index child.
  pub delivdt:                   NaiveDate,
  pub mom_enrolldate:            NaiveDate,
  pub mom_hivstatus:             HivStatus,
  /// Protease-inhibitor regimen during pregnancy.
  #[serde(default, deserialize_with = "flag")]
  pub preg_pi:                   bool,
  /// Efavirenz regimen during pregnancy.
  #[serde(default, deserialize_with = "flag")]
  pub preg_efv:                  bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildDataset {
  pub study_child_identifier:    String,
  pub study_maternal_identifier: String,
  pub dob:                       NaiveDate,
  pub infant_hiv_exposed:        Exposure,
  /// Set for each child of a twin or triplet delivery.
  #[serde(default, deserialize_with = "flag")]
  pub twin_triplet:              bool,
  pub infant_enrolldate:         NaiveDate,
}

/// Dataset exports encode flags as `0`/`1`; accept those as well as booleans.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
  D: serde::Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Bool(bool),
    Int(i64),
  }

  Ok(match Raw::deserialize(deserializer)? {
    Raw::Bool(b) => b,
    Raw::Int(i) => i != 0,
  })
}
