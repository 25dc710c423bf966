//! Enrollment workflows for the Flourish study.
//!
//! [`EnrollmentService`] ties the pure rules in `flourish-core` to any
//! [`EnrollmentStore`](flourish_core::store::EnrollmentStore): consent
//! intake and cohort placement, visits and quarterly follow-up, child assent,
//! and infant feeding submissions.

pub mod error;
pub mod service;

pub use error::{Error, Result};
pub use service::{Assignment, DatasetImport, EnrollmentService, VisitOutcome};

use std::path::PathBuf;

use chrono::NaiveDate;
use flourish_core::cohort::CohortWindows;
use serde::Deserialize;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `flourish.toml` and `FLOURISH_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  #[serde(default = "default_store_path")]
  pub store_path:     PathBuf,
  /// Date ages are measured at. Unset means each consent's own date.
  #[serde(default)]
  pub reference_date: Option<NaiveDate>,
  #[serde(default)]
  pub windows:        CohortWindows,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      store_path:     default_store_path(),
      reference_date: None,
      windows:        CohortWindows::default(),
    }
  }
}

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/flourish/flourish.db") }

#[cfg(test)]
mod tests;
