//! Error types for `flourish-core`.

use thiserror::Error;

use crate::cohort::{Cohort, ScheduleKind};

#[derive(Debug, Error)]
pub enum Error {
  #[error("cohort {cohort:?} has no {kind:?} schedule")]
  NoSuchSchedule { cohort: Cohort, kind: ScheduleKind },

  #[error("unrecognised schedule name: {0:?}")]
  UnknownScheduleName(String),

  #[error("value does not encode as a choice code: {0}")]
  NotAChoice(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
