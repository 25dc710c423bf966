//! Error type for `flourish-enrollment`.

use flourish_core::{cohort::Cohort, validation::ValidationErrors};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no consent on file for {0}")]
  ConsentNotFound(String),

  #[error("{subject_identifier} is not on schedule {schedule_name}")]
  NotOnSchedule {
    subject_identifier: String,
    schedule_name:      String,
  },

  #[error("{subject_identifier} is already off schedule {schedule_name}")]
  AlreadyOffSchedule {
    subject_identifier: String,
    schedule_name:      String,
  },

  #[error("unknown schedule: {0}")]
  UnknownSchedule(String),

  #[error(
    "{subject_identifier} is on cohort {active:?}; take it off before \
     enrolling onto {requested:?}"
  )]
  CohortConflict {
    subject_identifier: String,
    active:             Cohort,
    requested:          Cohort,
  },

  #[error("an assent already exists for {0}")]
  AssentExists(String),

  #[error("visit not found: {0}")]
  VisitNotFound(uuid::Uuid),

  #[error("visit {0} already has an infant feeding record")]
  FeedingExists(uuid::Uuid),

  #[error("visit {visit_id} belongs to {visit_subject}, not {submitted_subject}")]
  VisitSubjectMismatch {
    visit_id:          uuid::Uuid,
    visit_subject:     String,
    submitted_subject: String,
  },

  #[error("{subject_identifier} already has an infant feeding record at {report_datetime}")]
  FeedingTimeTaken {
    subject_identifier: String,
    report_datetime:    chrono::DateTime<chrono::Utc>,
  },

  #[error("validation failed: {0}")]
  Invalid(#[from] ValidationErrors),

  #[error("core error: {0}")]
  Core(#[from] flourish_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
