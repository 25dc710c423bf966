//! Error type for `flourish-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] flourish_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("{0} is already in the dataset")]
  DuplicateDataset(String),

  #[error("consent version {version} already exists for {subject_identifier}")]
  DuplicateConsentVersion {
    subject_identifier: String,
    version:            String,
  },

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

  #[error("an assent already exists for {0}")]
  AssentExists(String),

  #[error("visit {0} already has an infant feeding record")]
  FeedingExists(uuid::Uuid),

  #[error("{subject_identifier} already has an infant feeding record at {report_datetime}")]
  FeedingTimeTaken {
    subject_identifier: String,
    report_datetime:    chrono::DateTime<chrono::Utc>,
  },

  #[error("visit not found: {0}")]
  VisitNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
