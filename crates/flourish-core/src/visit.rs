//! Scheduled encounters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Visit code of the first visit on an enrollment schedule.
pub const ENROLLMENT_VISIT_CODE: &str = "2000";

/// Visit code of the first visit on the cohort A birth schedule.
pub const BIRTH_VISIT_CODE: &str = "2000D";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitReason {
  Scheduled,
  Unscheduled,
  Missed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildVisit {
  pub visit_id:           Uuid,
  pub subject_identifier: String,
  pub schedule_name:      String,
  pub visit_code:         String,
  pub report_datetime:    DateTime<Utc>,
  pub reason:             VisitReason,
}

/// Input to [`crate::store::EnrollmentStore::add_visit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChildVisit {
  pub subject_identifier: String,
  pub schedule_name:      String,
  pub visit_code:         String,
  pub report_datetime:    DateTime<Utc>,
  pub reason:             VisitReason,
}

impl NewChildVisit {
  pub fn into_visit(self, visit_id: Uuid) -> ChildVisit {
    ChildVisit {
      visit_id,
      subject_identifier: self.subject_identifier,
      schedule_name: self.schedule_name,
      visit_code: self.visit_code,
      report_datetime: self.report_datetime,
      reason: self.reason,
    }
  }
}
