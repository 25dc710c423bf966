//! Schedule membership (on-schedule) and off-schedule records.
//!
//! A membership is unique per `(subject_identifier, schedule_name)`. Placing a
//! subject on a schedule they are already on is a no-op that returns the
//! existing row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Result,
  cohort::{Cohort, ScheduleKind},
};

/// A subject's enrollment onto one named schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnSchedule {
  pub onschedule_id:       Uuid,
  pub subject_identifier:  String,
  pub schedule_name:       String,
  pub cohort:              Cohort,
  pub kind:                ScheduleKind,
  pub slot:                u8,
  pub onschedule_datetime: DateTime<Utc>,
}

/// Input to [`crate::store::EnrollmentStore::put_on_schedule`].
#[derive(Debug, Clone)]
pub struct NewOnSchedule {
  pub subject_identifier:  String,
  pub schedule_name:       String,
  pub cohort:              Cohort,
  pub kind:                ScheduleKind,
  pub slot:                u8,
  pub onschedule_datetime: DateTime<Utc>,
}

impl NewOnSchedule {
  /// Fails if `cohort` has no schedule of the requested kind.
  pub fn new(
    subject_identifier: impl Into<String>,
    cohort: Cohort,
    kind: ScheduleKind,
    slot: u8,
    onschedule_datetime: DateTime<Utc>,
  ) -> Result<Self> {
    Ok(Self {
      subject_identifier: subject_identifier.into(),
      schedule_name: cohort.schedule_name(kind, slot)?,
      cohort,
      kind,
      slot,
      onschedule_datetime,
    })
  }
}

/// Outcome of an idempotent placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "onschedule", rename_all = "snake_case")]
pub enum Placement {
  Created(OnSchedule),
  /// The subject was already on the schedule; nothing was written.
  Existing(OnSchedule),
}

impl Placement {
  pub fn onschedule(&self) -> &OnSchedule {
    match self {
      Self::Created(o) | Self::Existing(o) => o,
    }
  }

  pub fn into_onschedule(self) -> OnSchedule {
    match self {
      Self::Created(o) | Self::Existing(o) => o,
    }
  }

  pub fn is_new(&self) -> bool { matches!(self, Self::Created(_)) }
}

/// Records that a subject has been taken off one schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffSchedule {
  pub offschedule_id:       Uuid,
  pub subject_identifier:   String,
  pub schedule_name:        String,
  pub offschedule_datetime: DateTime<Utc>,
  pub reason:               Option<String>,
}

/// Input to [`crate::store::EnrollmentStore::take_off_schedule`].
#[derive(Debug, Clone)]
pub struct NewOffSchedule {
  pub subject_identifier:   String,
  pub schedule_name:        String,
  pub offschedule_datetime: DateTime<Utc>,
  pub reason:               Option<String>,
}

/// A membership with its off-schedule record, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Membership {
  pub onschedule:  OnSchedule,
  pub offschedule: Option<OffSchedule>,
}

impl Membership {
  pub fn is_active(&self) -> bool { self.offschedule.is_none() }
}
