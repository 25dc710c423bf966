//! The `EnrollmentStore` trait.
//!
//! Implemented by storage backends (e.g. `flourish-store-sqlite`). The
//! enrollment service depends on this abstraction, not on a concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  consent::{CaregiverChildConsent, ChildAssent, NewAssent, NewConsent},
  dataset::{ChildDataset, MaternalDataset},
  feeding::{InfantFeeding, NewInfantFeeding},
  schedule::{Membership, NewOffSchedule, NewOnSchedule, OffSchedule, Placement},
  visit::{ChildVisit, NewChildVisit},
};

/// Abstraction over a Flourish enrollment store backend.
///
/// Consents, assents, dataset rows and encounters are write-once. Uniqueness
/// rules (one membership per subject and schedule name, one assent per
/// subject, one infant feeding record per visit) are the backend's to
/// enforce.
pub trait EnrollmentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Datasets ──────────────────────────────────────────────────────────

  fn add_maternal_dataset(
    &self,
    row: MaternalDataset,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The maternal dataset row linked to a caregiver's screening identifier.
  fn maternal_dataset_for_screening<'a>(
    &'a self,
    screening_identifier: &'a str,
  ) -> impl Future<Output = Result<Option<MaternalDataset>, Self::Error>> + Send + 'a;

  fn add_child_dataset(
    &self,
    row: ChildDataset,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_child_dataset<'a>(
    &'a self,
    study_child_identifier: &'a str,
  ) -> impl Future<Output = Result<Option<ChildDataset>, Self::Error>> + Send + 'a;

  // ── Consents ──────────────────────────────────────────────────────────

  /// Persist a consent. A second row for the same subject is only accepted
  /// under a different `version`.
  fn add_consent(
    &self,
    input: NewConsent,
  ) -> impl Future<Output = Result<CaregiverChildConsent, Self::Error>> + Send + '_;

  /// The latest consent version for a child, if any.
  fn get_consent<'a>(
    &'a self,
    subject_identifier: &'a str,
  ) -> impl Future<Output = Result<Option<CaregiverChildConsent>, Self::Error>> + Send + 'a;

  /// The latest consent of every child of a caregiver, in the order the
  /// children were first consented.
  fn caregiver_consents<'a>(
    &'a self,
    caregiver_identifier: &'a str,
  ) -> impl Future<Output = Result<Vec<CaregiverChildConsent>, Self::Error>> + Send + 'a;

  // ── Schedules ─────────────────────────────────────────────────────────

  /// Place a subject on a schedule. Idempotent: an existing membership for
  /// the same `(subject_identifier, schedule_name)` is returned unchanged as
  /// [`Placement::Existing`].
  fn put_on_schedule(
    &self,
    input: NewOnSchedule,
  ) -> impl Future<Output = Result<Placement, Self::Error>> + Send + '_;

  /// Take a subject off a schedule. Errors if the subject is not on it or
  /// has already been taken off it.
  fn take_off_schedule(
    &self,
    input: NewOffSchedule,
  ) -> impl Future<Output = Result<OffSchedule, Self::Error>> + Send + '_;

  /// All memberships of a subject, oldest first, with off-schedule status.
  fn memberships<'a>(
    &'a self,
    subject_identifier: &'a str,
  ) -> impl Future<Output = Result<Vec<Membership>, Self::Error>> + Send + 'a;

  // ── Encounters ────────────────────────────────────────────────────────

  fn add_visit(
    &self,
    input: NewChildVisit,
  ) -> impl Future<Output = Result<ChildVisit, Self::Error>> + Send + '_;

  fn get_visit(
    &self,
    visit_id: Uuid,
  ) -> impl Future<Output = Result<Option<ChildVisit>, Self::Error>> + Send + '_;

  /// All visits of a subject, ordered by report datetime.
  fn visits<'a>(
    &'a self,
    subject_identifier: &'a str,
  ) -> impl Future<Output = Result<Vec<ChildVisit>, Self::Error>> + Send + 'a;

  // ── Assent ────────────────────────────────────────────────────────────

  /// Persist an assent. Errors if the subject already has one.
  fn add_assent(
    &self,
    input: NewAssent,
  ) -> impl Future<Output = Result<ChildAssent, Self::Error>> + Send + '_;

  fn get_assent<'a>(
    &'a self,
    subject_identifier: &'a str,
  ) -> impl Future<Output = Result<Option<ChildAssent>, Self::Error>> + Send + 'a;

  // ── Infant feeding ────────────────────────────────────────────────────

  /// Persist an infant feeding record. Errors if the visit already has one,
  /// or if the subject already has a record at the same report datetime.
  fn add_infant_feeding(
    &self,
    input: NewInfantFeeding,
  ) -> impl Future<Output = Result<InfantFeeding, Self::Error>> + Send + '_;

  fn infant_feeding_for_visit(
    &self,
    visit_id: Uuid,
  ) -> impl Future<Output = Result<Option<InfantFeeding>, Self::Error>> + Send + '_;

  /// The subject's record reported at exactly `report_datetime`, if any.
  fn infant_feeding_at<'a>(
    &'a self,
    subject_identifier: &'a str,
    report_datetime: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<InfantFeeding>, Self::Error>> + Send + 'a;

  /// The most recent record for the subject reported strictly before
  /// `before`.
  fn previous_infant_feeding<'a>(
    &'a self,
    subject_identifier: &'a str,
    before: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<InfantFeeding>, Self::Error>> + Send + 'a;
}
