//! Caregiver-child consent and child assent records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::choices::{Gender, IdentityType, YesNo};

// ─── Consent ─────────────────────────────────────────────────────────────────

/// Consent given by a caregiver on behalf of one child.
///
/// A consent row is never edited. Re-consenting under a new protocol version
/// adds a new row with a different `version`; readers use the latest one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaregiverChildConsent {
  pub consent_id:             Uuid,
  /// The child's subject identifier.
  pub subject_identifier:     String,
  /// The consenting caregiver's subject identifier.
  pub caregiver_identifier:   String,
  /// Screening identifier of the caregiver's subject consent.
  pub screening_identifier:   String,
  /// Link to the child's dataset row, for children of prior-study mothers.
  pub study_child_identifier: Option<String>,
  pub first_name:             String,
  pub last_name:              String,
  pub gender:                 Gender,
  pub identity:               Option<String>,
  pub identity_type:          Option<IdentityType>,
  pub confirm_identity:       Option<String>,
  pub child_dob:              NaiveDate,
  pub version:                String,
  pub consent_datetime:       DateTime<Utc>,
}

/// Input to [`crate::store::EnrollmentStore::add_consent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConsent {
  pub subject_identifier:     String,
  pub caregiver_identifier:   String,
  pub screening_identifier:   String,
  #[serde(default)]
  pub study_child_identifier: Option<String>,
  pub first_name:             String,
  pub last_name:              String,
  pub gender:                 Gender,
  #[serde(default)]
  pub identity:               Option<String>,
  #[serde(default)]
  pub identity_type:          Option<IdentityType>,
  #[serde(default)]
  pub confirm_identity:       Option<String>,
  pub child_dob:              NaiveDate,
  pub version:                String,
  pub consent_datetime:       DateTime<Utc>,
}

impl NewConsent {
  pub fn into_consent(self, consent_id: Uuid) -> CaregiverChildConsent {
    CaregiverChildConsent {
      consent_id,
      subject_identifier: self.subject_identifier,
      caregiver_identifier: self.caregiver_identifier,
      screening_identifier: self.screening_identifier,
      study_child_identifier: self.study_child_identifier,
      first_name: self.first_name,
      last_name: self.last_name,
      gender: self.gender,
      identity: self.identity,
      identity_type: self.identity_type,
      confirm_identity: self.confirm_identity,
      child_dob: self.child_dob,
      version: self.version,
      consent_datetime: self.consent_datetime,
    }
  }
}

// ─── Assent ──────────────────────────────────────────────────────────────────

/// The child's own agreement to take part, signed once they are old enough.
/// Immutable after creation; at most one per subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildAssent {
  pub assent_id:            Uuid,
  pub subject_identifier:   String,
  pub screening_identifier: String,
  pub first_name:           String,
  pub last_name:            String,
  pub initials:             String,
  pub gender:               Gender,
  pub identity:             Option<String>,
  pub identity_type:        Option<IdentityType>,
  pub confirm_identity:     Option<String>,
  pub dob:                  NaiveDate,
  pub remain_in_study:      YesNo,
  pub version:              String,
  pub assent_datetime:      DateTime<Utc>,
}

/// Input to [`crate::store::EnrollmentStore::add_assent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAssent {
  pub subject_identifier:   String,
  pub screening_identifier: String,
  pub first_name:           String,
  pub last_name:            String,
  pub initials:             String,
  pub gender:               Gender,
  #[serde(default)]
  pub identity:             Option<String>,
  #[serde(default)]
  pub identity_type:        Option<IdentityType>,
  #[serde(default)]
  pub confirm_identity:     Option<String>,
  pub dob:                  NaiveDate,
  pub remain_in_study:      YesNo,
  pub version:              String,
  pub assent_datetime:      DateTime<Utc>,
}

impl NewAssent {
  pub fn into_assent(self, assent_id: Uuid) -> ChildAssent {
    ChildAssent {
      assent_id,
      subject_identifier: self.subject_identifier,
      screening_identifier: self.screening_identifier,
      first_name: self.first_name,
      last_name: self.last_name,
      initials: self.initials,
      gender: self.gender,
      identity: self.identity,
      identity_type: self.identity_type,
      confirm_identity: self.confirm_identity,
      dob: self.dob,
      remain_in_study: self.remain_in_study,
      version: self.version,
      assent_datetime: self.assent_datetime,
    }
  }
}
