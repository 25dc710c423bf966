//! Projection of a caregiver-child consent into a new child assent form.

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
  age::age_in_months,
  choices::{Gender, IdentityType},
  consent::{CaregiverChildConsent, ChildAssent, NewAssent},
  validation::ValidationErrors,
};

/// Children assent from their seventh birthday.
pub const ASSENT_MIN_AGE_MONTHS: u32 = 84;

/// Initials from a first and last name.
///
/// A two-part first name contributes both initials (`"Kago Neo"`, `"Molefe"`
/// → `"KNM"`). Either name missing yields an empty string.
pub fn initials(first_name: &str, last_name: &str) -> String {
  let first_name = first_name.trim();
  let last_name = last_name.trim();
  if first_name.is_empty() || last_name.is_empty() {
    return String::new();
  }

  let initial = |s: &str| s.chars().next();
  let mut tokens = first_name.split_whitespace();
  let first = tokens.next().and_then(initial);
  let middle = tokens.next().and_then(initial);

  [first, middle, initial(last_name)].into_iter().flatten().collect()
}

/// Defaults copied from the consent into a new assent form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssentInitial {
  pub subject_identifier:   String,
  pub screening_identifier: String,
  pub first_name:           String,
  pub last_name:            String,
  pub gender:               Gender,
  pub identity:             Option<String>,
  pub identity_type:        Option<IdentityType>,
  pub confirm_identity:     Option<String>,
  /// The consent's `child_dob`.
  pub dob:                  NaiveDate,
  pub initials:             String,
}

impl From<&CaregiverChildConsent> for AssentInitial {
  fn from(consent: &CaregiverChildConsent) -> Self {
    Self {
      subject_identifier:   consent.subject_identifier.clone(),
      screening_identifier: consent.screening_identifier.clone(),
      first_name:           consent.first_name.clone(),
      last_name:            consent.last_name.clone(),
      gender:               consent.gender,
      identity:             consent.identity.clone(),
      identity_type:        consent.identity_type,
      confirm_identity:     consent.confirm_identity.clone(),
      dob:                  consent.child_dob,
      initials:             initials(&consent.first_name, &consent.last_name),
    }
  }
}

/// State of the assent form for a subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AssentForm {
  /// An assent exists; every field is read-only.
  ReadOnly { assent: ChildAssent },
  /// No assent yet. `initial` is `None` when no consent was found.
  Draft { initial: Option<AssentInitial> },
}

impl AssentForm {
  pub fn new(
    existing: Option<ChildAssent>,
    consent: Option<&CaregiverChildConsent>,
  ) -> Self {
    match existing {
      Some(assent) => Self::ReadOnly { assent },
      None => Self::Draft { initial: consent.map(AssentInitial::from) },
    }
  }

  pub fn is_read_only(&self) -> bool { matches!(self, Self::ReadOnly { .. }) }
}

/// Field checks on an assent submission.
pub fn validate_assent(assent: &NewAssent) -> Result<(), ValidationErrors> {
  let mut errors = ValidationErrors::new();

  if assent.identity != assent.confirm_identity {
    errors.add("confirm_identity", "Identity numbers do not match.");
  }
  errors.required_if(
    assent.identity.is_some(),
    "identity_type",
    &assent.identity_type,
  );

  let expected = initials(&assent.first_name, &assent.last_name);
  if !expected.is_empty() && assent.initials != expected {
    errors.add(
      "initials",
      format!("Initials do not match full name. Expected {expected}."),
    );
  }

  match age_in_months(assent.dob, assent.assent_datetime.date_naive()) {
    None => errors.add("dob", "Date of birth cannot be after the assent date."),
    Some(months) if months < ASSENT_MIN_AGE_MONTHS => {
      errors.add("dob", "Child must be at least 7 years old to assent.")
    }
    Some(_) => {}
  }

  errors.into_result()
}
