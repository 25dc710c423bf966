//! The infant feeding follow-up form.
//!
//! Each follow-up visit carries one infant feeding record. The caregiver
//! declares whether anything changed since the previous record
//! (`infant_feeding_changed`), and that declaration must agree with a
//! field-level diff of the answers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  choices::YesNo,
  tracked::{FieldValue, TrackedFields, has_changed},
  validation::ValidationErrors,
};

pub const CHANGED_FIELD: &str = "infant_feeding_changed";

pub const CHANGED_WITHOUT_EDITS: &str = "Participant's infant feeding \
  information has changed since last visit. Please update the information on \
  this form.";

pub const EDITED_WITHOUT_CHANGE: &str = "Participant's infant feeding \
  information has not changed since last visit. Please don't make any changes \
  to this form.";

// ─── Answers ─────────────────────────────────────────────────────────────────

/// How often the child receives milk other than breast milk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilkFrequency {
  Daily,
  Weekly,
  Occasionally,
  Never,
}

impl MilkFrequency {
  /// Must match the serde representation above.
  pub fn code(self) -> &'static str {
    match self {
      Self::Daily => "daily",
      Self::Weekly => "weekly",
      Self::Occasionally => "occasionally",
      Self::Never => "never",
    }
  }
}

/// The reported feeding answers: everything on the form that is compared
/// between visits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedingAnswers {
  pub ever_breastfed:          Option<YesNo>,
  pub bf_start_dt:             Option<NaiveDate>,
  pub continuing_to_bf:        Option<YesNo>,
  pub dt_weaned:               Option<NaiveDate>,
  pub freq_milk_rec:           Option<MilkFrequency>,
  pub took_formula:            Option<YesNo>,
  pub dt_formula_introduced:   Option<NaiveDate>,
  pub formula_feedng_completd: Option<YesNo>,
  pub dt_formula_stopd:        Option<NaiveDate>,
  /// Age in months at which solid foods were introduced.
  pub solids_age_mo:           Option<i64>,
  /// Identifiers of solid-food list items.
  pub solid_foods:             Vec<u32>,
  pub solid_foods_other:       Option<String>,
  pub other_feeding_comments:  Option<String>,
}

impl TrackedFields for FeedingAnswers {
  fn tracked_fields(&self) -> Vec<(&'static str, FieldValue)> {
    vec![
      ("ever_breastfed", FieldValue::Choice(self.ever_breastfed.map(YesNo::code))),
      ("bf_start_dt", FieldValue::Date(self.bf_start_dt)),
      ("continuing_to_bf", FieldValue::Choice(self.continuing_to_bf.map(YesNo::code))),
      ("dt_weaned", FieldValue::Date(self.dt_weaned)),
      ("freq_milk_rec", FieldValue::Choice(self.freq_milk_rec.map(MilkFrequency::code))),
      ("took_formula", FieldValue::Choice(self.took_formula.map(YesNo::code))),
      ("dt_formula_introduced", FieldValue::Date(self.dt_formula_introduced)),
      (
        "formula_feedng_completd",
        FieldValue::Choice(self.formula_feedng_completd.map(YesNo::code)),
      ),
      ("dt_formula_stopd", FieldValue::Date(self.dt_formula_stopd)),
      ("solids_age_mo", FieldValue::Int(self.solids_age_mo)),
      ("solid_foods", FieldValue::set(&self.solid_foods)),
      ("solid_foods_other", FieldValue::Text(self.solid_foods_other.clone())),
      ("other_feeding_comments", FieldValue::Text(self.other_feeding_comments.clone())),
    ]
  }
}

// ─── Bookkeeping ─────────────────────────────────────────────────────────────

/// Who and what created or last modified a record. Never compared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditStamp {
  pub created:           Option<DateTime<Utc>>,
  pub modified:          Option<DateTime<Utc>>,
  pub user_created:      Option<String>,
  pub user_modified:     Option<String>,
  pub hostname_created:  Option<String>,
  pub hostname_modified: Option<String>,
  pub device_created:    Option<String>,
  pub device_modified:   Option<String>,
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfantFeeding {
  pub feeding_id:             Uuid,
  pub visit_id:               Uuid,
  pub subject_identifier:     String,
  pub report_datetime:        DateTime<Utc>,
  pub infant_feeding_changed: Option<YesNo>,
  pub answers:                FeedingAnswers,
  pub audit:                  AuditStamp,
}

/// Input to [`crate::store::EnrollmentStore::add_infant_feeding`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInfantFeeding {
  pub visit_id:               Uuid,
  pub subject_identifier:     String,
  pub report_datetime:        DateTime<Utc>,
  #[serde(default)]
  pub infant_feeding_changed: Option<YesNo>,
  #[serde(default)]
  pub answers:                FeedingAnswers,
  #[serde(default)]
  pub audit:                  AuditStamp,
}

impl NewInfantFeeding {
  pub fn into_feeding(self, feeding_id: Uuid) -> InfantFeeding {
    InfantFeeding {
      feeding_id,
      visit_id: self.visit_id,
      subject_identifier: self.subject_identifier,
      report_datetime: self.report_datetime,
      infant_feeding_changed: self.infant_feeding_changed,
      answers: self.answers,
      audit: self.audit,
    }
  }
}

// ─── Initial values ──────────────────────────────────────────────────────────

/// Defaults for a new infant feeding form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedingInitial {
  /// The previous record's answers, or empty for a first form.
  pub answers:             FeedingAnswers,
  /// Read-only: the date the previous form was completed on.
  pub last_att_sche_visit: Option<NaiveDate>,
}

impl FeedingInitial {
  pub fn from_previous(previous: Option<&InfantFeeding>) -> Self {
    match previous {
      Some(prev) => Self {
        answers:             prev.answers.clone(),
        last_att_sche_visit: Some(prev.report_datetime.date_naive()),
      },
      None => Self::default(),
    }
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Check the declared change flag against the diff from `previous`.
///
/// With no previous record there is nothing to compare and the check is
/// skipped.
pub fn check_changed_flag(
  previous: Option<&InfantFeeding>,
  declared: Option<YesNo>,
  answers: &FeedingAnswers,
) -> ValidationErrors {
  let mut errors = ValidationErrors::new();
  let Some(previous) = previous else { return errors };

  let changed = has_changed(&previous.answers, answers);
  match declared {
    None => errors.add(CHANGED_FIELD, crate::validation::REQUIRED),
    Some(YesNo::Yes) if !changed => errors.add(CHANGED_FIELD, CHANGED_WITHOUT_EDITS),
    Some(YesNo::No) if changed => errors.add(CHANGED_FIELD, EDITED_WITHOUT_CHANGE),
    Some(_) => {}
  }
  errors
}

/// Conditional-answer rules within one form.
pub fn check_answers(answers: &FeedingAnswers) -> ValidationErrors {
  let mut errors = ValidationErrors::new();
  let breastfed = answers.ever_breastfed == Some(YesNo::Yes);

  errors.required_if(breastfed, "bf_start_dt", &answers.bf_start_dt);
  errors.required_if(breastfed, "continuing_to_bf", &answers.continuing_to_bf);
  errors.required_if(
    answers.continuing_to_bf == Some(YesNo::No),
    "dt_weaned",
    &answers.dt_weaned,
  );
  if let (Some(start), Some(weaned)) = (answers.bf_start_dt, answers.dt_weaned)
    && weaned < start
  {
    errors.add("dt_weaned", "Date weaned cannot be before breastfeeding started.");
  }

  let formula = answers.took_formula == Some(YesNo::Yes);
  errors.required_if(formula, "dt_formula_introduced", &answers.dt_formula_introduced);
  errors.required_if(formula, "formula_feedng_completd", &answers.formula_feedng_completd);
  errors.required_if(
    answers.formula_feedng_completd == Some(YesNo::Yes),
    "dt_formula_stopd",
    &answers.dt_formula_stopd,
  );

  errors.required_when(
    !answers.solid_foods.is_empty(),
    "solids_age_mo",
    &answers.solids_age_mo,
  );
  errors
}

/// Every check a submission must pass before it is saved.
pub fn validate_submission(
  previous: Option<&InfantFeeding>,
  submission: &NewInfantFeeding,
) -> Result<(), ValidationErrors> {
  let mut errors = check_changed_flag(
    previous,
    submission.infant_feeding_changed,
    &submission.answers,
  );
  errors.merge(check_answers(&submission.answers));
  errors.into_result()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
