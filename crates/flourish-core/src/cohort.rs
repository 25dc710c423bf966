//! Cohort assignment: an ordered rule table over age, protocol and maternal
//! regimen flags, plus the schedule names each cohort owns.
//!
//! Rules are evaluated top to bottom and the first match wins. Nothing here
//! touches storage, so the rule set can be exercised on plain inputs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  dataset::{ChildDataset, Exposure, MaternalDataset, Protocol},
};

// ─── Cohorts and schedules ───────────────────────────────────────────────────

/// A named track of follow-up schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cohort {
  A,
  B,
  C,
  /// Cohort C secondary aims: mothers on a PI or EFV regimen in pregnancy.
  CSec,
}

/// Which of a cohort's schedules a membership belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
  Enrollment,
  Quarterly,
  Birth,
}

const COHORTS: [Cohort; 4] = [Cohort::A, Cohort::B, Cohort::C, Cohort::CSec];
const KINDS: [ScheduleKind; 3] =
  [ScheduleKind::Enrollment, ScheduleKind::Quarterly, ScheduleKind::Birth];

impl Cohort {
  /// The schedule name without its slot suffix, or `None` if this cohort has
  /// no schedule of that kind.
  pub fn schedule_stem(self, kind: ScheduleKind) -> Option<&'static str> {
    use Cohort::*;
    use ScheduleKind::*;
    match (self, kind) {
      (A, Enrollment) => Some("child_a_enrol_schedule"),
      (A, Quarterly) => Some("child_a_quart_schedule"),
      (A, Birth) => Some("child_a_birth_schedule"),
      (B, Enrollment) => Some("child_b_enrol_schedule"),
      (B, Quarterly) => Some("child_b_quart_schedule"),
      (C, Enrollment) => Some("child_c_enrol_schedule"),
      (C, Quarterly) => Some("child_c_quart_schedule"),
      (CSec, Enrollment) => Some("child_c_sec_schedule"),
      (CSec, Quarterly) => Some("child_c_sec_qt_schedule"),
      (_, Birth) => None,
    }
  }

  /// Full schedule name for a caregiver slot, e.g. `child_b_enrol_schedule2`.
  pub fn schedule_name(self, kind: ScheduleKind, slot: u8) -> Result<String> {
    self
      .schedule_stem(kind)
      .map(|stem| format!("{stem}{slot}"))
      .ok_or(Error::NoSuchSchedule { cohort: self, kind })
  }
}

/// A parsed schedule name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleRef {
  pub cohort: Cohort,
  pub kind:   ScheduleKind,
  pub slot:   u8,
}

impl ScheduleRef {
  pub fn parse(name: &str) -> Result<Self> {
    for cohort in COHORTS {
      for kind in KINDS {
        let Some(stem) = cohort.schedule_stem(kind) else { continue };
        let Some(suffix) = name.strip_prefix(stem) else { continue };
        if let Ok(slot) = suffix.parse::<u8>()
          && slot > 0
        {
          return Ok(Self { cohort, kind, slot });
        }
      }
    }
    Err(Error::UnknownScheduleName(name.to_owned()))
  }

  pub fn name(&self) -> Result<String> {
    self.cohort.schedule_name(self.kind, self.slot)
  }
}

// ─── Rule inputs ─────────────────────────────────────────────────────────────

/// Age windows (in completed months at the reference date) used by the
/// default rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortWindows {
  /// Cohort A is strictly below this age.
  pub a_max_months: u32,
  /// Cohort B is at or above this age ...
  pub b_min_months: u32,
  /// ... and strictly below this one.
  pub b_max_months: u32,
  /// Cohort C is at or above this age.
  pub c_min_months: u32,
}

impl Default for CohortWindows {
  fn default() -> Self {
    Self {
      a_max_months: 30,
      b_min_months: 30,
      b_max_months: 96,
      c_min_months: 120,
    }
  }
}

/// Everything the rules look at, gathered from consent and dataset rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortInputs {
  pub age_months:   u32,
  /// `None` for children of mothers enrolled directly into Flourish.
  pub protocol:     Option<Protocol>,
  pub exposure:     Option<Exposure>,
  pub preg_pi:      bool,
  pub preg_efv:     bool,
  pub twin_triplet: bool,
}

impl CohortInputs {
  pub fn new(
    age_months: u32,
    maternal: Option<&MaternalDataset>,
    child: Option<&ChildDataset>,
  ) -> Self {
    Self {
      age_months,
      protocol: maternal.map(|m| m.protocol),
      exposure: child.map(|c| c.infant_hiv_exposed),
      preg_pi: maternal.is_some_and(|m| m.preg_pi),
      preg_efv: maternal.is_some_and(|m| m.preg_efv),
      twin_triplet: child.is_some_and(|c| c.twin_triplet),
    }
  }
}

// ─── Rule table ──────────────────────────────────────────────────────────────

type Predicate = fn(&CohortInputs, &CohortWindows) -> bool;

/// One row of the rule table.
#[derive(Clone, Copy)]
pub struct Rule {
  pub name:   &'static str,
  pub cohort: Cohort,
  predicate:  Predicate,
}

impl Rule {
  pub fn new(name: &'static str, cohort: Cohort, predicate: Predicate) -> Self {
    Self { name, cohort, predicate }
  }

  pub fn matches(&self, inputs: &CohortInputs, windows: &CohortWindows) -> bool {
    (self.predicate)(inputs, windows)
  }
}

impl std::fmt::Debug for Rule {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Rule")
      .field("name", &self.name)
      .field("cohort", &self.cohort)
      .finish()
  }
}

fn is_c_protocol(inputs: &CohortInputs) -> bool {
  matches!(inputs.protocol, Some(Protocol::Tshipidi | Protocol::Mashi))
}

fn cohort_a(i: &CohortInputs, w: &CohortWindows) -> bool {
  i.age_months < w.a_max_months
}

fn cohort_b(i: &CohortInputs, w: &CohortWindows) -> bool {
  (w.b_min_months..w.b_max_months).contains(&i.age_months)
    && i.protocol == Some(Protocol::Mpepu)
}

fn cohort_c_sec(i: &CohortInputs, w: &CohortWindows) -> bool {
  cohort_c(i, w) && (i.preg_pi || i.preg_efv)
}

fn cohort_c(i: &CohortInputs, w: &CohortWindows) -> bool {
  i.age_months >= w.c_min_months && is_c_protocol(i)
}

/// An ordered list of rules; the first match decides the cohort.
#[derive(Debug, Clone)]
pub struct RuleTable {
  windows: CohortWindows,
  rules:   Vec<Rule>,
}

impl Default for RuleTable {
  fn default() -> Self { Self::new(CohortWindows::default()) }
}

impl RuleTable {
  /// The study's rule set over the given age windows.
  pub fn new(windows: CohortWindows) -> Self {
    Self::with_rules(windows, vec![
      Rule::new("cohort_a_under_age", Cohort::A, cohort_a),
      Rule::new("cohort_b_mpepu", Cohort::B, cohort_b),
      Rule::new("cohort_c_sec_pi_efv", Cohort::CSec, cohort_c_sec),
      Rule::new("cohort_c_tshipidi_mashi", Cohort::C, cohort_c),
    ])
  }

  pub fn with_rules(windows: CohortWindows, rules: Vec<Rule>) -> Self {
    Self { windows, rules }
  }

  pub fn windows(&self) -> &CohortWindows { &self.windows }

  pub fn rules(&self) -> &[Rule] { &self.rules }

  /// The first rule matching `inputs`, if any.
  pub fn evaluate(&self, inputs: &CohortInputs) -> Option<&Rule> {
    self.rules.iter().find(|r| r.matches(inputs, &self.windows))
  }

  pub fn assign(&self, inputs: &CohortInputs) -> Option<Cohort> {
    self.evaluate(inputs).map(|r| r.cohort)
  }
}

// ─── Caregiver slots ─────────────────────────────────────────────────────────

/// A sibling (another child of the same caregiver) that already holds a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingSlot {
  pub subject_identifier: String,
  pub slot:               u8,
  pub dob:                NaiveDate,
  pub twin_triplet:       bool,
}

/// Choose the schedule slot for a child.
///
/// Twins and triplets share the slot of a sibling from the same delivery.
/// Every other child takes the lowest slot no sibling holds.
pub fn choose_slot(
  siblings: &[SiblingSlot],
  dob: NaiveDate,
  twin_triplet: bool,
) -> u8 {
  if twin_triplet
    && let Some(pooled) = siblings
      .iter()
      .find(|s| s.twin_triplet && s.dob == dob)
  {
    return pooled.slot;
  }

  (1..=u8::MAX)
    .find(|slot| siblings.iter().all(|s| s.slot != *slot))
    .unwrap_or(u8::MAX)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
