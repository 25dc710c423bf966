//! [`EnrollmentService`]: the study workflows over an [`EnrollmentStore`].
//!
//! Every operation is a single validate-then-save unit. The service checks
//! preconditions up front so callers get a domain error; the store's
//! uniqueness constraints remain the backstop.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use flourish_core::{
  age::{age_in_months, years_and_months},
  assent::{AssentForm, validate_assent},
  cohort::{
    Cohort, CohortInputs, RuleTable, ScheduleKind, ScheduleRef, SiblingSlot,
    choose_slot,
  },
  consent::{CaregiverChildConsent, ChildAssent, NewAssent, NewConsent},
  dataset::{ChildDataset, MaternalDataset},
  feeding::{FeedingInitial, InfantFeeding, NewInfantFeeding, validate_submission},
  schedule::{
    Membership, NewOffSchedule, NewOnSchedule, OffSchedule, OnSchedule, Placement,
  },
  store::EnrollmentStore,
  visit::{
    BIRTH_VISIT_CODE, ChildVisit, ENROLLMENT_VISIT_CODE, NewChildVisit, VisitReason,
  },
};
use serde::Serialize;
use uuid::Uuid;

use crate::{Error, Result, Settings};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of running cohort assignment for one consent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Assignment {
  Enrolled { cohort: Cohort, onschedule: OnSchedule },
  /// The subject already held this enrollment; nothing was written.
  AlreadyEnrolled { cohort: Cohort, onschedule: OnSchedule },
  /// No rule matched. The subject stays off every schedule.
  Unscheduled { reason: String },
}

impl Assignment {
  pub fn cohort(&self) -> Option<Cohort> {
    match self {
      Self::Enrolled { cohort, .. } | Self::AlreadyEnrolled { cohort, .. } => Some(*cohort),
      Self::Unscheduled { .. } => None,
    }
  }

  pub fn onschedule(&self) -> Option<&OnSchedule> {
    match self {
      Self::Enrolled { onschedule, .. } | Self::AlreadyEnrolled { onschedule, .. } => {
        Some(onschedule)
      }
      Self::Unscheduled { .. } => None,
    }
  }
}

/// A stored visit plus the quarterly placement it triggered, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitOutcome {
  pub visit:     ChildVisit,
  pub quarterly: Option<Placement>,
}

/// Counts from a dataset import. Rows already present are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatasetImport {
  pub maternal_added:   usize,
  pub maternal_skipped: usize,
  pub child_added:      usize,
  pub child_skipped:    usize,
}

/// Where a consent would place the child, worked out before any write.
enum EnrollmentPlan {
  Unscheduled(String),
  Place { cohort: Cohort, onschedule: NewOnSchedule },
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct EnrollmentService<S> {
  store:          Arc<S>,
  rules:          RuleTable,
  reference_date: Option<NaiveDate>,
}

impl<S> Clone for EnrollmentService<S> {
  fn clone(&self) -> Self {
    Self {
      store:          Arc::clone(&self.store),
      rules:          self.rules.clone(),
      reference_date: self.reference_date,
    }
  }
}

impl<S: EnrollmentStore> EnrollmentService<S> {
  pub fn new(store: Arc<S>, settings: &Settings) -> Self {
    Self::with_rules(store, RuleTable::new(settings.windows), settings.reference_date)
  }

  pub fn with_rules(
    store: Arc<S>,
    rules: RuleTable,
    reference_date: Option<NaiveDate>,
  ) -> Self {
    Self { store, rules, reference_date }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn rules(&self) -> &RuleTable { &self.rules }

  // ── Datasets ──────────────────────────────────────────────────────────────

  pub async fn import_datasets(
    &self,
    maternal: Vec<MaternalDataset>,
    children: Vec<ChildDataset>,
  ) -> Result<DatasetImport> {
    let mut summary = DatasetImport::default();

    for row in maternal {
      let existing = self
        .store
        .maternal_dataset_for_screening(&row.screening_identifier)
        .await
        .map_err(Error::store)?;
      if existing.is_some() {
        tracing::debug!(
          screening = %row.screening_identifier,
          "maternal dataset row already imported"
        );
        summary.maternal_skipped += 1;
        continue;
      }
      self.store.add_maternal_dataset(row).await.map_err(Error::store)?;
      summary.maternal_added += 1;
    }

    for row in children {
      let existing = self
        .store
        .get_child_dataset(&row.study_child_identifier)
        .await
        .map_err(Error::store)?;
      if existing.is_some() {
        tracing::debug!(
          child = %row.study_child_identifier,
          "child dataset row already imported"
        );
        summary.child_skipped += 1;
        continue;
      }
      self.store.add_child_dataset(row).await.map_err(Error::store)?;
      summary.child_added += 1;
    }

    tracing::info!(
      maternal = summary.maternal_added,
      children = summary.child_added,
      "imported dataset rows"
    );
    Ok(summary)
  }

  // ── Consent and cohort placement ──────────────────────────────────────────

  /// Store a consent version and assign the child a cohort.
  ///
  /// A subject already holding an enrollment or birth schedule keeps it: the
  /// new version is stored and the held placement is returned without
  /// evaluating the rule table again. Otherwise assignment is planned before
  /// the consent is written, so a cohort conflict stores nothing.
  pub async fn record_consent(
    &self,
    input: NewConsent,
  ) -> Result<(CaregiverChildConsent, Assignment)> {
    let memberships = self.memberships(&input.subject_identifier).await?;

    if let Some(held) = held_enrollment(&memberships) {
      let consent = self.add_consent(input).await?;
      tracing::debug!(
        subject = %consent.subject_identifier,
        schedule = %held.schedule_name,
        "consent version recorded against existing enrollment"
      );
      let assignment = Assignment::AlreadyEnrolled {
        cohort:     held.cohort,
        onschedule: held.clone(),
      };
      return Ok((consent, assignment));
    }

    let draft = input.clone().into_consent(Uuid::nil());
    let plan = self.plan_enrollment(&draft, &memberships).await?;
    let consent = self.add_consent(input).await?;
    let assignment = self.apply_plan(plan).await?;
    Ok((consent, assignment))
  }

  /// Evaluate the rule table for a consented child and place them on the
  /// matching cohort's enrollment schedule.
  pub async fn enroll_child(&self, consent: &CaregiverChildConsent) -> Result<Assignment> {
    let memberships = self.memberships(&consent.subject_identifier).await?;
    let plan = self.plan_enrollment(consent, &memberships).await?;
    self.apply_plan(plan).await
  }

  /// Work out where a consent places the child. Reads only.
  async fn plan_enrollment(
    &self,
    consent: &CaregiverChildConsent,
    memberships: &[Membership],
  ) -> Result<EnrollmentPlan> {
    let subject = consent.subject_identifier.as_str();
    let (maternal, child) = self.datasets_for(consent).await?;

    let at = self
      .reference_date
      .unwrap_or_else(|| consent.consent_datetime.date_naive());
    let Some(age_months) = age_in_months(consent.child_dob, at) else {
      let reason = format!("date of birth {} is after {at}", consent.child_dob);
      tracing::warn!(subject, %reason, "child not scheduled");
      return Ok(EnrollmentPlan::Unscheduled(reason));
    };

    let inputs = CohortInputs::new(age_months, maternal.as_ref(), child.as_ref());
    let Some(rule) = self.rules.evaluate(&inputs) else {
      let (years, months) = years_and_months(age_months);
      let reason = format!(
        "no cohort rule matches age {years}y{months}m with protocol {:?}",
        inputs.protocol
      );
      tracing::warn!(subject, %reason, "child not scheduled");
      return Ok(EnrollmentPlan::Unscheduled(reason));
    };
    let cohort = rule.cohort;
    tracing::debug!(subject, rule = rule.name, ?cohort, "cohort rule matched");

    ensure_same_cohort(subject, memberships, cohort)?;

    let slot = self
      .slot_for(consent, memberships, cohort, consent.child_dob, inputs.twin_triplet)
      .await?;
    let onschedule = NewOnSchedule::new(
      subject,
      cohort,
      ScheduleKind::Enrollment,
      slot,
      consent.consent_datetime,
    )?;
    Ok(EnrollmentPlan::Place { cohort, onschedule })
  }

  async fn apply_plan(&self, plan: EnrollmentPlan) -> Result<Assignment> {
    let (cohort, onschedule) = match plan {
      EnrollmentPlan::Unscheduled(reason) => return Ok(Assignment::Unscheduled { reason }),
      EnrollmentPlan::Place { cohort, onschedule } => (cohort, onschedule),
    };
    Ok(match self.place(onschedule).await? {
      Placement::Created(onschedule) => Assignment::Enrolled { cohort, onschedule },
      Placement::Existing(onschedule) => Assignment::AlreadyEnrolled { cohort, onschedule },
    })
  }

  async fn add_consent(&self, input: NewConsent) -> Result<CaregiverChildConsent> {
    let consent = self.store.add_consent(input).await.map_err(Error::store)?;
    tracing::info!(
      subject = %consent.subject_identifier,
      version = %consent.version,
      "recorded consent"
    );
    Ok(consent)
  }

  /// Place a child born in-study on cohort A's birth schedule.
  pub async fn register_birth(&self, subject_identifier: &str, dob: NaiveDate) -> Result<Placement> {
    let consent = self
      .store
      .get_consent(subject_identifier)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::ConsentNotFound(subject_identifier.to_owned()))?;
    let (_, child) = self.datasets_for(&consent).await?;

    let memberships = self.memberships(subject_identifier).await?;
    ensure_same_cohort(subject_identifier, &memberships, Cohort::A)?;

    let twin = child.is_some_and(|c| c.twin_triplet);
    let slot = self.slot_for(&consent, &memberships, Cohort::A, dob, twin).await?;
    let born = dob.and_time(NaiveTime::MIN).and_utc();

    self
      .place(NewOnSchedule::new(subject_identifier, Cohort::A, ScheduleKind::Birth, slot, born)?)
      .await
  }

  // ── Visits ────────────────────────────────────────────────────────────────

  /// Store an encounter. The first visit on an enrollment or birth schedule
  /// also places the subject on the cohort's quarterly schedule.
  pub async fn record_visit(&self, input: NewChildVisit) -> Result<VisitOutcome> {
    let schedule = ScheduleRef::parse(&input.schedule_name)
      .map_err(|_| Error::UnknownSchedule(input.schedule_name.clone()))?;

    let memberships = self.memberships(&input.subject_identifier).await?;
    let active = memberships
      .iter()
      .any(|m| m.onschedule.schedule_name == input.schedule_name && m.is_active());
    if !active {
      return Err(Error::NotOnSchedule {
        subject_identifier: input.subject_identifier,
        schedule_name:      input.schedule_name,
      });
    }

    let visit = self.store.add_visit(input).await.map_err(Error::store)?;
    tracing::info!(
      subject = %visit.subject_identifier,
      schedule = %visit.schedule_name,
      code = %visit.visit_code,
      "recorded visit"
    );

    let quarterly = if opens_quarterly(&schedule, &visit) {
      let next = NewOnSchedule::new(
        visit.subject_identifier.as_str(),
        schedule.cohort,
        ScheduleKind::Quarterly,
        schedule.slot,
        visit.report_datetime,
      )?;
      Some(self.place(next).await?)
    } else {
      None
    };

    Ok(VisitOutcome { visit, quarterly })
  }

  /// A subject's visits in report order.
  pub async fn visits(&self, subject_identifier: &str) -> Result<Vec<ChildVisit>> {
    self
      .store
      .visits(subject_identifier)
      .await
      .map_err(Error::store)
  }

  // ── Schedules ─────────────────────────────────────────────────────────────

  pub async fn take_off_schedule(
    &self,
    subject_identifier: &str,
    schedule_name: &str,
    reason: Option<String>,
    at: DateTime<Utc>,
  ) -> Result<OffSchedule> {
    let memberships = self.memberships(subject_identifier).await?;
    let Some(membership) = memberships
      .iter()
      .find(|m| m.onschedule.schedule_name == schedule_name)
    else {
      return Err(Error::NotOnSchedule {
        subject_identifier: subject_identifier.to_owned(),
        schedule_name:      schedule_name.to_owned(),
      });
    };
    if !membership.is_active() {
      return Err(Error::AlreadyOffSchedule {
        subject_identifier: subject_identifier.to_owned(),
        schedule_name:      schedule_name.to_owned(),
      });
    }

    let off = self
      .store
      .take_off_schedule(NewOffSchedule {
        subject_identifier:   subject_identifier.to_owned(),
        schedule_name:        schedule_name.to_owned(),
        offschedule_datetime: at,
        reason,
      })
      .await
      .map_err(Error::store)?;
    tracing::info!(subject = subject_identifier, schedule = schedule_name, "taken off schedule");
    Ok(off)
  }

  /// Every membership of a subject, active or not.
  pub async fn schedules(&self, subject_identifier: &str) -> Result<Vec<Membership>> {
    self.memberships(subject_identifier).await
  }

  // ── Assent ────────────────────────────────────────────────────────────────

  /// The assent form for a subject: read-only if an assent exists, otherwise
  /// a draft prefilled from the latest consent.
  pub async fn assent_form(&self, subject_identifier: &str) -> Result<AssentForm> {
    let existing = self
      .store
      .get_assent(subject_identifier)
      .await
      .map_err(Error::store)?;
    if existing.is_some() {
      return Ok(AssentForm::new(existing, None));
    }

    let consent = self
      .store
      .get_consent(subject_identifier)
      .await
      .map_err(Error::store)?;
    if consent.is_none() {
      tracing::debug!(subject = subject_identifier, "no consent to prefill assent from");
    }
    Ok(AssentForm::new(None, consent.as_ref()))
  }

  pub async fn record_assent(&self, input: NewAssent) -> Result<ChildAssent> {
    validate_assent(&input)?;

    let existing = self
      .store
      .get_assent(&input.subject_identifier)
      .await
      .map_err(Error::store)?;
    if existing.is_some() {
      return Err(Error::AssentExists(input.subject_identifier));
    }

    let assent = self.store.add_assent(input).await.map_err(Error::store)?;
    tracing::info!(subject = %assent.subject_identifier, "recorded assent");
    Ok(assent)
  }

  // ── Infant feeding ────────────────────────────────────────────────────────

  /// Defaults for a feeding form reported at `at`, carried over from the
  /// latest earlier record.
  pub async fn infant_feeding_form(
    &self,
    subject_identifier: &str,
    at: DateTime<Utc>,
  ) -> Result<FeedingInitial> {
    let previous = self
      .store
      .previous_infant_feeding(subject_identifier, at)
      .await
      .map_err(Error::store)?;
    Ok(FeedingInitial::from_previous(previous.as_ref()))
  }

  /// Validate a feeding submission against the previous record and save it.
  pub async fn submit_infant_feeding(&self, input: NewInfantFeeding) -> Result<InfantFeeding> {
    let visit = self
      .store
      .get_visit(input.visit_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::VisitNotFound(input.visit_id))?;
    if visit.subject_identifier != input.subject_identifier {
      return Err(Error::VisitSubjectMismatch {
        visit_id:          visit.visit_id,
        visit_subject:     visit.subject_identifier,
        submitted_subject: input.subject_identifier,
      });
    }

    let existing = self
      .store
      .infant_feeding_for_visit(input.visit_id)
      .await
      .map_err(Error::store)?;
    if existing.is_some() {
      return Err(Error::FeedingExists(input.visit_id));
    }

    let same_time = self
      .store
      .infant_feeding_at(&input.subject_identifier, input.report_datetime)
      .await
      .map_err(Error::store)?;
    if same_time.is_some() {
      return Err(Error::FeedingTimeTaken {
        subject_identifier: input.subject_identifier,
        report_datetime:    input.report_datetime,
      });
    }

    let previous = self
      .store
      .previous_infant_feeding(&input.subject_identifier, input.report_datetime)
      .await
      .map_err(Error::store)?;
    if let Err(errors) = validate_submission(previous.as_ref(), &input) {
      tracing::debug!(subject = %input.subject_identifier, %errors, "infant feeding rejected");
      return Err(errors.into());
    }

    let feeding = self.store.add_infant_feeding(input).await.map_err(Error::store)?;
    tracing::info!(
      subject = %feeding.subject_identifier,
      visit = %feeding.visit_id,
      "recorded infant feeding"
    );
    Ok(feeding)
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  async fn memberships(&self, subject_identifier: &str) -> Result<Vec<Membership>> {
    self
      .store
      .memberships(subject_identifier)
      .await
      .map_err(Error::store)
  }

  async fn datasets_for(
    &self,
    consent: &CaregiverChildConsent,
  ) -> Result<(Option<MaternalDataset>, Option<ChildDataset>)> {
    let maternal = self
      .store
      .maternal_dataset_for_screening(&consent.screening_identifier)
      .await
      .map_err(Error::store)?;
    let child = match &consent.study_child_identifier {
      Some(id) => self.store.get_child_dataset(id).await.map_err(Error::store)?,
      None => None,
    };
    Ok((maternal, child))
  }

  /// The subject's own active slot on `cohort` if they hold one, otherwise
  /// a slot chosen against the caregiver's other children.
  async fn slot_for(
    &self,
    consent: &CaregiverChildConsent,
    memberships: &[Membership],
    cohort: Cohort,
    dob: NaiveDate,
    twin_triplet: bool,
  ) -> Result<u8> {
    if let Some(own) = memberships
      .iter()
      .find(|m| m.is_active() && m.onschedule.cohort == cohort)
    {
      return Ok(own.onschedule.slot);
    }

    let siblings = self
      .store
      .caregiver_consents(&consent.caregiver_identifier)
      .await
      .map_err(Error::store)?;

    let mut held = Vec::new();
    for sibling in siblings
      .iter()
      .filter(|s| s.subject_identifier != consent.subject_identifier)
    {
      let Some(active) = self
        .memberships(&sibling.subject_identifier)
        .await?
        .into_iter()
        .find(Membership::is_active)
      else {
        continue;
      };
      let twin = match &sibling.study_child_identifier {
        Some(id) => self
          .store
          .get_child_dataset(id)
          .await
          .map_err(Error::store)?
          .is_some_and(|c| c.twin_triplet),
        None => false,
      };
      held.push(SiblingSlot {
        subject_identifier: sibling.subject_identifier.clone(),
        slot:               active.onschedule.slot,
        dob:                sibling.child_dob,
        twin_triplet:       twin,
      });
    }

    Ok(choose_slot(&held, dob, twin_triplet))
  }

  async fn place(&self, input: NewOnSchedule) -> Result<Placement> {
    let placement = self.store.put_on_schedule(input).await.map_err(Error::store)?;
    let onschedule = placement.onschedule();
    if placement.is_new() {
      tracing::info!(
        subject = %onschedule.subject_identifier,
        schedule = %onschedule.schedule_name,
        "placed on schedule"
      );
    } else {
      tracing::debug!(
        subject = %onschedule.subject_identifier,
        schedule = %onschedule.schedule_name,
        "already on schedule"
      );
    }
    Ok(placement)
  }
}

/// The active enrollment or birth placement a subject already holds.
fn held_enrollment(memberships: &[Membership]) -> Option<&OnSchedule> {
  memberships
    .iter()
    .filter(|m| m.is_active())
    .map(|m| &m.onschedule)
    .find(|o| matches!(o.kind, ScheduleKind::Enrollment | ScheduleKind::Birth))
}

/// Fails when the subject is active on a cohort other than `requested`.
fn ensure_same_cohort(
  subject_identifier: &str,
  memberships: &[Membership],
  requested: Cohort,
) -> Result<()> {
  if let Some(active) = memberships
    .iter()
    .find(|m| m.is_active() && m.onschedule.cohort != requested)
  {
    return Err(Error::CohortConflict {
      subject_identifier: subject_identifier.to_owned(),
      active:             active.onschedule.cohort,
      requested,
    });
  }
  Ok(())
}

fn opens_quarterly(schedule: &ScheduleRef, visit: &ChildVisit) -> bool {
  if visit.reason == VisitReason::Missed {
    return false;
  }
  match schedule.kind {
    ScheduleKind::Enrollment => visit.visit_code == ENROLLMENT_VISIT_CODE,
    ScheduleKind::Birth => visit.visit_code == BIRTH_VISIT_CODE,
    ScheduleKind::Quarterly => false,
  }
}
