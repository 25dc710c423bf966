//! Service scenarios against an in-memory `SqliteStore`.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use flourish_core::{
  assent::AssentForm,
  choices::{Gender, IdentityType, YesNo},
  cohort::{Cohort, ScheduleKind},
  consent::{CaregiverChildConsent, NewAssent, NewConsent},
  dataset::{ChildDataset, Exposure, HivStatus, MaternalDataset, Protocol},
  feeding::{
    CHANGED_FIELD, CHANGED_WITHOUT_EDITS, EDITED_WITHOUT_CHANGE, FeedingAnswers,
    NewInfantFeeding,
  },
  schedule::Placement,
  store::EnrollmentStore,
  validation::REQUIRED,
  visit::{NewChildVisit, VisitReason},
};
use flourish_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{Assignment, EnrollmentService, Error, Settings};

async fn service() -> EnrollmentService<SqliteStore> {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  EnrollmentService::new(Arc::new(store), &Settings::default())
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
  NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

const CAREGIVER: &str = "B142-040990591-6";

fn maternal(screening: &str, protocol: Protocol, preg_pi: bool) -> MaternalDataset {
  MaternalDataset {
    study_maternal_identifier: format!("M-{screening}"),
    screening_identifier:      screening.into(),
    protocol,
    delivdt:                   date(2009, 4, 2),
    mom_enrolldate:            date(2008, 11, 20),
    mom_hivstatus:             HivStatus::Infected,
    preg_pi,
    preg_efv:                  false,
  }
}

fn child(id: &str, screening: &str, dob: NaiveDate, twin_triplet: bool) -> ChildDataset {
  ChildDataset {
    study_child_identifier:    id.into(),
    study_maternal_identifier: format!("M-{screening}"),
    dob,
    infant_hiv_exposed:        Exposure::Exposed,
    twin_triplet,
    infant_enrolldate:         dob,
  }
}

fn consent(subject: &str, screening: &str, dob: NaiveDate, when: DateTime<Utc>) -> NewConsent {
  NewConsent {
    subject_identifier:     subject.into(),
    caregiver_identifier:   CAREGIVER.into(),
    screening_identifier:   screening.into(),
    study_child_identifier: None,
    first_name:             "TEBOGO".into(),
    last_name:              "MOTSWANA".into(),
    gender:                 Gender::Female,
    identity:               None,
    identity_type:          None,
    confirm_identity:       None,
    child_dob:              dob,
    version:                "1".into(),
    consent_datetime:       when,
  }
}

/// Import one maternal row and consent a single child under it.
async fn consent_child(
  svc: &EnrollmentService<SqliteStore>,
  protocol: Protocol,
  dob: NaiveDate,
  when: DateTime<Utc>,
) -> (CaregiverChildConsent, Assignment) {
  svc
    .import_datasets(vec![maternal("S000001", protocol, false)], vec![])
    .await
    .unwrap();
  svc
    .record_consent(consent("child-10", "S000001", dob, when))
    .await
    .unwrap()
}

fn enrolled_schedule(assignment: &Assignment) -> &str {
  assignment
    .onschedule()
    .map(|o| o.schedule_name.as_str())
    .unwrap_or_default()
}

// ─── Cohort assignment ───────────────────────────────────────────────────────

#[tokio::test]
async fn toddler_goes_to_cohort_a() {
  let svc = service().await;
  let (_, assignment) =
    consent_child(&svc, Protocol::TshiloDikotla, date(2019, 1, 5), at(2021, 1, 5)).await;

  assert!(matches!(assignment, Assignment::Enrolled { cohort: Cohort::A, .. }));
  assert_eq!(enrolled_schedule(&assignment), "child_a_enrol_schedule1");
}

#[tokio::test]
async fn mpepu_children_go_to_cohort_b() {
  let svc = service().await;
  svc
    .import_datasets(vec![maternal("S000001", Protocol::Mpepu, false)], vec![])
    .await
    .unwrap();

  // 5y2m
  let (_, five) = svc
    .record_consent(consent("child-10", "S000001", date(2013, 1, 10), at(2018, 3, 10)))
    .await
    .unwrap();
  assert_eq!(five.cohort(), Some(Cohort::B));

  // 7y2m
  let mut older = consent("child-25", "S000001", date(2013, 1, 10), at(2020, 3, 10));
  older.caregiver_identifier = "B142-040990592-4".into();
  let (_, seven) = svc.record_consent(older).await.unwrap();
  assert_eq!(seven.cohort(), Some(Cohort::B));
  assert_eq!(enrolled_schedule(&seven), "child_b_enrol_schedule1");
}

#[tokio::test]
async fn tshipidi_eleven_year_old_goes_to_cohort_c() {
  let svc = service().await;
  let (_, assignment) =
    consent_child(&svc, Protocol::Tshipidi, date(2010, 1, 10), at(2021, 3, 10)).await;

  assert_eq!(assignment.cohort(), Some(Cohort::C));
  assert_eq!(enrolled_schedule(&assignment), "child_c_enrol_schedule1");
}

#[tokio::test]
async fn mashi_with_pi_regimen_goes_to_secondary_aims() {
  let svc = service().await;
  svc
    .import_datasets(vec![maternal("S000001", Protocol::Mashi, true)], vec![])
    .await
    .unwrap();

  let (_, assignment) = svc
    .record_consent(consent("child-10", "S000001", date(2010, 1, 10), at(2021, 1, 10)))
    .await
    .unwrap();

  assert_eq!(assignment.cohort(), Some(Cohort::CSec));
  assert_eq!(enrolled_schedule(&assignment), "child_c_sec_schedule1");
}

#[tokio::test]
async fn unmatched_child_stays_unscheduled() {
  let svc = service().await;
  let (consent, assignment) =
    consent_child(&svc, Protocol::MmaBana, date(2015, 1, 10), at(2021, 1, 10)).await;

  assert!(matches!(assignment, Assignment::Unscheduled { .. }));
  assert!(svc.schedules(&consent.subject_identifier).await.unwrap().is_empty());
}

#[tokio::test]
async fn child_without_dataset_row_over_age_is_unscheduled() {
  let svc = service().await;
  let (_, assignment) = svc
    .record_consent(consent("child-10", "S-unknown", date(2015, 1, 10), at(2021, 1, 10)))
    .await
    .unwrap();

  assert_eq!(assignment.cohort(), None);
}

#[tokio::test]
async fn configured_reference_date_overrides_consent_date() {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let settings = Settings {
    reference_date: Some(date(2012, 1, 10)),
    ..Settings::default()
  };
  let svc = EnrollmentService::new(Arc::new(store), &settings);
  svc
    .import_datasets(vec![maternal("S000001", Protocol::Tshipidi, false)], vec![])
    .await
    .unwrap();

  // Two years old at the reference date, eleven at the consent date.
  let (_, assignment) = svc
    .record_consent(consent("child-10", "S000001", date(2010, 1, 10), at(2021, 3, 10)))
    .await
    .unwrap();
  assert_eq!(assignment.cohort(), Some(Cohort::A));
}

#[tokio::test]
async fn reassignment_is_idempotent() {
  let svc = service().await;
  let (consent, first) =
    consent_child(&svc, Protocol::Tshipidi, date(2010, 1, 10), at(2021, 3, 10)).await;

  let again = svc.enroll_child(&consent).await.unwrap();
  assert!(matches!(again, Assignment::AlreadyEnrolled { cohort: Cohort::C, .. }));
  assert_eq!(
    again.onschedule().map(|o| o.onschedule_id),
    first.onschedule().map(|o| o.onschedule_id)
  );
  assert_eq!(svc.schedules("child-10").await.unwrap().len(), 1);
}

// ─── Slots ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn twins_share_a_slot() {
  let svc = service().await;
  let dob = date(2011, 1, 10);
  svc
    .import_datasets(
      vec![maternal("S000001", Protocol::Tshipidi, false)],
      vec![
        child("C-10", "S000001", dob, true),
        child("C-11", "S000001", dob, true),
      ],
    )
    .await
    .unwrap();

  let mut first = consent("child-10", "S000001", dob, at(2021, 3, 10));
  first.study_child_identifier = Some("C-10".into());
  let mut second = consent("child-11", "S000001", dob, at(2021, 3, 10));
  second.study_child_identifier = Some("C-11".into());

  let (_, a) = svc.record_consent(first).await.unwrap();
  let (_, b) = svc.record_consent(second).await.unwrap();

  assert!(matches!(a, Assignment::Enrolled { cohort: Cohort::C, .. }));
  assert!(matches!(b, Assignment::Enrolled { cohort: Cohort::C, .. }));
  assert_eq!(enrolled_schedule(&a), "child_c_enrol_schedule1");
  assert_eq!(enrolled_schedule(&b), "child_c_enrol_schedule1");
  assert_ne!(
    a.onschedule().map(|o| o.onschedule_id),
    b.onschedule().map(|o| o.onschedule_id)
  );
}

#[tokio::test]
async fn siblings_take_distinct_slots() {
  let svc = service().await;
  svc
    .import_datasets(vec![maternal("S000001", Protocol::Tshipidi, false)], vec![])
    .await
    .unwrap();

  let (_, older) = svc
    .record_consent(consent("child-10", "S000001", date(2010, 1, 10), at(2021, 3, 10)))
    .await
    .unwrap();
  let (_, younger) = svc
    .record_consent(consent("child-25", "S000001", date(2019, 6, 1), at(2021, 3, 10)))
    .await
    .unwrap();

  assert_eq!(enrolled_schedule(&older), "child_c_enrol_schedule1");
  assert_eq!(enrolled_schedule(&younger), "child_a_enrol_schedule2");
}

// ─── Visits ──────────────────────────────────────────────────────────────────

fn visit(schedule: &str, code: &str, when: DateTime<Utc>) -> NewChildVisit {
  NewChildVisit {
    subject_identifier: "child-10".into(),
    schedule_name:      schedule.into(),
    visit_code:         code.into(),
    report_datetime:    when,
    reason:             VisitReason::Scheduled,
  }
}

fn quarterly_count(memberships: &[flourish_core::schedule::Membership]) -> usize {
  memberships
    .iter()
    .filter(|m| m.onschedule.kind == ScheduleKind::Quarterly)
    .count()
}

#[tokio::test]
async fn quarterly_schedule_opens_at_enrollment_visit() {
  let svc = service().await;
  consent_child(&svc, Protocol::TshiloDikotla, date(2019, 1, 5), at(2021, 1, 5)).await;
  assert_eq!(quarterly_count(&svc.schedules("child-10").await.unwrap()), 0);

  let outcome = svc
    .record_visit(visit("child_a_enrol_schedule1", "2000", at(2021, 1, 5)))
    .await
    .unwrap();
  let quarterly = outcome.quarterly.expect("quarterly placement");
  assert!(quarterly.is_new());
  assert_eq!(quarterly.onschedule().schedule_name, "child_a_quart_schedule1");

  let again = svc
    .record_visit(visit("child_a_enrol_schedule1", "2000", at(2021, 1, 6)))
    .await
    .unwrap();
  assert!(matches!(again.quarterly, Some(Placement::Existing(_))));
  assert_eq!(quarterly_count(&svc.schedules("child-10").await.unwrap()), 1);
}

#[tokio::test]
async fn later_visits_do_not_open_quarterly() {
  let svc = service().await;
  consent_child(&svc, Protocol::TshiloDikotla, date(2019, 1, 5), at(2021, 1, 5)).await;

  let outcome = svc
    .record_visit(visit("child_a_enrol_schedule1", "2001", at(2021, 4, 5)))
    .await
    .unwrap();
  assert!(outcome.quarterly.is_none());

  let mut missed = visit("child_a_enrol_schedule1", "2000", at(2021, 1, 5));
  missed.reason = VisitReason::Missed;
  assert!(svc.record_visit(missed).await.unwrap().quarterly.is_none());
}

#[tokio::test]
async fn visit_requires_active_membership() {
  let svc = service().await;
  consent_child(&svc, Protocol::TshiloDikotla, date(2019, 1, 5), at(2021, 1, 5)).await;

  let err = svc
    .record_visit(visit("child_b_enrol_schedule1", "2000", at(2021, 1, 5)))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotOnSchedule { .. }));

  let err = svc
    .record_visit(visit("not_a_schedule", "2000", at(2021, 1, 5)))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UnknownSchedule(name) if name == "not_a_schedule"));
}

#[tokio::test]
async fn birth_schedule_and_birth_visit() {
  let svc = service().await;
  let born = date(2021, 2, 1);
  consent_child(&svc, Protocol::TshiloDikotla, born, at(2021, 2, 1)).await;

  let birth = svc.register_birth("child-10", born).await.unwrap();
  assert!(birth.is_new());
  assert_eq!(birth.onschedule().schedule_name, "child_a_birth_schedule1");
  assert!(!svc.register_birth("child-10", born).await.unwrap().is_new());

  let outcome = svc
    .record_visit(visit("child_a_birth_schedule1", "2000D", at(2021, 2, 2)))
    .await
    .unwrap();
  let quarterly = outcome.quarterly.expect("quarterly placement");
  assert_eq!(quarterly.onschedule().schedule_name, "child_a_quart_schedule1");
}

#[tokio::test]
async fn birth_requires_consent() {
  let svc = service().await;
  let err = svc.register_birth("child-10", date(2021, 2, 1)).await.unwrap_err();
  assert!(matches!(err, Error::ConsentNotFound(id) if id == "child-10"));
}

#[tokio::test]
async fn visits_are_listed_in_report_order() {
  let svc = service().await;
  child_with_two_visits(&svc).await;

  let codes: Vec<_> = svc
    .visits("child-10")
    .await
    .unwrap()
    .into_iter()
    .map(|v| v.visit_code)
    .collect();
  assert_eq!(codes, vec!["2000", "3000"]);
  assert!(svc.visits("child-11").await.unwrap().is_empty());
}

// ─── Off schedule and cohort moves ───────────────────────────────────────────

#[tokio::test]
async fn active_subject_cannot_change_cohort() {
  let svc = service().await;
  consent_child(&svc, Protocol::Mashi, date(2010, 1, 10), at(2021, 1, 10)).await;
  svc
    .import_datasets(vec![maternal("S000002", Protocol::Mashi, true)], vec![])
    .await
    .unwrap();

  let mut reconsent = consent("child-10", "S000002", date(2010, 1, 10), at(2021, 6, 1));
  reconsent.version = "2".into();
  let (stored, kept) = svc.record_consent(reconsent).await.unwrap();
  assert_eq!(stored.version, "2");
  assert!(matches!(kept, Assignment::AlreadyEnrolled { cohort: Cohort::C, .. }));

  let err = svc.enroll_child(&stored).await.unwrap_err();
  assert!(matches!(
    err,
    Error::CohortConflict { active: Cohort::C, requested: Cohort::CSec, .. }
  ));

  svc
    .take_off_schedule(
      "child-10",
      "child_c_enrol_schedule1",
      Some("moved to secondary aims".into()),
      at(2021, 6, 2),
    )
    .await
    .unwrap();

  let latest = svc.store().get_consent("child-10").await.unwrap().unwrap();
  assert_eq!(latest.version, "2");
  let moved = svc.enroll_child(&latest).await.unwrap();
  assert!(matches!(moved, Assignment::Enrolled { cohort: Cohort::CSec, .. }));
  assert_eq!(enrolled_schedule(&moved), "child_c_sec_schedule1");

  let memberships = svc.schedules("child-10").await.unwrap();
  let active: Vec<_> = memberships
    .iter()
    .filter(|m| m.is_active())
    .map(|m| m.onschedule.schedule_name.as_str())
    .collect();
  assert_eq!(active, vec!["child_c_sec_schedule1"]);
}

#[tokio::test]
async fn new_consent_version_keeps_the_cohort_already_held() {
  let svc = service().await;
  let (_, first) =
    consent_child(&svc, Protocol::Mpepu, date(2019, 1, 5), at(2021, 1, 5)).await;
  assert_eq!(first.cohort(), Some(Cohort::A));

  // A year later the child is old enough for cohort B.
  let mut reconsent = consent("child-10", "S000001", date(2019, 1, 5), at(2022, 1, 5));
  reconsent.version = "2".into();
  let (stored, assignment) = svc.record_consent(reconsent).await.unwrap();

  assert_eq!(stored.version, "2");
  assert!(matches!(assignment, Assignment::AlreadyEnrolled { cohort: Cohort::A, .. }));
  assert_eq!(assignment.onschedule(), first.onschedule());
  let latest = svc.store().get_consent("child-10").await.unwrap().unwrap();
  assert_eq!(latest.version, "2");
  assert_eq!(svc.schedules("child-10").await.unwrap().len(), 1);
}

#[tokio::test]
async fn conflicting_consent_is_not_stored() {
  let svc = service().await;
  consent_child(&svc, Protocol::Mpepu, date(2019, 1, 5), at(2021, 1, 5)).await;
  svc
    .record_visit(visit("child_a_enrol_schedule1", "2000", at(2021, 1, 5)))
    .await
    .unwrap();
  svc
    .take_off_schedule("child-10", "child_a_enrol_schedule1", None, at(2021, 6, 1))
    .await
    .unwrap();

  // Still active on the cohort A quarterly schedule.
  let mut reconsent = consent("child-10", "S000001", date(2019, 1, 5), at(2022, 1, 5));
  reconsent.version = "2".into();
  let err = svc.record_consent(reconsent).await.unwrap_err();
  assert!(matches!(
    err,
    Error::CohortConflict { active: Cohort::A, requested: Cohort::B, .. }
  ));

  let latest = svc.store().get_consent("child-10").await.unwrap().unwrap();
  assert_eq!(latest.version, "1");
}

#[tokio::test]
async fn off_schedule_errors() {
  let svc = service().await;
  consent_child(&svc, Protocol::TshiloDikotla, date(2019, 1, 5), at(2021, 1, 5)).await;

  let err = svc
    .take_off_schedule("child-10", "child_a_quart_schedule1", None, at(2021, 2, 1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotOnSchedule { .. }));

  svc
    .take_off_schedule("child-10", "child_a_enrol_schedule1", None, at(2021, 2, 1))
    .await
    .unwrap();
  let err = svc
    .take_off_schedule("child-10", "child_a_enrol_schedule1", None, at(2021, 2, 2))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::AlreadyOffSchedule { .. }));
}

// ─── Assent ──────────────────────────────────────────────────────────────────

fn assent_from(form: &AssentForm) -> NewAssent {
  let AssentForm::Draft { initial: Some(initial) } = form else {
    panic!("expected a prefilled draft, got {form:?}");
  };
  NewAssent {
    subject_identifier:   initial.subject_identifier.clone(),
    screening_identifier: initial.screening_identifier.clone(),
    first_name:           initial.first_name.clone(),
    last_name:            initial.last_name.clone(),
    initials:             initial.initials.clone(),
    gender:               initial.gender,
    identity:             initial.identity.clone(),
    identity_type:        initial.identity_type,
    confirm_identity:     initial.confirm_identity.clone(),
    dob:                  initial.dob,
    remain_in_study:      YesNo::Yes,
    version:              "1".into(),
    assent_datetime:      at(2021, 3, 10),
  }
}

#[tokio::test]
async fn assent_form_prefills_from_consent() {
  let svc = service().await;
  let mut input = consent("child-10", "S000001", date(2010, 1, 10), at(2021, 3, 10));
  input.first_name = "TR".into();
  input.last_name = "TT".into();
  input.identity = Some("317918515".into());
  input.identity_type = Some(IdentityType::BirthCertificate);
  input.confirm_identity = Some("317918515".into());
  svc.record_consent(input).await.unwrap();

  let form = svc.assent_form("child-10").await.unwrap();
  let AssentForm::Draft { initial: Some(initial) } = &form else {
    panic!("expected a prefilled draft, got {form:?}");
  };
  assert_eq!(initial.initials, "TT");
  assert_eq!(initial.dob, date(2010, 1, 10));
  assert_eq!(initial.screening_identifier, "S000001");
  assert_eq!(initial.identity.as_deref(), Some("317918515"));

  let saved = svc.record_assent(assent_from(&form)).await.unwrap();
  let form = svc.assent_form("child-10").await.unwrap();
  assert!(form.is_read_only());
  assert_eq!(form, AssentForm::ReadOnly { assent: saved });
}

#[tokio::test]
async fn assent_without_consent_has_no_defaults() {
  let svc = service().await;
  let form = svc.assent_form("child-10").await.unwrap();
  assert_eq!(form, AssentForm::Draft { initial: None });
}

#[tokio::test]
async fn second_assent_is_rejected() {
  let svc = service().await;
  svc
    .record_consent(consent("child-10", "S000001", date(2010, 1, 10), at(2021, 3, 10)))
    .await
    .unwrap();
  let form = svc.assent_form("child-10").await.unwrap();
  let assent = assent_from(&form);

  svc.record_assent(assent.clone()).await.unwrap();
  let err = svc.record_assent(assent).await.unwrap_err();
  assert!(matches!(err, Error::AssentExists(id) if id == "child-10"));
}

#[tokio::test]
async fn assent_identity_must_be_confirmed() {
  let svc = service().await;
  svc
    .record_consent(consent("child-10", "S000001", date(2010, 1, 10), at(2021, 3, 10)))
    .await
    .unwrap();
  let mut assent = assent_from(&svc.assent_form("child-10").await.unwrap());
  assent.identity = Some("317918515".into());
  assent.identity_type = Some(IdentityType::BirthCertificate);
  assent.confirm_identity = Some("317918516".into());

  let Err(Error::Invalid(errors)) = svc.record_assent(assent).await else {
    panic!("expected validation errors");
  };
  assert!(!errors.get("confirm_identity").is_empty());
  assert!(svc.store().get_assent("child-10").await.unwrap().is_none());
}

// ─── Infant feeding ──────────────────────────────────────────────────────────

/// A cohort A child with an enrollment visit and one quarterly visit.
async fn child_with_two_visits(svc: &EnrollmentService<SqliteStore>) -> (Uuid, Uuid) {
  consent_child(svc, Protocol::TshiloDikotla, date(2019, 1, 5), at(2021, 1, 5)).await;
  let first = svc
    .record_visit(visit("child_a_enrol_schedule1", "2000", at(2021, 1, 5)))
    .await
    .unwrap()
    .visit
    .visit_id;
  let second = svc
    .record_visit(visit("child_a_quart_schedule1", "3000", at(2021, 4, 5)))
    .await
    .unwrap()
    .visit
    .visit_id;
  (first, second)
}

fn answers() -> FeedingAnswers {
  FeedingAnswers {
    ever_breastfed: Some(YesNo::Yes),
    bf_start_dt: Some(date(2019, 1, 5)),
    continuing_to_bf: Some(YesNo::Yes),
    solids_age_mo: Some(6),
    solid_foods: vec![1, 2],
    ..FeedingAnswers::default()
  }
}

fn feeding(
  visit_id: Uuid,
  when: DateTime<Utc>,
  changed: Option<YesNo>,
  answers: FeedingAnswers,
) -> NewInfantFeeding {
  NewInfantFeeding {
    visit_id,
    subject_identifier: "child-10".into(),
    report_datetime: when,
    infant_feeding_changed: changed,
    answers,
    audit: Default::default(),
  }
}

#[tokio::test]
async fn feeding_form_carries_previous_answers() {
  let svc = service().await;
  let (first, _) = child_with_two_visits(&svc).await;

  let empty = svc.infant_feeding_form("child-10", at(2021, 1, 5)).await.unwrap();
  assert!(empty.answers.solid_foods.is_empty());
  assert_eq!(empty.last_att_sche_visit, None);

  svc
    .submit_infant_feeding(feeding(first, at(2021, 1, 5), None, answers()))
    .await
    .unwrap();

  let initial = svc.infant_feeding_form("child-10", at(2021, 4, 5)).await.unwrap();
  assert_eq!(initial.answers.solid_foods, vec![1, 2]);
  assert_eq!(initial.answers, answers());
  assert_eq!(initial.last_att_sche_visit, Some(date(2021, 1, 5)));
}

#[tokio::test]
async fn unchanged_answers_must_not_be_declared_changed() {
  let svc = service().await;
  let (first, second) = child_with_two_visits(&svc).await;
  svc
    .submit_infant_feeding(feeding(first, at(2021, 1, 5), None, answers()))
    .await
    .unwrap();

  let Err(Error::Invalid(errors)) = svc
    .submit_infant_feeding(feeding(second, at(2021, 4, 5), Some(YesNo::Yes), answers()))
    .await
  else {
    panic!("expected validation errors");
  };
  assert_eq!(errors.get(CHANGED_FIELD), [CHANGED_WITHOUT_EDITS.to_owned()]);
  assert!(svc.store().infant_feeding_for_visit(second).await.unwrap().is_none());

  let saved = svc
    .submit_infant_feeding(feeding(second, at(2021, 4, 5), Some(YesNo::No), answers()))
    .await
    .unwrap();
  assert_eq!(saved.infant_feeding_changed, Some(YesNo::No));
}

#[tokio::test]
async fn edited_answers_must_be_declared_changed() {
  let svc = service().await;
  let (first, second) = child_with_two_visits(&svc).await;
  svc
    .submit_infant_feeding(feeding(first, at(2021, 1, 5), None, answers()))
    .await
    .unwrap();

  let edited = FeedingAnswers { solid_foods: vec![1, 2, 4], ..answers() };

  let Err(Error::Invalid(errors)) = svc
    .submit_infant_feeding(feeding(second, at(2021, 4, 5), Some(YesNo::No), edited.clone()))
    .await
  else {
    panic!("expected validation errors");
  };
  assert_eq!(errors.get(CHANGED_FIELD), [EDITED_WITHOUT_CHANGE.to_owned()]);

  let Err(Error::Invalid(errors)) = svc
    .submit_infant_feeding(feeding(second, at(2021, 4, 5), None, edited.clone()))
    .await
  else {
    panic!("expected validation errors");
  };
  assert_eq!(errors.get(CHANGED_FIELD), [REQUIRED.to_owned()]);

  svc
    .submit_infant_feeding(feeding(second, at(2021, 4, 5), Some(YesNo::Yes), edited))
    .await
    .unwrap();
}

#[tokio::test]
async fn one_feeding_record_per_visit() {
  let svc = service().await;
  let (first, _) = child_with_two_visits(&svc).await;
  svc
    .submit_infant_feeding(feeding(first, at(2021, 1, 5), None, answers()))
    .await
    .unwrap();

  let err = svc
    .submit_infant_feeding(feeding(first, at(2021, 1, 5), None, answers()))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::FeedingExists(id) if id == first));

  let missing = Uuid::new_v4();
  let err = svc
    .submit_infant_feeding(feeding(missing, at(2021, 1, 5), None, answers()))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::VisitNotFound(id) if id == missing));
}

#[tokio::test]
async fn feeding_must_belong_to_the_visit_subject() {
  let svc = service().await;
  let (first, _) = child_with_two_visits(&svc).await;

  let mut other = feeding(first, at(2021, 1, 5), None, answers());
  other.subject_identifier = "child-11".into();
  let err = svc.submit_infant_feeding(other).await.unwrap_err();
  assert!(matches!(
    err,
    Error::VisitSubjectMismatch { visit_id, ref visit_subject, .. }
      if visit_id == first && visit_subject == "child-10"
  ));

  assert!(svc.store().infant_feeding_for_visit(first).await.unwrap().is_none());
  let form = svc.infant_feeding_form("child-10", at(2021, 4, 5)).await.unwrap();
  assert_eq!(form.last_att_sche_visit, None);
}

#[tokio::test]
async fn feeding_report_time_must_follow_the_previous_record() {
  let svc = service().await;
  let (first, second) = child_with_two_visits(&svc).await;
  svc
    .submit_infant_feeding(feeding(first, at(2021, 1, 5), None, answers()))
    .await
    .unwrap();

  let edited = FeedingAnswers { solid_foods: vec![3], ..answers() };
  let err = svc
    .submit_infant_feeding(feeding(second, at(2021, 1, 5), None, edited.clone()))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::FeedingTimeTaken { report_datetime, .. } if report_datetime == at(2021, 1, 5)
  ));
  assert!(svc.store().infant_feeding_for_visit(second).await.unwrap().is_none());

  // One second later the first record is the previous one and the flag is checked.
  let later = at(2021, 1, 5) + chrono::Duration::seconds(1);
  let Err(Error::Invalid(errors)) = svc
    .submit_infant_feeding(feeding(second, later, None, edited))
    .await
  else {
    panic!("expected validation errors");
  };
  assert_eq!(errors.get(CHANGED_FIELD), [REQUIRED.to_owned()]);
}
