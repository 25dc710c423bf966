//! [`SqliteStore`], the SQLite implementation of [`EnrollmentStore`].

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use flourish_core::{
  consent::{CaregiverChildConsent, ChildAssent, NewAssent, NewConsent},
  dataset::{ChildDataset, MaternalDataset},
  feeding::{InfantFeeding, NewInfantFeeding},
  schedule::{Membership, NewOffSchedule, NewOnSchedule, OffSchedule, Placement},
  store::EnrollmentStore,
  visit::{ChildVisit, NewChildVisit},
};

use crate::{
  Error, Result,
  encode::{
    RawAssent, RawChildDataset, RawConsent, RawFeeding, RawMaternalDataset,
    RawMembership, RawVisit, encode_choice, encode_date, encode_dt,
    encode_opt_choice, encode_uuid,
  },
  schema::SCHEMA,
};

const MEMBERSHIP_SELECT: &str = "SELECT
    o.onschedule_id, o.subject_identifier, o.schedule_name, o.cohort, o.kind,
    o.slot, o.onschedule_datetime,
    f.offschedule_id, f.offschedule_datetime, f.reason
  FROM onschedules o
  LEFT JOIN offschedules f
    ON  f.subject_identifier = o.subject_identifier
    AND f.schedule_name      = o.schedule_name";

/// Result of the checks made before writing an off-schedule row.
enum OffScheduleWrite {
  Written,
  NotOnSchedule,
  AlreadyOff,
}

/// Result of writing a feeding row.
enum FeedingWrite {
  Written,
  VisitMissing,
  Duplicate,
  TimeTaken,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An enrollment store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── EnrollmentStore impl ────────────────────────────────────────────────────

impl EnrollmentStore for SqliteStore {
  type Error = Error;

  // ── Datasets ──────────────────────────────────────────────────────────────

  async fn add_maternal_dataset(&self, row: MaternalDataset) -> Result<()> {
    let id        = row.study_maternal_identifier.clone();
    let protocol  = encode_choice(&row.protocol)?;
    let hivstatus = encode_choice(&row.mom_hivstatus)?;
    let delivdt   = encode_date(row.delivdt);
    let enrolled  = encode_date(row.mom_enrolldate);
    let screening = row.screening_identifier;
    let (preg_pi, preg_efv) = (row.preg_pi, row.preg_efv);
    let key = id.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO maternal_datasets (
             study_maternal_identifier, screening_identifier, protocol, delivdt,
             mom_enrolldate, mom_hivstatus, preg_pi, preg_efv
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT DO NOTHING",
          rusqlite::params![
            key, screening, protocol, delivdt, enrolled, hivstatus, preg_pi,
            preg_efv,
          ],
        )?;
        Ok(n == 1)
      })
      .await?;

    if !inserted {
      return Err(Error::DuplicateDataset(id));
    }
    Ok(())
  }

  async fn maternal_dataset_for_screening(
    &self,
    screening_identifier: &str,
  ) -> Result<Option<MaternalDataset>> {
    let screening = screening_identifier.to_owned();
    let sql = format!(
      "SELECT {} FROM maternal_datasets WHERE screening_identifier = ?1",
      RawMaternalDataset::COLUMNS
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![screening], RawMaternalDataset::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMaternalDataset::into_dataset).transpose()
  }

  async fn add_child_dataset(&self, row: ChildDataset) -> Result<()> {
    let id       = row.study_child_identifier.clone();
    let maternal = row.study_maternal_identifier;
    let dob      = encode_date(row.dob);
    let exposed  = encode_choice(&row.infant_hiv_exposed)?;
    let twin     = row.twin_triplet;
    let enrolled = encode_date(row.infant_enrolldate);
    let key = id.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO child_datasets (
             study_child_identifier, study_maternal_identifier, dob,
             infant_hiv_exposed, twin_triplet, infant_enrolldate
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT DO NOTHING",
          rusqlite::params![key, maternal, dob, exposed, twin, enrolled],
        )?;
        Ok(n == 1)
      })
      .await?;

    if !inserted {
      return Err(Error::DuplicateDataset(id));
    }
    Ok(())
  }

  async fn get_child_dataset(
    &self,
    study_child_identifier: &str,
  ) -> Result<Option<ChildDataset>> {
    let id = study_child_identifier.to_owned();
    let sql = format!(
      "SELECT {} FROM child_datasets WHERE study_child_identifier = ?1",
      RawChildDataset::COLUMNS
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id], RawChildDataset::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawChildDataset::into_dataset).transpose()
  }

  // ── Consents ──────────────────────────────────────────────────────────────

  async fn add_consent(&self, input: NewConsent) -> Result<CaregiverChildConsent> {
    let consent = input.into_consent(Uuid::new_v4());

    let id_str        = encode_uuid(consent.consent_id);
    let subject       = consent.subject_identifier.clone();
    let caregiver     = consent.caregiver_identifier.clone();
    let screening     = consent.screening_identifier.clone();
    let study_child   = consent.study_child_identifier.clone();
    let first_name    = consent.first_name.clone();
    let last_name     = consent.last_name.clone();
    let gender        = encode_choice(&consent.gender)?;
    let identity      = consent.identity.clone();
    let identity_type = encode_opt_choice(&consent.identity_type)?;
    let confirm       = consent.confirm_identity.clone();
    let dob           = encode_date(consent.child_dob);
    let version       = consent.version.clone();
    let at_str        = encode_dt(consent.consent_datetime);

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO child_consents (
             consent_id, subject_identifier, caregiver_identifier,
             screening_identifier, study_child_identifier, first_name, last_name,
             gender, identity, identity_type, confirm_identity, child_dob,
             version, consent_datetime
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
           ON CONFLICT (subject_identifier, version) DO NOTHING",
          rusqlite::params![
            id_str, subject, caregiver, screening, study_child, first_name,
            last_name, gender, identity, identity_type, confirm, dob, version,
            at_str,
          ],
        )?;
        Ok(n == 1)
      })
      .await?;

    if !inserted {
      return Err(Error::DuplicateConsentVersion {
        subject_identifier: consent.subject_identifier,
        version:            consent.version,
      });
    }
    Ok(consent)
  }

  async fn get_consent(
    &self,
    subject_identifier: &str,
  ) -> Result<Option<CaregiverChildConsent>> {
    let subject = subject_identifier.to_owned();
    let sql = format!(
      "SELECT {} FROM child_consents
       WHERE subject_identifier = ?1
       ORDER BY consent_datetime DESC, rowid DESC
       LIMIT 1",
      RawConsent::COLUMNS
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![subject], RawConsent::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawConsent::into_consent).transpose()
  }

  async fn caregiver_consents(
    &self,
    caregiver_identifier: &str,
  ) -> Result<Vec<CaregiverChildConsent>> {
    let caregiver = caregiver_identifier.to_owned();
    let sql = format!(
      "SELECT {} FROM child_consents
       WHERE caregiver_identifier = ?1
       ORDER BY consent_datetime, rowid",
      RawConsent::COLUMNS
    );

    let raws: Vec<RawConsent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![caregiver], RawConsent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    // Keep the latest version per child, in first-consented order.
    let mut order = Vec::new();
    let mut latest: HashMap<String, CaregiverChildConsent> = HashMap::new();
    for raw in raws {
      let consent = raw.into_consent()?;
      if !latest.contains_key(&consent.subject_identifier) {
        order.push(consent.subject_identifier.clone());
      }
      latest.insert(consent.subject_identifier.clone(), consent);
    }
    Ok(order.into_iter().filter_map(|s| latest.remove(&s)).collect())
  }

  // ── Schedules ─────────────────────────────────────────────────────────────

  async fn put_on_schedule(&self, input: NewOnSchedule) -> Result<Placement> {
    let id_str   = encode_uuid(Uuid::new_v4());
    let subject  = input.subject_identifier;
    let schedule = input.schedule_name;
    let cohort   = encode_choice(&input.cohort)?;
    let kind     = encode_choice(&input.kind)?;
    let slot     = input.slot;
    let at_str   = encode_dt(input.onschedule_datetime);
    let select   = format!(
      "{MEMBERSHIP_SELECT}
       WHERE o.subject_identifier = ?1 AND o.schedule_name = ?2"
    );

    let (inserted, raw) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let n = tx.execute(
          "INSERT INTO onschedules (
             onschedule_id, subject_identifier, schedule_name, cohort, kind,
             slot, onschedule_datetime
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (subject_identifier, schedule_name) DO NOTHING",
          rusqlite::params![id_str, subject, schedule, cohort, kind, slot, at_str],
        )?;
        let raw = tx.query_row(
          &select,
          rusqlite::params![subject, schedule],
          RawMembership::from_row,
        )?;
        tx.commit()?;
        Ok((n == 1, raw))
      })
      .await?;

    let onschedule = raw.into_onschedule()?;
    Ok(if inserted {
      Placement::Created(onschedule)
    } else {
      Placement::Existing(onschedule)
    })
  }

  async fn take_off_schedule(&self, input: NewOffSchedule) -> Result<OffSchedule> {
    let off = OffSchedule {
      offschedule_id:       Uuid::new_v4(),
      subject_identifier:   input.subject_identifier,
      schedule_name:        input.schedule_name,
      offschedule_datetime: input.offschedule_datetime,
      reason:               input.reason,
    };

    let id_str   = encode_uuid(off.offschedule_id);
    let subject  = off.subject_identifier.clone();
    let schedule = off.schedule_name.clone();
    let at_str   = encode_dt(off.offschedule_datetime);
    let reason   = off.reason.clone();

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let on: bool = tx
          .query_row(
            "SELECT 1 FROM onschedules
             WHERE subject_identifier = ?1 AND schedule_name = ?2",
            rusqlite::params![subject, schedule],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !on {
          return Ok(OffScheduleWrite::NotOnSchedule);
        }

        let n = tx.execute(
          "INSERT INTO offschedules (
             offschedule_id, subject_identifier, schedule_name,
             offschedule_datetime, reason
           ) VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (subject_identifier, schedule_name) DO NOTHING",
          rusqlite::params![id_str, subject, schedule, at_str, reason],
        )?;
        tx.commit()?;
        Ok(if n == 1 {
          OffScheduleWrite::Written
        } else {
          OffScheduleWrite::AlreadyOff
        })
      })
      .await?;

    match outcome {
      OffScheduleWrite::Written => Ok(off),
      OffScheduleWrite::NotOnSchedule => Err(Error::NotOnSchedule {
        subject_identifier: off.subject_identifier,
        schedule_name:      off.schedule_name,
      }),
      OffScheduleWrite::AlreadyOff => Err(Error::AlreadyOffSchedule {
        subject_identifier: off.subject_identifier,
        schedule_name:      off.schedule_name,
      }),
    }
  }

  async fn memberships(&self, subject_identifier: &str) -> Result<Vec<Membership>> {
    let subject = subject_identifier.to_owned();
    let sql = format!(
      "{MEMBERSHIP_SELECT}
       WHERE o.subject_identifier = ?1
       ORDER BY o.onschedule_datetime, o.rowid"
    );

    let raws: Vec<RawMembership> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![subject], RawMembership::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMembership::into_membership).collect()
  }

  // ── Encounters ────────────────────────────────────────────────────────────

  async fn add_visit(&self, input: NewChildVisit) -> Result<ChildVisit> {
    let visit = input.into_visit(Uuid::new_v4());

    let id_str     = encode_uuid(visit.visit_id);
    let subject    = visit.subject_identifier.clone();
    let schedule   = visit.schedule_name.clone();
    let visit_code = visit.visit_code.clone();
    let at_str     = encode_dt(visit.report_datetime);
    let reason     = encode_choice(&visit.reason)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO child_visits (
             visit_id, subject_identifier, schedule_name, visit_code,
             report_datetime, reason
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, subject, schedule, visit_code, at_str, reason],
        )?;
        Ok(())
      })
      .await?;

    Ok(visit)
  }

  async fn get_visit(&self, visit_id: Uuid) -> Result<Option<ChildVisit>> {
    let id_str = encode_uuid(visit_id);
    let sql = format!(
      "SELECT {} FROM child_visits WHERE visit_id = ?1",
      RawVisit::COLUMNS
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawVisit::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVisit::into_visit).transpose()
  }

  async fn visits(&self, subject_identifier: &str) -> Result<Vec<ChildVisit>> {
    let subject = subject_identifier.to_owned();
    let sql = format!(
      "SELECT {} FROM child_visits
       WHERE subject_identifier = ?1
       ORDER BY report_datetime, rowid",
      RawVisit::COLUMNS
    );

    let raws: Vec<RawVisit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![subject], RawVisit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVisit::into_visit).collect()
  }

  // ── Assent ────────────────────────────────────────────────────────────────

  async fn add_assent(&self, input: NewAssent) -> Result<ChildAssent> {
    let assent = input.into_assent(Uuid::new_v4());

    let id_str        = encode_uuid(assent.assent_id);
    let subject       = assent.subject_identifier.clone();
    let screening     = assent.screening_identifier.clone();
    let first_name    = assent.first_name.clone();
    let last_name     = assent.last_name.clone();
    let initials      = assent.initials.clone();
    let gender        = encode_choice(&assent.gender)?;
    let identity      = assent.identity.clone();
    let identity_type = encode_opt_choice(&assent.identity_type)?;
    let confirm       = assent.confirm_identity.clone();
    let dob           = encode_date(assent.dob);
    let remain        = encode_choice(&assent.remain_in_study)?;
    let version       = assent.version.clone();
    let at_str        = encode_dt(assent.assent_datetime);

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO child_assents (
             assent_id, subject_identifier, screening_identifier, first_name,
             last_name, initials, gender, identity, identity_type,
             confirm_identity, dob, remain_in_study, version, assent_datetime
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
           ON CONFLICT (subject_identifier) DO NOTHING",
          rusqlite::params![
            id_str, subject, screening, first_name, last_name, initials, gender,
            identity, identity_type, confirm, dob, remain, version, at_str,
          ],
        )?;
        Ok(n == 1)
      })
      .await?;

    if !inserted {
      return Err(Error::AssentExists(assent.subject_identifier));
    }
    Ok(assent)
  }

  async fn get_assent(&self, subject_identifier: &str) -> Result<Option<ChildAssent>> {
    let subject = subject_identifier.to_owned();
    let sql = format!(
      "SELECT {} FROM child_assents WHERE subject_identifier = ?1",
      RawAssent::COLUMNS
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![subject], RawAssent::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAssent::into_assent).transpose()
  }

  // ── Infant feeding ────────────────────────────────────────────────────────

  async fn add_infant_feeding(&self, input: NewInfantFeeding) -> Result<InfantFeeding> {
    let feeding = input.into_feeding(Uuid::new_v4());

    let id_str       = encode_uuid(feeding.feeding_id);
    let visit_str    = encode_uuid(feeding.visit_id);
    let subject      = feeding.subject_identifier.clone();
    let at_str       = encode_dt(feeding.report_datetime);
    let changed      = encode_opt_choice(&feeding.infant_feeding_changed)?;
    let answers_json = serde_json::to_string(&feeding.answers)?;
    let audit_json   = serde_json::to_string(&feeding.audit)?;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let visit_exists: bool = tx
          .query_row(
            "SELECT 1 FROM child_visits WHERE visit_id = ?1",
            rusqlite::params![visit_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !visit_exists {
          return Ok(FeedingWrite::VisitMissing);
        }
        let time_taken: bool = tx
          .query_row(
            "SELECT 1 FROM infant_feedings
             WHERE subject_identifier = ?1 AND report_datetime = ?2 AND visit_id <> ?3",
            rusqlite::params![subject, at_str, visit_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if time_taken {
          return Ok(FeedingWrite::TimeTaken);
        }

        let n = tx.execute(
          "INSERT INTO infant_feedings (
             feeding_id, visit_id, subject_identifier, report_datetime,
             infant_feeding_changed, answers_json, audit_json
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (visit_id) DO NOTHING",
          rusqlite::params![
            id_str, visit_str, subject, at_str, changed, answers_json, audit_json,
          ],
        )?;
        tx.commit()?;
        Ok(if n == 1 { FeedingWrite::Written } else { FeedingWrite::Duplicate })
      })
      .await?;

    match outcome {
      FeedingWrite::Written => Ok(feeding),
      FeedingWrite::VisitMissing => Err(Error::VisitNotFound(feeding.visit_id)),
      FeedingWrite::Duplicate => Err(Error::FeedingExists(feeding.visit_id)),
      FeedingWrite::TimeTaken => Err(Error::FeedingTimeTaken {
        subject_identifier: feeding.subject_identifier,
        report_datetime:    feeding.report_datetime,
      }),
    }
  }

  async fn infant_feeding_for_visit(&self, visit_id: Uuid) -> Result<Option<InfantFeeding>> {
    let visit_str = encode_uuid(visit_id);
    let sql = format!(
      "SELECT {} FROM infant_feedings WHERE visit_id = ?1",
      RawFeeding::COLUMNS
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![visit_str], RawFeeding::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFeeding::into_feeding).transpose()
  }

  async fn infant_feeding_at(
    &self,
    subject_identifier: &str,
    report_datetime: DateTime<Utc>,
  ) -> Result<Option<InfantFeeding>> {
    let subject = subject_identifier.to_owned();
    let at_str  = encode_dt(report_datetime);
    let sql = format!(
      "SELECT {} FROM infant_feedings
       WHERE subject_identifier = ?1 AND report_datetime = ?2
       LIMIT 1",
      RawFeeding::COLUMNS
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![subject, at_str], RawFeeding::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFeeding::into_feeding).transpose()
  }

  async fn previous_infant_feeding(
    &self,
    subject_identifier: &str,
    before: DateTime<Utc>,
  ) -> Result<Option<InfantFeeding>> {
    let subject    = subject_identifier.to_owned();
    let before_str = encode_dt(before);
    let sql = format!(
      "SELECT {} FROM infant_feedings
       WHERE subject_identifier = ?1 AND report_datetime < ?2
       ORDER BY report_datetime DESC, rowid DESC
       LIMIT 1",
      RawFeeding::COLUMNS
    );

    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![subject, before_str], RawFeeding::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawFeeding::into_feeding).transpose()
  }
}
