//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings so that string
//! comparison in SQL orders them correctly. Dates are `YYYY-MM-DD`. Coded
//! answers are stored as their choice code. UUIDs are hyphenated lowercase.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use flourish_core::{
  choices::{from_code, to_code},
  consent::{CaregiverChildConsent, ChildAssent},
  dataset::{ChildDataset, MaternalDataset},
  feeding::InfantFeeding,
  schedule::{Membership, OffSchedule, OnSchedule},
  visit::ChildVisit,
};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_choice<T: Serialize>(value: &T) -> Result<String> { Ok(to_code(value)?) }

pub fn decode_choice<T: DeserializeOwned>(s: &str) -> Result<T> { Ok(from_code(s)?) }

pub fn encode_opt_choice<T: Serialize>(value: &Option<T>) -> Result<Option<String>> {
  value.as_ref().map(encode_choice).transpose()
}

pub fn decode_opt_choice<T: DeserializeOwned>(s: Option<String>) -> Result<Option<T>> {
  s.as_deref().map(decode_choice).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `maternal_datasets` row.
pub struct RawMaternalDataset {
  pub study_maternal_identifier: String,
  pub screening_identifier:      String,
  pub protocol:                  String,
  pub delivdt:                   String,
  pub mom_enrolldate:            String,
  pub mom_hivstatus:             String,
  pub preg_pi:                   bool,
  pub preg_efv:                  bool,
}

impl RawMaternalDataset {
  pub const COLUMNS: &'static str = "study_maternal_identifier, screening_identifier, \
    protocol, delivdt, mom_enrolldate, mom_hivstatus, preg_pi, preg_efv";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      study_maternal_identifier: row.get(0)?,
      screening_identifier:      row.get(1)?,
      protocol:                  row.get(2)?,
      delivdt:                   row.get(3)?,
      mom_enrolldate:            row.get(4)?,
      mom_hivstatus:             row.get(5)?,
      preg_pi:                   row.get(6)?,
      preg_efv:                  row.get(7)?,
    })
  }

  pub fn into_dataset(self) -> Result<MaternalDataset> {
    Ok(MaternalDataset {
      study_maternal_identifier: self.study_maternal_identifier,
      screening_identifier:      self.screening_identifier,
      protocol:                  decode_choice(&self.protocol)?,
      delivdt:                   decode_date(&self.delivdt)?,
      mom_enrolldate:            decode_date(&self.mom_enrolldate)?,
      mom_hivstatus:             decode_choice(&self.mom_hivstatus)?,
      preg_pi:                   self.preg_pi,
      preg_efv:                  self.preg_efv,
    })
  }
}

/// Raw strings read directly from a `child_datasets` row.
pub struct RawChildDataset {
  pub study_child_identifier:    String,
  pub study_maternal_identifier: String,
  pub dob:                       String,
  pub infant_hiv_exposed:        String,
  pub twin_triplet:              bool,
  pub infant_enrolldate:         String,
}

impl RawChildDataset {
  pub const COLUMNS: &'static str = "study_child_identifier, study_maternal_identifier, \
    dob, infant_hiv_exposed, twin_triplet, infant_enrolldate";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      study_child_identifier:    row.get(0)?,
      study_maternal_identifier: row.get(1)?,
      dob:                       row.get(2)?,
      infant_hiv_exposed:        row.get(3)?,
      twin_triplet:              row.get(4)?,
      infant_enrolldate:         row.get(5)?,
    })
  }

  pub fn into_dataset(self) -> Result<ChildDataset> {
    Ok(ChildDataset {
      study_child_identifier:    self.study_child_identifier,
      study_maternal_identifier: self.study_maternal_identifier,
      dob:                       decode_date(&self.dob)?,
      infant_hiv_exposed:        decode_choice(&self.infant_hiv_exposed)?,
      twin_triplet:              self.twin_triplet,
      infant_enrolldate:         decode_date(&self.infant_enrolldate)?,
    })
  }
}

/// Raw strings read directly from a `child_consents` row.
pub struct RawConsent {
  pub consent_id:             String,
  pub subject_identifier:     String,
  pub caregiver_identifier:   String,
  pub screening_identifier:   String,
  pub study_child_identifier: Option<String>,
  pub first_name:             String,
  pub last_name:              String,
  pub gender:                 String,
  pub identity:               Option<String>,
  pub identity_type:          Option<String>,
  pub confirm_identity:       Option<String>,
  pub child_dob:              String,
  pub version:                String,
  pub consent_datetime:       String,
}

impl RawConsent {
  pub const COLUMNS: &'static str = "consent_id, subject_identifier, caregiver_identifier, \
    screening_identifier, study_child_identifier, first_name, last_name, gender, \
    identity, identity_type, confirm_identity, child_dob, version, consent_datetime";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      consent_id:             row.get(0)?,
      subject_identifier:     row.get(1)?,
      caregiver_identifier:   row.get(2)?,
      screening_identifier:   row.get(3)?,
      study_child_identifier: row.get(4)?,
      first_name:             row.get(5)?,
      last_name:              row.get(6)?,
      gender:                 row.get(7)?,
      identity:               row.get(8)?,
      identity_type:          row.get(9)?,
      confirm_identity:       row.get(10)?,
      child_dob:              row.get(11)?,
      version:                row.get(12)?,
      consent_datetime:       row.get(13)?,
    })
  }

  pub fn into_consent(self) -> Result<CaregiverChildConsent> {
    Ok(CaregiverChildConsent {
      consent_id:             decode_uuid(&self.consent_id)?,
      subject_identifier:     self.subject_identifier,
      caregiver_identifier:   self.caregiver_identifier,
      screening_identifier:   self.screening_identifier,
      study_child_identifier: self.study_child_identifier,
      first_name:             self.first_name,
      last_name:              self.last_name,
      gender:                 decode_choice(&self.gender)?,
      identity:               self.identity,
      identity_type:          decode_opt_choice(self.identity_type)?,
      confirm_identity:       self.confirm_identity,
      child_dob:              decode_date(&self.child_dob)?,
      version:                self.version,
      consent_datetime:       decode_dt(&self.consent_datetime)?,
    })
  }
}

/// Raw strings read directly from a `child_assents` row.
pub struct RawAssent {
  pub assent_id:            String,
  pub subject_identifier:   String,
  pub screening_identifier: String,
  pub first_name:           String,
  pub last_name:            String,
  pub initials:             String,
  pub gender:               String,
  pub identity:             Option<String>,
  pub identity_type:        Option<String>,
  pub confirm_identity:     Option<String>,
  pub dob:                  String,
  pub remain_in_study:      String,
  pub version:              String,
  pub assent_datetime:      String,
}

impl RawAssent {
  pub const COLUMNS: &'static str = "assent_id, subject_identifier, screening_identifier, \
    first_name, last_name, initials, gender, identity, identity_type, \
    confirm_identity, dob, remain_in_study, version, assent_datetime";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      assent_id:            row.get(0)?,
      subject_identifier:   row.get(1)?,
      screening_identifier: row.get(2)?,
      first_name:           row.get(3)?,
      last_name:            row.get(4)?,
      initials:             row.get(5)?,
      gender:               row.get(6)?,
      identity:             row.get(7)?,
      identity_type:        row.get(8)?,
      confirm_identity:     row.get(9)?,
      dob:                  row.get(10)?,
      remain_in_study:      row.get(11)?,
      version:              row.get(12)?,
      assent_datetime:      row.get(13)?,
    })
  }

  pub fn into_assent(self) -> Result<ChildAssent> {
    Ok(ChildAssent {
      assent_id:            decode_uuid(&self.assent_id)?,
      subject_identifier:   self.subject_identifier,
      screening_identifier: self.screening_identifier,
      first_name:           self.first_name,
      last_name:            self.last_name,
      initials:             self.initials,
      gender:               decode_choice(&self.gender)?,
      identity:             self.identity,
      identity_type:        decode_opt_choice(self.identity_type)?,
      confirm_identity:     self.confirm_identity,
      dob:                  decode_date(&self.dob)?,
      remain_in_study:      decode_choice(&self.remain_in_study)?,
      version:              self.version,
      assent_datetime:      decode_dt(&self.assent_datetime)?,
    })
  }
}

/// Raw strings read from an `onschedules` row left-joined with
/// `offschedules`.
pub struct RawMembership {
  pub onschedule_id:        String,
  pub subject_identifier:   String,
  pub schedule_name:        String,
  pub cohort:               String,
  pub kind:                 String,
  pub slot:                 u8,
  pub onschedule_datetime:  String,
  // offschedules join
  pub offschedule_id:       Option<String>,
  pub offschedule_datetime: Option<String>,
  pub reason:               Option<String>,
}

impl RawMembership {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      onschedule_id:        row.get(0)?,
      subject_identifier:   row.get(1)?,
      schedule_name:        row.get(2)?,
      cohort:               row.get(3)?,
      kind:                 row.get(4)?,
      slot:                 row.get(5)?,
      onschedule_datetime:  row.get(6)?,
      offschedule_id:       row.get(7)?,
      offschedule_datetime: row.get(8)?,
      reason:               row.get(9)?,
    })
  }

  pub fn into_onschedule(self) -> Result<OnSchedule> {
    Ok(self.into_membership()?.onschedule)
  }

  pub fn into_membership(self) -> Result<Membership> {
    let onschedule = OnSchedule {
      onschedule_id:       decode_uuid(&self.onschedule_id)?,
      subject_identifier:  self.subject_identifier,
      schedule_name:       self.schedule_name,
      cohort:              decode_choice(&self.cohort)?,
      kind:                decode_choice(&self.kind)?,
      slot:                self.slot,
      onschedule_datetime: decode_dt(&self.onschedule_datetime)?,
    };

    let offschedule = match (self.offschedule_id, self.offschedule_datetime) {
      (Some(id), Some(at)) => Some(OffSchedule {
        offschedule_id:       decode_uuid(&id)?,
        subject_identifier:   onschedule.subject_identifier.clone(),
        schedule_name:        onschedule.schedule_name.clone(),
        offschedule_datetime: decode_dt(&at)?,
        reason:               self.reason,
      }),
      _ => None,
    };

    Ok(Membership { onschedule, offschedule })
  }
}

/// Raw strings read directly from a `child_visits` row.
pub struct RawVisit {
  pub visit_id:           String,
  pub subject_identifier: String,
  pub schedule_name:      String,
  pub visit_code:         String,
  pub report_datetime:    String,
  pub reason:             String,
}

impl RawVisit {
  pub const COLUMNS: &'static str =
    "visit_id, subject_identifier, schedule_name, visit_code, report_datetime, reason";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      visit_id:           row.get(0)?,
      subject_identifier: row.get(1)?,
      schedule_name:      row.get(2)?,
      visit_code:         row.get(3)?,
      report_datetime:    row.get(4)?,
      reason:             row.get(5)?,
    })
  }

  pub fn into_visit(self) -> Result<ChildVisit> {
    Ok(ChildVisit {
      visit_id:           decode_uuid(&self.visit_id)?,
      subject_identifier: self.subject_identifier,
      schedule_name:      self.schedule_name,
      visit_code:         self.visit_code,
      report_datetime:    decode_dt(&self.report_datetime)?,
      reason:             decode_choice(&self.reason)?,
    })
  }
}

/// Raw strings read directly from an `infant_feedings` row.
pub struct RawFeeding {
  pub feeding_id:             String,
  pub visit_id:               String,
  pub subject_identifier:     String,
  pub report_datetime:        String,
  pub infant_feeding_changed: Option<String>,
  pub answers_json:           String,
  pub audit_json:             String,
}

impl RawFeeding {
  pub const COLUMNS: &'static str = "feeding_id, visit_id, subject_identifier, \
    report_datetime, infant_feeding_changed, answers_json, audit_json";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      feeding_id:             row.get(0)?,
      visit_id:               row.get(1)?,
      subject_identifier:     row.get(2)?,
      report_datetime:        row.get(3)?,
      infant_feeding_changed: row.get(4)?,
      answers_json:           row.get(5)?,
      audit_json:             row.get(6)?,
    })
  }

  pub fn into_feeding(self) -> Result<InfantFeeding> {
    Ok(InfantFeeding {
      feeding_id:             decode_uuid(&self.feeding_id)?,
      visit_id:               decode_uuid(&self.visit_id)?,
      subject_identifier:     self.subject_identifier,
      report_datetime:        decode_dt(&self.report_datetime)?,
      infant_feeding_changed: decode_opt_choice(self.infant_feeding_changed)?,
      answers:                serde_json::from_str(&self.answers_json)?,
      audit:                  serde_json::from_str(&self.audit_json)?,
    })
  }
}
