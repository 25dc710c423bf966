//! SQL schema for the Flourish SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Imported from prior studies; never updated.
CREATE TABLE IF NOT EXISTS maternal_datasets (
    study_maternal_identifier TEXT PRIMARY KEY,
    screening_identifier      TEXT NOT NULL UNIQUE,
    protocol                  TEXT NOT NULL,
    delivdt                   TEXT NOT NULL,   -- YYYY-MM-DD
    mom_enrolldate            TEXT NOT NULL,
    mom_hivstatus             TEXT NOT NULL,
    preg_pi                   INTEGER NOT NULL DEFAULT 0,
    preg_efv                  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS child_datasets (
    study_child_identifier    TEXT PRIMARY KEY,
    study_maternal_identifier TEXT NOT NULL,
    dob                       TEXT NOT NULL,
    infant_hiv_exposed        TEXT NOT NULL,
    twin_triplet              INTEGER NOT NULL DEFAULT 0,
    infant_enrolldate         TEXT NOT NULL
);

-- Write-once; a re-consent is a new row with a new version.
CREATE TABLE IF NOT EXISTS child_consents (
    consent_id             TEXT PRIMARY KEY,
    subject_identifier     TEXT NOT NULL,
    caregiver_identifier   TEXT NOT NULL,
    screening_identifier   TEXT NOT NULL,
    study_child_identifier TEXT,
    first_name             TEXT NOT NULL,
    last_name              TEXT NOT NULL,
    gender                 TEXT NOT NULL,
    identity               TEXT,
    identity_type          TEXT,
    confirm_identity       TEXT,
    child_dob              TEXT NOT NULL,
    version                TEXT NOT NULL,
    consent_datetime       TEXT NOT NULL,  -- RFC 3339 UTC, fixed width
    UNIQUE (subject_identifier, version)
);

CREATE TABLE IF NOT EXISTS onschedules (
    onschedule_id       TEXT PRIMARY KEY,
    subject_identifier  TEXT NOT NULL,
    schedule_name       TEXT NOT NULL,
    cohort              TEXT NOT NULL,
    kind                TEXT NOT NULL,   -- 'enrollment' | 'quarterly' | 'birth'
    slot                INTEGER NOT NULL,
    onschedule_datetime TEXT NOT NULL,
    UNIQUE (subject_identifier, schedule_name)
);

CREATE TABLE IF NOT EXISTS offschedules (
    offschedule_id       TEXT PRIMARY KEY,
    subject_identifier   TEXT NOT NULL,
    schedule_name        TEXT NOT NULL,
    offschedule_datetime TEXT NOT NULL,
    reason               TEXT,
    UNIQUE (subject_identifier, schedule_name),
    FOREIGN KEY (subject_identifier, schedule_name)
        REFERENCES onschedules (subject_identifier, schedule_name)
);

CREATE TABLE IF NOT EXISTS child_visits (
    visit_id           TEXT PRIMARY KEY,
    subject_identifier TEXT NOT NULL,
    schedule_name      TEXT NOT NULL,
    visit_code         TEXT NOT NULL,
    report_datetime    TEXT NOT NULL,
    reason             TEXT NOT NULL
);

-- No UPDATE is ever issued against this table.
CREATE TABLE IF NOT EXISTS child_assents (
    assent_id            TEXT PRIMARY KEY,
    subject_identifier   TEXT NOT NULL UNIQUE,
    screening_identifier TEXT NOT NULL,
    first_name           TEXT NOT NULL,
    last_name            TEXT NOT NULL,
    initials             TEXT NOT NULL,
    gender               TEXT NOT NULL,
    identity             TEXT,
    identity_type        TEXT,
    confirm_identity     TEXT,
    dob                  TEXT NOT NULL,
    remain_in_study      TEXT NOT NULL,
    version              TEXT NOT NULL,
    assent_datetime      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS infant_feedings (
    feeding_id             TEXT PRIMARY KEY,
    visit_id               TEXT NOT NULL UNIQUE REFERENCES child_visits(visit_id),
    subject_identifier     TEXT NOT NULL,
    report_datetime        TEXT NOT NULL,
    infant_feeding_changed TEXT,
    answers_json           TEXT NOT NULL,   -- FeedingAnswers
    audit_json             TEXT NOT NULL    -- AuditStamp
);

CREATE INDEX IF NOT EXISTS consents_caregiver_idx ON child_consents(caregiver_identifier);
CREATE INDEX IF NOT EXISTS visits_subject_idx     ON child_visits(subject_identifier);
CREATE INDEX IF NOT EXISTS feedings_subject_idx   ON infant_feedings(subject_identifier, report_datetime);

PRAGMA user_version = 1;
";
