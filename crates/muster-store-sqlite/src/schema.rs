//! SQL schema for the Muster SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS formations (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    short_name  TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS battalions (
    id            INTEGER PRIMARY KEY,
    name          TEXT NOT NULL,
    short_name    TEXT NOT NULL UNIQUE,
    formation_id  INTEGER REFERENCES formations(id)
);

-- Ids are ordered by seniority; officers are rank_id >= O1.
CREATE TABLE IF NOT EXISTS ranks (
    id                     INTEGER PRIMARY KEY,
    name                   TEXT NOT NULL,
    regiment_abbreviation  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS interview_reasons (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS officer_appraisal_grades (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS enlistment_types (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS genders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS servicepeople (
    number              INTEGER PRIMARY KEY,
    first_name          TEXT NOT NULL,
    middle_name         TEXT,
    last_name           TEXT NOT NULL,
    rank_id             INTEGER NOT NULL REFERENCES ranks(id),
    battalion_id        INTEGER REFERENCES battalions(id),
    enlistment_type_id  INTEGER REFERENCES enlistment_types(id),
    gender_id           INTEGER REFERENCES genders(id),
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    deleted_at          TEXT
);

-- Dates are ISO 8601 (YYYY-MM-DD) so text comparison is chronological.
CREATE TABLE IF NOT EXISTS officer_performance_appraisal_checklists (
    id                                 INTEGER PRIMARY KEY AUTOINCREMENT,
    serviceperson_number               INTEGER NOT NULL REFERENCES servicepeople(number),
    appraisal_start_at                 TEXT NOT NULL,
    appraisal_end_at                   TEXT NOT NULL,
    battalion_id                       INTEGER REFERENCES battalions(id),
    rank_id                            INTEGER REFERENCES ranks(id),
    is_appointment_correct             INTEGER NOT NULL DEFAULT 0,
    is_assessment_rubric_complete      INTEGER NOT NULL DEFAULT 0,
    has_company_commander              INTEGER NOT NULL DEFAULT 0,
    has_company_commander_comments     INTEGER NOT NULL DEFAULT 0,
    has_company_commander_signature    INTEGER NOT NULL DEFAULT 0,
    officer_appraisal_grade_id         INTEGER NOT NULL REFERENCES officer_appraisal_grades(id),
    non_grading_reason                 TEXT,
    has_disciplinary_action            INTEGER NOT NULL DEFAULT 0,
    disciplinary_action_particulars    TEXT,
    has_unit_commander                 INTEGER NOT NULL DEFAULT 0,
    has_unit_commander_comments        INTEGER NOT NULL DEFAULT 0,
    has_unit_commander_signature       INTEGER NOT NULL DEFAULT 0,
    has_formation_commander_comments   INTEGER NOT NULL DEFAULT 0,
    has_formation_commander_signature  INTEGER NOT NULL DEFAULT 0,
    has_serviceperson_signature        INTEGER NOT NULL DEFAULT 0,
    created_at                         TEXT NOT NULL,
    updated_at                         TEXT NOT NULL,
    deleted_at                         TEXT,
    CHECK (appraisal_start_at < appraisal_end_at)
);

CREATE TABLE IF NOT EXISTS users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    username        TEXT NOT NULL UNIQUE,
    name            TEXT NOT NULL,
    password_hash   TEXT NOT NULL,
    is_super_admin  INTEGER NOT NULL DEFAULT 0,
    permissions     TEXT NOT NULL DEFAULT '[]',   -- JSON array of strings
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS servicepeople_rank_idx   ON servicepeople(rank_id);
CREATE INDEX IF NOT EXISTS appraisals_person_idx    ON officer_performance_appraisal_checklists(serviceperson_number);
CREATE INDEX IF NOT EXISTS appraisals_end_idx       ON officer_performance_appraisal_checklists(appraisal_end_at);

PRAGMA user_version = 1;
";
