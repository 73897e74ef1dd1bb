//! SQL schema for the Lectern SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Timestamps are fixed-width RFC 3339 strings (`YYYY-MM-DDTHH:MM:SS.ffffffZ`) so that
/// range filters can compare them lexicographically.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS categories (
    id    TEXT PRIMARY KEY,
    name  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS courses (
    id            TEXT PRIMARY KEY,
    title         TEXT NOT NULL,
    slug          TEXT NOT NULL UNIQUE,
    category_id   TEXT REFERENCES categories(id),
    is_published  INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lessons (
    id                TEXT PRIMARY KEY,
    course_id         TEXT NOT NULL REFERENCES courses(id),
    title             TEXT NOT NULL,
    order_index       INTEGER NOT NULL CHECK (order_index >= 1),
    duration_seconds  INTEGER CHECK (duration_seconds >= 0),
    is_published      INTEGER NOT NULL DEFAULT 0,
    UNIQUE (course_id, order_index)
);

CREATE TABLE IF NOT EXISTS profiles (
    id          TEXT PRIMARY KEY,
    full_name   TEXT,
    email       TEXT NOT NULL UNIQUE,
    role        TEXT NOT NULL,   -- 'student' | 'admin'
    created_at  TEXT NOT NULL
);

-- completed_at is set iff status = 'completed'.
CREATE TABLE IF NOT EXISTS enrollments (
    id            TEXT PRIMARY KEY,
    student_id    TEXT NOT NULL REFERENCES profiles(id),
    course_id     TEXT NOT NULL REFERENCES courses(id),
    status        TEXT NOT NULL,   -- 'active' | 'completed' | 'dropped'
    enrolled_at   TEXT NOT NULL,
    completed_at  TEXT,
    UNIQUE (student_id, course_id),
    CHECK ((status = 'completed') = (completed_at IS NOT NULL))
);

-- Furthest playback position per (student, lesson). Several rows per pair
-- are tolerated; readers reduce them with max(watched_seconds).
CREATE TABLE IF NOT EXISTS lesson_progress (
    id               TEXT PRIMARY KEY,
    student_id       TEXT NOT NULL REFERENCES profiles(id),
    lesson_id        TEXT NOT NULL REFERENCES lessons(id),
    watched_seconds  INTEGER NOT NULL CHECK (watched_seconds >= 0),
    completed_at     TEXT,
    last_watched_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS enrollments_enrolled_idx ON enrollments(enrolled_at);
CREATE INDEX IF NOT EXISTS enrollments_course_idx   ON enrollments(course_id);
CREATE INDEX IF NOT EXISTS enrollments_student_idx  ON enrollments(student_id);
CREATE INDEX IF NOT EXISTS progress_watched_idx     ON lesson_progress(last_watched_at);
CREATE INDEX IF NOT EXISTS progress_student_idx     ON lesson_progress(student_id);
CREATE INDEX IF NOT EXISTS lessons_course_idx       ON lessons(course_id);

PRAGMA user_version = 1;
";
