//! The Lectern reporting engine.
//!
//! [`ReportEngine`] answers seven questions about an LMS store: the admin,
//! course and student dashboards, learning progress, the enrollment report,
//! course performance, and data export. Every entry point takes the
//! [`Caller`](lectern_core::access::Caller), a parameter object and the
//! request instant, and returns `Result<_, ReportError>`; wrap it in
//! [`Outcome`] for the wire.
//!
//! Data flows one way: the requested period resolves to a
//! [`TimeWindow`](lectern_core::window::TimeWindow), independent store reads
//! run concurrently and fail fast, the pure reducers in [`aggregate`] fold
//! the rows, and each report module shapes the result.

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod export;
mod fetch;
pub mod params;
pub mod reports;

pub use engine::{EngineConfig, ReportEngine};
pub use error::{Outcome, ReportError};
pub use params::{
  AdminDashboardParams, CourseDashboardParams, CoursePerformanceParams,
  EnrollmentReportParams, ExportParams, LearningProgressParams, StudentDashboardParams,
};
