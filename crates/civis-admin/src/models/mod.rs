//! Typed request and response bodies of the admin API.
//!
//! Every response is decoded into one of these types before it reaches the
//! cache. Unknown fields are ignored and optional fields default.

mod auth;
mod dashboard;
mod observation;
mod report;
mod secretaria;
mod user;

pub use auth::{LoginRequest, LoginResponse};
pub use dashboard::{
    CategoryCount, DashboardFilter, DashboardOverview, DashboardSummary, MapPoint, StatusCount, TopReport,
};
pub use observation::{NewObservation, Observation, ObservationFilter, ObservationUpdate};
pub use report::{Page, Report, ReportFilter, ReportStatus, ReportStatusChange};
pub use secretaria::{Secretaria, SecretariaInput};
pub use user::{AdminUser, UserFilter, UserUpdate};
