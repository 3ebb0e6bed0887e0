//! Cache keys of every admin resource and the invalidation domains that
//! group them.
//!
//! All keys are built here so one logical query always produces one key.
//! Layout: resource name, then scope (usually the city), then filters.

use crate::models::{DashboardFilter, ObservationFilter, ReportFilter, UserFilter};
use civis_core::{query_key, InvalidationGroup, QueryKey};

pub fn users(filter: &UserFilter) -> QueryKey {
    query_key!(
        "users",
        "list",
        filter.city_id.as_deref(),
        filter.search.as_deref(),
        filter.secretaria_id.as_deref()
    )
}

pub fn user(id: &str) -> QueryKey {
    query_key!("users", "detail", id)
}

pub fn secretarias(city_id: &str) -> QueryKey {
    query_key!("secretarias", city_id)
}

/// `view` is one of `overview`, `summary`, `map`, `top-reports`.
pub fn dashboard(view: &str, filter: &DashboardFilter) -> QueryKey {
    query_key!(
        "dashboard",
        filter.city_id.as_str(),
        view,
        filter.start_date.map(|d| d.to_string()),
        filter.end_date.map(|d| d.to_string())
    )
}

/// Page is the last element, so pages of one list differ only there.
pub fn reports(city_id: &str, filter: &ReportFilter) -> QueryKey {
    query_key!("reports", city_id, filter.status.map(|s| s.as_str()), filter.limit).page(filter.page)
}

pub fn observations(filter: &ObservationFilter) -> QueryKey {
    query_key!(
        "observations",
        filter.city_id.as_deref(),
        filter.report_id.as_deref(),
        filter.unread_only
    )
}

/// Logical areas of data a write can affect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Domain {
    /// Every user list and detail.
    Users,
    /// Departments of one city. User rows embed department names, so users
    /// are refreshed too.
    Secretarias { city_id: String },
    /// Reports of one city and the dashboard aggregates derived from them.
    Reports { city_id: String },
    /// Aggregates of one city.
    Dashboard { city_id: String },
    Observations,
}

impl Domain {
    pub fn label(&self) -> &'static str {
        match self {
            Domain::Users => "users",
            Domain::Secretarias { .. } => "secretarias",
            Domain::Reports { .. } => "reports",
            Domain::Dashboard { .. } => "dashboard",
            Domain::Observations => "observations",
        }
    }

    /// Key prefixes to refresh when a write in this domain succeeds.
    pub fn group(&self) -> InvalidationGroup {
        let group = InvalidationGroup::new(self.label());
        match self {
            Domain::Users => group.key(query_key!("users")),
            Domain::Secretarias { city_id } => group
                .key(query_key!("secretarias", city_id.as_str()))
                .key(query_key!("users")),
            Domain::Reports { city_id } => group
                .key(query_key!("reports", city_id.as_str()))
                .key(query_key!("dashboard", city_id.as_str())),
            Domain::Dashboard { city_id } => group.key(query_key!("dashboard", city_id.as_str())),
            Domain::Observations => group.key(query_key!("observations")),
        }
    }
}

impl From<Domain> for InvalidationGroup {
    fn from(domain: Domain) -> Self {
        domain.group()
    }
}
