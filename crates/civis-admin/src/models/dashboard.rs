use chrono::NaiveDate;
use civis_core::QueryParams;
use serde::{Deserialize, Serialize};

/// City and optional date range shared by every dashboard endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardFilter {
    pub city_id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DashboardFilter {
    pub fn city(city_id: impl Into<String>) -> Self {
        Self {
            city_id: city_id.into(),
            start_date: None,
            end_date: None,
        }
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub(crate) fn params(&self) -> QueryParams {
        QueryParams::new()
            .set("cityId", &self.city_id)
            .set_opt("startDate", self.start_date.map(format_date))
            .set_opt("endDate", self.end_date.map(format_date))
    }
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Headline numbers of `/api/dashboard/overview`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardOverview {
    pub total_reports: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub resolved: u64,
    pub canceled: u64,
    /// Mean hours from submission to resolution.
    pub average_resolution_hours: Option<f64>,
    pub active_citizens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: String,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: String,
    #[serde(default)]
    pub count: u64,
}

/// Breakdown of `/api/dashboard/summary`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardSummary {
    pub by_category: Vec<CategoryCount>,
    pub by_status: Vec<StatusCount>,
}

/// One marker of `/api/dashboard/map`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPoint {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Entry of `/api/dashboard/top-reports`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopReport {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Citizen endorsements.
    #[serde(default)]
    pub supports: u64,
}
