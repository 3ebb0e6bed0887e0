use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a citizen report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pendente,
    EmAndamento,
    Resolvido,
    Cancelado,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pendente => "pendente",
            ReportStatus::EmAndamento => "em_andamento",
            ReportStatus::Resolvido => "resolvido",
            ReportStatus::Cancelado => "cancelado",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A citizen-submitted improvement report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub status: ReportStatus,
    #[serde(default)]
    pub city_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub secretaria_id: Option<String>,
    #[serde(default)]
    pub supports: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(alias = "items")]
    pub data: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}

fn first_page() -> u32 {
    1
}

impl<T> Page<T> {
    /// Number of pages, at least one.
    pub fn total_pages(&self) -> u32 {
        if self.limit == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.limit));
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

/// Filters of a city's report list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub page: u32,
    pub limit: u32,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            status: None,
            page: 1,
            limit: 20,
        }
    }
}

impl ReportFilter {
    pub fn status(mut self, status: ReportStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }
}

/// Input of the report status mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportStatusChange {
    pub report_id: String,
    /// City whose report lists and dashboard are affected.
    pub city_id: String,
    pub status: ReportStatus,
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&ReportStatus::EmAndamento).unwrap(), r#""em_andamento""#);
        let status: ReportStatus = serde_json::from_str(r#""resolvido""#).unwrap();
        assert_eq!(status, ReportStatus::Resolvido);
    }

    #[test]
    fn test_page_arithmetic() {
        let page: Page<Report> = serde_json::from_str(r#"{"items": [], "total": 41, "page": 2, "limit": 20}"#).unwrap();
        assert_eq!(page.total_pages(), 3);
        assert!(page.has_next());
    }
}
