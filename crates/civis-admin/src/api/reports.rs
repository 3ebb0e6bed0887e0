use super::{segment, AdminApi};
use crate::models::{Page, Report, ReportFilter, ReportStatus};
use civis_core::{QueryParams, Result};
use serde::Serialize;

#[derive(Serialize)]
struct StatusBody<'a> {
    status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
}

impl AdminApi {
    pub async fn list_reports(&self, city_id: &str, filter: &ReportFilter) -> Result<Page<Report>> {
        let params = QueryParams::new()
            .set_opt("status", filter.status.map(|s| s.as_str()))
            .set("page", filter.page)
            .set("limit", filter.limit);
        self.client
            .get(&format!("/api/admin/cities/{}/reports", segment(city_id)), &params)
            .await
    }

    pub async fn update_report_status(&self, id: &str, status: ReportStatus, note: Option<&str>) -> Result<Report> {
        self.client
            .put(
                &format!("/api/admin/reports/{}/status", segment(id)),
                &StatusBody { status, note },
            )
            .await
    }
}
