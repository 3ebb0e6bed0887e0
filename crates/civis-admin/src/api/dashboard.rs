use super::AdminApi;
use crate::models::{DashboardFilter, DashboardOverview, DashboardSummary, MapPoint, TopReport};
use civis_core::Result;

impl AdminApi {
    pub async fn dashboard_overview(&self, filter: &DashboardFilter) -> Result<DashboardOverview> {
        self.client.get("/api/dashboard/overview", &filter.params()).await
    }

    pub async fn dashboard_summary(&self, filter: &DashboardFilter) -> Result<DashboardSummary> {
        self.client.get("/api/dashboard/summary", &filter.params()).await
    }

    pub async fn dashboard_map(&self, filter: &DashboardFilter) -> Result<Vec<MapPoint>> {
        self.client.get("/api/dashboard/map", &filter.params()).await
    }

    pub async fn top_reports(&self, filter: &DashboardFilter) -> Result<Vec<TopReport>> {
        self.client.get("/api/dashboard/top-reports", &filter.params()).await
    }
}
