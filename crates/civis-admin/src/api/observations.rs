use super::{segment, AdminApi};
use crate::models::{NewObservation, Observation, ObservationFilter, ObservationUpdate};
use civis_core::{QueryParams, Result};

impl AdminApi {
    pub async fn list_observations(&self, filter: &ObservationFilter) -> Result<Vec<Observation>> {
        let params = QueryParams::new()
            .set_opt("cityId", filter.city_id.as_deref())
            .set_opt("reportId", filter.report_id.as_deref())
            .set_opt("unread", filter.unread_only.then_some("true"));
        self.client.get("/api/admin/observations", &params).await
    }

    pub async fn create_observation(&self, input: &NewObservation) -> Result<Observation> {
        self.client.post("/api/admin/observations", input).await
    }

    pub async fn update_observation(&self, id: &str, update: &ObservationUpdate) -> Result<Observation> {
        self.client
            .put(&format!("/api/admin/observations/{}", segment(id)), update)
            .await
    }
}
