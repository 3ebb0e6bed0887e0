use super::{segment, AdminApi};
use crate::models::{AdminUser, UserFilter, UserUpdate};
use civis_core::{QueryParams, Result};

impl AdminApi {
    pub async fn list_users(&self, filter: &UserFilter) -> Result<Vec<AdminUser>> {
        let params = QueryParams::new()
            .set_opt("cityId", filter.city_id.as_deref())
            .set_opt("search", filter.search.as_deref())
            .set_opt("secretariaId", filter.secretaria_id.as_deref());
        self.client.get("/api/admin/users", &params).await
    }

    pub async fn get_user(&self, id: &str) -> Result<AdminUser> {
        self.client
            .get(&format!("/api/admin/users/{}", segment(id)), &QueryParams::new())
            .await
    }

    pub async fn update_user(&self, id: &str, update: &UserUpdate) -> Result<AdminUser> {
        self.client.put(&format!("/api/admin/users/{}", segment(id)), update).await
    }

    pub async fn delete_user(&self, id: &str) -> Result<()> {
        self.client
            .delete::<serde_json::Value>(&format!("/api/admin/users/{}", segment(id)))
            .await
            .map(|_| ())
    }
}
