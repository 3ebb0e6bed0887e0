use super::{segment, AdminApi};
use crate::models::{Secretaria, SecretariaInput};
use civis_core::{QueryParams, Result};

fn base(city_id: &str) -> String {
    format!("/api/admin/cities/{}/secretarias", segment(city_id))
}

impl AdminApi {
    pub async fn list_secretarias(&self, city_id: &str) -> Result<Vec<Secretaria>> {
        self.client.get(&base(city_id), &QueryParams::new()).await
    }

    pub async fn create_secretaria(&self, city_id: &str, input: &SecretariaInput) -> Result<Secretaria> {
        self.client.post(&base(city_id), input).await
    }

    pub async fn update_secretaria(&self, city_id: &str, id: &str, input: &SecretariaInput) -> Result<Secretaria> {
        self.client
            .put(&format!("{}/{}", base(city_id), segment(id)), input)
            .await
    }

    pub async fn delete_secretaria(&self, city_id: &str, id: &str) -> Result<()> {
        self.client
            .delete::<serde_json::Value>(&format!("{}/{}", base(city_id), segment(id)))
            .await
            .map(|_| ())
    }
}
