use super::AdminApi;
use crate::models::{LoginRequest, LoginResponse};
use civis_core::Result;

impl AdminApi {
    /// Exchange credentials for a token and identity.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        self.client.post("/api/admin/auth/login", request).await
    }
}
