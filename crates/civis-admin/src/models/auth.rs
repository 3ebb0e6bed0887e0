use civis_core::AdminIdentity;
use serde::{Deserialize, Serialize};

/// Credentials for `POST /api/admin/auth/login`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// E-mail address or CPF.
    pub email_or_cpf: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email_or_cpf: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email_or_cpf: email_or_cpf.into().trim().to_string(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub admin: AdminIdentity,
}
