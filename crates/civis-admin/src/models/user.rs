use chrono::{DateTime, Utc};
use civis_core::session::SecretariaRef;
use serde::{Deserialize, Serialize};

/// An administrator account as listed by `/api/admin/users`.
///
/// Serializes with the same camelCase names as the session identity so a
/// response can be merged into it. Fields the server left out stay out of
/// the serialized form; `secretaria: null` is kept distinct from an absent
/// `secretaria`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    #[serde(alias = "userId")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_cities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_super_admin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_mayor: Option<bool>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub secretaria: Option<Option<SecretariaRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl AdminUser {
    pub fn allowed_cities(&self) -> &[String] {
        self.allowed_cities.as_deref().unwrap_or_default()
    }

    pub fn secretaria(&self) -> Option<&SecretariaRef> {
        self.secretaria.as_ref().and_then(Option::as_ref)
    }
}

/// Marks a field that appeared in the payload, even as `null`.
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Filters of the user list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub city_id: Option<String>,
    pub search: Option<String>,
    pub secretaria_id: Option<String>,
}

/// Body of `PUT /api/admin/users/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_cities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_super_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_mayor: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secretaria_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UserUpdate {
    pub fn phone(phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            ..Self::default()
        }
    }
}
