//! Admin identity carried by a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Department ("secretaria") an admin is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretariaRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Identity of the logged-in administrator.
///
/// Field names follow the API's camelCase JSON. Unknown fields are ignored
/// and optional fields default, so a newer server does not break old
/// clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminIdentity {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub allowed_cities: Vec<String>,
    #[serde(default)]
    pub is_super_admin: bool,
    #[serde(default)]
    pub is_mayor: bool,
    #[serde(default)]
    pub secretaria: Option<SecretariaRef>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl AdminIdentity {
    /// Whether this admin may read and manage data of `city_id`.
    pub fn can_access_city(&self, city_id: &str) -> bool {
        self.is_super_admin || self.allowed_cities.iter().any(|c| c == city_id)
    }

    /// Secretaria-level admins only see their own department's reports.
    pub fn is_restricted_to_secretaria(&self) -> bool {
        !self.is_super_admin && !self.is_mayor && self.secretaria.is_some()
    }

    /// E-mail or CPF, whichever identifies this admin at login.
    pub fn login_handle(&self) -> Option<&str> {
        self.email.as_deref().or(self.cpf.as_deref())
    }

    /// Merge the fields present in `patch`.
    pub fn apply(&mut self, patch: &AdminPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(email) = &patch.email {
            self.email = Some(email.clone());
        }
        if let Some(cpf) = &patch.cpf {
            self.cpf = Some(cpf.clone());
        }
        if let Some(phone) = &patch.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(cities) = &patch.allowed_cities {
            self.allowed_cities = cities.clone();
        }
        if let Some(flag) = patch.is_super_admin {
            self.is_super_admin = flag;
        }
        if let Some(flag) = patch.is_mayor {
            self.is_mayor = flag;
        }
        if let Some(secretaria) = &patch.secretaria {
            self.secretaria = secretaria.clone();
        }
        if let Some(at) = patch.last_login_at {
            self.last_login_at = Some(at);
        }
    }
}

/// Partial update of an [`AdminIdentity`].
///
/// `user_id` is absent: a patch never changes whose session
/// it is. `secretaria` is doubly optional so a patch can clear it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
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
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_some"
    )]
    pub secretaria: Option<Option<SecretariaRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl AdminPatch {
    /// Project an arbitrary JSON object onto the identity fields it shares
    /// with [`AdminIdentity`].
    ///
    /// Fields of the wrong type are skipped individually rather than
    /// failing the whole projection.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        let field = |name: &str| object.get(name).filter(|v| !v.is_null());
        let string = |name: &str| field(name).and_then(|v| v.as_str()).map(str::to_string);
        let boolean = |name: &str| field(name).and_then(|v| v.as_bool());

        Self {
            name: string("name"),
            email: string("email"),
            cpf: string("cpf"),
            phone: string("phone"),
            allowed_cities: field("allowedCities")
                .and_then(|v| serde_json::from_value::<Vec<String>>(v.clone()).ok()),
            is_super_admin: boolean("isSuperAdmin"),
            is_mayor: boolean("isMayor"),
            secretaria: match object.get("secretaria") {
                Some(serde_json::Value::Null) => Some(None),
                Some(v) => serde_json::from_value::<SecretariaRef>(v.clone()).ok().map(Some),
                None => None,
            },
            last_login_at: field("lastLoginAt")
                .and_then(|v| serde_json::from_value::<DateTime<Utc>>(v.clone()).ok()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
