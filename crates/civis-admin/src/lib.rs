//! Civis Admin - municipal resources on top of `civis-core`.
//!
//! [`AdminConsole`] wires the transport client, session store, query cache
//! and mutation dispatcher from a [`ClientConfig`] and exposes the
//! dashboard's reads as cache subscriptions and its writes as
//! [`mutations`].
//!
//! # Example
//!
//! ```rust,ignore
//! use civis_admin::{mutations, AdminConsole};
//! use civis_admin::models::{UserFilter, UserUpdate};
//!
//! #[tokio::main]
//! async fn main() -> civis_core::Result<()> {
//!     let console = AdminConsole::from_env()?;
//!     let admin = console.login("a@b.com", "secret1", true).await?;
//!
//!     let mut users = console.users(UserFilter::default());
//!     println!("{:?}", users.settled().await.data);
//!
//!     let update = mutations::UpdateUser {
//!         id: admin.user_id.clone(),
//!         changes: UserUpdate::phone("+55 11 99999-0000"),
//!     };
//!     console.execute(&mutations::update_user(console.api()), update).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod keys;
pub mod models;
pub mod mutations;

mod builder;
mod queries;

pub use api::AdminApi;
pub use builder::AdminConsoleBuilder;
pub use keys::Domain;

use crate::models::LoginRequest;
use civis_core::{
    AdminIdentity, ApiClient, ClientConfig, Mutation, MutationDispatcher, QueryCache, Result, SessionState,
    SessionStore,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Entry point of the admin dashboard's data layer.
///
/// Owns one [`ApiClient`] and everything that depends on it. Logging out,
/// explicitly or through a 401, clears the query cache.
pub struct AdminConsole {
    config: ClientConfig,
    client: Arc<ApiClient>,
    api: AdminApi,
    session: Arc<SessionStore>,
    cache: QueryCache,
    dispatcher: MutationDispatcher,
    gc_task: Option<JoinHandle<()>>,
}

impl AdminConsole {
    pub fn builder(config: ClientConfig) -> AdminConsoleBuilder {
        AdminConsoleBuilder::new(config)
    }

    /// Build from `CIVIS_*` environment variables with default options.
    pub fn from_env() -> Result<Self> {
        Self::builder(ClientConfig::from_env()?).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn api(&self) -> &AdminApi {
        &self.api
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn dispatcher(&self) -> &MutationDispatcher {
        &self.dispatcher
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// City preselected by configuration.
    pub fn default_city_id(&self) -> Option<&str> {
        self.config.default_city_id.as_deref()
    }

    /// Whether the logged-in admin may manage `city_id`.
    pub fn can_access_city(&self, city_id: &str) -> bool {
        self.session
            .admin()
            .map(|admin| admin.can_access_city(city_id))
            .unwrap_or(false)
    }

    /// Log in with e-mail or CPF and password.
    ///
    /// Data cached under a previous identity is dropped before the new
    /// session starts.
    pub async fn login(&self, email_or_cpf: &str, password: &str, remember: bool) -> Result<AdminIdentity> {
        let response = self.api.login(&LoginRequest::new(email_or_cpf, password)).await?;
        self.cache.clear();
        self.session.login(&response.token, response.admin.clone(), remember)?;
        info!("Logged in as {}", response.admin.name);
        Ok(response.admin)
    }

    /// End the session. Returns false if nobody was logged in.
    pub fn logout(&self) -> bool {
        self.session.logout()
    }

    /// Run a write and its invalidation.
    pub async fn execute<I, O>(&self, mutation: &Mutation<I, O>, input: I) -> Result<O>
    where
        I: Clone + Send + 'static,
        O: Serialize + Send + 'static,
    {
        self.dispatcher.execute(mutation, input).await
    }
}

impl Drop for AdminConsole {
    fn drop(&mut self) {
        if let Some(task) = self.gc_task.take() {
            task.abort();
        }
    }
}
