//! Civis Core - data-sync and session layer for the Civis admin dashboard.
//!
//! This crate owns everything between the dashboard's views and the admin
//! REST API:
//!
//! - [`transport::ApiClient`] issues authenticated requests and signals 401s
//! - [`session::SessionStore`] tracks who is logged in and mirrors it to disk
//! - [`query::QueryCache`] deduplicates reads and tracks their freshness
//! - [`mutation::MutationDispatcher`] runs writes and invalidates what they
//!   affect
//!
//! Municipal resources (users, secretarias, reports, ...) live in the
//! `civis-admin` crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use civis_core::{query_key, ClientConfig, QueryCache, QueryOptions};
//!
//! #[tokio::main]
//! async fn main() -> civis_core::Result<()> {
//!     let cache = QueryCache::new();
//!     let mut users = cache.subscribe(
//!         query_key!("users", "city-1"),
//!         || async { Ok(vec!["Ana".to_string()]) },
//!         QueryOptions::default(),
//!     );
//!
//!     let state = users.settled().await;
//!     println!("{} users", state.data.map(|d| d.len()).unwrap_or(0));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod mutation;
pub mod query;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use config::ClientConfig;
pub use error::{CivisError, Result};
pub use events::{EventBus, ListenerId};
pub use mutation::{InvalidationGroup, Mutation, MutationDispatcher, MutationOutcome};
pub use query::{FetchStatus, KeyPart, QueryCache, QueryKey, QueryOptions, QueryState, Subscription};
pub use session::{AdminIdentity, AdminPatch, LogoutReason, SessionState, SessionStore};
pub use transport::{ApiClient, QueryParams};
