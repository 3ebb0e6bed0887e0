//! Outbound HTTP communication with the admin API.

mod client;
mod params;

pub use client::{extract_server_message, ApiClient, UnauthorizedEvent};
pub use params::QueryParams;
pub use reqwest::Method;
