//! Typed bindings for the admin API endpoints.
//!
//! [`AdminApi`] is a cheap handle over the shared [`ApiClient`]; clone it
//! into fetch and write closures freely.

mod auth;
mod dashboard;
mod observations;
mod reports;
mod secretarias;
mod users;

use civis_core::ApiClient;
use std::sync::Arc;

#[derive(Clone)]
pub struct AdminApi {
    client: Arc<ApiClient>,
}

impl AdminApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }
}

/// Percent-encode a path segment.
pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_escapes_reserved_characters() {
        assert_eq!(segment("abc-123"), "abc-123");
        assert_eq!(segment("a/b c"), "a%2Fb%20c");
    }
}
