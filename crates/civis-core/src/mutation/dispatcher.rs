//! Runs mutations and applies their cache and session consequences.

use crate::error::Result;
use crate::mutation::definition::Mutation;
use crate::query::QueryCache;
use crate::session::{AdminPatch, SessionStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};

/// What a successful mutation did besides the write itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Cache entries marked stale.
    pub invalidated: usize,
    /// The session identity was updated from the response.
    pub identity_updated: bool,
}

pub struct MutationDispatcher {
    cache: QueryCache,
    session: Option<Arc<SessionStore>>,
}

impl MutationDispatcher {
    pub fn new(cache: QueryCache, session: Option<Arc<SessionStore>>) -> Self {
        Self { cache, session }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Run `mutation` with `input`.
    ///
    /// On success the affected cache entries are invalidated, and subscribed
    /// ones refetched, before this returns. On failure nothing is
    /// invalidated and the write's error is returned unchanged.
    pub async fn execute<I, O>(&self, mutation: &Mutation<I, O>, input: I) -> Result<O>
    where
        I: Clone + Send + 'static,
        O: Serialize + Send + 'static,
    {
        self.execute_with_outcome(mutation, input)
            .await
            .map(|(output, _)| output)
    }

    /// Like [`execute`](Self::execute), also reporting what happened.
    pub async fn execute_with_outcome<I, O>(&self, mutation: &Mutation<I, O>, input: I) -> Result<(O, MutationOutcome)>
    where
        I: Clone + Send + 'static,
        O: Serialize + Send + 'static,
    {
        let span = info_span!("mutation", name = mutation.name());
        async move {
            let output = match mutation.write(input.clone()).await {
                Ok(output) => output,
                Err(err) => {
                    warn!("Write failed: {}", err);
                    return Err(err);
                }
            };

            let group = mutation.impact(&input, &output);
            let mut invalidated = 0;
            for prefix in group.prefixes() {
                invalidated += self.cache.invalidate(prefix).await;
            }

            let identity_updated = match mutation.target_user(&input) {
                Some(user_id) => self.update_own_identity(&user_id, &output),
                None => false,
            };

            let outcome = MutationOutcome {
                invalidated,
                identity_updated,
            };
            info!(
                domain = group.domain(),
                invalidated = outcome.invalidated,
                identity_updated = outcome.identity_updated,
                "Mutation completed"
            );
            Ok((output, outcome))
        }
        .instrument(span)
        .await
    }

    /// Merge the response into the session identity when the write targeted
    /// the logged-in admin.
    ///
    /// Only fields present in the serialized output are merged, so outputs
    /// must leave out what the server did not send.
    fn update_own_identity<O: Serialize>(&self, user_id: &str, output: &O) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        let is_self = session.admin().map(|a| a.user_id == user_id).unwrap_or(false);
        if !is_self {
            return false;
        }

        let patch = match serde_json::to_value(output) {
            Ok(value) => AdminPatch::from_json(&value),
            Err(err) => {
                warn!("Could not project response onto the session identity: {}", err);
                return false;
            }
        };
        if patch.is_empty() {
            debug!("Response carries no identity fields");
            return false;
        }

        // A failing identity mirror does not fail the write.
        match session.update_admin(&patch) {
            Ok(updated) => updated,
            Err(err) => {
                warn!("Failed to persist updated identity: {}", err);
                false
            }
        }
    }
}
