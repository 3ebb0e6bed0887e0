//! Mutation definitions.

use crate::error::Result;
use crate::query::QueryKey;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The cached reads a write affects: a domain label and the key prefixes to
/// invalidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationGroup {
    domain: String,
    prefixes: Vec<QueryKey>,
}

impl InvalidationGroup {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            prefixes: Vec::new(),
        }
    }

    /// A write that affects no cached read.
    pub fn none() -> Self {
        Self::default()
    }

    /// Add a key prefix.
    pub fn key(mut self, prefix: QueryKey) -> Self {
        if !self.prefixes.contains(&prefix) {
            self.prefixes.push(prefix);
        }
        self
    }

    /// Union of two groups. The domain label of `self` is kept unless empty.
    pub fn merge(mut self, other: InvalidationGroup) -> Self {
        if self.domain.is_empty() {
            self.domain = other.domain;
        }
        for prefix in other.prefixes {
            self = self.key(prefix);
        }
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn prefixes(&self) -> &[QueryKey] {
        &self.prefixes
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

type WriteFn<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O>> + Send + Sync>;
type ImpactFn<I, O> = Arc<dyn Fn(&I, &O) -> InvalidationGroup + Send + Sync>;
type TargetFn<I> = Arc<dyn Fn(&I) -> Option<String> + Send + Sync>;

/// A named write operation.
///
/// The impact function is a constructor argument: a mutation cannot exist
/// without stating what it invalidates. Use [`InvalidationGroup::none`] for
/// writes that affect nothing.
pub struct Mutation<I, O> {
    name: &'static str,
    write: WriteFn<I, O>,
    impact: ImpactFn<I, O>,
    self_target: Option<TargetFn<I>>,
}

impl<I, O> Clone for Mutation<I, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            write: Arc::clone(&self.write),
            impact: Arc::clone(&self.impact),
            self_target: self.self_target.clone(),
        }
    }
}

impl<I, O> fmt::Debug for Mutation<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("name", &self.name)
            .field("self_target", &self.self_target.is_some())
            .finish()
    }
}

impl<I, O> Mutation<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new<W, Fut, P>(name: &'static str, write: W, impact: P) -> Self
    where
        W: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
        P: Fn(&I, &O) -> InvalidationGroup + Send + Sync + 'static,
    {
        Self {
            name,
            write: Arc::new(move |input| write(input).boxed()),
            impact: Arc::new(impact),
            self_target: None,
        }
    }

    /// Declare which user record this write modifies. When it is the
    /// logged-in admin, the response is merged into the session identity.
    pub fn targets_user<S>(mut self, selector: S) -> Self
    where
        S: Fn(&I) -> Option<String> + Send + Sync + 'static,
    {
        self.self_target = Some(Arc::new(selector));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn write(&self, input: I) -> BoxFuture<'static, Result<O>> {
        (self.write)(input)
    }

    pub(crate) fn impact(&self, input: &I, output: &O) -> InvalidationGroup {
        (self.impact)(input, output)
    }

    pub(crate) fn target_user(&self, input: &I) -> Option<String> {
        self.self_target.as_ref().and_then(|select| select(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_key;

    #[test]
    fn test_group_deduplicates_prefixes() {
        let group = InvalidationGroup::new("users")
            .key(query_key!("users"))
            .key(query_key!("users"))
            .merge(InvalidationGroup::new("dashboard").key(query_key!("dashboard")));

        assert_eq!(group.domain(), "users");
        assert_eq!(group.prefixes().len(), 2);
    }

    #[test]
    fn test_none_is_empty() {
        assert!(InvalidationGroup::none().is_empty());
    }

    #[tokio::test]
    async fn test_write_and_impact() {
        let mutation = Mutation::new(
            "double",
            |n: u32| async move { Ok(n * 2) },
            |_, out: &u32| InvalidationGroup::new("numbers").key(query_key!("numbers", i64::from(*out))),
        )
        .targets_user(|n: &u32| Some(n.to_string()));

        let out = mutation.write(4).await.unwrap();
        assert_eq!(out, 8);
        assert_eq!(mutation.impact(&4, &out).prefixes(), &[query_key!("numbers", 8i64)]);
        assert_eq!(mutation.target_user(&4).as_deref(), Some("4"));
    }
}
