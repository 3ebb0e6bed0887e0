//! Query cache: deduplicated, invalidatable reads keyed by [`QueryKey`].

mod cache;
mod key;
mod state;
mod subscription;

pub use cache::QueryCache;
pub use key::{KeyPart, QueryKey};
pub use state::{FetchStatus, QueryOptions, QueryState};
pub use subscription::Subscription;
