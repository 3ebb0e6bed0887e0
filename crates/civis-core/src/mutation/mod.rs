//! Write operations and their cache consequences.
//!
//! Every [`Mutation`] declares which cached reads it affects. The
//! [`MutationDispatcher`] runs the write, then invalidates those reads
//! before reporting success, so no caller ever sees a completed write next
//! to pre-write data.

mod definition;
mod dispatcher;

pub use definition::{InvalidationGroup, Mutation};
pub use dispatcher::{MutationDispatcher, MutationOutcome};
