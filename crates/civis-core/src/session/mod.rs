//! Authentication session lifecycle.
//!
//! - [`SessionStore`]: login, logout, identity updates, restore on startup
//! - [`SessionStorage`]: cookie + identity record mirrors
//! - [`decode_token`]: offline identity recovery from a JWT payload

mod identity;
mod storage;
mod store;
mod token;

pub use identity::{AdminIdentity, AdminPatch, SecretariaRef};
pub use storage::{FileSessionStorage, MemorySessionStorage, SameSite, SessionStorage, TokenCookie};
pub use store::{LogoutReason, Session, SessionOptions, SessionState, SessionStore};
pub use token::{decode_token, DecodedToken};
