//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionManager`: the session store; persists the token, publishes the
//!   authentication flag and owns the expiry timer
//! - `ExpirationScheduler`: one-shot timer that forces logout at token expiry
//! - `TokenStore`: durable storage for the session record
//! - `AuthBackend`: the login/refresh endpoints the session talks to
//!
//! One `SessionManager` is built at startup and handed to every component
//! that needs the token.

pub mod backend;
pub mod claims;
pub mod credentials;
pub mod error;
pub mod manager;
pub mod scheduler;
pub mod session;
pub mod store;

pub use backend::AuthBackend;
pub use credentials::Credentials;
pub use error::AuthError;
pub use manager::{AuthSubscription, RestoreOutcome, SessionManager};
pub use scheduler::ExpirationScheduler;
pub use session::SessionData;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
