//! Core library for the MuseFuse photo-sharing client.
//!
//! - `auth`: session lifecycle (token persistence, expiry timer, observable
//!   authentication flag)
//! - `api`: REST client for the MuseFuse backend
//! - `photos`: authenticated photo operations built on the session
//! - `models`: wire and domain types
//! - `config`: client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod photos;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthError, AuthSubscription, Credentials, RestoreOutcome, SessionManager};
pub use config::Config;
pub use photos::{PhotoError, PhotoScope, PhotoService};
