//! REST API client module for the MuseFuse backend.
//!
//! This module provides the `ApiClient` for registering, logging in,
//! refreshing tokens and managing photos.
//!
//! Protected endpoints use JWT bearer token authentication; the token is
//! owned by the session layer and passed in per call.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
