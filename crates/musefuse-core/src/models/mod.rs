//! Data models for MuseFuse entities.
//!
//! - `LoginResponse`, `MessageResponse`: authentication envelopes
//! - `Photo`, `PhotosResponse`, `UploadReceipt`: gallery and upload payloads
//! - `Page`: client-side pagination over a photo listing

pub mod auth;
pub mod photo;

pub use auth::{LoginResponse, MessageResponse};
pub use photo::{Page, Photo, PhotosResponse, UploadReceipt};
