//! Authenticated photo operations.
//!
//! `PhotoService` reads the bearer token from the session before every call
//! and logs the session out when the backend rejects it.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::SessionManager;
use crate::models::{Page, Photo, UploadReceipt};

/// Extensions accepted for upload, with the MIME type sent for each
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("heic", "image/heic"),
    ("heif", "image/heif"),
];

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Session rejected by server - please log in again")]
    SessionRejected,

    #[error("{message}")]
    Rejected { message: String },

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Api(ApiError),
}

/// Which listing to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhotoScope {
    #[default]
    All,
    Mine,
}

/// Files accepted and skipped when staging an upload batch.
#[derive(Debug, Default)]
pub struct StagedUpload {
    pub accepted: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

impl StagedUpload {
    /// Split `paths` into uploadable images and everything else
    pub fn stage<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut staged = Self::default();
        for path in paths {
            let path = path.into();
            if mime_for(&path).is_some() {
                staged.accepted.push(path);
            } else {
                staged.skipped.push(path);
            }
        }
        staged
    }
}

/// Outcome of a sequential batch upload. Stops at the first failure.
#[derive(Debug, Default)]
pub struct BatchUpload {
    pub uploaded: Vec<UploadReceipt>,
    pub failed: Option<(PathBuf, PhotoError)>,
    /// Files never attempted because an earlier one failed
    pub remaining: Vec<PathBuf>,
}

pub fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

#[derive(Clone)]
pub struct PhotoService {
    api: ApiClient,
    session: SessionManager,
}

impl PhotoService {
    pub fn new(api: ApiClient, session: SessionManager) -> Self {
        Self { api, session }
    }

    fn token(&self) -> Result<String, PhotoError> {
        self.session.current_token().ok_or(PhotoError::NotLoggedIn)
    }

    /// Map API errors, ending the session on 401.
    fn check(&self, error: ApiError) -> PhotoError {
        if error.is_unauthorized() {
            warn!("Server rejected session token, logging out");
            self.session.logout();
            return PhotoError::SessionRejected;
        }
        PhotoError::Api(error)
    }

    pub async fn list(&self, scope: PhotoScope) -> Result<Vec<Photo>, PhotoError> {
        let token = self.token()?;
        let result = match scope {
            PhotoScope::All => self.api.fetch_photos(&token).await,
            PhotoScope::Mine => self.api.fetch_user_photos(&token).await,
        };
        let photos = result.map_err(|e| self.check(e))?;
        debug!(count = photos.len(), ?scope, "Fetched photos");
        Ok(photos)
    }

    pub async fn page(
        &self,
        scope: PhotoScope,
        page: usize,
        per_page: usize,
    ) -> Result<Page<Photo>, PhotoError> {
        let photos = self.list(scope).await?;
        Ok(Page::from_items(photos, page, per_page))
    }

    pub async fn upload(&self, path: &Path) -> Result<UploadReceipt, PhotoError> {
        let mime = mime_for(path).ok_or_else(|| PhotoError::UnsupportedFile(path.to_path_buf()))?;
        let token = self.token()?;

        let bytes = tokio::fs::read(path).await.map_err(|source| PhotoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let receipt = self
            .api
            .upload_photo(&token, &file_name, bytes, mime)
            .await
            .map_err(|e| self.check(e))?;

        if receipt.error {
            return Err(PhotoError::Rejected {
                message: receipt
                    .message
                    .unwrap_or_else(|| "Upload failed".to_string()),
            });
        }
        info!(file = %file_name, "Uploaded photo");
        Ok(receipt)
    }

    /// Upload files one at a time, stopping at the first failure.
    pub async fn upload_many(&self, paths: Vec<PathBuf>) -> BatchUpload {
        let mut batch = BatchUpload::default();
        let mut queue = paths.into_iter();

        while let Some(path) = queue.next() {
            match self.upload(&path).await {
                Ok(receipt) => batch.uploaded.push(receipt),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Upload failed");
                    batch.failed = Some((path, e));
                    batch.remaining = queue.collect();
                    break;
                }
            }
        }
        batch
    }

    pub async fn delete(&self, filename: &str) -> Result<(), PhotoError> {
        let token = self.token()?;
        let response = self
            .api
            .delete_photo(&token, filename)
            .await
            .map_err(|e| self.check(e))?;

        if response.error {
            return Err(PhotoError::Rejected {
                message: response
                    .message
                    .unwrap_or_else(|| "Delete failed".to_string()),
            });
        }
        info!(file = filename, "Deleted photo");
        Ok(())
    }
}
