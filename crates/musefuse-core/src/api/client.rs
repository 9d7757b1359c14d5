//! API client for communicating with the MuseFuse REST API.
//!
//! This module provides the `ApiClient` struct for the authentication
//! endpoints (register, login, token refresh) and the bearer-authenticated
//! photo endpoints (list, upload, delete).

use std::time::Duration;

use reqwest::{multipart, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::auth::Credentials;
use crate::config::Config;
use crate::models::{LoginResponse, MessageResponse, Photo, PhotosResponse, UploadReceipt};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Serialize)]
struct CredentialsBody<'a> {
    username: &'a str,
    password: &'a str,
}

impl<'a> From<&'a Credentials> for CredentialsBody<'a> {
    fn from(credentials: &'a Credentials) -> Self {
        Self {
            username: credentials.username(),
            password: credentials.password(),
        }
    }
}

/// API client for the MuseFuse backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client rooted at `base_url` (e.g. `http://host:5001/api/v1`)
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidBaseUrl(base_url));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::with_timeout(
            config.api_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ===== Authentication =====

    /// Create a new account
    pub async fn register(&self, credentials: &Credentials) -> Result<MessageResponse, ApiError> {
        let response = self
            .client
            .post(self.url("register"))
            .json(&CredentialsBody::from(credentials))
            .send()
            .await?;

        Self::read_envelope(response).await
    }

    /// Exchange credentials for a token.
    ///
    /// Backend rejections (`{"error": true, ...}` with 400/401) come back as a
    /// parsed `LoginResponse`, not as an `Err`.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        debug!(username = credentials.username(), "Sending login request");
        let response = self
            .client
            .post(self.url("login"))
            .json(&CredentialsBody::from(credentials))
            .send()
            .await?;

        Self::read_envelope(response).await
    }

    /// Exchange a still-valid token for a fresh one
    pub async fn refresh_token(&self, token: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .client
            .post(self.url("refresh-token"))
            .bearer_auth(token)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        Self::read_envelope(response).await
    }

    // ===== Photos =====

    /// Fetch every photo visible to the caller
    pub async fn fetch_photos(&self, token: &str) -> Result<Vec<Photo>, ApiError> {
        let response: PhotosResponse = self.get(&self.url("photos"), token).await?;
        Self::unwrap_photos(response)
    }

    /// Fetch only the caller's own photos
    pub async fn fetch_user_photos(&self, token: &str) -> Result<Vec<Photo>, ApiError> {
        let response: PhotosResponse = self.get(&self.url("photos/user"), token).await?;
        Self::unwrap_photos(response)
    }

    /// Upload a single image as the multipart field `file`
    pub async fn upload_photo(
        &self,
        token: &str,
        file_name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<UploadReceipt, ApiError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url("upload"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    /// Delete one of the caller's photos
    pub async fn delete_photo(&self, token: &str, filename: &str) -> Result<MessageResponse, ApiError> {
        let url = self.photo_url(filename);
        let response = self.client.delete(&url).bearer_auth(token).send().await?;

        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    // ===== Plumbing =====

    /// The filename becomes a single encoded path segment
    fn photo_url(&self, filename: &str) -> String {
        self.url(&format!("photos/{}", urlencoding::encode(filename)))
    }

    fn unwrap_photos(response: PhotosResponse) -> Result<Vec<Photo>, ApiError> {
        if response.error {
            return Err(ApiError::InvalidResponse(
                response
                    .message
                    .unwrap_or_else(|| "Photo listing failed".to_string()),
            ));
        }
        Ok(response.data)
    }

    /// Parse a `{error, ...}` envelope regardless of status code, falling back
    /// to status mapping when the body is not an envelope.
    async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<T>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) if status.is_success() => {
                Err(ApiError::InvalidResponse(format!("Unparseable body: {}", e)))
            }
            Err(_) => Err(ApiError::from_status(status, &body)),
        }
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self.client.get(url).bearer_auth(token).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response.json().await?),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }
}
