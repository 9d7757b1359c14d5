use async_trait::async_trait;

use crate::api::{ApiClient, ApiError};
use crate::models::LoginResponse;

use super::credentials::Credentials;

/// The remote endpoints the session store depends on.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;
    async fn refresh(&self, token: &str) -> Result<LoginResponse, ApiError>;
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        ApiClient::login(self, credentials).await
    }

    async fn refresh(&self, token: &str) -> Result<LoginResponse, ApiError> {
        self.refresh_token(token).await
    }
}
