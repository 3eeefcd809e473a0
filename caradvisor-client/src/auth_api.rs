//! Remote auth endpoint, behind a trait so the session store can be driven by fakes.

use async_trait::async_trait;
use reqwest::Method;
use shared::models::{
    AuthResponse, LoginRequest, ProfileUpdateRequest, RegisterRequest, UserRecord,
};

use crate::{error::ClientResult, transport::ApiTransport};

/// Calls that create, confirm or change a session.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange email and password for a credential.
    ///
    /// # Errors
    /// Returns the backend's rejection or a transport failure.
    async fn login(&self, request: &LoginRequest) -> ClientResult<AuthResponse>;

    /// Create an account and sign in.
    ///
    /// # Errors
    /// Returns the backend's rejection or a transport failure.
    async fn register(&self, request: &RegisterRequest) -> ClientResult<AuthResponse>;

    /// Resolve the user owning `token` ("who am I").
    ///
    /// # Errors
    /// Returns the backend's rejection or a transport failure.
    async fn verify_self(&self, token: &str) -> ClientResult<UserRecord>;

    /// Change the profile of the user owning `token`.
    ///
    /// Returns the updated user when the backend echoes one.
    ///
    /// # Errors
    /// Returns the backend's rejection or a transport failure.
    async fn update_profile(
        &self,
        token: &str,
        request: &ProfileUpdateRequest,
    ) -> ClientResult<Option<UserRecord>>;

    /// Delete the account owning `token`.
    ///
    /// # Errors
    /// Returns the backend's rejection or a transport failure.
    async fn delete_account(&self, token: &str) -> ClientResult<()>;
}

/// [`AuthApi`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpAuthApi {
    transport: ApiTransport,
}

impl HttpAuthApi {
    /// Speaks through `transport`.
    #[must_use]
    pub fn new(transport: ApiTransport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: &LoginRequest) -> ClientResult<AuthResponse> {
        let builder = self
            .transport
            .request(Method::POST, "/auth/login", None)
            .json(request);
        let response = self.transport.send(builder).await?;
        ApiTransport::json(response).await
    }

    async fn register(&self, request: &RegisterRequest) -> ClientResult<AuthResponse> {
        let builder = self
            .transport
            .request(Method::POST, "/auth/register", None)
            .json(request);
        let response = self.transport.send(builder).await?;
        ApiTransport::json(response).await
    }

    async fn verify_self(&self, token: &str) -> ClientResult<UserRecord> {
        let builder = self.transport.request(Method::GET, "/auth/me", Some(token));
        let response = self.transport.send(builder).await?;
        ApiTransport::json(response).await
    }

    async fn update_profile(
        &self,
        token: &str,
        request: &ProfileUpdateRequest,
    ) -> ClientResult<Option<UserRecord>> {
        let builder = self
            .transport
            .request(Method::PUT, "/profile", Some(token))
            .json(request);
        let response = self.transport.send(builder).await?;

        // Some deployments answer with `{"success": true}` instead of the user.
        let echoed: ClientResult<serde_json::Value> = ApiTransport::json(response).await;
        Ok(echoed
            .ok()
            .and_then(|value| serde_json::from_value::<UserRecord>(value).ok()))
    }

    async fn delete_account(&self, token: &str) -> ClientResult<()> {
        let builder = self
            .transport
            .request(Method::DELETE, "/profile", Some(token));
        self.transport.send(builder).await?;
        Ok(())
    }
}
