//! Attaches the current credential to outgoing calls and turns a refused
//! credential into a forced logout.

use reqwest::{Method, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::ClientResult,
    session::{Credential, SessionStore},
    transport::ApiTransport,
};

/// A request built by [`RequestAuthorizer::authorize`], remembering which
/// credential (if any) it carries.
#[derive(Debug)]
pub struct AuthorizedRequest {
    builder: RequestBuilder,
    credential: Option<Credential>,
}

impl AuthorizedRequest {
    /// Sets a JSON body.
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Self {
        Self {
            builder: self.builder.json(body),
            ..self
        }
    }

    /// Appends query parameters.
    #[must_use]
    pub fn query<T: Serialize + ?Sized>(self, query: &T) -> Self {
        Self {
            builder: self.builder.query(query),
            ..self
        }
    }

    /// Whether a bearer token was attached.
    #[must_use]
    pub const fn carries_credential(&self) -> bool {
        self.credential.is_some()
    }
}

/// Front door for every authorized backend call.
#[derive(Debug, Clone)]
pub struct RequestAuthorizer {
    transport: ApiTransport,
    session: Arc<SessionStore>,
}

impl RequestAuthorizer {
    /// Binds `transport` to `session`.
    #[must_use]
    pub fn new(transport: ApiTransport, session: Arc<SessionStore>) -> Self {
        Self { transport, session }
    }

    /// The store credentials are read from.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Builds a request for `path` carrying the credential held right now.
    #[must_use]
    pub fn authorize(&self, method: Method, path: &str) -> AuthorizedRequest {
        let credential = self.session.credential();
        let builder = self
            .transport
            .request(method, path, credential.as_ref().map(Credential::token));
        AuthorizedRequest {
            builder,
            credential,
        }
    }

    /// Sends `request`.
    ///
    /// A 401 on a request that carried a credential clears the session (once
    /// per credential generation) before the error is returned. A 401 on an
    /// anonymous request is returned without side effects.
    ///
    /// # Errors
    /// Forwards the transport's classification unchanged.
    pub async fn send(&self, request: AuthorizedRequest) -> ClientResult<Response> {
        let AuthorizedRequest {
            builder,
            credential,
        } = request;

        match self.transport.send(builder).await {
            Err(err) if err.is_credential_rejection() => {
                match &credential {
                    Some(credential) => {
                        self.session.reject_credential(credential);
                    }
                    None => debug!("401 on an anonymous request; session untouched"),
                }
                Err(err)
            }
            other => other,
        }
    }

    /// `GET path` decoded as JSON.
    ///
    /// # Errors
    /// See [`RequestAuthorizer::send`]; also [`crate::ClientError::Decode`].
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.fetch_json(self.authorize(Method::GET, path)).await
    }

    /// Sends a prepared `request` and decodes the JSON answer.
    ///
    /// # Errors
    /// See [`RequestAuthorizer::send`]; also [`crate::ClientError::Decode`].
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: AuthorizedRequest,
    ) -> ClientResult<T> {
        let response = self.send(request).await?;
        ApiTransport::json(response).await
    }

    /// Sends `body` as JSON and decodes the JSON answer.
    ///
    /// # Errors
    /// See [`RequestAuthorizer::send`]; also [`crate::ClientError::Decode`].
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(self.authorize(method, path).json(body)).await?;
        ApiTransport::json(response).await
    }

    /// `DELETE path`, ignoring any body.
    ///
    /// # Errors
    /// See [`RequestAuthorizer::send`].
    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.send(self.authorize(Method::DELETE, path)).await?;
        Ok(())
    }
}
