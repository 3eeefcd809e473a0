//! HTTP plumbing shared by the auth endpoint and the request authorizer.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{config::Config, models::ErrorResponse};
use std::{borrow::Cow, time::Duration};
use tracing::debug;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Prefixes `path` with `prefix` unless it already starts with that segment.
///
/// Applying it twice yields the same path. `/api/v1x` does not count as
/// carrying `/api/v1`.
#[must_use]
pub fn normalize_path(prefix: &str, path: &str) -> String {
    let path: Cow<'_, str> = if path.starts_with('/') {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(format!("/{path}"))
    };
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.into_owned();
    }

    let carries_prefix = path
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'));
    if carries_prefix {
        path.into_owned()
    } else {
        format!("{prefix}{path}")
    }
}

/// Thin wrapper over a [`reqwest::Client`] that knows the backend origin and
/// API prefix and classifies responses.
///
/// It never holds a credential: callers pass one per request.
#[derive(Clone, Debug)]
pub struct ApiTransport {
    base_url: String,
    prefix: String,
    client: Client,
}

impl ApiTransport {
    /// Builds a transport for `base_url`.
    ///
    /// # Errors
    /// Returns [`ClientError::Setup`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &Url,
        prefix: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(ClientError::Setup)?;

        Ok(Self {
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            prefix: prefix.to_string(),
            client,
        })
    }

    /// Builds a transport from the `api` section of `config`.
    ///
    /// # Errors
    /// Returns [`ClientError::Setup`] if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> ClientResult<Self> {
        Self::new(
            &config.api.base_url,
            &config.api.prefix,
            config.timeout(),
            &config.api.user_agent,
        )
    }

    /// Absolute URL for `path`, with the API prefix applied once.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, normalize_path(&self.prefix, path))
    }

    /// Starts a request, attaching `credential` as a bearer token when given.
    #[must_use]
    pub fn request(&self, method: Method, path: &str, credential: Option<&str>) -> RequestBuilder {
        let url = self.url(path);
        debug!(%method, %url, authorized = credential.is_some(), "dispatching request");
        let builder = self.client.request(method, url);
        match credential {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends `builder` and classifies the outcome.
    ///
    /// 2xx passes through; 401 becomes [`ClientError::Unauthorized`]; any other
    /// status becomes [`ClientError::Rejected`] with the backend's reason; no
    /// response becomes [`ClientError::Transport`].
    ///
    /// # Errors
    /// See above.
    pub async fn send(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let response = builder.send().await.map_err(ClientError::Transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|error| error.reason());
        debug!(%status, reason = reason.as_deref().unwrap_or(""), "request rejected");

        if status == StatusCode::UNAUTHORIZED {
            Err(ClientError::Unauthorized { reason })
        } else {
            Err(ClientError::Rejected { status, reason })
        }
    }

    /// Decodes a JSON body.
    ///
    /// # Errors
    /// Returns [`ClientError::Decode`] when the body does not match `T`.
    pub async fn json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let bytes = response.bytes().await.map_err(ClientError::Transport)?;
        serde_json::from_slice(&bytes).map_err(|err| ClientError::Decode(err.to_string()))
    }
}
