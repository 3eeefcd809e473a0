//! Wires the transport, session store and authorized clients for one backend.

use shared::config::Config;
use std::sync::Arc;

use crate::{
    auth_api::HttpAuthApi,
    authorizer::RequestAuthorizer,
    cars::CarsApi,
    chat::ChatSession,
    error::ClientResult,
    guard::RouteGuard,
    navigation::Navigator,
    persistence::CredentialStore,
    session::SessionStore,
    transport::ApiTransport,
};

/// Everything a front end needs to talk to one backend.
#[derive(Debug, Clone)]
pub struct AppContext {
    session: Arc<SessionStore>,
    authorizer: RequestAuthorizer,
}

impl AppContext {
    /// Builds the context, rehydrating the session from `storage`.
    ///
    /// # Errors
    /// Returns [`crate::ClientError::Setup`] if the HTTP client cannot be built.
    pub fn new(config: &Config, storage: Arc<dyn CredentialStore>) -> ClientResult<Self> {
        let transport = ApiTransport::from_config(config)?;
        let api = Arc::new(HttpAuthApi::new(transport.clone()));
        let session = Arc::new(SessionStore::new(api, storage));
        let authorizer = RequestAuthorizer::new(transport, session.clone());
        Ok(Self {
            session,
            authorizer,
        })
    }

    /// The shared session store.
    #[must_use]
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Authorizer bound to the session store.
    #[must_use]
    pub fn authorizer(&self) -> &RequestAuthorizer {
        &self.authorizer
    }

    /// Catalog calls.
    #[must_use]
    pub fn cars(&self) -> CarsApi {
        CarsApi::new(self.authorizer.clone())
    }

    /// A fresh conversation.
    #[must_use]
    pub fn chat(&self) -> ChatSession {
        ChatSession::new(self.authorizer.clone())
    }

    /// Route guard sending unauthenticated users through `navigator`.
    #[must_use]
    pub fn guard(&self, navigator: Arc<dyn Navigator>) -> RouteGuard {
        RouteGuard::new(self.session.clone(), navigator)
    }
}
