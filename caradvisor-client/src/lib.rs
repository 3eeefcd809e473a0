//! Client-side session and request authorization for the CarAdvisor backend.
//!
//! [`SessionStore`] owns who is signed in. [`RequestAuthorizer`] attaches the
//! held credential to every backend call and clears the session when the
//! backend refuses it. [`RouteGuard`] keeps protected views behind a
//! verification step.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod auth_api;
pub mod authorizer;
pub mod cars;
pub mod chat;
pub mod error;
pub mod guard;
pub mod navigation;
pub mod persistence;
pub mod session;
pub mod transport;

pub use app::AppContext;
pub use auth_api::{AuthApi, HttpAuthApi};
pub use authorizer::{AuthorizedRequest, RequestAuthorizer};
pub use cars::CarsApi;
pub use chat::{ChatSession, GREETING};
pub use error::{ClientError, ClientResult};
pub use guard::{DEFAULT_FALLBACK, GuardOutcome, GuardSink, RouteGuard};
pub use navigation::{LOGIN_PATH, Navigator, spawn_rejection_redirect};
pub use persistence::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, PersistedSession,
    PersistenceError,
};
pub use session::{AuthEvent, Credential, Session, SessionStatus, SessionStore};
pub use transport::{ApiTransport, normalize_path};
