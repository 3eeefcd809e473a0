//! Process-wide authentication state.
//!
//! [`SessionStore`] is the only writer of the session. Every terminal
//! transition (sign-in, logout, forced logout, failed verification) bumps a
//! generation counter; network-bound operations remember the generation they
//! started under and drop their result if it moved in the meantime. Profile
//! edits bump a separate revision so a slower verification cannot overwrite a
//! newer user record.

use shared::models::{
    AuthResponse, LoginRequest, ProfileUpdateRequest, RegisterRequest, UserId, UserRecord,
};
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::{
    auth_api::AuthApi,
    error::{ClientError, ClientResult},
    persistence::{CredentialStore, PersistedSession},
};

const EVENT_CAPACITY: usize = 16;

/// Coarse lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStatus {
    /// Nothing is in flight and no user is signed in.
    #[default]
    Anonymous,
    /// A sign-in, verification or profile call is in flight.
    Authenticating,
    /// Credential and user are both held.
    Authenticated,
}

/// Read-only snapshot of the session.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    user: Option<UserRecord>,
    in_flight: bool,
}

impl Session {
    /// The signed-in user, if known.
    #[must_use]
    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    /// True iff both a credential and a user are held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    /// True when a credential is held, with or without a user.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.token.is_some()
    }

    /// Derived lifecycle state; in-flight work wins over the stored flags.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        if self.in_flight {
            SessionStatus::Authenticating
        } else if self.is_authenticated() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Anonymous
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("has_credential", &self.has_credential())
            .field("user", &self.user)
            .field("status", &self.status())
            .finish()
    }
}

/// Notifications for collaborators outside the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A sign-in or registration established a new session.
    LoggedIn {
        /// Who signed in.
        user_id: UserId,
    },
    /// The user signed out.
    LoggedOut,
    /// The backend refused the credential on an authorized call; the session
    /// has been cleared and the UI should show the login view.
    CredentialRejected,
    /// A verification attempt failed and cleared the session.
    VerificationFailed,
    /// The signed-in user's name or email changed.
    ProfileUpdated,
    /// The account was deleted and the session cleared.
    AccountDeleted,
}

/// Bearer token read at request time, tagged with the generation it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    generation: u64,
}

impl Credential {
    /// Raw bearer token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Session generation the token was read under.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("generation", &self.generation)
            .finish()
    }
}

#[derive(Default)]
struct SessionState {
    token: Option<String>,
    user: Option<UserRecord>,
    generation: u64,
    revision: u64,
    in_flight: usize,
}

impl SessionState {
    fn snapshot(&self) -> Session {
        Session {
            token: self.token.clone(),
            user: self.user.clone(),
            in_flight: self.in_flight > 0,
        }
    }

    fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    fn credential(&self) -> Option<Credential> {
        self.token.clone().map(|token| Credential {
            token,
            generation: self.generation,
        })
    }

    fn persisted(&self) -> Option<PersistedSession> {
        self.token.clone().map(|token| PersistedSession {
            token,
            user: self.user.clone(),
        })
    }

    /// Drops credential and user and starts a new generation. Returns whether
    /// anything was held.
    fn clear(&mut self) -> bool {
        let had_session = self.token.is_some() || self.user.is_some();
        self.token = None;
        self.user = None;
        self.generation += 1;
        had_session
    }
}

/// Marks an operation as in flight until finished or dropped.
struct InFlight<'a> {
    store: &'a SessionStore,
    done: bool,
}

impl InFlight<'_> {
    fn finish(mut self, state: &mut SessionState) {
        state.in_flight = state.in_flight.saturating_sub(1);
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            let mut state = self.store.state();
            state.in_flight = state.in_flight.saturating_sub(1);
            self.store.publish(&state);
        }
    }
}

/// Single source of truth for authentication state.
pub struct SessionStore {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn CredentialStore>,
    state: Mutex<SessionState>,
    changes: watch::Sender<Session>,
    events: broadcast::Sender<AuthEvent>,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Creates a store, rehydrating from `storage` before returning.
    ///
    /// An unreadable stored session is logged and treated as absent.
    pub fn new(api: Arc<dyn AuthApi>, storage: Arc<dyn CredentialStore>) -> Self {
        let mut state = SessionState::default();
        match storage.read() {
            Ok(Some(persisted)) => {
                state.token = Some(persisted.token);
                state.user = persisted.user;
                debug!(
                    authenticated = state.is_authenticated(),
                    "session rehydrated from storage"
                );
            }
            Ok(None) => debug!("no stored session"),
            Err(err) => warn!(error = %err, "ignoring unreadable stored session"),
        }

        let (changes, _) = watch::channel(state.snapshot());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            api,
            storage,
            state: Mutex::new(state),
            changes,
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.changes.send_replace(state.snapshot());
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine.
        self.events.send(event).ok();
    }

    fn track(&self, state: &mut SessionState) -> InFlight<'_> {
        state.in_flight += 1;
        self.publish(state);
        InFlight {
            store: self,
            done: false,
        }
    }

    fn persist(&self, state: &SessionState) {
        let result = match state.persisted() {
            Some(persisted) => self.storage.write(&persisted),
            None => self.storage.clear(),
        };
        if let Err(err) = result {
            warn!(error = %err, "failed to persist session");
        }
    }

    fn clear_storage(&self) {
        if let Err(err) = self.storage.clear() {
            warn!(error = %err, "failed to clear stored session");
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state().snapshot()
    }

    /// True iff both a credential and a user are held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// The credential to attach to a request issued now, if any.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.state().credential()
    }

    /// Receives every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.changes.subscribe()
    }

    /// Receives auth events emitted after subscribing.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Signs in with email and password.
    ///
    /// # Errors
    /// [`ClientError::Rejected`] with the backend's reason (or "Login failed"),
    /// [`ClientError::Transport`], or [`ClientError::Superseded`] if a logout
    /// landed while the call was in flight.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<UserRecord> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ClientError::InvalidInput(
                "email and password are required".to_string(),
            ));
        }
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let (flight, generation) = self.begin();
        match self.api.login(&request).await {
            Ok(auth) => self.establish(flight, generation, auth, "login"),
            Err(err) => {
                drop(flight);
                warn!(error = %err, "login failed");
                Err(err.into_input_rejection().with_fallback("Login failed"))
            }
        }
    }

    /// Creates an account and signs in.
    ///
    /// # Errors
    /// As for [`SessionStore::login`], with "Registration failed" as fallback.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> ClientResult<UserRecord> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ClientError::InvalidInput(
                "email and password are required".to_string(),
            ));
        }
        let request = RegisterRequest {
            name: name.trim().to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };

        let (flight, generation) = self.begin();
        match self.api.register(&request).await {
            Ok(auth) => self.establish(flight, generation, auth, "register"),
            Err(err) => {
                drop(flight);
                warn!(error = %err, "registration failed");
                Err(err
                    .into_input_rejection()
                    .with_fallback("Registration failed"))
            }
        }
    }

    fn begin(&self) -> (InFlight<'_>, u64) {
        let mut state = self.state();
        let flight = self.track(&mut state);
        (flight, state.generation)
    }

    fn establish(
        &self,
        flight: InFlight<'_>,
        generation: u64,
        auth: AuthResponse,
        action: &'static str,
    ) -> ClientResult<UserRecord> {
        let mut state = self.state();
        flight.finish(&mut state);
        if state.generation != generation {
            self.publish(&state);
            debug!(action, "discarding superseded sign-in result");
            return Err(ClientError::Superseded);
        }

        state.token = Some(auth.access_token);
        state.user = Some(auth.user.clone());
        state.generation += 1;
        self.persist(&state);
        self.publish(&state);
        drop(state);

        info!(action, user_id = %auth.user.id, "session established");
        self.emit(AuthEvent::LoggedIn {
            user_id: auth.user.id.clone(),
        });
        Ok(auth.user)
    }

    /// Clears the session and its stored copy. Safe to call repeatedly.
    ///
    /// Any call still in flight when this runs will have its result discarded.
    pub fn logout(&self) {
        let mut state = self.state();
        let had_session = state.clear();
        self.clear_storage();
        self.publish(&state);
        drop(state);

        if had_session {
            info!("signed out");
            self.emit(AuthEvent::LoggedOut);
        } else {
            debug!("logout without an active session");
        }
    }

    /// Confirms the held credential with the backend.
    ///
    /// Returns `false` without a network call when no credential is held.
    /// On success the user is refreshed; on any failure, transport failures
    /// included, the session is cleared. A result that arrives after a newer
    /// terminal transition is discarded and the current authentication flag is
    /// returned instead; a success racing a profile edit keeps the edited user.
    pub async fn verify(&self) -> bool {
        let (token, generation, revision, flight) = {
            let mut state = self.state();
            let Some(token) = state.token.clone() else {
                debug!("no credential held; skipping verification");
                return false;
            };
            let flight = self.track(&mut state);
            (token, state.generation, state.revision, flight)
        };

        let outcome = self.api.verify_self(&token).await;

        let mut state = self.state();
        flight.finish(&mut state);
        if state.generation != generation {
            self.publish(&state);
            debug!("discarding stale verification result");
            return state.is_authenticated();
        }

        match outcome {
            Ok(_) if state.revision != revision && state.user.is_some() => {
                self.publish(&state);
                debug!("credential verified; keeping newer profile");
                true
            }
            Ok(user) => {
                state.user = Some(user);
                self.persist(&state);
                self.publish(&state);
                debug!("credential verified");
                true
            }
            Err(err) => {
                state.clear();
                self.clear_storage();
                self.publish(&state);
                drop(state);
                warn!(error = %err, "verification failed; session cleared");
                self.emit(AuthEvent::VerificationFailed);
                false
            }
        }
    }

    /// Updates the signed-in user's name and email.
    ///
    /// # Errors
    /// [`ClientError::NotAuthenticated`] without a session;
    /// [`ClientError::Rejected`] when the backend refuses the edit (session
    /// untouched); [`ClientError::Unauthorized`] after a forced logout when the
    /// credential itself is refused; [`ClientError::Transport`];
    /// [`ClientError::Superseded`].
    pub async fn update_profile(&self, name: &str, email: &str) -> ClientResult<UserRecord> {
        let request = ProfileUpdateRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
        };

        let (credential, flight) = self.begin_authorized()?;

        match self.api.update_profile(credential.token(), &request).await {
            Ok(echoed) => {
                let mut state = self.state();
                flight.finish(&mut state);
                if state.generation != credential.generation() {
                    self.publish(&state);
                    debug!("discarding superseded profile update");
                    return Err(ClientError::Superseded);
                }
                let Some(current) = state.user.as_ref() else {
                    self.publish(&state);
                    return Err(ClientError::NotAuthenticated);
                };

                let updated =
                    echoed.unwrap_or_else(|| current.with_profile(&request.name, &request.email));
                state.user = Some(updated.clone());
                state.revision += 1;
                self.persist(&state);
                self.publish(&state);
                drop(state);

                info!(user_id = %updated.id, "profile updated");
                self.emit(AuthEvent::ProfileUpdated);
                Ok(updated)
            }
            Err(err) if err.is_credential_rejection() => {
                drop(flight);
                self.reject_credential(&credential);
                Err(err)
            }
            Err(err) => {
                drop(flight);
                warn!(error = %err, "profile update failed");
                Err(err.with_fallback("Failed to update profile"))
            }
        }
    }

    /// Deletes the signed-in account, then signs out.
    ///
    /// A deletion confirmed after the session already moved on leaves the
    /// newer session alone.
    ///
    /// # Errors
    /// [`ClientError::NotAuthenticated`] without a session;
    /// [`ClientError::Unauthorized`] after a forced logout when the credential
    /// itself is refused; [`ClientError::Rejected`] or
    /// [`ClientError::Transport`] with the session untouched.
    pub async fn delete_account(&self) -> ClientResult<()> {
        let (credential, flight) = self.begin_authorized()?;

        match self.api.delete_account(credential.token()).await {
            Ok(()) => {
                let mut state = self.state();
                flight.finish(&mut state);
                if state.generation != credential.generation() {
                    self.publish(&state);
                    debug!("account deleted after the session moved on");
                    return Ok(());
                }
                state.clear();
                self.clear_storage();
                self.publish(&state);
                drop(state);

                info!("account deleted; signed out");
                self.emit(AuthEvent::AccountDeleted);
                Ok(())
            }
            Err(err) if err.is_credential_rejection() => {
                drop(flight);
                self.reject_credential(&credential);
                Err(err)
            }
            Err(err) => {
                drop(flight);
                warn!(error = %err, "account deletion failed");
                Err(err.with_fallback("Failed to delete account"))
            }
        }
    }

    fn begin_authorized(&self) -> ClientResult<(Credential, InFlight<'_>)> {
        let mut state = self.state();
        if !state.is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }
        let Some(credential) = state.credential() else {
            return Err(ClientError::NotAuthenticated);
        };
        let flight = self.track(&mut state);
        Ok((credential, flight))
    }

    /// Forced logout after the backend refused `credential`.
    ///
    /// Runs at most once per credential generation: concurrent rejections of
    /// the same credential, or a rejection arriving after the session already
    /// moved on, are no-ops. Returns whether this call cleared the session.
    pub fn reject_credential(&self, credential: &Credential) -> bool {
        let mut state = self.state();
        if state.generation != credential.generation() || state.token.is_none() {
            debug!(
                rejected = credential.generation(),
                current = state.generation,
                "credential rejection already handled"
            );
            return false;
        }

        state.clear();
        self.clear_storage();
        self.publish(&state);
        drop(state);

        warn!("credential rejected by backend; session cleared");
        self.emit(AuthEvent::CredentialRejected);
        true
    }

    /// Drops in-memory state without touching storage or emitting events.
    pub fn reset(&self) {
        let mut state = self.state();
        state.clear();
        self.publish(&state);
    }
}
