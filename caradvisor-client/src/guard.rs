//! Gate in front of views that need a signed-in user.

use std::{fmt, sync::Arc};
use tracing::debug;

use crate::{
    navigation::{LOGIN_PATH, Navigator},
    session::SessionStore,
};

/// Placeholder shown while an unauthenticated mount is being verified.
pub const DEFAULT_FALLBACK: &str = "Redirecting...";

/// Where the guard renders.
pub trait GuardSink {
    /// Shows the placeholder.
    fn fallback(&mut self, placeholder: &str);
    /// Shows the protected content.
    fn children(&mut self);
}

/// What a mount ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
/// Protected content was shown.
    Rendered,
/// The user was sent to the login view.
    Redirected,
}

/// Shows protected content only to a signed-in user.
pub struct RouteGuard {
    session: Arc<SessionStore>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    fallback: Option<String>,
}

impl fmt::Debug for RouteGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteGuard")
            .field("login_path", &self.login_path)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl RouteGuard {
    /// Guard redirecting to [`LOGIN_PATH`] with the default placeholder.
    #[must_use]
    pub fn new(session: Arc<SessionStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            session,
            navigator,
            login_path: LOGIN_PATH.to_string(),
            fallback: None,
        }
    }

    /// Replaces the placeholder shown while verifying.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// Replaces the redirect target.
    #[must_use]
    pub fn with_login_path(mut self, login_path: impl Into<String>) -> Self {
        self.login_path = login_path.into();
        self
    }

    /// Runs the mount sequence against `sink`.
    ///
    /// Signed in: children right away. Otherwise the placeholder first, then
    /// exactly one verification, then children or a redirect to the login view.
    pub async fn mount<S: GuardSink + ?Sized>(&self, sink: &mut S) -> GuardOutcome {
        if self.session.is_authenticated() {
            sink.children();
            return GuardOutcome::Rendered;
        }

        sink.fallback(self.fallback.as_deref().unwrap_or(DEFAULT_FALLBACK));
        if self.session.verify().await {
            debug!("guard verification succeeded");
            sink.children();
            GuardOutcome::Rendered
        } else {
            debug!(path = %self.login_path, "guard redirecting to login");
            self.navigator.navigate(&self.login_path);
            GuardOutcome::Redirected
        }
    }
}
