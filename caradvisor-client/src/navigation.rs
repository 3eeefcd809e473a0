//! Bridges auth events to whatever shows views to the user.

use std::sync::Arc;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, warn};

use crate::session::{AuthEvent, SessionStore};

/// Route of the login view.
pub const LOGIN_PATH: &str = "/auth/login";

/// Moves the user to another view.
pub trait Navigator: Send + Sync {
/// Shows the view at `path`.
    fn navigate(&self, path: &str);
}

/// Sends the user to `login_path` every time the backend rejects the held
/// credential.
///
/// The task ends when the store is dropped.
pub fn spawn_rejection_redirect(
    session: &SessionStore,
    navigator: Arc<dyn Navigator>,
    login_path: impl Into<String>,
) -> JoinHandle<()> {
    let mut events = session.events();
    let login_path = login_path.into();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(AuthEvent::CredentialRejected) => {
                    debug!(path = %login_path, "redirecting after credential rejection");
                    navigator.navigate(&login_path);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "auth event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
