//! Subcommand implementations.

use anyhow::{Context, Result, anyhow};
use client::{AppContext, ClientError, FileCredentialStore, GuardOutcome, GuardSink, Navigator};
use shared::config::Config;
use std::{path::PathBuf, sync::Arc};
use tracing::debug;
use url::Url;

pub mod cars;
pub mod chat;
pub mod completion;
pub mod config;
pub mod session;

const LOGIN_HINT: &str = "run `caradvisor session login` to sign in";

/// A configured client bound to the on-disk session for its backend.
#[derive(Debug)]
pub struct Remote {
    pub app: AppContext,
    pub session_path: PathBuf,
}

/// Loads configuration, installs logging and rehydrates the stored session.
///
/// # Errors
/// Returns an error if the configuration is invalid or the HTTP client cannot
/// be built.
pub fn connect(config_path: Option<PathBuf>, server: Option<Url>) -> Result<Remote> {
    let config = Config::load_config(config_path, server).context("failed to load configuration")?;
    crate::logging::initialize_tracing(&config.logging);

    let session_path = config.session_path();
    debug!(path = %session_path.display(), api = %config.api.base_url, "using session file");
    let storage = Arc::new(FileCredentialStore::new(&session_path));
    let app = AppContext::new(&config, storage).context("failed to initialise client")?;
    Ok(Remote { app, session_path })
}

/// The terminal's login view: a pointer to `session login`.
#[derive(Debug, Default)]
struct LoginHint;

impl Navigator for LoginHint {
    fn navigate(&self, _path: &str) {
        eprintln!("Not signed in; {LOGIN_HINT}.");
    }
}

/// Shows the guard placeholder on stderr.
#[derive(Debug, Default)]
struct TerminalSink;

impl GuardSink for TerminalSink {
    fn fallback(&mut self, placeholder: &str) {
        eprintln!("{placeholder}");
    }

    fn children(&mut self) {}
}

/// Runs the route guard in front of a protected command.
///
/// # Errors
/// Returns an error when no valid session can be established.
pub async fn require_session(remote: &Remote) -> Result<()> {
    let guard = remote
        .app
        .guard(Arc::new(LoginHint))
        .with_fallback("Checking session...");
    match guard.mount(&mut TerminalSink).await {
        GuardOutcome::Rendered => Ok(()),
        GuardOutcome::Redirected => Err(anyhow!("authentication required")),
    }
}

/// Adds a sign-in hint to credential rejections.
pub fn explain(err: ClientError) -> anyhow::Error {
    if err.is_credential_rejection() {
        anyhow!(err).context(format!("session expired; {LOGIN_HINT} again"))
    } else {
        anyhow!(err)
    }
}
