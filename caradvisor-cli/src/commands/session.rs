use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use rpassword::prompt_password;
use shared::models::UserRecord;
use std::{
    io::{self, Write},
    path::Path,
};

use super::{Remote, explain};

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Sign in with email and password
    Login(LoginArgs),
    /// Create an account and sign in
    Register(RegisterArgs),
    /// Confirm the stored session with the backend and show the account
    Me,
    /// Sign out and forget the stored session
    Logout,
    /// Change the account's name or email
    Profile(ProfileArgs),
    /// Permanently delete the account and sign out
    DeleteAccount {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email; prompted for when omitted
    #[arg(long, short)]
    pub email: Option<String>,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Display name; prompted for when omitted
    #[arg(long, short)]
    pub name: Option<String>,

    /// Account email; prompted for when omitted
    #[arg(long, short)]
    pub email: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    /// New display name
    #[arg(long, short)]
    pub name: Option<String>,

    /// New email address
    #[arg(long, short)]
    pub email: Option<String>,
}

/// Runs a `session` subcommand.
///
/// # Errors
/// Returns an error when the backend rejects the request or cannot be reached.
pub async fn run(remote: &Remote, command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::Login(args) => login(remote, args).await,
        SessionCommand::Register(args) => register(remote, args).await,
        SessionCommand::Me => me(remote).await,
        SessionCommand::Logout => {
            logout(remote);
            Ok(())
        }
        SessionCommand::Profile(args) => profile(remote, args).await,
        SessionCommand::DeleteAccount { yes } => delete_account(remote, yes).await,
    }
}

async fn login(remote: &Remote, args: LoginArgs) -> Result<()> {
    let email = match args.email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = prompt_password("Password: ")?;
    if password.trim().is_empty() {
        bail!("password must not be empty");
    }

    let user = remote
        .app
        .session()
        .login(&email, &password)
        .await
        .context("login failed")?;
    print_session_summary(&user, &remote.session_path);
    Ok(())
}

async fn register(remote: &Remote, args: RegisterArgs) -> Result<()> {
    let name = match args.name {
        Some(name) => name,
        None => prompt("Name: ")?,
    };
    let email = match args.email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = prompt_password("Password: ")?;
    let confirmation = prompt_password("Confirm password: ")?;
    if password != confirmation {
        bail!("passwords do not match");
    }
    if password.trim().is_empty() {
        bail!("password must not be empty");
    }

    let user = remote
        .app
        .session()
        .register(&name, &email, &password)
        .await
        .context("registration failed")?;
    print_session_summary(&user, &remote.session_path);
    Ok(())
}

async fn me(remote: &Remote) -> Result<()> {
    let session = remote.app.session();
    if !session.snapshot().has_credential() {
        bail!(
            "no active session found at {}; run `caradvisor session login` first",
            remote.session_path.display()
        );
    }
    if !session.verify().await {
        bail!("session expired. run `caradvisor session login` to sign in again");
    }

    match session.snapshot().user() {
        Some(user) => print_session_summary(user, &remote.session_path),
        None => bail!("backend returned no user for this session"),
    }
    Ok(())
}

fn logout(remote: &Remote) {
    let session = remote.app.session();
    let had_session = session.snapshot().has_credential();
    session.logout();
    if had_session {
        println!("Signed out; removed session at {}", remote.session_path.display());
    } else {
        println!("No active session at {}", remote.session_path.display());
    }
}

async fn profile(remote: &Remote, args: ProfileArgs) -> Result<()> {
    if args.name.is_none() && args.email.is_none() {
        bail!("nothing to change; pass --name and/or --email");
    }
    let session = remote.app.session();
    let Some(current) = session.snapshot().user().cloned() else {
        bail!("no active session found; run `caradvisor session login` first");
    };

    let name = args.name.unwrap_or(current.name);
    let email = args.email.unwrap_or(current.email);
    let updated = session
        .update_profile(&name, &email)
        .await
        .map_err(explain)
        .context("failed to update profile")?;
    println!("Profile updated.");
    print_session_summary(&updated, &remote.session_path);
    Ok(())
}

async fn delete_account(remote: &Remote, confirmed: bool) -> Result<()> {
    let session = remote.app.session();
    let Some(user) = session.snapshot().user().cloned() else {
        bail!("no active session found; run `caradvisor session login` first");
    };
    if !confirmed {
        let answer = prompt(&format!(
            "Delete account {} permanently? Type the email to confirm: ",
            user.email
        ))?;
        if answer != user.email {
            bail!("confirmation did not match; account kept");
        }
    }

    session
        .delete_account()
        .await
        .map_err(explain)
        .context("failed to delete account")?;
    println!(
        "Deleted account {}; removed session at {}",
        user.email,
        remote.session_path.display()
    );
    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush().ok();
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim().to_string();
    if trimmed.is_empty() {
        bail!("input must not be empty");
    }
    Ok(trimmed)
}

fn print_session_summary(user: &UserRecord, session_path: &Path) {
    println!("Logged in as {}", user.email);
    if !user.name.is_empty() {
        println!("name: {}", user.name);
    }
    println!("user id: {}", user.id);
    println!("session stored at {}", session_path.display());
}
