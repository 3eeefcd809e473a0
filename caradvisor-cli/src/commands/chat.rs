use anyhow::{Context, Result};
use clap::Args;
use client::ChatSession;
use shared::models::{ChatMessage, ChatSessionSummary};
use std::io::{self, BufRead, Write};

use super::{Remote, explain, require_session};

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Question for the assistant; starts an interactive conversation when omitted
    pub message: Vec<String>,

    /// Continue a stored conversation
    #[arg(long, value_name = "ID")]
    pub resume: Option<i64>,

    /// List stored conversations and exit
    #[arg(long, conflicts_with_all = ["message", "resume"])]
    pub sessions: bool,
}

/// Asks one question, or runs a conversation on stdin until `/exit` or EOF.
///
/// # Errors
/// Returns an error without a valid session, or when a one-shot question fails.
pub async fn run(remote: &Remote, args: ChatArgs) -> Result<()> {
    require_session(remote).await?;
    let mut chat = remote.app.chat();

    if args.sessions {
        let sessions = chat.sessions().await.map_err(explain)?;
        if sessions.is_empty() {
            println!("No stored conversations.");
        }
        for session in &sessions {
            println!("{}", session_line(session));
        }
        return Ok(());
    }

    if let Some(id) = args.resume {
        chat.resume(id)
            .await
            .map_err(explain)
            .with_context(|| format!("failed to resume conversation {id}"))?;
        if args.message.is_empty() {
            for message in chat.messages() {
                print_message(message);
            }
            println!("(type /reset to start over, /exit to quit)");
            return interactive(remote, &mut chat).await;
        }
    }

    if !args.message.is_empty() {
        let reply = chat.send(&args.message.join(" ")).await.map_err(explain)?;
        println!("{}", reply.content);
        return Ok(());
    }

    print_message(&chat.messages()[0]);
    println!("(type /reset to start over, /exit to quit)");
    interactive(remote, &mut chat).await
}

async fn interactive(remote: &Remote, chat: &mut ChatSession) -> Result<()> {
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        match line.trim() {
            "" => {}
            "/exit" | "/quit" => return Ok(()),
            "/reset" => {
                chat.reset();
                print_message(&chat.messages()[0]);
            }
            message => {
                let sent = chat.send(message).await.map(print_message);
                if let Err(err) = sent {
                    if err.is_credential_rejection() {
                        return Err(explain(err));
                    }
                    eprintln!("error: {}", chat.error().unwrap_or("Failed to send message"));
                }
            }
        }
        if !remote.app.session().is_authenticated() {
            return Ok(());
        }
    }
}

fn print_message(message: &ChatMessage) {
    println!(
        "[{}] {}: {}",
        message.timestamp.format("%H:%M"),
        message.role.as_str(),
        message.content
    );
}

fn session_line(session: &ChatSessionSummary) -> String {
    let updated = session
        .updated_at
        .or(session.created_at)
        .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string());
    format!(
        "{:>5}  {updated}  {}",
        session.id,
        session.title.as_deref().unwrap_or("(untitled)")
    )
}
