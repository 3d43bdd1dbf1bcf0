//! `chatcore chat` — interactive REPL command.
//!
//! Opens a readline-based loop that sends each line as a user message and
//! prints the assistant's reply. A background task subscribes to the
//! session's realtime events so tool activity prints inline while a turn
//! is in flight.

use std::sync::Arc;

use chatcore_domain::config::Config;
use chatcore_orchestrator::{Event, ToolStatus};

use crate::bootstrap;
use crate::facade::ChatFacade;

/// Run the interactive chat REPL.
pub async fn chat(
    config: Arc<Config>,
    mut session_id: String,
    mut model: Option<String>,
    provider: Option<String>,
) -> anyhow::Result<()> {
    // 1. Boot the facade.
    let facade = bootstrap::build_facade(config).await?;

    // 2. Spawn background housekeeping (chat is long-lived).
    bootstrap::spawn_background_tasks(facade.clone());

    // 3. Make sure the session exists so the first realtime subscription
    //    isn't racing its creation.
    if facade.get_session(&session_id).is_err() {
        let session = facade.create_session(None, None, provider.clone(), model.clone(), Some(session_id.clone()))?;
        session_id = session.id;
    }

    // 4. Initialize rustyline editor with persistent history.
    let history_path = dirs::home_dir().unwrap_or_default().join(".chatcore").join("chat_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    eprintln!("chatcore interactive chat");
    eprintln!("Session: {session_id}  |  Type /help for commands, Ctrl+D to exit");
    eprintln!();

    // 5. REPL loop.
    loop {
        let readline = rl.readline("you> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                rl.add_history_entry(&line).ok();

                if trimmed.starts_with('/') {
                    if handle_slash_command(&facade, trimmed, &mut session_id, &mut model) {
                        break;
                    }
                    continue;
                }

                if let Err(e) = send_message(&facade, &session_id, provider.clone(), model.clone(), trimmed).await {
                    eprintln!("\x1B[31merror: {e}\x1B[0m");
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(Use Ctrl+D or /exit to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                break;
            }
            Err(e) => {
                eprintln!("\x1B[31mreadline error: {e}\x1B[0m");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    Ok(())
}

/// Process a slash command. Returns `true` if the REPL should exit.
fn handle_slash_command(
    facade: &ChatFacade,
    input: &str,
    session_id: &mut String,
    model: &mut Option<String>,
) -> bool {
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim());

    match cmd {
        "/exit" | "/quit" => return true,

        "/session" => {
            eprintln!("Current session: {session_id}");
            eprintln!("Usage: /reset to start a new one");
        }

        "/model" => {
            if let Some(name) = arg.filter(|s| !s.is_empty()) {
                *model = Some(name.to_string());
                eprintln!("Model set to: {name}");
            } else {
                eprintln!("Current model: {}", model.as_deref().unwrap_or("(default)"));
                eprintln!("Usage: /model <name>");
            }
        }

        "/clear" => {
            eprint!("\x1B[2J\x1B[1;1H");
        }

        "/reset" => {
            match facade.create_session(None, None, None, model.clone(), None) {
                Ok(session) => {
                    *session_id = session.id;
                    eprintln!("Session reset. New session id: {session_id}");
                }
                Err(e) => eprintln!("\x1B[31mfailed to create a new session: {e}\x1B[0m"),
            }
        }

        "/abort" => {
            if facade.abort(session_id) {
                eprintln!("(abort signaled)");
            } else {
                eprintln!("(no turn in flight)");
            }
        }

        "/help" => {
            eprintln!("Commands:");
            eprintln!("  /session         Show the current session id");
            eprintln!("  /model <name>    Set the model (e.g. claude-sonnet)");
            eprintln!("  /clear           Clear the screen");
            eprintln!("  /reset           Start a fresh session");
            eprintln!("  /abort           Cancel the turn in flight, if any");
            eprintln!("  /exit, /quit     Exit the chat");
            eprintln!("  /help            Show this help");
        }

        other => {
            eprintln!("Unknown command: {other}  (type /help for a list)");
        }
    }

    false
}

/// Sends the user's message and streams tool activity while it runs.
async fn send_message(
    facade: &ChatFacade,
    session_id: &str,
    provider: Option<String>,
    model: Option<String>,
    content: &str,
) -> anyhow::Result<()> {
    let mut events = facade.notifier().subscribe(session_id);
    let watcher = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::ToolStatus { tool_call_id, status, message, .. } => match status {
                    ToolStatus::Dispatched => eprintln!("\x1B[2m[tool {tool_call_id}: running]\x1B[0m"),
                    ToolStatus::Completed => eprintln!("\x1B[2m[tool {tool_call_id}: done]\x1B[0m"),
                    ToolStatus::Failed => {
                        eprintln!("\x1B[2m[tool {tool_call_id}: failed{}]\x1B[0m", message.map(|m| format!(" ({m})")).unwrap_or_default())
                    }
                },
                Event::TurnFinished { .. } => break,
                Event::TurnError { message, .. } => {
                    eprintln!("\x1B[31m[turn error: {message}]\x1B[0m");
                    break;
                }
                _ => {}
            }
        }
    });

    let result = facade.send_message(session_id, content, provider, model).await;
    watcher.abort();

    match result {
        Ok(message) => {
            println!("{}", message.content);
            println!();
        }
        Err(e) => anyhow::bail!("{e}"),
    }

    Ok(())
}
