//! Skylark session CLI.
//!
//! Drives the session layer from a terminal: login/logout, session
//! status, and a watch mode that arms the idle monitor and treats stdin
//! lines as user activity.

mod terminal;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::info;
use url::Url;

use skylark_api_client::ApiClient;
use skylark_core::activity::{ActivityMonitor, Interaction};
use skylark_core::models::auth::{LoginCredentials, Registration};
use skylark_core::session::manager::SessionManager;
use skylark_core::session::store::TokenStore;

use crate::terminal::{TerminalNavigator, TerminalWarningPrompt};

#[derive(Parser, Debug)]
#[command(name = "skylark", about = "Skylark session CLI")]
struct Cli {
    /// Base URL of the Skylark API.
    #[arg(
        long,
        env = "SKYLARK_API_URL",
        default_value = "http://localhost:3000/api"
    )]
    api_url: Url,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in with email and password.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Persist the session across CLI invocations.
        #[arg(long, default_value_t = false)]
        remember: bool,
    },
    /// Create an account (logs in on success).
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        password: String,
    },
    /// Clear the stored session.
    Logout,
    /// Show the current session state.
    Status,
    /// Re-validate the session against the backend ("who am I").
    Whoami,
    /// Arm the idle monitor; stdin lines count as activity.
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,skylark_core=debug,skylark_api_client=debug"
                    .parse()
                    .unwrap()
            }),
        )
        .init();

    let cli = Cli::parse();
    info!(api_url = %cli.api_url, "starting skylark CLI");

    let api = ApiClient::new(cli.api_url.clone());
    let session = Arc::new(SessionManager::new(
        Arc::new(api),
        Arc::new(TerminalNavigator),
        TokenStore::new(),
    ));

    match cli.command {
        Commands::Login {
            email,
            password,
            remember,
        } => {
            session
                .login(&LoginCredentials {
                    email: email.clone(),
                    password,
                    remember_me: remember,
                })
                .await?;
            println!("Logged in as {email}.");
            if !remember {
                println!("Session is in-process only; pass --remember to persist it.");
            }
        }
        Commands::Register {
            email,
            name,
            password,
        } => {
            session
                .register(&Registration {
                    email: email.clone(),
                    name,
                    password,
                })
                .await?;
            println!("Registered and logged in as {email}.");
        }
        Commands::Logout => {
            session.logout();
            println!("Logged out.");
        }
        Commands::Status => print_status(&session),
        Commands::Whoami => {
            if session.refresh_auth().await {
                print_status(&session);
            } else {
                println!("No valid session.");
                std::process::exit(1);
            }
        }
        Commands::Watch => watch(session).await?,
    }

    Ok(())
}

fn print_status(session: &SessionManager) {
    let state = session.current();
    let Some(user) = state.user else {
        println!("Not logged in.");
        return;
    };
    println!("Logged in as {}", user.email);
    if let Some(name) = &user.name {
        println!("  name:    {name}");
    }
    println!("  admin:   {}", state.is_admin);
    println!("  guest:   {}", session.is_guest());
    if let Some(expiry) = state.token_expiry {
        println!("  expires: {}", expiry.to_rfc3339());
        if session.token_expires_soon() {
            println!("           (less than a minute left)");
        }
    }
    if let Some(config) = session.current_activity_config() {
        println!(
            "  idle:    warn after {}s, logout {}s later",
            config.inactivity_warning_seconds, config.warning_countdown_seconds
        );
    }
}

/// Interactive watch mode. Runs until the session ends, stdin closes, or
/// the user types `quit`.
async fn watch(session: Arc<SessionManager>) -> Result<(), Box<dyn std::error::Error>> {
    if !session.is_authenticated() {
        return Err("not logged in; run `skylark login --remember` first".into());
    }

    let (response_tx, response_rx) = mpsc::unbounded_channel();
    let prompt = Arc::new(TerminalWarningPrompt::new(response_rx));
    let waiting = prompt.waiting_flag();
    let (monitor, handle) = ActivityMonitor::new(session.clone(), prompt);
    let monitor_task = tokio::spawn(monitor.run());

    let mut state_rx = session.state();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    println!("Watching session. Any line counts as activity; 'quit' exits.");

    loop {
        tokio::select! {
            res = state_rx.changed() => {
                if res.is_err() || !state_rx.borrow().is_authenticated {
                    println!("Session ended.");
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if waiting.load(Ordering::SeqCst) {
                    // the warning dialog owns this line
                    let _ = response_tx.send(line);
                } else if line.trim() == "quit" {
                    break;
                } else {
                    handle.record_activity(Interaction::KeyDown);
                    if let Some(until) = handle.snapshot().time_until_warning {
                        info!(seconds = until.as_secs(), "idle timer reset");
                    }
                }
            }
        }
    }

    handle.shutdown();
    let _ = monitor_task.await;
    Ok(())
}
