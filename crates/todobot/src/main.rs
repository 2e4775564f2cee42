//! `todobot` - CLI for the to-do chat bot
//!
//! This binary runs the webhook and dashboard server, triggers reminder runs
//! and inspects stored tasks and configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};

use todobot::auth::LineLogin;
use todobot::bot::{TodoBot, HOWTO};
use todobot::cli::{Cli, Command, ConfigCommand, ListCommand, ServeCommand};
use todobot::dates::{format_due, now_in, parse_user_message};
use todobot::messenger::LineMessenger;
use todobot::scheduler::DailyReminder;
use todobot::web::{router, AppState};
use todobot::{init_logging, Config, SharedStorage, Storage};

const REDACTED: &str = "********";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    run(cli).await
}

/// Execute a parsed command line.
///
/// Configuration is loaded by the commands that use it, so `config path` and
/// `config validate --file` work while the active config is broken.
async fn run(cli: Cli) -> anyhow::Result<()> {
    let load = || Config::load_from(cli.config.clone());

    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(load()?, serve_cmd).await,
        Command::Remind => handle_remind(&load()?).await,
        Command::List(list_cmd) => handle_list(&load()?, &list_cmd),
        Command::Parse(parse_cmd) => handle_parse(&load()?, &parse_cmd.message),
        Command::Config(config_cmd) => handle_config(cli.config.clone(), config_cmd),
    }
}

fn open_storage(config: &Config) -> anyhow::Result<SharedStorage> {
    let storage = Storage::open(config.database_path(), config.offset()?)?;
    Ok(SharedStorage::new(storage))
}

fn messenger(config: &Config, client: reqwest::Client) -> Arc<LineMessenger> {
    Arc::new(LineMessenger::new(
        client,
        config.bot.api_base.clone(),
        config.bot.channel_token.clone(),
    ))
}

async fn handle_serve(mut config: Config, cmd: ServeCommand) -> anyhow::Result<()> {
    if let Some(host) = cmd.host {
        config.server.host = host;
    }
    if let Some(port) = cmd.port {
        config.server.port = port;
    }
    config.validate_for_serving()?;

    let offset = config.offset()?;
    let storage = open_storage(&config)?;
    let client = reqwest::Client::new();
    let login = Arc::new(LineLogin::new(client.clone(), config.login.clone()));
    let state = AppState::new(&config, storage, messenger(&config, client), login)?;

    let timer = config.daily_reminder_at().map(|at| {
        info!("Daily reminders at {} (UTC{})", at.format("%H:%M"), offset);
        DailyReminder::new(Arc::clone(&state.bot), at, offset).spawn()
    });

    let app = router(state, config.server.assets_dir.as_deref());
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(timer) = timer {
        timer.abort();
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn handle_remind(config: &Config) -> anyhow::Result<()> {
    if config.bot.channel_token.trim().is_empty() {
        bail!("bot.channel_token must be set to send reminders");
    }

    let storage = open_storage(config)?;
    let bot = TodoBot::new(
        storage,
        messenger(config, reqwest::Client::new()),
        config.bot.edit_url.clone(),
    );

    let handles = bot.remind(now_in(config.offset()?))?;
    let users = handles.len();
    for handle in handles {
        handle.await?;
    }
    println!("Sent reminders to {users} users.");
    Ok(())
}

fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let todos = storage.with(|s| s.list(&cmd.user))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&todos)?);
        return Ok(());
    }

    if todos.is_empty() {
        println!("No tasks for {}.", cmd.user);
        return Ok(());
    }

    let now = now_in(config.offset()?);
    for todo in &todos {
        println!(
            "{:>5} [{}] {}{} : {}{}",
            todo.id,
            if todo.done { "x" } else { " " },
            if todo.pin { "*** " } else { "" },
            todo.task,
            format_due(now, todo.due),
            if todo.is_overdue(now) { " (overdue)" } else { "" },
        );
    }
    let remaining = todos.iter().filter(|t| !t.done).count();
    println!();
    println!("{remaining} of {} remaining", todos.len());
    Ok(())
}

fn handle_parse(config: &Config, message: &str) -> anyhow::Result<()> {
    let now = now_in(config.offset()?);
    match parse_user_message(message, now) {
        Ok(parsed) => {
            println!("Task: {}", parsed.task);
            println!("Due:  {}", parsed.due.to_rfc3339());
            println!("      {}", format_due(now, parsed.due));
            Ok(())
        }
        Err(e) => {
            eprintln!("{HOWTO}");
            bail!(e)
        }
    }
}

/// A copy of `config` with credentials masked.
fn redacted(config: &Config) -> Config {
    let mask = |value: &mut String| {
        if !value.is_empty() {
            *value = REDACTED.to_string();
        }
    };

    let mut config = config.clone();
    mask(&mut config.bot.channel_secret);
    mask(&mut config.bot.channel_token);
    mask(&mut config.login.client_secret);
    mask(&mut config.session.secret);
    if let Some(token) = config.reminder.token.as_mut() {
        mask(token);
    }
    config
}

fn handle_config(config_path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = redacted(&Config::load_from(config_path)?);
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                let or_unset = |value: &str| {
                    if value.is_empty() {
                        "(unset)".to_string()
                    } else {
                        value.to_string()
                    }
                };

                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Host:               {}", config.server.host);
                println!("  Port:               {}", config.server.port);
                println!(
                    "  Assets dir:         {}",
                    config
                        .server
                        .assets_dir
                        .as_ref()
                        .map_or_else(|| "(none)".to_string(), |p| p.display().to_string())
                );
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Bot]");
                println!("  Channel secret:     {}", or_unset(&config.bot.channel_secret));
                println!("  Channel token:      {}", or_unset(&config.bot.channel_token));
                println!("  Edit URL:           {}", or_unset(&config.bot.edit_url));
                println!("  API base:           {}", config.bot.api_base);
                println!();
                println!("[Login]");
                println!("  Client id:          {}", or_unset(&config.login.client_id));
                println!("  Client secret:      {}", or_unset(&config.login.client_secret));
                println!("  Redirect URL:       {}", or_unset(&config.login.redirect_url));
                println!();
                println!("[Session]");
                println!("  Secret:             {}", or_unset(&config.session.secret));
                println!("  Cookie name:        {}", config.session.cookie_name);
                println!("  Secure:             {}", config.session.secure);
                println!();
                println!("[Reminder]");
                println!(
                    "  Daily at:           {}",
                    config.reminder.daily_at.as_deref().unwrap_or("(off)")
                );
                println!(
                    "  Token:              {}",
                    config.reminder.token.as_deref().unwrap_or("(none)")
                );
                println!();
                println!("[Time zone]");
                println!(
                    "  UTC offset:         {} minutes",
                    config.timezone.utc_offset_minutes
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(loaded) => {
                    println!("Configuration is valid.");
                    if let Err(e) = loaded.validate_for_serving() {
                        println!("Not ready to serve: {e}");
                    }
                }
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
