//! tusk: follow a Mastodon timeline in the terminal.
//!
//! Usage:
//!   # Uses ~/.config/tusk/config.ron, token from $TUSK_ACCESS_TOKEN
//!   tusk
//!
//!   # Override instance and timeline
//!   tusk --instance mastodon.social --timeline tag:rust
//!
//! Logs go to stderr; `RUST_LOG=tusk_client=debug` shows stream traffic.

mod commands;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, fmt};
use tusk_client::{
    Api, ClientConfig, TimelineHandle, ViewEvent, ViewOptions, ViewState, spawn_timeline,
};
use tusk_types::{StatusDraft, TimelineKind};

use crate::commands::{Command, HELP};
use crate::render::{render_notification, render_post};

/// Follow a Mastodon timeline in the terminal.
#[derive(Parser, Debug)]
#[command(name = "tusk")]
#[command(about = "Follow a Mastodon-compatible timeline")]
struct Args {
    /// Config file (default: ~/.config/tusk/config.ron)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Instance host or URL, overriding the config file
    #[arg(short, long)]
    instance: Option<String>,

    /// Access token, overriding config and environment
    #[arg(long, env = "TUSK_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Timeline: home, local, public, direct, tag:NAME, list:ID
    #[arg(short, long)]
    timeline: Option<TimelineKind>,

    /// Posts per page (max 40)
    #[arg(long)]
    page_size: Option<u32>,

    /// Look up the token's account before starting
    #[arg(long)]
    verify: bool,

    /// Write the effective config back to the config file and exit
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let path = match &args.config {
        Some(path) => path.clone(),
        None => ClientConfig::default_path()?,
    };
    let mut config = ClientConfig::load_or_default(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    if let Some(instance) = args.instance {
        config.instance = instance;
    }
    if let Some(token) = args.token {
        config.access_token = Some(token);
    }
    if let Some(timeline) = args.timeline {
        config.timeline = timeline;
    }
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }

    if args.save_config {
        // Never persist a token that came from the command line or env.
        let mut saved = config.clone();
        saved.access_token = None;
        saved.save(&path).with_context(|| format!("writing {}", path.display()))?;
        println!("saved {}", path.display());
        return Ok(());
    }

    let (session, api) = tusk_client::connect(&config, args.verify)
        .await
        .context("connecting")?;
    tracing::info!(session = ?session, timeline = %config.timeline, "starting");

    let view = spawn_timeline(
        api.clone(),
        config.timeline.clone(),
        ViewOptions { page_size: config.page_size() },
    )
    .await
    .context("opening stream")?;

    println!("{} on {} (type 'help')", session.label(), config.timeline);
    let printer = tokio::spawn(print_events(view.clone()));

    let result = prompt(&view, &api).await;

    view.stop().await;
    printer.abort();
    result
}

/// Read commands from stdin until `quit` or EOF.
async fn prompt(view: &TimelineHandle, api: &Api) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(e) = run(command, view, api).await {
            eprintln!("error: {e:#}");
        }
    }
    Ok(())
}

async fn run(command: Command, view: &TimelineHandle, api: &Api) -> Result<()> {
    match command {
        Command::Show => print_timeline(view).await?,
        Command::Flush => {
            let shown = view.flush_backlog().await?;
            println!("-- {shown} new");
            print_timeline(view).await?;
        }
        Command::More => {
            if !view.load_more().await? {
                println!("-- nothing to load right now");
            }
        }
        Command::Refresh => {
            view.refetch().await?;
        }
        Command::Favourite(id) => view.toggle_favourite(&id).await?,
        Command::Boost(id) => view.toggle_reblog(&id).await?,
        Command::Notifications => {
            if !view.load_notifications().await? {
                println!("-- notifications already loading");
            }
        }
        Command::Dismiss(id) => view.dismiss_notification(&id).await?,
        Command::Post(text) => {
            let post = api.publish(&StatusDraft::new(text)).await?;
            println!("-- posted {}", post.id);
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

async fn print_timeline(view: &TimelineHandle) -> Result<()> {
    let snapshot = view.snapshot().await?;
    for post in &snapshot.posts {
        println!("{}", render_post(post));
    }
    if !snapshot.backlog.is_empty() {
        println!("-- {} new (type 'flush')", snapshot.backlog.len());
    }
    Ok(())
}

async fn print_events(view: TimelineHandle) {
    let mut events = view.subscribe();
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "display fell behind");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match event {
            ViewEvent::StateChanged(ViewState::Ready) => {
                if let Err(e) = print_timeline(&view).await {
                    eprintln!("error: {e:#}");
                }
            }
            ViewEvent::StateChanged(state) => println!("-- {state}"),
            ViewEvent::BacklogChanged { len } if len > 0 => {
                println!("-- {len} new (type 'flush')");
            }
            ViewEvent::Notification(n) => println!("{}", render_notification(&n)),
            ViewEvent::NotificationsChanged { .. } => {
                if let Ok(snapshot) = view.snapshot().await {
                    for n in &snapshot.notifications {
                        println!("{}", render_notification(n));
                    }
                }
            }
            ViewEvent::Notice(notice) => eprintln!("{notice}"),
            ViewEvent::TimelineChanged { .. }
            | ViewEvent::BacklogChanged { .. }
            | ViewEvent::Heartbeat => {}
        }
    }
}
