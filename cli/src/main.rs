//! Headless session client for the shared whiteboard relay.
//!
//! Connects to a relay channel as a given profile, joins a session, and
//! exercises the collaboration engine from the terminal: watch inbound
//! traffic, place a stroke, or start a signaling-only call. Useful for
//! poking a deployment without a browser.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use engine::{
    ChannelClient, EngineConfig, InMemoryStore, LocalProfile, MediaLayer, NoopMedia, SessionContext,
    SessionStore,
};
use tokio::sync::{mpsc, watch};
use wire::{Envelope, ParticipantRef, Payload, ProfileKind, StrokeKind, StrokePoint};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid profile kind `{0}` (expected `student` or `tutor`)")]
    InvalidProfileKind(String),
    #[error("engine error: {0}")]
    Engine(#[from] engine::EngineError),
    #[error("channel closed before `{0}` completed")]
    ChannelClosed(&'static str),
}

#[derive(Parser, Debug)]
#[command(name = "slate-cli", about = "Slateboard relay and session CLI")]
struct Cli {
    #[arg(long, env = "SLATE_RELAY_URL", default_value = "ws://127.0.0.1:4000/channel")]
    relay_url: String,

    #[arg(long, env = "SLATE_PROFILE_ID", default_value_t = 1)]
    profile_id: i64,

    /// `student` or `tutor`.
    #[arg(long, env = "SLATE_PROFILE_KIND", default_value = "student")]
    profile_kind: String,

    #[arg(long, env = "SLATE_DISPLAY_NAME", default_value = "slate-cli")]
    display_name: String,

    /// Session to join before running the command.
    #[arg(long, env = "SLATE_SESSION_ID")]
    session: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print inbound session traffic until interrupted.
    Watch,
    /// Commit one freehand stroke, then watch.
    Draw {
        #[arg(long, default_value_t = 100.0)]
        x: f64,
        #[arg(long, default_value_t = 100.0)]
        y: f64,
    },
    /// Start a call toward one participant, then watch the signaling.
    Call {
        #[arg(long)]
        peer_id: i64,
        /// `student` or `tutor`.
        #[arg(long, default_value = "tutor")]
        peer_kind: String,
    },
}

fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

fn parse_kind(raw: &str) -> Result<ProfileKind, CliError> {
    match raw {
        "student" => Ok(ProfileKind::Student),
        "tutor" => Ok(ProfileKind::Tutor),
        other => Err(CliError::InvalidProfileKind(other.to_owned())),
    }
}

fn describe(env: &Envelope) {
    match &env.payload {
        Payload::Stroke { page_id, stroke } => {
            println!("{} stroke {:?} on page {page_id}", env.from, stroke.kind);
        }
        Payload::TextTyping { text, .. } => println!("{} typing: {text}", env.from),
        Payload::Cursor { x, y } => println!("{} cursor at ({x:.0}, {y:.0})", env.from),
        Payload::CallInvitation { caller_name, participant_count, .. } => {
            println!("{} invites you to a {participant_count}-way call ({caller_name})", env.from);
        }
        other => println!("{} {}", env.from, other.kind()),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let me = ParticipantRef::new(cli.profile_id, parse_kind(&cli.profile_kind)?);
    let profile = LocalProfile::new(me, cli.display_name.clone());
    let config = EngineConfig::default();

    let store: Arc<dyn SessionStore> = Arc::new(InMemoryStore::new());
    let media: Arc<dyn MediaLayer> = Arc::new(NoopMedia::new());

    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
    let (in_call_tx, in_call_rx) = watch::channel(false);

    let client = ChannelClient::new(cli.relay_url.as_str(), me, config.clone(), outbox_rx, inbound_tx, in_call_rx);
    tokio::spawn(client.run());

    let mut session = SessionContext::new(profile, config, store, media, outbox_tx);
    if let Some(session_id) = &cli.session {
        // A missing snapshot just means a fresh board.
        if let Err(e) = session.join_session(session_id).await {
            tracing::warn!(error = %e, "session snapshot unavailable, starting fresh");
        }
    }

    match cli.command {
        Command::Watch => {}
        Command::Draw { x, y } => {
            session.begin_stroke(StrokeKind::Freehand, StrokePoint { x, y })?;
            session.extend_stroke(StrokePoint { x: x + 20.0, y: y + 10.0 });
            session.commit_stroke(false)?;
            println!("stroke committed on page {}", session.pages.current_id());
        }
        Command::Call { peer_id, peer_kind } => {
            let peer = ParticipantRef::new(peer_id, parse_kind(&peer_kind)?);
            // Presence normally arrives from the relay; seed it so the
            // invite goes out even before the first heartbeat lands.
            session.presence.apply_online(peer, now_ms());
            session.start_call(&[peer], now_ms()).await?;
            let _ = in_call_tx.send(true);
            println!("calling {peer}...");
        }
    }

    let mut housekeeping = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            env = inbound_rx.recv() => {
                let Some(env) = env else {
                    return Err(CliError::ChannelClosed("watch"));
                };
                describe(&env);
                session.handle_inbound(env, now_ms()).await;
                let _ = in_call_tx.send(session.call.is_active());
            }
            _ = housekeeping.tick() => {
                session.tick(now_ms());
            }
        }
    }
}
