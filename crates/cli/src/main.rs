mod console;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    backseat_annotations::WorkspaceRoot,
    backseat_chat::{ChatTransport, SessionBuilder, TransportFactory, parse_help},
    clap::{Parser, Subcommand},
    inquire::Text,
    tokio_util::sync::CancellationToken,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::console::{StdinTransport, TerminalAnnotations, TerminalNotices};

#[derive(Parser)]
#[command(name = "backseat", about = "Chat-driven transient editor annotations")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, env = "BACKSEAT_LOG", default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, env = "BACKSEAT_JSON_LOGS", default_value_t = false)]
    json_logs: bool,

    /// Workspace root that chat-supplied paths resolve against.
    #[arg(long, global = true, env = "BACKSEAT_ROOT", default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for help commands on standard input (default when no
    /// subcommand is given). Each input line is treated as one chat message.
    Listen {
        /// Channel name to join. Prompted for interactively when omitted.
        #[arg(long, env = "BACKSEAT_CHANNEL")]
        channel: Option<String>,
    },
    /// Parse a single chat line and print the annotation request as JSON.
    Parse {
        /// The chat line, quoted.
        line: String,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "backseat starting");

    match cli.command.unwrap_or_else(|| Commands::Listen {
        channel: std::env::var("BACKSEAT_CHANNEL").ok(),
    }) {
        Commands::Listen { channel } => listen(&cli.root, channel).await,
        Commands::Parse { line } => parse_line(&line),
    }
}

async fn listen(root_arg: &Path, channel: Option<String>) -> anyhow::Result<()> {
    use anyhow::Context as _;

    let root = root_arg
        .canonicalize()
        .with_context(|| format!("workspace root {} is not usable", root_arg.display()))?;
    let channel = match channel {
        Some(channel) => channel,
        None => Text::new("Channel name to connect to?")
            .with_help_message("The chat channel this session joins")
            .prompt()
            .context("a channel name is required")?,
    };

    let finished = CancellationToken::new();
    let factory: TransportFactory = {
        let finished = finished.clone();
        Arc::new(move || {
            Box::new(StdinTransport::new(finished.clone())) as Box<dyn ChatTransport>
        })
    };
    let (session, task) = SessionBuilder::new(
        WorkspaceRoot::new(root),
        factory,
        Arc::new(TerminalAnnotations),
        Arc::new(TerminalNotices),
    )
    .spawn();

    info!(channel = %channel, "joining channel");
    session.connect(channel).await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupt received, shutting down"),
        () = finished.cancelled() => info!("input closed, shutting down"),
    }

    session.shutdown().await?;
    let _ = task.await;
    Ok(())
}

fn parse_line(line: &str) -> anyhow::Result<()> {
    use backseat_chat::error::Context as _;

    let request = parse_help(line).context("not a help command")?;
    println!("{}", serde_json::to_string_pretty(&request)?);
    Ok(())
}
