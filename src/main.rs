//! devops-resolver entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use devops_resolver::config::{BackendKind, TransportType};
use devops_resolver::{create_backend, run_server, CommandEngine, Config, Session};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

/// Resolve shorthand and free-text commands against Azure DevOps.
#[derive(Parser, Debug)]
#[command(name = "devops-resolver")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use the in-memory sample backend instead of Azure DevOps
    #[arg(long, global = true)]
    offline: bool,

    /// Start with debug mode on
    #[arg(long, global = true)]
    debug: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive loop (default)
    Repl,
    /// Resolve one request and exit
    Ask {
        /// Shorthand command or free text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Run as MCP server
    Serve {
        /// Transport type (stdio or http). If not specified, uses config file value.
        #[arg(short, long)]
        transport: Option<String>,
        /// HTTP port (when using http transport). If not specified, uses config file value.
        #[arg(short, long)]
        port: Option<u16>,
        /// Enable JSON logging format
        #[arg(long)]
        json_logs: bool,
    },
}

/// Logs go to stderr so stdout carries only rendered output and MCP frames.
fn init_tracing(default_level: &str, json_logs: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match &args.command {
        Some(Command::Serve { json_logs, .. }) => init_tracing("info", *json_logs),
        _ => init_tracing("warn", false),
    }

    let mut config = Config::load(args.config.as_deref())?;
    if args.offline {
        config.backend.kind = BackendKind::Memory;
    }

    let session = Session {
        debug: args.debug,
        ..Session::default()
    };

    match args.command {
        None | Some(Command::Repl) => {
            let engine = build_engine(&config)?;
            cli::run_repl(engine, session, args.json).await
        }
        Some(Command::Ask { text }) => {
            let engine = build_engine(&config)?;
            let failed = cli::run_ask(engine, session, &text.join(" "), args.json).await?;
            if failed {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Serve {
            transport, port, ..
        }) => run_mcp_server(config, transport, port).await,
    }
}

fn build_engine(config: &Config) -> anyhow::Result<Arc<CommandEngine>> {
    let backend = create_backend(&config.backend)?;
    tracing::debug!(backend = backend.name(), "Backend ready");
    Ok(Arc::new(CommandEngine::from_config(backend, config)))
}

async fn run_mcp_server(
    mut config: Config,
    transport: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    tracing::info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    // Override transport from CLI args only if explicitly provided
    if let Some(ref t) = transport {
        config.server.transport = match t.as_str() {
            "http" => TransportType::Http,
            _ => TransportType::Stdio,
        };
    }
    if let Some(p) = port {
        config.server.http_port = p;
    }

    tracing::info!(
        transport = ?config.server.transport,
        backend = ?config.backend.kind,
        "Configuration loaded"
    );

    let engine = build_engine(&config)?;
    run_server(engine, config.server.transport, config.server.http_port).await
}
