//! CLI binary for scholar.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use scholar::repl;
use scholar::{AppConfig, ScholarServer};
use scholar_retrieval::RouteMode;
use tracing_subscriber::EnvFilter;

/// Scholar: multi-source research retrieval.
#[derive(Parser)]
#[command(name = "scholar", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Run one query and print the fused context.
    Query {
        /// The research question.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Force a routing mode (author, recent, default).
        #[arg(short, long)]
        mode: Option<RouteMode>,

        /// Print the full JSON response instead of the text context.
        #[arg(long)]
        json: bool,
    },

    /// Interactive query loop (the default).
    Repl,

    /// Serve the HTTP API.
    Serve {
        /// Bind address (overrides config).
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config).
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so query output on stdout stays pipeable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("scholar=info,scholar_retrieval=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Repl) {
        Command::Query { text, mode, json } => run_query(config, &text.join(" "), mode, json).await,
        Command::Repl => run_repl(config).await,
        Command::Serve { host, port } => run_serve(config, host, port).await,
    }
}

async fn run_query(
    config: AppConfig,
    text: &str,
    mode: Option<RouteMode>,
    json: bool,
) -> anyhow::Result<()> {
    let orchestrator = config.build_orchestrator()?;
    let response = orchestrator.answer(text, mode).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        repl::print_response(&mut std::io::stdout().lock(), &response)?;
    }
    Ok(())
}

async fn run_repl(config: AppConfig) -> anyhow::Result<()> {
    let orchestrator = config.build_orchestrator()?;
    let stdin = std::io::stdin();
    repl::run(&orchestrator, stdin.lock(), std::io::stdout()).await?;
    Ok(())
}

async fn run_serve(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let orchestrator = Arc::new(config.build_orchestrator()?);
    let generator = config.build_generator()?.map(Arc::new);
    if generator.is_none() {
        tracing::info!("answer generation disabled (set LLM_API_URL to enable /answer)");
    }

    let server = ScholarServer::start(orchestrator, generator, &config.server).await?;
    println!("Scholar v{} serving on http://{}", env!("CARGO_PKG_VERSION"), server.addr());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    server.shutdown();
    Ok(())
}
