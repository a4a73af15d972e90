//! Line-streaming test data server.
//!
//! Feeds synthetic data to a single stream-processing consumer over TCP, one
//! newline-delimited line at a time.
//!
//! # Examples
//!
//! ```bash
//! # Stream random words on port 9999, one line per second
//! linestream words --port 9999 --delay 1000
//! # In another terminal: nc localhost 9999
//!
//! # Stream JSON events on port 9998
//! linestream json --port 9998 --delay 200
//!
//! # Stream words and JSON events on two ports at once
//! linestream pair --words-port 9999 --json-port 9998
//! ```
//!
//! Ctrl+C stops every server.

use anyhow::Result;
use clap::{Parser, Subcommand};
use linestream_generators::{JsonObjects, RandomWords};
use linestream_server::{LineProducer, LineStreamingServer, ServerConfig, StopHandle};
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "linestream")]
#[command(about = "Stream random words or JSON objects to a single TCP client")]
struct Args {
    /// Host to bind to
    #[arg(long, global = true, default_value = "0.0.0.0")]
    host: String,

    /// Delay between lines in milliseconds
    #[arg(long, short, global = true, default_value = "1000")]
    delay: u64,

    /// Seed for reproducible output
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stream lines of random words
    Words {
        /// Port to listen on
        #[arg(long, short, default_value = "9999")]
        port: u16,

        /// Minimum words per line
        #[arg(long, default_value = "1")]
        min_words: usize,

        /// Maximum words per line
        #[arg(long, default_value = "8")]
        max_words: usize,
    },

    /// Stream JSON event objects, one per line
    Json {
        /// Port to listen on
        #[arg(long, short, default_value = "9998")]
        port: u16,
    },

    /// Stream random words and JSON events on two ports
    Pair {
        /// Port for random words
        #[arg(long, default_value = "9999")]
        words_port: u16,

        /// Port for JSON events
        #[arg(long, default_value = "9998")]
        json_port: u16,
    },
}

/// A server running in the background.
struct Running {
    name: &'static str,
    handle: StopHandle,
    task: JoinHandle<linestream_server::RunSummary>,
}

async fn spawn_server<P>(name: &'static str, config: ServerConfig, producer: P) -> Result<Running>
where
    P: LineProducer + 'static,
{
    let server = LineStreamingServer::bind(config, producer).await?;
    let addr = server.local_addr();
    println!("{} server listening on {}. Use 'nc localhost {}' to consume.", name, addr, addr.port());

    let handle = server.stop_handle();
    let task = tokio::spawn(server.run());
    Ok(Running { name, handle, task })
}

fn random_words(seed: Option<u64>) -> RandomWords {
    match seed {
        Some(seed) => RandomWords::new().with_seed(seed),
        None => RandomWords::new(),
    }
}

fn json_objects(seed: Option<u64>) -> JsonObjects {
    match seed {
        Some(seed) => JsonObjects::new().with_seed(seed),
        None => JsonObjects::new(),
    }
}

async fn start(args: Args) -> Result<Vec<Running>> {
    let config = |port: u16| ServerConfig::new(port, args.delay).with_host(args.host.clone());

    let servers = match args.command {
        Command::Words {
            port,
            min_words,
            max_words,
        } => {
            let words = random_words(args.seed).with_word_count(min_words, max_words)?;
            vec![spawn_server("words", config(port), words).await?]
        }
        Command::Json { port } => {
            vec![spawn_server("json", config(port), json_objects(args.seed)).await?]
        }
        Command::Pair {
            words_port,
            json_port,
        } => {
            let words = spawn_server("words", config(words_port), random_words(args.seed)).await?;
            let json = match spawn_server("json", config(json_port), json_objects(args.seed)).await {
                Ok(json) => json,
                Err(e) => {
                    words.handle.stop();
                    return Err(e);
                }
            };
            vec![words, json]
        }
    };

    Ok(servers)
}

/// Wait for every server to finish, stopping all of them on Ctrl+C.
async fn supervise(servers: Vec<Running>) {
    let handles: Vec<StopHandle> = servers.iter().map(|s| s.handle.clone()).collect();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, stopping servers"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, stopping servers"),
        }
        for handle in &handles {
            handle.stop();
        }
    });

    for server in servers {
        match server.task.await {
            Ok(summary) => info!(
                server = server.name,
                lines_sent = summary.lines_sent,
                outcome = ?summary.outcome,
                "Server finished"
            ),
            Err(e) => error!(server = server.name, error = %e, "Server task panicked"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();
    let servers = start(args).await?;
    supervise(servers).await;

    Ok(())
}
