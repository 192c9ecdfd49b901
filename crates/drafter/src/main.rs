use std::{io, process::ExitCode};

use clap::{Parser, Subcommand};
use drafter_core::{ClientConfig, ConfigError, DEFAULT_TEXT_HEIGHT};
use drafter_ipc::{BatchReport, DrawingClient};
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Upper bound on lines per `random-lines` invocation.
const MAX_BURST: u32 = 10_000;

#[derive(Debug, Parser)]
#[command(name = "drafter", about = "Drive a remote drawing server over TCP")]
struct Cli {
    /// Server host [env: DRAFTER_HOST, default 127.0.0.1]
    #[arg(long, global = true)]
    host: Option<String>,
    /// Server port [env: DRAFTER_PORT, default 7777]
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Authentication token [env: DRAFTER_TOKEN]
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the server answers.
    Ping,
    /// Save the current drawing.
    Save { filename: Option<String> },
    /// Export the drawing to a file.
    Export { filename: String },
    /// Draw a line segment.
    #[command(allow_negative_numbers = true)]
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    #[command(allow_negative_numbers = true)]
    Circle { x: f64, y: f64, radius: f64 },
    #[command(allow_negative_numbers = true)]
    Text {
        x: f64,
        y: f64,
        content: String,
        #[arg(default_value_t = DEFAULT_TEXT_HEIGHT)]
        height: f64,
    },
    /// Insert random lines in one batch.
    #[command(allow_negative_numbers = true)]
    RandomLines {
        #[arg(default_value_t = 1000, value_parser = clap::value_parser!(u32).range(1..=MAX_BURST as i64))]
        count: u32,
        #[arg(long, default_value_t = -100.0)]
        min_coord: f64,
        #[arg(long, default_value_t = 100.0)]
        max_coord: f64,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid coordinate range: min {min} must be less than max {max}")]
    InvalidRange { min: f64, max: f64 },
    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(1)
        }
    }
}

/// Runs the selected command; `Ok(false)` means the server reported failure.
async fn run() -> Result<bool, CliError> {
    let cli = Cli::parse();
    let mut client = DrawingClient::new(resolve_config(&cli)?);

    let response = match cli.command {
        Command::Ping => client.ping().await,
        Command::Save { filename } => client.save(filename.as_deref()).await,
        Command::Export { filename } => client.export(&filename).await,
        Command::Line { x1, y1, x2, y2 } => client.line(x1, y1, x2, y2).await,
        Command::Circle { x, y, radius } => client.circle(x, y, radius).await,
        Command::Text {
            x,
            y,
            content,
            height,
        } => client.text(x, y, &content, height).await,
        Command::RandomLines {
            count,
            min_coord,
            max_coord,
            seed,
        } => return random_lines(&mut client, count, min_coord, max_coord, seed).await,
    };

    print_json(&response)?;
    Ok(response.is_ok())
}

async fn random_lines(
    client: &mut DrawingClient,
    count: u32,
    min_coord: f64,
    max_coord: f64,
    seed: Option<u64>,
) -> Result<bool, CliError> {
    if !(min_coord < max_coord) {
        return Err(CliError::InvalidRange {
            min: min_coord,
            max: max_coord,
        });
    }

    info!(count, min_coord, max_coord, ?seed, "sending random lines");
    let results = match seed {
        Some(seed) => {
            client
                .random_primitive_burst_seeded(count, min_coord, max_coord, seed)
                .await
        }
        None => {
            client
                .random_primitive_burst(count, min_coord, max_coord)
                .await
        }
    };

    let report = BatchReport::from_results(count, &results);
    if !report.committed {
        if let Some(last) = results.last() {
            print_json(last)?;
        }
        return Ok(false);
    }

    print_json(&report)?;
    Ok(true)
}

fn resolve_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;

    if let Some(host) = &cli.host {
        config = config.with_host(host.clone());
    }
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(token) = &cli.token {
        config = config.with_token(token.clone());
    }

    Ok(config)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
