use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, load_settings_from, ClientConfig, CommandDispatcher, DispatchReport,
    FailurePolicy, FormSerializer, FrameResponseDecoder, SijaxClient,
};
use dom::MemoryDocument;
use serde_json::Value;
use shared::protocol::CommandBatch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sijax-tools")]
struct Cli {
    /// Settings file; defaults to ./sijax.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the payload a form would submit, as JSON.
    Serialize {
        html: PathBuf,
        #[arg(long, default_value = "form")]
        form: String,
    },
    /// Apply a command batch to a page and print the resulting markup.
    Dispatch {
        html: PathBuf,
        /// JSON command array; `-` reads stdin.
        commands: PathBuf,
        #[arg(long)]
        policy: Option<FailurePolicy>,
    },
    /// Decode a hidden-frame response body into its command batches.
    DecodeFrame {
        /// `-` reads stdin.
        body: PathBuf,
    },
    /// Call a server-side function and apply the response to a page.
    Request {
        html: PathBuf,
        function: String,
        /// JSON-encoded argument; repeat for several.
        #[arg(long = "arg")]
        args: Vec<String>,
        /// Serialize this form and send it as the only argument instead.
        #[arg(long, conflicts_with = "args")]
        form: Option<String>,
        #[arg(long)]
        uri: Option<String>,
        /// Origin for a relative `--uri` or configured request_uri.
        #[arg(long)]
        base_url: Option<String>,
    },
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read stdin")?;
        return Ok(raw);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_page(path: &Path) -> Result<MemoryDocument> {
    Ok(MemoryDocument::parse(&read_input(path)?))
}

fn report_outcome(report: &DispatchReport) {
    info!(
        executed = report.executed,
        failed = report.failures.len(),
        "dispatch finished"
    );
    for (index, err) in &report.failures {
        warn!("command {index} failed: {err}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config: ClientConfig = match &cli.config {
        Some(path) => load_settings_from(path),
        None => load_settings(),
    };

    match cli.command {
        Command::Serialize { html, form } => {
            let page = load_page(&html)?;
            let values = FormSerializer::new()
                .serialize(&page, &form)
                .with_context(|| format!("failed to serialize `{form}`"))?;
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        Command::Dispatch {
            html,
            commands,
            policy,
        } => {
            let mut page = load_page(&html)?;
            let batch = CommandBatch::from_json(&read_input(&commands)?)
                .context("commands are not a JSON array")?;
            let dispatcher = CommandDispatcher::new()
                .with_policy(policy.unwrap_or(config.failure_policy));
            let report = dispatcher.dispatch(&mut page, &batch)?;
            report_outcome(&report);
            println!("{}", page.to_html());
        }
        Command::DecodeFrame { body } => {
            let batches = FrameResponseDecoder::decode_all(&read_input(&body)?)?;
            let values: Vec<Value> = batches
                .iter()
                .map(|batch| Value::Array(batch.to_values()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        Command::Request {
            html,
            function,
            args,
            form,
            uri,
            base_url,
        } => {
            let config = match uri {
                Some(uri) => config.with_request_uri(uri),
                None => config,
            };
            let config = match base_url {
                Some(base_url) => config.with_base_url(base_url),
                None => config,
            };
            let client = SijaxClient::from_config(config)?;
            let mut page = load_page(&html)?;
            let report = match form {
                Some(selector) => client.submit_form(&function, &selector, &mut page).await?,
                None => {
                    let args = args
                        .iter()
                        .map(|raw| {
                            serde_json::from_str::<Value>(raw)
                                .with_context(|| format!("argument `{raw}` is not JSON"))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    client.request(&function, args, &mut page).await?
                }
            };
            report_outcome(&report);
            println!("{}", page.to_html());
        }
    }

    Ok(())
}
