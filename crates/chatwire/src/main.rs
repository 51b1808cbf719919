//! Send a chat-completion request and print the response.
//!
//! Reads the API key from the variant's environment variable
//! (`OPENROUTER_KEY` or `OPENAI_API_KEY`).
//!
//! # Examples
//!
//! ```sh
//! # Basic request
//! chatwire --user "Summarize this thread"
//!
//! # OpenAI, streaming, with a system prompt
//! chatwire --variant openai --model gpt-4o-mini --stream \
//!   --system "You are terse." --user "Name three primes."
//!
//! # Pipe content from stdin
//! cat notes.md | chatwire --system "Summarize these notes." --stdin
//!
//! # Print available models as JSON
//! chatwire --list-models
//! ```

use std::io::{self, Read, Write};
use std::process;
use std::time::Duration;

use chatwire::api::streaming::{delta_text, finish_reason};
use chatwire::{ApiVariant, ChatRequest, Client, ClientConfig, Message};
use clap::Parser;
use futures::StreamExt;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Send a chat-completion request and print the response.
///
/// Set RUST_LOG (e.g. RUST_LOG=chatwire=debug) to see retries and request IDs.
#[derive(Parser)]
#[command(name = "chatwire", version)]
struct Cli {
    // ── Target ─────────────────────────────────────────────────
    /// API flavor: openrouter or openai
    #[arg(long, default_value = "openrouter")]
    variant: ApiVariant,

    /// Model identifier
    #[arg(long, default_value = "openai/gpt-4o-mini")]
    model: String,

    /// Override the variant's base URL
    #[arg(long)]
    base_url: Option<String>,

    // ── Message content ────────────────────────────────────────
    /// System prompt to set the assistant's behavior
    #[arg(long)]
    system: Option<String>,

    /// User message to send
    #[arg(long)]
    user: Option<String>,

    /// Read user content from stdin
    #[arg(long)]
    stdin: bool,

    // ── Generation parameters ──────────────────────────────────
    /// Maximum tokens in the response
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    // ── Output ─────────────────────────────────────────────────
    /// Stream the response, printing text as it arrives
    #[arg(long)]
    stream: bool,

    /// Print the raw JSON response (one line per chunk when streaming)
    #[arg(long)]
    raw: bool,

    /// List available models instead of sending a completion
    #[arg(long)]
    list_models: bool,

    // ── Retry and transport ────────────────────────────────────
    /// Maximum retries for 429 and 5xx responses
    #[arg(long)]
    max_retries: Option<u32>,

    /// Base retry delay in milliseconds (doubles each attempt)
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Honor HTTP(S)_PROXY and system proxy settings
    #[arg(long)]
    system_proxy: bool,
}

// ── Helpers ────────────────────────────────────────────────────────

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn read_stdin_content() -> Result<String, String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|e| format!("failed to read stdin: {e}"))?;
    Ok(buf)
}

fn build_user_content(cli: &Cli) -> Result<String, String> {
    let stdin_text = if cli.stdin {
        Some(read_stdin_content()?)
    } else {
        None
    };

    match (&cli.user, stdin_text) {
        (Some(msg), Some(piped)) => Ok(format!("{msg}\n\n{piped}")),
        (Some(msg), None) => Ok(msg.clone()),
        (None, Some(piped)) => Ok(piped),
        (None, None) => Err("provide --user, --stdin, or both".to_string()),
    }
}

fn build_request(cli: &Cli, user_content: String) -> ChatRequest {
    let mut messages = Vec::new();
    if let Some(sys) = &cli.system {
        messages.push(Message::system(sys));
    }
    messages.push(Message::user(user_content));

    ChatRequest {
        max_tokens: cli.max_tokens,
        temperature: cli.temperature,
        ..ChatRequest::new(messages)
    }
}

fn build_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig::from_env(cli.variant);
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url);
    }
    if let Some(n) = cli.max_retries {
        config = config.with_max_retries(n);
    }
    if let Some(ms) = cli.retry_delay_ms {
        config = config.with_retry_delay(Duration::from_millis(ms));
    }
    if cli.system_proxy {
        config = config.with_system_proxy(true);
    }
    config
}

fn pretty(value: &Value) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("failed to format response: {e}"))
}

fn message_text(response: &Value) -> String {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

// ── Main logic ─────────────────────────────────────────────────────

async fn stream_to_stdout(client: &Client, cli: &Cli, request: &ChatRequest) -> Result<(), String> {
    let mut events = client
        .chat_stream(&cli.model, request)
        .await
        .map_err(|e| e.to_string())?;

    let mut out = io::stdout().lock();
    while let Some(event) = events.next().await {
        let event = event.map_err(|e| e.to_string())?;
        if cli.raw {
            writeln!(out, "{event}").map_err(|e| e.to_string())?;
            continue;
        }
        if let Some(text) = delta_text(&event) {
            write!(out, "{text}").map_err(|e| e.to_string())?;
            out.flush().map_err(|e| e.to_string())?;
        }
        if let Some(reason) = finish_reason(&event) {
            debug!("Stream finished: {reason}");
        }
    }
    if !cli.raw {
        writeln!(out).map_err(|e| e.to_string())?;
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<Option<String>, String> {
    let client = Client::new(build_config(cli)).map_err(|e| e.to_string())?;

    if cli.list_models {
        let models = client.list_models().await.map_err(|e| e.to_string())?;
        return pretty(&models).map(Some);
    }

    let request = build_request(cli, build_user_content(cli)?);

    if cli.stream {
        stream_to_stdout(&client, cli, &request).await?;
        return Ok(None);
    }

    let response = client
        .chat(&cli.model, &request)
        .await
        .map_err(|e| e.to_string())?;
    if cli.raw {
        pretty(&response).map(Some)
    } else {
        Ok(Some(message_text(&response)))
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(Some(output)) => println!("{output}"),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
