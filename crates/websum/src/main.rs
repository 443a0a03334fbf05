//! Fetch a web page and print it as markdown, summarized if it is too long.
//!
//! Settings come from the environment (a `.env` file is honored) and can be
//! overridden per invocation.
//!
//! # Examples
//!
//! ```sh
//! # Local model server
//! BASE_URL=http://localhost:8085/v1 websum https://example.com/docs
//!
//! # Focus the summary on one topic
//! websum https://example.com/pricing --context "enterprise tier limits"
//!
//! # Small model with a tight window
//! websum https://example.com --max-tokens 512 --max-context-length 4096 --verbose
//! ```

use clap::Parser;
use std::process;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use websum::config::Config;
use websum::controller::{Controller, Outcome};

/// Fetch a web page as markdown; summarize it with an LLM when it exceeds
/// the token limit.
#[derive(Parser)]
#[command(name = "websum", version)]
struct Cli {
    /// URL to fetch (http or https)
    url: String,

    /// What the summary should focus on
    #[arg(long)]
    context: Option<String>,

    // ── Endpoint ───────────────────────────────────────────────
    /// OpenAI-compatible API base URL (overrides BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token for the API (overrides API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Model name (overrides MODEL)
    #[arg(long)]
    model: Option<String>,

    // ── Limits ─────────────────────────────────────────────────
    /// Output token limit; shorter pages are returned verbatim (overrides MAX_TOKENS)
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Model context window in tokens (overrides MAX_CONTEXT_LENGTH)
    #[arg(long)]
    max_context_length: Option<usize>,

    /// Summarization timeout in seconds (overrides SUMMARIZER_TIMEOUT)
    #[arg(long)]
    timeout: Option<f64>,

    // ── Output ─────────────────────────────────────────────────
    /// Log request details to stderr
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    /// Environment config with command-line overrides applied.
    fn load_config(&self) -> Result<Config, String> {
        let mut config = match &self.base_url {
            // A base URL on the command line makes BASE_URL optional.
            Some(base) => Config::from_lookup(|name| match name {
                "BASE_URL" => Some(base.clone()),
                other => std::env::var(other).ok(),
            }),
            None => Config::from_env(),
        }
        .map_err(|e| e.to_string())?;

        if let Some(key) = &self.api_key {
            config = config.with_api_key(key);
        }
        if let Some(model) = &self.model {
            config = config.with_model(model);
        }
        if let Some(n) = self.max_tokens {
            config = config.with_max_output_tokens(n);
        }
        if let Some(n) = self.max_context_length {
            config = config.with_max_context_tokens(n);
        }
        if let Some(secs) = self.timeout {
            let timeout = Duration::try_from_secs_f64(secs)
                .map_err(|_| format!("--timeout must be a positive number (got {secs})"))?;
            config = config.with_request_timeout(timeout);
        }

        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "websum=debug" } else { "websum=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli) -> Result<String, String> {
    let config = cli.load_config()?;
    let controller = Controller::from_config(config).map_err(|e| e.to_string())?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let processed = controller
        .process_with_cancel(&cli.url, cli.context.as_deref(), &cancel)
        .await
        .map_err(|e| e.to_string())?;

    if let Outcome::Summarized {
        truncation: Some(t),
    } = processed.outcome
    {
        eprintln!(
            "  Note: page truncated from {} to {} tokens before summarizing",
            t.original_tokens, t.kept_tokens
        );
    }

    Ok(processed.text)
}

#[tokio::main]
async fn main() {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
