use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use run_stream::transport::DEFAULT_READ_CHUNK;
use run_stream::EnvConfig;
use run_stream_http::RunTarget;

#[derive(Parser, Debug)]
#[command(
    name = "run-stream",
    version,
    about = "Post agent runs and print streamed records as JSON lines"
)]
pub struct Cli {
    /// Base URL of the agent server [env: RUN_STREAM_ENDPOINT].
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Whole-request timeout in seconds [env: RUN_STREAM_TIMEOUT_SECS].
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Retries when opening the request fails transiently.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Log filter directive, e.g. `run_stream=debug` [env: RUN_STREAM_LOG].
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an agent or team run and stream its events.
    Run(RunArgs),
    /// POST an arbitrary JSON or form body and stream the response.
    Post(PostArgs),
    /// Parse a captured raw stream from a file or stdin.
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    #[arg(long)]
    pub agent: Option<String>,
    #[arg(long)]
    pub team: Option<String>,
}

impl TargetArgs {
    pub fn into_target(self) -> Option<RunTarget> {
        match (self.agent, self.team) {
            (Some(id), _) => Some(RunTarget::Agent(id)),
            (None, Some(id)) => Some(RunTarget::Team(id)),
            (None, None) => None,
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[arg(long, short)]
    pub message: String,

    #[arg(long)]
    pub session_id: Option<String>,

    /// Extra form field, `key=value`.
    #[arg(long = "field", short = 'F', value_parser = parse_form_field)]
    pub fields: Vec<(String, String)>,

    /// Request header, `key:value`.
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct PostArgs {
    pub url: String,

    /// JSON object body; sent with `content-type: application/json`.
    #[arg(long, conflicts_with = "form")]
    pub json: Option<String>,

    /// Form field, `key=value`; the body is sent as multipart form data.
    #[arg(long, short = 'F', value_parser = parse_form_field)]
    pub form: Vec<(String, String)>,

    /// Request header, `key:value`.
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Captured stream; reads stdin when omitted or `-`.
    pub file: Option<PathBuf>,

    /// Bytes per read, to reproduce small fragments.
    #[arg(long, default_value_t = DEFAULT_READ_CHUNK)]
    pub chunk_size: usize,
}

impl Cli {
    /// Command-line values take precedence over the environment.
    pub fn apply_to(&self, env: &mut EnvConfig) {
        if let Some(endpoint) = &self.endpoint {
            env.endpoint = Some(endpoint.clone());
        }
        if let Some(secs) = self.timeout_secs.filter(|secs| *secs > 0) {
            env.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(log) = &self.log {
            env.log_filter = Some(log.clone());
        }
    }
}

pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    split_pair(raw, ':').ok_or_else(|| format!("expected `key:value`, got {raw:?}"))
}

pub fn parse_form_field(raw: &str) -> Result<(String, String), String> {
    split_pair(raw, '=').ok_or_else(|| format!("expected `key=value`, got {raw:?}"))
}

fn split_pair(raw: &str, separator: char) -> Option<(String, String)> {
    let (key, value) = raw.split_once(separator)?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_owned(), value.trim().to_owned()))
}
