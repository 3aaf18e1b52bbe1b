mod cli;
mod output;

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::Value;
use tokio::io::AsyncRead;
use tracing::{debug, info};

use run_stream::cancel::CancelSignal;
use run_stream::logging::init_logging;
use run_stream::{
    cancel_signal, EnvConfig, ReaderTransport, RecordSink, StreamDriver, StreamSummary,
};
use run_stream_http::{FormBody, HttpStreamClient, HttpStreamConfig, RunRequest, StreamRequest};

use crate::cli::{Cli, Command, PostArgs, ReplayArgs, RunArgs};
use crate::output::JsonLinesSink;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut env = EnvConfig::from_env();
    cli.apply_to(&mut env);
    init_logging(&env);

    match run(cli, env).await {
        Ok(records) => {
            debug!(records, "done");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("run-stream: {error:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, env: EnvConfig) -> anyhow::Result<usize> {
    let cancel = cancel_signal();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::Release);
            }
        }
    });

    let mut http_config = HttpStreamConfig::from_env(&env);
    if let Some(max_retries) = cli.max_retries {
        http_config = http_config.with_max_retries(max_retries);
    }

    let mut sink = JsonLinesSink::new(io::stdout().lock());
    let summary = match cli.command {
        Command::Run(args) => run_agent(args, http_config, &cancel, &mut sink).await?,
        Command::Post(args) => post(args, http_config, &cancel, &mut sink).await?,
        Command::Replay(args) => replay(args, &cancel, &mut sink).await?,
    };
    info!(
        state = summary.state.as_str(),
        records = summary.records,
        fragments = summary.fragments,
        bytes = summary.bytes,
        skipped = summary.skipped_spans,
        "stream finished"
    );

    sink.finish()
}

async fn run_agent(
    args: RunArgs,
    config: HttpStreamConfig,
    cancel: &CancelSignal,
    sink: &mut impl RecordSink,
) -> anyhow::Result<StreamSummary> {
    let Some(target) = args.target.into_target() else {
        bail!("either --agent or --team is required");
    };
    let client = HttpStreamClient::new(config).context("failed to build HTTP client")?;

    let mut run = RunRequest::new(args.message);
    if let Some(session_id) = args.session_id {
        run = run.with_session_id(session_id);
    }
    for (key, value) in args.fields {
        run = run.with_field(key, value);
    }
    let request = run
        .into_stream_request(client.run_endpoint(&target))
        .with_headers(args.headers);

    debug!(run_target = %target, url = %request.url, "starting run");
    Ok(client.stream(&request, Some(cancel), sink).await)
}

async fn post(
    args: PostArgs,
    config: HttpStreamConfig,
    cancel: &CancelSignal,
    sink: &mut impl RecordSink,
) -> anyhow::Result<StreamSummary> {
    let client = HttpStreamClient::new(config).context("failed to build HTTP client")?;

    let request = match args.json {
        Some(raw) => match serde_json::from_str::<Value>(&raw).context("--json is not valid JSON")? {
            Value::Object(body) => StreamRequest::json(args.url, body),
            _ => bail!("--json must be a JSON object"),
        },
        None => StreamRequest::form(args.url, args.form.into_iter().collect::<FormBody>()),
    };
    let request = request.with_headers(args.headers);

    Ok(client.stream(&request, Some(cancel), sink).await)
}

async fn replay(
    args: ReplayArgs,
    cancel: &CancelSignal,
    sink: &mut impl RecordSink,
) -> anyhow::Result<StreamSummary> {
    match args.file.as_deref() {
        Some(path) if path != Path::new("-") => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(replay_reader(file, args.chunk_size, cancel, sink).await)
        }
        _ => Ok(replay_reader(tokio::io::stdin(), args.chunk_size, cancel, sink).await),
    }
}

async fn replay_reader<R>(
    reader: R,
    chunk_size: usize,
    cancel: &CancelSignal,
    sink: &mut impl RecordSink,
) -> StreamSummary
where
    R: AsyncRead + Unpin + Send,
{
    StreamDriver::new(ReaderTransport::with_chunk_size(reader, chunk_size))
        .with_cancellation(cancel.clone())
        .run(sink)
        .await
}
