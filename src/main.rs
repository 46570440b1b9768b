//! CLI entry point for the conference session downloader.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use confdl_core::{
    HttpClient, Pipeline, PipelineConfig, RetryLimit, TcpReachability, TransferEngine,
};
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let quality = args.quality();
    if args.want_video() {
        info!(
            quality = quality.label(),
            dir = %args.output_dir.display(),
            "downloading videos"
        );
    }

    tokio::fs::create_dir_all(&args.output_dir).await?;

    let retry_limit = match args.max_retries {
        0 => RetryLimit::Unlimited,
        n => {
            info!(max_retries = n, "bounded retries enabled (deviates from retry-forever default)");
            RetryLimit::Bounded(n)
        }
    };

    let engine = TransferEngine::new(HttpClient::new(), Arc::new(TcpReachability::new()))
        .with_retry_limit(retry_limit);

    let config = PipelineConfig {
        base_url: args.base_url.clone(),
        edition: args.edition.clone(),
        output_dir: args.output_dir.clone(),
        quality,
        want_video: args.want_video(),
        want_pdf: args.want_pdf(),
        want_sample: args.want_sample(),
        sessions: args.sessions.clone(),
        list_only: args.list_only,
        show_progress: !args.quiet,
    };

    info!(edition = %config.edition, "asking the catalog for available sessions, this can take a moment");

    let pipeline = Pipeline::new(engine, config);
    let summary = pipeline.run().await?;

    info!(
        sessions = summary.sessions,
        completed = summary.completed,
        not_available = summary.not_available,
        failed = summary.failed,
        "run finished"
    );

    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
