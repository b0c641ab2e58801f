use std::time::Duration;

use clap::Parser;
use error::AppError;
use tracing::{Level, error, info};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use tsgrab_engine::hls::{
    ByteConcat, FfmpegConcat, HlsVariantSelectionPolicy, IvDerivation, ProgressErrorPolicy,
    Reassembler,
};
use tsgrab_engine::protocol_builder::ProtocolBuilder;
use tsgrab_engine::{DownloaderConfig, HlsProtocolBuilder, PlaylistSource};
use url::Url;

mod cli;
mod error;
mod utils;

use cli::{CliArgs, MergeMode};
use utils::progress::ProgressManager;
use utils::{format_bytes, parse_headers};

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "tsgrab failed");
        std::process::exit(1);
    }
}

fn init_logging(args: &CliArgs) -> Result<(), AppError> {
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str()));

    let writer = match &args.log_file {
        Some(path) => {
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?;
            BoxMakeWriter::new(MakeWriterExt::and(std::io::stdout, log_file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(args.log_file.is_none())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();
    init_logging(&args)?;

    let source = PlaylistSource::parse(&args.input)?;
    let quality: HlsVariantSelectionPolicy = args.quality.parse()?;

    let download_config = {
        let mut builder = DownloaderConfig::builder().with_headers(parse_headers(
            DownloaderConfig::get_default_headers(),
            &args.headers,
        ));
        if let Some(user_agent) = &args.user_agent {
            builder = builder.with_user_agent(user_agent);
        }
        builder.build()
    };

    let mut hls_builder = HlsProtocolBuilder::new()
        .with_base_config(download_config)
        .download_concurrency(usize::from(args.channels))
        .max_segment_retries((!args.unbounded_retries).then_some(args.retries))
        .segment_download_timeout(Duration::from_secs(args.timeout))
        .variant_selection_policy(quality)
        .iv_derivation(if args.rfc_iv {
            IvDerivation::BinarySequence
        } else {
            IvDerivation::AsciiSequence
        })
        .progress_error_policy(if args.abort_on_progress_error {
            ProgressErrorPolicy::Abort
        } else {
            ProgressErrorPolicy::Ignore
        });
    if let Some(base_url) = &args.base_url {
        let base_url = Url::parse(base_url)
            .map_err(|e| AppError::InvalidInput(format!("Invalid base URL {base_url}: {e}")))?;
        hls_builder = hls_builder.base_url(base_url);
    }
    if let Some(temp_dir) = &args.temp_dir {
        hls_builder = hls_builder.temp_root(temp_dir);
    }
    let downloader = hls_builder.build()?;

    let reassembler: Box<dyn Reassembler> = match args.merge {
        MergeMode::Ffmpeg => Box::new(FfmpegConcat::locate()?),
        MergeMode::Concat => Box::new(ByteConcat),
    };

    info!(
        input = %source,
        output = %args.output.display(),
        channels = args.channels,
        quality = ?quality,
        merge = reassembler.name(),
        "Starting download"
    );

    let progress = if args.no_progress {
        ProgressManager::new_disabled()
    } else {
        ProgressManager::new(format!("Downloading {source}"))
    };
    let result = downloader
        .download(
            &source,
            &args.output,
            reassembler.as_ref(),
            Some(progress.callback()),
        )
        .await;

    match result {
        Ok(summary) => {
            progress.finish(format!("Saved {}", summary.output.display()));
            info!(
                "Saved {} segments ({}) to {} in {:.2}s",
                summary.segments,
                format_bytes(summary.bytes),
                summary.output.display(),
                summary.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            progress.abandon();
            Err(e.into())
        }
    }
}
