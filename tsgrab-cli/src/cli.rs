use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// How the downloaded segments are joined into the output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MergeMode {
    /// Remux with ffmpeg's concat demuxer (stream copy)
    Ffmpeg,
    /// Concatenate the segment bytes directly
    Concat,
}

/// Define CLI arguments
#[derive(Parser)]
#[command(
    version,
    about = "Download an HLS stream into a single file",
    long_about = "Downloads every segment of an HLS media playlist with concurrent workers,\n\
                  decrypts AES-128 segments, and joins them into one output file.\n\
                  \n\
                  The input may be an http(s) URL or a local playlist file. Master playlists\n\
                  are followed to the variant chosen with --quality."
)]
pub struct CliArgs {
    /// Playlist URL or path
    #[arg(help = "URL or path of a master or media playlist")]
    pub input: String,

    /// Output file
    #[arg(short, long, help = "Destination file for the joined stream")]
    pub output: PathBuf,

    /// Number of concurrent segment downloads
    #[arg(
        short,
        long,
        default_value = "4",
        value_parser = clap::value_parser!(u16).range(1..),
        help = "Number of concurrent segment workers"
    )]
    pub channels: u16,

    /// Variant selection for master playlists
    #[arg(
        short,
        long,
        default_value = "best",
        help = "Variant to download from a master playlist: best, worst or WIDTHxHEIGHT"
    )]
    pub quality: String,

    /// Base URL for relative URIs
    #[arg(
        long,
        help = "Resolve relative segment and key URIs against this URL (needed for local playlists)"
    )]
    pub base_url: Option<String>,

    /// Segment retry attempts
    #[arg(
        long,
        default_value = "5",
        help = "Number of retries for a failing segment before the download fails"
    )]
    pub retries: u32,

    /// Retry failing segments forever
    #[arg(
        long,
        conflicts_with = "retries",
        help = "Retry failing segments forever instead of failing the download"
    )]
    pub unbounded_retries: bool,

    /// Reassembly method
    #[arg(long, value_enum, default_value_t = MergeMode::Ffmpeg, help = "How to join the segments")]
    pub merge: MergeMode,

    /// Parent directory for the working directory
    #[arg(long, help = "Directory in which the temporary segment directory is created")]
    pub temp_dir: Option<PathBuf>,

    /// Custom HTTP headers for download requests
    #[arg(
        long = "header",
        short = 'H',
        help = "Add custom HTTP header to requests (can be used multiple times). Format: 'Name: Value'",
        value_name = "HEADER"
    )]
    pub headers: Vec<String>,

    /// User agent
    #[arg(long, help = "User-Agent header for all requests")]
    pub user_agent: Option<String>,

    /// Segment timeout in seconds
    #[arg(
        long,
        default_value = "30",
        help = "Timeout for individual segment downloads in seconds"
    )]
    pub timeout: u64,

    /// Use RFC 8216 IVs
    #[arg(
        long,
        help = "Derive missing IVs from the binary segment sequence number (RFC 8216) instead of the ASCII playlist sequence"
    )]
    pub rfc_iv: bool,

    /// Abort when progress reporting fails
    #[arg(long, help = "Stop the download if progress reporting fails")]
    pub abort_on_progress_error: bool,

    /// Hide the progress bar
    #[arg(long, help = "Do not show a progress bar")]
    pub no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Log file
    #[arg(long, help = "Also write logs to this file")]
    pub log_file: Option<PathBuf>,
}
