use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod error;
pub mod fetcher;
pub mod gate;
pub mod ledger;
pub mod mirror;
pub mod playlist;
pub mod url_map;

use config::MirrorConfig;
use error::MirrorError;
use fetcher::HttpFetcher;
use ledger::MirrorReport;

/// Mirror an HLS package (playlists, variants, renditions and segments) to disk.
#[derive(clap::Parser, Debug)]
struct CommandLineArgs {
    /// Root playlist URL (http/https, .m3u8)
    #[arg(long)]
    url: String,
    /// Output folder to store files, defaults to the playlist's parent directory name
    #[arg(short, long)]
    output_directory: Option<PathBuf>,
    /// Bearer token sent with every request
    #[arg(long)]
    token: Option<String>,
    /// Maximum number of concurrent segment downloads
    #[arg(short = 'j', long, default_value_t = gate::DEFAULT_CONCURRENCY as i64, allow_negative_numbers = true)]
    concurrency: i64,
    /// Request timeout in seconds
    #[arg(long, default_value_t = config::DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::builder()
            .with_default_directive(Level::INFO.into())
            .from_env_lossy()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(args: CommandLineArgs) -> Result<MirrorReport, MirrorError> {
    let config = MirrorConfig::new(&args.url, args.output_directory)?
        .with_auth_token(args.token)
        .with_concurrency(args.concurrency)?
        .with_timeout(Duration::from_secs(args.timeout))?;
    info!(
        url = %config.root_url,
        output = %config.output_dir.display(),
        concurrency = config.concurrency,
        "mirroring"
    );

    let fetcher = HttpFetcher::new(config.timeout)?;
    mirror::mirror(&config, Arc::new(fetcher))
}

fn main() -> ExitCode {
    let args = CommandLineArgs::parse();
    init_logging(args.verbose, args.quiet);

    match run(args) {
        Ok(report) => {
            info!(
                bytes_downloaded = report.bytes_downloaded,
                bytes_total = report.bytes_total,
                files_downloaded = report.files_downloaded,
                files_total = report.files_total,
                failures = report.failures,
                "done"
            );
            println!("Done: {report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
