use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressStyle};
use rowcount_scanner::{
    content::ContentFormat,
    fs::LocalFs,
    models::{ScanOptions, ScanTarget, Strategy, DEFAULT_BUFFER_SIZE, DEFAULT_PATTERN},
    resolver::PathResolver,
    scanner::TreeScanner,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "rowcount-scanner")]
#[command(author, version, about = "Count rows, bytes and files of matching files in a remote storage tree", long_about = None)]
#[command(after_help = "Prints: <row_count> <total_file_size> <num_of_files>")]
struct Cli {
    /// File or directory to scan recursively: hdfs://[user@]<host>:<port>/<path>,
    /// or <path> when a default server is set
    location: String,

    /// Glob pattern to match file names when <LOCATION> is a directory
    #[arg(short, long, default_value = DEFAULT_PATTERN)]
    pattern: String,

    /// Use a single thread
    #[arg(short, long)]
    single_thread: bool,

    /// Number of worker threads (default: number of CPU cores)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Work queue capacity (default: number of workers)
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Reader buffer size in bytes
    #[arg(short, long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Record format of the scanned files
    #[arg(short, long, value_enum, default_value_t = ContentFormat::Avro)]
    format: ContentFormat,

    /// Local directory where the remote namespace is mounted
    #[arg(long, env = "ROWCOUNT_MOUNT_ROOT", default_value = "/")]
    mount_root: PathBuf,

    /// Server '<host>:<port>' to use when <LOCATION> does not name one
    #[arg(long, env = "HADOOP_NAMENODE")]
    namenode: Option<String>,

    /// User name (default: current user)
    #[arg(long, env = "HADOOP_USER_NAME")]
    user: Option<String>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose)?;

    run(cli)
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

fn scan_options(cli: &Cli) -> ScanOptions {
    let mut options = ScanOptions::with_workers(cli.workers.unwrap_or_else(num_cpus::get));
    if let Some(capacity) = cli.queue_capacity {
        options.queue_capacity = capacity;
    }
    options.buffer_size = cli.buffer_size;
    options
}

fn run(cli: Cli) -> Result<()> {
    info!("rowcount-scanner v{}", env!("CARGO_PKG_VERSION"));

    let resolved = PathResolver::new()
        .with_default_server(cli.namenode.clone())
        .with_default_user(cli.user.clone())
        .resolve(&cli.location)
        .context("Invalid location")?;

    let strategy = if cli.single_thread {
        Strategy::Sequential
    } else {
        Strategy::Concurrent
    };
    let target = ScanTarget::new(resolved.path.clone(), &cli.pattern, strategy)
        .context("Invalid pattern")?;
    let options = scan_options(&cli);

    info!("Scan configuration:");
    info!("  Server: {}", resolved.server);
    info!("  User: {}", resolved.identity.as_deref().unwrap_or("<none>"));
    info!("  Mount root: {}", cli.mount_root.display());
    info!("  Path: {}", target.root);
    info!("  Format: {:?}", cli.format);
    info!("  Reader buffer size: {}", HumanBytes(options.buffer_size as u64));
    if strategy == Strategy::Sequential {
        info!("  Single thread mode");
    } else {
        info!("  Workers: {}", options.workers);
    }

    let fs = LocalFs::new(&cli.mount_root);
    let content = cli.format.scanner();

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    progress.set_message(format!("Scanning {}", target.root));
    progress.enable_steady_tick(Duration::from_millis(120));

    let result = TreeScanner::new(&fs, content.as_ref(), options).scan(&target);
    progress.finish_and_clear();

    let report = result.with_context(|| format!("Scan of {} failed", target.root))?;

    info!(
        "Finished in {} ({:.0} files/second)",
        HumanDuration(Duration::from_secs_f64(report.duration_secs)),
        report.files_per_second()
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let totals = report.aggregate;
        println!("{} {} {}", totals.rows, totals.bytes, totals.files);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parsing() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["rowcount-scanner", "/data"]).unwrap();
        assert_eq!(cli.pattern, "*.avro");
        assert_eq!(cli.format, ContentFormat::Avro);
        assert_eq!(cli.buffer_size, 32 * 1024);
        assert!(!cli.single_thread);
    }

    #[test]
    fn test_scan_options_from_flags() {
        let cli = Cli::try_parse_from([
            "rowcount-scanner",
            "-w",
            "3",
            "--queue-capacity",
            "0",
            "-b",
            "4096",
            "-f",
            "lines",
            "hdfs://nn:8020/data",
        ])
        .unwrap();

        let options = scan_options(&cli);
        assert_eq!(options.workers, 3);
        assert_eq!(options.queue_capacity, 0);
        assert_eq!(options.buffer_size, 4096);
        assert_eq!(cli.format, ContentFormat::Lines);
    }
}
