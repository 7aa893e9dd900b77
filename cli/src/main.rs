//! fxfiles - Command-line interface for the artifact engine.
//!
//! A thin caller of the engine for testing and manual use. Results go to
//! stdout; progress, logs and errors go to stderr. Copy and move run on a
//! worker thread that streams progress ticks back over a channel.

use std::fs;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand, ValueEnum};
use crossbeam_channel::unbounded;
use fxfiles_engine::{
    compute_file_checksum, create_batch, run_batch, ArtifactCategorySearchType,
    ArtifactDateSearchType, ChecksumAlgorithm, DeepSearchFilter, EngineConfig, EngineError,
    FsArtifact, LocalArtifactRepository, Mode, ProgressInfo, TransferBatch,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// fxfiles - Browse, copy, move and search files
#[derive(Parser, Debug)]
#[command(name = "fxfiles")]
#[command(version)]
#[command(about = "Browse, copy, move and search files")]
struct Cli {
    /// TOML configuration file (drives, external media roots)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List ready drives
    Drives,

    /// List the visible children of a folder, or the drives when omitted
    Ls { path: Option<PathBuf> },

    /// Show one artifact
    Stat { path: PathBuf },

    /// Create a folder
    Mkdir { parent: PathBuf, name: String },

    /// Create a file from stdin, or from another file
    Create {
        path: PathBuf,

        /// Read content from this file instead of stdin
        #[arg(long, value_name = "FILE")]
        from: Option<PathBuf>,
    },

    /// Rename a file or folder in place
    Rename { path: PathBuf, new_name: String },

    /// Delete files and folders
    Rm {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Copy files and folders into a destination folder
    Cp(TransferArgs),

    /// Move files and folders into a destination folder
    Mv(TransferArgs),

    /// Search a folder, or every drive
    Search(SearchArgs),

    /// Report whether paths still exist
    Check {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the checksum of a file
    Checksum {
        path: PathBuf,

        /// md5, sha256 or blake3
        #[arg(long, value_name = "ALGORITHM", default_value = "sha256")]
        algorithm: ChecksumAlgorithm,
    },
}

#[derive(Args, Debug)]
struct TransferArgs {
    /// Files and folders to transfer
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Destination folder
    #[arg(long, value_name = "PATH")]
    dst: PathBuf,

    /// Replace existing files instead of skipping them
    #[arg(long)]
    overwrite: bool,

    /// Verify every copied file with this checksum: md5, sha256, blake3
    #[arg(long, value_name = "ALGORITHM")]
    verify: Option<ChecksumAlgorithm>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Folder to search; every drive when omitted
    #[arg(long, value_name = "PATH")]
    root: Option<PathBuf>,

    /// Case-insensitive part of the name
    #[arg(long)]
    text: Option<String>,

    #[arg(long, value_enum)]
    category: Option<CategoryArg>,

    /// Only artifacts modified within this window
    #[arg(long, value_enum)]
    modified: Option<DateArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    Document,
    Image,
    Video,
    Audio,
    Archive,
}

impl From<CategoryArg> for ArtifactCategorySearchType {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Document => Self::Document,
            CategoryArg::Image => Self::Image,
            CategoryArg::Video => Self::Video,
            CategoryArg::Audio => Self::Audio,
            CategoryArg::Archive => Self::Archive,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateArg {
    Yesterday,
    Week,
    Month,
}

impl From<DateArg> for ArtifactDateSearchType {
    fn from(arg: DateArg) -> Self {
        match arg {
            DateArg::Yesterday => Self::Yesterday,
            DateArg::Week => Self::Past7Days,
            DateArg::Month => Self::Past30Days,
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

fn format_time(time: Option<DateTime<Local>>, format: &str) -> String {
    time.map(|t| t.format(format).to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_progress_bar(current: usize, max: usize) -> String {
    let percent = if max == 0 { 100 } else { current * 100 / max };
    let filled = percent / 5;
    format!("[{}{}] {}%", "=".repeat(filled), " ".repeat(20 - filled), percent)
}

fn render_progress(info: &ProgressInfo) {
    eprint!(
        "\r{} {} ({})   ",
        print_progress_bar(info.current_value, info.max_value),
        info.current_text,
        info.current_sub_text
    );
    let _ = io::stderr().flush();
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "fxfiles_engine=debug,fxfiles=debug"
    } else {
        "fxfiles_engine=info,fxfiles=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let stdout = io::stdout();
    let exit_code = match run_cli(&cli, &mut stdout.lock()) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(cli: &Cli, out: &mut impl Write) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let repo = LocalArtifactRepository::new(config);

    match &cli.command {
        Command::Drives => {
            for drive in repo.get_drives() {
                writeln!(out, "{}\t{}", drive.name, drive.full_path.display())?;
            }
        }
        Command::Ls { path } => {
            for artifact in repo.get_artifacts(path.as_deref(), None)? {
                writeln!(out, "{}", list_line(&artifact))?;
            }
        }
        Command::Stat { path } => {
            let artifact = repo.get_artifact(path)?;
            write_details(out, &artifact)?;
        }
        Command::Mkdir { parent, name } => {
            let folder = repo.create_folder(parent, name)?;
            writeln!(out, "{}", folder.full_path.display())?;
        }
        Command::Create { path, from } => {
            let file = match from {
                Some(source) => {
                    let content = fs::File::open(source)
                        .with_context(|| format!("Failed to open {}", source.display()))?;
                    repo.create_file(path, BufReader::new(content))?
                }
                None => repo.create_file(path, io::stdin().lock())?,
            };
            writeln!(out, "{}", file.full_path.display())?;
        }
        Command::Rename { path, new_name } => {
            let renamed = match repo.get_artifact(path)? {
                artifact if artifact.is_file() => repo.rename_file(path, new_name)?,
                _ => repo.rename_folder(path, new_name)?,
            };
            writeln!(out, "{}", renamed.full_path.display())?;
        }
        Command::Rm { paths } => {
            let artifacts = resolve_all(&repo, paths)?;
            let deleted = repo.delete_artifacts(&artifacts, Some(&render_progress), None)?;
            eprintln!();
            writeln!(out, "Deleted {} artifacts", deleted)?;
        }
        Command::Cp(args) => transfer(&repo, Mode::Copy, args, out)?,
        Command::Mv(args) => transfer(&repo, Mode::Move, args, out)?,
        Command::Search(args) => {
            let filter = DeepSearchFilter {
                search_text: args.text.clone(),
                category: args.category.map(Into::into),
                date_range: args.modified.map(Into::into),
            };
            let results = match &args.root {
                Some(root) => repo.search_in(root, filter, None),
                None => repo.search_artifacts(filter, None),
            };
            let mut count = 0;
            for artifact in results {
                writeln!(out, "{}", artifact.full_path.display())?;
                count += 1;
            }
            tracing::info!(count, "search finished");
        }
        Command::Check { paths } => {
            for change in repo.check_path_exists(paths, None)? {
                let modified = format_time(change.last_modified, "%Y-%m-%d %H:%M:%S");
                writeln!(
                    out,
                    "{:?}\t{}\t{}",
                    change.changes_type,
                    modified,
                    change.artifact_full_path.display()
                )?;
            }
        }
        Command::Checksum { path, algorithm } => {
            let value = compute_file_checksum(path, *algorithm)?;
            writeln!(out, "{}  {}", value, path.display())?;
        }
    }

    Ok(())
}

fn resolve_all(repo: &LocalArtifactRepository, paths: &[PathBuf]) -> anyhow::Result<Vec<FsArtifact>> {
    paths
        .iter()
        .map(|path| {
            repo.get_artifact(path)
                .with_context(|| format!("Can not use {}", path.display()))
        })
        .collect()
}

fn list_line(artifact: &FsArtifact) -> String {
    let size = artifact
        .size
        .map(format_bytes)
        .unwrap_or_else(|| "-".to_string());
    let modified = format_time(artifact.last_modified, "%Y-%m-%d %H:%M");
    format!("{:<6} {:>12}  {:<16}  {}", artifact.artifact_type.label(), size, modified, artifact.name)
}

fn write_details(out: &mut impl Write, artifact: &FsArtifact) -> io::Result<()> {
    writeln!(out, "Name:      {}", artifact.name)?;
    writeln!(out, "Path:      {}", artifact.full_path.display())?;
    writeln!(out, "Type:      {}", artifact.artifact_type)?;
    writeln!(out, "Provider:  {:?}", artifact.provider_type)?;
    if let Some(extension) = &artifact.file_extension {
        writeln!(out, "Extension: {}", extension)?;
    }
    if let Some(size) = artifact.size {
        writeln!(out, "Size:      {} ({} bytes)", format_bytes(size), size)?;
    }
    if let Some(modified) = artifact.last_modified {
        writeln!(out, "Modified:  {}", modified.format("%Y-%m-%d %H:%M:%S"))?;
    }
    Ok(())
}

/// Run a copy or move on a worker thread, rendering its progress here.
fn transfer(
    repo: &LocalArtifactRepository,
    mode: Mode,
    args: &TransferArgs,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let artifacts = resolve_all(repo, &args.sources)?;
    let started = Instant::now();
    let (tx, rx) = unbounded::<ProgressInfo>();

    let result = thread::scope(|scope| {
        let worker = scope.spawn(move || {
            let callback = move |info: &ProgressInfo| {
                let _ = tx.send(info.clone());
            };
            run_transfer(repo, mode, artifacts, args, &callback)
        });

        // Ends once the worker drops its sender.
        for info in rx.iter() {
            render_progress(&info);
        }
        worker.join()
    });
    eprintln!();

    let result = result.map_err(|_| anyhow!("Transfer worker panicked"))?;
    match result {
        Ok(batch) => {
            writeln!(
                out,
                "{} {:?}: {} of {} artifacts, {} files, {} in {}",
                mode,
                batch.state,
                batch.processed,
                batch.artifacts.len(),
                batch.files_transferred,
                format_bytes(batch.bytes_transferred),
                format_duration(started.elapsed())
            )?;
            Ok(())
        }
        Err(EngineError::CanNotOperateOnFiles { ignored }) => {
            eprintln!("Skipped, destination already exists:");
            for artifact in &ignored {
                eprintln!("  {}", artifact.full_path.display());
            }
            bail!(
                "{} artifacts were skipped; rerun with --overwrite to replace them",
                ignored.len()
            )
        }
        Err(e) => Err(e.into()),
    }
}

fn run_transfer(
    repo: &LocalArtifactRepository,
    mode: Mode,
    artifacts: Vec<FsArtifact>,
    args: &TransferArgs,
    progress: &dyn fxfiles_engine::ProgressCallback,
) -> Result<TransferBatch, EngineError> {
    let mut batch = create_batch(artifacts, &args.dst, mode, args.overwrite)?;
    batch.verify = args.verify;
    run_batch(&mut batch, repo, Some(progress), None)?;
    batch.into_result()
}
