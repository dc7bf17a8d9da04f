//! dropstow - batch file mover with duplicate detection and undo.
//!
//! Usage:
//!   dstow move <SOURCES>... --to <DIR>   Move items into a folder
//!   dstow check <SOURCE> <DEST>          Compare two files
//!   dstow hash <PATH>                    SHA-256 of a file
//!   dstow history                        Show recorded moves
//!   dstow undo <ID>...                   Move items back
//!   dstow clear-history                  Forget recorded moves
//!   dstow --help                         Show help

use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use dropstow_analyze::{DuplicateConfig, DuplicateDetector};
use dropstow_core::{DroppedItem, DuplicateCheckResult, EngineConfig, MoveError};
use dropstow_ops::{
    BatchEvent, BatchExecutor, BatchOperationResult, BatchPlanner, CategoryResolver,
    ConflictRequest, DuplicateAction, DuplicateDecision, DuplicatePolicy, FixedResolver, FsMover,
    OperationJournal, PrimitiveMover, UndoAvailable, UndoCoordinator, UndoEvent, start_batch_move,
};

#[derive(Parser)]
#[command(
    name = "dropstow",
    version,
    about = "Move batches of files with duplicate detection and undo",
    long_about = "dropstow moves dropped files and folders into destination folders.\n\n\
                  Duplicates are detected by size, date and SHA-256 before anything is \
                  moved, every move is journaled, and recent moves can be undone."
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Move files and folders into a destination
    Move {
        /// Files and folders to move
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Destination folder (the root folder with --by-category)
        #[arg(short, long)]
        to: PathBuf,

        /// Sort items into per-category subfolders of the destination
        #[arg(short = 'c', long)]
        by_category: bool,

        /// What to do with duplicates
        #[arg(short, long, value_enum, default_value = "ask")]
        policy: PolicyArg,

        /// Send removed duplicate sources to the trash
        #[arg(long)]
        trash: bool,

        /// Do not offer to undo the batch when it finishes
        #[arg(long)]
        no_undo: bool,
    },

    /// Check whether a destination already holds a source's content
    Check {
        /// Source file
        source: PathBuf,

        /// Destination file
        destination: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the SHA-256 of a file
    Hash {
        /// File to hash
        path: PathBuf,
    },

    /// Show recorded moves, newest first
    History {
        /// Maximum number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Move recorded items back to where they came from
    Undo {
        /// Journal IDs to undo
        #[arg(required = true)]
        ids: Vec<u64>,
    },

    /// Forget every recorded move
    ClearHistory,

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        write: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
enum PolicyArg {
    /// Ask for each duplicate
    #[default]
    Ask,
    /// Leave duplicates where they are
    Skip,
    /// Overwrite duplicates at the destination
    Replace,
    /// Move duplicates under a new name
    KeepBoth,
    /// Delete sources whose content is already at the destination
    DeleteSource,
}

impl From<PolicyArg> for DuplicatePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Ask => Self::Ask,
            PolicyArg::Skip => Self::SkipAll,
            PolicyArg::Replace => Self::ReplaceAll,
            PolicyArg::KeepBoth => Self::KeepBothAll,
            PolicyArg::DeleteSource => Self::DeleteSourceAll,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = EngineConfig::load().context("Cannot load configuration")?;

    match cli.command {
        Command::Move {
            sources,
            to,
            by_category,
            policy,
            trash,
            no_undo,
        } => {
            let options = MoveOptions {
                by_category,
                policy: policy.into(),
                use_trash: trash || config.use_trash,
                offer_undo: !no_undo,
            };
            run_move(&config, sources, to, options).await?;
        }
        Command::Check {
            source,
            destination,
            format,
        } => {
            run_check(&config, &source, &destination, format).await?;
        }
        Command::Hash { path } => {
            run_hash(&config, &path).await?;
        }
        Command::History { limit, format } => {
            run_history(&config, limit, format).await?;
        }
        Command::Undo { ids } => {
            run_undo(&config, &ids).await?;
        }
        Command::ClearHistory => {
            let journal = open_journal(&config, Arc::new(FsMover::new())).await?;
            let count = journal.len().await;
            journal.clear().await?;
            println!("Cleared {count} history entries.");
        }
        Command::Config { write } => {
            run_config(&config, write)?;
        }
    }

    Ok(())
}

/// Install the stderr log subscriber.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env("DROPSTOW_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

struct MoveOptions {
    by_category: bool,
    policy: DuplicatePolicy,
    use_trash: bool,
    offer_undo: bool,
}

/// Plan and run a batch, prompting on stdin for duplicates.
async fn run_move(
    config: &EngineConfig,
    sources: Vec<PathBuf>,
    to: PathBuf,
    options: MoveOptions,
) -> Result<()> {
    let items = sources
        .into_iter()
        .map(dropped_item)
        .collect::<Result<Vec<_>>>()?;

    let planner = if options.by_category {
        BatchPlanner::new(CategoryResolver::new(&to))
    } else {
        BatchPlanner::new(FixedResolver::new(&to))
    };
    let groups = planner.group_items_by_destination(items).await?;

    let mover: Arc<dyn PrimitiveMover> = Arc::new(FsMover {
        use_trash: options.use_trash,
    });
    let journal = Arc::new(open_journal(config, Arc::clone(&mover)).await?);
    let detector = Arc::new(DuplicateDetector::with_config(DuplicateConfig::from(config)));
    let coordinator = Arc::new(UndoCoordinator::new());
    let mut undo_events = coordinator.subscribe();

    let executor = Arc::new(
        BatchExecutor::new(detector, mover, journal)
            .with_undo_window(Arc::clone(&coordinator), config.undo_expiration()),
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nCancelling...");
                cancel.cancel();
            }
        });
    }

    let mut stdin = StdinLines::default();
    let mut rx = start_batch_move(executor, groups, options.policy, cancel.clone());
    let mut result = None;

    while let Some(event) = rx.recv().await {
        match event {
            BatchEvent::Progress(progress) => {
                eprintln!(
                    "[{:>3}%] {} - {}",
                    progress.percent(),
                    progress.current_item,
                    progress.status_text
                );
            }
            BatchEvent::Conflict(request) => {
                let decision = tokio::select! {
                    decision = prompt_decision(&request, &mut stdin) => decision,
                    _ = cancel.cancelled() => None,
                };
                match decision {
                    Some(decision) => {
                        request.respond(decision);
                    }
                    // No answer: the item fails
                    None => drop(request),
                }
            }
            BatchEvent::Complete(done) => result = Some(done),
        }
    }

    let result = result.ok_or_else(|| eyre!("Batch ended without a result"))?;
    print_result(&result);

    let offer = latest_undo_offer(&mut undo_events).zip(coordinator.remaining());
    if let Some((info, remaining)) =
        offer.filter(|_| options.offer_undo && std::io::stdin().is_terminal())
    {
        println!();
        println!(
            " Press Enter within {}s to undo: {}",
            remaining.as_secs(),
            info.description
        );

        let wants_undo = tokio::select! {
            line = stdin.next() => line.is_some(),
            _ = tokio::time::sleep(remaining) => false,
            _ = cancel.cancelled() => false,
        };

        if wants_undo {
            let report = coordinator.execute_undo().await;
            println!(
                " Undid {} item(s), {} failed",
                report.undone_count, report.failed_count
            );
            if let Some(message) = report.error_message.filter(|_| !report.success) {
                println!("   {message}");
            }
        }
    }

    if result.has_errors() {
        return Err(eyre!("{} item(s) could not be moved", result.failed_count));
    }

    Ok(())
}

/// The most recent undo offer waiting in `events`.
///
/// A receiver that fell behind skips the events it missed and keeps reading.
fn latest_undo_offer(events: &mut broadcast::Receiver<UndoEvent>) -> Option<UndoAvailable> {
    let mut latest = None;
    loop {
        match events.try_recv() {
            Ok(UndoEvent::Available(info)) => latest = Some(info),
            Ok(UndoEvent::Executed(_)) => latest = None,
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "undo events lagged");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return latest,
        }
    }
}

/// Build a dropped item, letting missing sources fail inside the batch.
fn dropped_item(path: PathBuf) -> Result<DroppedItem> {
    match DroppedItem::from_path(&path) {
        Ok(item) => Ok(item),
        Err(MoveError::NotFound { .. }) => {
            tracing::warn!(path = %path.display(), "source does not exist");
            Ok(DroppedItem::new(path, false, 0))
        }
        Err(e) => Err(e).with_context(|| format!("Cannot read {}", path.display())),
    }
}

/// Ask how to resolve a duplicate. Returns `None` when stdin is closed.
async fn prompt_decision(
    request: &ConflictRequest,
    stdin: &mut StdinLines,
) -> Option<DuplicateDecision> {
    let name = request
        .source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let folder = request
        .destination
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let match_kind = if request.check.is_exact_match {
        "identical"
    } else {
        "probably identical"
    };

    eprintln!();
    eprintln!(
        " '{}' already exists in {} ({}, {})",
        name, folder, match_kind, request.check.comparison_method
    );

    loop {
        eprint!(" [s]kip, [r]eplace, [k]eep both, [d]elete source (capital = all): ");
        let _ = std::io::stderr().flush();

        let line = stdin.next().await?;
        if let Some(decision) = parse_decision(&line) {
            return Some(decision);
        }
    }
}

/// Parse a one-letter answer; an upper-case letter applies to the rest of the batch.
fn parse_decision(answer: &str) -> Option<DuplicateDecision> {
    let mut chars = answer.trim().chars();
    let letter = chars.next()?;
    if chars.next().is_some() {
        return None;
    }

    let action = match letter.to_ascii_lowercase() {
        's' => DuplicateAction::Skip,
        'r' => DuplicateAction::Replace,
        'k' => DuplicateAction::KeepBoth,
        'd' => DuplicateAction::DeleteSource,
        _ => return None,
    };

    Some(if letter.is_ascii_uppercase() {
        DuplicateDecision::for_all(action)
    } else {
        DuplicateDecision::once(action)
    })
}

/// Lines typed on stdin, read on a dedicated thread once first needed.
#[derive(Default)]
struct StdinLines {
    rx: Option<mpsc::UnboundedReceiver<String>>,
}

impl StdinLines {
    async fn next(&mut self) -> Option<String> {
        let rx = self.rx.get_or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            // A plain thread, so a pending read never holds up shutdown.
            std::thread::spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
            rx
        });
        rx.recv().await
    }
}

fn print_result(result: &BatchOperationResult) {
    println!();
    println!("{}", "─".repeat(60));
    println!(" {}", result.summary());
    println!(
        " {} moved into {} folder(s)",
        format_size(result.bytes_moved()),
        result.destination_count
    );
    println!("{}", "─".repeat(60));

    for op in &result.operations {
        println!(
            "   #{:<5} {} → {}",
            op.id,
            op.item_name,
            op.destination_path.display()
        );
    }
    for error in &result.errors {
        println!("   ✗ {error}");
    }
}

/// Compare a source with a destination.
async fn run_check(
    config: &EngineConfig,
    source: &Path,
    destination: &Path,
    format: OutputFormat,
) -> Result<()> {
    let detector = DuplicateDetector::with_config(DuplicateConfig::from(config));
    let result = detector
        .check_for_duplicate(source, destination, &CancellationToken::new())
        .await?;

    match format {
        OutputFormat::Text => print_check(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    if let Some(error) = &result.error {
        return Err(eyre!("{error}"));
    }
    Ok(())
}

fn print_check(result: &DuplicateCheckResult) {
    let verdict = match (result.is_duplicate, result.is_exact_match) {
        (true, true) => "duplicate (identical content)",
        (true, false) => "probable duplicate (same size and date)",
        (false, _) => "not a duplicate",
    };

    println!(" Result: {verdict}");
    println!(" Method: {}", result.comparison_method);
    for (label, info) in [("Source", &result.source), ("Destination", &result.destination)] {
        if let Some(info) = info {
            println!(
                " {label}: {} ({})",
                info.path.display(),
                format_size(info.size)
            );
            if let Some(hash) = &info.hash {
                println!("   {hash}");
            }
        }
    }
}

/// Print a file's SHA-256 like sha256sum does.
async fn run_hash(config: &EngineConfig, path: &Path) -> Result<()> {
    let detector = DuplicateDetector::with_config(DuplicateConfig::from(config));
    let hash = detector
        .compute_file_hash(path, &CancellationToken::new())
        .await
        .with_context(|| format!("Cannot hash {}", path.display()))?;

    println!("{hash}  {}", path.display());
    Ok(())
}

async fn run_history(config: &EngineConfig, limit: usize, format: OutputFormat) -> Result<()> {
    let journal = open_journal(config, Arc::new(FsMover::new())).await?;
    let entries = journal.recent(limit).await;

    match format {
        OutputFormat::Text => {
            if entries.is_empty() {
                println!(" No recorded moves.");
                return Ok(());
            }
            for entry in &entries {
                println!(
                    " #{:<5} {:<7} {}  {} → {} ({})",
                    entry.id,
                    entry.status.to_string(),
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.source_path.display(),
                    entry.destination_path.display(),
                    format_size(entry.size_bytes)
                );
                if let Some(message) = &entry.error_message {
                    println!("          {message}");
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}

async fn run_undo(config: &EngineConfig, ids: &[u64]) -> Result<()> {
    let journal = open_journal(config, Arc::new(FsMover::new())).await?;
    let summary = journal.undo_multiple(ids).await;

    println!(" Undid {} item(s), {} failed", summary.succeeded, summary.failed);
    for (id, message) in &summary.errors {
        println!("   #{id}: {message}");
    }

    if !summary.is_success() {
        return Err(eyre!("{} undo(s) failed", summary.failed));
    }
    Ok(())
}

fn run_config(config: &EngineConfig, write: bool) -> Result<()> {
    let path = EngineConfig::config_path();
    match &path {
        Some(path) => println!(" Config file: {}", path.display()),
        None => println!(" Config file: (no config directory)"),
    }
    if let Some(history) = config.resolved_history_path() {
        println!(" History:     {}", history.display());
    }
    println!("{}", serde_json::to_string_pretty(config)?);

    if write {
        config.save().context("Cannot write configuration")?;
        println!(" Configuration written.");
    }
    Ok(())
}

async fn open_journal(
    config: &EngineConfig,
    mover: Arc<dyn PrimitiveMover>,
) -> Result<OperationJournal> {
    let path = config
        .resolved_history_path()
        .ok_or_else(|| eyre!("No data directory for the history file"))?;

    OperationJournal::open(&path, config.history_max_items, mover)
        .await
        .with_context(|| format!("Cannot open history at {}", path.display()))
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
