//! Pinbak - Command-line interface for the backup engine.
//!
//! Runs backups and restores, and manages profiles and ignore rules.
//! Results are printed as JSON on stdout; logs go to stderr.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use crossbeam_channel::Receiver;
use engine::{
    load_config, load_ignore_patterns, restore, run_backup, save_ignore_patterns, ArchiveKind,
    BackupMode, BackupOptions, ChannelProgress, EngineConfig, EngineError, FingerprintAlgorithm,
    resolve_presets, Profile, ProfileStore, ProgressEvent,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Pinbak - content-aware directory backups
#[derive(Parser, Debug)]
#[command(name = "pinbak")]
#[command(version = "0.1.0")]
#[command(about = "Back up directories, copying only files whose content changed")]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    verbose: bool,

    /// INI configuration file with a [backup] section
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the fingerprint state file
    #[arg(long, global = true, value_name = "PATH")]
    state_file: Option<PathBuf>,

    /// Override the ignore pattern file
    #[arg(long, global = true, value_name = "PATH")]
    ignore_file: Option<PathBuf>,

    /// Override the profile file
    #[arg(long, global = true, value_name = "PATH")]
    profile_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Back up source directories into a destination
    Backup(BackupArgs),

    /// Copy a backup folder back into a target directory
    Restore {
        /// Backup folder (flat destination or one incremental run directory)
        #[arg(long, value_name = "PATH")]
        from: PathBuf,

        /// Directory to restore into
        #[arg(long, value_name = "PATH")]
        to: PathBuf,
    },

    /// Manage saved profiles
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Manage ignore patterns
    #[command(subcommand)]
    Ignore(IgnoreCommand),
}

#[derive(Args, Debug)]
struct BackupArgs {
    /// Source directories
    #[arg(long, value_name = "PATH", num_args = 1..)]
    sources: Vec<PathBuf>,

    #[command(flatten)]
    presets: PresetArgs,

    /// Destination directory
    #[arg(long, value_name = "PATH")]
    dest: Option<PathBuf>,

    /// Layout: flat or incremental
    #[arg(long, value_name = "MODE", default_value = "incremental")]
    mode: String,

    /// Archive: none, zip, tar or tar.gz
    #[arg(long, value_name = "KIND", default_value = "none")]
    archive: String,

    /// Report what would be copied without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Take sources and destination from a saved profile
    #[arg(long, value_name = "NAME")]
    profile: Option<String>,

    /// Re-hash each copy and compare with the source
    #[arg(long)]
    verify: bool,

    /// Fingerprint algorithm: sha256 or blake3
    #[arg(long, value_name = "ALGORITHM")]
    algorithm: Option<String>,
}

/// Pinokio folder presets added to the sources.
#[derive(Args, Debug)]
struct PresetArgs {
    /// Preset folder: Models, LoRAs, Checkpoints, ControlNet, Apps or Extensions
    #[arg(long = "preset", value_name = "NAME")]
    names: Vec<String>,

    /// Pinokio root the presets are resolved against
    #[arg(long, value_name = "PATH", default_value = ".")]
    preset_root: PathBuf,
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    /// Save or replace a profile
    Save {
        name: String,

        #[arg(long, value_name = "PATH", num_args = 1..)]
        sources: Vec<PathBuf>,

        #[command(flatten)]
        presets: PresetArgs,

        #[arg(long, value_name = "PATH")]
        dest: PathBuf,
    },
    /// List profile names
    List,
    /// Print one profile
    Show { name: String },
    /// Delete a profile
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum IgnoreCommand {
    /// Print the current patterns
    List,
    /// Replace the patterns
    Set {
        #[arg(value_name = "PATTERN")]
        patterns: Vec<String>,
    },
}

/// How a successful invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    /// The run finished but some files failed
    Failures,
    Interrupted,
}

impl Outcome {
    fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::Failures => 1,
            Outcome::Interrupted => 130,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "could not install Ctrl-C handler");
    }

    let stdout = io::stdout();
    let exit_code = match run_cli(&cli, &cancel, &mut stdout.lock()) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            error_exit_code(&e)
        }
    };

    std::process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "engine=debug,pinbak=debug"
    } else {
        "engine=info,pinbak=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Usage and configuration problems exit 2, everything else 1.
fn error_exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<EngineError>() {
        Some(e) if e.is_usage_error() => 2,
        _ => 1,
    }
}

/// Main CLI logic - separated for testability
fn run_cli(cli: &Cli, cancel: &Arc<AtomicBool>, out: &mut dyn Write) -> anyhow::Result<Outcome> {
    let config = resolve_config(cli)?;

    match &cli.command {
        Command::Backup(args) => backup_command(args, config, cancel, out),
        Command::Restore { from, to } => {
            let restored = restore(from, to)?;
            print_json(out, &serde_json::json!({ "restored": restored }))?;
            Ok(Outcome::Success)
        }
        Command::Profile(command) => profile_command(command, &config, out),
        Command::Ignore(command) => ignore_command(command, &config, out),
    }
}

fn resolve_config(cli: &Cli) -> Result<EngineConfig, EngineError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    if let Some(path) = &cli.state_file {
        config.state_file = path.clone();
    }
    if let Some(path) = &cli.ignore_file {
        config.ignore_file = path.clone();
    }
    if let Some(path) = &cli.profile_file {
        config.profile_file = path.clone();
    }

    Ok(config)
}

fn backup_command(
    args: &BackupArgs,
    mut config: EngineConfig,
    cancel: &Arc<AtomicBool>,
    out: &mut dyn Write,
) -> anyhow::Result<Outcome> {
    let mode: BackupMode = args.mode.parse()?;
    let archive: ArchiveKind = args.archive.parse()?;
    if let Some(algorithm) = &args.algorithm {
        config.algorithm = algorithm.parse::<FingerprintAlgorithm>()?;
    }
    if args.verify {
        config.verify_after_copy = true;
    }

    let mut sources = collect_sources(&args.sources, &args.presets)?;
    let mut destination = args.dest.clone();
    if let Some(name) = &args.profile {
        let store = ProfileStore::load(&config.profile_file)?;
        let profile = store
            .get(name)
            .ok_or_else(|| EngineError::invalid_argument(format!("unknown profile '{}'", name)))?;
        if sources.is_empty() {
            sources = profile.sources.clone();
        }
        if destination.is_none() {
            destination = Some(profile.destination.clone());
        }
    }

    if sources.is_empty() {
        return Err(
            EngineError::invalid_argument("no sources given (use --sources, --preset or --profile)")
                .into(),
        );
    }
    let destination = destination.ok_or_else(|| {
        EngineError::invalid_argument("no destination given (use --dest or --profile)")
    })?;

    let options =
        BackupOptions::new(mode, archive, args.dry_run).with_cancel_flag(Arc::clone(cancel));

    let (tx, rx) = crossbeam_channel::unbounded();
    let consumer = thread::spawn(move || log_progress(rx));
    let result = {
        let progress = ChannelProgress::new(tx);
        run_backup(&sources, &destination, options, &config, Some(&progress))
    };
    let _ = consumer.join();
    let summary = result?;

    print_json(out, &summary)?;

    Ok(if summary.cancelled {
        Outcome::Interrupted
    } else if !summary.failures.is_empty() {
        Outcome::Failures
    } else {
        Outcome::Success
    })
}

/// Explicit sources followed by preset folders, without duplicates.
fn collect_sources(
    sources: &[PathBuf],
    presets: &PresetArgs,
) -> Result<Vec<PathBuf>, EngineError> {
    let mut all = sources.to_vec();
    for path in resolve_presets(&presets.names, &presets.preset_root)? {
        if !all.contains(&path) {
            all.push(path);
        }
    }
    Ok(all)
}

fn log_progress(rx: Receiver<ProgressEvent>) {
    for event in rx {
        match event {
            ProgressEvent::RunStarted {
                run_id, base_dir, ..
            } => debug!(%run_id, base_dir = %base_dir.display(), "run started"),
            ProgressEvent::FileCompleted {
                source_path,
                outcome,
            } => debug!(file = %source_path.display(), ?outcome, "file done"),
            ProgressEvent::Progress { fraction } => {
                debug!(fraction, "progress")
            }
            ProgressEvent::RunCompleted { .. } => debug!("run completed"),
        }
    }
}

fn profile_command(
    command: &ProfileCommand,
    config: &EngineConfig,
    out: &mut dyn Write,
) -> anyhow::Result<Outcome> {
    let mut store = ProfileStore::load(&config.profile_file)?;

    match command {
        ProfileCommand::Save {
            name,
            sources,
            presets,
            dest,
        } => {
            let sources = collect_sources(sources, presets)?;
            if sources.is_empty() {
                let err =
                    EngineError::invalid_argument("no sources given (use --sources or --preset)");
                return Err(err.into());
            }
            store.upsert(
                name.clone(),
                Profile {
                    sources,
                    destination: dest.clone(),
                },
            );
            store.save(&config.profile_file)?;
            print_json(out, &store.names())?;
        }
        ProfileCommand::List => print_json(out, &store.names())?,
        ProfileCommand::Show { name } => {
            let profile = store
                .get(name)
                .ok_or_else(|| EngineError::invalid_argument(format!("unknown profile '{}'", name)))?;
            print_json(out, profile)?;
        }
        ProfileCommand::Delete { name } => {
            if store.remove(name).is_none() {
                let err = EngineError::invalid_argument(format!("unknown profile '{}'", name));
                return Err(err.into());
            }
            store.save(&config.profile_file)?;
            print_json(out, &store.names())?;
        }
    }

    Ok(Outcome::Success)
}

fn ignore_command(
    command: &IgnoreCommand,
    config: &EngineConfig,
    out: &mut dyn Write,
) -> anyhow::Result<Outcome> {
    match command {
        IgnoreCommand::List => print_json(out, &load_ignore_patterns(&config.ignore_file))?,
        IgnoreCommand::Set { patterns } => {
            save_ignore_patterns(&config.ignore_file, patterns).with_context(|| {
                format!("writing ignore file {}", config.ignore_file.display())
            })?;
            print_json(out, patterns)?;
        }
    }

    Ok(Outcome::Success)
}

fn print_json<T: serde::Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
