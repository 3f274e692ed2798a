use clap::Parser;
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use keep_sync::config::{DEFAULT_DATE_FORMAT, ISO8601_DATE_FORMAT, SyncConfig};
use keep_sync::engine;
use keep_sync::remote::SnapshotSource;

/// Sync notes from a cloud note-taking service to local Markdown files
/// with frontmatter headers, for backup and archival.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory the markdown files are written into.
    /// Defaults to ./keep-export if not set in config.
    #[arg(value_name = "TARGET_DIR")]
    target_dir: Option<PathBuf>,

    /// Path to the JSON notes snapshot to sync from.
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/keep-sync/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Include the frontmatter header (default; overrides config).
    #[arg(long, overrides_with = "no_header")]
    header: bool,

    /// Exclude the frontmatter header. Files then carry no stable id and
    /// are re-created on every run.
    #[arg(long)]
    no_header: bool,

    /// Delete local notes (and media) that no longer exist remotely.
    #[arg(long, overrides_with = "no_delete_local")]
    delete_local: bool,

    /// Keep local-only notes in place (default; overrides config).
    #[arg(long)]
    no_delete_local: bool,

    /// Rename local files whose remote title changed.
    #[arg(long, overrides_with = "no_rename_local")]
    rename_local: bool,

    /// Leave local filenames alone on title changes (default; overrides config).
    #[arg(long)]
    no_rename_local: bool,

    /// strftime date format prefixing note filenames (created date).
    #[arg(long, value_name = "FMT")]
    date_format: Option<String>,

    /// Format filename dates as ISO 8601 (%Y-%m-%dT%H:%M:%S).
    #[arg(long)]
    iso8601: bool,

    /// Reuse local media whose fingerprint matches (default; overrides config).
    #[arg(long, overrides_with = "no_skip_existing_media")]
    skip_existing_media: bool,

    /// Re-download media even when the local copy's fingerprint matches.
    #[arg(long)]
    no_skip_existing_media: bool,

    /// Worker threads for the apply phase. Defaults to one per core.
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Print each file created, updated, renamed or deleted.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress the run summary.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    target_dir: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    header: Option<bool>,
    delete_local: Option<bool>,
    rename_local: Option<bool>,
    date_format: Option<String>,
    skip_existing_media: Option<bool>,
    jobs: Option<usize>,
}

/// Paired on/off flags beat the config file in either direction; absent
/// both, the config file beats the built-in default.
fn resolve_toggle(on: bool, off: bool, file_value: Option<bool>, default: bool) -> bool {
    if on {
        true
    } else if off {
        false
    } else {
        file_value.unwrap_or(default)
    }
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        // Search: XDG/OS config dir, then nothing
        dirs::config_dir()
            .map(|d| d.join("keep-sync/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    // 2. Resolve target_dir (CLI > Config > Default)
    let target_dir = cli
        .target_dir
        .or(file_cfg.target_dir)
        .unwrap_or_else(|| PathBuf::from("keep-export"));

    // 3. Resolve the snapshot path (CLI > Config)
    let snapshot = cli.snapshot.or(file_cfg.snapshot).ok_or_else(|| {
        eyre!(
            "No notes snapshot given.\nUse --snapshot to point at a JSON dump of your notes, or set snapshot in config.toml."
        )
    })?;
    if !snapshot.exists() {
        return Err(eyre!("Snapshot not found at: {}", snapshot.display()));
    }

    // 4. Resolve the date format (explicit format > --iso8601 > Config > Default)
    let date_format = cli
        .date_format
        .or_else(|| cli.iso8601.then(|| ISO8601_DATE_FORMAT.to_string()))
        .or(file_cfg.date_format)
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());

    // 5. Build the run configuration (flags override, config file fills in)
    let config = SyncConfig {
        notes_dir: target_dir,
        header: resolve_toggle(cli.header, cli.no_header, file_cfg.header, true),
        delete_local: resolve_toggle(
            cli.delete_local,
            cli.no_delete_local,
            file_cfg.delete_local,
            false,
        ),
        rename_local: resolve_toggle(
            cli.rename_local,
            cli.no_rename_local,
            file_cfg.rename_local,
            false,
        ),
        date_format,
        skip_existing_media: resolve_toggle(
            cli.skip_existing_media,
            cli.no_skip_existing_media,
            file_cfg.skip_existing_media,
            true,
        ),
        jobs: cli.jobs.or(file_cfg.jobs).unwrap_or(0),
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    // 6. Run the reconciliation
    let source = SnapshotSource::load(&snapshot)
        .wrap_err_with(|| format!("Failed to load snapshot: {}", snapshot.display()))?;
    let summary = engine::execute(&source, &config).wrap_err("Sync failed")?;

    for failure in &summary.note_failures {
        eprintln!("Note [{}]: {}", failure.id, failure.message);
    }
    for failure in &summary.media_failures {
        eprintln!(
            "Media [{}/{}]: {}",
            failure.note_id, failure.media_id, failure.message
        );
    }
    if !config.quiet {
        if !summary.clean() {
            eprintln!(
                "Finished with {} note and {} media failure(s).",
                summary.note_failures.len(),
                summary.media_failures.len()
            );
        }
        eprintln!("{summary}");
    }

    Ok(())
}
