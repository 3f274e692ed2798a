use std::path::PathBuf;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
pub const ISO8601_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Explicit run configuration, threaded through every component entry point.
/// This decouples the sync logic from how the options were gathered
/// (CLI flags vs config file) and keeps the engine free of global state.
#[derive(Clone)]
pub struct SyncConfig {
    /// Directory the markdown files are written into. Media lands in a
    /// `media/` subdirectory underneath it.
    pub notes_dir: PathBuf,
    /// Emit the YAML frontmatter block. Without it exported files carry no
    /// stable identifier and are re-created on every run.
    pub header: bool,
    /// Remove local files whose note no longer exists remotely.
    pub delete_local: bool,
    /// Move local files whose remote title (and thus derived filename) changed.
    pub rename_local: bool,
    /// strftime pattern for the filename date prefix, from the note's
    /// creation time.
    pub date_format: String,
    /// Reuse an existing media file when its fingerprint matches the remote.
    pub skip_existing_media: bool,
    /// Worker threads for the apply phase. 0 means one per available core.
    pub jobs: usize,
    pub verbose: bool,
    pub quiet: bool,
}

impl SyncConfig {
    pub fn media_dir(&self) -> PathBuf {
        self.notes_dir.join("media")
    }

    pub fn worker_count(&self) -> usize {
        if self.jobs > 0 {
            self.jobs
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            notes_dir: PathBuf::from("keep-export"),
            header: true,
            delete_local: false,
            rename_local: false,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            skip_existing_media: true,
            jobs: 0,
            verbose: false,
            quiet: false,
        }
    }
}
