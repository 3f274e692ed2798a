//! Attachment materialization.
//!
//! Media files are content-addressed: when skip-existing is on and the
//! local copy's digest matches the remote fingerprint, no fetch is issued
//! at all. Fetches get exactly one retry; a persistent failure degrades the
//! owning note (its markdown keeps the deterministic reference) and is
//! surfaced in the run summary.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::config::SyncConfig;
use crate::error::{FetchError, WriteError};
use crate::remote::{NoteSource, RemoteNote};
use crate::render::{fingerprint, media_filename};

/// One attachment after resolution, whether fetched or reused.
#[derive(Debug)]
pub struct ResolvedMedia {
    pub filename: String,
    pub fetched: bool,
}

/// One attachment that could not be materialized.
#[derive(Debug)]
pub struct MediaFailure {
    pub note_id: String,
    pub media_id: String,
    pub message: String,
}

/// Resolve every media reference of `note` into the media directory.
/// Failures never abort: each reference is attempted independently.
pub fn resolve_media(
    source: &dyn NoteSource,
    note: &RemoteNote,
    media_dir: &Path,
    config: &SyncConfig,
) -> (Vec<ResolvedMedia>, Vec<MediaFailure>) {
    let mut resolved = Vec::with_capacity(note.media.len());
    let mut failures = Vec::new();

    for media in &note.media {
        let filename = media_filename(media);
        let target = media_dir.join(&filename);

        if config.skip_existing_media
            && let Some(remote_fp) = media.fingerprint.as_deref()
            && let Ok(existing) = std::fs::read(&target)
            && fingerprint(&existing) == remote_fp
        {
            resolved.push(ResolvedMedia {
                filename,
                fetched: false,
            });
            continue;
        }

        match fetch_with_retry(source, media) {
            Ok(bytes) => match write_atomic(&target, &bytes) {
                Ok(()) => resolved.push(ResolvedMedia {
                    filename,
                    fetched: true,
                }),
                Err(e) => failures.push(MediaFailure {
                    note_id: note.id.clone(),
                    media_id: media.id.clone(),
                    message: e.to_string(),
                }),
            },
            Err(e) => failures.push(MediaFailure {
                note_id: note.id.clone(),
                media_id: media.id.clone(),
                message: e.to_string(),
            }),
        }
    }

    (resolved, failures)
}

// One retry, then give up. Timeouts are the source's concern and surface
// here as an ordinary FetchError.
fn fetch_with_retry(
    source: &dyn NoteSource,
    media: &crate::remote::MediaReference,
) -> Result<Vec<u8>, FetchError> {
    match source.fetch_media(media) {
        Ok(bytes) => Ok(bytes),
        Err(_) => source.fetch_media(media),
    }
}

/// Write via a sibling temp file and rename into place, so an interrupted
/// run never leaves a truncated file at the final path.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp =
        NamedTempFile::new_in(dir).map_err(|e| WriteError::new(target.to_path_buf(), e))?;
    tmp.write_all(bytes)
        .map_err(|e| WriteError::new(target.to_path_buf(), e))?;
    tmp.persist(target)
        .map_err(|e| WriteError::new(target.to_path_buf(), e.error))?;
    Ok(())
}
