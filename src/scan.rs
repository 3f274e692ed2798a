//! Local inventory: which notes are already on disk, and in what state.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::ScanError;
use crate::render::fingerprint;

/// One managed file in the output directory, derived fresh each run.
#[derive(Debug, Clone)]
pub struct LocalFileRecord {
    pub path: PathBuf,
    /// Stable identifier parsed from the frontmatter header.
    pub id: String,
    /// Title as last exported, kept for rename diagnostics.
    pub title: Option<String>,
    /// SHA-256 of the file's current bytes. A partially written file hashes
    /// to something no render produces, so it always compares as changed.
    pub fingerprint: String,
}

/// Build the local inventory for `dir`, keyed by stable identifier.
///
/// Only `.md` files whose frontmatter head yields an `id:` are managed;
/// anything else (user-added files, media, stray editors' droppings) is
/// invisible to the sync and never touched. A missing directory is an
/// empty inventory (first run); an unreadable one is fatal.
pub fn scan_notes(dir: &Path) -> Result<BTreeMap<String, LocalFileRecord>, ScanError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(source) => {
            return Err(ScanError {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut inventory = BTreeMap::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("md") || !path.is_file() {
            continue;
        }
        let Some((id, title)) = parse_header(&path) else {
            continue;
        };
        let Ok(bytes) = fs::read(&path) else {
            continue;
        };
        // First file wins on a duplicated id; the engine treats the rest
        // as unmanaged rather than guessing which copy is authoritative.
        inventory.entry(id.clone()).or_insert(LocalFileRecord {
            path,
            id,
            title,
            fingerprint: fingerprint(&bytes),
        });
    }
    Ok(inventory)
}

// Read the YAML frontmatter head of an exported file and pull out the
// identifying fields. Bounded to the first 2 KiB so a huge note body is
// never scanned.
fn parse_header(path: &Path) -> Option<(String, Option<String>)> {
    let file = File::open(path).ok()?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let first = lines.next()?.ok()?;
    if first.trim() != "---" {
        return None;
    }

    let mut id: Option<String> = None;
    let mut title: Option<String> = None;
    let mut bytes_read = 0usize;

    for line in lines {
        let line = line.ok()?;
        bytes_read += line.len() + 1;
        if bytes_read > 2048 || line.trim() == "---" {
            break;
        }
        if let Some(rest) = line.strip_prefix("id:") {
            id = Some(unquote(rest));
        } else if let Some(rest) = line.strip_prefix("title:") {
            title = Some(unquote(rest));
        }
    }
    id.filter(|id| !id.is_empty()).map(|id| (id, title))
}

fn unquote(raw: &str) -> String {
    raw.trim().trim_matches('\'').trim_matches('"').to_string()
}
