//! Remote note model and the `NoteSource` seam.
//!
//! Notes arrive as a JSON snapshot dumped from the service's API (see
//! `SnapshotSource`); authentication and session handling live entirely on
//! the side that produces the snapshot. The duck-typed content of the
//! service is converted into the closed `NoteBody` variant right here at
//! the boundary so nothing downstream branches on dynamic shape.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{FetchError, SourceError};

/// Read-only snapshot of one remote note, valid for the duration of a run.
#[derive(Debug, Clone)]
pub struct RemoteNote {
    /// Opaque stable identifier, never reused across different notes.
    pub id: String,
    pub title: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub archived: bool,
    pub pinned: bool,
    pub color: Option<String>,
    pub labels: Vec<String>,
    pub body: NoteBody,
    pub media: Vec<MediaReference>,
    pub links: Vec<LinkAnnotation>,
}

#[derive(Debug, Clone)]
pub enum NoteBody {
    PlainText(String),
    Checklist(Vec<ChecklistItem>),
}

#[derive(Debug, Clone)]
pub struct ChecklistItem {
    pub text: String,
    pub checked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Drawing,
    Audio,
}

/// One attached blob. Bytes come from `NoteSource::fetch_media`; the
/// fingerprint (SHA-256 hex of the bytes) drives the skip-existing check.
#[derive(Debug, Clone)]
pub struct MediaReference {
    pub id: String,
    pub kind: MediaKind,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkAnnotation {
    pub url: Url,
    pub title: String,
}

/// The remote collaborator. `Sync` so apply-phase workers can share one
/// instance. Implementations own their timeout policy; the resolver adds
/// the single retry on top.
pub trait NoteSource: Sync {
    fn list_notes(&self) -> Result<Vec<RemoteNote>, SourceError>;
    fn fetch_media(&self, media: &MediaReference) -> Result<Vec<u8>, FetchError>;
}

// ---------------------------------------------------------------------------
// JSON snapshot source
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SnapshotFile {
    notes: Vec<SnapshotNote>,
}

#[derive(Deserialize)]
struct SnapshotNote {
    id: String,
    #[serde(default)]
    title: String,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    labels: Vec<String>,
    body: SnapshotBody,
    #[serde(default)]
    media: Vec<SnapshotMedia>,
    #[serde(default)]
    links: Vec<LinkAnnotation>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum SnapshotBody {
    Text {
        #[serde(default)]
        text: String,
    },
    Checklist {
        items: Vec<SnapshotChecklistItem>,
    },
}

#[derive(Deserialize)]
struct SnapshotChecklistItem {
    text: String,
    #[serde(default)]
    checked: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum SnapshotMediaKind {
    Image,
    Drawing,
    Audio,
}

/// Media entry in the snapshot: bytes are either inlined base64 or a path
/// relative to the snapshot file.
#[derive(Deserialize)]
struct SnapshotMedia {
    id: String,
    kind: SnapshotMediaKind,
    #[serde(default)]
    fingerprint: Option<String>,
    #[serde(default)]
    data_b64: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
}

enum MediaPayload {
    Inline(Vec<u8>),
    File(PathBuf),
}

/// `NoteSource` backed by a JSON snapshot file on disk.
pub struct SnapshotSource {
    notes: Vec<RemoteNote>,
    payloads: HashMap<String, MediaPayload>,
}

impl SnapshotSource {
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let raw = fs::read(path).map_err(|source| SourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: SnapshotFile =
            serde_json::from_slice(&raw).map_err(|source| SourceError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut notes = Vec::with_capacity(file.notes.len());
        let mut payloads = HashMap::new();

        for snap in file.notes {
            let mut media = Vec::with_capacity(snap.media.len());
            for m in snap.media {
                let kind = match m.kind {
                    SnapshotMediaKind::Image => MediaKind::Image,
                    SnapshotMediaKind::Drawing => MediaKind::Drawing,
                    SnapshotMediaKind::Audio => MediaKind::Audio,
                };
                let mut fingerprint = m.fingerprint;
                let payload = if let Some(b64) = m.data_b64 {
                    let bytes =
                        BASE64
                            .decode(b64.as_bytes())
                            .map_err(|source| SourceError::Payload {
                                path: path.to_path_buf(),
                                media: m.id.clone(),
                                source,
                            })?;
                    // An inline payload is already in hand, so fill in a
                    // missing fingerprint instead of re-fetching every run.
                    if fingerprint.is_none() {
                        fingerprint = Some(format!("{:x}", Sha256::digest(&bytes)));
                    }
                    Some(MediaPayload::Inline(bytes))
                } else {
                    m.path.map(|p| MediaPayload::File(base.join(p)))
                };
                if let Some(payload) = payload {
                    payloads.insert(m.id.clone(), payload);
                }
                media.push(MediaReference {
                    id: m.id,
                    kind,
                    fingerprint,
                });
            }

            let body = match snap.body {
                SnapshotBody::Text { text } => NoteBody::PlainText(text),
                SnapshotBody::Checklist { items } => NoteBody::Checklist(
                    items
                        .into_iter()
                        .map(|i| ChecklistItem {
                            text: i.text,
                            checked: i.checked,
                        })
                        .collect(),
                ),
            };

            notes.push(RemoteNote {
                id: snap.id,
                title: snap.title,
                created: snap.created,
                updated: snap.updated,
                archived: snap.archived,
                pinned: snap.pinned,
                color: snap.color,
                labels: snap.labels,
                body,
                media,
                links: snap.links,
            });
        }

        Ok(Self { notes, payloads })
    }
}

impl NoteSource for SnapshotSource {
    fn list_notes(&self) -> Result<Vec<RemoteNote>, SourceError> {
        Ok(self.notes.clone())
    }

    fn fetch_media(&self, media: &MediaReference) -> Result<Vec<u8>, FetchError> {
        match self.payloads.get(&media.id) {
            Some(MediaPayload::Inline(bytes)) => Ok(bytes.clone()),
            Some(MediaPayload::File(path)) => Ok(fs::read(path)?),
            None => Err(FetchError::Missing(media.id.clone())),
        }
    }
}
