//! Reconciliation: diff the remote inventory against the local one into a
//! plan of per-note actions, then apply the plan over a worker pool.
//!
//! Planning is strictly separated from applying. All target paths,
//! including collision disambiguation, are finalized while planning on a
//! single thread; workers then own their note's files exclusively and
//! never negotiate paths with each other.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crossbeam_channel::{bounded, unbounded};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::media::{MediaFailure, resolve_media, write_atomic};
use crate::remote::{NoteSource, RemoteNote};
use crate::render::{derived_stem, fingerprint, media_filename, render_note};
use crate::scan::{LocalFileRecord, scan_notes};

/// What to do with one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    Create,
    Update,
    Rename { from: PathBuf },
    Delete,
    Skip,
}

/// One planned action with its finalized target path and, for writes, the
/// pre-rendered bytes (rendered once at plan time, reused for both the
/// fingerprint comparison and the actual write).
#[derive(Debug)]
pub struct PlannedAction<'a> {
    pub id: String,
    pub action: SyncAction,
    pub target: PathBuf,
    pub note: Option<&'a RemoteNote>,
    pub rendered: Option<String>,
}

#[derive(Debug, Default)]
pub struct Plan<'a> {
    pub actions: Vec<PlannedAction<'a>>,
    pub failures: Vec<NoteFailure>,
}

impl Plan<'_> {
    /// Every non-skip action must own a distinct path before dispatch.
    pub fn write_targets_unique(&self) -> bool {
        let mut seen = HashSet::new();
        self.actions
            .iter()
            .filter(|a| !matches!(a.action, SyncAction::Skip))
            .all(|a| seen.insert(&a.target))
    }
}

#[derive(Debug)]
pub struct NoteFailure {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub renamed: usize,
    pub deleted: usize,
    pub skipped: usize,
    /// Local notes absent remotely, left in place (delete-local off).
    pub orphaned: usize,
    pub media_fetched: usize,
    pub media_reused: usize,
    pub media_deleted: usize,
    pub note_failures: Vec<NoteFailure>,
    pub media_failures: Vec<MediaFailure>,
}

impl RunSummary {
    pub fn clean(&self) -> bool {
        self.note_failures.is_empty() && self.media_failures.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Notes: {} created, {} updated, {} renamed, {} deleted, {} unchanged, {} orphaned",
            self.created, self.updated, self.renamed, self.deleted, self.skipped, self.orphaned
        )?;
        write!(
            f,
            "Media: {} downloaded, {} reused, {} deleted",
            self.media_fetched, self.media_reused, self.media_deleted
        )
    }
}

/// Full run: scan, list, plan, apply, prune. Only inventory-level failures
/// surface as `Err`; everything else lands in the summary.
pub fn execute(source: &dyn NoteSource, config: &SyncConfig) -> Result<RunSummary, SyncError> {
    fs::create_dir_all(&config.notes_dir).map_err(|e| SyncError::Setup {
        path: config.notes_dir.clone(),
        source: e,
    })?;
    let media_dir = config.media_dir();
    fs::create_dir_all(&media_dir).map_err(|e| SyncError::Setup {
        path: media_dir.clone(),
        source: e,
    })?;

    let local = scan_notes(&config.notes_dir)?;
    let notes = source.list_notes()?;

    let plan = plan(&notes, &local, config);
    let mut summary = apply(source, &plan.actions, config);
    summary.note_failures.extend(plan.failures);

    if config.delete_local {
        prune_media(&notes, &media_dir, &mut summary);
    }
    Ok(summary)
}

// ── Planning ─────────────────────────────────────────────────────────────────

/// Diff the two inventories into a plan. Ids are walked in sorted order so
/// collision disambiguation is deterministic across runs.
pub fn plan<'a>(
    notes: &'a [RemoteNote],
    local: &'a BTreeMap<String, LocalFileRecord>,
    config: &SyncConfig,
) -> Plan<'a> {
    let remote: BTreeMap<&str, &RemoteNote> = notes.iter().map(|n| (n.id.as_str(), n)).collect();
    let local_paths: HashMap<&Path, &str> = local
        .values()
        .map(|r| (r.path.as_path(), r.id.as_str()))
        .collect();

    let mut plan = Plan::default();
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    // Existing notes that keep their current path claim it up front, so a
    // new note can never steal a retained filename.
    for (&id, &note) in &remote {
        if let Some(rec) = local.get(id) {
            let derived = derived_path(&config.notes_dir, note, config);
            if !config.rename_local || derived == rec.path {
                claimed.insert(rec.path.clone());
            }
        }
    }

    for (&id, &note) in &remote {
        let rendered = match render_note(note, config) {
            Ok(r) => r,
            Err(e) => {
                plan.failures.push(NoteFailure {
                    id: id.to_string(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        match local.get(id) {
            None => {
                let target = finalize_target(
                    &config.notes_dir,
                    &derived_stem(note, &config.date_format),
                    id,
                    &local_paths,
                    &claimed,
                );
                claimed.insert(target.clone());
                plan.actions.push(PlannedAction {
                    id: id.to_string(),
                    action: SyncAction::Create,
                    target,
                    note: Some(note),
                    rendered: Some(rendered),
                });
            }
            Some(rec) => {
                let derived = derived_path(&config.notes_dir, note, config);
                // Title drift without rename-local is ignored: content is
                // kept at the old path.
                let keep = !config.rename_local || derived == rec.path;
                let target = if keep {
                    rec.path.clone()
                } else {
                    // Disambiguation may hand back the note's own current
                    // path (its derived name was taken by another note), in
                    // which case there is nothing to rename after all.
                    finalize_target(
                        &config.notes_dir,
                        &derived_stem(note, &config.date_format),
                        id,
                        &local_paths,
                        &claimed,
                    )
                };
                claimed.insert(target.clone());
                if target == rec.path {
                    let unchanged = fingerprint(rendered.as_bytes()) == rec.fingerprint;
                    plan.actions.push(PlannedAction {
                        id: id.to_string(),
                        action: if unchanged {
                            SyncAction::Skip
                        } else {
                            SyncAction::Update
                        },
                        target,
                        note: Some(note),
                        rendered: (!unchanged).then_some(rendered),
                    });
                } else {
                    plan.actions.push(PlannedAction {
                        id: id.to_string(),
                        // The title lives in the metadata block, so a rename
                        // always carries a rewrite, never a bare move.
                        action: SyncAction::Rename {
                            from: rec.path.clone(),
                        },
                        target,
                        note: Some(note),
                        rendered: Some(rendered),
                    });
                }
            }
        }
    }

    for (id, rec) in local {
        if remote.contains_key(id.as_str()) {
            continue;
        }
        plan.actions.push(PlannedAction {
            id: id.clone(),
            action: if config.delete_local {
                SyncAction::Delete
            } else {
                SyncAction::Skip
            },
            target: rec.path.clone(),
            note: None,
            rendered: None,
        });
    }

    plan
}

fn derived_path(dir: &Path, note: &RemoteNote, config: &SyncConfig) -> PathBuf {
    dir.join(format!("{}.md", derived_stem(note, &config.date_format)))
}

// Two remote notes may derive the same filename; disambiguate by appending
// the stable id's prefix, then the full id. A path occupied on disk by a
// file we do not manage is never reused either.
fn finalize_target(
    dir: &Path,
    stem: &str,
    id: &str,
    local_paths: &HashMap<&Path, &str>,
    claimed: &HashSet<PathBuf>,
) -> PathBuf {
    // Ids are opaque tokens and not necessarily ASCII, so the short form
    // must be cut on a char boundary, never a byte offset.
    let short: String = id.chars().take(8).collect();
    let candidates = [
        format!("{stem}.md"),
        format!("{stem}_{short}.md"),
        format!("{stem}_{id}.md"),
    ];
    for name in &candidates {
        let path = dir.join(name);
        if available(&path, id, local_paths, claimed) {
            return path;
        }
    }
    // The full id is unique by contract, so this only collides if the
    // caller planned the same note twice.
    dir.join(format!("{stem}_{id}.md"))
}

fn available(
    path: &Path,
    id: &str,
    local_paths: &HashMap<&Path, &str>,
    claimed: &HashSet<PathBuf>,
) -> bool {
    if claimed.contains(path) {
        return false;
    }
    match local_paths.get(path) {
        // Occupied by a managed file: fine only if it is this note's own.
        Some(owner) => *owner == id,
        // Unmanaged files are user property and never overwritten.
        None => !path.exists(),
    }
}

// ── Applying ─────────────────────────────────────────────────────────────────

enum Applied {
    Created,
    Updated,
    Renamed,
    Deleted,
    Skipped,
    Orphaned,
}

struct Outcome {
    applied: Option<Applied>,
    failure: Option<NoteFailure>,
    media_fetched: usize,
    media_reused: usize,
    media_failures: Vec<MediaFailure>,
}

/// Apply planned actions over a bounded worker pool. Each action is
/// independent; one note's failure never blocks the others.
pub fn apply<'a>(
    source: &dyn NoteSource,
    actions: &[PlannedAction<'a>],
    config: &SyncConfig,
) -> RunSummary {
    let mut summary = RunSummary::default();
    if actions.is_empty() {
        return summary;
    }

    let media_dir = config.media_dir();
    let n_workers = config.worker_count().min(actions.len()).max(1);
    let (task_tx, task_rx) = bounded::<&PlannedAction<'a>>(64);
    let (out_tx, out_rx) = unbounded::<Outcome>();

    std::thread::scope(|s| {
        for _ in 0..n_workers {
            let task_rx = task_rx.clone();
            let out_tx = out_tx.clone();
            let media_dir = &media_dir;
            s.spawn(move || {
                while let Ok(act) = task_rx.recv() {
                    let _ = out_tx.send(apply_action(source, act, media_dir, config));
                }
            });
        }
        drop(task_rx);
        drop(out_tx);

        for act in actions {
            if task_tx.send(act).is_err() {
                break;
            }
        }
        drop(task_tx);

        while let Ok(outcome) = out_rx.recv() {
            match outcome.applied {
                Some(Applied::Created) => summary.created += 1,
                Some(Applied::Updated) => summary.updated += 1,
                Some(Applied::Renamed) => summary.renamed += 1,
                Some(Applied::Deleted) => summary.deleted += 1,
                Some(Applied::Skipped) => summary.skipped += 1,
                Some(Applied::Orphaned) => summary.orphaned += 1,
                None => {}
            }
            if let Some(failure) = outcome.failure {
                summary.note_failures.push(failure);
            }
            summary.media_fetched += outcome.media_fetched;
            summary.media_reused += outcome.media_reused;
            summary.media_failures.extend(outcome.media_failures);
        }
    });

    summary
}

fn apply_action(
    source: &dyn NoteSource,
    act: &PlannedAction<'_>,
    media_dir: &Path,
    config: &SyncConfig,
) -> Outcome {
    let mut outcome = Outcome {
        applied: None,
        failure: None,
        media_fetched: 0,
        media_reused: 0,
        media_failures: Vec::new(),
    };

    match &act.action {
        SyncAction::Skip => {
            outcome.applied = Some(if act.note.is_some() {
                Applied::Skipped
            } else {
                if config.verbose {
                    eprintln!("Orphaned: {}", act.target.display());
                }
                Applied::Orphaned
            });
        }
        SyncAction::Delete => match fs::remove_file(&act.target) {
            Ok(()) => {
                if config.verbose {
                    eprintln!("Deleted: {}", act.target.display());
                }
                outcome.applied = Some(Applied::Deleted);
            }
            Err(e) => {
                outcome.failure = Some(NoteFailure {
                    id: act.id.clone(),
                    message: format!("cannot delete {}: {e}", act.target.display()),
                });
            }
        },
        SyncAction::Create | SyncAction::Update | SyncAction::Rename { .. } => {
            let (Some(note), Some(rendered)) = (act.note, act.rendered.as_deref()) else {
                outcome.failure = Some(NoteFailure {
                    id: act.id.clone(),
                    message: "planned write carries no rendered content".to_string(),
                });
                return outcome;
            };

            // Attachments first, so a written note never references media
            // whose failure went unrecorded.
            let (resolved, media_failures) = resolve_media(source, note, media_dir, config);
            outcome.media_fetched = resolved.iter().filter(|m| m.fetched).count();
            outcome.media_reused = resolved.len() - outcome.media_fetched;
            outcome.media_failures = media_failures;

            if let SyncAction::Rename { from } = &act.action
                && from != &act.target
                && let Err(e) = fs::rename(from, &act.target)
            {
                eprintln!(
                    "Warning: rename failed {} -> {}: {e}",
                    from.display(),
                    act.target.display()
                );
            }

            match write_atomic(&act.target, rendered.as_bytes()) {
                Ok(()) => {
                    let applied = match &act.action {
                        SyncAction::Create => Applied::Created,
                        SyncAction::Update => Applied::Updated,
                        _ => Applied::Renamed,
                    };
                    if config.verbose {
                        let label = match applied {
                            Applied::Created => "Created",
                            Applied::Updated => "Updated",
                            _ => "Renamed",
                        };
                        eprintln!("{label}: {}", act.target.display());
                    }
                    outcome.applied = Some(applied);
                }
                Err(e) => {
                    outcome.failure = Some(NoteFailure {
                        id: act.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    outcome
}

// With delete-local on, media no longer referenced by any remote note goes
// away together with its notes.
fn prune_media(notes: &[RemoteNote], media_dir: &Path, summary: &mut RunSummary) {
    let expected: HashSet<String> = notes
        .iter()
        .flat_map(|n| n.media.iter().map(media_filename))
        .collect();
    let Ok(entries) = fs::read_dir(media_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if expected.contains(&name) {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => summary.media_deleted += 1,
            Err(e) => eprintln!("Warning: cannot delete media {}: {e}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, SourceError};
    use crate::remote::{MediaKind, MediaReference, NoteBody};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRemote {
        notes: Vec<RemoteNote>,
        media: HashMap<String, Vec<u8>>,
        fetches: AtomicUsize,
    }

    impl FakeRemote {
        fn new(notes: Vec<RemoteNote>) -> Self {
            Self {
                notes,
                media: HashMap::new(),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    impl NoteSource for FakeRemote {
        fn list_notes(&self) -> Result<Vec<RemoteNote>, SourceError> {
            Ok(self.notes.clone())
        }

        fn fetch_media(&self, media: &MediaReference) -> Result<Vec<u8>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.media
                .get(&media.id)
                .cloned()
                .ok_or_else(|| FetchError::Missing(media.id.clone()))
        }
    }

    fn note(id: &str, title: &str, body: &str) -> RemoteNote {
        RemoteNote {
            id: id.to_string(),
            title: title.to_string(),
            created: Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap(),
            updated: Utc.with_ymd_and_hms(2021, 3, 5, 0, 0, 0).unwrap(),
            archived: false,
            pinned: false,
            color: None,
            labels: vec![],
            body: NoteBody::PlainText(body.to_string()),
            media: vec![],
            links: vec![],
        }
    }

    fn config_for(dir: &Path) -> SyncConfig {
        SyncConfig {
            notes_dir: dir.to_path_buf(),
            jobs: 2,
            quiet: true,
            ..SyncConfig::default()
        }
    }

    fn md_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .flatten()
            .filter(|e| e.path().extension().is_some_and(|x| x == "md"))
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn empty_local_yields_only_creates() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let source = FakeRemote::new(vec![
            note("1", "Shopping", "milk"),
            note("2", "Todo", "things"),
        ]);

        let local = BTreeMap::new();
        let plan = plan(&source.notes, &local, &config);
        assert_eq!(plan.actions.len(), 2);
        assert!(
            plan.actions
                .iter()
                .all(|a| a.action == SyncAction::Create)
        );

        let summary = execute(&source, &config).unwrap();
        assert_eq!(summary.created, 2);
        assert_eq!(summary.updated + summary.deleted + summary.skipped, 0);
        assert_eq!(
            md_files(dir.path()),
            vec!["2021-03-04_shopping.md", "2021-03-04_todo.md"]
        );
    }

    #[test]
    fn second_run_without_remote_changes_only_skips() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let source = FakeRemote::new(vec![
            note("1", "Shopping", "milk"),
            note("2", "Todo", "things"),
        ]);

        execute(&source, &config).unwrap();
        let second = execute(&source, &config).unwrap();
        assert_eq!(second.skipped, 2);
        assert_eq!(second.created + second.updated + second.deleted + second.renamed, 0);
        assert!(second.clean());
    }

    #[test]
    fn content_change_updates_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());

        execute(&FakeRemote::new(vec![note("1", "Shopping", "milk")]), &config).unwrap();
        let summary = execute(
            &FakeRemote::new(vec![note("1", "Shopping", "milk and eggs")]),
            &config,
        )
        .unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.created, 0);
        let contents =
            fs::read_to_string(dir.path().join("2021-03-04_shopping.md")).unwrap();
        assert!(contents.contains("milk and eggs"));
    }

    #[test]
    fn title_change_renames_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path());
        config.rename_local = true;

        execute(&FakeRemote::new(vec![note("1", "Shopping", "milk")]), &config).unwrap();
        let summary = execute(
            &FakeRemote::new(vec![note("1", "Groceries", "milk")]),
            &config,
        )
        .unwrap();

        assert_eq!(summary.renamed, 1);
        assert!(!dir.path().join("2021-03-04_shopping.md").exists());
        let contents =
            fs::read_to_string(dir.path().join("2021-03-04_groceries.md")).unwrap();
        assert!(contents.contains("title: Groceries"));
    }

    #[test]
    fn title_change_without_rename_rewrites_at_old_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());

        execute(&FakeRemote::new(vec![note("1", "Shopping", "milk")]), &config).unwrap();
        let summary = execute(
            &FakeRemote::new(vec![note("1", "Groceries", "milk")]),
            &config,
        )
        .unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.renamed, 0);
        let contents =
            fs::read_to_string(dir.path().join("2021-03-04_shopping.md")).unwrap();
        assert!(contents.contains("title: Groceries"));
    }

    #[test]
    fn remote_deletion_respects_delete_local_flag() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path());

        execute(&FakeRemote::new(vec![note("3", "Gone soon", "bye")]), &config).unwrap();
        let path = dir.path().join("2021-03-04_gone-soon.md");
        assert!(path.exists());

        // delete-local off: left in place, reported orphaned, on every run
        let empty = FakeRemote::new(vec![]);
        for _ in 0..3 {
            let summary = execute(&empty, &config).unwrap();
            assert_eq!(summary.orphaned, 1);
            assert_eq!(summary.deleted, 0);
            assert!(path.exists());
        }

        config.delete_local = true;
        let summary = execute(&empty, &config).unwrap();
        assert_eq!(summary.deleted, 1);
        assert!(!path.exists());
    }

    #[test]
    fn colliding_filenames_get_distinct_targets() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let source = FakeRemote::new(vec![
            note("aaaa1111", "Same Title", "one"),
            note("bbbb2222", "Same Title", "two"),
        ]);

        let local = BTreeMap::new();
        let plan = plan(&source.notes, &local, &config);
        assert!(plan.write_targets_unique());

        let summary = execute(&source, &config).unwrap();
        assert_eq!(summary.created, 2);
        assert_eq!(
            md_files(dir.path()),
            vec![
                "2021-03-04_same-title.md",
                "2021-03-04_same-title_bbbb2222.md"
            ]
        );
    }

    #[test]
    fn non_ascii_ids_plan_and_disambiguate_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let source = FakeRemote::new(vec![
            note("あいうえおかきくけこ", "Same Title", "one"),
            note("さしすせそたちつてと", "Same Title", "two"),
        ]);

        let local = BTreeMap::new();
        let plan = plan(&source.notes, &local, &config);
        assert_eq!(plan.actions.len(), 2);
        assert!(plan.write_targets_unique());

        let summary = execute(&source, &config).unwrap();
        assert_eq!(summary.created, 2);
        assert!(summary.clean());
    }

    #[test]
    fn user_files_are_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let user_file = dir.path().join("2021-03-04_shopping.md");
        fs::write(&user_file, "my own notes, no frontmatter").unwrap();

        let summary = execute(
            &FakeRemote::new(vec![note("1", "Shopping", "milk")]),
            &config,
        )
        .unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(
            fs::read_to_string(&user_file).unwrap(),
            "my own notes, no frontmatter"
        );
        assert!(dir.path().join("2021-03-04_shopping_1.md").exists());
    }

    #[test]
    fn media_is_fetched_once_then_reused() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());

        let mut n = note("1", "Trip", "photos");
        n.media = vec![MediaReference {
            id: "m1".into(),
            kind: MediaKind::Image,
            fingerprint: Some(fingerprint(b"pixels")),
        }];
        let mut source = FakeRemote::new(vec![n]);
        source.media.insert("m1".into(), b"pixels".to_vec());

        let first = execute(&source, &config).unwrap();
        assert_eq!(first.media_fetched, 1);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(
            fs::read(dir.path().join("media").join("m1.png")).unwrap(),
            b"pixels"
        );

        // remote content changed, media fingerprint did not
        source.notes[0].body = NoteBody::PlainText("more photos".into());
        let second = execute(&source, &config).unwrap();
        assert_eq!(second.updated, 1);
        assert_eq!(second.media_reused, 1);
        assert_eq!(second.media_fetched, 0);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1, "no extra fetch");
    }

    #[test]
    fn failed_media_degrades_the_note_but_still_writes_it() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());

        let mut n = note("1", "Trip", "photos");
        n.media = vec![MediaReference {
            id: "missing".into(),
            kind: MediaKind::Image,
            fingerprint: None,
        }];
        let source = FakeRemote::new(vec![n]);

        let summary = execute(&source, &config).unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.media_failures.len(), 1);
        assert!(!summary.clean());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2, "one retry");

        let contents =
            fs::read_to_string(dir.path().join("2021-03-04_trip.md")).unwrap();
        assert!(contents.contains("![image](media/missing.png)"));
    }

    #[test]
    fn delete_local_prunes_unreferenced_media() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path());
        config.delete_local = true;

        fs::create_dir_all(config.media_dir()).unwrap();
        fs::write(config.media_dir().join("stale.png"), b"old").unwrap();

        let summary = execute(&FakeRemote::new(vec![]), &config).unwrap();
        assert_eq!(summary.media_deleted, 1);
        assert!(!config.media_dir().join("stale.png").exists());
    }

    #[test]
    fn plan_after_apply_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let source = FakeRemote::new(vec![
            note("1", "Shopping", "milk"),
            note("2", "Todo", "things"),
        ]);

        execute(&source, &config).unwrap();
        let local = scan_notes(dir.path()).unwrap();
        let plan = plan(&source.notes, &local, &config);
        assert!(
            plan.actions.iter().all(|a| a.action == SyncAction::Skip),
            "second plan must be all skips"
        );
    }
}
