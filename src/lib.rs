//! # keep-sync
//!
//! A CLI tool that syncs notes from a cloud note-taking service to local
//! Markdown files with YAML frontmatter headers.
//!
//! ## What it does
//!
//! Given a JSON snapshot of your notes (as dumped from the service's API —
//! login and session handling stay on that side), keep-sync reconciles the
//! remote inventory against a local directory of previously exported files
//! and creates, updates, renames or deletes per note. Attachments land in a
//! `media/` subdirectory, content-addressed so unchanged blobs are never
//! re-downloaded.
//!
//! Sync is strictly one-way: the remote is authoritative, local edits to
//! managed files are overwritten. Files without a recognizable `id:` in
//! their frontmatter are not managed and never touched.
//!
//! ## Incremental runs
//!
//! On repeated runs, each note's rendered markdown is fingerprinted and
//! compared against the bytes on disk. Unchanged notes are skipped so file
//! modification times stay stable for backup tools. All writes go through
//! a temp-file-then-rename step, so an interrupted run never leaves a
//! truncated file at a final path.
//!
//! ## Usage
//!
//! ```sh
//! # Sync a snapshot into a directory
//! keep-sync ~/notes/keep --snapshot ~/Downloads/keep-snapshot.json
//!
//! # Mirror deletions and title renames too
//! keep-sync ~/notes/keep --snapshot snap.json --delete-local --rename-local
//! ```
//!
//! Preferences can be persisted in `~/.config/keep-sync/config.toml`.

pub mod config;
pub mod engine;
pub mod error;
pub mod media;
pub mod remote;
pub mod render;
pub mod scan;
