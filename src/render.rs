//! Canonical markdown rendering.
//!
//! Rendering is byte-deterministic: the same `RemoteNote` always produces
//! the same output regardless of run order or which worker renders it.
//! That is what makes fingerprint comparison a valid change detector, so
//! everything here keeps a fixed field order and never consults the clock
//! or the filesystem.

use sha2::{Digest, Sha256};

use crate::config::SyncConfig;
use crate::error::RenderError;
use crate::remote::{MediaKind, MediaReference, NoteBody, RemoteNote};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Frontmatter field order is part of the on-disk contract; reordering
/// would make every previously exported note register as changed.
#[derive(Serialize)]
struct Frontmatter<'a> {
    id: &'a str,
    title: &'a str,
    created: &'a DateTime<Utc>,
    updated: &'a DateTime<Utc>,
    labels: Vec<&'a str>,
    pinned: bool,
    archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'a str>,
}

/// SHA-256 of canonical bytes, lowercase hex. Used for both rendered notes
/// and media blobs.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Filename stem derived from creation date and title, without extension:
/// `<date-prefix>_<slug>`, or just the date prefix for an unusable title.
pub fn derived_stem(note: &RemoteNote, date_format: &str) -> String {
    let date = note.created.format(date_format).to_string();
    let raw = slug::slugify(&note.title);
    // slugify output is ASCII, so byte truncation cannot split a char
    let slug = raw[..raw.len().min(60)].trim_end_matches('-');
    if slug.is_empty() {
        date
    } else {
        format!("{date}_{slug}")
    }
}

/// Local filename a media reference materializes to, relative to the media
/// directory. Derived from the reference alone (never from fetched bytes)
/// so markdown can reference it before any fetch happens.
pub fn media_filename(media: &MediaReference) -> String {
    let ext = match media.kind {
        MediaKind::Image | MediaKind::Drawing => "png",
        MediaKind::Audio => "m4a",
    };
    let id = media.id.replace(['/', '\\'], "_");
    format!("{id}.{ext}")
}

/// Render one note to its canonical markdown bytes: frontmatter (or a title
/// heading when headers are off), body, media references, trailing links.
pub fn render_note(note: &RemoteNote, config: &SyncConfig) -> Result<String, RenderError> {
    let mut out = String::new();

    if config.header {
        let mut labels: Vec<&str> = note.labels.iter().map(String::as_str).collect();
        labels.sort_unstable();
        let fm = Frontmatter {
            id: &note.id,
            title: &note.title,
            created: &note.created,
            updated: &note.updated,
            labels,
            pinned: note.pinned,
            archived: note.archived,
            color: note.color.as_deref(),
        };
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&fm)?);
        out.push_str("---\n\n");
    } else if !note.title.is_empty() {
        out.push_str("# ");
        out.push_str(&note.title);
        out.push_str("\n\n");
    }

    match &note.body {
        NoteBody::PlainText(text) => {
            if !text.is_empty() {
                out.push_str(text);
                if !text.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
        NoteBody::Checklist(items) => {
            for (i, item) in items.iter().enumerate() {
                let marker = if item.checked { 'x' } else { ' ' };
                out.push_str(&format!("{}. [{marker}] {}\n", i + 1, item.text));
            }
        }
    }

    if !note.media.is_empty() {
        out.push('\n');
        for media in &note.media {
            let name = media_filename(media);
            match media.kind {
                MediaKind::Image => out.push_str(&format!("![image](media/{name})\n")),
                MediaKind::Drawing => out.push_str(&format!("![drawing](media/{name})\n")),
                MediaKind::Audio => out.push_str(&format!("[audio](media/{name})\n")),
            }
        }
    }

    if !note.links.is_empty() {
        out.push_str("\n## Links\n\n");
        for link in &note.links {
            out.push_str(&format!("- [{}]({})\n", link.title, link.url));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{ChecklistItem, LinkAnnotation};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn note(id: &str, title: &str) -> RemoteNote {
        RemoteNote {
            id: id.to_string(),
            title: title.to_string(),
            created: Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap(),
            updated: Utc.with_ymd_and_hms(2021, 3, 5, 0, 0, 0).unwrap(),
            archived: false,
            pinned: false,
            color: None,
            labels: vec![],
            body: NoteBody::PlainText("hello world".to_string()),
            media: vec![],
            links: vec![],
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let mut n = note("n1", "Shopping");
        n.labels = vec!["b".into(), "a".into()];
        n.color = Some("Blue".into());
        let config = SyncConfig::default();

        let first = render_note(&n, &config).unwrap();
        let second = render_note(&n, &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(fingerprint(first.as_bytes()), fingerprint(second.as_bytes()));
    }

    #[test]
    fn frontmatter_fields_keep_a_fixed_order() {
        let mut n = note("n1", "Shopping");
        n.labels = vec!["zz".into(), "aa".into()];
        let out = render_note(&n, &SyncConfig::default()).unwrap();

        let order = ["id:", "title:", "created:", "updated:", "labels:", "pinned:", "archived:"];
        let positions: Vec<usize> = order.iter().map(|k| out.find(k).unwrap()).collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);

        // labels are sorted independently of their remote order
        assert!(out.find("- aa").unwrap() < out.find("- zz").unwrap());
    }

    #[test]
    fn attribute_changes_change_the_fingerprint() {
        let n = note("n1", "Shopping");
        let config = SyncConfig::default();
        let plain = render_note(&n, &config).unwrap();

        let mut pinned = n.clone();
        pinned.pinned = true;
        let pinned = render_note(&pinned, &config).unwrap();
        assert_ne!(fingerprint(plain.as_bytes()), fingerprint(pinned.as_bytes()));
    }

    #[test]
    fn checklist_renders_ordered_with_markers() {
        let mut n = note("n1", "Todo");
        n.body = NoteBody::Checklist(vec![
            ChecklistItem { text: "milk".into(), checked: true },
            ChecklistItem { text: "eggs".into(), checked: false },
        ]);
        let out = render_note(&n, &SyncConfig::default()).unwrap();
        assert!(out.contains("1. [x] milk\n2. [ ] eggs\n"), "got: {out}");
    }

    #[test]
    fn media_and_links_render_as_trailing_sections() {
        let mut n = note("n1", "Trip");
        n.media = vec![
            MediaReference { id: "m1".into(), kind: MediaKind::Image, fingerprint: None },
            MediaReference { id: "m2".into(), kind: MediaKind::Audio, fingerprint: None },
        ];
        n.links = vec![LinkAnnotation {
            url: "https://example.com/page".parse().unwrap(),
            title: "Example".into(),
        }];
        let out = render_note(&n, &SyncConfig::default()).unwrap();
        assert!(out.contains("![image](media/m1.png)\n"));
        assert!(out.contains("[audio](media/m2.m4a)\n"));
        assert!(out.ends_with("## Links\n\n- [Example](https://example.com/page)\n"));
    }

    #[test]
    fn header_off_emits_a_heading_instead_of_frontmatter() {
        let n = note("n1", "Shopping");
        let config = SyncConfig {
            header: false,
            ..SyncConfig::default()
        };
        let out = render_note(&n, &config).unwrap();
        assert!(out.starts_with("# Shopping\n\nhello world\n"));
        assert!(!out.contains("---"));
    }

    #[test]
    fn derived_stem_prefixes_date_and_slugifies_title() {
        let n = note("n1", "Shopping List!");
        assert_eq!(derived_stem(&n, "%Y-%m-%d"), "2021-03-04_shopping-list");

        let untitled = note("n2", "");
        assert_eq!(derived_stem(&untitled, "%Y-%m-%d"), "2021-03-04");
    }
}
