//! Sidecar byte-index parsing.
//!
//! Acquisition systems that write kw6 files often emit a companion `.hdr`
//! XML file listing the byte offset of every position, so that a reader can
//! seek without walking the container first. The index is a flat sequence of
//! `<kw6Index>` elements whose text carries two quoted assignments:
//!
//! ```text
//! <kw6Index>
//! kw6Byte = "19"
//! kw6Pos = "1000"
//! </kw6Index>
//! ```
//!
//! `kw6Byte` is the position's byte offset; `kw6Pos` is a raw encoder
//! counter that ticks ten times per frame, so the frame index is `kw6Pos`
//! divided by ten. Entries are returned sorted by offset; structural
//! validation against the data file happens when the offset table is seeded.

use std::fs;
use std::path::Path;

use log::{debug, warn};
use quick_xml::events::Event;

use super::error::{Kw6Error, Result};
use super::index::IndexEntry;

/// Encoder ticks per frame in the raw `kw6Pos` counter.
const POS_PER_FRAME: u64 = 10;

/// Reads and parses the sidecar index file at `path`.
pub(crate) fn load(path: impl AsRef<Path>) -> Result<Vec<IndexEntry>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let entries = parse(&text)?;
    debug!(
        "Sidecar {} lists {} positions",
        path.display(),
        entries.len()
    );
    Ok(entries)
}

/// Parses sidecar XML into index entries, sorted by byte offset.
pub(crate) fn parse(xml: &str) -> Result<Vec<IndexEntry>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut entries = Vec::new();
    let mut in_index = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => in_index = e.name().as_ref() == b"kw6Index",
            Ok(Event::End(_)) => in_index = false,
            Ok(Event::Text(t)) if in_index => {
                let text = t.unescape().map_err(|e| {
                    Kw6Error::InvalidSidecar(format!("malformed index text: {}", e))
                })?;
                if !text.trim().is_empty() {
                    entries.push(entry_from_text(&text)?);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Kw6Error::InvalidSidecar(format!("malformed XML: {}", e)));
            }
            _ => {}
        }
    }

    entries.sort_by_key(|entry| entry.offset);
    Ok(entries)
}

/// Decodes one `<kw6Index>` text block into an entry.
///
/// Both assignments must be present; unknown keys are skipped with a
/// warning so that writer-specific extensions do not fail the parse.
fn entry_from_text(text: &str) -> Result<IndexEntry> {
    let mut byte_offset = None;
    let mut raw_pos = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(Kw6Error::InvalidSidecar(format!(
                "unrecognized index line {:?}",
                line
            )));
        };
        let value: u64 = value
            .trim()
            .trim_matches('"')
            .parse()
            .map_err(|_| Kw6Error::InvalidSidecar(format!("non-numeric value in {:?}", line)))?;
        match key.trim() {
            "kw6Byte" => byte_offset = Some(value),
            "kw6Pos" => raw_pos = Some(value),
            other => warn!("Ignoring unknown sidecar field {:?}", other),
        }
    }

    match (byte_offset, raw_pos) {
        (Some(offset), Some(pos)) => Ok(IndexEntry {
            offset,
            frame_index: pos / POS_PER_FRAME,
        }),
        _ => Err(Kw6Error::InvalidSidecar(
            "index entry missing kw6Byte or kw6Pos".to_string(),
        )),
    }
}
