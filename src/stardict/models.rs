//! Data structures representing StarDict package components

use std::sync::Arc;

use super::content::ContentStore;
use super::error::Result;
use super::index::DictIndex;

/// One logical headword unit from the index file.
///
/// The primary term comes from the `.idx` record; alternative terms are
/// appended from the `.syn` file after the primary parse. The entry's
/// position in the entry vector is its on-disk order and serves as the
/// stable tie-break key during ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Primary term first, synonyms after, in file order.
    pub terms: Vec<String>,
    /// Byte offset into the content blob.
    pub offset: u64,
    /// Byte length of the definition data.
    pub size: u64,
}

/// One typed piece of a decoded definition.
///
/// StarDict type codes: lower-case letters are NUL-terminated text
/// (`m` plain text, `h` HTML, `x` xdxf, ...), `W` and `P` are
/// length-prefixed binary blocks (audio and image).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text { kind: u8, text: String },
    Blob { kind: u8, data: Vec<u8> },
}

impl Segment {
    /// The one-letter type code of this segment.
    pub fn kind(&self) -> u8 {
        match self {
            Segment::Text { kind, .. } => *kind,
            Segment::Blob { kind, .. } => *kind,
        }
    }
}

/// One scored search candidate.
///
/// Holds shared handles into the owning dictionary's parsed index and
/// content store, so the definition is only read and decoded when
/// [`RawResult::segments`] is actually called. Unshown candidates never
/// touch the content blob.
#[derive(Clone)]
pub struct RawResult {
    score: u8,
    entry_index: u32,
    index: Arc<DictIndex>,
    content: Arc<ContentStore>,
}

impl RawResult {
    pub(crate) fn new(
        score: u8,
        entry_index: u32,
        index: Arc<DictIndex>,
        content: Arc<ContentStore>,
    ) -> Self {
        Self {
            score,
            entry_index,
            index,
            content,
        }
    }

    /// Ranking score, 0-200 (200 = best).
    pub fn score(&self) -> u8 {
        self.score
    }

    /// Position of the entry in on-disk order.
    pub fn entry_index(&self) -> u32 {
        self.entry_index
    }

    /// All terms of the entry, primary first.
    pub fn terms(&self) -> &[String] {
        &self.index.entries[self.entry_index as usize].terms
    }

    /// Read and decode the definition for this entry.
    ///
    /// This is the lazy half of a search result: it performs a positional
    /// read against the content blob and runs the segment decoder. Fails
    /// with [`super::DictError::Closed`] once the dictionary has been
    /// closed or disabled.
    pub fn segments(&self) -> Result<Vec<Segment>> {
        let entry = &self.index.entries[self.entry_index as usize];
        self.content.read_segments(entry.offset, entry.size)
    }
}

impl std::fmt::Debug for RawResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResult")
            .field("score", &self.score)
            .field("entry_index", &self.entry_index)
            .field("terms", &self.terms())
            .finish()
    }
}
