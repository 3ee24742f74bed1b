//! Index (`.idx`) and synonym (`.syn`) parsing, plus the word-prefix index

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use log::{debug, info};

use super::error::{DictError, Result};
use super::models::IndexEntry;
use super::utils;

/// The in-memory index of one dictionary: the ordered entry vector plus a
/// coarse word-prefix lookup structure.
///
/// The prefix index maps the first (up to) two lower-cased characters of
/// every word of every term to the set of entry indexes containing such a
/// word. It is a hash-bucket scheme, not a trie; candidate-set membership
/// is what matters, and repeats collapse because buckets are sets.
/// Read-only after construction.
#[derive(Debug)]
pub struct DictIndex {
    pub entries: Vec<IndexEntry>,
    buckets: HashMap<String, HashSet<u32>>,
}

/// Read the raw index bytes, gunzipping `.idx.gz` variants in memory.
pub fn load_index_bytes(path: &Path) -> Result<Vec<u8>> {
    let raw = fs::read(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let mut decoder = GzDecoder::new(raw.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;
        debug!(
            "Index gunzipped: {} -> {} bytes",
            raw.len(),
            decompressed.len()
        );
        Ok(decompressed)
    } else {
        Ok(raw)
    }
}

impl DictIndex {
    /// Build the index from raw `.idx` bytes and an optional `.syn` file.
    ///
    /// Any structural error (a stream ending mid-record, a synonym
    /// pointing past the entry count) fails this dictionary's load; the
    /// caller isolates the failure from sibling dictionaries.
    pub fn build(idx_bytes: &[u8], syn_bytes: Option<&[u8]>, is_64: bool) -> Result<Self> {
        let mut entries = parse_entries(idx_bytes, is_64)?;
        if let Some(syn) = syn_bytes {
            apply_synonyms(syn, &mut entries)?;
        }
        let buckets = build_buckets(&entries);
        info!(
            "Index built: {} entries, {} prefix buckets",
            entries.len(),
            buckets.len()
        );
        Ok(Self { entries, buckets })
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Entry indexes whose terms contain a word starting with the first
    /// (up to) two characters of `word`.
    ///
    /// A single-character word cannot use one exact bucket: every
    /// two-character bucket beginning with that character may hold a
    /// matching word, so those buckets are unioned in. The result is
    /// sorted so chunked workers see a deterministic range.
    pub fn candidates_for_word(&self, word: &str) -> Vec<u32> {
        let key = prefix_key(word);
        let mut out: Vec<u32> = if key.chars().count() >= 2 {
            self.buckets
                .get(&key)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        } else if let Some(first) = key.chars().next() {
            let mut set = HashSet::new();
            for (bucket_key, bucket) in &self.buckets {
                if bucket_key.chars().next() == Some(first) {
                    set.extend(bucket.iter().copied());
                }
            }
            set.into_iter().collect()
        } else {
            Vec::new()
        };
        out.sort_unstable();
        out
    }

    /// The full entry range, for modes the prefix index cannot help with
    /// (regex and glob scan every entry).
    pub fn all_candidates(&self) -> Vec<u32> {
        (0..self.entries.len() as u32).collect()
    }
}

/// Parse the binary index as a 3-state stream per entry:
/// TERM (bytes to NUL) -> OFFSET (4/8 bytes BE) -> SIZE (4/8 bytes BE).
fn parse_entries(idx_bytes: &[u8], is_64: bool) -> Result<Vec<IndexEntry>> {
    let width = if is_64 { 8 } else { 4 };
    let mut entries = Vec::new();
    let mut reader = idx_bytes;

    while !reader.is_empty() {
        let term = utils::read_nul_terminated(&mut reader).ok_or_else(|| {
            DictError::Format("index ends mid-record: unterminated term".to_string())
        })?;
        let offset = utils::read_be_number(&mut reader, width)?;
        let size = utils::read_be_number(&mut reader, width)?;
        entries.push(IndexEntry {
            terms: vec![term],
            offset,
            size,
        });
    }

    debug!("Index stream parsed: {} entries", entries.len());
    Ok(entries)
}

/// Parse the synonym file as repeating (NUL-terminated term, 4-byte BE
/// entry index) records and append each alt term to its entry.
fn apply_synonyms(syn_bytes: &[u8], entries: &mut [IndexEntry]) -> Result<()> {
    let mut reader = syn_bytes;
    let mut count = 0usize;

    while !reader.is_empty() {
        let term = utils::read_nul_terminated(&mut reader).ok_or_else(|| {
            DictError::Format("synonym file ends mid-record: unterminated term".to_string())
        })?;
        let entry_index = utils::read_be_u32(&mut reader)?;
        let entries_len = entries.len();
        let entry = entries.get_mut(entry_index as usize).ok_or_else(|| {
            DictError::Format(format!(
                "synonym {:?} references entry {} of {}",
                term,
                entry_index,
                entries_len
            ))
        })?;
        entry.terms.push(term);
        count += 1;
    }

    debug!("Synonyms applied: {} records", count);
    Ok(())
}

/// First (up to) two characters of an already lower-cased word.
fn prefix_key(word: &str) -> String {
    word.chars().take(2).collect()
}

fn build_buckets(entries: &[IndexEntry]) -> HashMap<String, HashSet<u32>> {
    let mut buckets: HashMap<String, HashSet<u32>> = HashMap::new();
    for (entry_index, entry) in entries.iter().enumerate() {
        for term in &entry.terms {
            for word in term.to_lowercase().split(' ') {
                if word.is_empty() {
                    continue;
                }
                buckets
                    .entry(prefix_key(word))
                    .or_default()
                    .insert(entry_index as u32);
            }
        }
    }
    buckets
}
