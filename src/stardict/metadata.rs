//! Package metadata (`.ifo`) parsing

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;

use super::error::{DictError, Result};

/// Fixed first line of every `.ifo` file.
pub const INFO_MAGIC: &str = "StarDict's dict ifo file";

const SUPPORTED_VERSIONS: &[&str] = &["2.4.2", "3.0.0"];

/// Parsed package metadata.
///
/// Immutable after parse. The typed fields cover everything the engine
/// itself consumes; the raw option map is kept for presentation keys
/// (`description`, `author`, ...) the GUI may want.
#[derive(Debug, Clone)]
pub struct DictionaryMetadata {
    pub book_name: String,
    /// Entry count declared by the package. The parsed index is
    /// authoritative; this is informational.
    pub word_count: usize,
    pub version: String,
    /// Fixed definition type sequence, e.g. `"m"` or `"tm"`. When absent
    /// the content blob is self-describing (tagged segments).
    pub same_type_sequence: Option<String>,
    /// True iff `idxoffsetbits=64`: index offsets and sizes are 8 bytes
    /// wide instead of 4.
    pub is_64: bool,
    options: HashMap<String, String>,
}

impl DictionaryMetadata {
    /// Parse the metadata file at `path`.
    pub fn parse(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let meta = Self::parse_str(&text)?;
        debug!(
            "Metadata parsed: book={:?}, version={}, wordcount={}, is_64={}",
            meta.book_name, meta.version, meta.word_count, meta.is_64
        );
        Ok(meta)
    }

    /// Parse metadata from already-loaded text.
    ///
    /// Line 1 must be the fixed header, line 2 must be `version=` with a
    /// supported value. Remaining lines are `key=value` pairs split on the
    /// first `=`; a non-empty line without `=` is a format error.
    pub fn parse_str(text: &str) -> Result<Self> {
        let mut lines = text.lines();

        let magic = lines
            .next()
            .ok_or_else(|| DictError::Format("empty metadata file".to_string()))?;
        if magic.trim_end() != INFO_MAGIC {
            return Err(DictError::Format(format!(
                "bad metadata header: {:?}",
                magic
            )));
        }

        let version_line = lines
            .next()
            .map(|line| line.trim_end_matches('\r'))
            .ok_or_else(|| DictError::Format("metadata missing version line".to_string()))?;
        let (key, version) = version_line
            .split_once('=')
            .ok_or_else(|| DictError::Format(format!("bad version line: {:?}", version_line)))?;
        if key != "version" {
            return Err(DictError::Format(format!(
                "expected version line, got key {:?}",
                key
            )));
        }
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(DictError::UnsupportedVersion(version.to_string()));
        }

        let mut options = HashMap::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| DictError::Format(format!("bad metadata line: {:?}", line)))?;
            options.insert(key.to_string(), value.to_string());
        }

        let book_name = options.get("bookname").cloned().unwrap_or_default();
        let word_count = options
            .get("wordcount")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let same_type_sequence = options
            .get("sametypesequence")
            .filter(|v| !v.is_empty())
            .cloned();
        let is_64 = options.get("idxoffsetbits").map(String::as_str) == Some("64");

        Ok(Self {
            book_name,
            word_count,
            version: version.to_string(),
            same_type_sequence,
            is_64,
            options,
        })
    }

    /// Look up a raw metadata option by key.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// The `description` option, when present.
    pub fn description(&self) -> Option<&str> {
        self.option("description")
    }

    /// Width in bytes of the index offset and size fields.
    pub fn number_width(&self) -> usize {
        if self.is_64 {
            8
        } else {
            4
        }
    }
}
