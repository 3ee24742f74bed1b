//! Core StarDict engine module

pub mod content;
pub mod coordinator;
pub mod error;
pub mod index;
pub mod metadata;
pub mod models;
pub mod scoring;
mod search;
pub mod settings;
mod utils;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use sha1::{Digest, Sha1};

use content::ContentStore;
use index::DictIndex;
use metadata::DictionaryMetadata;
use models::RawResult;

pub use error::{DictError, Result};

/// One open dictionary package.
///
/// Composes the parsed metadata, the in-memory index, and the content
/// store, and owns the lifecycle: `Closed -> Loading -> Loaded <-> Disabled`.
/// Discovery only resolves sibling file paths; all parsing happens in
/// [`Dictionary::load`], so a broken package costs nothing until opened
/// and its failure never touches sibling dictionaries.
pub struct Dictionary {
    name: String,
    dir: PathBuf,
    ifo_path: PathBuf,
    idx_path: PathBuf,
    syn_path: Option<PathBuf>,
    dict_path: PathBuf,
    dz_path: PathBuf,
    metadata: Option<DictionaryMetadata>,
    index: Option<Arc<DictIndex>>,
    content: Option<Arc<ContentStore>>,
    disabled: bool,
    word_match: bool,
}

impl Dictionary {
    /// Resolve a package from its metadata file path.
    ///
    /// Sibling files share the metadata file's stem: `<stem>.idx` (or
    /// `<stem>.idx.gz`), `<stem>.dict` (or `<stem>.dict.dz`), and an
    /// optional `<stem>.syn`.
    pub fn discover(ifo_path: &Path) -> Result<Self> {
        let dir = ifo_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let name = ifo_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        if name.is_empty() {
            return Err(DictError::Format(format!(
                "metadata path {:?} has no file stem",
                ifo_path
            )));
        }

        let plain_idx = dir.join(format!("{}.idx", name));
        let gz_idx = dir.join(format!("{}.idx.gz", name));
        let idx_path = if plain_idx.exists() {
            plain_idx
        } else if gz_idx.exists() {
            gz_idx
        } else {
            return Err(DictError::Format(format!(
                "package {:?} has no index file",
                name
            )));
        };

        let syn = dir.join(format!("{}.syn", name));
        let syn_path = syn.exists().then_some(syn);

        Ok(Self {
            dict_path: dir.join(format!("{}.dict", name)),
            dz_path: dir.join(format!("{}.dict.dz", name)),
            ifo_path: ifo_path.to_path_buf(),
            idx_path,
            syn_path,
            name,
            dir,
            metadata: None,
            index: None,
            content: None,
            disabled: false,
            word_match: true,
        })
    }

    /// Parse the package and open the content blob.
    ///
    /// On a dictionary whose index is already parsed (the disable/enable
    /// round trip), this only reopens the content handle. Any failure
    /// leaves the dictionary closed with no partial state.
    pub fn load(&mut self) -> Result<()> {
        if let (Some(_), Some(content)) = (&self.index, &self.content) {
            content.reopen()?;
            return Ok(());
        }

        let metadata = DictionaryMetadata::parse(&self.ifo_path)?;
        let idx_bytes = index::load_index_bytes(&self.idx_path)?;
        let syn_bytes = match &self.syn_path {
            Some(path) => Some(fs::read(path)?),
            None => None,
        };
        let dict_index = DictIndex::build(&idx_bytes, syn_bytes.as_deref(), metadata.is_64)?;
        let content = ContentStore::open(
            &self.dict_path,
            &self.dz_path,
            metadata.same_type_sequence.clone(),
        )?;

        info!(
            "Dictionary loaded: {:?} ({} entries)",
            metadata.book_name,
            dict_index.entry_count()
        );
        self.metadata = Some(metadata);
        self.index = Some(Arc::new(dict_index));
        self.content = Some(Arc::new(content));
        Ok(())
    }

    /// Release every handle and all parsed state.
    ///
    /// Outstanding results from earlier searches lose access to the
    /// content blob; their `segments()` calls fail with
    /// [`DictError::Closed`]. Subsequent searches return empty.
    pub fn close(&mut self) {
        if let Some(content) = &self.content {
            content.close();
        }
        self.content = None;
        self.index = None;
        self.metadata = None;
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }

    /// Toggle the disabled state.
    ///
    /// Disabling releases the content file handle but keeps the parsed
    /// index, so re-enabling via [`Dictionary::load`] only reopens the
    /// handle.
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
        if disabled {
            if let Some(content) = &self.content {
                content.close();
            }
        }
    }

    /// Whether the content handle is currently open.
    pub fn loaded(&self) -> bool {
        self.content.as_ref().map(|c| c.is_open()).unwrap_or(false)
    }

    /// Gate for the word-level half of fuzzy scoring (a per-dictionary
    /// capability applied by the coordinator from settings).
    pub fn set_word_match(&mut self, word_match: bool) {
        self.word_match = word_match;
    }

    /// Display name: the metadata book name, falling back to the file stem.
    pub fn dict_name(&self) -> &str {
        match &self.metadata {
            Some(meta) if !meta.book_name.is_empty() => &meta.book_name,
            _ => &self.name,
        }
    }

    /// Number of parsed index entries (0 before load).
    pub fn entry_count(&self) -> usize {
        self.index.as_ref().map(|i| i.entry_count()).unwrap_or(0)
    }

    pub fn description(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.description())
    }

    pub fn metadata(&self) -> Option<&DictionaryMetadata> {
        self.metadata.as_ref()
    }

    /// The package's `res/` directory, when it has one.
    pub fn resource_dir(&self) -> Option<PathBuf> {
        let res = self.dir.join("res");
        res.is_dir().then_some(res)
    }

    /// A `file://` URL for the resource directory, or empty when absent.
    /// The HTTP layer may substitute its own URL by serving
    /// [`Dictionary::resource_dir`] itself.
    pub fn resource_url(&self) -> String {
        self.resource_dir()
            .map(|dir| format!("file://{}", dir.display()))
            .unwrap_or_default()
    }

    pub fn index_path(&self) -> &Path {
        &self.idx_path
    }

    pub fn index_file_size(&self) -> u64 {
        fs::metadata(&self.idx_path).map(|m| m.len()).unwrap_or(0)
    }

    pub fn info_path(&self) -> &Path {
        &self.ifo_path
    }

    /// Content hash used for rename detection: SHA-1 of the index file,
    /// hex-encoded. The index is the identity of a package; the content
    /// blob can be re-compressed without changing it.
    pub fn calc_hash(&self) -> Result<String> {
        let bytes = fs::read(&self.idx_path)
            .map_err(|e| DictError::Hash(format!("{:?}: {}", self.idx_path, e)))?;
        let mut hasher = Sha1::new();
        hasher.update(&bytes);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Direct entry access by on-disk position (used by the random-entry
    /// draw). The result carries score 0: it is a reference, not a match.
    pub fn entry_by_index(&self, entry_index: u32) -> Option<RawResult> {
        let index = self.index.as_ref()?;
        let content = self.content.as_ref()?;
        if (entry_index as usize) >= index.entry_count() {
            return None;
        }
        Some(RawResult::new(
            0,
            entry_index,
            Arc::clone(index),
            Arc::clone(content),
        ))
    }

    fn searchable(&self) -> Option<(&Arc<DictIndex>, &Arc<ContentStore>)> {
        if self.disabled || !self.loaded() {
            return None;
        }
        Some((self.index.as_ref()?, self.content.as_ref()?))
    }

    /// Fuzzy search over prefix-bucketed candidates.
    pub fn search_fuzzy(
        &self,
        query: &str,
        worker_count: usize,
        timeout: Duration,
    ) -> Vec<RawResult> {
        match self.searchable() {
            Some((index, content)) => search::search_fuzzy(
                index,
                content,
                query,
                worker_count,
                timeout,
                self.word_match,
            ),
            None => Vec::new(),
        }
    }

    /// Prefix search over prefix-bucketed candidates.
    pub fn search_start_with(
        &self,
        query: &str,
        worker_count: usize,
        timeout: Duration,
    ) -> Vec<RawResult> {
        match self.searchable() {
            Some((index, content)) => {
                search::search_start_with(index, content, query, worker_count, timeout)
            }
            None => Vec::new(),
        }
    }

    /// Regex search; a full scan, since the prefix index cannot narrow an
    /// arbitrary pattern.
    pub fn search_regex(
        &self,
        pattern: &str,
        worker_count: usize,
        timeout: Duration,
    ) -> Vec<RawResult> {
        match self.searchable() {
            Some((index, content)) => {
                search::search_regex(index, content, pattern, worker_count, timeout)
            }
            None => Vec::new(),
        }
    }

    /// Glob search; `*` and `?` wildcards, full scan.
    pub fn search_glob(
        &self,
        glob: &str,
        worker_count: usize,
        timeout: Duration,
    ) -> Vec<RawResult> {
        match self.searchable() {
            Some((index, content)) => {
                search::search_glob(index, content, glob, worker_count, timeout)
            }
            None => Vec::new(),
        }
    }
}

impl std::fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dictionary")
            .field("name", &self.dict_name())
            .field("entries", &self.entry_count())
            .field("loaded", &self.loaded())
            .field("disabled", &self.disabled)
            .finish()
    }
}
