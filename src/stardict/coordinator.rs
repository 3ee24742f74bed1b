//! Multi-dictionary coordination: scanning, parallel load, fan-out search,
//! global ranking, random entry

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{info, warn};
use rand::Rng;
use walkdir::WalkDir;

use super::error::Result;
use super::models::RawResult;
use super::settings::{self, SettingsMap, FLAG_WORD_MATCH};
use super::Dictionary;

/// Which search entry point a query should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Fuzzy,
    StartWith,
    Regex,
    Glob,
}

impl SearchMode {
    /// The per-dictionary capability flag gating this mode.
    fn flag(self) -> u32 {
        match self {
            SearchMode::Fuzzy => settings::FLAG_FUZZY,
            SearchMode::StartWith => settings::FLAG_START_WITH,
            SearchMode::Regex => settings::FLAG_REGEX,
            SearchMode::Glob => settings::FLAG_GLOB,
        }
    }
}

/// Knobs for one query.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Worker threads per dictionary (values below 2 mean serial).
    pub worker_count: usize,
    /// How long to wait for one dictionary's workers before returning
    /// partial results.
    pub timeout: Duration,
    /// Global cap applied after ranking; 0 means unlimited.
    pub max_results: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            worker_count: 4,
            timeout: Duration::from_secs(5),
            max_results: 0,
        }
    }
}

/// One globally ranked result with its dictionary context attached.
#[derive(Debug, Clone)]
pub struct ScoredResult {
    pub result: RawResult,
    pub dict_name: String,
    pub symbol: String,
    pub order: i32,
}

/// The set of loaded dictionaries plus their settings.
///
/// An explicit context object: independent pools (one per test, one per
/// application) never interfere. Searches go through `&self`; settings
/// and lifecycle mutations go through `&mut self`, which is exactly the
/// single-control-path discipline the settings map needs.
pub struct DictionaryPool {
    dictionaries: Vec<Dictionary>,
    settings: SettingsMap,
    settings_path: Option<PathBuf>,
}

/// Recursively collect metadata file paths under the given roots.
///
/// Root order is preserved; within one root, paths sort lexicographically
/// so rescans see a stable order.
pub fn scan_packages(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for root in roots {
        let mut in_root: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().map(|e| e == "ifo").unwrap_or(false))
            .collect();
        in_root.sort();
        found.extend(in_root);
    }
    found
}

impl DictionaryPool {
    /// Wrap an already-built dictionary list, with no settings persistence.
    pub fn new(dictionaries: Vec<Dictionary>) -> Self {
        Self {
            dictionaries,
            settings: SettingsMap::new(),
            settings_path: None,
        }
    }

    /// Scan the roots, load every package concurrently, and reconcile the
    /// settings map.
    ///
    /// Each package loads in its own thread and the call blocks until all
    /// of them finish; a failed package is logged and omitted, never
    /// fatal to its siblings. A corrupt settings file is the only error
    /// surfaced here, so the caller can display it; a failed settings
    /// save is logged and searching proceeds.
    pub fn open(roots: &[PathBuf], settings_path: Option<&Path>) -> Result<Self> {
        let ifo_paths = scan_packages(roots);
        info!("Scan found {} package(s)", ifo_paths.len());

        let handles: Vec<_> = ifo_paths
            .into_iter()
            .map(|path| {
                let label = path.clone();
                let handle = thread::spawn(move || -> Result<Dictionary> {
                    let mut dict = Dictionary::discover(&path)?;
                    dict.load()?;
                    Ok(dict)
                });
                (label, handle)
            })
            .collect();

        let mut dictionaries = Vec::new();
        for (path, handle) in handles {
            match handle.join() {
                Ok(Ok(dict)) => dictionaries.push(dict),
                Ok(Err(err)) => warn!("Skipping {:?}: {}", path, err),
                Err(_) => warn!("Skipping {:?}: loader panicked", path),
            }
        }

        let mut pool = Self {
            dictionaries,
            settings: SettingsMap::new(),
            settings_path: settings_path.map(Path::to_path_buf),
        };
        if let Some(path) = settings_path {
            pool.settings = settings::load_settings(path)?;
        }
        let refs: Vec<&Dictionary> = pool.dictionaries.iter().collect();
        let changed = settings::reconcile(&mut pool.settings, &refs);
        pool.apply_settings();
        if changed {
            if let Err(err) = pool.save_settings() {
                warn!("Settings not saved: {}", err);
            }
        }
        Ok(pool)
    }

    /// Push the persisted settings into each dictionary: the order sign
    /// drives the disabled state, the word-match flag gates fuzzy
    /// word-level scoring.
    fn apply_settings(&mut self) {
        for dict in &mut self.dictionaries {
            if let Some(s) = self.settings.get(dict.dict_name()) {
                dict.set_word_match(s.allows(FLAG_WORD_MATCH));
                if !s.enabled() {
                    dict.set_disabled(true);
                }
            }
        }
    }

    pub fn dictionaries(&self) -> &[Dictionary] {
        &self.dictionaries
    }

    pub fn dictionary_mut(&mut self, name: &str) -> Option<&mut Dictionary> {
        self.dictionaries
            .iter_mut()
            .find(|d| d.dict_name() == name)
    }

    pub fn settings(&self) -> &SettingsMap {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SettingsMap {
        &mut self.settings
    }

    /// Persist the settings map, when a settings path was configured.
    pub fn save_settings(&self) -> Result<()> {
        match &self.settings_path {
            Some(path) => settings::save_settings(path, &self.settings),
            None => Ok(()),
        }
    }

    /// Fan one query out across every eligible dictionary and rank the
    /// combined results.
    ///
    /// Eligible means loaded, not disabled, enabled by its order sign,
    /// and permitted by its capability flag for this mode. Ranking:
    /// score descending, then display order ascending, then entry index
    /// ascending, which stays deterministic even among equal-scored
    /// synonyms across dictionaries. Truncation happens after ranking so
    /// it never drops a higher-scored late arrival.
    pub fn search(&self, query: &str, mode: SearchMode, opts: &SearchOptions) -> Vec<ScoredResult> {
        let mut results = Vec::new();
        for dict in self.eligible(mode.flag()) {
            let (order, symbol) = self.context_of(dict.dict_name());
            let raw = match mode {
                SearchMode::Fuzzy => dict.search_fuzzy(query, opts.worker_count, opts.timeout),
                SearchMode::StartWith => {
                    dict.search_start_with(query, opts.worker_count, opts.timeout)
                }
                SearchMode::Regex => dict.search_regex(query, opts.worker_count, opts.timeout),
                SearchMode::Glob => dict.search_glob(query, opts.worker_count, opts.timeout),
            };
            results.extend(raw.into_iter().map(|result| ScoredResult {
                result,
                dict_name: dict.dict_name().to_string(),
                symbol: symbol.clone(),
                order,
            }));
        }

        results.sort_by(|a, b| {
            b.result
                .score()
                .cmp(&a.result.score())
                .then(a.order.cmp(&b.order))
                .then(a.result.entry_index().cmp(&b.result.entry_index()))
        });
        if opts.max_results > 0 && results.len() > opts.max_results {
            results.truncate(opts.max_results);
        }
        results
    }

    /// Draw one entry uniformly across all entries of all eligible
    /// dictionaries, so a dictionary's chance is proportional to its
    /// entry count rather than uniform per dictionary.
    pub fn random_entry(&self) -> Option<ScoredResult> {
        let eligible: Vec<&Dictionary> = self.eligible(0).collect();
        let mut cumulative = Vec::with_capacity(eligible.len());
        let mut total = 0usize;
        for dict in &eligible {
            total += dict.entry_count();
            cumulative.push(total);
        }
        if total == 0 {
            return None;
        }

        let draw = rand::thread_rng().gen_range(0..total);
        let position = cumulative.partition_point(|&end| end <= draw);
        let dict = eligible.get(position)?;
        let local = draw - position.checked_sub(1).map_or(0, |p| cumulative[p]);
        let (order, symbol) = self.context_of(dict.dict_name());
        dict.entry_by_index(local as u32).map(|result| ScoredResult {
            result,
            dict_name: dict.dict_name().to_string(),
            symbol,
            order,
        })
    }

    /// Dictionaries that are loaded, not disabled, enabled by order sign,
    /// and (when `flag` is nonzero) permitted for the mode.
    fn eligible(&self, flag: u32) -> impl Iterator<Item = &Dictionary> {
        self.dictionaries.iter().filter(move |dict| {
            if dict.disabled() || !dict.loaded() {
                return false;
            }
            match self.settings.get(dict.dict_name()) {
                Some(s) => s.enabled() && (flag == 0 || s.allows(flag)),
                None => true,
            }
        })
    }

    fn context_of(&self, name: &str) -> (i32, String) {
        self.settings
            .get(name)
            .map(|s| (s.order, s.symbol.clone()))
            .unwrap_or((0, String::new()))
    }
}
