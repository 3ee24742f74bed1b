//! Per-dictionary search: candidate selection, scoring, worker pool

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use regex::Regex;

use super::content::ContentStore;
use super::index::DictIndex;
use super::models::{IndexEntry, RawResult};
use super::scoring::{self, FuzzyQuery};

type ScoreFn = dyn Fn(&IndexEntry) -> u8 + Send + Sync;

/// Fuzzy search: candidates come from the prefix bucket of the query's
/// main word, then whole-string and word-level similarity rank them.
pub(crate) fn search_fuzzy(
    index: &Arc<DictIndex>,
    content: &Arc<ContentStore>,
    query: &str,
    worker_count: usize,
    timeout: Duration,
    word_match: bool,
) -> Vec<RawResult> {
    let query_lower = query.trim().to_lowercase();
    let parsed = FuzzyQuery::parse(&query_lower);
    let main_word: String = parsed.main_word().iter().collect();
    if main_word.is_empty() {
        return Vec::new();
    }
    let candidates = index.candidates_for_word(&main_word);
    let score = Arc::new(move |entry: &IndexEntry| {
        scoring::score_fuzzy(&entry.terms, &parsed, word_match)
    });
    run_scored(index, content, candidates, worker_count, timeout, score)
}

/// Prefix search: candidates come from the bucket of the query's first
/// word; a term must start with the full (case-folded) query.
pub(crate) fn search_start_with(
    index: &Arc<DictIndex>,
    content: &Arc<ContentStore>,
    query: &str,
    worker_count: usize,
    timeout: Duration,
) -> Vec<RawResult> {
    let query_lower = query.trim().to_lowercase();
    let first_word = match query_lower.split(' ').find(|w| !w.is_empty()) {
        Some(word) => word.to_string(),
        None => return Vec::new(),
    };
    let candidates = index.candidates_for_word(&first_word);
    let score =
        Arc::new(move |entry: &IndexEntry| scoring::score_start_with(&entry.terms, &query_lower));
    run_scored(index, content, candidates, worker_count, timeout, score)
}

/// Regex search: full scan (the prefix index cannot narrow a pattern),
/// whole-term anchored match against case-folded terms.
pub(crate) fn search_regex(
    index: &Arc<DictIndex>,
    content: &Arc<ContentStore>,
    pattern: &str,
    worker_count: usize,
    timeout: Duration,
) -> Vec<RawResult> {
    let anchored = format!("^(?:{})$", pattern.to_lowercase());
    search_pattern(index, content, &anchored, worker_count, timeout)
}

/// Glob search: the glob is translated to an anchored regex
/// (`*` -> `.*`, `?` -> `.`) and run as a full scan.
pub(crate) fn search_glob(
    index: &Arc<DictIndex>,
    content: &Arc<ContentStore>,
    glob: &str,
    worker_count: usize,
    timeout: Duration,
) -> Vec<RawResult> {
    let pattern = glob_to_regex(&glob.to_lowercase());
    search_pattern(index, content, &pattern, worker_count, timeout)
}

fn search_pattern(
    index: &Arc<DictIndex>,
    content: &Arc<ContentStore>,
    anchored_pattern: &str,
    worker_count: usize,
    timeout: Duration,
) -> Vec<RawResult> {
    let regex = match Regex::new(anchored_pattern) {
        Ok(regex) => regex,
        Err(err) => {
            // A bad pattern degrades to an empty result, not an error.
            warn!("Pattern {:?} rejected: {}", anchored_pattern, err);
            return Vec::new();
        }
    };
    let candidates = index.all_candidates();
    let score = Arc::new(move |entry: &IndexEntry| {
        for (position, term) in entry.terms.iter().enumerate() {
            if regex.is_match(&term.to_lowercase()) {
                return scoring::SCORE_MAX - position.min(3) as u8;
            }
        }
        0
    });
    run_scored(index, content, candidates, worker_count, timeout, score)
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^(?:");
    for c in glob.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push_str(")$");
    out
}

/// Score a candidate range, splitting it across worker threads when it is
/// worth the fan-out.
///
/// The range splits into contiguous chunks, one detached thread each;
/// partial result vectors arrive over a bounded channel. The caller waits
/// up to `timeout` for all partials and returns whatever arrived when the
/// deadline passes. Workers poll a shared cancel flag so abandoned chunks
/// stop scoring shortly after a timeout instead of running to completion
/// against a possibly-closing dictionary.
fn run_scored(
    index: &Arc<DictIndex>,
    content: &Arc<ContentStore>,
    candidates: Vec<u32>,
    worker_count: usize,
    timeout: Duration,
    score: Arc<ScoreFn>,
) -> Vec<RawResult> {
    if worker_count < 2 || candidates.len() < 2 * worker_count {
        return score_chunk(index, content, &candidates, &score, None);
    }

    let chunk_size = candidates.len().div_ceil(worker_count);
    let cancel = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::sync_channel::<Vec<RawResult>>(worker_count);

    let mut spawned = 0usize;
    for chunk in candidates.chunks(chunk_size) {
        let chunk = chunk.to_vec();
        let index = Arc::clone(index);
        let content = Arc::clone(content);
        let score = Arc::clone(&score);
        let cancel = Arc::clone(&cancel);
        let tx = tx.clone();
        thread::spawn(move || {
            let partial = score_chunk(&index, &content, &chunk, &score, Some(&cancel));
            // The receiver may be gone after a timeout; that is fine.
            let _ = tx.send(partial);
        });
        spawned += 1;
    }
    drop(tx);

    let deadline = Instant::now() + timeout;
    let mut results = Vec::new();
    for _ in 0..spawned {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(partial) => results.extend(partial),
            Err(_) => {
                debug!(
                    "Search timed out after {:?}; returning {} partial results",
                    timeout,
                    results.len()
                );
                cancel.store(true, Ordering::Relaxed);
                break;
            }
        }
    }
    results
}

fn score_chunk(
    index: &Arc<DictIndex>,
    content: &Arc<ContentStore>,
    candidates: &[u32],
    score: &Arc<ScoreFn>,
    cancel: Option<&AtomicBool>,
) -> Vec<RawResult> {
    let mut results = Vec::new();
    for &entry_index in candidates {
        if let Some(flag) = cancel {
            if flag.load(Ordering::Relaxed) {
                break;
            }
        }
        let entry = &index.entries[entry_index as usize];
        let value = score(entry);
        if value > 0 {
            results.push(RawResult::new(
                value,
                entry_index,
                Arc::clone(index),
                Arc::clone(content),
            ));
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn synthetic_index(entry_count: u32) -> Arc<DictIndex> {
        let mut idx = Vec::new();
        for i in 0..entry_count {
            idx.extend_from_slice(format!("word{}", i).as_bytes());
            idx.push(0);
            idx.extend_from_slice(&i.to_be_bytes());
            idx.extend_from_slice(&1u32.to_be_bytes());
        }
        Arc::new(DictIndex::build(&idx, None, false).expect("synthetic index"))
    }

    fn synthetic_content(dir: &tempfile::TempDir) -> Arc<ContentStore> {
        let dict_path = dir.path().join("test.dict");
        let dz_path = dir.path().join("test.dict.dz");
        let mut file = std::fs::File::create(&dict_path).expect("create blob");
        file.write_all(&[0u8; 64]).expect("write blob");
        Arc::new(ContentStore::open(&dict_path, &dz_path, None).expect("open blob"))
    }

    #[test]
    fn timeout_returns_partials_from_responsive_workers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index = synthetic_index(8);
        let content = synthetic_content(&dir);

        // Two workers over eight candidates: the chunk holding offsets
        // 4..8 stalls far past the deadline, the other answers instantly.
        let score: Arc<ScoreFn> = Arc::new(|entry: &IndexEntry| {
            if entry.offset >= 4 {
                thread::sleep(Duration::from_millis(400));
            }
            100
        });
        let candidates: Vec<u32> = (0..8).collect();
        let results = run_scored(
            &index,
            &content,
            candidates,
            2,
            Duration::from_millis(120),
            score,
        );

        assert_eq!(
            results.len(),
            4,
            "expected exactly the responsive worker's partial"
        );
        assert!(results.iter().all(|r| r.entry_index() < 4));
    }

    #[test]
    fn small_candidate_sets_run_serially() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index = synthetic_index(3);
        let content = synthetic_content(&dir);

        let score: Arc<ScoreFn> = Arc::new(|_: &IndexEntry| 7);
        let results = run_scored(
            &index,
            &content,
            vec![0, 1, 2],
            4,
            Duration::from_millis(1),
            score,
        );
        assert_eq!(results.len(), 3);
    }
}
