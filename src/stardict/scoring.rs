//! Match scoring: exact, edit-distance similarity, prefix, word-level fuzzy
//!
//! All scores are 0-200 (200 = best). The constants here (the 200 scale,
//! the position caps of 3 and 20, the 50 floor, the `>>1 + /7` dampening)
//! are empirically tuned and load-bearing for ranking compatibility; do
//! not adjust them.

/// Best possible score.
pub const SCORE_MAX: u8 = 200;

/// Minimum word-level similarity worth keeping.
const WORD_SCORE_MIN: u8 = 50;

/// Position-based penalty: primary terms score marginally higher than
/// later synonyms.
fn term_position_penalty(position: usize) -> u8 {
    position.min(3) as u8
}

/// Score an exact (case-folded) match against a term list.
///
/// Returns 0 when no term matches.
pub fn score_exact(terms: &[String], query_lower: &str) -> u8 {
    for (position, term) in terms.iter().enumerate() {
        if term.to_lowercase() == query_lower {
            return SCORE_MAX - term_position_penalty(position);
        }
    }
    0
}

/// Score a prefix match: the term must start with the query, and longer
/// leftovers rank lower (capped at 20).
pub fn score_start_with(terms: &[String], query_lower: &str) -> u8 {
    let query_len = query_lower.chars().count();
    let mut best = 0u8;
    for (position, term) in terms.iter().enumerate() {
        let term_lower = term.to_lowercase();
        if !term_lower.starts_with(query_lower) {
            continue;
        }
        let length_delta = term_lower.chars().count() - query_len;
        let score = SCORE_MAX - term_position_penalty(position) - length_delta.min(20) as u8;
        best = best.max(score);
    }
    best
}

/// Edit-distance similarity mapped onto the 0-200 scale.
///
/// When the shorter string is below two thirds of the longer one the
/// strings cannot score usefully, so the expensive distance computation is
/// skipped and 0 returned.
pub fn similarity(a: &[char], b: &[char], subtract: u8) -> u8 {
    let n = a.len().max(b.len());
    if n == 0 {
        return 0;
    }
    if a.len().min(b.len()) < n - n / 3 {
        return 0;
    }
    let d = edit_distance(a, b);
    (200 * (n - d) / n).saturating_sub(subtract as usize) as u8
}

/// Plain Levenshtein distance over two char sequences, two-row DP.
fn edit_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}

/// A fuzzy query, parsed once per search.
///
/// The query is split on spaces; a leading run of `*` tokens acts as
/// wildcards that shift the "main word" to a later position in candidate
/// terms. `*word` means "word should be the second word of the entry".
#[derive(Debug, Clone)]
pub struct FuzzyQuery {
    runes: Vec<char>,
    main_word: Vec<char>,
    main_word_index: usize,
    min_word_count: usize,
    query_word_count: usize,
}

impl FuzzyQuery {
    pub fn parse(query_lower: &str) -> Self {
        let tokens: Vec<&str> = query_lower.split(' ').collect();
        let mut main_word_index = 0;
        for token in &tokens {
            if *token == "*" {
                main_word_index += 1;
            } else {
                break;
            }
        }
        let query_word_count = tokens.iter().filter(|t| **t != "*").count();
        let main_word = tokens
            .get(main_word_index)
            .map(|w| w.chars().collect())
            .unwrap_or_default();
        Self {
            runes: query_lower.chars().collect(),
            main_word,
            main_word_index,
            min_word_count: 1 + main_word_index,
            query_word_count,
        }
    }

    pub fn main_word(&self) -> &[char] {
        &self.main_word
    }
}

/// Score one candidate term list against a fuzzy query.
///
/// The best of whole-string similarity and word-level similarity wins;
/// candidates scoring 0 under every rule are excluded by the caller.
/// `word_match` gates the word-level pass (a per-dictionary capability).
pub fn score_fuzzy(terms: &[String], query: &FuzzyQuery, word_match: bool) -> u8 {
    let mut best = 0u8;
    for (position, term) in terms.iter().enumerate() {
        let subtract = term_position_penalty(position);
        let term_lower = term.to_lowercase();
        let words: Vec<&str> = term_lower.split(' ').collect();

        // Whole-string similarity only makes sense once the candidate has
        // enough words to cover the wildcard prefix of the query.
        if words.len() >= query.min_word_count {
            let term_runes: Vec<char> = term_lower.chars().collect();
            best = best.max(similarity(&query.runes, &term_runes, subtract));
        }

        if word_match && words.len() > 1 {
            best = best.max(score_words(&words, query, subtract));
        }
    }
    best
}

/// Word-level fuzzy: the query's main word against every word of a
/// multi-word candidate term.
fn score_words(words: &[&str], query: &FuzzyQuery, subtract: u8) -> u8 {
    let mut best = 0u8;
    for (word_index, word) in words.iter().enumerate() {
        let word_runes: Vec<char> = word.chars().collect();
        let score = similarity(query.main_word(), &word_runes, subtract);
        if score < WORD_SCORE_MIN {
            continue;
        }
        // Matching at the designated main-word position costs almost
        // nothing; drifting to another position costs a tenth.
        let score = if word_index == query.main_word_index {
            score - 1
        } else {
            score - score / 10
        };
        best = best.max(score);
    }
    if query.query_word_count > 1 {
        best = (best >> 1) + best / 7;
    }
    best
}
