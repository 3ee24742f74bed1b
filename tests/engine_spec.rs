use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use stardict_engine::stardict::content::decode_segments;
use stardict_engine::stardict::index::DictIndex;
use stardict_engine::stardict::metadata::DictionaryMetadata;
use stardict_engine::stardict::scoring::{self, FuzzyQuery};
use stardict_engine::stardict::settings::{
    self, load_settings, reconcile, FLAGS_ALL, FLAG_REGEX,
};
use stardict_engine::{
    DictError, Dictionary, DictionaryPool, DictionarySettings, SearchMode, SearchOptions, Segment,
};

// --- Fixture helpers ---

fn build_idx(entries: &[(&str, u32, u32)]) -> Vec<u8> {
    let mut idx = Vec::new();
    for (term, offset, size) in entries {
        idx.extend_from_slice(term.as_bytes());
        idx.push(0);
        idx.extend_from_slice(&offset.to_be_bytes());
        idx.extend_from_slice(&size.to_be_bytes());
    }
    idx
}

fn build_syn(records: &[(&str, u32)]) -> Vec<u8> {
    let mut syn = Vec::new();
    for (term, entry_index) in records {
        syn.extend_from_slice(term.as_bytes());
        syn.push(0);
        syn.extend_from_slice(&entry_index.to_be_bytes());
    }
    syn
}

fn build_ifo(book_name: &str, word_count: usize) -> String {
    format!(
        "StarDict's dict ifo file\nversion=3.0.0\nbookname={}\nwordcount={}\nsametypesequence=m\n",
        book_name, word_count
    )
}

/// Write a complete package (`.ifo`, `.idx`, `.dict`, optional `.syn`)
/// with `sametypesequence=m` definitions and return the `.ifo` path.
fn write_package(
    dir: &Path,
    stem: &str,
    book_name: &str,
    defs: &[(&str, &str)],
    syn: &[(&str, u32)],
    compress_dict: bool,
) -> PathBuf {
    let mut blob = Vec::new();
    let mut entries = Vec::new();
    for (term, definition) in defs {
        let offset = blob.len() as u32;
        blob.extend_from_slice(definition.as_bytes());
        entries.push((*term, offset, definition.len() as u32));
    }

    let ifo_path = dir.join(format!("{}.ifo", stem));
    fs::write(&ifo_path, build_ifo(book_name, defs.len())).expect("write ifo");
    fs::write(dir.join(format!("{}.idx", stem)), build_idx(&entries)).expect("write idx");
    if !syn.is_empty() {
        fs::write(dir.join(format!("{}.syn", stem)), build_syn(syn)).expect("write syn");
    }

    if compress_dict {
        let file =
            fs::File::create(dir.join(format!("{}.dict.dz", stem))).expect("create dict.dz");
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&blob).expect("compress blob");
        encoder.finish().expect("finish gzip");
    } else {
        fs::write(dir.join(format!("{}.dict", stem)), &blob).expect("write dict");
    }
    ifo_path
}

fn open_package(
    dir: &Path,
    stem: &str,
    book_name: &str,
    defs: &[(&str, &str)],
) -> Dictionary {
    let ifo = write_package(dir, stem, book_name, defs, &[], false);
    let mut dict = Dictionary::discover(&ifo).expect("discover");
    dict.load().expect("load");
    dict
}

fn opts() -> SearchOptions {
    SearchOptions {
        worker_count: 1,
        timeout: Duration::from_secs(5),
        max_results: 0,
    }
}

fn first_text(segments: &[Segment]) -> &str {
    match segments.first() {
        Some(Segment::Text { text, .. }) => text,
        other => panic!("expected a text segment, got {:?}", other),
    }
}

// --- Format parsing ---

#[test]
fn idx_round_trip_reproduces_entries() {
    let idx = build_idx(&[("alpha", 0, 5), ("beta", 5, 4)]);
    let index = DictIndex::build(&idx, None, false).expect("build index");

    assert_eq!(index.entry_count(), 2);
    assert_eq!(index.entries[0].terms, vec!["alpha".to_string()]);
    assert_eq!(index.entries[0].offset, 0);
    assert_eq!(index.entries[0].size, 5);
    assert_eq!(index.entries[1].terms, vec!["beta".to_string()]);
    assert_eq!(index.entries[1].offset, 5);
    assert_eq!(index.entries[1].size, 4);
}

#[test]
fn idx_64_bit_offsets_follow_metadata_flag() {
    let mut idx = Vec::new();
    idx.extend_from_slice(b"wide\0");
    idx.extend_from_slice(&0x1_0000_0000u64.to_be_bytes());
    idx.extend_from_slice(&7u64.to_be_bytes());
    let index = DictIndex::build(&idx, None, true).expect("build 64-bit index");
    assert_eq!(index.entries[0].offset, 0x1_0000_0000);
    assert_eq!(index.entries[0].size, 7);
}

#[test]
fn truncated_idx_stream_is_a_format_error() {
    let mut idx = build_idx(&[("alpha", 0, 5)]);
    idx.extend_from_slice(b"beta\0\x00\x00"); // offset cut short
    let err = DictIndex::build(&idx, None, false).unwrap_err();
    assert!(matches!(err, DictError::Format(_)), "got {:?}", err);

    let unterminated = b"alpha".to_vec(); // no NUL at all
    let err = DictIndex::build(&unterminated, None, false).unwrap_err();
    assert!(matches!(err, DictError::Format(_)), "got {:?}", err);
}

#[test]
fn synonym_out_of_range_is_a_format_error() {
    let idx = build_idx(&[("alpha", 0, 5)]);
    let syn = build_syn(&[("alef", 9)]);
    let err = DictIndex::build(&idx, Some(&syn), false).unwrap_err();
    assert!(matches!(err, DictError::Format(_)), "got {:?}", err);
}

#[test]
fn synonyms_append_terms_and_feed_the_prefix_index() {
    let idx = build_idx(&[("colour", 0, 3)]);
    let syn = build_syn(&[("color", 0)]);
    let index = DictIndex::build(&idx, Some(&syn), false).expect("build with syn");

    assert_eq!(
        index.entries[0].terms,
        vec!["colour".to_string(), "color".to_string()]
    );
    // Both the primary and the synonym prefix reach the same entry.
    assert_eq!(index.candidates_for_word("co"), vec![0]);
    assert_eq!(index.candidates_for_word("colo"), vec![0]);
}

#[test]
fn metadata_parses_typed_fields() {
    let meta = DictionaryMetadata::parse_str(
        "StarDict's dict ifo file\nversion=2.4.2\nbookname=Example=Name\nwordcount=42\nidxoffsetbits=64\ndescription=test dict\n",
    )
    .expect("parse metadata");
    assert_eq!(meta.book_name, "Example=Name"); // first '=' splits
    assert_eq!(meta.word_count, 42);
    assert!(meta.is_64);
    assert_eq!(meta.description(), Some("test dict"));
    assert_eq!(meta.same_type_sequence, None);
}

#[test]
fn metadata_rejects_unknown_version() {
    let err = DictionaryMetadata::parse_str("StarDict's dict ifo file\nversion=9.9.9\n")
        .unwrap_err();
    assert!(matches!(err, DictError::UnsupportedVersion(v) if v == "9.9.9"));
}

#[test]
fn metadata_rejects_bad_header_and_bad_lines() {
    let err = DictionaryMetadata::parse_str("Some other file\nversion=3.0.0\n").unwrap_err();
    assert!(matches!(err, DictError::Format(_)), "got {:?}", err);

    let err = DictionaryMetadata::parse_str(
        "StarDict's dict ifo file\nversion=3.0.0\nbookname no equals sign\n",
    )
    .unwrap_err();
    assert!(matches!(err, DictError::Format(_)), "got {:?}", err);
}

// --- Content decoding ---

#[test]
fn fixed_sequence_decodes_text_and_trailing_blob() {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"hello\0");
    buf.extend_from_slice(&[0xAB, 0xCD, 0xEF]);
    let segments = decode_segments(&buf, Some("mW")).expect("decode");
    assert_eq!(
        segments,
        vec![
            Segment::Text {
                kind: b'm',
                text: "hello".to_string()
            },
            Segment::Blob {
                kind: b'W',
                data: vec![0xAB, 0xCD, 0xEF]
            },
        ]
    );

    // The last text segment may omit its NUL.
    let segments = decode_segments(b"word\0no trailing nul", Some("tm")).expect("decode");
    assert_eq!(first_text(&segments), "word");
    assert_eq!(
        segments[1],
        Segment::Text {
            kind: b'm',
            text: "no trailing nul".to_string()
        }
    );
}

#[test]
fn tagged_stream_decodes_until_exhausted() {
    let mut buf = Vec::new();
    buf.push(b'm');
    buf.extend_from_slice(b"plain\0");
    buf.push(b'W');
    buf.extend_from_slice(&2u32.to_be_bytes());
    buf.extend_from_slice(&[0x01, 0x02]);
    buf.push(b'h');
    buf.extend_from_slice(b"<b>tail</b>"); // final segment, no NUL

    let segments = decode_segments(&buf, None).expect("decode tagged");
    assert_eq!(segments.len(), 3);
    assert_eq!(first_text(&segments), "plain");
    assert_eq!(
        segments[1],
        Segment::Blob {
            kind: b'W',
            data: vec![0x01, 0x02]
        }
    );
    assert_eq!(
        segments[2],
        Segment::Text {
            kind: b'h',
            text: "<b>tail</b>".to_string()
        }
    );
}

#[test]
fn unknown_type_byte_is_a_local_decode_error() {
    let err = decode_segments(b"Zoops\0", None).unwrap_err();
    assert!(matches!(err, DictError::Format(_)), "got {:?}", err);
}

#[test]
fn dict_dz_is_decompressed_once_alongside_the_original() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ifo = write_package(
        dir.path(),
        "zipped",
        "Zipped",
        &[("alpha", "first letter")],
        &[],
        true,
    );

    let mut dict = Dictionary::discover(&ifo).expect("discover");
    dict.load().expect("load decompresses");
    let blob_path = dir.path().join("zipped.dict");
    assert!(blob_path.exists(), "decompressed blob should be persisted");

    let results = dict.search_fuzzy("alpha", 1, Duration::from_secs(1));
    assert_eq!(first_text(&results[0].segments().expect("segments")), "first letter");

    // A second open must reuse the existing blob rather than decompress
    // again: overwrite it and observe the change. The replacement matches
    // the original definition's 12-byte size.
    fs::write(&blob_path, b"OVERWRITTEN!").expect("overwrite blob");
    let mut reopened = Dictionary::discover(&ifo).expect("discover again");
    reopened.load().expect("load reuses blob");
    let results = reopened.search_fuzzy("alpha", 1, Duration::from_secs(1));
    assert_eq!(
        first_text(&results[0].segments().expect("segments")),
        "OVERWRITTEN!"
    );
}

// --- Scoring ---

#[test]
fn exact_match_scores_full_and_synonyms_slightly_less() {
    assert_eq!(scoring::score_exact(&["beta".to_string()], "beta"), 200);
    let terms = vec!["primary".to_string(), "beta".to_string()];
    assert_eq!(scoring::score_exact(&terms, "beta"), 199);
    assert_eq!(scoring::score_exact(&terms, "missing"), 0);
}

#[test]
fn similarity_short_circuits_on_length_ratio() {
    let a: Vec<char> = "ab".chars().collect();
    let b: Vec<char> = "abcdefghij".chars().collect();
    assert_eq!(scoring::similarity(&a, &b, 0), 0);
}

#[test]
fn similarity_maps_edit_distance_onto_the_score_scale() {
    let a: Vec<char> = "alphx".chars().collect();
    let b: Vec<char> = "alpha".chars().collect();
    // n=5, d=1 -> 200*4/5
    assert_eq!(scoring::similarity(&a, &b, 0), 160);
    assert_eq!(scoring::similarity(&a, &b, 3), 157);
    assert_eq!(scoring::similarity(&a, &a, 0), 200);
}

#[test]
fn prefix_score_subtracts_position_and_length_delta() {
    assert_eq!(
        scoring::score_start_with(&["testing".to_string()], "test"),
        197
    );
    // Length delta is capped at 20.
    let long = "t".to_string() + &"x".repeat(40);
    assert_eq!(scoring::score_start_with(&[long], "t"), 180);
    assert_eq!(scoring::score_start_with(&["other".to_string()], "test"), 0);
}

#[test]
fn word_level_fuzzy_scores_multi_word_terms() {
    let terms = vec!["new york".to_string()];

    // Main word matching at word position 1 loses a tenth.
    let query = FuzzyQuery::parse("york");
    assert_eq!(scoring::score_fuzzy(&terms, &query, true), 180);

    // A leading wildcard designates position 1 as the main word.
    let query = FuzzyQuery::parse("* york");
    assert_eq!(scoring::score_fuzzy(&terms, &query, true), 199);

    // With word-match disabled only whole-string similarity remains,
    // and it short-circuits here.
    let query = FuzzyQuery::parse("york");
    assert_eq!(scoring::score_fuzzy(&terms, &query, false), 0);
}

#[test]
fn multi_word_queries_are_dampened() {
    let terms = vec!["san francisco bay".to_string()];
    let query = FuzzyQuery::parse("san bay");
    // Word-level best: "san" at its main position scores 199, then the
    // two-significant-word dampening: (199>>1) + 199/7 = 99 + 28.
    assert_eq!(scoring::score_fuzzy(&terms, &query, true), 127);
}

// --- Per-dictionary search ---

#[test]
fn fuzzy_search_ranks_near_matches() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dict = open_package(
        dir.path(),
        "en",
        "English",
        &[
            ("alpha", "first"),
            ("alphx", "almost first"),
            ("omega", "last"),
        ],
    );

    let results = dict.search_fuzzy("alpha", 1, Duration::from_secs(1));
    assert_eq!(results.len(), 2, "omega must not appear");
    assert_eq!(results[0].terms(), ["alpha"]);
    assert_eq!(results[0].score(), 200);
    assert_eq!(results[1].terms(), ["alphx"]);
    assert_eq!(results[1].score(), 160);
}

#[test]
fn start_with_search_uses_the_prefix_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dict = open_package(
        dir.path(),
        "en",
        "English",
        &[("beta", "second"), ("bet", "wager"), ("alpha", "first")],
    );

    let results = dict.search_start_with("bet", 1, Duration::from_secs(1));
    let mut terms: Vec<&str> = results.iter().map(|r| &r.terms()[0][..]).collect();
    terms.sort();
    assert_eq!(terms, ["bet", "beta"]);
    // "bet" is the exact prefix (delta 0), "beta" one longer.
    let exact = results.iter().find(|r| r.terms()[0] == "bet").expect("bet");
    let longer = results.iter().find(|r| r.terms()[0] == "beta").expect("beta");
    assert_eq!(exact.score(), 200);
    assert_eq!(longer.score(), 199);
}

#[test]
fn regex_and_glob_searches_scan_every_term() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dict = open_package(
        dir.path(),
        "en",
        "English",
        &[("colour", "gb"), ("color", "us"), ("colt", "horse")],
    );

    let results = dict.search_regex("colou?r", 1, Duration::from_secs(1));
    let mut terms: Vec<&str> = results.iter().map(|r| &r.terms()[0][..]).collect();
    terms.sort();
    assert_eq!(terms, ["color", "colour"]);

    let results = dict.search_glob("col*r", 1, Duration::from_secs(1));
    let mut terms: Vec<&str> = results.iter().map(|r| &r.terms()[0][..]).collect();
    terms.sort();
    assert_eq!(terms, ["color", "colour"]);

    // An invalid pattern degrades to empty, not an error.
    let results = dict.search_regex("(", 1, Duration::from_secs(1));
    assert!(results.is_empty());
}

#[test]
fn disabled_and_closed_dictionaries_return_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut dict = open_package(dir.path(), "en", "English", &[("alpha", "first")]);

    let held = dict.search_fuzzy("alpha", 1, Duration::from_secs(1));
    assert_eq!(held.len(), 1);

    dict.set_disabled(true);
    assert!(!dict.loaded());
    assert!(dict.search_fuzzy("alpha", 1, Duration::from_secs(1)).is_empty());

    // Cheap re-enable: load only reopens the content handle.
    dict.set_disabled(false);
    dict.load().expect("reopen");
    assert_eq!(dict.search_fuzzy("alpha", 1, Duration::from_secs(1)).len(), 1);

    dict.close();
    assert!(dict.search_fuzzy("alpha", 1, Duration::from_secs(1)).is_empty());
    // A result held across the close loses its content access.
    let err = held[0].segments().unwrap_err();
    assert!(matches!(err, DictError::Closed), "got {:?}", err);
}

#[test]
fn broken_package_fails_load_and_stays_closed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ifo = write_package(dir.path(), "bad", "Bad", &[("alpha", "x")], &[], false);
    fs::write(dir.path().join("bad.idx"), b"alpha").expect("truncate idx");

    let mut dict = Dictionary::discover(&ifo).expect("discover");
    assert!(dict.load().is_err());
    assert!(!dict.loaded());
    assert_eq!(dict.entry_count(), 0);
}

// --- Coordinator ---

#[test]
fn ranking_breaks_ties_by_dict_order_then_entry_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dir_a = dir.path().join("a");
    let dir_b = dir.path().join("b");
    fs::create_dir_all(&dir_a).expect("mkdir");
    fs::create_dir_all(&dir_b).expect("mkdir");

    // Both entries in Second score 200; within one dictionary the smaller
    // entry index must come first.
    let first = open_package(&dir_a, "a", "First", &[("zeta", "za")]);
    let second = open_package(&dir_b, "b", "Second", &[("zeta", "zb1"), ("zeta", "zb2")]);

    let mut pool = DictionaryPool::new(vec![first, second]);
    pool.settings_mut().insert(
        "First".to_string(),
        DictionarySettings::new(2, "F".to_string(), String::new()),
    );
    pool.settings_mut().insert(
        "Second".to_string(),
        DictionarySettings::new(1, "S".to_string(), String::new()),
    );

    let results = pool.search("zeta", SearchMode::Fuzzy, &opts());
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.result.score() == 200));
    assert_eq!(results[0].dict_name, "Second");
    assert_eq!(results[0].result.entry_index(), 0);
    assert_eq!(results[1].dict_name, "Second");
    assert_eq!(results[1].result.entry_index(), 1);
    assert_eq!(results[2].dict_name, "First");
    assert_eq!(results[2].order, 2);
}

#[test]
fn truncation_happens_after_global_ranking() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dir_a = dir.path().join("a");
    let dir_b = dir.path().join("b");
    fs::create_dir_all(&dir_a).expect("mkdir");
    fs::create_dir_all(&dir_b).expect("mkdir");

    // The earlier dictionary only has a weaker match; the later one has
    // the exact match. A cap of one must keep the exact match.
    let weak = open_package(&dir_a, "a", "Weak", &[("alphx", "near miss")]);
    let strong = open_package(&dir_b, "b", "Strong", &[("alpha", "exact")]);
    let pool = DictionaryPool::new(vec![weak, strong]);

    let mut options = opts();
    options.max_results = 1;
    let results = pool.search("alpha", SearchMode::Fuzzy, &options);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].dict_name, "Strong");
    assert_eq!(results[0].result.score(), 200);
}

#[test]
fn capability_flags_gate_modes_per_dictionary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dict = open_package(dir.path(), "en", "English", &[("alpha", "first")]);
    let mut pool = DictionaryPool::new(vec![dict]);

    let mut s = DictionarySettings::new(0, "E".to_string(), String::new());
    s.flags = FLAGS_ALL & !FLAG_REGEX;
    pool.settings_mut().insert("English".to_string(), s);

    assert!(pool.search("alpha", SearchMode::Regex, &opts()).is_empty());
    assert_eq!(pool.search("alpha", SearchMode::Fuzzy, &opts()).len(), 1);
}

#[test]
fn negative_order_disables_a_dictionary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dict = open_package(dir.path(), "en", "English", &[("alpha", "first")]);
    let mut pool = DictionaryPool::new(vec![dict]);
    pool.settings_mut().insert(
        "English".to_string(),
        DictionarySettings::new(-1, "E".to_string(), String::new()),
    );

    assert!(pool.search("alpha", SearchMode::Fuzzy, &opts()).is_empty());
    assert!(pool.random_entry().is_none());
}

#[test]
fn random_entry_is_proportional_to_entry_count() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dir_a = dir.path().join("a");
    let dir_b = dir.path().join("b");
    fs::create_dir_all(&dir_a).expect("mkdir");
    fs::create_dir_all(&dir_b).expect("mkdir");

    let big_defs: Vec<(String, String)> = (0..30)
        .map(|i| (format!("bigword{}", i), format!("def {}", i)))
        .collect();
    let big_refs: Vec<(&str, &str)> = big_defs
        .iter()
        .map(|(t, d)| (t.as_str(), d.as_str()))
        .collect();
    let small_defs: Vec<(String, String)> = (0..10)
        .map(|i| (format!("smallword{}", i), format!("def {}", i)))
        .collect();
    let small_refs: Vec<(&str, &str)> = small_defs
        .iter()
        .map(|(t, d)| (t.as_str(), d.as_str()))
        .collect();

    let big = open_package(&dir_a, "big", "Big", &big_refs);
    let small = open_package(&dir_b, "small", "Small", &small_refs);
    let pool = DictionaryPool::new(vec![big, small]);

    let mut big_hits = 0usize;
    let mut small_hits = 0usize;
    for _ in 0..2000 {
        let entry = pool.random_entry().expect("an entry");
        match entry.dict_name.as_str() {
            "Big" => big_hits += 1,
            "Small" => small_hits += 1,
            other => panic!("unexpected dictionary {:?}", other),
        }
    }
    assert!(small_hits > 0, "the small dictionary must be reachable");
    let ratio = big_hits as f64 / small_hits as f64;
    assert!(
        (2.0..=4.5).contains(&ratio),
        "expected ~3x selection bias, got {:.2} ({} vs {})",
        ratio,
        big_hits,
        small_hits
    );
}

#[test]
fn pool_open_scans_loads_and_persists_settings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("dicts");
    let nested = root.join("nested");
    fs::create_dir_all(&nested).expect("mkdir");
    write_package(&root, "en", "English", &[("alpha", "first letter")], &[], false);
    write_package(&nested, "la", "Latin", &[("alba", "white")], &[], false);
    let settings_path = dir.path().join("dictionaries.json");

    let pool =
        DictionaryPool::open(&[root], Some(&settings_path)).expect("open pool");
    assert_eq!(pool.dictionaries().len(), 2);
    assert!(settings_path.exists(), "settings must be persisted");

    let saved = load_settings(&settings_path).expect("reload settings");
    assert_eq!(saved.len(), 2);
    assert!(saved.values().all(|s| s.order >= 0 && !s.hash.is_empty()));

    let results = pool.search("alba", SearchMode::Fuzzy, &opts());
    assert_eq!(results[0].dict_name, "Latin");
    assert_eq!(
        first_text(&results[0].result.segments().expect("segments")),
        "white"
    );
}

#[test]
fn broken_sibling_does_not_poison_the_scan() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("dicts");
    fs::create_dir_all(&root).expect("mkdir");
    write_package(&root, "ok", "Good", &[("alpha", "fine")], &[], false);
    // A package whose version is unsupported.
    fs::write(root.join("bad.ifo"), "StarDict's dict ifo file\nversion=1.0\n")
        .expect("write bad ifo");
    fs::write(root.join("bad.idx"), build_idx(&[("x", 0, 1)])).expect("write bad idx");
    fs::write(root.join("bad.dict"), b"y").expect("write bad dict");

    let pool = DictionaryPool::open(&[root], None).expect("open pool");
    assert_eq!(pool.dictionaries().len(), 1);
    assert_eq!(pool.dictionaries()[0].dict_name(), "Good");
}

// --- Settings reconciliation ---

#[test]
fn rename_migrates_settings_by_content_hash() {
    let dir = tempfile::tempdir().expect("tempdir");
    let defs = [("alpha", "first"), ("beta", "second")];
    let bar = open_package(dir.path(), "bar", "Bar", &defs);
    let hash = bar.calc_hash().expect("hash");

    let mut map = settings::SettingsMap::new();
    let mut old = DictionarySettings::new(7, "F".to_string(), hash);
    old.hide_terms_header = true;
    map.insert("Foo".to_string(), old);

    let changed = reconcile(&mut map, &[&bar]);
    assert!(changed);
    assert!(!map.contains_key("Foo"), "stale name must be dropped");
    let migrated = map.get("Bar").expect("migrated entry");
    assert_eq!(migrated.order, 7);
    assert_eq!(migrated.symbol, "F");
    assert!(migrated.hide_terms_header);
}

#[test]
fn fresh_dictionaries_get_scan_position_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dir_a = dir.path().join("a");
    let dir_b = dir.path().join("b");
    fs::create_dir_all(&dir_a).expect("mkdir");
    fs::create_dir_all(&dir_b).expect("mkdir");
    let first = open_package(&dir_a, "a", "Aleph", &[("alpha", "x")]);
    let second = open_package(&dir_b, "b", "Bet", &[("beta", "y")]);

    let mut map = settings::SettingsMap::new();
    assert!(reconcile(&mut map, &[&first, &second]));
    assert_eq!(map.get("Aleph").expect("first").order, 0);
    assert_eq!(map.get("Bet").expect("second").order, 1);
    assert_eq!(map.get("Aleph").expect("first").symbol, "A");
    assert!(!reconcile(&mut map, &[&first, &second]), "stable rescan");
}

#[test]
fn settings_json_fills_defaults_for_missing_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");
    fs::write(&path, r#"{"Old": {"order": -2}}"#).expect("write settings");

    let map = load_settings(&path).expect("load");
    let s = map.get("Old").expect("entry");
    assert!(!s.enabled());
    assert_eq!(s.flags, FLAGS_ALL);
    assert_eq!(s.audio_volume, 100);

    let missing = load_settings(&dir.path().join("nope.json")).expect("missing file");
    assert!(missing.is_empty());

    fs::write(&path, "not json").expect("corrupt settings");
    let err = load_settings(&path).unwrap_err();
    assert!(matches!(err, DictError::Settings(_)), "got {:?}", err);
}
