use std::env;
use std::path::PathBuf;
use std::time::Duration;

use stardict_engine::{DictionaryPool, SearchMode, SearchOptions, Segment};

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "Usage: {} <dictionary-dir>... [--query <text>] [--mode fuzzy|prefix|regex|glob] [--settings <file>]",
            args[0]
        );
        std::process::exit(1);
    }

    let mut roots: Vec<PathBuf> = Vec::new();
    let mut query: Option<String> = None;
    let mut mode = SearchMode::Fuzzy;
    let mut settings_path: Option<PathBuf> = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--query" => match iter.next() {
                Some(text) => query = Some(text.clone()),
                None => {
                    eprintln!("ERROR: --query requires an argument.");
                    std::process::exit(1);
                }
            },
            "--mode" => match iter.next().map(String::as_str) {
                Some("fuzzy") => mode = SearchMode::Fuzzy,
                Some("prefix") => mode = SearchMode::StartWith,
                Some("regex") => mode = SearchMode::Regex,
                Some("glob") => mode = SearchMode::Glob,
                other => {
                    eprintln!("ERROR: unknown mode {:?}.", other.unwrap_or(""));
                    std::process::exit(1);
                }
            },
            "--settings" => match iter.next() {
                Some(path) => settings_path = Some(PathBuf::from(path)),
                None => {
                    eprintln!("ERROR: --settings requires an argument.");
                    std::process::exit(1);
                }
            },
            dir => roots.push(PathBuf::from(dir)),
        }
    }

    println!("Scanning {} root(s)", roots.len());
    println!("{}", "=".repeat(60));

    let pool = match DictionaryPool::open(&roots, settings_path.as_deref()) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("\nERROR: Failed to open dictionaries");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    };

    println!("\nDictionaries:");
    for dict in pool.dictionaries() {
        println!(
            "  {}: {} entries, index {} bytes{}",
            dict.dict_name(),
            dict.entry_count(),
            dict.index_file_size(),
            if dict.disabled() { " (disabled)" } else { "" }
        );
        if let Some(desc) = dict.description() {
            println!("    {}", desc);
        }
    }

    let Some(query) = query else {
        return;
    };

    let opts = SearchOptions {
        worker_count: 4,
        timeout: Duration::from_secs(5),
        max_results: 10,
    };
    let results = pool.search(&query, mode, &opts);

    println!("\n{} result(s) for {:?}:", results.len(), query);
    for (i, scored) in results.iter().enumerate() {
        println!(
            "  {}. [{}] {} ({}, score {})",
            i + 1,
            scored.symbol,
            scored.result.terms().join(" | "),
            scored.dict_name,
            scored.result.score()
        );
        match scored.result.segments() {
            Ok(segments) => {
                for segment in segments {
                    match segment {
                        Segment::Text { text, .. } => println!("     {}", text),
                        Segment::Blob { kind, data } => {
                            println!("     <{} bytes of type {:?}>", data.len(), kind as char)
                        }
                    }
                }
            }
            Err(e) => println!("     <definition unavailable: {}>", e),
        }
    }
}
