//! # stardict-engine
//!
//! A personal dictionary lookup engine for StarDict packages
//! (.ifo/.idx/.dict[.dz] with optional .syn synonym files).
//!
//! Packages are parsed into in-memory indexes once; queries then run
//! concurrently across all enabled dictionaries and come back as one
//! globally ranked list whose definitions decode lazily on display.
pub mod stardict;

// Re-export the main types for convenience
pub use stardict::{
    coordinator::{DictionaryPool, ScoredResult, SearchMode, SearchOptions},
    metadata::DictionaryMetadata,
    models::{IndexEntry, RawResult, Segment},
    settings::DictionarySettings,
    DictError, Dictionary, Result,
};
