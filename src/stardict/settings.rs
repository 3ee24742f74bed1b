//! Per-dictionary settings: persistence and rename reconciliation

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::error::{DictError, Result};
use super::Dictionary;

pub const FLAG_FUZZY: u32 = 1 << 0;
pub const FLAG_START_WITH: u32 = 1 << 1;
pub const FLAG_REGEX: u32 = 1 << 2;
pub const FLAG_GLOB: u32 = 1 << 3;
pub const FLAG_WORD_MATCH: u32 = 1 << 4;
pub const FLAGS_ALL: u32 =
    FLAG_FUZZY | FLAG_START_WITH | FLAG_REGEX | FLAG_GLOB | FLAG_WORD_MATCH;

fn default_flags() -> u32 {
    FLAGS_ALL
}

fn default_volume() -> i32 {
    100
}

/// Per-dictionary user state, persisted as one value of the name-keyed
/// settings JSON object.
///
/// The sign of `order` is the sole source of truth for enable/disable
/// during a session: negative means disabled. `hash` identifies the
/// package content so settings survive a rename.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DictionarySettings {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub hash: String,
    #[serde(default = "default_flags")]
    pub flags: u32,
    #[serde(default)]
    pub hide_terms_header: bool,
    #[serde(default = "default_volume")]
    pub audio_volume: i32,
}

impl DictionarySettings {
    pub fn new(order: i32, symbol: String, hash: String) -> Self {
        Self {
            symbol,
            order,
            hash,
            flags: FLAGS_ALL,
            hide_terms_header: false,
            audio_volume: default_volume(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.order >= 0
    }

    pub fn allows(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

/// Name-keyed settings map. A `BTreeMap` keeps the serialized file stable
/// across saves.
pub type SettingsMap = BTreeMap<String, DictionarySettings>;

/// Load the settings map; a missing file is an empty map, a corrupt file
/// is a [`DictError::Settings`] for the caller to display.
pub fn load_settings(path: &Path) -> Result<SettingsMap> {
    if !path.exists() {
        return Ok(SettingsMap::new());
    }
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| DictError::Settings(format!("{}: {}", path.display(), e)))
}

pub fn save_settings(path: &Path, map: &SettingsMap) -> Result<()> {
    let text = serde_json::to_string_pretty(map)
        .map_err(|e| DictError::Settings(e.to_string()))?;
    fs::write(path, text)?;
    Ok(())
}

/// Attach settings to freshly scanned dictionaries, migrating renamed
/// packages by content hash.
///
/// For every discovered dictionary missing from the map: if another entry
/// (one that no longer matches any discovered name) carries the same
/// content hash, the package was renamed, so that entry moves to the new
/// name with order/symbol/flags intact. Otherwise a fresh entry is created
/// with the scan position as its order. Returns whether the map changed
/// and needs saving. A hash failure is logged and yields a fresh,
/// non-migrated entry; it never fails the scan.
pub fn reconcile(map: &mut SettingsMap, dictionaries: &[&Dictionary]) -> bool {
    let current: HashSet<&str> = dictionaries.iter().map(|d| d.dict_name()).collect();
    let mut changed = false;

    for (scan_position, dict) in dictionaries.iter().enumerate() {
        let name = dict.dict_name().to_string();
        if map.contains_key(&name) {
            continue;
        }

        let hash = match dict.calc_hash() {
            Ok(hash) => hash,
            Err(err) => {
                warn!("Content hash unavailable for {:?}: {}", name, err);
                String::new()
            }
        };

        let stale_name = if hash.is_empty() {
            None
        } else {
            map.iter()
                .find(|(old_name, s)| s.hash == hash && !current.contains(old_name.as_str()))
                .map(|(old_name, _)| old_name.clone())
        };

        match stale_name.and_then(|old_name| {
            map.remove(&old_name).map(|settings| (old_name, settings))
        }) {
            Some((old_name, settings)) => {
                // Rename: one settings entry per content hash, moved to
                // the new name.
                info!("Settings migrated: {:?} -> {:?}", old_name, name);
                map.insert(name, settings);
            }
            None => {
                let symbol = name
                    .chars()
                    .next()
                    .map(|c| c.to_uppercase().to_string())
                    .unwrap_or_default();
                map.insert(
                    name,
                    DictionarySettings::new(scan_position as i32, symbol, hash),
                );
            }
        }
        changed = true;
    }

    changed
}
