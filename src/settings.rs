//! Settings infrastructure for htmlsp.
//!
//! This module provides support for loading and parsing settings.toml files
//! that toggle per-language validation and formatting, bound folding output and
//! the document cache, and list custom vocabulary data sources.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::document::CacheConfig;
use crate::language::Language;

/// Root settings structure loaded from settings.toml.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Per-language diagnostics toggles, e.g. `css = false`. Languages default to enabled.
    #[serde(default)]
    pub validate: HashMap<String, bool>,

    /// Per-language embedded formatter toggles. Languages default to enabled.
    #[serde(default)]
    pub format: HashMap<String, bool>,

    #[serde(default)]
    pub folding: FoldingSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub custom_data: CustomDataSettings,
}

/// Folding range output bound.
#[derive(Debug, Clone, Deserialize)]
pub struct FoldingSettings {
    /// Maximum number of folding ranges returned for a document.
    #[serde(default = "default_folding_limit")]
    pub limit: usize,
}

impl Default for FoldingSettings {
    fn default() -> Self {
        Self {
            limit: default_folding_limit(),
        }
    }
}

fn default_folding_limit() -> usize {
    5000
}

/// Document cache bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Seconds between age sweeps; also the idle time after which entries expire.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_max_entries() -> usize {
    10
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl CacheSettings {
    pub fn to_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.max_entries.max(1),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
        }
    }
}

/// Custom tag/attribute vocabulary sources.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomDataSettings {
    /// Paths or `file://` URLs, relative paths resolve against the settings directory.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl Settings {
    /// Whether diagnostics of `language` should be published.
    pub fn validation_enabled(&self, language: Language) -> bool {
        toggle(&self.validate, language)
    }

    /// Whether the embedded formatter of `language` takes part in formatting.
    pub fn format_enabled(&self, language: Language) -> bool {
        toggle(&self.format, language)
    }

    /// Log toggle keys that do not name a known language, and languages
    /// named by more than one key.
    pub fn warn_unknown_languages(&self) {
        for (table, toggles) in [("validate", &self.validate), ("format", &self.format)] {
            let mut keys: Vec<&String> = toggles.keys().collect();
            keys.sort();
            let mut seen: Vec<(Language, &str)> = Vec::new();
            for key in keys {
                match key.parse::<Language>() {
                    Ok(language) => {
                        if let Some((_, first)) = seen.iter().find(|(l, _)| *l == language) {
                            tracing::warn!(
                                table,
                                "'{key}' and '{first}' both set {language}, '{}' takes effect",
                                if toggles.contains_key(language.as_str()) {
                                    language.as_str()
                                } else {
                                    first
                                }
                            );
                        } else {
                            seen.push((language, key));
                        }
                    }
                    Err(e) => tracing::warn!(table, "ignoring settings entry: {e}"),
                }
            }
        }
    }
}

/// The toggle for `language`. The canonical id wins over aliases; among
/// aliases the lexicographically first key wins.
fn toggle(toggles: &HashMap<String, bool>, language: Language) -> bool {
    if let Some(&enabled) = toggles.get(language.as_str()) {
        return enabled;
    }
    toggles
        .iter()
        .filter(|(key, _)| key.parse::<Language>().ok() == Some(language))
        .min_by(|(a, _), (b, _)| a.cmp(b))
        .map_or(true, |(_, &enabled)| enabled)
}

/// Read settings from `path`, falling back to defaults when the file is
/// missing or invalid.
pub fn load_settings(path: &Path) -> Settings {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Settings::default();
    };
    toml::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), "invalid settings file, using defaults: {e}");
        Settings::default()
    })
}

/// Name of the settings file looked up by [`discover_settings`].
const SETTINGS_FILE: &str = "settings.toml";

/// Find the settings file for a workspace rooted at `start_dir`.
///
/// `start_dir` and its ancestors are tried first, nearest first; failing
/// that, the immediate subdirectories of `start_dir`. Returns the settings
/// together with the directory holding the file, which custom data sources
/// resolve against. Without a file, defaults are returned with `start_dir`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    if let Some(dir) = start_dir
        .ancestors()
        .find(|dir| dir.join(SETTINGS_FILE).is_file())
    {
        return (load_settings(&dir.join(SETTINGS_FILE)), dir.to_path_buf());
    }

    let child = std::fs::read_dir(start_dir).ok().and_then(|entries| {
        entries
            .flatten()
            .map(|entry| entry.path())
            .find(|path| path.is_dir() && path.join(SETTINGS_FILE).is_file())
    });
    match child {
        Some(dir) => (load_settings(&dir.join(SETTINGS_FILE)), dir),
        None => {
            tracing::debug!(dir = %start_dir.display(), "no settings.toml found, using defaults");
            (Settings::default(), start_dir.to_path_buf())
        }
    }
}
