// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resource-file configuration
//!
//! Loads the `cpmrc` resource file (§6): `~/.cpmrc`, falling back to
//! `/etc/cpm/cpmrc`, then `/etc/cpmrc`. Directives are boolean, integer,
//! string, or list; an unrecognised directive is a [`ConfigError`], not a
//! silently-ignored key, matching §7 ("unknown directives are rejected").
//!
//! `AppConfig` is the validated, immutable result threaded through the rest
//! of the process — `--configtest` stops right after this step and prints
//! the resolved values.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default inactivity-watchdog memory-lock floor (§4.11(3)), in KiB.
pub const DEFAULT_MEMLOCK_LIMIT_KIB: u64 = 5120;

/// Default terminal encoding (§6).
pub const DEFAULT_ENCODING: &str = "ISO-8859-1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown resource-file directive: {0:?}")]
    UnknownDirective(String),

    #[error("invalid value for {directive:?}: {reason}")]
    InvalidValue { directive: String, reason: String },

    #[error("failed to read resource file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse resource file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// The set of directives recognised in a `cpmrc` file. Deliberately a
/// `deny_unknown_fields` struct so an unrecognised key surfaces as a
/// [`ConfigError::UnknownDirective`] via serde's error message rather than
/// being silently dropped.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct RawDirectives {
    debuglevel: u16,
    encoding: String,
    readonly: bool,
    noencryption: bool,
    noignore: bool,
    keep_passphrase: bool,
    memlock_limit: u64,
    #[serde(rename = "key")]
    keys: Vec<String>,
    templates: Vec<String>,
    search_patterns: Vec<String>,
    result_patterns: Vec<String>,
}

impl Default for RawDirectives {
    fn default() -> Self {
        Self {
            debuglevel: 0,
            encoding: DEFAULT_ENCODING.to_string(),
            readonly: false,
            noencryption: false,
            noignore: true,
            keep_passphrase: true,
            memlock_limit: DEFAULT_MEMLOCK_LIMIT_KIB,
            keys: Vec::new(),
            templates: Vec::new(),
            search_patterns: vec!["<Service> <Account>".to_string()],
            result_patterns: vec!["<Password>".to_string()],
        }
    }
}

/// Validated, immutable resource-file configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    debuglevel: u16,
    encoding: String,
    readonly: bool,
    noencryption: bool,
    case_sensitive: bool,
    keep_passphrase: bool,
    memlock_limit_kib: u64,
    default_keys: Vec<String>,
    default_templates: Vec<String>,
    pattern_pairs: Vec<(String, String)>,
}

impl AppConfig {
    pub fn debuglevel(&self) -> u16 {
        self.debuglevel
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn readonly(&self) -> bool {
        self.readonly
    }

    pub fn noencryption(&self) -> bool {
        self.noencryption
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn keep_passphrase(&self) -> bool {
        self.keep_passphrase
    }

    pub fn memlock_limit_kib(&self) -> u64 {
        self.memlock_limit_kib
    }

    pub fn default_keys(&self) -> &[String] {
        &self.default_keys
    }

    pub fn default_templates(&self) -> &[String] {
        &self.default_templates
    }

    /// Configured `(search_pattern, result_pattern)` pairs for C7/C8
    /// (§4.7, §4.8). Both lists must be the same length; see
    /// [`ConfigError::InvalidValue`].
    pub fn pattern_pairs(&self) -> &[(String, String)] {
        &self.pattern_pairs
    }

    /// `--debuglevel` (§6) maps onto a `tracing::Level` via a small lookup
    /// rather than an ad hoc verbosity integer: 0 is silent info-and-above,
    /// anything in 1..=99 is debug, 100+ is trace.
    pub fn tracing_level(&self) -> tracing::Level {
        match self.debuglevel {
            0 => tracing::Level::INFO,
            1..=99 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }

    fn from_raw(raw: RawDirectives) -> Result<Self, ConfigError> {
        if raw.debuglevel > 999 {
            return Err(ConfigError::InvalidValue {
                directive: "debuglevel".into(),
                reason: "must be in 0..=999".into(),
            });
        }
        if raw.search_patterns.len() != raw.result_patterns.len() {
            return Err(ConfigError::InvalidValue {
                directive: "search_patterns/result_patterns".into(),
                reason: "must have the same number of entries".into(),
            });
        }
        let pattern_pairs = raw
            .search_patterns
            .iter()
            .cloned()
            .zip(raw.result_patterns.iter().cloned())
            .collect();
        Ok(Self {
            debuglevel: raw.debuglevel,
            encoding: raw.encoding,
            readonly: raw.readonly,
            noencryption: raw.noencryption,
            case_sensitive: !raw.noignore,
            keep_passphrase: raw.keep_passphrase,
            memlock_limit_kib: raw.memlock_limit,
            default_keys: raw.keys,
            default_templates: raw.templates,
            pattern_pairs,
        })
    }

    /// Default configuration as if no resource file was found.
    pub fn defaults() -> Self {
        Self::from_raw(RawDirectives::default()).expect("defaults are always valid")
    }

    /// Locates the resource file by the search order in §6:
    /// `~/.cpmrc` → `/etc/cpm/cpmrc` → `/etc/cpmrc`.
    pub fn resolve_path(home: Option<&Path>) -> Option<PathBuf> {
        if let Some(home) = home {
            let candidate = home.join(".cpmrc");
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        for candidate in ["/etc/cpm/cpmrc", "/etc/cpmrc"] {
            let candidate = PathBuf::from(candidate);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// Loads and validates the resource file at `path`, or defaults if `path`
    /// is `None` (no resource file found anywhere in the search order).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::defaults());
        };

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let raw: RawDirectives = toml::from_str(&text).map_err(|source| {
            let message = source.to_string();
            if message.contains("unknown field") {
                ConfigError::UnknownDirective(message)
            } else {
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        Self::from_raw(raw)
    }

    /// Applies CLI overrides (`--readonly`, `--noencryption`, `-f`, `--key`,
    /// `-e`, `--debuglevel`) on top of a loaded configuration without
    /// mutating the original — the bootstrap crate calls this once, right
    /// after CLI parsing, and threads the result through as immutable state.
    pub fn merged_with_cli(mut self, overrides: CliOverrides) -> Self {
        if overrides.readonly {
            self.readonly = true;
        }
        if overrides.noencryption {
            self.noencryption = true;
        }
        if let Some(level) = overrides.debuglevel {
            self.debuglevel = level;
        }
        if let Some(encoding) = overrides.encoding {
            self.encoding = encoding;
        }
        if let Some(case_sensitive) = overrides.case_sensitive {
            self.case_sensitive = case_sensitive;
        }
        if !overrides.keys.is_empty() {
            self.default_keys = overrides.keys;
        }
        self
    }
}

/// CLI-flag values that, when present, override the corresponding
/// resource-file directive. `None`/empty means "not given on the CLI."
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub readonly: bool,
    pub noencryption: bool,
    pub debuglevel: Option<u16>,
    pub encoding: Option<String>,
    pub case_sensitive: Option<bool>,
    pub keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_floor_values() {
        let config = AppConfig::defaults();
        assert_eq!(config.memlock_limit_kib(), DEFAULT_MEMLOCK_LIMIT_KIB);
        assert_eq!(config.encoding(), DEFAULT_ENCODING);
        assert!(config.case_sensitive());
        assert!(!config.readonly());
    }

    #[test]
    fn resolve_path_returns_none_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(AppConfig::resolve_path(Some(dir.path())), None);
    }

    #[test]
    fn resolve_path_finds_home_cpmrc() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".cpmrc"), "debuglevel = 5\n").unwrap();
        assert_eq!(
            AppConfig::resolve_path(Some(dir.path())),
            Some(dir.path().join(".cpmrc"))
        );
    }

    #[test]
    fn load_parses_known_directives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cpmrc");
        std::fs::write(
            &path,
            "debuglevel = 10\nreadonly = true\nkey = [\"0xDEADBEEF\"]\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.debuglevel(), 10);
        assert!(config.readonly());
        assert_eq!(config.default_keys(), &["0xDEADBEEF".to_string()]);
    }

    #[test]
    fn load_rejects_unknown_directive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cpmrc");
        std::fs::write(&path, "bogus_directive = true\n").unwrap();

        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDirective(_)));
    }

    #[test]
    fn load_rejects_debuglevel_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cpmrc");
        std::fs::write(&path, "debuglevel = 1000\n").unwrap();

        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn cli_overrides_win_over_resource_file() {
        let config = AppConfig::defaults().merged_with_cli(CliOverrides {
            readonly: true,
            debuglevel: Some(42),
            ..Default::default()
        });
        assert!(config.readonly());
        assert_eq!(config.debuglevel(), 42);
    }

    #[test]
    fn defaults_carry_one_pattern_pair() {
        let config = AppConfig::defaults();
        assert_eq!(
            config.pattern_pairs(),
            &[("<Service> <Account>".to_string(), "<Password>".to_string())]
        );
    }

    #[test]
    fn mismatched_pattern_lists_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cpmrc");
        std::fs::write(&path, "search_patterns = [\"a\", \"b\"]\nresult_patterns = [\"x\"]\n").unwrap();
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn tracing_level_follows_debuglevel_bands() {
        assert_eq!(AppConfig::defaults().tracing_level(), tracing::Level::INFO);

        let debug = AppConfig::defaults().merged_with_cli(CliOverrides {
            debuglevel: Some(5),
            ..Default::default()
        });
        assert_eq!(debug.tracing_level(), tracing::Level::DEBUG);

        let trace = AppConfig::defaults().merged_with_cli(CliOverrides {
            debuglevel: Some(500),
            ..Default::default()
        });
        assert_eq!(trace.tracing_level(), tracing::Level::TRACE);
    }
}
