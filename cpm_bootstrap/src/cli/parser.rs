// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CLI structure
//!
//! The raw `clap`-derived flag surface from §6. Positional arguments are
//! search tokens: their presence selects CLI search mode, their absence
//! selects TUI edit mode.

use clap::Parser;
use std::path::PathBuf;

/// Search match mode, selected by `-r/--regex` vs `--regular` (default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchModeFlag {
    #[default]
    Literal,
    Regex,
}

/// Case sensitivity, selected by `-i/--ignore` vs `--noignore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseModeFlag {
    Sensitive,
    Insensitive,
}

#[derive(Debug, Parser)]
#[command(name = "cpm", version, about = "Console password manager")]
pub struct Cli {
    /// Override resource file (`~/.cpmrc` → `/etc/cpm/cpmrc` → `/etc/cpmrc`)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Parse the resource file, report the resolved configuration, and exit
    #[arg(long = "configtest")]
    pub configtest: bool,

    /// Trace verbosity, 0–999
    #[arg(long = "debuglevel", value_name = "LEVEL")]
    pub debuglevel: Option<String>,

    /// Terminal encoding (default ISO-8859-1)
    #[arg(short = 'e', long = "encoding", value_name = "NAME")]
    pub encoding: Option<String>,

    /// Print the scrubbed environment and exit
    #[arg(long = "environment")]
    pub environment: bool,

    /// Override database path
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Case-insensitive CLI search
    #[arg(short = 'i', long = "ignore", conflicts_with = "noignore")]
    pub ignore: bool,

    /// Case-sensitive CLI search
    #[arg(long = "noignore", conflicts_with = "ignore")]
    pub noignore: bool,

    /// Add a recipient key (repeatable); replaces resource-file defaults
    #[arg(long = "key", value_name = "ID")]
    pub key: Vec<String>,

    /// Disable encryption (development only)
    #[arg(long = "noencryption")]
    pub noencryption: bool,

    /// Open read-only (also implied when argv[0]'s basename is `cpmv`)
    #[arg(long = "readonly")]
    pub readonly: bool,

    /// Regex search mode
    #[arg(short = 'r', long = "regex", conflicts_with = "regular")]
    pub regex: bool,

    /// Literal search mode (default)
    #[arg(long = "regular", conflicts_with = "regex")]
    pub regular: bool,

    /// Print the security hardening report and exit
    #[arg(short = 's', long = "security")]
    pub security: bool,

    /// Positional search tokens; joined with spaces to form the query.
    /// Presence selects CLI search mode; absence selects TUI edit mode.
    #[arg(value_name = "TOKEN")]
    pub query: Vec<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    pub fn search_mode(&self) -> SearchModeFlag {
        if self.regex {
            SearchModeFlag::Regex
        } else {
            SearchModeFlag::Literal
        }
    }

    pub fn case_mode(&self) -> Option<CaseModeFlag> {
        if self.ignore {
            Some(CaseModeFlag::Insensitive)
        } else if self.noignore {
            Some(CaseModeFlag::Sensitive)
        } else {
            None
        }
    }

    /// Joins the positional query tokens into the single search string C8 matches against.
    pub fn query_string(&self) -> Option<String> {
        if self.query.is_empty() {
            None
        } else {
            Some(self.query.join(" "))
        }
    }
}

/// `true` when the program was invoked as `cpmv` (or any path ending in
/// `cpmv`), per §6's `--readonly` note and the original's argv[0] trick.
pub fn invoked_as_cpmv() -> bool {
    std::env::args()
        .next()
        .and_then(|arg0| {
            PathBuf::from(arg0)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .is_some_and(|basename| basename == "cpmv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn query_string_joins_positional_tokens() {
        let cli = Cli::parse_from(["cpm", "github", "alice"]);
        assert_eq!(cli.query_string(), Some("github alice".to_string()));
    }

    #[test]
    fn query_string_none_selects_tui_mode() {
        let cli = Cli::parse_from(["cpm"]);
        assert_eq!(cli.query_string(), None);
    }

    #[test]
    fn regex_and_regular_conflict() {
        let result = Cli::try_parse_from(["cpm", "--regex", "--regular"]);
        assert!(result.is_err());
    }

    #[test]
    fn ignore_and_noignore_conflict() {
        let result = Cli::try_parse_from(["cpm", "--ignore", "--noignore"]);
        assert!(result.is_err());
    }

    #[test]
    fn search_mode_defaults_to_literal() {
        let cli = Cli::parse_from(["cpm"]);
        assert_eq!(cli.search_mode(), SearchModeFlag::Literal);
    }
}
