// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Command-line interface
//!
//! ```text
//! parser::Cli::parse_args()   -- clap derive, shape only
//!            |
//!            v
//! validate_cli()              -- path canonicalisation, range checks
//!            |
//!            v
//! ValidatedCli                -- safe to hand to the session controller
//! ```

pub mod parser;
pub mod validator;

pub use parser::{CaseModeFlag, Cli, SearchModeFlag};
pub use validator::{ParseError, SecureArgParser};

use crate::config::CliOverrides;
use std::path::PathBuf;

/// The mode the session controller (C12) enters after CLI parsing.
#[derive(Debug, Clone)]
pub enum ValidatedCommand {
    /// `-s/--security`: print the hardening report and exit.
    SecurityReport,
    /// `--configtest`: report the resolved configuration and exit.
    ConfigTest,
    /// `--environment`: print the scrubbed environment and exit.
    PrintEnvironment,
    /// Positional search tokens present: run C8 once and exit.
    CliSearch {
        query: String,
        regex: bool,
        case_sensitive: Option<bool>,
    },
    /// No search tokens: enter the TUI edit loop.
    TuiEdit,
}

/// Fully validated CLI state, safe to hand to the rest of the process.
#[derive(Debug, Clone)]
pub struct ValidatedCli {
    pub command: ValidatedCommand,
    pub config_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub overrides: CliOverrides,
}

/// Parses `std::env::args()` with clap and validates the result.
pub fn parse_and_validate() -> Result<ValidatedCli, ParseError> {
    validate_cli(Cli::parse_args())
}

fn validate_cli(cli: Cli) -> Result<ValidatedCli, ParseError> {
    let config_path = match &cli.config {
        Some(path) => Some(SecureArgParser::validate_existing_path(&path.to_string_lossy())?),
        None => None,
    };

    let database_path = match &cli.file {
        Some(path) => Some(SecureArgParser::validate_new_path(&path.to_string_lossy())?),
        None => None,
    };

    for key in &cli.key {
        SecureArgParser::validate_key_id(key)?;
    }

    let debuglevel = match &cli.debuglevel {
        Some(value) => Some(SecureArgParser::validate_debuglevel(value)?),
        None => None,
    };

    if let Some(query) = cli.query_string() {
        SecureArgParser::validate_argument(&query)?;
    }

    let readonly = cli.readonly || parser::invoked_as_cpmv();

    let command = if cli.security {
        ValidatedCommand::SecurityReport
    } else if cli.configtest {
        ValidatedCommand::ConfigTest
    } else if cli.environment {
        ValidatedCommand::PrintEnvironment
    } else if let Some(query) = cli.query_string() {
        ValidatedCommand::CliSearch {
            query,
            regex: matches!(cli.search_mode(), SearchModeFlag::Regex),
            case_sensitive: cli.case_mode().map(|m| matches!(m, CaseModeFlag::Sensitive)),
        }
    } else {
        ValidatedCommand::TuiEdit
    };

    let case_sensitive = cli.case_mode().map(|m| matches!(m, CaseModeFlag::Sensitive));

    Ok(ValidatedCli {
        command,
        config_path,
        database_path,
        overrides: CliOverrides {
            readonly,
            noencryption: cli.noencryption,
            debuglevel,
            encoding: cli.encoding.clone(),
            case_sensitive,
            keys: cli.key.clone(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_tokens_select_cli_search_mode() {
        let cli = Cli::parse_from(["cpm", "github", "alice"]);
        let validated = validate_cli(cli).unwrap();
        assert!(matches!(validated.command, ValidatedCommand::CliSearch { .. }));
    }

    #[test]
    fn no_tokens_select_tui_mode() {
        let cli = Cli::parse_from(["cpm"]);
        let validated = validate_cli(cli).unwrap();
        assert!(matches!(validated.command, ValidatedCommand::TuiEdit));
    }

    #[test]
    fn security_flag_wins_over_query() {
        let cli = Cli::parse_from(["cpm", "--security", "ignored", "query"]);
        let validated = validate_cli(cli).unwrap();
        assert!(matches!(validated.command, ValidatedCommand::SecurityReport));
    }

    #[test]
    fn rejects_dangerous_key_id() {
        let cli = Cli::parse_from(["cpm", "--key", "$(whoami)"]);
        assert!(validate_cli(cli).is_err());
    }

    #[test]
    fn rejects_out_of_range_debuglevel() {
        let cli = Cli::parse_from(["cpm", "--debuglevel", "5000"]);
        assert!(validate_cli(cli).is_err());
    }
}
