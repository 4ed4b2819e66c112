// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # cpm binary
//!
//! Wires `cpm_bootstrap` (CLI parsing, resource-file loading, the C11
//! hardening sequence) into the `cpm` session controller, following the
//! state machine of §4.12: `Init → Hardened → Loaded → (CLI-Search |
//! TUI-Edit)+ → Save? → Teardown`.

use std::path::PathBuf;

use cpm_bootstrap::{AppConfig, ExitCode, ValidatedCommand};
use cpm_domain::services::crypto::PassphraseCallback;
use zeroize::Zeroizing;

use cpm::application::use_cases::{self, UseCaseError};
use cpm::infrastructure::compression_gzip::GzipCodec;
use cpm::infrastructure::crypto_sequoia::SequoiaCryptoEngine;
use cpm::application::session::Session;
use cpm::presentation::{cli_output, tui};

/// Prompts on the controlling terminal with echo disabled, matching the
/// original's "prompt, retry on bad passphrase" loop (§4.2).
struct TerminalPassphrase;

impl PassphraseCallback for TerminalPassphrase {
    fn prompt(&mut self, retry: u32, realm: &str) -> Zeroizing<String> {
        let label = if retry == 0 {
            format!("passphrase for {realm}: ")
        } else {
            format!("passphrase for {realm} (retry {retry}): ")
        };
        Zeroizing::new(rpassword::prompt_password(label).unwrap_or_default())
    }
}

fn default_keyring_path() -> PathBuf {
    if let Ok(gnupghome) = std::env::var("GNUPGHOME") {
        return PathBuf::from(gnupghome).join("pubring.gpg");
    }
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".gnupg").join("pubring.gpg"))
        .unwrap_or_else(|_| PathBuf::from("pubring.gpg"))
}

fn main() {
    let exit = run();
    std::process::exit(exit.as_i32());
}

fn run() -> ExitCode {
    let validated = match cpm_bootstrap::bootstrap_cli() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("cpm: {e}");
            return ExitCode::UsageError;
        }
    };

    let home = std::env::var("HOME").ok().map(PathBuf::from);
    let config_path = validated
        .config_path
        .clone()
        .or_else(|| AppConfig::resolve_path(home.as_deref()));
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => c.merged_with_cli(validated.overrides.clone()),
        Err(e) => {
            eprintln!("cpm: {e}");
            return ExitCode::Config;
        }
    };

    cpm_bootstrap::logger::init_tracing(config.tracing_level());

    if matches!(validated.command, ValidatedCommand::ConfigTest) {
        cli_output::print_configtest_report(&config);
        return ExitCode::Success;
    }
    if matches!(validated.command, ValidatedCommand::PrintEnvironment) {
        cli_output::print_environment();
        return ExitCode::Success;
    }

    #[cfg(unix)]
    let is_elevated = unsafe { libc::geteuid() == 0 };
    #[cfg(not(unix))]
    let is_elevated = false;
    let flags = match cpm_bootstrap::harden(&config, is_elevated) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("cpm: hardening failed: {e}");
            return ExitCode::Error;
        }
    };

    if matches!(validated.command, ValidatedCommand::SecurityReport) {
        cpm_bootstrap::check_security(&flags, false);
        return ExitCode::Success;
    }

    let database_path = match validated.database_path.clone().or_else(default_database_path) {
        Some(p) => p,
        None => {
            eprintln!("cpm: no database path given and no default could be determined");
            return ExitCode::UsageError;
        }
    };

    let keyring_path = default_keyring_path();
    let crypto = match SequoiaCryptoEngine::load(&keyring_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("cpm: failed to load keyring {keyring_path:?}: {e}");
            return ExitCode::NoInput;
        }
    };
    let compression = GzipCodec::new();
    let mut passphrase = TerminalPassphrase;

    let (mut session, report) = match Session::open(
        &database_path,
        &crypto,
        &compression,
        !config.noencryption(),
        config.case_sensitive(),
        &whoami_realm(),
        config.readonly(),
        false,
        &mut passphrase,
    ) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("cpm: {e}");
            return ExitCode::DataError;
        }
    };

    for warning in &report.warnings {
        eprintln!("cpm: {warning}");
    }
    if report.just_upgraded {
        eprintln!("cpm: database schema upgraded to the current version");
    }
    if report.forced_read_only {
        eprintln!("cpm: some recipients have no local public key; session is read-only");
    }

    let outcome = match &validated.command {
        ValidatedCommand::CliSearch { query, regex, case_sensitive } => {
            run_cli_search(&session, &config, query, *regex, *case_sensitive)
        }
        ValidatedCommand::TuiEdit => run_tui_edit(&mut session, &mut passphrase),
        ValidatedCommand::SecurityReport | ValidatedCommand::ConfigTest | ValidatedCommand::PrintEnvironment => {
            unreachable!("handled above before a session was ever opened")
        }
    };

    session.teardown();
    outcome
}

fn run_cli_search(
    session: &Session<'_>,
    config: &AppConfig,
    query: &str,
    regex: bool,
    case_sensitive: Option<bool>,
) -> ExitCode {
    match use_cases::run_cli_search(session, config.pattern_pairs(), config.default_templates(), query, regex, case_sensitive) {
        Ok(outcome) => {
            cli_output::print_search_results(&outcome);
            ExitCode::Success
        }
        Err(UseCaseError::PatternCompile { index, source }) => {
            eprintln!("cpm: pattern pair {index} failed to compile: {source}");
            ExitCode::Error
        }
        Err(e) => {
            eprintln!("cpm: {e}");
            ExitCode::Error
        }
    }
}

fn run_tui_edit(session: &mut Session<'_>, passphrase: &mut dyn PassphraseCallback) -> ExitCode {
    let mut editor = tui::Editor::new(session);
    match editor.run() {
        Ok(should_save) => {
            if should_save {
                if let Err(e) = session.save(passphrase) {
                    eprintln!("cpm: save failed: {e}");
                    return ExitCode::DataError;
                }
            }
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("cpm: {e}");
            ExitCode::Error
        }
    }
}

fn default_database_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".cpm"))
}

fn whoami_realm() -> String {
    std::env::var("USER").or_else(|_| std::env::var("LOGNAME")).unwrap_or_default()
}
