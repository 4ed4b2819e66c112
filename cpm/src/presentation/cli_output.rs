// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Stdout rendering for the non-interactive command forms: `CliSearch`,
//! `--configtest`, `--environment`. `-s/--security` prints through
//! `cpm_bootstrap::security::check_security` directly since that already
//! owns its own report format.

use cpm_bootstrap::config::AppConfig;

use crate::application::use_cases::SearchOutcome;

/// §4.8/§4.12: "prints each on its own line" followed by the banner.
pub fn print_search_results(outcome: &SearchOutcome) {
    for line in &outcome.matches {
        println!("{line}");
    }
    println!("{}", outcome.banner());
}

/// `--configtest`: the resolved configuration, one directive per line.
pub fn print_configtest_report(config: &AppConfig) {
    println!("debuglevel = {}", config.debuglevel());
    println!("encoding = {:?}", config.encoding());
    println!("readonly = {}", config.readonly());
    println!("noencryption = {}", config.noencryption());
    println!("case_sensitive = {}", config.case_sensitive());
    println!("keep_passphrase = {}", config.keep_passphrase());
    println!("memlock_limit = {} KiB", config.memlock_limit_kib());
    println!("key = {:?}", config.default_keys());
    println!("templates = {:?}", config.default_templates());
    for (search, result) in config.pattern_pairs() {
        println!("pattern: {search:?} -> {result:?}");
    }
}

/// `--environment`: the scrubbed whitelist that actually survived §4.11
/// step 8, not the pre-scrub process environment.
pub fn print_environment() {
    for (key, value) in std::env::vars() {
        println!("{key}={value}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::SearchOutcome;

    #[test]
    fn banner_matches_plural_rules() {
        let one = SearchOutcome { matches: vec!["x".to_string()] };
        assert_eq!(one.banner(), "1 match found.");
        let many = SearchOutcome { matches: vec!["x".to_string(), "y".to_string()] };
        assert_eq!(many.banner(), "2 matches found.");
        let none = SearchOutcome { matches: vec![] };
        assert_eq!(none.banner(), "0 matches found.");
    }
}
