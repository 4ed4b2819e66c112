// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Secure command-line argument validation
//!
//! Post-parse validation applied after clap hands back a [`super::parser::Cli`]:
//! length limits, dangerous-shell-metacharacter rejection, path canonicalisation,
//! and numeric range checks. clap only knows a flag's *shape*; this module
//! enforces its *meaning*.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maximum single argument length.
const MAX_ARG_LENGTH: usize = 1000;

/// Maximum path length after canonicalisation.
const MAX_PATH_LENGTH: usize = 4096;

/// Dangerous patterns that indicate shell injection or path traversal
/// smuggled in through a flag value.
const DANGEROUS_PATTERNS: &[&str] = &[
    "..", "$", "`", ";", "&", "|", ">", "<", "\n", "\r", "\0",
];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("argument too long (max {MAX_ARG_LENGTH} characters): {0}")]
    ArgumentTooLong(String),

    #[error("dangerous pattern detected in argument: {pattern:?} in {arg:?}")]
    DangerousPattern { pattern: String, arg: String },

    #[error("path exceeds maximum length (max {MAX_PATH_LENGTH})")]
    PathTooLong,

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid argument value for {arg}: {reason}")]
    InvalidValue { arg: String, reason: String },
}

/// Stateless validation helpers, mirroring the shape of a secure arg parser:
/// one function per concern, composable by the caller.
pub struct SecureArgParser;

impl SecureArgParser {
    /// Rejects arguments that are too long or contain shell metacharacters.
    pub fn validate_argument(arg: &str) -> Result<(), ParseError> {
        if arg.len() > MAX_ARG_LENGTH {
            return Err(ParseError::ArgumentTooLong(
                arg.chars().take(50).collect::<String>() + "...",
            ));
        }

        for pattern in DANGEROUS_PATTERNS {
            if arg.contains(pattern) {
                return Err(ParseError::DangerousPattern {
                    pattern: pattern.to_string(),
                    arg: arg.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Validates a path that must already exist (`-f/--file`, `-c/--config`
    /// when overriding an existing resource file) and returns its canonical
    /// form.
    pub fn validate_existing_path(path: &str) -> Result<PathBuf, ParseError> {
        Self::validate_argument(path).map_err(|e| match e {
            ParseError::ArgumentTooLong(_) => ParseError::InvalidPath(format!("path too long: {path}")),
            ParseError::DangerousPattern { pattern, .. } => {
                ParseError::InvalidPath(format!("path contains {pattern:?}: {path}"))
            }
            other => other,
        })?;

        let canonical = Path::new(path)
            .canonicalize()
            .map_err(|e| ParseError::InvalidPath(format!("{path}: {e}")))?;

        if canonical.to_string_lossy().len() > MAX_PATH_LENGTH {
            return Err(ParseError::PathTooLong);
        }

        Ok(canonical)
    }

    /// Validates a path that may not exist yet (the database file on first
    /// run): only the shape is checked, not existence.
    pub fn validate_new_path(path: &str) -> Result<PathBuf, ParseError> {
        Self::validate_argument(path)?;
        if path.len() > MAX_PATH_LENGTH {
            return Err(ParseError::PathTooLong);
        }
        Ok(PathBuf::from(path))
    }

    /// Validates a recipient key identifier given to `--key`: non-empty,
    /// no shell metacharacters. Canonicalisation into the
    /// `"KEYID NAME (COMMENT) <EMAIL>"` form happens later, against the
    /// `CryptoEngine`, not here.
    pub fn validate_key_id(key: &str) -> Result<(), ParseError> {
        if key.trim().is_empty() {
            return Err(ParseError::InvalidValue {
                arg: "key".into(),
                reason: "must not be empty".into(),
            });
        }
        Self::validate_argument(key)
    }

    /// Validates `--debuglevel` against the documented 0..=999 range.
    pub fn validate_debuglevel(value: &str) -> Result<u16, ParseError> {
        Self::validate_argument(value)?;
        let level: u16 = value.parse().map_err(|_| ParseError::InvalidValue {
            arg: "debuglevel".into(),
            reason: format!("not a valid integer: {value}"),
        })?;
        if level > 999 {
            return Err(ParseError::InvalidValue {
                arg: "debuglevel".into(),
                reason: "must be in 0..=999".into(),
            });
        }
        Ok(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_safe_arguments() {
        assert!(SecureArgParser::validate_argument("github alice").is_ok());
        assert!(SecureArgParser::validate_argument("0xDEADBEEF").is_ok());
    }

    #[test]
    fn rejects_too_long_arguments() {
        let long_arg = "a".repeat(MAX_ARG_LENGTH + 1);
        assert!(matches!(
            SecureArgParser::validate_argument(&long_arg),
            Err(ParseError::ArgumentTooLong(_))
        ));
    }

    #[test]
    fn detects_dangerous_patterns() {
        for arg in ["../etc/passwd", "$(whoami)", "`ls`", "file;rm -rf /", "file|pipe"] {
            assert!(
                matches!(
                    SecureArgParser::validate_argument(arg),
                    Err(ParseError::DangerousPattern { .. })
                ),
                "failed to detect dangerous pattern in: {arg}"
            );
        }
    }

    #[test]
    fn validate_key_id_rejects_empty() {
        assert!(matches!(
            SecureArgParser::validate_key_id("   "),
            Err(ParseError::InvalidValue { .. })
        ));
    }

    #[test]
    fn validate_debuglevel_enforces_range() {
        assert_eq!(SecureArgParser::validate_debuglevel("42").unwrap(), 42);
        assert!(SecureArgParser::validate_debuglevel("1000").is_err());
        assert!(SecureArgParser::validate_debuglevel("not-a-number").is_err());
    }

    #[test]
    fn validate_new_path_does_not_require_existence() {
        let result = SecureArgParser::validate_new_path("/tmp/does-not-exist-yet.cpm");
        assert!(result.is_ok());
    }
}
