// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit code management
//!
//! Standardized Unix exit codes following BSD `sysexits.h` conventions, plus
//! a [`CpmError`]-aware mapping so the application layer doesn't need to
//! reason about process exit status itself.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cpm_bootstrap::exit_code::ExitCode;
//!
//! fn run_application() -> Result<(), Box<dyn std::error::Error>> {
//!     Ok(())
//! }
//!
//! fn main() {
//!     let result = run_application();
//!     let exit_code = match result {
//!         Ok(_) => ExitCode::Success,
//!         Err(e) => ExitCode::from_error(e.as_ref()),
//!     };
//!     std::process::exit(exit_code.as_i32());
//! }
//! ```

use cpm_domain::CpmError;
use std::fmt;

/// Exit codes following Unix conventions (BSD sysexits.h)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful termination (0)
    #[default]
    Success = 0,

    /// General error (1)
    Error = 1,

    /// Command line usage error (64): bad flags, malformed search pattern,
    /// a path that doesn't resolve in the tree.
    UsageError = 64,

    /// Data format error (65): the XML document or a template is malformed.
    DataError = 65,

    /// Cannot open input (66): the database file doesn't exist or can't be read.
    NoInput = 66,

    /// User does not exist (67)
    NoUser = 67,

    /// Host name unknown (68)
    NoHost = 68,

    /// Service unavailable (69)
    Unavailable = 69,

    /// Internal software error (70)
    Software = 70,

    /// System error (71)
    OsError = 71,

    /// Critical OS file missing (72): an rc file directive points nowhere.
    OsFile = 72,

    /// Cannot create output file (73): the replace step of the store
    /// pipeline couldn't create its temp file.
    CantCreate = 73,

    /// I/O error (74)
    IoError = 74,

    /// Temporary failure, retry (75): the advisory lock on the database
    /// could not be acquired within the retry budget.
    TempFail = 75,

    /// Remote error in protocol (76)
    Protocol = 76,

    /// Permission denied (77): recipient key unresolvable, passphrase
    /// rejected, signature untrusted, or a file-mode/ownership check failed.
    NoPerm = 77,

    /// Configuration error (78): rc file or `MEMLOCK_LIMIT` directive invalid.
    Config = 78,

    /// Interrupted by signal (SIGINT - Ctrl+C) (130)
    Interrupted = 130,

    /// Terminated by signal (SIGTERM) (143)
    Terminated = 143,
}

impl ExitCode {
    /// Convert to i32 for use with std::process::exit
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Map a [`CpmError`] to its exit code directly, without the heuristic
    /// string matching [`Self::from_error`] falls back to for foreign errors.
    pub fn from_cpm_error(error: &CpmError) -> Self {
        match error {
            CpmError::DuplicateLabel { .. } => ExitCode::UsageError,
            CpmError::NodeNotFound(_) => ExitCode::UsageError,
            CpmError::PathNotFound(_) => ExitCode::UsageError,
            CpmError::AtRoot => ExitCode::UsageError,
            CpmError::Pattern(_) => ExitCode::UsageError,
            CpmError::Regex(_) => ExitCode::UsageError,
            CpmError::Crypto(_) => ExitCode::NoPerm,
            CpmError::Compression(_) => ExitCode::DataError,
            CpmError::Xml(_) => ExitCode::DataError,
            CpmError::Policy(_) => ExitCode::Config,
            CpmError::Io(_) => ExitCode::IoError,
        }
    }

    /// Create an `ExitCode` from an arbitrary error by downcasting to
    /// [`CpmError`] first, falling back to message-pattern heuristics for
    /// errors from other crates (clap, config, the platform layer).
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        if let Some(cpm_error) = error.downcast_ref::<CpmError>() {
            return Self::from_cpm_error(cpm_error);
        }

        let error_string = error.to_string().to_lowercase();

        if error_string.contains("permission") || error_string.contains("access denied") {
            ExitCode::NoPerm
        } else if error_string.contains("not found") || error_string.contains("no such") {
            ExitCode::NoInput
        } else if error_string.contains("invalid") || error_string.contains("argument") {
            ExitCode::UsageError
        } else if error_string.contains("parse") || error_string.contains("format") {
            ExitCode::DataError
        } else if error_string.contains("lock") {
            ExitCode::TempFail
        } else if error_string.contains("io") || error_string.contains("read") || error_string.contains("write") {
            ExitCode::IoError
        } else if error_string.contains("config") {
            ExitCode::Config
        } else if error_string.contains("unavailable") || error_string.contains("not available") {
            ExitCode::Unavailable
        } else {
            ExitCode::Error
        }
    }

    /// Get human-readable description of exit code
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::Error => "General error",
            ExitCode::UsageError => "Command line usage error",
            ExitCode::DataError => "Data format error",
            ExitCode::NoInput => "Cannot open input",
            ExitCode::NoUser => "User does not exist",
            ExitCode::NoHost => "Host name unknown",
            ExitCode::Unavailable => "Service unavailable",
            ExitCode::Software => "Internal software error",
            ExitCode::OsError => "System error",
            ExitCode::OsFile => "Critical OS file missing",
            ExitCode::CantCreate => "Cannot create output file",
            ExitCode::IoError => "I/O error",
            ExitCode::TempFail => "Temporary failure, retry",
            ExitCode::Protocol => "Remote error in protocol",
            ExitCode::NoPerm => "Permission denied",
            ExitCode::Config => "Configuration error",
            ExitCode::Interrupted => "Interrupted by signal (SIGINT)",
            ExitCode::Terminated => "Terminated by signal (SIGTERM)",
        }
    }

    /// Check if this is a success exit code
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Check if this is an error exit code
    pub fn is_error(self) -> bool {
        !self.is_success()
    }

    /// Check if this represents a signal interruption
    pub fn is_signal(self) -> bool {
        matches!(self, ExitCode::Interrupted | ExitCode::Terminated)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}
