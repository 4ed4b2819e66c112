// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Security core (process hardening)
//!
//! Run once, before anything else of interest: before the resource file is
//! fully trusted, before the database is touched, before the passphrase
//! prompt. Each step is best-effort on platforms that don't support it
//! (notably: all of this is Linux-specific; macOS and Windows run a reduced
//! sequence and a correspondingly lower hardening score) but a handful of
//! steps — privilege verification, `RLIMIT_CORE`, environment validation —
//! abort the process outright on failure, since continuing would run with
//! weaker guarantees than promised.

use crate::config::AppConfig;
use regex::Regex;
use std::collections::HashMap;
use std::ffi::CString;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("ptrace self-pin failed: {0}")]
    PtraceSelfPin(String),

    #[error("failed to drop group privileges: {0}")]
    GroupDrop(String),

    #[error("failed to drop user privileges: {0}")]
    UserDrop(String),

    #[error("regained root after dropping privileges; aborting")]
    PrivilegeRegained,

    #[error("failed to zero RLIMIT_CORE: {0}")]
    CoreLimit(String),

    #[error("RLIMIT_CORE verification mismatch after setting it to zero")]
    CoreLimitMismatch,

    #[error("file descriptor sanity check failed: fd {0} returned by dup(0), expected >= 3")]
    FileDescriptorSanity(i32),

    #[error("illegal environment variable found ({name}={value}).")]
    IllegalEnvironmentVariable { name: String, value: String },
}

/// Colour-coded status for one hardening flag in the `-s/--security` report,
/// standing in for the original's `STAT_GREEN`/`STAT_YELLOW`/`STAT_RED` ANSI
/// constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fully enabled.
    Green,
    /// Enabled in a degraded or best-effort form.
    Yellow,
    /// Not enabled on this platform or this run.
    Red,
}

impl Severity {
    pub fn ansi_code(self) -> &'static str {
        match self {
            Severity::Green => "\x1b[32m",
            Severity::Yellow => "\x1b[33m",
            Severity::Red => "\x1b[31m",
        }
    }
}

/// The seven hardening flags that make up the hardening score (glossary:
/// "privileges dropped, core-off, mlock, mlock-max, ptrace-pin,
/// env-validated, cracklib-dict-present").
#[derive(Debug, Clone, Copy, Default)]
pub struct HardeningFlags {
    pub privileges_dropped: bool,
    pub core_disabled: bool,
    pub mlock_enabled: bool,
    pub mlock_max: bool,
    pub ptrace_safe: bool,
    pub env_validated: bool,
    pub cracklib_dict_present: bool,
}

impl HardeningFlags {
    pub fn score(&self) -> u32 {
        [
            self.privileges_dropped,
            self.core_disabled,
            self.mlock_enabled,
            self.mlock_max,
            self.ptrace_safe,
            self.env_validated,
            self.cracklib_dict_present,
        ]
        .iter()
        .filter(|flag| **flag)
        .count() as u32
    }

    /// Maximum achievable score on this platform. Non-Linux targets can
    /// never set `ptrace_safe` (§9 design note: "omit and simply drop the
    /// `ptrace_safe` flag from the security score").
    pub fn platform_max(&self) -> u32 {
        if cfg!(target_os = "linux") {
            7
        } else {
            6
        }
    }

    /// One `(flag name, severity)` pair per flag, in report order.
    pub fn report(&self) -> Vec<(&'static str, Severity)> {
        let sev = |enabled: bool| if enabled { Severity::Green } else { Severity::Red };
        vec![
            ("privileges dropped", sev(self.privileges_dropped)),
            ("core dumps disabled", sev(self.core_disabled)),
            ("memory locked", sev(self.mlock_enabled)),
            (
                "memory lock at maximum",
                if self.mlock_enabled && !self.mlock_max {
                    Severity::Yellow
                } else {
                    sev(self.mlock_max)
                },
            ),
            ("ptrace self-pin", sev(self.ptrace_safe)),
            ("environment validated", sev(self.env_validated)),
            ("password-strength dictionary present", sev(self.cracklib_dict_present)),
        ]
    }
}

/// Runs the full hardening sequence (§4.11, steps 1–8) and returns which
/// flags ended up enabled. Steps that the spec treats as abort-on-failure
/// return `Err` instead of a degraded flag.
pub fn harden(config: &AppConfig, is_elevated: bool) -> Result<HardeningFlags, SecurityError> {
    let mut flags = HardeningFlags {
        cracklib_dict_present: cracklib_dict_present(),
        ..HardeningFlags::default()
    };

    flags.ptrace_safe = ptrace_self_pin().unwrap_or(false);

    drop_group_privileges()?;

    let (mlock_enabled, mlock_max) = configure_memory_lock(config.memlock_limit_kib(), is_elevated);
    flags.mlock_enabled = mlock_enabled;
    flags.mlock_max = mlock_max;

    drop_user_privileges()?;
    flags.privileges_dropped = true;

    zero_core_dump_limit()?;
    flags.core_disabled = true;

    set_umask_floor();
    check_file_descriptor_sanity()?;
    scrub_environment()?;
    flags.env_validated = true;

    Ok(flags)
}

/// Well-known locations for a cracklib or system word-list dictionary.
const CRACKLIB_DICT_PATHS: &[&str] = &[
    "/usr/share/cracklib/pw_dict.pwd",
    "/usr/share/cracklib/pw_dict.pwd.gz",
    "/var/cache/cracklib/cracklib_dict.pwd",
    "/usr/share/dict/cracklib-small",
    "/usr/share/dict/words",
];

/// Probes well-known cracklib/system dictionary locations, standing in for
/// the original's `cracklib-has-password` dictionary check.
fn cracklib_dict_present() -> bool {
    any_path_exists(CRACKLIB_DICT_PATHS)
}

fn any_path_exists(candidates: &[&str]) -> bool {
    candidates.iter().any(|p| std::path::Path::new(p).exists())
}

/// `checkSecurity(silent)`: computes the report and, unless `silent`, prints
/// it to stderr.
pub fn check_security(flags: &HardeningFlags, silent: bool) -> u32 {
    let score = flags.score();
    if !silent {
        for (name, severity) in flags.report() {
            eprintln!("{}{}\x1b[0m", severity.ansi_code(), name);
        }
        eprintln!("hardening score: {score}/{}", flags.platform_max());
    }
    score
}

/// Step 1: fork a child that attaches via `ptrace` to this process and
/// blocks `PTRACE_ATTACH` from anyone else, defeating debugger attachment.
/// Linux-only; returns `Ok(false)` (not an error) everywhere else per the
/// §9 design note.
#[cfg(target_os = "linux")]
fn ptrace_self_pin() -> Result<bool, SecurityError> {
    use std::process;

    let parent_pid = process::id() as libc::pid_t;

    // SAFETY: fork() is inherently unsafe: the child must only call
    // async-signal-safe functions until it execs or exits, which this does.
    let pid = unsafe { libc::fork() };
    match pid.cmp(&0) {
        std::cmp::Ordering::Less => Err(SecurityError::PtraceSelfPin("fork failed".into())),
        std::cmp::Ordering::Equal => {
            // Child: pin the parent and never return to the caller.
            unsafe {
                libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0);
                if libc::ptrace(libc::PTRACE_ATTACH, parent_pid, 0, 0) == 0 {
                    let mut status = 0;
                    loop {
                        if libc::waitpid(parent_pid, &mut status, 0) < 0 {
                            break;
                        }
                        if libc::ptrace(libc::PTRACE_SYSCALL, parent_pid, 0, 0) != 0 {
                            break;
                        }
                    }
                }
                libc::_exit(0);
            }
        }
        std::cmp::Ordering::Greater => Ok(true),
    }
}

#[cfg(not(target_os = "linux"))]
fn ptrace_self_pin() -> Result<bool, SecurityError> {
    Ok(false)
}

/// Step 2: drop group privileges twice, defeating a saved-set-gid restore.
#[cfg(unix)]
fn drop_group_privileges() -> Result<(), SecurityError> {
    unsafe {
        let gid = libc::getgid();
        if libc::setgid(gid) != 0 {
            return Err(SecurityError::GroupDrop("setgid failed".into()));
        }
        if libc::setgid(gid) != 0 {
            return Err(SecurityError::GroupDrop("second setgid failed".into()));
        }
        #[cfg(target_os = "linux")]
        {
            libc::setfsgid(gid as libc::uid_t);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn drop_group_privileges() -> Result<(), SecurityError> {
    Ok(())
}

/// Step 3: consult the memory-lock limit and `mlockall` if the budget
/// allows it. Returns `(mlock_enabled, mlock_at_maximum)`.
#[cfg(unix)]
fn configure_memory_lock(memlock_limit_kib: u64, is_elevated: bool) -> (bool, bool) {
    let floor_bytes = memlock_limit_kib.saturating_mul(1024);

    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    if unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, &mut limit) } != 0 {
        return (false, false);
    }

    let unlimited = limit.rlim_max == libc::RLIM_INFINITY;
    let above_floor = !unlimited && (limit.rlim_max as u64) > floor_bytes;

    if !(unlimited || is_elevated || above_floor) {
        return (false, false);
    }

    let raised = libc::rlimit {
        rlim_cur: limit.rlim_max,
        rlim_max: limit.rlim_max,
    };
    let raised_ok = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &raised) } == 0;

    let locked = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) } == 0;

    (locked, locked && raised_ok)
}

#[cfg(not(unix))]
fn configure_memory_lock(_memlock_limit_kib: u64, _is_elevated: bool) -> (bool, bool) {
    (false, false)
}

/// Step 4: drop user privileges twice, then verify that regaining root
/// fails — if it succeeds, the process aborts rather than continuing with
/// a false sense of having dropped privileges.
#[cfg(unix)]
fn drop_user_privileges() -> Result<(), SecurityError> {
    unsafe {
        let uid = libc::getuid();
        if libc::setuid(uid) != 0 {
            return Err(SecurityError::UserDrop("setuid failed".into()));
        }
        if libc::setuid(uid) != 0 {
            return Err(SecurityError::UserDrop("second setuid failed".into()));
        }
        #[cfg(target_os = "linux")]
        {
            libc::setfsuid(uid);
        }
        if uid != 0 && libc::setuid(0) == 0 {
            return Err(SecurityError::PrivilegeRegained);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn drop_user_privileges() -> Result<(), SecurityError> {
    Ok(())
}

/// Step 5: zero `RLIMIT_CORE` and verify it stuck.
#[cfg(unix)]
fn zero_core_dump_limit() -> Result<(), SecurityError> {
    let zero = libc::rlimit { rlim_cur: 0, rlim_max: 0 };
    if unsafe { libc::setrlimit(libc::RLIMIT_CORE, &zero) } != 0 {
        return Err(SecurityError::CoreLimit("setrlimit failed".into()));
    }

    let mut check = libc::rlimit {
        rlim_cur: u64::MAX as libc::rlim_t,
        rlim_max: u64::MAX as libc::rlim_t,
    };
    if unsafe { libc::getrlimit(libc::RLIMIT_CORE, &mut check) } != 0 || check.rlim_cur != 0 || check.rlim_max != 0 {
        return Err(SecurityError::CoreLimitMismatch);
    }
    Ok(())
}

#[cfg(not(unix))]
fn zero_core_dump_limit() -> Result<(), SecurityError> {
    Ok(())
}

/// Step 6: `umask(0022)` as a floor so created files aren't group/world
/// writable by default.
#[cfg(unix)]
fn set_umask_floor() {
    unsafe {
        libc::umask(0o022);
    }
}

#[cfg(not(unix))]
fn set_umask_floor() {}

/// Step 7: `dup(0)` must return a fd >= 3, confirming stdin/stdout/stderr
/// are all already open; otherwise a later `open()` could silently reuse
/// one of those descriptors.
#[cfg(unix)]
fn check_file_descriptor_sanity() -> Result<(), SecurityError> {
    let fd = unsafe { libc::dup(0) };
    if fd >= 0 {
        unsafe {
            libc::close(fd);
        }
    }
    if fd < 3 {
        return Err(SecurityError::FileDescriptorSanity(fd));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_file_descriptor_sanity() -> Result<(), SecurityError> {
    Ok(())
}

/// One of the six value-shape classes an environment variable can be
/// validated against before it's allowed to survive the scrub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvClass {
    General,
    Alphanumeric,
    Numeric,
    Filename,
    Path,
    NoCheck,
}

/// The whitelist of variables preserved across the scrub, each tagged with
/// the validation class its value must satisfy (§4.11(8)).
const ENV_WHITELIST: &[(&str, EnvClass)] = &[
    ("LANG", EnvClass::General),
    ("LC_ALL", EnvClass::General),
    ("LC_MESSAGES", EnvClass::General),
    ("HOME", EnvClass::Path),
    ("COLUMNS", EnvClass::Numeric),
    ("LINES", EnvClass::Numeric),
    ("NCURSES_NO_UTF8_ACS", EnvClass::Numeric),
    ("TERM", EnvClass::Alphanumeric),
    ("TERMCAP", EnvClass::NoCheck),
    ("GNUPGHOME", EnvClass::Path),
    ("GPG_AGENT_INFO", EnvClass::NoCheck),
];

fn class_pattern(class: EnvClass) -> Option<&'static Regex> {
    static GENERAL: OnceLock<Regex> = OnceLock::new();
    static ALPHANUMERIC: OnceLock<Regex> = OnceLock::new();
    static NUMERIC: OnceLock<Regex> = OnceLock::new();
    static FILENAME: OnceLock<Regex> = OnceLock::new();
    static PATH: OnceLock<Regex> = OnceLock::new();

    match class {
        EnvClass::General => {
            Some(GENERAL.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.,:@()+/ -]*$").unwrap()))
        }
        EnvClass::Alphanumeric => {
            Some(ALPHANUMERIC.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]*$").unwrap()))
        }
        EnvClass::Numeric => Some(NUMERIC.get_or_init(|| Regex::new(r"^[0-9]*$").unwrap())),
        EnvClass::Filename => {
            Some(FILENAME.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]*$").unwrap()))
        }
        EnvClass::Path => Some(PATH.get_or_init(|| Regex::new(r"^[A-Za-z0-9_./-]*$").unwrap())),
        EnvClass::NoCheck => None,
    }
}

fn validate_env_value(name: &str, value: &str, class: EnvClass) -> Result<(), SecurityError> {
    if class == EnvClass::Path && (value.starts_with(':') || value.ends_with(':')) {
        return Err(SecurityError::IllegalEnvironmentVariable {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    if let Some(pattern) = class_pattern(class) {
        if !pattern.is_match(value) {
            return Err(SecurityError::IllegalEnvironmentVariable {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    } else if value.contains('\0') || value.contains('\n') {
        return Err(SecurityError::IllegalEnvironmentVariable {
            name: name.to_string(),
            value: value.to_string(),
        });
    }

    Ok(())
}

/// Step 8: validate every whitelisted variable present, then clear the
/// entire environment and re-export only what passed. Returns the accepted
/// `(name, value)` pairs so `--environment` can print them back.
fn scrub_environment() -> Result<Vec<(String, String)>, SecurityError> {
    let mut accepted: HashMap<String, String> = HashMap::new();

    for (name, class) in ENV_WHITELIST {
        if let Ok(value) = std::env::var(name) {
            validate_env_value(name, &value, *class)?;
            accepted.insert((*name).to_string(), value);
        }
    }

    for (key, _) in std::env::vars() {
        std::env::remove_var(key);
    }

    let mut result: Vec<(String, String)> = accepted.into_iter().collect();
    result.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, value) in &result {
        let cname = CString::new(name.as_str());
        let cvalue = CString::new(value.as_str());
        if cname.is_ok() && cvalue.is_ok() {
            std::env::set_var(name, value);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_counts_only_true_flags() {
        let flags = HardeningFlags {
            privileges_dropped: true,
            core_disabled: true,
            mlock_enabled: false,
            mlock_max: false,
            ptrace_safe: false,
            env_validated: true,
            cracklib_dict_present: true,
        };
        assert_eq!(flags.score(), 4);
    }

    #[test]
    fn platform_max_excludes_ptrace_off_linux() {
        let flags = HardeningFlags::default();
        if cfg!(target_os = "linux") {
            assert_eq!(flags.platform_max(), 7);
        } else {
            assert_eq!(flags.platform_max(), 6);
        }
    }

    #[test]
    fn validate_env_value_accepts_well_formed_term() {
        assert!(validate_env_value("TERM", "xterm-256color", EnvClass::Alphanumeric).is_ok());
        assert!(validate_env_value("TERM", "a=b", EnvClass::Alphanumeric).is_err());
    }

    #[test]
    fn validate_env_value_rejects_shell_metacharacters() {
        let err = validate_env_value("TERM", "a=b", EnvClass::Alphanumeric).unwrap_err();
        assert!(matches!(err, SecurityError::IllegalEnvironmentVariable { .. }));
    }

    #[test]
    fn validate_env_value_rejects_path_with_leading_colon() {
        let err = validate_env_value("HOME", ":/home/alice", EnvClass::Path).unwrap_err();
        assert!(matches!(err, SecurityError::IllegalEnvironmentVariable { .. }));
    }

    #[test]
    fn validate_env_value_nocheck_still_rejects_nul() {
        let err = validate_env_value("TERMCAP", "a\0b", EnvClass::NoCheck).unwrap_err();
        assert!(matches!(err, SecurityError::IllegalEnvironmentVariable { .. }));
    }

    #[test]
    fn validate_env_value_numeric_rejects_letters() {
        assert!(validate_env_value("COLUMNS", "80", EnvClass::Numeric).is_ok());
        assert!(validate_env_value("COLUMNS", "eighty", EnvClass::Numeric).is_err());
    }

    #[test]
    fn any_path_exists_finds_a_real_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dict");
        std::fs::write(&file, "").unwrap();
        let missing = dir.path().join("missing");
        assert!(any_path_exists(&[missing.to_str().unwrap(), file.to_str().unwrap()]));
    }

    #[test]
    fn any_path_exists_false_when_nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(!any_path_exists(&[missing.to_str().unwrap()]));
    }
}
