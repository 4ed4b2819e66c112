// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Store pipeline (C10)
//!
//! The file-level read/write sequence of §4.10, with the `FILE.lock`
//! companion-file advisory lock and `FILE~` backup of §4.10's locking
//! subsection and §5's resource model. Orchestrates C2 (crypto), C3
//! (compression), and C5 (XML) but owns none of their logic.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use cpm_domain::error::CpmError;
use cpm_domain::model::Document;
use cpm_domain::services::compression::{looks_compressed, CompressionCodec, CompressionLevel};
use cpm_domain::services::crypto::{CryptoEngine, PassphraseCallback, RecipientId};

use super::xml_store::{read_document, write_document, XmlError};

const LOCK_RETRIES: u32 = 5;
const LOCK_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Domain(#[from] CpmError),
    #[error("xml error: {0}")]
    Xml(#[from] XmlError),
    #[error("lockfile {path:?} already exists (pid {pid})")]
    LockPresent { path: PathBuf, pid: u32 },
    #[error("failed to acquire advisory lock on {0:?} after {LOCK_RETRIES} retries")]
    LockTimeout(PathBuf),
}

/// Outcome of a successful read, surfaced to the session controller (C12).
pub struct ReadOutcome {
    pub recipient_ids: Vec<RecipientId>,
    pub just_upgraded: bool,
    /// Non-fatal: "reading unencrypted" when encryption is configured off,
    /// or a pass-through warning when the compressed-magic sniff misses
    /// despite a nonzero configured compression level (§4.3).
    pub warnings: Vec<String>,
}

/// Guards the `FILE.lock` companion file; removed on drop (graceful exit or
/// unwind alike), matching §4.10's "removed on graceful exit and on
/// signal-driven exit."
pub struct LockGuard {
    path: PathBuf,
    active: bool,
}

impl LockGuard {
    /// Attempts to create `{path}.lock` exclusively. On a pre-existing
    /// lockfile, returns the owning pid via `StoreError::LockPresent` so
    /// the caller can offer the user a reclaim prompt (§4.10).
    pub fn acquire(database_path: &Path) -> Result<Self, StoreError> {
        let lock_path = lock_path_for(database_path);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut f) => {
                write!(f, "{}", std::process::id())?;
                Ok(Self {
                    path: lock_path,
                    active: true,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let pid = std::fs::read_to_string(&lock_path)
                    .ok()
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(0);
                Err(StoreError::LockPresent { path: lock_path, pid })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Forcibly removes a stale lockfile and re-acquires it (user-approved
    /// reclaim, §4.10).
    pub fn reclaim(database_path: &Path) -> Result<Self, StoreError> {
        let lock_path = lock_path_for(database_path);
        let _ = std::fs::remove_file(&lock_path);
        Self::acquire(database_path)
    }

    pub fn release(mut self) {
        self.remove();
        self.active = false;
    }

    fn remove(&mut self) {
        if self.active {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.remove();
    }
}

fn lock_path_for(database_path: &Path) -> PathBuf {
    let mut s = database_path.as_os_str().to_owned();
    s.push(".lock");
    PathBuf::from(s)
}

fn backup_path_for(database_path: &Path) -> PathBuf {
    let mut s = database_path.as_os_str().to_owned();
    s.push("~");
    PathBuf::from(s)
}

pub struct StorePipeline<'a> {
    crypto: &'a dyn CryptoEngine,
    compression: &'a dyn CompressionCodec,
}

impl<'a> StorePipeline<'a> {
    pub fn new(crypto: &'a dyn CryptoEngine, compression: &'a dyn CompressionCodec) -> Self {
        Self { crypto, compression }
    }

    /// §4.10 read path, steps 1-5. A missing file yields a brand-new
    /// in-memory document rather than an error (step 1).
    pub fn read(
        &self,
        path: &Path,
        encryption_enabled: bool,
        passphrase: &mut dyn PassphraseCallback,
    ) -> Result<(Document, ReadOutcome), StoreError> {
        if !path.exists() {
            return Ok((
                Document::new_empty(Utc::now()),
                ReadOutcome {
                    recipient_ids: Vec::new(),
                    just_upgraded: false,
                    warnings: Vec::new(),
                },
            ));
        }

        let mut file = File::open(path)?;
        lock_shared(&file)?;
        let mut raw = Vec::new();
        file.read_to_end(&mut raw)?;
        unlock(&file)?;
        drop(file);

        let mut warnings = Vec::new();
        let (plain, recipient_ids) = if encryption_enabled {
            let decrypted = self.crypto.decrypt_verify(&raw, passphrase)?;
            (decrypted.plain.to_vec(), decrypted.recipient_ids)
        } else {
            warnings.push("reading unencrypted".to_string());
            (raw, Vec::new())
        };

        let xml_bytes = if looks_compressed(&plain) {
            self.compression.decompress(&plain)?
        } else {
            plain
        };

        let xml = String::from_utf8(xml_bytes).map_err(|e| CpmError::Xml(e.to_string()))?;
        let mut document = read_document(&xml)?;
        let just_upgraded = upgrade_if_needed(&mut document);

        Ok((
            document,
            ReadOutcome {
                recipient_ids,
                just_upgraded,
                warnings,
            },
        ))
    }

    /// §4.10 write path, steps 1-6. Backup precedes overwrite (§5: "a
    /// failure at any step leaves the previous on-disk file intact").
    #[allow(clippy::too_many_arguments)]
    pub fn write(
        &self,
        path: &Path,
        document: &mut Document,
        recipients: &[RecipientId],
        signers: &[RecipientId],
        encryption_enabled: bool,
        encoding_is_utf8: bool,
        passphrase: &mut dyn PassphraseCallback,
    ) -> Result<(), StoreError> {
        let _ = encoding_is_utf8; // the domain model only ever holds UTF-8 text; §4.5's "configured encoding" applies to terminal I/O, not this serialiser.

        let xml = write_document(document)?;

        let compressed = if encryption_enabled {
            self.compression.compress(xml.as_bytes(), CompressionLevel::BEST)?
        } else {
            xml.into_bytes()
        };

        let final_bytes = if encryption_enabled {
            self.crypto.encrypt_sign(&compressed, recipients, signers, passphrase)?
        } else {
            compressed
        };

        if path.exists() {
            std::fs::copy(path, backup_path_for(path))?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        lock_exclusive(&file)?;
        file.write_all(&final_bytes)?;
        file.sync_all()?;
        unlock(&file)?;

        Ok(())
    }
}

/// §4.5.1's version upgrade, run after every parse.
fn upgrade_if_needed(document: &mut Document) -> bool {
    let editor_uid = document.modified_by;
    document.upgrade(editor_uid, Utc::now(), false);
    document.just_upgraded
}

#[cfg(unix)]
fn lock_shared(file: &File) -> Result<(), StoreError> {
    lock_with_retry(file, libc::F_RDLCK)
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> Result<(), StoreError> {
    lock_with_retry(file, libc::F_WRLCK)
}

#[cfg(unix)]
fn lock_with_retry(file: &File, lock_type: i32) -> Result<(), StoreError> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    let mut lock = libc::flock {
        l_type: lock_type as i16,
        l_whence: libc::SEEK_SET as i16,
        l_start: 0,
        l_len: 0,
        l_pid: 0,
    };
    for attempt in 0..LOCK_RETRIES {
        let rc = unsafe { libc::fcntl(fd, libc::F_SETLK, &mut lock) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::WouldBlock || attempt + 1 == LOCK_RETRIES {
            if err.kind() == std::io::ErrorKind::WouldBlock {
                return Err(StoreError::LockTimeout(PathBuf::new()));
            }
            return Err(err.into());
        }
        sleep(LOCK_RETRY_DELAY);
    }
    Err(StoreError::LockTimeout(PathBuf::new()))
}

#[cfg(unix)]
fn unlock(file: &File) -> Result<(), StoreError> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    let mut lock = libc::flock {
        l_type: libc::F_UNLCK as i16,
        l_whence: libc::SEEK_SET as i16,
        l_start: 0,
        l_len: 0,
        l_pid: 0,
    };
    let rc = unsafe { libc::fcntl(fd, libc::F_SETLK, &mut lock) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(not(unix))]
fn lock_shared(_file: &File) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(not(unix))]
fn unlock(_file: &File) -> Result<(), StoreError> {
    Ok(())
}
