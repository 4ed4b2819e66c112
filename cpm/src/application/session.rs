// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Session controller (C12)
//!
//! ```text
//! Init → Hardened → Loaded → (CLI-Search | TUI-Edit)+ → Save? → Teardown
//! ```
//!
//! `Hardened` is `cpm_bootstrap::security::harden` running before a
//! `Session` exists at all; `Init` is CLI parsing and resource-file
//! loading, likewise owned by `cpm_bootstrap`. This module owns everything
//! from `Loaded` onward: the open document, the tree cursor, the key ring,
//! and the runtime flags of §3 ("Runtime state").

use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

use cpm_domain::error::CpmError;
use cpm_domain::keyring::KeyRing;
use cpm_domain::model::Document;
use cpm_domain::search::{search as run_search, MatchMode, SearchQuery};
use cpm_domain::services::compression::CompressionCodec;
use cpm_domain::services::crypto::{CryptoEngine, PassphraseCallback};
use cpm_domain::tree::Tree;
use cpm_domain::CompiledPattern;

use crate::infrastructure::store::{LockGuard, ReadOutcome, StoreError, StorePipeline};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Domain(#[from] CpmError),
    #[error("no recipients configured; refusing to save an encrypted store with nobody who can read it")]
    NoRecipients,
    #[error("session is read-only")]
    ReadOnly,
}

/// Result of opening a database: the session plus anything the caller
/// (CLI or TUI) needs to greet the user with before the first prompt.
pub struct OpenReport {
    pub just_upgraded: bool,
    pub warnings: Vec<String>,
    /// Set when decryption found recipients this keyring can't resolve
    /// locally (§4.9: "forced into read-only mode").
    pub forced_read_only: bool,
}

pub struct Session<'a> {
    crypto: &'a dyn CryptoEngine,
    store: StorePipeline<'a>,
    database_path: PathBuf,
    document: Document,
    cursor: Vec<String>,
    keyring: KeyRing,
    editor_uid: u32,
    realm: String,
    read_only: bool,
    data_changed: bool,
    case_sensitive: bool,
    encryption_enabled: bool,
    lock: Option<LockGuard>,
}

impl<'a> Session<'a> {
    /// `Loaded`: acquires the companion lockfile (unless `force_read_only`
    /// or the lock is already held and the caller declined reclaim) and
    /// runs the §4.10 read path.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        database_path: &Path,
        crypto: &'a dyn CryptoEngine,
        compression: &'a dyn CompressionCodec,
        encryption_enabled: bool,
        case_sensitive: bool,
        realm: &str,
        force_read_only: bool,
        reclaim_lock: bool,
        passphrase: &mut dyn PassphraseCallback,
    ) -> Result<(Self, OpenReport), SessionError> {
        let (lock, read_only) = if force_read_only {
            (None, true)
        } else {
            match LockGuard::acquire(database_path) {
                Ok(guard) => (Some(guard), false),
                Err(StoreError::LockPresent { .. }) if reclaim_lock => {
                    (Some(LockGuard::reclaim(database_path)?), false)
                }
                Err(StoreError::LockPresent { .. }) => (None, true),
                Err(e) => return Err(e.into()),
            }
        };

        let store = StorePipeline::new(crypto, compression);
        let (mut document, ReadOutcome { recipient_ids, just_upgraded, warnings }) =
            store.read(database_path, encryption_enabled, passphrase)?;

        let mut keyring = KeyRing::new();
        let mut forced_read_only = false;
        for recipient in &recipient_ids {
            match crypto.find_fingerprint(recipient, false) {
                Ok(Some(_)) => {
                    let _ = keyring.add(recipient, crypto);
                }
                _ => {
                    keyring.mark_unresolvable(recipient);
                    forced_read_only = true;
                }
            }
        }
        if !realm.is_empty() {
            let _ = keyring.ensure_realm_hint(realm, crypto);
        }

        // Editors are lazily created on first use of a new realm (§3): resolve
        // the session author's uid, inserting a fresh `Editor` record if this
        // realm has never been seen in this document before.
        let editor_uid = if realm.is_empty() {
            cpm_domain::model::UNKNOWN_EDITOR
        } else {
            document.editors.add(realm, Utc::now())
        };

        let session = Self {
            crypto,
            store,
            database_path: database_path.to_path_buf(),
            document,
            cursor: Vec::new(),
            keyring,
            editor_uid,
            realm: realm.to_string(),
            read_only: read_only || forced_read_only,
            data_changed: false,
            case_sensitive,
            encryption_enabled,
            lock,
        };

        Ok((
            session,
            OpenReport {
                just_upgraded,
                warnings,
                forced_read_only,
            },
        ))
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn data_changed(&self) -> bool {
        self.data_changed
    }

    pub fn keyring(&self) -> &KeyRing {
        &self.keyring
    }

    pub fn keyring_mut(&mut self) -> &mut KeyRing {
        &mut self.keyring
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Depth of the current cursor (root is `0`); a child added here would
    /// sit at template level `cursor_depth() + 1`.
    pub fn cursor_depth(&self) -> usize {
        self.cursor.len()
    }

    /// `CLI-Search`: a single pass of C8 (§4.12).
    pub fn search(
        &self,
        pairs: &[(CompiledPattern, CompiledPattern)],
        text: &str,
        regex: bool,
        case_sensitive: Option<bool>,
    ) -> Result<Vec<String>, SessionError> {
        let query = SearchQuery {
            pairs,
            mode: if regex { MatchMode::Regex } else { MatchMode::Literal },
            case_sensitive: case_sensitive.unwrap_or(self.case_sensitive),
            text,
        };
        Ok(run_search(&self.document, &query)?)
    }

    /// Runs `f` against a `Tree` cursor re-resolved to the session's
    /// current navigation path (`TUI-Edit`). Editor uid and wallclock are
    /// supplied here so use cases never fabricate their own timestamp.
    pub fn with_tree<R>(&mut self, f: impl FnOnce(&mut Tree<'_>, u32, chrono::DateTime<Utc>) -> R) -> Result<R, SessionError> {
        if self.read_only {
            return Err(SessionError::ReadOnly);
        }
        let mut tree = Tree::new(&mut self.document, self.case_sensitive);
        for label in &self.cursor {
            tree.node_down(Some(label))?;
        }
        let now = Utc::now();
        let editor_uid = self.editor_uid;
        let result = f(&mut tree, editor_uid, now);
        self.data_changed = true;
        Ok(result)
    }

    pub fn navigate_down(&mut self, label: &str) -> Result<(), SessionError> {
        let mut tree = Tree::new(&mut self.document, self.case_sensitive);
        for l in &self.cursor {
            tree.node_down(Some(l))?;
        }
        tree.node_down(Some(label))?;
        self.cursor.push(label.to_string());
        Ok(())
    }

    /// Labels of the current cursor's children, sorted case-sensitively
    /// (§4.4). Read-only in spirit, but `Tree` must borrow `&mut Document`
    /// to exist at all, so this still takes `&mut self`.
    pub fn list_children(&mut self) -> Vec<String> {
        let mut tree = Tree::new(&mut self.document, self.case_sensitive);
        for label in &self.cursor {
            if tree.node_down(Some(label)).is_err() {
                return Vec::new();
            }
        }
        tree.list_children().iter().map(|s| s.to_string()).collect()
    }

    pub fn navigate_up(&mut self) -> Result<(), SessionError> {
        if self.cursor.is_empty() {
            return Err(CpmError::AtRoot.into());
        }
        self.cursor.pop();
        Ok(())
    }

    /// `Save?` guard chain lives in the presentation layer (it needs to ask
    /// the user); this is the mechanical half: re-enter the write pipeline
    /// (§4.10) and clear `data_changed` on success.
    pub fn save(&mut self, passphrase: &mut dyn PassphraseCallback) -> Result<(), SessionError> {
        if self.read_only {
            return Err(SessionError::ReadOnly);
        }
        if self.encryption_enabled && self.keyring.count() == 0 {
            return Err(SessionError::NoRecipients);
        }
        let signers: Vec<String> = self
            .keyring
            .list()
            .iter()
            .filter(|r| self.crypto.is_secret_key(r).unwrap_or(false))
            .cloned()
            .collect();
        self.store.write(
            &self.database_path,
            &mut self.document,
            self.keyring.list(),
            &signers,
            self.encryption_enabled,
            true,
            passphrase,
        )?;
        self.data_changed = false;
        Ok(())
    }

    /// `Teardown`: release the lockfile. Also invoked on signal-driven
    /// exit (§4.12).
    pub fn teardown(mut self) {
        if let Some(lock) = self.lock.take() {
            lock.release();
        }
    }
}
