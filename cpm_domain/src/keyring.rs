// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Key-ring manager (C9)
//!
//! Holds the ordered set of recipient identifiers a document is encrypted
//! to. Canonicalisation of a raw query string goes through the
//! [`CryptoEngine`] port (C2); the ring itself only ever stores and orders
//! the canonical strings that come back.

use crate::error::CpmError;
use crate::services::crypto::CryptoEngine;

/// Ordered, deduplicated, case-sensitively sorted set of recipient
/// identifiers (§4.9).
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    recipients: Vec<String>,
    /// Recipients read off a document's history for which no local public
    /// key could be resolved. A non-empty set forces the session read-only
    /// (§4.9: "cannot re-encrypt completely").
    unresolvable: Vec<String>,
}

impl KeyRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.recipients.len()
    }

    pub fn list(&self) -> &[String] {
        &self.recipients
    }

    pub fn is_read_only(&self) -> bool {
        !self.unresolvable.is_empty()
    }

    pub fn unresolvable(&self) -> &[String] {
        &self.unresolvable
    }

    /// Canonicalises `query` via `engine` and inserts it in sorted order if
    /// new. Returns `false` (no-op) for an empty or unparsable query.
    pub fn add(&mut self, query: &str, engine: &dyn CryptoEngine) -> Result<bool, CpmError> {
        let Some(canonical) = engine.validate_recipient(query)? else {
            return Ok(false);
        };
        if self.recipients.contains(&canonical) {
            return Ok(false);
        }
        let pos = self.recipients.partition_point(|r| r.as_str() < canonical.as_str());
        self.recipients.insert(pos, canonical);
        Ok(true)
    }

    pub fn change(&mut self, index: usize, query: &str, engine: &dyn CryptoEngine) -> Result<(), CpmError> {
        if index >= self.recipients.len() {
            return Err(CpmError::NodeNotFound(format!("recipient index {index}")));
        }
        let canonical = engine
            .validate_recipient(query)?
            .ok_or_else(|| CpmError::Crypto(format!("{query:?} is not a valid recipient")))?;
        self.recipients.remove(index);
        let pos = self.recipients.partition_point(|r| r.as_str() < canonical.as_str());
        self.recipients.insert(pos, canonical);
        Ok(())
    }

    pub fn delete(&mut self, index: usize) -> Result<String, CpmError> {
        if index >= self.recipients.len() {
            return Err(CpmError::NodeNotFound(format!("recipient index {index}")));
        }
        Ok(self.recipients.remove(index))
    }

    /// Records a recipient seen on a decrypted document that no local key
    /// resolves, forcing read-only mode until the ring is rebuilt.
    pub fn mark_unresolvable(&mut self, recipient_id: &str) {
        if !self.unresolvable.iter().any(|r| r == recipient_id) {
            self.unresolvable.push(recipient_id.to_string());
        }
    }

    /// Appends `realm` as a recipient hint so a reader who only ever typed
    /// their passphrase still ends up able to re-encrypt (§4.9: "Adding a
    /// new realm after decryption automatically appends the realm hint to
    /// the defaults").
    pub fn ensure_realm_hint(&mut self, realm: &str, engine: &dyn CryptoEngine) -> Result<bool, CpmError> {
        if realm.is_empty() {
            return Ok(false);
        }
        self.add(realm, engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::crypto::{DecryptedDocument, PassphraseCallback};

    struct StubEngine;

    impl CryptoEngine for StubEngine {
        fn decrypt_verify(
            &self,
            _cipher: &[u8],
            _passphrase: &mut dyn PassphraseCallback,
        ) -> Result<DecryptedDocument, CpmError> {
            unimplemented!()
        }

        fn encrypt_sign(
            &self,
            _plain: &[u8],
            _recipients: &[String],
            _signers: &[String],
            _passphrase: &mut dyn PassphraseCallback,
        ) -> Result<Vec<u8>, CpmError> {
            unimplemented!()
        }

        fn find_fingerprint(&self, _query: &str, _secret_only: bool) -> Result<Option<String>, CpmError> {
            unimplemented!()
        }

        fn is_secret_key(&self, _query: &str) -> Result<bool, CpmError> {
            unimplemented!()
        }

        fn validate_recipient(&self, query: &str) -> Result<Option<String>, CpmError> {
            if query.is_empty() {
                Ok(None)
            } else {
                Ok(Some(format!("DEADBEEF {query} <{query}@example.com>")))
            }
        }
    }

    #[test]
    fn add_is_sorted_and_deduplicated() {
        let engine = StubEngine;
        let mut ring = KeyRing::new();
        assert!(ring.add("bob", &engine).unwrap());
        assert!(ring.add("alice", &engine).unwrap());
        assert!(!ring.add("alice", &engine).unwrap());
        assert_eq!(ring.count(), 2);
        assert!(ring.list()[0].contains("alice"));
    }

    #[test]
    fn empty_query_is_rejected_silently() {
        let engine = StubEngine;
        let mut ring = KeyRing::new();
        assert!(!ring.add("", &engine).unwrap());
        assert_eq!(ring.count(), 0);
    }

    #[test]
    fn unresolvable_recipient_forces_read_only() {
        let mut ring = KeyRing::new();
        assert!(!ring.is_read_only());
        ring.mark_unresolvable("DEADBEEF Ghost <ghost@example.com>");
        assert!(ring.is_read_only());
    }

    #[test]
    fn delete_removes_by_index() {
        let engine = StubEngine;
        let mut ring = KeyRing::new();
        ring.add("alice", &engine).unwrap();
        let removed = ring.delete(0).unwrap();
        assert!(removed.contains("alice"));
        assert_eq!(ring.count(), 0);
    }
}
