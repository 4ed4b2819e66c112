// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CryptoEngine port (C2)
//!
//! Abstracts the OpenPGP operations the store pipeline needs. The domain
//! never talks to a PGP library directly; an infrastructure adapter
//! implements this trait against whatever backend is wired in.
//!
//! The trait is synchronous: signature verification and encryption are
//! CPU-bound, and the single-threaded session loop has no use for async I/O
//! here (the file handle it ultimately reads/writes is the only async-ish
//! boundary, and that lives in the store pipeline, not this port).

use zeroize::Zeroizing;

use crate::error::CpmError;

/// A canonical `"KEYID NAME (COMMENT) <EMAIL>"` recipient identifier (§4.2,
/// glossary "Recipient"). Produced only by [`CryptoEngine::validate_recipient`].
pub type RecipientId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyAlgorithm {
    Dsa,
    Rsa,
}

/// Why a signature was rejected (§4.2: "an error is surfaced naming the
/// offending key fingerprint and the specific deviation").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureDeviation {
    Expired,
    Revoked,
    MissingKey,
    Crl,
    Policy,
    BadSignature,
    WrongKeyUsage,
    WeakHash,
    WeakPublicKeyAlgorithm,
    WrongValidity,
    WrongStatus,
    WrongSignatureClass,
    Unknown,
}

impl std::fmt::Display for SignatureDeviation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignatureDeviation::Expired => "signing key expired",
            SignatureDeviation::Revoked => "signing key revoked",
            SignatureDeviation::MissingKey => "signing key not found locally",
            SignatureDeviation::Crl => "signing key on a certificate revocation list",
            SignatureDeviation::Policy => "signature violates local validity policy",
            SignatureDeviation::BadSignature => "signature does not verify",
            SignatureDeviation::WrongKeyUsage => "key not flagged for signing",
            SignatureDeviation::WeakHash => "hash algorithm below the accepted floor",
            SignatureDeviation::WeakPublicKeyAlgorithm => "public-key algorithm not DSA or RSA",
            SignatureDeviation::WrongValidity => "signer validity below full",
            SignatureDeviation::WrongStatus => "signature summary status is not clean",
            SignatureDeviation::WrongSignatureClass => "signature class is not 0",
            SignatureDeviation::Unknown => "unrecognised signature deviation",
        };
        f.write_str(s)
    }
}

/// A single accepted signature over a decrypted document (§4.2: "Result must
/// carry exactly as many signatures as signers provided").
#[derive(Debug, Clone)]
pub struct VerifiedSignature {
    pub fingerprint: String,
    pub hash: HashAlgorithm,
    pub public_key_algorithm: PublicKeyAlgorithm,
}

#[derive(Debug)]
pub struct DecryptedDocument {
    /// Zeroized on drop — the decrypted store is sensitive plaintext.
    pub plain: Zeroizing<Vec<u8>>,
    pub recipient_ids: Vec<RecipientId>,
    pub signatures: Vec<VerifiedSignature>,
}

/// Supplies passphrases on demand. Caching across calls (while
/// `keep_passphrase` is set and the realm hasn't changed) is the
/// implementation's responsibility; `realm` is the human-readable hint the
/// backend reports, reused as an editor name (glossary "Realm").
pub trait PassphraseCallback {
    fn prompt(&mut self, retry: u32, realm: &str) -> Zeroizing<String>;
}

/// Port to the OpenPGP backend (C2).
pub trait CryptoEngine: Send + Sync {
    /// Decrypts `cipher` and verifies at least one signature over it,
    /// rejecting unless every signature is `valid+green`, `full` validity,
    /// known status, no wrong key usage, an acceptable hash, and an
    /// acceptable public-key algorithm, with signature class 0.
    fn decrypt_verify(
        &self,
        cipher: &[u8],
        passphrase: &mut dyn PassphraseCallback,
    ) -> Result<DecryptedDocument, CpmError>;

    /// Encrypts `plain` to `recipients` and signs with `signers` (at least
    /// one required). Disable passphrase caching upstream when `signers`
    /// has more than one entry.
    fn encrypt_sign(
        &self,
        plain: &[u8],
        recipients: &[RecipientId],
        signers: &[RecipientId],
        passphrase: &mut dyn PassphraseCallback,
    ) -> Result<Vec<u8>, CpmError>;

    /// A key is usable iff it can encrypt and is not disabled, expired,
    /// invalid, or revoked. `secret_only` additionally requires the secret
    /// key to be locally available (needed for signers).
    fn find_fingerprint(&self, query: &str, secret_only: bool) -> Result<Option<String>, CpmError>;

    fn is_secret_key(&self, query: &str) -> Result<bool, CpmError>;

    /// Canonicalises `query` to a `"KEYID NAME (COMMENT) <EMAIL>"` string.
    /// Empty or unparsable input yields `None` (§4.2: "rejected").
    fn validate_recipient(&self, query: &str) -> Result<Option<RecipientId>, CpmError>;
}
