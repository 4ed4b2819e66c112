// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # OpenPGP adapter over `sequoia-openpgp` (C2)
//!
//! Implements `cpm_domain::services::crypto::CryptoEngine` against a local
//! keyring of `Cert`s loaded once at startup. Acceptance policy follows
//! §4.2 exactly: a read is only trusted when every signature over it is
//! `valid+green`, full validity, a known status, correct key usage, an
//! acceptable hash, and an acceptable public-key algorithm, signature
//! class 0.

use std::io::Write;
use std::path::Path;

use sequoia_openpgp as openpgp;
use openpgp::cert::{Cert, CertParser};
use openpgp::crypto::Password;
use openpgp::packet::signature::subpacket::SubpacketTag;
use openpgp::parse::stream::{
    DecryptionHelper, MessageStructure, VerificationHelper,
};
use openpgp::parse::{Parse, stream::DecryptorBuilder};
use openpgp::policy::{Policy, StandardPolicy};
use openpgp::serialize::stream::{Encryptor, LiteralWriter, Message, Signer};
use openpgp::types::{HashAlgorithm as SqHash, PublicKeyAlgorithm as SqPkAlgo, RevocationStatus};
use openpgp::{Fingerprint, KeyHandle};
use zeroize::Zeroizing;

use cpm_domain::error::CpmError;
use cpm_domain::services::crypto::{
    CryptoEngine, DecryptedDocument, HashAlgorithm, PassphraseCallback, PublicKeyAlgorithm, RecipientId,
    SignatureDeviation, VerifiedSignature,
};

pub struct SequoiaCryptoEngine {
    certs: Vec<Cert>,
    policy: StandardPolicy<'static>,
}

impl SequoiaCryptoEngine {
    /// Loads every certificate (public or secret) from `keyring_path`, a
    /// concatenated sequence of armored or binary OpenPGP certificates.
    pub fn load(keyring_path: &Path) -> Result<Self, CpmError> {
        let certs = CertParser::from_file(keyring_path)
            .map_err(|e| CpmError::Crypto(format!("failed to open keyring {keyring_path:?}: {e}")))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(Self {
            certs,
            policy: StandardPolicy::new(),
        })
    }

    pub fn with_certs(certs: Vec<Cert>) -> Self {
        Self {
            certs,
            policy: StandardPolicy::new(),
        }
    }

    fn find_cert(&self, query: &str) -> Option<&Cert> {
        if query.is_empty() {
            return None;
        }
        if let Ok(handle) = query.parse::<KeyHandle>() {
            if let Some(cert) = self.certs.iter().find(|c| c.key_handle().aliases(&handle)) {
                return Some(cert);
            }
        }
        self.certs.iter().find(|c| {
            c.userids().any(|ua| {
                ua.userid()
                    .value()
                    .windows(query.len().max(1))
                    .any(|w| w.eq_ignore_ascii_case(query.as_bytes()))
            })
        })
    }

    fn is_usable_for_encryption(&self, cert: &Cert) -> bool {
        let Ok(valid) = cert.with_policy(&self.policy, None) else {
            return false;
        };
        if !matches!(valid.revocation_status(), RevocationStatus::NotAsFarAsWeKnow) {
            return false;
        }
        if valid.alive().is_err() {
            return false;
        }
        valid
            .keys()
            .for_storage_encryption()
            .for_transport_encryption()
            .supported()
            .next()
            .is_some()
    }

    fn canonical_string(&self, cert: &Cert) -> Option<RecipientId> {
        let valid = cert.with_policy(&self.policy, None).ok()?;
        let userid = valid.primary_userid().ok()?;
        let name = userid.userid().name().ok().flatten().unwrap_or_default();
        let comment = userid.userid().comment().ok().flatten();
        let email = userid.userid().email().ok().flatten().unwrap_or_default();
        let keyid = cert.keyid().to_hex();
        Some(match comment {
            Some(c) if !c.is_empty() => format!("{keyid} {name} ({c}) <{email}>"),
            _ => format!("{keyid} {name} <{email}>"),
        })
    }
}

impl CryptoEngine for SequoiaCryptoEngine {
    fn decrypt_verify(
        &self,
        cipher: &[u8],
        passphrase: &mut dyn PassphraseCallback,
    ) -> Result<DecryptedDocument, CpmError> {
        let helper = Helper {
            certs: &self.certs,
            passphrase,
            recipient_ids: Vec::new(),
            signatures: Vec::new(),
            deviation: None,
        };
        let mut decryptor = DecryptorBuilder::from_bytes(cipher)
            .map_err(|e| CpmError::Crypto(format!("malformed OpenPGP message: {e}")))?
            .with_policy(&self.policy, None, helper)
            .map_err(|e| CpmError::Crypto(format!("decryption failed: {e}")))?;

        let mut plain = Zeroizing::new(Vec::new());
        std::io::copy(&mut decryptor, &mut *plain)
            .map_err(|e| CpmError::Crypto(format!("failed reading decrypted stream: {e}")))?;

        let helper = decryptor.into_helper();
        if let Some(deviation) = helper.deviation {
            return Err(CpmError::Crypto(format!("signature rejected: {deviation}")));
        }
        if helper.signatures.is_empty() {
            return Err(CpmError::Crypto(
                "signature rejected: no verifiable signature present".to_string(),
            ));
        }

        Ok(DecryptedDocument {
            plain,
            recipient_ids: helper.recipient_ids,
            signatures: helper.signatures,
        })
    }

    fn encrypt_sign(
        &self,
        plain: &[u8],
        recipients: &[RecipientId],
        signers: &[RecipientId],
        passphrase: &mut dyn PassphraseCallback,
    ) -> Result<Vec<u8>, CpmError> {
        if signers.is_empty() {
            return Err(CpmError::Crypto("at least one signer is required".to_string()));
        }

        let recipient_certs: Vec<&Cert> = recipients
            .iter()
            .filter_map(|r| self.find_cert(r))
            .filter(|c| self.is_usable_for_encryption(c))
            .collect();
        if recipient_certs.is_empty() {
            return Err(CpmError::Crypto("no usable recipient key resolved".to_string()));
        }

        let mut signing_keypairs = Vec::new();
        for signer in signers {
            let cert = self
                .find_cert(signer)
                .ok_or_else(|| CpmError::Crypto(format!("signer {signer:?} not found locally")))?;
            let valid = cert
                .with_policy(&self.policy, None)
                .map_err(|e| CpmError::Crypto(format!("signer {signer:?} invalid: {e}")))?;
            let key = valid
                .keys()
                .secret()
                .for_signing()
                .next()
                .ok_or_else(|| CpmError::Crypto(format!("signer {signer:?} has no usable secret signing key")))?
                .key()
                .clone();
            let realm = cert
                .primary_userid(&self.policy, None)
                .ok()
                .and_then(|u| u.userid().name().ok().flatten())
                .unwrap_or_default();
            let pw: Zeroizing<String> = passphrase.prompt(0, &realm);
            let keypair = key
                .decrypt_secret(&Password::from(pw.as_str()))
                .map_err(|e| CpmError::Crypto(format!("failed to unlock signing key: {e}")))?
                .into_keypair()
                .map_err(|e| CpmError::Crypto(format!("signing key not usable: {e}")))?;
            signing_keypairs.push(keypair);
        }

        let mut sink = Vec::new();
        {
            let message = Message::new(&mut sink);
            let message = Encryptor::for_recipients(message, recipient_certs.iter().flat_map(|c| {
                c.with_policy(&self.policy, None)
                    .into_iter()
                    .flat_map(|v| v.keys().for_storage_encryption().for_transport_encryption().supported().map(|k| k.key().clone()))
            }))
            .build()
            .map_err(|e| CpmError::Crypto(format!("failed to build encryptor: {e}")))?;

            let mut signer_builder = Signer::new(message, signing_keypairs.remove(0));
            for extra in signing_keypairs {
                signer_builder = signer_builder.add_signer(extra);
            }
            let message = signer_builder
                .build()
                .map_err(|e| CpmError::Crypto(format!("failed to build signer: {e}")))?;

            let mut message = LiteralWriter::new(message)
                .build()
                .map_err(|e| CpmError::Crypto(format!("failed to build literal writer: {e}")))?;
            message
                .write_all(plain)
                .map_err(|e| CpmError::Crypto(format!("failed writing plaintext: {e}")))?;
            message
                .finalize()
                .map_err(|e| CpmError::Crypto(format!("failed finalising message: {e}")))?;
        }

        Ok(sink)
    }

    fn find_fingerprint(&self, query: &str, secret_only: bool) -> Result<Option<String>, CpmError> {
        let Some(cert) = self.find_cert(query) else {
            return Ok(None);
        };
        if !self.is_usable_for_encryption(cert) {
            return Ok(None);
        }
        if secret_only && !cert.is_tsk() {
            return Ok(None);
        }
        Ok(Some(cert.fingerprint().to_hex()))
    }

    fn is_secret_key(&self, query: &str) -> Result<bool, CpmError> {
        Ok(self.find_cert(query).map(Cert::is_tsk).unwrap_or(false))
    }

    fn validate_recipient(&self, query: &str) -> Result<Option<RecipientId>, CpmError> {
        if query.trim().is_empty() {
            return Ok(None);
        }
        let Some(cert) = self.find_cert(query) else {
            return Ok(None);
        };
        Ok(self.canonical_string(cert))
    }
}

/// Bridges sequoia's streaming verification callbacks to §4.2's acceptance
/// policy: valid+green, full validity, known status, class 0, acceptable
/// hash/pubkey algorithm.
struct Helper<'a> {
    certs: &'a [Cert],
    passphrase: &'a mut dyn PassphraseCallback,
    recipient_ids: Vec<RecipientId>,
    signatures: Vec<VerifiedSignature>,
    deviation: Option<SignatureDeviationReport>,
}

struct SignatureDeviationReport {
    fingerprint: String,
    deviation: SignatureDeviation,
}

impl std::fmt::Display for SignatureDeviationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.deviation, self.fingerprint)
    }
}

impl<'a> VerificationHelper for Helper<'a> {
    fn get_certs(&mut self, ids: &[KeyHandle]) -> openpgp::Result<Vec<Cert>> {
        Ok(self
            .certs
            .iter()
            .filter(|c| ids.iter().any(|id| c.key_handle().aliases(id)))
            .cloned()
            .collect())
    }

    fn check(&mut self, structure: MessageStructure) -> openpgp::Result<()> {
        for layer in structure {
            if let openpgp::parse::stream::MessageLayer::SignatureGroup { results } = layer {
                for result in results {
                    match result {
                        Ok(good) => {
                            let fingerprint: Fingerprint = good.key_handle().as_fingerprint().cloned().unwrap_or_default();
                            let hash = sq_hash_to_domain(good.sig.hash_algo());
                            let pk_algo = good.sig.pk_algo().and_then(sq_pkalgo_to_domain);
                            let class_ok = good
                                .sig
                                .subpacket(SubpacketTag::SignatureTarget)
                                .is_none();
                            match (hash, pk_algo, class_ok) {
                                (Some(hash), Some(public_key_algorithm), true) => {
                                    self.signatures.push(VerifiedSignature {
                                        fingerprint: fingerprint.to_hex(),
                                        hash,
                                        public_key_algorithm,
                                    });
                                }
                                (None, _, _) => {
                                    self.deviation = Some(SignatureDeviationReport {
                                        fingerprint: fingerprint.to_hex(),
                                        deviation: SignatureDeviation::WeakHash,
                                    });
                                }
                                (_, None, _) => {
                                    self.deviation = Some(SignatureDeviationReport {
                                        fingerprint: fingerprint.to_hex(),
                                        deviation: SignatureDeviation::WeakPublicKeyAlgorithm,
                                    });
                                }
                                _ => {
                                    self.deviation = Some(SignatureDeviationReport {
                                        fingerprint: fingerprint.to_hex(),
                                        deviation: SignatureDeviation::WrongSignatureClass,
                                    });
                                }
                            }
                        }
                        Err(e) => {
                            self.deviation = Some(SignatureDeviationReport {
                                fingerprint: "unknown".to_string(),
                                deviation: classify_verification_error(&e),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl<'a> DecryptionHelper for Helper<'a> {
    fn decrypt<D>(
        &mut self,
        pkesks: &[openpgp::packet::PKESK],
        _skesks: &[openpgp::packet::SKESK],
        sym_algo: Option<openpgp::types::SymmetricAlgorithm>,
        mut decrypt: D,
    ) -> openpgp::Result<Option<Fingerprint>>
    where
        D: FnMut(openpgp::types::SymmetricAlgorithm, &openpgp::crypto::SessionKey) -> bool,
    {
        for pkesk in pkesks {
            let Some(cert) = self
                .certs
                .iter()
                .find(|c| c.keys().any(|k| k.key_handle().aliases(&pkesk.recipient().clone())))
            else {
                continue;
            };
            self.recipient_ids.push(cert.fingerprint().to_hex());

            let realm = cert
                .userids()
                .next()
                .and_then(|u| u.userid().name().ok().flatten())
                .unwrap_or_default();
            for key in cert.keys().secret() {
                let Ok(key) = key.key().clone().parts_into_secret() else {
                    continue;
                };
                let pw: Zeroizing<String> = self.passphrase.prompt(0, &realm);
                let Ok(unlocked) = key.decrypt_secret(&Password::from(pw.as_str())) else {
                    continue;
                };
                let Ok(mut keypair) = unlocked.into_keypair() else {
                    continue;
                };
                if let Some((algo, sk)) = pkesk.decrypt(&mut keypair, sym_algo) {
                    if decrypt(algo, &sk) {
                        return Ok(Some(cert.fingerprint()));
                    }
                }
            }
        }
        Ok(None)
    }
}

fn sq_hash_to_domain(hash: SqHash) -> Option<HashAlgorithm> {
    match hash {
        SqHash::SHA1 => Some(HashAlgorithm::Sha1),
        SqHash::SHA256 => Some(HashAlgorithm::Sha256),
        SqHash::SHA384 => Some(HashAlgorithm::Sha384),
        SqHash::SHA512 => Some(HashAlgorithm::Sha512),
        _ => None,
    }
}

fn sq_pkalgo_to_domain(algo: SqPkAlgo) -> Option<PublicKeyAlgorithm> {
    match algo {
        SqPkAlgo::DSA => Some(PublicKeyAlgorithm::Dsa),
        SqPkAlgo::RSAEncryptSign | SqPkAlgo::RSASign | SqPkAlgo::RSAEncrypt => Some(PublicKeyAlgorithm::Rsa),
        _ => None,
    }
}

fn classify_verification_error(e: &anyhow::Error) -> SignatureDeviation {
    let msg = e.to_string().to_lowercase();
    if msg.contains("expired") {
        SignatureDeviation::Expired
    } else if msg.contains("revoked") {
        SignatureDeviation::Revoked
    } else if msg.contains("missing") || msg.contains("not found") {
        SignatureDeviation::MissingKey
    } else if msg.contains("usage") {
        SignatureDeviation::WrongKeyUsage
    } else if msg.contains("bad") {
        SignatureDeviation::BadSignature
    } else {
        SignatureDeviation::Unknown
    }
}
