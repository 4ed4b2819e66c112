// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Use cases
//!
//! The operations the CLI (`CliSearch`) and TUI (`TuiEdit`) presentation
//! adapters drive through a [`Session`]. Each function here is a thin,
//! directly-testable wrapper; the adapters own prompting and rendering.

use thiserror::Error;

use cpm_domain::compile_pattern;
use cpm_domain::error::CpmError;
use cpm_domain::model::TemplateStatus;
use cpm_domain::pattern::{CompiledPattern, PatternError};

use super::session::{Session, SessionError};

#[derive(Debug, Error)]
pub enum UseCaseError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Domain(#[from] CpmError),
    #[error("pattern {index} failed to compile: {source}")]
    PatternCompile { index: usize, source: PatternError },
}

/// Merges the document's own per-level template titles over the configured
/// defaults, matching C6's fallback rule (§4.6), for however many levels
/// either side defines.
fn merged_template_names(session: &Session<'_>, defaults: &[String]) -> Vec<String> {
    let registry = &session.document().templates;
    let max_level = registry
        .iter()
        .map(|t| t.level)
        .max()
        .unwrap_or(0)
        .max(defaults.len() as u32);
    (1..=max_level)
        .map(|level| registry.get(level, defaults).0)
        .collect()
}

/// Compiles every configured `(search_pattern, result_pattern)` pair
/// against the document's current template names (§4.7). Exposed
/// separately from [`run_cli_search`] so the TUI's template editor can
/// re-validate patterns after a rename without running a search.
pub fn compile_pattern_pairs(
    session: &Session<'_>,
    pairs: &[(String, String)],
    default_templates: &[String],
) -> Result<Vec<(CompiledPattern, CompiledPattern)>, UseCaseError> {
    let names = merged_template_names(session, default_templates);
    pairs
        .iter()
        .enumerate()
        .map(|(index, (search, result))| {
            let compiled_search = compile_pattern(search, &names)
                .map_err(|source| UseCaseError::PatternCompile { index, source })?;
            let compiled_result = compile_pattern(result, &names)
                .map_err(|source| UseCaseError::PatternCompile { index, source })?;
            Ok((compiled_search, compiled_result))
        })
        .collect()
}

/// Outcome of `CliSearch` (§4.12): enough for the CLI to print the
/// "N matches found" banner and decide its exit code.
pub struct SearchOutcome {
    pub matches: Vec<String>,
}

impl SearchOutcome {
    pub fn banner(&self) -> String {
        match self.matches.len() {
            1 => "1 match found.".to_string(),
            n => format!("{n} matches found."),
        }
    }
}

/// A single pass of C8 (§4.8, §4.12 "CLI-Search"): compile every configured
/// pattern pair, then search.
pub fn run_cli_search(
    session: &Session<'_>,
    pairs: &[(String, String)],
    default_templates: &[String],
    query: &str,
    regex: bool,
    case_sensitive: Option<bool>,
) -> Result<SearchOutcome, UseCaseError> {
    let compiled = compile_pattern_pairs(session, pairs, default_templates)?;
    let matches = session.search(&compiled, query, regex, case_sensitive)?;
    Ok(SearchOutcome { matches })
}

/// `TUI-Edit`: create a child under the current cursor position.
pub fn add_node(session: &mut Session<'_>, label: &str) -> Result<(), UseCaseError> {
    session.with_tree(|tree, uid, now| tree.add_child(label, uid, now))??;
    Ok(())
}

/// `TUI-Edit`: rename a child of the current cursor position.
pub fn rename_node(session: &mut Session<'_>, old: &str, new: &str) -> Result<(), UseCaseError> {
    session.with_tree(|tree, uid, now| tree.rename_child(old, new, uid, now))??;
    Ok(())
}

/// `TUI-Edit`: delete a child (and its whole subtree) of the current cursor
/// position.
pub fn delete_node(session: &mut Session<'_>, label: &str) -> Result<(), UseCaseError> {
    session.with_tree(|tree, uid, now| tree.delete_child(label, uid, now))??;
    Ok(())
}

/// `TUI-Edit`: set or clear (empty text) the comment on a child node.
///
/// A password-level node's content is cracklib-checked (§3: "`password`
/// levels are the only ones allowed to be... cracklib-checked"), stood in
/// for by `zxcvbn`. Per §7 ("weak passwords are reported but not forced")
/// this never rejects the write; a weak result is returned as a warning for
/// the caller to surface.
pub fn set_comment(session: &mut Session<'_>, label: &str, text: &str) -> Result<Option<String>, UseCaseError> {
    let level = session.cursor_depth() as u32 + 1;
    let warning = if !text.is_empty() && session.document().templates.is_password_level(level) {
        weak_password_warning(text)
    } else {
        None
    };
    session.with_tree(|tree, uid, now| tree.set_comment(label, text, uid, now))??;
    Ok(warning)
}

/// Scores `text` with `zxcvbn` and returns a warning message when it falls
/// below a "strong" rating (score 3 of 0-4).
fn weak_password_warning(text: &str) -> Option<String> {
    let estimate = zxcvbn::zxcvbn(text, &[]);
    if estimate.score() < 3 {
        Some(format!(
            "weak password (strength {}/4): consider a longer or less predictable value",
            estimate.score()
        ))
    } else {
        None
    }
}

/// `TUI-Edit`: sets the template title for the current cursor's depth.
pub fn set_template(session: &mut Session<'_>, title: &str, is_password: bool) -> Result<(), UseCaseError> {
    let status = if is_password { TemplateStatus::Password } else { TemplateStatus::Normal };
    session.with_tree(|tree, _, _| tree.template_set(title, status))?;
    Ok(())
}

/// Recipient management (C9, §4.9): add a new key-ring entry, canonicalised
/// via C2.
pub fn add_recipient(session: &mut Session<'_>, query: &str, engine: &dyn cpm_domain::services::crypto::CryptoEngine) -> Result<bool, UseCaseError> {
    Ok(session.keyring_mut().add(query, engine)?)
}

pub fn change_recipient(
    session: &mut Session<'_>,
    index: usize,
    query: &str,
    engine: &dyn cpm_domain::services::crypto::CryptoEngine,
) -> Result<(), UseCaseError> {
    Ok(session.keyring_mut().change(index, query, engine)?)
}

pub fn delete_recipient(session: &mut Session<'_>, index: usize) -> Result<String, UseCaseError> {
    Ok(session.keyring_mut().delete(index)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cpm_domain::services::compression::{CompressionCodec, CompressionLevel};
    use cpm_domain::services::crypto::{
        CryptoEngine, DecryptedDocument, PassphraseCallback, RecipientId,
    };
    use zeroize::Zeroizing;

    struct NoCrypto;
    impl CryptoEngine for NoCrypto {
        fn decrypt_verify(&self, _c: &[u8], _p: &mut dyn PassphraseCallback) -> Result<DecryptedDocument, CpmError> {
            unimplemented!()
        }
        fn encrypt_sign(
            &self,
            _p: &[u8],
            _r: &[RecipientId],
            _s: &[RecipientId],
            _pw: &mut dyn PassphraseCallback,
        ) -> Result<Vec<u8>, CpmError> {
            unimplemented!()
        }
        fn find_fingerprint(&self, _q: &str, _s: bool) -> Result<Option<String>, CpmError> {
            Ok(None)
        }
        fn is_secret_key(&self, _q: &str) -> Result<bool, CpmError> {
            Ok(false)
        }
        fn validate_recipient(&self, query: &str) -> Result<Option<String>, CpmError> {
            if query.is_empty() {
                Ok(None)
            } else {
                Ok(Some(query.to_string()))
            }
        }
    }

    struct NoCompression;
    impl CompressionCodec for NoCompression {
        fn compress(&self, plain: &[u8], _level: CompressionLevel) -> Result<Vec<u8>, CpmError> {
            Ok(plain.to_vec())
        }
        fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>, CpmError> {
            Ok(compressed.to_vec())
        }
    }

    struct StubPassphrase;
    impl PassphraseCallback for StubPassphrase {
        fn prompt(&mut self, _retry: u32, _realm: &str) -> Zeroizing<String> {
            Zeroizing::new(String::new())
        }
    }

    fn open_session<'a>(
        path: &std::path::Path,
        crypto: &'a NoCrypto,
        compression: &'a NoCompression,
        pw: &mut StubPassphrase,
    ) -> Session<'a> {
        Session::open(path, crypto, compression, false, true, "", false, false, pw)
            .unwrap()
            .0
    }

    #[test]
    fn search_matches_github_example() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.cpm");
        let crypto = NoCrypto;
        let compression = NoCompression;
        let mut pw = StubPassphrase;
        let mut session = open_session(&path, &crypto, &compression, &mut pw);

        let now = Utc::now();
        add_node(&mut session, "github").unwrap();
        session.navigate_down("github").unwrap();
        add_node(&mut session, "alice").unwrap();
        session.navigate_down("alice").unwrap();
        add_node(&mut session, "x").unwrap();
        let _ = now;

        let defaults = vec!["Service".to_string(), "Account".to_string(), "Password".to_string()];
        let pairs = vec![("<Service> <Account>".to_string(), "<Password>".to_string())];
        let outcome = run_cli_search(&session, &pairs, &defaults, "github alice", false, None).unwrap();
        assert_eq!(outcome.matches, vec!["x".to_string()]);
        assert_eq!(outcome.banner(), "1 match found.");
    }

    #[test]
    fn bad_pattern_reports_which_index_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.cpm");
        let crypto = NoCrypto;
        let compression = NoCompression;
        let mut pw = StubPassphrase;
        let session = open_session(&path, &crypto, &compression, &mut pw);

        let defaults = vec!["Service".to_string()];
        let pairs = vec![("<Nope>".to_string(), "x".to_string())];
        let err = run_cli_search(&session, &pairs, &defaults, "q", false, None).unwrap_err();
        assert!(matches!(err, UseCaseError::PatternCompile { index: 0, .. }));
    }

    #[test]
    fn rename_and_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.cpm");
        let crypto = NoCrypto;
        let compression = NoCompression;
        let mut pw = StubPassphrase;
        let mut session = open_session(&path, &crypto, &compression, &mut pw);

        add_node(&mut session, "cat1").unwrap();
        rename_node(&mut session, "cat1", "cat2").unwrap();
        assert!(session.with_tree(|tree, _, _| tree.child_exists("cat2")).unwrap());
        delete_node(&mut session, "cat2").unwrap();
        assert!(!session.with_tree(|tree, _, _| tree.child_exists("cat2")).unwrap());
    }

    #[test]
    fn add_recipient_canonicalises_via_crypto_engine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.cpm");
        let crypto = NoCrypto;
        let compression = NoCompression;
        let mut pw = StubPassphrase;
        let mut session = open_session(&path, &crypto, &compression, &mut pw);

        let added = add_recipient(&mut session, "alice@example.com", &crypto).unwrap();
        assert!(added);
        assert_eq!(session.keyring().count(), 1);
    }
}
