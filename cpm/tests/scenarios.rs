// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Cross-crate end-to-end scenarios (spec §8 S1-S4), driven entirely
//! through `Session`/use-case calls against a real on-disk store.

use cpm::application::session::Session;
use cpm::application::use_cases::{add_node, run_cli_search, set_comment};
use cpm::infrastructure::compression_gzip::GzipCodec;
use cpm_domain::error::CpmError;
use cpm_domain::services::compression::{CompressionCodec, CompressionLevel};
use cpm_domain::services::crypto::{CryptoEngine, DecryptedDocument, PassphraseCallback, RecipientId};
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
    fn validate_recipient(&self, _q: &str) -> Result<Option<String>, CpmError> {
        Ok(None)
    }
}

struct StubPassphrase;
impl PassphraseCallback for StubPassphrase {
    fn prompt(&mut self, _retry: u32, _realm: &str) -> Zeroizing<String> {
        Zeroizing::new(String::new())
    }
}

/// S1 - round-trip: build a small tree with a multi-line comment, save to
/// disk through the real gzip codec, reopen in a fresh session, and check
/// the tree and comment survive unchanged.
#[test]
fn s1_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("d");
    let crypto = NoCrypto;
    let compression = GzipCodec::new();
    let mut pw = StubPassphrase;

    {
        let (mut session, _) =
            Session::open(&path, &crypto, &compression, false, true, "", false, false, &mut pw).unwrap();
        add_node(&mut session, "cat1").unwrap();
        session.navigate_down("cat1").unwrap();
        add_node(&mut session, "entry1").unwrap();
        session.navigate_down("entry1").unwrap();
        add_node(&mut session, "password").unwrap();
        set_comment(&mut session, "password", "secret\nmore").unwrap();
        session.save(&mut pw).unwrap();
        session.teardown();
    }

    let (mut session, report) =
        Session::open(&path, &crypto, &compression, false, true, "", false, false, &mut pw).unwrap();
    assert!(!report.just_upgraded);

    assert!(session.with_tree(|tree, _, _| tree.child_exists("cat1")).unwrap());
    session.navigate_down("cat1").unwrap();
    assert!(session.with_tree(|tree, _, _| tree.child_exists("entry1")).unwrap());
    session.navigate_down("entry1").unwrap();
    assert!(session.with_tree(|tree, _, _| tree.child_exists("password")).unwrap());
    let comment = session
        .with_tree(|tree, _, _| tree.get_comment("password").map(|s| s.to_string()))
        .unwrap()
        .unwrap();
    assert_eq!(comment, "secret\nmore");
    assert_eq!(comment.lines().count(), 2);
    session.teardown();
}

/// S2 - CLI search, literal: the `github alice` -> `x` scenario from §8.
#[test]
fn s2_literal_search_finds_single_password() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.cpm");
    let crypto = NoCrypto;
    let compression = GzipCodec::new();
    let mut pw = StubPassphrase;

    let (mut session, _) =
        Session::open(&path, &crypto, &compression, false, true, "", false, false, &mut pw).unwrap();
    add_node(&mut session, "github").unwrap();
    session.navigate_down("github").unwrap();
    add_node(&mut session, "alice").unwrap();
    session.navigate_down("alice").unwrap();
    add_node(&mut session, "x").unwrap();
    session.navigate_up().unwrap();
    add_node(&mut session, "bob").unwrap();
    session.navigate_down("bob").unwrap();
    add_node(&mut session, "y").unwrap();

    let defaults = vec!["Service".to_string(), "Account".to_string(), "Password".to_string()];
    let pairs = vec![("<Service> <Account>".to_string(), "<Password>".to_string())];
    let outcome = run_cli_search(&session, &pairs, &defaults, "github alice", false, None).unwrap();
    assert_eq!(outcome.matches, vec!["x".to_string()]);
    assert_eq!(outcome.banner(), "1 match found.");
    session.teardown();
}

/// S3 - CLI search, regex + case-insensitive: `^GIT` over the same tree
/// matches both children's result patterns, sorted.
#[test]
fn s3_regex_case_insensitive_search_finds_both() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.cpm");
    let crypto = NoCrypto;
    let compression = GzipCodec::new();
    let mut pw = StubPassphrase;

    let (mut session, _) =
        Session::open(&path, &crypto, &compression, false, true, "", false, false, &mut pw).unwrap();
    add_node(&mut session, "github").unwrap();
    session.navigate_down("github").unwrap();
    add_node(&mut session, "alice").unwrap();
    session.navigate_down("alice").unwrap();
    add_node(&mut session, "x").unwrap();
    session.navigate_up().unwrap();
    add_node(&mut session, "bob").unwrap();
    session.navigate_down("bob").unwrap();
    add_node(&mut session, "y").unwrap();

    let defaults = vec!["Service".to_string(), "Account".to_string(), "Password".to_string()];
    let pairs = vec![("<Service> <Account>".to_string(), "<Password>".to_string())];
    let outcome = run_cli_search(&session, &pairs, &defaults, "^GIT", true, Some(false)).unwrap();
    assert_eq!(outcome.matches, vec!["x".to_string(), "y".to_string()]);
    assert_eq!(outcome.banner(), "2 matches found.");
    session.teardown();
}

/// S4 - lock contention: a second `Session::open` against a database
/// already locked by a live session is forced read-only rather than
/// erroring, when the caller doesn't ask to reclaim the lock.
#[test]
fn s4_lock_contention_forces_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.cpm");
    let crypto = NoCrypto;
    let compression = GzipCodec::new();
    let mut pw = StubPassphrase;

    let (first, _) =
        Session::open(&path, &crypto, &compression, false, true, "", false, false, &mut pw).unwrap();
    assert!(!first.read_only());

    let (second, report) =
        Session::open(&path, &crypto, &compression, false, true, "", false, false, &mut pw).unwrap();
    assert!(second.read_only());
    assert!(!report.forced_read_only); // forced by lock contention, not unresolvable recipients

    first.teardown();
    second.teardown();
}
