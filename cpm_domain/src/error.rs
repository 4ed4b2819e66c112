// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain-level error type.
//!
//! Infrastructure errors (I/O, crypto backend failures, XML parsing) are
//! wrapped into one of these variants at the port boundary so that domain
//! logic never depends on a specific backend's error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CpmError {
    #[error("sibling label {label:?} already exists under {parent:?}")]
    DuplicateLabel { parent: String, label: String },

    #[error("node {0:?} not found")]
    NodeNotFound(String),

    #[error("path {0:?} does not resolve to an existing node")]
    PathNotFound(Vec<String>),

    #[error("cannot navigate above the root")]
    AtRoot,

    #[error("pattern error: {0}")]
    Pattern(#[from] crate::pattern::PatternError),

    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("xml error: {0}")]
    Xml(String),

    #[error("policy error: {0}")]
    Policy(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
