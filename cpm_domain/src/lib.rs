// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # cpm domain
//!
//! The hierarchical secrets model and the pure business logic that operates
//! on it: documents, nodes, editors, templates, the tree cursor, the
//! pattern engine, the search driver, and the key-ring manager. Nothing in
//! this crate talks to a file, a PGP backend, a terminal, or a clock other
//! than through the `chrono::DateTime<Utc>` values its callers supply.
//!
//! ## Module structure
//!
//! - [`model`] — `Document`, `Node`, `Editor`/`EditorTable`, `Template`/`TemplateRegistry`.
//! - [`tree`] — the path-cursor navigator and mutator over a `Document`.
//! - [`pattern`] — compiles pattern strings into literal/template-reference segments.
//! - [`search`] — depth-first pattern matching over a document.
//! - [`keyring`] — the ordered set of encryption recipients.
//! - [`services`] — the `CryptoEngine` and `CompressionCodec` ports infrastructure implements.
//! - [`error`] — the domain-wide [`CpmError`].

pub mod error;
pub mod keyring;
pub mod model;
pub mod pattern;
pub mod search;
pub mod services;
pub mod tree;

pub use error::CpmError;
pub use keyring::KeyRing;
pub use model::{Document, Editor, EditorTable, Node, Template, TemplateRegistry, TemplateStatus, Version};
pub use pattern::{compile as compile_pattern, CompiledPattern, PatternError, Segment};
pub use search::{search as run_search, MatchMode, SearchQuery};
pub use tree::Tree;
