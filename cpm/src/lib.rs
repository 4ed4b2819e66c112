// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # cpm
//!
//! The application, infrastructure, and presentation layers of the
//! encrypted-store password manager. `cpm_domain` owns the tree model,
//! pattern engine, and key ring; this crate wires concrete backends
//! (OpenPGP, gzip, XML, the filesystem) behind the domain's ports and
//! drives the session lifecycle described in spec §4.12.
//!
//! ## Module structure
//!
//! - [`infrastructure`] — `CryptoEngine`/`CompressionCodec` adapters (C2,
//!   C3), the XML serialiser (C5), and the store pipeline (C10).
//! - [`application`] — the session controller (C12) and its use cases.
//! - [`presentation`] — CLI output formatting and the TUI thin adapter.

pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use application::session::{Session, SessionError};
pub use infrastructure::store::{StoreError, StorePipeline};
