// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Concrete backends behind the domain's ports (C2, C3), the on-disk XML
//! schema (C5), and the file-level store pipeline (C10).

pub mod compression_gzip;
pub mod crypto_sequoia;
pub mod store;
pub mod xml_store;

pub use compression_gzip::GzipCodec;
pub use crypto_sequoia::SequoiaCryptoEngine;
pub use store::{StoreError, StorePipeline};
pub use xml_store::{read_document, write_document, XmlError};
