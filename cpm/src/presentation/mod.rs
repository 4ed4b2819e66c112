// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Presentation adapters
//!
//! Thin output formatters for the two modes C12 drives sessions through
//! (§4.12): `cli_output` renders `CliSearch`, `--security`, and
//! `--configtest` results to stdout; `tui` is a `ratatui`/`crossterm`
//! adapter for `TuiEdit` that owns no widget-layer logic of its own, only
//! the render loop and key-to-use-case dispatch.

pub mod cli_output;
pub mod tui;
