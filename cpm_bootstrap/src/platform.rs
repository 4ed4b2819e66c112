// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Platform abstraction
//!
//! The bootstrap layer sits outside the domain/application/infrastructure
//! layers and may call OS-specific APIs directly. This trait isolates that
//! to one module instead of scattering `#[cfg]` through the rest of the
//! crate. Unlike a file-processing pipeline, the store pipeline here is
//! entirely synchronous, so this trait has no async methods.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(unix)]
mod unix;

#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::UnixPlatform;

#[cfg(windows)]
pub use windows::WindowsPlatform;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not supported on this platform: {0}")]
    NotSupported(String),
}

/// OS-specific operations the security core and store pipeline need.
pub trait Platform: Send + Sync {
    /// Platform identifier: "linux", "macos", "windows", etc.
    fn platform_name(&self) -> &'static str;

    fn temp_dir(&self) -> PathBuf;

    /// `true` if running with elevated privileges (root / Administrator).
    /// The security core (§4.11) uses this to decide whether `mlockall`'s
    /// raise-the-limit path is available.
    fn is_elevated(&self) -> bool;

    /// Sets Unix permission bits; a no-op returning `Ok` on platforms
    /// without that model (e.g. Windows).
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<(), PlatformError>;
}

#[cfg(unix)]
type PlatformImpl = UnixPlatform;

#[cfg(windows)]
type PlatformImpl = WindowsPlatform;

pub fn create_platform() -> Box<dyn Platform> {
    Box::new(PlatformImpl::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_name_is_nonempty() {
        let platform = create_platform();
        assert!(!platform.platform_name().is_empty());
    }
}
