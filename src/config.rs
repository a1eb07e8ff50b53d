use std::path::PathBuf;

pub const DEFAULT_XCRUN: &str = "/usr/bin/xcrun";
pub const DEFAULT_CODESIGN: &str = "/usr/bin/codesign";
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Locations of the platform tools the resign flow shells out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Used as `xcrun --find codesign_allocate`.
    pub xcrun: PathBuf,
    pub codesign: PathBuf,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            xcrun: PathBuf::from(DEFAULT_XCRUN),
            codesign: PathBuf::from(DEFAULT_CODESIGN),
        }
    }
}
