use crate::error::{Result, ResignError};
use plist::Value;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const BUNDLE_IDENTIFIER_KEY: &str = "CFBundleIdentifier";

/// A top-level dictionary plist loaded from disk.
pub struct PlistFile {
    pub path: PathBuf,
    pub data: plist::Dictionary,
}

impl PlistFile {
    /// Reads XML or binary plists alike.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = Value::from_file(&path)?
            .into_dictionary()
            .ok_or_else(|| {
                ResignError::InvalidPlist(format!("{} is not a dictionary", path.display()))
            })?;
        Ok(Self { path, data })
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_string())
    }

    pub fn set_string(&mut self, key: &str, value: &str) {
        self.data.insert(key.to_string(), Value::String(value.to_string()));
    }

    /// Write back in binary form through a sibling temp file, so readers
    /// see either the old file or the new one.
    pub fn save_binary(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        plist::to_writer_binary(&mut tmp, &self.data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Set a string key in the plist at `path` and save it as binary.
pub fn replace_key<P: AsRef<Path>>(path: P, key: &str, value: &str) -> Result<()> {
    let mut plist = PlistFile::open(path)?;
    plist.set_string(key, value);
    plist.save_binary()
}

pub fn replace_bundle_identifier<P: AsRef<Path>>(path: P, bundle_id: &str) -> Result<()> {
    replace_key(path, BUNDLE_IDENTIFIER_KEY, bundle_id)
}
