use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResignError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Plist error: {0}")]
    Plist(#[from] plist::Error),

    #[error("Invalid plist: {0}")]
    InvalidPlist(String),

    #[error("WalkDir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Error: Need parameters for ipa path and new provisioning profile")]
    ParameterCount,

    #[error("Error: Missing value after `{0}` parameter")]
    MissingKeywordValue(String),

    #[error("Error: First parameter must be path of ipa file")]
    UnreadableArchive(PathBuf),

    #[error("Error: Second parameter must be path of provisioning profile")]
    UnreadableProfile(PathBuf),

    #[error("Invalid IPA: {0}")]
    InvalidIpa(String),

    #[error("Error: {}", nil_if_empty(.0))]
    ArchiveLoad(String),

    #[error("Invalid provisioning profile: {0}")]
    InvalidProfile(String),

    #[error("Error: could not load provisioning profile from path {}", .0.display())]
    ProfileLoad(PathBuf),

    #[error("Could not find codesign_allocate")]
    CodesignAllocateNotFound,

    #[error("Error: failed to replace bundle identifier in Info.plist")]
    BundleIdentifier,

    #[error("Error: failed to copy provisioning profile to {}: {source}", .dest.display())]
    CopyProfile {
        dest: PathBuf,
        source: std::io::Error,
    },

    #[error("Execution of codesign failed")]
    Codesign,

    #[error("Failed to create resigned IPA archive")]
    Archive,
}

fn nil_if_empty(reason: &str) -> &str {
    if reason.is_empty() {
        "(nil)"
    } else {
        reason
    }
}

pub type Result<T> = std::result::Result<T, ResignError>;
