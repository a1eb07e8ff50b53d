pub mod args;
pub mod config;
pub mod error;
pub mod ipa;
pub mod plist_ext;
pub mod process;
pub mod profile;
pub mod resign;

pub use args::ResignRequest;
pub use config::Toolchain;
pub use error::{Result, ResignError};
pub use ipa::{create_ipa, extract_ipa, resigned_path_for, Archiver, Ipa, ZipArchiver};
pub use plist_ext::PlistFile;
pub use process::{Invocation, ProcessOutput, ProcessRunner, SystemCommand};
pub use profile::ProvisioningProfile;
pub use resign::{Resigned, Resigner};
