use crate::args::ResignRequest;
use crate::config::Toolchain;
use crate::error::{Result, ResignError};
use crate::ipa::{resigned_path_for, Archiver, Ipa, ZipArchiver};
use crate::plist_ext::replace_bundle_identifier;
use crate::process::{Invocation, ProcessRunner, SystemCommand};
use crate::profile::{ProvisioningProfile, EMBEDDED_PROFILE_NAME};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of a successful resign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resigned {
    pub app_name: String,
    pub output: PathBuf,
}

impl fmt::Display for Resigned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: replacing existing signature\n\nResigned ipa: {}\n",
            self.app_name,
            self.output.display()
        )
    }
}

/// Replaces the provisioning profile of an `.ipa`, optionally changes its
/// bundle identifier, re-signs the app with `codesign` and writes
/// `<name>_resigned.ipa` next to the input.
///
/// Steps run strictly in order and stop at the first failure. Nothing is
/// rolled back; the extracted copy is private scratch space, so the input
/// archive itself is never modified.
pub struct Resigner<R = SystemCommand, A = ZipArchiver> {
    toolchain: Toolchain,
    runner: R,
    archiver: A,
}

impl Resigner {
    pub fn new(toolchain: Toolchain, compression_level: u32) -> Self {
        Self::with_capabilities(toolchain, SystemCommand, ZipArchiver { compression_level })
    }
}

impl<R: ProcessRunner, A: Archiver> Resigner<R, A> {
    pub fn with_capabilities(toolchain: Toolchain, runner: R, archiver: A) -> Self {
        Self {
            toolchain,
            runner,
            archiver,
        }
    }

    /// Run on raw command arguments and render the result as a message.
    pub fn execute<S: AsRef<str>>(&self, arguments: &[S]) -> String {
        match self.run(arguments) {
            Ok(resigned) => resigned.to_string(),
            Err(e) => e.to_string(),
        }
    }

    pub fn run<S: AsRef<str>>(&self, arguments: &[S]) -> Result<Resigned> {
        let request = ResignRequest::parse(arguments)?;
        request.validate()?;

        let ipa = Ipa::load(&request.ipa_path)
            .map_err(|e| ResignError::ArchiveLoad(e.to_string()))?;
        let display_name = ipa.display_name();
        info!(
            app = %ipa.app_name(),
            display_name = display_name.as_deref().unwrap_or("-"),
            "loaded ipa"
        );

        self.resign(&ipa, &request.profile_path, request.bundle_identifier.as_deref())
    }

    pub fn resign(
        &self,
        ipa: &Ipa,
        profile_path: &Path,
        bundle_identifier: Option<&str>,
    ) -> Result<Resigned> {
        let allocate = self.find_codesign_allocate()?;
        info!(path = %allocate, "found codesign_allocate");

        let profile = ProvisioningProfile::load_from_path(profile_path).map_err(|e| {
            warn!(error = %e, "failed to load provisioning profile");
            ResignError::ProfileLoad(profile_path.to_path_buf())
        })?;
        info!(
            name = profile.name().unwrap_or("-"),
            team = profile.team_name().unwrap_or("-"),
            uuid = profile.uuid().unwrap_or("-"),
            path = %profile.path().display(),
            signer = %profile.code_signing_authority(),
            "loaded provisioning profile"
        );

        if let Some(bundle_id) = bundle_identifier {
            replace_bundle_identifier(ipa.info_plist_path(), bundle_id).map_err(|e| {
                warn!(error = %e, "failed to rewrite Info.plist");
                ResignError::BundleIdentifier
            })?;
            info!(bundle_id, "replaced bundle identifier");
        }

        let dest = copy_provisioning_profile(ipa, profile_path)?;
        info!(path = %dest.display(), "embedded provisioning profile");

        let app_name = ipa.app_name();
        self.codesign(ipa, &allocate, profile.code_signing_authority(), &app_name)?;

        let output = resigned_path_for(ipa.source());
        self.archiver
            .create_archive(ipa.root(), &output)
            .map_err(|e| {
                warn!(error = %e, output = %output.display(), "failed to write archive");
                ResignError::Archive
            })?;
        info!(output = %output.display(), "wrote resigned ipa");

        Ok(Resigned { app_name, output })
    }

    fn find_codesign_allocate(&self) -> Result<String> {
        let inv = Invocation::new(&self.toolchain.xcrun).args(["--find", "codesign_allocate"]);
        match self.runner.run(&inv) {
            Ok(out) if out.success && !out.stdout.trim().is_empty() => {
                Ok(out.stdout.trim().to_string())
            }
            Ok(_) => Err(ResignError::CodesignAllocateNotFound),
            Err(e) => {
                debug!(error = %e, xcrun = %self.toolchain.xcrun.display(), "xcrun did not run");
                Err(ResignError::CodesignAllocateNotFound)
            }
        }
    }

    fn codesign(&self, ipa: &Ipa, allocate: &str, signer: &str, app_name: &str) -> Result<()> {
        let inv = Invocation::new(&self.toolchain.codesign)
            .args(["-f", "-vv", "-s", signer, app_name])
            .env("CODESIGN_ALLOCATE", allocate)
            .env("EMBEDDED_PROFILE_NAME", EMBEDDED_PROFILE_NAME)
            .current_dir(ipa.payload_dir());

        match self.runner.run(&inv) {
            Ok(out) if out.success => {
                debug!(stdout = %out.stdout.trim(), "codesign finished");
                Ok(())
            }
            Ok(out) => {
                debug!(stdout = %out.stdout.trim(), "codesign reported failure");
                Err(ResignError::Codesign)
            }
            Err(e) => {
                debug!(error = %e, "codesign did not run");
                Err(ResignError::Codesign)
            }
        }
    }
}

/// Replace `embedded.mobileprovision` inside the app bundle.
fn copy_provisioning_profile(ipa: &Ipa, profile_path: &Path) -> Result<PathBuf> {
    let dest = ipa.app_path().join(EMBEDDED_PROFILE_NAME);
    let copy = || -> std::io::Result<()> {
        if fs::symlink_metadata(&dest).is_ok() {
            fs::remove_file(&dest)?;
        }
        fs::copy(profile_path, &dest)?;
        Ok(())
    };
    copy().map_err(|source| ResignError::CopyProfile {
        dest: dest.clone(),
        source,
    })?;
    Ok(dest)
}
