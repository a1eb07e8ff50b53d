use crate::error::{Result, ResignError};
use std::fs::File;
use std::path::{Path, PathBuf};

const RESIGN: &str = "resign";
const PROVISIONING_PROFILE: &str = "provisioning-profile";
const BUNDLE_IDENTIFIER: &str = "bundle-identifier";

/// Canonical form of a resign invocation: `<ipa> <profile> [<bundle id>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResignRequest {
    pub ipa_path: PathBuf,
    pub profile_path: PathBuf,
    pub bundle_identifier: Option<String>,
}

impl ResignRequest {
    /// Normalize raw command arguments, accepting the older keyword forms
    /// (`ipa provisioning-profile P [bundle-identifier B]`,
    /// `ipa bundle-identifier B provisioning-profile P`, `ipa P resign`).
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let tokens: Vec<&str> = args.iter().map(|s| s.as_ref()).collect();
        let mut tokens = tokens.into_iter();
        let ipa_path = tokens.next().ok_or(ResignError::ParameterCount)?;

        let mut profile: Option<&str> = None;
        let mut bundle_id: Option<&str> = None;

        while let Some(token) = tokens.next() {
            match token {
                RESIGN => continue,
                PROVISIONING_PROFILE | BUNDLE_IDENTIFIER => {
                    let value = tokens
                        .next()
                        .ok_or_else(|| ResignError::MissingKeywordValue(token.to_string()))?;
                    let slot = if token == PROVISIONING_PROFILE {
                        &mut profile
                    } else {
                        &mut bundle_id
                    };
                    if slot.replace(value).is_some() {
                        return Err(ResignError::ParameterCount);
                    }
                }
                value => {
                    if profile.is_none() {
                        profile = Some(value);
                    } else if bundle_id.is_none() {
                        bundle_id = Some(value);
                    } else {
                        return Err(ResignError::ParameterCount);
                    }
                }
            }
        }

        let profile = profile.ok_or(ResignError::ParameterCount)?;

        Ok(Self {
            ipa_path: PathBuf::from(ipa_path),
            profile_path: PathBuf::from(profile),
            bundle_identifier: bundle_id.map(str::to_string),
        })
    }

    /// Both input paths must name files this process can open.
    pub fn validate(&self) -> Result<()> {
        if !is_readable_file(&self.ipa_path) {
            return Err(ResignError::UnreadableArchive(self.ipa_path.clone()));
        }
        if !is_readable_file(&self.profile_path) {
            return Err(ResignError::UnreadableProfile(self.profile_path.clone()));
        }
        Ok(())
    }
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && File::open(path).is_ok()
}
