//! Provisioning profile loading.
//!
//! A `.mobileprovision` file is a CMS-signed XML plist. The signer identity
//! is the subject common name of the first developer certificate listed in
//! that plist, e.g. `Apple Distribution: Example Corp (ABCDE12345)`.

use crate::error::{Result, ResignError};
use std::fs;
use std::path::{Path, PathBuf};
use x509_parser::prelude::*;

pub const EMBEDDED_PROFILE_NAME: &str = "embedded.mobileprovision";

#[derive(Debug, Clone)]
pub struct ProvisioningProfile {
    path: PathBuf,
    plist: plist::Dictionary,
    signer: String,
}

impl ProvisioningProfile {
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = fs::read(&path)?;
        let plist = parse_profile_plist(&data)?;

        let der = plist
            .get("DeveloperCertificates")
            .and_then(|v| v.as_array())
            .and_then(|certs| certs.first())
            .and_then(|cert| cert.as_data())
            .ok_or_else(|| {
                ResignError::InvalidProfile("No DeveloperCertificates in profile".into())
            })?;
        let signer = certificate_common_name(der)?;

        Ok(Self {
            path,
            plist,
            signer,
        })
    }

    /// Identity handed to `codesign -s`.
    pub fn code_signing_authority(&self) -> &str {
        &self.signer
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> Option<&str> {
        self.get_string("Name")
    }

    pub fn team_name(&self) -> Option<&str> {
        self.get_string("TeamName")
    }

    pub fn uuid(&self) -> Option<&str> {
        self.get_string("UUID")
    }

    fn get_string(&self, key: &str) -> Option<&str> {
        self.plist.get(key).and_then(|v| v.as_string())
    }
}

fn parse_profile_plist(data: &[u8]) -> Result<plist::Dictionary> {
    let plist_start = data
        .windows(5)
        .position(|w| w == b"<?xml")
        .ok_or_else(|| ResignError::InvalidProfile("No plist found in profile".into()))?;

    let plist_end = data[plist_start..]
        .windows(8)
        .position(|w| w == b"</plist>")
        .map(|p| plist_start + p + 8)
        .ok_or_else(|| ResignError::InvalidProfile("Invalid plist in profile".into()))?;

    plist::from_bytes(&data[plist_start..plist_end])
        .map_err(|e| ResignError::InvalidProfile(format!("Failed to parse plist: {}", e)))
}

fn certificate_common_name(der: &[u8]) -> Result<String> {
    let (_, cert) = X509Certificate::from_der(der).map_err(|e| {
        ResignError::InvalidProfile(format!("Failed to parse developer certificate: {}", e))
    })?;

    let common_name = cert
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .ok_or_else(|| {
            ResignError::InvalidProfile("Developer certificate has no common name".into())
        })?;

    Ok(common_name.to_string())
}
