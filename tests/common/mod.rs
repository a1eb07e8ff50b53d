#![allow(dead_code)]

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use ipa_resign::{Invocation, ProcessOutput, ProcessRunner};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const SIGNER: &str = "Apple Distribution: Example Corp (ABCDE12345)";
pub const ALLOCATE: &str = "/Applications/Xcode.app/Contents/Developer/usr/bin/codesign_allocate";

/// Stands in for `xcrun` and `codesign`. The fake codesign drops a
/// `_CodeSignature/CodeResources` into the bundle it was pointed at.
#[derive(Default)]
pub struct FakeToolchain {
    pub codesign_fails: bool,
    pub calls: RefCell<Vec<Invocation>>,
}

impl ProcessRunner for FakeToolchain {
    fn run(&self, invocation: &Invocation) -> ipa_resign::Result<ProcessOutput> {
        self.calls.borrow_mut().push(invocation.clone());

        if invocation.program.ends_with("xcrun") {
            return Ok(ProcessOutput {
                success: true,
                stdout: format!("{ALLOCATE}\n"),
            });
        }

        if self.codesign_fails {
            return Ok(ProcessOutput::default());
        }

        let cwd = invocation.current_dir.clone().expect("codesign needs a cwd");
        let bundle = cwd.join(invocation.args.last().expect("codesign target"));
        let sig_dir = bundle.join("_CodeSignature");
        fs::create_dir_all(&sig_dir)?;
        fs::write(sig_dir.join("CodeResources"), b"<plist/>")?;
        Ok(ProcessOutput {
            success: true,
            stdout: format!("{}: replacing existing signature\n", bundle.display()),
        })
    }
}

pub fn write_ipa(path: &Path) {
    let mut zip = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();

    let mut info = plist::Dictionary::new();
    info.insert("CFBundleIdentifier".into(), "com.example.demo".into());
    info.insert("CFBundleExecutable".into(), "Demo".into());
    info.insert("CFBundleDisplayName".into(), "Demo".into());
    info.insert("CFBundleVersion".into(), "42".into());

    zip.add_directory("Payload/", options).unwrap();
    zip.add_directory("Payload/Demo.app/", options).unwrap();
    zip.start_file("Payload/Demo.app/Info.plist", options).unwrap();
    plist::to_writer_xml(&mut zip, &info).unwrap();
    zip.start_file("Payload/Demo.app/Demo", options.unix_permissions(0o755))
        .unwrap();
    zip.write_all(b"MACHO_PLACEHOLDER").unwrap();
    zip.start_file("Payload/Demo.app/embedded.mobileprovision", options)
        .unwrap();
    zip.write_all(b"old profile").unwrap();
    zip.finish().unwrap();
}

pub fn write_profile(path: &Path) -> Vec<u8> {
    let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, SIGNER);
    let key = rcgen::KeyPair::generate().unwrap();
    let der = params.self_signed(&key).unwrap().der().to_vec();

    let mut dict = plist::Dictionary::new();
    dict.insert("Name".into(), "Example Ad Hoc".into());
    dict.insert("TeamName".into(), "Example Corp".into());
    dict.insert(
        "DeveloperCertificates".into(),
        plist::Value::Array(vec![plist::Value::Data(der)]),
    );

    let mut data = b"0\x80\x06\x09*\x86H\x86\xf7\r\x01\x07\x02".to_vec();
    plist::to_writer_xml(&mut data, &dict).unwrap();
    data.extend_from_slice(b"\x00\x00");
    fs::write(path, &data).unwrap();
    data
}

pub fn read_entry(ipa: &Path, name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(File::open(ipa).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf).unwrap();
    buf
}

pub fn entry_names(ipa: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(File::open(ipa).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

pub struct Inputs {
    pub dir: tempfile::TempDir,
    pub ipa: PathBuf,
    pub profile: PathBuf,
    pub profile_bytes: Vec<u8>,
}

pub fn inputs() -> Inputs {
    let dir = tempfile::TempDir::new().unwrap();
    let ipa = dir.path().join("Demo.ipa");
    let profile = dir.path().join("adhoc.mobileprovision");
    write_ipa(&ipa);
    let profile_bytes = write_profile(&profile);
    Inputs {
        dir,
        ipa,
        profile,
        profile_bytes,
    }
}

impl Inputs {
    pub fn args(&self, extra: &[&str]) -> Vec<String> {
        let mut args = vec![
            self.ipa.to_string_lossy().into_owned(),
            self.profile.to_string_lossy().into_owned(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));
        args
    }
}
