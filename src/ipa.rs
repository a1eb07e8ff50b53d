use crate::config::DEFAULT_COMPRESSION_LEVEL;
use crate::error::{Result, ResignError};
use crate::plist_ext::PlistFile;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

pub const PAYLOAD_DIR: &str = "Payload";
pub const INFO_PLIST: &str = "Info.plist";

/// An `.ipa` unpacked into a private scratch directory.
///
/// The scratch directory is removed when the `Ipa` is dropped.
pub struct Ipa {
    source: PathBuf,
    root: TempDir,
    app_path: PathBuf,
}

impl Ipa {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = path.as_ref().to_path_buf();
        let root = TempDir::new()?;
        let app_path = extract_ipa(&source, root.path())?;
        Ok(Self {
            source,
            root,
            app_path,
        })
    }

    /// Path of the archive this was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Extraction root; contains `Payload/` and any sibling folders.
    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// The `Payload/<Name>.app` bundle directory.
    pub fn app_path(&self) -> &Path {
        &self.app_path
    }

    /// The directory holding the app bundle.
    pub fn payload_dir(&self) -> &Path {
        self.app_path.parent().unwrap_or_else(|| self.root.path())
    }

    /// Bundle directory name, e.g. `Demo.app`.
    pub fn app_name(&self) -> String {
        self.app_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn info_plist_path(&self) -> PathBuf {
        self.app_path.join(INFO_PLIST)
    }

    /// `CFBundleDisplayName`, falling back to `CFBundleName`.
    pub fn display_name(&self) -> Option<String> {
        let plist = PlistFile::open(self.info_plist_path()).ok()?;
        plist
            .get_string("CFBundleDisplayName")
            .or_else(|| plist.get_string("CFBundleName"))
            .map(str::to_string)
    }
}

pub fn extract_ipa<P: AsRef<Path>, Q: AsRef<Path>>(ipa_path: P, dest: Q) -> Result<PathBuf> {
    let ipa_path = ipa_path.as_ref();
    let dest = dest.as_ref();

    let file = File::open(ipa_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    // Check for valid IPA structure
    let has_payload = archive
        .file_names()
        .any(|name| name.starts_with("Payload/"));
    if !has_payload {
        return Err(ResignError::InvalidIpa(
            "No Payload folder found".to_string(),
        ));
    }

    let has_info_plist = archive
        .file_names()
        .any(|name| name.ends_with(".app/Info.plist"));
    if !has_info_plist {
        return Err(ResignError::InvalidIpa(
            "No Info.plist found, invalid app".to_string(),
        ));
    }

    // Symlinks are created last so no entry is ever written through one.
    let mut symlinks: Vec<(PathBuf, String)> = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.enclosed_name().ok_or_else(|| {
            ResignError::InvalidIpa(format!("Entry escapes archive root: {}", file.name()))
        })?;
        let outpath = dest.join(&name);

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(p) = outpath.parent() {
            if !p.exists() {
                fs::create_dir_all(p)?;
            }
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = file.unix_mode();
            if mode.map(|m| m & 0o170000 == 0o120000).unwrap_or(false) {
                let mut target = String::new();
                file.read_to_string(&mut target)?;
                symlinks.push((name, target));
                continue;
            }

            let mut outfile = File::create(&outpath)?;
            std::io::copy(&mut file, &mut outfile)?;
            if let Some(mode) = mode {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }

        #[cfg(not(unix))]
        {
            let mut outfile = File::create(&outpath)?;
            std::io::copy(&mut file, &mut outfile)?;
        }
    }

    for (name, target) in symlinks {
        if !link_stays_inside(&name, Path::new(&target)) {
            return Err(ResignError::InvalidIpa(format!(
                "Symlink escapes archive root: {} -> {}",
                name.display(),
                target
            )));
        }
        if has_symlink_ancestor(dest, &name) {
            return Err(ResignError::InvalidIpa(format!(
                "Entry nested under a symlink: {}",
                name.display()
            )));
        }

        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, dest.join(&name))?;
    }

    find_app_in_payload(&dest.join(PAYLOAD_DIR))
}

/// Whether `target`, resolved from the directory holding the link `name`,
/// stays under the extraction root. Both are relative to that root.
fn link_stays_inside(name: &Path, target: &Path) -> bool {
    let mut depth = name.components().count().saturating_sub(1);
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

fn has_symlink_ancestor(root: &Path, name: &Path) -> bool {
    let mut current = root.to_path_buf();
    let parents = name.parent().map(|p| p.components().count()).unwrap_or(0);
    name.components().take(parents).any(|component| {
        current.push(component);
        fs::symlink_metadata(&current)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    })
}

fn find_app_in_payload(payload: &Path) -> Result<PathBuf> {
    let pattern = format!("{}/*.app", glob::Pattern::escape(&payload.to_string_lossy()));
    glob::glob(&pattern)?
        .flatten()
        .find(|path| path.is_dir())
        .ok_or_else(|| ResignError::InvalidIpa("No .app folder found".to_string()))
}

/// `<dir>/<stem>_resigned.ipa` for an input archive path.
pub fn resigned_path_for<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let mut name = path.file_stem().map(OsString::from).unwrap_or_default();
    name.push("_resigned.ipa");
    path.with_file_name(name)
}

/// Packs a directory tree into a single output archive.
pub trait Archiver {
    fn create_archive(&self, source_dir: &Path, output: &Path) -> Result<()>;
}

impl<T: Archiver + ?Sized> Archiver for &T {
    fn create_archive(&self, source_dir: &Path, output: &Path) -> Result<()> {
        (**self).create_archive(source_dir, output)
    }
}

/// Writes `.ipa` files with the `zip` crate.
#[derive(Debug, Clone, Copy)]
pub struct ZipArchiver {
    pub compression_level: u32,
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl Archiver for ZipArchiver {
    fn create_archive(&self, source_dir: &Path, output: &Path) -> Result<()> {
        create_ipa(source_dir, output, self.compression_level)
    }
}

pub fn create_ipa<P: AsRef<Path>, Q: AsRef<Path>>(
    root: P,
    output: Q,
    compression_level: u32,
) -> Result<()> {
    let root = root.as_ref();
    let output = output.as_ref();

    let file = File::create(output)?;
    let mut zip = zip::ZipWriter::new(file);

    let options = match compression_level {
        0 => SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
        level => SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(level.min(9) as i64)),
    };

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();
        let name = match path.strip_prefix(root) {
            Ok(name) => name,
            Err(_) => continue,
        };

        let name_str = name.to_string_lossy().replace('\\', "/");
        let file_type = entry.file_type();

        if file_type.is_dir() {
            zip.add_directory(format!("{}/", name_str), options)?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(path)?;
            zip.add_symlink(name_str, target.to_string_lossy().into_owned(), options)?;
        } else {
            #[cfg(unix)]
            let options = {
                use std::os::unix::fs::PermissionsExt;
                options.unix_permissions(entry.metadata()?.permissions().mode())
            };

            zip.start_file(name_str, options)?;
            let mut f = File::open(path)?;
            let mut buffer = Vec::new();
            f.read_to_end(&mut buffer)?;
            zip.write_all(&buffer)?;
        }
    }

    zip.finish()?;

    Ok(())
}
