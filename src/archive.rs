//! Zip archive helpers.
//!
//! Every function opens the archive, does its work, and drops the handle
//! before returning, so no archive stays open across calls. Failures become
//! `false`/`None`, except for `extract` on a file that is not a readable zip,
//! which returns `Error::InvalidArchive`.

use crate::config::DEFAULT_SKIP_NAMES;
use crate::error::{Error, Result};
use crate::tree::{self, FileTree, sorted_entries};
use anyhow::{Context, anyhow};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;
use zip::write::{SimpleFileOptions, ZipWriter};

type Archive = ZipArchive<BufReader<File>>;

/// Which entries `extract` writes out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selector {
    #[default]
    All,
    /// One entry addressed by its position in the archive.
    Index(usize),
    /// Entries addressed by their stored names.
    Names(Vec<String>),
}

/// Outcome of a full consistency check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ZipStatus {
    Ok,
    NotAZip,
    Inconsistent,
    ChecksumFailed,
    /// A failure outside the three recognized classes (missing file,
    /// unsupported feature, permission problem, ...).
    Unclassified(String),
}

impl ZipStatus {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            ZipStatus::NotAZip => Some("Not a zip archive"),
            ZipStatus::Inconsistent => Some("Consistency check failed"),
            ZipStatus::ChecksumFailed => Some("Checksum failed"),
            ZipStatus::Ok | ZipStatus::Unclassified(_) => None,
        }
    }
}

/// Zip `source` into `destination`, replacing any existing archive.
///
/// Directories named in `skip_names` (default `DEFAULT_SKIP_NAMES`) are not
/// descended into; only regular files are stored, under their path relative
/// to `source`. A single-file source is stored under its file name.
pub fn create(source: &Path, destination: &Path, skip_names: Option<&[String]>) -> bool {
    let defaults: Vec<String>;
    let skip = match skip_names {
        Some(names) => names,
        None => {
            defaults = DEFAULT_SKIP_NAMES.iter().map(|s| s.to_string()).collect();
            &defaults
        }
    };

    match write_archive(source, destination, skip) {
        Ok(count) => {
            debug!(
                source = %source.display(),
                destination = %destination.display(),
                entries = count,
                "archive created"
            );
            true
        }
        Err(err) => {
            debug!(destination = %destination.display(), error = %format!("{err:#}"), "archive creation failed");
            false
        }
    }
}

fn write_archive(source: &Path, destination: &Path, skip: &[String]) -> anyhow::Result<usize> {
    let files = collect_files(source, skip)?;

    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staging = NamedTempFile::new_in(parent)
        .with_context(|| format!("staging archive in {}", parent.display()))?;

    let mut writer = ZipWriter::new(staging);
    let options = SimpleFileOptions::default();
    for (path, name) in &files {
        writer
            .start_file(name.as_str(), options)
            .with_context(|| format!("adding {name}"))?;
        let mut input = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        io::copy(&mut input, &mut writer).with_context(|| format!("writing {name}"))?;
    }
    let staging = writer.finish().context("finishing archive")?;
    // Temp files are created owner-only; archives get the mode a plain
    // `File::create` would.
    apply_plain_file_mode(staging.as_file()).context("setting archive permissions")?;
    staging
        .persist(destination)
        .with_context(|| format!("persisting {}", destination.display()))?;
    Ok(files.len())
}

#[cfg(unix)]
fn apply_plain_file_mode(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    // The umask can only be read by replacing it.
    let mask = unsafe {
        let mask = libc::umask(0o022);
        libc::umask(mask);
        mask
    };
    file.set_permissions(fs::Permissions::from_mode(0o666 & !u32::from(mask)))
}

#[cfg(not(unix))]
fn apply_plain_file_mode(_file: &File) -> io::Result<()> {
    Ok(())
}

fn collect_files(source: &Path, skip: &[String]) -> anyhow::Result<Vec<(PathBuf, String)>> {
    let meta =
        fs::metadata(source).with_context(|| format!("inspecting {}", source.display()))?;
    if !meta.is_dir() {
        let name = source
            .file_name()
            .ok_or_else(|| anyhow!("{} has no file name", source.display()))?;
        return Ok(vec![(
            source.to_path_buf(),
            name.to_string_lossy().into_owned(),
        )]);
    }

    let mut files = Vec::new();
    walk(source, source, skip, &mut files)?;
    Ok(files)
}

fn walk(
    root: &Path,
    dir: &Path,
    skip: &[String],
    files: &mut Vec<(PathBuf, String)>,
) -> anyhow::Result<()> {
    let children =
        sorted_entries(dir).with_context(|| format!("reading {}", dir.display()))?;
    for child in children {
        let link_meta = fs::symlink_metadata(&child)
            .with_context(|| format!("inspecting {}", child.display()))?;
        if link_meta.is_dir() {
            let skipped = child
                .file_name()
                .map(|name| skip.iter().any(|s| name == s.as_str()))
                .unwrap_or(false);
            if !skipped {
                walk(root, &child, skip, files)?;
            }
            continue;
        }
        // Symlinked files are stored by content; broken links are ignored.
        if fs::metadata(&child).map(|m| m.is_file()).unwrap_or(false) {
            files.push((child.clone(), entry_name_for(root, &child)?));
        }
    }
    Ok(())
}

fn entry_name_for(root: &Path, path: &Path) -> anyhow::Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
    let segments: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(segments.join("/"))
}

/// Extract `archive` into `destination`.
///
/// Returns `Err` only when the archive cannot be opened. Selection problems
/// (index out of range, unknown name) and write failures yield `Ok(false)`.
pub fn extract(archive: &Path, destination: &Path, selector: &Selector) -> Result<bool> {
    extract_with(archive, destination, selector, &FileTree::default())
}

/// `extract`, forcing a read-only destination writable with `file_tree`'s mode.
pub fn extract_with(
    archive: &Path,
    destination: &Path,
    selector: &Selector,
    file_tree: &FileTree,
) -> Result<bool> {
    let mut zip = open(archive).map_err(|err| Error::InvalidArchive {
        path: archive.to_path_buf(),
        reason: err.to_string(),
    })?;

    if !prepare_destination(destination, file_tree) {
        return Ok(false);
    }

    let indices = match select_indices(&zip, selector) {
        Some(indices) => indices,
        None => {
            debug!(archive = %archive.display(), ?selector, "selection does not match archive entries");
            return Ok(false);
        }
    };

    let mut ok = true;
    for index in indices {
        if let Err(err) = extract_entry(&mut zip, index, destination) {
            debug!(archive = %archive.display(), index, error = %format!("{err:#}"), "entry extraction failed");
            ok = false;
        }
    }
    Ok(ok)
}

fn prepare_destination(destination: &Path, file_tree: &FileTree) -> bool {
    if !destination.exists() && fs::create_dir_all(destination).is_err() {
        return false;
    }
    let read_only = fs::metadata(destination)
        .map(|meta| meta.permissions().readonly())
        .unwrap_or(false);
    if read_only || !tree::is_writable(destination) {
        file_tree.set_writable(destination);
    }
    true
}

fn select_indices(zip: &Archive, selector: &Selector) -> Option<Vec<usize>> {
    match selector {
        Selector::All => Some((0..zip.len()).collect()),
        Selector::Index(index) => (*index < zip.len()).then(|| vec![*index]),
        Selector::Names(names) => {
            let stored = stored_names(zip);
            names
                .iter()
                .map(|name| stored.iter().position(|candidate| candidate == name))
                .collect()
        }
    }
}

fn extract_entry(zip: &mut Archive, index: usize, destination: &Path) -> anyhow::Result<()> {
    let mut entry = zip.by_index(index)?;
    let relative = entry
        .enclosed_name()
        .map(|path| path.to_path_buf())
        .ok_or_else(|| anyhow!("entry {} escapes the destination", entry.name()))?;
    let target = destination.join(relative);

    if entry.is_dir() {
        fs::create_dir_all(&target)?;
        return Ok(());
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut output =
        File::create(&target).with_context(|| format!("creating {}", target.display()))?;
    io::copy(&mut entry, &mut output)?;
    Ok(())
}

/// Open with a full consistency check and report `false` for archives that
/// are not zips, are inconsistent, or fail a checksum.
///
/// Any other failure, including a missing file, still reports `true`; use
/// `inspect` when those cases must be told apart.
pub fn is_valid(archive: &Path) -> bool {
    !matches!(
        inspect(archive),
        ZipStatus::NotAZip | ZipStatus::Inconsistent | ZipStatus::ChecksumFailed
    )
}

/// Open the archive and read every entry, verifying CRCs along the way.
pub fn inspect(archive: &Path) -> ZipStatus {
    let mut zip = match open(archive) {
        Ok(zip) => zip,
        Err(ZipError::InvalidArchive(_)) => return ZipStatus::NotAZip,
        Err(ZipError::Io(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
            return ZipStatus::NotAZip;
        }
        Err(other) => return ZipStatus::Unclassified(other.to_string()),
    };

    for index in 0..zip.len() {
        let mut entry = match zip.by_index(index) {
            Ok(entry) => entry,
            Err(ZipError::InvalidArchive(_)) | Err(ZipError::Io(_)) => {
                return ZipStatus::Inconsistent;
            }
            Err(other) => return ZipStatus::Unclassified(other.to_string()),
        };
        if let Err(err) = io::copy(&mut entry, &mut io::sink()) {
            return if err.to_string().to_ascii_lowercase().contains("checksum") {
                ZipStatus::ChecksumFailed
            } else {
                ZipStatus::Inconsistent
            };
        }
    }
    ZipStatus::Ok
}

/// Entry names in index order, or `None` when the archive cannot be opened.
pub fn list_entries(archive: &Path) -> Option<Vec<String>> {
    let zip = open(archive).ok()?;
    Some(stored_names(&zip))
}

/// Stored name of the entry at `index`.
pub fn entry_name(archive: &Path, index: usize) -> Option<String> {
    let zip = open(archive).ok()?;
    zip.name_for_index(index).map(str::to_string)
}

fn stored_names(zip: &Archive) -> Vec<String> {
    (0..zip.len())
        .filter_map(|index| zip.name_for_index(index).map(str::to_string))
        .collect()
}

fn open(path: &Path) -> std::result::Result<Archive, ZipError> {
    let file = File::open(path)?;
    ZipArchive::new(BufReader::new(file))
}
