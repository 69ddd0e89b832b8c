//! File and directory-tree helpers.
//!
//! Recursive operations are best-effort: they visit every entry even after a
//! failure and report a single aggregate flag. The same traversals are
//! available as `*_report` variants that keep one `EntryOutcome` per step, so
//! tests can see exactly which path failed.
//!
//! Symlinks are never followed. Copy recreates them with the same target and
//! delete unlinks the link itself.

use crate::config::{TreeSettings, WORLD_WRITABLE_MODE};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Step recorded by a recursive tree operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TreeAction {
    Inspect,
    ReadDir,
    CreateDir,
    CopyFile,
    CopySymlink,
    RemoveFile,
    RemoveDir,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryOutcome {
    pub path: PathBuf,
    pub action: TreeAction,
    pub error: Option<String>,
}

impl EntryOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-entry record of a recursive copy or delete.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeReport {
    entries: Vec<EntryOutcome>,
}

impl TreeReport {
    /// True when no recorded step failed.
    pub fn success(&self) -> bool {
        self.entries.iter().all(EntryOutcome::is_ok)
    }

    pub fn entries(&self) -> &[EntryOutcome] {
        &self.entries
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.entries.iter().filter(|entry| !entry.is_ok())
    }

    fn record(&mut self, path: &Path, action: TreeAction, result: io::Result<()>) -> bool {
        let error = result.err().map(|err| err.to_string());
        if let Some(err) = &error {
            debug!(path = %path.display(), ?action, error = %err, "tree step failed");
        }
        let ok = error.is_none();
        self.entries.push(EntryOutcome {
            path: path.to_path_buf(),
            action,
            error,
        });
        ok
    }

    fn fail(&mut self, path: &Path, action: TreeAction, message: &str) {
        self.record(path, action, Err(io::Error::other(message.to_string())));
    }
}

/// Tree operations bound to the mode used when forcing paths writable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileTree {
    writable_mode: u32,
}

impl Default for FileTree {
    fn default() -> Self {
        Self::new(WORLD_WRITABLE_MODE)
    }
}

impl FileTree {
    pub fn new(writable_mode: u32) -> Self {
        Self { writable_mode }
    }

    pub fn from_settings(settings: &TreeSettings) -> Self {
        Self::new(settings.writable_mode)
    }

    pub fn writable_mode(&self) -> u32 {
        self.writable_mode
    }

    /// Copy a file, symlink, or directory tree.
    pub fn copy(&self, from: &Path, to: &Path, overwrite: bool) -> bool {
        self.copy_report(from, to, overwrite).success()
    }

    pub fn copy_report(&self, from: &Path, to: &Path, overwrite: bool) -> TreeReport {
        let mut report = TreeReport::default();
        if lands_inside(from, to) {
            report.fail(to, TreeAction::CreateDir, "destination is inside the source tree");
            return report;
        }
        copy_into(from, to, overwrite, &mut report);
        report
    }

    /// Remove a directory and everything below it, children first.
    pub fn delete_directory(&self, path: &Path) -> bool {
        self.delete_report(path).success()
    }

    pub fn delete_report(&self, path: &Path) -> TreeReport {
        let mut report = TreeReport::default();
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => self.remove_tree(path, &mut report),
            Ok(_) => report.fail(path, TreeAction::Inspect, "not a directory"),
            Err(err) => {
                report.record(path, TreeAction::Inspect, Err(err));
            }
        }
        report
    }

    fn remove_tree(&self, dir: &Path, report: &mut TreeReport) {
        self.force_writable(dir);
        match sorted_entries(dir) {
            Ok(children) => {
                for child in children {
                    match fs::symlink_metadata(&child) {
                        Ok(meta) if meta.is_dir() => self.remove_tree(&child, report),
                        Ok(meta) => {
                            if !meta.file_type().is_symlink() {
                                self.force_writable(&child);
                            }
                            report.record(&child, TreeAction::RemoveFile, fs::remove_file(&child));
                        }
                        Err(err) => {
                            report.record(&child, TreeAction::Inspect, Err(err));
                        }
                    }
                }
            }
            Err(err) => {
                report.record(dir, TreeAction::ReadDir, Err(err));
            }
        }
        report.record(dir, TreeAction::RemoveDir, fs::remove_dir(dir));
    }

    /// Apply the writable mode to an existing path.
    pub fn set_writable(&self, path: &Path) -> bool {
        if !path.exists() {
            return false;
        }
        apply_writable_mode(path, self.writable_mode).is_ok()
    }

    fn force_writable(&self, path: &Path) {
        if let Err(err) = apply_writable_mode(path, self.writable_mode) {
            debug!(path = %path.display(), error = %err, "unable to force path writable");
        }
    }

    /// Create a directory with any missing parents; an existing path is
    /// forced writable instead.
    pub fn make_dir(&self, path: &Path) -> bool {
        if path.exists() {
            return self.set_writable(path);
        }
        fs::create_dir_all(path).is_ok()
    }

    /// Delete a file, symlink, or directory tree.
    pub fn delete(&self, path: &Path) -> bool {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => self.delete_directory(path),
            Ok(_) => fs::remove_file(path).is_ok(),
            Err(_) => false,
        }
    }
}

/// True when `from` is a directory and `to` sits at or below it.
fn lands_inside(from: &Path, to: &Path) -> bool {
    let is_dir = fs::symlink_metadata(from)
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return false;
    }
    match (fs::canonicalize(from), canonical_target(to)) {
        (Ok(source), Some(target)) => target.starts_with(source),
        _ => false,
    }
}

// `to` usually does not exist yet; resolve its parent instead.
fn canonical_target(to: &Path) -> Option<PathBuf> {
    if let Ok(path) = fs::canonicalize(to) {
        return Some(path);
    }
    let name = to.file_name()?;
    let parent = match to.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::canonicalize(parent).ok().map(|parent| parent.join(name))
}

fn copy_into(from: &Path, to: &Path, overwrite: bool, report: &mut TreeReport) {
    let meta = match fs::symlink_metadata(from) {
        Ok(meta) => meta,
        Err(err) => {
            report.record(from, TreeAction::Inspect, Err(err));
            return;
        }
    };

    let file_type = meta.file_type();
    if file_type.is_symlink() {
        let result = fs::read_link(from).and_then(|target| make_symlink(&target, to));
        report.record(to, TreeAction::CopySymlink, result);
        return;
    }

    if file_type.is_file() {
        if !overwrite && fs::symlink_metadata(to).is_ok() {
            report.fail(to, TreeAction::CopyFile, "destination exists");
            return;
        }
        report.record(to, TreeAction::CopyFile, fs::copy(from, to).map(|_| ()));
        return;
    }

    if !file_type.is_dir() {
        report.fail(from, TreeAction::Inspect, "unsupported file type");
        return;
    }

    if !to.is_dir() && !report.record(to, TreeAction::CreateDir, fs::create_dir(to)) {
        return;
    }

    match sorted_entries(from) {
        Ok(children) => {
            for child in children {
                if let Some(name) = child.file_name() {
                    copy_into(&child, &to.join(name), overwrite, report);
                }
            }
        }
        Err(err) => {
            report.record(from, TreeAction::ReadDir, Err(err));
        }
    }
}

pub(crate) fn sorted_entries(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    let resolved = match link.parent() {
        Some(parent) => parent.join(target),
        None => target.to_path_buf(),
    };
    if resolved.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

#[cfg(not(any(unix, windows)))]
fn make_symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

#[cfg(unix)]
fn apply_writable_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_writable_mode(path: &Path, _mode: u32) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(false);
    fs::set_permissions(path, perms)
}

/// Copy with the default writable mode.
pub fn copy(from: &Path, to: &Path, overwrite: bool) -> bool {
    FileTree::default().copy(from, to, overwrite)
}

pub fn delete_directory(path: &Path) -> bool {
    FileTree::default().delete_directory(path)
}

pub fn delete(path: &Path) -> bool {
    FileTree::default().delete(path)
}

pub fn set_writable(path: &Path) -> bool {
    FileTree::default().set_writable(path)
}

pub fn make_dir(path: &Path) -> bool {
    FileTree::default().make_dir(path)
}

/// True iff `path` is a readable directory with no entries.
pub fn is_empty(path: &Path) -> bool {
    match fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => false,
    }
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}

/// Whether the current process may write to `path`.
#[cfg(unix)]
pub fn is_writable(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
pub fn is_writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| !meta.permissions().readonly())
        .unwrap_or(false)
}

pub fn size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|meta| meta.len())
}

pub fn read(path: &Path) -> Option<Vec<u8>> {
    fs::read(path).ok()
}

pub fn read_to_string(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok()
}

pub fn write(path: &Path, data: impl AsRef<[u8]>) -> bool {
    fs::write(path, data).is_ok()
}

/// Sorted entry names of a directory, minus `skip`. Not a directory → empty.
pub fn scan_dir(path: &Path, skip: &[&str]) -> Vec<String> {
    let Ok(entries) = fs::read_dir(path) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !skip.contains(&name.as_str()))
        .collect();
    names.sort();
    names
}

/// Final path component, with `suffix` removed when the name ends with it.
pub fn base_name(path: &str, suffix: &str) -> String {
    let trimmed = path.trim_end_matches(['/', '\\']);
    let name = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    match name.strip_suffix(suffix) {
        Some(stripped) if !suffix.is_empty() && !stripped.is_empty() => stripped.to_string(),
        _ => name.to_string(),
    }
}

/// Extension without the dot; empty when there is none.
pub fn extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Load a JSON file, optionally substituting `{{ name }}` placeholders first.
///
/// Returns `None` when the file cannot be read. Content that does not decode
/// to an object or array yields an empty object.
pub fn read_json_file(path: &Path, vars: Option<&BTreeMap<String, String>>) -> Option<Value> {
    let mut text = read_to_string(path)?;
    if let Some(vars) = vars.filter(|vars| !vars.is_empty()) {
        text = render_template(&text, vars);
    }
    let value = match serde_json::from_str::<Value>(&text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => Value::Object(Default::default()),
    };
    Some(value)
}

/// Replace `{{ name }}` placeholders. Names are trimmed and lowercased before
/// lookup; unknown names render as empty strings.
pub fn render_template(text: &str, vars: &BTreeMap<String, String>) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            break;
        };
        output.push_str(&rest[..start]);
        let name = after_open[..end].trim().to_lowercase();
        if let Some(value) = vars.get(&name) {
            output.push_str(value);
        }
        rest = &after_open[end + 2..];
    }
    output.push_str(rest);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn render_template_substitutes_and_blanks_unknown_names() {
        let vars = BTreeMap::from([("name".to_string(), "blog".to_string())]);
        assert_eq!(
            render_template("ext={{ Name }}, v={{version}}", &vars),
            "ext=blog, v="
        );
        assert_eq!(render_template("open {{ name", &vars), "open {{ name");
    }

    #[test]
    fn base_name_strips_matching_suffix_only() {
        assert_eq!(base_name("/srv/app/archive.zip", ".zip"), "archive");
        assert_eq!(base_name("/srv/app/archive.zip", ".tar"), "archive.zip");
        assert_eq!(base_name("/srv/app/", ""), "app");
        assert_eq!(base_name(".zip", ".zip"), ".zip");
    }

    #[test]
    fn scan_dir_sorts_and_skips() {
        let dir = TempDir::new().unwrap();
        for name in ["b.txt", "a.txt", ".gitkeep"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        assert_eq!(
            scan_dir(dir.path(), &[".gitkeep"]),
            vec!["a.txt".to_string(), "b.txt".to_string()]
        );
        assert!(scan_dir(&dir.path().join("missing"), &[]).is_empty());
    }

    #[test]
    fn read_json_file_renders_vars_and_tolerates_scalars() {
        let dir = TempDir::new().unwrap();
        let object = dir.path().join("package.json");
        fs::write(&object, r#"{"title": "{{ title }}"}"#).unwrap();
        let vars = BTreeMap::from([("title".to_string(), "Shop".to_string())]);
        let value = read_json_file(&object, Some(&vars)).unwrap();
        assert_eq!(value["title"], "Shop");

        let scalar = dir.path().join("scalar.json");
        fs::write(&scalar, "42").unwrap();
        assert_eq!(
            read_json_file(&scalar, None).unwrap(),
            Value::Object(Default::default())
        );

        assert!(read_json_file(&dir.path().join("absent.json"), None).is_none());
    }

    #[test]
    fn is_empty_counts_dotfiles_and_rejects_missing_dirs() {
        let dir = TempDir::new().unwrap();
        assert!(is_empty(dir.path()));
        fs::write(dir.path().join(".hidden"), b"").unwrap();
        assert!(!is_empty(dir.path()));
        assert!(!is_empty(&dir.path().join("missing")));
    }

    #[test]
    fn copy_without_overwrite_leaves_existing_file() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("from.txt");
        let to = dir.path().join("to.txt");
        fs::write(&from, b"new").unwrap();
        fs::write(&to, b"old").unwrap();

        let report = FileTree::default().copy_report(&from, &to, false);
        assert!(!report.success());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(fs::read(&to).unwrap(), b"old");

        assert!(copy(&from, &to, true));
        assert_eq!(fs::read(&to).unwrap(), b"new");
    }

    #[test]
    fn copy_refuses_destination_inside_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a");
        fs::create_dir_all(source.join("sub")).unwrap();
        fs::write(source.join("file.txt"), b"x").unwrap();

        let report = FileTree::default().copy_report(&source, &source.join("sub/copy"), true);
        assert!(!report.success());
        assert_eq!(report.entries().len(), 1);
        assert!(!source.join("sub/copy").exists());

        assert!(!copy(&source, &source, true));
        assert_eq!(fs::read(source.join("file.txt")).unwrap(), b"x");
    }

    #[test]
    fn delete_directory_on_missing_path_fails() {
        let dir = TempDir::new().unwrap();
        let report = FileTree::default().delete_report(&dir.path().join("nope"));
        assert!(!report.success());
        assert_eq!(report.entries()[0].action, TreeAction::Inspect);
    }

    #[test]
    fn delete_dispatches_on_entry_type() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir_all(nested.join("inner")).unwrap();

        assert!(delete(&file));
        assert!(delete(&nested));
        assert!(!file.exists());
        assert!(!nested.exists());
        assert!(!delete(&file));
    }
}
