use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub fn corekit_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_corekit"))
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to run command: {:?}", cmd))?;
    if output.status.success() {
        Ok(output)
    } else {
        bail!(
            "command {:?} failed: status {:?}\nstdout: {}\nstderr: {}",
            cmd,
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    }
}

pub fn write_file(root: &Path, relative: &str, contents: &[u8]) -> Result<PathBuf> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, contents)?;
    Ok(path)
}

/// Small extension-like tree: nested sources, a VCS directory, a housekeeping
/// file, and a relative symlink.
pub fn build_fixture_tree(root: &Path) -> Result<()> {
    write_file(root, "extension.json", br#"{"name": "blog"}"#)?;
    write_file(root, "src/Models/Post.php", b"class Post {}")?;
    write_file(root, "src/Controllers/Posts.php", b"class Posts {}")?;
    write_file(root, "view/templates/.gitkeep", b"")?;
    write_file(root, ".git/HEAD", b"ref: refs/heads/main")?;
    write_file(root, ".git/objects/ab/cdef", b"blob")?;
    symlink("extension.json", root.join("manifest.json"))?;
    Ok(())
}

/// Regular files below `root`, keyed by `/`-separated relative path.
pub fn snapshot(root: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    collect(root, root, &mut files)?;
    Ok(files)
}

fn collect(root: &Path, dir: &Path, files: &mut BTreeMap<String, Vec<u8>>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let meta = fs::symlink_metadata(&path)?;
        if meta.is_dir() {
            collect(root, &path, files)?;
        } else if meta.is_file() {
            let relative = path
                .strip_prefix(root)?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(relative, fs::read(&path)?);
        }
    }
    Ok(())
}

pub fn dir_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<Vec<_>, _>>()?;
    names.sort();
    Ok(names)
}

/// Create a chain of nested directories under `root` whose full path is longer
/// than PATH_MAX. Built with `mkdirat`/`openat` so no single call sees the
/// long path; path-based calls on the deepest entries fail even for root.
pub fn build_overlong_chain(root: &Path, segment: &str) -> Result<()> {
    let name = CString::new("d".repeat(200))?;
    let top = CString::new(root.join(segment).as_os_str().as_bytes())?;
    fs::create_dir(root.join(segment))?;

    let mut fd = unsafe { libc::open(top.as_ptr(), libc::O_RDONLY | libc::O_DIRECTORY) };
    if fd < 0 {
        bail!("open {}: {}", root.join(segment).display(), io::Error::last_os_error());
    }
    for _ in 0..24 {
        let created = unsafe { libc::mkdirat(fd, name.as_ptr(), 0o755) };
        if created != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            bail!("mkdirat: {err}");
        }
        let next = unsafe { libc::openat(fd, name.as_ptr(), libc::O_RDONLY | libc::O_DIRECTORY) };
        unsafe { libc::close(fd) };
        if next < 0 {
            bail!("openat: {}", io::Error::last_os_error());
        }
        fd = next;
    }
    unsafe { libc::close(fd) };
    Ok(())
}
