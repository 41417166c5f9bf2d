//! File-system helpers shared by file, archive and clone strategies.
//!
//! Every write goes through a staging location on the destination's
//! filesystem and becomes visible with a rename, so an interrupted run never
//! leaves a half-written file or tree behind.
use anyhow::{Context as _, Result};
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Prefix for staging files and directories created beside a destination.
const STAGE_PREFIX: &str = ".devsetup-stage-";

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// Remove an existing file or symlink at `path`, including broken symlinks.
///
/// Does nothing if `path` does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_existing(path: &Path) -> Result<()> {
    if path.symlink_metadata().is_ok() {
        std::fs::remove_file(path)
            .with_context(|| format!("remove existing: {}", path.display()))?;
    }
    Ok(())
}

/// Recursively copy a directory tree.
///
/// When `skip_git` is `true`, `.git` directories are skipped. Symlinks in
/// the source tree are followed.
///
/// # Errors
///
/// Returns an error if the destination directory cannot be created, a source
/// entry cannot be read, or a file cannot be copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path, skip_git: bool) -> Result<()> {
    std::fs::create_dir_all(dst)
        .with_context(|| format!("creating directory {}", dst.display()))?;
    for entry in
        std::fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))?
    {
        let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            if skip_git && entry.file_name() == ".git" {
                continue;
            }
            copy_dir_recursive(&src_path, &dst_path, skip_git)?;
        } else {
            std::fs::copy(&src_path, &dst_path).with_context(|| {
                format!("copying {} to {}", src_path.display(), dst_path.display())
            })?;
        }
    }
    Ok(())
}

/// Atomically write `bytes` to `dest`, optionally setting a Unix mode.
///
/// # Errors
///
/// Returns an error if the staging file cannot be created, written, or
/// renamed into place.
pub fn write_atomic(dest: &Path, bytes: &[u8], mode: Option<u32>) -> Result<()> {
    ensure_parent_dir(dest)?;
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::Builder::new()
        .prefix(STAGE_PREFIX)
        .tempfile_in(parent)
        .with_context(|| format!("staging in {}", parent.display()))?;
    staged
        .write_all(bytes)
        .with_context(|| format!("writing staged copy of {}", dest.display()))?;
    #[cfg(unix)]
    if let Some(mode) = mode {
        use std::os::unix::fs::PermissionsExt as _;
        std::fs::set_permissions(staged.path(), std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("chmod {mode:o} staged {}", dest.display()))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    staged
        .persist(dest)
        .with_context(|| format!("moving staged file to {}", dest.display()))?;
    Ok(())
}

/// Build a directory tree in a staging location beside `dest`, then swap it
/// into place.
///
/// `fill` receives the (not yet existing) staging path and must create it.
/// A previous tree at `dest` is replaced; the staging directory is removed
/// whether or not `fill` succeeds.
///
/// # Errors
///
/// Returns an error if `fill` fails or the tree cannot be renamed into place.
pub fn replace_dir_atomic(dest: &Path, fill: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    ensure_parent_dir(dest)?;
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    let stage = tempfile::Builder::new()
        .prefix(STAGE_PREFIX)
        .tempdir_in(parent)
        .with_context(|| format!("staging in {}", parent.display()))?;
    let tree = stage.path().join("tree");
    fill(&tree)?;

    let old = stage.path().join("old");
    let had_previous = dest.symlink_metadata().is_ok();
    if had_previous {
        std::fs::rename(dest, &old)
            .with_context(|| format!("moving aside {}", dest.display()))?;
    }
    if let Err(e) = std::fs::rename(&tree, dest) {
        if had_previous {
            std::fs::rename(&old, dest).ok();
        }
        return Err(anyhow::Error::new(e).context(format!("moving tree to {}", dest.display())));
    }
    Ok(())
}

/// Whether two files have identical bytes. Missing files compare unequal.
#[must_use]
pub fn same_contents(a: &Path, b: &Path) -> bool {
    match (std::fs::read(a), std::fs::read(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

/// Whether the tree at `dst` holds the same files as `src` (ignoring `.git`
/// when `skip_git`). Extra files in `dst` make the trees differ.
///
/// # Errors
///
/// Returns an error if either tree cannot be listed.
pub fn trees_equal(src: &Path, dst: &Path, skip_git: bool) -> Result<bool> {
    let a = list_files(src, skip_git)?;
    let b = list_files(dst, skip_git)?;
    if a != b {
        return Ok(false);
    }
    Ok(a
        .iter()
        .all(|rel| same_contents(&src.join(rel), &dst.join(rel))))
}

fn list_files(root: &Path, skip_git: bool) -> Result<Vec<PathBuf>> {
    fn walk(root: &Path, dir: &Path, skip_git: bool, out: &mut Vec<PathBuf>) -> Result<()> {
        for entry in
            std::fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_dir() {
                if skip_git && path.file_name().is_some_and(|n| n == ".git") {
                    continue;
                }
                walk(root, &path, skip_git, out)?;
            } else if let Ok(rel) = path.strip_prefix(root) {
                out.push(rel.to_path_buf());
            }
        }
        Ok(())
    }
    let mut out = Vec::new();
    if root.is_dir() {
        walk(root, root, skip_git, &mut out)?;
    }
    out.sort();
    Ok(out)
}
