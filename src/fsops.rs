//! Small file system helpers shared by the batch operations.

use crate::error::{Error, Result};
use crate::platform;
use std::fs::{self, FileType};
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// An immediate child of a directory.
#[derive(Debug, Clone)]
pub struct DirItem {
    pub name: String,
    pub path: PathBuf,
    pub file_type: FileType,
}

impl DirItem {
    /// True for real directories; symbolic links are never reported as directories.
    pub fn is_dir(&self) -> bool {
        self.file_type.is_dir()
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type.is_symlink()
    }
}

/// Checks that `root` was given and is an existing directory.
pub fn validate_root(root: &Path) -> Result<()> {
    if root.as_os_str().is_empty() {
        return Err(Error::RootNotSelected);
    }
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::InvalidRoot {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        }),
        Err(e) => Err(Error::InvalidRoot {
            path: root.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Lists the immediate children of `dir`, sorted by name.
///
/// Entries whose name is not valid UTF-8 or whose type cannot be read are
/// left out.
pub fn list_dir(dir: &Path) -> Result<Vec<DirItem>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::read_dir(dir, e))?;

    let mut items: Vec<DirItem> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            let file_type = entry.file_type().ok()?;
            Some(DirItem {
                name,
                path: entry.path(),
                file_type,
            })
        })
        .collect();

    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}

/// True if `name` is exactly one normal, non-hidden path component.
pub fn is_plain_name(name: &str) -> bool {
    if name.starts_with('.') || name.contains('/') || name.contains('\\') {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// True if anything (including a dangling link) exists at `path`.
pub fn path_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Returns `dir/name`, or `dir/name_1`, `dir/name_2`, ... for the smallest
/// suffix for which `is_taken` returns false.
pub fn first_free_path(dir: &Path, name: &str, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    let candidate = dir.join(name);
    if !is_taken(&candidate) {
        return candidate;
    }

    let mut counter = 1usize;
    loop {
        let candidate = dir.join(format!("{}_{}", name, counter));
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Copies a file, a symbolic link, or a whole directory tree from `src` to `dst`.
///
/// Directory trees are walked without following links; links are recreated.
pub fn copy_entry(src: &Path, dst: &Path) -> Result<()> {
    let copy_err = |source: io::Error| Error::Copy {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source,
    };

    let meta = fs::symlink_metadata(src).map_err(copy_err)?;
    if meta.file_type().is_symlink() {
        return platform::copy_symlink(src, dst).map_err(copy_err);
    }
    if meta.is_file() {
        fs::copy(src, dst).map_err(copy_err)?;
        return Ok(());
    }

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| copy_err(io::Error::other(e.to_string())))?;
        let rel_path = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| copy_err(io::Error::other(e.to_string())))?;
        let new_path = dst.join(rel_path);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&new_path).map_err(copy_err)?;
        } else if file_type.is_symlink() {
            platform::copy_symlink(entry.path(), &new_path).map_err(copy_err)?;
        } else {
            fs::copy(entry.path(), &new_path).map_err(copy_err)?;
        }
    }

    Ok(())
}

/// Deletes a file, a symbolic link, or a whole directory tree.
pub fn remove_entry(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| Error::remove(path, e))?;
    let result = if meta.file_type().is_symlink() {
        platform::remove_symlink(path)
    } else if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| Error::remove(path, e))
}

/// True if `dir` exists and has no entries.
pub fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
