//! Platform-specific file system facilities.
//!
//! The hidden attribute only exists on Windows; everywhere else
//! [`hidden_attribute_setter`] hands out a no-op so callers never branch on
//! the platform themselves.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// Marks paths hidden at the OS level and reads that state back.
pub trait HiddenAttributeSetter: Send + Sync {
    /// Sets the hidden attribute on `path` itself (links are not followed).
    fn set_hidden(&self, path: &Path) -> io::Result<()>;

    /// Returns the hidden state of `path`, or `None` where the platform has no
    /// such attribute or it could not be read.
    fn is_hidden(&self, path: &Path) -> Option<bool>;
}

/// Does nothing; used on platforms without a hidden attribute.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHiddenAttribute;

impl HiddenAttributeSetter for NoopHiddenAttribute {
    fn set_hidden(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn is_hidden(&self, _path: &Path) -> Option<bool> {
        None
    }
}

/// Uses `SetFileAttributesW` / `FILE_ATTRIBUTE_HIDDEN`.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsHiddenAttribute;

#[cfg(windows)]
impl HiddenAttributeSetter for WindowsHiddenAttribute {
    fn set_hidden(&self, path: &Path) -> io::Result<()> {
        windows::set_hidden(path)
    }

    fn is_hidden(&self, path: &Path) -> Option<bool> {
        windows::is_hidden(path)
    }
}

/// Returns the hidden-attribute implementation for the running platform.
pub fn hidden_attribute_setter() -> Arc<dyn HiddenAttributeSetter> {
    #[cfg(windows)]
    {
        Arc::new(WindowsHiddenAttribute)
    }
    #[cfg(not(windows))]
    {
        Arc::new(NoopHiddenAttribute)
    }
}

/// Creates a symbolic link at `link` pointing to the directory `target`.
///
/// `target` is stored verbatim, so a relative target stays relative to the
/// link's parent directory.
pub fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_dir(target, link)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, link);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symbolic links are not supported on this platform",
        ))
    }
}

/// Recreates the symbolic link `src` at `dst`, keeping its target.
pub fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(&target, dst)
    }
    #[cfg(windows)]
    {
        if fs::metadata(src).map(|m| m.is_dir()).unwrap_or(false) {
            std::os::windows::fs::symlink_dir(&target, dst)
        } else {
            std::os::windows::fs::symlink_file(&target, dst)
        }
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (target, dst);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symbolic links are not supported on this platform",
        ))
    }
}

/// Deletes the symbolic link at `path` without touching its target.
pub fn remove_symlink(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        // Directory links on Windows are removed as directories.
        Err(_) if cfg!(windows) => fs::remove_dir(path),
        Err(e) => Err(e),
    }
}

/// Returns true if `path` itself is a symbolic link.
pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

#[cfg(windows)]
mod windows {
    use std::fs;
    use std::io;
    use std::iter;
    use std::os::windows::ffi::OsStrExt;
    use std::os::windows::fs::MetadataExt;
    use std::path::Path;
    use winapi::um::fileapi::SetFileAttributesW;
    use winapi::um::winnt::{
        FILE_ATTRIBUTE_ARCHIVE, FILE_ATTRIBUTE_HIDDEN, FILE_ATTRIBUTE_NOT_CONTENT_INDEXED,
        FILE_ATTRIBUTE_OFFLINE, FILE_ATTRIBUTE_READONLY, FILE_ATTRIBUTE_SYSTEM,
        FILE_ATTRIBUTE_TEMPORARY,
    };

    // Only these bits are accepted by SetFileAttributesW.
    const SETTABLE: u32 = FILE_ATTRIBUTE_ARCHIVE
        | FILE_ATTRIBUTE_HIDDEN
        | FILE_ATTRIBUTE_NOT_CONTENT_INDEXED
        | FILE_ATTRIBUTE_OFFLINE
        | FILE_ATTRIBUTE_READONLY
        | FILE_ATTRIBUTE_SYSTEM
        | FILE_ATTRIBUTE_TEMPORARY;

    pub fn set_hidden(path: &Path) -> io::Result<()> {
        let current = fs::symlink_metadata(path)?.file_attributes();
        let wide: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(iter::once(0))
            .collect();

        let ok = unsafe {
            SetFileAttributesW(wide.as_ptr(), (current & SETTABLE) | FILE_ATTRIBUTE_HIDDEN)
        };
        if ok == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    pub fn is_hidden(path: &Path) -> Option<bool> {
        fs::symlink_metadata(path)
            .ok()
            .map(|m| m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::HiddenAttributeSetter;
    use std::collections::HashSet;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Remembers which paths were marked hidden.
    #[derive(Default)]
    pub struct RecordingHidden {
        pub hidden: Mutex<HashSet<PathBuf>>,
    }

    impl HiddenAttributeSetter for RecordingHidden {
        fn set_hidden(&self, path: &Path) -> io::Result<()> {
            self.hidden.lock().unwrap().insert(path.to_path_buf());
            Ok(())
        }

        fn is_hidden(&self, path: &Path) -> Option<bool> {
            Some(self.hidden.lock().unwrap().contains(path))
        }
    }
}
