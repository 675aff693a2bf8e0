//! Filesystem helpers
//!
//! Thin compositions of engine primitives. Errors carry the action and the
//! path that failed; not-found on [`remove`] and any failure in [`exists`]
//! are the only errors swallowed.

use std::ffi::OsString;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use fsguard_core::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

fn utf8_lossy(path: &Path) -> Utf8PathBuf {
    Utf8PathBuf::from(path.to_string_lossy().into_owned())
}

/// Whether `path` exists; errors are reported as `false`
pub async fn exists(engine: &Engine, path: &Utf8Path) -> bool {
    match engine.try_exists(path).await {
        Ok(found) => found,
        Err(err) => {
            tracing::debug!(path = %path, error = %err, "existence check failed");
            false
        }
    }
}

/// Create `path` and any missing parents
pub async fn make_dir(engine: &Engine, path: &Utf8Path) -> Result<()> {
    engine
        .create_dir_all(path)
        .await
        .map_err(|e| Error::io("create directory", path, e))
}

/// Make sure a file exists at `path`, creating parents as needed
///
/// An existing file is left untouched.
pub async fn ensure_file(engine: &Engine, path: &Utf8Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        make_dir(engine, parent).await?;
    }
    // Appending nothing creates the file without truncating it
    engine
        .append(path, b"")
        .await
        .map_err(|e| Error::io("create file", path, e))
}

/// Read a UTF-8 file
pub async fn read(engine: &Engine, path: &Utf8Path) -> Result<String> {
    engine
        .read_to_string(path)
        .await
        .map_err(|e| Error::io("read", path, e))
}

/// Read and deserialize a JSON file
pub async fn read_json<T: DeserializeOwned>(engine: &Engine, path: &Utf8Path) -> Result<T> {
    let content = read(engine, path).await?;
    serde_json::from_str(&content).map_err(|e| Error::json(path, e))
}

/// Write `content` to `path`, replacing the file
pub async fn write(engine: &Engine, path: &Utf8Path, content: impl AsRef<[u8]>) -> Result<()> {
    engine
        .write(path, content)
        .await
        .map_err(|e| Error::io("write", path, e))
}

/// Serialize `value` as pretty-printed JSON and write it to `path`
pub async fn write_json<T: Serialize + ?Sized>(
    engine: &Engine,
    path: &Utf8Path,
    value: &T,
) -> Result<()> {
    let content = serde_json::to_string_pretty(value).map_err(|e| Error::json(path, e))?;
    write(engine, path, content).await
}

/// Remove a file or a whole directory tree
///
/// A path that is already gone counts as removed.
pub async fn remove(engine: &Engine, path: &Utf8Path) -> Result<()> {
    let metadata = match engine.symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::io("remove", path, e)),
    };

    let removed = if metadata.is_dir() {
        engine.remove_dir_all(path).await
    } else {
        engine.remove_file(path).await
    };

    match removed {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io("remove", path, e)),
    }
}

/// Copy a file, a symlink, or a directory tree, from `src` to `dest`
///
/// Directories are walked with an explicit stack, so deep trees cannot
/// overflow the call stack. Symlinks are recreated with the same target and
/// never followed. Copying a path onto itself, or a directory into its own
/// subtree, fails with `InvalidInput` before anything is written.
/// Returns the number of files and links copied.
pub async fn copy(engine: &Engine, src: &Utf8Path, dest: &Utf8Path) -> Result<u64> {
    let root = engine
        .symlink_metadata(src)
        .await
        .map_err(|e| Error::io("copy", src, e))?;
    check_destination(engine, src, dest, &root).await?;

    let mut pending: Vec<(PathBuf, PathBuf)> =
        vec![(src.as_std_path().to_path_buf(), dest.as_std_path().to_path_buf())];
    let mut copied = 0;

    while let Some((from, to)) = pending.pop() {
        let metadata = engine
            .symlink_metadata(&from)
            .await
            .map_err(|e| Error::io("copy", utf8_lossy(&from), e))?;

        if metadata.is_symlink() {
            let target = engine
                .read_link(&from)
                .await
                .map_err(|e| Error::io("read link", utf8_lossy(&from), e))?;
            engine
                .symlink(&target, &to)
                .await
                .map_err(|e| Error::io("create link", utf8_lossy(&to), e))?;
            copied += 1;
            continue;
        }

        if !metadata.is_dir() {
            engine
                .copy(&from, &to)
                .await
                .map_err(|e| Error::io("copy", utf8_lossy(&from), e))?;
            copied += 1;
            continue;
        }

        engine
            .create_dir_all(&to)
            .await
            .map_err(|e| Error::io("create directory", utf8_lossy(&to), e))?;

        let entries = engine
            .read_dir(&from)
            .await
            .map_err(|e| Error::io("list", utf8_lossy(&from), e))?;
        for entry in entries.into_iter().rev() {
            let Some(name) = entry.file_name() else {
                continue;
            };
            let target = to.join(name);
            pending.push((entry, target));
        }
    }

    tracing::debug!(src = %src, dest = %dest, files = copied, "copy finished");
    Ok(copied)
}

/// Reject a `dest` that is `src` itself or, for a directory, lies inside it
async fn check_destination(
    engine: &Engine,
    src: &Utf8Path,
    dest: &Utf8Path,
    src_metadata: &Metadata,
) -> Result<()> {
    // A symlink source is copied as a link, so only its own location matters
    let src_real = match (src_metadata.is_symlink(), src.parent(), src.file_name()) {
        (true, Some(parent), Some(name)) => real_path(engine, parent.as_std_path())
            .await
            .map(|parent| parent.join(name)),
        _ => engine.canonicalize(src).await,
    }
    .map_err(|e| Error::io("copy", src, e))?;
    let dest_real = real_path(engine, dest.as_std_path())
        .await
        .map_err(|e| Error::io("copy", dest, e))?;

    let clash = if src_metadata.is_dir() {
        dest_real.starts_with(&src_real)
    } else {
        dest_real == src_real
    };
    if clash {
        return Err(Error::io(
            "copy",
            dest,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot copy {src} into itself"),
            ),
        ));
    }
    Ok(())
}

/// Canonical form of `path`, which need not exist yet
///
/// The longest existing ancestor is canonicalized and the missing
/// components are appended to it unchanged.
async fn real_path(engine: &Engine, path: &Path) -> io::Result<PathBuf> {
    let mut missing = Vec::new();
    let mut current = path;

    loop {
        let lookup = if current.as_os_str().is_empty() {
            Path::new(".")
        } else {
            current
        };
        let err = match engine.canonicalize(lookup).await {
            Ok(real) => {
                return Ok(missing
                    .iter()
                    .rev()
                    .fold(real, |real: PathBuf, name: &OsString| real.join(name)));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => err,
            Err(err) => return Err(err),
        };

        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return Err(err),
        }
    }
}

/// Move `src` to `dest`, creating the destination's parent first
pub async fn move_path(engine: &Engine, src: &Utf8Path, dest: &Utf8Path) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_str().is_empty()) {
        make_dir(engine, parent).await?;
    }
    engine
        .rename(src, dest)
        .await
        .map_err(|e| Error::io("move", src, e))
}
