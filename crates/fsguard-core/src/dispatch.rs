//! Filesystem primitives routed through the engine
//!
//! [`Primitive`] is the registry: every supported call appears in it exactly
//! once together with the executor it runs on. Each primitive has a matching
//! method on [`Engine`] that binds the native call (`tokio::fs` for managed
//! primitives, `std::fs` for blocking ones) and hands it to that executor.
//! Adding a primitive means adding a variant and its method; the exhaustive
//! matches below refuse to compile until the new variant is classified.

use std::fmt;
use std::fs::{Metadata, Permissions};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use tokio::io::AsyncWriteExt;

use crate::admission::PendingResult;
use crate::engine::Engine;

/// Which executor a primitive runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorKind {
    /// Runs on the calling thread; backoff blocks the thread
    Blocking,
    /// Submitted to the admission controller; backoff suspends the task
    Managed,
}

/// Every filesystem primitive the engine exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Open,
    Create,
    Read,
    ReadToString,
    Write,
    Append,
    CreateDir,
    CreateDirAll,
    ReadDir,
    Metadata,
    SymlinkMetadata,
    ReadLink,
    Symlink,
    SetPermissions,
    Rename,
    RemoveFile,
    RemoveDir,
    RemoveDirAll,
    Copy,
    Canonicalize,
    TryExists,
    OpenSync,
    ReadSync,
    ReadToStringSync,
    WriteSync,
    CreateDirAllSync,
    MetadataSync,
    RenameSync,
    RemoveFileSync,
    CopySync,
    TryExistsSync,
}

impl Primitive {
    /// The full registry
    pub const ALL: [Primitive; 31] = [
        Primitive::Open,
        Primitive::Create,
        Primitive::Read,
        Primitive::ReadToString,
        Primitive::Write,
        Primitive::Append,
        Primitive::CreateDir,
        Primitive::CreateDirAll,
        Primitive::ReadDir,
        Primitive::Metadata,
        Primitive::SymlinkMetadata,
        Primitive::ReadLink,
        Primitive::Symlink,
        Primitive::SetPermissions,
        Primitive::Rename,
        Primitive::RemoveFile,
        Primitive::RemoveDir,
        Primitive::RemoveDirAll,
        Primitive::Copy,
        Primitive::Canonicalize,
        Primitive::TryExists,
        Primitive::OpenSync,
        Primitive::ReadSync,
        Primitive::ReadToStringSync,
        Primitive::WriteSync,
        Primitive::CreateDirAllSync,
        Primitive::MetadataSync,
        Primitive::RenameSync,
        Primitive::RemoveFileSync,
        Primitive::CopySync,
        Primitive::TryExistsSync,
    ];

    /// Name used in logs and spans
    pub const fn name(self) -> &'static str {
        match self {
            Primitive::Open => "open",
            Primitive::Create => "create",
            Primitive::Read => "read",
            Primitive::ReadToString => "read_to_string",
            Primitive::Write => "write",
            Primitive::Append => "append",
            Primitive::CreateDir => "create_dir",
            Primitive::CreateDirAll => "create_dir_all",
            Primitive::ReadDir => "read_dir",
            Primitive::Metadata => "metadata",
            Primitive::SymlinkMetadata => "symlink_metadata",
            Primitive::ReadLink => "read_link",
            Primitive::Symlink => "symlink",
            Primitive::SetPermissions => "set_permissions",
            Primitive::Rename => "rename",
            Primitive::RemoveFile => "remove_file",
            Primitive::RemoveDir => "remove_dir",
            Primitive::RemoveDirAll => "remove_dir_all",
            Primitive::Copy => "copy",
            Primitive::Canonicalize => "canonicalize",
            Primitive::TryExists => "try_exists",
            Primitive::OpenSync => "open_sync",
            Primitive::ReadSync => "read_sync",
            Primitive::ReadToStringSync => "read_to_string_sync",
            Primitive::WriteSync => "write_sync",
            Primitive::CreateDirAllSync => "create_dir_all_sync",
            Primitive::MetadataSync => "metadata_sync",
            Primitive::RenameSync => "rename_sync",
            Primitive::RemoveFileSync => "remove_file_sync",
            Primitive::CopySync => "copy_sync",
            Primitive::TryExistsSync => "try_exists_sync",
        }
    }

    /// The executor this primitive is routed to
    pub const fn executor(self) -> ExecutorKind {
        match self {
            Primitive::Open
            | Primitive::Create
            | Primitive::Read
            | Primitive::ReadToString
            | Primitive::Write
            | Primitive::Append
            | Primitive::CreateDir
            | Primitive::CreateDirAll
            | Primitive::ReadDir
            | Primitive::Metadata
            | Primitive::SymlinkMetadata
            | Primitive::ReadLink
            | Primitive::Symlink
            | Primitive::SetPermissions
            | Primitive::Rename
            | Primitive::RemoveFile
            | Primitive::RemoveDir
            | Primitive::RemoveDirAll
            | Primitive::Copy
            | Primitive::Canonicalize
            | Primitive::TryExists => ExecutorKind::Managed,
            Primitive::OpenSync
            | Primitive::ReadSync
            | Primitive::ReadToStringSync
            | Primitive::WriteSync
            | Primitive::CreateDirAllSync
            | Primitive::MetadataSync
            | Primitive::RenameSync
            | Primitive::RemoveFileSync
            | Primitive::CopySync
            | Primitive::TryExistsSync => ExecutorKind::Blocking,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pending result of a managed primitive
///
/// Returned as soon as the call is submitted; resolves once the operation,
/// including any retries, settles. An operation that was aborted before
/// settling surfaces as an `io::Error` of kind `Other`.
#[must_use = "the operation runs regardless, but its result is lost unless awaited"]
#[derive(Debug)]
pub struct FsHandle<T> {
    pending: PendingResult<io::Result<T>>,
}

impl<T> Future for FsHandle<T> {
    type Output = io::Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let settled = ready!(Pin::new(&mut self.pending).poll(cx));
        Poll::Ready(settled.unwrap_or_else(|aborted| Err(aborted.into())))
    }
}

impl Engine {
    fn managed<F, Fut, T>(&self, primitive: Primitive, op: F) -> FsHandle<T>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = io::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        debug_assert_eq!(primitive.executor(), ExecutorKind::Managed);
        let span = tracing::debug_span!("fs_op", primitive = primitive.name());
        let _entered = span.enter();
        FsHandle {
            pending: self.run_managed(op),
        }
    }

    fn blocking<F, T>(&self, primitive: Primitive, op: F) -> io::Result<T>
    where
        F: FnMut() -> io::Result<T>,
    {
        debug_assert_eq!(primitive.executor(), ExecutorKind::Blocking);
        let span = tracing::debug_span!("fs_op", primitive = primitive.name());
        let _entered = span.enter();
        self.run_blocking(op)
    }

    /// Open a file read-only
    pub fn open(&self, path: impl AsRef<Path>) -> FsHandle<tokio::fs::File> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::Open, move || tokio::fs::File::open(path.clone()))
    }

    /// Create or truncate a file for writing
    pub fn create(&self, path: impl AsRef<Path>) -> FsHandle<tokio::fs::File> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::Create, move || tokio::fs::File::create(path.clone()))
    }

    /// Read a whole file
    pub fn read(&self, path: impl AsRef<Path>) -> FsHandle<Vec<u8>> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::Read, move || tokio::fs::read(path.clone()))
    }

    /// Read a whole file as UTF-8
    pub fn read_to_string(&self, path: impl AsRef<Path>) -> FsHandle<String> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::ReadToString, move || {
            tokio::fs::read_to_string(path.clone())
        })
    }

    /// Write a whole file, replacing its contents
    pub fn write(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> FsHandle<()> {
        let path = path.as_ref().to_path_buf();
        let contents: Arc<[u8]> = Arc::from(contents.as_ref());
        self.managed(Primitive::Write, move || {
            tokio::fs::write(path.clone(), Arc::clone(&contents))
        })
    }

    /// Append to a file, creating it if missing
    pub fn append(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> FsHandle<()> {
        let path = path.as_ref().to_path_buf();
        let contents: Arc<[u8]> = Arc::from(contents.as_ref());
        self.managed(Primitive::Append, move || {
            let path = path.clone();
            let contents = Arc::clone(&contents);
            async move {
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await?;
                file.write_all(&contents).await?;
                file.flush().await
            }
        })
    }

    /// Create a single directory
    pub fn create_dir(&self, path: impl AsRef<Path>) -> FsHandle<()> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::CreateDir, move || tokio::fs::create_dir(path.clone()))
    }

    /// Create a directory and any missing parents
    pub fn create_dir_all(&self, path: impl AsRef<Path>) -> FsHandle<()> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::CreateDirAll, move || {
            tokio::fs::create_dir_all(path.clone())
        })
    }

    /// List a directory's entries, sorted by path
    pub fn read_dir(&self, path: impl AsRef<Path>) -> FsHandle<Vec<PathBuf>> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::ReadDir, move || {
            let path = path.clone();
            async move {
                let mut entries = tokio::fs::read_dir(&path).await?;
                let mut paths = Vec::new();
                while let Some(entry) = entries.next_entry().await? {
                    paths.push(entry.path());
                }
                paths.sort();
                Ok(paths)
            }
        })
    }

    /// Metadata, following symlinks
    pub fn metadata(&self, path: impl AsRef<Path>) -> FsHandle<Metadata> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::Metadata, move || tokio::fs::metadata(path.clone()))
    }

    /// Metadata of the path itself, not following symlinks
    pub fn symlink_metadata(&self, path: impl AsRef<Path>) -> FsHandle<Metadata> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::SymlinkMetadata, move || {
            tokio::fs::symlink_metadata(path.clone())
        })
    }

    /// Target of a symlink, as stored in the link
    pub fn read_link(&self, path: impl AsRef<Path>) -> FsHandle<PathBuf> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::ReadLink, move || tokio::fs::read_link(path.clone()))
    }

    /// Create a symlink at `link` pointing to `original`
    ///
    /// On Windows the link is a directory link when `original`, resolved
    /// against the link's parent, is a directory.
    pub fn symlink(&self, original: impl AsRef<Path>, link: impl AsRef<Path>) -> FsHandle<()> {
        let original = original.as_ref().to_path_buf();
        let link = link.as_ref().to_path_buf();
        self.managed(Primitive::Symlink, move || {
            create_symlink(original.clone(), link.clone())
        })
    }

    /// Replace a path's permissions
    pub fn set_permissions(&self, path: impl AsRef<Path>, perm: Permissions) -> FsHandle<()> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::SetPermissions, move || {
            tokio::fs::set_permissions(path.clone(), perm.clone())
        })
    }

    /// Rename a file or directory
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> FsHandle<()> {
        let from = from.as_ref().to_path_buf();
        let to = to.as_ref().to_path_buf();
        self.managed(Primitive::Rename, move || {
            tokio::fs::rename(from.clone(), to.clone())
        })
    }

    /// Remove a file
    pub fn remove_file(&self, path: impl AsRef<Path>) -> FsHandle<()> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::RemoveFile, move || tokio::fs::remove_file(path.clone()))
    }

    /// Remove an empty directory
    pub fn remove_dir(&self, path: impl AsRef<Path>) -> FsHandle<()> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::RemoveDir, move || tokio::fs::remove_dir(path.clone()))
    }

    /// Remove a directory and everything under it
    pub fn remove_dir_all(&self, path: impl AsRef<Path>) -> FsHandle<()> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::RemoveDirAll, move || {
            tokio::fs::remove_dir_all(path.clone())
        })
    }

    /// Copy a file's contents and permissions; returns bytes copied
    pub fn copy(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> FsHandle<u64> {
        let from = from.as_ref().to_path_buf();
        let to = to.as_ref().to_path_buf();
        self.managed(Primitive::Copy, move || tokio::fs::copy(from.clone(), to.clone()))
    }

    /// Absolute path with symlinks resolved
    pub fn canonicalize(&self, path: impl AsRef<Path>) -> FsHandle<PathBuf> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::Canonicalize, move || {
            tokio::fs::canonicalize(path.clone())
        })
    }

    /// Whether a path exists; errors other than not-found are reported
    pub fn try_exists(&self, path: impl AsRef<Path>) -> FsHandle<bool> {
        let path = path.as_ref().to_path_buf();
        self.managed(Primitive::TryExists, move || tokio::fs::try_exists(path.clone()))
    }

    /// Open a file read-only on the calling thread
    pub fn open_sync(&self, path: impl AsRef<Path>) -> io::Result<std::fs::File> {
        let path = path.as_ref();
        self.blocking(Primitive::OpenSync, || std::fs::File::open(path))
    }

    /// Read a whole file on the calling thread
    pub fn read_sync(&self, path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        let path = path.as_ref();
        self.blocking(Primitive::ReadSync, || std::fs::read(path))
    }

    /// Read a whole file as UTF-8 on the calling thread
    pub fn read_to_string_sync(&self, path: impl AsRef<Path>) -> io::Result<String> {
        let path = path.as_ref();
        self.blocking(Primitive::ReadToStringSync, || std::fs::read_to_string(path))
    }

    /// Write a whole file on the calling thread, replacing its contents
    pub fn write_sync(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> io::Result<()> {
        let path = path.as_ref();
        let contents = contents.as_ref();
        self.blocking(Primitive::WriteSync, || std::fs::write(path, contents))
    }

    /// Create a directory and any missing parents on the calling thread
    pub fn create_dir_all_sync(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        self.blocking(Primitive::CreateDirAllSync, || std::fs::create_dir_all(path))
    }

    /// Metadata on the calling thread, following symlinks
    pub fn metadata_sync(&self, path: impl AsRef<Path>) -> io::Result<Metadata> {
        let path = path.as_ref();
        self.blocking(Primitive::MetadataSync, || std::fs::metadata(path))
    }

    /// Rename a file or directory on the calling thread
    pub fn rename_sync(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> io::Result<()> {
        let (from, to) = (from.as_ref(), to.as_ref());
        self.blocking(Primitive::RenameSync, || std::fs::rename(from, to))
    }

    /// Remove a file on the calling thread
    pub fn remove_file_sync(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        self.blocking(Primitive::RemoveFileSync, || std::fs::remove_file(path))
    }

    /// Copy a file on the calling thread; returns bytes copied
    pub fn copy_sync(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> io::Result<u64> {
        let (from, to) = (from.as_ref(), to.as_ref());
        self.blocking(Primitive::CopySync, || std::fs::copy(from, to))
    }

    /// Whether a path exists, checked on the calling thread
    pub fn try_exists_sync(&self, path: impl AsRef<Path>) -> io::Result<bool> {
        let path = path.as_ref();
        self.blocking(Primitive::TryExistsSync, || path.try_exists())
    }
}

#[cfg(unix)]
async fn create_symlink(original: PathBuf, link: PathBuf) -> io::Result<()> {
    tokio::fs::symlink(original, link).await
}

#[cfg(windows)]
async fn create_symlink(original: PathBuf, link: PathBuf) -> io::Result<()> {
    let target = match link.parent() {
        Some(parent) => parent.join(&original),
        None => original.clone(),
    };
    let is_dir = tokio::fs::metadata(&target)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if is_dir {
        tokio::fs::symlink_dir(original, link).await
    } else {
        tokio::fs::symlink_file(original, link).await
    }
}

#[cfg(not(any(unix, windows)))]
async fn create_symlink(_original: PathBuf, _link: PathBuf) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_registry_has_unique_names() {
        let names: HashSet<_> = Primitive::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(names.len(), Primitive::ALL.len());
    }

    #[test]
    fn test_sync_suffix_matches_executor() {
        for primitive in Primitive::ALL {
            let blocking = primitive.name().ends_with("_sync");
            assert_eq!(
                primitive.executor() == ExecutorKind::Blocking,
                blocking,
                "{primitive} routed to the wrong executor"
            );
        }
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("note.txt");
        let engine = Engine::default();

        engine.write(&path, "hello").await.unwrap();
        engine.append(&path, " world").await.unwrap();

        assert_eq!(engine.read_to_string(&path).await.unwrap(), "hello world");
        assert_eq!(engine.read(&path).await.unwrap().len(), 11);
    }

    #[tokio::test]
    async fn test_directory_primitives() {
        let temp = TempDir::new().unwrap();
        let engine = Engine::default();
        let nested = temp.path().join("a/b/c");

        engine.create_dir_all(&nested).await.unwrap();
        engine.write(nested.join("one"), b"1").await.unwrap();
        engine.write(nested.join("two"), b"2").await.unwrap();

        let entries = engine.read_dir(&nested).await.unwrap();
        assert_eq!(entries, vec![nested.join("one"), nested.join("two")]);

        engine
            .rename(nested.join("two"), nested.join("three"))
            .await
            .unwrap();
        assert!(!engine.try_exists(nested.join("two")).await.unwrap());
        assert!(engine.metadata(nested.join("three")).await.unwrap().is_file());

        engine.remove_dir_all(temp.path().join("a")).await.unwrap();
        assert!(!engine.try_exists(temp.path().join("a")).await.unwrap());
    }

    #[tokio::test]
    async fn test_not_found_is_surfaced_once() {
        let temp = TempDir::new().unwrap();
        let engine = Engine::default();

        let err = engine
            .read(temp.path().join("missing"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_round_trip() {
        let temp = TempDir::new().unwrap();
        let engine = Engine::default();
        let target = temp.path().join("target.txt");
        let link = temp.path().join("link.txt");

        engine.write(&target, "through the link").await.unwrap();
        engine.symlink("target.txt", &link).await.unwrap();

        assert_eq!(engine.read_link(&link).await.unwrap(), PathBuf::from("target.txt"));
        assert!(engine.symlink_metadata(&link).await.unwrap().is_symlink());
        assert_eq!(
            engine.read_to_string(&link).await.unwrap(),
            "through the link"
        );

        let err = engine.read_link(&target).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_blocking_primitives() {
        let temp = TempDir::new().unwrap();
        let engine = Engine::default();
        let dir = temp.path().join("sync");
        let file = dir.join("data.bin");

        engine.create_dir_all_sync(&dir).unwrap();
        engine.write_sync(&file, [1u8, 2, 3]).unwrap();
        assert_eq!(engine.read_sync(&file).unwrap(), vec![1, 2, 3]);
        assert_eq!(engine.metadata_sync(&file).unwrap().len(), 3);

        let copy = dir.join("copy.bin");
        assert_eq!(engine.copy_sync(&file, &copy).unwrap(), 3);
        engine.remove_file_sync(&file).unwrap();
        assert!(!engine.try_exists_sync(&file).unwrap());
        assert!(engine.try_exists_sync(&copy).unwrap());

        let err = engine.open_sync(&file).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
