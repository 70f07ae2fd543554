//! Input resolution: turn a user-selected file reference into a path that
//! stays valid for the whole extraction.
//!
//! Mobile pickers and browsers frequently hand back paths inside temporary or
//! cache directories, which the OS may purge at any moment. Such files are
//! first copied into the scratch directory; if the source is already gone the
//! file fails fast with [`FileAccessError::Vanished`] instead of proceeding
//! with a stale handle. Scratch copies are named `<timestamp>-<random>-<name>`
//! so repeated uploads of the same file never collide, and are removed when
//! the [`PreparedInput`] is dropped.

use crate::error::FileAccessError;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, info};

/// Directory names that mark a path as ephemeral.
const EPHEMERAL_DIR_NAMES: &[&str] = &["tmp", "temp", "cache", "caches", ".cache"];

/// A file ready to be encoded.
pub enum PreparedInput {
    /// The file was already in a durable location.
    Local(PathBuf),
    /// The file was copied out of an ephemeral directory.
    /// The `TempPath` deletes the copy on drop.
    Copied {
        path: PathBuf,
        source: PathBuf,
        _copy: TempPath,
    },
}

impl PreparedInput {
    /// Path to read the content from.
    pub fn path(&self) -> &Path {
        match self {
            PreparedInput::Local(p) => p,
            PreparedInput::Copied { path, .. } => path,
        }
    }

    /// The path the user selected, for messages and MIME detection.
    pub fn source(&self) -> &Path {
        match self {
            PreparedInput::Local(p) => p,
            PreparedInput::Copied { source, .. } => source,
        }
    }
}

/// Accept plain paths and `file://` URIs.
pub fn resolve_path(input: &str) -> PathBuf {
    PathBuf::from(input.strip_prefix("file://").unwrap_or(input))
}

/// True when `path` lives somewhere the OS may garbage-collect.
pub fn is_ephemeral(path: &Path) -> bool {
    if path.starts_with(std::env::temp_dir()) {
        return true;
    }
    path.parent()
        .map(|parent| {
            parent.components().any(|c| match c {
                Component::Normal(name) => name
                    .to_str()
                    .map(|n| EPHEMERAL_DIR_NAMES.contains(&n.to_lowercase().as_str()))
                    .unwrap_or(false),
                _ => false,
            })
        })
        .unwrap_or(false)
}

/// Validate the file and, when it is ephemeral, copy it into `scratch_dir`.
pub async fn prepare_input(path: &Path, scratch_dir: &Path) -> Result<PreparedInput, FileAccessError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| access_error(path, &e))?;

    if meta.is_dir() {
        return Err(FileAccessError::Unreadable {
            path: path.to_path_buf(),
            detail: "is a directory".into(),
        });
    }

    if !is_ephemeral(path) {
        debug!("Using file in place: {}", path.display());
        return Ok(PreparedInput::Local(path.to_path_buf()));
    }

    copy_to_scratch(path, scratch_dir).await
}

async fn copy_to_scratch(source: &Path, scratch_dir: &Path) -> Result<PreparedInput, FileAccessError> {
    let unreadable = |detail: String| FileAccessError::Unreadable {
        path: source.to_path_buf(),
        detail,
    };

    tokio::fs::create_dir_all(scratch_dir)
        .await
        .map_err(|e| unreadable(format!("cannot create scratch dir: {e}")))?;

    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let prefix = format!("{}-", chrono::Utc::now().timestamp_millis());
    let suffix = format!("-{file_name}");

    let copy = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(&suffix)
        .tempfile_in(scratch_dir)
        .map_err(|e| unreadable(format!("cannot create scratch file: {e}")))?
        .into_temp_path();

    match tokio::fs::copy(source, &copy).await {
        Ok(bytes) => {
            info!(
                "Copied ephemeral file {} → {} ({} bytes)",
                source.display(),
                copy.display(),
                bytes
            );
            Ok(PreparedInput::Copied {
                path: copy.to_path_buf(),
                source: source.to_path_buf(),
                _copy: copy,
            })
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Err(FileAccessError::Vanished {
            path: source.to_path_buf(),
        }),
        Err(e) => Err(access_error(source, &e)),
    }
}

pub(crate) fn access_error(path: &Path, e: &std::io::Error) -> FileAccessError {
    let path = path.to_path_buf();
    match e.kind() {
        ErrorKind::NotFound => FileAccessError::NotFound { path },
        ErrorKind::PermissionDenied => FileAccessError::PermissionDenied { path },
        _ => FileAccessError::Unreadable {
            path,
            detail: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        assert_eq!(resolve_path("file:///tmp/a.pdf"), PathBuf::from("/tmp/a.pdf"));
        assert_eq!(resolve_path("docs/a.pdf"), PathBuf::from("docs/a.pdf"));
    }

    #[test]
    fn test_is_ephemeral() {
        assert!(is_ephemeral(&std::env::temp_dir().join("upload.pdf")));
        assert!(is_ephemeral(Path::new("/data/user/0/app/cache/DocumentPicker/a.pdf")));
        assert!(is_ephemeral(Path::new("/Users/me/Library/Caches/a.png")));
        assert!(!is_ephemeral(Path::new("/home/me/Documents/syllabus.pdf")));
        assert!(!is_ephemeral(Path::new("cache.pdf")));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let scratch = tempfile::tempdir().unwrap();
        let err = prepare_input(Path::new("/definitely/not/here.pdf"), scratch.path())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FileAccessError::NotFound { .. }));
    }

    #[tokio::test]
    async fn durable_file_is_used_in_place() {
        let dir = tempfile::tempdir_in(env!("CARGO_MANIFEST_DIR")).unwrap();
        let file = dir.path().join("syllabus.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();
        if is_ephemeral(&file) {
            // Checkout lives under a temp directory; nothing to assert.
            return;
        }

        let scratch = tempfile::tempdir().unwrap();
        let prepared = prepare_input(&file, scratch.path()).await.unwrap();
        assert!(matches!(prepared, PreparedInput::Local(_)));
        assert_eq!(prepared.path(), file.as_path());
    }

    #[tokio::test]
    async fn ephemeral_file_is_copied_and_cleaned_up() {
        let src_dir = tempfile::tempdir().unwrap();
        let file = src_dir.path().join("syllabus.pdf");
        std::fs::write(&file, b"%PDF-1.4 body").unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let prepared = prepare_input(&file, scratch.path()).await.unwrap();
        let copy = prepared.path().to_path_buf();

        assert!(matches!(prepared, PreparedInput::Copied { .. }));
        assert_eq!(prepared.source(), file.as_path());
        assert!(copy.starts_with(scratch.path()));
        assert!(copy.to_string_lossy().ends_with("-syllabus.pdf"));
        assert_eq!(std::fs::read(&copy).unwrap(), b"%PDF-1.4 body");

        drop(prepared);
        assert!(!copy.exists());
    }

    #[tokio::test]
    async fn file_gone_before_copy_is_vanished() {
        let src_dir = tempfile::tempdir().unwrap();
        let file = src_dir.path().join("picked.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();
        std::fs::remove_file(&file).unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let err = copy_to_scratch(&file, scratch.path()).await.err().unwrap();
        assert_eq!(err, FileAccessError::Vanished { path: file.clone() });
        assert!(err.to_string().contains("select it again"));
        // The reserved scratch file is released on failure.
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn repeated_copies_do_not_collide() {
        let src_dir = tempfile::tempdir().unwrap();
        let file = src_dir.path().join("a.png");
        std::fs::write(&file, b"x").unwrap();

        let scratch = tempfile::tempdir().unwrap();
        let first = prepare_input(&file, scratch.path()).await.unwrap();
        let second = prepare_input(&file, scratch.path()).await.unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[tokio::test]
    async fn directory_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let err = prepare_input(dir.path(), scratch.path()).await.err().unwrap();
        assert!(matches!(err, FileAccessError::Unreadable { .. }));
    }
}
