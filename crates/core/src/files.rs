//! Local file helpers behind the `/read` and `/write` commands.
use path_absolutize::Absolutize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FileError {
    #[error("No such file: {0}")]
    NotFound(PathBuf),
    #[error("Path is a directory: {0}")]
    IsDirectory(PathBuf),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Expands a leading `~`, then anchors relative paths at the current
/// directory. `$` is taken literally.
pub fn resolve_path(path: &str) -> Result<PathBuf, FileError> {
    let expanded = PathBuf::from(shellexpand::tilde(path.trim()).into_owned());

    expanded
        .absolutize()
        .map(|p| p.into_owned())
        .map_err(|source| FileError::Io {
            path: expanded.clone(),
            source,
        })
}

/// Reads a UTF-8 text file.
pub fn read_file(path: &str) -> Result<String, FileError> {
    let resolved = resolve_path(path)?;
    if !resolved.exists() {
        return Err(FileError::NotFound(resolved));
    }
    if resolved.is_dir() {
        return Err(FileError::IsDirectory(resolved));
    }
    debug!("Reading {}", resolved.display());
    fs::read_to_string(&resolved).map_err(|source| FileError::Io {
        path: resolved,
        source,
    })
}

/// Writes `content`, creating parent directories. Returns the path written.
pub fn write_file(path: &str, content: &str) -> Result<PathBuf, FileError> {
    let resolved = resolve_path(path)?;
    if resolved.is_dir() {
        return Err(FileError::IsDirectory(resolved));
    }
    if let Some(parent) = resolved.parent() {
        create_dir(parent)?;
    }
    debug!("Writing {} bytes to {}", content.len(), resolved.display());
    fs::write(&resolved, content).map_err(|source| FileError::Io {
        path: resolved.clone(),
        source,
    })?;
    Ok(resolved)
}

fn create_dir(dir: &Path) -> Result<(), FileError> {
    fs::create_dir_all(dir).map_err(|source| FileError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::ENV_MUTEX;
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("deep").join("dir").join("out.txt");

        let written = write_file(target.to_str().unwrap(), "line one\nline two").unwrap();

        assert_eq!(written, target);
        assert_eq!(
            read_file(target.to_str().unwrap()).unwrap(),
            "line one\nline two"
        );
    }

    #[test]
    fn test_write_overwrites() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.txt");
        let target = target.to_str().unwrap();

        write_file(target, "first").unwrap();
        write_file(target, "second").unwrap();

        assert_eq!(read_file(target).unwrap(), "second");
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.txt");

        let err = read_file(missing.to_str().unwrap()).unwrap_err();

        assert!(matches!(err, FileError::NotFound(p) if p == missing));
    }

    #[test]
    fn test_read_directory_fails() {
        let dir = tempdir().unwrap();
        let err = read_file(dir.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, FileError::IsDirectory(_)));

        let err = write_file(dir.path().to_str().unwrap(), "x").unwrap_err();
        assert!(matches!(err, FileError::IsDirectory(_)));
    }

    #[test]
    fn test_resolve_relative_path_against_cwd() {
        let resolved = resolve_path("some/file.txt").unwrap();
        let expected = std::env::current_dir().unwrap().join("some/file.txt");
        assert_eq!(resolved, expected);
    }

    #[test]
    fn test_resolve_expands_home() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let home = dirs::home_dir().unwrap();
        assert_eq!(resolve_path("~/notes.md").unwrap(), home.join("notes.md"));
    }

    #[test]
    fn test_dollar_in_file_name_is_literal() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let dir = tempdir().unwrap();
        let target = dir.path().join("report$HOME.txt");

        let written = write_file(target.to_str().unwrap(), "x").unwrap();

        assert_eq!(written, target);
        assert_eq!(fs::read_to_string(&target).unwrap(), "x");
        assert!(!dir.path().join("report").exists());
    }
}
