//! Source and data file access
//!
//! Both `#include_file` and `#file_contents` go through a [`FileLoader`] so
//! the pipeline can run against the file system or an in-memory set of files.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

/// A file as returned by a loader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    /// Canonical name; two requests that resolve to the same file get the same name
    pub name: String,
    pub bytes: Vec<u8>,
}

pub trait FileLoader {
    fn load(&self, path: &str) -> io::Result<LoadedFile>;
}

/// Looks a path up as given, then under each include directory in order
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    include_dirs: Vec<PathBuf>,
}

impl FsLoader {
    pub fn new(include_dirs: Vec<PathBuf>) -> Self {
        Self { include_dirs }
    }
}

impl FileLoader for FsLoader {
    fn load(&self, path: &str) -> io::Result<LoadedFile> {
        let candidates = std::iter::once(PathBuf::from(path)).chain(self.include_dirs.iter().map(|dir| dir.join(path)));

        for candidate in candidates {
            if !candidate.is_file() {
                continue;
            }
            let bytes = fs::read(&candidate)?;
            let name = candidate.canonicalize().unwrap_or(candidate);
            return Ok(LoadedFile {
                name: name.display().to_string(),
                bytes,
            });
        }

        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("'{}' not found in any include directory", path),
        ))
    }
}

/// Files held in memory, keyed by exact name
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(name, contents);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), contents.into());
    }
}

impl FileLoader for MemoryLoader {
    fn load(&self, path: &str) -> io::Result<LoadedFile> {
        let name = path.trim_start_matches("./");
        match self.files.get(name) {
            Some(bytes) => Ok(LoadedFile {
                name: name.to_string(),
                bytes: bytes.clone(),
            }),
            None => Err(io::Error::new(io::ErrorKind::NotFound, format!("'{}' not found", path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_loader_canonical_name() {
        let loader = MemoryLoader::new().with_file("lib.onyx", "x :: 1;");
        let a = loader.load("lib.onyx").unwrap();
        let b = loader.load("./lib.onyx").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.bytes, b"x :: 1;".to_vec());
        assert_eq!(loader.load("missing.onyx").unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_fs_loader_searches_include_dirs() {
        let dir = std::env::temp_dir().join(format!("onyxc-loader-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("data.bin"), [1u8, 2, 3]).unwrap();

        let loader = FsLoader::new(vec![dir.clone()]);
        let file = loader.load("data.bin").unwrap();
        assert_eq!(file.bytes, vec![1, 2, 3]);
        assert!(file.name.ends_with("data.bin"));
        assert!(FsLoader::default().load("onyxc-definitely-missing.bin").is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
