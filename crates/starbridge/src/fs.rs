//! File providers for script and module sources

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};

use parking_lot::RwLock;

/// Read-only source of script files
pub trait FileSystem: Send + Sync + fmt::Debug {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>>;

    fn read_all(&self, path: &str) -> io::Result<Vec<u8>> {
        let mut reader = self.open(path)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Files under a host directory
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` under the root; absolute paths and `..` are rejected
    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let rel = Path::new(path);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{path}: path escapes the file system root"),
            ));
        }
        Ok(self.root.join(rel))
    }
}

impl FileSystem for DirFs {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        let file = std::fs::File::open(self.resolve(path)?)?;
        Ok(Box::new(file))
    }
}

/// In-memory files
#[derive(Debug, Default)]
pub struct MemFs {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with_file(self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.write().insert(path.into(), content.into());
    }

    pub fn remove(&self, path: &str) -> bool {
        self.files.write().remove(path).is_some()
    }
}

impl FileSystem for MemFs {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
        let path = path.trim_start_matches("./");
        let content = self
            .files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{path}: file does not exist")))?;
        Ok(Box::new(Cursor::new(content)))
    }
}
