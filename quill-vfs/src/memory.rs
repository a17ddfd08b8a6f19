//! In-memory file system implementation

use crate::error::{VfsError, VfsResult};
use crate::path::normalize;
use crate::VirtualFileSystem;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// 内存文件系统
///
/// 所有文件保存在 `BTreeMap` 中，路径在写入与读取时都会规范化，
/// 适合测试与沙箱嵌入场景。克隆后共享同一份数据。
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryFileSystem {
    /// Create a new empty memory file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new memory file system pre-populated with files.
    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let fs = Self::new();
        for (path, content) in files {
            fs.insert(Path::new(path.as_ref()), content);
        }
        fs
    }

    /// 以文本形式预置源文件
    pub fn with_sources<I, S, T>(files: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self::with_files(
            files
                .into_iter()
                .map(|(path, text)| (path, text.as_ref().as_bytes().to_vec())),
        )
    }

    /// 写入（或覆盖）一个文件
    pub fn insert(&self, path: &Path, content: Vec<u8>) {
        let key = Self::key(path);
        match self.files.write() {
            Ok(mut files) => {
                files.insert(key, content);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(key, content);
            }
        }
    }

    fn key(path: &Path) -> String {
        normalize(path).to_string_lossy().into_owned()
    }
}

impl VirtualFileSystem for MemoryFileSystem {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let key = Self::key(path);
        let files = self.files.read().map_err(|_| VfsError::Io {
            message: String::from("lock poisoned"),
        })?;
        files
            .get(&key)
            .cloned()
            .ok_or(VfsError::NotFound { path: key })
    }

    fn exists(&self, path: &Path) -> bool {
        let key = Self::key(path);
        self.files
            .read()
            .map(|files| files.contains_key(&key))
            .unwrap_or(false)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.exists(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fs_is_empty() {
        let fs = MemoryFileSystem::new();
        assert!(!fs.exists(Path::new("/anything.ql")));
    }

    #[test]
    fn test_paths_are_normalized() {
        let fs = MemoryFileSystem::with_sources([("/lib/./a.ql", "run {}")]);
        assert!(fs.exists(Path::new("/lib/x/../a.ql")));
        assert_eq!(fs.read_source(Path::new("/lib/a.ql")).unwrap(), "run {}");
    }

    #[test]
    fn test_clone_shares_data() {
        let fs1 = MemoryFileSystem::new();
        let fs2 = fs1.clone();
        fs2.insert(Path::new("/shared.ql"), b"shared".to_vec());
        assert_eq!(fs1.read_file(Path::new("/shared.ql")).unwrap(), b"shared");
    }

    #[test]
    fn test_read_nonexistent() {
        let fs = MemoryFileSystem::new();
        let err = fs.read_file(Path::new("/nonexistent.ql")).unwrap_err();
        assert!(matches!(err, VfsError::NotFound { .. }));
    }

    #[test]
    fn test_invalid_utf8_source() {
        let fs = MemoryFileSystem::with_files([("/bad.ql", vec![0xff, 0xfe])]);
        let err = fs.read_source(Path::new("/bad.ql")).unwrap_err();
        assert!(matches!(err, VfsError::InvalidUtf8 { .. }));
    }
}
