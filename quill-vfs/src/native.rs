//! Native file system implementation

use crate::error::{VfsError, VfsResult};
use crate::VirtualFileSystem;
use std::path::{Path, PathBuf};

/// 本地文件系统，可选地限定在某个根目录下
#[derive(Debug, Clone, Default)]
pub struct NativeFileSystem {
    base: Option<PathBuf>,
}

impl NativeFileSystem {
    /// Create a new native file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// 相对路径将以 `base` 为起点解析
    pub fn with_base(base: &Path) -> Self {
        Self {
            base: Some(base.to_path_buf()),
        }
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl VirtualFileSystem for NativeFileSystem {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let full = self.full_path(path);
        std::fs::read(&full).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => VfsError::NotFound {
                path: full.to_string_lossy().into_owned(),
            },
            std::io::ErrorKind::PermissionDenied => VfsError::PermissionDenied {
                path: full.to_string_lossy().into_owned(),
            },
            _ => e.into(),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.full_path(path).exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        self.full_path(path).is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("quill_vfs_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_native_read_relative_to_base() {
        let dir = temp_dir("base");
        std::fs::write(dir.join("unit.ql"), "run int { return 1 }").unwrap();

        let fs = NativeFileSystem::with_base(&dir);
        assert!(fs.is_file(Path::new("unit.ql")));
        assert_eq!(fs.read_source(Path::new("unit.ql")).unwrap(), "run int { return 1 }");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_native_missing_file() {
        let fs = NativeFileSystem::new();
        let err = fs
            .read_file(Path::new("/definitely/not/here.ql"))
            .unwrap_err();
        assert!(matches!(err, VfsError::NotFound { .. }));
    }
}
