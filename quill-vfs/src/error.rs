//! VFS Error Types

use thiserror::Error;

/// Result type for VFS operations
pub type VfsResult<T> = Result<T, VfsError>;

/// Error type for VFS operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VfsError {
    /// 文件不存在
    #[error("path not found: {path}")]
    NotFound { path: String },

    /// 权限不足
    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    /// 文件内容不是合法的 UTF-8
    #[error("file {path} is not valid UTF-8")]
    InvalidUtf8 { path: String },

    /// 非法路径
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// 其它 IO 错误
    #[error("IO error: {message}")]
    Io { message: String },
}

impl From<std::io::Error> for VfsError {
    fn from(err: std::io::Error) -> Self {
        VfsError::Io {
            message: err.to_string(),
        }
    }
}
