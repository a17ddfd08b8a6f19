//! Quill Virtual File System
//!
//! 编译器通过该抽象读取 `include` / `import` 引用的源文件，
//! 测试使用内存实现，CLI 使用本地文件系统实现。
//!
//! # Usage
//! ```rust
//! use quill_vfs::{MemoryFileSystem, VirtualFileSystem};
//! use std::path::Path;
//!
//! let fs = MemoryFileSystem::with_sources([("/lib/math.ql", "pub const PI = 3")]);
//! let text = fs.read_source(Path::new("/lib/math.ql")).unwrap();
//! assert!(text.starts_with("pub"));
//! ```

mod error;
mod memory;
mod native;
mod path;
mod r#trait;

pub use error::{VfsError, VfsResult};
pub use memory::MemoryFileSystem;
pub use native::NativeFileSystem;
pub use path::{normalize, resolve_relative};
pub use r#trait::VirtualFileSystem;

/// Create a new memory-based file system.
pub fn memory_fs() -> MemoryFileSystem {
    MemoryFileSystem::new()
}

/// Create a new native file system.
pub fn native_fs() -> NativeFileSystem {
    NativeFileSystem::new()
}
