//! include / import 路径解析
//!
//! 路径相对于引用方单元所在目录解析，经 VFS 读取。
//! 解析栈用于发现循环引用和超出深度限制的嵌套。

use crate::compiler::error::ErrorKind;
use quill_vfs::{normalize, resolve_relative, VirtualFileSystem};
use std::path::{Path, PathBuf};
use tracing::debug;

const TARGET: &str = "quill::compiler";

#[derive(Debug, Clone)]
pub struct ResolvedSource {
    /// 规范化后的路径，同时作为单元身份
    pub key: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct SourceResolver {
    stack: Vec<String>,
    max_depth: usize,
}

impl SourceResolver {
    pub fn new(max_depth: usize) -> Self {
        Self {
            stack: Vec::new(),
            max_depth,
        }
    }

    /// 计算被引用文件的身份路径
    pub fn locate(&self, from: &str, target: &str) -> String {
        path_key(&resolve_relative(Path::new(from), target))
    }

    /// 读取源码；读取失败统一报告为 `ErrIncludeFile`
    pub fn load(&self, vfs: &dyn VirtualFileSystem, key: &str) -> Result<ResolvedSource, ErrorKind> {
        let text = vfs
            .read_source(Path::new(key))
            .map_err(|err| ErrorKind::IncludeFile {
                path: key.to_string(),
                reason: err.to_string(),
            })?;
        debug!(target: TARGET, path = key, bytes = text.len(), "loaded source");
        Ok(ResolvedSource {
            key: key.to_string(),
            text,
        })
    }

    /// 进入一个单元的编译
    pub fn enter(&mut self, key: &str) -> Result<(), ErrorKind> {
        if self.stack.iter().any(|k| k == key) {
            let mut chain = self.stack.clone();
            chain.push(key.to_string());
            return Err(ErrorKind::IncludeFile {
                path: key.to_string(),
                reason: format!("circular reference {}", chain.join(" -> ")),
            });
        }
        if self.max_depth > 0 && self.stack.len() >= self.max_depth {
            return Err(ErrorKind::IncludeFile {
                path: key.to_string(),
                reason: format!("nesting is deeper than {}", self.max_depth),
            });
        }
        self.stack.push(key.to_string());
        Ok(())
    }

    pub fn leave(&mut self) {
        self.stack.pop();
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// 单元身份：规范化路径的字符串形式
pub fn path_key(path: &Path) -> String {
    normalize(path).to_string_lossy().into_owned()
}

/// import 默认别名：文件名去掉扩展名
pub fn default_alias(path: &str) -> String {
    PathBuf::from(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_vfs::MemoryFileSystem;

    #[test]
    fn test_cycle_is_reported() {
        let mut resolver = SourceResolver::new(8);
        resolver.enter("/a.ql").unwrap();
        resolver.enter("/b.ql").unwrap();
        let err = resolver.enter("/a.ql").unwrap_err();
        assert!(err.to_string().contains("/a.ql -> /b.ql -> /a.ql"));
        resolver.leave();
        assert_eq!(resolver.depth(), 1);
    }

    #[test]
    fn test_depth_limit() {
        let mut resolver = SourceResolver::new(1);
        resolver.enter("/a.ql").unwrap();
        assert!(matches!(
            resolver.enter("/b.ql"),
            Err(ErrorKind::IncludeFile { .. })
        ));
    }

    #[test]
    fn test_locate_and_load() {
        let fs = MemoryFileSystem::with_sources([("/src/lib/m.ql", "pub const A = 1")]);
        let resolver = SourceResolver::new(8);
        let key = resolver.locate("/src/main.ql", "lib/./m.ql");
        assert_eq!(key, "/src/lib/m.ql");
        assert_eq!(resolver.load(&fs, &key).unwrap().text, "pub const A = 1");
        assert!(matches!(
            resolver.load(&fs, "/missing.ql"),
            Err(ErrorKind::IncludeFile { .. })
        ));
        assert_eq!(default_alias("/src/lib/m.ql"), "m");
    }
}
