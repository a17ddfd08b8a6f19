//! 路径规范化
//!
//! 统一使用 `/` 分隔符，并消去 `.` 与 `..`，使同一文件的不同写法
//! 得到相同的身份标识（编译器据此避免重复编译）。

use std::path::{Path, PathBuf};

/// 规范化路径：统一分隔符，折叠 `.` 和 `..`
pub fn normalize(path: &Path) -> PathBuf {
    let text = path.to_string_lossy().replace('\\', "/");
    let absolute = text.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in text.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        PathBuf::from(format!("/{joined}"))
    } else {
        PathBuf::from(joined)
    }
}

/// 以 `base` 所在目录为起点解析相对路径；绝对路径原样规范化
pub fn resolve_relative(base: &Path, target: &str) -> PathBuf {
    let target_path = Path::new(target);
    if target_path.is_absolute() || target.starts_with('/') {
        return normalize(target_path);
    }
    let dir = base.parent().unwrap_or_else(|| Path::new(""));
    normalize(&dir.join(target_path))
}
