//! 文件头元数据
//!
//! 代码之前以 `#` 开头的行构成文件头，原文保留，
//! 其中 `key = value` 形式的行可以按键查询。

use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    raw: String,
    entries: IndexMap<String, String>,
}

impl Header {
    /// 追加一行（不含开头的 `#`）
    pub(crate) fn push_line(&mut self, line: &str) {
        self.raw.push_str(line);
        self.raw.push('\n');
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if !key.is_empty() && !key.contains(char::is_whitespace) {
                self.entries
                    .insert(key.to_string(), value.trim().to_string());
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// 文件头原文
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_lines() {
        let mut header = Header::default();
        header.push_line(" name = demo");
        header.push_line(" just a comment");
        header.push_line(" version=1.2 ");
        assert_eq!(header.get("name"), Some("demo"));
        assert_eq!(header.get("version"), Some("1.2"));
        assert_eq!(header.get("just"), None);
        assert_eq!(header.iter().count(), 2);
        assert!(header.raw().contains("just a comment"));
    }
}
