//! 源码位置索引

/// 行列坐标（均从 1 开始，列按字符计数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coordinate {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// 字节偏移 → 行列 的索引
///
/// 构建时记录每一行的起始偏移，查询时二分查找。
#[derive(Debug, Clone)]
pub struct LineIndex {
    source: String,
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(offset + 1);
            }
        }
        Self {
            source: source.to_string(),
            line_starts,
        }
    }

    /// 查询偏移对应的坐标；越界偏移被截断到文件末尾
    pub fn coordinate(&self, offset: usize) -> Coordinate {
        let offset = offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let column = self
            .source
            .get(start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(0);
        Coordinate {
            line: line + 1,
            column: column + 1,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 返回指定行（从 1 开始）的文本，不含换行符
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let end = self
            .line_starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.source.len());
        self.source.get(start..end).map(|s| s.trim_end_matches('\r'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates() {
        let index = LineIndex::new("ab\ncd\n\nxyz");
        assert_eq!(index.coordinate(0), Coordinate { line: 1, column: 1 });
        assert_eq!(index.coordinate(1), Coordinate { line: 1, column: 2 });
        assert_eq!(index.coordinate(3), Coordinate { line: 2, column: 1 });
        assert_eq!(index.coordinate(6), Coordinate { line: 3, column: 1 });
        assert_eq!(index.coordinate(9), Coordinate { line: 4, column: 3 });
        assert_eq!(index.line_count(), 4);
    }

    #[test]
    fn test_columns_count_chars() {
        let index = LineIndex::new("é x");
        // 'é' 占两个字节
        assert_eq!(index.coordinate(3), Coordinate { line: 1, column: 3 });
    }

    #[test]
    fn test_line_text() {
        let index = LineIndex::new("first\r\nsecond");
        assert_eq!(index.line_text(1), Some("first"));
        assert_eq!(index.line_text(2), Some("second"));
        assert_eq!(index.line_text(3), None);
    }
}
