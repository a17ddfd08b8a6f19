//! CLI 格式化输出
//!
//! 提供命令行友好的错误显示和源码上下文打印。

use quill_api::QuillError;

/// 错误行前后显示的上下文行数
const CONTEXT_LINES: usize = 2;

/// 打印错误；错误带位置时读取对应文件并显示源码上下文
pub fn print_error(e: &QuillError) {
    let report = e.to_report();
    eprintln!("{report}");

    let (Some(path), Some(line), Some(column)) = (report.path, report.line, report.column) else {
        return;
    };
    if let Ok(source) = std::fs::read_to_string(&path) {
        for text in source_context(&source, line, column) {
            eprintln!("{text}");
        }
    }
}

/// 源码上下文：错误行前后若干行，错误列下方加 `^` 标记
pub fn source_context(source: &str, error_line: usize, error_col: usize) -> Vec<String> {
    let lines: Vec<&str> = source.lines().collect();
    if error_line == 0 || error_line > lines.len() {
        return Vec::new();
    }

    let start_line = error_line.saturating_sub(CONTEXT_LINES).max(1);
    let end_line = (error_line + CONTEXT_LINES).min(lines.len());
    let width = end_line.to_string().len();

    let mut out = Vec::with_capacity(end_line - start_line + 3);
    out.push(format!("{}|--", "-".repeat(width + 1)));
    for line_idx in start_line..=end_line {
        out.push(format!("{:>width$} | {}", line_idx, lines[line_idx - 1]));
        if line_idx == error_line {
            out.push(format!(
                "{} | {}^",
                " ".repeat(width),
                " ".repeat(error_col.saturating_sub(1))
            ));
        }
    }
    out.push(format!("{}|--", "-".repeat(width + 1)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_under_column() {
        let source = "run {\n  x = 1\n}";
        let context = source_context(source, 2, 3);
        assert_eq!(
            context,
            vec!["--|--", "1 | run {", "2 |   x = 1", "  |   ^", "3 | }", "--|--"]
        );
    }

    #[test]
    fn test_context_window() {
        let source: String = (1..=12).map(|i| format!("line{i}\n")).collect();
        let context = source_context(&source, 10, 1);
        assert_eq!(context[1], " 8 | line8");
        assert_eq!(context[4], "   | ^");
        assert_eq!(context[context.len() - 2], "12 | line12");
    }

    #[test]
    fn test_line_out_of_source() {
        assert!(source_context("run {}", 0, 1).is_empty());
        assert!(source_context("run {}", 5, 1).is_empty());
    }
}
