//! CLI 日志系统初始化
//!
//! 基于 `tracing-subscriber` 实现分阶段日志控制。

use crate::config::LogConfig;
use quill_config::Phase;
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use tracing_subscriber::{
    filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry,
};

/// 日志输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 彩色格式化（开发使用）
    Pretty,
    /// 紧凑格式
    Compact,
    /// JSON 格式（工具集成）
    Json,
}

/// 按阶段构建过滤器；非阶段目标（api、cli）使用全局级别
pub fn build_targets(log_config: &LogConfig) -> Targets {
    Phase::ALL.iter().fold(
        Targets::new().with_default(log_config.global),
        |targets, phase| targets.with_target(phase.target(), log_config.level_for(*phase)),
    )
}

/// 初始化日志系统；指定了文件时同时输出到 stderr 与文件
pub fn init(log_config: &LogConfig) -> io::Result<()> {
    let targets = build_targets(log_config);
    let console = format_layer(log_config.format, io::stderr).with_filter(targets.clone());

    match &log_config.file {
        Some(path) => {
            let file = Arc::new(
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?,
            );
            // 文件不使用 ANSI 颜色
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(file)
                .with_filter(targets);
            tracing_subscriber::registry()
                .with(console)
                .with(file_layer)
                .try_init()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        }
        None => tracing_subscriber::registry()
            .with(console)
            .try_init()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e)),
    }
}

/// 按格式创建输出层
fn format_layer<W, F>(format: LogFormat, make_writer: F) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: io::Write + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;
    use tracing::Level;

    #[test]
    fn test_phase_targets() {
        let config = LogConfig {
            global: LevelFilter::WARN,
            vm: Some(LevelFilter::TRACE),
            lexer: Some(LevelFilter::OFF),
            ..LogConfig::default()
        };
        let targets = build_targets(&config);
        assert!(targets.would_enable("quill::vm", &Level::TRACE));
        assert!(!targets.would_enable("quill::lexer", &Level::ERROR));
        assert!(targets.would_enable("quill::compiler", &Level::WARN));
        assert!(!targets.would_enable("quill::compiler", &Level::INFO));
        assert!(!targets.would_enable("quill::api", &Level::DEBUG));
    }

    #[test]
    fn test_format_names() {
        let format: LogFormat = serde_json::from_str("\"pretty\"").unwrap();
        assert_eq!(format, LogFormat::Pretty);
        assert!(serde_json::from_str::<LogFormat>("\"xml\"").is_err());
    }
}
