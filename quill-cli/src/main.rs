//! Quill CLI - Command line interface
//!
//! 项目式执行：配置来自 package.json，命令行参数可覆盖其中的部分字段。

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{debug, info};

mod config;
mod logging;
mod platform;

use crate::config::{parse_log_level, read_package_json, resolve_entry_path, LogConfig};
use crate::logging::LogFormat;
use crate::platform::print_error;
use quill_api::{init_config, run_file, RunConfig};

const TARGET: &str = "quill::cli";

#[derive(Parser, Debug)]
#[command(
    name = "quill",
    about = "Quill programming language - Project-based execution",
    version
)]
struct Cli {
    /// Configuration file path
    #[arg(value_name = "CONFIG", default_value = "package.json")]
    config: PathBuf,

    /// Compile and link only, do not run
    #[arg(long)]
    compile_only: bool,

    /// Print the linked program's disassembly
    #[arg(long)]
    dump_bytecode: bool,

    /// Global log level: silent, error, warn, info, debug, trace
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Also append logs to this file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Execution timeout in milliseconds (0 = unlimited)
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,

    /// Print errors as JSON reports
    #[arg(long)]
    json_errors: bool,
}

impl Cli {
    /// 命令行参数覆盖 package.json
    fn apply(&self, run: &mut RunConfig, log: &mut LogConfig) -> Result<(), String> {
        run.compile_only |= self.compile_only;
        run.dump_bytecode |= self.dump_bytecode;
        if let Some(timeout) = self.timeout {
            run.vm.timeout_ms = timeout;
        }
        if let Some(level) = &self.log_level {
            log.global = parse_log_level(level)?;
        }
        if let Some(format) = self.log_format {
            log.format = format;
        }
        if let Some(file) = &self.log_file {
            log.file = Some(file.clone());
        }
        Ok(())
    }
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {message}");
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    let package = read_package_json(&cli.config).unwrap_or_else(|e| fail(&e));
    let entry_path = resolve_entry_path(&cli.config, &package.entry);

    let mut run_config = package.run_config();
    let mut log_config = package.log_config().unwrap_or_else(|e| fail(&e));
    cli.apply(&mut run_config, &mut log_config)
        .unwrap_or_else(|e| fail(&e));

    if let Err(e) = logging::init(&log_config) {
        fail(&format!("无法初始化日志: {e}"));
    }
    debug!(target: TARGET, config = ?run_config, "configuration loaded");

    // 全局配置只在进程启动时设置一次
    if init_config(run_config.clone()).is_err() {
        fail("全局配置已被初始化");
    }

    let entry = entry_path.to_string_lossy();
    info!(target: TARGET, entry = %entry, "running project");
    match run_file(&entry, &run_config) {
        Ok(output) => {
            print!("{}", output.stdout);
            if let Some(value) = output.value {
                println!("{value}");
            }
        }
        Err(e) => {
            if cli.json_errors {
                eprintln!("{}", e.to_report().to_json());
            } else {
                print_error(&e);
            }
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["quill"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("package.json"));
        assert!(!cli.compile_only);
        assert!(cli.timeout.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "quill",
            "demo/package.json",
            "--compile-only",
            "--timeout",
            "250",
            "--log-level",
            "trace",
            "--log-format",
            "json",
        ])
        .unwrap();
        let mut run = RunConfig::default();
        let mut log = LogConfig::default();
        cli.apply(&mut run, &mut log).unwrap();
        assert!(run.compile_only);
        assert!(!run.dump_bytecode);
        assert_eq!(run.vm.timeout_ms, 250);
        assert_eq!(log.global, LevelFilter::TRACE);
        assert_eq!(log.format, LogFormat::Json);
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["quill", "--log-format", "xml"]).is_err());
        let cli = Cli::try_parse_from(["quill", "--log-level", "loud"]).unwrap();
        let result = cli.apply(&mut RunConfig::default(), &mut LogConfig::default());
        assert!(result.is_err());
    }
}
