//! # 日志系统模块
//!
//! 实现标准 `log` crate 接口，提供按级别过滤的彩色日志输出。
//! 日志级别在编译时通过环境变量 `LOG` 选择。
//!
//! ## 颜色方案
//!
//! - **ERROR**: 红色 (31)
//! - **WARN**: 亮黄色 (93)
//! - **INFO**: 蓝色 (34)
//! - **DEBUG**: 绿色 (32)
//! - **TRACE**: 暗灰色 (90)

use crate::println;
use log::{self, Level, LevelFilter, Log, Metadata, Record};

struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31,
            Level::Warn => 93,
            Level::Info => 34,
            Level::Debug => 32,
            Level::Trace => 90,
        };
        println!(
            "\u{1B}[{}m[{:>5}] {}\u{1B}[0m",
            color,
            record.level(),
            record.args(),
        );
    }

    fn flush(&self) {}
}

/// 初始化日志系统
///
/// 注册全局 logger 并根据编译时环境变量 `LOG` 设置最大日志级别，
/// 未设置时默认只输出 `INFO` 及以上级别。
pub fn init() {
    static LOGGER: SimpleLogger = SimpleLogger;
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(match option_env!("LOG") {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    });
}
