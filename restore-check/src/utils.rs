use crate::cli::LogLevel;
use std::path::Path;

/// # restore-check 日志
///
/// 库代码只使用 `tracing` 宏，入口在 `main.rs` 中调用 `setup_logging()`。
///
/// - `-L, --log-level`：日志级别，`RUST_LOG` 设置时以其为准
/// - `-l, --log-file`：日志写入文件（追加），失败通知会附带该文件的尾部
///
/// 终端输出使用紧凑格式；文件输出带时间、级别和模块路径。
pub fn setup_logging(level: LogLevel, log_file: Option<&Path>) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let file_target = log_file.and_then(|path| {
        let file_name = path.file_name()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Some((dir.to_path_buf(), file_name.to_os_string()))
    });

    if let Some((dir, file_name)) = file_target {
        let appender = tracing_appender::rolling::never(dir, file_name);
        fmt()
            .with_env_filter(env_filter)
            .with_writer(appender)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false)
            .compact()
            .init();
    }
}
