// 私有模块声明
mod app;
mod cli;
mod commands;
mod init;
mod utils;
mod validate;

// 通过 pub use 精确控制对外暴露的接口
pub use app::{AppError, CliApp, exit_code};
pub use cli::{Cli, Commands, LogLevel};
pub use commands::{run_status, run_verify, verify_with};
pub use init::run_init;
pub use utils::setup_logging;
pub use validate::{UsageError, check_log_file};
