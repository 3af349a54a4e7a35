use clap::{Parser, Subcommand, ValueEnum};
use restore_core::constants::{remote, timing};
use std::fmt;
use std::path::PathBuf;

/// Barman 备份可恢复性校验
#[derive(Parser, Debug)]
#[command(name = "restore-check")]
#[command(about = "Restore the latest barman backups on a scratch host and verify they reach a consistent state")]
#[command(version)]
pub struct Cli {
    /// 要校验的集群，逗号或空白分隔；不指定则校验全部集群
    #[arg(short = 'c', long = "cluster-list", alias = "cluster_list")]
    pub cluster_list: Option<String>,

    /// 恢复主机
    #[arg(
        short = 'r',
        long = "restore-host",
        alias = "restore_host",
        default_value = remote::DEFAULT_RESTORE_HOST
    )]
    pub restore_host: String,

    /// 日志级别
    #[arg(
        short = 'L',
        long = "log-level",
        alias = "log_level",
        value_enum,
        ignore_case = true,
        default_value = "INFO"
    )]
    pub log_level: LogLevel,

    /// 日志文件，失败通知会附带其尾部
    #[arg(short = 'l', long = "log-file", alias = "log_file")]
    pub log_file: Option<PathBuf>,

    /// 失败通知收件人
    #[arg(short = 'm', long = "email-list", alias = "email_list")]
    pub email_list: Option<String>,

    /// 等待恢复实例达到一致状态的分钟数
    #[arg(
        short = 'w',
        long = "wait-for-recovery-min",
        alias = "wait_for_recovery_min",
        default_value_t = timing::DEFAULT_WAIT_FOR_RECOVERY_MIN,
        value_parser = clap::value_parser!(u32)
            .range(
                (timing::MIN_WAIT_FOR_RECOVERY_MIN as i64)..=(timing::MAX_WAIT_FOR_RECOVERY_MIN as i64)
            )
    )]
    pub wait_for_recovery_min: u32,

    /// 保留恢复出的实例，不停止也不删除
    #[arg(short = 'k', long = "keep")]
    pub keep: bool,

    /// 可调参数文件
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// 执行一次恢复校验（默认）
    Verify,
    /// 显示上次运行记录
    Status,
    /// 生成带注释的可调参数文件
    Init {
        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },
}

/// 命令行可选的日志级别
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[value(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Error,
    #[value(alias = "WARN")]
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    /// 对应的 tracing 过滤指令
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        };
        f.write_str(name)
    }
}
