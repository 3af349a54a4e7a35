use crate::cli::Cli;
use regex::Regex;
use restore_core::RestoreError;
use restore_core::config::{Tunables, VerifyConfig};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static CLUSTER_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());

static EMAIL_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_@.-]").unwrap());

static EMAIL_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[_a-z0-9-]+(\.[_a-z0-9-]+)*@[a-z0-9-]+(\.[a-z0-9-]+)*(\.[a-z]{2,4})$").unwrap()
});

/// 参数用法错误，进程以退出码 2 结束
#[derive(Error, Debug)]
pub enum UsageError {
    #[error("邮件地址格式错误: {0}")]
    MalformedEmail(String),

    #[error("无法写入日志文件 {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Target(RestoreError),
}

impl UsageError {
    /// 目标解析错误中属于用法错误的部分
    pub fn from_target_error(err: RestoreError) -> std::result::Result<Self, RestoreError> {
        match err {
            RestoreError::UnknownCluster(_)
            | RestoreError::UnknownSourceHost(_)
            | RestoreError::SourceHostConflict { .. } => Ok(UsageError::Target(err)),
            other => Err(other),
        }
    }
}

/// 按非单词字符拆分集群列表
pub fn split_cluster_list(raw: &str) -> Vec<String> {
    CLUSTER_SEPARATOR
        .split(raw)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// 按地址字符集之外的字符拆分收件人列表
pub fn split_email_list(raw: &str) -> Vec<String> {
    EMAIL_SEPARATOR
        .split(raw)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn validate_email(address: &str) -> Result<(), UsageError> {
    if EMAIL_ADDRESS.is_match(address) {
        Ok(())
    } else {
        Err(UsageError::MalformedEmail(address.to_string()))
    }
}

/// 确认日志文件可以追加写入（不存在时创建）
pub fn check_log_file(path: &Path) -> Result<(), UsageError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|source| UsageError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// 校验命令行参数并构造运行配置
pub fn build_config(cli: &Cli, tunables: Tunables) -> Result<VerifyConfig, UsageError> {
    if let Some(log_file) = &cli.log_file {
        check_log_file(log_file)?;
    }

    let email_list = cli
        .email_list
        .as_deref()
        .map(split_email_list)
        .unwrap_or_default();
    for address in &email_list {
        validate_email(address)?;
    }

    let mut config = VerifyConfig::new(cli.restore_host.clone());
    config.clusters = cli
        .cluster_list
        .as_deref()
        .map(split_cluster_list)
        .unwrap_or_default();
    config.log_file = cli.log_file.clone();
    config.email_list = email_list;
    config.wait_for_recovery_min = cli.wait_for_recovery_min;
    config.keep = cli.keep;
    config.tunables = tunables;
    Ok(config)
}
