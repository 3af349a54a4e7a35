use crate::constants::{notify, paths, postgres, remote, timing};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 一次校验运行的不可变配置
///
/// 启动时构造一次，以引用方式传给目录客户端、工作流和通知器。
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// 显式指定的集群列表，为空表示目录中的全部集群
    pub clusters: Vec<String>,
    /// 恢复主机
    pub restore_host: String,
    /// 日志文件（通知器读取其尾部）
    pub log_file: Option<PathBuf>,
    /// 失败通知收件人
    pub email_list: Vec<String>,
    /// 最大探测次数（分钟）
    pub wait_for_recovery_min: u32,
    /// 保留恢复出的实例，不做清理
    pub keep: bool,
    /// 可调参数
    pub tunables: Tunables,
}

impl VerifyConfig {
    /// 以默认可调参数创建配置
    pub fn new(restore_host: impl Into<String>) -> Self {
        Self {
            clusters: Vec::new(),
            restore_host: restore_host.into(),
            log_file: None,
            email_list: Vec::new(),
            wait_for_recovery_min: timing::DEFAULT_WAIT_FOR_RECOVERY_MIN,
            keep: false,
            tunables: Tunables::default(),
        }
    }
}

/// 可调参数，可从 TOML 文件加载，缺省字段使用内置默认值
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Tunables {
    pub remote: RemoteConfig,
    pub postgres: PostgresConfig,
    pub timing: TimingConfig,
    pub state: StateConfig,
    pub mail: MailConfig,
}

/// 远程执行相关配置
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RemoteConfig {
    pub ssh_user: String,
    pub barman_bin: String,
    pub pg_bin_template: String,
}

/// 恢复实例配置修改相关
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PostgresConfig {
    pub shared_buffers: String,
}

/// 时间相关配置（秒）
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TimingConfig {
    pub settle_delay_secs: u64,
    pub poll_interval_secs: u64,
    pub teardown_delay_secs: u64,
}

/// 持久化状态路径
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StateConfig {
    pub lock_file: PathBuf,
    pub status_file: PathBuf,
}

/// 邮件相关配置
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub log_excerpt_bytes: u64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            remote: RemoteConfig::default(),
            postgres: PostgresConfig::default(),
            timing: TimingConfig::default(),
            state: StateConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            ssh_user: remote::SERVICE_ACCOUNT.to_string(),
            barman_bin: remote::BARMAN_BIN.to_string(),
            pg_bin_template: remote::PG_BIN_TEMPLATE.to_string(),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            shared_buffers: postgres::DEFAULT_SHARED_BUFFERS.to_string(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: timing::SETTLE_DELAY_SECS,
            poll_interval_secs: timing::POLL_INTERVAL_SECS,
            teardown_delay_secs: timing::TEARDOWN_DELAY_SECS,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            lock_file: PathBuf::from(paths::LOCK_FILE),
            status_file: PathBuf::from(paths::STATUS_FILE),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: notify::SMTP_HOST.to_string(),
            smtp_port: notify::SMTP_PORT,
            log_excerpt_bytes: notify::LOG_EXCERPT_BYTES,
        }
    }
}

impl TimingConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn teardown_delay(&self) -> Duration {
        Duration::from_secs(self.teardown_delay_secs)
    }
}

impl RemoteConfig {
    /// 指定主版本号对应的 PostgreSQL 二进制目录
    pub fn pg_bin_dir(&self, major: &str) -> String {
        self.pg_bin_template.replace("{major}", major)
    }
}

impl Tunables {
    /// 查找并加载可调参数
    /// 显式路径必须存在；未指定时仅在默认文件存在时加载，否则使用内置默认值
    pub fn find_and_load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::info!("加载配置文件: {}", path.display());
            return Self::load_from_file(path);
        }

        let default_path = Path::new(paths::DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            tracing::info!("找到配置文件: {}", default_path.display());
            return Self::load_from_file(default_path);
        }

        tracing::debug!("未找到配置文件，使用内置默认值");
        Ok(Self::default())
    }

    /// 从指定文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let tunables: Tunables = toml::from_str(&content)?;
        Ok(tunables)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_with_comments();
        fs::write(&path, content)?;
        Ok(())
    }

    /// 生成带注释的TOML配置
    fn to_toml_with_comments(&self) -> String {
        const TEMPLATE: &str = include_str!("../templates/restore-check.toml.template");

        TEMPLATE
            .replace("{ssh_user}", &self.remote.ssh_user)
            .replace("{barman_bin}", &self.remote.barman_bin)
            .replace("{pg_bin_template}", &self.remote.pg_bin_template)
            .replace("{shared_buffers}", &self.postgres.shared_buffers)
            .replace(
                "{settle_delay_secs}",
                &self.timing.settle_delay_secs.to_string(),
            )
            .replace(
                "{poll_interval_secs}",
                &self.timing.poll_interval_secs.to_string(),
            )
            .replace(
                "{teardown_delay_secs}",
                &self.timing.teardown_delay_secs.to_string(),
            )
            .replace("{lock_file}", &self.state.lock_file.to_string_lossy())
            .replace("{status_file}", &self.state.status_file.to_string_lossy())
            .replace("{smtp_host}", &self.mail.smtp_host)
            .replace("{smtp_port}", &self.mail.smtp_port.to_string())
            .replace(
                "{log_excerpt_bytes}",
                &self.mail.log_excerpt_bytes.to_string(),
            )
    }
}
