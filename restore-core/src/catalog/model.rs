use crate::{RestoreError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use tokio_postgres::Config;
use tokio_postgres::config::{Host, SslMode};
use tracing::warn;

/// 备份状态，只有 `DONE` 可用于恢复
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupStatus {
    Done,
    Failed,
    Started,
    WaitingForWals,
    Empty,
    Syncing,
    Other(String),
}

impl BackupStatus {
    pub fn parse_status(s: &str) -> Self {
        match s {
            "DONE" => BackupStatus::Done,
            "FAILED" => BackupStatus::Failed,
            "STARTED" => BackupStatus::Started,
            "WAITING_FOR_WALS" => BackupStatus::WaitingForWals,
            "EMPTY" => BackupStatus::Empty,
            "SYNCING" => BackupStatus::Syncing,
            other => BackupStatus::Other(other.to_string()),
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, BackupStatus::Done)
    }
}

impl<'de> Deserialize<'de> for BackupStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(BackupStatus::parse_status(&s))
    }
}

/// 单个备份记录
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackupRecord {
    #[serde(skip)]
    pub id: String,
    pub status: BackupStatus,
    /// 恢复主机上的数据目录
    #[serde(default)]
    pub pgdata: String,
    /// 备份时源库的 server_version_num，如 150004
    #[serde(default)]
    pub version: u32,
}

impl BackupRecord {
    /// 二进制目录使用的主版本号
    /// 10 及以后只取主版本（15），之前为两段式（9.6）
    pub fn major_version(&self) -> String {
        if self.version >= 100_000 {
            format!("{}", self.version / 10_000)
        } else {
            format!("{}.{}", self.version / 10_000, self.version / 100 % 100)
        }
    }
}

/// 被保护的数据库集群
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub name: String,
    /// 生产主机（host 与 hostaddr 的全部取值），绝不能作为恢复目标
    ///
    /// 连接串无法解析或没有给出任何主机时为空，这样的集群不能被校验。
    pub source_hosts: Vec<String>,
    /// 原始连接串
    pub conninfo: String,
}

impl Cluster {
    pub fn from_conninfo(name: impl Into<String>, conninfo: impl Into<String>) -> Self {
        let name = name.into();
        let conninfo = conninfo.into();
        let source_hosts = match conninfo.parse::<Config>() {
            Ok(config) => config_hosts(&config),
            Err(e) => {
                warn!("集群 {} 的连接串无法解析: {}", name, e);
                Vec::new()
            }
        };

        Self {
            name,
            source_hosts,
            conninfo,
        }
    }

    /// 与恢复主机相同的源主机（不区分大小写）
    pub fn conflicting_host(&self, restore_host: &str) -> Option<&str> {
        self.source_hosts
            .iter()
            .find(|host| host.eq_ignore_ascii_case(restore_host))
            .map(String::as_str)
    }

    /// 恢复实例的探测连接配置
    ///
    /// 从连接串中只保留认证和会话参数，主机只有恢复主机，任何 host/hostaddr 都不会被带过去。
    /// 恢复实例不做 TLS。
    pub fn probe_config(&self, restore_host: &str) -> Result<Config> {
        let template: Config = self.conninfo.parse()?;

        let mut config = Config::new();
        config.host(restore_host);
        if let Some(port) = template.get_ports().first() {
            config.port(*port);
        }
        if let Some(user) = template.get_user() {
            config.user(user);
        }
        if let Some(password) = template.get_password() {
            config.password(password);
        }
        if let Some(dbname) = template.get_dbname() {
            config.dbname(dbname);
        }
        if let Some(options) = template.get_options() {
            config.options(options);
        }
        if let Some(application_name) = template.get_application_name() {
            config.application_name(application_name);
        }
        if let Some(timeout) = template.get_connect_timeout() {
            config.connect_timeout(*timeout);
        }
        config.ssl_mode(SslMode::Disable);
        Ok(config)
    }
}

/// 连接配置中的全部主机，含 hostaddr
pub fn config_hosts(config: &Config) -> Vec<String> {
    config
        .get_hosts()
        .iter()
        .map(host_label)
        .chain(config.get_hostaddrs().iter().map(|addr| addr.to_string()))
        .collect()
}

fn host_label(host: &Host) -> String {
    match host {
        Host::Tcp(name) => name.clone(),
        #[cfg(unix)]
        Host::Unix(path) => path.display().to_string(),
    }
}

/// 目录中一个集群的完整条目
#[derive(Debug, Clone)]
pub struct ClusterEntry {
    pub cluster: Cluster,
    pub backups: Vec<BackupRecord>,
}

impl ClusterEntry {
    /// 最近一次完成的备份（标识按字典序最大）
    pub fn latest_done_backup(&self) -> Option<&BackupRecord> {
        self.backups
            .iter()
            .filter(|b| b.status.is_usable())
            .max_by(|a, b| a.id.cmp(&b.id))
    }
}

/// 备份目录快照
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    clusters: BTreeMap<String, ClusterEntry>,
}

#[derive(Deserialize)]
struct Diagnose {
    servers: BTreeMap<String, DiagnoseServer>,
}

#[derive(Deserialize)]
struct DiagnoseServer {
    config: DiagnoseConfig,
    #[serde(default)]
    backups: BTreeMap<String, BackupRecord>,
}

#[derive(Deserialize)]
struct DiagnoseConfig {
    conninfo: String,
}

impl Catalog {
    /// 解析 `barman diagnose` 的 JSON 输出
    pub fn from_diagnose_json(json: &str) -> Result<Self> {
        let diagnose: Diagnose = serde_json::from_str(json)?;
        if diagnose.servers.is_empty() {
            return Err(RestoreError::catalog("barman diagnose 未返回任何集群"));
        }

        let clusters = diagnose
            .servers
            .into_iter()
            .map(|(name, server)| {
                let backups = server
                    .backups
                    .into_iter()
                    .map(|(id, mut record)| {
                        record.id = id;
                        record
                    })
                    .collect();
                let entry = ClusterEntry {
                    cluster: Cluster::from_conninfo(name.clone(), server.config.conninfo),
                    backups,
                };
                (name, entry)
            })
            .collect();

        Ok(Self { clusters })
    }

    /// 由已构造的条目组成目录
    pub fn from_entries(entries: impl IntoIterator<Item = ClusterEntry>) -> Self {
        Self {
            clusters: entries
                .into_iter()
                .map(|entry| (entry.cluster.name.clone(), entry))
                .collect(),
        }
    }

    /// 全部集群名（有序）
    pub fn cluster_names(&self) -> Vec<String> {
        self.clusters.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&ClusterEntry> {
        self.clusters.get(name)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackupStatus::Done => "DONE",
            BackupStatus::Failed => "FAILED",
            BackupStatus::Started => "STARTED",
            BackupStatus::WaitingForWals => "WAITING_FOR_WALS",
            BackupStatus::Empty => "EMPTY",
            BackupStatus::Syncing => "SYNCING",
            BackupStatus::Other(other) => other,
        };
        write!(f, "{s}")
    }
}
