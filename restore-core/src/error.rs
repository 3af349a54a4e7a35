use thiserror::Error;

pub type Result<T> = std::result::Result<T, RestoreError>;

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("配置错误: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("数据库连接错误: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("系统调用错误: {0}")]
    Nix(#[from] nix::Error),

    #[error("命令执行失败: {0}")]
    Command(String),

    #[error("备份目录错误: {0}")]
    Catalog(String),

    #[error("未知集群: {0}")]
    UnknownCluster(String),

    #[error("集群 {cluster} 的源主机 {host} 与恢复主机相同，出于安全原因拒绝执行")]
    SourceHostConflict { cluster: String, host: String },

    #[error("无法从集群 {0} 的连接串确定源主机，出于安全原因拒绝执行")]
    UnknownSourceHost(String),

    #[error("运行状态文件格式无效: {0}")]
    InvalidStatus(String),

    #[error("邮件发送失败: {0}")]
    Mail(String),

    #[error("自定义错误: {0}")]
    Custom(String),
}

impl From<lettre::error::Error> for RestoreError {
    fn from(err: lettre::error::Error) -> Self {
        RestoreError::Mail(err.to_string())
    }
}

impl From<lettre::address::AddressError> for RestoreError {
    fn from(err: lettre::address::AddressError) -> Self {
        RestoreError::Mail(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for RestoreError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        RestoreError::Mail(err.to_string())
    }
}

impl RestoreError {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    pub fn command(msg: impl Into<String>) -> Self {
        Self::Command(msg.into())
    }

    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }
}
