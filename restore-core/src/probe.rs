use crate::constants::postgres;
use async_trait::async_trait;
use std::error::Error as StdError;
use std::io;
use tokio_postgres::NoTls;
pub use tokio_postgres::Config;
use tokio_postgres::error::SqlState;
use tracing::debug;

/// 单次一致性探测的分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 查询返回期望值，实例已达到一致状态
    Success,
    /// 服务端仍在启动或恢复中
    TransientStartingUp,
    /// 其他错误，保守起见继续重试
    TransientOther(String),
    /// 监听端口拒绝连接，实例没有启动
    ConnectionRefused(String),
}

impl ProbeOutcome {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProbeOutcome::TransientStartingUp | ProbeOutcome::TransientOther(_)
        )
    }
}

/// 失败时可用于分类的结构化信息
#[derive(Debug, Clone, Default)]
pub struct ProbeFailure {
    /// 服务端返回的 SQLSTATE
    pub sqlstate: Option<SqlState>,
    /// 底层 I/O 错误类型
    pub io_kind: Option<io::ErrorKind>,
    pub message: String,
}

/// 探测结果分类，轮询逻辑只依赖这一个函数
pub fn classify(result: std::result::Result<i32, ProbeFailure>) -> ProbeOutcome {
    match result {
        Ok(value) if value == postgres::PROBE_EXPECTED => ProbeOutcome::Success,
        Ok(value) => ProbeOutcome::TransientOther(format!(
            "探测返回 {value}，期望 {}",
            postgres::PROBE_EXPECTED
        )),
        Err(failure) if failure.io_kind == Some(io::ErrorKind::ConnectionRefused) => {
            ProbeOutcome::ConnectionRefused(failure.message)
        }
        // 57P03: the database system is starting up / not yet accepting connections
        Err(failure) if failure.sqlstate == Some(SqlState::CANNOT_CONNECT_NOW) => {
            ProbeOutcome::TransientStartingUp
        }
        Err(failure) => ProbeOutcome::TransientOther(failure.message),
    }
}

impl From<&tokio_postgres::Error> for ProbeFailure {
    fn from(err: &tokio_postgres::Error) -> Self {
        let mut io_kind = None;
        let mut source = err.source();
        while let Some(cause) = source {
            if let Some(io_err) = cause.downcast_ref::<io::Error>() {
                io_kind = Some(io_err.kind());
                break;
            }
            source = cause.source();
        }

        Self {
            sqlstate: err.code().cloned(),
            io_kind,
            message: err.to_string(),
        }
    }
}

/// 一致性探测器
#[async_trait]
pub trait ConsistencyProbe: Send + Sync {
    async fn probe(&self, target: &Config) -> ProbeOutcome;
}

/// 基于 tokio-postgres 的探测器：连接后执行 `SELECT 42`
///
/// 不协商 TLS，目标配置需要是 `sslmode=disable`。
#[derive(Debug, Clone, Default)]
pub struct PostgresProbe;

impl PostgresProbe {
    pub fn new() -> Self {
        Self
    }

    async fn query(target: &Config) -> std::result::Result<i32, tokio_postgres::Error> {
        let (client, connection) = target.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("探测连接关闭: {}", e);
            }
        });

        let row = client.query_one(postgres::PROBE_QUERY, &[]).await?;
        row.try_get::<_, i32>(0)
    }
}

#[async_trait]
impl ConsistencyProbe for PostgresProbe {
    async fn probe(&self, target: &Config) -> ProbeOutcome {
        let result = Self::query(target)
            .await
            .map_err(|e| ProbeFailure::from(&e));
        classify(result)
    }
}
