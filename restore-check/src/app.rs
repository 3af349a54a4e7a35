use crate::cli::{Cli, Commands};
use crate::commands;
use crate::init::run_init;
use crate::validate::{self, UsageError};
use restore_core::RestoreError;
use restore_core::config::{Tunables, VerifyConfig};
use tracing::error;

/// 进程退出码
pub mod exit_code {
    /// 全部一致，或另一个进程持有锁
    pub const SUCCESS: i32 = 0;
    /// 至少一个集群校验失败，或运行期错误
    pub const FAILURE: i32 = 1;
    /// 参数用法错误
    pub const USAGE: i32 = 2;
}

/// 应用层错误，决定退出码
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Runtime(#[from] RestoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Usage(_) => exit_code::USAGE,
            AppError::Runtime(RestoreError::Config(_)) => exit_code::USAGE,
            AppError::Runtime(_) | AppError::Other(_) => exit_code::FAILURE,
        }
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// 命令行应用：持有解析后的参数，按子命令分派
pub struct CliApp {
    cli: Cli,
}

impl CliApp {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// 运行子命令并返回退出码
    pub async fn run(&self) -> i32 {
        let result = match &self.cli.command {
            Some(Commands::Init { force }) => run_init(self.cli.config.as_deref(), *force)
                .map(|()| exit_code::SUCCESS)
                .map_err(AppError::from),
            Some(Commands::Status) => self
                .load_tunables()
                .and_then(|tunables| commands::run_status(&tunables).map_err(AppError::from)),
            Some(Commands::Verify) | None => self.run_verify().await,
        };

        match result {
            Ok(code) => code,
            Err(e) => {
                error!("{}", e);
                e.exit_code()
            }
        }
    }

    async fn run_verify(&self) -> AppResult<i32> {
        let config = self.build_config()?;
        commands::run_verify(&config, self.cli.log_level).await
    }

    fn load_tunables(&self) -> AppResult<Tunables> {
        Ok(Tunables::find_and_load(self.cli.config.as_deref())?)
    }

    /// 加载可调参数并校验命令行参数
    pub fn build_config(&self) -> AppResult<VerifyConfig> {
        let tunables = self.load_tunables()?;
        Ok(validate::build_config(&self.cli, tunables)?)
    }
}
