mod command;
mod shell;

pub use command::{CatalogOp, CommandLine, ConfigEdit, RemoteHost, RemoteOp, shell_quote};
pub use shell::ShellRunner;

use crate::Result;
use async_trait::async_trait;
use tracing::{debug, error, info};

/// 命令执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// 退出码，被信号终止时为 None
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// 用于日志的退出码，被信号终止时记为 -1
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(-1)
    }
}

/// 命令执行器
///
/// 只有进程无法启动时才返回错误；非零退出码通过 [`CommandOutput`] 返回，由调用方决定如何处理。
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandLine) -> Result<CommandOutput>;
}

/// 执行命令并把输出写入日志：stdout 记为 info，stderr 记为 error
pub async fn execute(runner: &dyn CommandRunner, command: &CommandLine) -> Result<CommandOutput> {
    debug!("执行命令: {}", command);
    let output = runner.run(command).await?;

    if !output.stdout.trim().is_empty() {
        info!(" Command stdout:");
        info!("{}", output.stdout.trim_end());
    }
    if !output.stderr.trim().is_empty() {
        error!(" Command stderr:");
        error!("{}", output.stderr.trim_end());
    }

    Ok(output)
}

/// 执行命令并只关心是否成功；启动失败同样记为失败
pub async fn execute_checked(runner: &dyn CommandRunner, command: &CommandLine) -> bool {
    match execute(runner, command).await {
        Ok(output) if output.success() => true,
        Ok(output) => {
            debug!("命令退出码: {}", output.exit_code());
            false
        }
        Err(e) => {
            error!("命令无法执行: {}: {}", command, e);
            false
        }
    }
}
