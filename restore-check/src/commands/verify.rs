use crate::app::{AppError, AppResult, exit_code};
use crate::cli::LogLevel;
use crate::validate::UsageError;
use restore_core::catalog::BarmanClient;
use restore_core::config::VerifyConfig;
use restore_core::executor::{CommandRunner, ShellRunner};
use restore_core::notifier::{MailNotifier, Notifier};
use restore_core::probe::{ConsistencyProbe, PostgresProbe};
use restore_core::workflow::{RunResult, Verifier, resolve_targets};
use tracing::info;

/// 以真实的 ssh/barman/PostgreSQL/SMTP 实现执行一次校验
pub async fn run_verify(config: &VerifyConfig, log_level: LogLevel) -> AppResult<i32> {
    let runner = ShellRunner::new();
    let probe = PostgresProbe::new();
    let notifier = MailNotifier::new(env!("CARGO_PKG_NAME"), config);
    verify_with(config, log_level, &runner, &probe, &notifier).await
}

/// 读取目录、解析目标、持锁逐个校验，返回退出码
pub async fn verify_with(
    config: &VerifyConfig,
    log_level: LogLevel,
    runner: &dyn CommandRunner,
    probe: &dyn ConsistencyProbe,
    notifier: &dyn Notifier,
) -> AppResult<i32> {
    let catalog = BarmanClient::new(runner, &config.tunables.remote.barman_bin)
        .diagnose()
        .await?;

    let targets = resolve_targets(&catalog, config).map_err(|e| {
        UsageError::from_target_error(e).map_or_else(AppError::from, AppError::from)
    })?;

    for line in params_lines(config, log_level) {
        info!("{}", line);
    }

    match Verifier::new(config, runner, probe, notifier)
        .run(&targets)
        .await?
    {
        RunResult::AlreadyRunning => Ok(exit_code::SUCCESS),
        RunResult::Completed(outcome) => Ok(outcome.status()),
    }
}

/// 本次运行的参数回显
fn params_lines(config: &VerifyConfig, log_level: LogLevel) -> Vec<String> {
    let log_file = config
        .log_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    vec![
        " Parameters:".to_string(),
        format!(" cluster_list: {:?} ", config.clusters),
        format!(" restore_host: {} ", config.restore_host),
        format!(" log_level: {} ", log_level),
        format!(" log_file: {} ", log_file),
        format!(" email_list: {:?} ", config.email_list),
        format!(" wait_for_recovery_min: {} ", config.wait_for_recovery_min),
        format!(" keep: {} ", config.keep),
    ]
}
