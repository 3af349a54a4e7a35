mod attempt;
mod outcome;
mod plan;

#[cfg(test)]
mod tests;

// 重新导出公共接口
pub use attempt::{RecoveryAttempt, RecoveryState, verify_target};
pub use outcome::{ClusterReport, Outcome, RunOutcome, TeardownStatus};
pub use plan::{VerificationTarget, resolve_targets};

use crate::Result;
use crate::config::VerifyConfig;
use crate::executor::CommandRunner;
use crate::lock::InstanceLock;
use crate::notifier::{self, Notifier};
use crate::probe::ConsistencyProbe;
use crate::status::RunStatusStore;
use chrono::Local;
use tracing::{debug, info, warn};

/// 一次运行的结果
#[derive(Debug)]
pub enum RunResult {
    /// 另一个进程正在校验，本次什么也没做
    AlreadyRunning,
    Completed(RunOutcome),
}

/// 恢复校验器：按顺序逐个校验集群并汇总结果
pub struct Verifier<'a> {
    config: &'a VerifyConfig,
    runner: &'a dyn CommandRunner,
    probe: &'a dyn ConsistencyProbe,
    notifier: &'a dyn Notifier,
}

impl<'a> Verifier<'a> {
    pub fn new(
        config: &'a VerifyConfig,
        runner: &'a dyn CommandRunner,
        probe: &'a dyn ConsistencyProbe,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            config,
            runner,
            probe,
            notifier,
        }
    }

    /// 持有单实例锁完成一次运行，并把汇总结果写入状态文件
    pub async fn run(&self, targets: &[VerificationTarget]) -> Result<RunResult> {
        let Some(_lock) = InstanceLock::acquire(&self.config.tunables.state.lock_file)? else {
            warn!(" Another process is checking backups already. Exiting.");
            return Ok(RunResult::AlreadyRunning);
        };

        let store = RunStatusStore::new(&self.config.tunables.state.status_file);
        self.log_previous_run(&store);

        let outcome = self.verify_all(targets).await;

        info!("{}", outcome.summary());
        store.write(&outcome.to_run_status())?;
        Ok(RunResult::Completed(outcome))
    }

    /// 逐个校验，一个集群失败不影响后续集群
    pub async fn verify_all(&self, targets: &[VerificationTarget]) -> RunOutcome {
        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            let report = verify_target(self.config, self.runner, self.probe, target).await;
            info!(
                "集群 {} 校验结束: {} ({})",
                report.cluster,
                report.final_outcome().display_name(),
                report.final_outcome().code()
            );
            if report.is_problem() {
                notifier::notify_failure(self.notifier, self.config, &report.cluster).await;
            }
            reports.push(report);
        }
        RunOutcome::from_reports(reports)
    }

    /// 读取上次运行记录，仅用于日志
    ///
    /// 当天已校验时并不跳过本次运行，每次调用都会重新校验。
    fn log_previous_run(&self, store: &RunStatusStore) {
        match store.read() {
            Ok(Some(previous)) => {
                let now = Local::now();
                debug!(
                    " last = {:?}; current_date = {}; checked today = {}",
                    previous.recorded_at(),
                    now,
                    previous.is_same_day(now)
                );
            }
            Ok(None) => debug!("没有上次运行记录: {}", store.path().display()),
            Err(e) => warn!("无法读取上次运行记录 {}: {}", store.path().display(), e),
        }
    }
}
