use super::outcome::{ClusterReport, Outcome, TeardownStatus};
use super::plan::VerificationTarget;
use crate::catalog::{BackupRecord, BarmanClient, Cluster};
use crate::config::VerifyConfig;
use crate::constants::postgres;
use crate::executor::{self, CommandRunner, ConfigEdit, RemoteHost, RemoteOp};
use crate::probe::{Config, ConsistencyProbe, ProbeOutcome};
use std::fmt;
use tracing::{debug, error, info, warn};

/// 恢复校验状态机的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    LocationCheck,
    Restoring,
    ConfigPatch,
    Starting,
    Polling,
    Teardown,
    Done,
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 每个步骤的结果：成功继续，失败给出终态
type Step = std::result::Result<(), Outcome>;

/// 一次恢复校验（一个集群 + 一个备份）
pub struct RecoveryAttempt<'a> {
    config: &'a VerifyConfig,
    runner: &'a dyn CommandRunner,
    probe: &'a dyn ConsistencyProbe,
    cluster: &'a Cluster,
    backup: &'a BackupRecord,
    probe_target: &'a Config,
    host: RemoteHost,
    state: RecoveryState,
    poll_count: u32,
}

impl<'a> RecoveryAttempt<'a> {
    pub fn new(
        config: &'a VerifyConfig,
        runner: &'a dyn CommandRunner,
        probe: &'a dyn ConsistencyProbe,
        target: &'a VerificationTarget,
        backup: &'a BackupRecord,
    ) -> Self {
        Self {
            host: RemoteHost::new(&config.tunables.remote.ssh_user, &config.restore_host),
            config,
            runner,
            probe,
            cluster: target.cluster(),
            backup,
            probe_target: target.probe_config(),
            state: RecoveryState::LocationCheck,
            poll_count: 0,
        }
    }

    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// 运行状态机直到终态，并在需要时清理
    pub async fn run(mut self) -> ClusterReport {
        if let Err(outcome) = self.check_location().await {
            self.enter(RecoveryState::Done);
            return self.report(outcome, TeardownStatus::NotNeeded);
        }

        let outcome = match self.verify().await {
            Ok(()) => Outcome::Consistent,
            Err(outcome) => outcome,
        };

        let teardown = if self.config.keep {
            info!(" Parameter -k (keep) is specified. The restored backups won't be deleted");
            info!(" Manually delete recovery pgdata directory before the next run");
            TeardownStatus::Kept
        } else {
            self.teardown().await
        };

        self.enter(RecoveryState::Done);
        self.report(outcome, teardown)
    }

    /// 恢复、修改配置、启动、等待一致
    async fn verify(&mut self) -> Step {
        self.restore().await?;
        self.patch_config().await?;
        self.start().await?;
        self.poll().await
    }

    fn enter(&mut self, state: RecoveryState) {
        debug!("{}: {} -> {}", self.cluster.name, self.state, state);
        self.state = state;
    }

    fn report(&self, outcome: Outcome, teardown: TeardownStatus) -> ClusterReport {
        ClusterReport {
            cluster: self.cluster.name.clone(),
            backup_id: Some(self.backup.id.clone()),
            outcome,
            teardown,
            poll_count: self.poll_count,
        }
    }

    fn data_dir(&self) -> &str {
        &self.backup.pgdata
    }

    fn bin_dir(&self) -> String {
        self.config
            .tunables
            .remote
            .pg_bin_dir(&self.backup.major_version())
    }

    async fn run_remote(&self, op: RemoteOp) -> bool {
        executor::execute_checked(self.runner, &self.host.command(&op)).await
    }

    /// 恢复目录已存在则拒绝继续，避免覆盖上次未完成运行留下的现场
    async fn check_location(&mut self) -> Step {
        self.enter(RecoveryState::LocationCheck);
        let op = RemoteOp::TestDirectory {
            path: self.data_dir().to_string(),
        };
        debug!(" Verify if recovery location already exist: {}", self.host.command(&op));

        let output = executor::execute(self.runner, &self.host.command(&op)).await;
        match output {
            Ok(output) if output.success() => {
                error!(
                    " Recovery location {}:{} for cluster {} already exist. Skipping recovery to avoid accidental database corruption.",
                    self.config.restore_host,
                    self.data_dir(),
                    self.cluster.name
                );
                info!(
                    " Verify if recovery location is correct and if the previous run cleaned up after itself"
                );
                Err(Outcome::StaleLocation)
            }
            Ok(_) => Ok(()),
            Err(e) => {
                // 无法确认目录不存在时不能进行破坏性操作
                error!(" Cannot verify recovery location {}: {}", self.data_dir(), e);
                Err(Outcome::StaleLocation)
            }
        }
    }

    async fn restore(&mut self) -> Step {
        self.enter(RecoveryState::Restoring);
        let catalog = BarmanClient::new(self.runner, &self.config.tunables.remote.barman_bin);
        if catalog.recover(self.cluster, self.backup, &self.host).await {
            Ok(())
        } else {
            error!(
                " Cannot restore backup {} for cluster {}",
                self.backup.id, self.cluster.name
            );
            Err(Outcome::RestoreFailed)
        }
    }

    async fn patch_config(&mut self) -> Step {
        self.enter(RecoveryState::ConfigPatch);
        let config_file = format!(
            "{}/{}",
            self.data_dir().trim_end_matches('/'),
            postgres::CONFIG_FILE_NAME
        );
        let edits = ConfigEdit::restore_host_edits(
            self.data_dir(),
            &self.config.tunables.postgres.shared_buffers,
        );

        for edit in edits {
            let setting = edit.setting();
            let op = RemoteOp::PatchSetting {
                config_file: config_file.clone(),
                edit,
            };
            if !self.run_remote(op).await {
                error!(
                    " Could not patch {} in {} for {}. Skipping it.",
                    setting, config_file, self.cluster.name
                );
                return Err(Outcome::ConfigPatchFailed);
            }
        }
        Ok(())
    }

    async fn start(&mut self) -> Step {
        self.enter(RecoveryState::Starting);
        let op = RemoteOp::StartEngine {
            bin_dir: self.bin_dir(),
            data_dir: self.data_dir().to_string(),
        };
        if !self.run_remote(op).await {
            error!(" Could not start PostgreSQL for {}. Skipping it.", self.cluster.name);
            return Err(Outcome::StartFailed);
        }

        tokio::time::sleep(self.config.tunables.timing.settle_delay()).await;
        Ok(())
    }

    /// 有界轮询：拒绝连接立即失败，其余失败视为暂时性，最多探测 `wait_for_recovery_min` 次
    async fn poll(&mut self) -> Step {
        self.enter(RecoveryState::Polling);
        debug!(" probe target={:?}", self.probe_target);

        let max_attempts = self.config.wait_for_recovery_min;
        let interval = self.config.tunables.timing.poll_interval();

        for attempt in 1..=max_attempts {
            self.poll_count = attempt;
            match self.probe.probe(self.probe_target).await {
                ProbeOutcome::Success => {
                    info!(
                        " Backup {} for {} is OK.",
                        self.backup.id, self.cluster.name
                    );
                    return Ok(());
                }
                ProbeOutcome::ConnectionRefused(reason) => {
                    error!(" DB server failed to start: {}", reason);
                    return Err(Outcome::ConnectionRefused);
                }
                ProbeOutcome::TransientStartingUp => {}
                ProbeOutcome::TransientOther(reason) => warn!("{}", reason),
            }

            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
                info!(
                    " Waited for {} minutes out of {} for postgres to reach consistent state on {}.",
                    attempt, max_attempts, self.config.restore_host
                );
            }
        }

        error!(
            " PostgreSQL has not reached consistent state on {} after {} minutes.",
            self.config.restore_host, max_attempts
        );
        Err(Outcome::ConsistencyTimeout)
    }

    /// 立即停止实例再删除数据目录；停止失败时保留目录
    async fn teardown(&mut self) -> TeardownStatus {
        self.enter(RecoveryState::Teardown);
        let stop = RemoteOp::StopEngine {
            bin_dir: self.bin_dir(),
            data_dir: self.data_dir().to_string(),
        };
        if !self.run_remote(stop).await {
            error!(
                " Could not stop PostgreSQL for {} on {}, {} is left in place",
                self.cluster.name,
                self.config.restore_host,
                self.data_dir()
            );
            return TeardownStatus::Failed;
        }

        tokio::time::sleep(self.config.tunables.timing.teardown_delay()).await;

        let remove = RemoteOp::RemoveDirectory {
            path: self.data_dir().to_string(),
        };
        if !self.run_remote(remove).await {
            error!(
                " Could not remove {}:{} for {}",
                self.config.restore_host,
                self.data_dir(),
                self.cluster.name
            );
            return TeardownStatus::Failed;
        }

        TeardownStatus::Succeeded
    }
}

/// 校验一个目标：没有可用备份时不执行任何远程操作
pub async fn verify_target(
    config: &VerifyConfig,
    runner: &dyn CommandRunner,
    probe: &dyn ConsistencyProbe,
    target: &VerificationTarget,
) -> ClusterReport {
    let cluster = target.cluster();
    let Some(backup) = target.backup() else {
        error!(" Cannot find the latest backup for cluster {}", cluster.name);
        return ClusterReport {
            cluster: cluster.name.clone(),
            backup_id: None,
            outcome: Outcome::NoUsableBackup,
            teardown: TeardownStatus::NotNeeded,
            poll_count: 0,
        };
    };

    debug!(" cluster={}; backup={}", cluster.name, backup.id);
    RecoveryAttempt::new(config, runner, probe, target, backup)
        .run()
        .await
}
