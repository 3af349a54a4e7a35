use super::*;
use crate::RestoreError;
use crate::catalog::{BackupRecord, BackupStatus, Catalog, Cluster, ClusterEntry, config_hosts};
use crate::config::VerifyConfig;
use crate::executor::{CommandLine, CommandOutput, CommandRunner};
use crate::notifier::Notifier;
use crate::probe::{Config, ConsistencyProbe, ProbeOutcome};
use crate::status::RunStatusStore;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tempfile::TempDir;

/// 按命令种类记录调用并返回预设退出码
#[derive(Default)]
struct FakeRunner {
    calls: Mutex<Vec<String>>,
    existing_dirs: HashSet<String>,
    failing: HashSet<&'static str>,
}

impl FakeRunner {
    fn failing(kinds: &[&'static str]) -> Self {
        Self {
            failing: kinds.iter().copied().collect(),
            ..Default::default()
        }
    }

    fn with_existing_dir(mut self, dir: &str) -> Self {
        self.existing_dirs.insert(dir.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn kind(command: &CommandLine) -> &'static str {
        if command.program != "ssh" {
            return match command.args.first().map(String::as_str) {
                Some("recover") => "recover",
                Some("diagnose") => "diagnose",
                _ => "local",
            };
        }
        let remote = command.args.last().map(String::as_str).unwrap_or_default();
        if remote.starts_with("test -d") {
            "test"
        } else if remote.starts_with("sed -i") {
            "sed"
        } else if remote.contains("pg_ctl start") {
            "start"
        } else if remote.contains("pg_ctl stop") {
            "stop"
        } else if remote.starts_with("rm -rf") {
            "rm"
        } else {
            "remote"
        }
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, command: &CommandLine) -> crate::Result<CommandOutput> {
        let kind = Self::kind(command);
        self.calls.lock().unwrap().push(kind.to_string());

        let success = if kind == "test" {
            let remote = command.args.last().cloned().unwrap_or_default();
            self.existing_dirs
                .iter()
                .any(|dir| remote.ends_with(dir.as_str()))
        } else {
            !self.failing.contains(kind)
        };

        Ok(CommandOutput {
            code: Some(if success { 0 } else { 1 }),
            stdout: String::new(),
            stderr: if success {
                String::new()
            } else {
                format!("{kind} failed")
            },
        })
    }
}

/// 按脚本依次返回探测结果，脚本用完后一直返回最后一项
struct FakeProbe {
    script: Mutex<VecDeque<ProbeOutcome>>,
    last: ProbeOutcome,
    targets: Mutex<Vec<Config>>,
}

impl FakeProbe {
    fn new(script: Vec<ProbeOutcome>) -> Self {
        let last = script.last().cloned().unwrap_or(ProbeOutcome::Success);
        Self {
            script: Mutex::new(script.into()),
            last,
            targets: Mutex::new(Vec::new()),
        }
    }

    fn always(outcome: ProbeOutcome) -> Self {
        Self::new(vec![outcome])
    }

    fn count(&self) -> usize {
        self.targets.lock().unwrap().len()
    }
}

#[async_trait]
impl ConsistencyProbe for FakeProbe {
    async fn probe(&self, target: &Config) -> ProbeOutcome {
        self.targets.lock().unwrap().push(target.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.last.clone())
    }
}

#[derive(Default)]
struct FakeNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, cluster: &str, excerpt: &str) -> crate::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((cluster.to_string(), excerpt.to_string()));
        Ok(())
    }
}

fn backup(id: &str, status: BackupStatus, pgdata: &str) -> BackupRecord {
    BackupRecord {
        id: id.to_string(),
        status,
        pgdata: pgdata.to_string(),
        version: 150004,
    }
}

fn entry(name: &str, source_host: &str, backups: Vec<BackupRecord>) -> ClusterEntry {
    ClusterEntry {
        cluster: Cluster::from_conninfo(
            name,
            format!("host={source_host} user=barman dbname=postgres"),
        ),
        backups,
    }
}

fn test_config(dir: &TempDir) -> VerifyConfig {
    let mut config = VerifyConfig::new("restore01");
    config.wait_for_recovery_min = 5;
    config.tunables.timing.settle_delay_secs = 0;
    config.tunables.timing.poll_interval_secs = 0;
    config.tunables.timing.teardown_delay_secs = 0;
    config.tunables.state.lock_file = dir.path().join("restore.lock");
    config.tunables.state.status_file = dir.path().join("restore.status");
    config
}

fn single_catalog() -> Catalog {
    Catalog::from_entries([entry(
        "main",
        "db1",
        vec![
            backup("20240101T000000", BackupStatus::Done, "/data/main"),
            backup("20240102T000000", BackupStatus::Done, "/data/main"),
        ],
    )])
}

async fn verify_single(
    config: &VerifyConfig,
    runner: &FakeRunner,
    probe: &FakeProbe,
) -> ClusterReport {
    let targets = resolve_targets(&single_catalog(), config).unwrap();
    verify_target(config, runner, probe, &targets[0]).await
}

const FULL_RUN: [&str; 9] = [
    "test", "recover", "sed", "sed", "sed", "sed", "start", "stop", "rm",
];

#[tokio::test]
async fn test_consistent_on_first_attempt() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let runner = FakeRunner::default();
    let probe = FakeProbe::always(ProbeOutcome::Success);

    let report = verify_single(&config, &runner, &probe).await;

    assert_eq!(report.outcome, Outcome::Consistent);
    assert_eq!(report.teardown, TeardownStatus::Succeeded);
    assert_eq!(report.backup_id.as_deref(), Some("20240102T000000"));
    assert_eq!(report.poll_count, 1);
    assert_eq!(runner.calls(), FULL_RUN);
    let target = probe.targets.lock().unwrap()[0].clone();
    assert_eq!(config_hosts(&target), ["restore01"]);
    assert_eq!(target.get_user(), Some("barman"));
    assert_eq!(target.get_dbname(), Some("postgres"));
}

#[tokio::test]
async fn test_no_usable_backup_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let catalog = Catalog::from_entries([entry(
        "main",
        "db1",
        vec![
            backup("20240101T000000", BackupStatus::Failed, "/data/main"),
            backup("20240102T000000", BackupStatus::Started, "/data/main"),
        ],
    )]);
    let runner = FakeRunner::default();
    let probe = FakeProbe::always(ProbeOutcome::Success);

    let targets = resolve_targets(&catalog, &config).unwrap();
    let report = verify_target(&config, &runner, &probe, &targets[0]).await;

    assert_eq!(report.outcome, Outcome::NoUsableBackup);
    assert_eq!(report.backup_id, None);
    assert!(report.is_problem());
    assert!(runner.calls().is_empty());
    assert_eq!(probe.count(), 0);
}

#[tokio::test]
async fn test_stale_location_stops_before_restore() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let runner = FakeRunner::default().with_existing_dir("/data/main");
    let probe = FakeProbe::always(ProbeOutcome::Success);

    // 重复运行始终停在目录检查，不会升级为破坏性操作
    for _ in 0..2 {
        let report = verify_single(&config, &runner, &probe).await;
        assert_eq!(report.outcome, Outcome::StaleLocation);
        assert_eq!(report.teardown, TeardownStatus::NotNeeded);
    }

    assert_eq!(runner.calls(), ["test", "test"]);
    assert_eq!(probe.count(), 0);
}

#[tokio::test]
async fn test_restore_failure_still_tears_down() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let runner = FakeRunner::failing(&["recover"]);
    let probe = FakeProbe::always(ProbeOutcome::Success);

    let report = verify_single(&config, &runner, &probe).await;

    assert_eq!(report.outcome, Outcome::RestoreFailed);
    assert_eq!(report.teardown, TeardownStatus::Succeeded);
    assert_eq!(runner.calls(), ["test", "recover", "stop", "rm"]);
    assert_eq!(probe.count(), 0);
}

#[tokio::test]
async fn test_config_patch_failure_aborts_remaining_edits() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let runner = FakeRunner::failing(&["sed"]);
    let probe = FakeProbe::always(ProbeOutcome::Success);

    let report = verify_single(&config, &runner, &probe).await;

    assert_eq!(report.outcome, Outcome::ConfigPatchFailed);
    assert_eq!(runner.calls(), ["test", "recover", "sed", "stop", "rm"]);
}

#[tokio::test]
async fn test_start_failure() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let runner = FakeRunner::failing(&["start"]);
    let probe = FakeProbe::always(ProbeOutcome::Success);

    let report = verify_single(&config, &runner, &probe).await;

    assert_eq!(report.outcome, Outcome::StartFailed);
    assert_eq!(report.final_outcome().code(), 3);
    assert_eq!(probe.count(), 0);
}

#[tokio::test]
async fn test_starting_up_then_consistent() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let runner = FakeRunner::default();
    let probe = FakeProbe::new(vec![
        ProbeOutcome::TransientStartingUp,
        ProbeOutcome::TransientOther("timeout expired".into()),
        ProbeOutcome::Success,
    ]);

    let report = verify_single(&config, &runner, &probe).await;

    assert_eq!(report.outcome, Outcome::Consistent);
    assert_eq!(report.poll_count, 3);
    assert_eq!(probe.count(), 3);
}

#[tokio::test]
async fn test_connection_refused_stops_polling() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let runner = FakeRunner::default();
    let probe = FakeProbe::new(vec![
        ProbeOutcome::TransientStartingUp,
        ProbeOutcome::ConnectionRefused("Connection refused".into()),
        ProbeOutcome::Success,
    ]);

    let report = verify_single(&config, &runner, &probe).await;

    assert_eq!(report.outcome, Outcome::ConnectionRefused);
    assert_eq!(report.poll_count, 2);
    assert_eq!(probe.count(), 2);
    // 一致性失败后仍然清理
    assert_eq!(runner.calls(), FULL_RUN);
}

#[tokio::test]
async fn test_timeout_after_exact_attempt_budget() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.wait_for_recovery_min = 3;
    let runner = FakeRunner::default();
    let probe = FakeProbe::always(ProbeOutcome::TransientStartingUp);

    let report = verify_single(&config, &runner, &probe).await;

    assert_eq!(report.outcome, Outcome::ConsistencyTimeout);
    assert_eq!(report.poll_count, 3);
    assert_eq!(probe.count(), 3);
    assert_eq!(report.teardown, TeardownStatus::Succeeded);
}

#[tokio::test]
async fn test_teardown_failure_is_distinct_outcome() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let runner = FakeRunner::failing(&["stop"]);
    let probe = FakeProbe::always(ProbeOutcome::Success);

    let report = verify_single(&config, &runner, &probe).await;

    assert_eq!(report.outcome, Outcome::Consistent);
    assert_eq!(report.teardown, TeardownStatus::Failed);
    assert_eq!(report.final_outcome(), Outcome::TeardownFailed);
    assert!(report.is_problem());
    // 停止失败时不删除目录
    assert!(!runner.calls().contains(&"rm".to_string()));
}

#[tokio::test]
async fn test_remove_failure_is_teardown_failure() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let runner = FakeRunner::failing(&["rm"]);
    let probe = FakeProbe::always(ProbeOutcome::Success);

    let report = verify_single(&config, &runner, &probe).await;

    assert_eq!(report.final_outcome(), Outcome::TeardownFailed);
    assert_eq!(runner.calls(), FULL_RUN);
}

#[tokio::test]
async fn test_keep_skips_teardown() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.keep = true;
    let runner = FakeRunner::default();
    let probe = FakeProbe::always(ProbeOutcome::Success);

    let report = verify_single(&config, &runner, &probe).await;

    assert_eq!(report.outcome, Outcome::Consistent);
    assert_eq!(report.teardown, TeardownStatus::Kept);
    assert_eq!(
        runner.calls(),
        ["test", "recover", "sed", "sed", "sed", "sed", "start"]
    );
}

#[tokio::test]
async fn test_attempt_ends_in_done_state() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let runner = FakeRunner::default();
    let probe = FakeProbe::always(ProbeOutcome::Success);
    let catalog = single_catalog();
    let targets = resolve_targets(&catalog, &config).unwrap();
    let target = &targets[0];
    let backup = target.backup().unwrap();

    let attempt = RecoveryAttempt::new(&config, &runner, &probe, target, backup);
    assert_eq!(attempt.state(), RecoveryState::LocationCheck);
    let report = attempt.run().await;
    assert_eq!(report.outcome, Outcome::Consistent);
}

#[tokio::test]
async fn test_scenario_all_consistent() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let catalog = Catalog::from_entries([
        entry(
            "alpha",
            "db1",
            vec![backup("20240101T000000", BackupStatus::Done, "/data/alpha")],
        ),
        entry(
            "beta",
            "db2",
            vec![backup("20240101T000000", BackupStatus::Done, "/data/beta")],
        ),
    ]);
    let runner = FakeRunner::default();
    let probe = FakeProbe::always(ProbeOutcome::Success);
    let notifier = FakeNotifier::default();

    let targets = resolve_targets(&catalog, &config).unwrap();
    let verifier = Verifier::new(&config, &runner, &probe, &notifier);
    let RunResult::Completed(outcome) = verifier.run(&targets).await.unwrap() else {
        panic!("lock should be free");
    };

    assert_eq!(outcome.status(), 0);
    assert!(outcome.problems.is_empty());
    assert_eq!(outcome.summary(), "All backups are consistent.");
    assert!(notifier.sent.lock().unwrap().is_empty());

    let raw = std::fs::read_to_string(&config.tunables.state.status_file).unwrap();
    assert_eq!(
        raw,
        format!("{};0;All backups are consistent.\n", outcome.finished_at.timestamp())
    );
}

#[tokio::test]
async fn test_scenario_restore_host_is_source_host() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.restore_host = "db1".to_string();
    config.clusters = vec!["main".to_string()];
    let runner = FakeRunner::default();

    let result = resolve_targets(&single_catalog(), &config);

    assert!(matches!(
        result,
        Err(RestoreError::SourceHostConflict { .. })
    ));
    assert!(runner.calls().is_empty());
    assert!(!config.tunables.state.status_file.exists());
}

#[tokio::test]
async fn test_scenario_listener_never_opens() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.email_list = vec!["dba@example.com".to_string()];
    let runner = FakeRunner::default();
    let probe = FakeProbe::always(ProbeOutcome::ConnectionRefused("Connection refused".into()));
    let notifier = FakeNotifier::default();

    let targets = resolve_targets(&single_catalog(), &config).unwrap();
    let verifier = Verifier::new(&config, &runner, &probe, &notifier);
    let RunResult::Completed(outcome) = verifier.run(&targets).await.unwrap() else {
        panic!("lock should be free");
    };

    assert_eq!(probe.count(), 1);
    assert_eq!(outcome.status(), 1);
    assert_eq!(outcome.reports[0].outcome, Outcome::ConnectionRefused);
    assert!(outcome.problems.contains("main"));

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "main");
    assert_eq!(sent[0].1, "Log file was not specified");

    let status = RunStatusStore::new(&config.tunables.state.status_file)
        .read()
        .unwrap()
        .unwrap();
    assert_eq!(status.status, 1);
    assert_eq!(
        status.message,
        "Clusters with failed backups are main. Take a look at them."
    );
}

#[tokio::test]
async fn test_one_failure_does_not_stop_later_clusters() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let catalog = Catalog::from_entries([
        entry(
            "alpha",
            "db1",
            vec![backup("20240101T000000", BackupStatus::Done, "/data/alpha")],
        ),
        entry("beta", "db2", vec![]),
        entry(
            "gamma",
            "db3",
            vec![backup("20240101T000000", BackupStatus::Done, "/data/gamma")],
        ),
    ]);
    let runner = FakeRunner::default().with_existing_dir("/data/alpha");
    let probe = FakeProbe::always(ProbeOutcome::Success);
    let notifier = FakeNotifier::default();

    let targets = resolve_targets(&catalog, &config).unwrap();
    let outcome = Verifier::new(&config, &runner, &probe, &notifier)
        .verify_all(&targets)
        .await;

    let outcomes: Vec<_> = outcome.reports.iter().map(|r| r.final_outcome()).collect();
    assert_eq!(
        outcomes,
        [Outcome::StaleLocation, Outcome::NoUsableBackup, Outcome::Consistent]
    );
    assert_eq!(
        outcome.summary(),
        "Clusters with failed backups are alpha,beta. Take a look at them."
    );
    // 未配置收件人，不发送通知
    assert!(notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_run_exits_quietly_when_lock_held() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let runner = FakeRunner::default();
    let probe = FakeProbe::always(ProbeOutcome::Success);
    let notifier = FakeNotifier::default();

    let _held = crate::lock::InstanceLock::acquire(&config.tunables.state.lock_file)
        .unwrap()
        .unwrap();
    let targets = resolve_targets(&single_catalog(), &config).unwrap();
    let result = Verifier::new(&config, &runner, &probe, &notifier)
        .run(&targets)
        .await
        .unwrap();

    assert!(matches!(result, RunResult::AlreadyRunning));
    assert!(runner.calls().is_empty());
    assert!(!config.tunables.state.status_file.exists());
}
