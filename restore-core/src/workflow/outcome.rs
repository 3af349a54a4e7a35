use crate::constants::summary;
use crate::status::RunStatus;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;

/// 单个集群的校验结果
///
/// 数字代码对脚本和告警系统稳定，互斥且按状态机顺序首个命中者生效。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Consistent,
    RestoreFailed,
    ConfigPatchFailed,
    StartFailed,
    ConnectionRefused,
    ConsistencyTimeout,
    StaleLocation,
    NoUsableBackup,
    TeardownFailed,
}

impl Outcome {
    pub fn code(&self) -> i32 {
        match self {
            Outcome::Consistent => 0,
            Outcome::RestoreFailed => 1,
            Outcome::ConfigPatchFailed => 2,
            Outcome::StartFailed => 3,
            Outcome::ConnectionRefused => 4,
            Outcome::ConsistencyTimeout => 5,
            Outcome::StaleLocation => 6,
            Outcome::NoUsableBackup => 7,
            Outcome::TeardownFailed => 8,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Consistent)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Outcome::Consistent => "一致",
            Outcome::RestoreFailed => "恢复失败",
            Outcome::ConfigPatchFailed => "配置修改失败",
            Outcome::StartFailed => "启动失败",
            Outcome::ConnectionRefused => "连接被拒绝",
            Outcome::ConsistencyTimeout => "等待一致超时",
            Outcome::StaleLocation => "恢复目录已存在",
            Outcome::NoUsableBackup => "没有可用备份",
            Outcome::TeardownFailed => "清理失败",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 清理阶段的结果，与一致性结果分开记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStatus {
    /// 没有进入需要清理的阶段（无备份、目录已存在）
    NotNeeded,
    /// 按要求保留恢复出的实例
    Kept,
    Succeeded,
    Failed,
}

/// 单个集群的完整报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterReport {
    pub cluster: String,
    pub backup_id: Option<String>,
    /// 一致性校验结果
    pub outcome: Outcome,
    pub teardown: TeardownStatus,
    /// 实际执行的探测次数
    pub poll_count: u32,
}

impl ClusterReport {
    /// 对外的最终结果：校验失败优先，其次是清理失败
    pub fn final_outcome(&self) -> Outcome {
        if !self.outcome.is_success() {
            self.outcome
        } else if self.teardown == TeardownStatus::Failed {
            Outcome::TeardownFailed
        } else {
            Outcome::Consistent
        }
    }

    pub fn is_problem(&self) -> bool {
        !self.final_outcome().is_success()
    }
}

/// 一次完整运行的汇总结果
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<ClusterReport>,
    /// 存在问题的集群（有序）
    pub problems: BTreeSet<String>,
}

impl RunOutcome {
    pub fn from_reports(reports: Vec<ClusterReport>) -> Self {
        let problems = reports
            .iter()
            .filter(|r| r.is_problem())
            .map(|r| r.cluster.clone())
            .collect();
        Self {
            finished_at: Utc::now(),
            reports,
            problems,
        }
    }

    /// 0 表示全部一致，1 表示至少一个集群有问题
    pub fn status(&self) -> i32 {
        if self.problems.is_empty() { 0 } else { 1 }
    }

    pub fn summary(&self) -> String {
        if self.problems.is_empty() {
            summary::ALL_CONSISTENT.to_string()
        } else {
            format!(
                "Clusters with failed backups are {}. Take a look at them.",
                self.problems.iter().cloned().collect::<Vec<_>>().join(",")
            )
        }
    }

    pub fn to_run_status(&self) -> RunStatus {
        RunStatus::new(self.finished_at.timestamp(), self.status(), self.summary())
    }
}
