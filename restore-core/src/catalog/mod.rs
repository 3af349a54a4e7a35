mod model;

pub use model::{BackupRecord, BackupStatus, Catalog, Cluster, ClusterEntry, config_hosts};

use crate::executor::{self, CatalogOp, CommandRunner, RemoteHost};
use crate::{RestoreError, Result};
use tracing::debug;

/// barman 客户端
pub struct BarmanClient<'a> {
    runner: &'a dyn CommandRunner,
    barman_bin: String,
}

impl<'a> BarmanClient<'a> {
    pub fn new(runner: &'a dyn CommandRunner, barman_bin: impl Into<String>) -> Self {
        Self {
            runner,
            barman_bin: barman_bin.into(),
        }
    }

    /// 读取完整目录；输出体积较大，不写入日志
    pub async fn diagnose(&self) -> Result<Catalog> {
        let command = CatalogOp::Diagnose.command(&self.barman_bin);
        debug!("读取备份目录: {}", command);

        let output = self.runner.run(&command).await?;
        if !output.success() {
            return Err(RestoreError::catalog(format!(
                "barman diagnose 退出码 {}: {}",
                output.exit_code(),
                output.stderr.trim()
            )));
        }

        Catalog::from_diagnose_json(&output.stdout)
    }

    /// 把备份恢复到远程主机的数据目录，回放到最早一致点并按需拉取 WAL
    pub async fn recover(
        &self,
        cluster: &Cluster,
        backup: &BackupRecord,
        target: &RemoteHost,
    ) -> bool {
        let command = CatalogOp::Recover {
            cluster: cluster.name.clone(),
            backup_id: backup.id.clone(),
            data_dir: backup.pgdata.clone(),
            target: target.clone(),
        }
        .command(&self.barman_bin);
        debug!(" Restore command: {}", command);

        executor::execute_checked(self.runner, &command).await
    }
}
