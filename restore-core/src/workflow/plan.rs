use crate::catalog::{BackupRecord, Catalog, Cluster};
use crate::config::VerifyConfig;
use crate::{RestoreError, Result};
use tracing::debug;

/// 经过校验的目标集群
///
/// 只能由 [`resolve_targets`] 构造，因此恢复主机一定不是它的源主机，
/// 探测配置也只指向恢复主机。
#[derive(Debug, Clone)]
pub struct VerificationTarget {
    cluster: Cluster,
    backup: Option<BackupRecord>,
    probe_config: tokio_postgres::Config,
}

impl VerificationTarget {
    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    /// 最近一次完成的备份；为空表示没有可用备份
    pub fn backup(&self) -> Option<&BackupRecord> {
        self.backup.as_ref()
    }

    /// 恢复实例的探测连接配置
    pub fn probe_config(&self) -> &tokio_postgres::Config {
        &self.probe_config
    }
}

/// 解析本次要校验的集群
///
/// 未显式指定集群时取目录中的全部集群。任一集群名未知、源主机无法确定或与恢复主机相同，
/// 整个运行在处理任何集群之前被拒绝。
pub fn resolve_targets(catalog: &Catalog, config: &VerifyConfig) -> Result<Vec<VerificationTarget>> {
    let names = if config.clusters.is_empty() {
        catalog.cluster_names()
    } else {
        config.clusters.clone()
    };

    let unknown: Vec<&str> = names
        .iter()
        .filter(|name| catalog.get(name).is_none())
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(RestoreError::UnknownCluster(unknown.join(",")));
    }

    let mut targets = Vec::with_capacity(names.len());
    for name in &names {
        let Some(entry) = catalog.get(name) else {
            continue;
        };
        let cluster = &entry.cluster;
        if cluster.source_hosts.is_empty() {
            return Err(RestoreError::UnknownSourceHost(name.clone()));
        }
        if let Some(host) = cluster.conflicting_host(&config.restore_host) {
            return Err(RestoreError::SourceHostConflict {
                cluster: name.clone(),
                host: host.to_string(),
            });
        }

        let probe_config = cluster.probe_config(&config.restore_host)?;
        let backup = entry.latest_done_backup().cloned();
        debug!(
            " cluster={}; backup={}",
            name,
            backup.as_ref().map(|b| b.id.as_str()).unwrap_or("-")
        );
        targets.push(VerificationTarget {
            cluster: cluster.clone(),
            backup,
            probe_config,
        });
    }

    Ok(targets)
}
