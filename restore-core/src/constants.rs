/// 持久化状态路径常量
pub mod paths {
    /// 单实例锁文件
    pub const LOCK_FILE: &str = "/tmp/check_barman_restore.lock";

    /// 最近一次运行状态文件
    pub const STATUS_FILE: &str = "/tmp/check_barman_restore.status";

    /// 默认调优配置文件（存在时自动加载）
    pub const DEFAULT_CONFIG_FILE: &str = "restore-check.toml";
}

/// 远程执行相关常量
pub mod remote {
    /// 恢复主机上的服务账号
    pub const SERVICE_ACCOUNT: &str = "postgres";

    /// 默认恢复主机
    pub const DEFAULT_RESTORE_HOST: &str = "localhost";

    /// barman 可执行文件
    pub const BARMAN_BIN: &str = "/bin/barman";

    /// PostgreSQL 二进制目录模板，`{major}` 会被替换为主版本号
    pub const PG_BIN_TEMPLATE: &str = "/usr/pgsql-{major}/bin";
}

/// 恢复实例配置修改相关常量
pub mod postgres {
    /// 恢复后实例的主配置文件名
    pub const CONFIG_FILE_NAME: &str = "postgresql.conf";

    /// 访问控制文件名
    pub const HBA_FILE_NAME: &str = "pg_hba.conf";

    /// 恢复主机上的 shared_buffers
    pub const DEFAULT_SHARED_BUFFERS: &str = "8GB";

    /// 统计临时目录（相对数据目录）
    pub const STATS_TEMP_DIRECTORY: &str = "pg_stat_tmp";

    /// 一致性探测语句
    pub const PROBE_QUERY: &str = "SELECT 42";

    /// 一致性探测期望结果
    pub const PROBE_EXPECTED: i32 = 42;
}

/// 时间相关常量
pub mod timing {
    /// 启动后首次探测前的等待时间（秒）
    pub const SETTLE_DELAY_SECS: u64 = 10;

    /// 两次探测之间的间隔（秒）
    pub const POLL_INTERVAL_SECS: u64 = 60;

    /// 停止实例到删除目录之间的等待时间（秒）
    pub const TEARDOWN_DELAY_SECS: u64 = 5;

    /// 等待恢复的最大分钟数（探测次数上限）默认值
    pub const DEFAULT_WAIT_FOR_RECOVERY_MIN: u32 = 180;

    /// 等待恢复的允许范围
    pub const MIN_WAIT_FOR_RECOVERY_MIN: u32 = 1;
    pub const MAX_WAIT_FOR_RECOVERY_MIN: u32 = 180;
}

/// 通知相关常量
pub mod notify {
    /// 邮件中附带的日志尾部字节数
    pub const LOG_EXCERPT_BYTES: u64 = 4096;

    /// 默认 SMTP 主机
    pub const SMTP_HOST: &str = "localhost";

    /// 默认 SMTP 端口
    pub const SMTP_PORT: u16 = 25;

    /// 未配置日志文件时的邮件正文
    pub const NO_LOG_FILE_BODY: &str = "Log file was not specified";
}

/// 运行结果摘要
pub mod summary {
    /// 所有集群均通过校验
    pub const ALL_CONSISTENT: &str = "All backups are consistent.";
}
