use crate::constants::postgres;
use std::fmt;

/// 本地进程的完整命令行（程序 + 参数），不经过本地 shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// 对恢复实例 postgresql.conf 的单项修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEdit {
    /// 清空 shared_preload_libraries，恢复主机上不需要生产扩展
    ClearPreloadLibraries,
    /// 设置 shared_buffers
    SharedBuffers(String),
    /// 设置 stats_temp_directory
    StatsTempDirectory(String),
    /// 把 hba_file 指向恢复出的数据目录
    HbaFile(String),
}

impl ConfigEdit {
    /// 恢复实例需要的全部修改，按执行顺序排列
    pub fn restore_host_edits(data_dir: &str, shared_buffers: &str) -> Vec<ConfigEdit> {
        vec![
            ConfigEdit::ClearPreloadLibraries,
            ConfigEdit::SharedBuffers(shared_buffers.to_string()),
            ConfigEdit::StatsTempDirectory(postgres::STATS_TEMP_DIRECTORY.to_string()),
            ConfigEdit::HbaFile(format!(
                "{}/{}",
                data_dir.trim_end_matches('/'),
                postgres::HBA_FILE_NAME
            )),
        ]
    }

    /// 设置项名称
    pub fn setting(&self) -> &'static str {
        match self {
            ConfigEdit::ClearPreloadLibraries => "shared_preload_libraries",
            ConfigEdit::SharedBuffers(_) => "shared_buffers",
            ConfigEdit::StatsTempDirectory(_) => "stats_temp_directory",
            ConfigEdit::HbaFile(_) => "hba_file",
        }
    }

    /// 生成 sed 表达式，只修改以设置项开头（未注释）的行
    pub fn sed_expression(&self) -> String {
        let setting = self.setting();
        match self {
            ConfigEdit::ClearPreloadLibraries => format!("/^{setting}/s/'.*'/''/"),
            ConfigEdit::SharedBuffers(value) => {
                format!("/^{setting}/s/=.*$/= {}/", sed_escape(value))
            }
            ConfigEdit::StatsTempDirectory(dir) | ConfigEdit::HbaFile(dir) => {
                format!("/^{setting}/s/=.*$/= '{}'/", sed_escape(dir))
            }
        }
    }
}

/// 恢复主机上执行的操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOp {
    /// 目录是否存在（退出码 0 表示存在）
    TestDirectory { path: String },
    /// 对配置文件应用一项修改
    PatchSetting { config_file: String, edit: ConfigEdit },
    /// 启动实例，不等待启动完成，服务日志写到数据目录内
    StartEngine { bin_dir: String, data_dir: String },
    /// 立即停止实例
    StopEngine { bin_dir: String, data_dir: String },
    /// 递归删除目录
    RemoveDirectory { path: String },
}

impl RemoteOp {
    /// 远端要执行的参数列表
    pub fn argv(&self) -> Vec<String> {
        match self {
            RemoteOp::TestDirectory { path } => {
                vec!["test".into(), "-d".into(), path.clone()]
            }
            RemoteOp::PatchSetting { config_file, edit } => vec![
                "sed".into(),
                "-i".into(),
                "-e".into(),
                edit.sed_expression(),
                config_file.clone(),
            ],
            RemoteOp::StartEngine { bin_dir, data_dir } => vec![
                format!("{bin_dir}/pg_ctl"),
                "start".into(),
                "-W".into(),
                "-D".into(),
                data_dir.clone(),
                "-l".into(),
                format!("{}/restore-check-startup.log", data_dir.trim_end_matches('/')),
            ],
            RemoteOp::StopEngine { bin_dir, data_dir } => vec![
                format!("{bin_dir}/pg_ctl"),
                "stop".into(),
                "-m".into(),
                "immediate".into(),
                "-D".into(),
                data_dir.clone(),
            ],
            RemoteOp::RemoveDirectory { path } => {
                vec!["rm".into(), "-rf".into(), path.clone()]
            }
        }
    }

    /// 远端 shell 收到的命令字符串，每个参数单独转义
    pub fn remote_command(&self) -> String {
        let mut command = self
            .argv()
            .iter()
            .map(|arg| shell_quote(arg))
            .collect::<Vec<_>>()
            .join(" ");
        if matches!(self, RemoteOp::StartEngine { .. }) {
            // 断开 ssh 会话的标准输入，避免会话挂起
            command.push_str(" </dev/null");
        }
        command
    }
}

/// 以固定服务账号访问的远程主机
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHost {
    pub user: String,
    pub host: String,
}

impl RemoteHost {
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
        }
    }

    /// `user@host`
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// barman 使用的 `--remote-ssh-command` 参数值
    pub fn ssh_command(&self) -> String {
        format!("ssh {}", self.destination())
    }

    /// 把远程操作包装成本地 ssh 命令
    pub fn command(&self, op: &RemoteOp) -> CommandLine {
        CommandLine::new("ssh")
            .args(["-o", "BatchMode=yes"])
            .arg(self.destination())
            .arg(op.remote_command())
    }
}

/// 在备份服务器本地执行的 barman 操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogOp {
    /// 输出 JSON 格式的全部目录信息
    Diagnose,
    /// 把备份恢复到远程主机，回放 WAL 到最早一致点
    Recover {
        cluster: String,
        backup_id: String,
        data_dir: String,
        target: RemoteHost,
    },
}

impl CatalogOp {
    pub fn command(&self, barman_bin: &str) -> CommandLine {
        match self {
            CatalogOp::Diagnose => CommandLine::new(barman_bin).arg("diagnose"),
            CatalogOp::Recover {
                cluster,
                backup_id,
                data_dir,
                target,
            } => CommandLine::new(barman_bin)
                .arg("recover")
                .arg("--remote-ssh-command")
                .arg(target.ssh_command())
                .args(["--get-wal", "--target-immediate"])
                .arg(cluster.as_str())
                .arg(backup_id.as_str())
                .arg(data_dir.as_str()),
        }
    }
}

/// POSIX shell 单引号转义，安全字符组成的参数原样返回
pub fn shell_quote(arg: &str) -> String {
    let is_safe = |c: char| c.is_ascii_alphanumeric() || "_-./=:@%+,".contains(c);
    if !arg.is_empty() && arg.chars().all(is_safe) {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// 转义 sed 替换部分中的特殊字符（分隔符 `/`、`\` 与 `&`）
fn sed_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '/' | '\\' | '&') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
