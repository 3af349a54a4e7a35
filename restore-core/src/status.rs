use crate::{RestoreError, Result};
use chrono::{DateTime, Local, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};

/// 最近一次运行的结果记录：`时间戳;状态;消息`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatus {
    /// Unix 时间戳（秒）
    pub timestamp: i64,
    /// 0 表示全部一致，1 表示存在问题
    pub status: i32,
    pub message: String,
}

impl RunStatus {
    pub fn new(timestamp: i64, status: i32, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            status,
            message: message.into(),
        }
    }

    /// 序列化为单行文本，消息中的换行替换为空格以保证单行
    pub fn to_line(&self) -> String {
        let message = self.message.replace(['\n', '\r'], " ");
        format!("{};{};{}\n", self.timestamp, self.status, message)
    }

    /// 解析单行文本，消息本身允许包含分号
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut fields = line.splitn(3, ';');
        let (Some(ts), Some(status), Some(message)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(RestoreError::InvalidStatus(line.to_string()));
        };

        let timestamp = ts
            .trim()
            .parse::<f64>()
            .map_err(|_| RestoreError::InvalidStatus(line.to_string()))? as i64;
        let status = status
            .trim()
            .parse::<i32>()
            .map_err(|_| RestoreError::InvalidStatus(line.to_string()))?;

        Ok(Self::new(timestamp, status, message))
    }

    /// 记录时间（本地时区）
    pub fn recorded_at(&self) -> Option<DateTime<Local>> {
        Local.timestamp_opt(self.timestamp, 0).single()
    }

    /// 是否在 `now` 所在的自然日内完成
    pub fn is_same_day(&self, now: DateTime<Local>) -> bool {
        self.recorded_at()
            .map(|at| at.date_naive() == now.date_naive())
            .unwrap_or(false)
    }
}

/// 运行状态存储，只保留最近一条记录
#[derive(Debug, Clone)]
pub struct RunStatusStore {
    path: PathBuf,
}

impl RunStatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 覆盖写入；先写临时文件再改名，读者不会看到半条记录
    pub fn write(&self, status: &RunStatus) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, status.to_line())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// 读取最近一条记录；文件不存在时返回 `Ok(None)`
    pub fn read(&self) -> Result<Option<RunStatus>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        RunStatus::parse(content.trim_end()).map(Some)
    }
}
