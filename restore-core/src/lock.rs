use crate::Result;
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 单实例锁
///
/// 基于 `flock(2)` 的排他锁，持有者退出（包括崩溃）时由内核释放，不会留下陈旧锁。
/// 锁随守卫对象一起释放。
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    _guard: Flock<File>,
}

impl InstanceLock {
    /// 尝试获取锁；已被其他进程持有时返回 `Ok(None)`
    pub fn acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        let mut guard = match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(guard) => guard,
            Err((_, Errno::EWOULDBLOCK)) => {
                debug!("锁已被占用: {}", path.display());
                return Ok(None);
            }
            Err((_, errno)) => return Err(errno.into()),
        };

        // 记录持有者 pid，便于排查
        guard.set_len(0)?;
        writeln!(guard, "{}", std::process::id())?;
        guard.flush()?;

        debug!("已获取锁: {}", path.display());
        Ok(Some(Self {
            path: path.to_path_buf(),
            _guard: guard,
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
