use anyhow::{Context, Result};
use restore_core::config::Tunables;
use restore_core::constants::paths;
use std::path::Path;
use tracing::{info, warn};

/// 生成带注释的可调参数文件
pub fn run_init(path: Option<&Path>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(|| Path::new(paths::DEFAULT_CONFIG_FILE));

    if path.exists() && !force {
        warn!("⚠️  配置文件已存在: {}", path.display());
        info!("如果您要重新生成，请使用 --force 参数");
        return Ok(());
    }

    Tunables::default()
        .save_to_file(path)
        .with_context(|| format!("无法写入配置文件 {}", path.display()))?;
    info!("✅ 创建配置文件: {}", path.display());
    info!("💡 使用 --config {} 或在当前目录运行以加载它", path.display());

    Ok(())
}
