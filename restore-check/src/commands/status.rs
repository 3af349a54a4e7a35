use crate::app::exit_code;
use restore_core::Result;
use restore_core::config::Tunables;
use restore_core::status::RunStatusStore;
use tracing::info;

/// 显示上次运行记录
pub fn run_status(tunables: &Tunables) -> Result<i32> {
    info!("restore-check 状态");
    info!("==================");
    info!("   版本: v{}", env!("CARGO_PKG_VERSION"));
    info!("   锁文件: {}", tunables.state.lock_file.display());

    let store = RunStatusStore::new(&tunables.state.status_file);
    info!("   状态文件: {}", store.path().display());

    match store.read()? {
        Some(status) => {
            let recorded_at = status
                .recorded_at()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| status.timestamp.to_string());
            info!("📋 上次运行:");
            info!("   时间: {}", recorded_at);
            info!("   状态: {}", status.status);
            info!("   结果: {}", status.message);
        }
        None => info!("   尚无运行记录"),
    }

    Ok(exit_code::SUCCESS)
}
