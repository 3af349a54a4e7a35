use clap::Parser;
use restore_check::{Cli, CliApp, check_log_file, exit_code, setup_logging};

#[tokio::main]
async fn main() {
    // 解析命令行参数，用法错误由 clap 以退出码 2 结束进程
    let cli = Cli::parse();

    // 日志文件在初始化日志前必须可写
    if let Some(log_file) = &cli.log_file {
        if let Err(e) = check_log_file(log_file) {
            eprintln!("❌ {}", e);
            std::process::exit(exit_code::USAGE);
        }
    }

    setup_logging(cli.log_level, cli.log_file.as_deref());

    let code = CliApp::new(cli).run().await;
    std::process::exit(code);
}
