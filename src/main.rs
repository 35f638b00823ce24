//! Discovery Service Health Check Entry Point

use check_discovery_service::checker;
use check_discovery_service::cli::Cli;
use check_discovery_service::problem::{self, exit_code};
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

/// ログ初期化
///
/// 標準出力は問題行専用のため、ログは標準エラーへ出す。
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // 設定不正はclapのusageエラーと同じく終了コード2
    if let Err(message) = cli.validate() {
        Cli::command()
            .error(clap::error::ErrorKind::ValueValidation, message)
            .exit();
    }

    init_logging(cli.verbose);

    let code = match checker::run_check(&cli).await {
        Ok(problems) => problem::report(problems),
        Err(e) => {
            // ディスカバリ失敗はProblemランキングに混ぜず、UNKNOWNで即終了
            let chain = anyhow::Error::new(e);
            println!("discovery check failed: {chain:#}");
            exit_code::UNKNOWN
        }
    };

    std::process::exit(code);
}
