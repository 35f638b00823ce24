//! CLI定義
//!
//! コマンドライン引数のパースと設定バリデーション。
//! バリデーション違反はusageエラー（終了コード2）として報告される。

use clap::Parser;

/// タイムアウトの上限（秒）
const MAX_TIMEOUT_SECS: f64 = 86_400.0;

/// ディスカバリ経由のサービスフリートヘルスチェック
#[derive(Parser, Debug, Clone)]
#[command(name = "check-discovery-service")]
#[command(version, about = "Checks announced service instances via a discovery server")]
pub struct Cli {
    /// The URL of the discovery server
    #[arg(short = 'd', long)]
    pub discovery: String,

    /// The service name to check
    #[arg(short = 's', long)]
    pub service: String,

    /// Health endpoint path appended to each instance URI
    #[arg(short = 'e', long, default_value = "health")]
    pub endpoint: String,

    /// Per-probe timeout in seconds
    #[arg(short = 't', long, default_value_t = 5.0, allow_negative_numbers = true)]
    pub timeout: f64,

    /// Minimum instance count before critical
    #[arg(short = 'c', long, default_value_t = 1)]
    pub critical: usize,

    /// Minimum instance count before warning
    #[arg(short = 'w', long, default_value_t = 1)]
    pub warn: usize,

    /// Increase log verbosity (use up to 3 times)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// フィールド間の整合性を検証する
    ///
    /// 負数はclapの符号なしパースで既に拒否されるため、
    /// ここではタイムアウトの範囲と閾値の大小関係のみ検証する。
    pub fn validate(&self) -> Result<(), String> {
        if !(self.timeout > 0.0) {
            return Err(format!("--timeout must be positive (got {})", self.timeout));
        }
        // Durationへ変換できない値（inf、過大値）もusageエラー扱い
        if !self.timeout.is_finite() || self.timeout > MAX_TIMEOUT_SECS {
            return Err(format!(
                "--timeout must be at most {MAX_TIMEOUT_SECS} seconds (got {})",
                self.timeout
            ));
        }
        if self.warn < self.critical {
            return Err(format!(
                "--warn ({}) must be >= --critical ({})",
                self.warn, self.critical
            ));
        }
        Ok(())
    }
}
