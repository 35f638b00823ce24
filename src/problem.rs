//! 問題集約・レポート
//!
//! チェック中に検出されたProblemを重要度順に整列し、
//! 監視システム向けの終了コードへ変換する

use std::fmt;

/// 終了コード定義（Nagiosプラグイン互換）
pub mod exit_code {
    /// 正常
    pub const OK: i32 = 0;
    /// 警告
    pub const WARNING: i32 = 1;
    /// 重大
    pub const CRITICAL: i32 = 2;
    /// 不明（ディスカバリ取得失敗）
    pub const UNKNOWN: i32 = 3;
}

/// 問題の重要度
///
/// Critical > Warning の順序を持つ。数値は終了コードと一致する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// 警告レベル
    Warning = 1,
    /// 重大レベル
    Critical = 2,
}

impl Severity {
    /// 監視システム向け終了コードへ変換
    pub fn exit_code(self) -> i32 {
        self as i32
    }

    /// メッセージ中で使う重要度ワード
    pub fn as_word(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

/// チェック中に検出された単一の問題
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    /// 重要度
    pub severity: Severity,
    /// トピック（"announcements"、"health"等）
    pub topic: String,
    /// 詳細メッセージ
    pub detail: String,
}

impl Problem {
    /// 警告レベルの問題を作成
    pub fn warning(topic: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            topic: topic.into(),
            detail: detail.into(),
        }
    }

    /// 重大レベルの問題を作成
    pub fn critical(topic: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Critical,
            topic: topic.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.topic, self.severity.as_word(), self.detail)
    }
}

/// 問題リストを重要度降順（安定ソート）に整列する
///
/// 同一重要度内では検出順を保持する。
pub fn rank_problems(problems: &mut [Problem]) {
    problems.sort_by(|a, b| b.severity.cmp(&a.severity));
}

/// 問題リストから終了コードを算出する
///
/// 空なら0、非空なら最悪問題の重要度値。
pub fn aggregate_exit_code(problems: &[Problem]) -> i32 {
    problems
        .first()
        .map(|p| p.severity.exit_code())
        .unwrap_or(exit_code::OK)
}

/// 問題を整列・出力し、終了コードを返す
///
/// 1問題1行、最悪のものから順に標準出力へ書き出す。
/// 問題がなければ何も出力しない。
pub fn report(mut problems: Vec<Problem>) -> i32 {
    rank_problems(&mut problems);
    for problem in &problems {
        println!("{problem}");
    }
    aggregate_exit_code(&problems)
}
