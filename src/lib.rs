//! Discovery Service Health Check
//!
//! サービスディスカバリに登録されたサービスインスタンス群のヘルスチェックプローブ

#![warn(missing_docs)]

/// CLI定義・設定バリデーション
pub mod cli;

/// ディスカバリサーバーからのアナウンス取得
pub mod discovery;

/// インスタンスカウント・閾値評価・エンドポイントプローブ
pub mod checker;

/// 検出された問題の集約・出力・終了コード算出
pub mod problem;
