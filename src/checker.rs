//! ヘルスチェック本体
//!
//! アナウンスのデデュープカウント、インスタンス数の閾値評価、
//! 各インスタンスへのヘルスプローブを順次実行する

use crate::cli::Cli;
use crate::discovery::{self, Announcement, DiscoveryError};
use crate::problem::Problem;
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// デデュープトークンのメタデータキー
const DEDUP_TOKEN_KEY: &str = "server-token";

/// エラーレスポンスボディのプレビュー上限（文字数）
const BODY_PREVIEW_CHARS: usize = 128;

/// アナウンスリストから論理インスタンス数を算出する
///
/// メタデータに`server-token`を持つアナウンスは同一トークンごとに
/// 1インスタンスとして数える。トークンなしは無条件に1カウント。
pub fn count_instances(announcements: &[Announcement]) -> usize {
    let mut seen_tokens = HashSet::new();
    let mut count = 0;

    for announcement in announcements {
        match announcement.metadata.get(DEDUP_TOKEN_KEY) {
            Some(token) => {
                if seen_tokens.insert(token.as_str()) {
                    count += 1;
                }
            }
            // トークンなしはグルーピング不能のため常に1インスタンス扱い
            None => count += 1,
        }
    }

    count
}

/// インスタンス数を閾値と比較し、必要なら問題を生成する
///
/// critical判定がwarn判定より優先され、問題は最大1件。
/// 閾値0はその判定を実質無効化する。
pub fn evaluate_announcement_count(count: usize, critical: usize, warn: usize) -> Option<Problem> {
    let detail = format!("{count} instances announced (warning below {warn}, critical below {critical})");

    if count < critical {
        Some(Problem::critical("announcements", detail))
    } else if count < warn {
        Some(Problem::warning("announcements", detail))
    } else {
        None
    }
}

/// 単一プローブの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 正常応答（ステータス100〜399）
    Healthy,
    /// エラーステータス応答
    HttpError {
        /// 応答ステータスコード
        status: StatusCode,
        /// 応答ボディ
        body: String,
    },
    /// 接続フェーズのタイムアウト
    ConnectTimeout,
    /// 読み取りフェーズのタイムアウト
    ReadTimeout,
    /// その他のリクエストレベル失敗
    Other(String),
}

impl ProbeOutcome {
    /// プローブ結果をProblemへ変換する
    ///
    /// `timeout_secs`はタイムアウト系メッセージの閾値表示に使う。
    pub fn into_problem(self, timeout_secs: f64) -> Option<Problem> {
        match self {
            ProbeOutcome::Healthy => None,
            ProbeOutcome::HttpError { status, body } => {
                let detail = format!("{} {}", status.as_u16(), truncate_body(&body));
                if status.is_client_error() {
                    Some(Problem::warning("health", detail))
                } else {
                    Some(Problem::critical("health", detail))
                }
            }
            ProbeOutcome::ConnectTimeout => Some(Problem::critical(
                "connect timeout",
                format!("no response within {timeout_secs:.2}s"),
            )),
            ProbeOutcome::ReadTimeout => Some(Problem::critical(
                "read timeout",
                format!("no response within {timeout_secs:.2}s"),
            )),
            ProbeOutcome::Other(detail) => Some(Problem::critical(
                "health",
                format!("unhandled exception: {detail}"),
            )),
        }
    }
}

/// ボディを表示用に切り詰める
fn truncate_body(body: &str) -> String {
    if body.chars().count() <= BODY_PREVIEW_CHARS {
        body.to_string()
    } else {
        let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        format!("{preview}...")
    }
}

/// エンドポイントプローバー
///
/// 各インスタンスのヘルスエンドポイントへGETリクエストを送信する。
pub struct EndpointProber {
    /// HTTPクライアント
    client: Client,
    /// 各インスタンスURIへ付加するパス
    endpoint: String,
}

impl EndpointProber {
    /// 新しいプローバーを作成
    pub fn new(endpoint: &str, timeout_secs: f64) -> Self {
        let timeout = Duration::from_secs_f64(timeout_secs);
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    /// 単一インスタンスをプローブする
    ///
    /// リトライなし。失敗しても他インスタンスのプローブには影響しない。
    pub async fn probe(&self, announcement: &Announcement) -> ProbeOutcome {
        let url = format!(
            "{}/{}",
            announcement.service_uri.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        );

        match self.client.get(&url).send().await {
            Ok(response) => {
                let status = response.status();
                match response.text().await {
                    Ok(body) => {
                        if status.as_u16() < 400 {
                            ProbeOutcome::Healthy
                        } else {
                            ProbeOutcome::HttpError { status, body }
                        }
                    }
                    // ボディ読み取り中のタイムアウトも読み取りタイムアウト扱い
                    Err(e) if e.is_timeout() => ProbeOutcome::ReadTimeout,
                    Err(e) => ProbeOutcome::Other(format!("{e:?}")),
                }
            }
            Err(e) if e.is_connect() && e.is_timeout() => ProbeOutcome::ConnectTimeout,
            Err(e) if e.is_timeout() => ProbeOutcome::ReadTimeout,
            Err(e) => ProbeOutcome::Other(format!("{e:?}")),
        }
    }
}

/// チェック全体を実行し、検出された問題を返す
///
/// ディスカバリ取得→カウント→閾値評価→各インスタンスの順次プローブ。
/// ディスカバリ失敗のみ`Err`となり、プローブ失敗はProblemとして返る。
pub async fn run_check(cli: &Cli) -> Result<Vec<Problem>, DiscoveryError> {
    let announcements = discovery::fetch_announcements(&cli.discovery, &cli.service).await?;

    let mut problems = Vec::new();

    let count = count_instances(&announcements);
    info!(
        service = %cli.service,
        announced = announcements.len(),
        distinct = count,
        "discovery state evaluated"
    );

    if let Some(problem) = evaluate_announcement_count(count, cli.critical, cli.warn) {
        problems.push(problem);
    }

    // デデュープはカウント専用。プローブは全アナウンス対象。
    let prober = EndpointProber::new(&cli.endpoint, cli.timeout);
    for announcement in &announcements {
        let outcome = prober.probe(announcement).await;

        match &outcome {
            ProbeOutcome::Healthy => {
                debug!(uri = %announcement.service_uri, "health probe succeeded");
            }
            other => {
                warn!(uri = %announcement.service_uri, outcome = ?other, "health probe failed");
            }
        }

        if let Some(problem) = outcome.into_problem(cli.timeout) {
            problems.push(problem);
        }
    }

    Ok(problems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Severity;
    use std::collections::HashMap;

    fn announcement(uri: &str, token: Option<&str>) -> Announcement {
        let mut metadata = HashMap::new();
        if let Some(token) = token {
            metadata.insert(DEDUP_TOKEN_KEY.to_string(), token.to_string());
        }
        Announcement {
            service_type: "web".to_string(),
            service_uri: uri.to_string(),
            metadata,
        }
    }

    #[test]
    fn counts_distinct_tokens_once() {
        let announcements = vec![
            announcement("http://10.0.0.1:8080", Some("a")),
            announcement("http://10.0.0.2:8080", Some("a")),
            announcement("http://10.0.0.3:8080", None),
            announcement("http://10.0.0.4:8080", Some("b")),
        ];

        // 最初の"a"、トークンなし、"b"の3インスタンス
        assert_eq!(count_instances(&announcements), 3);
    }

    #[test]
    fn counts_all_tokenless_announcements() {
        let announcements = vec![
            announcement("http://10.0.0.1:8080", None),
            announcement("http://10.0.0.2:8080", None),
        ];
        assert_eq!(count_instances(&announcements), 2);
    }

    #[test]
    fn empty_list_counts_zero() {
        assert_eq!(count_instances(&[]), 0);
    }

    #[test]
    fn count_below_critical_is_critical() {
        let problem = evaluate_announcement_count(0, 1, 2).unwrap();
        assert_eq!(problem.severity, Severity::Critical);
        assert_eq!(problem.topic, "announcements");
        assert!(problem.detail.contains("0 instances announced"));
        assert!(problem.detail.contains("critical below 1"));
        assert!(problem.detail.contains("warning below 2"));
    }

    #[test]
    fn count_below_warn_only_is_warning() {
        let problem = evaluate_announcement_count(1, 1, 2).unwrap();
        assert_eq!(problem.severity, Severity::Warning);
    }

    #[test]
    fn count_meeting_both_thresholds_is_healthy() {
        assert!(evaluate_announcement_count(2, 1, 2).is_none());
    }

    #[test]
    fn zero_thresholds_disable_count_check() {
        assert!(evaluate_announcement_count(0, 0, 0).is_none());
    }

    #[test]
    fn server_error_maps_to_critical_health_problem() {
        let outcome = ProbeOutcome::HttpError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: "upstream gone".to_string(),
        };
        let problem = outcome.into_problem(5.0).unwrap();
        assert_eq!(problem.severity, Severity::Critical);
        assert_eq!(problem.topic, "health");
        assert!(problem.detail.contains("503"));
        assert!(problem.detail.contains("upstream gone"));
    }

    #[test]
    fn client_error_maps_to_warning_health_problem() {
        let outcome = ProbeOutcome::HttpError {
            status: StatusCode::NOT_FOUND,
            body: String::new(),
        };
        let problem = outcome.into_problem(5.0).unwrap();
        assert_eq!(problem.severity, Severity::Warning);
        assert_eq!(problem.topic, "health");
        assert!(problem.detail.contains("404"));
    }

    #[test]
    fn healthy_outcome_yields_no_problem() {
        assert!(ProbeOutcome::Healthy.into_problem(5.0).is_none());
    }

    #[test]
    fn timeouts_map_to_critical_with_threshold() {
        let problem = ProbeOutcome::ConnectTimeout.into_problem(5.0).unwrap();
        assert_eq!(problem.severity, Severity::Critical);
        assert_eq!(problem.topic, "connect timeout");
        assert!(problem.detail.contains("5.00s"));

        let problem = ProbeOutcome::ReadTimeout.into_problem(2.5).unwrap();
        assert_eq!(problem.topic, "read timeout");
        assert!(problem.detail.contains("2.50s"));
    }

    #[test]
    fn other_failure_maps_to_unhandled_exception() {
        let outcome = ProbeOutcome::Other("dns error".to_string());
        let problem = outcome.into_problem(5.0).unwrap();
        assert_eq!(problem.severity, Severity::Critical);
        assert_eq!(problem.topic, "health");
        assert!(problem.detail.contains("unhandled exception"));
        assert!(problem.detail.contains("dns error"));
    }

    #[test]
    fn long_body_is_truncated_with_ellipsis() {
        let body = "x".repeat(200);
        let truncated = truncate_body(&body);
        assert_eq!(truncated.len(), BODY_PREVIEW_CHARS + 3);
        assert!(truncated.ends_with("..."));

        let exact = "y".repeat(BODY_PREVIEW_CHARS);
        assert_eq!(truncate_body(&exact), exact);
    }
}
