//! アナウンス取得
//!
//! ディスカバリサーバーの`/state`ドキュメントを取得し、
//! 対象サービスのアナウンスのみを抽出する

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// ディスカバリ取得のタイムアウト（秒）
const DISCOVERY_TIMEOUT_SECS: u64 = 4;

/// ディスカバリサーバーに登録された単一インスタンスのアナウンス
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    /// サービス種別（サービス名フィルタの対象）
    pub service_type: String,
    /// インスタンスのベースURI
    pub service_uri: String,
    /// 任意メタデータ（デデュープトークン等）
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// ディスカバリ取得エラー
///
/// いずれの変種もラン全体の失敗（終了コード3）として扱われ、
/// Problemランキングには混入しない。
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// リクエスト送信・応答受信の失敗（接続エラー、タイムアウト含む）
    #[error("discovery request failed")]
    Request(#[from] reqwest::Error),

    /// ディスカバリサーバーが2xx以外を返した
    #[error("discovery server returned HTTP {0}")]
    Status(reqwest::StatusCode),

    /// stateドキュメントのJSONが不正、または必須フィールド欠落
    #[error("invalid state document")]
    Parse(#[from] serde_json::Error),
}

/// `<discovery>/state`を取得し、対象サービスのアナウンスを返す
///
/// フィルタは`serviceType`の完全一致。タイムアウトは固定4秒。
pub async fn fetch_announcements(
    discovery_url: &str,
    service: &str,
) -> Result<Vec<Announcement>, DiscoveryError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(DISCOVERY_TIMEOUT_SECS))
        .build()?;

    let url = format!("{}/state", discovery_url.trim_end_matches('/'));
    debug!(url = %url, "fetching discovery state");

    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(DiscoveryError::Status(response.status()));
    }

    let body = response.text().await?;
    let announcements: Vec<Announcement> = serde_json::from_str(&body)?;

    let matching: Vec<Announcement> = announcements
        .into_iter()
        .filter(|a| a.service_type == service)
        .collect();

    debug!(
        service = %service,
        count = matching.len(),
        "discovery state fetched"
    );

    Ok(matching)
}
