//! HTTP client for kudosd.

use anyhow::{anyhow, Context, Result};
use kudos_common::{RewardStatus, RoundContext, RoundId, RoundXpSummary};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

/// Daemon answer to a reward trigger
#[derive(Debug, Clone, Deserialize)]
pub struct StartAccepted {
    pub round_id: RoundId,
    pub accepted: bool,
    pub status_url: String,
    #[serde(default)]
    pub xp: Option<RoundXpSummary>,
}

/// Client for communicating with kudosd
pub struct KudosClient {
    base_url: String,
    http: reqwest::Client,
}

impl KudosClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Trigger reward generation for a round
    pub async fn start_reward(&self, round_id: &RoundId, context: &RoundContext) -> Result<StartAccepted> {
        let response = self
            .http
            .post(self.url(&format!("/v1/rounds/{}/reward", round_id)))
            .json(&json!({ "context": context }))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Reward start rejected ({}): {}", status, error_text(response).await));
        }
        response.json().await.context("decoding start response")
    }

    /// Current status of a round; `None` when the daemon does not know it
    pub async fn reward_status(&self, round_id: &RoundId) -> Result<Option<RewardStatus>> {
        let response = self
            .http
            .get(self.url(&format!("/v1/rounds/{}/reward", round_id)))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(response.json().await.context("decoding status")?)),
            s => Err(anyhow!("Status request failed ({}): {}", s, error_text(response).await)),
        }
    }

    pub async fn health(&self) -> Result<Value> {
        let response = self
            .http
            .get(self.url("/v1/health"))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        Ok(response.error_for_status()?.json().await?)
    }

    fn unreachable(&self, e: reqwest::Error) -> anyhow::Error {
        anyhow!(
            "Cannot reach kudosd at {}: {}\n\n\
             Is the daemon running? Start it with: kudosd --config /etc/kudos/config.toml",
            self.base_url,
            e
        )
    }
}

async fn error_text(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body)
}
