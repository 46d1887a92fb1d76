//! WHO ICD-11 API client.
//!
//! Resolution is two-stage: `autocode` maps a clinical phrase straight to a
//! code when the terminology recognizes it; otherwise a flexisearch query
//! over the MMS linearization picks the highest-scoring entity. Access
//! tokens come from the WHO OAuth2 endpoint and are cached until shortly
//! before expiry.

use super::CodeResolver;
use crate::model::IcdMatch;
use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

const TOKEN_ENDPOINT: &str = "https://icdaccessmanagement.who.int/connect/token";
const DEFAULT_RELEASE_URL: &str = "https://id.who.int/icd/release/11/2025-01/mms";
const SCOPE: &str = "icdapi_access";
const GRANT_TYPE: &str = "client_credentials";

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

pub struct WhoIcdResolver {
    client_id: String,
    client_secret: String,
    token_url: String,
    release_url: String,
    client: reqwest::Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl WhoIcdResolver {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            token_url: TOKEN_ENDPOINT.to_string(),
            release_url: DEFAULT_RELEASE_URL.to_string(),
            client: reqwest::Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Point at a different linearization release, e.g. a pinned mirror.
    #[must_use]
    pub fn with_release_url(mut self, release_url: impl Into<String>) -> Self {
        self.release_url = release_url.into();
        self
    }

    #[must_use]
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Get a bearer token, refreshing when the cached one is within 60
    /// seconds of expiry.
    async fn token(&self) -> anyhow::Result<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(cached) = cache.as_ref() {
                let buffer = chrono::Duration::seconds(60);
                if cached.expires_at > Utc::now() + buffer {
                    return Ok(cached.token.clone());
                }
            }
        }
        self.fetch_token_with_retry().await
    }

    async fn fetch_token_with_retry(&self) -> anyhow::Result<String> {
        let mut retries = 0;
        let max_retries = 3;

        loop {
            match self.fetch_token().await {
                Ok(token) => return Ok(token),
                Err(e) if retries < max_retries => {
                    retries += 1;

                    let backoff = std::time::Duration::from_secs(1 << retries);
                    let backoff = backoff.min(std::time::Duration::from_secs(30));

                    tracing::warn!(
                        error = %e,
                        retry = retries,
                        backoff_secs = backoff.as_secs(),
                        "ICD token request failed, retrying"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_token(&self) -> anyhow::Result<String> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", SCOPE),
            ("grant_type", GRANT_TYPE),
        ];

        let resp = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .context("requesting ICD access token")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "ICD token endpoint error (status {status}): {}",
                body.chars().take(200).collect::<String>()
            );
        }

        let token: TokenResponse = resp
            .json()
            .await
            .context("decoding ICD token response")?;

        let expires_at = Utc::now() + chrono::Duration::seconds(token.expires_in);
        tracing::debug!(expires_in = token.expires_in, "obtained ICD access token");
        *self.cached_token.write().await = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }

    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> anyhow::Result<serde_json::Value> {
        let token = self.token().await?;
        let resp = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "application/json")
            .header("Accept-Language", "en")
            .header("API-Version", "v2")
            .query(query)
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "ICD API error (status {status}): {}",
                body.chars().take(200).collect::<String>()
            );
        }

        resp.json()
            .await
            .with_context(|| format!("decoding reply from {url}"))
    }

    async fn autocode(&self, term: &str) -> anyhow::Result<Option<IcdMatch>> {
        let url = format!("{}/autocode", self.release_url);
        let json = self.get_json(&url, &[("searchText", term)]).await?;
        Ok(parse_autocode(&json))
    }

    async fn flexisearch(&self, term: &str) -> anyhow::Result<Option<IcdMatch>> {
        let url = format!("{}/search", self.release_url);
        let json = self
            .get_json(
                &url,
                &[
                    ("q", term),
                    ("useFlexisearch", "true"),
                    ("flatResults", "true"),
                    ("medicalCodingMode", "true"),
                    ("highlightingEnabled", "false"),
                ],
            )
            .await?;
        Ok(parse_flexisearch(&json))
    }
}

/// Direct match from the autocode endpoint, when it recognized the phrase.
fn parse_autocode(json: &serde_json::Value) -> Option<IcdMatch> {
    let code = json.get("theCode")?.as_str()?.trim();
    if code.is_empty() {
        return None;
    }
    let title = json
        .get("matchingText")
        .and_then(|v| v.as_str())
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(code);
    Some(IcdMatch {
        code: code.to_string(),
        title: title.trim().to_string(),
    })
}

/// Highest-scoring entity from a flexisearch reply.
fn parse_flexisearch(json: &serde_json::Value) -> Option<IcdMatch> {
    let entities = json.get("destinationEntities")?.as_array()?;
    let best = entities.iter().max_by(|a, b| {
        let sa = a.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let sb = b.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0);
        sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
    })?;

    let code = best.get("theCode")?.as_str()?.trim();
    if code.is_empty() {
        return None;
    }
    let title = best
        .get("title")
        .and_then(|v| v.as_str())
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(code);
    Some(IcdMatch {
        code: code.to_string(),
        title: title.trim().to_string(),
    })
}

#[async_trait]
impl CodeResolver for WhoIcdResolver {
    async fn resolve(&self, term: &str) -> anyhow::Result<Option<IcdMatch>> {
        if let Some(found) = self.autocode(term).await? {
            return Ok(Some(found));
        }
        tracing::debug!(term = %term, "autocode missed, widening to flexisearch");
        self.flexisearch(term).await
    }

    fn name(&self) -> &'static str {
        "who-icd11"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn autocode_reply_maps_to_a_match() {
        let reply = json!({
            "theCode": "1A00",
            "matchingText": "Cholera",
            "searchText": "cholera"
        });
        let m = parse_autocode(&reply).unwrap();
        assert_eq!(m.code, "1A00");
        assert_eq!(m.title, "Cholera");
    }

    #[test]
    fn autocode_without_code_is_a_miss() {
        assert!(parse_autocode(&json!({ "theCode": "", "matchingText": "x" })).is_none());
        assert!(parse_autocode(&json!({ "matchingText": "x" })).is_none());
    }

    #[test]
    fn autocode_falls_back_to_code_when_text_is_blank() {
        let m = parse_autocode(&json!({ "theCode": "1A00", "matchingText": " " })).unwrap();
        assert_eq!(m.title, "1A00");
    }

    #[test]
    fn flexisearch_picks_the_highest_scoring_entity() {
        let reply = json!({
            "destinationEntities": [
                { "theCode": "1A03", "title": "Intestinal infections due to Escherichia coli", "score": 0.41 },
                { "theCode": "1A00", "title": "Cholera", "score": 0.93 },
                { "theCode": "1A40", "title": "Gastroenteritis", "score": 0.62 }
            ]
        });
        let m = parse_flexisearch(&reply).unwrap();
        assert_eq!(m.code, "1A00");
        assert_eq!(m.title, "Cholera");
    }

    #[test]
    fn flexisearch_with_no_entities_is_a_miss() {
        assert!(parse_flexisearch(&json!({ "destinationEntities": [] })).is_none());
        assert!(parse_flexisearch(&json!({})).is_none());
    }

    #[tokio::test]
    async fn cached_token_is_reused_until_near_expiry() {
        let resolver = WhoIcdResolver::new("id".into(), "secret".into())
            .with_token_url("http://127.0.0.1:1/connect/token");
        *resolver.cached_token.write().await = Some(CachedToken {
            token: "cached-token".into(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        });

        // A live fetch would fail against the unroutable URL above.
        assert_eq!(resolver.token().await.unwrap(), "cached-token");
    }
}
