use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::{ScoreResult, ScoreSource};
use crate::{MiniAppError, Result};

const BULK_USERS_PATH: &str = "v2/farcaster/user/bulk";
const API_KEY_HEADER: &str = "api_key";

#[derive(Debug, Deserialize)]
struct BulkUsers {
    #[serde(default)]
    users: Vec<UpstreamUser>,
}

#[derive(Debug, Deserialize)]
struct UpstreamUser {
    score: Option<f64>,
    username: Option<String>,
    pfp_url: Option<String>,
    experimental: Option<Experimental>,
}

#[derive(Debug, Deserialize)]
struct Experimental {
    neynar_user_score: Option<f64>,
}

impl From<UpstreamUser> for ScoreResult {
    fn from(user: UpstreamUser) -> Self {
        let value = user
            .score
            .or_else(|| user.experimental.and_then(|e| e.neynar_user_score))
            .unwrap_or(0.0);
        ScoreResult::new(value, user.username, user.pfp_url)
    }
}

/// Direct client of the reputation service. Holds the credential, so it
/// only ever runs server-side.
#[derive(Clone)]
pub struct NeynarClient {
    client: reqwest::Client,
    base: Url,
    api_key: Option<String>,
}

impl NeynarClient {
    pub fn new(
        client: reqwest::Client,
        base: Url,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn bulk_url(&self, fid: u64) -> Result<Url> {
        let mut url = self.base.join(BULK_USERS_PATH)?;
        url.query_pairs_mut()
            .append_pair("fids", &fid.to_string());
        Ok(url)
    }
}

#[async_trait]
impl ScoreSource for NeynarClient {
    async fn fetch(&self, fid: u64) -> Result<ScoreResult> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            log::error!("NEYNAR_API_KEY is not set in the environment");
            MiniAppError::UpstreamConfig
        })?;

        let url = self.bulk_url(fid)?;
        log::debug!("Fetching score of fid {fid} from {url}");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reason = status
                .canonical_reason()
                .unwrap_or(status.as_str())
                .to_string();
            log::warn!("Reputation service answered {status} for fid {fid}");
            return Err(MiniAppError::Upstream(reason));
        }

        let body: BulkUsers = response.json().await.map_err(|e| {
            log::warn!("Unreadable reputation payload for fid {fid}: {e}");
            MiniAppError::Parse
        })?;

        body.users
            .into_iter()
            .next()
            .map(ScoreResult::from)
            .ok_or(MiniAppError::NotFound)
    }
}

/// The in-app side: calls this deployment's own `/api/score` route
/// instead of talking to the reputation service.
#[derive(Clone)]
pub struct ProxyClient {
    client: reqwest::Client,
    base: Url,
}

impl ProxyClient {
    pub fn new(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }
}

#[derive(Debug, Deserialize)]
struct ProxyError {
    error: Option<String>,
}

#[async_trait]
impl ScoreSource for ProxyClient {
    async fn fetch(&self, fid: u64) -> Result<ScoreResult> {
        let mut url = self.base.join("api/score")?;
        url.query_pairs_mut()
            .append_pair("fid", &fid.to_string());

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.is_success() {
            let result: ScoreResult = response.json().await.map_err(|e| {
                log::warn!("Unreadable score payload: {e}");
                MiniAppError::Parse
            })?;
            return Ok(ScoreResult::new(
                result.value,
                result.handle,
                result.avatar_url,
            ));
        }

        let message = response
            .json::<ProxyError>()
            .await
            .ok()
            .and_then(|e| e.error)
            .unwrap_or_else(|| status.to_string());
        Err(match status {
            StatusCode::BAD_REQUEST => MiniAppError::MissingParameter("FID"),
            StatusCode::NOT_FOUND => MiniAppError::NotFound,
            _ => MiniAppError::Upstream(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::http_client;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn neynar(server: &MockServer, key: Option<&str>) -> NeynarClient {
        NeynarClient::new(
            http_client().unwrap(),
            Url::parse(&server.uri()).unwrap(),
            key.map(String::from),
        )
    }

    #[tokio::test]
    async fn returns_first_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/farcaster/user/bulk"))
            .and(query_param("fids", "123"))
            .and(header("api_key", "secret"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [
                    {
                        "fid": 123,
                        "score": 0.95,
                        "username": "alice",
                        "pfp_url": "https://img.example/a.png"
                    },
                    {"fid": 124, "score": 0.10, "username": "bob"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = neynar(&server, Some("secret"))
            .await
            .fetch(123)
            .await
            .unwrap();
        assert_eq!(result.value, 0.95);
        assert_eq!(result.handle.as_deref(), Some("alice"));
        assert_eq!(
            result.avatar_url.as_deref(),
            Some("https://img.example/a.png")
        );
    }

    #[tokio::test]
    async fn missing_score_defaults_to_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [{"fid": 5, "username": "carol"}]
            })))
            .mount(&server)
            .await;

        let result =
            neynar(&server, Some("secret")).await.fetch(5).await.unwrap();
        assert_eq!(result.value, 0.0);
        assert_eq!(result.handle.as_deref(), Some("carol"));
    }

    #[tokio::test]
    async fn experimental_score_is_a_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "users": [{
                    "fid": 5,
                    "experimental": {"neynar_user_score": 0.77}
                }]
            })))
            .mount(&server)
            .await;

        let result =
            neynar(&server, Some("secret")).await.fetch(5).await.unwrap();
        assert_eq!(result.value, 0.77);
    }

    #[tokio::test]
    async fn empty_user_list_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"users": []})),
            )
            .mount(&server)
            .await;

        let result = neynar(&server, Some("secret")).await.fetch(9).await;
        assert!(matches!(result, Err(MiniAppError::NotFound)));
    }

    #[tokio::test]
    async fn upstream_status_text_is_carried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = neynar(&server, Some("secret")).await.fetch(9).await;
        match result {
            Err(MiniAppError::Upstream(reason)) => {
                assert_eq!(reason, "Too Many Requests")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_credential_never_calls_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = neynar(&server, Some("  ")).await;
        assert!(!client.is_configured());
        let result = client.fetch(1).await;
        assert!(matches!(result, Err(MiniAppError::UpstreamConfig)));
    }

    #[tokio::test]
    async fn proxy_maps_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/score"))
            .and(query_param("fid", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "score": 0.8, "username": "dan"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/score"))
            .and(query_param("fid", "2"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(json!({"error": "User not found"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/score"))
            .and(query_param("fid", "3"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"error": "Failed to fetch score"})),
            )
            .mount(&server)
            .await;

        let proxy = ProxyClient::new(
            http_client().unwrap(),
            Url::parse(&format!("{}/", server.uri())).unwrap(),
        );

        let ok = proxy.fetch(1).await.unwrap();
        assert_eq!(ok.value, 0.8);
        assert_eq!(ok.handle.as_deref(), Some("dan"));
        assert_eq!(ok.avatar_url, None);

        assert!(matches!(proxy.fetch(2).await, Err(MiniAppError::NotFound)));
        match proxy.fetch(3).await {
            Err(MiniAppError::Upstream(message)) => {
                assert_eq!(message, "Failed to fetch score")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
