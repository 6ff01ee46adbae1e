use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::{MiniAppError, Result};

const DEFAULT_USER_AGENT: &str =
    concat!("neynar-score/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared outbound client: one connection pool for the upstream API,
/// avatars and fonts.
pub fn http_client() -> Result<reqwest::Client> {
    let mut header = HeaderMap::new();
    header.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
    let client = reqwest::Client::builder()
        .default_headers(header)
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    Ok(client)
}

/// Downloads a binary resource, refusing anything above `max_bytes`.
pub async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    max_bytes: usize,
) -> Result<Vec<u8>> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(MiniAppError::Upstream(format!("{url}: {status}")));
    }
    if let Some(length) = response.content_length() {
        if length as usize > max_bytes {
            return Err(MiniAppError::Upstream(format!(
                "{url}: {length} bytes exceeds the {max_bytes} byte limit"
            )));
        }
    }
    let bytes = response.bytes().await?;
    if bytes.len() > max_bytes {
        return Err(MiniAppError::Upstream(format!(
            "{url}: {} bytes exceeds the {max_bytes} byte limit",
            bytes.len()
        )));
    }
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn downloads_small_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blob"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(vec![7u8; 16]),
            )
            .mount(&server)
            .await;

        let client = http_client().unwrap();
        let bytes = fetch_bytes(&client, &format!("{}/blob", server.uri()), 64)
            .await
            .unwrap();
        assert_eq!(bytes, vec![7u8; 16]);
    }

    #[tokio::test]
    async fn rejects_oversized_and_failed_downloads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(vec![0u8; 128]),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = http_client().unwrap();
        let big_url = format!("{}/big", server.uri());
        let big = fetch_bytes(&client, &big_url, 64).await;
        assert!(matches!(big, Err(MiniAppError::Upstream(_))));
        let missing_url = format!("{}/missing", server.uri());
        let missing = fetch_bytes(&client, &missing_url, 64).await;
        assert!(matches!(missing, Err(MiniAppError::Upstream(_))));
    }
}
