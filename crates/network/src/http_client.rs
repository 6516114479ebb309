use std::time::Duration;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::error::{NetError, Result};

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    config: Config,
}

impl HttpClient {
    pub fn new(config: Config) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone());

        if !config.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| NetError::Config(format!("Failed to build client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub async fn get<Q: Serialize + ?Sized>(&self, url: &str, query: &Q) -> Result<Response> {
        self.client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| NetError::from_reqwest("GET request failed", e))
    }

    /// GET and decode a JSON body. Non-success statuses become `NetError::Status`
    /// so callers can tell "not found" apart from transport faults.
    pub async fn get_json<Q: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        query: &Q,
    ) -> Result<T> {
        let response = Self::ensure_success(self.get(url, query).await?).await?;
        response
            .json()
            .await
            .map_err(|e| NetError::Decode(format!("JSON parse failed: {}", e)))
    }

    pub async fn post<T: Serialize>(&self, url: &str, body: &T) -> Result<Response> {
        self.client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| NetError::from_reqwest("POST request failed", e))
    }

    pub async fn post_json<T: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<R> {
        let response = Self::ensure_success(self.post(url, body).await?).await?;
        response
            .json()
            .await
            .map_err(|e| NetError::Decode(format!("JSON parse failed: {}", e)))
    }

    async fn ensure_success(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(NetError::Status {
            status: status.as_u16(),
            body,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Deserialize)]
    struct Pong {
        ok: bool,
    }

    #[tokio::test]
    async fn test_get_json_with_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .and(query_param("chain", "base-mainnet"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(Config::default()).unwrap();
        let pong: Pong = client
            .get_json(&format!("{}/ping", server.uri()), &[("chain", "base-mainnet")])
            .await
            .unwrap();
        assert!(pong.ok);
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(serde_json::json!({ "error": "nope" })),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(Config::default()).unwrap();
        let err = client
            .get_json::<_, serde_json::Value>(&format!("{}/missing", server.uri()), &())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "ok": true }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = HttpClient::new(Config::default().with_timeout(1)).unwrap();
        let err = client
            .get_json::<_, Pong>(&server.uri(), &())
            .await
            .err()
            .unwrap();
        assert!(err.is_timeout());
    }
}
