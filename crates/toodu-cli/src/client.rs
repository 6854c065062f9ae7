//! API client for communicating with the prediction API

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use toodu_lib::ErrorResponse;
use url::Url;

/// API client for the prediction API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        // Summaries wait on the upstream chat API
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(90))
            .build()
            .context("Failed to create HTTP client")?;

        let mut base_url = Url::parse(base_url).context("Invalid API URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        self.send(self.client.get(url)).await
    }

    /// Make a POST request with JSON body and query parameters
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        self.send(self.client.post(url).query(query).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.data.error)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, detail);
        }

        response.json().await.context("Failed to parse response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::{json, Value};

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = ApiClient::new("http://localhost:5000/prefix").unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:5000/prefix/");
        assert!(ApiClient::new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_post_sends_query_and_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/predict")
            .match_query(Matcher::UrlEncoded(
                "model_name".into(),
                "LogisticRegression".into(),
            ))
            .match_body(Matcher::Json(json!([{"LOCATION_TYPE": 1}])))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": 200}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let response: Value = client
            .post(
                "api/v1/predict",
                &[("model_name", "LogisticRegression".to_string())],
                &json!([{"LOCATION_TYPE": 1}]),
            )
            .await
            .unwrap();

        assert_eq!(response["status"], 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_envelope_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "status": 400,
                    "message": "An error occurred while processing the request.",
                    "data": {"error": "Model name 'SVC' is not supported.", "model": "SVC", "timestamp": "2024-11-20T10:00:00Z"},
                    "timestamp": "2024-11-20T10:00:00Z"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.get::<Value>("api/v1/").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("400"));
        assert!(message.contains("Model name 'SVC' is not supported."));
    }

    #[tokio::test]
    async fn test_non_envelope_error_body_is_kept() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.get::<Value>("api/v1/").await.unwrap_err();
        assert!(err.to_string().contains("bad gateway"));
    }
}
