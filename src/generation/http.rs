//! OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{GenerationError, GenerationRequest, TextGenerator};

pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpGenerator {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key,
        })
    }

    fn body(&self, request: &GenerationRequest) -> Value {
        json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
        })
    }

    async fn send(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut builder = self.client.post(&self.endpoint).json(&self.body(request));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(classify_transport)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::failed(format!("invalid response body: {}", e)))?;
        let content = extract_content(&value).ok_or_else(|| {
            GenerationError::failed("response has no choices[0].message.content")
        })?;
        if content.trim().is_empty() {
            return Err(GenerationError::empty());
        }
        Ok(content)
    }
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            max_tokens = request.max_tokens,
            "sending chat completion request"
        );
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GenerationError::cancelled()),
            result = self.send(request) => result,
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn classify_transport(err: reqwest::Error) -> GenerationError {
    if err.is_connect() || err.is_timeout() {
        GenerationError::connection(format!("failed to reach generation service: {}", err))
    } else {
        GenerationError::failed(format!("request failed: {}", err))
    }
}

/// Gateway errors, overload and rate limiting mean the service is unavailable.
fn classify_status(status: StatusCode, body: &str) -> GenerationError {
    let message = format!("service returned {}: {}", status, truncate(body, 300));
    match status {
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => GenerationError::connection(message),
        _ => GenerationError::failed(message),
    }
}

fn extract_content(value: &Value) -> Option<String> {
    value
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationErrorKind;
    use axum::{Json, Router, http::StatusCode as AxumStatus, routing::post};

    fn request() -> GenerationRequest {
        GenerationRequest {
            system_prompt: "system".into(),
            user_prompt: "user".into(),
            max_tokens: 100,
            temperature: 0.5,
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    fn generator(endpoint: &str) -> HttpGenerator {
        HttpGenerator::new(endpoint, "test-model", None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_extract_content() {
        let value = json!({"choices": [{"message": {"content": "hello"}}]});
        assert_eq!(extract_content(&value).as_deref(), Some("hello"));
        assert!(extract_content(&json!({"choices": []})).is_none());
    }

    #[test]
    fn test_classify_status() {
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_connection());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_connection());
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST, "bad model").kind,
            GenerationErrorKind::Failed
        );
    }

    #[test]
    fn test_body_shape() {
        let body = generator("http://localhost").body(&request());
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "user");
        assert_eq!(body["max_tokens"], 100);
    }

    #[tokio::test]
    async fn test_generate_returns_message_content() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                let user = body["messages"][1]["content"].as_str().unwrap_or("").to_string();
                Json(json!({"choices": [{"message": {"content": format!("echo: {}", user)}}]}))
            }),
        );
        let endpoint = serve(router).await;
        let text = generator(&endpoint)
            .generate(&request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "echo: user");
    }

    #[tokio::test]
    async fn test_generate_empty_content() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({"choices": [{"message": {"content": "  "}}]})) }),
        );
        let endpoint = serve(router).await;
        let err = generator(&endpoint)
            .generate(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::Empty);
    }

    #[tokio::test]
    async fn test_generate_unavailable_is_connection() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let endpoint = serve(router).await;
        let err = generator(&endpoint)
            .generate(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_connection());
    }

    #[tokio::test]
    async fn test_generate_refused_is_connection() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let endpoint = format!("http://{}/v1/chat/completions", addr);
        let err = generator(&endpoint)
            .generate(&request(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_connection(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_generate_observes_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = generator("http://127.0.0.1:9/never")
            .generate(&request(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
