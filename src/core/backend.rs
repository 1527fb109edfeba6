//! HTTP access to the Synapse thread and chat endpoints.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tracing::debug;

use crate::api::{
    ChatStreamRequest, HistoryResponse, NewThreadResponse, SummaryRequest, SummaryResponse,
    ThreadsResponse,
};
use crate::core::constants::DEFAULT_THREAD_TITLE;
use crate::core::registry::ThreadState;
use crate::core::thread_id::ThreadId;
use crate::utils::url::construct_api_url;

/// Raw chat stream body, chunked as it arrives off the wire.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, BackendError>>;

#[derive(Debug)]
pub enum BackendError {
    /// The request could not be sent or its body could not be read.
    Request(reqwest::Error),
    /// The server answered with a non-success status.
    Status { status: u16, detail: Option<String> },
    /// The response body did not match the expected shape.
    Decode(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Request(err) => write!(f, "request failed: {err}"),
            BackendError::Status {
                status,
                detail: Some(detail),
            } => write!(f, "HTTP {status}: {detail}"),
            BackendError::Status {
                status,
                detail: None,
            } => write!(f, "HTTP {status}"),
            BackendError::Decode(message) => write!(f, "unexpected response: {message}"),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Request(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Request(err)
        }
    }
}

/// Operations the client needs from the server. Implemented over HTTP by
/// [`HttpBackend`]; tests substitute scripted implementations.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn create_thread(&self) -> Result<ThreadId, BackendError>;

    async fn list_threads(&self) -> Result<Vec<ThreadId>, BackendError>;

    /// Fetch title and history. Unknown threads resolve to an empty conversation
    /// with the default title instead of an error.
    async fn fetch_history(&self, thread_id: &ThreadId) -> Result<ThreadState, BackendError>;

    async fn delete_thread(&self, thread_id: &ThreadId) -> Result<(), BackendError>;

    /// Ask the server for a short title summarizing `text`.
    async fn summarize(&self, text: &str) -> Result<String, BackendError>;

    /// Start a chat turn and return the undecoded response body.
    async fn open_chat_stream(
        &self,
        thread_id: &ThreadId,
        message: &str,
    ) -> Result<ByteStream, BackendError>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        construct_api_url(&self.base_url, endpoint)
    }

    fn thread_url(&self, thread_id: &ThreadId, suffix: &str) -> String {
        let segment = urlencoding::encode(thread_id.as_str());
        self.url(&format!("thread/{segment}{suffix}"))
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        detail: extract_error_detail(&body),
    })
}

/// Pull a one-line human readable message out of an error body.
///
/// FastAPI style `{"detail": ...}` bodies and `{"error": ...}` records are recognized;
/// other non-empty bodies are collapsed to a single line.
fn extract_error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let summary = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => value
            .get("detail")
            .or_else(|| value.get("error"))
            .or_else(|| value.get("message"))
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Object(map) => map
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_owned)
                    .unwrap_or_else(|| v.to_string()),
                other => other.to_string(),
            })
            .unwrap_or_else(|| trimmed.to_string()),
        Err(_) => trimmed.to_string(),
    };

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn create_thread(&self) -> Result<ThreadId, BackendError> {
        let response = self.client.post(self.url("thread/new")).send().await?;
        let created: NewThreadResponse = ensure_success(response).await?.json().await?;
        Ok(created.thread_id)
    }

    async fn list_threads(&self) -> Result<Vec<ThreadId>, BackendError> {
        let response = self.client.get(self.url("threads")).send().await?;
        let listed: ThreadsResponse = ensure_success(response).await?.json().await?;
        Ok(listed.threads)
    }

    async fn fetch_history(&self, thread_id: &ThreadId) -> Result<ThreadState, BackendError> {
        let response = self
            .client
            .get(self.thread_url(thread_id, "/history"))
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(
                thread_id = %thread_id,
                status = response.status().as_u16(),
                "History unavailable; treating thread as empty"
            );
            return Ok(ThreadState::new(thread_id.clone()));
        }

        let history: HistoryResponse = response.json().await?;
        let messages = history
            .messages
            .into_iter()
            .filter_map(|entry| entry.into_message())
            .collect();
        Ok(ThreadState::with_history(
            thread_id.clone(),
            history.title.as_deref(),
            messages,
        ))
    }

    async fn delete_thread(&self, thread_id: &ThreadId) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.thread_url(thread_id, ""))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(thread_id = %thread_id, "Thread already absent on server");
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }

    async fn summarize(&self, text: &str) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.url("chat/summary"))
            .json(&SummaryRequest { text })
            .send()
            .await?;
        let summary: SummaryResponse = ensure_success(response).await?.json().await?;
        Ok(summary
            .title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| DEFAULT_THREAD_TITLE.to_string()))
    }

    async fn open_chat_stream(
        &self,
        thread_id: &ThreadId,
        message: &str,
    ) -> Result<ByteStream, BackendError> {
        let response = self
            .client
            .post(self.url("chat/stream"))
            .header("Accept", "text/event-stream")
            .json(&ChatStreamRequest { thread_id, message })
            .send()
            .await?;
        let response = ensure_success(response).await?;
        debug!(thread_id = %thread_id, "Chat stream opened");

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(BackendError::Request)
            })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Message;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> HttpBackend {
        HttpBackend::new(server.uri(), Duration::from_secs(5)).expect("client")
    }

    #[tokio::test]
    async fn create_thread_returns_server_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/thread/new"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"thread_id": "srv-1"})))
            .expect(1)
            .mount(&server)
            .await;

        let id = backend_for(&server).create_thread().await.expect("create");
        assert_eq!(id, ThreadId::from("srv-1"));
    }

    #[tokio::test]
    async fn list_threads_tolerates_missing_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let ids = backend_for(&server).list_threads().await.expect("list");
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn list_threads_preserves_server_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/threads"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"threads": ["a", "b", "c"]})),
            )
            .mount(&server)
            .await;

        let ids = backend_for(&server).list_threads().await.expect("list");
        let expected: Vec<ThreadId> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn history_failure_degrades_to_empty_thread() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thread/gone/history"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "boom"})))
            .mount(&server)
            .await;

        let state = backend_for(&server)
            .fetch_history(&ThreadId::from("gone"))
            .await
            .expect("history should not fail");
        assert_eq!(state.id, ThreadId::from("gone"));
        assert!(state.messages.is_empty());
        assert_eq!(state.title, DEFAULT_THREAD_TITLE);
    }

    #[tokio::test]
    async fn history_keeps_user_and_assistant_messages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thread/t1/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "thread_id": "t1",
                "title": "Rust Borrow Checker",
                "messages": [
                    {"role": "user", "content": "explain lifetimes"},
                    {"role": "tool", "content": "ignored"},
                    {"role": "assistant", "content": "Lifetimes are..."}
                ]
            })))
            .mount(&server)
            .await;

        let state = backend_for(&server)
            .fetch_history(&ThreadId::from("t1"))
            .await
            .expect("history");
        assert_eq!(state.title, "Rust Borrow Checker");
        assert_eq!(
            state.messages,
            vec![
                Message::user("explain lifetimes"),
                Message::assistant("Lifetimes are...")
            ]
        );
    }

    #[tokio::test]
    async fn history_with_blank_title_uses_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thread/t2/history"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"title": "  ", "messages": []})),
            )
            .mount(&server)
            .await;

        let state = backend_for(&server)
            .fetch_history(&ThreadId::from("t2"))
            .await
            .expect("history");
        assert_eq!(state.title, DEFAULT_THREAD_TITLE);
    }

    #[tokio::test]
    async fn summarize_falls_back_to_default_title() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/summary"))
            .and(body_json(json!({"text": "how do I parse json in rust"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": ""})))
            .expect(1)
            .mount(&server)
            .await;

        let title = backend_for(&server)
            .summarize("how do I parse json in rust")
            .await
            .expect("summary");
        assert_eq!(title, DEFAULT_THREAD_TITLE);
    }

    #[tokio::test]
    async fn summarize_returns_server_title() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/summary"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"title": "JSON Parsing in Rust"})),
            )
            .mount(&server)
            .await;

        let title = backend_for(&server)
            .summarize("how do I parse json in rust")
            .await
            .expect("summary");
        assert_eq!(title, "JSON Parsing in Rust");
    }

    #[tokio::test]
    async fn delete_treats_missing_thread_as_done() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/thread/t404"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/thread/t500"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        backend
            .delete_thread(&ThreadId::from("t404"))
            .await
            .expect("404 is fine");
        let err = backend
            .delete_thread(&ThreadId::from("t500"))
            .await
            .expect_err("500 fails");
        assert!(matches!(err, BackendError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn open_stream_rejects_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/stream"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(json!({"detail": "model   offline"})),
            )
            .mount(&server)
            .await;

        let err = match backend_for(&server)
            .open_chat_stream(&ThreadId::from("t1"), "hi")
            .await
        {
            Ok(_) => panic!("expected failure"),
            Err(err) => err,
        };
        assert_eq!(err.to_string(), "HTTP 503: model offline");
    }

    #[test]
    fn error_detail_handles_common_shapes() {
        assert_eq!(extract_error_detail(""), None);
        assert_eq!(
            extract_error_detail(r#"{"error":{"message":"quota exceeded"}}"#),
            Some("quota exceeded".to_string())
        );
        assert_eq!(
            extract_error_detail("<html>Bad Gateway</html>"),
            Some("<html>Bad Gateway</html>".to_string())
        );
        assert_eq!(
            extract_error_detail(r#"{"status":"failed"}"#),
            Some(r#"{"status":"failed"}"#.to_string())
        );
    }

    #[test]
    fn new_keeps_base_url() {
        let backend = HttpBackend::new("http://10.0.0.2:8000", Duration::from_millis(250))
            .expect("client builds");
        assert_eq!(backend.base_url(), "http://10.0.0.2:8000");
    }

    #[test]
    fn thread_ids_are_path_encoded() {
        let backend =
            HttpBackend::new("http://localhost:8000/", Duration::from_secs(1)).expect("client");
        assert_eq!(
            backend.thread_url(&ThreadId::from("a b/c"), "/history"),
            "http://localhost:8000/thread/a%20b%2Fc/history"
        );
    }
}
