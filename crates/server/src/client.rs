//! Control client for a running server
//!
//! Backs the `vote`, `preview`, `theme`, `clear-cache` and `watch`
//! subcommands.

use futures::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::ClientError;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ControlClient {
    base: String,
    http: reqwest::Client,
}

impl ControlClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub async fn vote(&self, score: i64) -> Result<Value, ClientError> {
        let url = format!("{}/vote/{score}", self.base);
        let response = self.http.get(&url).send().await;
        read_json(&url, response).await
    }

    pub async fn preview(&self, active: bool, score: i64) -> Result<Value, ClientError> {
        self.post("/preview", json!({ "active": active, "score": score }))
            .await
    }

    pub async fn theme(&self, hue_deg: i64) -> Result<Value, ClientError> {
        self.post("/theme", json!({ "hue_deg": hue_deg })).await
    }

    pub async fn clear_cache(&self) -> Result<Value, ClientError> {
        let url = format!("{}/cache", self.base);
        let response = self.http.delete(&url).send().await;
        read_json(&url, response).await
    }

    /// Follow `/stream` forever, reconnecting after a short pause
    pub async fn watch<F>(&self, mut on_event: F)
    where
        F: FnMut(&Value),
    {
        loop {
            if let Err(e) = self.follow(&mut on_event).await {
                tracing::warn!(error = %e, "Event stream interrupted");
            } else {
                tracing::info!("Event stream closed by server");
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn follow<F>(&self, on_event: &mut F) -> Result<(), ClientError>
    where
        F: FnMut(&Value),
    {
        let url = format!("{}/stream", self.base);
        let http_err = |source| ClientError::Http {
            url: url.clone(),
            source,
        };

        let response = self.http.get(&url).send().await.map_err(http_err)?;
        let response = check_status(response).await?;
        tracing::info!(url = %url, "Watching overlay events");

        let mut parser = SseParser::default();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(http_err)?;
            for data in parser.push(&chunk) {
                match serde_json::from_str::<Value>(&data) {
                    Ok(event) => on_event(&event),
                    Err(e) => tracing::debug!(error = %e, data = %data, "Skipping non-JSON event"),
                }
            }
        }
        Ok(())
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        let url = format!("{}{path}", self.base);
        let response = self.http.post(&url).json(&body).send().await;
        read_json(&url, response).await
    }
}

async fn read_json(
    url: &str,
    response: Result<reqwest::Response, reqwest::Error>,
) -> Result<Value, ClientError> {
    let http_err = |source| ClientError::Http {
        url: url.to_string(),
        source,
    };
    let response = check_status(response.map_err(http_err)?).await?;
    response.json::<Value>().await.map_err(http_err)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Incremental server-sent-event decoder yielding `data` payloads
#[derive(Debug, Default)]
pub struct SseParser {
    buf: Vec<u8>,
    data: Vec<String>,
}

impl SseParser {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(&['\n', '\r'][..]);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if line.starts_with(':') {
                continue;
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.data
                    .push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            }
        }
        events
    }
}

/// One line per event for the terminal
pub fn format_event(event: &Value) -> String {
    let text = |key: &str| match &event[key] {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    if event["type"] == "vote" {
        format!(
            "[{}] score={} level={} msg={} quote={}",
            text("ts"),
            text("score"),
            text("level"),
            text("message"),
            text("quote")
        )
    } else {
        event.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    #[test]
    fn test_parser_handles_split_chunks() {
        let mut parser = SseParser::default();
        assert!(parser.push(b"data: {\"type\":").is_empty());
        assert!(parser.push(b"\"hello\"}\n").is_empty());
        assert_eq!(parser.push(b"\n"), vec![r#"{"type":"hello"}"#.to_string()]);
    }

    #[test]
    fn test_parser_skips_comments_and_crlf() {
        let mut parser = SseParser::default();
        let events = parser.push(b": keep-alive\r\n\r\ndata: a\r\n\r\ndata:b\ndata: c\n\n");
        assert_eq!(events, vec!["a".to_string(), "b\nc".to_string()]);
    }

    #[test]
    fn test_format_vote_line() {
        let event = json!({
            "type": "vote",
            "score": 8,
            "level": "great",
            "message": "Smooth operator.",
            "quote": "Butter adjacent.",
            "ts": "2024-05-01T12:00:00Z",
        });
        assert_eq!(
            format_event(&event),
            "[2024-05-01T12:00:00Z] score=8 level=great msg=Smooth operator. quote=Butter adjacent."
        );
        let other = format_event(&json!({ "type": "theme", "hue_deg": 5 }));
        assert_eq!(
            serde_json::from_str::<Value>(&other).unwrap(),
            json!({ "type": "theme", "hue_deg": 5 })
        );
    }

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_client_round_trips() {
        let router = Router::new()
            .route(
                "/vote/:score",
                get(|Path(score): Path<i64>| async move { Json(json!({ "score": score })) }),
            )
            .route("/theme", post(|Json(body): Json<Value>| async move { Json(body) }));
        let client = ControlClient::new(&spawn(router).await);
        assert!(!client.base_url().ends_with('/'));

        assert_eq!(client.vote(9).await.unwrap()["score"], 9);
        assert_eq!(client.theme(120).await.unwrap()["hue_deg"], 120);
    }

    #[tokio::test]
    async fn test_client_reports_error_status() {
        let client = ControlClient::new(&spawn(Router::new()).await);
        match client.clear_cache().await {
            Err(ClientError::Status { status, .. }) => assert_eq!(status, 404),
            other => panic!("unexpected result {other:?}"),
        }
    }
}
