//! Local stand-in for the Bot API, served by axum on an ephemeral port.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use super::TelegramClient;

/// Chat id whose messages the mock refuses, as Telegram does for blocked bots.
pub const BLOCKED_CHAT: i64 = 403;

#[derive(Default)]
struct Inner {
    requests: Vec<(String, Value)>,
    documents: Vec<String>,
    update_replies: VecDeque<Value>,
}

#[derive(Clone)]
pub struct MockBotApi {
    url: String,
    inner: Arc<Mutex<Inner>>,
}

impl MockBotApi {
    pub async fn start() -> Self {
        let inner = Arc::new(Mutex::new(Inner::default()));
        let app = Router::new()
            .route("/{bot}/{method}", post(handle))
            .with_state(Arc::clone(&inner));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        MockBotApi {
            url: format!("http://127.0.0.1:{port}"),
            inner,
        }
    }

    pub fn client(&self) -> TelegramClient {
        TelegramClient::new(&self.url, "TEST").unwrap()
    }

    /// Queue a full `getUpdates` response envelope. Once the queue is empty
    /// the mock answers with an empty batch.
    pub fn push_updates(&self, reply: Value) {
        self.inner.lock().unwrap().update_replies.push_back(reply);
    }

    /// JSON bodies received for `method`, oldest first.
    pub fn requests(&self, method: &str) -> Vec<Value> {
        self.inner
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Raw multipart bodies received by `sendDocument`.
    pub fn documents(&self) -> Vec<String> {
        self.inner.lock().unwrap().documents.clone()
    }

    pub fn update_offsets(&self) -> Vec<i64> {
        self.requests("getUpdates")
            .iter()
            .filter_map(|body| body["offset"].as_i64())
            .collect()
    }

    pub async fn wait_for_offset_at_least(&self, offset: i64) {
        while !self.update_offsets().iter().any(|seen| *seen >= offset) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

async fn handle(
    State(inner): State<Arc<Mutex<Inner>>>,
    Path((_bot, method)): Path<(String, String)>,
    body: Bytes,
) -> Json<Value> {
    if method == "sendDocument" {
        inner
            .lock()
            .unwrap()
            .documents
            .push(String::from_utf8_lossy(&body).into_owned());
        return Json(json!({"ok": true, "result": {"message_id": 1}}));
    }

    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let scripted = {
        let mut inner = inner.lock().unwrap();
        inner.requests.push((method.clone(), request.clone()));
        if method == "getUpdates" {
            Some(inner.update_replies.pop_front())
        } else {
            None
        }
    };

    let reply = match (method.as_str(), scripted) {
        (_, Some(Some(reply))) => reply,
        (_, Some(None)) => {
            tokio::time::sleep(Duration::from_millis(20)).await;
            json!({"ok": true, "result": []})
        }
        ("sendMessage", _) if request["chat_id"] == json!(BLOCKED_CHAT) => json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was blocked by the user"
        }),
        ("sendMessage", _) => json!({"ok": true, "result": {"message_id": 1}}),
        _ => json!({"ok": true, "result": true}),
    };
    Json(reply)
}
