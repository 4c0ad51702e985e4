//! Minimal Telegram Bot API client over `reqwest`.
//!
//! Only the methods the bot needs are covered. Outbound calls go through the
//! [`BotApi`] trait so the dispatcher can be driven without the network.

#[cfg(test)]
pub(crate) mod mock;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use types::{ApiResponse, GetUpdates, ReplyMarkup, SendMessage, Update, UpdateBatch};

/// Seconds a `getUpdates` call may wait on the server side.
pub const POLL_TIMEOUT_SECS: u64 = 30;

const ALLOWED_UPDATES: &[&str] = &["message", "callback_query", "chat_join_request"];

/// Outbound actions the bot performs.
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<()>;

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        content: Vec<u8>,
        caption: &str,
    ) -> Result<()>;

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()>;

    async fn approve_chat_join_request(&self, chat_id: i64, user_id: i64) -> Result<()>;

    async fn ban_chat_member(&self, chat_id: i64, user_id: i64) -> Result<()>;

    async fn unban_chat_member(&self, chat_id: i64, user_id: i64, only_if_banned: bool)
    -> Result<()>;
}

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()
            .map_err(|e| Error::Http(e.without_url()))?;
        Ok(TelegramClient {
            http,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // The URL carries the bot token, so it is stripped from every error.
        let response = self
            .http
            .post(self.method_url(method))
            .json(params)
            .send()
            .await
            .map_err(|e| Error::Http(e.without_url()))?;
        read_response(method, response).await
    }

    /// Long-poll for updates newer than `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<UpdateBatch> {
        let raw: Vec<Value> = self
            .call(
                "getUpdates",
                &GetUpdates {
                    offset,
                    timeout: POLL_TIMEOUT_SECS,
                    allowed_updates: ALLOWED_UPDATES,
                },
            )
            .await?;
        Ok(decode_updates(raw))
    }
}

/// Decode updates one at a time so a single unknown shape cannot stall polling.
pub fn decode_updates(raw: Vec<Value>) -> UpdateBatch {
    let mut batch = UpdateBatch::default();
    for value in raw {
        let update_id = value.get("update_id").and_then(Value::as_i64);
        if let Some(id) = update_id {
            batch.next_offset = Some(batch.next_offset.map_or(id + 1, |next| next.max(id + 1)));
        }
        match serde_json::from_value::<Update>(value) {
            Ok(update) => batch.updates.push(update),
            Err(e) => warn!(update_id, error = %e, "skipping update that could not be decoded"),
        }
    }
    batch
}

async fn read_response<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T> {
    let body: ApiResponse<T> = response
        .json()
        .await
        .map_err(|e| Error::Http(e.without_url()))?;
    match (body.ok, body.result) {
        (true, Some(result)) => Ok(result),
        _ => Err(Error::Telegram(format!(
            "{method} failed ({}): {}",
            body.error_code.unwrap_or_default(),
            body.description.unwrap_or_else(|| "no description".to_string())
        ))),
    }
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                &SendMessage {
                    chat_id,
                    text,
                    reply_markup: markup,
                },
            )
            .await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        content: Vec<u8>,
        caption: &str,
    ) -> Result<()> {
        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str("text/csv")
            .map_err(|e| Error::Http(e.without_url()))?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", part);
        let response = self
            .http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Http(e.without_url()))?;
        let _: serde_json::Value = read_response("sendDocument", response).await?;
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        let mut params = serde_json::json!({
            "callback_query_id": callback_id,
            "show_alert": show_alert,
        });
        if let Some(text) = text {
            params["text"] = serde_json::Value::from(text);
        }
        let _: bool = self.call("answerCallbackQuery", &params).await?;
        Ok(())
    }

    async fn approve_chat_join_request(&self, chat_id: i64, user_id: i64) -> Result<()> {
        let _: bool = self
            .call(
                "approveChatJoinRequest",
                &serde_json::json!({"chat_id": chat_id, "user_id": user_id}),
            )
            .await?;
        Ok(())
    }

    async fn ban_chat_member(&self, chat_id: i64, user_id: i64) -> Result<()> {
        let _: bool = self
            .call(
                "banChatMember",
                &serde_json::json!({"chat_id": chat_id, "user_id": user_id}),
            )
            .await?;
        Ok(())
    }

    async fn unban_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
        only_if_banned: bool,
    ) -> Result<()> {
        let _: bool = self
            .call(
                "unbanChatMember",
                &serde_json::json!({
                    "chat_id": chat_id,
                    "user_id": user_id,
                    "only_if_banned": only_if_banned,
                }),
            )
            .await?;
        Ok(())
    }
}
