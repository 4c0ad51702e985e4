use std::sync::Mutex;

use async_trait::async_trait;
use marafon::error::{Error, Result};
use marafon::telegram::BotApi;
use marafon::telegram::types::ReplyMarkup;

/// One outbound Bot API call.
#[derive(Debug, Clone)]
pub enum Call {
    Message {
        chat_id: i64,
        text: String,
        markup: Option<ReplyMarkup>,
    },
    Document {
        chat_id: i64,
        file_name: String,
        content: Vec<u8>,
        caption: String,
    },
    CallbackAnswer {
        text: Option<String>,
        show_alert: bool,
    },
    Approve {
        chat_id: i64,
        user_id: i64,
    },
    Ban {
        chat_id: i64,
        user_id: i64,
    },
    Unban {
        chat_id: i64,
        user_id: i64,
        only_if_banned: bool,
    },
}

/// `BotApi` that records calls instead of talking to Telegram.
#[derive(Debug, Default)]
pub struct RecordingBot {
    calls: Mutex<Vec<Call>>,
    /// Chats that reject every message.
    unreachable: Mutex<Vec<i64>>,
    reject_member_actions: Mutex<bool>,
}

impl RecordingBot {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn make_unreachable(&self, chat_id: i64) {
        self.unreachable.lock().unwrap().push(chat_id);
    }

    pub fn reject_member_actions(&self) {
        *self.reject_member_actions.lock().unwrap() = true;
    }

    /// Texts of every message sent to `chat_id`, oldest first.
    pub fn messages_to(&self, chat_id: i64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Message {
                    chat_id: to, text, ..
                } if to == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn member_action(&self, call: Call) -> Result<()> {
        if *self.reject_member_actions.lock().unwrap() {
            return Err(Error::Telegram("Bad Request: not enough rights".to_string()));
        }
        self.record(call);
        Ok(())
    }
}

#[async_trait]
impl BotApi for RecordingBot {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        markup: Option<&ReplyMarkup>,
    ) -> Result<()> {
        if self.unreachable.lock().unwrap().contains(&chat_id) {
            return Err(Error::Telegram("Forbidden: bot was blocked by the user".to_string()));
        }
        self.record(Call::Message {
            chat_id,
            text: text.to_string(),
            markup: markup.cloned(),
        });
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        file_name: &str,
        content: Vec<u8>,
        caption: &str,
    ) -> Result<()> {
        self.record(Call::Document {
            chat_id,
            file_name: file_name.to_string(),
            content,
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        _callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        self.record(Call::CallbackAnswer {
            text: text.map(str::to_string),
            show_alert,
        });
        Ok(())
    }

    async fn approve_chat_join_request(&self, chat_id: i64, user_id: i64) -> Result<()> {
        self.record(Call::Approve { chat_id, user_id });
        Ok(())
    }

    async fn ban_chat_member(&self, chat_id: i64, user_id: i64) -> Result<()> {
        self.member_action(Call::Ban { chat_id, user_id })
    }

    async fn unban_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
        only_if_banned: bool,
    ) -> Result<()> {
        self.member_action(Call::Unban {
            chat_id,
            user_id,
            only_if_banned,
        })
    }
}
