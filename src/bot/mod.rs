//! Update dispatcher for the marathon bot.
//!
//! Messages are routed in a fixed order: commands, the user keyboard buttons,
//! the support conversations, the stateless payment check, and finally the
//! admin router. The first route that claims a message wins.

pub mod access;
mod admin;
pub mod dialog;
pub mod polling;
pub mod report;
pub mod texts;
mod user;

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::telegram::BotApi;
use crate::telegram::types::{CallbackQuery, ChatJoinRequest, Message, ReplyMarkup, Update};
use dialog::{Dialog, DialogKey, DialogStore};

/// Who may administer the bot and where users can get help.
#[derive(Debug, Clone, Default)]
pub struct BotSettings {
    pub admin_ids: Vec<i64>,
    pub support_contact: Option<String>,
}

pub struct Bot<A> {
    api: A,
    db: Arc<Mutex<Database>>,
    dialogs: DialogStore,
    settings: BotSettings,
}

impl<A: BotApi> Bot<A> {
    pub fn new(api: A, db: Arc<Mutex<Database>>, settings: BotSettings) -> Self {
        Self {
            api,
            db,
            dialogs: DialogStore::default(),
            settings,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn dialog(&self, key: DialogKey) -> Option<Dialog> {
        self.dialogs.get(key)
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.settings.admin_ids.contains(&user_id)
    }

    /// Run `f` against the database. The lock is released before returning,
    /// so callers never hold it across an await.
    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let db = self.db.lock().map_err(|_| Error::LockPoisoned)?;
        f(&db)
    }

    async fn reply(&self, chat_id: i64, text: &str, markup: Option<ReplyMarkup>) -> Result<()> {
        self.api.send_message(chat_id, text, markup.as_ref()).await
    }

    pub async fn handle_update(&self, update: &Update) -> Result<()> {
        if let Some(message) = &update.message {
            self.handle_message(message).await
        } else if let Some(query) = &update.callback_query {
            self.handle_callback(query).await
        } else if let Some(request) = &update.chat_join_request {
            self.handle_join_request(request).await
        } else {
            Ok(())
        }
    }

    async fn handle_message(&self, message: &Message) -> Result<()> {
        let Some(from) = &message.from else {
            return Ok(());
        };
        let chat_id = message.chat.id;
        let key = DialogKey {
            chat_id,
            user_id: from.id,
        };
        let text = message.text.as_deref();

        if let Some((command, args)) = text.and_then(parse_command) {
            match command {
                "start" => {
                    return self
                        .reply(chat_id, texts::START, Some(texts::main_keyboard()))
                        .await;
                }
                "add_test_payment" => return self.add_test_payment(chat_id, from.id, args).await,
                "set_group" => return self.set_group_command(chat_id, from.id, args).await,
                _ => {}
            }
        }

        match text {
            Some(texts::BUTTON_CHECK_PAYMENT) => {
                self.dialogs.clear(key);
                return self.prompt_payment_check(chat_id).await;
            }
            Some(texts::BUTTON_SUPPORT) => return self.open_support(key).await,
            _ => {}
        }

        match self.dialogs.get(key) {
            Some(Dialog::Support) => return self.support_message(key, from, text).await,
            Some(Dialog::AdminReply { user_id }) => {
                if !self.is_admin(from.id) {
                    return Ok(());
                }
                return self.admin_reply(key, user_id, text).await;
            }
            Some(_) => {}
            None => {
                if let Some(text) = text {
                    if !text.starts_with('/') && !texts::is_admin_menu_button(text) {
                        return self.check_payment(chat_id, from, text).await;
                    }
                }
            }
        }

        if self.is_admin(from.id) {
            if let Some(text) = text {
                return self.admin_message(key, text).await;
            }
        }
        Ok(())
    }

    async fn handle_callback(&self, query: &CallbackQuery) -> Result<()> {
        let Some(target) = query
            .data
            .as_deref()
            .and_then(|data| data.strip_prefix(texts::SUPPORT_REPLY_PREFIX))
        else {
            return Ok(());
        };

        if !self.is_admin(query.from.id) {
            return self.api.answer_callback_query(&query.id, None, false).await;
        }
        let Some(user_id) = parse_telegram_id(target) else {
            return self
                .api
                .answer_callback_query(&query.id, Some(texts::BAD_CALLBACK), true)
                .await;
        };

        let chat_id = query
            .message
            .as_ref()
            .map_or(query.from.id, |message| message.chat.id);
        let key = DialogKey {
            chat_id,
            user_id: query.from.id,
        };
        self.dialogs.set(key, Dialog::AdminReply { user_id });
        self.reply(
            chat_id,
            texts::PROMPT_ADMIN_REPLY,
            Some(texts::admin_reply_keyboard()),
        )
        .await?;
        self.api.answer_callback_query(&query.id, None, false).await
    }

    async fn handle_join_request(&self, request: &ChatJoinRequest) -> Result<()> {
        let approve = self.with_db(|db| access::review_join_request(db, request))?;
        if !approve {
            info!(
                chat_id = request.chat.id,
                user_id = request.from.id,
                "join request left pending"
            );
            return Ok(());
        }
        if let Err(e) = self
            .api
            .approve_chat_join_request(request.chat.id, request.from.id)
            .await
        {
            warn!(
                chat_id = request.chat.id,
                user_id = request.from.id,
                error = %e,
                "failed to approve join request"
            );
            return Err(e);
        }
        info!(
            chat_id = request.chat.id,
            user_id = request.from.id,
            "join request approved"
        );
        Ok(())
    }
}

/// Split `/name@bot args` into `("name", "args")`.
fn parse_command(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('/')?;
    let (head, args) = match rest.find(char::is_whitespace) {
        Some(end) => (&rest[..end], rest[end..].trim_start()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name, args))
}

/// Whitespace split into at most `max_parts` pieces; the last piece keeps the
/// remainder of the line.
fn split_args(args: &str, max_parts: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = args.trim_start();
    while !rest.is_empty() {
        if parts.len() + 1 == max_parts {
            parts.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                parts.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                parts.push(rest);
                break;
            }
        }
    }
    parts
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

fn parse_telegram_id(value: &str) -> Option<i64> {
    if is_digits(value) {
        value.parse().ok()
    } else {
        None
    }
}
