//! User-facing routes: payment check and the support conversation.

use tracing::{info, warn};

use super::access::{self, CheckOutcome};
use super::dialog::{Dialog, DialogKey};
use super::{Bot, texts};
use crate::error::Result;
use crate::telegram::BotApi;
use crate::telegram::types::{ReplyMarkup, User};

impl<A: BotApi> Bot<A> {
    pub(super) async fn prompt_payment_check(&self, chat_id: i64) -> Result<()> {
        self.reply(
            chat_id,
            texts::PROMPT_PAYMENT_CHECK,
            Some(texts::main_keyboard()),
        )
        .await
    }

    pub(super) async fn check_payment(&self, chat_id: i64, from: &User, text: &str) -> Result<()> {
        let query = text.trim();
        if query == texts::BUTTON_CHECK_PAYMENT || query == texts::BUTTON_SUPPORT {
            return Ok(());
        }
        if query.is_empty() {
            return self.reply(chat_id, texts::ASK_CONTACT, None).await;
        }

        let outcome = self.with_db(|db| access::check_payment(db, query, from))?;
        match outcome {
            CheckOutcome::NotFound => self.reply(chat_id, texts::PAYMENT_NOT_FOUND, None).await,
            CheckOutcome::AlreadyUsed => {
                self.reply(chat_id, texts::PAYMENT_ALREADY_USED, None).await
            }
            CheckOutcome::OtherAccount => {
                self.reply(chat_id, texts::PAYMENT_OTHER_ACCOUNT, None).await
            }
            CheckOutcome::NoGroup => {
                info!(user_id = from.id, "payment confirmed without a configured group");
                self.reply(chat_id, texts::PAYMENT_NO_GROUP, None).await
            }
            CheckOutcome::Granted { group } => {
                info!(user_id = from.id, group = %group.group_name, "payment confirmed");
                self.reply(
                    chat_id,
                    &texts::payment_found(&group.group_name),
                    Some(ReplyMarkup::url_button(
                        texts::BUTTON_JOIN_GROUP,
                        &group.invite_link,
                    )),
                )
                .await
            }
        }
    }

    pub(super) async fn open_support(&self, key: DialogKey) -> Result<()> {
        self.dialogs.set(key, Dialog::Support);
        let mut lines = vec![
            texts::SUPPORT_INTRO.to_string(),
            texts::SUPPORT_CHECK_HINT.to_string(),
        ];
        if let Some(contact) = &self.settings.support_contact {
            lines.push(texts::support_contact_line(contact));
        }
        self.reply(
            key.chat_id,
            &lines.join("\n"),
            Some(texts::support_keyboard()),
        )
        .await
    }

    pub(super) async fn support_message(
        &self,
        key: DialogKey,
        from: &User,
        text: Option<&str>,
    ) -> Result<()> {
        let Some(text) = text else {
            return self.reply(key.chat_id, texts::ASK_TEXT, None).await;
        };
        let text = text.trim();
        if text == texts::BUTTON_CANCEL {
            self.dialogs.clear(key);
            return self
                .reply(key.chat_id, texts::CANCELLED, Some(texts::main_keyboard()))
                .await;
        }
        if text == texts::BUTTON_CHECK_PAYMENT {
            self.dialogs.clear(key);
            return self.prompt_payment_check(key.chat_id).await;
        }

        let label = match &from.username {
            Some(username) => format!("{} (@{username}, id {})", from.full_name(), from.id),
            None => format!("{} (id {})", from.full_name(), from.id),
        };
        let request = texts::support_request(&label, text);
        let button = ReplyMarkup::callback_button(
            texts::BUTTON_SUPPORT_REPLY,
            &format!("{}{}", texts::SUPPORT_REPLY_PREFIX, from.id),
        );
        for &admin_id in &self.settings.admin_ids {
            if let Err(e) = self
                .api
                .send_message(admin_id, &request, Some(&button))
                .await
            {
                warn!(admin_id, error = %e, "failed to forward support request");
            }
        }

        self.dialogs.clear(key);
        self.reply(key.chat_id, texts::SUPPORT_SENT, Some(texts::main_keyboard()))
            .await
    }

    pub(super) async fn admin_reply(
        &self,
        key: DialogKey,
        user_id: i64,
        text: Option<&str>,
    ) -> Result<()> {
        let Some(text) = text else {
            return self.reply(key.chat_id, texts::ASK_REPLY_TEXT, None).await;
        };
        let text = text.trim();
        if text == texts::BUTTON_CANCEL || text == texts::ADMIN_MENU {
            self.dialogs.clear(key);
            return self
                .reply(
                    key.chat_id,
                    texts::CANCELLED,
                    Some(texts::admin_menu_keyboard()),
                )
                .await;
        }

        self.dialogs.clear(key);
        let answer = match self
            .api
            .send_message(user_id, &texts::support_answer(text), None)
            .await
        {
            Ok(()) => texts::REPLY_SENT,
            Err(e) => {
                warn!(user_id, error = %e, "failed to deliver support answer");
                texts::REPLY_FAILED
            }
        };
        self.reply(key.chat_id, answer, Some(texts::admin_menu_keyboard()))
            .await
    }
}
