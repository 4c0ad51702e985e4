//! Admin router. Callers have already checked that the sender is an admin,
//! except for the two bootstrap commands which check for themselves.

use chrono::NaiveDate;
use tracing::{info, warn};

use super::access::{self, MemberLookup};
use super::dialog::{Dialog, DialogKey};
use super::report::{self, ExportRequest};
use super::{Bot, is_digits, parse_command, split_args, texts};
use crate::error::{Error, Result};
use crate::models::{AccessAction, NewPayment, PaymentStatus, normalize_phone, now_utc};
use crate::telegram::BotApi;

/// Member actions reachable from the admin menu.
#[derive(Debug, Clone, Copy)]
enum MemberAction {
    Remove,
    Unban,
}

impl<A: BotApi> Bot<A> {
    pub(super) async fn add_test_payment(&self, chat_id: i64, from: i64, args: &str) -> Result<()> {
        if !self.is_admin(from) {
            return Ok(());
        }
        let parts = split_args(args, usize::MAX);
        if !(2..=3).contains(&parts.len()) {
            return self
                .reply(chat_id, texts::USAGE_ADD_TEST_PAYMENT, None)
                .await;
        }

        let payment = NewPayment {
            order_id: parts[0].to_string(),
            email: Some(parts[1].to_string()),
            phone: parts
                .get(2)
                .map(|raw| normalize_phone(raw))
                .filter(|digits| !digits.is_empty()),
            status: PaymentStatus::Paid,
            product_name: None,
            created_at: now_utc(),
        };
        match self.with_db(|db| db.insert_payment(&payment)) {
            Ok(_) => {
                info!(order_id = %payment.order_id, "test payment added");
                self.reply(
                    chat_id,
                    &texts::test_payment_added(parts[0], parts[1]),
                    None,
                )
                .await
            }
            Err(Error::Validation(_)) => self.reply(chat_id, texts::DUPLICATE_ORDER, None).await,
            Err(e) => Err(e),
        }
    }

    pub(super) async fn set_group_command(&self, chat_id: i64, from: i64, args: &str) -> Result<()> {
        if !self.is_admin(from) {
            return Ok(());
        }
        let parts = split_args(args, 2);
        if parts.len() < 2 {
            return self.reply(chat_id, texts::USAGE_SET_GROUP, None).await;
        }
        self.create_group(chat_id, parts[0], parts[1], false).await
    }

    pub(super) async fn admin_message(&self, key: DialogKey, text: &str) -> Result<()> {
        let chat_id = key.chat_id;
        let command = parse_command(text);
        let text = text.trim();

        match command {
            Some(("admin", _)) => return self.send_admin_menu(chat_id).await,
            Some(("admin_help", _)) => return self.reply(chat_id, texts::ADMIN_HELP, None).await,
            _ => {}
        }
        if text == texts::ADMIN_MENU {
            return self.send_admin_menu(chat_id).await;
        }
        if matches!(command, Some(("cancel", _))) || text == texts::BUTTON_CANCEL {
            self.dialogs.clear(key);
            return self.send_admin_menu(chat_id).await;
        }

        if let Some(dialog) = self.dialogs.get(key) {
            return self.continue_dialog(key, dialog, text).await;
        }

        let prompt = match text {
            texts::ADMIN_SET_GROUP => Some((Dialog::SetGroupInvite, texts::PROMPT_INVITE_LINK)),
            texts::ADMIN_EXPORT_LOGS => Some((Dialog::ExportStart, texts::PROMPT_EXPORT_START)),
            texts::ADMIN_FIND_PAYMENT => Some((Dialog::FindPayment, texts::PROMPT_FIND_PAYMENT)),
            texts::ADMIN_REBIND_PAYMENT => Some((Dialog::RebindKey, texts::PROMPT_REBIND_KEY)),
            texts::ADMIN_REMOVE_USER => Some((Dialog::RemoveUser, texts::PROMPT_REMOVE_USER)),
            texts::ADMIN_UNBAN_USER => Some((Dialog::UnbanUser, texts::PROMPT_UNBAN_USER)),
            _ => None,
        };
        if let Some((dialog, prompt)) = prompt {
            self.dialogs.set(key, dialog);
            return self
                .reply(chat_id, prompt, Some(texts::cancel_keyboard()))
                .await;
        }

        match command {
            Some(("find_payment", args)) => {
                let query = args.trim();
                if query.is_empty() {
                    return self.reply(chat_id, texts::USAGE_FIND_PAYMENT, None).await;
                }
                self.send_payment_report(chat_id, query).await
            }
            Some(("export_logs", args)) => self.export_logs_command(chat_id, args).await,
            Some(("rebind_payment", args)) => {
                let parts = split_args(args, 2);
                let (Some(key), Some(telegram_id)) = (parts.first(), parts.get(1)) else {
                    return self.reply(chat_id, texts::USAGE_REBIND_PAYMENT, None).await;
                };
                let telegram_id = telegram_id.trim();
                if !is_digits(telegram_id) {
                    return self.reply(chat_id, texts::USAGE_REBIND_PAYMENT, None).await;
                }
                self.rebind(chat_id, key, telegram_id).await
            }
            _ => Ok(()),
        }
    }

    async fn continue_dialog(&self, key: DialogKey, dialog: Dialog, text: &str) -> Result<()> {
        let chat_id = key.chat_id;
        match dialog {
            Dialog::SetGroupInvite => {
                self.dialogs.set(
                    key,
                    Dialog::SetGroupName {
                        invite_link: text.to_string(),
                    },
                );
                self.reply(
                    chat_id,
                    texts::PROMPT_GROUP_NAME,
                    Some(texts::cancel_keyboard()),
                )
                .await
            }
            Dialog::SetGroupName { invite_link } => {
                self.dialogs.clear(key);
                self.create_group(chat_id, &invite_link, text, true).await
            }
            Dialog::ExportStart => match report::parse_date(text) {
                Ok(start) => {
                    self.dialogs.set(key, Dialog::ExportEnd { start });
                    self.reply(
                        chat_id,
                        texts::PROMPT_EXPORT_END,
                        Some(texts::cancel_keyboard()),
                    )
                    .await
                }
                Err(_) => self.reply(chat_id, texts::BAD_START_DATE, None).await,
            },
            Dialog::ExportEnd { start } => match report::parse_date(text) {
                Ok(end) => {
                    self.dialogs.set(key, Dialog::ExportGroup { start, end });
                    self.reply(
                        chat_id,
                        texts::PROMPT_EXPORT_GROUP,
                        Some(texts::cancel_keyboard()),
                    )
                    .await
                }
                Err(_) => self.reply(chat_id, texts::BAD_END_DATE, None).await,
            },
            Dialog::ExportGroup { start, end } => {
                self.dialogs.clear(key);
                self.export_logs(chat_id, start, end, texts::group_filter(text))
                    .await
            }
            Dialog::FindPayment => {
                self.dialogs.clear(key);
                self.send_payment_report(chat_id, text).await
            }
            Dialog::RebindKey => {
                self.dialogs.set(
                    key,
                    Dialog::RebindTelegram {
                        payment_key: text.to_string(),
                    },
                );
                self.reply(
                    chat_id,
                    texts::PROMPT_REBIND_TELEGRAM,
                    Some(texts::cancel_keyboard()),
                )
                .await
            }
            Dialog::RebindTelegram { payment_key } => {
                if !is_digits(text) {
                    return self.reply(chat_id, texts::TELEGRAM_ID_NOT_NUMBER, None).await;
                }
                self.dialogs.clear(key);
                self.rebind(chat_id, &payment_key, text).await
            }
            Dialog::RemoveUser => {
                self.dialogs.clear(key);
                self.act_on_member(key, text, MemberAction::Remove).await
            }
            Dialog::UnbanUser => {
                self.dialogs.clear(key);
                self.act_on_member(key, text, MemberAction::Unban).await
            }
            Dialog::Support | Dialog::AdminReply { .. } => Ok(()),
        }
    }

    async fn send_admin_menu(&self, chat_id: i64) -> Result<()> {
        self.reply(
            chat_id,
            texts::ADMIN_MENU_TITLE,
            Some(texts::admin_menu_keyboard()),
        )
        .await
    }

    async fn create_group(
        &self,
        chat_id: i64,
        invite_link: &str,
        group_name: &str,
        with_menu: bool,
    ) -> Result<()> {
        let group = self.with_db(|db| db.create_current_group(group_name, invite_link))?;
        info!(group = %group.group_name, "current group changed");
        let markup = with_menu.then(texts::admin_menu_keyboard);
        self.reply(
            chat_id,
            &texts::group_set(&group.group_name, &group.invite_link),
            markup,
        )
        .await
    }

    async fn send_payment_report(&self, chat_id: i64, query: &str) -> Result<()> {
        let text = match self.with_db(|db| report::load_payment_report(db, query))? {
            Some(report) => report.render(),
            None => texts::ADMIN_PAYMENT_NOT_FOUND.to_string(),
        };
        self.reply(chat_id, &text, Some(texts::admin_menu_keyboard()))
            .await
    }

    async fn export_logs_command(&self, chat_id: i64, args: &str) -> Result<()> {
        let parts = split_args(args, 3);
        if parts.len() < 2 {
            return self.reply(chat_id, texts::USAGE_EXPORT_LOGS, None).await;
        }
        let (Ok(start), Ok(end)) = (report::parse_date(parts[0]), report::parse_date(parts[1]))
        else {
            return self.reply(chat_id, texts::BAD_DATE, None).await;
        };
        let group = parts.get(2).and_then(|raw| texts::group_filter(raw));
        self.export_logs(chat_id, start, end, group).await
    }

    async fn export_logs(
        &self,
        chat_id: i64,
        start: NaiveDate,
        end: NaiveDate,
        group: Option<&str>,
    ) -> Result<()> {
        let request = ExportRequest {
            start,
            end,
            group_name: group.map(str::to_string),
        };
        let logs = self.with_db(|db| request.load(db))?;
        if logs.is_empty() {
            return self
                .reply(chat_id, texts::NO_LOG_RECORDS, Some(texts::admin_menu_keyboard()))
                .await;
        }
        let content = report::access_logs_csv(&logs)?;
        info!(rows = logs.len(), "access logs exported");
        self.api
            .send_document(chat_id, &request.file_name(), content, &request.caption())
            .await
    }

    async fn rebind(&self, chat_id: i64, key: &str, telegram_id: &str) -> Result<()> {
        let text = match self.with_db(|db| access::rebind_payment(db, key, telegram_id))? {
            Some(payment) => {
                info!(order_id = %payment.order_id, telegram_id, "payment rebound");
                texts::payment_rebound(&payment.order_id, telegram_id)
            }
            None => texts::ADMIN_PAYMENT_NOT_FOUND.to_string(),
        };
        self.reply(chat_id, &text, Some(texts::admin_menu_keyboard()))
            .await
    }

    async fn act_on_member(&self, key: DialogKey, query: &str, action: MemberAction) -> Result<()> {
        let chat_id = key.chat_id;
        let acting_admin = match action {
            MemberAction::Remove => Some(key.user_id),
            MemberAction::Unban => None,
        };
        let target = match self.with_db(|db| access::resolve_member(db, query, acting_admin))? {
            MemberLookup::Found(target) => target,
            MemberLookup::PaymentNotFound => {
                return self.reply_menu(chat_id, texts::ADMIN_PAYMENT_NOT_FOUND).await;
            }
            MemberLookup::NotBound => return self.reply_menu(chat_id, texts::PAYMENT_NOT_BOUND).await,
            MemberLookup::SelfTarget => {
                return self.reply_menu(chat_id, texts::CANNOT_REMOVE_SELF).await;
            }
            MemberLookup::ChatUnknown => {
                return self.reply_menu(chat_id, texts::GROUP_CHAT_UNKNOWN).await;
            }
        };

        let (call, failed, done, logged, comment) = match action {
            MemberAction::Remove => (
                self.api.ban_chat_member(target.chat_id, target.user_id).await,
                texts::REMOVE_FAILED,
                texts::USER_REMOVED,
                AccessAction::Revoked,
                "Removed by admin",
            ),
            MemberAction::Unban => (
                self.api
                    .unban_chat_member(target.chat_id, target.user_id, true)
                    .await,
                texts::UNBAN_FAILED,
                texts::USER_UNBANNED,
                AccessAction::Unbanned,
                "Unbanned by admin",
            ),
        };
        if let Err(e) = call {
            warn!(
                chat_id = target.chat_id,
                user_id = target.user_id,
                error = %e,
                "member action rejected by Telegram"
            );
            return self.reply_menu(chat_id, failed).await;
        }

        self.with_db(|db| access::log_member_action(db, &target, logged, comment))?;
        info!(user_id = target.user_id, action = %logged, "member updated");
        self.reply_menu(chat_id, done).await
    }

    async fn reply_menu(&self, chat_id: i64, text: &str) -> Result<()> {
        self.reply(chat_id, text, Some(texts::admin_menu_keyboard()))
            .await
    }
}
