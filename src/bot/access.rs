//! Access rules: who may claim a payment, join the group, or be removed from it.
//!
//! Everything here runs against the database only; the handlers turn the
//! outcomes into replies and Telegram calls.

use crate::db::Database;
use crate::error::Result;
use crate::models::{AccessAction, CurrentGroup, NewAccessLog, Payment};
use crate::telegram::types::{ChatJoinRequest, User as TelegramUser};

/// Result of a user submitting an email, phone or order id.
#[derive(Debug)]
pub enum CheckOutcome {
    NotFound,
    AlreadyUsed,
    OtherAccount,
    /// Payment claimed but no group is configured yet.
    NoGroup,
    Granted { group: CurrentGroup },
}

/// Claim the newest unused paid payment matching `query` for `user`.
pub fn check_payment(db: &Database, query: &str, user: &TelegramUser) -> Result<CheckOutcome> {
    db.transaction(|db| {
        let Some(payment) = db.find_paid_payment(query, true)? else {
            return Ok(if db.find_paid_payment(query, false)?.is_some() {
                CheckOutcome::AlreadyUsed
            } else {
                CheckOutcome::NotFound
            });
        };

        let telegram_id = user.id.to_string();
        if let Some(owner) = db.get_user_by_payment_id(payment.id)? {
            if owner.telegram_id != telegram_id {
                return Ok(CheckOutcome::OtherAccount);
            }
        }

        let full_name = user.full_name();
        db.bind_user_payment(
            &telegram_id,
            user.username.as_deref(),
            Some(&full_name),
            payment.id,
        )?;
        db.mark_payment_used(payment.id)?;

        Ok(match db.current_group()? {
            Some(group) => CheckOutcome::Granted { group },
            None => CheckOutcome::NoGroup,
        })
    })
}

/// Decide on a join request; `true` means it should be approved.
///
/// The first request for a group whose chat id is still unknown teaches us
/// that chat id. Requests for other chats are left alone.
pub fn review_join_request(db: &Database, request: &ChatJoinRequest) -> Result<bool> {
    db.transaction(|db| {
        let telegram_id = request.from.id.to_string();
        let Some(payment_id) = db
            .get_user_by_telegram_id(&telegram_id)?
            .and_then(|u| u.payment_id)
        else {
            return Ok(false);
        };
        let Some(payment) = db.get_payment(payment_id)? else {
            return Ok(false);
        };
        if !payment.status.is_paid() {
            return Ok(false);
        }

        let chat_id = request.chat.id.to_string();
        if let Some(group) = db.current_group()? {
            match group.chat_id.as_deref() {
                Some(known) if known != chat_id => return Ok(false),
                Some(_) => {}
                None => db.set_group_chat_id(group.id, &chat_id)?,
            }
        }

        db.insert_access_log(&NewAccessLog {
            telegram_id,
            email: payment.email.clone(),
            order_id: Some(payment.order_id.clone()),
            group_name: request.chat.title.clone().unwrap_or_else(|| chat_id.clone()),
            group_id: chat_id,
            action: AccessAction::Granted,
            comment: Some("Auto-approved join request".to_string()),
        })?;
        db.mark_payment_used(payment.id)?;
        Ok(true)
    })
}

/// Move a payment to `telegram_id`, detaching it from whoever held it.
pub fn rebind_payment(db: &Database, key: &str, telegram_id: &str) -> Result<Option<Payment>> {
    db.transaction(|db| {
        let Some(payment) = db.find_payment(key)? else {
            return Ok(None);
        };
        let user = db.ensure_user(telegram_id)?;
        db.unbind_payment_except(payment.id, user.id)?;
        db.set_user_payment(user.id, Some(payment.id))?;
        db.mark_payment_used(payment.id)?;
        Ok(Some(payment))
    })
}

/// A group member an admin wants to act on.
#[derive(Debug)]
pub struct MemberTarget {
    pub payment: Payment,
    pub telegram_id: String,
    pub user_id: i64,
    pub group: CurrentGroup,
    pub chat_id: i64,
}

#[derive(Debug)]
pub enum MemberLookup {
    Found(MemberTarget),
    PaymentNotFound,
    NotBound,
    SelfTarget,
    ChatUnknown,
}

/// Resolve the member behind a payment key. `acting_admin` cannot target themselves.
pub fn resolve_member(db: &Database, key: &str, acting_admin: Option<i64>) -> Result<MemberLookup> {
    let Some(payment) = db.find_payment(key)? else {
        return Ok(MemberLookup::PaymentNotFound);
    };
    let Some(user) = db.get_user_by_payment_id(payment.id)? else {
        return Ok(MemberLookup::NotBound);
    };
    let Ok(user_id) = user.telegram_id.parse::<i64>() else {
        return Ok(MemberLookup::NotBound);
    };
    if acting_admin == Some(user_id) {
        return Ok(MemberLookup::SelfTarget);
    }
    let Some(group) = db.current_group()? else {
        return Ok(MemberLookup::ChatUnknown);
    };
    let Some(chat_id) = group.chat_id.as_deref().and_then(|c| c.parse::<i64>().ok()) else {
        return Ok(MemberLookup::ChatUnknown);
    };

    Ok(MemberLookup::Found(MemberTarget {
        payment,
        telegram_id: user.telegram_id,
        user_id,
        group,
        chat_id,
    }))
}

/// Record an admin action against a member.
pub fn log_member_action(
    db: &Database,
    target: &MemberTarget,
    action: AccessAction,
    comment: &str,
) -> Result<()> {
    db.insert_access_log(&NewAccessLog {
        telegram_id: target.telegram_id.clone(),
        email: Some(
            target
                .payment
                .email
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        ),
        order_id: Some(target.payment.order_id.clone()),
        group_name: target.group.group_name.clone(),
        group_id: target.chat_id.to_string(),
        action,
        comment: Some(comment.to_string()),
    })?;
    Ok(())
}
