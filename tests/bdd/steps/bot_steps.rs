use cucumber::{given, then, when};
use marafon::bot::dialog::DialogKey;
use marafon::bot::{Bot, BotSettings};
use marafon::telegram::types::{ReplyMarkup, Update};
use serde_json::{Value, json};

use super::recording::{Call, RecordingBot};
use crate::MarafonWorld;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bot(world: &MarafonWorld) -> &Bot<RecordingBot> {
    world
        .bot
        .as_ref()
        .expect("bot not started — add 'Given the bot is running with admin ...'")
}

fn start_bot(world: &mut MarafonWorld, admin: i64, support_contact: Option<String>) {
    let db = world
        .db
        .as_ref()
        .expect("no database — did you forget 'Given a marafon database is initialized'?")
        .clone();
    let settings = BotSettings {
        admin_ids: vec![admin],
        support_contact,
    };
    world.bot = Some(Bot::new(RecordingBot::default(), db, settings));
}

fn telegram_user(user_id: i64) -> Value {
    json!({
        "id": user_id,
        "is_bot": false,
        "first_name": "Анна",
        "last_name": "Петрова",
        "username": format!("user{user_id}"),
    })
}

async fn dispatch(world: &MarafonWorld, update: Value) {
    let update: Update = serde_json::from_value(update).expect("valid update");
    bot(world)
        .handle_update(&update)
        .await
        .unwrap_or_else(|e| panic!("update failed: {e}"));
}

async fn send_text(world: &MarafonWorld, user_id: i64, text: Option<&str>) {
    let mut message = json!({
        "message_id": 1,
        "chat": {"id": user_id, "type": "private"},
        "from": telegram_user(user_id),
    });
    if let Some(text) = text {
        message["text"] = json!(text);
    }
    dispatch(world, json!({"update_id": 1, "message": message})).await;
}

async fn press_button(world: &MarafonWorld, user_id: i64, data: &str) {
    let update = json!({
        "update_id": 1,
        "callback_query": {
            "id": "cb-1",
            "from": telegram_user(user_id),
            "message": {
                "message_id": 2,
                "chat": {"id": user_id, "type": "private"},
                "text": "Новый запрос в поддержку",
            },
            "data": data,
        },
    });
    dispatch(world, update).await;
}

fn today() -> String {
    chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

fn last_reply(world: &MarafonWorld, chat_id: i64) -> (String, Option<ReplyMarkup>) {
    bot(world)
        .api()
        .calls()
        .into_iter()
        .rev()
        .find_map(|call| match call {
            Call::Message {
                chat_id: to,
                text,
                markup,
            } if to == chat_id => Some((text, markup)),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no message was sent to {chat_id}"))
}

fn documents(world: &MarafonWorld, chat_id: i64) -> Vec<(String, Vec<u8>, String)> {
    bot(world)
        .api()
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Document {
                chat_id: to,
                file_name,
                content,
                caption,
            } if to == chat_id => Some((file_name, content, caption)),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given(expr = "the bot is running with admin {int}")]
async fn the_bot_is_running(world: &mut MarafonWorld, admin: i64) {
    start_bot(world, admin, None);
}

#[given(expr = "the bot is running with admin {int} and support contact {string}")]
async fn the_bot_is_running_with_contact(world: &mut MarafonWorld, admin: i64, contact: String) {
    start_bot(world, admin, Some(contact));
}

#[given(expr = "messages to {int} cannot be delivered")]
async fn messages_cannot_be_delivered(world: &mut MarafonWorld, chat_id: i64) {
    bot(world).api().make_unreachable(chat_id);
}

#[given("Telegram rejects member changes")]
async fn telegram_rejects_member_changes(world: &mut MarafonWorld) {
    bot(world).api().reject_member_actions();
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when(expr = "user {int} sends {string}")]
async fn user_sends(world: &mut MarafonWorld, user_id: i64, text: String) {
    send_text(world, user_id, Some(&text)).await;
}

#[when(expr = "user {int} sends a photo")]
async fn user_sends_photo(world: &mut MarafonWorld, user_id: i64) {
    send_text(world, user_id, None).await;
}

#[when(expr = "user {int} presses the reply button for user {int}")]
async fn user_presses_reply(world: &mut MarafonWorld, user_id: i64, target: i64) {
    press_button(world, user_id, &format!("support_reply:{target}")).await;
}

#[when(expr = "user {int} presses a button with data {string}")]
async fn user_presses_button(world: &mut MarafonWorld, user_id: i64, data: String) {
    press_button(world, user_id, &data).await;
}

#[when(expr = "user {int} asks to join chat {int} titled {string}")]
async fn user_asks_to_join(world: &mut MarafonWorld, user_id: i64, chat_id: i64, title: String) {
    let update = json!({
        "update_id": 1,
        "chat_join_request": {
            "chat": {"id": chat_id, "type": "supergroup", "title": title},
            "from": telegram_user(user_id),
            "date": 1_736_900_000,
        },
    });
    dispatch(world, update).await;
}

#[when(expr = "user {int} exports today's logs")]
async fn user_exports_todays_logs(world: &mut MarafonWorld, user_id: i64) {
    let day = today();
    send_text(world, user_id, Some(&format!("/export_logs {day} {day}"))).await;
}

#[when(expr = "user {int} exports today's logs for group {string}")]
async fn user_exports_group_logs(world: &mut MarafonWorld, user_id: i64, group: String) {
    let day = today();
    send_text(world, user_id, Some(&format!("/export_logs {day} {day} {group}"))).await;
}

#[when(expr = "user {int} sends today's date")]
async fn user_sends_todays_date(world: &mut MarafonWorld, user_id: i64) {
    send_text(world, user_id, Some(&today())).await;
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then(expr = "the last reply to {int} contains {string}")]
async fn the_last_reply_contains(world: &mut MarafonWorld, chat_id: i64, expected: String) {
    let (text, _) = last_reply(world, chat_id);
    assert!(
        text.contains(&expected),
        "expected last reply to {chat_id} to contain {expected:?}, got:\n{text}"
    );
}

#[then(expr = "user {int} received a message containing {string}")]
async fn user_received_message(world: &mut MarafonWorld, chat_id: i64, expected: String) {
    let messages = bot(world).api().messages_to(chat_id);
    assert!(
        messages.iter().any(|m| m.contains(&expected)),
        "no message to {chat_id} contains {expected:?}; got {messages:?}"
    );
}

#[then(expr = "the last reply to {int} has a join button to {string}")]
async fn the_last_reply_has_join_button(world: &mut MarafonWorld, chat_id: i64, link: String) {
    let (_, markup) = last_reply(world, chat_id);
    let Some(ReplyMarkup::Inline(keyboard)) = markup else {
        panic!("expected an inline keyboard, got {markup:?}");
    };
    let button = &keyboard.inline_keyboard[0][0];
    assert_eq!(button.url.as_deref(), Some(link.as_str()));
}

#[then(expr = "the last reply to {int} offers the button {string}")]
async fn the_last_reply_offers_button(world: &mut MarafonWorld, chat_id: i64, label: String) {
    let (_, markup) = last_reply(world, chat_id);
    let labels: Vec<String> = match markup {
        Some(ReplyMarkup::Keyboard(keyboard)) => keyboard
            .keyboard
            .into_iter()
            .flatten()
            .map(|b| b.text)
            .collect(),
        Some(ReplyMarkup::Inline(keyboard)) => keyboard
            .inline_keyboard
            .into_iter()
            .flatten()
            .map(|b| b.text)
            .collect(),
        None => Vec::new(),
    };
    assert!(labels.contains(&label), "button {label:?} not in {labels:?}");
}

#[then(expr = "the bot sends nothing to {int}")]
async fn the_bot_sends_nothing(world: &mut MarafonWorld, chat_id: i64) {
    let messages = bot(world).api().messages_to(chat_id);
    assert!(messages.is_empty(), "unexpected messages to {chat_id}: {messages:?}");
}

#[then(expr = "the button press is acknowledged without an alert")]
async fn the_press_is_acknowledged(world: &mut MarafonWorld) {
    let answered = bot(world).api().calls().into_iter().any(|call| {
        matches!(
            call,
            Call::CallbackAnswer {
                text: None,
                show_alert: false
            }
        )
    });
    assert!(answered, "callback was not acknowledged");
}

#[then(expr = "the button press is answered with the alert {string}")]
async fn the_press_is_answered_with_alert(world: &mut MarafonWorld, expected: String) {
    let answered = bot(world).api().calls().into_iter().any(|call| match call {
        Call::CallbackAnswer {
            text: Some(text),
            show_alert: true,
        } => text == expected,
        _ => false,
    });
    assert!(answered, "no alert {expected:?} was shown");
}

#[then(expr = "the join request of user {int} to chat {int} is approved")]
async fn the_join_request_is_approved(world: &mut MarafonWorld, user_id: i64, chat_id: i64) {
    let approved = bot(world).api().calls().into_iter().any(|call| {
        matches!(call, Call::Approve { chat_id: c, user_id: u } if c == chat_id && u == user_id)
    });
    assert!(approved, "join request of {user_id} to {chat_id} was not approved");
}

#[then(expr = "the join request of user {int} is left pending")]
async fn the_join_request_is_pending(world: &mut MarafonWorld, user_id: i64) {
    let approved = bot(world)
        .api()
        .calls()
        .into_iter()
        .any(|call| matches!(call, Call::Approve { user_id: u, .. } if u == user_id));
    assert!(!approved, "join request of {user_id} should not be approved");
}

#[then(expr = "user {int} is banned from chat {int}")]
async fn user_is_banned(world: &mut MarafonWorld, user_id: i64, chat_id: i64) {
    let banned = bot(world).api().calls().into_iter().any(|call| {
        matches!(call, Call::Ban { chat_id: c, user_id: u } if c == chat_id && u == user_id)
    });
    assert!(banned, "user {user_id} was not banned from {chat_id}");
}

#[then(expr = "user {int} is unbanned from chat {int} only if banned")]
async fn user_is_unbanned(world: &mut MarafonWorld, user_id: i64, chat_id: i64) {
    let unbanned = bot(world).api().calls().into_iter().any(|call| {
        matches!(
            call,
            Call::Unban { chat_id: c, user_id: u, only_if_banned: true } if c == chat_id && u == user_id
        )
    });
    assert!(unbanned, "user {user_id} was not unbanned in {chat_id}");
}

#[then(expr = "nobody is banned")]
async fn nobody_is_banned(world: &mut MarafonWorld) {
    let banned = bot(world)
        .api()
        .calls()
        .into_iter()
        .any(|call| matches!(call, Call::Ban { .. }));
    assert!(!banned, "no ban was expected");
}

#[then(expr = "a CSV export with {int} row(s) is sent to {int}")]
async fn a_csv_export_is_sent(world: &mut MarafonWorld, rows: usize, chat_id: i64) {
    let docs = documents(world, chat_id);
    let (file_name, content, caption) = docs
        .last()
        .unwrap_or_else(|| panic!("no document was sent to {chat_id}"));
    assert!(file_name.ends_with(".csv"), "unexpected file name {file_name}");
    assert!(caption.starts_with("Логи с "), "unexpected caption {caption}");
    assert!(content.starts_with("\u{feff}".as_bytes()), "CSV lacks a BOM");

    let mut reader = csv::Reader::from_reader(&content[3..]);
    let headers = reader.headers().expect("CSV header").clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        [
            "id",
            "telegram_id",
            "email",
            "order_id",
            "group_name",
            "group_id",
            "action",
            "timestamp",
            "comment"
        ]
    );
    assert_eq!(reader.records().count(), rows);
}

#[then(expr = "the export caption ends with {string}")]
async fn the_export_caption_ends_with(world: &mut MarafonWorld, suffix: String) {
    let docs = bot(world)
        .api()
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Document { caption, .. } => Some(caption),
            _ => None,
        })
        .collect::<Vec<_>>();
    let caption = docs.last().expect("no document was sent");
    assert!(caption.ends_with(&suffix), "caption {caption:?} does not end with {suffix:?}");
}

#[then(expr = "user {int} has no pending dialog")]
async fn user_has_no_pending_dialog(world: &mut MarafonWorld, user_id: i64) {
    let dialog = bot(world).dialog(DialogKey {
        chat_id: user_id,
        user_id,
    });
    assert_eq!(dialog, None);
}

#[then(expr = "user {int} has a pending dialog")]
async fn user_has_pending_dialog(world: &mut MarafonWorld, user_id: i64) {
    let dialog = bot(world).dialog(DialogKey {
        chat_id: user_id,
        user_id,
    });
    assert!(dialog.is_some(), "expected a pending dialog for {user_id}");
}
