use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::NaiveDate;

/// Conversations are tracked per user within a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DialogKey {
    pub chat_id: i64,
    pub user_id: i64,
}

/// Multi-step conversation a user is in the middle of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialog {
    Support,
    AdminReply { user_id: i64 },
    SetGroupInvite,
    SetGroupName { invite_link: String },
    ExportStart,
    ExportEnd { start: NaiveDate },
    ExportGroup { start: NaiveDate, end: NaiveDate },
    FindPayment,
    RebindKey,
    RebindTelegram { payment_key: String },
    RemoveUser,
    UnbanUser,
}

/// In-memory dialog storage; a restart forgets every pending conversation.
#[derive(Debug, Default)]
pub struct DialogStore {
    inner: Mutex<HashMap<DialogKey, Dialog>>,
}

impl DialogStore {
    pub fn get(&self, key: DialogKey) -> Option<Dialog> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    pub fn set(&self, key: DialogKey, dialog: Dialog) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, dialog);
    }

    pub fn clear(&self, key: DialogKey) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
    }
}
