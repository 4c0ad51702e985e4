use chrono::{NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage format for every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time truncated to whole seconds.
pub fn now_utc() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_stored_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

/// Payment state as reported by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum PaymentStatus {
    Paid,
    Cancelled,
    Failed,
    Pending,
    Other(String),
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Pending => "pending",
            PaymentStatus::Other(s) => s,
        }
    }

    /// Map a provider status onto ours. A missing status means the payment went through.
    pub fn normalize(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return PaymentStatus::Paid;
        };
        match raw.to_lowercase().as_str() {
            "success" | "succeeded" | "paid" | "completed" => PaymentStatus::Paid,
            "cancelled" | "canceled" => PaymentStatus::Cancelled,
            "failed" => PaymentStatus::Failed,
            "pending" => PaymentStatus::Pending,
            other => PaymentStatus::Other(other.to_string()),
        }
    }

    pub fn is_paid(&self) -> bool {
        *self == PaymentStatus::Paid
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "paid" => PaymentStatus::Paid,
            "cancelled" => PaymentStatus::Cancelled,
            "failed" => PaymentStatus::Failed,
            "pending" => PaymentStatus::Pending,
            _ => PaymentStatus::Other(s),
        }
    }
}

impl From<PaymentStatus> for String {
    fn from(s: PaymentStatus) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happened to someone's group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    Granted,
    Revoked,
    Unbanned,
}

impl AccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessAction::Granted => "granted",
            AccessAction::Revoked => "revoked",
            AccessAction::Unbanned => "unbanned",
        }
    }
}

impl fmt::Display for AccessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: PaymentStatus,
    pub product_name: Option<String>,
    pub created_at: NaiveDateTime,
    pub used: bool,
}

/// Payment fields as delivered by a provider, before they hit the table.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub order_id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: PaymentStatus,
    pub product_name: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub telegram_id: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub payment_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLog {
    pub id: i64,
    pub telegram_id: String,
    pub email: Option<String>,
    pub order_id: Option<String>,
    pub group_name: String,
    pub group_id: String,
    pub action: String,
    pub timestamp: NaiveDateTime,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAccessLog {
    pub telegram_id: String,
    pub email: Option<String>,
    pub order_id: Option<String>,
    pub group_name: String,
    pub group_id: String,
    pub action: AccessAction,
    pub comment: Option<String>,
}

/// The group paying users are currently invited into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentGroup {
    pub id: i64,
    pub chat_id: Option<String>,
    pub group_name: String,
    pub invite_link: String,
}

/// Keep only the digits of a phone number.
pub fn normalize_phone(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Digits of `value` and its last ten digits, used for phone matching.
pub fn phone_variants(value: &str) -> Option<(String, String)> {
    let digits = normalize_phone(value);
    if digits.is_empty() {
        return None;
    }
    let last10 = if digits.len() >= 10 {
        digits[digits.len() - 10..].to_string()
    } else {
        digits.clone()
    };
    Some((digits, last10))
}
