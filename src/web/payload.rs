//! Turning a provider's webhook body into a payment record.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use crate::models::{NewPayment, PaymentStatus, normalize_phone, now_utc};

pub type Payload = Map<String, Value>;

const ORDER_KEYS: &[&str] = &["order_id", "orderId", "order", "payment_id"];
const EMAIL_KEYS: &[&str] = &["email", "customer_email", "client_email", "buyer_email"];
const PHONE_KEYS: &[&str] = &[
    "phone",
    "phone_number",
    "customer_phone",
    "client_phone",
    "buyer_phone",
    "telephone",
    "tel",
];
const STATUS_KEYS: &[&str] = &["status", "payment_status", "paymentStatus"];
const PRODUCT_KEYS: &[&str] = &["product_name", "product", "title", "name"];
const CREATED_KEYS: &[&str] = &["created_at", "createdAt", "date", "created"];

/// Decode a webhook body. Unreadable bodies yield an empty payload.
pub fn read_payload(content_type: Option<&str>, body: &[u8]) -> Payload {
    if body.is_empty() {
        return Payload::new();
    }

    if content_type.is_some_and(|ct| ct.starts_with("application/json")) {
        return serde_json::from_slice::<Value>(body)
            .map(into_payload)
            .unwrap_or_default();
    }

    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str(trimmed) {
            return into_payload(value);
        }
    }

    url::form_urlencoded::parse(text.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

fn into_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Payload::new();
            map.insert("data".to_string(), other);
            map
        }
    }
}

/// First non-blank value among `keys`, trimmed.
pub fn get_first(payload: &Payload, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        let text = match payload.get(*key)? {
            Value::Null => return None,
            Value::String(s) => s.trim().to_string(),
            other => other.to_string().trim().to_string(),
        };
        (!text.is_empty()).then_some(text)
    })
}

/// Provider timestamp, or now when it is missing or unparseable.
pub fn parse_timestamp(value: Option<&str>) -> NaiveDateTime {
    let Some(value) = value else {
        return now_utc();
    };
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .unwrap_or_else(now_utc)
}

/// The token may arrive in a header, query string, body field or path segment.
pub fn is_authorized(expected: Option<&str>, candidates: &[Option<&str>]) -> bool {
    match expected {
        None => true,
        Some(expected) => candidates.iter().flatten().any(|c| *c == expected),
    }
}

/// Body `token` field as the provider sent it.
pub fn body_token(payload: &Payload) -> Option<String> {
    get_first(payload, &["token"])
}

/// Build the payment a delivery describes; `None` when it cannot identify one.
pub fn extract_payment(payload: &Payload) -> Option<NewPayment> {
    let order_id = get_first(payload, ORDER_KEYS)?;
    let email = get_first(payload, EMAIL_KEYS);
    let phone = get_first(payload, PHONE_KEYS)
        .map(|raw| normalize_phone(&raw))
        .filter(|digits| !digits.is_empty());
    if email.is_none() && phone.is_none() {
        return None;
    }

    let status = get_first(payload, STATUS_KEYS);
    Some(NewPayment {
        order_id,
        email,
        phone,
        status: PaymentStatus::normalize(status.as_deref()),
        product_name: get_first(payload, PRODUCT_KEYS),
        created_at: parse_timestamp(get_first(payload, CREATED_KEYS).as_deref()),
    })
}
