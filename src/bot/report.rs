//! Payment reports and access-log exports shared by the bot and the CLI.

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{AccessLog, Payment, User, format_timestamp};

const RECENT_LOGS: u32 = 5;
const DATE_FORMAT: &str = "%Y-%m-%d";
const CSV_HEADER: [&str; 9] = [
    "id",
    "telegram_id",
    "email",
    "order_id",
    "group_name",
    "group_id",
    "action",
    "timestamp",
    "comment",
];

/// A payment with its bound user and latest access history.
#[derive(Debug, Serialize)]
pub struct PaymentReport {
    pub payment: Payment,
    pub user: Option<User>,
    pub logs: Vec<AccessLog>,
}

pub fn load_payment_report(db: &Database, query: &str) -> Result<Option<PaymentReport>> {
    let Some(payment) = db.find_payment(query)? else {
        return Ok(None);
    };
    let user = db.get_user_by_payment_id(payment.id)?;
    let logs = db.recent_access_logs(&payment, RECENT_LOGS)?;
    Ok(Some(PaymentReport {
        payment,
        user,
        logs,
    }))
}

impl PaymentReport {
    pub fn render(&self) -> String {
        let p = &self.payment;
        let mut lines = vec![
            "Найденная оплата:".to_string(),
            format!("order_id: {}", p.order_id),
            format!("email: {}", p.email.as_deref().unwrap_or("-")),
            format!("phone: {}", p.phone.as_deref().unwrap_or("-")),
            format!("status: {}", p.status),
            format!("used: {}", if p.used { "True" } else { "False" }),
            format!("created_at: {}", format_timestamp(&p.created_at)),
            String::new(),
        ];

        match &self.user {
            Some(user) => {
                lines.push("Связанный пользователь:".to_string());
                lines.push(format!("telegram_id: {}", user.telegram_id));
                lines.push(format!("username: {}", user.username.as_deref().unwrap_or("-")));
                lines.push(format!("full_name: {}", user.full_name.as_deref().unwrap_or("-")));
            }
            None => lines.push("Связанный пользователь: отсутствует".to_string()),
        }

        if !self.logs.is_empty() {
            lines.push(String::new());
            lines.push("Последние логи доступа:".to_string());
            for log in &self.logs {
                lines.push(format!(
                    "{} | {} | {} | {}",
                    format_timestamp(&log.timestamp),
                    log.action,
                    log.group_name,
                    log.comment.as_deref().unwrap_or("-"),
                ));
            }
        }

        lines.join("\n")
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| Error::Validation(format!("date must be YYYY-MM-DD: {raw}")))
}

/// Inclusive day range of an export, optionally narrowed to one group.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub group_name: Option<String>,
}

impl ExportRequest {
    /// `[start 00:00, end + 1 day 00:00)`
    pub fn bounds(&self) -> (NaiveDateTime, NaiveDateTime) {
        let start = self.start.and_time(chrono::NaiveTime::MIN);
        let end = self
            .end
            .checked_add_days(Days::new(1))
            .unwrap_or(self.end)
            .and_time(chrono::NaiveTime::MIN);
        (start, end)
    }

    pub fn caption(&self) -> String {
        let mut caption = format!(
            "Логи с {} по {}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        );
        if let Some(group) = &self.group_name {
            caption.push_str(&format!(" ({group})"));
        }
        caption
    }

    pub fn file_name(&self) -> String {
        format!(
            "access_logs_{}_{}.csv",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }

    pub fn load(&self, db: &Database) -> Result<Vec<AccessLog>> {
        let (start, end) = self.bounds();
        db.access_logs_between(start, end, self.group_name.as_deref())
    }
}

/// Render logs as CSV with a UTF-8 BOM so spreadsheet apps pick the right encoding.
pub fn access_logs_csv(logs: &[AccessLog]) -> Result<Vec<u8>> {
    let mut buf = Vec::from("\u{feff}".as_bytes());
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        writer.write_record(CSV_HEADER)?;
        for log in logs {
            writer.write_record([
                log.id.to_string(),
                log.telegram_id.clone(),
                log.email.clone().unwrap_or_default(),
                log.order_id.clone().unwrap_or_default(),
                log.group_name.clone(),
                log.group_id.clone(),
                log.action.clone(),
                format_timestamp(&log.timestamp),
                log.comment.clone().unwrap_or_default(),
            ])?;
        }
        writer.flush()?;
    }
    Ok(buf)
}
