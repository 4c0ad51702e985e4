use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, Row, params, types::ToSql};
use std::path::Path;

use crate::config::DatabaseLocation;
use crate::error::{Error, Result};
use crate::models::{
    AccessLog, CurrentGroup, NewAccessLog, NewPayment, Payment, PaymentStatus, User,
    format_timestamp, now_utc, parse_stored_timestamp, phone_variants,
};

const PAYMENT_COLUMNS: &str =
    "id, order_id, email, phone, status, product_name, created_at, used";
const USER_COLUMNS: &str = "id, telegram_id, username, full_name, payment_id";
const ACCESS_LOG_COLUMNS: &str =
    "id, telegram_id, email, order_id, group_name, group_id, action, timestamp, comment";

/// Newest schema version understood by this build.
const SCHEMA_VERSION: i32 = 1;

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at the configured location.
    ///
    /// For file databases the parent directory is created first, so an
    /// unwritable location fails here rather than on the first write.
    pub fn open(location: &DatabaseLocation) -> Result<Self> {
        match location {
            DatabaseLocation::Memory => Self::open_in_memory(),
            DatabaseLocation::File(path) => Self::open_path(path),
        }
    }

    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Ok(Database { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Database { conn })
    }

    /// Create the schema tables if they don't exist, then run any pending version-gated migrations.
    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS config (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS payments (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id     TEXT NOT NULL UNIQUE,
                email        TEXT,
                phone        TEXT,
                status       TEXT NOT NULL DEFAULT 'paid',
                product_name TEXT,
                created_at   TEXT NOT NULL,
                used         INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_id TEXT NOT NULL,
                username    TEXT,
                full_name   TEXT,
                payment_id  INTEGER REFERENCES payments(id),
                CONSTRAINT uq_users_telegram_id UNIQUE (telegram_id)
            );

            CREATE TABLE IF NOT EXISTS access_logs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_id TEXT NOT NULL,
                email       TEXT,
                order_id    TEXT,
                group_name  TEXT NOT NULL,
                group_id    TEXT NOT NULL,
                action      TEXT NOT NULL,
                timestamp   TEXT NOT NULL,
                comment     TEXT
            );

            CREATE TABLE IF NOT EXISTS current_group (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id     TEXT,
                group_name  TEXT NOT NULL,
                invite_link TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_payments_email ON payments(email);
            CREATE INDEX IF NOT EXISTS idx_payments_phone ON payments(phone);
            CREATE INDEX IF NOT EXISTS idx_users_payment ON users(payment_id);
            CREATE INDEX IF NOT EXISTS idx_logs_telegram ON access_logs(telegram_id);
            CREATE INDEX IF NOT EXISTS idx_logs_email ON access_logs(email);
            CREATE INDEX IF NOT EXISTS idx_logs_order ON access_logs(order_id);
            CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON access_logs(timestamp);
            ",
        )?;

        // Fresh databases start at version 0.
        self.conn.execute(
            "INSERT OR IGNORE INTO config (key, value) VALUES ('schema_version', '0')",
            [],
        )?;

        run_migrations(&self.conn)
    }

    /// Run `f` inside a transaction; any error rolls everything back.
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // -- Config --

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?)
    }

    // -- Payments --

    pub fn insert_payment(&self, payment: &NewPayment) -> Result<Payment> {
        if self.get_payment_by_order_id(&payment.order_id)?.is_some() {
            return Err(Error::Validation(format!(
                "payment already exists: {}",
                payment.order_id
            )));
        }
        self.conn.execute(
            "INSERT INTO payments (order_id, email, phone, status, product_name, created_at, used)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                payment.order_id,
                payment.email,
                payment.phone,
                payment.status.as_str(),
                payment.product_name,
                format_timestamp(&payment.created_at),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.require_payment(id)
    }

    /// Insert a payment, or refresh the one with the same order id.
    ///
    /// Email, phone and product name are only overwritten when the new
    /// delivery carries them; `used` is left alone.
    pub fn upsert_payment(&self, payment: &NewPayment) -> Result<Payment> {
        let Some(existing) = self.get_payment_by_order_id(&payment.order_id)? else {
            return self.insert_payment(payment);
        };
        self.conn.execute(
            "UPDATE payments
             SET email = COALESCE(?1, email),
                 phone = COALESCE(?2, phone),
                 status = ?3,
                 product_name = COALESCE(?4, product_name),
                 created_at = ?5
             WHERE id = ?6",
            params![
                payment.email,
                payment.phone,
                payment.status.as_str(),
                payment.product_name,
                format_timestamp(&payment.created_at),
                existing.id,
            ],
        )?;
        self.require_payment(existing.id)
    }

    pub fn get_payment(&self, id: i64) -> Result<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], row_to_payment)
            .optional()?)
    }

    fn require_payment(&self, id: i64) -> Result<Payment> {
        self.get_payment(id)?
            .ok_or_else(|| Error::NotFound(format!("payment {id}")))
    }

    pub fn get_payment_by_order_id(&self, order_id: &str) -> Result<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![order_id], row_to_payment)
            .optional()?)
    }

    pub fn mark_payment_used(&self, id: i64) -> Result<()> {
        self.conn
            .execute("UPDATE payments SET used = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Newest paid payment matching what a user typed.
    ///
    /// Input containing `@` matches the email only; anything else matches the
    /// order id or the phone number.
    pub fn find_paid_payment(&self, query: &str, unused_only: bool) -> Result<Option<Payment>> {
        let (clause, values) = if query.contains('@') {
            (
                "email = ?1".to_string(),
                vec![Box::new(query.to_string()) as Box<dyn ToSql>],
            )
        } else {
            payment_match_clause(query, false)
        };

        let mut sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE status = 'paid'");
        if unused_only {
            sql.push_str(" AND used = 0");
        }
        sql.push_str(&format!(
            " AND ({clause}) ORDER BY created_at DESC, id DESC LIMIT 1"
        ));
        self.query_one_payment(&sql, &values)
    }

    /// Newest payment of any status matching an email, phone or order id.
    pub fn find_payment(&self, query: &str) -> Result<Option<Payment>> {
        let (clause, values) = payment_match_clause(query, true);
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE {clause} ORDER BY id DESC LIMIT 1"
        );
        self.query_one_payment(&sql, &values)
    }

    fn query_one_payment(
        &self,
        sql: &str,
        values: &[Box<dyn ToSql>],
    ) -> Result<Option<Payment>> {
        let params_ref: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
        Ok(self
            .conn
            .query_row(sql, params_ref.as_slice(), row_to_payment)
            .optional()?)
    }

    // -- Users --

    pub fn get_user_by_telegram_id(&self, telegram_id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE telegram_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![telegram_id], row_to_user)
            .optional()?)
    }

    pub fn get_user_by_payment_id(&self, payment_id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE payment_id = ?1 ORDER BY id LIMIT 1");
        Ok(self
            .conn
            .query_row(&sql, params![payment_id], row_to_user)
            .optional()?)
    }

    /// Return the user with this Telegram id, creating a bare record if needed.
    pub fn ensure_user(&self, telegram_id: &str) -> Result<User> {
        if let Some(user) = self.get_user_by_telegram_id(telegram_id)? {
            return Ok(user);
        }
        self.conn.execute(
            "INSERT INTO users (telegram_id) VALUES (?1)",
            params![telegram_id],
        )?;
        self.get_user_by_telegram_id(telegram_id)?
            .ok_or_else(|| Error::NotFound(format!("user {telegram_id}")))
    }

    /// Bind a payment to a Telegram user, creating the user on first contact.
    pub fn bind_user_payment(
        &self,
        telegram_id: &str,
        username: Option<&str>,
        full_name: Option<&str>,
        payment_id: i64,
    ) -> Result<User> {
        match self.get_user_by_telegram_id(telegram_id)? {
            Some(user) => self.set_user_payment(user.id, Some(payment_id))?,
            None => {
                self.conn.execute(
                    "INSERT INTO users (telegram_id, username, full_name, payment_id)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![telegram_id, username, full_name, payment_id],
                )?;
            }
        }
        self.get_user_by_telegram_id(telegram_id)?
            .ok_or_else(|| Error::NotFound(format!("user {telegram_id}")))
    }

    pub fn set_user_payment(&self, user_id: i64, payment_id: Option<i64>) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET payment_id = ?1 WHERE id = ?2",
            params![payment_id, user_id],
        )?;
        Ok(())
    }

    /// Detach a payment from every user except `keep_user_id`.
    pub fn unbind_payment_except(&self, payment_id: i64, keep_user_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE users SET payment_id = NULL WHERE payment_id = ?1 AND id != ?2",
            params![payment_id, keep_user_id],
        )?;
        Ok(())
    }

    // -- Access logs --

    pub fn insert_access_log(&self, log: &NewAccessLog) -> Result<AccessLog> {
        let now = now_utc();
        self.conn.execute(
            "INSERT INTO access_logs (telegram_id, email, order_id, group_name, group_id, action, timestamp, comment)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                log.telegram_id,
                log.email,
                log.order_id,
                log.group_name,
                log.group_id,
                log.action.as_str(),
                format_timestamp(&now),
                log.comment,
            ],
        )?;
        Ok(AccessLog {
            id: self.conn.last_insert_rowid(),
            telegram_id: log.telegram_id.clone(),
            email: log.email.clone(),
            order_id: log.order_id.clone(),
            group_name: log.group_name.clone(),
            group_id: log.group_id.clone(),
            action: log.action.as_str().to_string(),
            timestamp: now,
            comment: log.comment.clone(),
        })
    }

    /// Logs with `start <= timestamp < end`, oldest first.
    pub fn access_logs_between(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        group_name: Option<&str>,
    ) -> Result<Vec<AccessLog>> {
        let mut sql = format!(
            "SELECT {ACCESS_LOG_COLUMNS} FROM access_logs WHERE timestamp >= ?1 AND timestamp < ?2"
        );
        let mut values: Vec<Box<dyn ToSql>> = vec![
            Box::new(format_timestamp(&start)),
            Box::new(format_timestamp(&end)),
        ];
        if let Some(group) = group_name {
            sql.push_str(" AND group_name = ?3");
            values.push(Box::new(group.to_string()));
        }
        sql.push_str(" ORDER BY timestamp ASC, id ASC");

        let params_ref: Vec<&dyn ToSql> = values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_ref.as_slice(), row_to_access_log)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Most recent logs touching a payment's email or order id.
    pub fn recent_access_logs(&self, payment: &Payment, limit: u32) -> Result<Vec<AccessLog>> {
        let sql = format!(
            "SELECT {ACCESS_LOG_COLUMNS} FROM access_logs
             WHERE email = ?1 OR order_id = ?2
             ORDER BY timestamp DESC, id DESC LIMIT {limit}"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![payment.email, payment.order_id], row_to_access_log)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // -- Groups --

    pub fn current_group(&self) -> Result<Option<CurrentGroup>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, chat_id, group_name, invite_link FROM current_group ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(CurrentGroup {
                        id: row.get(0)?,
                        chat_id: row.get(1)?,
                        group_name: row.get(2)?,
                        invite_link: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    /// Make a new group current. Its chat id is learned from the first join request.
    pub fn create_current_group(&self, group_name: &str, invite_link: &str) -> Result<CurrentGroup> {
        self.conn.execute(
            "INSERT INTO current_group (chat_id, group_name, invite_link) VALUES (NULL, ?1, ?2)",
            params![group_name, invite_link],
        )?;
        Ok(CurrentGroup {
            id: self.conn.last_insert_rowid(),
            chat_id: None,
            group_name: group_name.to_string(),
            invite_link: invite_link.to_string(),
        })
    }

    pub fn set_group_chat_id(&self, group_id: i64, chat_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE current_group SET chat_id = ?1 WHERE id = ?2",
            params![chat_id, group_id],
        )?;
        Ok(())
    }
}

/// WHERE fragment matching a payment by order id, phone digits or the last
/// ten phone digits, and optionally the email.
fn payment_match_clause(query: &str, include_email: bool) -> (String, Vec<Box<dyn ToSql>>) {
    let mut filters = vec!["order_id = ?1".to_string()];
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(query.to_string())];
    if include_email {
        filters.push("email = ?1".to_string());
    }

    if let Some((digits, last10)) = phone_variants(query) {
        let has_full_tail = last10.len() >= 10;
        values.push(Box::new(digits));
        filters.push(format!("phone = ?{}", values.len()));
        if has_full_tail {
            values.push(Box::new(last10));
            filters.push(format!("phone LIKE '%' || ?{}", values.len()));
        }
    }

    (filters.join(" OR "), values)
}

/// Read the current schema version from the config table.
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM config WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        Some(v) => v
            .parse::<i32>()
            .map_err(|e| Error::Config(format!("invalid schema_version value: {e}"))),
        None => Ok(0),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO config (key, value) VALUES ('schema_version', ?1)",
        params![version.to_string()],
    )?;
    Ok(())
}

/// Run all pending schema migrations in order.
///
/// Version 1 is the baseline created by `migrate()`; later versions go in
/// as additional `if version < N` blocks, each in its own transaction.
fn run_migrations(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version > SCHEMA_VERSION {
        return Err(Error::Config(format!(
            "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    if version < 1 {
        set_schema_version(conn, 1)?;
    }

    Ok(())
}

fn parse_timestamp_column(raw: String) -> NaiveDateTime {
    parse_stored_timestamp(&raw).unwrap_or_else(now_utc)
}

fn row_to_payment(row: &Row) -> rusqlite::Result<Payment> {
    let status: String = row.get(4)?;
    Ok(Payment {
        id: row.get(0)?,
        order_id: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        status: PaymentStatus::from(status),
        product_name: row.get(5)?,
        created_at: parse_timestamp_column(row.get(6)?),
        used: row.get(7)?,
    })
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        username: row.get(2)?,
        full_name: row.get(3)?,
        payment_id: row.get(4)?,
    })
}

fn row_to_access_log(row: &Row) -> rusqlite::Result<AccessLog> {
    Ok(AccessLog {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        email: row.get(2)?,
        order_id: row.get(3)?,
        group_name: row.get(4)?,
        group_id: row.get(5)?,
        action: row.get(6)?,
        timestamp: parse_timestamp_column(row.get(7)?),
        comment: row.get(8)?,
    })
}
