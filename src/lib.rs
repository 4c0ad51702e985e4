/// Telegram bot: dispatcher, dialogs, access rules and reports.
pub mod bot;
/// Runtime configuration from flags and environment.
pub mod config;
/// Database layer: open, migrate, payments, users, access logs, groups.
pub mod db;
pub mod error;
pub mod logging;
/// Data types: Payment, User, AccessLog, CurrentGroup, statuses.
pub mod models;
/// Telegram Bot API client.
pub mod telegram;
/// Axum webhook server for payment providers.
pub mod web;
