pub mod export;
pub mod find;
pub mod init;
pub mod serve;

use colored::Colorize;
use marafon::config::DatabaseLocation;
use marafon::db::Database;
use marafon::error::Result;
use marafon::models::PaymentStatus;

/// Open the configured database and bring its schema up to date.
pub fn open_database(location: &DatabaseLocation) -> Result<Database> {
    let db = Database::open(location)?;
    db.migrate()?;
    Ok(db)
}

pub fn describe_location(location: &DatabaseLocation) -> String {
    match location {
        DatabaseLocation::File(path) => path.display().to_string(),
        DatabaseLocation::Memory => ":memory:".to_string(),
    }
}

/// Format a payment status as a colored string.
pub fn format_status(status: &PaymentStatus) -> String {
    match status {
        PaymentStatus::Paid => "paid".green().to_string(),
        PaymentStatus::Pending => "pending".yellow().to_string(),
        PaymentStatus::Cancelled => "cancelled".bright_black().to_string(),
        PaymentStatus::Failed => "failed".red().to_string(),
        PaymentStatus::Other(other) => other.clone(),
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
