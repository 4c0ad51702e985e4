use colored::Colorize;
use marafon::bot::report::load_payment_report;
use marafon::config::Config;
use marafon::error::{Error, Result};
use marafon::models::format_timestamp;

use super::{format_status, open_database, print_json};

pub fn run(config: &Config, query: &str, json: bool) -> Result<()> {
    let db = open_database(&config.database_location()?)?;
    let report = load_payment_report(&db, query.trim())?
        .ok_or_else(|| Error::NotFound(format!("payment matching '{query}'")))?;

    if json {
        return print_json(&report);
    }

    let p = &report.payment;
    println!("Order:       {}", p.order_id.bold());
    println!("Email:       {}", p.email.as_deref().unwrap_or("-"));
    println!("Phone:       {}", p.phone.as_deref().unwrap_or("-"));
    println!("Status:      {}", format_status(&p.status));
    if let Some(ref product) = p.product_name {
        println!("Product:     {product}");
    }
    println!("Used:        {}", if p.used { "yes" } else { "no" });
    println!("Created:     {}", format_timestamp(&p.created_at));

    match &report.user {
        Some(user) => {
            println!("\nBound user:");
            println!("  Telegram:  {}", user.telegram_id);
            if let Some(ref username) = user.username {
                println!("  Username:  @{username}");
            }
            if let Some(ref name) = user.full_name {
                println!("  Name:      {name}");
            }
        }
        None => println!("\n{}", "No bound user".bright_black()),
    }

    if !report.logs.is_empty() {
        println!("\nRecent access:");
        for log in &report.logs {
            println!(
                "  {} {:<9} {} {}",
                format_timestamp(&log.timestamp).bright_black(),
                log.action,
                log.group_name,
                log.comment.as_deref().unwrap_or(""),
            );
        }
    }
    Ok(())
}
