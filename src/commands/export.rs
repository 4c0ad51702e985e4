use std::io::Write;
use std::path::Path;

use marafon::bot::report::{ExportRequest, access_logs_csv, parse_date};
use marafon::config::Config;
use marafon::error::Result;

use super::open_database;

pub fn run(
    config: &Config,
    start: &str,
    end: &str,
    group: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let request = ExportRequest {
        start: parse_date(start)?,
        end: parse_date(end)?,
        group_name: group
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string),
    };
    let db = open_database(&config.database_location()?)?;
    let logs = request.load(&db)?;
    let content = access_logs_csv(&logs)?;

    match output {
        Some(path) => {
            std::fs::write(path, &content)?;
            eprintln!("{} ({} rows) -> {}", request.caption(), logs.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&content)?;
            stdout.flush()?;
        }
    }
    Ok(())
}
