use marafon::config::Config;
use marafon::error::Result;

use super::{describe_location, open_database};

pub fn run(config: &Config) -> Result<()> {
    let location = config.database_location()?;
    let db = open_database(&location)?;
    let version = db.get_config("schema_version")?.unwrap_or_default();

    println!("Initialized database at {}", describe_location(&location));
    println!("Schema version: {version}");
    Ok(())
}
