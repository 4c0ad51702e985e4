mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use marafon::config::Config;

#[derive(Parser)]
#[command(
    name = "marafon",
    version,
    about = "Payment webhooks and Telegram access bot for a paid marathon group"
)]
struct Cli {
    #[command(flatten)]
    config: Config,

    /// Output as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook listener and the bot (default)
    Serve,
    /// Create the database and schema, then exit
    Init,
    /// Show a payment, its bound user and recent access by email, phone or order id
    FindPayment {
        /// Email, phone or order id
        query: String,
    },
    /// Export access logs for a date range as CSV
    ExportLogs {
        /// First day, YYYY-MM-DD
        start: String,
        /// Last day (inclusive), YYYY-MM-DD
        end: String,
        /// Only logs of this group
        #[arg(short, long)]
        group: Option<String>,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    marafon::logging::init(cli.config.log_format);

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => commands::serve::run(&cli.config).await,
        Commands::Init => commands::init::run(&cli.config),
        Commands::FindPayment { query } => commands::find::run(&cli.config, &query, cli.json),
        Commands::ExportLogs {
            start,
            end,
            group,
            output,
        } => commands::export::run(
            &cli.config,
            &start,
            &end,
            group.as_deref(),
            output.as_deref(),
        ),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
