// SQL Chat: ask questions about a SQL database in plain language
//
// This is the main entry point for the SQL Chat application.

use anyhow::{Context, Result};
use sql_chat::cli::Repl;
use sql_chat::config::Settings;
use sql_chat::session::SqlSessionFactory;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::load().context("failed to load settings")?;

    // Logs go to stderr so they never interleave with the chat on stdout.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match settings.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: SQL_CHAT_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'warn'",
                    settings.log_level, e
                );
                tracing_subscriber::EnvFilter::new("warn")
            }
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %settings.model,
        local_db = %settings.local_db_path.display(),
        "sql-chat starting"
    );

    let factory = Arc::new(SqlSessionFactory::new(settings));
    let mut repl = Repl::new(factory).context("failed to start the terminal interface")?;
    repl.run().await?;

    Ok(())
}
