use clap::Parser;
use engine::{Caller, Engine};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

use crate::{commands::Command, error::AdminError, settings::Settings};

mod commands;
mod error;
mod settings;

#[derive(Parser, Debug)]
#[command(name = "settle_admin")]
#[command(about = "Operator tool for obligations and the transfers settling them")]
struct Cli {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,

    /// Database connection string (overrides `database.url`).
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Identity the command runs as.
    #[arg(long, env = "SETTLE_USER")]
    user: String,

    /// Run as an administrator: unscoped reads and admin-only writes.
    #[arg(long)]
    privileged: bool,

    #[command(subcommand)]
    command: Command,
}

async fn connect_db(database_url: &str) -> Result<DatabaseConnection, AdminError> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn execute(cli: Cli, settings: Settings) -> Result<(), AdminError> {
    let database_url = cli.database_url.unwrap_or(settings.database.url);
    let db = connect_db(&database_url).await?;
    let engine = Engine::builder()
        .database(db)
        .max_retries(settings.engine.max_retries)
        .build()
        .await?;

    let caller = Caller {
        user_id: cli.user,
        privileged: cli.privileged,
    };
    tracing::debug!(user = %caller.user_id, privileged = caller.privileged, "running command");

    let output = commands::run(&engine, &caller, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let settings = match Settings::new(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("failed to load settings: {err}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "settle_admin={level},engine={level}",
            level = settings.app.level
        ))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = execute(cli, settings).await {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}
