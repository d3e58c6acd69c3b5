use std::{fs, path::Path, sync::Arc};

use anyhow::Result;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

use spinbet::{
    models::transactions::Status,
    repositories::{Ledger, MemoryLedger, PgLedger},
    services,
    settings::Settings,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// Overrides `server.listen`.
    #[arg(short, long)]
    listen: Option<String>,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
    /// Keep all records in memory instead of PostgreSQL.
    #[arg(long)]
    memory: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP and WebSocket server.
    Serve,
    /// Set the status of a withdrawal and its ledger entry.
    WithdrawalStatus { id: i32, status: Status },
    /// Fill the public withdrawal feed with demo data.
    SeedWithdrawals {
        #[arg(long, default_value_t = 300)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    let settings = Settings::load(&args.config).expect("Failed to load settings.");

    init_logging(&args.log4rs).expect("Failed to initialize logging.");
    log::info!("Starting SpinBet.");

    let ledger = connect_ledger(&settings, args.memory)
        .await
        .expect("Could not open ledger.");

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let listen = args.listen.unwrap_or_else(|| settings.server.listen.clone());
            services::start_services(ledger, settings, listen).await?;
        }
        Command::WithdrawalStatus { id, status } => {
            let withdrawal = services::withdrawals::update_status(&ledger, id, status).await?;
            println!("Withdrawal {} is now {}.", withdrawal.id, withdrawal.status);
        }
        Command::SeedWithdrawals { count } => {
            let seeded = services::withdrawals::seed_demo_withdrawals(&ledger, count).await?;
            println!("Seeded {} withdrawals.", seeded);
        }
    }

    Ok(())
}

async fn connect_ledger(settings: &Settings, memory: bool) -> Result<Ledger> {
    if memory {
        log::warn!("Using the in-memory ledger; records are lost on exit.");
        return Ok(Arc::new(MemoryLedger::new()));
    }

    let url = settings
        .postgres
        .url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
    let conn = PgPoolOptions::new()
        .max_connections(settings.postgres.max_connections)
        .connect(url)
        .await?;

    sqlx::migrate!("./migrations").run(&conn).await?;
    log::info!("Database migrations applied.");

    Ok(Arc::new(PgLedger::new(conn)))
}

fn init_logging(path: &str) -> Result<()> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
