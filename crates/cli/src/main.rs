//! Checkout CLI - Database migrations and order administration.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! checkout-cli migrate
//!
//! # Seed users and products from YAML
//! checkout-cli seed fixtures/catalog.yaml
//!
//! # List orders (all, or one user's)
//! checkout-cli orders list
//! checkout-cli orders list --user 7f9c0c1e-0000-4000-8000-000000000001
//!
//! # Change an order's status
//! checkout-cli orders set-status <order-id> shipped
//! ```
//!
//! All commands read the database URL from `CHECKOUT_DATABASE_URL`
//! (or `DATABASE_URL`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use checkout_core::{OrderId, OrderStatus, UserId};

mod commands;

#[derive(Parser)]
#[command(name = "checkout-cli")]
#[command(author, version, about = "Checkout service CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed users and products from a YAML file
    Seed {
        /// Path to the YAML seed file
        file: String,
    },
    /// Inspect and administer orders
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// List orders, newest first
    List {
        /// Only this user's orders
        #[arg(short, long)]
        user: Option<UserId>,
    },
    /// Set an order's status (`pending`, `confirmed`, `shipped`, `delivered`, `cancelled`)
    SetStatus {
        /// Order ID
        order_id: OrderId,
        /// New status
        status: OrderStatus,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file } => commands::seed::run(&file).await?,
        Commands::Orders { action } => match action {
            OrderAction::List { user } => commands::orders::list(user).await?,
            OrderAction::SetStatus { order_id, status } => {
                commands::orders::set_status(order_id, status).await?;
            }
        },
    }
    Ok(())
}
