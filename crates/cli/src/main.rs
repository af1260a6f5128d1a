//! Atelier Linnea CLI - Database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! atelier-cli migrate
//!
//! # Create a user account
//! atelier-cli user create -e buyer@example.com -p 'a long password'
//!
//! # Mark a user's email as verified (support tooling)
//! atelier-cli user verify -e buyer@example.com
//! ```
//!
//! # Environment Variables
//!
//! - `ATELIER_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "atelier-cli")]
#[command(author, version, about = "Atelier Linnea CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user account
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (min 8 characters)
        #[arg(short, long)]
        password: String,
    },
    /// Mark a user's email as verified
    Verify {
        /// Email address
        #[arg(short, long)]
        email: String,
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
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::User { action } => match action {
            UserAction::Create { email, password } => {
                commands::user::create(&email, &password).await?;
            }
            UserAction::Verify { email } => {
                commands::user::verify(&email).await?;
            }
        },
    }
    Ok(())
}
