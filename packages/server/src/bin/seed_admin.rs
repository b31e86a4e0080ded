//! CLI for seeding system role grants
//!
//! Bootstraps the first full admin (and fixes up grants) without a human
//! grantor: grants are created with `granted_by = null` and audited as
//! `system`. Prints JSON.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use server_core::common::auth::permissions_from_strings;
use server_core::common::{GrantId, SubjectId};
use server_core::domains::roles::{NewRoleGrant, PostgresRoleStore};
use server_core::kernel::BaseRoleStore;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "seed_admin")]
#[command(about = "Seed and inspect system role grants")]
struct Cli {
    /// Storage timeout per call, in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a system grant for a subject
    Grant {
        subject: String,
        #[arg(long)]
        level: i32,
        /// Capability name, repeatable (e.g. --permission audit:read)
        #[arg(long = "permission")]
        permissions: Vec<String>,
        /// RFC 3339 expiry; omit for a permanent grant
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
    },

    /// Show a subject's full grant history
    List { subject: String },

    /// Revoke a grant as the system actor
    Revoke { grant_id: Uuid },
}

#[derive(Serialize)]
struct Response<T: Serialize> {
    success: bool,
    data: T,
}

fn output<T: Serialize>(data: T) -> Result<()> {
    let json = serde_json::to_string_pretty(&Response {
        success: true,
        data,
    })
    .context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,server_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let timeout = Duration::from_millis(cli.timeout_ms);
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(timeout)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    let store = PostgresRoleStore::new(pool, timeout);

    match cli.command {
        Commands::Grant {
            subject,
            level,
            permissions,
            expires_at,
        } => {
            let grant = NewRoleGrant {
                subject_id: SubjectId::new(subject),
                level,
                permissions: permissions_from_strings(&permissions),
                granted_by: None,
                expires_at,
            };
            let created = store
                .grant(grant, None)
                .await
                .context("Failed to create grant")?;
            output(created)
        }
        Commands::List { subject } => {
            let grants = store
                .list_for_subject(&SubjectId::new(subject))
                .await
                .context("Failed to list grants")?;
            output(grants)
        }
        Commands::Revoke { grant_id } => {
            let outcome = store
                .revoke(GrantId::from_uuid(grant_id), &SubjectId::system(), None)
                .await
                .context("Failed to revoke grant")?;
            output(outcome)
        }
    }
}
