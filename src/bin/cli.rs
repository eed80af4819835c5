use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use quotedesk::authz::derive_permission_catalog;
use quotedesk::utils::hash_password;

#[derive(Parser, Debug)]
#[command(author, version, about = "quotedesk admin and migration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Roll back the last applied migration
    MigrateRollback,
    /// Bootstrap the first system administrator (user + admin group)
    CreateAdmin {
        name: String,
        email: String,
        password: String,
    },
    /// Create missing permission definitions from the static route table
    SeedPermissions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may
    // differ, so fall back to the crate-local `.env`.
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::MigrateRollback => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator
                .undo(&pool, 1)
                .await
                .context("no migrations were rolled back")?;
            println!("Rolled back last migration");
        }
        Commands::CreateAdmin { name, email, password } => {
            let pool = get_pool().await?;
            create_admin(&pool, &name, &email, &password).await?;
        }
        Commands::SeedPermissions => {
            let pool = get_pool().await?;
            let created = seed_permissions(&pool).await?;
            println!("Created {} permission definitions", created);
        }
    }

    Ok(())
}

async fn create_admin(pool: &SqlitePool, name: &str, email: &str, password: &str) -> anyhow::Result<()> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        anyhow::bail!("a user with email {email} already exists");
    }

    let password_hash = hash_password(password).map_err(|err| anyhow::anyhow!(err.to_string()))?;
    let now = Utc::now();
    let user_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    // Reuse the admin group when it already exists.
    let group_id: Option<Uuid> = sqlx::query(
        "SELECT id FROM permission_groups WHERE is_system_admin = 1 AND is_active = 1 LIMIT 1",
    )
    .fetch_optional(pool)
    .await?
    .map(|row| row.get("id"));

    let group_id = match group_id {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO permission_groups (id, name, is_system_admin, is_active, created_at, updated_at) VALUES (?, ?, 1, 1, ?, ?)",
            )
            .bind(id)
            .bind("System administrators")
            .bind(now)
            .bind(now)
            .execute(pool)
            .await?;
            id
        }
    };

    sqlx::query("INSERT OR IGNORE INTO user_groups (user_id, group_id, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(group_id)
        .bind(now)
        .execute(pool)
        .await?;

    println!("Created system administrator {email} ({user_id})");
    Ok(())
}

async fn seed_permissions(pool: &SqlitePool) -> anyhow::Result<u32> {
    let mut created = 0;
    let now = Utc::now();

    for code in derive_permission_catalog() {
        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM permission_definitions WHERE code = ?")
                .bind(code)
                .fetch_one(pool)
                .await?;
        if existing > 0 {
            continue;
        }

        sqlx::query(
            "INSERT INTO permission_definitions (id, code, name, description, is_active, created_at, updated_at) VALUES (?, ?, ?, NULL, 1, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(code)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
        created += 1;
    }

    Ok(created)
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y_%m_%d_%H%M%S");
    let sanitized = sanitize_name(name);
    let filename = format!("{}_{}.sql", timestamp, sanitized);
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let table_exists = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'",
    )
    .fetch_optional(pool)
    .await?;

    let applied_versions: HashSet<i64> = if table_exists.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter()
            .filter_map(|row| row.try_get::<i64, _>("version").ok())
            .collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let version = migration.version;
        let status = if applied_versions.contains(&version) {
            "applied"
        } else {
            "pending"
        };
        let desc = migration.description.as_ref().trim();
        let name = if !desc.is_empty() { desc } else { "unknown" };
        println!("{:<8} {:<20} {}", status, version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Try local ./migrations first (when running from repo root), fall back
    // to the crate-local folder for containers where CWD differs.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
