//! Example: Species Catalog Migrations
//!
//! Declares four revisions of a small species catalog, applies them in two
//! releases against one SQLite database, and prints what each run executed.
//!
//! Run with: cargo run --example species -p oxide-revisions

use std::str::FromStr;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, SqliteConnection};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_revisions::RevisionSet;
use oxide_revisions::prelude::*;

// =============================================================================
// Revisions
// =============================================================================

/// The first release: revisions 0 and 1.
struct FirstRelease;

impl RevisionSet for FirstRelease {
    fn declare(ctx: &mut MigrationContext) -> Result<()> {
        // 0: initial catalog
        ctx.create_migration();
        ctx.create_table(
            "species",
            vec![
                Column::id("id"),
                Column::new("name", ColumnType::Text)
                    .not_null()
                    .default("Unnamed species"),
                Column::new("origin", ColumnType::Text),
                Column::new("population", ColumnType::Integer),
            ],
        )?;

        // 1: people carrying a species talisman
        ctx.create_migration();
        ctx.create_table(
            "people",
            vec![
                Column::id("id"),
                Column::new("name", ColumnType::Text)
                    .not_null()
                    .default("Unnamed person"),
                Column::foreign("talisman", "species"),
            ],
        )
    }
}

/// The second release: everything in the first, plus revisions 2 and 3.
struct SecondRelease;

impl RevisionSet for SecondRelease {
    fn declare(ctx: &mut MigrationContext) -> Result<()> {
        FirstRelease::declare(ctx)?;

        // 2: residence, backfilled from origin
        ctx.create_migration();
        ctx.add_table_column(
            "species",
            Column::new("residence", ColumnType::Text),
            Some(ColumnParams::new().fill_from("origin").coalesce("New Earth")),
        )?;
        ctx.recreate_table("species", None)?;

        // 3: origin is gone, population is mandatory
        ctx.create_migration();
        ctx.change_table_column("species", "residence", None, Some(ColumnParams::new()))?;
        ctx.delete_table_column("species", "origin")?;
        ctx.change_table_column(
            "species",
            "population",
            Some(
                Column::new("population", ColumnType::Integer)
                    .not_null()
                    .default(0),
            ),
            Some(ColumnParams::new().coalesce(0)),
        )?;
        ctx.recreate_table("species", None)?;
        Ok(())
    }
}

// =============================================================================
// Executor
// =============================================================================

async fn run(conn: &mut SqliteConnection, ctx: &MigrationContext) -> anyhow::Result<()> {
    sqlx::query(&ctx.migration_table_create_query())
        .execute(&mut *conn)
        .await?;

    let (latest_revision, app_version, date_migrated): (Option<i64>, Option<String>, Option<i64>) =
        sqlx::query_as(&ctx.migration_revision_select_query())
            .fetch_one(&mut *conn)
            .await?;
    let mut last = LastMigration {
        latest_revision,
        app_version,
        date_migrated,
    };

    let statements = ctx.migrations_sql_queries(&mut last)?;
    for statement in &statements {
        println!("    {}", statement.query);

        let mut query = sqlx::query(&statement.query);
        for arg in &statement.args {
            query = match arg {
                SqlValue::Null => query.bind(Option::<i64>::None),
                SqlValue::Integer(i) => query.bind(*i),
                SqlValue::Real(f) => query.bind(*f),
                SqlValue::Text(s) => query.bind(s.clone()),
                SqlValue::Blob(b) => query.bind(b.clone()),
            };
        }
        query.execute(&mut *conn).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut conn = SqliteConnectOptions::from_str("sqlite::memory:")?
        .foreign_keys(false)
        .connect()
        .await?;

    println!("{}", "=".repeat(70));
    println!(" Species Catalog Migrations");
    println!("{}", "=".repeat(70));
    println!();

    println!("[1] Applying release 0.1.0...\n");
    let first = FirstRelease::build(ContextConfig::new().app_version("0.1.0"))?;
    run(&mut conn, &first).await?;
    println!();

    println!("[2] Inserting data...\n");
    sqlx::query(
        "INSERT INTO species (name, origin, population) \
         VALUES ('Human', 'Earth', 8000000000), ('Vulcan', NULL, NULL);",
    )
    .execute(&mut conn)
    .await?;

    println!("[3] Applying release 0.2.0...\n");
    let second = SecondRelease::build(ContextConfig::new().app_version("0.2.0"))?;
    run(&mut conn, &second).await?;
    println!();

    println!("[4] Final catalog:\n");
    let rows: Vec<(String, String, i64)> =
        sqlx::query_as("SELECT name, residence, population FROM species ORDER BY id;")
            .fetch_all(&mut conn)
            .await?;
    for (name, residence, population) in &rows {
        println!("    {name:<10} {residence:<10} {population}");
    }
    println!();

    info!(
        revisions = second.revisions().len(),
        tables = second.schema().tables().len(),
        "Done"
    );
    Ok(())
}
