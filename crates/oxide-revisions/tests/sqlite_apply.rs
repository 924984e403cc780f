//! Runs emitted statements against real SQLite databases.

use std::str::FromStr;

use oxide_revisions::prelude::*;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, SqliteConnection};

type LastRow = (Option<i64>, Option<String>, Option<i64>);

async fn connect(url: &str) -> SqliteConnection {
    SqliteConnectOptions::from_str(url)
        .unwrap()
        .create_if_missing(true)
        .foreign_keys(false)
        .connect()
        .await
        .unwrap()
}

async fn execute(conn: &mut SqliteConnection, statements: &[Statement]) {
    for statement in statements {
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
        query
            .execute(&mut *conn)
            .await
            .unwrap_or_else(|e| panic!("{} failed: {e}", statement.query));
    }
}

async fn last_migration(conn: &mut SqliteConnection, ctx: &MigrationContext) -> LastMigration {
    sqlx::query(&ctx.migration_table_create_query())
        .execute(&mut *conn)
        .await
        .unwrap();

    let (latest_revision, app_version, date_migrated): LastRow =
        sqlx::query_as(&ctx.migration_revision_select_query())
            .fetch_one(&mut *conn)
            .await
            .unwrap();

    LastMigration {
        latest_revision,
        app_version,
        date_migrated,
    }
}

async fn migrate(conn: &mut SqliteConnection, ctx: &MigrationContext) -> LastMigration {
    let mut last = last_migration(conn, ctx).await;
    let statements = ctx.migrations_sql_queries(&mut last).unwrap();
    execute(conn, &statements).await;
    last
}

/// Revision 0: `species`; revision 1: `residence` backfilled from `origin`.
fn species_context(with_residence: bool) -> MigrationContext {
    let mut ctx = MigrationContext::with_config(ContextConfig::new().app_version("0.2.0"));
    ctx.create_migration();
    ctx.create_table(
        "species",
        vec![
            Column::id("id"),
            Column::new("name", ColumnType::Text)
                .not_null()
                .default("Unnamed species"),
            Column::new("origin", ColumnType::Text),
        ],
    )
    .unwrap();

    if with_residence {
        ctx.create_migration();
        ctx.add_table_column(
            "species",
            Column::new("residence", ColumnType::Text),
            Some(ColumnParams::new().fill_from("origin").coalesce("New Earth")),
        )
        .unwrap();
        ctx.recreate_table("species", None).unwrap();
    }
    ctx
}

#[tokio::test]
async fn test_fresh_database_reaches_latest_revision() {
    let mut conn = connect("sqlite::memory:").await;
    let ctx = species_context(true);

    let before = migrate(&mut conn, &ctx).await;
    assert_eq!(before.latest_revision, Some(-1));

    let after = last_migration(&mut conn, &ctx).await;
    assert_eq!(after.latest_revision, Some(1));
    assert_eq!(after.app_version.as_deref(), Some("0.2.0"));
    assert!(after.migrated_at().is_some());

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM \"migrations\";")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(count, 2);

    let columns: Vec<(String,)> = sqlx::query_as("SELECT name FROM pragma_table_info('species');")
        .fetch_all(&mut conn)
        .await
        .unwrap();
    let columns: Vec<&str> = columns.iter().map(|(c,)| c.as_str()).collect();
    assert_eq!(columns, vec!["id", "name", "origin", "residence"]);

    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_rebuild_backfills_existing_rows() {
    let mut conn = connect("sqlite::memory:").await;

    migrate(&mut conn, &species_context(false)).await;
    sqlx::query("INSERT INTO species (name, origin) VALUES ('Human', 'Earth'), ('Vulcan', NULL);")
        .execute(&mut conn)
        .await
        .unwrap();

    let ctx = species_context(true);
    let last = migrate(&mut conn, &ctx).await;
    assert_eq!(last.latest_revision, Some(0));

    let rows: Vec<(i64, String, Option<String>)> =
        sqlx::query_as("SELECT id, name, residence FROM species ORDER BY id;")
            .fetch_all(&mut conn)
            .await
            .unwrap();
    assert_eq!(
        rows,
        vec![
            (1, "Human".to_string(), Some("Earth".to_string())),
            (2, "Vulcan".to_string(), Some("New Earth".to_string())),
        ]
    );

    let (tmp_tables,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'species_tmp';",
    )
    .fetch_one(&mut conn)
    .await
    .unwrap();
    assert_eq!(tmp_tables, 0);
}

#[tokio::test]
async fn test_change_and_delete_columns_on_data() {
    let mut conn = connect("sqlite::memory:").await;

    let mut ctx = species_context(false);
    migrate(&mut conn, &ctx).await;
    sqlx::query("INSERT INTO species (name, origin) VALUES ('Human', NULL);")
        .execute(&mut conn)
        .await
        .unwrap();

    ctx.create_migration();
    ctx.add_table_column(
        "species",
        Column::new("population", ColumnType::Integer),
        None,
    )
    .unwrap();
    ctx.change_table_column(
        "species",
        "population",
        None,
        Some(ColumnParams::new().coalesce(1000)),
    )
    .unwrap();
    ctx.delete_table_column("species", "origin").unwrap();
    ctx.recreate_table("species", None).unwrap();

    let last = migrate(&mut conn, &ctx).await;
    assert_eq!(last.latest_revision, Some(0));

    let rows: Vec<(String, i64)> = sqlx::query_as("SELECT name, population FROM species;")
        .fetch_all(&mut conn)
        .await
        .unwrap();
    assert_eq!(rows, vec![("Human".to_string(), 1000)]);

    let (origin,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM pragma_table_info('species') WHERE name = 'origin';")
            .fetch_one(&mut conn)
            .await
            .unwrap();
    assert_eq!(origin, 0);
}

#[tokio::test]
async fn test_up_to_date_database_runs_envelope_only() {
    let mut conn = connect("sqlite::memory:").await;
    let ctx = species_context(true);
    migrate(&mut conn, &ctx).await;

    let mut last = last_migration(&mut conn, &ctx).await;
    let statements = ctx.migrations_sql_queries(&mut last).unwrap();
    assert_eq!(statements.len(), 3);
    execute(&mut conn, &statements).await;

    assert_eq!(
        last_migration(&mut conn, &ctx).await.latest_revision,
        Some(1)
    );
}

#[tokio::test]
async fn test_database_file_across_releases() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("species.db").display());

    {
        let mut conn = connect(&url).await;
        migrate(&mut conn, &species_context(false)).await;
        sqlx::query("INSERT INTO species (name, origin) VALUES ('Andorian', 'Andoria');")
            .execute(&mut conn)
            .await
            .unwrap();
        conn.close().await.unwrap();
    }

    let mut conn = connect(&url).await;
    let ctx = species_context(true);
    let last = migrate(&mut conn, &ctx).await;
    assert_eq!(last.latest_revision, Some(0));
    assert_eq!(last.app_version.as_deref(), Some("0.2.0"));

    let (residence,): (Option<String>,) =
        sqlx::query_as("SELECT residence FROM species WHERE name = 'Andorian';")
            .fetch_one(&mut conn)
            .await
            .unwrap();
    assert_eq!(residence.as_deref(), Some("Andoria"));
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_custom_version_column_is_recorded() {
    let mut conn = connect("sqlite::memory:").await;
    let mut ctx = MigrationContext::with_config(
        ContextConfig::new()
            .version_column("dwh_version")
            .app_version("7.1.0"),
    );
    ctx.create_migration();
    ctx.add_sql("CREATE TABLE facts (id INTEGER);", Vec::new())
        .unwrap();

    migrate(&mut conn, &ctx).await;

    let (version,): (String,) = sqlx::query_as("SELECT dwh_version FROM migrations;")
        .fetch_one(&mut conn)
        .await
        .unwrap();
    assert_eq!(version, "7.1.0");
}

#[tokio::test]
async fn test_added_foreign_key_column_has_constraint() {
    let mut conn = connect("sqlite::memory:").await;
    let mut ctx = species_context(false);
    ctx.create_table("people", vec![Column::id("id")]).unwrap();
    ctx.create_migration();
    ctx.add_table_column("people", Column::foreign("talisman", "species"), None)
        .unwrap();

    migrate(&mut conn, &ctx).await;

    let targets: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT \"table\", \"from\", \"to\" FROM pragma_foreign_key_list('people');",
    )
    .fetch_all(&mut conn)
    .await
    .unwrap();
    assert_eq!(
        targets,
        vec![(
            "species".to_string(),
            "talisman".to_string(),
            "id".to_string()
        )]
    );
}
