//! End-to-end scenarios over a `species` table.
//!
//! Each test declares revisions, asks for the statements a database at some
//! revision needs, and checks the exact SQL.

use oxide_revisions::prelude::*;

const RECORD_REVISION: &str =
    "INSERT INTO \"migrations\" (revision, \"app_version\", date_migrated) VALUES (?, ?, ?);";

const CREATE_SPECIES: &str = "CREATE TABLE \"species\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
     \"name\" TEXT NOT NULL DEFAULT 'Unnamed species', \"origin\" TEXT, \"population\" INTEGER);";

fn base_migration() -> MigrationContext {
    let mut ctx = MigrationContext::with_config(ContextConfig::new().app_version("0.1.0"));
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
    )
    .unwrap();
    ctx
}

fn emit(ctx: &MigrationContext) -> Vec<Statement> {
    ctx.migrations_sql_queries(&mut LastMigration::empty())
        .unwrap()
}

fn queries(statements: &[Statement]) -> Vec<&str> {
    statements.iter().map(|s| s.query.as_str()).collect()
}

#[test]
fn empty_context_returns_envelope_only() {
    let ctx = MigrationContext::new();
    let out = emit(&ctx);

    assert_eq!(
        queries(&out),
        vec!["BEGIN TRANSACTION;", "COMMIT TRANSACTION;", "VACUUM;"]
    );
    assert!(out.iter().all(|s| s.args.is_empty()));
}

#[test]
fn add_sql_appends_to_open_revision() {
    let mut ctx = MigrationContext::new();
    ctx.create_migration();
    ctx.add_sql("SELECT 15 AS testPurpose;", Vec::new()).unwrap();

    let out = emit(&ctx);
    assert_eq!(
        queries(&out),
        vec![
            "BEGIN TRANSACTION;",
            RECORD_REVISION,
            "SELECT 15 AS testPurpose;",
            "COMMIT TRANSACTION;",
            "VACUUM;",
        ]
    );
    assert_eq!(out[1].args.len(), 3);
}

#[test]
fn create_table_with_id_column() {
    let mut ctx = MigrationContext::new();
    ctx.create_migration();
    ctx.create_table(
        "species",
        vec![
            Column::id("id"),
            Column::new("name", ColumnType::Text).not_null(),
        ],
    )
    .unwrap();

    let out = emit(&ctx);
    assert_eq!(
        out[2].query,
        "CREATE TABLE \"species\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \"name\" TEXT NOT NULL);"
    );
}

#[test]
fn create_two_tables_with_foreign_key() {
    let mut ctx = base_migration();
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
    .unwrap();

    let out = emit(&ctx);
    assert_eq!(out[2].query, CREATE_SPECIES);
    assert_eq!(
        out[3].query,
        "CREATE TABLE \"people\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
         \"name\" TEXT NOT NULL DEFAULT 'Unnamed person', \"talisman\" INTEGER, \
         FOREIGN KEY (\"talisman\") REFERENCES \"species\"(\"id\"));"
    );
    assert_eq!(out.len(), 6);
}

#[test]
fn add_column_in_second_revision() {
    let mut ctx = base_migration();
    ctx.create_migration();
    ctx.add_table_column("species", Column::new("language", ColumnType::Text), None)
        .unwrap();

    let out = emit(&ctx);
    assert_eq!(
        queries(&out),
        vec![
            "BEGIN TRANSACTION;",
            RECORD_REVISION,
            CREATE_SPECIES,
            RECORD_REVISION,
            "ALTER TABLE \"species\" ADD COLUMN \"language\" TEXT;",
            "COMMIT TRANSACTION;",
            "VACUUM;",
        ]
    );
    assert_eq!(out[3].args[0], SqlValue::Integer(1));
    assert_eq!(out[3].args[1], SqlValue::from("0.1.0"));
}

#[test]
fn change_column_type_rebuilds_table() {
    let mut ctx = base_migration();
    ctx.create_migration();
    ctx.change_table_column(
        "species",
        "origin",
        Some(
            Column::new("origin", ColumnType::Integer)
                .not_null()
                .default("Earth"),
        ),
        Some(ColumnParams::new().coalesce(1)),
    )
    .unwrap();
    ctx.recreate_table("species", None).unwrap();

    let out = emit(&ctx);
    assert_eq!(
        queries(&out[4..]),
        vec![
            "CREATE TABLE \"species_tmp\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"name\" TEXT NOT NULL DEFAULT 'Unnamed species', \
             \"origin\" INTEGER NOT NULL DEFAULT 'Earth', \"population\" INTEGER);",
            "INSERT INTO \"species_tmp\" (\"id\", \"name\", \"origin\", \"population\") \
             SELECT \"id\", \"name\", COALESCE(\"origin\", 1), \"population\" FROM \"species\";",
            "DROP TABLE \"species\";",
            "ALTER TABLE \"species_tmp\" RENAME TO \"species\";",
            "COMMIT TRANSACTION;",
            "VACUUM;",
        ]
    );
}

#[test]
fn rename_column() {
    let mut ctx = base_migration();
    ctx.create_migration();
    ctx.rename_table_column("species", "origin", "place_of_origin")
        .unwrap();

    let out = emit(&ctx);
    assert_eq!(
        out[4].query,
        "ALTER TABLE \"species\" RENAME COLUMN \"origin\" TO \"place_of_origin\";"
    );
    assert_eq!(out.len(), 7);
}

#[test]
fn add_column_with_fill_from_and_coalesce() {
    let mut ctx = base_migration();
    ctx.create_migration();
    ctx.add_table_column(
        "species",
        Column::new("residence", ColumnType::Text),
        Some(ColumnParams::new().coalesce("New Earth").fill_from("origin")),
    )
    .unwrap();
    ctx.recreate_table("species", None).unwrap();

    let out = emit(&ctx);
    assert_eq!(
        queries(&out[4..]),
        vec![
            "ALTER TABLE \"species\" ADD COLUMN \"residence\" TEXT;",
            "CREATE TABLE \"species_tmp\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"name\" TEXT NOT NULL DEFAULT 'Unnamed species', \"origin\" TEXT, \
             \"population\" INTEGER, \"residence\" TEXT);",
            "INSERT INTO \"species_tmp\" (\"id\", \"name\", \"origin\", \"population\", \"residence\") \
             SELECT \"id\", \"name\", \"origin\", \"population\", COALESCE(\"origin\", 'New Earth') \
             FROM \"species\";",
            "DROP TABLE \"species\";",
            "ALTER TABLE \"species_tmp\" RENAME TO \"species\";",
            "COMMIT TRANSACTION;",
            "VACUUM;",
        ]
    );
}

#[test]
fn delete_column_rebuilds_without_it() {
    let mut ctx = base_migration();
    ctx.create_migration();
    ctx.delete_table_column("species", "origin").unwrap();
    ctx.recreate_table("species", None).unwrap();

    let out = emit(&ctx);
    assert_eq!(
        queries(&out[4..]),
        vec![
            "CREATE TABLE \"species_tmp\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"name\" TEXT NOT NULL DEFAULT 'Unnamed species', \"population\" INTEGER);",
            "INSERT INTO \"species_tmp\" (\"id\", \"name\", \"population\") \
             SELECT \"id\", \"name\", \"population\" FROM \"species\";",
            "DROP TABLE \"species\";",
            "ALTER TABLE \"species_tmp\" RENAME TO \"species\";",
            "COMMIT TRANSACTION;",
            "VACUUM;",
        ]
    );
}

#[test]
fn rebuild_leaves_model_at_target_columns() {
    let mut ctx = base_migration();
    ctx.create_migration();
    let target = vec![
        Column::id("id"),
        Column::new("population", ColumnType::Integer).not_null().default(0),
    ];
    ctx.recreate_table("species", Some(target.clone())).unwrap();

    let species = ctx.schema().get_table("species").unwrap();
    let prepared: Vec<Column> = target.into_iter().map(|c| c.prepare().unwrap()).collect();
    assert_eq!(species.columns, prepared);

    let out = emit(&ctx);
    assert_eq!(
        out[5].query,
        "INSERT INTO \"species_tmp\" (\"id\", \"population\") SELECT \"id\", \"population\" \
         FROM \"species\";"
    );
}

#[test]
fn replay_starts_after_latest_revision() {
    let mut ctx = base_migration();
    for language in ["language", "dialect", "script"] {
        ctx.create_migration();
        ctx.add_table_column("species", Column::new(language, ColumnType::Text), None)
            .unwrap();
    }
    assert_eq!(ctx.revisions().len(), 4);

    let out = ctx
        .migrations_sql_queries(&mut LastMigration::at(1))
        .unwrap();
    assert_eq!(
        queries(&out),
        vec![
            "BEGIN TRANSACTION;",
            RECORD_REVISION,
            "ALTER TABLE \"species\" ADD COLUMN \"dialect\" TEXT;",
            RECORD_REVISION,
            "ALTER TABLE \"species\" ADD COLUMN \"script\" TEXT;",
            "COMMIT TRANSACTION;",
            "VACUUM;",
        ]
    );
    assert_eq!(out[1].args[0], SqlValue::Integer(2));
    assert_eq!(out[3].args[0], SqlValue::Integer(3));

    let up_to_date = ctx
        .migrations_sql_queries(&mut LastMigration::at(3))
        .unwrap();
    assert_eq!(up_to_date.len(), 3);
}

#[test]
fn missing_latest_revision_is_set_to_minus_one() {
    let ctx = base_migration();
    let mut last = LastMigration::empty();
    ctx.migrations_sql_queries(&mut last).unwrap();
    assert_eq!(last.latest_revision, Some(-1));
}

#[test]
fn mutating_unknown_column_fails() {
    let mut ctx = base_migration();
    ctx.create_migration();

    assert!(matches!(
        ctx.delete_table_column("species", "planet"),
        Err(MigrateError::ColumnNotFound { .. })
    ));
    assert!(matches!(
        ctx.recreate_table("planets", None),
        Err(MigrateError::TableNotFound(_))
    ));
}
