#![cfg(feature = "sqlite")]

use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta, Utc};
use sql_repository::prelude::*;
use sql_repository::sqlite::{SqliteManager, SqliteOptionsBuilder};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    featured INTEGER NOT NULL,
    rating REAL NOT NULL,
    created_at TEXT NOT NULL,
    archived INTEGER NOT NULL DEFAULT 0
);";

fn product(name: &str, category: &str, featured: bool, rating: f64, created_at: NaiveDateTime) -> Product {
    Product {
        id: None,
        name: name.into(),
        category: category.into(),
        featured,
        rating,
        created_at,
        archived: false,
    }
}

fn setup(dir: &tempfile::TempDir) -> (Pool<SqliteManager>, Repository<SqliteManager, Product>) {
    let pool = SqliteOptionsBuilder::new(dir.path().join("shop.db"))
        .init_sql(SCHEMA)
        .busy_timeout(Duration::from_secs(2))
        .build(PoolConfig::new(2, Duration::from_secs(5)))
        .unwrap();
    let config = RepositoryConfig::new("products")
        .retention_days(30)
        .placeholder_style(PlaceholderStyle::Sqlite);
    let repo = Repository::new(&pool, config).unwrap();
    (pool, repo)
}

#[tokio::test]
async fn repository_round_trip_against_sqlite() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let (pool, repo) = setup(&dir);

    let now = Utc::now().naive_utc();
    let recent = now - TimeDelta::days(1);
    let stale = now - TimeDelta::days(90);

    let hammer = repo.create(&product("hammer", "tools", true, 4.5, recent)).await?;
    let saw_id = repo.create(&product("saw", "tools", true, 4.9, stale)).await?;
    repo.create(&product("glue", "craft", false, 3.1, recent)).await?;
    assert_eq!(hammer, RowValues::Int(1));

    let all = repo.find_all().await?;
    assert_eq!(
        all.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        vec!["hammer", "saw", "glue"]
    );

    let found = repo.find_by_id(saw_id.clone()).await?.expect("saw exists");
    assert_eq!(found.name, "saw");
    assert!((found.rating - 4.9).abs() < f64::EPSILON);
    assert!(repo.find_by_id("missing-id").await?.is_none());

    let featured = repo.find_featured().await?;
    assert_eq!(
        featured.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        vec!["saw", "hammer"]
    );
    assert_eq!(repo.find_by_category("craft").await?.len(), 1);

    assert_eq!(repo.archive_old().await?, 1);
    let saw = repo.find_by_id(saw_id.clone()).await?.expect("saw exists");
    assert!(saw.archived);
    assert_eq!(saw.created_at.and_utc().timestamp(), stale.and_utc().timestamp());

    assert_eq!(repo.delete_by_id(saw_id.clone()).await?, 1);
    assert_eq!(repo.delete_by_id(saw_id).await?, 0);
    assert_eq!(repo.find_all().await?.len(), 2);

    assert_eq!(pool.status().in_use, 0);
    pool.close();
    pool.drain().await;
    Ok(())
}

#[tokio::test]
async fn backend_rejection_discards_the_connection() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let (pool, _repo) = setup(&dir);
    let broken: Repository<SqliteManager, Product> = Repository::new(
        &pool,
        RepositoryConfig::new("no_such_table").placeholder_style(PlaceholderStyle::Sqlite),
    )?;

    let err = broken.find_all().await.unwrap_err();
    assert!(matches!(err, RepoError::QueryExecution(ref msg) if msg.contains("no_such_table")));
    assert_eq!(pool.metrics().broken_discarded, 1);
    assert_eq!(pool.status().total(), 0);
    Ok(())
}

#[tokio::test]
async fn pooled_connection_runs_builder_statements() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let (pool, _repo) = setup(&dir);

    let insert = QueryBuilder::table("products")
        .placeholders(PlaceholderStyle::Sqlite)
        .insert([
            ("name", RowValues::from("tape")),
            ("category", RowValues::from("craft")),
            ("featured", RowValues::Bool(false)),
            ("rating", RowValues::Float(2.0)),
            ("created_at", RowValues::Timestamp(Utc::now().naive_utc())),
        ])
        .build()?;
    let select = QueryBuilder::table("products")
        .placeholders(PlaceholderStyle::Sqlite)
        .select(["name", "archived"])
        .where_op("rating", "<", 3.0)
        .build()?;

    let mut conn = pool.acquire().await?;
    let id = conn.execute(&insert).await?.into_inserted()?;
    assert_eq!(id, RowValues::Int(1));

    let rows = conn.execute(&select).await?.into_rows()?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.results[0].get("name").and_then(RowValues::as_text), Some("tape"));
    assert_eq!(rows.results[0].get("archived").and_then(RowValues::as_bool), Some(false));
    conn.release();
    Ok(())
}
