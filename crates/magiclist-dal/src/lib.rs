pub mod band;
pub mod block;
pub mod error;
pub mod member;
pub mod membership;
pub mod repertoire;
pub mod show;
pub mod song;

use std::{collections::HashSet, fmt::Display, str::FromStr, time::Duration};

pub use error::Error;
pub use sqlx::Error as SqlxError;
use sqlx::{
    Connection as _, SqliteConnection, Transaction,
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use tracing::debug;

use crate::error::Result;

pub type ChosenDB = sqlx::Sqlite;
pub type ChosenRow = sqlx::sqlite::SqliteRow;
pub type Pool = sqlx::Pool<ChosenDB>;

pub const MAX_LIMIT: usize = 10_000;

/// How long a connection waits for the write lock before giving up.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Ids bound into one `IN (...)` lookup.
pub(crate) const ID_CHUNK: usize = 500;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Opens the pool (creating the database file if needed) and brings the schema up to date.
pub async fn new_pool(database_url: &str) -> Result<Pool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);
    let pool = SqlitePoolOptions::new()
        .max_connections(50)
        .connect_with(options)
        .await?;
    MIGRATOR.run(&pool).await?;
    debug!("Database {database_url} ready");
    Ok(pool)
}

/// Write transaction holding the database write lock from its start, concurrent writers wait up to [`BUSY_TIMEOUT`].
pub(crate) async fn begin_write(conn: &mut SqliteConnection) -> Result<Transaction<'_, ChosenDB>> {
    let transaction = conn.begin_with("BEGIN IMMEDIATE").await?;
    Ok(transaction)
}

#[derive(Debug, Clone)]
pub enum Order {
    Asc(String),
    Desc(String),
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Order::Asc(s) => write!(f, "{}", s),
            Order::Desc(s) => write!(f, "{} DESC", s),
        }
    }
}

impl AsRef<str> for Order {
    fn as_ref(&self) -> &str {
        match self {
            Order::Asc(s) => s.as_str(),
            Order::Desc(s) => s.as_str(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListingParams {
    pub offset: i64,
    pub limit: i64,
    pub order: Option<Vec<Order>>,
}

impl Default for ListingParams {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: MAX_LIMIT as i64,
            order: None,
        }
    }
}

impl ListingParams {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self {
            offset,
            limit,
            order: None,
        }
    }

    pub fn with_order(mut self, order: Vec<Order>) -> Self {
        self.order = Some(order);
        self
    }

    /// Renders `ORDER BY` clause, only fields from `valid_fields` are accepted.
    /// Falls back to ordering by `default_field` so paging stays stable.
    pub fn ordering(&self, valid_fields: &[&str], default_field: &str) -> Result<String> {
        let ordering = self
            .order
            .as_ref()
            .map(|o| {
                o.iter()
                    .map(|o| {
                        if valid_fields.contains(&o.as_ref()) {
                            Ok(o.to_string())
                        } else {
                            Err(Error::InvalidOrderByField(o.as_ref().to_string()))
                        }
                    })
                    .collect::<Result<Vec<String>>>()
                    .map(|o| o.join(", "))
            })
            .transpose()?
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| default_field.to_string());
        Ok(format!("ORDER BY {ordering}"))
    }

    pub(crate) fn limit(&self) -> i64 {
        self.limit.clamp(0, MAX_LIMIT as i64)
    }
}

/// Returns those `ids` which have no row in `table`. Order of first appearance is kept, duplicates are reported once.
pub(crate) async fn missing_ids(
    conn: &mut SqliteConnection,
    table: &str,
    ids: &[i64],
) -> Result<Vec<i64>> {
    let unique = unique_ids(ids);
    let mut found = HashSet::with_capacity(unique.len());
    for chunk in unique.chunks(ID_CHUNK) {
        let sql = format!("SELECT id FROM {table} WHERE id IN ({})", placeholders(chunk.len()));
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for id in chunk {
            query = query.bind(*id);
        }
        found.extend(query.fetch_all(&mut *conn).await?);
    }

    Ok(unique.into_iter().filter(|id| !found.contains(id)).collect())
}

/// `ids` without repeats, in order of first appearance.
pub(crate) fn unique_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// Fails with [`Error::InvalidReferences`] when any of `ids` is not present in `table`.
pub(crate) async fn ensure_references(
    conn: &mut SqliteConnection,
    table: &'static str,
    ids: &[i64],
) -> Result<()> {
    let missing = missing_ids(conn, table, ids).await?;
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidReferences {
            entity: table,
            ids: missing,
        })
    }
}

pub(crate) fn not_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        Err(garde::Error::new("must not be blank"))
    } else {
        Ok(())
    }
}
