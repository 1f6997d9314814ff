//! Ordered parent/child memberships (songs in a block, blocks in a repertoire).
//!
//! A membership is replaced as a whole: all join rows of the parent are deleted
//! and the requested list is inserted in the given order. Callers run
//! [`Membership::replace`] inside a transaction, so a failed insert leaves the
//! previous membership untouched.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::{Error, error::Result};

/// Describes one join table carrying `(parent, child, ordem)`.
#[derive(Debug, Clone, Copy)]
pub struct Membership {
    pub join_table: &'static str,
    pub parent_table: &'static str,
    pub parent_column: &'static str,
    pub child_table: &'static str,
    pub child_column: &'static str,
    /// Column parent and children must agree on, children of another owner are rejected.
    pub owner_column: &'static str,
}

pub const BLOCK_SONGS: Membership = Membership {
    join_table: "block_song",
    parent_table: "block",
    parent_column: "block_id",
    child_table: "song",
    child_column: "song_id",
    owner_column: "band_id",
};

pub const REPERTOIRE_BLOCKS: Membership = Membership {
    join_table: "repertoire_block",
    parent_table: "repertoire",
    parent_column: "repertoire_id",
    child_table: "block",
    child_column: "block_id",
    owner_column: "band_id",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Position {
    pub child_id: i64,
    pub ordem: i64,
}

impl Position {
    pub fn new(child_id: i64, ordem: i64) -> Self {
        Self { child_id, ordem }
    }
}

impl Membership {
    /// Replaces parent's membership with `positions`.
    ///
    /// Fails with `RecordNotFound` for unknown parent, `InvalidReferences` listing
    /// all children which are unknown or belong to another band, `InvalidOrdinal` for negative `ordem` and `Conflict`
    /// when store uniqueness (same child twice or same `ordem` twice) is violated.
    /// Nothing is written before all checks pass, but inserts can still fail on
    /// constraints, so this must run in a transaction.
    pub async fn replace(
        &self,
        conn: &mut SqliteConnection,
        parent_id: i64,
        positions: &[Position],
    ) -> Result<()> {
        self.ensure_parent(conn, parent_id).await?;

        if let Some(p) = positions.iter().find(|p| p.ordem < 0) {
            return Err(Error::InvalidOrdinal(p.ordem));
        }

        let child_ids: Vec<i64> = positions.iter().map(|p| p.child_id).collect();
        let invalid = self.foreign_children(conn, parent_id, &child_ids).await?;
        if !invalid.is_empty() {
            return Err(Error::InvalidReferences {
                entity: self.child_table,
                ids: invalid,
            });
        }

        let deleted = sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = ?",
            self.join_table, self.parent_column
        ))
        .bind(parent_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        let insert = format!(
            "INSERT INTO {} ({}, {}, ordem) VALUES (?, ?, ?)",
            self.join_table, self.parent_column, self.child_column
        );
        for position in positions {
            sqlx::query(&insert)
                .bind(parent_id)
                .bind(position.child_id)
                .bind(position.ordem)
                .execute(&mut *conn)
                .await
                .map_err(|e| self.classify_insert_error(e, parent_id, position))?;
        }

        debug!(
            "Replaced {} membership of {} {}: removed {}, inserted {}",
            self.join_table,
            self.parent_table,
            parent_id,
            deleted,
            positions.len()
        );
        Ok(())
    }

    /// Current membership ordered by `ordem`.
    pub async fn positions(
        &self,
        conn: &mut SqliteConnection,
        parent_id: i64,
    ) -> Result<Vec<Position>> {
        let sql = format!(
            "SELECT {} AS child_id, ordem FROM {} WHERE {} = ? ORDER BY ordem",
            self.child_column, self.join_table, self.parent_column
        );
        let positions = sqlx::query_as::<_, Position>(&sql)
            .bind(parent_id)
            .fetch_all(&mut *conn)
            .await?;
        Ok(positions)
    }

    async fn ensure_parent(&self, conn: &mut SqliteConnection, parent_id: i64) -> Result<()> {
        let exists = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT id FROM {} WHERE id = ?",
            self.parent_table
        ))
        .bind(parent_id)
        .fetch_optional(&mut *conn)
        .await?;
        match exists {
            Some(_) => Ok(()),
            None => Err(Error::not_found(self.parent_table, parent_id)),
        }
    }

    /// Ids from `child_ids` that do not exist or have another owner than the parent.
    async fn foreign_children(
        &self,
        conn: &mut SqliteConnection,
        parent_id: i64,
        child_ids: &[i64],
    ) -> Result<Vec<i64>> {
        let unique = crate::unique_ids(child_ids);
        let mut found = HashSet::with_capacity(unique.len());
        for chunk in unique.chunks(crate::ID_CHUNK) {
            let sql = format!(
                "SELECT id FROM {child} WHERE {owner} = (SELECT {owner} FROM {parent} WHERE id = ?) AND id IN ({ids})",
                child = self.child_table,
                owner = self.owner_column,
                parent = self.parent_table,
                ids = crate::placeholders(chunk.len()),
            );
            let mut query = sqlx::query_scalar::<_, i64>(&sql).bind(parent_id);
            for id in chunk {
                query = query.bind(*id);
            }
            found.extend(query.fetch_all(&mut *conn).await?);
        }
        Ok(unique.into_iter().filter(|id| !found.contains(id)).collect())
    }

    fn classify_insert_error(&self, error: sqlx::Error, parent_id: i64, position: &Position) -> Error {
        match error {
            sqlx::Error::Database(ref db_error) if db_error.is_unique_violation() => {
                Error::Conflict(format!(
                    "{} {} already has {} {} or ordem {}",
                    self.parent_table, parent_id, self.child_table, position.child_id, position.ordem
                ))
            }
            other => other.into(),
        }
    }
}
