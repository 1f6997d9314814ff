use crate::{
    Error, ListingParams,
    block::BlockSong,
    error::Result,
    membership::{Position, REPERTOIRE_BLOCKS},
    not_blank,
};
use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire as _, Pool, SqliteConnection};
use tracing::debug;

const VALID_ORDER_FIELDS: &[&str] = &["id", "nome", "data", "band_id", "created", "modified"];

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Validate)]
pub struct BlockPosition {
    #[garde(range(min = 1))]
    pub block_id: i64,
    #[garde(range(min = 0))]
    pub ordem: i64,
}

impl From<&BlockPosition> for Position {
    fn from(value: &BlockPosition) -> Self {
        Position::new(value.block_id, value.ordem)
    }
}

/// Complete ordered list replacing all blocks of a repertoire.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[serde(transparent)]
#[garde(transparent)]
pub struct BlockList(#[garde(length(max = 1000), dive)] pub Vec<BlockPosition>);

fn positions(blocks: &[BlockPosition]) -> Vec<Position> {
    blocks.iter().map(Position::from).collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateRepertoire {
    #[garde(range(min = 1))]
    pub band_id: i64,
    #[garde(length(min = 1, max = 255), custom(not_blank))]
    pub nome: String,
    #[garde(skip)]
    pub data: Option<time::Date>,
    #[garde(length(max = 5000))]
    pub observacoes: Option<String>,
    #[garde(length(max = 1000), dive)]
    pub blocks: Option<Vec<BlockPosition>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct UpdateRepertoire {
    #[garde(length(min = 1, max = 255), inner(custom(not_blank)))]
    pub nome: Option<String>,
    #[garde(skip)]
    pub data: Option<time::Date>,
    #[garde(length(max = 5000))]
    pub observacoes: Option<String>,
    #[garde(length(max = 1000), dive)]
    pub blocks: Option<Vec<BlockPosition>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RepertoireShort {
    pub id: i64,
    pub band_id: i64,
    pub nome: String,
    pub data: Option<time::Date>,
}

#[derive(Debug, sqlx::FromRow)]
struct RepertoireInt {
    id: i64,
    band_id: i64,
    nome: String,
    data: Option<time::Date>,
    observacoes: Option<String>,
    created: time::PrimitiveDateTime,
    modified: time::PrimitiveDateTime,
}

/// Block as it appears inside a repertoire.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RepertoireBlock {
    pub block_id: i64,
    pub ordem: i64,
    pub nome: String,
    pub song_count: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Repertoire {
    pub id: i64,
    pub band_id: i64,
    pub nome: String,
    pub data: Option<time::Date>,
    pub observacoes: Option<String>,
    pub blocks: Vec<RepertoireBlock>,
    pub created: time::PrimitiveDateTime,
    pub modified: time::PrimitiveDateTime,
}

impl Repertoire {
    fn from_parts(repertoire: RepertoireInt, blocks: Vec<RepertoireBlock>) -> Self {
        Repertoire {
            id: repertoire.id,
            band_id: repertoire.band_id,
            nome: repertoire.nome,
            data: repertoire.data,
            observacoes: repertoire.observacoes,
            blocks,
            created: repertoire.created,
            modified: repertoire.modified,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SetlistBlock {
    pub block_id: i64,
    pub ordem: i64,
    pub nome: String,
    pub songs: Vec<BlockSong>,
}

/// Repertoire expanded to blocks and songs, both in `ordem` order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Setlist {
    pub repertoire: RepertoireShort,
    pub blocks: Vec<SetlistBlock>,
    pub total_songs: usize,
}

#[derive(Debug, sqlx::FromRow)]
struct SetlistRow {
    block_id: i64,
    block_ordem: i64,
    block_nome: String,
    song_id: Option<i64>,
    song_ordem: Option<i64>,
    titulo: Option<String>,
    artista: Option<String>,
    tom: Option<String>,
    bpm: Option<i64>,
}

/// Rows must be sorted by block ordem, then song ordem. Blocks without songs come with NULL song columns.
fn group_setlist(rows: Vec<SetlistRow>) -> Vec<SetlistBlock> {
    let mut blocks: Vec<SetlistBlock> = Vec::new();
    for row in rows {
        let same_block = blocks
            .last()
            .map(|b| b.block_id == row.block_id)
            .unwrap_or(false);
        if !same_block {
            blocks.push(SetlistBlock {
                block_id: row.block_id,
                ordem: row.block_ordem,
                nome: row.block_nome,
                songs: vec![],
            });
        }
        if let (Some(song_id), Some(ordem), Some(titulo), Some(block)) =
            (row.song_id, row.song_ordem, row.titulo, blocks.last_mut())
        {
            block.songs.push(BlockSong {
                song_id,
                ordem,
                titulo,
                artista: row.artista,
                tom: row.tom,
                bpm: row.bpm,
            });
        }
    }
    blocks
}

pub type RepertoireRepository = RepertoireRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct RepertoireRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> RepertoireRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>
        + sqlx::Acquire<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateRepertoire) -> Result<Repertoire> {
        let mut conn = self.executor.acquire().await?;
        let mut transaction = crate::begin_write(&mut *conn).await?;
        crate::ensure_references(&mut *transaction, "band", &[payload.band_id]).await?;

        let result = sqlx::query(
            "INSERT INTO repertoire (band_id, nome, data, observacoes) VALUES (?, ?, ?, ?)",
        )
        .bind(payload.band_id)
        .bind(&payload.nome)
        .bind(payload.data)
        .bind(&payload.observacoes)
        .execute(&mut *transaction)
        .await?;
        let id = result.last_insert_rowid();

        if let Some(blocks) = payload.blocks.as_deref() {
            REPERTOIRE_BLOCKS
                .replace(&mut *transaction, id, &positions(blocks))
                .await?;
        }

        let record = get(id, &mut *transaction).await?;
        transaction.commit().await?;
        debug!("Created repertoire {id} with {} blocks", record.blocks.len());
        Ok(record)
    }

    pub async fn update(&self, id: i64, payload: UpdateRepertoire) -> Result<Repertoire> {
        let mut conn = self.executor.acquire().await?;
        let mut transaction = crate::begin_write(&mut *conn).await?;
        let result = sqlx::query(
            "UPDATE repertoire SET nome = COALESCE(?, nome), data = COALESCE(?, data),
            observacoes = COALESCE(?, observacoes), modified = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(&payload.nome)
        .bind(payload.data)
        .bind(&payload.observacoes)
        .bind(id)
        .execute(&mut *transaction)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("repertoire", id));
        }

        if let Some(blocks) = payload.blocks.as_deref() {
            REPERTOIRE_BLOCKS
                .replace(&mut *transaction, id, &positions(blocks))
                .await?;
        }

        let record = get(id, &mut *transaction).await?;
        transaction.commit().await?;
        Ok(record)
    }

    /// Replaces repertoire's blocks atomically and returns refreshed repertoire.
    pub async fn replace_blocks(&self, id: i64, blocks: &[BlockPosition]) -> Result<Repertoire> {
        let mut conn = self.executor.acquire().await?;
        let mut transaction = crate::begin_write(&mut *conn).await?;
        REPERTOIRE_BLOCKS
            .replace(&mut *transaction, id, &positions(blocks))
            .await?;
        sqlx::query("UPDATE repertoire SET modified = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(id)
            .execute(&mut *transaction)
            .await?;
        let record = get(id, &mut *transaction).await?;
        transaction.commit().await?;
        Ok(record)
    }

    pub async fn blocks(&self, id: i64) -> Result<Vec<RepertoireBlock>> {
        let mut conn = self.executor.acquire().await?;
        let repertoire = get(id, &mut *conn).await?;
        Ok(repertoire.blocks)
    }

    pub async fn setlist(&self, id: i64) -> Result<Setlist> {
        let mut conn = self.executor.acquire().await?;
        let repertoire = sqlx::query_as::<_, RepertoireShort>(
            "SELECT id, band_id, nome, data FROM repertoire WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found("repertoire", id))?;

        let rows = sqlx::query_as::<_, SetlistRow>(
            "SELECT rb.block_id, rb.ordem AS block_ordem, b.nome AS block_nome,
            bs.song_id, bs.ordem AS song_ordem, s.titulo, s.artista, s.tom, s.bpm
            FROM repertoire_block rb
            JOIN block b ON b.id = rb.block_id
            LEFT JOIN block_song bs ON bs.block_id = rb.block_id
            LEFT JOIN song s ON s.id = bs.song_id
            WHERE rb.repertoire_id = ?
            ORDER BY rb.ordem, bs.ordem",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        let blocks = group_setlist(rows);
        let total_songs = blocks.iter().map(|b| b.songs.len()).sum();
        Ok(Setlist {
            repertoire,
            blocks,
            total_songs,
        })
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM repertoire")
            .fetch_one(&self.executor)
            .await?;
        Ok(count)
    }

    pub async fn list(&self, params: ListingParams) -> Result<Vec<RepertoireShort>> {
        let order = params.ordering(VALID_ORDER_FIELDS, "id")?;
        let records = sqlx::query_as::<_, RepertoireShort>(&format!(
            "SELECT id, band_id, nome, data FROM repertoire {order} LIMIT ? OFFSET ?"
        ))
        .bind(params.limit())
        .bind(params.offset)
        .fetch(&self.executor)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }

    pub async fn list_by_band(
        &self,
        params: ListingParams,
        band_id: i64,
    ) -> Result<Vec<RepertoireShort>> {
        let order = params.ordering(VALID_ORDER_FIELDS, "data DESC")?;
        let records = sqlx::query_as::<_, RepertoireShort>(&format!(
            "SELECT id, band_id, nome, data FROM repertoire WHERE band_id = ? {order} LIMIT ? OFFSET ?"
        ))
        .bind(band_id)
        .bind(params.limit())
        .bind(params.offset)
        .fetch(&self.executor)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM repertoire WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::not_found("repertoire", id))
        } else {
            debug!("Deleted repertoire {id}");
            Ok(())
        }
    }

    pub async fn get(&self, id: i64) -> Result<Repertoire> {
        let mut conn = self.executor.acquire().await?;
        get(id, &mut *conn).await
    }
}

async fn get(id: i64, conn: &mut SqliteConnection) -> Result<Repertoire> {
    let repertoire = sqlx::query_as::<_, RepertoireInt>("SELECT * FROM repertoire WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found("repertoire", id))?;
    let blocks = sqlx::query_as::<_, RepertoireBlock>(
        "SELECT rb.block_id, rb.ordem, b.nome,
        (SELECT count(*) FROM block_song bs WHERE bs.block_id = rb.block_id) AS song_count
        FROM repertoire_block rb JOIN block b ON b.id = rb.block_id
        WHERE rb.repertoire_id = ? ORDER BY rb.ordem",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(Repertoire::from_parts(repertoire, blocks))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(block_id: i64, block_ordem: i64, song: Option<(i64, i64)>) -> SetlistRow {
        SetlistRow {
            block_id,
            block_ordem,
            block_nome: format!("Bloco {block_id}"),
            song_id: song.map(|s| s.0),
            song_ordem: song.map(|s| s.1),
            titulo: song.map(|s| format!("Musica {}", s.0)),
            artista: None,
            tom: None,
            bpm: None,
        }
    }

    #[test]
    fn test_group_setlist() {
        let rows = vec![
            row(7, 0, Some((1, 0))),
            row(7, 0, Some((2, 1))),
            row(3, 1, None),
            row(5, 4, Some((9, 0))),
        ];
        let blocks = group_setlist(rows);
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks.iter().map(|b| b.block_id).collect::<Vec<_>>(),
            vec![7, 3, 5]
        );
        assert_eq!(
            blocks[0].songs.iter().map(|s| s.song_id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(blocks[1].songs.is_empty());
        assert_eq!(blocks[2].songs[0].titulo, "Musica 9");
        assert_eq!(blocks[2].ordem, 4);
    }

    #[test]
    fn test_group_empty_setlist() {
        assert!(group_setlist(vec![]).is_empty());
    }
}
