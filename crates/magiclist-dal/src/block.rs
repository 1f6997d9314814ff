use crate::{
    Error, ListingParams,
    error::Result,
    membership::{BLOCK_SONGS, Position},
    not_blank,
};
use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire as _, Pool, SqliteConnection};
use tracing::debug;

const VALID_ORDER_FIELDS: &[&str] = &["id", "nome", "band_id", "created", "modified"];

/// Position of a song in a block, as accepted from clients.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Validate)]
pub struct SongPosition {
    #[garde(range(min = 1))]
    pub song_id: i64,
    #[garde(range(min = 0))]
    pub ordem: i64,
}

impl From<&SongPosition> for Position {
    fn from(value: &SongPosition) -> Self {
        Position::new(value.song_id, value.ordem)
    }
}

/// Complete ordered list replacing all songs of a block.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[serde(transparent)]
#[garde(transparent)]
pub struct SongList(#[garde(length(max = 1000), dive)] pub Vec<SongPosition>);

fn positions(songs: &[SongPosition]) -> Vec<Position> {
    songs.iter().map(Position::from).collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateBlock {
    #[garde(range(min = 1))]
    pub band_id: i64,
    #[garde(length(min = 1, max = 255), custom(not_blank))]
    pub nome: String,
    #[garde(length(max = 5000))]
    pub descricao: Option<String>,
    #[garde(length(max = 1000), dive)]
    pub songs: Option<Vec<SongPosition>>,
}

/// Partial update, `songs` when present replace the whole membership.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct UpdateBlock {
    #[garde(length(min = 1, max = 255), inner(custom(not_blank)))]
    pub nome: Option<String>,
    #[garde(length(max = 5000))]
    pub descricao: Option<String>,
    #[garde(length(max = 1000), dive)]
    pub songs: Option<Vec<SongPosition>>,
}

#[derive(Debug, sqlx::FromRow)]
struct BlockInt {
    id: i64,
    band_id: i64,
    nome: String,
    descricao: Option<String>,
    created: time::PrimitiveDateTime,
    modified: time::PrimitiveDateTime,
}

/// Song as it appears inside a block.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BlockSong {
    pub song_id: i64,
    pub ordem: i64,
    pub titulo: String,
    pub artista: Option<String>,
    pub tom: Option<String>,
    pub bpm: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Block {
    pub id: i64,
    pub band_id: i64,
    pub nome: String,
    pub descricao: Option<String>,
    pub songs: Vec<BlockSong>,
    pub created: time::PrimitiveDateTime,
    pub modified: time::PrimitiveDateTime,
}

impl Block {
    fn from_parts(block: BlockInt, songs: Vec<BlockSong>) -> Self {
        Block {
            id: block.id,
            band_id: block.band_id,
            nome: block.nome,
            descricao: block.descricao,
            songs,
            created: block.created,
            modified: block.modified,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BlockShort {
    pub id: i64,
    pub band_id: i64,
    pub nome: String,
    pub descricao: Option<String>,
    pub song_count: i64,
}

const SHORT_SELECT: &str = "SELECT b.id, b.band_id, b.nome, b.descricao,
(SELECT count(*) FROM block_song bs WHERE bs.block_id = b.id) AS song_count
FROM block b";

pub type BlockRepository = BlockRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct BlockRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> BlockRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>
        + sqlx::Acquire<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateBlock) -> Result<Block> {
        let mut conn = self.executor.acquire().await?;
        let mut transaction = crate::begin_write(&mut *conn).await?;
        crate::ensure_references(&mut *transaction, "band", &[payload.band_id]).await?;

        let result = sqlx::query("INSERT INTO block (band_id, nome, descricao) VALUES (?, ?, ?)")
            .bind(payload.band_id)
            .bind(&payload.nome)
            .bind(&payload.descricao)
            .execute(&mut *transaction)
            .await?;
        let id = result.last_insert_rowid();

        if let Some(songs) = payload.songs.as_deref() {
            BLOCK_SONGS
                .replace(&mut *transaction, id, &positions(songs))
                .await?;
        }

        let record = get(id, &mut *transaction).await?;
        transaction.commit().await?;
        debug!("Created block {id} with {} songs", record.songs.len());
        Ok(record)
    }

    pub async fn update(&self, id: i64, payload: UpdateBlock) -> Result<Block> {
        let mut conn = self.executor.acquire().await?;
        let mut transaction = crate::begin_write(&mut *conn).await?;
        let result = sqlx::query(
            "UPDATE block SET nome = COALESCE(?, nome), descricao = COALESCE(?, descricao),
            modified = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(&payload.nome)
        .bind(&payload.descricao)
        .bind(id)
        .execute(&mut *transaction)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("block", id));
        }

        if let Some(songs) = payload.songs.as_deref() {
            BLOCK_SONGS
                .replace(&mut *transaction, id, &positions(songs))
                .await?;
        }

        let record = get(id, &mut *transaction).await?;
        transaction.commit().await?;
        Ok(record)
    }

    /// Replaces block's songs atomically and returns refreshed block.
    pub async fn replace_songs(&self, id: i64, songs: &[SongPosition]) -> Result<Block> {
        let mut conn = self.executor.acquire().await?;
        let mut transaction = crate::begin_write(&mut *conn).await?;
        BLOCK_SONGS
            .replace(&mut *transaction, id, &positions(songs))
            .await?;
        sqlx::query("UPDATE block SET modified = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(id)
            .execute(&mut *transaction)
            .await?;
        let record = get(id, &mut *transaction).await?;
        transaction.commit().await?;
        Ok(record)
    }

    pub async fn songs(&self, id: i64) -> Result<Vec<BlockSong>> {
        let mut conn = self.executor.acquire().await?;
        let block = get(id, &mut *conn).await?;
        Ok(block.songs)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM block")
            .fetch_one(&self.executor)
            .await?;
        Ok(count)
    }

    pub async fn list(&self, params: ListingParams) -> Result<Vec<BlockShort>> {
        let order = params.ordering(VALID_ORDER_FIELDS, "id")?;
        let records = sqlx::query_as::<_, BlockShort>(&format!(
            "{SHORT_SELECT} {order} LIMIT ? OFFSET ?"
        ))
        .bind(params.limit())
        .bind(params.offset)
        .fetch(&self.executor)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }

    pub async fn list_by_band(&self, params: ListingParams, band_id: i64) -> Result<Vec<BlockShort>> {
        let order = params.ordering(VALID_ORDER_FIELDS, "nome")?;
        let records = sqlx::query_as::<_, BlockShort>(&format!(
            "{SHORT_SELECT} WHERE b.band_id = ? {order} LIMIT ? OFFSET ?"
        ))
        .bind(band_id)
        .bind(params.limit())
        .bind(params.offset)
        .fetch(&self.executor)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }

    /// Song and repertoire links of the block are removed with it.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM block WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::not_found("block", id))
        } else {
            debug!("Deleted block {id}");
            Ok(())
        }
    }

    pub async fn get(&self, id: i64) -> Result<Block> {
        let mut conn = self.executor.acquire().await?;
        get(id, &mut *conn).await
    }
}

pub(crate) async fn block_songs(conn: &mut SqliteConnection, id: i64) -> Result<Vec<BlockSong>> {
    let songs = sqlx::query_as::<_, BlockSong>(
        "SELECT bs.song_id, bs.ordem, s.titulo, s.artista, s.tom, s.bpm
        FROM block_song bs JOIN song s ON s.id = bs.song_id
        WHERE bs.block_id = ? ORDER BY bs.ordem",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(songs)
}

async fn get(id: i64, conn: &mut SqliteConnection) -> Result<Block> {
    let block = sqlx::query_as::<_, BlockInt>("SELECT * FROM block WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found("block", id))?;
    let songs = block_songs(conn, id).await?;
    Ok(Block::from_parts(block, songs))
}
