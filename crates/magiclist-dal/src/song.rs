use crate::{Error, ListingParams, error::Result, not_blank};
use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire as _, Pool};
use tracing::debug;

const VALID_ORDER_FIELDS: &[&str] = &[
    "id", "titulo", "artista", "tom", "bpm", "genero", "created", "modified",
];

/// Links are persisted in a single column, one per line.
const LINK_SEPARATOR: &str = "\n";

fn join_links(links: &Option<Vec<String>>) -> Option<String> {
    links.as_ref().map(|links| {
        links
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(LINK_SEPARATOR)
    })
}

/// One link per stored line, so a link cannot carry line breaks or inner whitespace.
fn single_line_link(value: &str, _ctx: &()) -> garde::Result {
    if value
        .trim()
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        Err(garde::Error::new("link must not contain whitespace or control characters"))
    } else {
        Ok(())
    }
}

fn split_links(links: Option<String>) -> Vec<String> {
    links
        .map(|s| {
            s.split(LINK_SEPARATOR)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateSong {
    #[garde(range(min = 1))]
    pub band_id: i64,
    #[garde(length(min = 1, max = 255), custom(not_blank))]
    pub titulo: String,
    #[garde(length(max = 255))]
    pub artista: Option<String>,
    #[garde(length(max = 16))]
    pub tom: Option<String>,
    #[garde(range(min = 1, max = 400))]
    pub bpm: Option<i64>,
    #[garde(length(max = 255))]
    pub genero: Option<String>,
    #[garde(length(max = 5000))]
    pub observacoes: Option<String>,
    #[garde(length(max = 20), inner(inner(url, length(max = 1023), custom(single_line_link))))]
    pub links: Option<Vec<String>>,
}

/// Partial update, absent fields keep stored values, `links` when present replace stored links.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct UpdateSong {
    #[garde(length(min = 1, max = 255), inner(custom(not_blank)))]
    pub titulo: Option<String>,
    #[garde(length(max = 255))]
    pub artista: Option<String>,
    #[garde(length(max = 16))]
    pub tom: Option<String>,
    #[garde(range(min = 1, max = 400))]
    pub bpm: Option<i64>,
    #[garde(length(max = 255))]
    pub genero: Option<String>,
    #[garde(length(max = 5000))]
    pub observacoes: Option<String>,
    #[garde(length(max = 20), inner(inner(url, length(max = 1023), custom(single_line_link))))]
    pub links: Option<Vec<String>>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SongInt {
    id: i64,
    band_id: i64,
    titulo: String,
    artista: Option<String>,
    tom: Option<String>,
    bpm: Option<i64>,
    genero: Option<String>,
    observacoes: Option<String>,
    links: Option<String>,
    created: time::PrimitiveDateTime,
    modified: time::PrimitiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Song {
    pub id: i64,
    pub band_id: i64,
    pub titulo: String,
    pub artista: Option<String>,
    pub tom: Option<String>,
    pub bpm: Option<i64>,
    pub genero: Option<String>,
    pub observacoes: Option<String>,
    pub links: Vec<String>,
    pub created: time::PrimitiveDateTime,
    pub modified: time::PrimitiveDateTime,
}

impl From<SongInt> for Song {
    fn from(value: SongInt) -> Self {
        Self {
            id: value.id,
            band_id: value.band_id,
            titulo: value.titulo,
            artista: value.artista,
            tom: value.tom,
            bpm: value.bpm,
            genero: value.genero,
            observacoes: value.observacoes,
            links: split_links(value.links),
            created: value.created,
            modified: value.modified,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SongShort {
    pub id: i64,
    pub band_id: i64,
    pub titulo: String,
    pub artista: Option<String>,
    pub tom: Option<String>,
    pub bpm: Option<i64>,
}

pub type SongRepository = SongRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct SongRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> SongRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>
        + sqlx::Acquire<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateSong) -> Result<Song> {
        let mut conn = self.executor.acquire().await?;
        let mut transaction = crate::begin_write(&mut *conn).await?;
        crate::ensure_references(&mut *transaction, "band", &[payload.band_id]).await?;

        let result = sqlx::query(
            "INSERT INTO song (band_id, titulo, artista, tom, bpm, genero, observacoes, links)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(payload.band_id)
        .bind(&payload.titulo)
        .bind(&payload.artista)
        .bind(&payload.tom)
        .bind(payload.bpm)
        .bind(&payload.genero)
        .bind(&payload.observacoes)
        .bind(join_links(&payload.links))
        .execute(&mut *transaction)
        .await?;

        let id = result.last_insert_rowid();
        let record = get(id, &mut *transaction).await?;
        transaction.commit().await?;
        debug!("Created song {id} for band {}", record.band_id);
        Ok(record)
    }

    pub async fn update(&self, id: i64, payload: UpdateSong) -> Result<Song> {
        let result = sqlx::query(
            "UPDATE song SET titulo = COALESCE(?, titulo), artista = COALESCE(?, artista),
            tom = COALESCE(?, tom), bpm = COALESCE(?, bpm), genero = COALESCE(?, genero),
            observacoes = COALESCE(?, observacoes), links = COALESCE(?, links),
            modified = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(&payload.titulo)
        .bind(&payload.artista)
        .bind(&payload.tom)
        .bind(payload.bpm)
        .bind(&payload.genero)
        .bind(&payload.observacoes)
        .bind(join_links(&payload.links))
        .bind(id)
        .execute(&self.executor)
        .await?;

        if result.rows_affected() == 0 {
            Err(Error::not_found("song", id))
        } else {
            self.get(id).await
        }
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM song")
            .fetch_one(&self.executor)
            .await?;
        Ok(count)
    }

    pub async fn list(&self, params: ListingParams) -> Result<Vec<SongShort>> {
        let order = params.ordering(VALID_ORDER_FIELDS, "id")?;
        let records = sqlx::query_as::<_, SongShort>(&format!(
            "SELECT id, band_id, titulo, artista, tom, bpm FROM song {order} LIMIT ? OFFSET ?"
        ))
        .bind(params.limit())
        .bind(params.offset)
        .fetch(&self.executor)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }

    pub async fn list_by_band(&self, params: ListingParams, band_id: i64) -> Result<Vec<SongShort>> {
        let order = params.ordering(VALID_ORDER_FIELDS, "titulo")?;
        let records = sqlx::query_as::<_, SongShort>(&format!(
            "SELECT id, band_id, titulo, artista, tom, bpm FROM song WHERE band_id = ? {order} LIMIT ? OFFSET ?"
        ))
        .bind(band_id)
        .bind(params.limit())
        .bind(params.offset)
        .fetch(&self.executor)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }

    /// Removing a song also removes it from all blocks.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM song WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::not_found("song", id))
        } else {
            Ok(())
        }
    }

    pub async fn get(&self, id: i64) -> Result<Song> {
        get(id, &self.executor).await
    }
}

async fn get<'c, E>(id: i64, executor: E) -> Result<Song>
where
    E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    sqlx::query_as::<_, SongInt>("SELECT * FROM song WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .map(Song::from)
        .ok_or_else(|| Error::not_found("song", id))
}
