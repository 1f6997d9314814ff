use crate::{Error, ListingParams, error::Result, not_blank};
use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::Pool;
use tracing::debug;

const VALID_ORDER_FIELDS: &[&str] = &["id", "nome", "genero", "created", "modified"];

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateBand {
    #[garde(length(min = 1, max = 255), custom(not_blank))]
    pub nome: String,
    #[garde(length(max = 255))]
    pub genero: Option<String>,
    #[garde(length(max = 5000))]
    pub descricao: Option<String>,
}

/// Partial update, absent fields keep stored values.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct UpdateBand {
    #[garde(length(min = 1, max = 255), inner(custom(not_blank)))]
    pub nome: Option<String>,
    #[garde(length(max = 255))]
    pub genero: Option<String>,
    #[garde(length(max = 5000))]
    pub descricao: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Band {
    pub id: i64,
    pub nome: String,
    pub genero: Option<String>,
    pub descricao: Option<String>,
    pub created: time::PrimitiveDateTime,
    pub modified: time::PrimitiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BandShort {
    pub id: i64,
    pub nome: String,
    pub genero: Option<String>,
}

pub type BandRepository = BandRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct BandRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> BandRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>
        + sqlx::Acquire<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateBand) -> Result<Band> {
        let result = sqlx::query("INSERT INTO band (nome, genero, descricao) VALUES (?, ?, ?)")
            .bind(&payload.nome)
            .bind(&payload.genero)
            .bind(&payload.descricao)
            .execute(&self.executor)
            .await?;

        let id = result.last_insert_rowid();
        debug!("Created band {id}");
        self.get(id).await
    }

    pub async fn update(&self, id: i64, payload: UpdateBand) -> Result<Band> {
        let result = sqlx::query(
            "UPDATE band SET nome = COALESCE(?, nome), genero = COALESCE(?, genero),
            descricao = COALESCE(?, descricao), modified = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(&payload.nome)
        .bind(&payload.genero)
        .bind(&payload.descricao)
        .bind(id)
        .execute(&self.executor)
        .await?;

        if result.rows_affected() == 0 {
            Err(Error::not_found("band", id))
        } else {
            self.get(id).await
        }
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM band")
            .fetch_one(&self.executor)
            .await?;
        Ok(count)
    }

    pub async fn list_all(&self) -> Result<Vec<BandShort>> {
        self.list(ListingParams::default()).await
    }

    pub async fn list(&self, params: ListingParams) -> Result<Vec<BandShort>> {
        let order = params.ordering(VALID_ORDER_FIELDS, "id")?;
        let records = sqlx::query_as::<_, BandShort>(&format!(
            "SELECT id, nome, genero FROM band {order} LIMIT ? OFFSET ?"
        ))
        .bind(params.limit())
        .bind(params.offset)
        .fetch(&self.executor)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }

    /// Deletes band together with its songs, blocks, repertoires, shows and member links.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM band WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::not_found("band", id))
        } else {
            debug!("Deleted band {id}");
            Ok(())
        }
    }

    pub async fn get(&self, id: i64) -> Result<Band> {
        sqlx::query_as::<_, Band>("SELECT * FROM band WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::not_found("band", id))
    }

    pub async fn exists(&self, id: i64) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM band WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.executor)
            .await?;
        Ok(found.is_some())
    }
}
