use crate::{Error, ListingParams, band::BandShort, error::Result, not_blank};
use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire as _, Pool, SqliteConnection};
use tracing::debug;

const VALID_ORDER_FIELDS: &[&str] = &["id", "nome", "instrumento", "apelido", "created", "modified"];

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateMember {
    #[garde(length(min = 1, max = 255), custom(not_blank))]
    pub nome: String,
    #[garde(length(max = 255))]
    pub instrumento: Option<String>,
    #[garde(length(max = 255))]
    pub apelido: Option<String>,
    #[garde(length(max = 1000))]
    pub dados_pagamento: Option<String>,
    #[garde(length(max = 100), inner(inner(range(min = 1))))]
    pub band_ids: Option<Vec<i64>>,
}

/// Partial update, `band_ids` when present replace all band links of the member.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct UpdateMember {
    #[garde(length(min = 1, max = 255), inner(custom(not_blank)))]
    pub nome: Option<String>,
    #[garde(length(max = 255))]
    pub instrumento: Option<String>,
    #[garde(length(max = 255))]
    pub apelido: Option<String>,
    #[garde(length(max = 1000))]
    pub dados_pagamento: Option<String>,
    #[garde(length(max = 100), inner(inner(range(min = 1))))]
    pub band_ids: Option<Vec<i64>>,
}

#[derive(Debug, sqlx::FromRow)]
struct MemberInt {
    id: i64,
    nome: String,
    instrumento: Option<String>,
    apelido: Option<String>,
    dados_pagamento: Option<String>,
    created: time::PrimitiveDateTime,
    modified: time::PrimitiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Member {
    pub id: i64,
    pub nome: String,
    pub instrumento: Option<String>,
    pub apelido: Option<String>,
    pub dados_pagamento: Option<String>,
    pub bands: Vec<BandShort>,
    pub created: time::PrimitiveDateTime,
    pub modified: time::PrimitiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct MemberShort {
    pub id: i64,
    pub nome: String,
    pub instrumento: Option<String>,
    pub apelido: Option<String>,
}

pub type MemberRepository = MemberRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct MemberRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> MemberRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>
        + sqlx::Acquire<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateMember) -> Result<Member> {
        let mut conn = self.executor.acquire().await?;
        let mut transaction = crate::begin_write(&mut *conn).await?;
        let result = sqlx::query(
            "INSERT INTO member (nome, instrumento, apelido, dados_pagamento) VALUES (?, ?, ?, ?)",
        )
        .bind(&payload.nome)
        .bind(&payload.instrumento)
        .bind(&payload.apelido)
        .bind(&payload.dados_pagamento)
        .execute(&mut *transaction)
        .await?;
        let id = result.last_insert_rowid();

        if let Some(band_ids) = payload.band_ids.as_deref() {
            replace_bands(&mut *transaction, id, band_ids).await?;
        }

        let record = get(id, &mut *transaction).await?;
        transaction.commit().await?;
        debug!("Created member {id}");
        Ok(record)
    }

    pub async fn update(&self, id: i64, payload: UpdateMember) -> Result<Member> {
        let mut conn = self.executor.acquire().await?;
        let mut transaction = crate::begin_write(&mut *conn).await?;
        let result = sqlx::query(
            "UPDATE member SET nome = COALESCE(?, nome), instrumento = COALESCE(?, instrumento),
            apelido = COALESCE(?, apelido), dados_pagamento = COALESCE(?, dados_pagamento),
            modified = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(&payload.nome)
        .bind(&payload.instrumento)
        .bind(&payload.apelido)
        .bind(&payload.dados_pagamento)
        .bind(id)
        .execute(&mut *transaction)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("member", id));
        }

        if let Some(band_ids) = payload.band_ids.as_deref() {
            replace_bands(&mut *transaction, id, band_ids).await?;
        }

        let record = get(id, &mut *transaction).await?;
        transaction.commit().await?;
        Ok(record)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM member")
            .fetch_one(&self.executor)
            .await?;
        Ok(count)
    }

    pub async fn list(&self, params: ListingParams) -> Result<Vec<MemberShort>> {
        let order = params.ordering(VALID_ORDER_FIELDS, "nome")?;
        let records = sqlx::query_as::<_, MemberShort>(&format!(
            "SELECT id, nome, instrumento, apelido FROM member {order} LIMIT ? OFFSET ?"
        ))
        .bind(params.limit())
        .bind(params.offset)
        .fetch(&self.executor)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }

    pub async fn list_by_band(&self, params: ListingParams, band_id: i64) -> Result<Vec<MemberShort>> {
        let order = params.ordering(VALID_ORDER_FIELDS, "nome")?;
        let records = sqlx::query_as::<_, MemberShort>(&format!(
            "SELECT id, nome, instrumento, apelido FROM member
            WHERE id IN (SELECT member_id FROM band_member WHERE band_id = ?)
            {order} LIMIT ? OFFSET ?"
        ))
        .bind(band_id)
        .bind(params.limit())
        .bind(params.offset)
        .fetch(&self.executor)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }

    /// Only the member and its band links are removed, bands stay.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM member WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::not_found("member", id))
        } else {
            Ok(())
        }
    }

    pub async fn get(&self, id: i64) -> Result<Member> {
        let mut conn = self.executor.acquire().await?;
        get(id, &mut *conn).await
    }
}

/// Band links have no order, repeated ids are linked once.
async fn replace_bands(conn: &mut SqliteConnection, member_id: i64, band_ids: &[i64]) -> Result<()> {
    crate::ensure_references(&mut *conn, "band", band_ids).await?;

    sqlx::query("DELETE FROM band_member WHERE member_id = ?")
        .bind(member_id)
        .execute(&mut *conn)
        .await?;

    let linked = crate::unique_ids(band_ids);
    for band_id in &linked {
        sqlx::query("INSERT INTO band_member (band_id, member_id) VALUES (?, ?)")
            .bind(*band_id)
            .bind(member_id)
            .execute(&mut *conn)
            .await?;
    }
    debug!("Member {member_id} linked to bands {linked:?}");
    Ok(())
}

async fn get(id: i64, conn: &mut SqliteConnection) -> Result<Member> {
    let member = sqlx::query_as::<_, MemberInt>("SELECT * FROM member WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::not_found("member", id))?;
    let bands = sqlx::query_as::<_, BandShort>(
        "SELECT b.id, b.nome, b.genero FROM band b
        JOIN band_member bm ON bm.band_id = b.id
        WHERE bm.member_id = ? ORDER BY b.nome",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(Member {
        id: member.id,
        nome: member.nome,
        instrumento: member.instrumento,
        apelido: member.apelido,
        dados_pagamento: member.dados_pagamento,
        bands,
        created: member.created,
        modified: member.modified,
    })
}
