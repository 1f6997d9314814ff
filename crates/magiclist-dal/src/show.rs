use crate::{ChosenRow, Error, ListingParams, error::Result};
use futures::TryStreamExt as _;
use garde::Validate;
use magiclist_types::ShowStatus;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire as _, Pool, Row};
use tracing::{debug, warn};

const VALID_ORDER_FIELDS: &[&str] = &[
    "id", "data", "local", "status", "cache_bruto", "band_id", "created", "modified",
];

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateShow {
    #[garde(range(min = 1))]
    pub band_id: i64,
    #[garde(skip)]
    pub data: time::Date,
    #[garde(length(min = 1, max = 255), custom(crate::not_blank))]
    pub local: String,
    #[garde(length(max = 255))]
    pub contato: Option<String>,
    #[garde(range(min = 0.0))]
    pub cache_bruto: Option<f64>,
    #[garde(skip)]
    pub status: Option<ShowStatus>,
    #[garde(length(max = 5000))]
    pub observacoes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct UpdateShow {
    #[garde(skip)]
    pub data: Option<time::Date>,
    #[garde(length(min = 1, max = 255), inner(custom(crate::not_blank)))]
    pub local: Option<String>,
    #[garde(length(max = 255))]
    pub contato: Option<String>,
    #[garde(range(min = 0.0))]
    pub cache_bruto: Option<f64>,
    #[garde(skip)]
    pub status: Option<ShowStatus>,
    #[garde(length(max = 5000))]
    pub observacoes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Show {
    pub id: i64,
    pub band_id: i64,
    pub data: time::Date,
    pub local: String,
    pub contato: Option<String>,
    pub cache_bruto: Option<f64>,
    pub status: ShowStatus,
    pub observacoes: Option<String>,
    pub created: time::PrimitiveDateTime,
    pub modified: time::PrimitiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShowShort {
    pub id: i64,
    pub band_id: i64,
    pub data: time::Date,
    pub local: String,
    pub cache_bruto: Option<f64>,
    pub status: ShowStatus,
}

fn status_from_row(row: &ChosenRow) -> Result<ShowStatus, sqlx::Error> {
    let status: String = row.try_get("status")?;
    status.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: "status".into(),
        source: Box::new(e),
    })
}

impl sqlx::FromRow<'_, ChosenRow> for Show {
    fn from_row(row: &ChosenRow) -> Result<Self, sqlx::Error> {
        Ok(Show {
            id: row.try_get("id")?,
            band_id: row.try_get("band_id")?,
            data: row.try_get("data")?,
            local: row.try_get("local")?,
            contato: row.try_get("contato")?,
            cache_bruto: row.try_get("cache_bruto")?,
            status: status_from_row(row)?,
            observacoes: row.try_get("observacoes")?,
            created: row.try_get("created")?,
            modified: row.try_get("modified")?,
        })
    }
}

impl sqlx::FromRow<'_, ChosenRow> for ShowShort {
    fn from_row(row: &ChosenRow) -> Result<Self, sqlx::Error> {
        Ok(ShowShort {
            id: row.try_get("id")?,
            band_id: row.try_get("band_id")?,
            data: row.try_get("data")?,
            local: row.try_get("local")?,
            cache_bruto: row.try_get("cache_bruto")?,
            status: status_from_row(row)?,
        })
    }
}

/// Same status for many shows at once.
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct BulkStatusUpdate {
    #[garde(length(min = 1, max = 1000))]
    pub ids: Vec<i64>,
    #[garde(skip)]
    pub status: ShowStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BulkStatusError {
    pub id: i64,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct BulkStatusReport {
    pub updated: Vec<i64>,
    pub errors: Vec<BulkStatusError>,
}

const SHORT_SELECT: &str = "SELECT id, band_id, data, local, cache_bruto, status FROM show";

pub type ShowRepository = ShowRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct ShowRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> ShowRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>
        + sqlx::Acquire<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateShow) -> Result<Show> {
        let mut conn = self.executor.acquire().await?;
        crate::ensure_references(&mut *conn, "band", &[payload.band_id]).await?;

        let status = payload.status.unwrap_or_default();
        let result = sqlx::query(
            "INSERT INTO show (band_id, data, local, contato, cache_bruto, status, observacoes)
            VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(payload.band_id)
        .bind(payload.data)
        .bind(&payload.local)
        .bind(&payload.contato)
        .bind(payload.cache_bruto)
        .bind(status.as_str())
        .bind(&payload.observacoes)
        .execute(&mut *conn)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Created show {id} with status {status}");
        get(id, &mut *conn).await
    }

    pub async fn update(&self, id: i64, payload: UpdateShow) -> Result<Show> {
        let result = sqlx::query(
            "UPDATE show SET data = COALESCE(?, data), local = COALESCE(?, local),
            contato = COALESCE(?, contato), cache_bruto = COALESCE(?, cache_bruto),
            status = COALESCE(?, status), observacoes = COALESCE(?, observacoes),
            modified = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(payload.data)
        .bind(&payload.local)
        .bind(&payload.contato)
        .bind(payload.cache_bruto)
        .bind(payload.status.map(|s| s.as_str()))
        .bind(&payload.observacoes)
        .bind(id)
        .execute(&self.executor)
        .await?;

        if result.rows_affected() == 0 {
            Err(Error::not_found("show", id))
        } else {
            self.get(id).await
        }
    }

    /// Updates each show on its own, failures are reported per id and do not stop the rest.
    pub async fn set_status_many(&self, ids: &[i64], status: ShowStatus) -> BulkStatusReport {
        let mut report = BulkStatusReport::default();
        for &id in ids {
            let res = sqlx::query(
                "UPDATE show SET status = ?, modified = CURRENT_TIMESTAMP WHERE id = ?",
            )
            .bind(status.as_str())
            .bind(id)
            .execute(&self.executor)
            .await;
            match res {
                Ok(r) if r.rows_affected() > 0 => report.updated.push(id),
                Ok(_) => report.errors.push(BulkStatusError {
                    id,
                    error: Error::not_found("show", id).to_string(),
                }),
                Err(e) => {
                    warn!("Status update of show {id} failed: {e}");
                    report.errors.push(BulkStatusError {
                        id,
                        error: Error::from(e).to_string(),
                    })
                }
            }
        }
        debug!(
            "Bulk status {status}: {} updated, {} failed",
            report.updated.len(),
            report.errors.len()
        );
        report
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM show")
            .fetch_one(&self.executor)
            .await?;
        Ok(count)
    }

    pub async fn list(&self, params: ListingParams) -> Result<Vec<ShowShort>> {
        let order = params.ordering(VALID_ORDER_FIELDS, "data")?;
        let records = sqlx::query_as::<_, ShowShort>(&format!(
            "{SHORT_SELECT} {order} LIMIT ? OFFSET ?"
        ))
        .bind(params.limit())
        .bind(params.offset)
        .fetch(&self.executor)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }

    pub async fn list_by_band(&self, params: ListingParams, band_id: i64) -> Result<Vec<ShowShort>> {
        let order = params.ordering(VALID_ORDER_FIELDS, "data")?;
        let records = sqlx::query_as::<_, ShowShort>(&format!(
            "{SHORT_SELECT} WHERE band_id = ? {order} LIMIT ? OFFSET ?"
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
        let res = sqlx::query("DELETE FROM show WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if res.rows_affected() == 0 {
            Err(Error::not_found("show", id))
        } else {
            Ok(())
        }
    }

    pub async fn get(&self, id: i64) -> Result<Show> {
        get(id, &self.executor).await
    }
}

async fn get<'c, E>(id: i64, executor: E) -> Result<Show>
where
    E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    sqlx::query_as::<_, Show>("SELECT * FROM show WHERE id = ?")
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::not_found("show", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_validation() {
        let show = CreateShow {
            band_id: 1,
            data: time::Date::from_calendar_date(2026, time::Month::May, 1).unwrap(),
            local: "".to_string(),
            contato: None,
            cache_bruto: Some(-10.0),
            status: None,
            observacoes: None,
        };
        let report = show.validate().unwrap_err();
        let fields: Vec<String> = report.iter().map(|(path, _)| path.to_string()).collect();
        assert!(fields.iter().any(|f| f == "local"));
        assert!(fields.iter().any(|f| f == "cache_bruto"));
    }

    #[test]
    fn test_bulk_update_deserialization() {
        let update: BulkStatusUpdate =
            serde_json::from_str(r#"{"ids": [1, 2], "status": "confirmado"}"#).unwrap();
        assert_eq!(update.ids, vec![1, 2]);
        assert_eq!(update.status, ShowStatus::Confirmed);
        assert!(update.validate().is_ok());

        let empty = BulkStatusUpdate {
            ids: vec![],
            status: ShowStatus::Cancelled,
        };
        assert!(empty.validate().is_err());
    }
}
