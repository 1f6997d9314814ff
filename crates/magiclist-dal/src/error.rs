pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Unknown {entity} ids: {ids:?}")]
    InvalidReferences { entity: &'static str, ids: Vec<i64> },

    #[error("Invalid ordinal {0}, must be non-negative")]
    InvalidOrdinal(i64),

    #[error("Invalid order by field: {0}")]
    InvalidOrderByField(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl Error {
    pub(crate) fn not_found(entity: &str, id: i64) -> Self {
        Error::RecordNotFound(format!("{entity} {id}"))
    }
}
