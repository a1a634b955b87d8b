use rusqlite::ffi;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erreur d'entrée/sortie: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erreur CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Erreur SQLite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Erreur de sérialisation: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Données invalides: {0}")]
    Validation(String),

    #[error("Base de tickets indisponible: {0}")]
    StoreUnavailable(String),

    #[error("Statut refusé par la base: {0}")]
    SchemaMismatch(String),

    #[error("Ticket introuvable: {0}")]
    TicketNotFound(i64),

    #[error("Un ticket ouvert existe déjà pour l'abonné {0}")]
    DuplicateTicket(String),

    #[error("{0}")]
    Custom(String),
}

impl AppError {
    /// Classe une erreur SQLite selon la taxonomie du store.
    /// `ticket_id` permet de transformer `QueryReturnedNoRows` en `TicketNotFound`.
    pub fn from_store(err: rusqlite::Error, ticket_id: Option<i64>) -> Self {
        match &err {
            rusqlite::Error::QueryReturnedNoRows => match ticket_id {
                Some(id) => AppError::TicketNotFound(id),
                None => AppError::Sqlite(err),
            },
            rusqlite::Error::SqliteFailure(code, msg) => match code.code {
                rusqlite::ErrorCode::ConstraintViolation
                    if code.extended_code == ffi::SQLITE_CONSTRAINT_CHECK =>
                {
                    AppError::SchemaMismatch(
                        msg.clone().unwrap_or_else(|| "contrainte CHECK".to_string()),
                    )
                }
                rusqlite::ErrorCode::DatabaseBusy
                | rusqlite::ErrorCode::DatabaseLocked
                | rusqlite::ErrorCode::CannotOpen => AppError::StoreUnavailable(err.to_string()),
                _ => AppError::Sqlite(err),
            },
            _ => AppError::Sqlite(err),
        }
    }

    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, AppError::SchemaMismatch(_))
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
