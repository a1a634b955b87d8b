use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::sync::Mutex;

use crate::db::{insert, queries};
use crate::error::AppError;
use crate::parser::status::{InstallationStatus, TicketStatus};
use crate::parser::types::{HistoryAction, HistoryEntry, RawTicket, TicketInsert};
use crate::store::{TicketQuery, TicketStore};

pub struct AppState {
    pub db: Mutex<Option<Connection>>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        AppState {
            db: Mutex::new(Some(conn)),
        }
    }

    pub fn uninitialized() -> Self {
        AppState { db: Mutex::new(None) }
    }
}

pub trait DbAccess {
    fn db<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>;

    fn db_mut<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Connection) -> Result<T, rusqlite::Error>;

    /// Comme `db`, avec l'identifiant du ticket visé pour classer "aucune ligne".
    fn db_for<F, T>(&self, ticket_id: i64, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>;
}

impl DbAccess for AppState {
    fn db<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let guard = self
            .db
            .lock()
            .map_err(|e| AppError::StoreUnavailable(format!("Mutex poisoned: {}", e)))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| AppError::StoreUnavailable("Base de données non initialisée".into()))?;
        f(conn).map_err(|e| AppError::from_store(e, None))
    }

    fn db_mut<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Connection) -> Result<T, rusqlite::Error>,
    {
        let mut guard = self
            .db
            .lock()
            .map_err(|e| AppError::StoreUnavailable(format!("Mutex poisoned: {}", e)))?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| AppError::StoreUnavailable("Base de données non initialisée".into()))?;
        f(conn).map_err(|e| AppError::from_store(e, None))
    }

    fn db_for<F, T>(&self, ticket_id: i64, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let guard = self
            .db
            .lock()
            .map_err(|e| AppError::StoreUnavailable(format!("Mutex poisoned: {}", e)))?;
        let conn = guard
            .as_ref()
            .ok_or_else(|| AppError::StoreUnavailable("Base de données non initialisée".into()))?;
        f(conn).map_err(|e| AppError::from_store(e, Some(ticket_id)))
    }
}

impl TicketStore for AppState {
    fn fetch_raw_tickets(&self, query: &TicketQuery) -> Result<Vec<RawTicket>, AppError> {
        self.db(|conn| queries::fetch_raw_tickets(conn, query))
    }

    fn get_raw_ticket(&self, id: i64) -> Result<RawTicket, AppError> {
        self.db_for(id, |conn| queries::get_raw_ticket(conn, id))
    }

    fn insert_ticket(&self, ticket: &TicketInsert) -> Result<i64, AppError> {
        self.db_mut(|conn| insert::insert_ticket(conn, ticket))
    }

    fn write_status(
        &self,
        id: i64,
        status: TicketStatus,
        closed_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.db_for(id, |conn| insert::write_status(conn, id, status, closed_at, at))
    }

    fn write_installation_status(
        &self,
        id: i64,
        status: InstallationStatus,
        generic: TicketStatus,
        closed_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.db_for(id, |conn| {
            insert::write_installation_status(conn, id, status, generic, closed_at, at)
        })
    }

    fn append_history(&self, entry: &HistoryEntry) -> Result<i64, AppError> {
        self.db(|conn| insert::append_history(conn, entry))
    }

    fn get_history(&self, ticket_id: i64) -> Result<Vec<HistoryEntry>, AppError> {
        self.db(|conn| queries::get_history(conn, ticket_id))
    }

    fn has_history(&self, ticket_id: i64, action: HistoryAction) -> Result<bool, AppError> {
        self.db(|conn| queries::has_history(conn, ticket_id, action))
    }

    fn find_open_by_subscriber(&self, subscriber_number: &str) -> Result<Vec<i64>, AppError> {
        self.db(|conn| queries::find_open_by_subscriber(conn, subscriber_number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_non_initialisee() {
        let state = AppState::uninitialized();
        let err = state.fetch_raw_tickets(&TicketQuery::default()).unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
    }

    #[test]
    fn test_ticket_absent() {
        let state = AppState::new(crate::db::setup::init_in_memory().unwrap());
        let err = state.get_raw_ticket(999).unwrap_err();
        assert!(matches!(err, AppError::TicketNotFound(999)));
    }
}
