use std::cell::Cell;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::AppError;
use crate::parser::status::{InstallationStatus, TicketStatus};
use crate::parser::types::{HistoryAction, HistoryEntry, RawTicket, TicketInsert};
use crate::store::{TicketQuery, TicketStore};

/// Instant de référence décalé de `hours` heures.
pub fn ts(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 8, 0, 0).unwrap() + Duration::hours(hours)
}

/// Enveloppe un store réel et injecte des pannes ciblées.
pub struct FaultyStore<'a, S: TicketStore> {
    inner: &'a S,
    rejected: Option<TicketStatus>,
    failing_history: bool,
    failing_write_for: Option<i64>,
    pub writes: Cell<usize>,
}

impl<'a, S: TicketStore> FaultyStore<'a, S> {
    pub fn new(inner: &'a S) -> Self {
        FaultyStore {
            inner,
            rejected: None,
            failing_history: false,
            failing_write_for: None,
            writes: Cell::new(0),
        }
    }

    /// Simule une contrainte CHECK héritée qui ignore ce statut.
    pub fn reject_status(mut self, status: TicketStatus) -> Self {
        self.rejected = Some(status);
        self
    }

    pub fn failing_history(mut self) -> Self {
        self.failing_history = true;
        self
    }

    pub fn failing_write_for(mut self, id: i64) -> Self {
        self.failing_write_for = Some(id);
        self
    }

    fn check_write(&self, id: i64, status: TicketStatus) -> Result<(), AppError> {
        if self.failing_write_for == Some(id) {
            return Err(AppError::StoreUnavailable("database is locked".into()));
        }
        if self.rejected == Some(status) {
            return Err(AppError::SchemaMismatch(format!(
                "CHECK constraint failed: status = '{}'",
                status
            )));
        }
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

impl<S: TicketStore> TicketStore for FaultyStore<'_, S> {
    fn fetch_raw_tickets(&self, query: &TicketQuery) -> Result<Vec<RawTicket>, AppError> {
        self.inner.fetch_raw_tickets(query)
    }

    fn get_raw_ticket(&self, id: i64) -> Result<RawTicket, AppError> {
        self.inner.get_raw_ticket(id)
    }

    fn insert_ticket(&self, ticket: &TicketInsert) -> Result<i64, AppError> {
        self.inner.insert_ticket(ticket)
    }

    fn write_status(
        &self,
        id: i64,
        status: TicketStatus,
        closed_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.check_write(id, status)?;
        self.inner.write_status(id, status, closed_at, at)
    }

    fn write_installation_status(
        &self,
        id: i64,
        status: InstallationStatus,
        generic: TicketStatus,
        closed_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.check_write(id, generic)?;
        self.inner
            .write_installation_status(id, status, generic, closed_at, at)
    }

    fn append_history(&self, entry: &HistoryEntry) -> Result<i64, AppError> {
        if self.failing_history {
            return Err(AppError::StoreUnavailable("database is locked".into()));
        }
        self.inner.append_history(entry)
    }

    fn get_history(&self, ticket_id: i64) -> Result<Vec<HistoryEntry>, AppError> {
        self.inner.get_history(ticket_id)
    }

    fn has_history(&self, ticket_id: i64, action: HistoryAction) -> Result<bool, AppError> {
        self.inner.has_history(ticket_id, action)
    }

    fn find_open_by_subscriber(&self, subscriber_number: &str) -> Result<Vec<i64>, AppError> {
        self.inner.find_open_by_subscriber(subscriber_number)
    }
}
