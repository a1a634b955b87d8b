use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::tickets::{fetch_filtered_raw, TicketFilter};
use crate::analyzer::overdue::Seuils;
use crate::error::AppError;
use crate::export::export_tickets_csv;
use crate::store::TicketStore;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub path: String,
    pub ticket_count: usize,
    pub size_bytes: u64,
    pub duration_ms: u64,
}

/// Exporte en CSV les tickets de la vue filtrée vers `path`.
pub fn export_tickets<S: TicketStore + ?Sized>(
    store: &S,
    filter: &TicketFilter,
    path: String,
    seuils: &Seuils,
    now: DateTime<Utc>,
) -> Result<ExportResult, AppError> {
    let start = Instant::now();

    let tickets = fetch_filtered_raw(store, filter, now, seuils)?;
    let bytes = export_tickets_csv(&tickets)?;
    std::fs::write(&path, &bytes)?;

    log::info!("export CSV : {} ticket(s) vers {}", tickets.len(), path);
    Ok(ExportResult {
        path,
        ticket_count: tickets.len(),
        size_bytes: bytes.len() as u64,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}
