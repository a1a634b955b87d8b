//! Contrat du store de tickets.
//!
//! Le moteur de statuts ne parle au stockage qu'au travers de ce trait ;
//! `AppState` (SQLite) en est l'implémentation de production. Aucune méthode
//! n'est transactionnelle vis-à-vis des autres : les opérations composées
//! (`commands::*`) relisent l'état courant avant chaque écriture.

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::parser::status::{InstallationStatus, TicketStatus};
use crate::parser::types::{HistoryAction, HistoryEntry, RawTicket, TicketInsert};

/// Filtres appliqués côté base (avant normalisation).
#[derive(Debug, Clone, Default)]
pub struct TicketQuery {
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    /// Recherche libre : numéro de ticket, téléphone, numéro d'abonné, nom du client.
    pub search: Option<String>,
    pub ids: Option<Vec<i64>>,
}

pub trait TicketStore {
    /// Tickets correspondant à la requête, du plus récent au plus ancien.
    fn fetch_raw_tickets(&self, query: &TicketQuery) -> Result<Vec<RawTicket>, AppError>;

    fn get_raw_ticket(&self, id: i64) -> Result<RawTicket, AppError>;

    fn insert_ticket(&self, ticket: &TicketInsert) -> Result<i64, AppError>;

    /// Écrit le statut générique ; `closed_at` remplace la valeur stockée.
    fn write_status(
        &self,
        id: i64,
        status: TicketStatus,
        closed_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Écrit le statut d'installation et le statut générique qui en découle.
    fn write_installation_status(
        &self,
        id: i64,
        status: InstallationStatus,
        generic: TicketStatus,
        closed_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    fn append_history(&self, entry: &HistoryEntry) -> Result<i64, AppError>;

    /// Historique d'un ticket, du plus récent au plus ancien.
    fn get_history(&self, ticket_id: i64) -> Result<Vec<HistoryEntry>, AppError>;

    fn has_history(&self, ticket_id: i64, action: HistoryAction) -> Result<bool, AppError>;

    /// Identifiants des tickets non fermés d'un abonné (comparaison insensible à la casse).
    fn find_open_by_subscriber(&self, subscriber_number: &str) -> Result<Vec<i64>, AppError>;
}
