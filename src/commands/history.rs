use chrono::{DateTime, Utc};
use serde::Serialize;

use super::CommandResult;
use crate::error::AppError;
use crate::parser::types::{HistoryAction, HistoryEntry};
use crate::store::TicketStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryCounts {
    pub replies: usize,
    pub actions: usize,
}

/// Ajoute une réponse (commentaire) au fil du ticket.
pub fn add_reply<S: TicketStore + ?Sized>(
    store: &S,
    ticket_id: i64,
    text: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> CommandResult {
    let text = text.trim();
    if text.is_empty() {
        return CommandResult::failed("La réponse ne peut pas être vide");
    }
    let outcome = store.get_raw_ticket(ticket_id).and_then(|_| {
        let entry = HistoryEntry::new(ticket_id, HistoryAction::Reply, actor, now).with_notes(text);
        store.append_history(&entry)
    });
    match outcome {
        Ok(_) => CommandResult::ok("Réponse ajoutée"),
        Err(e) => {
            log::error!("ticket {}: réponse non enregistrée: {}", ticket_id, e);
            CommandResult::failed(e.to_string())
        }
    }
}

/// Journal des actions, hors réponses, du plus récent au plus ancien.
pub fn get_ticket_history<S: TicketStore + ?Sized>(
    store: &S,
    ticket_id: i64,
) -> Result<Vec<HistoryEntry>, AppError> {
    Ok(store
        .get_history(ticket_id)?
        .into_iter()
        .filter(|e| e.action != HistoryAction::Reply)
        .collect())
}

pub fn get_ticket_comments<S: TicketStore + ?Sized>(
    store: &S,
    ticket_id: i64,
) -> Result<Vec<HistoryEntry>, AppError> {
    Ok(store
        .get_history(ticket_id)?
        .into_iter()
        .filter(|e| e.action == HistoryAction::Reply)
        .collect())
}

pub fn get_history_counts<S: TicketStore + ?Sized>(
    store: &S,
    ticket_id: i64,
) -> Result<HistoryCounts, AppError> {
    let history = store.get_history(ticket_id)?;
    let replies = history
        .iter()
        .filter(|e| e.action == HistoryAction::Reply)
        .count();
    Ok(HistoryCounts {
        replies,
        actions: history.len() - replies,
    })
}
