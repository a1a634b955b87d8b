use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::{Category, InstallationStatus, TicketStatus, WorkflowState};

/// Ligne `tickets` telle que lue dans le store : tout est optionnel et non typé,
/// les enregistrements historiques peuvent ne pas avoir de catégorie.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTicket {
    pub id: i64,
    pub ticket_number: String,
    pub category: Option<String>,
    pub status: Option<String>,
    pub installation_status: Option<String>,
    pub complaint_type: Option<String>,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
    pub client_name: Option<String>,
    pub phone: Option<String>,
    pub subscriber_number: Option<String>,
    pub subscription_type: Option<String>,
    pub wilaya_code: Option<String>,
    pub wilaya_name: Option<String>,
    pub region_id: Option<i64>,
    pub region_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTicket {
    pub id: i64,
    pub ticket_number: String,
    pub state: WorkflowState,
    /// Statut générique, y compris pour une installation (filtre « réclamation »).
    pub statut_generique: TicketStatus,
    pub complaint_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub client_name: Option<String>,
    pub phone: Option<String>,
    pub subscriber_number: Option<String>,
    pub subscription_type: Option<String>,
    pub wilaya_code: Option<String>,
    pub wilaya_name: Option<String>,
    pub region_id: Option<i64>,
    pub region_name: Option<String>,
}

impl NormalizedTicket {
    pub fn category(&self) -> Category {
        self.state.category()
    }

    pub fn is_open(&self) -> bool {
        !self.state.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    StatusChange,
    InstallationStatusChange,
    Reply,
    OverdueAlert,
    OverdueCritical,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "created",
            HistoryAction::StatusChange => "status_change",
            HistoryAction::InstallationStatusChange => "installation_status_change",
            HistoryAction::Reply => "reply",
            HistoryAction::OverdueAlert => "overdue_alert",
            HistoryAction::OverdueCritical => "overdue_critical",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "created" => Some(HistoryAction::Created),
            "status_change" => Some(HistoryAction::StatusChange),
            "installation_status_change" => Some(HistoryAction::InstallationStatusChange),
            "reply" => Some(HistoryAction::Reply),
            "overdue_alert" => Some(HistoryAction::OverdueAlert),
            "overdue_critical" => Some(HistoryAction::OverdueCritical),
            _ => None,
        }
    }
}

/// Entrée du journal d'audit `ticket_history`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Option<i64>,
    pub ticket_id: i64,
    pub action: HistoryAction,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub notes: Option<String>,
    pub changed_by_name: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(ticket_id: i64, action: HistoryAction, actor: &str, at: DateTime<Utc>) -> Self {
        HistoryEntry {
            id: None,
            ticket_id,
            action,
            from_status: None,
            to_status: None,
            notes: None,
            changed_by_name: actor.to_string(),
            created_at: at,
        }
    }

    pub fn transition(mut self, from: Option<&str>, to: &str) -> Self {
        self.from_status = from.map(str::to_string);
        self.to_status = Some(to.to_string());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Formulaire de création d'un ticket.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub category: Option<Category>,
    pub client_name: Option<String>,
    pub phone: String,
    pub subscriber_number: String,
    pub subscription_type: String,
    pub complaint_type: Option<String>,
    pub wilaya_code: String,
    pub region_id: Option<i64>,
    pub problem_description: Option<String>,
}

/// Ligne prête à insérer, après application des règles de création.
#[derive(Debug, Clone)]
pub struct TicketInsert {
    pub ticket_number: String,
    pub category: Category,
    pub status: TicketStatus,
    pub installation_status: Option<InstallationStatus>,
    pub complaint_type: Option<String>,
    pub client_name: Option<String>,
    pub phone: String,
    pub subscriber_number: String,
    pub subscription_type: String,
    pub wilaya_code: String,
    pub region_id: Option<i64>,
    pub problem_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by_name: String,
}
