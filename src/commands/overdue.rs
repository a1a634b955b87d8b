use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analyzer::normalizer::{normalize, normalize_all};
use crate::analyzer::overdue::{
    count_overdue_with, is_promotion_candidate, overdue_level, OverdueLevel, Seuils,
    STATUTS_RECLAMATION_PROMOUVABLES,
};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::parser::status::{Category, TicketStatus, WorkflowState};
use crate::parser::types::{HistoryAction, HistoryEntry, NormalizedTicket};
use crate::store::{TicketQuery, TicketStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub success: bool,
    /// Réclamations passées en en_retard.
    pub updated_count: usize,
    /// Notes d'alerte ajoutées à l'historique.
    pub alerts_appended: usize,
    pub message: String,
    pub warnings: Vec<String>,
}

fn action_for(level: OverdueLevel) -> HistoryAction {
    match level {
        OverdueLevel::Alerte => HistoryAction::OverdueAlert,
        OverdueLevel::Critique => HistoryAction::OverdueCritical,
    }
}

/// Nombre de tickets en retard critique, toutes catégories ou une seule.
pub fn get_overdue_count<S: TicketStore + ?Sized>(
    store: &S,
    category: Option<Category>,
    seuils: &Seuils,
    now: DateTime<Utc>,
) -> Result<usize, AppError> {
    let tickets = normalize_all(&store.fetch_raw_tickets(&TicketQuery::default())?);
    Ok(count_overdue_with(&tickets, now, seuils, category))
}

/// Une note par seuil franchi, jamais deux fois la même.
fn append_threshold_notes<S: TicketStore + ?Sized>(
    store: &S,
    ticket: &NormalizedTicket,
    level: OverdueLevel,
    seuils: &Seuils,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<usize, AppError> {
    let mut appended = 0;
    for crossed in [OverdueLevel::Alerte, OverdueLevel::Critique] {
        if crossed > level {
            break;
        }
        let action = action_for(crossed);
        if store.has_history(ticket.id, action)? {
            continue;
        }
        let entry = HistoryEntry::new(ticket.id, action, actor, now).with_notes(format!(
            "Ticket ouvert depuis plus de {} h ({})",
            seuils.hours_for(crossed),
            ticket.state.status_str()
        ));
        store.append_history(&entry)?;
        appended += 1;
    }
    Ok(appended)
}

/// Passe une réclamation éligible en en_retard après relecture de son statut.
/// Retourne `false` si le ticket n'est plus promouvable.
fn promote<S: TicketStore + ?Sized>(
    store: &S,
    ticket: &NormalizedTicket,
    seuils: &Seuils,
    actor: &str,
    now: DateTime<Utc>,
    warnings: &mut Vec<String>,
) -> Result<bool, AppError> {
    // Le statut a pu changer depuis le balayage.
    let current = normalize(&store.get_raw_ticket(ticket.id)?);
    let WorkflowState::Reclamation(from) = current.state else {
        return Ok(false);
    };
    if !STATUTS_RECLAMATION_PROMOUVABLES.contains(&from) {
        log::debug!(
            "ticket {}: statut devenu '{}', promotion abandonnée",
            ticket.ticket_number,
            from
        );
        return Ok(false);
    }

    store.write_status(ticket.id, TicketStatus::EnRetard, None, now)?;

    let entry = HistoryEntry::new(ticket.id, HistoryAction::StatusChange, actor, now)
        .transition(Some(from.as_str()), TicketStatus::EnRetard.as_str())
        .with_notes(format!("Seuil de {} h dépassé", seuils.alerte_heures));
    if let Err(e) = store.append_history(&entry) {
        log::warn!("ticket {}: promotion non journalisée: {}", ticket.ticket_number, e);
        warnings.push(format!(
            "Ticket {} passé en retard mais historique non enregistré : {}",
            ticket.ticket_number, e
        ));
    }
    Ok(true)
}

/// Balaye les tickets non terminés : notes d'alerte par seuil franchi et
/// passage en en_retard des réclamations éligibles.
/// Rejouer la passe sur un stock inchangé n'écrit rien.
pub fn run_overdue_reconciliation<S: TicketStore + ?Sized>(
    store: &S,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> ReconciliationResult {
    let seuils = Seuils::from(config);
    let actor = config.acteur_systeme.as_str();

    let raws = match store.fetch_raw_tickets(&TicketQuery::default()) {
        Ok(raws) => raws,
        Err(e) => {
            log::error!("rapprochement des retards impossible: {}", e);
            return ReconciliationResult {
                success: false,
                updated_count: 0,
                alerts_appended: 0,
                message: e.to_string(),
                warnings: Vec::new(),
            };
        }
    };

    let mut updated_count = 0;
    let mut alerts_appended = 0;
    let mut warnings = Vec::new();

    for ticket in raws.iter().map(normalize).filter(|t| !t.state.is_terminal()) {
        let Some(level) = overdue_level(&ticket, now, &seuils) else {
            continue;
        };
        match append_threshold_notes(store, &ticket, level, &seuils, actor, now) {
            Ok(n) => alerts_appended += n,
            Err(e) => {
                log::warn!("ticket {}: alerte non enregistrée: {}", ticket.ticket_number, e);
                warnings.push(format!("Ticket {} : {}", ticket.ticket_number, e));
            }
        }

        if is_promotion_candidate(&ticket, now, &seuils) {
            match promote(store, &ticket, &seuils, actor, now, &mut warnings) {
                Ok(promoted) => updated_count += usize::from(promoted),
                Err(e) => {
                    log::warn!("ticket {}: promotion en échec: {}", ticket.ticket_number, e);
                    warnings.push(format!("Ticket {} : {}", ticket.ticket_number, e));
                }
            }
        }
    }

    log::info!(
        "rapprochement des retards: {} promotion(s), {} alerte(s), {} avertissement(s)",
        updated_count,
        alerts_appended,
        warnings.len()
    );

    ReconciliationResult {
        success: true,
        updated_count,
        alerts_appended,
        message: format!(
            "{} ticket(s) passé(s) en retard, {} alerte(s) ajoutée(s)",
            updated_count, alerts_appended
        ),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{ts, FaultyStore};
    use crate::commands::tickets::{create_ticket, update_installation_status, update_ticket_status};
    use crate::db::setup::init_in_memory;
    use crate::parser::status::InstallationStatus;
    use crate::parser::types::NewTicket;
    use crate::state::AppState;

    fn form(category: Category, subscriber: &str, service: &str) -> NewTicket {
        NewTicket {
            category: Some(category),
            phone: "22233445".to_string(),
            subscriber_number: subscriber.to_string(),
            subscription_type: service.to_string(),
            complaint_type: Some("coupure".to_string()),
            wilaya_code: "NDB".to_string(),
            ..Default::default()
        }
    }

    /// Réclamation (h0), installation (h1), réclamation injoignable (h2),
    /// réclamation fermée (h3), installation installée (h4).
    fn setup() -> (AppState, Vec<i64>) {
        let s = AppState::new(init_in_memory().unwrap());
        let ids = vec![
            create_ticket(&s, &form(Category::Reclamation, "DAB1", "FTTH"), "agent", ts(0)).unwrap().id,
            create_ticket(&s, &form(Category::Installation, "DAB2", "FTTH"), "agent", ts(1)).unwrap().id,
            create_ticket(&s, &form(Category::Reclamation, "DAB3", "ADSL"), "agent", ts(2)).unwrap().id,
            create_ticket(&s, &form(Category::Reclamation, "DAB4", "ADSL"), "agent", ts(3)).unwrap().id,
            create_ticket(&s, &form(Category::Installation, "DAB5", "BLR"), "agent", ts(4)).unwrap().id,
        ];
        update_ticket_status(&s, ids[2], TicketStatus::Injoignable, "agent", ts(5));
        update_ticket_status(&s, ids[3], TicketStatus::Ferme, "agent", ts(5));
        update_installation_status(&s, ids[4], InstallationStatus::Installe, "tech", ts(5));
        (s, ids)
    }

    fn status_of(s: &AppState, id: i64) -> WorkflowState {
        normalize(&s.get_raw_ticket(id).unwrap()).state
    }

    #[test]
    fn test_avant_seuil_rien() {
        let (s, _) = setup();
        let r = run_overdue_reconciliation(&s, &AppConfig::default(), ts(20));
        assert!(r.success);
        assert_eq!((r.updated_count, r.alerts_appended), (0, 0));
    }

    #[test]
    fn test_seuil_alerte() {
        let (s, ids) = setup();
        let r = run_overdue_reconciliation(&s, &AppConfig::default(), ts(30));
        assert!(r.success);
        assert_eq!(r.updated_count, 1);
        // réclamation + installation, l'injoignable et les terminés sont ignorés
        assert_eq!(r.alerts_appended, 2);
        assert_eq!(status_of(&s, ids[0]), WorkflowState::Reclamation(TicketStatus::EnRetard));
        assert_eq!(status_of(&s, ids[2]), WorkflowState::Reclamation(TicketStatus::Injoignable));

        let history = s.get_history(ids[0]).unwrap();
        let promotion = history
            .iter()
            .find(|e| e.action == HistoryAction::StatusChange)
            .unwrap();
        assert_eq!(promotion.from_status.as_deref(), Some("assigné"));
        assert_eq!(promotion.to_status.as_deref(), Some("en_retard"));
        assert_eq!(promotion.changed_by_name, AppConfig::default().acteur_systeme);
    }

    #[test]
    fn test_rejouer_est_idempotent() {
        let (s, ids) = setup();
        let config = AppConfig::default();
        run_overdue_reconciliation(&s, &config, ts(50));
        let before: Vec<usize> = ids.iter().map(|id| s.get_history(*id).unwrap().len()).collect();

        let again = run_overdue_reconciliation(&s, &config, ts(50));
        assert!(again.success);
        assert_eq!((again.updated_count, again.alerts_appended), (0, 0));
        let after: Vec<usize> = ids.iter().map(|id| s.get_history(*id).unwrap().len()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_seuil_critique_ajoute_une_seule_note() {
        let (s, ids) = setup();
        let config = AppConfig::default();
        let first = run_overdue_reconciliation(&s, &config, ts(30));
        assert_eq!(first.alerts_appended, 2);

        let second = run_overdue_reconciliation(&s, &config, ts(52));
        assert_eq!(second.updated_count, 0);
        assert_eq!(second.alerts_appended, 2);

        for id in &ids[..2] {
            let history = s.get_history(*id).unwrap();
            let critical = history
                .iter()
                .filter(|e| e.action == HistoryAction::OverdueCritical)
                .count();
            assert_eq!(critical, 1);
        }
        assert_eq!(
            status_of(&s, ids[1]),
            WorkflowState::Installation(InstallationStatus::Materiel)
        );
    }

    #[test]
    fn test_echec_par_ticket_non_bloquant() {
        let (s, ids) = setup();
        let faulty = FaultyStore::new(&s).failing_write_for(ids[0]);
        let r = run_overdue_reconciliation(&faulty, &AppConfig::default(), ts(30));
        assert!(r.success);
        assert_eq!(r.updated_count, 0);
        assert_eq!(r.warnings.len(), 1);
        assert_eq!(r.alerts_appended, 2);

        // la passe suivante reprend la promotion sans dupliquer l'alerte
        let r = run_overdue_reconciliation(&s, &AppConfig::default(), ts(31));
        assert_eq!((r.updated_count, r.alerts_appended), (1, 0));
    }

    #[test]
    fn test_store_indisponible() {
        let r = run_overdue_reconciliation(&AppState::uninitialized(), &AppConfig::default(), ts(30));
        assert!(!r.success);
        assert_eq!(r.updated_count, 0);
    }

    #[test]
    fn test_seuils_configures() {
        let (s, ids) = setup();
        let config = AppConfig {
            seuil_alerte_heures: 6,
            seuil_retard_heures: 12,
            ..AppConfig::default()
        };
        let r = run_overdue_reconciliation(&s, &config, ts(8));
        assert_eq!(r.updated_count, 1);
        assert_eq!(status_of(&s, ids[0]), WorkflowState::Reclamation(TicketStatus::EnRetard));
    }

    #[test]
    fn test_get_overdue_count() {
        let (s, _) = setup();
        let seuils = Seuils::default();
        run_overdue_reconciliation(&s, &AppConfig::default(), ts(50));
        assert_eq!(get_overdue_count(&s, None, &seuils, ts(50)).unwrap(), 2);
        assert_eq!(
            get_overdue_count(&s, Some(Category::Installation), &seuils, ts(50)).unwrap(),
            1
        );
        assert_eq!(
            get_overdue_count(&s, Some(Category::Reclamation), &seuils, ts(50)).unwrap(),
            1
        );
    }
}
