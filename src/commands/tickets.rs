use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;

use super::CommandResult;
use crate::analyzer::mapping::{
    generic_to_installation, initial_state, initial_status, installation_to_generic,
};
use crate::analyzer::normalizer::normalize;
use crate::analyzer::overdue::{overdue_level, OverdueLevel, Seuils};
use crate::error::AppError;
use crate::parser::deserializers::non_empty;
use crate::parser::location::requires_region_selection;
use crate::parser::status::{fold_status, Category, InstallationStatus, TicketStatus, WorkflowState};
use crate::parser::types::{
    HistoryAction, HistoryEntry, NewTicket, NormalizedTicket, RawTicket, TicketInsert,
};
use crate::parser::validation::validate_new_ticket;
use crate::store::{TicketQuery, TicketStore};

/// Filtres d'une vue de tickets.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketFilter {
    pub category: Option<Category>,
    /// Statut dans le vocabulaire de la vue : installation pour la vue
    /// installation, générique pour la vue réclamation.
    pub status: Option<String>,
    /// Seuil minimal franchi.
    pub overdue: Option<OverdueLevel>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

impl TicketFilter {
    fn to_query(&self) -> TicketQuery {
        TicketQuery {
            created_from: self.date_from,
            created_to: self.date_to,
            search: self.search.clone(),
            ids: None,
        }
    }
}

fn matches_status(ticket: &NormalizedTicket, view: Option<Category>, wanted: &str) -> bool {
    let wanted = fold_status(wanted);
    if wanted.is_empty() {
        return true;
    }
    let own = fold_status(ticket.state.status_str()) == wanted;
    let generic = fold_status(ticket.statut_generique.as_str()) == wanted;
    match view {
        Some(Category::Installation) => own,
        Some(Category::Reclamation) => generic,
        None => own || generic,
    }
}

/// Filtres appliqués après normalisation (catégorie, statut, retard).
pub fn matches_filter(
    ticket: &NormalizedTicket,
    filter: &TicketFilter,
    now: DateTime<Utc>,
    seuils: &Seuils,
) -> bool {
    if filter.category.is_some_and(|c| ticket.category() != c) {
        return false;
    }
    if let Some(status) = filter.status.as_deref() {
        if !matches_status(ticket, filter.category, status) {
            return false;
        }
    }
    if let Some(min) = filter.overdue {
        if !overdue_level(ticket, now, seuils).is_some_and(|level| level >= min) {
            return false;
        }
    }
    true
}

/// Lignes brutes retenues par le filtre, dans l'ordre du store.
pub fn fetch_filtered_raw<S: TicketStore + ?Sized>(
    store: &S,
    filter: &TicketFilter,
    now: DateTime<Utc>,
    seuils: &Seuils,
) -> Result<Vec<RawTicket>, AppError> {
    let raws = store.fetch_raw_tickets(&filter.to_query())?;
    Ok(raws
        .into_iter()
        .filter(|raw| matches_filter(&normalize(raw), filter, now, seuils))
        .collect())
}

pub fn fetch_tickets<S: TicketStore + ?Sized>(
    store: &S,
    filter: &TicketFilter,
    now: DateTime<Utc>,
    seuils: &Seuils,
) -> Result<Vec<NormalizedTicket>, AppError> {
    let raws = store.fetch_raw_tickets(&filter.to_query())?;
    let total = raws.len();
    let tickets: Vec<NormalizedTicket> = raws
        .iter()
        .map(normalize)
        .filter(|t| matches_filter(t, filter, now, seuils))
        .collect();
    log::debug!("fetch_tickets: {}/{} ticket(s) retenus", tickets.len(), total);
    Ok(tickets)
}

/// Écrit `requested` ; si la base refuse la valeur, réessaie avec en_cours.
/// Retourne le statut générique effectivement enregistré.
fn write_with_fallback<F>(
    id: i64,
    requested: TicketStatus,
    warnings: &mut Vec<String>,
    mut write: F,
) -> Result<TicketStatus, AppError>
where
    F: FnMut(TicketStatus) -> Result<(), AppError>,
{
    const REPLI: TicketStatus = TicketStatus::EnCours;
    match write(requested) {
        Ok(()) => Ok(requested),
        Err(e) if e.is_schema_mismatch() && requested != REPLI => {
            log::warn!(
                "ticket {}: statut '{}' refusé par la base ({}), repli sur '{}'",
                id,
                requested,
                e,
                REPLI
            );
            write(REPLI)?;
            warnings.push(format!(
                "Statut '{}' non accepté par la base, enregistré comme '{}'",
                requested, REPLI
            ));
            Ok(REPLI)
        }
        Err(e) => Err(e),
    }
}

/// L'écriture a eu lieu : un échec de l'historique ne devient qu'un avertissement.
fn append_audit<S: TicketStore + ?Sized>(store: &S, entry: &HistoryEntry, warnings: &mut Vec<String>) {
    if let Err(e) = store.append_history(entry) {
        log::warn!(
            "ticket {}: historique '{}' non enregistré: {}",
            entry.ticket_id,
            entry.action.as_str(),
            e
        );
        warnings.push(format!("Statut mis à jour mais historique non enregistré : {}", e));
    }
}

fn into_result(outcome: Result<CommandResult, AppError>, id: i64) -> CommandResult {
    outcome.unwrap_or_else(|e| {
        log::error!("ticket {}: mise à jour refusée: {}", id, e);
        CommandResult::failed(e.to_string())
    })
}

/// Change le statut générique d'un ticket.
/// Pour une installation, le statut d'installation n'est réaligné que si le
/// statut générique demandé ne correspond plus au statut d'installation courant.
pub fn update_ticket_status<S: TicketStore + ?Sized>(
    store: &S,
    id: i64,
    new_status: TicketStatus,
    actor: &str,
    now: DateTime<Utc>,
) -> CommandResult {
    into_result(apply_ticket_status(store, id, new_status, actor, now), id)
}

fn apply_ticket_status<S: TicketStore + ?Sized>(
    store: &S,
    id: i64,
    new_status: TicketStatus,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<CommandResult, AppError> {
    let current = normalize(&store.get_raw_ticket(id)?);
    let from = current.statut_generique;
    if from == new_status {
        return Ok(CommandResult::ok(format!("Statut inchangé : {}", from)));
    }

    let mut warnings = Vec::new();
    let written = match current.state {
        WorkflowState::Reclamation(_) => write_with_fallback(id, new_status, &mut warnings, |s| {
            let closed_at = (s == TicketStatus::Ferme).then_some(now);
            store.write_status(id, s, closed_at, now)
        })?,
        WorkflowState::Installation(inst) => {
            // Suit le statut générique réellement écrit, repli compris.
            let aligned = |generic: TicketStatus| {
                if installation_to_generic(inst) == generic {
                    inst
                } else {
                    generic_to_installation(generic)
                }
            };
            let written = write_with_fallback(id, new_status, &mut warnings, |s| {
                let target = aligned(s);
                let closed_at = target.is_terminal().then_some(now);
                store.write_installation_status(id, target, s, closed_at, now)
            })?;
            let target = aligned(written);
            if target != inst {
                let entry = HistoryEntry::new(id, HistoryAction::InstallationStatusChange, actor, now)
                    .transition(Some(inst.as_str()), target.as_str());
                append_audit(store, &entry, &mut warnings);
            }
            written
        }
    };

    let entry = HistoryEntry::new(id, HistoryAction::StatusChange, actor, now)
        .transition(Some(from.as_str()), written.as_str());
    append_audit(store, &entry, &mut warnings);

    log::info!("ticket {}: {} -> {} ({})", id, from, written, actor);
    Ok(CommandResult::ok(format!("Statut mis à jour : {}", written)).with_warnings(warnings))
}

/// Change le statut d'installation et le statut générique qui en découle.
pub fn update_installation_status<S: TicketStore + ?Sized>(
    store: &S,
    id: i64,
    new_status: InstallationStatus,
    actor: &str,
    now: DateTime<Utc>,
) -> CommandResult {
    into_result(apply_installation_status(store, id, new_status, actor, now), id)
}

fn apply_installation_status<S: TicketStore + ?Sized>(
    store: &S,
    id: i64,
    new_status: InstallationStatus,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<CommandResult, AppError> {
    let current = normalize(&store.get_raw_ticket(id)?);
    let WorkflowState::Installation(from) = current.state else {
        return Err(AppError::Validation(format!(
            "Le ticket {} n'est pas une installation",
            current.ticket_number
        )));
    };
    if from == new_status {
        return Ok(CommandResult::ok(format!("Statut inchangé : {}", from)));
    }

    let mut warnings = Vec::new();
    let closed_at = new_status.is_terminal().then_some(now);
    write_with_fallback(id, installation_to_generic(new_status), &mut warnings, |generic| {
        store.write_installation_status(id, new_status, generic, closed_at, now)
    })?;

    let entry = HistoryEntry::new(id, HistoryAction::InstallationStatusChange, actor, now)
        .transition(Some(from.as_str()), new_status.as_str());
    append_audit(store, &entry, &mut warnings);

    log::info!("installation {}: {} -> {} ({})", id, from, new_status, actor);
    Ok(CommandResult::ok(format!("Statut d'installation mis à jour : {}", new_status))
        .with_warnings(warnings))
}

/// `TKT-<millisecondes>-<0..999>`
pub fn generate_ticket_number(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("TKT-{}-{}", now.timestamp_millis(), suffix)
}

/// Crée un ticket après validation et contrôle de doublon.
pub fn create_ticket<S: TicketStore + ?Sized>(
    store: &S,
    form: &NewTicket,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<NormalizedTicket, AppError> {
    let category = form.category.unwrap_or(Category::Reclamation);

    let errors = validate_new_ticket(form, category);
    if !errors.is_empty() {
        let detail: Vec<String> = errors
            .iter()
            .map(|e| format!("{} : {}", e.field, e.message))
            .collect();
        return Err(AppError::Validation(detail.join(", ")));
    }

    let subscriber = form.subscriber_number.trim();
    if !store.find_open_by_subscriber(subscriber)?.is_empty() {
        return Err(AppError::DuplicateTicket(subscriber.to_string()));
    }

    let subscription_type = form.subscription_type.trim();
    let wilaya_code = form.wilaya_code.trim();
    // Le statut générique suit le type d'abonnement quelle que soit la catégorie.
    let status = initial_status(subscription_type);
    let state = initial_state(category, subscription_type);
    let (installation_status, complaint_type) = match state {
        WorkflowState::Reclamation(_) => (
            None,
            non_empty(form.complaint_type.as_deref()).map(|c| c.trim().to_string()),
        ),
        WorkflowState::Installation(inst) => (Some(inst), None),
    };

    let insert = TicketInsert {
        ticket_number: generate_ticket_number(now),
        category,
        status,
        installation_status,
        complaint_type,
        client_name: non_empty(form.client_name.as_deref()).map(|c| c.trim().to_string()),
        phone: form.phone.trim().to_string(),
        subscriber_number: subscriber.to_string(),
        subscription_type: subscription_type.to_string(),
        wilaya_code: wilaya_code.to_string(),
        region_id: if requires_region_selection(None, Some(wilaya_code)) {
            form.region_id
        } else {
            None
        },
        problem_description: non_empty(form.problem_description.as_deref())
            .map(|d| d.trim().to_string()),
        created_at: now,
        created_by_name: actor.to_string(),
    };

    let id = store.insert_ticket(&insert)?;
    log::info!("ticket {} créé ({}, {})", insert.ticket_number, category, state);

    let entry = HistoryEntry::new(id, HistoryAction::Created, actor, now)
        .transition(None, state.status_str())
        .with_notes(format!("Ticket {} créé", insert.ticket_number));
    if let Err(e) = store.append_history(&entry) {
        log::warn!("ticket {}: historique de création non enregistré: {}", id, e);
    }

    Ok(normalize(&store.get_raw_ticket(id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::{ts, FaultyStore};
    use crate::db::setup::init_in_memory;
    use crate::state::AppState;

    fn store() -> AppState {
        AppState::new(init_in_memory().unwrap())
    }

    fn form(category: Category, subscriber: &str) -> NewTicket {
        NewTicket {
            category: Some(category),
            client_name: Some("  Sidi  ".to_string()),
            phone: "22245112233".to_string(),
            subscriber_number: subscriber.to_string(),
            subscription_type: "FTTH".to_string(),
            complaint_type: Some("coupure".to_string()),
            wilaya_code: "NDB".to_string(),
            region_id: Some(3),
            problem_description: None,
        }
    }

    #[test]
    fn test_generate_ticket_number() {
        let n = generate_ticket_number(ts(0));
        let parts: Vec<&str> = n.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TKT");
        assert_eq!(parts[1], ts(0).timestamp_millis().to_string());
        assert!(parts[2].parse::<u16>().unwrap() < 1000);
    }

    #[test]
    fn test_create_reclamation() {
        let s = store();
        let t = create_ticket(&s, &form(Category::Reclamation, "DAB100"), "agent", ts(0)).unwrap();
        assert_eq!(t.state, WorkflowState::Reclamation(TicketStatus::Assigne));
        assert_eq!(t.client_name.as_deref(), Some("Sidi"));
        assert_eq!(t.region_id, None);
        let history = s.get_history(t.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, HistoryAction::Created);
    }

    #[test]
    fn test_create_installation_ignore_type_plainte() {
        let s = store();
        let mut f = form(Category::Installation, "DAB200");
        f.wilaya_code = "NKC".to_string();
        let t = create_ticket(&s, &f, "agent", ts(0)).unwrap();
        assert_eq!(t.state, WorkflowState::Installation(InstallationStatus::Materiel));
        assert_eq!(t.statut_generique, TicketStatus::Assigne);
        assert_eq!(t.complaint_type, None);
        assert_eq!(t.region_id, Some(3));
    }

    #[test]
    fn test_create_installation_statut_generique_selon_service() {
        let s = store();
        for (subscriber, service, expected) in [
            ("DAB210", "SAWI", TicketStatus::EnCours),
            ("DAB211", "LTE", TicketStatus::Nouveau),
            ("DAB212", "BLR", TicketStatus::Assigne),
        ] {
            let mut f = form(Category::Installation, subscriber);
            f.subscription_type = service.to_string();
            let t = create_ticket(&s, &f, "agent", ts(0)).unwrap();
            let raw = s.get_raw_ticket(t.id).unwrap();
            assert_eq!(raw.status.as_deref(), Some(expected.as_str()), "{}", service);
            assert_eq!(raw.installation_status.as_deref(), Some("matériel"), "{}", service);
            assert_eq!(t.state, WorkflowState::Installation(InstallationStatus::Materiel));
            assert_eq!(t.statut_generique, expected);
        }
    }

    #[test]
    fn test_create_validation_toutes_erreurs() {
        let s = store();
        let mut f = form(Category::Reclamation, "X1");
        f.phone = "abc".to_string();
        f.complaint_type = None;
        let err = create_ticket(&s, &f, "agent", ts(0)).unwrap_err();
        match err {
            AppError::Validation(msg) => {
                assert!(msg.contains("subscriberNumber"));
                assert!(msg.contains("phone"));
                assert!(msg.contains("complaintType"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_create_doublon_refuse_tant_que_ouvert() {
        let s = store();
        let first = create_ticket(&s, &form(Category::Reclamation, "DAB300"), "agent", ts(0)).unwrap();
        let err = create_ticket(&s, &form(Category::Reclamation, "dab300"), "agent", ts(1)).unwrap_err();
        assert!(matches!(err, AppError::DuplicateTicket(_)));

        assert!(update_ticket_status(&s, first.id, TicketStatus::Ferme, "agent", ts(2)).success);
        assert!(create_ticket(&s, &form(Category::Reclamation, "DAB300"), "agent", ts(3)).is_ok());
    }

    #[test]
    fn test_update_status_ferme_puis_rouvert() {
        let s = store();
        let t = create_ticket(&s, &form(Category::Reclamation, "DAB400"), "agent", ts(0)).unwrap();

        let r = update_ticket_status(&s, t.id, TicketStatus::Ferme, "agent", ts(5));
        assert!(r.success);
        assert!(r.warnings.is_empty());
        let closed = normalize(&s.get_raw_ticket(t.id).unwrap());
        assert_eq!(closed.closed_at, Some(ts(5)));

        assert!(update_ticket_status(&s, t.id, TicketStatus::EnCours, "agent", ts(6)).success);
        let reopened = normalize(&s.get_raw_ticket(t.id).unwrap());
        assert_eq!(reopened.closed_at, None);

        let history = s.get_history(t.id).unwrap();
        assert_eq!(history[0].from_status.as_deref(), Some("fermé"));
        assert_eq!(history[0].to_status.as_deref(), Some("en_cours"));
        assert_eq!(history[0].changed_by_name, "agent");
    }

    #[test]
    fn test_update_status_ticket_absent() {
        let r = update_ticket_status(&store(), 77, TicketStatus::Ferme, "agent", ts(0));
        assert!(!r.success);
        assert!(r.message.contains("77"));
    }

    #[test]
    fn test_update_installation_status() {
        let s = store();
        let t = create_ticket(&s, &form(Category::Installation, "DAB500"), "agent", ts(0)).unwrap();

        let r = update_installation_status(&s, t.id, InstallationStatus::Extension, "tech", ts(2));
        assert!(r.success);
        let after = normalize(&s.get_raw_ticket(t.id).unwrap());
        assert_eq!(after.state, WorkflowState::Installation(InstallationStatus::Extension));
        assert_eq!(after.statut_generique, TicketStatus::EnCours);
        assert_eq!(after.closed_at, None);

        update_installation_status(&s, t.id, InstallationStatus::Installe, "tech", ts(3));
        let done = normalize(&s.get_raw_ticket(t.id).unwrap());
        assert_eq!(done.statut_generique, TicketStatus::Ferme);
        assert_eq!(done.closed_at, Some(ts(3)));
    }

    #[test]
    fn test_update_installation_sur_reclamation_refuse() {
        let s = store();
        let t = create_ticket(&s, &form(Category::Reclamation, "DAB600"), "agent", ts(0)).unwrap();
        let r = update_installation_status(&s, t.id, InstallationStatus::Installe, "tech", ts(1));
        assert!(!r.success);
    }

    #[test]
    fn test_statut_generique_sur_installation_realigne() {
        let s = store();
        let t = create_ticket(&s, &form(Category::Installation, "DAB700"), "agent", ts(0)).unwrap();
        update_installation_status(&s, t.id, InstallationStatus::Extension, "tech", ts(1));

        // extension est déjà en_cours côté générique : rien à réaligner
        let r = update_ticket_status(&s, t.id, TicketStatus::EnCours, "agent", ts(2));
        assert_eq!(r.message, "Statut inchangé : en_cours");

        update_ticket_status(&s, t.id, TicketStatus::Ferme, "agent", ts(3));
        let after = normalize(&s.get_raw_ticket(t.id).unwrap());
        assert_eq!(after.state, WorkflowState::Installation(InstallationStatus::Installe));
        assert_eq!(after.closed_at, Some(ts(3)));
    }

    #[test]
    fn test_repli_en_cours_si_statut_refuse() {
        let s = store();
        let t = create_ticket(&s, &form(Category::Reclamation, "DAB800"), "agent", ts(0)).unwrap();
        let faulty = FaultyStore::new(&s).reject_status(TicketStatus::Optimisation);

        let r = update_ticket_status(&faulty, t.id, TicketStatus::Optimisation, "agent", ts(1));
        assert!(r.success);
        assert_eq!(r.warnings.len(), 1);
        assert!(r.warnings[0].contains("en_cours"));
        let after = normalize(&s.get_raw_ticket(t.id).unwrap());
        assert_eq!(after.statut_generique, TicketStatus::EnCours);
        assert_eq!(s.get_history(t.id).unwrap()[0].to_status.as_deref(), Some("en_cours"));
    }

    #[test]
    fn test_repli_sur_installation_garde_les_statuts_coherents() {
        let s = store();
        let t = create_ticket(&s, &form(Category::Installation, "DAB850"), "agent", ts(0)).unwrap();
        let faulty = FaultyStore::new(&s).reject_status(TicketStatus::Ferme);

        let r = update_ticket_status(&faulty, t.id, TicketStatus::Ferme, "agent", ts(1));
        assert!(r.success);
        assert_eq!(r.warnings.len(), 1);
        let after = normalize(&s.get_raw_ticket(t.id).unwrap());
        assert_eq!(after.statut_generique, TicketStatus::EnCours);
        assert_eq!(
            after.state,
            WorkflowState::Installation(InstallationStatus::EquipeInstallation)
        );
        assert_eq!(installation_to_generic(InstallationStatus::EquipeInstallation), after.statut_generique);
        assert_eq!(after.closed_at, None);

        let history = s.get_history(t.id).unwrap();
        assert_eq!(history[0].to_status.as_deref(), Some("en_cours"));
        assert_eq!(history[1].to_status.as_deref(), Some("équipe_installation"));
    }

    #[test]
    fn test_historique_en_echec_succes_partiel() {
        let s = store();
        let t = create_ticket(&s, &form(Category::Reclamation, "DAB900"), "agent", ts(0)).unwrap();
        let faulty = FaultyStore::new(&s).failing_history();

        let r = update_ticket_status(&faulty, t.id, TicketStatus::Paiement, "agent", ts(1));
        assert!(r.success);
        assert_eq!(r.warnings.len(), 1);
        let after = normalize(&s.get_raw_ticket(t.id).unwrap());
        assert_eq!(after.statut_generique, TicketStatus::Paiement);
        assert_eq!(s.get_history(t.id).unwrap().len(), 1);
    }

    #[test]
    fn test_store_indisponible_echec() {
        let s = AppState::uninitialized();
        let r = update_ticket_status(&s, 1, TicketStatus::Ferme, "agent", ts(0));
        assert!(!r.success);
        assert!(r.message.contains("indisponible"));
    }

    #[test]
    fn test_fetch_tickets_filtres() {
        let s = store();
        let rec = create_ticket(&s, &form(Category::Reclamation, "DAB1"), "agent", ts(0)).unwrap();
        let inst = create_ticket(&s, &form(Category::Installation, "DAB2"), "agent", ts(1)).unwrap();
        update_installation_status(&s, inst.id, InstallationStatus::Extension, "tech", ts(2));
        let seuils = Seuils::default();
        let now = ts(30);

        let all = fetch_tickets(&s, &TicketFilter::default(), now, &seuils).unwrap();
        assert_eq!(all.len(), 2);

        let installs = TicketFilter {
            category: Some(Category::Installation),
            status: Some("Extension".to_string()),
            ..Default::default()
        };
        let found = fetch_tickets(&s, &installs, now, &seuils).unwrap();
        assert_eq!(found.iter().map(|t| t.id).collect::<Vec<_>>(), vec![inst.id]);

        // vue réclamation : l'installation n'apparaît que via son statut générique
        let generic = TicketFilter {
            status: Some("en_cours".to_string()),
            ..Default::default()
        };
        assert_eq!(fetch_tickets(&s, &generic, now, &seuils).unwrap().len(), 1);

        let late = TicketFilter {
            overdue: Some(OverdueLevel::Alerte),
            ..Default::default()
        };
        let late_ids: Vec<i64> = fetch_tickets(&s, &late, now, &seuils)
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(late_ids.len(), 2);
        assert!(late_ids.contains(&rec.id));

        let critical = TicketFilter {
            overdue: Some(OverdueLevel::Critique),
            ..Default::default()
        };
        assert!(fetch_tickets(&s, &critical, now, &seuils).unwrap().is_empty());
    }
}
