use crate::analyzer::mapping::{generic_to_installation, installation_to_generic};
use crate::parser::deserializers::{non_empty, parse_timestamp_opt};
use crate::parser::status::{Category, InstallationStatus, TicketStatus, WorkflowState};
use crate::parser::types::{NormalizedTicket, RawTicket};

/// Catégorie effective d'un ticket.
/// Ordre : catégorie explicite > statut d'installation renseigné > type de
/// réclamation absent (installation) > réclamation.
/// Une catégorie explicite hors vocabulaire est traitée comme absente.
pub fn resolve_category(raw: &RawTicket) -> Category {
    if let Some(cat) = non_empty(raw.category.as_deref()).and_then(Category::parse_lenient) {
        return cat;
    }
    if non_empty(raw.installation_status.as_deref()).is_some() {
        return Category::Installation;
    }
    if non_empty(raw.complaint_type.as_deref()).is_none() {
        return Category::Installation;
    }
    Category::Reclamation
}

/// Statut d'installation effectif : la valeur stockée si elle est reconnue,
/// sinon déduite du statut générique (matériel par défaut).
pub fn resolve_installation_status(raw: &RawTicket) -> InstallationStatus {
    if let Some(stored) = non_empty(raw.installation_status.as_deref()) {
        match InstallationStatus::parse_lenient(stored) {
            Some(status) => return status,
            None => log::debug!(
                "ticket {}: statut d'installation inconnu '{}', déduit du statut générique",
                raw.id,
                stored
            ),
        }
    }
    raw.status
        .as_deref()
        .and_then(TicketStatus::parse_lenient)
        .map(generic_to_installation)
        .unwrap_or(InstallationStatus::Materiel)
}

/// Normalise une ligne brute. Totale et déterministe : ne lit que `raw`.
pub fn normalize(raw: &RawTicket) -> NormalizedTicket {
    let category = resolve_category(raw);
    let generic = raw.status.as_deref().and_then(TicketStatus::parse_lenient);
    if generic.is_none() && non_empty(raw.status.as_deref()).is_some() {
        log::debug!("ticket {}: statut générique inconnu '{:?}'", raw.id, raw.status);
    }

    let (state, statut_generique) = match category {
        Category::Installation => {
            let inst = resolve_installation_status(raw);
            (
                WorkflowState::Installation(inst),
                generic.unwrap_or_else(|| installation_to_generic(inst)),
            )
        }
        Category::Reclamation => {
            let status = generic.unwrap_or(TicketStatus::Nouveau);
            (WorkflowState::Reclamation(status), status)
        }
    };

    let created_at = parse_timestamp_opt(raw.created_at.as_deref());
    if created_at.is_none() {
        log::debug!("ticket {}: created_at illisible {:?}", raw.id, raw.created_at);
    }

    NormalizedTicket {
        id: raw.id,
        ticket_number: raw.ticket_number.clone(),
        state,
        statut_generique,
        complaint_type: non_empty(raw.complaint_type.as_deref()).map(str::to_string),
        created_at,
        closed_at: parse_timestamp_opt(raw.closed_at.as_deref()),
        client_name: raw.client_name.clone(),
        phone: raw.phone.clone(),
        subscriber_number: raw.subscriber_number.clone(),
        subscription_type: raw.subscription_type.clone(),
        wilaya_code: raw.wilaya_code.clone(),
        wilaya_name: raw.wilaya_name.clone(),
        region_id: raw.region_id,
        region_name: raw.region_name.clone(),
    }
}

pub fn normalize_all(raws: &[RawTicket]) -> Vec<NormalizedTicket> {
    raws.iter().map(normalize).collect()
}
