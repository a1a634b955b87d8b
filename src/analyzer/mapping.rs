//! Passage entre le vocabulaire générique et le vocabulaire installation.
//!
//! Les deux tables ne sont pas réciproques : plusieurs statuts d'installation
//! tombent dans le même statut générique (extension, optimisation,
//! manque_de_materiel → en_cours), si bien que
//! `generic_to_installation(installation_to_generic(x))` ne rend pas toujours `x`.
//! Cette perte est permanente et attendue par les vues qui affichent une
//! installation à travers le filtre réclamation.

use crate::parser::status::{Category, InstallationStatus, TicketStatus, WorkflowState};

const SERVICES_ASSIGNES: &[&str] = &["FTTH", "BLR", "LS/MPLS"];
const SERVICE_SAWI: &str = "SAWI";

/// Statut générique affiché pour un statut d'installation.
pub fn installation_to_generic(status: InstallationStatus) -> TicketStatus {
    match status {
        InstallationStatus::Materiel => TicketStatus::Assigne,
        InstallationStatus::EquipeInstallation => TicketStatus::EnCours,
        InstallationStatus::Installe
        | InstallationStatus::Annule
        | InstallationStatus::InstallationImpossible => TicketStatus::Ferme,
        InstallationStatus::Optimisation
        | InstallationStatus::Extension
        | InstallationStatus::ManqueDeMateriel => TicketStatus::EnCours,
        InstallationStatus::Injoignable => TicketStatus::Injoignable,
    }
}

/// Statut d'installation déduit d'un statut générique (défaut : matériel).
pub fn generic_to_installation(status: TicketStatus) -> InstallationStatus {
    match status {
        TicketStatus::Assigne => InstallationStatus::Materiel,
        TicketStatus::EnCours => InstallationStatus::EquipeInstallation,
        TicketStatus::Ferme => InstallationStatus::Installe,
        TicketStatus::Optimisation => InstallationStatus::Optimisation,
        TicketStatus::Injoignable => InstallationStatus::Injoignable,
        TicketStatus::Nouveau | TicketStatus::Paiement | TicketStatus::EnRetard => {
            InstallationStatus::Materiel
        }
    }
}

/// Variante sur chaîne brute : vide ou inconnu → assigné.
pub fn installation_to_generic_str(status: &str) -> TicketStatus {
    InstallationStatus::parse_lenient(status)
        .map(installation_to_generic)
        .unwrap_or(TicketStatus::Assigne)
}

/// Variante sur chaîne brute : vide ou inconnu → matériel.
pub fn generic_to_installation_str(status: &str) -> InstallationStatus {
    TicketStatus::parse_lenient(status)
        .map(generic_to_installation)
        .unwrap_or(InstallationStatus::Materiel)
}

/// Statut générique initial d'un ticket selon le type d'abonnement.
pub fn initial_status(subscription_type: &str) -> TicketStatus {
    let service = subscription_type.trim().to_uppercase();
    if SERVICES_ASSIGNES.contains(&service.as_str()) {
        TicketStatus::Assigne
    } else if service == SERVICE_SAWI {
        TicketStatus::EnCours
    } else {
        TicketStatus::Nouveau
    }
}

/// État de départ : les installations commencent toujours à matériel,
/// les réclamations au statut initial de leur service.
pub fn initial_state(category: Category, subscription_type: &str) -> WorkflowState {
    match category {
        Category::Installation => WorkflowState::Installation(InstallationStatus::Materiel),
        Category::Reclamation => WorkflowState::Reclamation(initial_status(subscription_type)),
    }
}
