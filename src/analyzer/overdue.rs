use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::parser::status::{Category, InstallationStatus, TicketStatus, WorkflowState};
use crate::parser::types::NormalizedTicket;

/// Seuil d'alerte précoce (« en retard » sur certaines vues).
pub const SEUIL_ALERTE_HEURES: i64 = 24;
/// Seuil de retard critique.
pub const SEUIL_RETARD_HEURES: i64 = 48;

/// Statuts d'installation encore en attente d'action terrain.
/// installé, annulé, installation_impossible et injoignable n'en font pas partie.
pub const STATUTS_INSTALLATION_SURVEILLES: &[InstallationStatus] = &[
    InstallationStatus::Materiel,
    InstallationStatus::EquipeInstallation,
    InstallationStatus::Optimisation,
    InstallationStatus::Extension,
    InstallationStatus::ManqueDeMateriel,
];

/// Statuts de réclamation pouvant être promus en en_retard.
pub const STATUTS_RECLAMATION_PROMOUVABLES: &[TicketStatus] = &[
    TicketStatus::Nouveau,
    TicketStatus::Assigne,
    TicketStatus::Paiement,
    TicketStatus::EnCours,
    TicketStatus::Optimisation,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverdueLevel {
    Alerte,
    Critique,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seuils {
    pub alerte_heures: i64,
    pub retard_heures: i64,
}

impl Default for Seuils {
    fn default() -> Self {
        Seuils {
            alerte_heures: SEUIL_ALERTE_HEURES,
            retard_heures: SEUIL_RETARD_HEURES,
        }
    }
}

impl From<&AppConfig> for Seuils {
    fn from(config: &AppConfig) -> Self {
        Seuils {
            alerte_heures: config.seuil_alerte_heures as i64,
            retard_heures: config.seuil_retard_heures as i64,
        }
    }
}

impl Seuils {
    pub fn hours_for(&self, level: OverdueLevel) -> i64 {
        match level {
            OverdueLevel::Alerte => self.alerte_heures,
            OverdueLevel::Critique => self.retard_heures,
        }
    }
}

/// Heures pleines écoulées depuis la création (arrondi vers zéro).
pub fn elapsed_hours(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    created_at.map(|c| (now - c).num_hours())
}

pub fn is_watched_installation_status(status: InstallationStatus) -> bool {
    STATUTS_INSTALLATION_SURVEILLES.contains(&status)
}

/// Ticket encore dans un statut dont l'ancienneté compte.
fn is_watched(state: &WorkflowState) -> bool {
    match state {
        WorkflowState::Installation(s) => is_watched_installation_status(*s),
        WorkflowState::Reclamation(s) => {
            STATUTS_RECLAMATION_PROMOUVABLES.contains(s) || *s == TicketStatus::EnRetard
        }
    }
}

/// Prédicat à seuil explicite.
/// Réclamation : le retard est un statut stocké (en_retard), le seuil est ignoré.
/// Installation : statut surveillé et au moins `hours` heures écoulées.
pub fn is_overdue_with(ticket: &NormalizedTicket, now: DateTime<Utc>, hours: i64) -> bool {
    match ticket.state {
        WorkflowState::Reclamation(status) => status == TicketStatus::EnRetard,
        WorkflowState::Installation(status) => {
            is_watched_installation_status(status)
                && elapsed_hours(ticket.created_at, now).is_some_and(|h| h >= hours)
        }
    }
}

/// Retard critique (48 h pour les installations).
pub fn is_overdue(ticket: &NormalizedTicket, now: DateTime<Utc>) -> bool {
    is_overdue_with(ticket, now, SEUIL_RETARD_HEURES)
}

/// Alerte précoce (24 h pour les installations).
pub fn is_late(ticket: &NormalizedTicket, now: DateTime<Utc>) -> bool {
    is_overdue_with(ticket, now, SEUIL_ALERTE_HEURES)
}

/// Plus haut seuil franchi par un ticket encore surveillé, calculé sur
/// l'ancienneté seule (indépendamment du statut en_retard stocké).
pub fn overdue_level(
    ticket: &NormalizedTicket,
    now: DateTime<Utc>,
    seuils: &Seuils,
) -> Option<OverdueLevel> {
    if !is_watched(&ticket.state) {
        return None;
    }
    let hours = elapsed_hours(ticket.created_at, now)?;
    if hours >= seuils.retard_heures {
        Some(OverdueLevel::Critique)
    } else if hours >= seuils.alerte_heures {
        Some(OverdueLevel::Alerte)
    } else {
        None
    }
}

/// Réclamation à passer en en_retard : statut promouvable et seuil d'alerte franchi.
pub fn is_promotion_candidate(ticket: &NormalizedTicket, now: DateTime<Utc>, seuils: &Seuils) -> bool {
    match ticket.state {
        WorkflowState::Reclamation(status) => {
            STATUTS_RECLAMATION_PROMOUVABLES.contains(&status)
                && overdue_level(ticket, now, seuils).is_some()
        }
        WorkflowState::Installation(_) => false,
    }
}

pub fn count_overdue(tickets: &[NormalizedTicket], now: DateTime<Utc>) -> usize {
    tickets.iter().filter(|t| is_overdue(t, now)).count()
}

pub fn count_overdue_by_category(
    tickets: &[NormalizedTicket],
    now: DateTime<Utc>,
    category: Option<Category>,
) -> usize {
    count_overdue_with(tickets, now, &Seuils::default(), category)
}

/// Comptage avec le seuil critique configuré.
pub fn count_overdue_with(
    tickets: &[NormalizedTicket],
    now: DateTime<Utc>,
    seuils: &Seuils,
    category: Option<Category>,
) -> usize {
    tickets
        .iter()
        .filter(|t| category.map_or(true, |c| t.category() == c))
        .filter(|t| is_overdue_with(t, now, seuils.retard_heures))
        .count()
}

/// Compteur de retards tenu à jour ticket par ticket, pour éviter de
/// rebalayer tout le stock à chaque lecture.
/// `now` et les seuils sont figés à la construction : les tickets qui
/// franchissent le seuil ensuite ne sont comptés qu'après `rebuild`.
#[derive(Debug, Clone)]
pub struct OverdueTally {
    now: DateTime<Utc>,
    seuils: Seuils,
    reclamations: usize,
    installations: usize,
}

impl OverdueTally {
    pub fn new(now: DateTime<Utc>, seuils: Seuils) -> Self {
        OverdueTally {
            now,
            seuils,
            reclamations: 0,
            installations: 0,
        }
    }

    pub fn rebuild(tickets: &[NormalizedTicket], now: DateTime<Utc>, seuils: Seuils) -> Self {
        let mut tally = OverdueTally::new(now, seuils);
        for t in tickets {
            tally.observe(t);
        }
        tally
    }

    fn slot(&mut self, category: Category) -> &mut usize {
        match category {
            Category::Reclamation => &mut self.reclamations,
            Category::Installation => &mut self.installations,
        }
    }

    fn counts(&self, ticket: &NormalizedTicket) -> bool {
        is_overdue_with(ticket, self.now, self.seuils.retard_heures)
    }

    /// Ajoute un ticket (création ou nouvelle version après mise à jour).
    pub fn observe(&mut self, ticket: &NormalizedTicket) {
        if self.counts(ticket) {
            *self.slot(ticket.category()) += 1;
        }
    }

    /// Retire un ticket (ancienne version avant mise à jour).
    pub fn retract(&mut self, ticket: &NormalizedTicket) {
        if self.counts(ticket) {
            let slot = self.slot(ticket.category());
            *slot = slot.saturating_sub(1);
        }
    }

    /// Remplace l'ancienne version d'un ticket par la nouvelle.
    pub fn replace(&mut self, before: &NormalizedTicket, after: &NormalizedTicket) {
        self.retract(before);
        self.observe(after);
    }

    pub fn count(&self, category: Option<Category>) -> usize {
        match category {
            Some(Category::Reclamation) => self.reclamations,
            Some(Category::Installation) => self.installations,
            None => self.reclamations + self.installations,
        }
    }
}
