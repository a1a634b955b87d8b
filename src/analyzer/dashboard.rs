use std::collections::HashMap;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzer::overdue::{is_overdue_with, Seuils};
use crate::parser::location::{format_wilaya_name, is_nouakchott};
use crate::parser::status::{Category, InstallationStatus, TicketStatus, WorkflowState};
use crate::parser::types::NormalizedTicket;

const NON_SPECIFIE: &str = "Non spécifié";
const RECENTS_MAX: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Month,
    Year,
    #[default]
    All,
}

impl TimeRange {
    /// Borne basse sur `created_at`, `None` pour `All`.
    pub fn lower_bound(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeRange::Day => Some(now - chrono::Duration::days(1)),
            TimeRange::Month => now.checked_sub_months(Months::new(1)),
            TimeRange::Year => now.checked_sub_months(Months::new(12)),
            TimeRange::All => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReclamationStats {
    pub total: usize,
    pub open: usize,
    pub closed: usize,
    pub late: usize,
    pub assigned: usize,
    pub payment: usize,
    pub in_progress: usize,
    pub unreachable: usize,
    pub optimisation: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: InstallationStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationStats {
    pub total: usize,
    /// Un compteur par statut, dans l'ordre du vocabulaire (zéros compris).
    pub par_statut: Vec<StatusCount>,
    /// Seuil d'alerte franchi (24 h par défaut).
    pub en_alerte: usize,
    /// Seuil critique franchi (48 h par défaut).
    pub en_retard: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDelay {
    pub service: String,
    pub total: usize,
    pub late: usize,
    pub age_moyen_heures: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeBucket {
    pub jours: i64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub category: Category,
    pub reclamation: Option<ReclamationStats>,
    pub installation: Option<InstallationStats>,
    pub overdue_count: usize,
    pub par_service: Vec<LabelCount>,
    pub delais_par_service: Vec<ServiceDelay>,
    pub par_wilaya: Vec<LabelCount>,
    pub par_zone_nkc: Vec<LabelCount>,
    /// Tickets ouverts par ancienneté en jours, du plus ancien au plus récent.
    pub ouverts_par_anciennete: Vec<AgeBucket>,
    pub recents: Vec<NormalizedTicket>,
}

pub fn reclamation_stats(tickets: &[&NormalizedTicket]) -> ReclamationStats {
    let mut stats = ReclamationStats {
        total: tickets.len(),
        ..Default::default()
    };
    for t in tickets {
        match t.statut_generique {
            TicketStatus::Ferme => stats.closed += 1,
            TicketStatus::EnRetard => stats.late += 1,
            TicketStatus::Assigne => stats.assigned += 1,
            TicketStatus::Paiement => stats.payment += 1,
            TicketStatus::EnCours => stats.in_progress += 1,
            TicketStatus::Injoignable => stats.unreachable += 1,
            TicketStatus::Optimisation => stats.optimisation += 1,
            TicketStatus::Nouveau => {}
        }
        if t.statut_generique != TicketStatus::Ferme {
            stats.open += 1;
        }
    }
    stats
}

pub fn installation_stats(
    tickets: &[&NormalizedTicket],
    now: DateTime<Utc>,
    seuils: &Seuils,
) -> InstallationStats {
    let mut counts: HashMap<InstallationStatus, usize> = HashMap::new();
    for t in tickets {
        if let WorkflowState::Installation(s) = t.state {
            *counts.entry(s).or_insert(0) += 1;
        }
    }
    InstallationStats {
        total: tickets.len(),
        par_statut: InstallationStatus::ALL
            .iter()
            .map(|s| StatusCount {
                status: *s,
                count: counts.get(s).copied().unwrap_or(0),
            })
            .collect(),
        en_alerte: tickets
            .iter()
            .filter(|t| is_overdue_with(t, now, seuils.alerte_heures))
            .count(),
        en_retard: tickets
            .iter()
            .filter(|t| is_overdue_with(t, now, seuils.retard_heures))
            .count(),
    }
}

/// Tri par effectif décroissant puis libellé.
fn sorted_counts(map: HashMap<String, usize>) -> Vec<LabelCount> {
    let mut out: Vec<LabelCount> = map
        .into_iter()
        .map(|(label, count)| LabelCount { label, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    out
}

fn label_or_default(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NON_SPECIFIE.to_string(),
    }
}

pub fn count_by_service(tickets: &[&NormalizedTicket]) -> Vec<LabelCount> {
    let mut map = HashMap::new();
    for t in tickets {
        *map.entry(label_or_default(t.subscription_type.as_deref())).or_insert(0) += 1;
    }
    sorted_counts(map)
}

pub fn count_by_wilaya(tickets: &[&NormalizedTicket]) -> Vec<LabelCount> {
    let mut map = HashMap::new();
    for t in tickets {
        let label = format_wilaya_name(t.wilaya_name.as_deref(), t.wilaya_code.as_deref());
        *map.entry(label).or_insert(0) += 1;
    }
    sorted_counts(map)
}

/// Répartition des tickets de Nouakchott par zone (région).
pub fn count_by_nkc_zone(tickets: &[&NormalizedTicket]) -> Vec<LabelCount> {
    let mut map = HashMap::new();
    for t in tickets
        .iter()
        .filter(|t| is_nouakchott(t.wilaya_name.as_deref(), t.wilaya_code.as_deref()))
    {
        *map.entry(label_or_default(t.region_name.as_deref())).or_insert(0) += 1;
    }
    sorted_counts(map)
}

/// Délais par type d'abonnement, sur les tickets ouverts.
/// `late` suit le seuil d'alerte : pour les réclamations, c'est le statut en_retard.
pub fn service_delays(
    tickets: &[&NormalizedTicket],
    now: DateTime<Utc>,
    seuils: &Seuils,
) -> Vec<ServiceDelay> {
    let mut groups: HashMap<String, Vec<&NormalizedTicket>> = HashMap::new();
    for t in tickets.iter().filter(|t| t.is_open()) {
        groups
            .entry(label_or_default(t.subscription_type.as_deref()))
            .or_default()
            .push(*t);
    }

    let mut out: Vec<ServiceDelay> = groups
        .into_iter()
        .map(|(service, group)| {
            let ages: Vec<f64> = group
                .iter()
                .filter_map(|t| t.created_at)
                .map(|c| (now - c).num_minutes() as f64 / 60.0)
                .collect();
            let age_moyen_heures = if ages.is_empty() {
                0.0
            } else {
                ages.iter().sum::<f64>() / ages.len() as f64
            };
            ServiceDelay {
                total: group.len(),
                late: group
                    .iter()
                    .filter(|t| is_overdue_with(t, now, seuils.alerte_heures))
                    .count(),
                service,
                age_moyen_heures,
            }
        })
        .collect();
    out.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.service.cmp(&b.service)));
    out
}

/// Tickets ouverts groupés par ancienneté en jours pleins.
pub fn open_by_age_days(tickets: &[&NormalizedTicket], now: DateTime<Utc>) -> Vec<AgeBucket> {
    let mut map: HashMap<i64, usize> = HashMap::new();
    for t in tickets.iter().filter(|t| t.is_open()) {
        if let Some(created) = t.created_at {
            let jours = (now - created).num_days().max(0);
            *map.entry(jours).or_insert(0) += 1;
        }
    }
    let mut out: Vec<AgeBucket> = map
        .into_iter()
        .map(|(jours, count)| AgeBucket { jours, count })
        .collect();
    out.sort_by(|a, b| b.jours.cmp(&a.jours));
    out
}

/// Agrégats du tableau de bord pour une catégorie.
/// Fonction pure : les tickets sont ceux déjà restreints à la période voulue.
pub fn build_dashboard(
    tickets: &[NormalizedTicket],
    category: Category,
    now: DateTime<Utc>,
    seuils: &Seuils,
) -> DashboardStats {
    let scoped: Vec<&NormalizedTicket> =
        tickets.iter().filter(|t| t.category() == category).collect();

    let (reclamation, installation) = match category {
        Category::Reclamation => (Some(reclamation_stats(&scoped)), None),
        Category::Installation => (None, Some(installation_stats(&scoped, now, seuils))),
    };

    let mut recents: Vec<NormalizedTicket> = scoped.iter().map(|t| (*t).clone()).collect();
    recents.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    recents.truncate(RECENTS_MAX);

    DashboardStats {
        category,
        reclamation,
        installation,
        overdue_count: scoped
            .iter()
            .filter(|t| is_overdue_with(t, now, seuils.retard_heures))
            .count(),
        par_service: count_by_service(&scoped),
        delais_par_service: service_delays(&scoped, now, seuils),
        par_wilaya: count_by_wilaya(&scoped),
        par_zone_nkc: count_by_nkc_zone(&scoped),
        ouverts_par_anciennete: open_by_age_days(&scoped, now),
        recents,
    }
}
