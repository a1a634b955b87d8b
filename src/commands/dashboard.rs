use chrono::{DateTime, Utc};

use crate::analyzer::dashboard::{build_dashboard, DashboardStats, TimeRange};
use crate::analyzer::normalizer::normalize_all;
use crate::analyzer::overdue::Seuils;
use crate::error::AppError;
use crate::parser::status::Category;
use crate::store::{TicketQuery, TicketStore};

/// Agrégats du tableau de bord d'une catégorie sur la période demandée.
/// Relit le store à chaque appel : aucun compteur n'est conservé entre deux vues.
pub fn get_dashboard_stats<S: TicketStore + ?Sized>(
    store: &S,
    category: Category,
    range: TimeRange,
    seuils: &Seuils,
    now: DateTime<Utc>,
) -> Result<DashboardStats, AppError> {
    let query = TicketQuery {
        created_from: range.lower_bound(now),
        ..Default::default()
    };
    let tickets = normalize_all(&store.fetch_raw_tickets(&query)?);
    Ok(build_dashboard(&tickets, category, now, seuils))
}
