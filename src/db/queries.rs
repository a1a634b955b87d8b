use rusqlite::{params_from_iter, types::Value, Connection, Row};

use crate::parser::deserializers::{format_timestamp, parse_timestamp};
use crate::parser::types::{HistoryAction, HistoryEntry, RawTicket};
use crate::store::TicketQuery;

// ─── Helpers privés ───────────────────────────────────────────────────────────

const TICKET_SELECT: &str = "\
    SELECT t.id, t.ticket_number, t.category, t.status, t.installation_status,
           t.complaint_type, t.created_at, t.closed_at, t.client_name, t.phone,
           t.subscriber_number, t.subscription_type, t.wilaya_code, w.name_fr,
           t.region_id, r.name_fr
    FROM tickets t
    LEFT JOIN wilayas w ON w.code = t.wilaya_code
    LEFT JOIN regions r ON r.id = t.region_id
    WHERE 1 = 1";

fn row_to_raw(row: &Row<'_>) -> Result<RawTicket, rusqlite::Error> {
    Ok(RawTicket {
        id: row.get(0)?,
        ticket_number: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        category: row.get(2)?,
        status: row.get(3)?,
        installation_status: row.get(4)?,
        complaint_type: row.get(5)?,
        created_at: row.get(6)?,
        closed_at: row.get(7)?,
        client_name: row.get(8)?,
        phone: row.get(9)?,
        subscriber_number: row.get(10)?,
        subscription_type: row.get(11)?,
        wilaya_code: row.get(12)?,
        wilaya_name: row.get(13)?,
        region_id: row.get(14)?,
        region_name: row.get(15)?,
    })
}

/// Ajoute dynamiquement des conditions WHERE selon la requête.
/// Le ?N correspondant est calculé d'après `params.len()` après push.
/// Les dates sont comparées via julianday() : le texte stocké peut être du
/// RFC 3339, du datetime('now') SQLite ou une date seule.
fn apply_query(sql: &mut String, params: &mut Vec<Value>, query: &TicketQuery) {
    if let Some(from) = &query.created_from {
        params.push(Value::Text(format_timestamp(from)));
        sql.push_str(&format!(
            " AND julianday(t.created_at) >= julianday(?{})",
            params.len()
        ));
    }
    if let Some(to) = &query.created_to {
        params.push(Value::Text(format_timestamp(to)));
        sql.push_str(&format!(
            " AND julianday(t.created_at) <= julianday(?{})",
            params.len()
        ));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        params.push(Value::Text(format!("%{}%", search.to_lowercase())));
        let n = params.len();
        sql.push_str(&format!(
            " AND (lower(t.ticket_number) LIKE ?{n}
                   OR lower(COALESCE(t.phone, '')) LIKE ?{n}
                   OR lower(COALESCE(t.subscriber_number, '')) LIKE ?{n}
                   OR lower(COALESCE(t.client_name, '')) LIKE ?{n})"
        ));
    }
    if let Some(ids) = &query.ids {
        if ids.is_empty() {
            sql.push_str(" AND 0");
        } else {
            let mut placeholders = Vec::with_capacity(ids.len());
            for id in ids {
                params.push(Value::Integer(*id));
                placeholders.push(format!("?{}", params.len()));
            }
            sql.push_str(&format!(" AND t.id IN ({})", placeholders.join(", ")));
        }
    }
}

// ─── Fonctions de requête publiques ───────────────────────────────────────────

pub fn fetch_raw_tickets(
    conn: &Connection,
    query: &TicketQuery,
) -> Result<Vec<RawTicket>, rusqlite::Error> {
    let mut sql = TICKET_SELECT.to_string();
    let mut params: Vec<Value> = Vec::new();
    apply_query(&mut sql, &mut params, query);
    sql.push_str(" ORDER BY julianday(t.created_at) DESC, t.id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(params), row_to_raw)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_raw_ticket(conn: &Connection, id: i64) -> Result<RawTicket, rusqlite::Error> {
    let sql = format!("{} AND t.id = ?1", TICKET_SELECT);
    conn.query_row(&sql, rusqlite::params![id], row_to_raw)
}

/// Historique complet d'un ticket, du plus récent au plus ancien.
/// Une action inconnue ou une date illisible écartent la ligne.
pub fn get_history(conn: &Connection, ticket_id: i64) -> Result<Vec<HistoryEntry>, rusqlite::Error> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, ticket_id, action, from_status, to_status, notes, changed_by_name, created_at
         FROM ticket_history
         WHERE ticket_id = ?1
         ORDER BY julianday(created_at) DESC, id DESC",
    )?;
    let rows: Vec<(i64, i64, String, Option<String>, Option<String>, Option<String>, String, String)> =
        stmt.query_map(rusqlite::params![ticket_id], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let entries = rows
        .into_iter()
        .filter_map(|(id, tid, action, from, to, notes, by, at)| {
            let action = HistoryAction::from_db(&action)?;
            let created_at = parse_timestamp(&at)?;
            Some(HistoryEntry {
                id: Some(id),
                ticket_id: tid,
                action,
                from_status: from,
                to_status: to,
                notes,
                changed_by_name: by,
                created_at,
            })
        })
        .collect();
    Ok(entries)
}

pub fn has_history(
    conn: &Connection,
    ticket_id: i64,
    action: HistoryAction,
) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM ticket_history WHERE ticket_id = ?1 AND action = ?2)",
        rusqlite::params![ticket_id, action.as_str()],
        |row| row.get::<_, bool>(0),
    )
}

pub fn find_open_by_subscriber(
    conn: &Connection,
    subscriber_number: &str,
) -> Result<Vec<i64>, rusqlite::Error> {
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM tickets
         WHERE subscriber_number = ?1 COLLATE NOCASE AND status <> 'fermé'
         ORDER BY id",
    )?;
    let ids = stmt
        .query_map(rusqlite::params![subscriber_number.trim()], |row| row.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
