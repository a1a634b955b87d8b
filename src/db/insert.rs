use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::parser::deserializers::format_timestamp;
use crate::parser::status::{InstallationStatus, TicketStatus};
use crate::parser::types::{HistoryEntry, TicketInsert};

pub fn insert_ticket(conn: &mut Connection, t: &TicketInsert) -> Result<i64, rusqlite::Error> {
    let tx = conn.transaction()?;

    {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO tickets (
                ticket_number, category, status, installation_status, complaint_type,
                client_name, phone, subscriber_number, subscription_type,
                wilaya_code, region_id, problem_description,
                created_at, updated_at, created_by_name
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12,
                ?13, ?13, ?14
            )",
        )?;

        stmt.execute(rusqlite::params![
            t.ticket_number,
            t.category.as_str(),
            t.status.as_str(),
            t.installation_status.map(|s| s.as_str()),
            t.complaint_type,
            t.client_name,
            t.phone,
            t.subscriber_number,
            t.subscription_type,
            t.wilaya_code,
            t.region_id,
            t.problem_description,
            format_timestamp(&t.created_at),
            t.created_by_name,
        ])?;
    }

    let id = tx.last_insert_rowid();
    tx.commit()?;
    Ok(id)
}

/// `QueryReturnedNoRows` si le ticket n'existe pas.
fn expect_one_row(changed: usize) -> Result<(), rusqlite::Error> {
    if changed == 0 {
        Err(rusqlite::Error::QueryReturnedNoRows)
    } else {
        Ok(())
    }
}

pub fn write_status(
    conn: &Connection,
    id: i64,
    status: TicketStatus,
    closed_at: Option<DateTime<Utc>>,
    at: DateTime<Utc>,
) -> Result<(), rusqlite::Error> {
    let changed = conn.execute(
        "UPDATE tickets SET status = ?1, closed_at = ?2, updated_at = ?3 WHERE id = ?4",
        rusqlite::params![
            status.as_str(),
            closed_at.as_ref().map(format_timestamp),
            format_timestamp(&at),
            id,
        ],
    )?;
    expect_one_row(changed)
}

pub fn write_installation_status(
    conn: &Connection,
    id: i64,
    status: InstallationStatus,
    generic: TicketStatus,
    closed_at: Option<DateTime<Utc>>,
    at: DateTime<Utc>,
) -> Result<(), rusqlite::Error> {
    let changed = conn.execute(
        "UPDATE tickets
         SET installation_status = ?1, status = ?2, closed_at = ?3, updated_at = ?4,
             category = COALESCE(category, 'installation')
         WHERE id = ?5",
        rusqlite::params![
            status.as_str(),
            generic.as_str(),
            closed_at.as_ref().map(format_timestamp),
            format_timestamp(&at),
            id,
        ],
    )?;
    expect_one_row(changed)
}

pub fn append_history(conn: &Connection, entry: &HistoryEntry) -> Result<i64, rusqlite::Error> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO ticket_history (
            ticket_id, action, from_status, to_status, notes, changed_by_name, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    stmt.execute(rusqlite::params![
        entry.ticket_id,
        entry.action.as_str(),
        entry.from_status,
        entry.to_status,
        entry.notes,
        entry.changed_by_name,
        format_timestamp(&entry.created_at),
    ])?;
    Ok(conn.last_insert_rowid())
}
