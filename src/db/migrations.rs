use rusqlite::Connection;

const SCHEMA: &[(u32, &str)] = &[
    (1, include_str!("sql/001_initial.sql")),
    (2, include_str!("sql/002_history_order.sql")),
];

pub fn schema_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}

/// Applique, chacune dans sa transaction, les étapes postérieures à `user_version`.
/// Retourne le nombre d'étapes appliquées.
pub fn run_migrations(conn: &Connection) -> Result<usize, rusqlite::Error> {
    let from = schema_version(conn)?;
    let mut applied = 0;

    for (version, sql) in SCHEMA.iter().filter(|(v, _)| *v > from) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        applied += 1;
        log::info!("schéma tickets : étape {} appliquée", version);
    }

    if applied == 0 {
        log::debug!("schéma tickets déjà en version {}", from);
    }
    Ok(applied)
}
