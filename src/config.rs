use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::analyzer::overdue::{SEUIL_ALERTE_HEURES, SEUIL_RETARD_HEURES};

const ACTEUR_SYSTEME: &str = "Système";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub seuil_alerte_heures: u32,
    pub seuil_retard_heures: u32,
    /// Nom inscrit dans l'historique pour les transitions automatiques.
    pub acteur_systeme: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            seuil_alerte_heures: SEUIL_ALERTE_HEURES as u32,
            seuil_retard_heures: SEUIL_RETARD_HEURES as u32,
            acteur_systeme: ACTEUR_SYSTEME.to_string(),
        }
    }
}

pub fn get_config_from_db(conn: &Connection) -> Result<AppConfig, rusqlite::Error> {
    let mut stmt = conn.prepare_cached("SELECT key, value FROM config")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut config = AppConfig::default();

    for row in rows {
        let (key, value) = row?;
        match key.as_str() {
            "seuil_alerte_heures" => {
                config.seuil_alerte_heures =
                    value.parse().unwrap_or(SEUIL_ALERTE_HEURES as u32)
            }
            "seuil_retard_heures" => {
                config.seuil_retard_heures =
                    value.parse().unwrap_or(SEUIL_RETARD_HEURES as u32)
            }
            "acteur_systeme" => {
                if !value.trim().is_empty() {
                    config.acteur_systeme = value;
                }
            }
            _ => {}
        }
    }

    Ok(config)
}

pub fn update_config_in_db(conn: &Connection, config: &AppConfig) -> Result<(), rusqlite::Error> {
    let pairs: Vec<(&str, String)> = vec![
        ("seuil_alerte_heures", config.seuil_alerte_heures.to_string()),
        ("seuil_retard_heures", config.seuil_retard_heures.to_string()),
        ("acteur_systeme", config.acteur_systeme.clone()),
    ];

    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO config (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
    )?;

    for (key, value) in pairs {
        stmt.execute(rusqlite::params![key, value])?;
    }

    Ok(())
}
