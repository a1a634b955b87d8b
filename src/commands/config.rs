use crate::config::AppConfig;
use crate::error::AppError;
use crate::state::{AppState, DbAccess};

pub fn get_config(state: &AppState) -> Result<AppConfig, AppError> {
    state.db(crate::config::get_config_from_db)
}

/// Le seuil d'alerte doit rester strictement inférieur au seuil critique.
pub fn update_config(state: &AppState, config: &AppConfig) -> Result<(), AppError> {
    if config.seuil_alerte_heures == 0 || config.seuil_alerte_heures >= config.seuil_retard_heures {
        return Err(AppError::Validation(format!(
            "Seuils incohérents : alerte {} h, retard {} h",
            config.seuil_alerte_heures, config.seuil_retard_heures
        )));
    }
    if config.acteur_systeme.trim().is_empty() {
        return Err(AppError::Validation("Acteur système obligatoire".into()));
    }
    state.db(|conn| crate::config::update_config_in_db(conn, config))?;
    log::info!(
        "configuration mise à jour : alerte {} h, retard {} h",
        config.seuil_alerte_heures,
        config.seuil_retard_heures
    );
    Ok(())
}
