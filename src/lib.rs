pub mod analyzer;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod parser;
pub mod state;
pub mod store;


pub use commands::overdue::{get_overdue_count, run_overdue_reconciliation, ReconciliationResult};
pub use commands::tickets::{
    create_ticket, fetch_tickets, update_installation_status, update_ticket_status, TicketFilter,
};
pub use commands::CommandResult;
pub use config::AppConfig;
pub use error::AppError;
pub use state::AppState;
pub use store::{TicketQuery, TicketStore};

/// Ouvre (ou crée) la base de tickets et applique les migrations.
pub fn open(path: &str) -> Result<AppState, AppError> {
    let conn = db::setup::init_db(path).map_err(|e| AppError::from_store(e, None))?;
    log::info!("base de tickets ouverte : {}", path);
    Ok(AppState::new(conn))
}
