pub mod config;
pub mod dashboard;
pub mod export;
pub mod history;
pub mod overdue;
pub mod tickets;

use serde::Serialize;

/// Issue d'une commande d'écriture : l'appelant n'a jamais à intercepter d'erreur.
/// `success` reste vrai quand seule une étape secondaire a échoué (voir `warnings`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    pub warnings: Vec<String>,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>) -> Self {
        CommandResult {
            success: true,
            message: message.into(),
            warnings: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        CommandResult {
            success: false,
            message: message.into(),
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

#[cfg(test)]
pub(crate) mod testing;
