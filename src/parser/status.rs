use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Replie une valeur de statut saisie librement vers sa forme de comparaison :
/// minuscules, accents retirés, espaces et tirets remplacés par `_`.
/// "Équipe installation" → "equipe_installation"
pub fn fold_status(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.trim().chars().flat_map(char::to_lowercase) {
        let folded = match c {
            'à' | 'â' | 'ä' | 'á' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' | 'í' => 'i',
            'ô' | 'ö' | 'ó' => 'o',
            'ù' | 'û' | 'ü' | 'ú' => 'u',
            'ç' => 'c',
            '-' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        };
        out.push(folded);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "valeur inconnue: '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

/// Déclare un vocabulaire fermé : chaîne canonique, clé repliée, `Display`,
/// `FromStr` tolérant et (dé)sérialisation par la chaîne canonique.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $wire:literal, $folded:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            /// Lecture tolérante : `None` pour une valeur vide ou hors vocabulaire.
            pub fn parse_lenient(s: &str) -> Option<Self> {
                match fold_status(s).as_str() {
                    $($folded => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_lenient(s).ok_or_else(|| UnknownStatus(s.to_string()))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

vocabulary! {
    /// Famille d'un ticket : détermine le vocabulaire de statut applicable.
    pub enum Category {
        Reclamation => "reclamation", "reclamation";
        Installation => "installation", "installation";
    }
}

vocabulary! {
    /// Statut générique (cycle de vie d'une réclamation, proxy grossier pour les installations).
    pub enum TicketStatus {
        Nouveau => "nouveau", "nouveau";
        Assigne => "assigné", "assigne";
        Paiement => "paiement", "paiement";
        EnCours => "en_cours", "en_cours";
        Injoignable => "injoignable", "injoignable";
        EnRetard => "en_retard", "en_retard";
        Ferme => "fermé", "ferme";
        Optimisation => "optimisation", "optimisation";
    }
}

vocabulary! {
    /// Statut fin propre aux tickets d'installation.
    pub enum InstallationStatus {
        Materiel => "matériel", "materiel";
        EquipeInstallation => "équipe_installation", "equipe_installation";
        Installe => "installé", "installe";
        Annule => "annulé", "annule";
        Injoignable => "injoignable", "injoignable";
        InstallationImpossible => "installation_impossible", "installation_impossible";
        Optimisation => "optimisation", "optimisation";
        Extension => "extension", "extension";
        ManqueDeMateriel => "manque_de_materiel", "manque_de_materiel";
    }
}

impl TicketStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Ferme)
    }
}

impl InstallationStatus {
    /// installé, annulé, installation_impossible : le ticket est clos.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstallationStatus::Installe
                | InstallationStatus::Annule
                | InstallationStatus::InstallationImpossible
        )
    }
}

/// Statut résolu d'un ticket, dans le vocabulaire de sa catégorie.
/// La catégorie est portée par la variante : un état ne peut pas mélanger les vocabulaires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "category", content = "status", rename_all = "lowercase")]
pub enum WorkflowState {
    Reclamation(TicketStatus),
    Installation(InstallationStatus),
}

impl WorkflowState {
    pub fn category(&self) -> Category {
        match self {
            WorkflowState::Reclamation(_) => Category::Reclamation,
            WorkflowState::Installation(_) => Category::Installation,
        }
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            WorkflowState::Reclamation(s) => s.as_str(),
            WorkflowState::Installation(s) => s.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            WorkflowState::Reclamation(s) => s.is_terminal(),
            WorkflowState::Installation(s) => s.is_terminal(),
        }
    }

    pub fn reclamation(&self) -> Option<TicketStatus> {
        match self {
            WorkflowState::Reclamation(s) => Some(*s),
            WorkflowState::Installation(_) => None,
        }
    }

    pub fn installation(&self) -> Option<InstallationStatus> {
        match self {
            WorkflowState::Installation(s) => Some(*s),
            WorkflowState::Reclamation(_) => None,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category(), self.status_str())
    }
}
