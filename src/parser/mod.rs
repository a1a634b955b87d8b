pub mod deserializers;
pub mod location;
pub mod status;
pub mod types;
pub mod validation;

pub use status::{Category, InstallationStatus, TicketStatus, WorkflowState};
pub use types::{HistoryAction, HistoryEntry, NewTicket, NormalizedTicket, RawTicket};
