pub mod dashboard;
pub mod mapping;
pub mod normalizer;
pub mod overdue;

pub use dashboard::{build_dashboard, DashboardStats, TimeRange};
pub use mapping::{generic_to_installation, initial_state, installation_to_generic};
pub use normalizer::{normalize, normalize_all};
pub use overdue::{count_overdue, is_late, is_overdue, overdue_level, OverdueLevel, Seuils};
