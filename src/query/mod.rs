pub mod backoff;
pub mod coordinator;
pub mod export;
pub mod history;
pub mod validation;

pub use backoff::PollPolicy;
pub use coordinator::{QueryCoordinator, QueryExecution, QueryState, QueryStatusView};
pub use export::ExportFormat;
pub use history::{HistoryEntry, HistoryStatus, QueryHistory, DEFAULT_HISTORY_LIMIT, HISTORY_CAPACITY};
