mod entry_service;
mod transitions;
mod worker_service;

pub use entry_service::{CreateEntryRequest, EntryService};
pub use transitions::TransitionTable;
pub use worker_service::WorkerRegistry;
