//! srcport-worker: package import bookkeeping for the worker fleet
//!
//! [`services::EntryService`] owns the lifecycle of import entries,
//! [`services::WorkerRegistry`] tracks worker identities and liveness, and
//! [`activities::ImportActivities`] is the surface the workflow engine calls.
//! The only inbound HTTP route is the heartbeat in [`handlers`].

pub mod activities;
pub mod handlers;
pub mod services;

pub use activities::{ImportActivities, PreparedRepository};
pub use handlers::{build_router, AppState};
pub use services::{CreateEntryRequest, EntryService, TransitionTable, WorkerRegistry};
