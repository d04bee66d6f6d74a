pub mod forge_args;
pub mod import;
pub mod register_worker;
pub mod serve;

pub use import::ImportCommand;
pub use register_worker::RegisterWorkerCommand;
pub use serve::ServeCommand;
