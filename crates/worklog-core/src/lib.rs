pub mod config;
pub mod daemon;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod history;
pub mod lockfile;
pub mod matcher;
pub mod memory;
pub mod model;
pub mod notify_state;
pub mod provider;
pub mod report;
pub mod resolver;
pub mod sync_engine;
mod sync_engine_apply;
mod sync_engine_orchestrator;
mod sync_engine_status;
pub mod sync_engine_types;
mod sync_engine_workers;
pub mod writer;
