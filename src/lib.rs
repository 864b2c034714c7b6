pub mod cluster;
pub mod config;
pub mod error;
pub mod job;
pub mod progress;
pub mod runner;
pub mod scheduler;
pub mod shutdown;
pub mod store;
