pub mod catalog;
pub mod config;
pub mod core;
pub mod job;
pub mod model;
pub mod processing;
pub use deadpool_diesel;
pub use processing::startup_self_check;
