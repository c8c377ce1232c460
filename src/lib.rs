pub mod config;
pub mod env;
pub mod executor;
pub mod generator;
pub mod matcher;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod store;
pub mod template;
