pub mod cancel;
pub mod command;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod path_utils;
pub mod probe;
pub mod report;
pub mod runner;
pub mod timer;
pub mod types;
