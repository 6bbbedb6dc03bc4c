pub mod agent;
pub mod completions;
pub mod config;
pub mod run;
