pub mod apply;
pub mod config;
pub mod diagnose;
pub mod env;
pub mod plan;
pub mod probe;
