pub mod batch;
pub mod config;
pub mod output;
pub mod parser;
pub mod resilience;
pub mod series;
pub mod signal;
