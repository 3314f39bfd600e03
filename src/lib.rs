pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod markov;
pub mod pipeline;
pub mod schedule;
pub mod users;
