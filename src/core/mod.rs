//! Core types, configuration, errors and the simulation clock

pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use time::{Clock, Tick};
