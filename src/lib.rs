//! Reporting engine converting MESSAGEix-GLOBIOM scenario solutions into IAMC-format timeseries.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod context;
pub mod fil;
pub mod formula;
pub mod id;
pub mod input;
pub mod log;
pub mod normalise;
pub mod output;
pub mod quantity;
pub mod reconcile;
pub mod region;
pub mod report;
pub mod retrieve;
pub mod settings;
pub mod store;
pub mod tables;
pub mod units;
pub mod warning;
pub mod year;

#[cfg(test)]
mod fixture;

/// Get the folder in which the program's configuration files are stored
pub fn get_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("message-report");

    path
}
