//! Lead valuation and partner assignment for a restoration services marketplace.

pub mod allocation;
pub mod config;
pub mod error;
pub mod telemetry;
