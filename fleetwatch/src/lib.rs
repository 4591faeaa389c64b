//! fleetwatch: poll a fleet's hardware telemetry, flag threshold breaches and
//! open a helpdesk ticket only for problems that have not been reported yet.

pub mod condition;
pub mod config;
pub mod diff;
pub mod error;
pub mod exceptions;
pub mod history;
pub mod inventory;
pub mod monitor;
pub mod notify;
pub mod store;
pub mod thresholds;
pub mod types;

pub use error::{FleetError, Result};
