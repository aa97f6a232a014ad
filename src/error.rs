//! Error taxonomy.
//!
//! Two small `Display`-implementing types, in the idiom of `storage::Full` /
//! `iface::route::RouteTableFull`: no `thiserror` derive (see `DESIGN.md`),
//! just a plain enum with a hand-written `Display` and a marker
//! `std::error::Error` impl so it composes with `anyhow` at the CLI
//! boundary.

use std::fmt;

/// Fatal, operator-facing configuration errors: bad CLI arguments, an
/// unknown algorithm or topology name. Always exit-code 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownAlgorithm(String),
    UnknownTopology(String),
    InvalidNumber { field: &'static str, value: String },
    MissingArgument(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownAlgorithm(s) => {
                write!(f, "unknown congestion control algorithm '{s}' (expected Tahoe, Reno, or NewReno)")
            }
            ConfigError::UnknownTopology(s) => {
                write!(f, "unknown topology '{s}' (expected Direct or Cloud)")
            }
            ConfigError::InvalidNumber { field, value } => {
                write!(f, "invalid value '{value}' for {field}: expected a positive integer")
            }
            ConfigError::MissingArgument(name) => {
                write!(f, "missing required argument: {name}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Programmer/configuration errors surfaced during a run: a forwarding-table
/// miss, or a timer double-armed/cancelled-twice. All are fatal — they
/// indicate a malformed topology, not a simulated network event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    ForwardingMiss { router: usize, destination: usize },
    TimerAlreadyArmed { sender: usize },
    TimerNotArmed { sender: usize },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::ForwardingMiss { router, destination } => write!(
                f,
                "router {router} has no forwarding entry for endpoint {destination}"
            ),
            SimError::TimerAlreadyArmed { sender } => {
                write!(f, "RTO timer already armed for sender {sender}")
            }
            SimError::TimerNotArmed { sender } => {
                write!(f, "attempted to cancel an RTO timer not armed for sender {sender}")
            }
        }
    }
}

impl std::error::Error for SimError {}
