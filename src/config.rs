//! Positional CLI argument parsing. Hand-rolled rather than built on
//! `getopts`: that crate's usage elsewhere in the dependency tree is
//! example-only and flag-oriented, a poor fit for a purely positional
//! argument list (see `DESIGN.md`).

use crate::error::ConfigError;
use crate::router::default_buffer_size;
use crate::sender::Algorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Direct,
    Cloud,
}

impl std::str::FromStr for Topology {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Topology::Direct),
            "cloud" => Ok(Topology::Cloud),
            _ => Err(ConfigError::UnknownTopology(s.to_string())),
        }
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topology::Direct => write!(f, "Direct"),
            Topology::Cloud => write!(f, "Cloud"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub algorithm: Algorithm,
    pub iterations: u64,
    pub topology: Topology,
    pub buffer_size: usize,
    pub rwnd: usize,
    pub clients: usize,
    pub routers: usize,
}

fn parse_positive<T>(field: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    value.parse::<T>().map_err(|_| ConfigError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

impl Config {
    /// Parse positional arguments in algorithm/iterations/topology order,
    /// with optional trailing fields defaulting when absent.
    pub fn parse(args: &[String]) -> Result<Config, ConfigError> {
        let algorithm = args
            .first()
            .ok_or(ConfigError::MissingArgument("algorithm"))?
            .parse::<Algorithm>()?;
        let iterations = args
            .get(1)
            .ok_or(ConfigError::MissingArgument("iterations"))?;
        let iterations: u64 = parse_positive("iterations", iterations)?;
        if iterations == 0 {
            return Err(ConfigError::InvalidNumber {
                field: "iterations",
                value: "0".to_string(),
            });
        }
        let topology = args
            .get(2)
            .ok_or(ConfigError::MissingArgument("topology"))?
            .parse::<Topology>()?;
        let buffer_size = match args.get(3) {
            Some(v) => parse_positive("buffer_size", v)?,
            None => default_buffer_size(),
        };
        let rwnd = match args.get(4) {
            Some(v) => parse_positive("rwnd", v)?,
            None => 65536,
        };
        let clients = match args.get(5) {
            Some(v) => parse_positive("clients", v)?,
            None => 1,
        };
        let routers = match args.get(6) {
            Some(v) => parse_positive("routers", v)?,
            None => 1,
        };

        Ok(Config {
            algorithm,
            iterations,
            topology,
            buffer_size,
            rwnd,
            clients,
            routers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_required_fields_with_defaults() {
        let cfg = Config::parse(&args(&["Reno", "20", "Direct"])).unwrap();
        assert_eq!(cfg.algorithm, Algorithm::Reno);
        assert_eq!(cfg.iterations, 20);
        assert_eq!(cfg.topology, Topology::Direct);
        assert_eq!(cfg.buffer_size, default_buffer_size());
        assert_eq!(cfg.rwnd, 65536);
        assert_eq!(cfg.clients, 1);
        assert_eq!(cfg.routers, 1);
    }

    #[test]
    fn algorithm_and_topology_are_case_insensitive() {
        let cfg = Config::parse(&args(&["newreno", "5", "cloud"])).unwrap();
        assert_eq!(cfg.algorithm, Algorithm::NewReno);
        assert_eq!(cfg.topology, Topology::Cloud);
    }

    #[test]
    fn missing_argument_is_reported() {
        let err = Config::parse(&args(&["Reno"])).unwrap_err();
        assert_eq!(err, ConfigError::MissingArgument("iterations"));
    }

    #[test]
    fn unknown_algorithm_is_reported() {
        let err = Config::parse(&args(&["Vegas", "5", "Direct"])).unwrap_err();
        assert_eq!(err, ConfigError::UnknownAlgorithm("Vegas".to_string()));
    }

    #[test]
    fn zero_iterations_is_invalid() {
        let err = Config::parse(&args(&["Reno", "0", "Direct"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { field: "iterations", .. }));
    }

    #[test]
    fn optional_fields_override_defaults() {
        let cfg = Config::parse(&args(&["Tahoe", "10", "Cloud", "8192", "32768", "4", "2"])).unwrap();
        assert_eq!(cfg.buffer_size, 8192);
        assert_eq!(cfg.rwnd, 32768);
        assert_eq!(cfg.clients, 4);
        assert_eq!(cfg.routers, 2);
    }
}
