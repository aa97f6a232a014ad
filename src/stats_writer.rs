//! CSV append writer. No `csv` crate: the row shape is fixed and
//! single-line, written by hand in the manual-formatting style of
//! `iface::neighbor`'s cache key strings.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::config::{Config, Topology};
use crate::stats::Stats;

const HEADER: &str = "Number of Iterations, Number of Senders, Number of Routers, Congestion Avoidance Algorithm, Throughput (MB/RTTs), Retransmission Ratio (% per MB), Timeouts";

pub fn file_name(config: &Config) -> String {
    format!("statistics{}{}.csv", config.algorithm, topology_name(config.topology))
}

fn topology_name(topology: Topology) -> &'static str {
    match topology {
        Topology::Direct => "Direct",
        Topology::Cloud => "Cloud",
    }
}

/// Append one row, writing the header first if the file does not already
/// exist. A write failure is non-fatal: the caller logs it and still prints
/// the console summary.
pub fn append_row(path: &Path, config: &Config, stats: &Stats) -> std::io::Result<()> {
    let header_needed = !path.exists();
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if header_needed {
        writeln!(file, "{HEADER}")?;
    }
    writeln!(
        file,
        "{}, {}, {}, {}, {:.6}, {:.6}, {}",
        config.iterations,
        config.clients,
        config.routers,
        config.algorithm,
        stats.throughput_mb_per_rtt(config.iterations),
        stats.retransmission_ratio_pct(),
        stats.timeouts,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::Algorithm;

    fn config() -> Config {
        Config {
            algorithm: Algorithm::Reno,
            iterations: 20,
            topology: Topology::Direct,
            buffer_size: 4096,
            rwnd: 65536,
            clients: 1,
            routers: 1,
        }
    }

    #[test]
    fn file_name_combines_algorithm_and_topology() {
        assert_eq!(file_name(&config()), "statisticsRenoDirect.csv");
    }

    #[test]
    fn append_writes_header_only_once() {
        let dir = std::env::temp_dir().join(format!("tcpsim-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stats.csv");
        let _ = std::fs::remove_file(&path);
        let stats = Stats {
            bytes_transmitted: 1_048_576,
            bytes_retransmitted: 0,
            timeouts: 0,
        };
        append_row(&path, &config(), &stats).unwrap();
        append_row(&path, &config(), &stats).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().filter(|l| l.starts_with("Number of Iterations")).count(), 1);
        assert_eq!(contents.lines().count(), 3);
        std::fs::remove_file(&path).ok();
    }
}
