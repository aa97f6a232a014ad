use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;

use tcpsim::config::Config;
use tcpsim::reporting::Reporting;
use tcpsim::topology::Topology;

fn reporting_from_env() -> Reporting {
    match std::env::var("TCPSIM_REPORTING") {
        Ok(v) if v.eq_ignore_ascii_case("all") => Reporting::ALL,
        _ => Reporting::NONE,
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::parse(&args).map_err(|e| anyhow::anyhow!(e))?;
    let reporting = reporting_from_env();

    let mut topology = match config.topology {
        tcpsim::config::Topology::Direct => {
            Topology::direct(config.algorithm, config.routers, config.buffer_size, config.rwnd, reporting)
        }
        tcpsim::config::Topology::Cloud => Topology::cloud(
            config.algorithm,
            config.clients,
            config.routers,
            config.buffer_size,
            config.rwnd,
            reporting,
        ),
    };

    topology.run(config.iterations).context("simulation run failed")?;

    let stats = topology.stats();
    let csv_path = Path::new(&tcpsim::stats_writer::file_name(&config));
    if let Err(e) = tcpsim::stats_writer::append_row(csv_path, &config, &stats) {
        log::warn!("failed to write {}: {e}", csv_path.display());
    }

    println!("iterations:            {}", config.iterations);
    println!("senders:                {}", config.clients);
    println!("routers:                {}", config.routers);
    println!("throughput (MB/RTTs):   {:.6}", stats.throughput_mb_per_rtt(config.iterations));
    println!("retransmission ratio %: {:.6}", stats.retransmission_ratio_pct());
    println!("timeouts:               {}", stats.timeouts);

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
