use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

mod bgp;
mod clock;
mod config;
mod error;
mod fault;
mod rib;
mod scenario;
mod speaker;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Opt {
    #[arg(short, long, value_parser, default_value = "scenario.toml")]
    config: PathBuf,

    /// Override the scenario's stop time, in seconds.
    #[arg(short, long, value_parser)]
    stop: Option<f64>,

    /// Exit with an error if an action failed or a fault was not observed.
    #[arg(long)]
    strict: bool,

    /// After the run, print what ASN selected for PREFIX. Repeatable.
    #[arg(short, long, value_name = "ASN=PREFIX", value_parser = parse_lookup)]
    lookup: Vec<(bgp::Asn, bgp::Prefix)>,
}

fn parse_lookup(s: &str) -> Result<(bgp::Asn, bgp::Prefix), String> {
    let (asn, prefix) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ASN=PREFIX, got '{}'", s))?;
    let asn = asn
        .trim()
        .trim_start_matches("AS")
        .parse()
        .map_err(|e| format!("invalid AS number '{}': {}", asn, e))?;
    let prefix = prefix.parse().map_err(|e: error::RouteError| e.to_string())?;
    Ok((asn, prefix))
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::parse();

    let mut config = config::read_config(&opt.config)
        .with_context(|| format!("failed to load scenario {}", opt.config.display()))?;

    if let Some(stop) = opt.stop {
        config::seconds(stop).context("invalid --stop")?;
        config.stop_time = Some(stop);
    }

    let mut scenario = scenario::Scenario::from_config(&config)
        .with_context(|| format!("failed to build scenario {}", opt.config.display()))?;
    log::debug!("{:?}", scenario.settings());
    let report = scenario.run();
    print!("{}", report);

    if !opt.lookup.is_empty() {
        println!("\n=== LOOKUPS ===");
    }
    for (asn, prefix) in &opt.lookup {
        match scenario.select(*asn, prefix) {
            Ok(route) => println!("AS{} {}: {}", asn, prefix, route),
            Err(e) => println!("AS{} {}: {}", asn, prefix, e),
        }
    }

    if opt.strict && !report.is_clean() {
        bail!(
            "{} failed actions, {} unobserved faults",
            report.failures.len(),
            report.faults.iter().filter(|f| f.verdict.is_err()).count()
        );
    }
    Ok(())
}
