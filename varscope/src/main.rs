//! VarScope runner
//!
//! Runs a small scoped-counter test plan on a group of concurrent actors and
//! prints what each actor observed.

use anyhow::Result;
use clap::Parser;
use std::collections::HashMap;
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info};
use varscope::{ConfigError, ScopePolicy, ThreadGroup, scoped_counter_plan};

#[derive(Debug, Parser)]
#[command(version, about = "Run a scoped-variable test plan on concurrent actors")]
struct Args {
    /// Number of concurrent actors
    #[arg(long, default_value_t = 2)]
    actors: usize,

    /// Plan iterations per actor
    #[arg(long, default_value_t = 1)]
    iterations: u64,

    /// Loop count around the scope controller
    #[arg(long, default_value_t = 3)]
    loops: u32,

    /// Variable policy applied when the scope ends
    #[arg(long, default_value_t = ScopePolicy::Merge)]
    policy: ScopePolicy,

    /// Thread group name, used as actor name prefix
    #[arg(long, default_value = "Thread Group")]
    group_name: String,

    /// Define a property (name=value) preloaded into every actor
    #[arg(short = 'J', value_parser = parse_property)]
    properties: Vec<(String, String)>,

    /// Print each actor's variables at the end of the run
    #[arg(long)]
    dump: bool,
}

fn parse_property(s: &str) -> Result<(String, String), ConfigError> {
    s.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| ConfigError::InvalidProperty(s.to_string()))
}

fn main() -> ExitCode {
    let log_level = std::env::var("VARSCOPE_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Run failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut properties: HashMap<String, String> = args.properties.into_iter().collect();
    let now_ms = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis().to_string();
    properties
        .entry("START.MS".to_string())
        .or_insert_with(|| now_ms.clone());
    properties.entry("TESTSTART.MS".to_string()).or_insert(now_ms);

    let plan = scoped_counter_plan(args.loops, args.policy);
    info!("Running plan '{}' with policy {}", plan.name, args.policy);

    let group = ThreadGroup {
        properties,
        ..ThreadGroup::new(args.group_name, args.actors, args.iterations)
    };
    let reports = group.run(&plan)?;

    for report in &reports {
        let seen: Vec<String> = report
            .observations
            .iter()
            .map(|o| {
                let value = o.value.as_ref().map_or("<absent>".to_string(), ToString::to_string);
                format!("{}={}", o.name, value)
            })
            .collect();
        println!(
            "{}: {} iterations, {} errors, observed [{}]",
            report.name,
            report.iterations,
            report.errors.len(),
            seen.join(", ")
        );

        if args.dump {
            for (name, value) in report.variables.entries() {
                println!("    {name}={value}");
            }
        }
    }
    Ok(())
}
