//! bpsim CLI
//!
//! Run batch simulations of the built-in scenarios or of a model file.

use std::path::PathBuf;

use bpsim_core::{BatchConfig, BatchResult, Definitions, HeatmapCounts, ProcessGraph};
use bpsim_sim::input::{load_config, load_model};
use bpsim_sim::{BatchRunner, RunError, ScenarioId};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// bpsim batch simulation CLI
#[derive(Parser, Debug)]
#[command(name = "bpsim")]
#[command(about = "Discrete-event batch simulation of process models", long_about = None)]
struct Args {
    /// Scenario to run (single_task, weighted_gateway, boundary_timeout, timer_message, arrival_stream, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Process model JSON (definitions tree); replaces --scenario
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Batch configuration JSON for --model
    #[arg(short, long, requires = "model")]
    config: Option<PathBuf>,

    /// Base seed (overrides the configuration)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of replications (overrides the configuration)
    #[arg(short, long)]
    replications: Option<u32>,

    /// Run replications in parallel
    #[arg(short, long)]
    parallel: bool,

    /// Print full results as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// One batch in the JSON report.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReport {
    scenario_id: String,
    seed: u64,
    replications: u32,
    heatmap: HeatmapCounts,
    #[serde(flatten)]
    result: BatchResult,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if let Err(e) = run(&args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), RunError> {
    let batches = inputs(args)?;

    let mut reports = Vec::with_capacity(batches.len());
    for (definitions, mut config) in batches {
        if let Some(seed) = args.seed {
            config.seed = seed;
        }
        if let Some(replications) = args.replications {
            config.replications = replications;
        }

        let graph = ProcessGraph::build(&definitions)?;
        let result = BatchRunner::new(&graph, &config)
            .with_parallel(args.parallel)
            .run_configured()?;

        if !args.json {
            log_summary(&config, &result);
        }

        reports.push(RunReport {
            scenario_id: config.scenario_id.clone(),
            seed: config.seed,
            replications: config.effective_replications(),
            heatmap: HeatmapCounts::from_events(&result.events),
            result,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    Ok(())
}

/// Models and configurations selected on the command line.
fn inputs(args: &Args) -> Result<Vec<(Definitions, BatchConfig)>, RunError> {
    if let Some(model) = &args.model {
        let definitions = load_model(model)?;
        let mut config = match &args.config {
            Some(path) => load_config(path)?,
            None => BatchConfig::default(),
        };
        if config.scenario_id == BatchConfig::default().scenario_id {
            if let Some(stem) = model.file_stem().and_then(|s| s.to_str()) {
                config.scenario_id = stem.to_string();
            }
        }
        return Ok(vec![(definitions, config)]);
    }

    let scenarios = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse::<ScenarioId>() {
            Ok(id) => vec![id],
            Err(e) => {
                error!("{}", e);
                let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
                error!("Available scenarios: {}, all", names.join(", "));
                std::process::exit(1);
            }
        }
    };

    Ok(scenarios
        .into_iter()
        .map(|id| {
            debug!("{}: {}", id, id.description());
            let scenario = id.build();
            (scenario.definitions, scenario.config)
        })
        .collect())
}

fn log_summary(config: &BatchConfig, result: &BatchResult) {
    info!(
        "{} (seed={}, {} replication(s))",
        config.scenario_id,
        config.seed,
        config.effective_replications()
    );
    for s in &result.summary {
        info!(
            "  rep {:>3} | end {:>10.3} | completed {:>5} | throughput {:.4} | avg WIP {:.4} | events {}",
            s.replication, s.sim_end_time, s.completed_cases, s.throughput, s.avg_wip, s.processed_events
        );
    }
    for p in result.paths.iter().filter(|p| p.replication == 1) {
        info!(
            "  path {} -> {}: {}/{} ({:.3})",
            p.gateway_id, p.flow_id, p.traversals, p.total_gateway_exits, p.path_probability
        );
    }
}
