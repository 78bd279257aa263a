// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command line driver for failure sweeps.

use anyhow::{bail, Context};
use camino::Utf8PathBuf;
use clap::Parser;
use rbn_network::expand;
use rbn_network::Template;
use rbn_simulation::Simulation;
use rbn_simulation::SimulationConfig;
use rbn_simulation::TriggerCounterConfig;
use slog::{info, Logger};

mod report;

pub use report::render_report;

/// Expand a template graph into a random Boolean network and measure how it
/// degrades as more of its instances fail.
#[derive(Debug, Parser)]
#[command(name = "rbn-sim", version)]
pub struct Args {
    /// Template graph in Graphviz DOT format
    pub template: Utf8PathBuf,

    /// TOML file with simulation settings. Flags override values from it.
    #[clap(long)]
    pub config: Option<Utf8PathBuf>,

    /// Number of stages; stage `s` fails `s` instances per trial
    #[clap(short = 's', long)]
    pub stages: Option<usize>,

    /// Trials per stage
    #[clap(short = 'r', long)]
    pub runs: Option<usize>,

    /// Step budget per trial
    #[clap(short = 't', long)]
    pub steps: Option<usize>,

    /// Base seed for reproducible sweeps
    #[clap(long)]
    pub seed: Option<u64>,

    /// Count distinct triggers exactly instead of estimating them
    #[clap(long)]
    pub exact_triggers: bool,

    /// Simulate this many independent copies of the template
    #[clap(long)]
    pub replicas: Option<usize>,

    /// Print the summary as JSON instead of text
    #[clap(long)]
    pub json: bool,

    /// Log level (critical, error, warn, info, debug or trace)
    #[clap(long, default_value = "info", value_parser = parse_log_level)]
    pub log_level: slog::Level,
}

fn parse_log_level(s: &str) -> Result<slog::Level, String> {
    s.parse().map_err(|()| format!("unknown log level \"{s}\""))
}

impl Args {
    /// Build the simulation configuration: the config file if given, or
    /// defaults, with command line overrides applied.
    pub fn simulation_config(&self) -> anyhow::Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_file(path)
                .with_context(|| format!("loading config {path}"))?,
            None => SimulationConfig::default(),
        };
        if let Some(stages) = self.stages {
            config.num_stages = stages;
        }
        if let Some(runs) = self.runs {
            config.num_runs_per_stage = runs;
        }
        if let Some(steps) = self.steps {
            config.num_steps_per_run = steps;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if self.exact_triggers {
            config.trigger_counter = TriggerCounterConfig::Exact;
        }
        config.validate().context("invalid simulation config")?;
        Ok(config)
    }

    /// Load the template, replicated if requested.
    pub fn load_template(&self) -> anyhow::Result<Template> {
        let path = &self.template;
        if path.extension() != Some("dot") {
            bail!("template {path} is not a .dot file");
        }
        if !path.is_file() {
            bail!("template {path} does not exist");
        }
        let template = Template::from_file(path)
            .with_context(|| format!("loading template {path}"))?;
        match self.replicas {
            Some(replicas) => template
                .replicate(replicas)
                .with_context(|| format!("replicating template {path}")),
            None => Ok(template),
        }
    }
}

/// Run the sweep described by `args` and return the report to print.
pub fn run(log: &Logger, args: &Args) -> anyhow::Result<String> {
    let config = args.simulation_config()?;
    let template = args.load_template()?;
    let network = expand(log, &template).context("expanding template")?;
    info!(log, "loaded template"; "path" => %args.template);

    let simulation = Simulation::new(log, &network, config)
        .context("configuring simulation")?;
    let summary = simulation.run().context("running simulation")?;
    if args.json {
        let mut json = serde_json::to_string_pretty(&summary)
            .context("serializing summary")?;
        json.push('\n');
        Ok(json)
    } else {
        Ok(render_report(&summary))
    }
}
