// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Argument handling and end-to-end runs of the command line driver.

use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use clap::Parser;
use rbn_sim::Args;
use rbn_simulation::TriggerCounterConfig;
use rbn_test_utils::dev::test_setup_log;

const DATA_CENTER: &str = r#"
digraph DataCenter {
    Grid [label="Utility Grid", func="true"];
    Power [instances=2, func="one(Grid)"];
    Rack [instances=4, func="one(Power) & one(Cooling)"];
    Cooling [instances=2, func="majority(Power)"];
    HealthMonitor [func="75%(Rack)"];

    Power -> Grid;
    Rack -> Power [label="1 to 1"];
    Rack -> Cooling [label="1 to n%2"];
    Cooling -> Power;
    HealthMonitor -> Rack;
}
"#;

fn write(dir: &Utf8TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path.into_string()
}

#[test]
fn test_defaults() {
    let args = Args::try_parse_from(["rbn-sim", "net.dot"]).unwrap();
    assert_eq!(args.template, Utf8Path::new("net.dot"));
    assert_eq!(args.log_level, slog::Level::Info);
    assert!(!args.json);

    let config = args.simulation_config().unwrap();
    assert_eq!(config.num_stages, 8);
    assert_eq!(config.num_runs_per_stage, 2000);
    assert_eq!(config.num_steps_per_run, 40);
    assert_eq!(config.seed, None);
}

#[test]
fn test_flags_override_config_file() {
    let dir = camino_tempfile::tempdir().unwrap();
    let config = write(
        &dir,
        "sim.toml",
        "num_stages = 3\nnum_runs_per_stage = 7\nseed = 9\n",
    );

    let args =
        Args::try_parse_from(["rbn-sim", "net.dot", "--config", &config])
            .unwrap();
    let loaded = args.simulation_config().unwrap();
    assert_eq!(loaded.num_stages, 3);
    assert_eq!(loaded.num_runs_per_stage, 7);
    assert_eq!(loaded.seed, Some(9));

    let args = Args::try_parse_from([
        "rbn-sim",
        "net.dot",
        "--config",
        &config,
        "-s",
        "2",
        "--runs",
        "11",
        "-t",
        "5",
        "--seed",
        "1",
        "--exact-triggers",
    ])
    .unwrap();
    let loaded = args.simulation_config().unwrap();
    assert_eq!(loaded.num_stages, 2);
    assert_eq!(loaded.num_runs_per_stage, 11);
    assert_eq!(loaded.num_steps_per_run, 5);
    assert_eq!(loaded.seed, Some(1));
    assert_eq!(loaded.trigger_counter, TriggerCounterConfig::Exact);
}

#[test]
fn test_bad_arguments() {
    assert!(Args::try_parse_from(["rbn-sim"]).is_err());
    assert!(Args::try_parse_from(["rbn-sim", "a.dot", "-s", "many"]).is_err());
    assert!(Args::try_parse_from([
        "rbn-sim",
        "a.dot",
        "--log-level",
        "loud"
    ])
    .is_err());

    let args = Args::try_parse_from(["rbn-sim", "a.dot", "-s", "0"]).unwrap();
    assert!(args.simulation_config().is_err());
}

#[test]
fn test_template_checks() {
    let dir = camino_tempfile::tempdir().unwrap();
    let text = write(&dir, "net.txt", DATA_CENTER);
    let args = Args::try_parse_from(["rbn-sim", &text]).unwrap();
    let err = args.load_template().unwrap_err();
    assert!(err.to_string().contains("is not a .dot file"), "{err:#}");

    let missing = dir.path().join("missing.dot").into_string();
    let args = Args::try_parse_from(["rbn-sim", &missing]).unwrap();
    let err = args.load_template().unwrap_err();
    assert!(err.to_string().contains("does not exist"), "{err:#}");

    let broken = write(&dir, "broken.dot", "digraph { A [func=\"bogus\"]; }");
    let args = Args::try_parse_from(["rbn-sim", &broken]).unwrap();
    let logctx = test_setup_log("test_template_checks");
    assert!(rbn_sim::run(&logctx.log, &args).is_err());
    logctx.cleanup_successful();
}

#[test]
fn test_run_text_report() {
    let logctx = test_setup_log("test_run_text_report");
    let dir = camino_tempfile::tempdir().unwrap();
    let template = write(&dir, "dc.dot", DATA_CENTER);
    let args = Args::try_parse_from([
        "rbn-sim",
        &template,
        "-s",
        "3",
        "-r",
        "20",
        "--seed",
        "5",
    ])
    .unwrap();
    let report = rbn_sim::run(&logctx.log, &args).unwrap();
    assert!(report.contains("stage 2: 2 failed, 20 runs"));
    assert!(report.contains("N     = 10"));
    assert!(report.contains("K     = 1.80"));
    assert!(report.contains("K_max = 4"));
    assert!(report.contains("kauffman parameters (seed 5)"));
    logctx.cleanup_successful();
}

#[test]
fn test_run_json_replicated() {
    let logctx = test_setup_log("test_run_json_replicated");
    let dir = camino_tempfile::tempdir().unwrap();
    let template = write(&dir, "dc.dot", DATA_CENTER);
    let args = Args::try_parse_from([
        "rbn-sim",
        &template,
        "-s",
        "2",
        "-r",
        "10",
        "--seed",
        "5",
        "--replicas",
        "2",
        "--json",
    ])
    .unwrap();
    let output = rbn_sim::run(&logctx.log, &args).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(summary["n"], 20);
    assert_eq!(summary["seed"], 5);
    assert_eq!(summary["stages"].as_array().unwrap().len(), 2);
    assert_eq!(summary["runs_with_attractor"], 20);
    assert!(summary["stages"][0]["type_health"]["Rack_2"].is_number());
    logctx.cleanup_successful();
}
