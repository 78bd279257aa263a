// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Text reports.

use rbn_simulation::Attractor;
use rbn_simulation::SimulationSummary;
use rbn_simulation::StageSummary;
use swrite::{swrite, swriteln, SWrite};
use tabled::builder::Builder;
use tabled::settings::Padding;
use tabled::settings::Style;
use tabled::Table;
use tabled::Tabled;

fn percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn styled(mut table: Table) -> String {
    table.with(Style::empty()).with(Padding::new(0, 1, 0, 0));
    let mut out = String::new();
    for line in table.to_string().lines() {
        swriteln!(out, "    {}", line.trim_end());
    }
    out
}

fn stage_section(out: &mut String, stage: &StageSummary) {
    swriteln!(
        out,
        "stage {}: {} failed, {} runs, {} reached an attractor",
        stage.stage,
        stage.failures,
        stage.runs,
        stage.runs_with_attractor,
    );

    #[derive(Tabled)]
    #[tabled(rename_all = "SCREAMING_SNAKE_CASE")]
    struct HealthRow<'a> {
        node_type: &'a str,
        health: String,
    }

    let rows = stage.type_health.iter().map(|(node_type, health)| HealthRow {
        node_type: node_type.as_str(),
        health: percent(*health),
    });
    swrite!(out, "{}", styled(Table::new(rows)));
    if let Some(average) = stage.health_indicator_average {
        swriteln!(out, "    health indicators: {}", percent(average));
    }
}

fn attractor_section(out: &mut String, summary: &SimulationSummary) {
    let attractors = &summary.attractors;
    swriteln!(
        out,
        "attractors: {} found, {} of runs reached one",
        attractors.count(),
        percent(ratio(summary.runs_with_attractor, summary.total_runs())),
    );
    if attractors.is_empty() {
        return;
    }

    #[derive(Tabled)]
    #[tabled(rename_all = "SCREAMING_SNAKE_CASE")]
    struct AttractorRow {
        id: String,
        length: usize,
        occurrences: u64,
        triggers: u64,
        dominance: String,
        states: String,
    }

    let total = attractors.total_runs();
    let mut sorted: Vec<&Attractor> = attractors.iter().collect();
    sorted.sort_by(|a, b| b.occurrences().cmp(&a.occurrences()));
    let rows = sorted.into_iter().map(|attractor| AttractorRow {
        id: attractor.id().short(),
        length: attractor.len(),
        occurrences: attractor.occurrences(),
        triggers: attractor.distinct_triggers(),
        dominance: percent(ratio(attractor.occurrences(), total)),
        states: attractor
            .cycle()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> "),
    });
    swrite!(out, "{}", styled(Table::new(rows)));
    swriteln!(
        out,
        "    state digits follow node types: {}",
        attractors.node_types().join(", ")
    );
}

fn incidence_section(out: &mut String, summary: &SimulationSummary) {
    let matrix = summary.attractors.incidence();
    if matrix.attractors.is_empty() {
        return;
    }
    swriteln!(out, "node types stuck failed per attractor:");

    let mut builder = Builder::default();
    builder.push_record(
        std::iter::once("ATTRACTOR".to_string())
            .chain(matrix.node_types.iter().cloned())
            .chain(std::iter::once("TOTAL".to_string())),
    );
    for ((id, cells), total) in
        matrix.attractors.iter().zip(&matrix.cells).zip(matrix.row_totals())
    {
        builder.push_record(
            std::iter::once(id.short())
                .chain(cells.iter().map(|c| u8::from(*c).to_string()))
                .chain(std::iter::once(total.to_string())),
        );
    }
    builder.push_record(
        std::iter::once("TOTAL".to_string())
            .chain(matrix.column_totals().iter().map(ToString::to_string))
            .chain(std::iter::once(String::new())),
    );
    swrite!(out, "{}", styled(builder.build()));
}

/// Render a sweep summary as plain text.
pub fn render_report(summary: &SimulationSummary) -> String {
    let mut out = String::new();
    for stage in &summary.stages {
        stage_section(&mut out, stage);
        out.push('\n');
    }
    attractor_section(&mut out, summary);
    out.push('\n');
    incidence_section(&mut out, summary);
    swriteln!(out, "kauffman parameters (seed {}):", summary.seed);
    swriteln!(out, "    N     = {}", summary.n);
    swriteln!(out, "    K     = {:.2}", summary.average_k);
    swriteln!(out, "    K_max = {}", summary.max_k);
    swriteln!(out, "    P     = {:.4}", summary.p);
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use rbn_network::expand;
    use rbn_network::Template;
    use rbn_simulation::Simulation;
    use rbn_simulation::SimulationConfig;
    use rbn_simulation::TriggerCounterConfig;
    use rbn_test_utils::dev::test_setup_log;

    const STORAGE: &str = r#"
        digraph Storage {
            Disk [instances=4];
            HealthArray [func="majority(Disk)"];
            Disk -> Disk [label="1 to self"];
            HealthArray -> Disk;
        }
    "#;

    #[test]
    fn test_render_report() {
        let logctx = test_setup_log("test_render_report");
        let template = Template::from_dot(STORAGE).unwrap();
        let network = expand(&logctx.log, &template).unwrap();
        let config = SimulationConfig {
            num_stages: 5,
            num_runs_per_stage: 100,
            num_steps_per_run: 10,
            seed: Some(42),
            trigger_counter: TriggerCounterConfig::Exact,
        };
        let summary = Simulation::new(&logctx.log, &network, config)
            .unwrap()
            .run()
            .unwrap();
        let report = render_report(&summary);
        println!("{report}");

        assert!(report.contains("stage 0: 0 failed, 100 runs"));
        assert!(report.contains("stage 3: 3 failed, 100 runs"));
        assert!(report.contains("health indicators: 100.00%"));
        assert!(report.contains("attractors: 3 found, 100.00% of runs"));
        assert!(report.contains("NODE_TYPE"));
        assert!(report.contains("DOMINANCE"));
        assert!(report.contains("60.00%"));
        assert!(report.contains("node types: Disk, HealthArray"));
        assert!(report.contains("N     = 5"));
        assert!(report.contains("K     = 1.60"));
        assert!(report.contains("K_max = 2"));

        // The most common attractor is listed first.
        let healthy = summary
            .attractors
            .iter()
            .find(|a| a.occurrences() == 300)
            .unwrap()
            .id()
            .short();
        let failed = summary
            .attractors
            .iter()
            .find(|a| a.occurrences() == 100)
            .unwrap()
            .id()
            .short();
        assert!(report.find(&failed).unwrap() > report.find(&healthy).unwrap());
        logctx.cleanup_successful();
    }
}
