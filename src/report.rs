use std::fmt::Write;

use nalgebra::DMatrix;

use crate::config::GoldConfig;
use crate::error::GoldResult;
use crate::factor;
use crate::models::{BootstrapResult, ScenarioResult, WeatherSummary};
use crate::writer::{self, GoldWriter, Stage, StageManifest};

/// Committed Gold tables that passed the dependency check.
#[derive(Debug, Clone)]
pub struct GoldArtifacts {
    pub manifests: Vec<StageManifest>,
    pub variables: Vec<String>,
    pub loadings: DMatrix<f64>,
    pub scenarios: Vec<ScenarioResult>,
    pub bootstrap: Vec<BootstrapResult>,
}

/// Verifies every stage against the current input and configuration, then
/// reads the committed tables back. Stages run for a subset of the
/// configured scenarios or variables are rejected as stale.
pub fn load_artifacts(
    writer: &GoldWriter,
    input_fingerprint: &str,
    config: &GoldConfig,
) -> GoldResult<GoldArtifacts> {
    let config_fingerprint = config.fingerprint()?;
    let manifests = Stage::ALL
        .iter()
        .map(|stage| writer.verify_stage(*stage, input_fingerprint, &config_fingerprint))
        .collect::<GoldResult<Vec<_>>>()?;
    for manifest in &manifests {
        match manifest.stage {
            Stage::Scenarios => {
                let names: Vec<String> = config
                    .scenarios
                    .iter()
                    .map(|scenario| scenario.name.clone())
                    .collect();
                GoldWriter::verify_selection(manifest, &names)?;
            }
            Stage::Bootstrap => {
                GoldWriter::verify_selection(manifest, &config.bootstrap_variables)?;
            }
            Stage::Factors => {}
        }
    }
    let (variables, loadings) =
        writer::loadings_from_batch(&writer.read_table(writer::FACTOR_LOADINGS_FILE)?)?;
    let scenarios = writer::scenarios_from_batch(&writer.read_table(writer::SCENARIO_FILE)?)?;
    let bootstrap = writer::bootstrap_from_batch(&writer.read_table(writer::BOOTSTRAP_FILE)?)?;
    Ok(GoldArtifacts {
        manifests,
        variables,
        loadings,
        scenarios,
        bootstrap,
    })
}

pub fn build_report(
    source: &str,
    weather: &[WeatherSummary],
    artifacts: &GoldArtifacts,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Traffic & Weather Gold Report");
    let _ = writeln!(output, "Generated from {source}");
    for manifest in &artifacts.manifests {
        let _ = writeln!(
            output,
            "- {}: run {} at {} (seed {}, {} rows)",
            manifest.stage,
            manifest.run_id,
            manifest.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            manifest.random_seed,
            manifest.rows
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weather Mix");
    if weather.is_empty() {
        let _ = writeln!(output, "No observations recorded.");
    } else {
        for summary in weather {
            let _ = writeln!(
                output,
                "- {}: {} observations (avg traffic {:.1})",
                summary.weather_category, summary.count, summary.avg_traffic
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Strongest Factor Loadings");
    let top = factor::top_loadings(&artifacts.variables, &artifacts.loadings, 2);
    if top.is_empty() {
        let _ = writeln!(output, "No factors extracted.");
    }
    for entries in &top {
        let listed: Vec<String> = entries
            .iter()
            .map(|entry| format!("{} ({:+.3})", entry.variable, entry.loading))
            .collect();
        if let Some(first) = entries.first() {
            let _ = writeln!(output, "- Factor {}: {}", first.factor, listed.join(", "));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weather Scenarios");
    if artifacts.scenarios.is_empty() {
        let _ = writeln!(output, "No scenarios simulated.");
    } else {
        let _ = writeln!(
            output,
            "| scenario | mean | std | congestion | accident risk | draws |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|");
        for row in &artifacts.scenarios {
            let _ = writeln!(
                output,
                "| {} | {:.1} | {:.1} | {:.1}% | {:.2}% | {} |",
                row.scenario_name,
                row.mean,
                row.std,
                row.congestion_probability * 100.0,
                row.accident_risk * 100.0,
                row.simulation_count
            );
        }
        if let Some(first) = artifacts.scenarios.first() {
            let _ = writeln!(output, "Congestion threshold: {:.0} vehicles.", first.threshold);
        }
        for row in &artifacts.scenarios {
            if let Some(description) = &row.description {
                let _ = writeln!(output, "- {}: {}", row.scenario_name, description);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Bootstrap Intervals");
    if artifacts.bootstrap.is_empty() {
        let _ = writeln!(output, "No variables resampled.");
    }
    for row in &artifacts.bootstrap {
        let _ = writeln!(
            output,
            "- {}: {:.4} (sd {:.4}), {:.0}% CI [{:.4}, {:.4}] over {} resamples",
            row.variable_name,
            row.mean_estimate,
            row.std_estimate,
            row.confidence_level * 100.0,
            row.ci_lower,
            row.ci_upper,
            row.iteration_count
        );
    }

    output
}
