use std::collections::HashSet;

use rand::distributions::Distribution;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::config::{validate_scenario, validate_simulation_count};
use crate::error::{GoldError, GoldResult};
use crate::models::{Baseline, ObservationTable, Scenario, ScenarioResult};
use crate::stats;

/// Maps how far a scenario's traffic falls below the baseline to a
/// multiplier on its base accident probability.
///
/// `deviation = 1 - scenario_mean / baseline_mean`: positive when traffic
/// drops. Both models are non-decreasing in the deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case", deny_unknown_fields)]
pub enum AccidentRiskModel {
    /// `max(0, 1 + sensitivity * deviation)`
    Linear { sensitivity: f64 },
    /// `exp(sensitivity * deviation)`
    Exponential { sensitivity: f64 },
}

impl AccidentRiskModel {
    pub fn validate(&self) -> GoldResult<()> {
        let sensitivity = match self {
            Self::Linear { sensitivity } | Self::Exponential { sensitivity } => *sensitivity,
        };
        if !(sensitivity.is_finite() && sensitivity >= 0.0) {
            return Err(GoldError::configuration(format!(
                "accident_risk sensitivity must be finite and non-negative, got {sensitivity}"
            )));
        }
        Ok(())
    }

    pub fn multiplier(&self, deviation: f64) -> f64 {
        match self {
            Self::Linear { sensitivity } => (1.0 + sensitivity * deviation).max(0.0),
            Self::Exponential { sensitivity } => (sensitivity * deviation).exp(),
        }
    }

    pub fn accident_risk(&self, scenario: &Scenario, baseline: &Baseline) -> f64 {
        let deviation = if baseline.mean == 0.0 {
            0.0
        } else {
            1.0 - (baseline.mean * scenario.mean_multiplier) / baseline.mean
        };
        (scenario.base_accident_probability * self.multiplier(deviation)).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    pub traffic_metric: String,
    pub threshold: f64,
    pub simulation_count: usize,
    pub seed: u64,
    pub accident_risk: AccidentRiskModel,
}

/// Sample mean and sample standard deviation of the traffic metric.
pub fn fit_baseline(table: &ObservationTable, traffic_metric: &str) -> GoldResult<Baseline> {
    let values = table.require_numeric(traffic_metric)?;
    if values.is_empty() {
        return Err(GoldError::data_quality("observation table is empty"));
    }
    Ok(Baseline {
        mean: values.iter().mean(),
        std: stats::sample_std(values),
    })
}

/// Runs every scenario against the baseline fitted from `table`. Rows come
/// back in the order the scenarios were given.
pub fn simulate(
    table: &ObservationTable,
    scenarios: &[Scenario],
    settings: &SimulationSettings,
) -> GoldResult<Vec<ScenarioResult>> {
    validate_simulation_count(settings.simulation_count)?;
    settings.accident_risk.validate()?;
    if !settings.threshold.is_finite() {
        return Err(GoldError::configuration("congestion_threshold must be finite"));
    }
    if scenarios.is_empty() {
        return Err(GoldError::configuration("no scenarios selected"));
    }
    let mut names = HashSet::new();
    for scenario in scenarios {
        validate_scenario(scenario)?;
        if !names.insert(scenario.name.as_str()) {
            return Err(GoldError::configuration(format!(
                "scenario `{}` selected twice",
                scenario.name
            )));
        }
    }

    let baseline = fit_baseline(table, &settings.traffic_metric)?;
    info!(
        metric = %settings.traffic_metric,
        baseline_mean = baseline.mean,
        baseline_std = baseline.std,
        scenarios = scenarios.len(),
        "simulating weather scenarios"
    );

    scenarios
        .par_iter()
        .map(|scenario| simulate_scenario(&baseline, scenario, settings))
        .collect()
}

pub fn simulate_scenario(
    baseline: &Baseline,
    scenario: &Scenario,
    settings: &SimulationSettings,
) -> GoldResult<ScenarioResult> {
    let samples = draw_samples(baseline, scenario, settings.simulation_count, settings.seed)?;
    let congested = samples
        .iter()
        .filter(|value| **value > settings.threshold)
        .count();
    let result = ScenarioResult {
        scenario_name: scenario.name.clone(),
        description: scenario.description.clone(),
        mean: samples.iter().mean(),
        std: stats::population_std(&samples),
        congestion_probability: congested as f64 / samples.len() as f64,
        accident_risk: settings.accident_risk.accident_risk(scenario, baseline),
        threshold: settings.threshold,
        simulation_count: samples.len() as u64,
    };
    debug!(
        scenario = %result.scenario_name,
        congestion = result.congestion_probability,
        accident_risk = result.accident_risk,
        "scenario simulated"
    );
    Ok(result)
}

/// Draws `count` traffic volumes for one scenario. Negative draws are
/// clipped to zero, never redrawn.
pub fn draw_samples(
    baseline: &Baseline,
    scenario: &Scenario,
    count: usize,
    seed: u64,
) -> GoldResult<Vec<f64>> {
    validate_simulation_count(count)?;
    let mean = baseline.mean * scenario.mean_multiplier;
    let std = baseline.std * scenario.std_multiplier;
    let clip = |value: f64| if value < 0.0 { 0.0 } else { value };

    if std == 0.0 {
        return Ok(vec![clip(mean); count]);
    }
    let normal = Normal::new(mean, std).map_err(|err| {
        GoldError::numerical(format!(
            "scenario `{}`: invalid normal parameters ({mean}, {std}): {err}",
            scenario.name
        ))
    })?;
    let mut rng = stats::keyed_rng(seed, "scenario", &scenario.name);
    Ok((0..count).map(|_| clip(normal.sample(&mut rng))).collect())
}
