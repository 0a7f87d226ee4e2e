use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bootstrap::BootstrapSettings;
use crate::error::{GoldError, GoldResult};
use crate::models::Scenario;
use crate::scenario::{AccidentRiskModel, SimulationSettings};

/// Every option the Gold stage recognizes. All fields apart from scenario
/// descriptions are required in a config file; unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoldConfig {
    pub num_factors: usize,
    pub congestion_threshold: f64,
    pub simulation_count: usize,
    pub bootstrap_iterations: usize,
    pub confidence_level: f64,
    pub random_seed: u64,
    pub traffic_metric: String,
    pub bootstrap_variables: Vec<String>,
    pub accident_risk: AccidentRiskModel,
    pub scenarios: Vec<Scenario>,
}

impl Default for GoldConfig {
    fn default() -> Self {
        Self {
            num_factors: 5,
            congestion_threshold: 12_739.0,
            simulation_count: 10_000,
            bootstrap_iterations: 5_000,
            confidence_level: 0.95,
            random_seed: 42,
            traffic_metric: "vehicle_count".to_string(),
            bootstrap_variables: vec![
                "vehicle_count".to_string(),
                "avg_speed_kmh".to_string(),
                "accident_count".to_string(),
                "visibility_m".to_string(),
            ],
            accident_risk: AccidentRiskModel::Linear { sensitivity: 1.0 },
            scenarios: vec![
                scenario("sunny", "Clear weather, normal conditions", 1.1, 0.0175),
                scenario("rainy", "Heavy rain, reduced visibility", 0.9, 0.04),
                scenario("foggy", "Dense fog, low visibility", 0.8, 0.0525),
                scenario("snowy", "Snow/ice conditions, severe impact", 0.7, 0.07),
            ],
        }
    }
}

fn scenario(name: &str, description: &str, mean_multiplier: f64, probability: f64) -> Scenario {
    Scenario {
        name: name.to_string(),
        description: Some(description.to_string()),
        mean_multiplier,
        std_multiplier: 1.0,
        base_accident_probability: probability,
    }
}

impl GoldConfig {
    pub fn load(path: &Path) -> GoldResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parses and validates a JSON config document.
    pub fn from_json(raw: &str) -> GoldResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| GoldError::configuration(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GoldResult<()> {
        if self.num_factors < 1 {
            return Err(GoldError::configuration("num_factors must be at least 1"));
        }
        if !self.congestion_threshold.is_finite() {
            return Err(GoldError::configuration("congestion_threshold must be finite"));
        }
        validate_simulation_count(self.simulation_count)?;
        validate_iterations(self.bootstrap_iterations)?;
        validate_confidence(self.confidence_level)?;
        if self.traffic_metric.trim().is_empty() {
            return Err(GoldError::configuration("traffic_metric must name a column"));
        }
        if self.bootstrap_variables.is_empty() {
            return Err(GoldError::configuration(
                "bootstrap_variables must list at least one column",
            ));
        }
        let mut seen = HashSet::new();
        for variable in &self.bootstrap_variables {
            if !seen.insert(variable.as_str()) {
                return Err(GoldError::configuration(format!(
                    "bootstrap variable `{variable}` is listed twice"
                )));
            }
        }
        self.accident_risk.validate()?;

        if self.scenarios.is_empty() {
            return Err(GoldError::configuration("at least one scenario is required"));
        }
        let mut names = HashSet::new();
        for scenario in &self.scenarios {
            validate_scenario(scenario)?;
            if !names.insert(scenario.name.as_str()) {
                return Err(GoldError::configuration(format!(
                    "scenario `{}` is defined twice",
                    scenario.name
                )));
            }
        }
        Ok(())
    }

    /// Resolves a scenario selection. An empty selection means every
    /// configured scenario, in configuration order.
    pub fn select_scenarios(&self, names: &[String]) -> GoldResult<Vec<Scenario>> {
        if names.is_empty() {
            return Ok(self.scenarios.clone());
        }
        names
            .iter()
            .map(|name| {
                self.scenarios
                    .iter()
                    .find(|scenario| &scenario.name == name)
                    .cloned()
                    .ok_or_else(|| {
                        GoldError::configuration(format!("unknown scenario `{name}`"))
                    })
            })
            .collect()
    }

    pub fn select_variables(&self, names: &[String]) -> Vec<String> {
        if names.is_empty() {
            self.bootstrap_variables.clone()
        } else {
            names.to_vec()
        }
    }

    pub fn simulation_settings(&self) -> SimulationSettings {
        SimulationSettings {
            traffic_metric: self.traffic_metric.clone(),
            threshold: self.congestion_threshold,
            simulation_count: self.simulation_count,
            seed: self.random_seed,
            accident_risk: self.accident_risk,
        }
    }

    pub fn bootstrap_settings(&self) -> BootstrapSettings {
        BootstrapSettings {
            iterations: self.bootstrap_iterations,
            confidence: self.confidence_level,
            seed: self.random_seed,
        }
    }

    /// BLAKE3 digest of the canonical JSON form, recorded in stage manifests.
    pub fn fingerprint(&self) -> GoldResult<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

pub fn validate_simulation_count(count: usize) -> GoldResult<()> {
    if count < 1 {
        return Err(GoldError::configuration("simulation_count must be at least 1"));
    }
    Ok(())
}

pub fn validate_iterations(iterations: usize) -> GoldResult<()> {
    if iterations < 1 {
        return Err(GoldError::configuration("bootstrap_iterations must be at least 1"));
    }
    Ok(())
}

pub fn validate_confidence(confidence: f64) -> GoldResult<()> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(GoldError::configuration(format!(
            "confidence_level must be strictly between 0 and 1, got {confidence}"
        )));
    }
    Ok(())
}

pub fn validate_scenario(scenario: &Scenario) -> GoldResult<()> {
    if scenario.name.trim().is_empty() {
        return Err(GoldError::configuration("scenario name must not be empty"));
    }
    let finite_non_negative = |value: f64| value.is_finite() && value >= 0.0;
    if !finite_non_negative(scenario.mean_multiplier) {
        return Err(GoldError::configuration(format!(
            "scenario `{}`: mean_multiplier must be finite and non-negative",
            scenario.name
        )));
    }
    if !finite_non_negative(scenario.std_multiplier) {
        return Err(GoldError::configuration(format!(
            "scenario `{}`: std_multiplier must be finite and non-negative",
            scenario.name
        )));
    }
    if !(0.0..=1.0).contains(&scenario.base_accident_probability) {
        return Err(GoldError::configuration(format!(
            "scenario `{}`: base_accident_probability must lie in [0, 1]",
            scenario.name
        )));
    }
    Ok(())
}
