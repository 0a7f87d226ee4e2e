use chrono::NaiveDateTime;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct NumericColumn {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextColumn {
    pub name: String,
    pub values: Vec<String>,
}

/// Cleaned traffic + weather observations, stored column-wise.
///
/// Every column holds exactly one value per observation; the observation id
/// is the row position.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationTable {
    pub timestamps: Vec<NaiveDateTime>,
    pub location_ids: Vec<String>,
    pub weather_categories: Vec<String>,
    pub numeric: Vec<NumericColumn>,
    pub text: Vec<TextColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorLoading {
    pub variable: String,
    pub factor: usize,
    pub loading: f64,
}

/// Output of one factor extraction.
///
/// `loadings` is variables × factors, `scores` is observations × factors.
/// Factor columns are ordered by descending eigenvalue.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorExtraction {
    pub variables: Vec<String>,
    pub eigenvalues: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
    pub loadings: DMatrix<f64>,
    pub scores: DMatrix<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub mean_multiplier: f64,
    pub std_multiplier: f64,
    pub base_accident_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub description: Option<String>,
    pub mean: f64,
    pub std: f64,
    pub congestion_probability: f64,
    pub accident_risk: f64,
    pub threshold: f64,
    pub simulation_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapResult {
    pub variable_name: String,
    pub mean_estimate: f64,
    pub std_estimate: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub confidence_level: f64,
    pub iteration_count: u64,
}

#[derive(Debug, Clone)]
pub struct WeatherSummary {
    pub weather_category: String,
    pub count: usize,
    pub avg_traffic: f64,
}
