use std::collections::HashSet;

use rand::Rng;
use rayon::prelude::*;
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::config::{validate_confidence, validate_iterations};
use crate::error::{GoldError, GoldResult};
use crate::models::{BootstrapResult, ObservationTable};
use crate::stats;
use crate::table;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BootstrapSettings {
    pub iterations: usize,
    pub confidence: f64,
    pub seed: u64,
}

/// Bootstrap confidence intervals for the mean of each named variable.
/// Rows come back in the order the variables were given.
pub fn bootstrap(
    table: &ObservationTable,
    variables: &[String],
    settings: &BootstrapSettings,
) -> GoldResult<Vec<BootstrapResult>> {
    validate_iterations(settings.iterations)?;
    validate_confidence(settings.confidence)?;
    if variables.is_empty() {
        return Err(GoldError::configuration("no bootstrap variables selected"));
    }
    let mut seen = HashSet::new();
    let columns = variables
        .iter()
        .map(|name| {
            if !seen.insert(name.as_str()) {
                return Err(GoldError::configuration(format!(
                    "bootstrap variable `{name}` selected twice"
                )));
            }
            Ok((name.as_str(), table.require_numeric(name)?))
        })
        .collect::<GoldResult<Vec<_>>>()?;

    info!(
        variables = columns.len(),
        iterations = settings.iterations,
        confidence = settings.confidence,
        "bootstrapping variable means"
    );

    columns
        .par_iter()
        .map(|(name, values)| bootstrap_variable(name, values, settings))
        .collect()
}

pub fn bootstrap_variable(
    name: &str,
    values: &[f64],
    settings: &BootstrapSettings,
) -> GoldResult<BootstrapResult> {
    validate_iterations(settings.iterations)?;
    validate_confidence(settings.confidence)?;
    if values.is_empty() {
        return Err(GoldError::data_quality(format!(
            "variable `{name}` has no observations to resample"
        )));
    }
    table::ensure_finite(name, values)?;

    let mut rng = stats::keyed_rng(settings.seed, "bootstrap", name);
    let size = values.len();
    let mut means: Vec<f64> = (0..settings.iterations)
        .map(|_| {
            let total: f64 = (0..size).map(|_| values[rng.gen_range(0..size)]).sum();
            total / size as f64
        })
        .collect();

    let mean_estimate = means.iter().mean();
    let std_estimate = stats::population_std(&means);
    stats::sort_values(&mut means);
    let tail = (1.0 - settings.confidence) / 2.0;
    let lower = stats::percentile_sorted(&means, tail);
    let upper = stats::percentile_sorted(&means, 1.0 - tail);

    // Keeps ci_lower <= mean_estimate <= ci_upper under rounding and very
    // narrow bands.
    let ci_lower = lower.min(mean_estimate);
    let ci_upper = upper.max(mean_estimate);
    if ci_lower != lower || ci_upper != upper {
        debug!(variable = name, lower, upper, mean_estimate, "interval widened to contain mean");
    }

    Ok(BootstrapResult {
        variable_name: name.to_string(),
        mean_estimate,
        std_estimate,
        ci_lower,
        ci_upper,
        confidence_level: settings.confidence,
        iteration_count: settings.iterations as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{numeric_table, synthetic_table};

    fn settings(iterations: usize, confidence: f64) -> BootstrapSettings {
        BootstrapSettings {
            iterations,
            confidence,
            seed: 42,
        }
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn intervals_contain_the_point_estimate() {
        let table = synthetic_table(400, 3, 13);
        let variables: Vec<String> = table.numeric_names().iter().map(|n| n.to_string()).collect();
        let results = bootstrap(&table, &variables, &settings(1_000, 0.95)).unwrap();
        assert_eq!(results.len(), variables.len());
        for row in &results {
            assert!(row.ci_lower <= row.mean_estimate, "{row:?}");
            assert!(row.mean_estimate <= row.ci_upper, "{row:?}");
            assert_eq!(row.iteration_count, 1_000);
        }
    }

    #[test]
    fn same_seed_reproduces_bounds() {
        let table = synthetic_table(200, 0, 4);
        let variables = names(&["vehicle_count", "avg_speed_kmh"]);
        let first = bootstrap(&table, &variables, &settings(500, 0.9)).unwrap();
        let second = bootstrap(&table, &variables, &settings(500, 0.9)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn estimate_tracks_sample_mean() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let result = bootstrap_variable("ramp", &values, &settings(2_000, 0.95)).unwrap();
        assert!((result.mean_estimate - 50.5).abs() < 0.5);
        // Standard error of the mean for 1..=100 is about 2.87.
        assert!((result.std_estimate - 2.87).abs() < 0.3);
        assert!(result.ci_lower < 50.5 && result.ci_upper > 50.5);
    }

    #[test]
    fn constant_variable_collapses_the_interval() {
        let values = vec![0.1; 30];
        let result = bootstrap_variable("flat", &values, &settings(200, 0.95)).unwrap();
        assert!(result.ci_lower <= result.mean_estimate);
        assert!(result.mean_estimate <= result.ci_upper);
        assert!((result.ci_upper - result.ci_lower).abs() < 1e-12);
        assert!(result.std_estimate < 1e-12);
    }

    #[test]
    fn single_observation_is_accepted() {
        let result = bootstrap_variable("one", &[4.0], &settings(10, 0.5)).unwrap();
        assert_eq!(result.mean_estimate, 4.0);
        assert_eq!(result.ci_lower, 4.0);
        assert_eq!(result.ci_upper, 4.0);
    }

    #[test]
    fn nan_cells_are_data_quality_errors() {
        let table = numeric_table(&[("vehicle_count", vec![1.0, f64::NAN, 3.0])]);
        let err = bootstrap(&table, &names(&["vehicle_count"]), &settings(50, 0.95)).unwrap_err();
        assert!(matches!(err, GoldError::DataQuality(_)));

        let err = bootstrap_variable("raw", &[2.0, f64::NAN], &settings(50, 0.95)).unwrap_err();
        assert!(matches!(err, GoldError::DataQuality(_)));
    }

    #[test]
    fn preconditions_are_enforced() {
        let table = numeric_table(&[("a", vec![1.0, 2.0, 3.0])]);
        let variables = names(&["a"]);
        for bad in [settings(0, 0.95), settings(10, 0.0), settings(10, 1.0)] {
            assert!(matches!(
                bootstrap(&table, &variables, &bad),
                Err(GoldError::Configuration(_))
            ));
        }
        assert!(matches!(
            bootstrap(&table, &[], &settings(10, 0.95)),
            Err(GoldError::Configuration(_))
        ));
        assert!(matches!(
            bootstrap(&table, &names(&["missing"]), &settings(10, 0.95)),
            Err(GoldError::Configuration(_))
        ));
        assert!(matches!(
            bootstrap_variable("empty", &[], &settings(10, 0.95)),
            Err(GoldError::DataQuality(_))
        ));
    }
}
