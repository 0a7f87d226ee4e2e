use nalgebra::{DMatrix, DVector};
use statrs::statistics::Statistics;
use tracing::{debug, info};

use crate::error::{GoldError, GoldResult};
use crate::models::{FactorExtraction, FactorLoading, NumericColumn, ObservationTable};
use crate::table;

/// Selected eigenvalues at or below this fraction of the trace are treated
/// as zero variance.
const RANK_TOLERANCE: f64 = 1e-10;
const MAX_EIGEN_ITERATIONS: usize = 10_000;

/// Extracts `k` principal factors from every numeric column of the table.
pub fn extract(table: &ObservationTable, k: usize) -> GoldResult<FactorExtraction> {
    extract_columns(&table.numeric, k)
}

pub fn extract_columns(columns: &[NumericColumn], k: usize) -> GoldResult<FactorExtraction> {
    let variables = columns.len();
    if variables == 0 {
        return Err(GoldError::data_quality("no numeric variables to factor"));
    }
    let rows = columns.first().map_or(0, |column| column.values.len());
    if rows < 2 {
        return Err(GoldError::data_quality(format!(
            "factor extraction needs at least 2 observations, got {rows}"
        )));
    }
    if k < 1 || k > variables {
        return Err(GoldError::configuration(format!(
            "num_factors must be between 1 and the {variables} numeric variables, got {k}"
        )));
    }

    let standardized = standardize(columns, rows)?;
    let correlation = standardized.tr_mul(&standardized) / rows as f64;
    let trace = correlation.trace();

    let eigen = correlation
        .try_symmetric_eigen(f64::EPSILON, MAX_EIGEN_ITERATIONS)
        .ok_or_else(|| GoldError::numerical("eigen-decomposition did not converge"))?;
    if eigen.eigenvalues.iter().any(|value| !value.is_finite())
        || eigen.eigenvectors.iter().any(|value| !value.is_finite())
    {
        return Err(GoldError::numerical(
            "eigen-decomposition produced non-finite values",
        ));
    }

    let mut order: Vec<usize> = (0..variables).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .total_cmp(&eigen.eigenvalues[a])
            .then(a.cmp(&b))
    });

    let mut vectors = DMatrix::zeros(variables, k);
    let mut eigenvalues = Vec::with_capacity(k);
    for (factor, &index) in order.iter().take(k).enumerate() {
        let eigenvalue = eigen.eigenvalues[index];
        if eigenvalue <= RANK_TOLERANCE * trace {
            return Err(GoldError::numerical(format!(
                "factor {} explains no variance (eigenvalue {eigenvalue:e}); correlation matrix has rank below {k}",
                factor + 1
            )));
        }
        let vector = canonical_sign(eigen.eigenvectors.column(index).clone_owned());
        vectors.set_column(factor, &vector);
        eigenvalues.push(eigenvalue);
    }

    let mut loadings = vectors.clone();
    for (factor, eigenvalue) in eigenvalues.iter().enumerate() {
        loadings.column_mut(factor).scale_mut(eigenvalue.sqrt());
    }
    let scores = &standardized * &vectors;
    let explained_variance_ratio = eigenvalues.iter().map(|value| value / trace).collect();

    info!(
        observations = rows,
        variables,
        factors = k,
        "factor extraction complete"
    );
    debug!(?eigenvalues, "selected eigenvalues");

    Ok(FactorExtraction {
        variables: columns.iter().map(|column| column.name.clone()).collect(),
        eigenvalues,
        explained_variance_ratio,
        loadings,
        scores,
    })
}

/// The `n` strongest loadings of each factor by absolute value.
pub fn top_loadings(
    variables: &[String],
    loadings: &DMatrix<f64>,
    n: usize,
) -> Vec<Vec<FactorLoading>> {
    (0..loadings.ncols())
        .map(|factor| {
            let mut entries: Vec<FactorLoading> = variables
                .iter()
                .enumerate()
                .map(|(row, variable)| FactorLoading {
                    variable: variable.clone(),
                    factor: factor + 1,
                    loading: loadings[(row, factor)],
                })
                .collect();
            entries.sort_by(|a, b| b.loading.abs().total_cmp(&a.loading.abs()));
            entries.truncate(n);
            entries
        })
        .collect()
}

fn standardize(columns: &[NumericColumn], rows: usize) -> GoldResult<DMatrix<f64>> {
    let mut standardized = DMatrix::zeros(rows, columns.len());
    for (index, column) in columns.iter().enumerate() {
        if column.values.len() != rows {
            return Err(GoldError::data_quality(format!(
                "column `{}` has {} values, expected {rows}",
                column.name,
                column.values.len()
            )));
        }
        table::ensure_finite(&column.name, &column.values)?;
        let first = column.values[0];
        if column.values.iter().all(|value| *value == first) {
            return Err(GoldError::data_quality(format!(
                "variable `{}` has zero variance and cannot be standardized",
                column.name
            )));
        }
        let mean = column.values.iter().mean();
        let std = column.values.iter().population_std_dev();
        if !(std.is_finite() && std > 0.0) {
            return Err(GoldError::data_quality(format!(
                "variable `{}` has degenerate standard deviation {std}",
                column.name
            )));
        }
        for (row, value) in column.values.iter().enumerate() {
            standardized[(row, index)] = (value - mean) / std;
        }
    }
    Ok(standardized)
}

/// Flips the vector so its largest-magnitude component is positive. Ties go
/// to the lowest index.
fn canonical_sign(vector: DVector<f64>) -> DVector<f64> {
    let mut pivot = 0;
    for (index, value) in vector.iter().enumerate() {
        if value.abs() > vector[pivot].abs() {
            pivot = index;
        }
    }
    if vector[pivot] < 0.0 {
        -vector
    } else {
        vector
    }
}
