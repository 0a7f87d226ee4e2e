use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float64Array, StringArray, TimestampMillisecondArray, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use chrono::{DateTime, Utc};
use nalgebra::DMatrix;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{GoldError, GoldResult};
use crate::models::{BootstrapResult, FactorExtraction, ObservationTable, ScenarioResult};
use crate::table;

pub const FACTOR_LOADINGS_FILE: &str = "factor_loadings.parquet";
pub const FACTOR_SCORES_FILE: &str = "traffic_weather_factors.parquet";
pub const FACTOR_SUMMARY_FILE: &str = "factor_summary.parquet";
pub const SCENARIO_FILE: &str = "monte_carlo_scenarios.parquet";
pub const BOOTSTRAP_FILE: &str = "monte_carlo_results.parquet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Factors,
    Scenarios,
    Bootstrap,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Factors, Stage::Scenarios, Stage::Bootstrap];

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Factors => "factors",
            Stage::Scenarios => "scenarios",
            Stage::Bootstrap => "bootstrap",
        }
    }

    fn manifest_file(&self) -> String {
        format!("{}.manifest.json", self.label())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identity of one pipeline run, shared by every stage it commits.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub input_fingerprint: String,
    pub config_fingerprint: String,
    pub random_seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageManifest {
    pub stage: Stage,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub input_fingerprint: String,
    pub config_fingerprint: String,
    pub random_seed: u64,
    /// Scenario names or variable names the stage was run for.
    pub selection: Vec<String>,
    pub artifacts: Vec<ArtifactRecord>,
    pub rows: usize,
}

/// One committed table and the BLAKE3 digest of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub file: String,
    pub blake3: String,
}

/// Persists Gold tables as Parquet under one directory.
///
/// Every file is written to a temporary sibling, synced, then renamed into
/// place, so readers only ever see complete tables.
#[derive(Debug, Clone)]
pub struct GoldWriter {
    dir: PathBuf,
}

impl GoldWriter {
    pub fn new(dir: impl Into<PathBuf>) -> GoldResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Commits all of a stage's tables, then its manifest.
    ///
    /// Every table is written before anything is renamed, and the previous
    /// manifest is removed before the first rename. A commit that fails
    /// partway therefore leaves the stage without a manifest, never with
    /// one describing other tables.
    pub fn commit_stage(
        &self,
        stage: Stage,
        tables: Vec<(&'static str, RecordBatch)>,
        selection: Vec<String>,
        context: &RunContext,
    ) -> GoldResult<StageManifest> {
        let rows = tables.first().map_or(0, |(_, batch)| batch.num_rows());
        let mut staged = Vec::with_capacity(tables.len());
        let mut artifacts = Vec::with_capacity(tables.len());
        for (file_name, batch) in &tables {
            let temp = self.stage_parquet(batch)?;
            artifacts.push(ArtifactRecord {
                file: file_name.to_string(),
                blake3: table::fingerprint_file(temp.path())?,
            });
            staged.push((*file_name, temp));
        }

        self.retract_manifest(stage)?;
        for (file_name, temp) in staged {
            let target = self.dir.join(file_name);
            temp.persist(&target).map_err(|err| err.error)?;
            debug!(path = %target.display(), "committed gold table");
        }

        let manifest = StageManifest {
            stage,
            run_id: context.run_id,
            generated_at: Utc::now(),
            input_fingerprint: context.input_fingerprint.clone(),
            config_fingerprint: context.config_fingerprint.clone(),
            random_seed: context.random_seed,
            selection,
            artifacts,
            rows,
        };
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(temp.as_file_mut(), &manifest)?;
        temp.as_file().sync_all()?;
        temp.persist(self.dir.join(stage.manifest_file()))
            .map_err(|err| err.error)?;

        info!(stage = %stage, rows, dir = %self.dir.display(), "gold stage committed");
        Ok(manifest)
    }

    /// Removes the stage's manifest, if any.
    pub fn retract_manifest(&self, stage: Stage) -> GoldResult<()> {
        match std::fs::remove_file(self.dir.join(stage.manifest_file())) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn stage_parquet(&self, batch: &RecordBatch) -> GoldResult<NamedTempFile> {
        let mut temp = tempfile::Builder::new()
            .prefix(".gold-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(temp.as_file_mut(), batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;
        temp.as_file().sync_all()?;
        Ok(temp)
    }

    pub fn read_manifest(&self, stage: Stage) -> GoldResult<StageManifest> {
        let path = self.dir.join(stage.manifest_file());
        if !path.exists() {
            return Err(GoldError::StaleArtifact {
                stage: stage.label().to_string(),
                reason: format!("manifest {} not found", path.display()),
            });
        }
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Dependency check: the stage must have been committed from this exact
    /// input and configuration, with every artifact present and unchanged.
    pub fn verify_stage(
        &self,
        stage: Stage,
        input_fingerprint: &str,
        config_fingerprint: &str,
    ) -> GoldResult<StageManifest> {
        let manifest = self.read_manifest(stage)?;
        let stale = |reason: String| GoldError::StaleArtifact {
            stage: stage.label().to_string(),
            reason,
        };
        if manifest.input_fingerprint != input_fingerprint {
            return Err(stale("built from a different observation table".to_string()));
        }
        if manifest.config_fingerprint != config_fingerprint {
            return Err(stale("built with a different configuration".to_string()));
        }
        for artifact in &manifest.artifacts {
            let path = self.dir.join(&artifact.file);
            if !path.exists() {
                return Err(stale(format!("artifact {} is missing", artifact.file)));
            }
            if table::fingerprint_file(&path)? != artifact.blake3 {
                return Err(stale(format!(
                    "artifact {} does not match its manifest",
                    artifact.file
                )));
            }
        }
        Ok(manifest)
    }

    /// Checks that the stage covered exactly the expected scenarios or
    /// variables, in order.
    pub fn verify_selection(manifest: &StageManifest, expected: &[String]) -> GoldResult<()> {
        if manifest.selection == expected {
            return Ok(());
        }
        Err(GoldError::StaleArtifact {
            stage: manifest.stage.label().to_string(),
            reason: format!(
                "built for [{}], configuration lists [{}]",
                manifest.selection.join(", "),
                expected.join(", ")
            ),
        })
    }

    pub fn read_table(&self, file_name: &str) -> GoldResult<RecordBatch> {
        let file = File::open(self.dir.join(file_name))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        let schema = reader.schema();
        let batches = reader.collect::<Result<Vec<_>, _>>()?;
        Ok(arrow::compute::concat_batches(&schema, &batches)?)
    }
}

pub fn factor_loadings_batch(extraction: &FactorExtraction) -> GoldResult<RecordBatch> {
    let mut fields = vec![Field::new("variable", DataType::Utf8, false)];
    let mut columns: Vec<ArrayRef> =
        vec![Arc::new(StringArray::from(extraction.variables.clone()))];
    for factor in 0..extraction.loadings.ncols() {
        fields.push(Field::new(format!("factor_{}", factor + 1), DataType::Float64, false));
        columns.push(float_column(extraction.loadings.column(factor).iter().copied()));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Source rows with their factor scores appended.
pub fn factor_scores_batch(
    table: &ObservationTable,
    extraction: &FactorExtraction,
) -> GoldResult<RecordBatch> {
    if extraction.scores.nrows() != table.len() {
        return Err(GoldError::data_quality(format!(
            "score rows ({}) do not match observations ({})",
            extraction.scores.nrows(),
            table.len()
        )));
    }
    let mut fields = vec![
        Field::new("observation_id", DataType::UInt64, false),
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            false,
        ),
        Field::new("location_id", DataType::Utf8, false),
        Field::new("weather_category", DataType::Utf8, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(0..table.len() as u64)),
        Arc::new(TimestampMillisecondArray::from_iter_values(
            table
                .timestamps
                .iter()
                .map(|timestamp| timestamp.and_utc().timestamp_millis()),
        )),
        Arc::new(StringArray::from(table.location_ids.clone())),
        Arc::new(StringArray::from(table.weather_categories.clone())),
    ];
    for column in &table.numeric {
        fields.push(Field::new(column.name.as_str(), DataType::Float64, false));
        columns.push(float_column(column.values.iter().copied()));
    }
    for column in &table.text {
        fields.push(Field::new(column.name.as_str(), DataType::Utf8, false));
        columns.push(Arc::new(StringArray::from(column.values.clone())));
    }
    for factor in 0..extraction.scores.ncols() {
        fields.push(Field::new(
            format!("factor_{}_score", factor + 1),
            DataType::Float64,
            false,
        ));
        columns.push(float_column(extraction.scores.column(factor).iter().copied()));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

pub fn factor_summary_batch(extraction: &FactorExtraction) -> GoldResult<RecordBatch> {
    let schema = Schema::new(vec![
        Field::new("factor", DataType::UInt64, false),
        Field::new("eigenvalue", DataType::Float64, false),
        Field::new("explained_variance_ratio", DataType::Float64, false),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(
            (1..=extraction.eigenvalues.len()).map(|factor| factor as u64),
        )),
        float_column(extraction.eigenvalues.iter().copied()),
        float_column(extraction.explained_variance_ratio.iter().copied()),
    ];
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

pub fn scenario_batch(results: &[ScenarioResult]) -> GoldResult<RecordBatch> {
    let schema = Schema::new(vec![
        Field::new("scenario_name", DataType::Utf8, false),
        Field::new("description", DataType::Utf8, true),
        Field::new("mean", DataType::Float64, false),
        Field::new("std", DataType::Float64, false),
        Field::new("congestion_probability", DataType::Float64, false),
        Field::new("accident_risk", DataType::Float64, false),
        Field::new("threshold", DataType::Float64, false),
        Field::new("simulation_count", DataType::UInt64, false),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            results.iter().map(|row| row.scenario_name.as_str()),
        )),
        Arc::new(StringArray::from_iter(
            results.iter().map(|row| row.description.as_deref()),
        )),
        float_column(results.iter().map(|row| row.mean)),
        float_column(results.iter().map(|row| row.std)),
        float_column(results.iter().map(|row| row.congestion_probability)),
        float_column(results.iter().map(|row| row.accident_risk)),
        float_column(results.iter().map(|row| row.threshold)),
        Arc::new(UInt64Array::from_iter_values(
            results.iter().map(|row| row.simulation_count),
        )),
    ];
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

pub fn bootstrap_batch(results: &[BootstrapResult]) -> GoldResult<RecordBatch> {
    let schema = Schema::new(vec![
        Field::new("variable_name", DataType::Utf8, false),
        Field::new("mean_estimate", DataType::Float64, false),
        Field::new("std_estimate", DataType::Float64, false),
        Field::new("ci_lower", DataType::Float64, false),
        Field::new("ci_upper", DataType::Float64, false),
        Field::new("confidence_level", DataType::Float64, false),
        Field::new("iteration_count", DataType::UInt64, false),
    ]);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            results.iter().map(|row| row.variable_name.as_str()),
        )),
        float_column(results.iter().map(|row| row.mean_estimate)),
        float_column(results.iter().map(|row| row.std_estimate)),
        float_column(results.iter().map(|row| row.ci_lower)),
        float_column(results.iter().map(|row| row.ci_upper)),
        float_column(results.iter().map(|row| row.confidence_level)),
        Arc::new(UInt64Array::from_iter_values(
            results.iter().map(|row| row.iteration_count),
        )),
    ];
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

pub fn scenarios_from_batch(batch: &RecordBatch) -> GoldResult<Vec<ScenarioResult>> {
    let names = string_column(batch, "scenario_name")?;
    let descriptions = string_column(batch, "description")?;
    let mean = f64_column(batch, "mean")?;
    let std = f64_column(batch, "std")?;
    let congestion = f64_column(batch, "congestion_probability")?;
    let accident = f64_column(batch, "accident_risk")?;
    let threshold = f64_column(batch, "threshold")?;
    let count = u64_column(batch, "simulation_count")?;
    Ok((0..batch.num_rows())
        .map(|row| ScenarioResult {
            scenario_name: names.value(row).to_string(),
            description: (!descriptions.is_null(row))
                .then(|| descriptions.value(row).to_string()),
            mean: mean.value(row),
            std: std.value(row),
            congestion_probability: congestion.value(row),
            accident_risk: accident.value(row),
            threshold: threshold.value(row),
            simulation_count: count.value(row),
        })
        .collect())
}

pub fn bootstrap_from_batch(batch: &RecordBatch) -> GoldResult<Vec<BootstrapResult>> {
    let names = string_column(batch, "variable_name")?;
    let mean = f64_column(batch, "mean_estimate")?;
    let std = f64_column(batch, "std_estimate")?;
    let lower = f64_column(batch, "ci_lower")?;
    let upper = f64_column(batch, "ci_upper")?;
    let confidence = f64_column(batch, "confidence_level")?;
    let iterations = u64_column(batch, "iteration_count")?;
    Ok((0..batch.num_rows())
        .map(|row| BootstrapResult {
            variable_name: names.value(row).to_string(),
            mean_estimate: mean.value(row),
            std_estimate: std.value(row),
            ci_lower: lower.value(row),
            ci_upper: upper.value(row),
            confidence_level: confidence.value(row),
            iteration_count: iterations.value(row),
        })
        .collect())
}

/// Variable names and the variables × factors loading matrix.
pub fn loadings_from_batch(batch: &RecordBatch) -> GoldResult<(Vec<String>, DMatrix<f64>)> {
    let variables: Vec<String> = string_column(batch, "variable")?
        .iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect();
    let factors = batch.num_columns().saturating_sub(1);
    let mut loadings = DMatrix::zeros(variables.len(), factors);
    for factor in 0..factors {
        let column = f64_column(batch, &format!("factor_{}", factor + 1))?;
        for row in 0..variables.len() {
            loadings[(row, factor)] = column.value(row);
        }
    }
    Ok((variables, loadings))
}

fn float_column(values: impl Iterator<Item = f64>) -> ArrayRef {
    Arc::new(Float64Array::from_iter_values(values))
}

fn f64_column<'a>(batch: &'a RecordBatch, name: &str) -> GoldResult<&'a Float64Array> {
    typed_column(batch, name)
}

fn u64_column<'a>(batch: &'a RecordBatch, name: &str) -> GoldResult<&'a UInt64Array> {
    typed_column(batch, name)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> GoldResult<&'a StringArray> {
    typed_column(batch, name)
}

fn typed_column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> GoldResult<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|column| column.as_any().downcast_ref::<T>())
        .ok_or_else(|| {
            GoldError::data_quality(format!("gold table lacks a readable `{name}` column"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factor;
    use crate::testutil::synthetic_table;
    use tempfile::tempdir;

    fn context(input: &str) -> RunContext {
        RunContext {
            run_id: Uuid::new_v4(),
            input_fingerprint: input.to_string(),
            config_fingerprint: "config".to_string(),
            random_seed: 42,
        }
    }

    fn sample_scenarios() -> Vec<ScenarioResult> {
        vec![ScenarioResult {
            scenario_name: "rainy".to_string(),
            description: Some("Heavy rain, reduced visibility".to_string()),
            mean: 11_500.0,
            std: 1_800.0,
            congestion_probability: 0.31,
            accident_risk: 0.044,
            threshold: 12_739.0,
            simulation_count: 10_000,
        }]
    }

    fn commit_scenarios(
        writer: &GoldWriter,
        rows: &[ScenarioResult],
        input: &str,
    ) -> StageManifest {
        let batch = scenario_batch(rows).unwrap();
        let selection = rows.iter().map(|row| row.scenario_name.clone()).collect();
        writer
            .commit_stage(
                Stage::Scenarios,
                vec![(SCENARIO_FILE, batch)],
                selection,
                &context(input),
            )
            .unwrap()
    }

    #[test]
    fn commits_tables_and_manifest() {
        let dir = tempdir().unwrap();
        let writer = GoldWriter::new(dir.path().join("gold")).unwrap();
        let manifest = commit_scenarios(&writer, &sample_scenarios(), "input");

        assert_eq!(manifest.rows, 1);
        assert_eq!(manifest.selection, vec!["rainy".to_string()]);
        assert_eq!(manifest.artifacts.len(), 1);
        assert_eq!(manifest.artifacts[0].file, SCENARIO_FILE);
        let on_disk = table::fingerprint_file(&writer.dir().join(SCENARIO_FILE)).unwrap();
        assert_eq!(manifest.artifacts[0].blake3, on_disk);
        assert_eq!(writer.read_manifest(Stage::Scenarios).unwrap(), manifest);

        let read_back = scenarios_from_batch(&writer.read_table(SCENARIO_FILE).unwrap()).unwrap();
        assert_eq!(read_back, sample_scenarios());

        let leftovers: Vec<_> = std::fs::read_dir(writer.dir())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn verify_detects_stale_and_missing_artifacts() {
        let dir = tempdir().unwrap();
        let writer = GoldWriter::new(dir.path()).unwrap();
        assert!(matches!(
            writer.verify_stage(Stage::Bootstrap, "input", "config"),
            Err(GoldError::StaleArtifact { .. })
        ));

        commit_scenarios(&writer, &sample_scenarios(), "input");
        assert!(writer.verify_stage(Stage::Scenarios, "input", "config").is_ok());
        assert!(matches!(
            writer.verify_stage(Stage::Scenarios, "other-input", "config"),
            Err(GoldError::StaleArtifact { .. })
        ));
        assert!(matches!(
            writer.verify_stage(Stage::Scenarios, "input", "other-config"),
            Err(GoldError::StaleArtifact { .. })
        ));

        std::fs::remove_file(dir.path().join(SCENARIO_FILE)).unwrap();
        let err = writer.verify_stage(Stage::Scenarios, "input", "config").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn table_replaced_under_an_old_manifest_is_stale() {
        let dir = tempdir().unwrap();
        let writer = GoldWriter::new(dir.path()).unwrap();
        commit_scenarios(&writer, &sample_scenarios(), "input-a");

        // Tables from another input renamed into place without their manifest.
        let mut other = sample_scenarios();
        other[0].mean = 9_800.0;
        let staged = writer.stage_parquet(&scenario_batch(&other).unwrap()).unwrap();
        staged.persist(dir.path().join(SCENARIO_FILE)).unwrap();

        let err = writer.verify_stage(Stage::Scenarios, "input-a", "config").unwrap_err();
        assert!(matches!(err, GoldError::StaleArtifact { .. }));
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn retracted_manifest_reads_as_missing() {
        let dir = tempdir().unwrap();
        let writer = GoldWriter::new(dir.path()).unwrap();
        writer.retract_manifest(Stage::Scenarios).unwrap();

        commit_scenarios(&writer, &sample_scenarios(), "input");
        writer.retract_manifest(Stage::Scenarios).unwrap();
        assert!(dir.path().join(SCENARIO_FILE).exists());
        let err = writer.verify_stage(Stage::Scenarios, "input", "config").unwrap_err();
        assert!(err.to_string().contains("not found"));

        commit_scenarios(&writer, &sample_scenarios(), "input");
        assert!(writer.verify_stage(Stage::Scenarios, "input", "config").is_ok());
    }

    #[test]
    fn failed_commit_leaves_previous_tables() {
        let dir = tempdir().unwrap();
        let writer = GoldWriter::new(dir.path()).unwrap();
        let first = commit_scenarios(&writer, &sample_scenarios(), "input");
        std::fs::remove_file(dir.path().join("scenarios.manifest.json")).unwrap();
        std::fs::create_dir_all(dir.path().join("scenarios.manifest.json/blocked")).unwrap();

        let mut other = sample_scenarios();
        other[0].mean = 9_800.0;
        let result = writer.commit_stage(
            Stage::Scenarios,
            vec![(SCENARIO_FILE, scenario_batch(&other).unwrap())],
            vec!["rainy".to_string()],
            &context("input-b"),
        );
        assert!(result.is_err());
        let on_disk = table::fingerprint_file(&dir.path().join(SCENARIO_FILE)).unwrap();
        assert_eq!(on_disk, first.artifacts[0].blake3);
    }

    #[test]
    fn selection_must_match_configuration() {
        let dir = tempdir().unwrap();
        let writer = GoldWriter::new(dir.path()).unwrap();
        let manifest = commit_scenarios(&writer, &sample_scenarios(), "input");
        assert!(GoldWriter::verify_selection(&manifest, &["rainy".to_string()]).is_ok());

        let expected = vec!["sunny".to_string(), "rainy".to_string()];
        let err = GoldWriter::verify_selection(&manifest, &expected).unwrap_err();
        assert!(matches!(err, GoldError::StaleArtifact { .. }));
    }

    #[test]
    fn factor_tables_keep_source_columns_and_shapes() {
        let table = synthetic_table(120, 2, 6);
        let extraction = factor::extract(&table, 3).unwrap();

        let scores = factor_scores_batch(&table, &extraction).unwrap();
        assert_eq!(scores.num_rows(), 120);
        assert!(scores.column_by_name("weather_category").is_some());
        assert!(scores.column_by_name("vehicle_count").is_some());
        assert!(scores.column_by_name("factor_3_score").is_some());

        let loadings = factor_loadings_batch(&extraction).unwrap();
        assert_eq!(loadings.num_rows(), table.numeric.len());
        assert_eq!(loadings.num_columns(), 4);

        let (variables, matrix) = loadings_from_batch(&loadings).unwrap();
        assert_eq!(variables, extraction.variables);
        assert_eq!(matrix, extraction.loadings);
    }

    #[test]
    fn bootstrap_rows_survive_parquet() {
        let dir = tempdir().unwrap();
        let writer = GoldWriter::new(dir.path()).unwrap();
        let rows = vec![BootstrapResult {
            variable_name: "avg_speed_kmh".to_string(),
            mean_estimate: 41.2,
            std_estimate: 0.3,
            ci_lower: 40.6,
            ci_upper: 41.8,
            confidence_level: 0.95,
            iteration_count: 5_000,
        }];
        writer
            .commit_stage(
                Stage::Bootstrap,
                vec![(BOOTSTRAP_FILE, bootstrap_batch(&rows).unwrap())],
                vec!["avg_speed_kmh".to_string()],
                &context("input"),
            )
            .unwrap();
        let read_back = bootstrap_from_batch(&writer.read_table(BOOTSTRAP_FILE).unwrap()).unwrap();
        assert_eq!(read_back, rows);
    }
}
