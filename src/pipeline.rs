use std::path::Path;
use std::sync::Arc;

use tokio::task::{self, JoinError};
use tracing::{error, info};
use uuid::Uuid;

use crate::bootstrap;
use crate::config::GoldConfig;
use crate::error::{GoldError, GoldResult};
use crate::factor;
use crate::models::{ObservationTable, Scenario};
use crate::scenario;
use crate::table;
use crate::writer::{
    self, GoldWriter, RunContext, Stage, StageManifest, BOOTSTRAP_FILE, FACTOR_LOADINGS_FILE,
    FACTOR_SCORES_FILE, FACTOR_SUMMARY_FILE, SCENARIO_FILE,
};

impl RunContext {
    pub fn new(input: &Path, config: &GoldConfig) -> GoldResult<Self> {
        Ok(Self {
            run_id: Uuid::new_v4(),
            input_fingerprint: table::fingerprint_file(input)?,
            config_fingerprint: config.fingerprint()?,
            random_seed: config.random_seed,
        })
    }
}

#[derive(Debug)]
pub struct StageOutcome {
    pub stage: Stage,
    pub result: GoldResult<StageManifest>,
}

/// One Gold run over a single observation table. Each stage computes its
/// tables fully in memory and commits them only on success.
#[derive(Debug, Clone)]
pub struct GoldPipeline {
    table: Arc<ObservationTable>,
    config: Arc<GoldConfig>,
    writer: GoldWriter,
    context: RunContext,
}

impl GoldPipeline {
    pub fn new(
        table: ObservationTable,
        config: GoldConfig,
        writer: GoldWriter,
        context: RunContext,
    ) -> Self {
        Self {
            table: Arc::new(table),
            config: Arc::new(config),
            writer,
            context,
        }
    }

    pub fn factors(&self) -> GoldResult<StageManifest> {
        let extraction = factor::extract(&self.table, self.config.num_factors)?;
        for (index, top) in factor::top_loadings(&extraction.variables, &extraction.loadings, 2)
            .iter()
            .enumerate()
        {
            let strongest: Vec<String> = top
                .iter()
                .map(|entry| format!("{}={:.4}", entry.variable, entry.loading))
                .collect();
            info!(factor = index + 1, top = %strongest.join(", "), "factor loadings");
        }
        let tables = vec![
            (FACTOR_SCORES_FILE, writer::factor_scores_batch(&self.table, &extraction)?),
            (FACTOR_LOADINGS_FILE, writer::factor_loadings_batch(&extraction)?),
            (FACTOR_SUMMARY_FILE, writer::factor_summary_batch(&extraction)?),
        ];
        let selection = extraction.variables.clone();
        self.writer
            .commit_stage(Stage::Factors, tables, selection, &self.context)
    }

    pub fn scenarios(&self, scenarios: &[Scenario]) -> GoldResult<StageManifest> {
        let results =
            scenario::simulate(&self.table, scenarios, &self.config.simulation_settings())?;
        let batch = writer::scenario_batch(&results)?;
        let selection = scenarios.iter().map(|scenario| scenario.name.clone()).collect();
        self.writer.commit_stage(
            Stage::Scenarios,
            vec![(SCENARIO_FILE, batch)],
            selection,
            &self.context,
        )
    }

    pub fn bootstrap(&self, variables: &[String]) -> GoldResult<StageManifest> {
        let results =
            bootstrap::bootstrap(&self.table, variables, &self.config.bootstrap_settings())?;
        let batch = writer::bootstrap_batch(&results)?;
        self.writer.commit_stage(
            Stage::Bootstrap,
            vec![(BOOTSTRAP_FILE, batch)],
            variables.to_vec(),
            &self.context,
        )
    }

    pub fn gold_dir(&self) -> &Path {
        self.writer.dir()
    }

    /// Runs the three stages concurrently on blocking worker threads. A
    /// failed stage leaves its previous artifacts in place; the others
    /// still commit.
    pub async fn run_all(
        &self,
        scenarios: Vec<Scenario>,
        variables: Vec<String>,
    ) -> Vec<StageOutcome> {
        info!(
            run_id = %self.context.run_id,
            observations = self.table.len(),
            variables = self.table.numeric.len(),
            "starting gold run"
        );
        let factors = {
            let pipeline = self.clone();
            task::spawn_blocking(move || pipeline.factors())
        };
        let simulated = {
            let pipeline = self.clone();
            task::spawn_blocking(move || pipeline.scenarios(&scenarios))
        };
        let resampled = {
            let pipeline = self.clone();
            task::spawn_blocking(move || pipeline.bootstrap(&variables))
        };
        let (factors, simulated, resampled) = tokio::join!(factors, simulated, resampled);

        vec![
            outcome(Stage::Factors, factors),
            outcome(Stage::Scenarios, simulated),
            outcome(Stage::Bootstrap, resampled),
        ]
    }
}

fn outcome(stage: Stage, joined: Result<GoldResult<StageManifest>, JoinError>) -> StageOutcome {
    let result = joined.map_err(GoldError::from).and_then(|result| result);
    if let Err(err) = &result {
        error!(
            stage = %stage,
            error = %err,
            "gold stage failed; previous artifacts left untouched"
        );
    }
    StageOutcome { stage, result }
}
