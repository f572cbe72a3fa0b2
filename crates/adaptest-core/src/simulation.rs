//! Monte Carlo simulation of adaptive sessions.
//!
//! Simulated examinees answer from a known true ability, which lets a batch
//! measure how well the engine recovers it (bias, RMSE) and how many items
//! it needs. Sessions are independent and run in parallel on blocking tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use rand::prelude::*;
use rand_pcg::Pcg64;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::CatConfig;
use crate::error::CatError;
use crate::irt::item_probability;
use crate::model::{ItemCatalog, ItemParams};
use crate::report::{summarize, CatalogSummary, PlacementResults, SimulationReport, SimulationRun};
use crate::session::{AdaptiveSession, Step};

/// An examinee whose answers follow the response model at a fixed ability.
#[derive(Debug, Clone)]
pub struct SimulatedExaminee {
    true_theta: f64,
    rng: Pcg64,
}

impl SimulatedExaminee {
    pub fn new(true_theta: f64, seed: u64) -> Self {
        Self {
            true_theta,
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// Answer correctly with probability `p(true_theta)`.
    pub fn answer(&mut self, item: &ItemParams) -> bool {
        self.rng.random::<f64>() < item_probability(self.true_theta, item)
    }
}

/// Drive one session over every catalog topic until it completes.
pub fn run_session(
    catalog: Arc<ItemCatalog>,
    config: CatConfig,
    examinee: &mut SimulatedExaminee,
) -> Result<PlacementResults, CatError> {
    let (mut session, first) = AdaptiveSession::start_all(catalog, config.clone())?;
    let mut next = first;
    loop {
        let item = session
            .catalog()
            .item(&next.item_id)
            .ok_or_else(|| CatError::UnknownItem(next.item_id.clone()))?;
        let correct = examinee.answer(&item.params(&config));
        match session.submit_answer(&next.item_id, correct)? {
            Step::Next { selection, .. } => next = selection,
            Step::Completed(results) => return Ok(results),
        }
    }
}

/// Progress reporting trait.
pub trait SimulationReporter: Send + Sync {
    fn on_run_complete(&self, run: &SimulationRun);
    fn on_run_error(&self, true_theta: f64, replication: u32, error: &str);
    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl SimulationReporter for NoopReporter {
    fn on_run_complete(&self, _: &SimulationRun) {}
    fn on_run_error(&self, _: f64, _: u32, _: &str) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Seed of one replication, derived from the batch seed.
pub fn task_seed(seed: u64, theta_index: usize, replication: u32) -> u64 {
    seed.wrapping_add(theta_index as u64 * 1000)
        .wrapping_add(replication as u64)
}

/// Runs batches of simulated sessions against one catalog.
pub struct Simulator {
    catalog: Arc<ItemCatalog>,
    config: CatConfig,
    parallelism: usize,
}

impl Simulator {
    pub fn new(catalog: Arc<ItemCatalog>, config: CatConfig, parallelism: usize) -> Self {
        Self {
            catalog,
            config,
            parallelism: parallelism.max(1),
        }
    }

    /// Run `replications` sessions for every true theta.
    ///
    /// Output is deterministic for a given seed: runs are ordered by theta
    /// then replication, whatever order they finished in.
    pub async fn run_batch(
        &self,
        true_thetas: &[f64],
        replications: u32,
        seed: u64,
        progress: &dyn SimulationReporter,
    ) -> Result<SimulationReport> {
        self.config.validate()?;
        if self.catalog.is_empty() {
            return Err(CatError::NoItemsAvailable.into());
        }

        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut futures = FuturesUnordered::new();

        for (theta_index, &true_theta) in true_thetas.iter().enumerate() {
            for replication in 0..replications {
                let catalog = Arc::clone(&self.catalog);
                let config = self.config.clone();
                let semaphore = Arc::clone(&semaphore);
                let seed = task_seed(seed, theta_index, replication);

                futures.push(async move {
                    let inner = async move {
                        let _permit = semaphore
                            .acquire_owned()
                            .await
                            .map_err(|_| anyhow::anyhow!("semaphore closed"))?;

                        let results = tokio::task::spawn_blocking(move || {
                            let mut examinee = SimulatedExaminee::new(true_theta, seed);
                            run_session(catalog, config, &mut examinee)
                        })
                        .await??;

                        Ok::<_, anyhow::Error>(SimulationRun {
                            true_theta,
                            replication,
                            seed,
                            results,
                        })
                    };
                    (theta_index, replication, true_theta, inner.await)
                });
            }
        }

        let total = futures.len();
        let mut runs = Vec::with_capacity(total);
        let mut failed = 0usize;

        while let Some((theta_index, replication, true_theta, result)) = futures.next().await {
            match result {
                Ok(run) => {
                    progress.on_run_complete(&run);
                    runs.push((theta_index, run));
                }
                Err(e) => {
                    tracing::error!("simulation failed for theta={true_theta} #{replication}: {e:#}");
                    progress.on_run_error(true_theta, replication, &e.to_string());
                    failed += 1;
                }
            }
        }

        runs.sort_by_key(|(theta_index, run)| (*theta_index, run.replication));
        let runs: Vec<SimulationRun> = runs.into_iter().map(|(_, run)| run).collect();

        let elapsed = start.elapsed();
        progress.on_batch_complete(total, runs.len(), failed, elapsed);
        tracing::info!(
            "simulation batch: {} of {total} runs in {:.2}s",
            runs.len(),
            elapsed.as_secs_f64()
        );

        Ok(SimulationReport {
            id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            catalog: CatalogSummary::from_catalog(&self.catalog),
            engine: self.config.clone(),
            summaries: summarize(&runs),
            runs,
            duration_ms: elapsed.as_millis() as u64,
        })
    }
}
