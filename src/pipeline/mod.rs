//! Orchestration of one discovery-and-validation run.
//!
//! Phases: discovering (all adapters concurrently) -> deduplicating (pool
//! drained, filtered against the store snapshot) -> validating (bounded
//! fan-out) -> done. The dedup store is the only state shared across runs.

mod pool;

pub use pool::CandidatePool;

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::cli::output::{mask_key, OutputFormatter};
use crate::core::error::Result;
use crate::core::results::{Candidate, Classification, KeyReport, RunSummary};
use crate::core::traits::{KeyValidator, SourceAdapter};
use crate::store::{CredList, DedupStore};

pub struct Pipeline {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    /// Validators keyed by token prefix; a candidate goes to the validator
    /// with the longest prefix matching its key.
    validators: Vec<(String, Arc<dyn KeyValidator>)>,
    store: Arc<DedupStore>,
    cred_list: Option<Arc<CredList>>,
    validation_concurrency: usize,
}

impl Pipeline {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        validators: Vec<(String, Arc<dyn KeyValidator>)>,
        store: Arc<DedupStore>,
        cred_list: Option<Arc<CredList>>,
        validation_concurrency: usize,
    ) -> Self {
        Self {
            adapters,
            validators,
            store,
            cred_list,
            validation_concurrency: validation_concurrency.max(1),
        }
    }

    fn validator_for(&self, key: &str) -> Option<Arc<dyn KeyValidator>> {
        self.validators
            .iter()
            .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, validator)| Arc::clone(validator))
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        // Discovering. Every adapter runs as its own task; a slow or failing
        // backend never stalls or cancels its siblings.
        info!("discovering: {} adapters", self.adapters.len());
        let pool = Arc::new(CandidatePool::new());
        let mut discovery = JoinSet::new();
        for adapter in &self.adapters {
            let adapter = Arc::clone(adapter);
            let pool = Arc::clone(&pool);
            discovery.spawn(async move {
                let source = adapter.source();
                (source, adapter.discover(pool).await)
            });
        }
        while let Some(joined) = discovery.join_next().await {
            match joined {
                Ok((source, Ok(count))) => {
                    summary.discovered += count;
                    info!("{}: {} new candidates", source, count);
                }
                Ok((source, Err(e))) => warn!("{}: discovery failed: {}", source, e),
                Err(e) => warn!("discovery task panicked: {}", e),
            }
        }

        // Deduplicating. The snapshot is taken before any append can run.
        let candidates = pool.drain();
        summary.unique_candidates = candidates.len();
        let seen = self.store.snapshot();
        let fresh: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| !seen.contains(&c.key))
            .collect();
        summary.skipped_known = summary.unique_candidates - fresh.len();
        info!(
            "deduplicating: {} unique, {} already known, {} to validate",
            summary.unique_candidates,
            summary.skipped_known,
            fresh.len()
        );

        // Validating, bounded fan-out. Each candidate is routed to the
        // validator registered for its token prefix.
        let mut routed = Vec::with_capacity(fresh.len());
        for candidate in fresh {
            match self.validator_for(&candidate.key) {
                Some(validator) => routed.push((candidate, validator)),
                None => {
                    summary.transient_errors += 1;
                    warn!("no validator for {}, dropped", mask_key(&candidate.key));
                }
            }
        }

        let pb = ProgressBar::new(routed.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );
        let semaphore = Arc::new(Semaphore::new(self.validation_concurrency));
        let mut checks = JoinSet::new();
        for (candidate, validator) in routed {
            let semaphore = Arc::clone(&semaphore);
            checks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                tokio::time::sleep(validator.rate_limit()).await;
                let outcome = validator.validate(&candidate.key).await;
                (candidate, outcome)
            });
        }

        while let Some(joined) = checks.join_next().await {
            let (candidate, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("validation task panicked: {}", e);
                    continue;
                }
            };

            match outcome {
                Ok(Classification::Valid(facts)) => {
                    let report = KeyReport::new(&candidate, facts);
                    match self.persist(&report) {
                        Ok(()) => {
                            summary.valid += 1;
                            pb.suspend(|| OutputFormatter::print_valid_key(&report));
                        }
                        Err(e) => {
                            // Losing this record means duplicate validation and
                            // duplicate reporting on the next run.
                            summary.persistence_failures += 1;
                            error!("failed to persist {}: {}", mask_key(&report.key), e);
                        }
                    }
                }
                Ok(Classification::Invalid { reason }) => {
                    summary.invalid += 1;
                    pb.suspend(|| OutputFormatter::print_invalid_key(&candidate.key, &reason));
                }
                Err(e) => {
                    // Transient: not classified, eligible again next run.
                    summary.transient_errors += 1;
                    warn!("validation of {} failed: {}", mask_key(&candidate.key), e);
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(
            "done: {} valid, {} invalid, {} transient",
            summary.valid, summary.invalid, summary.transient_errors
        );
        Ok(summary)
    }

    /// Both sinks reflect the same validated set.
    fn persist(&self, report: &KeyReport) -> Result<()> {
        self.store.append(report)?;
        if let Some(cred_list) = &self.cred_list {
            cred_list.record(&report.key)?;
        }
        Ok(())
    }
}
