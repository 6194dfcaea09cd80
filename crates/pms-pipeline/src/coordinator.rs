//! Pipeline assembly and supervision.
//!
//! The coordinator validates the configuration, opens one link per adjacent
//! rank pair, spawns every stage as its own tokio task and waits for all of
//! them. The first failing stage aborts the rest; no partial output is ever
//! returned.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use pms_types::{Element, Rank, SortConfig, StageRole, Topology};
use tokio::task::{Id, JoinSet};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::executor::StageExecutor;
use crate::report::StageReport;
use crate::transport::{self, ChannelInbound};

/// Result of a completed sort.
#[derive(Debug, Clone)]
pub struct SortOutcome<T> {
    /// The Sink's output, ascending.
    pub sorted: Vec<T>,
    /// One report per stage, in rank order.
    pub reports: Vec<StageReport>,
    /// Wall time from the first spawn to the last stage finishing.
    pub elapsed: Duration,
}

struct StageOutput<T> {
    report: StageReport,
    sorted: Option<Vec<T>>,
}

impl<T> StageOutput<T> {
    fn forwarded(report: StageReport) -> Self {
        Self { report, sorted: None }
    }

    fn sorted((sorted, report): (Vec<T>, StageReport)) -> Self {
        Self { report, sorted: Some(sorted) }
    }
}

// ── Coordinator ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineCoordinator {
    topology: Topology,
}

impl PipelineCoordinator {
    /// Validate `config`. A mismatch is reported here, before any data flows.
    pub fn new(config: &SortConfig) -> Result<Self> {
        let topology = config.validate()?;
        Ok(Self { topology })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Sort `input` through the full pipeline.
    pub async fn run<T: Element>(&self, input: Vec<T>) -> Result<SortOutcome<T>> {
        let started = Instant::now();
        info!(
            elements = self.topology.elements(),
            stages = self.topology.num_stages(),
            "starting pipeline"
        );

        if self.topology.num_stages() == 1 {
            let (sorted, report) = StageExecutor::new(&self.topology, 0)?.run_solo(input)?;
            return Ok(self.finish(sorted, vec![report], started));
        }

        let mut tasks = JoinSet::new();
        let mut ranks: HashMap<Id, Rank> = HashMap::new();
        let mut input = Some(input);
        let mut upstream: Option<ChannelInbound<T>> = None;

        for spec in self.topology.stages() {
            let executor = StageExecutor::new(&self.topology, spec.rank)?;

            let (outbound, next_upstream) = match spec.downstream() {
                Some(_) => {
                    let (tx, rx) = transport::link(spec.rank, self.topology.channel_capacity());
                    (Some(tx), Some(rx))
                }
                None => (None, None),
            };
            let inbound = std::mem::replace(&mut upstream, next_upstream);

            let handle = match (spec.role, inbound, outbound) {
                (StageRole::Source, None, Some(outbound)) => {
                    let input = input.take().unwrap_or_default();
                    tasks.spawn(async move {
                        executor
                            .run_source(input, outbound)
                            .await
                            .map(StageOutput::forwarded)
                    })
                }
                (StageRole::Merge, Some(inbound), Some(outbound)) => tasks.spawn(async move {
                    executor
                        .run_merge(inbound, outbound)
                        .await
                        .map(StageOutput::forwarded)
                }),
                (StageRole::Sink, Some(inbound), None) => tasks.spawn(async move {
                    executor.run_sink(inbound).await.map(StageOutput::sorted)
                }),
                (role, ..) => {
                    tasks.abort_all();
                    return Err(PipelineError::StageFailed {
                        rank: spec.rank,
                        reason: format!("no wiring for {role} stage"),
                    });
                }
            };
            ranks.insert(handle.id(), spec.rank);
        }

        let mut reports = Vec::with_capacity(self.topology.num_stages());
        let mut sorted = None;
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next_with_id().await {
            let failure = match joined {
                Ok((_, Ok(output))) => {
                    if output.sorted.is_some() {
                        sorted = output.sorted;
                    }
                    reports.push(output.report);
                    continue;
                }
                Ok((_, Err(e))) => e,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => PipelineError::StageFailed {
                    rank: ranks.get(&e.id()).copied().unwrap_or_default(),
                    reason: e.to_string(),
                },
            };

            if failures.is_empty() {
                warn!(rank = failure.rank(), error = %failure, "stage failed, aborting pipeline");
                tasks.abort_all();
            }
            failures.push(failure);
        }

        if let Some(cause) = root_cause(failures) {
            return Err(cause);
        }

        let sorted = sorted.ok_or(PipelineError::StageFailed {
            rank: self.topology.last_rank(),
            reason: "sink finished without output".into(),
        })?;
        reports.sort_by_key(|r| r.rank);
        Ok(self.finish(sorted, reports, started))
    }

    fn finish<T>(
        &self,
        sorted: Vec<T>,
        reports: Vec<StageReport>,
        started: Instant,
    ) -> SortOutcome<T> {
        let elapsed = started.elapsed();
        info!(
            elements = sorted.len(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "pipeline complete"
        );
        SortOutcome { sorted, reports, elapsed }
    }
}

/// Sort `input` with a pipeline built from `config`.
pub async fn sort<T: Element>(config: &SortConfig, input: Vec<T>) -> Result<SortOutcome<T>> {
    PipelineCoordinator::new(config)?.run(input).await
}

/// Disconnects are fallout from another stage going away; prefer the first
/// failure that is not one.
fn root_cause(failures: Vec<PipelineError>) -> Option<PipelineError> {
    let mut fallback = None;
    for failure in failures {
        if !failure.is_disconnect() {
            return Some(failure);
        }
        fallback.get_or_insert(failure);
    }
    fallback
}

// ── Tests ─────────────────────────────────────────────────────────────────────
