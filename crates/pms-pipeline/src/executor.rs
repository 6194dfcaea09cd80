//! Per-stage drive loops.
//!
//! Every stage runs one of these as its own task:
//!
//! - Source: validate the input, then forward each element with an outgoing
//!   tag that toggles after every send.
//! - Merge: `N + inputRunLength(r)` iterations of receive (first `N` only),
//!   latch check, and one merged element forwarded per iteration once latched.
//! - Sink: the Merge loop with elements collected instead of forwarded.
//! - Solo: a one-element pipeline; the input is already sorted.

use pms_types::{Element, Rank, StageRole, StageSpec, Topology};
use tracing::{debug, error};

use crate::emit::{Collect, Emit, Forward};
use crate::error::{PipelineError, Result};
use crate::merge::MergeCore;
use crate::report::StageReport;
use crate::transport::{Inbound, Outbound};

/// Runs the stage at one rank of a validated topology.
#[derive(Debug, Clone, Copy)]
pub struct StageExecutor {
    spec: StageSpec,
    elements: usize,
}

impl StageExecutor {
    pub fn new(topology: &Topology, rank: Rank) -> Result<Self> {
        Ok(Self {
            spec: topology.stage(rank)?,
            elements: topology.elements(),
        })
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn rank(&self) -> Rank {
        self.spec.rank
    }

    pub fn role(&self) -> StageRole {
        self.spec.role
    }

    pub fn is_first_stage(&self) -> bool {
        self.spec.rank == 0
    }

    pub fn is_last_stage(&self) -> bool {
        matches!(self.spec.role, StageRole::Sink | StageRole::Solo)
    }

    // ── Roles ────────────────────────────────────────────────────────────

    /// Split `input` into single-element runs and stream them downstream.
    pub async fn run_source<T, O>(&self, input: Vec<T>, outbound: O) -> Result<StageReport>
    where
        T: Element,
        O: Outbound<T>,
    {
        self.expect_role(StageRole::Source)?;
        self.check_input(&input)?;

        let received = input.len();
        let mut forward = Forward::new(self.rank(), outbound, self.spec.output_run_length());
        for value in input {
            forward.emit(value).await?;
        }

        Ok(self.report(received, Emit::<T>::emitted(&forward), None::<&MergeCore<T>>))
    }

    /// Merge run pairs from upstream and forward the doubled runs.
    pub async fn run_merge<T, I, O>(&self, mut inbound: I, outbound: O) -> Result<StageReport>
    where
        T: Element,
        I: Inbound<T>,
        O: Outbound<T>,
    {
        self.expect_role(StageRole::Merge)?;

        let mut forward = Forward::new(self.rank(), outbound, self.spec.output_run_length());
        self.drive(&mut inbound, &mut forward).await
    }

    /// Final merge. Returns the sorted sequence.
    pub async fn run_sink<T, I>(&self, mut inbound: I) -> Result<(Vec<T>, StageReport)>
    where
        T: Element,
        I: Inbound<T>,
    {
        self.expect_role(StageRole::Sink)?;

        let mut collect = Collect::default();
        let report = self.drive(&mut inbound, &mut collect).await?;
        Ok((collect.into_output(), report))
    }

    /// The only stage of a one-element pipeline.
    pub fn run_solo<T: Element>(&self, input: Vec<T>) -> Result<(Vec<T>, StageReport)> {
        self.expect_role(StageRole::Solo)?;
        self.check_input(&input)?;

        let report = self.report(input.len(), input.len(), None::<&MergeCore<T>>);
        Ok((input, report))
    }

    // ── Drive loop ───────────────────────────────────────────────────────

    async fn drive<T, I, E>(&self, inbound: &mut I, emit: &mut E) -> Result<StageReport>
    where
        T: Element,
        I: Inbound<T>,
        E: Emit<T>,
    {
        let mut core = MergeCore::new(&self.spec);
        let mut received = 0;

        for iteration in 0..self.spec.iterations(self.elements) {
            if iteration < self.elements {
                core.save(inbound.receive().await?);
                received += 1;
            }

            if !core.poll_start(iteration) {
                continue;
            }

            let value = core.next_element()?;
            if emit.emit(value).await? {
                core.reset_taken();
            }
        }

        let report = self.report(received, emit.emitted(), Some(&core));
        debug!(
            rank = report.rank,
            received = report.received,
            emitted = report.emitted,
            peak_occupancy = report.peak_occupancy,
            "stage finished"
        );
        Ok(report)
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn check_input<T>(&self, input: &[T]) -> Result<()> {
        if input.len() == self.elements {
            return Ok(());
        }
        error!(
            rank = self.rank(),
            expected = self.elements,
            actual = input.len(),
            "input size mismatch"
        );
        Err(PipelineError::Input {
            rank: self.rank(),
            expected: self.elements,
            actual: input.len(),
        })
    }

    fn expect_role(&self, role: StageRole) -> Result<()> {
        if self.spec.role == role {
            return Ok(());
        }
        Err(PipelineError::StageFailed {
            rank: self.rank(),
            reason: format!("{} stage cannot run as {}", self.spec.role, role),
        })
    }

    fn report<T: Element>(
        &self,
        received: usize,
        emitted: usize,
        core: Option<&MergeCore<T>>,
    ) -> StageReport {
        StageReport {
            rank: self.rank(),
            role: self.role(),
            received,
            emitted,
            peak_occupancy: core.map_or(0, MergeCore::peak_occupancy),
            merge_started_at: core.and_then(MergeCore::started_at),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{link, ChannelInbound};
    use pms_types::{Message, SortConfig, Tag};

    fn topology(elements: usize) -> Topology {
        SortConfig::for_elements(elements).validate().unwrap()
    }

    /// Link pre-loaded with `messages`. Capacity covers all of them, so
    /// nothing blocks.
    async fn preloaded(rank: Rank, messages: &[Message<u8>]) -> ChannelInbound<u8> {
        let (mut tx, rx) = link(rank - 1, messages.len().max(1));
        for &msg in messages {
            tx.send(msg).await.unwrap();
        }
        rx
    }

    async fn drain(mut rx: ChannelInbound<u8>, count: usize) -> Vec<Message<u8>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(rx.receive().await.unwrap());
        }
        out
    }

    async fn source(input: &[u8]) -> Vec<Message<u8>> {
        let topo = topology(input.len());
        let (tx, rx) = link(0, input.len());
        StageExecutor::new(&topo, 0)
            .unwrap()
            .run_source(input.to_vec(), tx)
            .await
            .unwrap();
        drain(rx, input.len()).await
    }

    async fn merge(
        elements: usize,
        rank: Rank,
        messages: &[Message<u8>],
    ) -> (Vec<Message<u8>>, StageReport) {
        let topo = topology(elements);
        let inbound = preloaded(rank, messages).await;
        let (tx, rx) = link(rank, elements);
        let report = StageExecutor::new(&topo, rank)
            .unwrap()
            .run_merge(inbound, tx)
            .await
            .unwrap();
        (drain(rx, elements).await, report)
    }

    fn tagged(values: &[u8], tags: &[Tag]) -> Vec<Message<u8>> {
        values.iter().zip(tags).map(|(&v, &t)| Message::new(v, t)).collect()
    }

    fn values(messages: &[Message<u8>]) -> Vec<u8> {
        messages.iter().map(|m| m.value).collect()
    }

    /// Emitted stream splits into consecutive runs of `run_length`, each
    /// sorted and sent under a single tag, with tags alternating per run.
    fn assert_runs(messages: &[Message<u8>], run_length: usize) {
        let mut expected_tag = Tag::Upper;
        for run in messages.chunks(run_length) {
            assert_eq!(run.len(), run_length);
            assert!(run.iter().all(|m| m.tag == expected_tag), "mixed tags in {run:?}");
            assert!(run.windows(2).all(|w| w[0].value <= w[1].value), "unsorted run {run:?}");
            expected_tag = expected_tag.toggled();
        }
    }

    #[tokio::test]
    async fn source_toggles_every_element() {
        let sent = source(&[5, 1, 4, 2]).await;
        assert_eq!(
            sent,
            tagged(&[5, 1, 4, 2], &[Tag::Upper, Tag::Lower, Tag::Upper, Tag::Lower])
        );
    }

    #[tokio::test]
    async fn source_rejects_wrong_input_size() {
        let topo = topology(8);
        let (tx, _rx) = link::<u8>(0, 8);
        let err = StageExecutor::new(&topo, 0)
            .unwrap()
            .run_source(vec![1, 2, 3], tx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Input { rank: 0, expected: 8, actual: 3 }
        ));
    }

    #[tokio::test]
    async fn worked_example_intermediate_runs() {
        use Tag::{Lower as L, Upper as U};

        let rank0 = source(&[5, 1, 4, 2, 8, 3, 7, 6]).await;

        let (rank1, _) = merge(8, 1, &rank0).await;
        assert_eq!(rank1, tagged(&[1, 5, 2, 4, 3, 8, 6, 7], &[U, U, L, L, U, U, L, L]));

        let (rank2, _) = merge(8, 2, &rank1).await;
        assert_eq!(rank2, tagged(&[1, 2, 4, 5, 3, 6, 7, 8], &[U, U, U, U, L, L, L, L]));

        let topo = topology(8);
        let (sorted, report) = StageExecutor::new(&topo, 3)
            .unwrap()
            .run_sink(preloaded(3, &rank2).await)
            .await
            .unwrap();
        assert_eq!(sorted, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(report.emitted, 8);
    }

    #[tokio::test]
    async fn every_merge_stage_doubles_runs() {
        let mut rng = fastrand::Rng::with_seed(7);
        let elements = 64;
        let input: Vec<u8> = (0..elements).map(|_| rng.u8(..)).collect();
        let topo = topology(elements);

        let mut stream = source(&input).await;
        for spec in topo.stages().filter(|s| s.role == StageRole::Merge) {
            let (out, report) = merge(elements, spec.rank, &stream).await;
            assert_runs(&out, spec.output_run_length());

            assert_eq!(report.received, elements);
            assert_eq!(report.emitted, elements);
            assert!(report.peak_occupancy <= spec.occupancy_bound());
            assert_eq!(report.merge_started_at, Some(spec.input_run_length()));
            stream = out;
        }

        let mut expected = input.clone();
        expected.sort();
        let mut merged = values(&stream);
        merged.sort();
        assert_eq!(merged, expected, "elements lost or duplicated");
    }

    #[tokio::test]
    async fn sink_keeps_duplicates() {
        let topo = topology(4);
        let rank0 = source(&[2, 2, 1, 1]).await;
        let (rank1, _) = merge(4, 1, &rank0).await;
        let (sorted, report) = StageExecutor::new(&topo, 2)
            .unwrap()
            .run_sink(preloaded(2, &rank1).await)
            .await
            .unwrap();
        assert_eq!(sorted, vec![1, 1, 2, 2]);
        assert_eq!(report.received, 4);
        assert_eq!(report.peak_occupancy, 3);
    }

    #[tokio::test]
    async fn sink_reports_disconnect_when_upstream_vanishes() {
        let topo = topology(4);
        let (tx, rx) = link::<u8>(1, 4);
        drop(tx);
        let err = StageExecutor::new(&topo, 2)
            .unwrap()
            .run_sink(rx)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Disconnected { rank: 2, peer: 1 }));
    }

    #[test]
    fn solo_passes_input_through() {
        let topo = topology(1);
        let exec = StageExecutor::new(&topo, 0).unwrap();
        assert!(exec.is_first_stage());
        assert!(exec.is_last_stage());

        let (out, report) = exec.run_solo(vec![42u8]).unwrap();
        assert_eq!(out, vec![42]);
        assert_eq!(report.emitted, 1);
        assert_eq!(report.merge_started_at, None);
    }

    #[tokio::test]
    async fn wrong_role_rejected() {
        let topo = topology(4);
        let (tx, _rx) = link::<u8>(1, 4);
        let err = StageExecutor::new(&topo, 1)
            .unwrap()
            .run_source(vec![1, 2, 3, 4], tx)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::StageFailed { rank: 1, .. }));
    }

    #[test]
    fn rank_outside_topology_rejected() {
        let topo = topology(4);
        let err = StageExecutor::new(&topo, 3).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
