// COCH Exporter - Periodic collection loop
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Periodic collection of conformance metrics.
//!
//! Every cycle fans out one extraction task per (index, component)
//! pair. Tasks run to completion independently and return task-local
//! results; the cycle waits on the join barrier and merges sequentially,
//! so no task ever touches a shared accumulator. A failed fetch or an
//! unparseable response costs that task's contribution for the cycle,
//! nothing more.

use crate::client::AggregationSource;
use crate::metrics::ExporterMetrics;
use coch::{parse_document, BucketSummary, ConfigMetric, PipelineConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Observable state of the poll loop, read by the status endpoint.
#[derive(Debug, Default)]
pub struct PollerState {
    /// Completed poll cycles
    pub cycles: AtomicU64,
    /// Diff records emitted by the last cycle
    pub last_diffs: AtomicUsize,
    /// Merged optimal records emitted by the last cycle
    pub last_optimals: AtomicUsize,
    /// Invalid config file ids seen in the last cycle
    pub last_invalid: AtomicU64,
    /// Tasks that contributed nothing in the last cycle
    pub last_failed_tasks: AtomicU64,
    /// Duration of the last cycle in milliseconds
    pub last_cycle_ms: AtomicU64,
    /// Whether the loop is running
    pub running: AtomicBool,
}

/// Everything one poll cycle produced.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub diffs: Vec<ConfigMetric>,
    pub optimals: Vec<ConfigMetric>,
    pub summaries: Vec<BucketSummary>,
    pub invalid_identities: u64,
    /// Tasks whose fetch or parse failed; their contribution is skipped
    pub failed_tasks: u64,
}

impl CycleOutcome {
    fn absorb(&mut self, task: TaskOutcome) {
        self.diffs.extend(task.diffs);
        self.optimals.extend(task.optimals);
        self.summaries.extend(task.summary);
        self.invalid_identities += task.invalid_identities;
        self.failed_tasks += task.failed as u64;
    }
}

/// Task-local result for one (index, component) pair.
#[derive(Debug, Default)]
struct TaskOutcome {
    diffs: Vec<ConfigMetric>,
    optimals: Vec<ConfigMetric>,
    summary: Option<BucketSummary>,
    invalid_identities: u64,
    failed: bool,
}

impl TaskOutcome {
    fn failed() -> Self {
        Self {
            failed: true,
            ..Default::default()
        }
    }
}

/// Periodic poller driving the extraction pipeline.
pub struct Poller<S> {
    source: Arc<S>,
    pipeline: PipelineConfig,
    indices: Vec<String>,
    components: Vec<String>,
    interval: Duration,
    metrics: Arc<ExporterMetrics>,
    state: Arc<PollerState>,
}

impl<S: AggregationSource + 'static> Poller<S> {
    pub fn new(
        source: S,
        pipeline: PipelineConfig,
        indices: Vec<String>,
        components: Vec<String>,
        interval: Duration,
        metrics: Arc<ExporterMetrics>,
    ) -> Self {
        Self {
            source: Arc::new(source),
            pipeline,
            indices,
            components,
            interval,
            metrics,
            state: Arc::new(PollerState::default()),
        }
    }

    /// Shared handle on the loop state.
    pub fn state(&self) -> Arc<PollerState> {
        Arc::clone(&self.state)
    }

    /// Run collection cycles until the state's running flag is cleared.
    pub async fn run(&self) {
        self.state.running.store(true, Ordering::SeqCst);
        info!(
            "polling {} searches every {:?}",
            self.indices.len() * self.components.len(),
            self.interval
        );

        while self.state.running.load(Ordering::SeqCst) {
            let started = Instant::now();
            let outcome = self.collect().await;

            self.metrics.publish(&outcome);
            self.record_cycle(&outcome, started.elapsed());

            tokio::time::sleep(self.interval).await;
        }
    }

    /// Stop the loop after the current cycle.
    #[allow(dead_code)]
    pub fn stop(&self) {
        self.state.running.store(false, Ordering::SeqCst);
    }

    /// Run one collection cycle: fan out, join, merge.
    pub async fn collect(&self) -> CycleOutcome {
        let mut tasks = JoinSet::new();

        for index in &self.indices {
            for component in &self.components {
                let source = Arc::clone(&self.source);
                let pipeline = self.pipeline.clone();
                let index = index.clone();
                let component = component.clone();
                tasks.spawn(async move { run_task(source, pipeline, index, component).await });
            }
        }

        let mut outcome = CycleOutcome::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(task) => outcome.absorb(task),
                Err(err) => {
                    warn!("extraction task aborted: {err}");
                    outcome.failed_tasks += 1;
                }
            }
        }
        outcome
    }

    fn record_cycle(&self, outcome: &CycleOutcome, elapsed: Duration) {
        self.state.cycles.fetch_add(1, Ordering::SeqCst);
        self.state
            .last_diffs
            .store(outcome.diffs.len(), Ordering::SeqCst);
        self.state
            .last_optimals
            .store(outcome.optimals.len(), Ordering::SeqCst);
        self.state
            .last_invalid
            .store(outcome.invalid_identities, Ordering::SeqCst);
        self.state
            .last_failed_tasks
            .store(outcome.failed_tasks, Ordering::SeqCst);
        self.state
            .last_cycle_ms
            .store(elapsed.as_millis() as u64, Ordering::SeqCst);

        info!(
            "cycle done: {} diffs, {} optimals, {} invalid ids, {} failed tasks in {:?}",
            outcome.diffs.len(),
            outcome.optimals.len(),
            outcome.invalid_identities,
            outcome.failed_tasks,
            elapsed
        );
    }
}

/// Fetch and extract one (index, component) pair.
async fn run_task<S: AggregationSource>(
    source: Arc<S>,
    pipeline: PipelineConfig,
    index: String,
    component: String,
) -> TaskOutcome {
    debug!("requesting index {index}; component {component}");

    let raw = match source.fetch(&index, &component).await {
        Ok(raw) => raw,
        Err(err) => {
            warn!("fetch failed for index {index}, component {component}: {err}");
            return TaskOutcome::failed();
        }
    };

    let summary = BucketSummary::from_raw(&index, &component, &raw);

    match parse_document(&raw, &pipeline) {
        Ok(parsed) => TaskOutcome {
            diffs: parsed.diffs,
            optimals: parsed.optimals,
            summary: Some(summary),
            invalid_identities: parsed.invalid_identities,
            failed: false,
        },
        Err(err) => {
            warn!("unusable response for index {index}, component {component}: {err}");
            TaskOutcome::failed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture_document() -> &'static [u8] {
        br#"{"aggregations": {"CONFIG_FILE_ID": {"buckets": [
            {"key": "p__mod__v1__host-1__prov__file",
             "TIMESTAMP": {"buckets": [{"key": 1613630700000,
                 "KEY_VALUE_TYPE": {"buckets": [
                     {"key": "port 8080 int", "1": {"value": 2.0},
                      "MAX": {"value": 1.0}, "MIN": {"value": 1.0}}
                 ]}}]}}
        ]}}}"#
    }

    fn poller_for(dir: &std::path::Path) -> Poller<crate::client::FileSource> {
        let pipeline = PipelineConfig::default();
        let metrics = Arc::new(ExporterMetrics::new(&pipeline.labels).unwrap());
        Poller::new(
            crate::client::FileSource::new(dir),
            pipeline,
            vec!["index-1".to_string()],
            vec!["component-1".to_string(), "component-2".to_string()],
            Duration::from_secs(10),
            metrics,
        )
    }

    #[tokio::test]
    async fn test_collect_merges_task_results() {
        let dir = tempfile::tempdir().unwrap();
        for component in ["component-1", "component-2"] {
            let mut file =
                std::fs::File::create(dir.path().join(format!("index-1__{component}.json")))
                    .unwrap();
            file.write_all(fixture_document()).unwrap();
        }

        let poller = poller_for(dir.path());
        let outcome = poller.collect().await;

        assert_eq!(outcome.diffs.len(), 2);
        assert_eq!(outcome.summaries.len(), 2);
        assert_eq!(outcome.failed_tasks, 0);
        assert_eq!(outcome.invalid_identities, 0);
    }

    #[tokio::test]
    async fn test_collect_counts_failed_tasks() {
        let dir = tempfile::tempdir().unwrap();
        // Only component-1 has a response; component-2's fetch fails
        let mut file = std::fs::File::create(dir.path().join("index-1__component-1.json")).unwrap();
        file.write_all(fixture_document()).unwrap();

        let poller = poller_for(dir.path());
        let outcome = poller.collect().await;

        assert_eq!(outcome.diffs.len(), 1);
        assert_eq!(outcome.failed_tasks, 1);
        assert_eq!(outcome.summaries.len(), 1);
    }

    #[tokio::test]
    async fn test_collect_skips_unparseable_response() {
        let dir = tempfile::tempdir().unwrap();
        let mut good = std::fs::File::create(dir.path().join("index-1__component-1.json")).unwrap();
        good.write_all(fixture_document()).unwrap();
        let mut bad = std::fs::File::create(dir.path().join("index-1__component-2.json")).unwrap();
        bad.write_all(b"{\"took\": 3}").unwrap();

        let poller = poller_for(dir.path());
        let outcome = poller.collect().await;

        assert_eq!(outcome.diffs.len(), 1);
        assert_eq!(outcome.failed_tasks, 1);
    }
}
