//! Polling driver.
//!
//! [`Tracker`] owns the descriptor list and the current states, runs the
//! initial load once, then polls on a fixed interval. A cycle's result is
//! committed only when the cycle completes; an abandoned or cancelled cycle
//! leaves the previous states in place.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::engine::MetricEngine;
use crate::error::CycleError;
use crate::loader::LoadOptions;
use crate::model::{MetricDescriptor, MetricState};
use crate::outcome::{BatchReport, MetricFailure};

/// What one committed cycle changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// 0 for the initial load, then 1, 2, ... per poll.
    pub cycle: u64,
    pub new_samples: usize,
    /// Ids whose series grew this cycle.
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

impl CycleSummary {
    fn between(cycle: u64, before: &[MetricState], report: &BatchReport) -> Self {
        let previous: HashMap<&str, usize> =
            before.iter().map(|s| (s.id(), s.series_len())).collect();

        let mut new_samples = 0;
        let mut updated = Vec::new();
        for state in &report.states {
            let was = previous.get(state.id()).copied().unwrap_or(0);
            let grown = state.series_len().saturating_sub(was);
            if grown > 0 {
                new_samples += grown;
                updated.push(state.id().to_string());
            }
        }

        Self {
            cycle,
            new_samples,
            updated,
            failed: report.failed_ids().into_iter().map(String::from).collect(),
        }
    }
}

/// Point-in-time view of a tracker, for reporting.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TrackerSnapshot {
    pub states: Vec<MetricState>,
    pub failures: Vec<MetricFailure>,
    pub cycles: u64,
}

enum Step {
    Shutdown,
    Overrun,
    Done(Result<CycleSummary, CycleError>),
}

pub struct Tracker {
    engine: Arc<MetricEngine>,
    metrics: Vec<MetricDescriptor>,
    options: LoadOptions,
    states: Vec<MetricState>,
    failures: Vec<MetricFailure>,
    cycles: u64,
    started: bool,
}

impl Tracker {
    pub fn new(engine: Arc<MetricEngine>, metrics: Vec<MetricDescriptor>, options: LoadOptions) -> Self {
        Self {
            engine,
            metrics,
            options,
            states: Vec::new(),
            failures: Vec::new(),
            cycles: 0,
            started: false,
        }
    }

    /// Adopt previously persisted states instead of running an initial load.
    pub fn resume(mut self, states: Vec<MetricState>) -> Self {
        self.states = states;
        self.started = true;
        self
    }

    pub fn metrics(&self) -> &[MetricDescriptor] {
        &self.metrics
    }

    pub fn states(&self) -> &[MetricState] {
        &self.states
    }

    /// Initial load of every tracked metric.
    pub async fn start(&mut self, cancel: &CancellationToken) -> Result<CycleSummary, CycleError> {
        let report = self
            .engine
            .load_initial(&self.metrics, &self.options, cancel)
            .await?;
        let summary = CycleSummary::between(0, &[], &report);
        self.commit(report);
        self.started = true;
        Ok(summary)
    }

    /// One poll cycle over the current states.
    pub async fn tick(&mut self, cancel: &CancellationToken) -> Result<CycleSummary, CycleError> {
        let report = self
            .engine
            .poll(&self.metrics, &self.states, cancel)
            .await?;
        self.cycles += 1;
        let summary = CycleSummary::between(self.cycles, &self.states, &report);
        self.commit(report);
        Ok(summary)
    }

    fn commit(&mut self, report: BatchReport) {
        self.states = report.states;
        self.failures = report.failures;
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            states: self.states.clone(),
            failures: self.failures.clone(),
            cycles: self.cycles,
        }
    }

    /// Load (unless already started), then poll every `interval` until
    /// `shutdown` is cancelled. `on_cycle` sees every committed cycle.
    ///
    /// If the next tick comes due while a cycle is still in flight, that
    /// cycle is cancelled and a fresh one starts from the last committed
    /// states.
    pub async fn run<F>(&mut self, interval: Duration, shutdown: &CancellationToken, mut on_cycle: F)
    where
        F: FnMut(&CycleSummary, &Tracker),
    {
        if !self.started {
            match self.start(shutdown).await {
                Ok(summary) => on_cycle(&summary, self),
                Err(CycleError::Cancelled) => return,
            }
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut due = false;
        loop {
            if !due {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
            }
            due = false;

            let cycle = shutdown.child_token();
            let step = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Step::Shutdown,
                result = self.tick(&cycle) => Step::Done(result),
                _ = ticker.tick() => Step::Overrun,
            };

            match step {
                Step::Shutdown => break,
                Step::Overrun => {
                    cycle.cancel();
                    due = true;
                    log::warn!(
                        "poll cycle still running after {interval:?}; abandoning it and starting over"
                    );
                }
                Step::Done(Ok(summary)) => on_cycle(&summary, self),
                Step::Done(Err(CycleError::Cancelled)) => {}
            }
        }

        log::info!("tracker stopped after {} cycles", self.cycles);
    }
}
