//! Measurement cycle scheduler
//!
//! A sweep measures every registered endpoint, download first and upload
//! second where the tool supports it, then the scheduler sleeps for the
//! configured interval. Endpoints run concurrently up to the configured cap;
//! directions of one endpoint always run one after the other. Outcomes are
//! collected in registry order whatever order the probes finish in.
//!
//! Every failure is confined to the endpoint/direction it happened in. The
//! cancellation token stops the loop between and during probes and cuts the
//! inter-sweep sleep short.

use crate::error::{ParseError, ProbeError, SinkError};
use crate::logging::{SweepLogger, SweepTotals};
use crate::models::{Direction, Endpoint, Measurement, ProbeResult, ResolvedConfig};
use crate::parser;
use crate::probe::ProbeExecutor;
use crate::sink::{record, MetricSink};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

/// What happened to one endpoint/direction during a sweep
#[derive(Debug)]
pub enum MeasurementOutcome {
    /// Measured and delivered
    Recorded(Measurement),
    /// The tool could not be run, failed, or timed out
    ProbeFailed(ProbeError),
    /// The tool ran but its output held no usable throughput
    ParseFailed(ParseError),
    /// Measured but lost on the way to the sink
    SinkFailed(Measurement, SinkError),
    /// Not measured because the sweep was cancelled
    Skipped,
}

impl MeasurementOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, MeasurementOutcome::Recorded(_))
    }
}

/// Outcome tagged with the endpoint and direction it belongs to
#[derive(Debug)]
pub struct DirectionOutcome {
    pub endpoint: Endpoint,
    pub direction: Direction,
    pub outcome: MeasurementOutcome,
}

/// Result of one sweep, in registry order
#[derive(Debug)]
pub struct SweepReport {
    pub sweep: u64,
    pub outcomes: Vec<DirectionOutcome>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl SweepReport {
    pub fn totals(&self) -> SweepTotals {
        let mut totals = SweepTotals::default();
        let mut last_endpoint: Option<&Endpoint> = None;
        for entry in &self.outcomes {
            if last_endpoint != Some(&entry.endpoint) {
                totals.endpoints += 1;
                last_endpoint = Some(&entry.endpoint);
            }
            match entry.outcome {
                MeasurementOutcome::Recorded(_) => totals.recorded += 1,
                MeasurementOutcome::ProbeFailed(_) => totals.probe_failures += 1,
                MeasurementOutcome::ParseFailed(_) => totals.parse_failures += 1,
                MeasurementOutcome::SinkFailed(..) => totals.sink_failures += 1,
                MeasurementOutcome::Skipped => totals.skipped += 1,
            }
        }
        totals
    }

    /// Measurements that reached the sink
    pub fn recorded(&self) -> impl Iterator<Item = &Measurement> {
        self.outcomes.iter().filter_map(|entry| match &entry.outcome {
            MeasurementOutcome::Recorded(measurement) => Some(measurement),
            _ => None,
        })
    }
}

/// Drives sweeps until cancelled
pub struct Scheduler {
    config: Arc<ResolvedConfig>,
    probe: Arc<dyn ProbeExecutor>,
    sink: Arc<dyn MetricSink>,
    logger: SweepLogger,
    limiter: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(
        config: Arc<ResolvedConfig>,
        probe: Arc<dyn ProbeExecutor>,
        sink: Arc<dyn MetricSink>,
        logger: SweepLogger,
    ) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            config,
            probe,
            sink,
            logger,
            limiter,
        }
    }

    /// Run sweeps until the token is cancelled (or after one sweep in
    /// run-once mode). Returns the number of sweeps that ran to completion.
    pub async fn run(&self, cancel: CancellationToken) -> u64 {
        let interval = self.config.sweep_interval();
        let mut completed = 0;

        while !cancel.is_cancelled() {
            let report = self.run_sweep(completed + 1, &cancel).await;
            if report.cancelled {
                break;
            }
            completed += 1;

            if self.config.run_once {
                break;
            }

            self.logger.sleeping(interval.as_secs()).await;
            tokio::select! {
                _ = sleep(interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        completed
    }

    /// Measure every endpoint once
    pub async fn run_sweep(&self, sweep: u64, cancel: &CancellationToken) -> SweepReport {
        let endpoints = &self.config.endpoints;
        let correlation_id = self.logger.sweep_started(sweep, endpoints.len()).await;
        let started = Instant::now();

        let per_endpoint = join_all(
            endpoints
                .iter()
                .map(|endpoint| self.measure_endpoint(endpoint, &correlation_id, cancel)),
        )
        .await;

        let report = SweepReport {
            sweep,
            outcomes: per_endpoint.into_iter().flatten().collect(),
            cancelled: cancel.is_cancelled(),
            elapsed: started.elapsed(),
        };

        if report.cancelled {
            self.logger.sweep_cancelled(&correlation_id, sweep).await;
        } else {
            self.logger
                .sweep_finished(&correlation_id, sweep, report.totals(), report.elapsed.as_millis())
                .await;
        }
        report
    }

    async fn measure_endpoint(
        &self,
        endpoint: &Endpoint,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> Vec<DirectionOutcome> {
        let directions = self.config.probe_tool.directions();
        let mut outcomes = Vec::with_capacity(directions.len());

        let permit = tokio::select! {
            permit = self.limiter.acquire() => permit.ok(),
            _ = cancel.cancelled() => None,
        };

        for &direction in directions {
            let outcome = if permit.is_none() || cancel.is_cancelled() {
                self.logger.skipped(correlation_id, endpoint, direction).await;
                MeasurementOutcome::Skipped
            } else {
                self.measure(endpoint, direction, correlation_id, cancel).await
            };
            outcomes.push(DirectionOutcome {
                endpoint: endpoint.clone(),
                direction,
                outcome,
            });
        }

        outcomes
    }

    /// Probe, parse, normalize, format and send one measurement
    async fn measure(
        &self,
        endpoint: &Endpoint,
        direction: Direction,
        correlation_id: &str,
        cancel: &CancellationToken,
    ) -> MeasurementOutcome {
        let probe_timeout = self.config.probe_timeout();
        let result = tokio::select! {
            result = timeout(probe_timeout, self.probe.probe(endpoint, direction)) => match result {
                Ok(result) => result,
                Err(_) => ProbeResult::failed(
                    endpoint,
                    direction,
                    String::new(),
                    ProbeError::Timeout { seconds: probe_timeout.as_secs() },
                ),
            },
            _ = cancel.cancelled() => ProbeResult::failed(endpoint, direction, String::new(), ProbeError::Cancelled),
        };

        if let Some(error) = result.execution_error {
            if matches!(error, ProbeError::Cancelled) {
                self.logger.skipped(correlation_id, endpoint, direction).await;
                return MeasurementOutcome::Skipped;
            }
            self.logger
                .probe_failed(correlation_id, endpoint, direction, &error, &result.raw_text)
                .await;
            return MeasurementOutcome::ProbeFailed(error);
        }

        let parsed = match parser::parse(&result.raw_text, self.config.probe_tool) {
            Ok(parsed) => parsed,
            Err(error) => {
                self.logger.parse_failed(correlation_id, endpoint, direction, &error).await;
                return MeasurementOutcome::ParseFailed(error);
            }
        };

        let measurement = Measurement::new(
            endpoint,
            direction,
            parser::normalize(parsed),
            chrono::Utc::now().timestamp(),
        );
        self.logger
            .measurement_recorded(correlation_id, endpoint, &measurement)
            .await;

        let payload = record::build(&measurement, self.config.probe_tool, &self.config);
        match self.sink.send(&payload).await {
            Ok(()) => MeasurementOutcome::Recorded(measurement),
            Err(error) => {
                self.logger.sink_failed(correlation_id, endpoint, direction, &error).await;
                MeasurementOutcome::SinkFailed(measurement, error)
            }
        }
    }
}
