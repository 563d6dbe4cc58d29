//! This module defines the [`Dispatcher`], which turns commands into result rows by querying a
//! [`MeasurementService`] once per channel.

use std::fmt;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::Receiver;
use log::{error, info, warn};

use crate::{
    channel::Channel,
    command::Command,
    node::{self, Node},
    service::{Measurement, MeasurementRequest, MeasurementService, ServiceError},
    sink::{RowSink, SinkError},
    source::{CommandSource, Next},
};

/// Dispatch options.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct DispatchOpts {
    /// The maximum number of requests in flight. Zero is treated as one.
    #[builder(default = 4)]
    pub concurrency: usize,
}

impl Default for DispatchOpts {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// One successful (command, channel) measurement.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ResultRow {
    /// The source node, as reported by the service.
    pub source: Node,
    /// The destination node, as reported by the service.
    pub destination: Node,
    /// The path of the originating command.
    pub path: Vec<Node>,
    /// The channel, as reported by the service.
    pub channel: Channel,
    /// The number of intermediate nodes of the originating command.
    pub nr_intermediate: usize,
    /// Throughput in Mbit/s.
    pub throughput: f64,
    /// The service's timestamp, or the time the response was received.
    pub timestamp: String,
}

impl ResultRow {
    /// Combines a measurement with the command that produced it. Path data always comes from the
    /// command; the service is not trusted with it.
    pub fn new(command: &Command, m: Measurement) -> Self {
        Self {
            source: m.source,
            destination: m.destination,
            path: command.path.clone(),
            channel: m.wireless_channel,
            nr_intermediate: command.nr_intermediate(),
            throughput: m.throughput,
            timestamp: m
                .timestamp
                .unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Returns the path as a comma-separated list.
    pub fn path_string(&self) -> String {
        node::join(&self.path)
    }
}

/// A (command, channel) request that produced no row.
#[derive(Debug)]
pub struct ChannelFailure {
    /// The command, rendered as text.
    pub command: String,
    /// The channel requested, if any.
    pub channel: Option<Channel>,
    /// Requests sent before giving up.
    pub attempts: u32,
    /// What went wrong on the last attempt.
    pub error: ServiceError,
}

impl std::error::Error for ChannelFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl fmt::Display for ChannelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.command)?;
        if let Some(channel) = self.channel {
            write!(f, " on channel {channel}")?;
        }
        let plural = if self.attempts == 1 { "" } else { "s" };
        write!(f, " after {} attempt{}: {}", self.attempts, plural, self.error)?;
        // Transport and decode errors keep the interesting part in their source
        match &self.error {
            ServiceError::Transport(e) => write!(f, " ({e})"),
            ServiceError::Decode(e) => write!(f, " ({e})"),
            _ => Ok(()),
        }
    }
}

/// The outcome of dispatching one command.
#[derive(Debug, Default)]
pub struct Dispatched {
    /// One row per successful channel, in channel order.
    pub rows: Vec<ResultRow>,
    /// One entry per failed channel, in channel order.
    pub failures: Vec<ChannelFailure>,
}

/// Counters for a batch run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    /// Commands read from the source.
    pub commands: usize,
    /// Lines that did not parse.
    pub unparsable: usize,
    /// Requests issued.
    pub requests: usize,
    /// Requests that failed.
    pub failures: usize,
    /// Rows appended to the sink.
    pub rows_written: usize,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} commands ({} unparsable), {} requests, {} failed, {} rows written",
            self.commands, self.unparsable, self.requests, self.failures, self.rows_written
        )
    }
}

/// A batch that could not finish.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The worker pool could not be created.
    #[error("failed to build dispatch pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The sink stopped accepting rows.
    #[error("failed to persist results, {rows_lost} row(s) lost")]
    Persist {
        /// The sink error.
        #[source]
        source: SinkError,
        /// Successful measurements that never reached the sink.
        rows_lost: usize,
        /// Counters up to the end of the batch.
        report: BatchReport,
    },
}

/// Runs commands against a measurement service.
#[derive(Debug)]
pub struct Dispatcher<S> {
    service: S,
    opts: DispatchOpts,
}

impl<S> Dispatcher<S>
where
    S: MeasurementService + Sync,
{
    /// Creates a dispatcher.
    pub fn new(service: S, opts: DispatchOpts) -> Self {
        Self { service, opts }
    }

    /// Measures `command` on a single channel. Failures are logged with the command and channel
    /// before being returned.
    pub fn measure(
        &self,
        command: &Command,
        channel: Option<Channel>,
    ) -> Result<ResultRow, ChannelFailure> {
        let request = MeasurementRequest::new(command, channel);
        match self.service.measure_counted(&request) {
            (Ok(m), _) => Ok(ResultRow::new(command, m)),
            (Err(error), attempts) => {
                let failure = ChannelFailure {
                    command: command.to_string(),
                    channel,
                    attempts,
                    error,
                };
                warn!("Measurement failed: {}", failure);
                Err(failure)
            }
        }
    }

    /// Measures `command` on each of its channels in textual order. A failed channel never stops
    /// its siblings.
    pub fn dispatch(&self, command: &Command) -> Dispatched {
        let mut out = Dispatched::default();
        for channel in slots(command) {
            match self.measure(command, channel) {
                Ok(row) => out.rows.push(row),
                Err(failure) => out.failures.push(failure),
            }
        }
        out
    }

    /// Drains `source`, measuring every (command, channel) pair on a pool of
    /// `opts.concurrency` workers, and appends each row to `sink` as soon as it arrives.
    ///
    /// Rows of different commands may interleave in the sink. A single writer owns the sink, so
    /// appends never overlap. If the sink fails, the batch keeps measuring but stops appending,
    /// and the error reports how many rows were lost.
    pub fn run<C, K>(&self, source: &mut C, sink: K) -> Result<BatchReport, RunError>
    where
        C: CommandSource + ?Sized,
        K: RowSink + Send,
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.opts.concurrency.max(1))
            .thread_name(|i| format!("meshprobe-dispatch-{i}"))
            .build()?;
        let (s, r) = crossbeam_channel::unbounded();
        let mut report = BatchReport::default();
        let drained = thread::scope(|scope| {
            let writer = scope.spawn(move || drain(r, sink));
            pool.in_place_scope(|jobs| loop {
                match source.next_command() {
                    Next::Command(command) => {
                        report.commands += 1;
                        let command = Arc::new(command);
                        for channel in slots(&command) {
                            report.requests += 1;
                            let s = s.clone();
                            let command = Arc::clone(&command);
                            jobs.spawn(move |_| {
                                let outcome = self.measure(&command, channel);
                                s.send(outcome).unwrap(); // the writer outlives every sender
                            });
                        }
                    }
                    Next::Unparsable(u) => {
                        warn!("Skipping {}", u);
                        report.unparsable += 1;
                    }
                    Next::EndOfInput => break,
                }
            });
            drop(s);
            writer
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
        });
        report.failures = drained.failures;
        report.rows_written = drained.rows_written;
        match drained.persist_error {
            Some(source) => {
                error!(
                    "Failed to persist results ({} row(s) lost): {}",
                    drained.rows_lost, source
                );
                Err(RunError::Persist {
                    source,
                    rows_lost: drained.rows_lost,
                    report,
                })
            }
            None => {
                info!("Batch finished: {}", report);
                Ok(report)
            }
        }
    }

    /// Get a reference to the dispatcher's service.
    pub fn service(&self) -> &S {
        &self.service
    }
}

// One request per channel; a command without channels is one request that lets the service pick.
fn slots(command: &Command) -> Vec<Option<Channel>> {
    if command.channels.is_empty() {
        vec![None]
    } else {
        command.channels.iter().copied().map(Some).collect()
    }
}

#[derive(Debug, Default)]
struct Drained {
    rows_written: usize,
    rows_lost: usize,
    failures: usize,
    persist_error: Option<SinkError>,
}

fn drain<K: RowSink>(r: Receiver<Result<ResultRow, ChannelFailure>>, mut sink: K) -> Drained {
    let mut out = Drained::default();
    for outcome in r {
        match outcome {
            Ok(_) if out.persist_error.is_some() => out.rows_lost += 1,
            Ok(row) => match sink.append(&row) {
                Ok(()) => out.rows_written += 1,
                Err(e) => {
                    out.persist_error = Some(e);
                    out.rows_lost += 1;
                }
            },
            Err(_) => out.failures += 1,
        }
    }
    out
}
