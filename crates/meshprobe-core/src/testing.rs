use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::{
    channel::Channel,
    command::Command,
    dispatch::ResultRow,
    node::{Node, NodePool},
    service::{Measurement, MeasurementRequest, MeasurementService, ServiceError},
    sink::{RowSink, SinkError},
};

pub(crate) const TIMESTAMP: &str = "2024-05-01T12:00:00Z";

pub(crate) fn node(s: &str) -> Node {
    s.parse().unwrap()
}

/// Nodes 10.0.0.1 through 10.0.0.k.
pub(crate) fn pool(k: usize) -> NodePool {
    let nodes = (1..=k).map(|i| node(&format!("10.0.0.{i}"))).collect();
    NodePool::new(nodes).unwrap()
}

pub(crate) fn three_node_pool() -> NodePool {
    pool(3)
}

pub(crate) fn request(channel: u32) -> MeasurementRequest {
    let command = Command::new(
        node("10.0.0.1"),
        node("10.0.0.2"),
        vec![node("10.0.0.3")],
        vec![Channel::new(channel)],
    );
    MeasurementRequest::new(&command, Some(Channel::new(channel)))
}

pub(crate) fn row(channel: u32) -> ResultRow {
    ResultRow {
        source: node("10.0.0.1"),
        destination: node("10.0.0.2"),
        path: vec![node("10.0.0.3"), node("10.0.0.4")],
        channel: Channel::new(channel),
        nr_intermediate: 2,
        throughput: f64::from(channel) * 10.0,
        timestamp: TIMESTAMP.to_owned(),
    }
}

fn echo(request: &MeasurementRequest) -> Measurement {
    let channel = request.wireless_channel.unwrap_or(Channel::new(1));
    Measurement {
        source: request.source,
        destination: request.destination,
        wireless_channel: channel,
        throughput: f64::from(channel.inner()) * 10.0,
        timestamp: Some(TIMESTAMP.to_owned()),
    }
}

/// A service that succeeds on every channel except the listed ones, which answer 500.
#[derive(Debug)]
pub(crate) struct FailOn {
    channels: HashSet<Channel>,
}

impl FailOn {
    pub(crate) fn channels(channels: &[u32]) -> Self {
        Self {
            channels: channels.iter().copied().map(Channel::new).collect(),
        }
    }

    pub(crate) fn nothing() -> Self {
        Self::channels(&[])
    }
}

impl MeasurementService for FailOn {
    fn measure(&self, request: &MeasurementRequest) -> Result<Measurement, ServiceError> {
        match request.wireless_channel {
            Some(c) if self.channels.contains(&c) => Err(ServiceError::Status {
                code: 500,
                body: format!("channel {c} is down"),
            }),
            _ => Ok(echo(request)),
        }
    }
}

/// A service that times out a fixed number of times before succeeding.
#[derive(Debug)]
pub(crate) struct Flaky {
    failures: u32,
    pub(crate) calls: AtomicU32,
}

impl Flaky {
    pub(crate) fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

impl MeasurementService for Flaky {
    fn measure(&self, request: &MeasurementRequest) -> Result<Measurement, ServiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(ServiceError::Timeout)
        } else {
            Ok(echo(request))
        }
    }
}

/// A sink that accepts a fixed number of rows and then fails.
#[derive(Debug)]
pub(crate) struct FailingSink {
    remaining: usize,
}

impl FailingSink {
    pub(crate) fn after(rows: usize) -> Self {
        Self { remaining: rows }
    }
}

impl RowSink for FailingSink {
    fn append(&mut self, _row: &ResultRow) -> Result<(), SinkError> {
        if self.remaining == 0 {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.remaining -= 1;
        Ok(())
    }
}
