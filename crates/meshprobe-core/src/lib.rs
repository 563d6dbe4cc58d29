#![warn(unreachable_pub, missing_debug_implementations)]

//! The core meshprobe library. This crate defines the two halves of a throughput measurement
//! campaign: the [generator](generate::Generator), which samples measurement
//! [commands](command::Command) from a pool of nodes and radio channels, and the
//! [dispatcher](dispatch::Dispatcher), which runs those commands against a
//! [measurement service](service::MeasurementService) and appends the results to a
//! [sink](sink::RowSink).
//!
//! The two halves only share the textual command format, so they can run as separate processes.

#[macro_use]
mod ident;

pub mod channel;
pub mod command;
pub mod dispatch;
pub mod generate;
pub mod node;
pub mod retry;
pub mod service;
pub mod sink;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use channel::Channel;
pub use command::{Command, Grammar, Unparsable};
pub use dispatch::{
    BatchReport, ChannelFailure, DispatchOpts, Dispatched, Dispatcher, ResultRow, RunError,
};
pub use generate::{GenOpts, GenerateError, GenerationPolicy, Generator};
pub use node::{Node, NodePool, NodePoolError};
pub use retry::{RetryPolicy, Retrying};
pub use service::{
    DecodeError, Measurement, MeasurementRequest, MeasurementService, ProtocolVersion,
    ResponseDecoder, ServiceError,
};
pub use sink::{CsvStore, RowSink, SinkError};
pub use source::{CommandSource, Interactive, IterSource, LineSource, Next};
