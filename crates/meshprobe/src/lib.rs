//! `meshprobe` measures point-to-point throughput across a wireless mesh. A
//! [generator](core::Generator) samples source, destination, intermediate-node path and radio
//! channel combinations from a pool of node addresses and renders them as textual commands; a
//! [dispatcher](core::Dispatcher) parses those commands, asks a remote measurement service to
//! run each one on every requested channel, and appends one result row per successful
//! measurement to a [CSV store](core::CsvStore).

#![warn(unreachable_pub, missing_docs)]

pub mod core;
pub mod impls;
pub mod utils;
